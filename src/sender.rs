//! 송신자
//!
//! - 메시지 직렬화 후 MTU 단위 분할, 프래그먼트당 datagram 하나 전송
//! - 호출 간 상태 없음 (완전 무상태)
//! - 신뢰성 없음: 재전송도 ACK도 없음

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::fragment::split_into_fragments;
use crate::message::{GeneralMessage, MessageId};
use crate::Result;

/// 메시지 전송
///
/// 직렬화된 바이트를 MTU 단위로 잘라 각 조각을 독립 datagram으로
/// 목적지에 보냄. message_id는 송신 시각(밀리초)의 하위 32비트:
/// 논리적으로 다른 두 전송이 같은 밀리초에 겹치면 ID가 충돌하여
/// 수신측에서 프래그먼트가 섞일 수 있음.
///
/// 직렬화 결과가 비면 (kind와 content 모두 기본값) datagram을 하나도
/// 보내지 않고 성공을 반환하며, 수신측은 이 메시지를 관측하지 못함.
///
/// 전송 중 하나라도 실패하면 즉시 중단하고 에러 반환. 이미 나간
/// 프래그먼트의 회수나 재시도는 없음
pub async fn send_message(
    socket: &UdpSocket,
    addr: SocketAddr,
    message: &GeneralMessage,
) -> Result<()> {
    let data = message.to_bytes()?;
    if data.is_empty() {
        warn!("직렬화 결과가 비어 전송 생략 (기본값 메시지)");
        return Ok(());
    }

    let message_id = next_message_id();
    let fragments = split_into_fragments(message_id, &data);

    for fragment in &fragments {
        let packet = fragment.to_bytes()?;
        socket.send_to(&packet, addr).await?;
    }

    debug!(
        "메시지 {} 전송 완료: {} bytes, {} 프래그먼트",
        message_id,
        data.len(),
        fragments.len()
    );

    Ok(())
}

/// 송신 시각 기반 메시지 ID (밀리초 하위 32비트)
fn next_message_id() -> MessageId {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as MessageId
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use bytes::Bytes;
    use rand::RngCore;

    use crate::message::Fragment;
    use crate::MessageCache;

    async fn socket_pair() -> (UdpSocket, UdpSocket, SocketAddr) {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        let local = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        (local, peer, peer_addr)
    }

    #[tokio::test]
    async fn test_send_emits_one_datagram_per_fragment() {
        let (local, peer, peer_addr) = socket_pair().await;

        let mut content = vec![0u8; 2500];
        rand::thread_rng().fill_bytes(&mut content);
        let message = GeneralMessage::new(7, Bytes::from(content));

        send_message(&local, peer_addr, &message).await.unwrap();

        // 직렬화 오버헤드 포함 2505바이트 -> 프래그먼트 3개
        let mut buf = vec![0u8; 2048];
        let mut cache = MessageCache::unbounded();
        let mut completed = None;

        for expected_id in 0..3u32 {
            let (len, _) = tokio::time::timeout(Duration::from_secs(1), peer.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();

            let fragment = Fragment::from_bytes(&buf[..len]).unwrap();
            assert_eq!(fragment.fragment_id, expected_id);
            assert_eq!(fragment.total_fragments, 3);

            completed = cache.fold(fragment).completed;
        }

        let restored = GeneralMessage::from_bytes(completed.unwrap()).unwrap();
        assert_eq!(restored, message);
    }

    #[tokio::test]
    async fn test_default_message_sends_nothing() {
        let (local, peer, peer_addr) = socket_pair().await;

        send_message(&local, peer_addr, &GeneralMessage::default())
            .await
            .unwrap();

        let mut buf = vec![0u8; 64];
        let result =
            tokio::time::timeout(Duration::from_millis(100), peer.recv_from(&mut buf)).await;
        assert!(result.is_err(), "datagram이 전송되면 안 됨");
    }
}
