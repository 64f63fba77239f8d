//! 수신자
//!
//! - 백그라운드 태스크에서 datagram 수신, message_id별 재조립
//! - 완성된 메시지마다 콜백을 정확히 한 번 호출
//! - 에러는 루프를 멈추지 않고 에러 채널로 보고 (가득 차면 버림)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::fragment::MessageCache;
use crate::message::{Fragment, GeneralMessage};
use crate::stats::ReceiverStats;
use crate::{Config, Error};

/// 에러 채널 수신기 타입
pub type ErrorReceiver = mpsc::Receiver<Error>;

/// 수신자 핸들 (외부에서 제어용)
///
/// [`Receiver::stop`]은 협조적 취소: 진행 중인 수신/폴드/콜백 사이클을
/// 중단하지 않고, 다음 반복 직전에 루프가 종료됨. 종료 시 에러 채널이
/// 닫히며, 닫힘과 경합한 에러는 유실될 수 있음
pub struct Receiver {
    running: Arc<AtomicBool>,
    cache: Arc<Mutex<MessageCache>>,
    stats: Arc<RwLock<ReceiverStats>>,
}

impl Receiver {
    /// 수신 루프 시작
    ///
    /// 소켓은 이미 바인딩된 상태로 넘어와야 함. 즉시 반환하며,
    /// 루프는 별도 태스크에서 정지 요청까지 돎.
    ///
    /// 콜백은 루프 태스크에서 동기 호출됨: 콜백이 반환할 때까지 다음
    /// datagram을 읽지 않으므로 같은 Receiver의 콜백은 절대 겹치지
    /// 않음. 느린 콜백은 수신을 지연시키고, 그 사이 커널 버퍼가 차면
    /// 이후 datagram은 전송 계층에서 조용히 유실됨
    pub fn start<F>(config: Config, socket: Arc<UdpSocket>, on_message: F) -> (Self, ErrorReceiver)
    where
        F: FnMut(GeneralMessage) + Send + 'static,
    {
        let (error_tx, error_rx) = mpsc::channel(config.error_channel_capacity);

        let running = Arc::new(AtomicBool::new(true));
        let cache = Arc::new(Mutex::new(MessageCache::new(
            config.max_pending_messages,
            config.pending_max_age(),
        )));
        let stats = Arc::new(RwLock::new(ReceiverStats::new(config.stats_window_size)));

        let receiver = Self {
            running: running.clone(),
            cache: cache.clone(),
            stats: stats.clone(),
        };

        tokio::spawn(recv_loop(
            config, socket, on_message, running, cache, stats, error_tx,
        ));

        (receiver, error_rx)
    }

    /// 정지 요청 (다음 반복 직전에 루프 종료)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 실행 중 여부
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> ReceiverStats {
        self.stats.read().clone()
    }

    /// 현재 재조립 중인 메시지 수
    pub fn pending_messages(&self) -> usize {
        self.cache.lock().len()
    }
}

/// 수신 루프 본체
async fn recv_loop<F>(
    config: Config,
    socket: Arc<UdpSocket>,
    mut on_message: F,
    running: Arc<AtomicBool>,
    cache: Arc<Mutex<MessageCache>>,
    stats: Arc<RwLock<ReceiverStats>>,
    error_tx: mpsc::Sender<Error>,
) where
    F: FnMut(GeneralMessage) + Send + 'static,
{
    let poll_interval = Duration::from_millis(config.recv_poll_interval_ms);
    let mut buf = vec![0u8; config.recv_buffer_size];

    info!("UFP Receiver started, buffer {} bytes", config.recv_buffer_size);

    while running.load(Ordering::SeqCst) {
        let len = match tokio::time::timeout(poll_interval, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _addr))) => len,
            Ok(Err(e)) => {
                warn!("수신 에러: {}", e);
                stats.write().transport_errors += 1;
                report_error(&error_tx, &stats, Error::Transport(e));
                continue;
            }
            Err(_) => {
                // 폴링 타임아웃: 취소 플래그 재확인
                continue;
            }
        };

        let fragment = match Fragment::from_bytes(&buf[..len]) {
            Ok(fragment) => fragment,
            Err(e) => {
                stats.write().decode_errors += 1;
                report_error(&error_tx, &stats, e);
                continue;
            }
        };

        let message_id = fragment.message_id;
        let data_len = fragment.fragment_data.len();

        // 잠금은 폴드 구간만: I/O와 콜백은 잠금 밖에서 실행
        let fold = cache.lock().fold(fragment);

        {
            let mut stats = stats.write();
            stats.record_arrival(data_len);
            if fold.replaced {
                stats.duplicate_fragments += 1;
            }
            stats.messages_evicted += fold.evicted;
        }

        let Some(data) = fold.completed else {
            continue;
        };

        match GeneralMessage::from_bytes(data) {
            Ok(message) => {
                debug!(
                    "메시지 {} 재조립 완료: {} bytes",
                    message_id,
                    message.content.len()
                );
                stats.write().messages_completed += 1;
                on_message(message);
            }
            Err(e) => {
                // 버퍼는 이미 제거됨: 재시도 불가, 에러만 보고
                stats.write().decode_errors += 1;
                report_error(&error_tx, &stats, e);
            }
        }
    }

    info!("UFP Receiver stopped");
    // 여기서 error_tx가 드롭되어 에러 채널이 닫힘
}

/// 에러 채널 보고 (가득 차면 버림, 루프는 절대 블로킹하지 않음)
fn report_error(error_tx: &mpsc::Sender<Error>, stats: &RwLock<ReceiverStats>, error: Error) {
    if error_tx.try_send(error).is_err() {
        stats.write().errors_dropped += 1;
    }
}
