//! 와이어 메시지 정의
//!
//! - GeneralMessage: 애플리케이션 페이로드 (kind + content)
//! - Fragment: datagram 하나에 실리는 조각 (위치 메타데이터 + 데이터)
//!
//! 인코딩은 prost (protobuf wire format). 태그 번호는 한 번 고정되면
//! 변경 불가, 알 수 없는 태그는 디코드 시 무시되므로 필드 추가는
//! 하위 호환.

use bytes::{Bytes, BytesMut};
use prost::Message;

use crate::{Error, Result};

/// 메시지 ID (송신 시각 밀리초의 하위 32비트)
pub type MessageId = u32;

/// 프래그먼트 ID (메시지 내 0 기반 인덱스)
pub type FragmentId = u32;

/// 애플리케이션 메시지
///
/// kind와 content 모두 기본값이면 인코딩 결과가 0바이트가 되어
/// 전송 자체가 생략됨 (sender 참고)
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GeneralMessage {
    /// 메시지 종류 (애플리케이션 정의)
    #[prost(uint32, tag = "1")]
    pub kind: u32,

    /// 불투명 페이로드
    #[prost(bytes = "bytes", tag = "2")]
    pub content: Bytes,
}

impl GeneralMessage {
    pub fn new(kind: u32, content: Bytes) -> Self {
        Self { kind, content }
    }

    /// 와이어 인코딩
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// 재조립된 바이트에서 디코딩
    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        Self::decode(bytes).map_err(Error::MessageDecode)
    }
}

/// 프래그먼트 (전송 패킷 단위)
///
/// datagram 하나당 프래그먼트 하나. 도착 순서 보장 없음
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Fragment {
    /// 메시지 ID
    #[prost(uint32, tag = "1")]
    pub message_id: u32,

    /// 메시지 내 인덱스 (0 기반)
    #[prost(uint32, tag = "2")]
    pub fragment_id: u32,

    /// 메시지의 총 프래그먼트 수
    #[prost(uint32, tag = "3")]
    pub total_fragments: u32,

    /// 페이로드 조각
    #[prost(bytes = "bytes", tag = "4")]
    pub fragment_data: Bytes,
}

impl Fragment {
    pub fn new(
        message_id: MessageId,
        fragment_id: FragmentId,
        total_fragments: u32,
        fragment_data: Bytes,
    ) -> Self {
        Self {
            message_id,
            fragment_id,
            total_fragments,
            fragment_data,
        }
    }

    /// 와이어 인코딩
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// datagram 바이트에서 디코딩
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode(bytes).map_err(Error::FragmentDecode)
    }
}
