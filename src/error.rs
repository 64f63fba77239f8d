//! 에러 타입 정의

use thiserror::Error;

/// UFP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("전송 에러: {0}")]
    Transport(#[from] std::io::Error),

    #[error("프래그먼트 디코드 에러: {0}")]
    FragmentDecode(prost::DecodeError),

    #[error("메시지 디코드 에러: {0}")]
    MessageDecode(prost::DecodeError),

    #[error("인코드 에러: {0}")]
    Encode(#[from] prost::EncodeError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
