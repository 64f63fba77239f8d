//! UFP 송신 데모 - UDP Fragment Protocol
//!
//! 파일 또는 인라인 텍스트를 프래그먼트로 분할하여 전송
//!
//! 사용법:
//!   cargo run --release --bin ufp-send -- [OPTIONS]
//!
//! 예시:
//!   # 텍스트 전송
//!   cargo run --release --bin ufp-send -- --to 127.0.0.1:9000 --text "Hello"
//!
//!   # 파일 전송
//!   cargo run --release --bin ufp-send -- -t 127.0.0.1:9000 -f data.bin --kind 2

use std::net::SocketAddr;
use std::path::PathBuf;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ufp::{send_message, GeneralMessage, MTU};

/// 송신 데모 설정
struct SendConfig {
    to_addr: SocketAddr,
    bind_addr: SocketAddr,
    file_path: Option<PathBuf>,
    text: Option<String>,
    kind: u32,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            to_addr: "127.0.0.1:9000".parse().unwrap(),
            bind_addr: "0.0.0.0:0".parse().unwrap(),
            file_path: None,
            text: None,
            kind: 1,
        }
    }
}

fn parse_args() -> SendConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SendConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--to" | "-t" => {
                if i + 1 < args.len() {
                    config.to_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    config.file_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--text" => {
                if i + 1 < args.len() {
                    config.text = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--kind" | "-k" => {
                if i + 1 < args.len() {
                    config.kind = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"UFP Send - UDP Fragment Protocol 송신 데모

파일 또는 텍스트를 MTU 단위 프래그먼트로 분할하여 전송

사용법:
  cargo run --release --bin ufp-send -- [OPTIONS]

옵션:
  -t, --to <ADDR>     목적지 주소 (기본: 127.0.0.1:9000)
  -b, --bind <ADDR>   바인드 주소 (기본: 0.0.0.0:0)
  -f, --file <PATH>   전송할 파일 경로
  --text <TEXT>       전송할 텍스트 (파일 대신)
  -k, --kind <N>      메시지 종류 (기본: 1)
  -h, --help          이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = parse_args();

    // 전송할 데이터 준비
    let content = if let Some(path) = &config.file_path {
        info!("Loading file: {:?}", path);
        Bytes::from(std::fs::read(path)?)
    } else if let Some(text) = &config.text {
        Bytes::from(text.clone().into_bytes())
    } else {
        Bytes::from_static(b"Hello, World!")
    };

    info!("Destination: {}", config.to_addr);
    info!("Content: {} bytes, kind {}", content.len(), config.kind);
    info!("MTU: {} bytes", MTU);

    let socket = UdpSocket::bind(config.bind_addr).await?;
    let message = GeneralMessage::new(config.kind, content);

    send_message(&socket, config.to_addr, &message).await?;
    info!("전송 완료");

    Ok(())
}
