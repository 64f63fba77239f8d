//! UFP 수신 데모 - UDP Fragment Protocol
//!
//! 바인딩 후 재조립된 메시지를 출력, Ctrl-C로 종료
//!
//! 사용법:
//!   cargo run --release --bin ufp-recv -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin ufp-recv -- --bind 0.0.0.0:9000
//!
//!   # 미완성 버퍼 한도 지정 (유실 대비)
//!   cargo run --release --bin ufp-recv -- -b 0.0.0.0:9000 --max-pending 64 --max-age-ms 30000

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ufp::{Config, Receiver};

/// 수신 데모 설정
struct RecvConfig {
    bind_addr: SocketAddr,
    config: Config,
}

impl Default for RecvConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().unwrap(),
            config: Config::default(),
        }
    }
}

fn parse_args() -> RecvConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RecvConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--max-pending" => {
                if i + 1 < args.len() {
                    config.config.max_pending_messages =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--max-age-ms" => {
                if i + 1 < args.len() {
                    config.config.pending_max_age_ms =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"UFP Recv - UDP Fragment Protocol 수신 데모

바인딩 후 재조립된 메시지를 출력, Ctrl-C로 종료

사용법:
  cargo run --release --bin ufp-recv -- [OPTIONS]

옵션:
  -b, --bind <ADDR>    바인드 주소 (기본: 0.0.0.0:9000)
  --max-pending <N>    미완성 버퍼 수 한도 (기본: 0 = 무제한)
  --max-age-ms <MS>    미완성 버퍼 나이 한도 밀리초 (기본: 0 = 무제한)
  -h, --help           이 도움말 출력
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
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let recv_config = parse_args();

    let socket = Arc::new(UdpSocket::bind(recv_config.bind_addr).await?);
    info!("Listening on {}", recv_config.bind_addr);

    let (receiver, mut error_rx) = Receiver::start(recv_config.config, socket, |message| {
        match std::str::from_utf8(&message.content) {
            Ok(text) if text.len() <= 256 => {
                info!("메시지 수신: kind={}, \"{}\"", message.kind, text);
            }
            _ => {
                info!(
                    "메시지 수신: kind={}, {} bytes",
                    message.kind,
                    message.content.len()
                );
            }
        }
    });

    // 에러 스트림 출력 태스크
    let error_task = tokio::spawn(async move {
        while let Some(error) = error_rx.recv().await {
            warn!("수신 루프 에러: {}", error);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("종료 요청, 수신 루프 정지 중...");
    receiver.stop();
    let _ = error_task.await;

    let stats = receiver.stats();
    info!(
        "수신 {} 프래그먼트 / {} bytes, 완성 {} 메시지, 미완성 {} 버퍼",
        stats.fragments_received,
        stats.bytes_received,
        stats.messages_completed,
        receiver.pending_messages()
    );
    if stats.decode_errors + stats.transport_errors > 0 {
        warn!(
            "에러: decode {}, transport {}, dropped {}",
            stats.decode_errors, stats.transport_errors, stats.errors_dropped
        );
    }

    Ok(())
}
