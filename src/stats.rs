//! 수신 통계

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 프래그먼트 도착 기록
#[derive(Debug, Clone, Copy)]
struct FragmentArrival {
    timestamp: Instant,
    size: usize,
}

/// 수신자 통계
#[derive(Debug, Clone)]
pub struct ReceiverStats {
    /// 디코드된 프래그먼트 수
    pub fragments_received: u64,

    /// 수신 바이트 (프래그먼트 데이터 기준)
    pub bytes_received: u64,

    /// 같은 슬롯을 덮어쓴 중복 프래그먼트 수
    pub duplicate_fragments: u64,

    /// 재조립 완료 후 콜백까지 간 메시지 수
    pub messages_completed: u64,

    /// 한도 초과로 밀려난 재조립 버퍼 수
    pub messages_evicted: u64,

    /// 디코드 에러 수 (프래그먼트 + 재조립 메시지)
    pub decode_errors: u64,

    /// 소켓 수신 에러 수
    pub transport_errors: u64,

    /// 채널 포화로 버려진 에러 수
    pub errors_dropped: u64,

    /// 최근 도착 기록 (처리량 계산용)
    arrivals: VecDeque<FragmentArrival>,

    /// 윈도우 크기
    window_size: usize,

    /// 시작 시간
    pub started_at: Instant,
}

impl ReceiverStats {
    pub fn new(window_size: usize) -> Self {
        Self {
            fragments_received: 0,
            bytes_received: 0,
            duplicate_fragments: 0,
            messages_completed: 0,
            messages_evicted: 0,
            decode_errors: 0,
            transport_errors: 0,
            errors_dropped: 0,
            arrivals: VecDeque::with_capacity(window_size),
            window_size,
            started_at: Instant::now(),
        }
    }

    /// 프래그먼트 도착 기록
    pub fn record_arrival(&mut self, size: usize) {
        self.fragments_received += 1;
        self.bytes_received += size as u64;

        self.arrivals.push_back(FragmentArrival {
            timestamp: Instant::now(),
            size,
        });
        while self.arrivals.len() > self.window_size {
            self.arrivals.pop_front();
        }
    }

    /// 윈도우 기준 최근 처리량 (bytes/sec)
    pub fn recent_throughput(&self) -> f64 {
        let (Some(first), Some(last)) = (self.arrivals.front(), self.arrivals.back()) else {
            return 0.0;
        };

        let elapsed = last.timestamp.duration_since(first.timestamp).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }

        let bytes: usize = self.arrivals.iter().map(|a| a.size).sum();
        bytes as f64 / elapsed
    }

    /// 시작 이후 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
