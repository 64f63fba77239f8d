//! 프래그먼트 분할과 재조립
//!
//! - split_into_fragments: 직렬화된 메시지를 MTU 단위로 분할 (송신측)
//! - ReassemblyBuffer: 한 메시지 분량의 프래그먼트 수집 (수신측)
//! - MessageCache: message_id별 ReassemblyBuffer 집합

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::message::{Fragment, FragmentId, MessageId};
use crate::MTU;

/// 데이터를 MTU 크기 프래그먼트로 분할
///
/// 빈 데이터는 빈 Vec 반환 (datagram 0개, 수신측은 이 메시지를
/// 영영 관측하지 못함)
pub fn split_into_fragments(message_id: MessageId, data: &[u8]) -> Vec<Fragment> {
    let total_fragments = ((data.len() + MTU - 1) / MTU) as u32;

    data.chunks(MTU)
        .enumerate()
        .map(|(idx, fragment_data)| {
            Fragment::new(
                message_id,
                idx as FragmentId,
                total_fragments,
                Bytes::copy_from_slice(fragment_data),
            )
        })
        .collect()
}

/// 재조립 버퍼 (메시지 하나 분량)
///
/// 첫 프래그먼트 도착 시 생성되고, 완성되면 제거됨.
/// total_fragments는 첫 프래그먼트가 말한 값으로 고정
#[derive(Debug)]
pub struct ReassemblyBuffer {
    /// 총 프래그먼트 수
    total_fragments: u32,

    /// fragment_id -> 데이터 (같은 ID는 last-write-wins)
    fragments: HashMap<FragmentId, Bytes>,

    /// 생성 시간
    created_at: Instant,
}

impl ReassemblyBuffer {
    pub fn new(total_fragments: u32) -> Self {
        Self {
            total_fragments,
            fragments: HashMap::new(),
            created_at: Instant::now(),
        }
    }

    /// 프래그먼트 삽입. 기존 슬롯을 덮어썼으면 true
    pub fn insert(&mut self, fragment: Fragment) -> bool {
        self.fragments
            .insert(fragment.fragment_id, fragment.fragment_data)
            .is_some()
    }

    /// 완료 여부: 서로 다른 fragment_id 수 == total_fragments
    pub fn is_complete(&self) -> bool {
        self.fragments.len() as u32 == self.total_fragments
    }

    /// fragment_id 순서로 연결하여 직렬화된 메시지 복원
    ///
    /// [0, total) 밖의 ID로 채워진 슬롯은 기여하지 않음
    pub fn into_data(mut self) -> Bytes {
        let mut data = BytesMut::new();
        for fragment_id in 0..self.total_fragments {
            if let Some(part) = self.fragments.remove(&fragment_id) {
                data.extend_from_slice(&part);
            }
        }
        data.freeze()
    }

    /// 수신된 프래그먼트 수
    pub fn received_count(&self) -> u32 {
        self.fragments.len() as u32
    }

    /// 생성 이후 경과 시간
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// 폴드 결과
#[derive(Debug, Default)]
pub struct Fold {
    /// 완성된 메시지의 직렬화 바이트 (완성 시에만 Some)
    pub completed: Option<Bytes>,

    /// 같은 fragment_id 슬롯을 덮어썼는지 여부
    pub replaced: bool,

    /// 이번 폴드에서 한도 초과로 밀려난 버퍼 수
    pub evicted: u64,
}

/// message_id -> ReassemblyBuffer 매핑
///
/// 기본 설정 (한도 없음)에서는 어떤 엔트리도 스스로 만료되지 않음:
/// 제거 경로는 완성뿐이고, 끝내 완성되지 못한 메시지는 메모리를
/// 계속 차지함. 한도를 켜면 fold 시점에 오래된 버퍼부터 밀려남
#[derive(Debug)]
pub struct MessageCache {
    buffers: HashMap<MessageId, ReassemblyBuffer>,

    /// 동시 보관 버퍼 한도 (0 = 무제한)
    max_entries: usize,

    /// 버퍼 최대 나이 (None = 무제한)
    max_age: Option<Duration>,
}

impl MessageCache {
    pub fn new(max_entries: usize, max_age: Option<Duration>) -> Self {
        Self {
            buffers: HashMap::new(),
            max_entries,
            max_age,
        }
    }

    /// 한도 없는 캐시
    pub fn unbounded() -> Self {
        Self::new(0, None)
    }

    /// 프래그먼트 하나를 해당 버퍼에 폴드하고 완성 여부 판정
    pub fn fold(&mut self, fragment: Fragment) -> Fold {
        let mut fold = Fold {
            evicted: self.evict_stale(),
            ..Fold::default()
        };

        let message_id = fragment.message_id;
        let total_fragments = fragment.total_fragments;

        if self.max_entries > 0
            && !self.buffers.contains_key(&message_id)
            && self.buffers.len() >= self.max_entries
        {
            fold.evicted += self.evict_oldest();
        }

        let buffer = self
            .buffers
            .entry(message_id)
            .or_insert_with(|| ReassemblyBuffer::new(total_fragments));
        fold.replaced = buffer.insert(fragment);

        if buffer.is_complete() {
            if let Some(buffer) = self.buffers.remove(&message_id) {
                fold.completed = Some(buffer.into_data());
            }
        }

        fold
    }

    /// 나이 한도를 넘은 버퍼 정리
    fn evict_stale(&mut self) -> u64 {
        let Some(max_age) = self.max_age else {
            return 0;
        };

        let before = self.buffers.len();
        self.buffers.retain(|message_id, buffer| {
            if buffer.age() > max_age {
                warn!(
                    "메시지 {} 재조립 버퍼 만료: {}/{} 수신",
                    message_id,
                    buffer.received_count(),
                    buffer.total_fragments
                );
                false
            } else {
                true
            }
        });
        (before - self.buffers.len()) as u64
    }

    /// 가장 오래된 버퍼 하나 제거
    fn evict_oldest(&mut self) -> u64 {
        let oldest = self
            .buffers
            .iter()
            .min_by_key(|(_, buffer)| buffer.created_at)
            .map(|(&message_id, _)| message_id);

        match oldest {
            Some(message_id) => {
                if let Some(buffer) = self.buffers.remove(&message_id) {
                    warn!(
                        "메시지 {} 재조립 버퍼 축출: {}/{} 수신",
                        message_id,
                        buffer.received_count(),
                        buffer.total_fragments
                    );
                }
                1
            }
            None => 0,
        }
    }

    /// 재조립 중인 메시지 수
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_split_sizes() {
        let data = payload(2500);
        let fragments = split_into_fragments(1, &data);

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].fragment_data.len(), 1024);
        assert_eq!(fragments[1].fragment_data.len(), 1024);
        assert_eq!(fragments[2].fragment_data.len(), 452);

        for (idx, fragment) in fragments.iter().enumerate() {
            assert_eq!(fragment.message_id, 1);
            assert_eq!(fragment.fragment_id, idx as u32);
            assert_eq!(fragment.total_fragments, 3);
        }

        // fragment_id 순 연결 == 원본
        let joined: Vec<u8> = fragments
            .iter()
            .flat_map(|f| f.fragment_data.to_vec())
            .collect();
        assert_eq!(joined, data);
    }

    #[test]
    fn test_split_exact_multiple() {
        let fragments = split_into_fragments(1, &payload(2048));
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[1].fragment_data.len(), 1024);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_into_fragments(1, &[]).is_empty());
    }

    #[test]
    fn test_out_of_order_assembly() {
        let data = payload(2500);
        let fragments = split_into_fragments(7, &data);

        // 도착 순서 1, 0, 2
        let mut cache = MessageCache::unbounded();
        assert!(cache.fold(fragments[1].clone()).completed.is_none());
        assert!(cache.fold(fragments[0].clone()).completed.is_none());
        let fold = cache.fold(fragments[2].clone());

        assert_eq!(fold.completed.unwrap().as_ref(), &data[..]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_any_permutation_assembles() {
        let data = payload(3000);
        let fragments = split_into_fragments(9, &data);
        assert_eq!(fragments.len(), 3);

        let orders: &[[usize; 3]] = &[
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for order in orders {
            let mut cache = MessageCache::unbounded();
            let mut completed = None;
            for &idx in order {
                completed = cache.fold(fragments[idx].clone()).completed;
            }
            assert_eq!(completed.unwrap().as_ref(), &data[..]);
        }
    }

    #[test]
    fn test_duplicate_overwrite() {
        let mut cache = MessageCache::unbounded();

        let stale = Fragment::new(5, 0, 2, Bytes::from_static(b"old!"));
        let fresh = Fragment::new(5, 0, 2, Bytes::from_static(b"new!"));
        let tail = Fragment::new(5, 1, 2, Bytes::from_static(b"tail"));

        assert!(!cache.fold(stale).replaced);
        let fold = cache.fold(fresh);
        assert!(fold.replaced);
        assert!(fold.completed.is_none());

        // 덮어쓴 쪽 데이터로 완성됨
        let fold = cache.fold(tail);
        assert_eq!(fold.completed.unwrap().as_ref(), b"new!tail");
    }

    #[test]
    fn test_no_eviction_by_default() {
        let mut cache = MessageCache::unbounded();
        for message_id in 0..100 {
            let fold = cache.fold(Fragment::new(message_id, 0, 2, Bytes::from_static(b"x")));
            assert_eq!(fold.evicted, 0);
        }
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_eviction_max_entries() {
        let mut cache = MessageCache::new(2, None);

        cache.fold(Fragment::new(1, 0, 2, Bytes::from_static(b"a")));
        std::thread::sleep(Duration::from_millis(2));
        cache.fold(Fragment::new(2, 0, 2, Bytes::from_static(b"b")));
        std::thread::sleep(Duration::from_millis(2));

        // 세 번째 메시지가 가장 오래된 1을 밀어냄
        let fold = cache.fold(Fragment::new(3, 0, 2, Bytes::from_static(b"c")));
        assert_eq!(fold.evicted, 1);
        assert_eq!(cache.len(), 2);

        // 1의 남은 프래그먼트는 새 버퍼로 시작하므로 완성되지 않음
        let fold = cache.fold(Fragment::new(1, 1, 2, Bytes::from_static(b"a2")));
        assert!(fold.completed.is_none());
    }

    #[test]
    fn test_eviction_max_age() {
        let mut cache = MessageCache::new(0, Some(Duration::from_millis(5)));

        cache.fold(Fragment::new(1, 0, 2, Bytes::from_static(b"a")));
        std::thread::sleep(Duration::from_millis(10));

        let fold = cache.fold(Fragment::new(2, 0, 2, Bytes::from_static(b"b")));
        assert_eq!(fold.evicted, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_first_total_wins() {
        // 나중 프래그먼트가 다른 total을 주장해도 첫 값 유지
        let mut cache = MessageCache::unbounded();
        cache.fold(Fragment::new(1, 0, 2, Bytes::from_static(b"a")));
        let fold = cache.fold(Fragment::new(1, 1, 99, Bytes::from_static(b"b")));
        assert_eq!(fold.completed.unwrap().as_ref(), b"ab");
    }
}
