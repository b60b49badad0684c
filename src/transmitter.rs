//! 송신자
//!
//! - 객체별 원본 reader 등록
//! - 활성 청크 집합에 대해 결정적 라운드 로빈으로 패킷 생성
//! - 청크별 심볼 인덱스는 단조 증가 (소스 심볼 다음 리페어 심볼)
//!
//! 수신 확인이 없으므로 "어떤 패킷이 도착했는지"는 전혀 모른다.
//! 충분히 많은 심볼을 흘려보내는 것이 유일한 복구 수단이다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::chunk::Chunk;
use crate::encoder::ChunkEncoder;
use crate::io::ReadAt;
use crate::object::Object;
use crate::packet::Packet;
use crate::stats::TransferStats;
use crate::{Config, Error, Result, SYMBOL_INDEX_LIMIT};

/// 활성 청크 상태
#[derive(Debug)]
struct ActiveChunk {
    encoder: ChunkEncoder,

    /// 라운드당 연속 슬롯 수
    weight: u32,
}

/// 송신자
pub struct Transmitter {
    config: Config,

    /// 객체별 원본
    readers: HashMap<Object, Box<dyn ReadAt>>,

    /// 활성 청크 (정렬 순서 = 라운드 로빈 순서)
    active: BTreeMap<Chunk, ActiveChunk>,

    /// 라운드 로빈 스케줄 (활성 청크당 한 칸)
    schedule: Vec<Chunk>,

    /// 현재 스케줄 위치
    slot: usize,

    /// 현재 청크에서 이번 라운드에 보낸 패킷 수 (가중치에 도달하면 다음 칸)
    burst: u32,

    /// 청크별 다음 심볼 인덱스 (비활성화 후에도 유지)
    ///
    /// 활성화된 적 있는 청크마다 항목 하나. `unregister_source`에서만 정리된다.
    symbol_counters: HashMap<Chunk, u32>,

    /// 인코더 병렬 생성용 풀
    pool: Option<rayon::ThreadPool>,

    stats: TransferStats,
}

impl Transmitter {
    /// 새 송신자 생성
    pub fn new(config: Config) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers())
            .build()
            .map_err(|e| warn!("인코더 풀 생성 실패, 전역 풀 사용: {}", e))
            .ok();

        Self {
            config,
            readers: HashMap::new(),
            active: BTreeMap::new(),
            schedule: Vec::new(),
            slot: 0,
            burst: 0,
            symbol_counters: HashMap::new(),
            pool,
            stats: TransferStats::new(),
        }
    }

    /// 설정
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 원본 등록
    ///
    /// 같은 `(id, size)`로 다시 등록하면 reader만 교체된다.
    pub fn register_source<R>(&mut self, id: impl Into<String>, reader: R, size: u64) -> Object
    where
        R: ReadAt + 'static,
    {
        let object = Object::new(id, size);
        debug!("원본 등록: id={}, size={}", object.id, object.size);
        self.readers.insert(object.clone(), Box::new(reader));
        object
    }

    /// 원본 등록 해제
    ///
    /// 객체의 활성 청크와 심볼 카운터를 함께 제거한다. 등록되어 있었으면 true.
    pub fn unregister_source(&mut self, object: &Object) -> bool {
        if self.readers.remove(object).is_none() {
            return false;
        }

        self.active.retain(|chunk, _| chunk.object != *object);
        self.symbol_counters.retain(|chunk, _| chunk.object != *object);
        self.rebuild_schedule();
        debug!("원본 등록 해제: id={}, size={}", object.id, object.size);
        true
    }

    /// 등록된 객체 목록
    pub fn sources(&self) -> Vec<Object> {
        let mut objects: Vec<Object> = self.readers.keys().cloned().collect();
        objects.sort();
        objects
    }

    /// 청크 활성화 (가중치 1)
    pub fn activate_chunk(&mut self, chunk: Chunk) -> Result<()> {
        self.activate_chunk_with_weight(chunk, 1)
    }

    /// 가중치를 지정해 청크 활성화
    ///
    /// 가중치 0은 비활성화와 같다. 이미 활성인 청크는 원본을 다시 읽어 인코더를 교체한다.
    /// 실패하면 상태는 바뀌지 않는다.
    pub fn activate_chunk_with_weight(&mut self, chunk: Chunk, weight: u32) -> Result<()> {
        if weight == 0 {
            self.deactivate_chunk(&chunk);
            return Ok(());
        }

        self.validate(&chunk)?;
        let data = self.read_chunk(&chunk)?;
        let encoder = chunk.build_encoder(data, self.config.window_for(&chunk));
        self.insert(chunk, encoder, weight);
        self.rebuild_schedule();
        Ok(())
    }

    /// 여러 청크를 한 번에 활성화 (인코더는 병렬 생성)
    ///
    /// 모든 청크를 먼저 검증하고 읽으므로, 하나라도 실패하면 아무것도 활성화되지 않는다.
    pub fn activate_chunks(&mut self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            self.validate(chunk)?;
        }

        let mut jobs = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let data = self.read_chunk(chunk)?;
            jobs.push((chunk.clone(), data, self.config.window_for(chunk)));
        }

        let build = move || -> Vec<(Chunk, ChunkEncoder)> {
            jobs.into_par_iter()
                .map(|(chunk, data, window)| {
                    let encoder = chunk.build_encoder(data, window);
                    (chunk, encoder)
                })
                .collect()
        };
        let encoders = match &self.pool {
            Some(pool) => pool.install(build),
            None => build(),
        };

        for (chunk, encoder) in encoders {
            self.insert(chunk, encoder, 1);
        }
        self.rebuild_schedule();
        Ok(())
    }

    /// 청크 비활성화
    ///
    /// 활성 상태였으면 true. 심볼 카운터는 남겨 두어 재활성화 시 이어서 보낸다.
    pub fn deactivate_chunk(&mut self, chunk: &Chunk) -> bool {
        let removed = self.active.remove(chunk).is_some();
        if removed {
            debug!(
                "청크 비활성화: object={}, offset={}, size={}",
                chunk.object.id, chunk.offset, chunk.size
            );
            self.rebuild_schedule();
        }
        removed
    }

    /// 활성 청크의 가중치 변경 (원본을 다시 읽지 않음)
    ///
    /// 가중치 0은 비활성화. 활성 청크가 아니면 false.
    pub fn set_weight(&mut self, chunk: &Chunk, weight: u32) -> bool {
        if weight == 0 {
            return self.deactivate_chunk(chunk);
        }
        match self.active.get_mut(chunk) {
            Some(state) => {
                state.weight = weight;
                self.rebuild_schedule();
                true
            }
            None => false,
        }
    }

    /// 활성 여부
    pub fn is_active(&self, chunk: &Chunk) -> bool {
        self.active.contains_key(chunk)
    }

    /// 활성 청크 목록 (라운드 로빈 순서)
    pub fn active_chunks(&self) -> Vec<Chunk> {
        self.active.keys().cloned().collect()
    }

    /// 다음 패킷 생성
    ///
    /// # Panics
    ///
    /// 활성 청크가 하나도 없으면 패닉 (호출자 버그).
    pub fn generate_packet(&mut self) -> Packet {
        match self.try_generate_packet() {
            Some(packet) => packet,
            None => panic!("generate_packet called with no active chunks"),
        }
    }

    /// 다음 패킷 생성 (활성 청크가 없으면 None)
    pub fn try_generate_packet(&mut self) -> Option<Packet> {
        if self.schedule.is_empty() {
            return None;
        }

        let chunk = &self.schedule[self.slot];
        let state = self.active.get_mut(chunk)?;

        let counter = self.symbol_counters.entry(chunk.clone()).or_insert(0);
        let symbol_index = *counter;
        *counter = (symbol_index + 1) % SYMBOL_INDEX_LIMIT;

        let packet = state.encoder.generate_packet(symbol_index);

        self.burst += 1;
        if self.burst >= state.weight {
            self.burst = 0;
            self.slot = (self.slot + 1) % self.schedule.len();
        }

        self.stats.packets_generated += 1;
        if packet.is_repair() {
            self.stats.repair_packets += 1;
        } else {
            self.stats.source_packets += 1;
        }

        Some(packet)
    }

    /// 통계
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    fn validate(&self, chunk: &Chunk) -> Result<()> {
        if !self.readers.contains_key(&chunk.object) {
            return Err(Error::UnknownObject {
                id: chunk.object.id.clone(),
                size: chunk.object.size,
            });
        }

        chunk.validate(self.config.max_source_symbols).map_err(|e| {
            warn!(
                "청크 활성화 거부: object={}, offset={}: {}",
                chunk.object.id, chunk.offset, e
            );
            e
        })
    }

    fn read_chunk(&self, chunk: &Chunk) -> Result<Vec<u8>> {
        let reader = self
            .readers
            .get(&chunk.object)
            .ok_or_else(|| Error::UnknownObject {
                id: chunk.object.id.clone(),
                size: chunk.object.size,
            })?;

        let mut data = vec![0u8; chunk.size as usize];
        reader.read_at(&mut data, chunk.offset)?;
        Ok(data)
    }

    fn insert(&mut self, chunk: Chunk, encoder: ChunkEncoder, weight: u32) {
        info!(
            "청크 활성화: object={}, offset={}, size={}, {} 심볼",
            chunk.object.id,
            chunk.offset,
            chunk.size,
            chunk.source_symbol_count()
        );
        self.stats.chunks_activated += 1;
        self.active.insert(chunk, ActiveChunk { encoder, weight });
    }

    fn rebuild_schedule(&mut self) {
        self.schedule = self.active.keys().cloned().collect();
        if self.slot >= self.schedule.len() {
            self.slot = 0;
            self.burst = 0;
        }
    }
}

/// 스레드 간 공유 송신자 핸들
///
/// 모든 호출이 하나의 뮤텍스 구간에서 실행된다.
#[derive(Clone)]
pub struct SharedTransmitter {
    inner: Arc<Mutex<Transmitter>>,
}

impl SharedTransmitter {
    pub fn new(transmitter: Transmitter) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transmitter)),
        }
    }

    pub fn register_source<R>(&self, id: impl Into<String>, reader: R, size: u64) -> Object
    where
        R: ReadAt + 'static,
    {
        self.inner.lock().register_source(id, reader, size)
    }

    pub fn unregister_source(&self, object: &Object) -> bool {
        self.inner.lock().unregister_source(object)
    }

    pub fn activate_chunk(&self, chunk: Chunk) -> Result<()> {
        self.inner.lock().activate_chunk(chunk)
    }

    pub fn activate_chunk_with_weight(&self, chunk: Chunk, weight: u32) -> Result<()> {
        self.inner.lock().activate_chunk_with_weight(chunk, weight)
    }

    pub fn activate_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        self.inner.lock().activate_chunks(chunks)
    }

    pub fn deactivate_chunk(&self, chunk: &Chunk) -> bool {
        self.inner.lock().deactivate_chunk(chunk)
    }

    pub fn generate_packet(&self) -> Packet {
        self.inner.lock().generate_packet()
    }

    pub fn try_generate_packet(&self) -> Option<Packet> {
        self.inner.lock().try_generate_packet()
    }

    pub fn active_chunks(&self) -> Vec<Chunk> {
        self.inner.lock().active_chunks()
    }

    pub fn stats(&self) -> TransferStats {
        self.inner.lock().stats().clone()
    }

    /// 잠금 상태로 직접 접근
    pub fn with<T>(&self, f: impl FnOnce(&mut Transmitter) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryObject;

    fn source(size: usize) -> MemoryObject {
        MemoryObject::from_vec((0..size).map(|i| (i % 251) as u8).collect())
    }

    #[test]
    fn test_round_robin_order() {
        let mut tx = Transmitter::new(Config::default());
        let b = tx.register_source("b", source(400), 400);
        let a = tx.register_source("a", source(400), 400);

        let b0 = Chunk::new(b.clone(), 0, 200, 10);
        let a200 = Chunk::new(a.clone(), 200, 200, 10);
        let a0 = Chunk::new(a.clone(), 0, 200, 10);
        tx.activate_chunk(b0.clone()).unwrap();
        tx.activate_chunk(a200.clone()).unwrap();
        tx.activate_chunk(a0.clone()).unwrap();

        let order: Vec<Chunk> = (0..6).map(|_| tx.generate_packet().chunk).collect();
        assert_eq!(
            order,
            vec![a0.clone(), a200.clone(), b0.clone(), a0, a200, b0]
        );
    }

    #[test]
    fn test_symbol_indices_increase_per_chunk() {
        let mut tx = Transmitter::new(Config::default());
        let a = tx.register_source("a", source(100), 100);
        let b = tx.register_source("b", source(100), 100);
        tx.activate_chunk(Chunk::new(a, 0, 100, 10)).unwrap();
        tx.activate_chunk(Chunk::new(b, 0, 100, 10)).unwrap();

        let ids: Vec<u32> = (0..6).map(|_| tx.generate_packet().symbol_id()).collect();
        assert_eq!(ids, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_weighted_schedule() {
        let mut tx = Transmitter::new(Config::default());
        let a = tx.register_source("a", source(100), 100);
        let b = tx.register_source("b", source(100), 100);
        let ca = Chunk::new(a, 0, 100, 10);
        let cb = Chunk::new(b, 0, 100, 10);
        tx.activate_chunk_with_weight(ca.clone(), 2).unwrap();
        tx.activate_chunk(cb.clone()).unwrap();

        let order: Vec<Chunk> = (0..6).map(|_| tx.generate_packet().chunk).collect();
        assert_eq!(
            order,
            vec![ca.clone(), ca.clone(), cb.clone(), ca.clone(), ca.clone(), cb.clone()]
        );

        assert!(tx.set_weight(&cb, 0));
        assert_eq!(tx.active_chunks(), vec![ca]);
    }

    #[test]
    fn test_huge_weight_keeps_schedule_small() {
        let mut tx = Transmitter::new(Config::default());
        let a = tx.register_source("a", source(100), 100);
        let b = tx.register_source("b", source(100), 100);
        let ca = Chunk::new(a, 0, 100, 10);
        let cb = Chunk::new(b, 0, 100, 10);
        tx.activate_chunk_with_weight(ca.clone(), u32::MAX).unwrap();
        tx.activate_chunk(cb.clone()).unwrap();
        assert_eq!(tx.schedule.len(), 2);

        let order: Vec<Chunk> = (0..5).map(|_| tx.generate_packet().chunk).collect();
        assert!(order.iter().all(|chunk| *chunk == ca));

        // 가중치를 줄이면 현재 칸을 마치고 다음 청크로 넘어간다
        assert!(tx.set_weight(&ca, 1));
        assert_eq!(tx.schedule.len(), 2);
        let order: Vec<Chunk> = (0..3).map(|_| tx.generate_packet().chunk).collect();
        assert_eq!(order, vec![ca.clone(), cb, ca]);
    }

    #[test]
    fn test_unregister_source_prunes_counters() {
        let mut tx = Transmitter::new(Config::default());
        let a = tx.register_source("a", source(100), 100);
        let b = tx.register_source("b", source(100), 100);
        let ca = Chunk::new(a.clone(), 0, 100, 10);
        let cb = Chunk::new(b.clone(), 0, 100, 10);
        tx.activate_chunk(ca.clone()).unwrap();
        tx.activate_chunk(cb.clone()).unwrap();
        for _ in 0..4 {
            tx.generate_packet();
        }
        assert!(tx.deactivate_chunk(&ca));
        assert_eq!(tx.symbol_counters.len(), 2);

        assert!(tx.unregister_source(&a));
        assert!(!tx.unregister_source(&a));
        assert_eq!(tx.symbol_counters.len(), 1);
        assert_eq!(tx.sources(), vec![b]);
        assert_eq!(tx.active_chunks(), vec![cb.clone()]);
        assert_eq!(tx.generate_packet().chunk, cb);

        assert!(matches!(
            tx.activate_chunk(ca),
            Err(Error::UnknownObject { .. })
        ));
    }

    #[test]
    fn test_ratio_invalid_rejected() {
        let mut tx = Transmitter::new(Config::default());
        let object = tx.register_source("big", source(10_000), 10_000);

        let result = tx.activate_chunk(Chunk::new(object, 0, 10_000, 1));
        assert!(matches!(result, Err(Error::ChunkRatioInvalid { .. })));
        assert!(tx.active_chunks().is_empty());
        assert!(tx.try_generate_packet().is_none());
    }

    #[test]
    fn test_unknown_and_out_of_bounds() {
        let mut tx = Transmitter::new(Config::default());
        let object = tx.register_source("a", source(100), 100);

        let unknown = Chunk::new(Object::new("ghost", 100), 0, 100, 10);
        assert!(matches!(
            tx.activate_chunk(unknown),
            Err(Error::UnknownObject { .. })
        ));

        let past_end = Chunk::new(object, 50, 100, 10);
        assert!(matches!(
            tx.activate_chunk(past_end),
            Err(Error::ChunkOutOfBounds { .. })
        ));
        assert!(tx.active_chunks().is_empty());
    }

    #[test]
    fn test_batch_activation_all_or_nothing() {
        let mut tx = Transmitter::new(Config::default());
        let object = tx.register_source("a", source(1000), 1000);

        let good = Chunk::new(object.clone(), 0, 500, 10);
        let bad = Chunk::new(object.clone(), 500, 600, 10);
        assert!(tx.activate_chunks(&[good.clone(), bad]).is_err());
        assert!(tx.active_chunks().is_empty());

        let second = Chunk::new(object, 500, 500, 10);
        tx.activate_chunks(&[second.clone(), good.clone()]).unwrap();
        assert_eq!(tx.active_chunks(), vec![good, second]);
    }

    #[test]
    fn test_reactivation_continues_symbol_indices() {
        let mut tx = Transmitter::new(Config::default());
        let object = tx.register_source("a", source(100), 100);
        let chunk = Chunk::new(object, 0, 100, 10);

        tx.activate_chunk(chunk.clone()).unwrap();
        tx.generate_packet();
        tx.generate_packet();
        assert!(tx.deactivate_chunk(&chunk));
        assert!(!tx.deactivate_chunk(&chunk));

        tx.activate_chunk(chunk).unwrap();
        assert_eq!(tx.generate_packet().symbol_id(), 2);
    }

    #[test]
    #[should_panic(expected = "no active chunks")]
    fn test_generate_without_active_chunks_panics() {
        let mut tx = Transmitter::new(Config::default());
        tx.generate_packet();
    }
}
