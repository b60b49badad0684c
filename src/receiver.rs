//! 수신자
//!
//! - 객체별 대상 writer 등록
//! - 패킷을 청크별 디코더로 분배
//! - 복원된 청크를 오프셋 위치에 기록
//! - 모든 등록 객체가 완료되면 idle
//!
//! 브로드캐스트 채널에서는 모르는 객체나 중복 패킷이 흔하므로
//! 에러가 아니라 조용히 드롭한다.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::chunk::Chunk;
use crate::decoder::ChunkDecoder;
use crate::io::WriteAt;
use crate::object::Object;
use crate::packet::Packet;
use crate::stats::TransferStats;
use crate::{Config, Result};

/// 패킷 드롭 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 등록되지 않은 객체
    UnknownObject,

    /// 이미 복원이 끝난 청크
    AlreadyFinished,

    /// 객체 범위를 벗어나거나 잘못된 청크 구성
    InvalidChunk,

    /// 심볼 길이가 패킷 크기와 다름
    SymbolSizeMismatch,

    /// 소스 블록 번호가 0이 아님 (청크는 단일 소스 블록)
    ForeignSourceBlock,
}

/// 패킷 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reception {
    /// 디코더에 추가됨 (아직 미완료)
    Accepted,

    /// 이 패킷으로 청크 복원 완료
    ChunkCompleted(Chunk),

    /// 이 패킷으로 객체 전체 완료
    ObjectCompleted(Object),

    /// 드롭됨
    Dropped(DropReason),
}

/// 수신자
pub struct Receiver {
    config: Config,

    /// 객체별 대상
    writers: HashMap<Object, Box<dyn WriteAt>>,

    /// 진행 중인 디코더 (완료 즉시 제거)
    decoders: HashMap<Chunk, ChunkDecoder>,

    /// 복원 완료된 청크
    finished: BTreeSet<Chunk>,

    stats: TransferStats,
}

impl Receiver {
    /// 새 수신자 생성
    pub fn new(config: Config) -> Self {
        Self {
            config,
            writers: HashMap::new(),
            decoders: HashMap::new(),
            finished: BTreeSet::new(),
            stats: TransferStats::new(),
        }
    }

    /// 수신 대상 등록
    ///
    /// 같은 객체로 다시 호출하면 writer만 교체되고 진행 상태는 유지된다.
    pub fn prepare_for_reception<W>(&mut self, object: Object, writer: W)
    where
        W: WriteAt + 'static,
    {
        debug!("수신 대상 등록: id={}, size={}", object.id, object.size);
        self.writers.insert(object, Box::new(writer));
    }

    /// 등록된 객체 목록
    pub fn objects(&self) -> Vec<Object> {
        let mut objects: Vec<Object> = self.writers.keys().cloned().collect();
        objects.sort();
        objects
    }

    /// 패킷 처리
    ///
    /// 에러는 writer 쓰기 실패뿐이다. 이 경우 해당 청크는 완료로 기록되지 않고,
    /// 이후 패킷이 새 디코더로 다시 복원을 시도한다.
    pub fn receive(&mut self, packet: Packet) -> Result<Reception> {
        self.stats.packets_received += 1;
        let chunk = &packet.chunk;

        if !self.writers.contains_key(&chunk.object) {
            self.stats.unknown_packets += 1;
            return Ok(Reception::Dropped(DropReason::UnknownObject));
        }

        if self.finished.contains(chunk) {
            self.stats.duplicate_packets += 1;
            return Ok(Reception::Dropped(DropReason::AlreadyFinished));
        }

        if let Some(reason) = self.check_packet(&packet) {
            self.stats.invalid_packets += 1;
            debug!(
                "패킷 드롭: object={}, offset={}, {:?}",
                chunk.object.id, chunk.offset, reason
            );
            return Ok(Reception::Dropped(reason));
        }

        self.stats.packets_accepted += 1;
        let finished = self
            .decoders
            .entry(chunk.clone())
            .or_insert_with(|| chunk.build_decoder())
            .ingest(&packet);
        if !finished {
            return Ok(Reception::Accepted);
        }

        // 완료된 디코더는 즉시 제거 (더 넣으면 깨짐)
        let decoder = self.decoders.remove(chunk);
        let data = decoder.and_then(ChunkDecoder::into_data).unwrap_or_default();
        self.write_chunk(chunk, &data)?;
        self.finished.insert(chunk.clone());
        self.stats.chunks_completed += 1;

        debug!(
            "청크 복원 완료: object={}, offset={}, size={}",
            chunk.object.id, chunk.offset, chunk.size
        );

        if self.is_object_complete(&chunk.object) {
            self.stats.objects_completed += 1;
            info!(
                "객체 수신 완료: id={}, size={}, {} 청크",
                chunk.object.id,
                chunk.object.size,
                self.finished_chunks(&chunk.object).len()
            );
            return Ok(Reception::ObjectCompleted(chunk.object.clone()));
        }

        Ok(Reception::ChunkCompleted(packet.chunk))
    }

    /// 모든 등록 객체가 완료되었는지
    pub fn idle(&self) -> bool {
        self.writers
            .keys()
            .all(|object| self.is_object_complete(object))
    }

    /// 객체 완료 여부
    pub fn is_object_complete(&self, object: &Object) -> bool {
        object.is_completed_by(&self.finished)
    }

    /// 객체의 완료된 청크 목록 (오프셋 순)
    pub fn finished_chunks(&self, object: &Object) -> Vec<Chunk> {
        self.finished
            .iter()
            .filter(|chunk| chunk.object == *object)
            .cloned()
            .collect()
    }

    /// 디코딩 진행 중인 청크 목록
    pub fn pending_chunks(&self) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self.decoders.keys().cloned().collect();
        chunks.sort();
        chunks
    }

    /// 통계
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    fn check_packet(&self, packet: &Packet) -> Option<DropReason> {
        if packet.chunk.validate(self.config.max_source_symbols).is_err() {
            return Some(DropReason::InvalidChunk);
        }
        if packet.symbol.data().len() as u64 != packet.chunk.packet_size {
            return Some(DropReason::SymbolSizeMismatch);
        }
        // 디코더는 다른 블록 번호를 받으면 assert로 죽는다
        if packet.symbol.payload_id().source_block_number() != 0 {
            return Some(DropReason::ForeignSourceBlock);
        }
        None
    }

    fn write_chunk(&mut self, chunk: &Chunk, data: &[u8]) -> Result<()> {
        let Some(writer) = self.writers.get_mut(&chunk.object) else {
            return Ok(());
        };

        if let Err(e) = writer.write_at(data, chunk.offset) {
            self.stats.write_failures += 1;
            warn!(
                "청크 기록 실패: object={}, offset={}: {}",
                chunk.object.id, chunk.offset, e
            );
            return Err(e.into());
        }

        self.stats.bytes_written += data.len() as u64;
        Ok(())
    }
}

/// 스레드 간 공유 수신자 핸들
///
/// `receive`의 확인-후-기록 과정 전체가 하나의 뮤텍스 구간이다.
#[derive(Clone)]
pub struct SharedReceiver {
    inner: Arc<Mutex<Receiver>>,
}

impl SharedReceiver {
    pub fn new(receiver: Receiver) -> Self {
        Self {
            inner: Arc::new(Mutex::new(receiver)),
        }
    }

    pub fn prepare_for_reception<W>(&self, object: Object, writer: W)
    where
        W: WriteAt + 'static,
    {
        self.inner.lock().prepare_for_reception(object, writer)
    }

    pub fn receive(&self, packet: Packet) -> Result<Reception> {
        self.inner.lock().receive(packet)
    }

    pub fn idle(&self) -> bool {
        self.inner.lock().idle()
    }

    pub fn is_object_complete(&self, object: &Object) -> bool {
        self.inner.lock().is_object_complete(object)
    }

    pub fn stats(&self) -> TransferStats {
        self.inner.lock().stats().clone()
    }

    /// 잠금 상태로 직접 접근
    pub fn with<T>(&self, f: impl FnOnce(&mut Receiver) -> T) -> T {
        f(&mut self.inner.lock())
    }
}
