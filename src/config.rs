//! 전송 설정

use crate::chunk::Chunk;
use crate::object::Object;
use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_PACKET_SIZE, MAX_SOURCE_SYMBOLS};

/// Pump 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 청크당 최대 소스 심볼 수
    /// 이보다 크면 RaptorQ 인코더 생성 비용이 급격히 늘어남
    pub max_source_symbols: u64,

    /// 리페어 심볼 캐시 윈도우 (심볼 수)
    /// None이면 청크의 소스 심볼 수만큼 (소스 블록 하나 분량)
    pub repair_window: Option<u32>,

    /// 기본 패킷(심볼) 크기 (바이트)
    pub packet_size: u64,

    /// 객체 분할 시 기본 청크 크기 (바이트)
    pub chunk_size: u64,

    /// 펌프 내부 채널 용량 (패킷 수)
    pub channel_capacity: usize,

    /// 인코더 병렬 생성 워커 수 (0이면 CPU 코어 수 사용)
    pub parallel_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_source_symbols: MAX_SOURCE_SYMBOLS,
            repair_window: None,
            packet_size: DEFAULT_PACKET_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            channel_capacity: 1024,
            parallel_workers: 0,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 저메모리 기기용 설정
    pub fn low_memory() -> Self {
        Self {
            max_source_symbols: 2048,
            repair_window: Some(64),
            packet_size: 1024,
            chunk_size: 1024 * 1024, // 1MB
            channel_capacity: 128,
            parallel_workers: 1,
        }
    }

    /// 고처리량 설정
    pub fn high_throughput() -> Self {
        Self {
            max_source_symbols: MAX_SOURCE_SYMBOLS,
            repair_window: None,
            packet_size: 1400,
            chunk_size: 1400 * 8000, // 약 11MB, 8000 심볼
            channel_capacity: 8192,
            parallel_workers: 0,
        }
    }

    /// 청크의 리페어 캐시 윈도우 크기
    pub fn window_for(&self, chunk: &Chunk) -> u32 {
        let window = self
            .repair_window
            .unwrap_or(chunk.source_symbol_count() as u32);
        window.max(1)
    }

    /// 객체를 기본 청크 크기로 분할
    ///
    /// 마지막 청크는 남은 바이트만큼 작아진다. 빈 객체는 청크가 없다.
    pub fn chunks_for(&self, object: &Object) -> Vec<Chunk> {
        let step = self.chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut offset = 0;

        while offset < object.size {
            let size = step.min(object.size - offset);
            chunks.push(Chunk::new(object.clone(), offset, size, self.packet_size));
            offset += size;
        }

        chunks
    }

    /// 병렬 워커 수 (0이면 CPU 코어 수)
    pub fn workers(&self) -> usize {
        if self.parallel_workers > 0 {
            self.parallel_workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}
