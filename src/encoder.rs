//! 청크 인코더 (송신측)
//!
//! - 소스 심볼 (인덱스 < K): 패딩된 데이터의 슬라이스 그대로
//! - 리페어 심볼 (인덱스 >= K): RaptorQ 소스 블록 인코더에서 생성
//!
//! 리페어 심볼 생성은 비싸므로 앞쪽 윈도우 단위로 미리 만들어 캐시한다.
//! 송신자는 청크별로 인덱스를 단조 증가시키며 요청하므로 한 번의 생성이
//! 윈도우 크기만큼의 요청을 처리한다.

use std::time::Instant;

use raptorq::{EncodingPacket, PayloadId, SourceBlockEncoder};
use tracing::debug;

use crate::chunk::{symbol_range, Chunk};
use crate::packet::Packet;
use crate::SYMBOL_INDEX_LIMIT;

/// 청크 인코더 상태
pub struct ChunkEncoder {
    /// 대상 청크
    chunk: Chunk,

    /// 패딩된 원본 데이터
    padded: Vec<u8>,

    /// RaptorQ 소스 블록 인코더 (중간 심볼 계산 완료 상태)
    encoder: SourceBlockEncoder,

    /// 캐시 윈도우 크기 (심볼 수)
    window: u32,

    /// 캐시된 첫 심볼 인덱스
    cache_start: u32,

    /// 캐시된 심볼들 (`cache_start`부터 연속)
    cache: Vec<EncodingPacket>,
}

impl ChunkEncoder {
    /// 새 인코더 생성
    ///
    /// `padded` 길이는 `chunk.padded_size()`와 같아야 한다.
    pub fn new(chunk: Chunk, padded: Vec<u8>, window: u32) -> Self {
        let started = Instant::now();
        let encoder = SourceBlockEncoder::new(0, &chunk.codec(), &padded);

        debug!(
            "인코더 생성: object={}, offset={}, {} 심볼, {:.2}ms",
            chunk.object.id,
            chunk.offset,
            chunk.source_symbol_count(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        Self {
            chunk,
            padded,
            encoder,
            window: window.max(1),
            cache_start: 0,
            cache: Vec::new(),
        }
    }

    /// 대상 청크
    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    /// 현재 캐시된 심볼 인덱스 범위
    pub fn cached_range(&self) -> std::ops::Range<u32> {
        self.cache_start..self.cache_start + self.cache.len() as u32
    }

    /// 심볼 인덱스에 해당하는 패킷 생성
    ///
    /// 같은 인덱스는 언제 요청해도 같은 심볼이 된다.
    pub fn generate_packet(&mut self, symbol_index: u32) -> Packet {
        let index = symbol_index % SYMBOL_INDEX_LIMIT;
        if !self.cached_range().contains(&index) {
            self.refill(index);
        }

        let slot = (index - self.cache_start) as usize;
        Packet::new(self.chunk.clone(), self.cache[slot].clone())
    }

    /// `[start, start + window)` 심볼로 캐시 전체 교체
    fn refill(&mut self, start: u32) {
        let source_count = self.chunk.source_symbol_count() as u32;
        let range = symbol_range(start, self.window);
        let mut symbols = Vec::with_capacity(range.len());

        // 소스 구간
        let source_end = range.end.min(source_count);
        for index in range.start..source_end {
            symbols.push(self.source_symbol(index));
        }

        // 리페어 구간
        let repair_start = range.start.max(source_count);
        if repair_start < range.end {
            let repair_count = range.end - repair_start;
            symbols.extend(
                self.encoder
                    .repair_packets(repair_start - source_count, repair_count),
            );
            debug!(
                "리페어 심볼 생성: object={}, offset={}, [{}, {})",
                self.chunk.object.id, self.chunk.offset, repair_start, range.end
            );
        }

        self.cache_start = range.start;
        self.cache = symbols;
    }

    /// 소스 심볼: 패딩 데이터의 `index`번째 슬라이스
    fn source_symbol(&self, index: u32) -> EncodingPacket {
        let symbol_size = self.chunk.packet_size as usize;
        let begin = index as usize * symbol_size;
        let data = self.padded[begin..begin + symbol_size].to_vec();
        EncodingPacket::new(PayloadId::new(0, index), data)
    }
}

impl std::fmt::Debug for ChunkEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkEncoder")
            .field("chunk", &self.chunk)
            .field("window", &self.window)
            .field("cached", &self.cached_range())
            .finish()
    }
}
