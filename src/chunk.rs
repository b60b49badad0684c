//! 청크 정의
//!
//! - Chunk: 객체의 연속된 바이트 범위 + 패킷(심볼) 크기
//! - 청크마다 독립된 RaptorQ 소스 블록 하나로 인코딩/디코딩
//!
//! 청크 크기가 패킷 크기의 배수가 아니면 0으로 패딩한 뒤 인코딩한다.

use std::ops::Range;

use raptorq::ObjectTransmissionInformation;
use serde::{Deserialize, Serialize};

use crate::decoder::ChunkDecoder;
use crate::encoder::ChunkEncoder;
use crate::object::Object;
use crate::{Error, Result, MAX_SOURCE_SYMBOLS, SYMBOL_INDEX_LIMIT};

/// RaptorQ 디코딩이 보통 성공하는 소스 심볼 수 대비 여유분
pub const DECODE_OVERHEAD_SYMBOLS: u64 = 5;

/// 청크 (독립 인코딩/디코딩 단위)
///
/// 필드 전체가 식별자. 필드 순서가 곧 정렬 순서이므로
/// 송신측 라운드 로빈은 (객체 ID, 오프셋) 순으로 돈다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Chunk {
    /// 소속 객체
    pub object: Object,

    /// 객체 내 오프셋 (바이트)
    pub offset: u64,

    /// 청크 크기 (바이트)
    pub size: u64,

    /// 패킷(심볼) 크기 (바이트)
    pub packet_size: u64,
}

impl Chunk {
    /// 새 청크 생성
    pub fn new(object: Object, offset: u64, size: u64, packet_size: u64) -> Self {
        Self {
            object,
            offset,
            size,
            packet_size,
        }
    }

    /// 청크 끝 오프셋 (exclusive)
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// 패딩 포함 크기: 패킷 크기의 배수로 올림
    pub fn padded_size(&self) -> u64 {
        self.packet_size * self.size.div_ceil(self.packet_size)
    }

    /// 소스 심볼 수 (K)
    pub fn source_symbol_count(&self) -> u64 {
        self.padded_size() / self.packet_size
    }

    /// 손실 없는 채널에서 디코딩에 넉넉한 심볼 수
    pub fn reasonable_symbol_count(&self) -> u64 {
        self.source_symbol_count() + DECODE_OVERHEAD_SYMBOLS
    }

    /// 기본 상한 기준 유효성
    pub fn is_valid(&self) -> bool {
        self.validate(MAX_SOURCE_SYMBOLS).is_ok()
    }

    /// 청크 구성 검증
    ///
    /// 패킷 크기는 RaptorQ 심볼 크기(u16)에 들어가야 하고,
    /// 범위는 비어있지 않으며 객체 안에 있어야 하고,
    /// 소스 심볼 수는 `max_source_symbols` 이하여야 한다.
    pub fn validate(&self, max_source_symbols: u64) -> Result<()> {
        if self.packet_size == 0 || self.packet_size > u64::from(u16::MAX) {
            return Err(Error::InvalidPacketSize {
                packet_size: self.packet_size,
            });
        }

        let in_bounds = self
            .offset
            .checked_add(self.size)
            .is_some_and(|end| end <= self.object.size);
        if self.size == 0 || !in_bounds {
            return Err(Error::ChunkOutOfBounds {
                offset: self.offset,
                size: self.size,
                object_size: self.object.size,
            });
        }

        let source_symbols = self.source_symbol_count();
        if source_symbols > max_source_symbols {
            return Err(Error::ChunkRatioInvalid {
                source_symbols,
                max: max_source_symbols,
            });
        }

        Ok(())
    }

    /// 심볼 크기 (검증된 청크 전제)
    pub fn symbol_size(&self) -> u16 {
        self.packet_size as u16
    }

    /// 청크 전용 RaptorQ 파라미터
    ///
    /// 청크 하나 = 소스 블록 하나, 서브블록 1, 정렬 1 (임의 패킷 크기 허용)
    pub fn codec(&self) -> ObjectTransmissionInformation {
        ObjectTransmissionInformation::new(self.padded_size(), self.symbol_size(), 1, 1, 1)
    }

    /// 인코더 생성
    ///
    /// `data`는 청크 원본 바이트(`size` 길이). 뒤쪽을 0으로 패딩한다.
    pub fn build_encoder(&self, mut data: Vec<u8>, window: u32) -> ChunkEncoder {
        data.resize(self.padded_size() as usize, 0);
        ChunkEncoder::new(self.clone(), data, window)
    }

    /// 디코더 생성
    pub fn build_decoder(&self) -> ChunkDecoder {
        ChunkDecoder::new(self.clone())
    }
}

/// `[start, start + count)` 심볼 인덱스 범위
///
/// 인덱스 공간 한계에서 잘린다.
pub fn symbol_range(start: u32, count: u32) -> Range<u32> {
    let end = start.saturating_add(count).min(SYMBOL_INDEX_LIMIT);
    start.min(end)..end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(size: u64) -> Object {
        Object::new("o1", size)
    }

    #[test]
    fn test_padding_and_symbol_count() {
        let chunk = Chunk::new(object(12345), 0, 12345, 89);
        assert_eq!(chunk.padded_size(), 89 * 139);
        assert_eq!(chunk.source_symbol_count(), 139);
        assert_eq!(chunk.reasonable_symbol_count(), 144);

        let even = Chunk::new(object(10000), 0, 5000, 100);
        assert_eq!(even.padded_size(), 5000);
        assert_eq!(even.source_symbol_count(), 50);
    }

    #[test]
    fn test_validity_bound() {
        let at_limit = Chunk::new(object(8100), 0, 8100, 1);
        assert!(at_limit.is_valid());

        let over = Chunk::new(object(8101), 0, 8101, 1);
        assert!(!over.is_valid());
        assert!(matches!(
            over.validate(MAX_SOURCE_SYMBOLS),
            Err(Error::ChunkRatioInvalid {
                source_symbols: 8101,
                max: 8100
            })
        ));
    }

    #[test]
    fn test_invalid_geometry() {
        let zero_packet = Chunk::new(object(100), 0, 100, 0);
        assert!(matches!(
            zero_packet.validate(MAX_SOURCE_SYMBOLS),
            Err(Error::InvalidPacketSize { .. })
        ));

        let huge_packet = Chunk::new(object(100), 0, 100, 70_000);
        assert!(matches!(
            huge_packet.validate(MAX_SOURCE_SYMBOLS),
            Err(Error::InvalidPacketSize { .. })
        ));

        let past_end = Chunk::new(object(100), 50, 51, 10);
        assert!(matches!(
            past_end.validate(MAX_SOURCE_SYMBOLS),
            Err(Error::ChunkOutOfBounds { .. })
        ));

        let empty = Chunk::new(object(100), 0, 0, 10);
        assert!(!empty.is_valid());

        let overflow = Chunk::new(object(100), u64::MAX, 2, 10);
        assert!(!overflow.is_valid());
    }

    #[test]
    fn test_ordering_by_object_then_offset() {
        let a = Chunk::new(Object::new("a", 100), 50, 50, 10);
        let b0 = Chunk::new(Object::new("b", 100), 0, 50, 10);
        let a0 = Chunk::new(Object::new("a", 100), 0, 50, 10);

        let mut chunks = vec![b0.clone(), a.clone(), a0.clone()];
        chunks.sort();
        assert_eq!(chunks, vec![a0, a, b0]);
    }

    #[test]
    fn test_symbol_range_clamped() {
        assert_eq!(symbol_range(10, 5), 10..15);
        assert_eq!(
            symbol_range(SYMBOL_INDEX_LIMIT - 2, 5),
            SYMBOL_INDEX_LIMIT - 2..SYMBOL_INDEX_LIMIT
        );
    }
}
