//! 청크 디코더 (수신측)
//!
//! Fresh -> Accumulating -> Complete 상태 기계.
//! 완료된 RaptorQ 디코더에 심볼을 더 넣으면 내부 상태가 깨지므로
//! Complete 이후의 ingest는 아무것도 하지 않는다.

use raptorq::SourceBlockDecoder;

use crate::chunk::Chunk;
use crate::packet::Packet;

/// 디코더 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// 아직 심볼 없음
    Fresh,

    /// 심볼 수집 중
    Accumulating,

    /// 복원 완료
    Complete,
}

/// 청크 디코더 상태
pub struct ChunkDecoder {
    chunk: Chunk,
    decoder: SourceBlockDecoder,
    state: DecoderState,
    ingested: u64,
    /// 복원된 데이터 (패딩 제거)
    data: Option<Vec<u8>>,
}

impl ChunkDecoder {
    /// 새 디코더 생성
    pub fn new(chunk: Chunk) -> Self {
        let decoder = SourceBlockDecoder::new(0, &chunk.codec(), chunk.padded_size());
        Self {
            chunk,
            decoder,
            state: DecoderState::Fresh,
            ingested: 0,
            data: None,
        }
    }

    /// 대상 청크
    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    /// 현재 상태
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// 지금까지 넣은 심볼 수
    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    /// 패킷 심볼 추가
    ///
    /// 이번 호출로 복원이 끝났으면 true. 이미 완료된 디코더는 항상 false.
    pub fn ingest(&mut self, packet: &Packet) -> bool {
        if self.state == DecoderState::Complete {
            return false;
        }

        self.ingested += 1;
        self.state = DecoderState::Accumulating;

        match self.decoder.decode(std::iter::once(packet.symbol.clone())) {
            Some(mut padded) => {
                padded.truncate(self.chunk.size as usize);
                self.data = Some(padded);
                self.state = DecoderState::Complete;
                true
            }
            None => false,
        }
    }

    /// 복원된 청크 데이터 (완료 후에만 Some)
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// 복원된 청크 데이터 소유권 반환
    pub fn into_data(self) -> Option<Vec<u8>> {
        self.data
    }
}

impl std::fmt::Debug for ChunkDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkDecoder")
            .field("chunk", &self.chunk)
            .field("state", &self.state)
            .field("ingested", &self.ingested)
            .finish()
    }
}
