//! 패킷 정의
//!
//! 패킷 = 청크 식별 정보 + 인코딩된 심볼 하나.
//! 손실 채널을 오가는 단위이며, 전송 계층은 이 크레이트 밖의 일이다.
//! 필요하면 `to_bytes`/`from_bytes`로 바이트 프레임을 만들 수 있다.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use raptorq::EncodingPacket;
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::object::Object;
use crate::{Error, Result, MAGIC_NUMBER, PROTOCOL_VERSION};

/// 패킷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// 소속 청크
    pub chunk: Chunk,

    /// 인코딩된 심볼 (심볼 ID + 페이로드)
    pub symbol: EncodingPacket,
}

/// 프레임 헤더
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PacketHeader {
    magic: u32,
    version: u8,
    object_id: String,
    object_size: u64,
    offset: u64,
    size: u64,
    packet_size: u64,
    /// 직렬화된 심볼의 CRC32
    crc32: u32,
}

impl Packet {
    /// 새 패킷 생성
    pub fn new(chunk: Chunk, symbol: EncodingPacket) -> Self {
        Self { chunk, symbol }
    }

    /// 심볼 ID
    pub fn symbol_id(&self) -> u32 {
        self.symbol.payload_id().encoding_symbol_id()
    }

    /// 리페어 심볼 여부
    pub fn is_repair(&self) -> bool {
        u64::from(self.symbol_id()) >= self.chunk.source_symbol_count()
    }

    /// 바이트 프레임으로 직렬화
    ///
    /// `[헤더 길이 u16 LE][bincode 헤더][RaptorQ 심볼]`
    pub fn to_bytes(&self) -> Result<Bytes> {
        let symbol = self.symbol.serialize();
        let header = PacketHeader {
            magic: MAGIC_NUMBER,
            version: PROTOCOL_VERSION,
            object_id: self.chunk.object.id.clone(),
            object_size: self.chunk.object.size,
            offset: self.chunk.offset,
            size: self.chunk.size,
            packet_size: self.chunk.packet_size,
            crc32: crc32fast::hash(&symbol),
        };
        let header_bytes = bincode::serialize(&header)?;

        let mut buf = BytesMut::with_capacity(2 + header_bytes.len() + symbol.len());
        buf.put_u16_le(header_bytes.len() as u16);
        buf.put_slice(&header_bytes);
        buf.put_slice(&symbol);
        Ok(buf.freeze())
    }

    /// 바이트 프레임에서 역직렬화
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        let total = bytes.len();
        if bytes.remaining() < 2 {
            return Err(Error::TruncatedPacket { len: total });
        }

        let header_len = bytes.get_u16_le() as usize;
        if bytes.remaining() < header_len {
            return Err(Error::TruncatedPacket { len: total });
        }

        let header: PacketHeader = bincode::deserialize(&bytes[..header_len])?;
        bytes.advance(header_len);

        if header.magic != MAGIC_NUMBER {
            return Err(Error::InvalidMagicNumber {
                expected: MAGIC_NUMBER,
                got: header.magic,
            });
        }
        if header.version != PROTOCOL_VERSION {
            return Err(Error::InvalidVersion {
                expected: PROTOCOL_VERSION,
                got: header.version,
            });
        }

        // PayloadId 4바이트
        if bytes.remaining() < 4 {
            return Err(Error::TruncatedPacket { len: total });
        }
        let crc = crc32fast::hash(bytes);
        if crc != header.crc32 {
            return Err(Error::CrcMismatch {
                expected: header.crc32,
                got: crc,
            });
        }

        let chunk = Chunk::new(
            Object::new(header.object_id, header.object_size),
            header.offset,
            header.size,
            header.packet_size,
        );
        Ok(Self::new(chunk, EncodingPacket::deserialize(bytes)))
    }
}
