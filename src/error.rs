//! 에러 타입 정의

use thiserror::Error;

/// Pump 에러 타입
///
/// 수신측의 "모르는 객체", "중복 패킷" 등은 에러가 아니라 조용한 드롭이다
/// ([`crate::receiver::Reception::Dropped`] 참고).
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("등록되지 않은 객체: id={id}, size={size}")]
    UnknownObject { id: String, size: u64 },

    #[error(
        "청크/패킷 크기 비율이 너무 큼: {source_symbols} 심볼 (최대 {max}) - 더 큰 패킷이나 더 작은 청크를 사용하세요"
    )]
    ChunkRatioInvalid { source_symbols: u64, max: u64 },

    #[error("유효하지 않은 패킷 크기: {packet_size} (1 ~ 65535)")]
    InvalidPacketSize { packet_size: u64 },

    #[error("청크 범위 초과: offset={offset}, size={size}, object_size={object_size}")]
    ChunkOutOfBounds {
        offset: u64,
        size: u64,
        object_size: u64,
    },

    #[error("유효하지 않은 매직 넘버: expected {expected:08X}, got {got:08X}")]
    InvalidMagicNumber { expected: u32, got: u32 },

    #[error("유효하지 않은 프로토콜 버전: expected {expected}, got {got}")]
    InvalidVersion { expected: u8, got: u8 },

    #[error("CRC 불일치: expected {expected:08X}, got {got:08X}")]
    CrcMismatch { expected: u32, got: u32 },

    #[error("잘린 패킷: {len} bytes")]
    TruncatedPacket { len: usize },

    #[error("태스크 에러: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
