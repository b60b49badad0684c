//! # Pump
//!
//! 손실/무순서/무응답 채널을 위한 레이트리스(RaptorQ) 청크 전송
//!
//! ## 핵심 특징
//! - **레이트리스**: 송신자는 무엇이 도착했는지 모른 채 심볼을 계속 생성
//! - **청크 단위 복원**: 객체를 청크로 나누고, 청크마다 "충분한" 심볼이 모이면 즉시 복원
//! - **순서 무관**: 어떤 심볼이든, 어떤 순서든 개수만 채우면 된다
//! - **1:N 전송**: ACK/재전송이 없으므로 브로드캐스트/멀티캐스트에 적합
//! - **겹치는 청크 허용**: 객체 완료는 구간 병합으로 판정
//!
//! 실제 네트워크 전송은 이 크레이트 밖의 일이다. 패킷을 넘겨주고 받을 뿐.

pub mod chunk;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod io;
pub mod object;
pub mod packet;
pub mod pump;
pub mod receiver;
pub mod stats;
pub mod transmitter;

pub use chunk::Chunk;
pub use config::Config;
pub use decoder::{ChunkDecoder, DecoderState};
pub use encoder::ChunkEncoder;
pub use error::{Error, Result};
pub use io::{MemoryObject, ReadAt, WriteAt};
pub use object::Object;
pub use packet::Packet;
pub use pump::{LossyChannel, PumpReport};
pub use receiver::{DropReason, Reception, Receiver, SharedReceiver};
pub use stats::TransferStats;
pub use transmitter::{SharedTransmitter, Transmitter};

/// 프로토콜 버전 (패킷 프레임)
pub const PROTOCOL_VERSION: u8 = 1;

/// 매직 넘버 (패킷 식별용)
pub const MAGIC_NUMBER: u32 = 0x50554D50; // "PUMP"

/// 청크당 최대 소스 심볼 수
pub const MAX_SOURCE_SYMBOLS: u64 = 8100;

/// 기본 패킷(심볼) 크기 (바이트)
pub const DEFAULT_PACKET_SIZE: u64 = 1200;

/// 기본 청크 크기 (바이트)
pub const DEFAULT_CHUNK_SIZE: u64 = DEFAULT_PACKET_SIZE * 4096; // 약 4.9MB

/// 청크별 심볼 인덱스 공간 (RaptorQ ESI 24비트 안쪽)
pub const SYMBOL_INDEX_LIMIT: u32 = 1 << 23;
