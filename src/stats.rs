//! 전송 통계

use std::time::{Duration, Instant};

/// 송신/수신 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 생성한 패킷 수 (송신측)
    pub packets_generated: u64,

    /// 생성한 소스 심볼 패킷 수
    pub source_packets: u64,

    /// 생성한 리페어 심볼 패킷 수
    pub repair_packets: u64,

    /// 활성화한 청크 수
    pub chunks_activated: u64,

    /// 받은 패킷 수 (수신측, 드롭 포함)
    pub packets_received: u64,

    /// 디코더에 들어간 패킷 수
    pub packets_accepted: u64,

    /// 등록되지 않은 객체의 패킷 수
    pub unknown_packets: u64,

    /// 이미 완료된 청크의 패킷 수
    pub duplicate_packets: u64,

    /// 청크 구성/심볼 크기가 잘못된 패킷 수
    pub invalid_packets: u64,

    /// 복원 완료된 청크 수
    pub chunks_completed: u64,

    /// 완료된 객체 수
    pub objects_completed: u64,

    /// 기록한 바이트
    pub bytes_written: u64,

    /// 쓰기 실패 수
    pub write_failures: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            packets_generated: 0,
            source_packets: 0,
            repair_packets: 0,
            chunks_activated: 0,
            packets_received: 0,
            packets_accepted: 0,
            unknown_packets: 0,
            duplicate_packets: 0,
            invalid_packets: 0,
            chunks_completed: 0,
            objects_completed: 0,
            bytes_written: 0,
            write_failures: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 드롭된 패킷 수
    pub fn dropped_packets(&self) -> u64 {
        self.unknown_packets + self.duplicate_packets + self.invalid_packets
    }

    /// 기록 처리율 (bytes/sec)
    pub fn write_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_written as f64 / elapsed
    }

    /// 리페어 비율 (생성 패킷 중 리페어 심볼 비중)
    pub fn repair_ratio(&self) -> f64 {
        if self.packets_generated == 0 {
            return 0.0;
        }
        self.repair_packets as f64 / self.packets_generated as f64
    }

    /// 복원 오버헤드: 소스 심볼 수 대비 추가로 소모한 패킷 비율
    pub fn recovery_overhead(&self, source_symbols: u64) -> f64 {
        if source_symbols == 0 {
            return 0.0;
        }
        self.packets_generated as f64 / source_symbols as f64 - 1.0
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Generated: {} (repair {:.1}%) | Received: {} | Accepted: {} | Dropped: {} | Chunks: {} | Objects: {} | Written: {} bytes",
            self.elapsed().as_secs_f64(),
            self.packets_generated,
            self.repair_ratio() * 100.0,
            self.packets_received,
            self.packets_accepted,
            self.dropped_packets(),
            self.chunks_completed,
            self.objects_completed,
            self.bytes_written,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}
