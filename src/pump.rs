//! 프로세스 내 전송 펌프
//!
//! 송신자와 수신자를 손실 채널로 연결해 돌린다. 실제 네트워크 없이
//! 생산자(패킷 생성)와 소비자(패킷 수신) 태스크가 동시에 동작한다.
//!
//! ```text
//! [생산 태스크] --generate--> LossyChannel --mpsc--> [소비 태스크] --receive-->
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::packet::Packet;
use crate::receiver::SharedReceiver;
use crate::transmitter::SharedTransmitter;
use crate::{Config, Error, Result};

/// 패킷 단위 독립 손실 채널
///
/// 난수 시드를 명시하므로 같은 시드는 같은 손실 패턴을 만든다.
#[derive(Debug, Clone)]
pub struct LossyChannel {
    loss_rate: f64,
    rng: StdRng,
}

impl LossyChannel {
    /// 손실률 `loss_rate` (0.0 ~ 1.0 미만)
    pub fn new(loss_rate: f64, seed: u64) -> Self {
        Self {
            loss_rate: loss_rate.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 손실 없는 채널
    pub fn lossless() -> Self {
        Self::new(0.0, 0)
    }

    /// 손실률
    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }

    /// 이번 패킷이 전달되는지
    pub fn delivers(&mut self) -> bool {
        self.loss_rate <= 0.0 || self.rng.gen::<f64>() >= self.loss_rate
    }
}

/// 펌프 실행 결과
#[derive(Debug, Clone)]
pub struct PumpReport {
    /// 생성된 패킷 수
    pub packets_sent: u64,

    /// 채널에서 손실된 패킷 수
    pub packets_lost: u64,

    /// 수신자에 전달된 패킷 수
    pub packets_delivered: u64,

    /// 종료 시 수신자가 idle이었는지
    pub completed: bool,

    /// 소요 시간
    pub elapsed: Duration,
}

impl PumpReport {
    /// 결과 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Completed: {} | Sent: {} | Lost: {} | Delivered: {} | Elapsed: {:.2}s",
            self.completed,
            self.packets_sent,
            self.packets_lost,
            self.packets_delivered,
            self.elapsed.as_secs_f64(),
        )
    }
}

/// 수신자가 idle이 되거나 `max_packets`를 모두 보낼 때까지 펌프 실행
pub async fn run(
    tx: SharedTransmitter,
    rx: SharedReceiver,
    mut channel: LossyChannel,
    config: &Config,
    max_packets: u64,
) -> Result<PumpReport> {
    let started = Instant::now();
    let done = Arc::new(AtomicBool::new(rx.idle()));
    let lost = Arc::new(AtomicU64::new(0));
    let (packet_tx, mut packet_rx) = mpsc::channel::<Packet>(config.channel_capacity.max(1));

    info!(
        "펌프 시작: loss={:.1}%, max_packets={}",
        channel.loss_rate() * 100.0,
        max_packets
    );

    // 생산 태스크
    let done_producer = done.clone();
    let lost_producer = lost.clone();
    let producer = tokio::spawn(async move {
        let mut sent = 0u64;
        while sent < max_packets && !done_producer.load(Ordering::SeqCst) {
            let Some(packet) = tx.try_generate_packet() else {
                debug!("활성 청크 없음, 생산 종료");
                break;
            };
            sent += 1;

            if !channel.delivers() {
                lost_producer.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if packet_tx.send(packet).await.is_err() {
                // 소비 태스크 종료
                break;
            }
        }
        sent
    });

    // 소비 태스크
    let done_consumer = done.clone();
    let consumer = tokio::spawn(async move {
        let mut delivered = 0u64;
        if done_consumer.load(Ordering::SeqCst) {
            return Ok::<u64, Error>(delivered);
        }
        while let Some(packet) = packet_rx.recv().await {
            delivered += 1;
            rx.receive(packet)?;
            if rx.idle() {
                done_consumer.store(true, Ordering::SeqCst);
                break;
            }
        }
        Ok(delivered)
    });

    let delivered = consumer.await??;
    let sent = producer.await?;

    let report = PumpReport {
        packets_sent: sent,
        packets_lost: lost.load(Ordering::Relaxed),
        packets_delivered: delivered,
        completed: done.load(Ordering::SeqCst),
        elapsed: started.elapsed(),
    };
    info!("펌프 종료: {}", report.summary());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::io::MemoryObject;
    use crate::receiver::Receiver;
    use crate::transmitter::Transmitter;

    fn setup(
        size: usize,
        packet_size: u64,
    ) -> (SharedTransmitter, SharedReceiver, MemoryObject, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(7);
        let data: Vec<u8> = (0..size).map(|_| rng.gen()).collect();

        let tx = SharedTransmitter::new(Transmitter::new(Config::default()));
        let object = tx.register_source("o1", MemoryObject::from_vec(data.clone()), size as u64);
        tx.activate_chunk(Chunk::new(object.clone(), 0, size as u64, packet_size))
            .unwrap();

        let sink = MemoryObject::new(size);
        let rx = SharedReceiver::new(Receiver::new(Config::default()));
        rx.prepare_for_reception(object, sink.clone());
        (tx, rx, sink, data)
    }

    #[test]
    fn test_lossy_channel_is_deterministic() {
        let mut a = LossyChannel::new(0.5, 42);
        let mut b = LossyChannel::new(0.5, 42);
        let pattern_a: Vec<bool> = (0..100).map(|_| a.delivers()).collect();
        let pattern_b: Vec<bool> = (0..100).map(|_| b.delivers()).collect();
        assert_eq!(pattern_a, pattern_b);
        assert!(pattern_a.iter().any(|&d| d));
        assert!(pattern_a.iter().any(|&d| !d));

        let mut lossless = LossyChannel::lossless();
        assert!((0..100).all(|_| lossless.delivers()));
    }

    #[tokio::test]
    async fn test_pump_lossless() {
        let (tx, rx, sink, data) = setup(4096, 16);
        let report = run(tx, rx.clone(), LossyChannel::lossless(), &Config::default(), 10_000)
            .await
            .unwrap();

        assert!(report.completed);
        assert_eq!(report.packets_lost, 0);
        assert!(rx.idle());
        assert_eq!(sink.to_vec(), data);
    }

    #[tokio::test]
    async fn test_pump_lossy() {
        let (tx, rx, sink, data) = setup(4096, 16);
        let report = run(tx, rx.clone(), LossyChannel::new(0.3, 1), &Config::default(), 100_000)
            .await
            .unwrap();

        assert!(report.completed);
        assert!(report.packets_lost > 0);
        assert!(report.packets_sent > 256);
        assert_eq!(sink.to_vec(), data);
    }

    #[tokio::test]
    async fn test_pump_budget_exhausted() {
        let (tx, rx, _, _) = setup(4096, 16);
        let report = run(tx, rx.clone(), LossyChannel::lossless(), &Config::default(), 10)
            .await
            .unwrap();

        assert!(!report.completed);
        assert_eq!(report.packets_sent, 10);
        assert!(!rx.idle());
    }
}
