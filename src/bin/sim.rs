//! Pump 시뮬레이터 - 손실 채널을 통한 파일 전송
//!
//! 송신자와 수신자를 한 프로세스에서 돌리며, 패킷은 지정한 손실률로 버려진다.
//!
//! 사용법:
//!   cargo run --release --bin pump-sim -- [OPTIONS]
//!
//! 예시:
//!   # 파일 전송 (10% 손실)
//!   cargo run --release --bin pump-sim -- --input data.bin --output received.bin --loss 0.1
//!
//!   # 테스트 데이터 (4MB), 작은 청크
//!   cargo run --release --bin pump-sim -- --size 4 --chunk-size 262144

use std::fs::File;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pump::pump::{self as flow, LossyChannel};
use pump::{Config, MemoryObject, Receiver, SharedReceiver, SharedTransmitter, Transmitter};

/// 시뮬레이터 설정
struct SimConfig {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    size_mb: usize,
    loss: f64,
    seed: u64,
    budget: f64,
    config: Config,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            size_mb: 1,
            loss: 0.1,
            seed: 1,
            budget: 3.0,
            config: Config::default(),
        }
    }
}

fn parse_args() -> SimConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SimConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                if i + 1 < args.len() {
                    config.input = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    config.output = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--size" => {
                if i + 1 < args.len() {
                    config.size_mb = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--packet-size" | "-p" => {
                if i + 1 < args.len() {
                    config.config.packet_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--chunk-size" | "-c" => {
                if i + 1 < args.len() {
                    config.config.chunk_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--loss" | "-l" => {
                if i + 1 < args.len() {
                    config.loss = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--seed" => {
                if i + 1 < args.len() {
                    config.seed = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--budget" => {
                if i + 1 < args.len() {
                    config.budget = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--workers" | "-w" => {
                if i + 1 < args.len() {
                    config.config.parallel_workers = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"Pump Simulator - 레이트리스 청크 전송 시뮬레이터

송신자 -> 손실 채널 -> 수신자를 한 프로세스에서 실행

사용법:
  cargo run --release --bin pump-sim -- [OPTIONS]

옵션:
  -i, --input <PATH>       전송할 파일 (없으면 난수 테스트 데이터)
  -o, --output <PATH>      수신 파일 경로 (없으면 메모리)
  --size <MB>              테스트 데이터 크기 (기본: 1)
  -p, --packet-size <N>    패킷(심볼) 크기 바이트 (기본: 1200)
  -c, --chunk-size <N>     청크 크기 바이트 (기본: 4915200)
  -l, --loss <RATIO>       패킷 손실률 0.0~1.0 미만 (기본: 0.1)
  --seed <N>               손실/데이터 난수 시드 (기본: 1)
  --budget <X>             최대 전송량 = 소스 심볼 수 × X ÷ (1 - 손실률) (기본: 3.0)
  -w, --workers <N>        인코더 병렬 워커 수 (기본: CPU 코어 수)
  -h, --help               이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let sim = parse_args();
    if !(0.0..1.0).contains(&sim.loss) {
        return Err(format!("손실률은 0.0 이상 1.0 미만이어야 함: {}", sim.loss).into());
    }

    let tx = SharedTransmitter::new(Transmitter::new(sim.config.clone()));
    let rx = SharedReceiver::new(Receiver::new(sim.config.clone()));

    // 원본 준비
    let (object, original) = match &sim.input {
        Some(path) => {
            info!("Loading file: {:?}", path);
            let file = File::open(path)?;
            let size = file.metadata()?.len();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "input".into());
            (tx.register_source(name, file, size), None)
        }
        None => {
            info!("Using test data ({}MB)", sim.size_mb);
            let mut data = vec![0u8; sim.size_mb * 1024 * 1024];
            StdRng::seed_from_u64(sim.seed).fill_bytes(&mut data);
            let source = MemoryObject::from_vec(data.clone());
            (tx.register_source("test-data", source, data.len() as u64), Some(data))
        }
    };

    // 수신 대상 준비
    let sink = match &sim.output {
        Some(path) => {
            let file = File::create(path)?;
            file.set_len(object.size)?;
            rx.prepare_for_reception(object.clone(), file);
            None
        }
        None => {
            let sink = MemoryObject::new(object.size as usize);
            rx.prepare_for_reception(object.clone(), sink.clone());
            Some(sink)
        }
    };

    let chunks = sim.config.chunks_for(&object);
    tx.activate_chunks(&chunks)?;
    let source_symbols: u64 = chunks.iter().map(|c| c.source_symbol_count()).sum();

    info!("Object: {} ({} bytes)", object.id, object.size);
    info!("Chunks: {}, source symbols: {}", chunks.len(), source_symbols);
    info!("Packet size: {} bytes, loss: {:.1}%", sim.config.packet_size, sim.loss * 100.0);

    let max_packets = (source_symbols as f64 * sim.budget / (1.0 - sim.loss)) as u64 + 1000;
    let report = flow::run(
        tx.clone(),
        rx.clone(),
        LossyChannel::new(sim.loss, sim.seed),
        &sim.config,
        max_packets,
    )
    .await?;

    println!("{}", report.summary());
    println!("TX {}", tx.stats().summary());
    println!("RX {}", rx.stats().summary());
    println!(
        "Recovery overhead: {:.2}%",
        tx.stats().recovery_overhead(source_symbols) * 100.0
    );

    if let (Some(original), Some(sink)) = (original, sink) {
        let matches = sink.to_vec() == original;
        println!("Data verification: {}", if matches { "OK" } else { "MISMATCH" });
    }

    if !report.completed {
        return Err("전송 미완료: 전송 예산 초과".into());
    }
    Ok(())
}
