//! squitter: Mode S demodulator for raw 1090 MHz I/Q captures
//!
//! Reads 2 Msps interleaved unsigned 8-bit I/Q data from a file or stdin
//! and prints every validated frame in raw `*<hex>;` form.

use std::env;
use std::fs::File;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use squitter::{Config, ConfidenceLevel, Demodulator, IqSample};

const READ_CHUNK: usize = 64 * 1024;

struct Options {
    filename: Option<String>,
    confidence: ConfidenceLevel,
    icao_timeout: u64,
    quiet: bool,
}

impl Options {
    fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut opts = Self {
            filename: None,
            confidence: ConfidenceLevel::Medium,
            icao_timeout: 180,
            quiet: false,
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--ifile" => {
                    i += 1;
                    opts.filename = args.get(i).cloned();
                }
                "--confidence" => {
                    i += 1;
                    opts.confidence = match args.get(i).map(String::as_str) {
                        Some("low") => ConfidenceLevel::Low,
                        Some("medium") => ConfidenceLevel::Medium,
                        Some("high") => ConfidenceLevel::High,
                        other => {
                            eprintln!("Invalid confidence level: {:?}", other);
                            std::process::exit(1);
                        }
                    };
                }
                "--icao-timeout" => {
                    i += 1;
                    opts.icao_timeout = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(180);
                }
                "--quiet" => opts.quiet = true,
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown option: {}", other);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        opts
    }
}

fn print_help() {
    println!(
        r#"squitter - Mode S demodulator for raw 1090 MHz I/Q captures

Usage: squitter [OPTIONS]

Options:
  --ifile <filename>    Read capture from file (use '-' for stdin; default)
  --confidence <level>  Sightings before an address/parity ICAO is trusted:
                        low, medium or high (default: medium)
  --icao-timeout <s>    Evict idle ICAO addresses after <s> seconds
                        (default: 180)
  --quiet               Count frames without printing them
  --help                Show this help

The input is 2 Msps interleaved unsigned 8-bit I/Q, the format produced by
`rtl_sdr -f 1090000000 -s 2000000 -`."#
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Options::from_args();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = Config {
        confidence: opts.confidence,
        icao_timeout: Duration::from_secs(opts.icao_timeout),
    };

    let emitted = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&emitted);
    let quiet = opts.quiet;
    let mut demod = Demodulator::new(config, move |frame| {
        counter.fetch_add(1, Ordering::Relaxed);
        if !quiet {
            println!("{}", frame);
        }
    });

    match opts.filename.as_deref() {
        Some("-") | None => stream_stdin(&mut demod)?,
        Some(path) => process_file(&mut demod, path)?,
    }

    info!("done: {} frames emitted", emitted.load(Ordering::Relaxed));
    Ok(())
}

/// Synchronous path: read the capture chunk by chunk and demodulate
/// inline.
fn process_file(demod: &mut Demodulator, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("reading capture from {}", path);
    let mut file = File::open(path)?;

    let mut buf = vec![0u8; READ_CHUNK];
    let mut carry: Option<u8> = None;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let (batch, rest) = pair_samples(carry.take(), &buf[..n]);
        carry = rest;
        demod.process(&batch)?;
    }

    Ok(())
}

/// Asynchronous path: a producer thread pushes stdin samples into a
/// bounded queue drained by the demodulator worker.
fn stream_stdin(demod: &mut Demodulator) -> Result<(), Box<dyn std::error::Error>> {
    info!("streaming capture from stdin");
    let (tx, rx) = bounded::<IqSample>(1 << 16);
    let probe = tx.clone();
    demod.start(rx)?;

    let producer = thread::spawn(move || {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut buf = vec![0u8; READ_CHUNK];
        let mut carry: Option<u8> = None;
        loop {
            let n = match input.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let (batch, rest) = pair_samples(carry.take(), &buf[..n]);
            carry = rest;
            for sample in batch {
                if tx.send(sample).is_err() {
                    return;
                }
            }
        }
    });

    producer.join().ok();
    // Let the worker drain what the producer queued before stopping.
    while !probe.is_empty() {
        thread::sleep(Duration::from_millis(50));
    }
    demod.stop();

    Ok(())
}

/// Pair interleaved I/Q bytes into samples, carrying a dangling I byte
/// over to the next chunk.
fn pair_samples(carry: Option<u8>, bytes: &[u8]) -> (Vec<IqSample>, Option<u8>) {
    let mut data = Vec::with_capacity(bytes.len() + 1);
    if let Some(byte) = carry {
        data.push(byte);
    }
    data.extend_from_slice(bytes);

    let mut chunks = data.chunks_exact(2);
    let batch = chunks
        .by_ref()
        .map(|pair| IqSample::new(pair[0], pair[1]))
        .collect();
    let rest = chunks.remainder().first().copied();
    (batch, rest)
}
