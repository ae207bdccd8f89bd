// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! shub-gen - Synthetic datagram generator
//!
//! Drives a hub's receive path with fixed, sequence, or random messages.

use clap::Parser;
use shub::{GenMode, Generator, GeneratorConfig, Message, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Generate synthetic hub datagrams
#[derive(Parser, Debug)]
#[command(name = "shub-gen")]
#[command(version = "0.1.0")]
#[command(about = "Send synthetic messages to a hub (test/demo traffic)")]
struct Args {
    /// Target hub address
    #[arg(default_value = "127.0.0.1:7600")]
    target: SocketAddr,

    /// Payload mode: fixed, seq, random
    #[arg(short, long, default_value = "seq")]
    mode: Mode,

    /// Keys to emit on (comma-separated)
    #[arg(short, long, default_value = "a,b,c", value_delimiter = ',')]
    keys: Vec<String>,

    /// Emission period in milliseconds
    #[arg(short, long, default_value = "1000")]
    period_ms: u64,

    /// Stop after N datagrams (0 = run until Ctrl+C)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Key for fixed mode
    #[arg(long, default_value = "temp")]
    key: String,

    /// Value for fixed mode (parsed as int, then float, else text)
    #[arg(long, default_value = "21.5")]
    value: String,
}

#[derive(Clone, Debug)]
enum Mode {
    Fixed,
    Sequence,
    Random,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" | "f" => Ok(Mode::Fixed),
            "seq" | "sequence" | "s" => Ok(Mode::Sequence),
            "random" | "rnd" | "r" => Ok(Mode::Random),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run_generator(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_generator(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mode = match args.mode {
        Mode::Fixed => GenMode::Fixed(Message::try_new(
            args.key.clone(),
            parse_value(&args.value),
        )?),
        Mode::Sequence => GenMode::Sequence {
            keys: args.keys.clone(),
        },
        Mode::Random => GenMode::Random {
            keys: args.keys.clone(),
        },
    };

    let generator = Generator::spawn(GeneratorConfig {
        target: args.target,
        period: Duration::from_millis(args.period_ms.max(1)),
        mode,
    })?;

    eprintln!(
        "Sending to {} every {}ms ({:?} mode), Ctrl+C to stop",
        args.target, args.period_ms, args.mode
    );

    while running.load(Ordering::SeqCst) {
        let (sent, errors) = generator.metrics.snapshot();
        if args.count > 0 && sent >= args.count {
            break;
        }
        if errors > 0 && sent == 0 {
            eprintln!("Warning: all sends failing (target unreachable?)");
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let (sent, errors) = generator.metrics.snapshot();
    generator.shutdown();
    eprintln!("Sent {} datagram(s), {} error(s)", sent, errors);

    Ok(())
}

fn parse_value(raw: &str) -> Value {
    if let Ok(v) = raw.parse::<i64>() {
        return Value::Integer(v);
    }
    if let Ok(v) = raw.parse::<f64>() {
        return Value::Float(v);
    }
    Value::Text(raw.to_string())
}
