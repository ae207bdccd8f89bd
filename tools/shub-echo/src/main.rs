// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! shub-echo - Echo hub key changes in real-time
//!
//! Binds a hub and prints every value change it receives. With explicit
//! keys it blocks on the watch API; without keys it scans the whole store.

use chrono::Local;
use clap::Parser;
use colored::*;
use shub::{Hub, Value, VersionedValue};
use std::collections::HashMap;
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Echo hub key changes in real-time
#[derive(Parser, Debug)]
#[command(name = "shub-echo")]
#[command(version = "0.1.0")]
#[command(about = "Echo hub key changes (like tail -f for UDP state)")]
struct Args {
    /// Keys to watch (empty = everything the hub receives)
    keys: Vec<String>,

    /// Receive port
    #[arg(short, long, default_value = "7600")]
    port: u16,

    /// Bind IP
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Output format: pretty, json, compact
    #[arg(short, long, default_value = "pretty")]
    format: OutputFormat,

    /// Shortcut for --format json
    #[arg(long)]
    json: bool,

    /// Maximum number of changes to print (0 = unlimited)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Show verbose metadata (version, timestamp)
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Quiet mode - only output data, no headers
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum OutputFormat {
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "p" => Ok(OutputFormat::Pretty),
            "json" | "j" => Ok(OutputFormat::Json),
            "compact" | "c" => Ok(OutputFormat::Compact),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

fn main() {
    let args = Args::parse();

    if args.no_color || !is_tty() {
        colored::control::set_override(false);
    }

    let format = if args.json {
        OutputFormat::Json
    } else {
        args.format.clone()
    };

    if let Err(e) = run_echo(&args, format) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_echo(args: &Args, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let hub = Hub::builder("shub-echo")
        .bind(SocketAddr::new(args.bind, args.port))
        .build()?;

    if !args.quiet {
        print_header(args, &hub, &format);
    }

    let printed = Arc::new(AtomicU64::new(0));

    if args.keys.is_empty() {
        scan_all(args, &hub, &format, &running, &printed);
    } else {
        watch_keys(args, &hub, &format, &running, &printed);
    }

    if !args.quiet {
        eprintln!(
            "\n{} Printed {} change(s)",
            "---".dimmed(),
            printed.load(Ordering::SeqCst)
        );
    }

    hub.shutdown();
    Ok(())
}

/// Watch mode: one blocking watcher thread per requested key.
fn watch_keys(
    args: &Args,
    hub: &Hub,
    format: &OutputFormat,
    running: &Arc<AtomicBool>,
    printed: &Arc<AtomicU64>,
) {
    let max = args.count;
    let mut handles = Vec::new();

    for key in &args.keys {
        let store = hub.store().clone();
        let key = key.clone();
        let format = format.clone();
        let running = Arc::clone(running);
        let printed = Arc::clone(printed);
        let verbose = args.verbose;

        handles.push(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                // Short timeout so Ctrl+C is honored promptly
                match store.wait_for_change(&key, Duration::from_millis(300)) {
                    Ok(latest) => {
                        let n = printed.fetch_add(1, Ordering::SeqCst) + 1;
                        print_change(&key, &latest, &format, verbose, n);
                        let _ = io::stdout().flush();
                        if max > 0 && n >= max {
                            running.store(false, Ordering::SeqCst);
                        }
                    }
                    Err(shub::Error::TimedOut) => {}
                    Err(e) => {
                        eprintln!("{}: {}", "Warning".yellow(), e);
                        thread::sleep(Duration::from_millis(100));
                    }
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }
}

/// Scan mode: poll the whole store and print version bumps.
fn scan_all(
    args: &Args,
    hub: &Hub,
    format: &OutputFormat,
    running: &Arc<AtomicBool>,
    printed: &Arc<AtomicU64>,
) {
    let max = args.count;
    let mut last_seen: HashMap<String, u64> = HashMap::new();

    while running.load(Ordering::SeqCst) {
        for key in hub.store().keys() {
            let Some(latest) = hub.read(&key) else {
                continue;
            };
            let seen = last_seen.get(&key).copied().unwrap_or(0);
            if latest.version <= seen {
                continue;
            }
            last_seen.insert(key.clone(), latest.version);

            let n = printed.fetch_add(1, Ordering::SeqCst) + 1;
            print_change(&key, &latest, format, args.verbose, n);
            let _ = io::stdout().flush();
            if max > 0 && n >= max {
                running.store(false, Ordering::SeqCst);
                return;
            }
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn print_header(args: &Args, hub: &Hub, format: &OutputFormat) {
    let what = if args.keys.is_empty() {
        "all keys".to_string()
    } else {
        args.keys.join(", ")
    };
    eprintln!(
        "{} {} {} (addr={}, format={:?})",
        ">>>".green().bold(),
        "Watching".bold(),
        what.cyan(),
        hub.local_addr(),
        format
    );
    eprintln!("{}", "Press Ctrl+C to stop".dimmed());
    eprintln!();
}

fn print_change(key: &str, latest: &VersionedValue, format: &OutputFormat, verbose: bool, seq: u64) {
    match format {
        OutputFormat::Pretty => {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            if verbose {
                println!(
                    "{} {} {} = {} {}",
                    format!("[{}]", timestamp).dimmed(),
                    format!("#{}", seq).yellow(),
                    key.cyan(),
                    latest.value.to_string().green(),
                    format!("(v{}, {})", latest.version, latest.value.kind()).dimmed()
                );
            } else {
                println!(
                    "{} {} {} = {}",
                    format!("[{}]", timestamp).dimmed(),
                    format!("#{}", seq).yellow(),
                    key.cyan(),
                    latest.value.to_string().green()
                );
            }
        }
        OutputFormat::Json => {
            if verbose {
                println!(
                    r#"{{"seq":{},"key":"{}","value":{},"version":{},"timestamp_ns":{}}}"#,
                    seq,
                    escape_json(key),
                    value_json(&latest.value),
                    latest.version,
                    latest.timestamp_ns
                );
            } else {
                println!(
                    r#"{{"key":"{}","value":{}}}"#,
                    escape_json(key),
                    value_json(&latest.value)
                );
            }
        }
        OutputFormat::Compact => {
            println!("{}={}", key, latest.value);
        }
    }
}

fn value_json(value: &Value) -> String {
    match value {
        Value::Integer(v) => v.to_string(),
        Value::Float(v) => {
            if v.is_finite() {
                v.to_string()
            } else {
                // JSON has no NaN/Inf literals
                format!("\"{}\"", v)
            }
        }
        Value::Text(s) => format!("\"{}\"", escape_json(s)),
        Value::Record(fields) => {
            let body: Vec<String> = fields
                .iter()
                .map(|(name, v)| format!("\"{}\":{}", escape_json(name), value_json(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
    }
}

fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn is_tty() -> bool {
    #[cfg(unix)]
    unsafe {
        libc::isatty(libc::STDOUT_FILENO) != 0
    }
    #[cfg(not(unix))]
    true
}
