// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! YCSB-style benchmark driver.
//!
//! Spawns logger and worker threads over a pre-populated single table,
//! runs uniform-random transactions for a fixed window, and reports
//! per-worker and aggregate commit/abort counts, throughput, and the
//! final durable epoch.
//!
//! Usage:
//!   ./ycsb_bench [--workers N] [--loggers N] [--records N] [--seconds N]
//!                [--ops N] [--read-ratio PCT] [--epoch-ms N]
//!                [--epoch-diff N] [--log-dir PATH] [--memory]

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use silokv::engine::{DurabilityMode, Engine, EngineConfig};
use silokv::txn::AbortReason;
use silokv::workload::UniformWorkload;

struct BenchParams {
    workers: usize,
    loggers: usize,
    records: u64,
    seconds: u64,
    ops_per_transaction: usize,
    read_ratio: u32,
    epoch_ms: u64,
    epoch_diff: u64,
    log_dir: String,
    memory: bool,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            workers: 4,
            loggers: 1,
            records: 1_000_000,
            seconds: 3,
            ops_per_transaction: 10,
            read_ratio: 50,
            epoch_ms: 40,
            epoch_diff: 0,
            log_dir: "silokv-log".to_string(),
            memory: false,
        }
    }
}

fn parse_params() -> BenchParams {
    let mut params = BenchParams::default();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--memory" {
            params.memory = true;
            continue;
        }
        let Some(value) = iter.next() else {
            eprintln!("missing value for {arg}");
            std::process::exit(2);
        };
        match arg.as_str() {
            "--workers" => params.workers = value.parse().unwrap_or(params.workers),
            "--loggers" => params.loggers = value.parse().unwrap_or(params.loggers),
            "--records" => params.records = value.parse().unwrap_or(params.records),
            "--seconds" => params.seconds = value.parse().unwrap_or(params.seconds),
            "--ops" => {
                params.ops_per_transaction = value.parse().unwrap_or(params.ops_per_transaction)
            }
            "--read-ratio" => params.read_ratio = value.parse().unwrap_or(params.read_ratio),
            "--epoch-ms" => params.epoch_ms = value.parse().unwrap_or(params.epoch_ms),
            "--epoch-diff" => params.epoch_diff = value.parse().unwrap_or(params.epoch_diff),
            "--log-dir" => params.log_dir = value.clone(),
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }
    params
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let params = parse_params();

    println!("#workers:\t{}", params.workers);
    println!("#loggers:\t{}", params.loggers);
    println!("#records:\t{}", params.records);
    println!("#seconds:\t{}", params.seconds);
    println!("#ops/txn:\t{}", params.ops_per_transaction);
    println!("#read_ratio:\t{}", params.read_ratio);
    println!("#epoch_ms:\t{}", params.epoch_ms);
    println!("#epoch_diff:\t{}", params.epoch_diff);

    let config = EngineConfig::default()
        .with_workers(params.workers)
        .with_loggers(params.loggers)
        .with_records_per_table(params.records)
        .with_epoch_interval(Duration::from_millis(params.epoch_ms))
        .with_epoch_diff(params.epoch_diff)
        .with_log_dir(params.log_dir.as_str())
        .with_durability(if params.memory {
            DurabilityMode::Memory
        } else {
            DurabilityMode::File
        });

    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("engine setup failed: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = engine.init_db() {
        eprintln!("init_db failed: {e}");
        std::process::exit(1);
    }

    let failed_workers = AtomicU64::new(0);
    thread::scope(|s| {
        for logger in 0..params.loggers {
            let engine = &engine;
            s.spawn(move || {
                if let Err(e) = engine.run_logger(logger) {
                    eprintln!("logger {logger} failed: {e}");
                }
            });
        }
        for worker in 0..params.workers {
            let engine = &engine;
            let failed_workers = &failed_workers;
            let mut workload = UniformWorkload::new(
                0xB1A5_0000 + worker as u64,
                params.records,
                params.ops_per_transaction,
                params.read_ratio,
            );
            s.spawn(move || {
                let group = engine.affinity().logger_for(worker);
                if let Err(e) = engine.run_worker(worker, group, &mut workload) {
                    eprintln!("worker {worker} failed: {e}");
                    failed_workers.fetch_add(1, Ordering::Relaxed);
                }
            });
        }

        engine.send_start();
        thread::sleep(Duration::from_secs(params.seconds));
        engine.send_quit();
    });

    println!();
    for worker in 0..params.workers {
        println!(
            "worker#{worker}\tcommit: {}\tabort: {}",
            engine.commit_count(worker),
            engine.abort_count(worker)
        );
    }

    let commits = engine.total_commit_count();
    let aborts = engine.total_abort_count();
    let attempts = commits + aborts;
    println!("commit_counts:\t{commits}");
    println!("abort_counts:\t{aborts}");
    println!(
        "abort_rate:\t{:.6}",
        if attempts == 0 {
            0.0
        } else {
            aborts as f64 / attempts as f64
        }
    );
    for reason in AbortReason::ALL {
        let count: u64 = (0..params.workers)
            .map(|w| engine.abort_reason_count(w, reason))
            .sum();
        println!("abort[{reason:?}]:\t{count}");
    }
    println!("throughput[tps]:\t{}", commits / params.seconds.max(1));
    println!("durable_epoch:\t{}", engine.durable_epoch());
    for logger in 0..params.loggers {
        if let Some(stats) = engine.logger_stats(logger) {
            println!(
                "logger#{logger}\tbytes: {}\trecords: {}\tbuffers: {}\tsyncs: {}",
                stats.bytes_written(),
                stats.records_flushed(),
                stats.buffers_flushed(),
                stats.sync_count()
            );
        }
    }

    if failed_workers.load(Ordering::Relaxed) > 0 {
        std::process::exit(1);
    }
}
