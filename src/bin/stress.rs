//! vchain Stress Binary
//!
//! Runs concurrent appenders, readers and a cutter against one set of
//! version chains, then verifies every chain.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};
use vchain::{
    BackoffStrategy, ChainError, Config, PrimaryKey, Snapshot, TupleLocator, TxnId,
    VersionChains,
};

/// vchain stress driver
#[derive(Parser, Debug)]
#[command(name = "vchain-stress")]
#[command(about = "Concurrent append/lookup/cut workload over MVCC version chains")]
#[command(version)]
struct Args {
    /// Number of appender threads
    #[arg(short, long, default_value = "4", value_parser = at_least_one())]
    appenders: usize,

    /// Number of reader threads
    #[arg(short, long, default_value = "4")]
    readers: usize,

    /// Number of distinct primary keys
    #[arg(short, long, default_value = "16", value_parser = clap::value_parser!(u64).range(1..))]
    keys: u64,

    /// Versions appended by each appender
    #[arg(short, long, default_value = "10000", value_parser = clap::value_parser!(u64).range(1..))]
    ops: u64,

    /// Newest versions per chain the cutter leaves alone
    #[arg(long, default_value = "4")]
    keep: usize,

    /// Node slots in the arena
    #[arg(long, default_value = "1048576", value_parser = at_least_one())]
    arena: usize,

    /// Back-off strategy for lost claims
    #[arg(long, value_enum, default_value = "snooze")]
    backoff: Backoff,
}

fn at_least_one() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::<usize>::new().range(1..)
}

impl Args {
    /// Slots the workload needs so appenders never starve: one sentinel and
    /// `keep` retained versions per key, plus one in-flight node per appender
    fn min_arena(&self) -> usize {
        (self.keys as usize).saturating_mul(self.keep + 1) + self.appenders
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backoff {
    Spin,
    Snooze,
    Yield,
}

impl From<Backoff> for BackoffStrategy {
    fn from(value: Backoff) -> Self {
        match value {
            Backoff::Spin => BackoffStrategy::Spin,
            Backoff::Snooze => BackoffStrategy::Snooze,
            Backoff::Yield => BackoffStrategy::Yield,
        }
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("vchain stress v{}", vchain::VERSION);

    if args.arena <= args.min_arena() {
        tracing::error!(
            arena = args.arena,
            required = args.min_arena() + 1,
            "arena too small for keys, keep and appenders"
        );
        std::process::exit(1);
    }

    let config = Config::builder()
        .arena_capacity(args.arena)
        .expected_chains(args.keys as usize)
        .max_readers(args.appenders + args.readers + 2)
        .backoff(args.backoff.into())
        .build();

    let chains = match VersionChains::init(config) {
        Ok(chains) => Arc::new(chains),
        Err(e) => {
            tracing::error!("Failed to initialise chains: {}", e);
            std::process::exit(1);
        }
    };

    let started = Instant::now();
    if let Err(e) = run(&args, &chains) {
        tracing::error!("Workload failed: {}", e);
        std::process::exit(1);
    }
    let elapsed = started.elapsed();

    // Every chain must be well formed once all threads have stopped
    let mut versions = 0;
    for key in 0..args.keys {
        match chains.verify_chain(PrimaryKey(key)) {
            Ok(count) => versions += count,
            Err(e) => {
                tracing::error!(key, "Chain verification failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    tracing::info!(
        elapsed_ms = elapsed.as_millis() as u64,
        live_versions = versions,
        arena_live = chains.arena().live(),
        "workload finished, all chains verified"
    );
    println!("{}", chains.stats());
}

fn run(args: &Args, chains: &Arc<VersionChains>) -> vchain::Result<()> {
    let next_txn = Arc::new(AtomicU64::new(1));
    let done = Arc::new(AtomicBool::new(false));

    // Readers
    let readers: Vec<_> = (0..args.readers)
        .map(|_| {
            let chains = Arc::clone(chains);
            let next_txn = Arc::clone(&next_txn);
            let done = Arc::clone(&done);
            let keys = args.keys;
            thread::spawn(move || {
                let mut hits = 0u64;
                while !done.load(Ordering::Relaxed) {
                    let snapshot = Snapshot::at(next_txn.load(Ordering::SeqCst));
                    for key in 0..keys {
                        if chains.lookup(PrimaryKey(key), &snapshot).is_some() {
                            hits += 1;
                        }
                    }
                }
                hits
            })
        })
        .collect();

    // Cutter
    let cutter = {
        let chains = Arc::clone(chains);
        let done = Arc::clone(&done);
        let keys = args.keys;
        let keep = args.keep;
        thread::spawn(move || {
            let mut removed = 0u64;
            loop {
                let finishing = done.load(Ordering::SeqCst);
                for key in 0..keys {
                    let versions = chains.versions(PrimaryKey(key));
                    // Oldest first, leaving the newest `keep`
                    for version in versions.iter().skip(keep).rev() {
                        chains.remove(version.handle);
                        removed += 1;
                    }
                }
                chains.reclaim();
                if finishing {
                    return removed;
                }
            }
        })
    };

    // Appenders
    let appenders: Vec<_> = (0..args.appenders)
        .map(|id| {
            let chains = Arc::clone(chains);
            let next_txn = Arc::clone(&next_txn);
            let keys = args.keys;
            let ops = args.ops;
            thread::spawn(move || -> vchain::Result<()> {
                for i in 0..ops {
                    let key = PrimaryKey((id as u64 + i) % keys);
                    let txn = next_txn.fetch_add(1, Ordering::SeqCst);
                    let handle = loop {
                        match chains.allocate(TxnId(txn), TupleLocator(i)) {
                            Ok(handle) => break handle,
                            Err(ChainError::ArenaExhausted { .. }) => thread::yield_now(),
                            Err(e) => return Err(e),
                        }
                    };
                    chains.append(key, handle)?;
                }
                Ok(())
            })
        })
        .collect();

    let mut result = Ok(());
    for appender in appenders {
        match appender.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => result = Err(e),
            Err(_) => {
                tracing::error!("appender thread panicked");
                std::process::exit(1);
            }
        }
    }

    done.store(true, Ordering::SeqCst);

    let mut hits = 0;
    for reader in readers {
        match reader.join() {
            Ok(count) => hits += count,
            Err(_) => {
                tracing::error!("reader thread panicked");
                std::process::exit(1);
            }
        }
    }
    let removed = match cutter.join() {
        Ok(count) => count,
        Err(_) => {
            tracing::error!("cutter thread panicked");
            std::process::exit(1);
        }
    };

    tracing::info!(hits, removed, "threads joined");
    result
}
