//! Map benchmark driver
//!
//! This module provides the `map-bench` subcommand. A warm-up run on one map
//! is followed by a measured run on another; each run performs N sequential
//! inserts, then N reads, then N updates of the same keys, using only the
//! `VersionedMap` interface.

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use retrace::persistent::{FatNodeMap, PersistentOrderedMap, VersionedMap};

/// Arguments for the map-bench subcommand
#[derive(Args, Debug)]
pub struct MapBenchArgs {
    /// Map used for the warm-up run
    #[arg(value_enum)]
    pub warmup_kind: MapKind,

    /// Operations per phase in the warm-up run
    pub warmup_n: i64,

    /// Map used for the measured run
    #[arg(value_enum)]
    pub kind: MapKind,

    /// Operations per phase in the measured run
    pub n: i64,
}

/// Map implementations the driver can construct
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MapKind {
    /// Ordered map with lazy single-slot node versioning
    #[value(alias = "PersistentMap")]
    PersistentMap,
    /// Ordered map whose nodes keep every version
    #[value(alias = "FatNodePersistentMap")]
    FatNodeMap,
}

impl MapKind {
    fn build(self) -> Box<dyn VersionedMap<i64, i64>> {
        match self {
            Self::PersistentMap => Box::new(PersistentOrderedMap::new()),
            Self::FatNodeMap => Box::new(FatNodeMap::new()),
        }
    }
}

/// Elapsed time of each phase of one run
#[derive(Debug)]
struct Timings {
    insert: Duration,
    read: Duration,
    update: Duration,
}

/// Runs the map-bench subcommand
pub fn run(args: &MapBenchArgs) -> Result<()> {
    if args.warmup_n < 0 || args.n < 0 {
        bail!("operation counts must not be negative");
    }

    tracing::info!(kind = ?args.warmup_kind, n = args.warmup_n, "warm-up run");
    let warmup = measure(args.warmup_kind, args.warmup_n)?;
    tracing::debug!(?warmup, "warm-up finished");

    tracing::info!(kind = ?args.kind, n = args.n, "measured run");
    let timings = measure(args.kind, args.n)?;
    println!(
        "{} {} {}",
        timings.insert.as_millis(),
        timings.read.as_millis(),
        timings.update.as_millis()
    );
    Ok(())
}

fn measure(kind: MapKind, n: i64) -> Result<Timings> {
    let mut map = kind.build();

    let started = Instant::now();
    for key in 0..n {
        map.put(key, key)?;
    }
    let insert = started.elapsed();

    let started = Instant::now();
    let mut missing = 0_u64;
    for key in 0..n {
        if map.get(&key).is_none() {
            missing += 1;
        }
    }
    let read = started.elapsed();
    if missing > 0 {
        bail!("{missing} of {n} keys missing after insert");
    }

    let started = Instant::now();
    for key in 0..n {
        map.put(key, -key)?;
    }
    let update = started.elapsed();

    Ok(Timings {
        insert,
        read,
        update,
    })
}
