//! Deterministic multi-writer/multi-reader simulation for `pq-core`.
//!
//! Each simulated "process" opens its own [`pq_core::Queue`] handle on the
//! same backing file and closes it again after a short burst of operations,
//! the way real `pq`-attached processes come and go. Coordination across
//! handles happens only through the file's advisory locks and the
//! persisted index snapshot, never through shared in-process state, so a
//! run here exercises the same contention paths a multi-process deployment
//! would hit. Scenario generation is seeded so a run is fully reproducible.

use std::path::{Path, PathBuf};
use std::thread;

use pq_core::{CreateOptions, Direction, Error, OpenFlags, Product, Queue};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Parameters for a single simulation run.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioConfig {
    /// Seeds the deterministic PRNG driving op generation.
    pub seed: u64,
    /// Queue region capacity (`nalloc`).
    pub capacity: u32,
    /// Queue data-area size in bytes.
    pub data_size: u64,
    /// Region alignment.
    pub align: u64,
    /// Number of concurrent writer "processes".
    pub writer_count: usize,
    /// Number of insert attempts each writer issues.
    pub ops_per_writer: usize,
    /// Payload size range (inclusive) for generated products.
    pub payload_size_range: (usize, usize),
    /// Fraction (0-100) of ops that reinsert an already-used signature,
    /// exercising duplicate suppression under contention.
    pub duplicate_pct: u8,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_1234,
            capacity: 64,
            data_size: 256 * 1024,
            align: 8,
            writer_count: 4,
            ops_per_writer: 25,
            payload_size_range: (32, 512),
            duplicate_pct: 10,
        }
    }
}

/// One writer's planned op: either a fresh product or a deliberate repeat
/// of a signature that an earlier op (from any writer) already used.
#[derive(Debug, Clone, Copy)]
enum PlannedOp {
    Fresh { signature_seed: u32, size: usize },
    Repeat { signature_seed: u32, size: usize },
}

fn plan_ops(config: &ScenarioConfig, writer_index: usize) -> Vec<PlannedOp> {
    let mut rng = SmallRng::seed_from_u64(config.seed ^ (writer_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    let (lo, hi) = config.payload_size_range;
    let mut used = Vec::new();
    let mut ops = Vec::with_capacity(config.ops_per_writer);
    for i in 0..config.ops_per_writer {
        let size = rng.gen_range(lo..=hi);
        let roll = rng.gen_range(0..100u8);
        if roll < config.duplicate_pct && !used.is_empty() {
            let pick = used[rng.gen_range(0..used.len())];
            ops.push(PlannedOp::Repeat { signature_seed: pick, size });
        } else {
            let signature_seed = (writer_index as u32) << 24 | i as u32;
            used.push(signature_seed);
            ops.push(PlannedOp::Fresh { signature_seed, size });
        }
    }
    ops
}

fn signature_from_seed(seed: u32) -> [u8; 16] {
    let mut signature = [0u8; 16];
    signature[12..16].copy_from_slice(&seed.to_be_bytes());
    signature
}

fn product_for(signature_seed: u32, size: usize) -> Product {
    Product {
        origin: "pq-sim".into(),
        feedtype: 1,
        seqno: signature_seed,
        arrival: (i64::from(signature_seed), 0),
        ident: format!("sim-{signature_seed:08x}"),
        signature: signature_from_seed(signature_seed),
        data: vec![(signature_seed % 256) as u8; size],
    }
}

/// What each writer thread observed while running its planned ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriterOutcome {
    pub inserted: usize,
    pub duplicates_rejected: usize,
    pub transient_errors: usize,
}

/// Aggregate result of a [`run_scenario`] call.
#[derive(Debug, Clone)]
pub struct SimReport {
    pub writer_outcomes: Vec<WriterOutcome>,
    pub final_slots_in_use: u32,
    pub final_bytes_in_use: u64,
    pub sequence_count: usize,
    pub sequence_is_time_ordered: bool,
}

fn run_writer(path: PathBuf, config: ScenarioConfig, writer_index: usize) -> WriterOutcome {
    let ops = plan_ops(&config, writer_index);
    let mut outcome = WriterOutcome::default();
    for op in ops {
        let (signature_seed, size) = match op {
            PlannedOp::Fresh { signature_seed, size } | PlannedOp::Repeat { signature_seed, size } => {
                (signature_seed, size)
            }
        };
        let product = product_for(signature_seed, size);
        let result = Queue::open(&path, OpenFlags::READ_WRITE).and_then(|mut queue| {
            let insert_result = queue.insert(&product);
            queue.close()?;
            insert_result
        });
        match result {
            Ok(()) => outcome.inserted += 1,
            Err(Error::Dup) => outcome.duplicates_rejected += 1,
            Err(Error::Locked | Error::Access | Error::Exhausted(_)) => outcome.transient_errors += 1,
            Err(other) => panic!("writer {writer_index} op failed unexpectedly: {other}"),
        }
    }
    outcome
}

/// Runs a deterministic multi-writer insertion burst against a fresh queue
/// at `path`, then drains it with a single full-sequence read, validating
/// that what comes back is free of duplicates and ordered by insertion
/// time.
///
/// # Panics
///
/// Panics if a writer encounters an error that is not one of the expected
/// contention outcomes (`Dup`, `Locked`, `Access`), since that indicates a
/// correctness bug the simulation is meant to catch.
pub fn run_scenario(path: &Path, config: ScenarioConfig) -> Result<SimReport, Error> {
    Queue::create(path, CreateOptions::new(0o600, config.align, config.data_size, config.capacity))?.close()?;

    let writer_outcomes: Vec<WriterOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.writer_count)
            .map(|writer_index| {
                let path = path.to_path_buf();
                scope.spawn(move || run_writer(path, config, writer_index))
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("writer thread panicked")).collect()
    });

    let mut queue = Queue::open(path, OpenFlags::READ_WRITE)?;
    let stats = queue.stats();

    let mut seen_times = Vec::new();
    let mut seen_signatures = std::collections::HashSet::new();
    loop {
        let result = queue.sequence(Direction::Gt, None, |meta, _data| {
            seen_times.push(meta.time_key);
            seen_signatures.insert(meta.header.signature);
            Ok(())
        });
        match result {
            Ok(()) => {}
            Err(Error::End) => break,
            Err(other) => return Err(other),
        }
    }
    let sequence_count = seen_times.len();
    let sequence_is_time_ordered = seen_times.windows(2).all(|w| w[0] < w[1]);
    assert_eq!(
        seen_signatures.len(),
        sequence_count,
        "resident products must have distinct signatures"
    );

    queue.close()?;

    Ok(SimReport {
        writer_outcomes,
        final_slots_in_use: stats.slots_in_use,
        final_bytes_in_use: stats.bytes_in_use,
        sequence_count,
        sequence_is_time_ordered,
    })
}
