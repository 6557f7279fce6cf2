//! Two-phase streaming copy.
//!
//! Nodes are read on the calling thread, grouped into batches and handed to a
//! bounded pool of writer threads through a bounded channel. Every node batch
//! is written and mapped before the first relationship is read; relationship
//! batches then run through a second pool and resolve their endpoints through
//! the populated [`IdentityMap`].

use std::{
    fmt,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    thread,
    time::Instant,
};

use crossbeam::channel;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    backend::{DataReader, DataWriter},
    errors::CopyError,
    guard::{DatabaseAdmin, SourceGuard},
    identity::IdentityMap,
    options::CopyOptions,
    progress::ProgressSink,
};

/// Initial capacity of the per-transfer identity map.
pub const IDENTITY_MAP_CAPACITY: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Nodes,
    Relationships,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Nodes => "nodes",
            Phase::Relationships => "relationships",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Phase::Nodes => "Nodes",
            Phase::Relationships => "Relationships",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub nodes_written: u64,
    pub relationships_written: u64,
    pub node_batches: usize,
    pub relationship_batches: usize,
}

/// Copies every node and then every relationship from `reader` to `writer`.
///
/// The first failing batch aborts the transfer. Batches already committed
/// by the writer stay in the target.
pub fn transfer<R, W>(
    reader: &R,
    writer: &W,
    options: &CopyOptions,
    progress: &dyn ProgressSink,
) -> Result<TransferStats, CopyError>
where
    R: DataReader + ?Sized,
    W: DataWriter + ?Sized,
{
    let started = Instant::now();
    let ids = IdentityMap::with_capacity(IDENTITY_MAP_CAPACITY);

    let node_total = reader
        .total_node_count()
        .map_err(|e| e.while_reading(Phase::Nodes))?;
    info!(
        total = node_total,
        batch_size = options.batch_size(),
        workers = options.node_workers(),
        "copy.nodes.start"
    );
    progress.begin(Phase::Nodes, node_total);
    let nodes = reader
        .read_nodes()
        .map_err(|e| e.while_reading(Phase::Nodes))?;
    let node_run = run_phase(
        Phase::Nodes,
        nodes,
        options.batch_size(),
        options.node_workers(),
        progress,
        |_, batch| {
            let mappings = writer.write_nodes(batch, options)?;
            ids.insert(&mappings);
            Ok(mappings.len() as u64)
        },
    );
    progress.finish(Phase::Nodes);
    let node_run = node_run?;
    info!(
        written = node_run.written,
        batches = node_run.batches,
        mapped = ids.len(),
        "copy.nodes.complete"
    );

    let relationship_total = reader
        .total_relationship_count()
        .map_err(|e| e.while_reading(Phase::Relationships))?;
    info!(
        total = relationship_total,
        batch_size = options.batch_size(),
        workers = options.relationship_workers(),
        "copy.relationships.start"
    );
    progress.begin(Phase::Relationships, relationship_total);
    let relationships = reader
        .read_relationships()
        .map_err(|e| e.while_reading(Phase::Relationships))?;
    let relationship_run = run_phase(
        Phase::Relationships,
        relationships,
        options.batch_size(),
        options.relationship_workers(),
        progress,
        |_, batch| writer.write_relationships(batch, &ids, options),
    );
    progress.finish(Phase::Relationships);
    let relationship_run = relationship_run?;
    info!(
        written = relationship_run.written,
        batches = relationship_run.batches,
        duration_ms = started.elapsed().as_millis() as u64,
        "copy.relationships.complete"
    );

    Ok(TransferStats {
        nodes_written: node_run.written,
        relationships_written: relationship_run.written,
        node_batches: node_run.batches,
        relationship_batches: relationship_run.batches,
    })
}

/// Runs [`transfer`] inside the protection of `guard`. The source is restored
/// on every exit path; when both the copy and the restore fail, the copy
/// error is returned and the restore error is logged.
pub fn copy_database<A, R, W>(
    guard: &SourceGuard<A>,
    reader: &R,
    writer: &W,
    options: &CopyOptions,
    progress: &dyn ProgressSink,
) -> Result<TransferStats, CopyError>
where
    A: DatabaseAdmin,
    R: DataReader + ?Sized,
    W: DataWriter + ?Sized,
{
    let protection = guard.activate()?;
    let outcome = transfer(reader, writer, options, progress);
    let restored = protection.release();
    match (outcome, restored) {
        (Ok(stats), Ok(())) => Ok(stats),
        (Ok(_), Err(restore_err)) => Err(restore_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(restore_err)) => {
            warn!(error = %restore_err, "guard.restore.failed");
            Err(err)
        }
    }
}

struct PhaseRun {
    written: u64,
    batches: usize,
}

/// Feeds batches read from `items` to `workers` threads running `write`.
/// Returns once every worker has been joined.
fn run_phase<T, I, F>(
    phase: Phase,
    items: I,
    batch_size: usize,
    workers: usize,
    progress: &dyn ProgressSink,
    write: F,
) -> Result<PhaseRun, CopyError>
where
    T: Send,
    I: Iterator<Item = Result<T, CopyError>>,
    F: Fn(usize, &[T]) -> Result<u64, CopyError> + Sync,
{
    let workers = workers.max(1);
    let (tx, rx) = channel::bounded::<(usize, Vec<T>)>(workers);
    let cancelled = AtomicBool::new(false);
    let failure: Mutex<Option<CopyError>> = Mutex::new(None);
    let written = AtomicU64::new(0);
    let write = &write;

    let read_outcome = thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            let (cancelled, failure, written) = (&cancelled, &failure, &written);
            scope.spawn(move || {
                for (index, batch) in rx.iter() {
                    // Drain without writing once the phase is cancelled.
                    if cancelled.load(Ordering::Acquire) {
                        continue;
                    }
                    let started = Instant::now();
                    match write(index, &batch).map_err(|err| err.in_batch(phase, index)) {
                        Ok(count) => {
                            written.fetch_add(count, Ordering::Relaxed);
                            debug!(
                                phase = %phase,
                                batch = index,
                                size = batch.len(),
                                written = count,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "copy.batch.written"
                            );
                        }
                        Err(err) => {
                            cancelled.store(true, Ordering::Release);
                            let mut slot = failure.lock();
                            if slot.is_none() {
                                *slot = Some(err);
                            }
                        }
                    }
                }
            });
        }
        drop(rx);

        let mut dispatched = 0usize;
        let mut outcome = Ok(());
        for batch in Batches::new(items, batch_size) {
            if cancelled.load(Ordering::Acquire) {
                break;
            }
            match batch {
                Ok(batch) => {
                    progress.advance(phase, batch.len());
                    if tx.send((dispatched, batch)).is_err() {
                        break;
                    }
                    dispatched += 1;
                }
                Err(err) => {
                    cancelled.store(true, Ordering::Release);
                    outcome = Err(err.while_reading(phase));
                    break;
                }
            }
        }
        drop(tx);
        outcome.map(|()| dispatched)
    });

    if let Some(err) = failure.into_inner() {
        warn!(phase = %phase, error = %err, "copy.phase.failed");
        return Err(err);
    }
    let batches = read_outcome.inspect_err(|err| {
        warn!(phase = %phase, error = %err, "copy.phase.failed");
    })?;
    Ok(PhaseRun {
        written: written.into_inner(),
        batches,
    })
}

/// Groups consecutive items into vectors of `size`; the last may be shorter.
/// A read error ends the sequence.
pub(crate) struct Batches<I> {
    items: I,
    size: usize,
    done: bool,
}

impl<I> Batches<I> {
    pub(crate) fn new(items: I, size: usize) -> Self {
        Self {
            items,
            size: size.max(1),
            done: false,
        }
    }
}

impl<T, I> Iterator for Batches<I>
where
    I: Iterator<Item = Result<T, CopyError>>,
{
    type Item = Result<Vec<T>, CopyError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::with_capacity(self.size.min(4096));
        while batch.len() < self.size {
            match self.items.next() {
                Some(Ok(item)) => batch.push(item),
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}
