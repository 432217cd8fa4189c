//! Query execution and result feeds
//!
//! A query is admitted once, up front, with an estimate: the container's
//! last-known average per-document scan cost times the documents in scope.
//! The actual cost is known only when the feed is exhausted (or dropped),
//! at which point the governor is reconciled and the average updated.
//!
//! Single-partition queries scan lazily on the first pull. Cross-partition
//! queries fan out to at most `max_concurrency` worker threads. Each worker
//! snapshots the matches of one physical partition under its read lock,
//! releases the lock, then streams them through a channel bounded at
//! `max_buffered_item_count`. Workers stall when the buffer is full and
//! exit when the feed is dropped.
//!
//! Every scanned document costs `scan_per_document + scan_per_field *
//! fields`. Scan cost is attached to the next match of the same partition,
//! or to the partition's end marker, so page charges sum to the total.

use partdb_core::{Document, Error, PartitionKey, RequestCharge, Result};
use partdb_storage::{PartitionId, PartitionStore};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

use super::predicate::Predicate;
use crate::config::{CostConfig, QueryConfig};
use crate::throughput::ThroughputGovernor;

/// Which documents a query scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    /// One logical partition
    Partition(PartitionKey),
    /// Every partition of the container
    All,
}

impl QueryScope {
    /// Scope of one partition-key value
    pub fn partition(key: impl Into<PartitionKey>) -> Self {
        QueryScope::Partition(key.into())
    }

    fn key(&self) -> Option<&PartitionKey> {
        match self {
            QueryScope::Partition(key) => Some(key),
            QueryScope::All => None,
        }
    }
}

/// Per-request overrides of the configured fan-out limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Partitions scanned concurrently
    pub max_concurrency: Option<usize>,
    /// Matches buffered ahead of the consumer
    pub max_buffered_item_count: Option<usize>,
}

impl QueryOptions {
    fn resolve(&self, defaults: &QueryConfig) -> (usize, usize) {
        (
            self.max_concurrency.unwrap_or(defaults.max_concurrency).max(1),
            self.max_buffered_item_count
                .unwrap_or(defaults.max_buffered_item_count)
                .max(1),
        )
    }
}

/// Running average of the per-document scan cost of a container
#[derive(Debug)]
pub struct ScanStats {
    avg_milli_bits: AtomicU64,
}

impl ScanStats {
    /// Start from `initial` per document
    pub fn new(initial: RequestCharge) -> Self {
        ScanStats {
            avg_milli_bits: AtomicU64::new((initial.milli() as f64).to_bits()),
        }
    }

    /// Last-known average per-document cost, in milli-RU
    pub fn average_milli(&self) -> f64 {
        f64::from_bits(self.avg_milli_bits.load(Ordering::Relaxed))
    }

    /// Estimate for scanning `documents` documents
    pub fn estimate(&self, documents: usize) -> RequestCharge {
        RequestCharge::from_milli((self.average_milli() * documents as f64).ceil() as u64)
    }

    fn record(&self, charge: RequestCharge, scanned: u64) {
        if scanned > 0 {
            let avg = charge.milli() as f64 / scanned as f64;
            self.avg_milli_bits.store(avg.to_bits(), Ordering::Relaxed);
        }
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    /// Matching documents
    pub documents: Vec<Document>,
    /// Cost of the scanning that produced this page
    pub request_charge: RequestCharge,
}

enum ScanEvent {
    Match {
        document: Document,
        charge: RequestCharge,
        scanned: u64,
    },
    Finished {
        charge: RequestCharge,
        scanned: u64,
    },
}

enum Source {
    Pending(PartitionKey),
    Local(std::vec::IntoIter<ScanEvent>),
    Fanout(Receiver<ScanEvent>),
    Exhausted,
}

/// Everything a query needs from its container
pub(crate) struct QueryContext {
    pub store: Arc<PartitionStore>,
    pub governor: Arc<ThroughputGovernor>,
    pub stats: Arc<ScanStats>,
    pub costs: CostConfig,
    pub defaults: QueryConfig,
}

/// Lazy, finite sequence of query results
///
/// Iterate for documents one at a time, or call [`QueryFeed::next_page`]
/// for pages with their own request charge.
pub struct QueryFeed {
    source: Source,
    predicate: Arc<Predicate>,
    store: Arc<PartitionStore>,
    governor: Arc<ThroughputGovernor>,
    stats: Arc<ScanStats>,
    costs: CostConfig,
    workers: Vec<JoinHandle<()>>,
    estimate: RequestCharge,
    charged: RequestCharge,
    pending_charge: RequestCharge,
    scanned: u64,
    finalized: bool,
}

impl QueryFeed {
    /// Admit the query and prepare its feed
    ///
    /// Fails with `Throttled` before any scanning if the estimate does not
    /// fit the budget.
    pub(crate) fn start(
        ctx: QueryContext,
        predicate: Predicate,
        scope: QueryScope,
        options: QueryOptions,
    ) -> Result<Self> {
        let in_scope = ctx.store.count_in_scope(scope.key());
        let estimate = ctx.stats.estimate(in_scope);
        ctx.governor.try_admit(estimate)?;

        let mut feed = QueryFeed {
            source: Source::Exhausted,
            predicate: Arc::new(predicate),
            store: ctx.store,
            governor: ctx.governor,
            stats: ctx.stats,
            costs: ctx.costs,
            workers: Vec::new(),
            estimate,
            charged: RequestCharge::ZERO,
            pending_charge: RequestCharge::ZERO,
            scanned: 0,
            finalized: false,
        };

        match scope {
            QueryScope::Partition(key) => feed.source = Source::Pending(key),
            QueryScope::All => {
                let (concurrency, buffered) = options.resolve(&ctx.defaults);
                if let Err(e) = feed.spawn_workers(concurrency, buffered) {
                    feed.finish();
                    return Err(e);
                }
            }
        }
        Ok(feed)
    }

    fn spawn_workers(&mut self, concurrency: usize, buffered: usize) -> Result<()> {
        let partitions = Arc::new(self.store.partition_ids());
        let next = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::sync_channel(buffered);
        self.source = Source::Fanout(rx);

        let workers = concurrency.min(partitions.len());
        debug!(
            target: "partdb::query",
            partitions = partitions.len(),
            workers,
            buffered,
            "Cross-partition query started"
        );
        for n in 0..workers {
            let worker = FanoutWorker {
                partitions: Arc::clone(&partitions),
                next: Arc::clone(&next),
                store: Arc::clone(&self.store),
                predicate: Arc::clone(&self.predicate),
                costs: self.costs.clone(),
                tx: tx.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("partdb-query-{}", n))
                .spawn(move || worker.run())
                .map_err(|e| Error::internal(format!("failed to spawn query worker: {}", e)))?;
            self.workers.push(handle);
        }
        Ok(())
    }

    /// Next matching document
    fn next_document(&mut self) -> Option<Document> {
        loop {
            match self.next_event()? {
                ScanEvent::Match {
                    document,
                    charge,
                    scanned,
                } => {
                    self.account(charge, scanned);
                    return Some(document);
                }
                ScanEvent::Finished { charge, scanned } => self.account(charge, scanned),
            }
        }
    }

    fn next_event(&mut self) -> Option<ScanEvent> {
        if let Source::Pending(key) = &self.source {
            let events = scan_partition(
                &self.store,
                self.store.locate(key),
                Some(key),
                &self.predicate,
                &self.costs,
            );
            self.source = Source::Local(events.into_iter());
        }
        let event = match &mut self.source {
            Source::Local(events) => events.next(),
            Source::Fanout(rx) => rx.recv().ok(),
            Source::Pending(_) | Source::Exhausted => None,
        };
        if event.is_none() {
            self.finish();
        }
        event
    }

    fn account(&mut self, charge: RequestCharge, scanned: u64) {
        self.charged += charge;
        self.pending_charge += charge;
        self.scanned += scanned;
    }

    /// Up to `max_items` documents, with the charge incurred producing them
    ///
    /// Returns `None` once the feed is exhausted and every charge has been
    /// reported.
    pub fn next_page(&mut self, max_items: usize) -> Option<QueryPage> {
        let max_items = max_items.max(1);
        let mut documents = Vec::new();
        while documents.len() < max_items {
            match self.next_document() {
                Some(doc) => documents.push(doc),
                None => break,
            }
        }
        if documents.is_empty() && self.finalized && self.pending_charge.is_zero() {
            return None;
        }
        let request_charge = std::mem::take(&mut self.pending_charge);
        Some(QueryPage {
            documents,
            request_charge,
        })
    }

    /// True until the feed is exhausted
    pub fn has_more_results(&self) -> bool {
        !self.finalized || !self.pending_charge.is_zero()
    }

    /// Drain the feed into all matching documents and the total charge
    pub fn collect_all(mut self) -> (Vec<Document>, RequestCharge) {
        let mut documents = Vec::new();
        while let Some(doc) = self.next_document() {
            documents.push(doc);
        }
        (documents, self.charged)
    }

    /// Charge incurred so far
    pub fn request_charge(&self) -> RequestCharge {
        self.charged
    }

    /// Documents scanned so far
    pub fn documents_scanned(&self) -> u64 {
        self.scanned
    }

    /// Stop workers, reconcile the governor, record the average scan cost
    fn finish(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        // Dropping the receiver unblocks workers stalled on a full buffer.
        self.source = Source::Exhausted;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.governor.reconcile(self.estimate, self.charged);
        self.stats.record(self.charged, self.scanned);
    }
}

impl Iterator for QueryFeed {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        self.next_document()
    }
}

impl Drop for QueryFeed {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for QueryFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryFeed")
            .field("predicate", &self.predicate.to_string())
            .field("estimate", &self.estimate)
            .field("charged", &self.charged)
            .field("finalized", &self.finalized)
            .finish()
    }
}

struct FanoutWorker {
    partitions: Arc<Vec<PartitionId>>,
    next: Arc<AtomicUsize>,
    store: Arc<PartitionStore>,
    predicate: Arc<Predicate>,
    costs: CostConfig,
    tx: SyncSender<ScanEvent>,
}

impl FanoutWorker {
    fn run(self) {
        loop {
            let index = self.next.fetch_add(1, Ordering::Relaxed);
            let Some(&partition) = self.partitions.get(index) else {
                return;
            };
            let events = scan_partition(&self.store, partition, None, &self.predicate, &self.costs);
            for event in events {
                if self.tx.send(event).is_err() {
                    return;
                }
            }
        }
    }
}

/// Snapshot the matches of one physical partition under its read lock
fn scan_partition(
    store: &PartitionStore,
    partition: PartitionId,
    key: Option<&PartitionKey>,
    predicate: &Predicate,
    costs: &CostConfig,
) -> Vec<ScanEvent> {
    // Each event carries the cost and count of documents scanned since the
    // previous event.
    let mut events = Vec::new();
    let mut pending = RequestCharge::ZERO;
    let mut scanned = 0u64;

    if let Some(handle) = store.partition(partition) {
        let guard = handle.read();
        for stored in guard.scan(key) {
            scanned += 1;
            pending += costs.scan_charge(stored.document().field_count());
            if predicate.matches(stored.document()) {
                events.push(ScanEvent::Match {
                    document: stored.document().clone(),
                    charge: std::mem::take(&mut pending),
                    scanned: std::mem::take(&mut scanned),
                });
            }
        }
    }

    events.push(ScanEvent::Finished {
        charge: pending,
        scanned,
    });
    events
}
