//! Query Service Worker Pool
//!
//! Runs virtual channel queries on a fixed pool of worker threads. Callers
//! submit [`Query`] messages over a bounded crossbeam channel and receive the
//! result on a per-query reply channel.
//!
//! # Sharing
//!
//! Workers share one `Arc<Dispatcher>`: the registry is read-only and the
//! handler caches are internally locked, so no other state crosses threads.
//! Each query runs synchronously on one worker from start to finish.
//!
//! # Shutdown
//!
//! [`QueryService::shutdown`] (or dropping the service) stops accepting new
//! queries, lets every worker finish the query it is running and joins the
//! threads. Queries still queued at that point are answered with
//! [`TlmError::ServiceStopped`].

use crate::config::ServiceSettings;
use crate::error::{Result, TlmError};
use crate::registry::Dispatcher;
use crate::types::{ComputedResult, StatInterval, UnitSystem};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// One virtual channel request
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Channel name
    pub name: String,
    /// Range start (CXC seconds)
    pub tstart: f64,
    /// Range stop (CXC seconds, exclusive)
    pub tstop: f64,
    /// Statistics interval, for roll-up queries
    pub interval: Option<StatInterval>,
    /// Output unit system
    pub unit_system: Option<UnitSystem>,
}

impl Query {
    /// Full-resolution query in the handler's own units
    pub fn new(name: impl Into<String>, tstart: f64, tstop: f64) -> Self {
        Self {
            name: name.into(),
            tstart,
            tstop,
            interval: None,
            unit_system: None,
        }
    }

    /// Request a statistics roll-up
    pub fn with_interval(mut self, interval: StatInterval) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Request output in a unit system
    pub fn with_units(mut self, system: UnitSystem) -> Self {
        self.unit_system = Some(system);
        self
    }
}

/// Commands accepted by the workers
enum ServiceCommand {
    /// Run a query and send the result on `reply`
    Run {
        query: Query,
        reply: Sender<Result<ComputedResult>>,
    },
    /// Stop one worker
    Shutdown,
}

/// Handle to a submitted query
#[derive(Debug)]
pub struct PendingQuery {
    reply: Receiver<Result<ComputedResult>>,
}

impl PendingQuery {
    /// Block until the result is available
    pub fn wait(self) -> Result<ComputedResult> {
        self.reply.recv().map_err(|_| TlmError::ServiceStopped)?
    }

    /// Result if the query has finished
    pub fn try_get(&self) -> Option<Result<ComputedResult>> {
        self.reply.try_recv().ok()
    }
}

/// Counters shared by the workers
#[derive(Debug, Default)]
struct ServiceStats {
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Fixed-size pool of query workers
pub struct QueryService {
    command_tx: Sender<ServiceCommand>,
    workers: Vec<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    stats: Arc<ServiceStats>,
}

impl QueryService {
    /// Spawn `settings.workers` threads (at least one) serving `dispatcher`
    pub fn start(dispatcher: Arc<Dispatcher>, settings: &ServiceSettings) -> Result<Self> {
        let (command_tx, command_rx) = bounded(settings.queue_depth.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(ServiceStats::default());
        let n = settings.workers.max(1);

        let mut workers = Vec::with_capacity(n);
        for i in 0..n {
            let worker = QueryWorker {
                id: i,
                dispatcher: dispatcher.clone(),
                command_rx: command_rx.clone(),
                running: running.clone(),
                stats: stats.clone(),
            };
            let handle = std::thread::Builder::new()
                .name(format!("query-worker-{}", i))
                .spawn(move || worker.run())?;
            workers.push(handle);
        }

        tracing::info!("Query service started with {} workers", n);
        Ok(Self {
            command_tx,
            workers,
            running,
            stats,
        })
    }

    /// Queue a query; blocks while the queue is full
    pub fn submit(&self, query: Query) -> Result<PendingQuery> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TlmError::ServiceStopped);
        }
        let (reply, rx) = bounded(1);
        self.command_tx
            .send(ServiceCommand::Run { query, reply })
            .map_err(|_| TlmError::ServiceStopped)?;
        Ok(PendingQuery { reply: rx })
    }

    /// Run a query and wait for its result
    pub fn query(&self, query: Query) -> Result<ComputedResult> {
        self.submit(query)?.wait()
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// `(completed, failed)` query counts
    pub fn stats(&self) -> (u64, u64) {
        (
            self.stats.completed.load(Ordering::Relaxed),
            self.stats.failed.load(Ordering::Relaxed),
        )
    }

    /// Stop the workers and wait for them to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        for _ in 0..self.workers.len() {
            let _ = self.command_tx.send(ServiceCommand::Shutdown);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Query worker panicked");
            }
        }
        tracing::info!("Query service stopped");
    }
}

impl Drop for QueryService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("workers", &self.workers.len())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

/// One worker thread's state
struct QueryWorker {
    id: usize,
    dispatcher: Arc<Dispatcher>,
    command_rx: Receiver<ServiceCommand>,
    running: Arc<AtomicBool>,
    stats: Arc<ServiceStats>,
}

impl QueryWorker {
    /// Serve commands until shutdown or until every sender is gone
    fn run(self) {
        tracing::debug!("Query worker {} started", self.id);
        while let Ok(cmd) = self.command_rx.recv() {
            match cmd {
                ServiceCommand::Run { query, reply } => {
                    if !self.running.load(Ordering::SeqCst) {
                        let _ = reply.send(Err(TlmError::ServiceStopped));
                        continue;
                    }
                    let result = self.handle_query(&query);
                    // The caller may have dropped its handle
                    let _ = reply.send(result);
                }
                ServiceCommand::Shutdown => break,
            }
        }
        tracing::debug!("Query worker {} stopped", self.id);
    }

    fn handle_query(&self, query: &Query) -> Result<ComputedResult> {
        let result = self.dispatcher.dispatch(
            &query.name,
            query.tstart,
            query.tstop,
            query.interval,
            query.unit_system,
        );
        match &result {
            Ok(r) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Worker {} answered {} ({} samples)", self.id, query.name, r.len());
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Worker {} failed {}: {}", self.id, query.name, e);
            }
        }
        result
    }
}
