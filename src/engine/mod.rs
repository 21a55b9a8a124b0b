mod conflict;
mod error;
mod mutations;
mod pricing;
mod queries;
mod store;

pub use conflict::{first_overlap, is_overlapping};
pub use error::EngineError;
pub use pricing::{billable_minutes, calculate_price, DOUBLES_MULTIPLIER};
pub use store::InMemoryStore;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, RwLock};

use crate::model::*;
use crate::wal::{Replay, Wal};

use store::apply_to_court;

pub type SharedCourtState = Arc<RwLock<CourtState>>;

/// Knobs for how strictly reservation edits are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// Re-run the overlap check when a reservation is updated or patched.
    /// `false` only checks on create.
    pub check_overlap_on_update: bool,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            check_overlap_on_update: true,
        }
    }
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit:
/// wait for one append, drain whatever else is already queued, then flush and
/// fsync once for the whole batch and answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        respond_batch(batch, &result);

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

/// Stage and fsync the whole batch, or nothing. On any failure the staged
/// bytes are dropped and the file stays at its last committed length.
fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    if let Err(e) = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
    {
        wal.discard_pending();
        return Err(e);
    }
    wal.flush_sync()
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// The record store plus the reservation rules that guard every write.
///
/// Locking: every mutation holds `commit_gate` shared (compaction takes it
/// exclusively), then court write locks in id order, then `surface_write`,
/// then `customer_write`. Never acquire them in another order.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) policy: ReservationPolicy,
    pub(super) commit_gate: RwLock<()>,
    /// Serializes surface-name uniqueness and surface liveness checks.
    pub(super) surface_write: Mutex<()>,
    /// Serializes phone-number uniqueness and customer upserts.
    pub(super) customer_write: Mutex<()>,
}

impl Engine {
    pub fn new(wal_path: PathBuf, policy: ReservationPolicy) -> io::Result<Self> {
        let Replay { events, valid_len } = Wal::replay(&wal_path)?;
        let dropped = Wal::truncate_to(&wal_path, valid_len)?;
        if dropped > 0 {
            tracing::warn!(
                "discarded {dropped} unreadable trailing bytes from {}",
                wal_path.display()
            );
        }
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: InMemoryStore::new(),
            wal_tx,
            policy,
            commit_gate: RwLock::new(()),
            surface_write: Mutex::new(()),
            customer_write: Mutex::new(()),
        };

        // We are the only owner of every court lock here, so try_write never
        // contends. Blocking lock calls are off limits because this may run
        // inside an async context.
        for event in &events {
            engine.store.apply_event(event);
            for court_id in event.court_ids() {
                if let Some(cs) = engine.store.court_state(&court_id) {
                    let mut guard = cs
                        .try_write()
                        .map_err(|_| io::Error::other("replay: court state locked"))?;
                    apply_to_court(&mut guard, event);
                }
            }
        }
        tracing::info!(
            "replayed {} events from {}",
            events.len(),
            wal_path.display()
        );

        Ok(engine)
    }

    pub fn policy(&self) -> ReservationPolicy {
        self.policy
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append, then apply to the store and to every locked court the event touches.
    /// Nothing in memory changes if the append fails.
    pub(super) async fn persist_and_apply(
        &self,
        event: &Event,
        courts: &mut [&mut CourtState],
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(event);
        for cs in courts.iter_mut() {
            apply_to_court(cs, event);
        }
        Ok(())
    }

    /// Minute price of the court's surface. Soft-deleted surfaces still price
    /// the courts that reference them.
    pub(super) fn surface_rate(&self, court: &Court) -> Result<u32, EngineError> {
        self.store
            .surface(&court.surface_id)
            .map(|s| s.minute_price)
            .ok_or(EngineError::NotFound(RecordKind::Surface, court.surface_id))
    }
}
