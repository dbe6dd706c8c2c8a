//! Counter Consistency Engine
//! Mission: Keep denormalized counters equal to the edge rows they summarize
//!
//! Every adjustment is one in-place `UPDATE ... SET c = MAX(c + ?, 0)` so two concurrent
//! adjustments on the same row cannot lose an update. How an adjustment is paired with the
//! edge write that caused it is governed by [`CounterPairing`]:
//!
//! - `BestEffort`: the edge commits on its own; a failing adjustment is logged and reported
//!   through [`MutationOutcome::counters_synced`], the edge stays.
//! - `Transactional`: edge and adjustments share one SQLite transaction and roll back together.

use crate::{
    db::Database,
    error::{AppError, AppResult},
};
use rusqlite::{params, Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterPairing {
    #[default]
    BestEffort,
    Transactional,
}

impl CounterPairing {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "best_effort" | "best-effort" => Some(CounterPairing::BestEffort),
            "transactional" => Some(CounterPairing::Transactional),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterPairing::BestEffort => "best_effort",
            CounterPairing::Transactional => "transactional",
        }
    }
}

/// Aggregate fields maintained by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterField {
    ProjectLikes,
    TagUsage,
}

impl CounterField {
    fn update_sql(self) -> &'static str {
        match self {
            CounterField::ProjectLikes => {
                "UPDATE projects SET like_count = MAX(like_count + ?1, 0) WHERE id = ?2"
            }
            CounterField::TagUsage => {
                "UPDATE tags SET usage_count = MAX(usage_count + ?1, 0) WHERE id = ?2"
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterField::ProjectLikes => "project.like_count",
            CounterField::TagUsage => "tag.usage_count",
        }
    }
}

/// One pending adjustment produced by an edge write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDelta {
    pub field: CounterField,
    pub entity_id: String,
    pub delta: i64,
}

impl CounterDelta {
    pub fn increment(field: CounterField, entity_id: impl Into<String>) -> Self {
        Self {
            field,
            entity_id: entity_id.into(),
            delta: 1,
        }
    }

    pub fn decrement(field: CounterField, entity_id: impl Into<String>) -> Self {
        Self {
            field,
            entity_id: entity_id.into(),
            delta: -1,
        }
    }
}

/// Result of one edge mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    /// False when the call was an idempotent no-op.
    pub changed: bool,
    /// False when an adjustment failed after the edge committed (best-effort only).
    pub counters_synced: bool,
}

impl MutationOutcome {
    pub const UNCHANGED: Self = Self {
        changed: false,
        counters_synced: true,
    };
}

/// Apply `field += delta` on one row. Fails if the row does not exist.
pub fn adjust(conn: &Connection, field: CounterField, entity_id: &str, delta: i64) -> AppResult<()> {
    let updated = conn
        .prepare_cached(field.update_sql())?
        .execute(params![delta, entity_id])?;
    if updated == 0 {
        return Err(AppError::NotFound(match field {
            CounterField::ProjectLikes => "project",
            CounterField::TagUsage => "tag",
        }));
    }
    Ok(())
}

/// Merge deltas on the same counter and drop the ones that cancel out.
pub fn coalesce(deltas: Vec<CounterDelta>) -> Vec<CounterDelta> {
    let mut merged: Vec<CounterDelta> = Vec::with_capacity(deltas.len());
    for d in deltas {
        match merged
            .iter_mut()
            .find(|m| m.field == d.field && m.entity_id == d.entity_id)
        {
            Some(existing) => existing.delta += d.delta,
            None => merged.push(d),
        }
    }
    merged.retain(|d| d.delta != 0);
    merged
}

/// Counter adjustments owed for edge rows written so far.
///
/// Edge code records a delta right after the write that causes it succeeds, so the ledger
/// always describes what actually landed, even when a later write in the same mutation fails.
#[derive(Debug, Default)]
pub struct PendingDeltas {
    deltas: Vec<CounterDelta>,
}

impl PendingDeltas {
    pub fn push(&mut self, delta: CounterDelta) {
        self.deltas.push(delta);
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    fn drain(self) -> Vec<CounterDelta> {
        coalesce(self.deltas)
    }
}

/// Runs edge writes and pairs them with their counter adjustments.
#[derive(Clone)]
pub struct CounterEngine {
    db: Database,
    pairing: CounterPairing,
}

impl CounterEngine {
    pub fn new(db: Database, pairing: CounterPairing) -> Self {
        Self { db, pairing }
    }

    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    /// Run `edge`, then apply the deltas it recorded.
    ///
    /// `edge` returns `Ok(false)` for a no-op. Under `BestEffort` an error from `edge` still
    /// settles whatever it recorded before failing, since those rows are already committed.
    /// Under `Transactional` the error rolls everything back.
    pub fn apply<F>(&self, edge: F) -> AppResult<MutationOutcome>
    where
        F: FnOnce(&Connection, &mut PendingDeltas) -> AppResult<bool>,
    {
        let mut conn = self.db.lock();
        let mut pending = PendingDeltas::default();
        match self.pairing {
            CounterPairing::BestEffort => match edge(&conn, &mut pending) {
                Ok(false) => Ok(MutationOutcome::UNCHANGED),
                Ok(true) => Ok(MutationOutcome {
                    changed: true,
                    counters_synced: settle(&conn, pending),
                }),
                Err(e) => {
                    if !pending.is_empty() {
                        warn!(
                            error = %e,
                            "Edge write failed partway, settling counters for committed rows"
                        );
                        settle(&conn, pending);
                    }
                    Err(e)
                }
            },
            CounterPairing::Transactional => {
                // Take the write lock up front so a second connection waits on the busy
                // timeout instead of failing mid-transaction.
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                if !edge(&tx, &mut pending)? {
                    return Ok(MutationOutcome::UNCHANGED);
                }
                for d in pending.drain() {
                    adjust(&tx, d.field, &d.entity_id, d.delta).map_err(|e| {
                        warn!(
                            counter = d.field.as_str(),
                            entity_id = %d.entity_id,
                            error = %e,
                            "Counter adjustment failed, rolling back edge"
                        );
                        e
                    })?;
                }
                tx.commit()?;
                debug!("Edge and counters committed together");
                Ok(MutationOutcome {
                    changed: true,
                    counters_synced: true,
                })
            }
        }
    }
}

/// Apply every pending delta on its own. Returns false if any adjustment failed.
fn settle(conn: &Connection, pending: PendingDeltas) -> bool {
    let mut synced = true;
    for d in pending.drain() {
        if let Err(e) = adjust(conn, d.field, &d.entity_id, d.delta) {
            warn!(
                counter = d.field.as_str(),
                entity_id = %d.entity_id,
                delta = d.delta,
                error = %e,
                "Counter adjustment failed after edge commit, counter is out of sync"
            );
            synced = false;
        }
    }
    synced
}
