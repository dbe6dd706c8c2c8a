//! Edge Mutator
//!
//! Creates and removes many-to-many edges (likes, project tags, user technologies) and hands
//! the resulting counter deltas to the [`counters::CounterEngine`]. Uniqueness of every pair
//! is enforced by the schema; the mutator turns constraint hits into no-ops or conflicts
//! depending on the edge kind.

pub mod associations;
pub mod counters;
pub mod likes;
pub mod slug;

pub use counters::{CounterEngine, CounterPairing, MutationOutcome};
pub use slug::{normalize_slug, TagLabel};

use crate::db::Database;

#[derive(Clone)]
pub struct EdgeMutator {
    engine: CounterEngine,
}

impl EdgeMutator {
    pub fn new(db: Database, pairing: CounterPairing) -> Self {
        Self {
            engine: CounterEngine::new(db, pairing),
        }
    }

    fn db(&self) -> &Database {
        self.engine.database()
    }
}
