//! Password Hashing
//! Mission: Slow, salted, one-way. Mismatch is an answer, not an error.

use crate::error::AppResult;
use bcrypt::{hash, verify};
use std::sync::OnceLock;

/// Lowest work factor bcrypt accepts.
pub const MIN_COST: u32 = 4;
/// Highest work factor bcrypt accepts.
pub const MAX_COST: u32 = 31;

/// bcrypt wrapper with a configurable work factor.
///
/// Cost 10 lands verification in the tens of milliseconds on current hardware.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: 10 }
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password into a storable digest.
    pub fn hash(&self, plaintext: &str) -> AppResult<String> {
        Ok(hash(plaintext, self.cost)?)
    }

    /// Check `plaintext` against `digest`. `Ok(false)` on mismatch; `Err` only when the
    /// digest itself is unusable.
    pub fn verify(&self, digest: &str, plaintext: &str) -> AppResult<bool> {
        Ok(verify(plaintext, digest)?)
    }

    /// Burn the same work a real verification would, for accounts that do not exist.
    pub fn verify_dummy(&self, plaintext: &str) {
        static DUMMY: OnceLock<Option<String>> = OnceLock::new();
        let cost = self.cost;
        let digest = DUMMY.get_or_init(|| hash("dummy-password-for-timing", cost).ok());
        if let Some(digest) = digest {
            let _ = verify(plaintext, digest);
        }
    }
}
