//! Bounded loop policy
//!
//! Relaxation steps and augmentation rounds are both "try again, but at most N
//! times" loops. [`RoundBudget`] makes N a named value that can be asserted on.

/// A fixed number of rounds, consumed one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundBudget {
    max_rounds: u32,
    used: u32,
}

impl RoundBudget {
    pub const fn new(max_rounds: u32) -> Self {
        Self {
            max_rounds,
            used: 0,
        }
    }

    /// Budget for a relaxation loop: the strict attempt plus one per step
    pub const fn with_relaxation(max_relax_steps: u32) -> Self {
        Self::new(max_relax_steps.saturating_add(1))
    }

    /// Claim the next round. Returns its 1-based number, or None when exhausted.
    pub fn next_round(&mut self) -> Option<u32> {
        if self.used >= self.max_rounds {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max_rounds
    }
}
