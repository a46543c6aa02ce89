/// Consecutive identical offsets required before the top is declared reached.
pub const DEFAULT_STABLE_SAMPLES: u32 = 3;
/// Scroll commands issued before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollVerdict {
    /// Keep scrolling and sample again.
    Continue,
    /// The offset held still long enough; the pane is at its top.
    Converged { attempts: u32 },
    /// Attempt budget exhausted; processing carries on best-effort.
    GaveUp { attempts: u32 },
}

/// Decides when a lazily-loading message pane has reached its top.
///
/// Each sample is the offset read after one "scroll to top" command. Older
/// messages loading in push the offset back down, so the top is only
/// reached once the offset stops changing for several samples in a row.
#[derive(Debug, Clone)]
pub struct ScrollConvergence {
    stable_required: u32,
    max_attempts: u32,
    previous: i64,
    stable: u32,
    attempts: u32,
}

impl ScrollConvergence {
    pub fn new(initial_offset: i64) -> Self {
        Self::with_budget(initial_offset, DEFAULT_STABLE_SAMPLES, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_budget(initial_offset: i64, stable_required: u32, max_attempts: u32) -> Self {
        Self {
            stable_required: stable_required.max(1),
            max_attempts: max_attempts.max(1),
            previous: initial_offset,
            stable: 0,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Feeds the offset sampled after one more scroll command.
    pub fn observe(&mut self, offset: i64) -> ScrollVerdict {
        self.attempts += 1;
        if offset == self.previous {
            self.stable += 1;
        } else {
            self.stable = 0;
        }
        self.previous = offset;

        if self.stable >= self.stable_required {
            ScrollVerdict::Converged {
                attempts: self.attempts,
            }
        } else if self.attempts >= self.max_attempts {
            ScrollVerdict::GaveUp {
                attempts: self.attempts,
            }
        } else {
            ScrollVerdict::Continue
        }
    }
}
