//! Combat payloads.
//!
//! Sample gameplay events routed through the [`EventHub`](crate::hub::EventHub):
//! gameplay and physics code posts them, health bars, audio and telemetry
//! listeners react. Each carries the frame it was produced on so listeners can
//! tell late deliveries apart.

/// Damage dealt to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Damage {
    /// Target identifier (entity bits, player slot, ...).
    pub target: u64,
    pub amount: u32,
    pub frame: u64,
}

impl Damage {
    pub fn new(target: u64, amount: u32) -> Self {
        Self {
            target,
            amount,
            frame: 0,
        }
    }

    pub fn at_frame(mut self, frame: u64) -> Self {
        self.frame = frame;
        self
    }
}

/// Health restored to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heal {
    pub target: u64,
    pub amount: u32,
    pub frame: u64,
}

impl Heal {
    pub fn new(target: u64, amount: u32) -> Self {
        Self {
            target,
            amount,
            frame: 0,
        }
    }

    pub fn at_frame(mut self, frame: u64) -> Self {
        self.frame = frame;
        self
    }
}

/// A target dropped to zero health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defeated {
    pub target: u64,
    /// Name of whatever dealt the final blow.
    pub by: String,
}
