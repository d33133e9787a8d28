//! Two-sample debounce filter for a single button line.
//!
//! A transition is trusted only when the new level is seen twice: once when the
//! sampling pass detects it, and again after the debounce window has elapsed.
//! [`Debouncer::sample`] performs the detection, [`Debouncer::confirm`] the
//! re-sample. Levels are logical ("active"), already mapped through the
//! button's [`ActiveLevel`](crate::ActiveLevel).

/// A debounced edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// inactive -> active
    Rising,
    /// active -> inactive
    Falling,
}

/// Per-button filter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    /// Most recent sample.
    raw: bool,
    /// Last trusted level.
    debounced: bool,
}

impl Debouncer {
    /// Creates a filter settled at `initial`.
    pub const fn new(initial: bool) -> Self {
        Self {
            raw: initial,
            debounced: initial,
        }
    }

    /// Records a sample taken by the sampling pass.
    ///
    /// Returns `true` if it differs from the trusted level, meaning the caller
    /// must wait one debounce window and then call [`confirm`](Self::confirm).
    pub fn sample(&mut self, active: bool) -> bool {
        self.raw = active;
        self.raw != self.debounced
    }

    /// Records the re-sample taken after the debounce window.
    ///
    /// If the new level held, the trusted level moves and the edge is returned.
    /// Otherwise the detection is discarded as noise and the raw level reverts.
    pub fn confirm(&mut self, active: bool) -> Option<Edge> {
        if active == self.debounced {
            self.raw = self.debounced;
            return None;
        }

        self.raw = active;
        self.debounced = active;
        Some(if active { Edge::Rising } else { Edge::Falling })
    }

    /// Abandons a detection that will never be confirmed.
    pub fn settle(&mut self) {
        self.raw = self.debounced;
    }

    /// Last trusted level.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.debounced
    }

    /// Most recent sample, trusted or not.
    #[inline]
    pub fn raw(&self) -> bool {
        self.raw
    }
}
