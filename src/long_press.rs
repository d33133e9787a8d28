//! Per-button long-press timer state with compare-and-fire semantics.
//!
//! The sampling pass arms and cancels the timer; the timer service fires it.
//! Both run through `&mut` access to the owning registry, so the state is a
//! plain word. State and arm generation live in that one word: a fire only
//! wins against the exact arming it was scheduled for, and never after a
//! cancel or re-arm.

const STATE_BITS: u32 = 2;
const STATE_MASK: u32 = (1 << STATE_BITS) - 1;
const GENERATION_MASK: u32 = u32::MAX >> STATE_BITS;

const IDLE: u32 = 0;
const ARMED: u32 = 1;
const FIRED: u32 = 2;

/// Observable timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LongPressState {
    Idle,
    Armed,
    Fired,
}

/// Identifies one arming of a [`LongPressTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArmToken(u32);

/// One-shot long-press timer state: `Idle -> Armed -> Fired -> Idle`.
#[derive(Debug, Default)]
pub struct LongPressTimer {
    word: u32,
}

impl LongPressTimer {
    pub const fn new() -> Self {
        Self { word: IDLE }
    }

    /// Arms the timer for a new press, superseding any earlier arming.
    pub fn arm(&mut self) -> ArmToken {
        let generation = (self.word >> STATE_BITS).wrapping_add(1) & GENERATION_MASK;
        self.word = (generation << STATE_BITS) | ARMED;
        ArmToken(generation)
    }

    /// Cancels the timer. Returns `true` if it was armed and had not fired.
    ///
    /// Once this returns, no fire for any earlier arming can succeed.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.word & STATE_MASK == ARMED;
        self.word = (self.word & !STATE_MASK) | IDLE;
        was_armed
    }

    /// Fires the arming identified by `token`.
    ///
    /// Succeeds at most once per arming, and only if no cancel or re-arm has
    /// happened since.
    pub fn try_fire(&mut self, token: ArmToken) -> bool {
        if self.word != (token.0 << STATE_BITS) | ARMED {
            return false;
        }
        self.word = (token.0 << STATE_BITS) | FIRED;
        true
    }

    /// Current state.
    pub fn state(&self) -> LongPressState {
        match self.word & STATE_MASK {
            ARMED => LongPressState::Armed,
            FIRED => LongPressState::Fired,
            _ => LongPressState::Idle,
        }
    }
}
