//! Core value types shared by the input and playback halves of the crate.

use crate::time::TimeDuration;

/// Identifies a button within a [`ButtonRegistry`](crate::ButtonRegistry).
///
/// Ids are stable slot indices: an id stays valid until its button is deleted,
/// after which the slot may be reused by a later `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonId(pub usize);

impl From<usize> for ButtonId {
    fn from(id: usize) -> Self {
        ButtonId(id)
    }
}

impl From<ButtonId> for usize {
    fn from(id: ButtonId) -> Self {
        id.0
    }
}

/// Identifies a rotary encoder. Chosen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderId(pub u8);

/// Electrical level that means "pressed" for a button's wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveLevel {
    /// Pressed pulls the line low (pull-up wiring).
    #[default]
    Low,

    /// Pressed drives the line high (pull-down wiring).
    High,
}

impl ActiveLevel {
    /// Maps a raw line level to "is the button active".
    #[inline]
    pub fn is_active(self, line_high: bool) -> bool {
        match self {
            ActiveLevel::Low => !line_high,
            ActiveLevel::High => line_high,
        }
    }
}

/// A debounced button event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    /// The button became active.
    Press,

    /// The button became inactive.
    Release,

    /// The button has been held past its long-press threshold.
    LongPress,
}

/// Rotation direction of a quadrature encoder step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

/// A playable pulse train: `repeat` cycles of `on` high followed by `off` low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Note<D> {
    /// Time the output is held high in each cycle.
    pub on: D,

    /// Time the output is held low in each cycle.
    pub off: D,

    /// Number of on/off cycles.
    pub repeat: u32,
}

impl<D: TimeDuration> Note<D> {
    /// Creates a new note.
    #[inline]
    pub const fn new(on: D, off: D, repeat: u32) -> Self {
        Self { on, off, repeat }
    }

    /// The fallback pattern used when no default note is configured.
    pub fn fallback() -> Self {
        Self::new(
            D::from_millis(DEFAULT_NOTE_ON_MS),
            D::from_millis(DEFAULT_NOTE_OFF_MS),
            DEFAULT_NOTE_REPEAT,
        )
    }

    /// True if rendering this note would never drive the output.
    pub fn is_silent(&self) -> bool {
        self.repeat == 0 || (self.on == D::ZERO && self.off == D::ZERO)
    }
}

/// Default on time of [`Note::fallback`].
pub const DEFAULT_NOTE_ON_MS: u64 = 100;
/// Default off time of [`Note::fallback`].
pub const DEFAULT_NOTE_OFF_MS: u64 = 50;
/// Default repeat count of [`Note::fallback`].
pub const DEFAULT_NOTE_REPEAT: u32 = 30;
