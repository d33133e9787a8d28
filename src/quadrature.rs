//! Quadrature rotary encoder decoding.
//!
//! The interrupt half ([`EncoderInterrupt`]) runs on every edge of either
//! line: it samples both lines, feeds the [`QuadratureDecoder`] and attempts a
//! non-blocking `try_send`. The task half ([`RotaryEncoder`]) either drains the
//! channel on demand or awaits the next step, and notifies the observer. The
//! bounded `embassy_sync` channel between them is the only thing the two
//! halves share.
//!
//! # Teardown
//!
//! Release the interrupt half first (after detaching it from the interrupt
//! vector), then shut down the task half, which delivers whatever was still
//! queued. Both halves borrow the channel, so it cannot be dropped while
//! either is alive.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::digital::InputPin;

use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::types::{Direction, EncoderId};

/// Step lookup indexed by `(previous_sample << 2) | new_sample`.
///
/// `1` is a clockwise step, `-1` counter-clockwise, `0` no movement or an
/// invalid (double-step) transition.
pub const TRANSITION_TABLE: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

/// Rolling 4-bit window over the last two `(A, B)` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuadratureDecoder {
    window: u8,
}

impl QuadratureDecoder {
    /// Creates a decoder whose previous sample is `(0, 0)`.
    pub const fn new() -> Self {
        Self { window: 0 }
    }

    /// Creates a decoder whose previous sample is the current line levels.
    pub const fn with_levels(a: bool, b: bool) -> Self {
        Self {
            window: Self::pack(a, b),
        }
    }

    /// B occupies bit 1 and A bit 0, so that
    /// `(0,0) -> (0,1) -> (1,1) -> (1,0) -> (0,0)` reads as clockwise.
    #[inline]
    const fn pack(a: bool, b: bool) -> u8 {
        ((b as u8) << 1) | (a as u8)
    }

    /// Shifts in a new sample and returns the decoded step, if any.
    pub fn update(&mut self, a: bool, b: bool) -> Option<Direction> {
        self.window = ((self.window << 2) | Self::pack(a, b)) & 0x0F;
        match TRANSITION_TABLE[self.window as usize] {
            1 => Some(Direction::Clockwise),
            -1 => Some(Direction::CounterClockwise),
            _ => None,
        }
    }

    /// Current 4-bit window.
    pub fn window(&self) -> u8 {
        self.window
    }
}

/// Interrupt-context half of an encoder.
pub struct EncoderInterrupt<'ch, M: RawMutex, A: InputPin, B: InputPin, const N: usize> {
    id: EncoderId,
    line_a: A,
    line_b: B,
    decoder: QuadratureDecoder,
    events: &'ch Channel<M, Direction, N>,
    dropped: u32,
}

impl<'ch, M: RawMutex, A: InputPin, B: InputPin, const N: usize> EncoderInterrupt<'ch, M, A, B, N> {
    /// Handles an edge on either line. Never blocks.
    ///
    /// Returns the decoded step, whether or not it fit in the channel. A step
    /// that does not fit is dropped and counted.
    pub fn on_edge(&mut self) -> Option<Direction> {
        // A failed read is treated as no change on that line.
        let previous = self.decoder.window() & 0b11;
        let a = self.line_a.is_high().unwrap_or(previous & 0b01 != 0);
        let b = self.line_b.is_high().unwrap_or(previous & 0b10 != 0);

        let direction = self.decoder.update(a, b)?;
        if self.events.try_send(direction).is_err() {
            self.dropped = self.dropped.saturating_add(1);
        }
        Some(direction)
    }

    /// Number of decoded steps dropped because the channel was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn id(&self) -> EncoderId {
        self.id
    }

    /// De-registers the interrupt half and hands the lines back.
    ///
    /// Call this once the edge interrupt no longer reaches [`on_edge`](Self::on_edge).
    pub fn release(self) -> (A, B) {
        if self.dropped > 0 {
            warn!("encoder {}: {} events dropped on full channel", self.id.0, self.dropped);
        }
        info!("encoder {}: interrupt released", self.id.0);
        (self.line_a, self.line_b)
    }
}

/// Task-context half of an encoder.
pub type RotaryEncoder<'ch, M, C, const N: usize> = Dispatcher<'ch, M, EncoderId, Direction, C, N>;

impl<'ch, M: RawMutex, C, const N: usize> Dispatcher<'ch, M, EncoderId, Direction, C, N> {
    /// Delivers what is still queued and drops the task half.
    ///
    /// Call after [`EncoderInterrupt::release`] so nothing is sent after
    /// the final drain. Returns the number of events delivered.
    pub fn shutdown(mut self) -> usize {
        let delivered = self.dispatch();
        info!("encoder {}: shut down, {} events drained", self.source().0, delivered);
        delivered
    }
}

/// Creates an encoder over `events`, split into its interrupt and task halves.
///
/// Fails with `InvalidArgument` if the channel cannot hold a single event and
/// with `LineClaimFailed` if either line cannot be read.
pub fn encoder<'ch, M, A, B, C, const N: usize>(
    id: EncoderId,
    events: &'ch Channel<M, Direction, N>,
    mut line_a: A,
    mut line_b: B,
) -> Result<(EncoderInterrupt<'ch, M, A, B, N>, RotaryEncoder<'ch, M, C, N>), Error>
where
    M: RawMutex,
    A: InputPin,
    B: InputPin,
{
    if N == 0 {
        return Err(Error::InvalidArgument);
    }

    let a = line_a.is_high().map_err(|_| Error::LineClaimFailed)?;
    let b = line_b.is_high().map_err(|_| Error::LineClaimFailed)?;

    let interrupt = EncoderInterrupt {
        id,
        line_a,
        line_b,
        decoder: QuadratureDecoder::with_levels(a, b),
        events,
        dropped: 0,
    };

    info!("encoder {} created", id.0);
    Ok((interrupt, Dispatcher::new(id, events)))
}
