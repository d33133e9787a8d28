#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`ButtonRegistry`**: Owns debounced buttons and runs their shared sampling pass
//! - **`ButtonConfig`** / **`PollConfig`**: Per-button wiring and long-press threshold / pass timing
//! - **`LongPressTimer`**: Compare-and-fire long-press state
//! - **`QuadratureDecoder`**: Gray-code step decoder behind [`TRANSITION_TABLE`]
//! - **`EncoderInterrupt`** / **`RotaryEncoder`**: Interrupt and task halves of an encoder
//! - **`Dispatcher`** / **`Observer`**: Channel-decoupled event delivery
//! - **`PlaybackChannel`**: Single-slot command mailbox for the buzzer
//! - **`BuzzerSequencer`**: Renders [`Note`] pulse trains on an output line
//! - **`TimeSource`**: Trait to implement for your timing system
//!
//! Hardware lines are `embedded-hal` 1.0 digital pins. Every task-side type is
//! driven by a service method returning [`ServiceTiming`], so the crate works
//! under any executor, RTOS or bare super-loop.

// Must stay first so the logging macros are in scope for every module.
mod fmt;

pub mod command;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod long_press;
pub mod quadrature;
pub mod registry;
pub mod sequencer;
pub mod time;
pub mod types;

pub use command::{PlaybackChannel, PlaybackCommand};
pub use debounce::{Debouncer, Edge};
pub use dispatch::{Callback, Dispatcher, Observer};
pub use error::Error;
pub use long_press::{ArmToken, LongPressState, LongPressTimer};
pub use quadrature::{EncoderInterrupt, QuadratureDecoder, RotaryEncoder, TRANSITION_TABLE, encoder};
pub use registry::{ButtonCallback, ButtonConfig, ButtonRegistry, PollConfig};
pub use sequencer::{BuzzerSequencer, Phase, SequencerState};
pub use time::{ServiceTiming, TimeDuration, TimeInstant, TimeSource};
pub use types::{ActiveLevel, ButtonEvent, ButtonId, Direction, EncoderId, Note};
