//! Button registry and the shared sampling pass.
//!
//! [`ButtonRegistry`] owns every live button in fixed, id-indexed slots. One
//! sampling pass covers all buttons and repeats at a fixed period. When a pass
//! detects a level change it suspends, as a whole, for one debounce window and
//! then re-samples that button before moving on to the next one. A bouncing
//! button therefore delays sampling of the buttons after it by at most one
//! window per detection.
//!
//! The registry is driven from two contexts:
//! - the sampling task calls [`poll`](ButtonRegistry::poll);
//! - the timer service calls [`service_long_press`](ButtonRegistry::service_long_press).
//!
//! Both may be the same task (see [`service`](ButtonRegistry::service)). Adding
//! and removing buttons takes `&mut self`, so it can never interleave with a
//! pass; deleting the button a pass is suspended on simply skips it.

use embedded_hal::digital::InputPin;

use crate::debounce::{Debouncer, Edge};
use crate::dispatch::Callback;
use crate::error::Error;
use crate::long_press::{ArmToken, LongPressState, LongPressTimer};
use crate::time::{ServiceTiming, TimeDuration, TimeInstant, TimeSource, deadline_after, remaining};
use crate::types::{ActiveLevel, ButtonEvent, ButtonId};

/// Default period between sampling passes.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;
/// Default debounce window.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Button observer: `(button, event, context)`.
pub type ButtonCallback<C> = Callback<ButtonId, ButtonEvent, C>;

/// Timing of the shared sampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollConfig<D> {
    /// Period between the starts of consecutive passes.
    pub poll_interval: D,
    /// How long a new level must hold before it is trusted.
    pub debounce_window: D,
}

impl<D: TimeDuration> Default for PollConfig<D> {
    fn default() -> Self {
        Self {
            poll_interval: D::from_millis(DEFAULT_POLL_INTERVAL_MS),
            debounce_window: D::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// Per-button configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonConfig<D, C> {
    /// Line level that means "pressed".
    pub active_level: ActiveLevel,
    /// Hold time before a long press fires. Zero disables long presses.
    pub long_press: D,
    /// Opaque user context handed to the observer.
    pub context: C,
}

impl<D: TimeDuration, C> ButtonConfig<D, C> {
    /// Creates a configuration with long presses disabled.
    pub fn new(active_level: ActiveLevel, context: C) -> Self {
        Self {
            active_level,
            long_press: D::ZERO,
            context,
        }
    }

    /// Sets the long-press threshold.
    pub fn long_press(mut self, threshold: D) -> Self {
        self.long_press = threshold;
        self
    }
}

struct ButtonSlot<I: TimeInstant, P, C> {
    line: P,
    active_level: ActiveLevel,
    long_press: I::Duration,
    debouncer: Debouncer,
    timer: LongPressTimer,
    pending_fire: Option<(I, ArmToken)>,
    callback: Option<ButtonCallback<C>>,
    context: C,
}

impl<I: TimeInstant, P: InputPin, C> ButtonSlot<I, P, C> {
    /// Reads the line as "active". `None` on a read error.
    fn read(&mut self) -> Option<bool> {
        let high = self.line.is_high().ok()?;
        Some(self.active_level.is_active(high))
    }

    fn notify(&self, id: ButtonId, event: ButtonEvent) {
        if let Some(callback) = self.callback {
            callback(id, event, &self.context);
        }
    }
}

/// Where the sampling pass stands.
#[derive(Debug, Clone, Copy)]
enum Pass<I> {
    /// Between passes. The next one starts at `next`, or right away if `None`.
    Between { next: Option<I> },
    /// Suspended in a debounce wait on slot `index` until `until`.
    Debouncing { index: usize, until: I, started: I },
    /// Suspension abandoned; continue the pass at slot `index`.
    Resume { index: usize, started: I },
}

/// Owns a set of buttons and runs their sampling pass.
///
/// # Type Parameters
/// * `'t` - Lifetime of the time source reference
/// * `I` - Time instant type
/// * `P` - Input line type (same for all buttons)
/// * `T` - Time source implementation type
/// * `C` - Observer context type
/// * `MAX_BUTTONS` - Maximum number of buttons this registry can hold
pub struct ButtonRegistry<'t, I: TimeInstant, P: InputPin, T: TimeSource<I>, C, const MAX_BUTTONS: usize> {
    slots: [Option<ButtonSlot<I, P, C>>; MAX_BUTTONS],
    time_source: &'t T,
    config: PollConfig<I::Duration>,
    pass: Pass<I>,
    running: bool,
}

impl<'t, I, P, T, C, const MAX_BUTTONS: usize> ButtonRegistry<'t, I, P, T, C, MAX_BUTTONS>
where
    I: TimeInstant,
    P: InputPin,
    T: TimeSource<I>,
{
    /// Creates an empty, stopped registry.
    pub fn new(time_source: &'t T, config: PollConfig<I::Duration>) -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            time_source,
            config,
            pass: Pass::Between { next: None },
            running: false,
        }
    }

    /// Claims `line` as a new button.
    ///
    /// The button starts settled at the line's current level. The first button
    /// starts sampling.
    ///
    /// # Errors
    /// * `InvalidArgument` - The registry's poll interval is zero
    /// * `AllocationFailed` - Every slot is taken
    /// * `LineClaimFailed` - The line could not be read; it is dropped
    pub fn create(&mut self, mut line: P, config: ButtonConfig<I::Duration, C>) -> Result<ButtonId, Error> {
        if self.config.poll_interval == I::Duration::ZERO {
            return Err(Error::InvalidArgument);
        }

        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::AllocationFailed)?;

        let high = line.is_high().map_err(|_| Error::LineClaimFailed)?;
        let active = config.active_level.is_active(high);

        self.slots[index] = Some(ButtonSlot {
            line,
            active_level: config.active_level,
            long_press: config.long_press,
            debouncer: Debouncer::new(active),
            timer: LongPressTimer::new(),
            pending_fire: None,
            callback: None,
            context: config.context,
        });

        if !self.running {
            self.running = true;
            self.pass = Pass::Between { next: None };
            info!("button sampling started");
        }

        info!("button {} created", index);
        Ok(ButtonId(index))
    }

    /// Registers the observer for `id`, replacing any previous one.
    ///
    /// # Errors
    /// Returns `NotFound` if the button does not exist.
    pub fn register_observer(&mut self, id: ButtonId, callback: ButtonCallback<C>) -> Result<(), Error> {
        let slot = self.slot_mut(id)?;
        slot.callback = Some(callback);
        Ok(())
    }

    /// Removes a button and hands its line back.
    ///
    /// Its long-press timer is cancelled first. Deleting the last button stops
    /// sampling.
    ///
    /// # Errors
    /// Returns `NotFound` if the button does not exist.
    pub fn delete(&mut self, id: ButtonId) -> Result<P, Error> {
        let mut slot = self
            .slots
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(Error::NotFound)?;

        slot.timer.cancel();

        if let Pass::Debouncing { index, started, .. } = self.pass {
            if index == id.0 {
                trace!("button {}: debounce wait abandoned", index);
                self.pass = Pass::Resume {
                    index: index + 1,
                    started,
                };
            }
        }

        info!("button {} deleted", id.0);

        if self.is_empty() {
            self.running = false;
            self.pass = Pass::Between { next: None };
            info!("button sampling stopped");
        }

        Ok(slot.line)
    }

    /// Runs the sampling pass as far as it can go right now.
    ///
    /// # Returns
    /// - `ServiceTiming::Delay(d)` - Call again after `d` (the rest of a
    ///   debounce window, or the time until the next pass)
    /// - `ServiceTiming::Idle` - No buttons; sampling is stopped
    pub fn poll(&mut self) -> ServiceTiming<I::Duration> {
        if !self.running {
            return ServiceTiming::Idle;
        }

        let now = self.time_source.now();
        let pass = self.pass;
        let (start, started) = match pass {
            Pass::Between { next: Some(next) } if next > now => {
                return ServiceTiming::Delay(remaining(now, next));
            }
            Pass::Between { .. } => (0, now),
            Pass::Debouncing { until, .. } if until > now => {
                return ServiceTiming::Delay(remaining(now, until));
            }
            Pass::Debouncing { index, started, .. } => {
                self.confirm(index, now);
                (index + 1, started)
            }
            Pass::Resume { index, started } => (index, started),
        };

        for index in start..MAX_BUTTONS {
            if self.detect(index) {
                let window = self.config.debounce_window;
                self.pass = Pass::Debouncing {
                    index,
                    until: deadline_after(now, window),
                    started,
                };
                return ServiceTiming::Delay(window);
            }
        }

        let next = deadline_after(started, self.config.poll_interval);
        self.pass = Pass::Between { next: Some(next) };
        ServiceTiming::Delay(remaining(now, next))
    }

    /// Fires every long-press timer that is due.
    ///
    /// A timer only fires if it is still armed for the current press and the
    /// button is still pressed; it fires once and does not re-arm.
    ///
    /// # Returns
    /// - `ServiceTiming::Delay(d)` - Time until the next armed timer is due
    /// - `ServiceTiming::Idle` - No timer armed
    pub fn service_long_press(&mut self) -> ServiceTiming<I::Duration> {
        let now = self.time_source.now();
        let mut timing = ServiceTiming::Idle;

        for (index, entry) in self.slots.iter_mut().enumerate() {
            let Some(slot) = entry else {
                continue;
            };
            let Some((deadline, token)) = slot.pending_fire else {
                continue;
            };

            if deadline > now {
                timing = timing.earliest(ServiceTiming::Delay(remaining(now, deadline)));
                continue;
            }

            slot.pending_fire = None;
            if slot.debouncer.is_active() && slot.timer.try_fire(token) {
                slot.notify(ButtonId(index), ButtonEvent::LongPress);
            }
        }

        timing
    }

    /// Runs [`poll`](Self::poll) and [`service_long_press`](Self::service_long_press)
    /// for a task that handles both, returning the earlier wake-up.
    pub fn service(&mut self) -> ServiceTiming<I::Duration> {
        let poll = self.poll();
        poll.earliest(self.service_long_press())
    }

    /// Returns true while sampling is running (the registry is not empty).
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns the debounced state of a button.
    ///
    /// # Errors
    /// Returns `NotFound` if the button does not exist.
    pub fn is_pressed(&self, id: ButtonId) -> Result<bool, Error> {
        Ok(self.slot(id)?.debouncer.is_active())
    }

    /// Returns the long-press timer state of a button.
    ///
    /// # Errors
    /// Returns `NotFound` if the button does not exist.
    pub fn long_press_state(&self, id: ButtonId) -> Result<LongPressState, Error> {
        Ok(self.slot(id)?.timer.state())
    }

    /// Returns the number of buttons in the registry.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Returns true if the registry holds no buttons.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the registry holds a button with the given id.
    pub fn contains(&self, id: ButtonId) -> bool {
        id.0 < MAX_BUTTONS && self.slots[id.0].is_some()
    }

    /// The registry's sampling configuration.
    pub fn config(&self) -> &PollConfig<I::Duration> {
        &self.config
    }

    /// First sample of a button in this pass. True if it needs a debounce wait.
    fn detect(&mut self, index: usize) -> bool {
        let Some(slot) = self.slots[index].as_mut() else {
            return false;
        };
        // A failed read counts as no change.
        match slot.read() {
            Some(active) => slot.debouncer.sample(active),
            None => false,
        }
    }

    /// Re-sample after the debounce window; emits the edge if it held.
    fn confirm(&mut self, index: usize, now: I) {
        let Some(slot) = self.slots[index].as_mut() else {
            return;
        };

        let edge = match slot.read() {
            Some(active) => slot.debouncer.confirm(active),
            None => {
                slot.debouncer.settle();
                None
            }
        };

        let id = ButtonId(index);
        match edge {
            Some(Edge::Rising) => {
                slot.notify(id, ButtonEvent::Press);
                if slot.long_press != I::Duration::ZERO {
                    let token = slot.timer.arm();
                    slot.pending_fire = Some((deadline_after(now, slot.long_press), token));
                }
            }
            Some(Edge::Falling) => {
                slot.timer.cancel();
                slot.pending_fire = None;
                slot.notify(id, ButtonEvent::Release);
            }
            None => trace!("button {}: change rejected as noise", index),
        }
    }

    fn slot(&self, id: ButtonId) -> Result<&ButtonSlot<I, P, C>, Error> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::NotFound)
    }

    fn slot_mut(&mut self, id: ButtonId) -> Result<&mut ButtonSlot<I, P, C>, Error> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::NotFound)
    }
}
