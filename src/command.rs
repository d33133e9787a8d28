//! Command mailbox for the buzzer sequencer.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

use crate::time::TimeDuration;
use crate::types::Note;

/// Commands accepted by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackCommand<D> {
    /// Stop whatever is rendering, then render this note.
    Play(Note<D>),
    /// Stop whatever is rendering.
    Stop,
}

/// Mailbox contents and the busy flag, always updated together.
#[derive(Clone, Copy)]
struct Slot<D> {
    pending: Option<PlaybackCommand<D>>,
    playing: bool,
}

/// Single-slot, last-writer-wins mailbox between command producers and the
/// sequencer task, plus the sequencer's published `is_playing` flag.
///
/// Meant to live in a `static` shared by every producer and the sequencer.
/// Producers never touch the output line; the sequencer applies an implicit
/// stop before acting on any command, so at most one pattern renders at a time.
///
/// Taking a `Play` marks the channel as playing under the same lock, so a
/// `stop()` racing with the pickup always sees either the pending command or
/// the busy flag.
pub struct PlaybackChannel<M: RawMutex, D> {
    slot: Mutex<M, Cell<Slot<D>>>,
    wake: Signal<M, ()>,
    default_note: Option<Note<D>>,
}

impl<M: RawMutex, D: TimeDuration> PlaybackChannel<M, D> {
    /// Creates a channel that falls back to [`Note::fallback`] for
    /// [`play_default`](Self::play_default).
    pub const fn new() -> Self {
        Self::build(None)
    }

    /// Creates a channel with a configured default note.
    pub const fn with_default_note(note: Note<D>) -> Self {
        Self::build(Some(note))
    }

    const fn build(default_note: Option<Note<D>>) -> Self {
        Self {
            slot: Mutex::new(Cell::new(Slot {
                pending: None,
                playing: false,
            })),
            wake: Signal::new(),
            default_note,
        }
    }

    /// Requests `note`, replacing any pending command.
    pub fn play(&self, note: Note<D>) {
        self.update(|slot| slot.pending = Some(PlaybackCommand::Play(note)));
        self.wake.signal(());
    }

    /// Requests the default note.
    pub fn play_default(&self) {
        self.play(self.default_note());
    }

    /// Requests a stop.
    ///
    /// A no-op when nothing is playing and nothing is pending. Otherwise it
    /// replaces any pending command, including a `Play` not yet picked up.
    pub fn stop(&self) {
        let requested = self.update(|slot| {
            if !slot.playing && slot.pending.is_none() {
                return false;
            }
            slot.pending = Some(PlaybackCommand::Stop);
            true
        });
        if requested {
            self.wake.signal(());
        }
    }

    /// Best-effort snapshot of whether the sequencer is rendering a note.
    pub fn is_playing(&self) -> bool {
        self.slot.lock(|slot| slot.get().playing)
    }

    /// True if a command is waiting for the sequencer.
    pub fn has_pending(&self) -> bool {
        self.slot.lock(|slot| slot.get().pending.is_some())
    }

    /// The note played by [`play_default`](Self::play_default).
    pub fn default_note(&self) -> Note<D> {
        self.default_note.unwrap_or_else(Note::fallback)
    }

    /// Waits for the next command. For async sequencer tasks that block
    /// while idle; pass the result to
    /// [`BuzzerSequencer::handle_command`](crate::BuzzerSequencer::handle_command).
    pub async fn receive(&self) -> PlaybackCommand<D> {
        loop {
            if let Some(command) = self.try_take() {
                return command;
            }
            // May return on a wake whose command was already taken; the loop re-checks.
            self.wake.wait().await;
        }
    }

    /// Takes the pending command, if any, and publishes whether it leaves
    /// the sequencer playing.
    pub(crate) fn try_take(&self) -> Option<PlaybackCommand<D>> {
        self.update(|slot| {
            let command = slot.pending.take()?;
            slot.playing = match command {
                PlaybackCommand::Play(note) => !note.is_silent(),
                PlaybackCommand::Stop => false,
            };
            Some(command)
        })
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.update(|slot| slot.playing = playing);
    }

    fn update<R>(&self, f: impl FnOnce(&mut Slot<D>) -> R) -> R {
        self.slot.lock(|cell| {
            let mut slot = cell.get();
            let result = f(&mut slot);
            cell.set(slot);
            result
        })
    }
}

impl<M: RawMutex, D: TimeDuration> Default for PlaybackChannel<M, D> {
    fn default() -> Self {
        Self::new()
    }
}
