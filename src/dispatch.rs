//! Event delivery from producer contexts to application observers.
//!
//! Producers (an interrupt handler, a sampling pass) never call into
//! application code directly through this path: they `try_send` onto a bounded
//! `embassy_sync` channel and a [`Dispatcher`], running in task context,
//! drains it and notifies the registered [`Observer`] in enqueue order.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

/// Observer callback: `(source, event, context)`.
pub type Callback<S, E, C> = fn(S, E, &C);

/// A callback together with the opaque user context it receives.
pub struct Observer<S, E, C> {
    callback: Callback<S, E, C>,
    context: C,
}

impl<S, E, C> Observer<S, E, C> {
    /// Creates an observer.
    pub const fn new(callback: Callback<S, E, C>, context: C) -> Self {
        Self { callback, context }
    }

    /// Invokes the callback.
    #[inline]
    pub fn notify(&self, source: S, event: E) {
        (self.callback)(source, event, &self.context)
    }

    /// The user context passed to every invocation.
    pub fn context(&self) -> &C {
        &self.context
    }
}

/// Task-side end of an event channel.
///
/// # Type Parameters
/// * `'ch` - Lifetime of the borrowed channel
/// * `M` - Raw mutex guarding the channel
/// * `S` - Source identity handed to the observer
/// * `E` - Event type
/// * `C` - Observer context type
/// * `N` - Channel capacity
pub struct Dispatcher<'ch, M: RawMutex, S: Copy, E, C, const N: usize> {
    source: S,
    channel: &'ch Channel<M, E, N>,
    observer: Option<Observer<S, E, C>>,
}

impl<'ch, M: RawMutex, S: Copy, E: Copy, C, const N: usize> Dispatcher<'ch, M, S, E, C, N> {
    /// Creates a dispatcher with no observer.
    pub fn new(source: S, channel: &'ch Channel<M, E, N>) -> Self {
        Self {
            source,
            channel,
            observer: None,
        }
    }

    /// Registers the observer, replacing any previous one.
    pub fn register_observer(&mut self, callback: Callback<S, E, C>, context: C) {
        self.observer = Some(Observer::new(callback, context));
    }

    /// Removes the observer. Events dispatched afterwards are consumed silently.
    pub fn clear_observer(&mut self) -> Option<Observer<S, E, C>> {
        self.observer.take()
    }

    /// Delivers every queued event, oldest first. Returns how many were consumed.
    ///
    /// Events are consumed even without an observer.
    pub fn dispatch(&mut self) -> usize {
        let mut delivered = 0;
        while self.dispatch_one() {
            delivered += 1;
        }
        delivered
    }

    /// Delivers at most one queued event.
    pub fn dispatch_one(&mut self) -> bool {
        match self.channel.try_receive() {
            Ok(event) => {
                self.deliver(event);
                true
            }
            Err(_) => false,
        }
    }

    /// Waits until an event arrives, delivers it and returns it.
    ///
    /// For tasks that block instead of polling [`dispatch`](Self::dispatch).
    pub async fn receive(&mut self) -> E {
        let event = self.channel.receive().await;
        self.deliver(event);
        event
    }

    /// Number of events waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.channel.len()
    }

    /// Source identity of this dispatcher.
    pub fn source(&self) -> S {
        self.source
    }

    fn deliver(&self, event: E) {
        if let Some(observer) = &self.observer {
            observer.notify(self.source, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;
    use core::pin::pin;
    use core::task::{Context, Poll, Waker};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use std::cell::RefCell;
    use std::vec::Vec;

    type Log = RefCell<Vec<(u8, u32)>>;

    fn record(source: u8, event: u32, log: &&Log) {
        log.borrow_mut().push((source, event));
    }

    #[test]
    fn delivers_in_enqueue_order() {
        let log: Log = RefCell::new(Vec::new());
        let channel: Channel<NoopRawMutex, u32, 8> = Channel::new();

        let mut dispatcher = Dispatcher::new(7u8, &channel);
        dispatcher.register_observer(record, &log);

        for event in [3, 1, 2] {
            channel.try_send(event).unwrap();
        }
        assert_eq!(dispatcher.pending(), 3);
        assert_eq!(dispatcher.dispatch(), 3);
        assert_eq!(*log.borrow(), [(7, 3), (7, 1), (7, 2)]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn events_without_observer_are_consumed() {
        let channel: Channel<NoopRawMutex, u32, 4> = Channel::new();
        let mut dispatcher: Dispatcher<'_, NoopRawMutex, u8, u32, (), 4> = Dispatcher::new(0, &channel);

        channel.try_send(1).unwrap();
        assert!(dispatcher.dispatch_one());
        assert!(!dispatcher.dispatch_one());
    }

    #[test]
    fn receive_waits_for_an_event() {
        let log: Log = RefCell::new(Vec::new());
        let channel: Channel<NoopRawMutex, u32, 4> = Channel::new();
        let mut dispatcher = Dispatcher::new(1u8, &channel);
        dispatcher.register_observer(record, &log);

        let mut cx = Context::from_waker(Waker::noop());
        {
            let mut pending = pin!(dispatcher.receive());
            assert_eq!(pending.as_mut().poll(&mut cx), Poll::Pending);

            channel.try_send(42).unwrap();
            assert_eq!(pending.as_mut().poll(&mut cx), Poll::Ready(42));
        }
        assert_eq!(*log.borrow(), [(1, 42)]);
    }
}
