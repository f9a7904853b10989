//! Blocking multiplexer over the three notifications a streaming device raises.
//!
//! Each [`EventSource`] is a latched flag the device side sets; [`EventMux::wait`]
//! sleeps until at least one registered flag is set, then takes and clears every
//! set flag in one step so a later wait never reports a consumed notification.

use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSignal {
    Removed,
    DataReady,
    DataOverflow,
}

impl EventSignal {
    pub const ALL: [EventSignal; 3] = [
        EventSignal::Removed,
        EventSignal::DataReady,
        EventSignal::DataOverflow,
    ];

    /// Order in which signals of one wake-up are handed out: fatal ones first.
    const PRIORITY: [EventSignal; 3] = [
        EventSignal::Removed,
        EventSignal::DataOverflow,
        EventSignal::DataReady,
    ];

    fn bit(self) -> u8 {
        match self {
            EventSignal::Removed => 0b001,
            EventSignal::DataReady => 0b010,
            EventSignal::DataOverflow => 0b100,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("no event sources registered")]
    NoSources,

    #[error("event state poisoned by a panicking notifier")]
    Poisoned,
}

#[derive(Debug, Default)]
struct Shared {
    pending: Mutex<u8>,
    ready: Condvar,
}

/// Handle given to the device; notifying it wakes the multiplexer.
#[derive(Debug, Clone)]
pub struct EventSource {
    signal: EventSignal,
    shared: Arc<Shared>,
}

impl EventSource {
    pub fn notify(&self) {
        // A poisoned lock means the waiting side is gone; nobody to wake.
        if let Ok(mut pending) = self.shared.pending.lock() {
            *pending |= self.signal.bit();
            self.shared.ready.notify_all();
        }
    }
}

#[derive(Debug, Default)]
pub struct EventMux {
    shared: Arc<Shared>,
    registered: u8,
}

impl EventMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, signal: EventSignal) -> EventSource {
        self.registered |= signal.bit();
        EventSource {
            signal,
            shared: self.shared.clone(),
        }
    }

    /// Blocks without timeout until at least one registered source fired.
    pub fn wait(&self) -> Result<Fired, WaitError> {
        if self.registered == 0 {
            return Err(WaitError::NoSources);
        }

        let mut pending = self.shared.pending.lock().map_err(|_| WaitError::Poisoned)?;
        while *pending & self.registered == 0 {
            pending = self
                .shared
                .ready
                .wait(pending)
                .map_err(|_| WaitError::Poisoned)?;
        }
        Ok(Self::take(&mut pending, self.registered))
    }

    /// Non-blocking variant of [`EventMux::wait`]; may return an empty set.
    #[cfg(test)]
    fn poll(&self) -> Result<Fired, WaitError> {
        let mut pending = self.shared.pending.lock().map_err(|_| WaitError::Poisoned)?;
        Ok(Self::take(&mut pending, self.registered))
    }

    fn take(pending: &mut u8, registered: u8) -> Fired {
        let fired = *pending & registered;
        *pending &= !fired;
        Fired(fired)
    }
}

/// The set of signals observed in one wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fired(u8);

impl Fired {
    pub fn contains(self, signal: EventSignal) -> bool {
        self.0 & signal.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> FiredIter {
        FiredIter {
            fired: self,
            next: 0,
        }
    }
}

impl IntoIterator for Fired {
    type Item = EventSignal;
    type IntoIter = FiredIter;

    fn into_iter(self) -> FiredIter {
        self.iter()
    }
}

pub struct FiredIter {
    fired: Fired,
    next: usize,
}

impl Iterator for FiredIter {
    type Item = EventSignal;

    fn next(&mut self) -> Option<EventSignal> {
        while let Some(signal) = EventSignal::PRIORITY.get(self.next).copied() {
            self.next += 1;
            if self.fired.contains(signal) {
                return Some(signal);
            }
        }
        None
    }
}
