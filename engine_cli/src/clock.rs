use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy)]
enum ClockState {
    Playing { since: Instant, offset: Duration },
    Paused { at: Duration },
}

/// Simulated playback position: pausable, seekable, shared between the
/// ticker and whoever handles player events.
#[derive(Debug)]
pub struct PlaybackClock {
    state: Mutex<ClockState>,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self {
            state: Mutex::new(ClockState::Paused { at: Duration::ZERO }),
        }
    }
}

impl ClockState {
    fn position(&self) -> Duration {
        match *self {
            ClockState::Playing { since, offset } => offset + since.elapsed(),
            ClockState::Paused { at } => at,
        }
    }
}

impl PlaybackClock {
    pub fn position(&self) -> Duration {
        self.lock().position()
    }

    /// The position if playing, read under one lock so a concurrent pause
    /// or seek cannot interleave.
    pub fn playing_position(&self) -> Option<Duration> {
        match *self.lock() {
            state @ ClockState::Playing { .. } => Some(state.position()),
            ClockState::Paused { .. } => None,
        }
    }

    pub fn play(&self) {
        let mut state = self.lock();
        if let ClockState::Paused { at } = *state {
            *state = ClockState::Playing {
                since: Instant::now(),
                offset: at,
            };
        }
    }

    pub fn pause(&self) {
        let mut state = self.lock();
        let at = state.position();
        *state = ClockState::Paused { at };
    }

    /// Moves to `position`, keeping the play/pause state.
    pub fn seek(&self, position: Duration) {
        let mut state = self.lock();
        *state = match *state {
            ClockState::Playing { .. } => ClockState::Playing {
                since: Instant::now(),
                offset: position,
            },
            ClockState::Paused { .. } => ClockState::Paused { at: position },
        };
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
