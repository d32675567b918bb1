use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    WaitingForGroup,
    DisplayingBurst,
    DisplayingNormal,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct PlaybackStateChange {
    pub from: PlaybackState,
    pub to: PlaybackState,
}

pub struct PlaybackSM {
    state: PlaybackState,
    entered_at: Instant,
}

impl PlaybackSM {
    pub fn new(now: Instant) -> Self {
        Self {
            state: PlaybackState::WaitingForGroup,
            entered_at: now,
        }
    }

    pub fn current(&self) -> PlaybackState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PlaybackState::Stopped
    }

    /// Time spent in the current state.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.entered_at)
    }

    pub fn on_group(&mut self, burst: bool, now: Instant) -> Option<PlaybackStateChange> {
        if self.is_stopped() {
            return None;
        }
        let to = if burst {
            PlaybackState::DisplayingBurst
        } else {
            PlaybackState::DisplayingNormal
        };
        self.goto(to, now)
    }

    /// Every group of the current date has been shown.
    pub fn on_groups_exhausted(&mut self, now: Instant) -> Option<PlaybackStateChange> {
        match self.state {
            PlaybackState::DisplayingBurst | PlaybackState::DisplayingNormal => {
                self.goto(PlaybackState::WaitingForGroup, now)
            }
            PlaybackState::WaitingForGroup | PlaybackState::Stopped => None,
        }
    }

    pub fn on_stop(&mut self, now: Instant) -> Option<PlaybackStateChange> {
        self.goto(PlaybackState::Stopped, now)
    }

    fn goto(&mut self, to: PlaybackState, now: Instant) -> Option<PlaybackStateChange> {
        if self.state == to {
            return None;
        }
        let ch = PlaybackStateChange {
            from: self.state,
            to,
        };
        self.state = to;
        self.entered_at = now;
        Some(ch)
    }
}
