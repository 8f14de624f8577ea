use std::time::Duration;

/// How a per-frame "person present" signal turns into alerts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebouncePolicy {
    /// Fire once per false→true transition of the signal.
    EdgeTriggered,
    /// Fire while the signal is true, at most once per `cooldown`.
    Cooldown { cooldown: Duration },
}

impl DebouncePolicy {
    pub fn cooldown_secs(secs: f64) -> Self {
        DebouncePolicy::Cooldown {
            cooldown: Duration::from_secs_f64(secs.max(0.0)),
        }
    }
}

/// Debounce memory for one session.
///
/// Timestamps are offsets from an arbitrary monotonic epoch chosen by the
/// caller; only differences between them matter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebounceState {
    pub last_alert_time: Option<Duration>,
    pub last_signal: bool,
}

/// Pure transition: `(state, signal, now)` → `(next state, fires)`.
///
/// A cold state has never alerted and has seen no signal, so the first
/// `true` always fires.
pub fn update(
    policy: &DebouncePolicy,
    state: DebounceState,
    person_present: bool,
    now: Duration,
) -> (DebounceState, bool) {
    let fires = match policy {
        DebouncePolicy::EdgeTriggered => person_present && !state.last_signal,
        DebouncePolicy::Cooldown { cooldown } => {
            person_present
                && state
                    .last_alert_time
                    .map_or(true, |last| now.saturating_sub(last) >= *cooldown)
        }
    };

    let next = DebounceState {
        last_alert_time: if fires { Some(now) } else { state.last_alert_time },
        last_signal: person_present,
    };
    (next, fires)
}

/// Owns a policy and threads its [`DebounceState`] through [`update`].
#[derive(Clone, Debug)]
pub struct AlertDebouncer {
    policy: DebouncePolicy,
    state: DebounceState,
}

impl AlertDebouncer {
    pub fn new(policy: DebouncePolicy) -> Self {
        Self {
            policy,
            state: DebounceState::default(),
        }
    }

    pub fn update(&mut self, person_present: bool, now: Duration) -> bool {
        let (next, fires) = update(&self.policy, self.state, person_present, now);
        self.state = next;
        fires
    }

    pub fn policy(&self) -> &DebouncePolicy {
        &self.policy
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = DebounceState::default();
    }
}
