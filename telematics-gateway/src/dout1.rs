//! DOUT1 auto-control policy (spec.md §4.5). The decision is a pure function
//! of the current state and one `(timestamp, value)` observation — it never
//! touches the Repository or the socket itself, so the state machine is unit
//! testable the same way `telematics_wire`'s codecs are, and `session.rs`
//! owns the per-IMEI lock and the actual command round trip.

use crate::config::Config;
use crate::repository::Dout1State;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dout1Command {
    Activate,
    Deactivate,
}

impl Dout1Command {
    /// The Codec 12 command body this decision sends over the wire.
    pub fn as_command_str(&self) -> &'static str {
        match self {
            Dout1Command::Activate => "setdigout 1",
            Dout1Command::Deactivate => "setdigout 0",
        }
    }
}

/// Outcome of [`decide`]: the state to persist if no command was issued, the
/// command to attempt (if any), and the state to persist if that command's
/// round trip succeeds. [`resolve`] picks between the two once the caller
/// knows whether the device acknowledged the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    base_state: Dout1State,
    pub command: Option<Dout1Command>,
    state_on_success: Dout1State,
}

/// Applies the spec.md §4.5 state machine to one observation. `state` must
/// already reflect `ensure_device`'s default row for IMEIs seen for the first
/// time — step 4 of the spec ("if no row exists, create one...") then falls
/// out of steps 1-3 applied to that default for free.
pub fn decide(state: Dout1State, t: i64, v: u64, cfg: &Config) -> Decision {
    let mut next = state;
    let mut command = None;

    // 1. Expiry check.
    if state.active && state.deactivate_time.is_some_and(|dt| t >= dt) {
        command = Some(Dout1Command::Deactivate);
    }

    if v == 0 {
        // 2. Zero-tracking.
        match next.last_zero_time {
            None => next.last_zero_time = Some(t),
            Some(lzt) if !state.active && t - lzt > cfg.timeout_zero_s => {
                command = Some(Dout1Command::Activate);
            }
            Some(_) => {}
        }
    } else {
        // 3. Nonzero reset.
        next.last_zero_time = None;
    }

    let mut state_on_success = next;
    match command {
        Some(Dout1Command::Deactivate) => {
            state_on_success.active = false;
            state_on_success.deactivate_time = None;
        }
        Some(Dout1Command::Activate) => {
            state_on_success.active = true;
            state_on_success.deactivate_time = Some(t + cfg.activation_duration_s);
        }
        None => {}
    }

    Decision {
        base_state: next,
        command,
        state_on_success,
    }
}

/// Picks the state to persist once the caller knows whether the command (if
/// any) was acknowledged. A failed command leaves the state as the pre-
/// command steps computed it — the next observation retries.
pub fn resolve(decision: Decision, command_succeeded: bool) -> Dout1State {
    if decision.command.is_some() && command_succeeded {
        decision.state_on_success
    } else {
        decision.base_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config {
            tcp_host: "0.0.0.0".into(),
            tcp_port: 12345,
            http_port: 8080,
            response_timeout_s: 5,
            read_timeout_s: 30,
            dout1_io_id: 179,
            timeout_zero_s: 12 * 3600,
            activation_duration_s: 4000,
            db_path: ":memory:".into(),
            log_path: None,
        }
    }

    #[test]
    fn first_zero_observation_sets_last_zero_time() {
        let decision = decide(Dout1State::default(), 1_000, 0, &cfg());
        assert!(decision.command.is_none());
        assert_eq!(resolve(decision, false).last_zero_time, Some(1_000));
    }

    #[test]
    fn nonzero_observation_clears_last_zero_time() {
        let state = Dout1State {
            last_zero_time: Some(500),
            active: false,
            deactivate_time: None,
        };
        let decision = decide(state, 1_000, 1, &cfg());
        assert!(decision.command.is_none());
        assert_eq!(resolve(decision, false).last_zero_time, None);
    }

    #[test]
    fn activates_after_twelve_hours_of_zeros() {
        let state = Dout1State {
            last_zero_time: Some(0),
            active: false,
            deactivate_time: None,
        };
        let t = 12 * 3600 + 1;
        let decision = decide(state, t, 0, &cfg());
        assert_eq!(decision.command, Some(Dout1Command::Activate));
        let resolved = resolve(decision, true);
        assert!(resolved.active);
        assert_eq!(resolved.deactivate_time, Some(t + 4000));
        assert_eq!(resolved.last_zero_time, Some(0), "zero-tracking origin is not cleared on activation");
    }

    #[test]
    fn does_not_activate_before_timeout_elapses() {
        let state = Dout1State {
            last_zero_time: Some(0),
            active: false,
            deactivate_time: None,
        };
        let decision = decide(state, 12 * 3600, 0, &cfg());
        assert!(decision.command.is_none());
    }

    #[test]
    fn expires_at_deactivate_time() {
        let state = Dout1State {
            last_zero_time: Some(0),
            active: true,
            deactivate_time: Some(5_000),
        };
        let decision = decide(state, 5_000, 0, &cfg());
        assert_eq!(decision.command, Some(Dout1Command::Deactivate));
        let resolved = resolve(decision, true);
        assert!(!resolved.active);
        assert_eq!(resolved.deactivate_time, None);
    }

    #[test]
    fn failed_command_leaves_state_unchanged_for_retry() {
        let state = Dout1State {
            last_zero_time: Some(0),
            active: true,
            deactivate_time: Some(5_000),
        };
        let decision = decide(state, 5_000, 0, &cfg());
        let resolved = resolve(decision, false);
        assert!(resolved.active, "a failed deactivation is retried on the next observation");
        assert_eq!(resolved.deactivate_time, Some(5_000));
    }

    #[test]
    fn idempotent_on_repeated_identical_observation() {
        let state = Dout1State::default();
        let first = resolve(decide(state, 1_000, 0, &cfg()), false);
        let second = resolve(decide(first, 1_000, 0, &cfg()), false);
        assert_eq!(first, second);
    }

    #[test]
    fn new_row_default_matches_spec_step_four() {
        let decision = decide(Dout1State::default(), 42, 5, &cfg());
        let resolved = resolve(decision, false);
        assert_eq!(
            resolved,
            Dout1State { last_zero_time: None, active: false, deactivate_time: None }
        );
    }
}
