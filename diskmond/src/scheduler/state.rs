//! Check scheduling policy and the activity/boot state machine.
//!
//! The state machine reconciles the four trigger sources (wakeup timer,
//! boot completion, activity changes and explicit check requests) into a
//! single [`Decision`]: whether to probe now, and which wakeup to request next.
//!
//! # States
//!
//! `{Idle, Active}` x `{PreBoot, PostBoot}`. PreBoot suppresses every probe.
//! The boot axis is one-way; the activity axis flips only on a differing signal.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Check interval while the device is in active use.
pub const ACTIVE_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Check interval while the device is idle.
pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(1800);

/// Maximum age of the last check before becoming active forces a new one.
pub const STALE_THRESHOLD: Duration = Duration::from_secs(900);

/// Extra window granted to the heartbeat service so it can coalesce wakeups.
pub const WAKEUP_SLACK: Duration = Duration::from_secs(120);

/// A wakeup window handed to the heartbeat service.
///
/// The callback must fire no earlier than `min_delay` and no later than
/// `max_delay` after the request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl ScheduleRequest {
    pub fn min_secs(&self) -> u64 {
        self.min_delay.as_secs()
    }

    pub fn max_secs(&self) -> u64 {
        self.max_delay.as_secs()
    }
}

/// Timing policy for disk space checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckPolicy {
    pub active_interval: Duration,
    pub idle_interval: Duration,
    pub stale_threshold: Duration,
}

impl Default for CheckPolicy {
    fn default() -> Self {
        Self {
            active_interval: ACTIVE_CHECK_INTERVAL,
            idle_interval: IDLE_CHECK_INTERVAL,
            stale_threshold: STALE_THRESHOLD,
        }
    }
}

impl CheckPolicy {
    /// Interval between checks for the given activity state.
    pub fn interval_for(&self, device_active: bool) -> Duration {
        if device_active {
            self.active_interval
        } else {
            self.idle_interval
        }
    }

    /// Build the wakeup request for the given activity state.
    ///
    /// The window is always [`WAKEUP_SLACK`] wide, whatever the intervals.
    pub fn schedule_request(&self, device_active: bool) -> ScheduleRequest {
        let min_delay = self.interval_for(device_active);
        ScheduleRequest {
            min_delay,
            max_delay: min_delay + WAKEUP_SLACK,
        }
    }

    /// Whether a check performed at `last_check` is too old at `now`.
    ///
    /// A device that was never checked is always stale. A clock that went
    /// backwards counts as zero elapsed time.
    pub fn is_stale(&self, last_check: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_check {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last).num_seconds().max(0) as u64;
                elapsed >= self.stale_threshold.as_secs()
            }
        }
    }
}

/// An inbound trigger for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The previously requested wakeup fired.
    WakeupFired,
    /// The system finished booting.
    BootCompleted,
    /// The device activity signal was observed.
    ActivityChanged { active: bool },
    /// Someone asked for an immediate check.
    CheckRequested,
}

impl Trigger {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::WakeupFired => "wakeup_fired",
            Trigger::BootCompleted => "boot_completed",
            Trigger::ActivityChanged { .. } => "activity_changed",
            Trigger::CheckRequested => "check_requested",
        }
    }
}

/// What to do about the prober for one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeDecision {
    /// Invoke the prober now. `last_check` has already been advanced.
    Run,
    /// A probe was wanted but boot has not completed yet.
    Suppressed,
    /// No probe was wanted for this trigger.
    Skipped,
}

/// Outcome of applying a trigger to the scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub probe: ProbeDecision,
    /// Wakeup to request after the probe, if any.
    pub reschedule: Option<ScheduleRequest>,
}

impl Decision {
    fn nothing() -> Self {
        Self {
            probe: ProbeDecision::Skipped,
            reschedule: None,
        }
    }

    /// Whether the caller must invoke the prober.
    pub fn should_probe(&self) -> bool {
        self.probe == ProbeDecision::Run
    }
}

/// Counters describing what the scheduler has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub probes_run: u64,
    pub probes_suppressed: u64,
    pub schedule_requests: u64,
    pub redundant_activity_signals: u64,
}

/// Scheduler state, owned by exactly one dispatcher.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    boot_completed: bool,
    device_active: bool,
    last_check: Option<DateTime<Utc>>,
    stats: SchedulerStats,
}

impl SchedulerState {
    /// Initial state: idle, boot not completed, never checked.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boot_completed(&self) -> bool {
        self.boot_completed
    }

    pub fn device_active(&self) -> bool {
        self.device_active
    }

    /// Time of the last triggered probe, `None` if never.
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Wakeup request for the current activity state.
    ///
    /// Used once at start-up so the first wakeup is armed before any trigger.
    pub fn current_schedule(&mut self, policy: &CheckPolicy) -> ScheduleRequest {
        self.stats.schedule_requests += 1;
        policy.schedule_request(self.device_active)
    }

    /// Apply one trigger and return what the caller has to do.
    pub fn apply(&mut self, trigger: Trigger, now: DateTime<Utc>, policy: &CheckPolicy) -> Decision {
        match trigger {
            Trigger::WakeupFired => {
                let probe = self.probe_if_allowed(now);
                Decision {
                    probe,
                    reschedule: Some(self.current_schedule(policy)),
                }
            }
            Trigger::BootCompleted => {
                self.boot_completed = true;
                Decision::nothing()
            }
            Trigger::ActivityChanged { active } => {
                if active == self.device_active {
                    // Repeated signals must not disturb the schedule.
                    self.stats.redundant_activity_signals += 1;
                    return Decision::nothing();
                }

                self.device_active = active;

                let probe = if active && policy.is_stale(self.last_check, now) {
                    self.probe_if_allowed(now)
                } else {
                    ProbeDecision::Skipped
                };

                Decision {
                    probe,
                    reschedule: Some(self.current_schedule(policy)),
                }
            }
            Trigger::CheckRequested => Decision {
                probe: self.probe_if_allowed(now),
                reschedule: None,
            },
        }
    }

    fn probe_if_allowed(&mut self, now: DateTime<Utc>) -> ProbeDecision {
        if !self.boot_completed {
            self.stats.probes_suppressed += 1;
            return ProbeDecision::Suppressed;
        }

        // last_check never moves backwards
        self.last_check = Some(match self.last_check {
            Some(last) if last > now => last,
            _ => now,
        });
        self.stats.probes_run += 1;
        ProbeDecision::Run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn booted() -> SchedulerState {
        let mut state = SchedulerState::new();
        state.apply(Trigger::BootCompleted, at(0), &CheckPolicy::default());
        state
    }

    #[test]
    fn test_initial_state() {
        let state = SchedulerState::new();
        assert!(!state.boot_completed());
        assert!(!state.device_active());
        assert_eq!(state.last_check(), None);
    }

    #[rstest]
    #[case(true, 300, 420)]
    #[case(false, 1800, 1920)]
    fn test_schedule_request_window(#[case] active: bool, #[case] min: u64, #[case] max: u64) {
        let request = CheckPolicy::default().schedule_request(active);
        assert_eq!(request.min_secs(), min);
        assert_eq!(request.max_secs(), max);
        assert_eq!(request.max_delay, request.min_delay + WAKEUP_SLACK);
    }

    #[test]
    fn test_probes_suppressed_before_boot() {
        let policy = CheckPolicy::default();
        let mut state = SchedulerState::new();

        let triggers = [
            Trigger::WakeupFired,
            Trigger::CheckRequested,
            Trigger::ActivityChanged { active: true },
            Trigger::WakeupFired,
            Trigger::CheckRequested,
        ];
        for (i, trigger) in triggers.into_iter().enumerate() {
            let decision = state.apply(trigger, at(i as i64 * 1000), &policy);
            assert!(!decision.should_probe(), "{} probed before boot", trigger.name());
        }

        assert_eq!(state.last_check(), None);
        assert_eq!(state.stats().probes_run, 0);
        assert_eq!(state.stats().probes_suppressed, 5);
    }

    #[test]
    fn test_boot_completed_is_idempotent_and_quiet() {
        let policy = CheckPolicy::default();
        let mut state = SchedulerState::new();

        let first = state.apply(Trigger::BootCompleted, at(0), &policy);
        let second = state.apply(Trigger::BootCompleted, at(10), &policy);

        assert_eq!(first, Decision::nothing());
        assert_eq!(second, Decision::nothing());
        assert!(state.boot_completed());
    }

    #[test]
    fn test_wakeup_when_idle_probes_and_reschedules() {
        let policy = CheckPolicy::default();
        let mut state = booted();

        let decision = state.apply(Trigger::WakeupFired, at(2000), &policy);

        assert_eq!(decision.probe, ProbeDecision::Run);
        assert_eq!(state.last_check(), Some(at(2000)));
        let request = decision.reschedule.unwrap();
        assert_eq!((request.min_secs(), request.max_secs()), (1800, 1920));
    }

    #[test]
    fn test_wakeup_before_boot_still_reschedules() {
        let policy = CheckPolicy::default();
        let mut state = SchedulerState::new();

        let decision = state.apply(Trigger::WakeupFired, at(0), &policy);

        assert_eq!(decision.probe, ProbeDecision::Suppressed);
        assert!(decision.reschedule.is_some());
    }

    #[test]
    fn test_repeated_activity_signal_is_noop() {
        let policy = CheckPolicy::default();
        let mut state = booted();

        let first = state.apply(Trigger::ActivityChanged { active: true }, at(5000), &policy);
        assert!(first.should_probe());
        assert!(first.reschedule.is_some());

        let second = state.apply(Trigger::ActivityChanged { active: true }, at(9000), &policy);
        assert_eq!(second, Decision::nothing());
        assert_eq!(state.last_check(), Some(at(5000)));
        assert_eq!(state.stats().redundant_activity_signals, 1);

        // Initial idle state also de-duplicates.
        let mut fresh = booted();
        let idle = fresh.apply(Trigger::ActivityChanged { active: false }, at(1), &policy);
        assert_eq!(idle, Decision::nothing());
    }

    #[rstest]
    #[case::never_checked(None, 1, true)]
    #[case::exactly_stale(Some(0), 900, true)]
    #[case::long_ago(Some(0), 5000, true)]
    #[case::recent(Some(0), 899, false)]
    #[case::just_checked(Some(0), 0, false)]
    fn test_becoming_active_probes_only_when_stale(
        #[case] last_check: Option<i64>,
        #[case] now: i64,
        #[case] expect_probe: bool,
    ) {
        let policy = CheckPolicy::default();
        let mut state = booted();
        if let Some(last) = last_check {
            state.apply(Trigger::CheckRequested, at(last), &policy);
        }
        let probes_before = state.stats().probes_run;

        let decision = state.apply(Trigger::ActivityChanged { active: true }, at(now), &policy);

        assert_eq!(decision.should_probe(), expect_probe);
        assert_eq!(state.stats().probes_run - probes_before, expect_probe as u64);
        let request = decision.reschedule.unwrap();
        assert_eq!((request.min_secs(), request.max_secs()), (300, 420));
    }

    #[test]
    fn test_becoming_idle_never_probes() {
        let policy = CheckPolicy::default();
        let mut state = booted();
        state.apply(Trigger::ActivityChanged { active: true }, at(0), &policy);
        assert_eq!(state.last_check(), Some(at(0)));

        let decision = state.apply(Trigger::ActivityChanged { active: false }, at(1000), &policy);

        assert!(!state.device_active());
        assert_eq!(decision.probe, ProbeDecision::Skipped);
        assert_eq!(state.last_check(), Some(at(0)));
        let request = decision.reschedule.unwrap();
        assert_eq!((request.min_secs(), request.max_secs()), (1800, 1920));
    }

    #[test]
    fn test_stale_activation_before_boot_is_suppressed() {
        let policy = CheckPolicy::default();
        let mut state = SchedulerState::new();

        let decision = state.apply(Trigger::ActivityChanged { active: true }, at(0), &policy);

        assert_eq!(decision.probe, ProbeDecision::Suppressed);
        assert!(state.device_active());
        assert_eq!(decision.reschedule.unwrap().min_secs(), 300);
    }

    #[test]
    fn test_check_request_does_not_reschedule() {
        let policy = CheckPolicy::default();
        let mut state = booted();

        let decision = state.apply(Trigger::CheckRequested, at(100), &policy);

        assert!(decision.should_probe());
        assert_eq!(decision.reschedule, None);
        assert_eq!(state.last_check(), Some(at(100)));
    }

    #[test]
    fn test_last_check_is_monotonic() {
        let policy = CheckPolicy::default();
        let mut state = booted();

        state.apply(Trigger::CheckRequested, at(1000), &policy);
        state.apply(Trigger::CheckRequested, at(500), &policy);

        assert_eq!(state.last_check(), Some(at(1000)));
        assert!(!policy.is_stale(state.last_check(), at(500)));
    }

    #[test]
    fn test_every_reschedule_keeps_slack() {
        let policy = CheckPolicy::default();
        let mut state = booted();
        let triggers = [
            Trigger::WakeupFired,
            Trigger::ActivityChanged { active: true },
            Trigger::WakeupFired,
            Trigger::ActivityChanged { active: false },
            Trigger::ActivityChanged { active: true },
            Trigger::WakeupFired,
        ];

        for (i, trigger) in triggers.into_iter().enumerate() {
            let decision = state.apply(trigger, at(i as i64 * 400), &policy);
            let request = decision.reschedule.expect("trigger should reschedule");
            assert_eq!(request.max_secs(), request.min_secs() + 120);
        }
        assert_eq!(state.stats().schedule_requests, triggers.len() as u64);
    }
}
