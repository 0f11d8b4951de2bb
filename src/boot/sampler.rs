use embedded_hal::digital::InputPin;
use log::info;

use crate::config::{HOLD_POLL_INTERVAL_MS, HOLD_WINDOW_MS};
use crate::platform::{DelayOps, MonotonicClock};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HoldWindow {
    pub window_ms: u32,
    pub poll_interval_ms: u32,
}

impl HoldWindow {
    pub const fn new(window_ms: u32, poll_interval_ms: u32) -> Self {
        Self {
            window_ms,
            poll_interval_ms,
        }
    }

    pub const fn boot_button() -> Self {
        Self::new(HOLD_WINDOW_MS, HOLD_POLL_INTERVAL_MS)
    }
}

impl Default for HoldWindow {
    fn default() -> Self {
        Self::boot_button()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HoldStep {
    Pending,
    Released,
}

/// Tracks one hold attempt sample by sample.
///
/// A hold only counts when the very first sample is already asserted and no
/// later sample breaks it. A release after any assertion ends the attempt.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct HoldTracker {
    samples: u32,
    asserted_from_start: bool,
    seen_asserted: bool,
    released: bool,
}

impl HoldTracker {
    pub const fn new() -> Self {
        Self {
            samples: 0,
            asserted_from_start: false,
            seen_asserted: false,
            released: false,
        }
    }

    pub fn observe(&mut self, asserted: bool) -> HoldStep {
        if self.samples == 0 {
            self.asserted_from_start = asserted;
        }
        self.samples = self.samples.saturating_add(1);

        if asserted {
            self.seen_asserted = true;
            return HoldStep::Pending;
        }
        if self.seen_asserted {
            self.released = true;
            return HoldStep::Released;
        }
        HoldStep::Pending
    }

    pub const fn samples(&self) -> u32 {
        self.samples
    }

    pub const fn seen_asserted(&self) -> bool {
        self.seen_asserted
    }

    pub const fn verdict(&self) -> bool {
        self.samples > 0 && self.asserted_from_start && !self.released
    }
}

/// Polls an active-low input for `window.window_ms` and reports whether it
/// stayed asserted the whole time. Returns early on release. A read error
/// counts as de-asserted.
pub fn sample_hold<I, C, D>(input: &mut I, clock: &C, delay: &D, window: HoldWindow) -> bool
where
    I: InputPin,
    C: MonotonicClock + ?Sized,
    D: DelayOps + ?Sized,
{
    info!(
        "boot button: hold for {} ms to enter config mode",
        window.window_ms
    );

    let window_ms = u64::from(window.window_ms);
    let poll_ms = window.poll_interval_ms.max(1);
    let started = clock.now_ms();
    let mut tracker = HoldTracker::new();

    while clock.now_ms().saturating_sub(started) < window_ms {
        let asserted = input.is_low().unwrap_or(false);
        if tracker.observe(asserted) == HoldStep::Released {
            info!(
                "boot button: released after {} ms",
                clock.now_ms().saturating_sub(started)
            );
            return false;
        }
        delay.delay_ms(poll_ms);
    }

    let held = tracker.verdict();
    if held {
        info!("boot button: held");
    } else if tracker.seen_asserted() {
        info!("boot button: pressed after sampling started; ignoring");
    } else {
        info!("boot button: not pressed");
    }
    held
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedButton, SimClock};

    #[test]
    fn tracker_requires_assertion_from_first_sample() {
        let mut tracker = HoldTracker::new();
        assert_eq!(tracker.observe(false), HoldStep::Pending);
        assert_eq!(tracker.observe(true), HoldStep::Pending);
        assert!(!tracker.verdict());
    }

    #[test]
    fn tracker_reports_release_after_assertion() {
        let mut tracker = HoldTracker::new();
        assert_eq!(tracker.observe(true), HoldStep::Pending);
        assert_eq!(tracker.observe(false), HoldStep::Released);
        assert!(!tracker.verdict());
    }

    #[test]
    fn tracker_without_samples_is_negative() {
        assert!(!HoldTracker::new().verdict());
    }

    #[test]
    fn full_hold_enters_config_mode() {
        let clock = SimClock::new();
        let mut button = ScriptedButton::held_for(&clock, 3_000);
        let held = sample_hold(&mut button, &clock, &clock, HoldWindow::new(3_000, 50));
        assert!(held);
        assert_eq!(clock.now_ms(), 3_000);
        assert_eq!(button.reads(), 60);
    }

    #[test]
    fn early_release_returns_at_release_point() {
        let clock = SimClock::new();
        let mut button = ScriptedButton::held_for(&clock, 500);
        let held = sample_hold(&mut button, &clock, &clock, HoldWindow::new(3_000, 50));
        assert!(!held);
        assert_eq!(clock.now_ms(), 500);
    }

    #[test]
    fn untouched_button_waits_out_window() {
        let clock = SimClock::new();
        let mut button = ScriptedButton::never_pressed(&clock);
        let held = sample_hold(&mut button, &clock, &clock, HoldWindow::new(3_000, 50));
        assert!(!held);
        assert_eq!(clock.now_ms(), 3_000);
    }

    #[test]
    fn late_press_held_to_end_is_not_a_hold() {
        let clock = SimClock::new();
        let mut button = ScriptedButton::pressed_between(&clock, 1_000, u64::MAX);
        let held = sample_hold(&mut button, &clock, &clock, HoldWindow::new(3_000, 50));
        assert!(!held);
        assert_eq!(clock.now_ms(), 3_000);
    }

    #[test]
    fn hold_longer_than_window_is_a_hold() {
        let clock = SimClock::new();
        let mut button = ScriptedButton::held_for(&clock, 10_000);
        assert!(sample_hold(
            &mut button,
            &clock,
            &clock,
            HoldWindow::new(3_000, 50)
        ));
    }

    #[test]
    fn zero_poll_interval_still_advances() {
        let clock = SimClock::new();
        let mut button = ScriptedButton::never_pressed(&clock);
        assert!(!sample_hold(
            &mut button,
            &clock,
            &clock,
            HoldWindow::new(20, 0)
        ));
        assert_eq!(button.reads(), 20);
    }

    #[test]
    fn verdict_matches_hold_duration_for_all_release_points() {
        for release_ms in (0..=3_200).step_by(50) {
            let clock = SimClock::new();
            let mut button = ScriptedButton::held_for(&clock, release_ms);
            let held = sample_hold(&mut button, &clock, &clock, HoldWindow::new(3_000, 50));
            assert_eq!(held, release_ms >= 3_000, "release at {release_ms} ms");
            if release_ms > 0 && release_ms < 3_000 {
                assert_eq!(clock.now_ms(), release_ms);
            }
        }
    }
}
