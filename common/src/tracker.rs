use crate::{
    config::MonitorConfig,
    types::{BurnerEvent, BurnerState},
};

/// Result of feeding one classifier output into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Started,
    Finished(BurnerEvent),
    FalsePositive { elapsed_ms: u64 },
}

impl Transition {
    pub fn event(self) -> Option<BurnerEvent> {
        match self {
            Self::Finished(event) => Some(event),
            _ => None,
        }
    }
}

/// Debounces the flame indicator into completed burner cycles.
///
/// The preheat phase flashes the status LED; any on-period not strictly
/// longer than `min_on_ms` is dropped, which also drops genuine cycles that
/// short.
#[derive(Debug, Clone)]
pub struct BurnerTracker {
    min_on_ms: u64,
    state: BurnerState,
    start_ms: Option<u64>,
    last_cycle: Option<BurnerEvent>,
}

impl BurnerTracker {
    pub fn new(min_on_ms: u64) -> Self {
        Self {
            min_on_ms,
            state: BurnerState::Idle,
            start_ms: None,
            last_cycle: None,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.min_on_ms)
    }

    pub fn state(&self) -> BurnerState {
        self.state
    }

    pub fn last_cycle(&self) -> Option<BurnerEvent> {
        self.last_cycle
    }

    pub fn running_ms(&self, now_ms: u64) -> u64 {
        match (self.state, self.start_ms) {
            (BurnerState::Running, Some(start)) => now_ms.saturating_sub(start),
            _ => 0,
        }
    }

    pub fn update(&mut self, signal: bool, now_ms: u64) -> Transition {
        match (self.state, signal) {
            (BurnerState::Idle, true) => {
                self.state = BurnerState::Running;
                self.start_ms = Some(now_ms);
                Transition::Started
            }
            (BurnerState::Running, false) => {
                let elapsed_ms = self.running_ms(now_ms);
                self.state = BurnerState::Idle;
                self.start_ms = None;

                if elapsed_ms > self.min_on_ms {
                    let event = BurnerEvent {
                        duration_ms: elapsed_ms,
                    };
                    self.last_cycle = Some(event);
                    Transition::Finished(event)
                } else {
                    Transition::FalsePositive { elapsed_ms }
                }
            }
            (BurnerState::Running, true) | (BurnerState::Idle, false) => Transition::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_cycle_emits_event() {
        let mut tracker = BurnerTracker::new(5_000);

        assert_eq!(tracker.update(true, 1_000), Transition::Started);
        assert_eq!(tracker.update(true, 30_000), Transition::None);
        assert_eq!(tracker.state(), BurnerState::Running);
        assert_eq!(tracker.running_ms(31_000), 30_000);

        let transition = tracker.update(false, 61_000);

        assert_eq!(
            transition,
            Transition::Finished(BurnerEvent {
                duration_ms: 60_000
            })
        );
        assert_eq!(tracker.state(), BurnerState::Idle);
        assert_eq!(tracker.last_cycle(), transition.event());
    }

    #[test]
    fn preheat_flash_is_discarded() {
        let mut tracker = BurnerTracker::new(5_000);

        tracker.update(true, 0);
        let transition = tracker.update(false, 5_000);

        assert_eq!(transition, Transition::FalsePositive { elapsed_ms: 5_000 });
        assert_eq!(transition.event(), None);
        assert_eq!(tracker.state(), BurnerState::Idle);
        assert_eq!(tracker.last_cycle(), None);
    }

    #[test]
    fn idle_off_is_a_no_op() {
        let mut tracker = BurnerTracker::new(5_000);

        assert_eq!(tracker.update(false, 100), Transition::None);
        assert_eq!(tracker.running_ms(200), 0);
    }

    #[test]
    fn clock_going_backwards_does_not_underflow() {
        let mut tracker = BurnerTracker::new(5_000);

        tracker.update(true, 10_000);
        let transition = tracker.update(false, 9_000);

        assert_eq!(transition, Transition::FalsePositive { elapsed_ms: 0 });
    }
}
