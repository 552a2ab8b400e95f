use std::time::Duration;

use tokio::time::Instant;

use crate::model::CorrelationId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingStart {
    id: CorrelationId,
    due: Instant,
}

/// Decides when a changed correlation id should start a session on its own.
///
/// Starts are debounced: a newer id observed inside the settling window
/// replaces the pending one instead of queueing behind it.
#[derive(Clone, Debug)]
pub struct AutoTrigger {
    settle_delay: Duration,
    last_started: Option<CorrelationId>,
    pending: Option<PendingStart>,
}

impl AutoTrigger {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            settle_delay,
            last_started: None,
            pending: None,
        }
    }

    /// Feeds the currently bound id. Returns true when a start is now pending.
    pub fn observe(&mut self, id: Option<CorrelationId>, streaming: bool, now: Instant) -> bool {
        match id {
            Some(id) if !streaming && self.last_started != Some(id) => {
                self.pending = Some(PendingStart {
                    id,
                    due: now + self.settle_delay,
                });
                true
            }
            _ => {
                self.pending = None;
                false
            }
        }
    }

    /// Deadline of the pending start, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.due)
    }

    /// Takes the pending id once its settling delay has elapsed.
    ///
    /// A start that comes due while a session is streaming is dropped; the
    /// controller re-observes its bound id once that session ends.
    pub fn due(&mut self, now: Instant, streaming: bool) -> Option<CorrelationId> {
        let pending = self.pending.filter(|p| p.due <= now)?;
        self.pending = None;
        (!streaming).then_some(pending.id)
    }

    /// Records that a session started for `id`, by any route.
    pub fn record_start(&mut self, id: Option<CorrelationId>) {
        if id.is_some() {
            self.last_started = id;
        }
        self.pending = None;
    }

    /// Id of the most recently started session.
    pub fn last_started(&self) -> Option<CorrelationId> {
        self.last_started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTLE: Duration = Duration::from_millis(500);

    fn id(value: u64) -> Option<CorrelationId> {
        CorrelationId::new(value)
    }

    #[test]
    fn schedules_after_settle_delay() {
        let now = Instant::now();
        let mut trigger = AutoTrigger::new(SETTLE);
        assert!(trigger.observe(id(42), false, now));
        assert_eq!(trigger.deadline(), Some(now + SETTLE));
        assert_eq!(trigger.due(now + Duration::from_millis(499), false), None);
        assert_eq!(trigger.due(now + SETTLE, false), id(42));
        assert_eq!(trigger.deadline(), None);
    }

    #[test]
    fn later_id_replaces_pending_start() {
        let now = Instant::now();
        let mut trigger = AutoTrigger::new(SETTLE);
        trigger.observe(id(1), false, now);
        trigger.observe(id(2), false, now + Duration::from_millis(100));
        trigger.observe(id(3), false, now + Duration::from_millis(200));
        assert_eq!(
            trigger.deadline(),
            Some(now + Duration::from_millis(200) + SETTLE)
        );
        assert_eq!(trigger.due(now + Duration::from_secs(1), false), id(3));
        assert_eq!(trigger.due(now + Duration::from_secs(2), false), None);
    }

    #[test]
    fn ignores_absent_repeated_or_busy_ids() {
        let now = Instant::now();
        let mut trigger = AutoTrigger::new(SETTLE);
        assert!(!trigger.observe(None, false, now));
        assert!(!trigger.observe(id(5), true, now));

        trigger.record_start(id(5));
        assert!(!trigger.observe(id(5), false, now));
        assert_eq!(trigger.last_started(), id(5));
    }

    #[test]
    fn clearing_the_id_cancels_pending_start() {
        let now = Instant::now();
        let mut trigger = AutoTrigger::new(SETTLE);
        trigger.observe(id(8), false, now);
        trigger.observe(None, false, now);
        assert_eq!(trigger.due(now + SETTLE, false), None);
        // never started, so the same id still qualifies later
        assert!(trigger.observe(id(8), false, now));
    }

    #[test]
    fn due_while_streaming_is_dropped() {
        let now = Instant::now();
        let mut trigger = AutoTrigger::new(SETTLE);
        trigger.observe(id(4), false, now);
        assert_eq!(trigger.due(now + SETTLE, true), None);
        assert_eq!(trigger.deadline(), None);
        assert_eq!(trigger.last_started(), None);
    }
}
