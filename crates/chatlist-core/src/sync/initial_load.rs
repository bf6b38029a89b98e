use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Progress of the initial bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Roster count not known yet
    Idle,
    CountingRoster,
    /// Waiting for the initial partners to resolve
    Resolving,
    /// Terminal: steady-state updates only
    Loaded,
}

type FinishedCallback = Box<dyn FnOnce() + Send>;

/// Countdown over the roster entries present at startup.
///
/// Each initial partner owes exactly one credit, paid either by its first merge or by
/// `release` when it can no longer resolve. Partners outside the initial roster never
/// affect the count. The callback fires once, on the transition to `Loaded`.
pub struct InitialLoadCoordinator {
    phase: LoadPhase,
    pending: AtomicUsize,
    /// Initial partners that still owe a credit
    owing: HashSet<String>,
    /// Partners settled before the roster count arrived
    settled_early: HashSet<String>,
    on_finished: Option<FinishedCallback>,
}

impl fmt::Debug for InitialLoadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitialLoadCoordinator")
            .field("phase", &self.phase)
            .field("pending", &self.pending())
            .finish()
    }
}

impl InitialLoadCoordinator {
    pub fn new(on_finished: impl FnOnce() + Send + 'static) -> Self {
        Self {
            phase: LoadPhase::Idle,
            pending: AtomicUsize::new(0),
            owing: HashSet::new(),
            settled_early: HashSet::new(),
            on_finished: Some(Box::new(on_finished)),
        }
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn is_loaded(&self) -> bool {
        self.phase == LoadPhase::Loaded
    }

    /// Set the initial roster. An empty roster finishes the load immediately.
    ///
    /// Returns true if this call finished the load.
    pub fn set_initial_roster<I, S>(&mut self, partner_ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.phase != LoadPhase::Idle {
            return false;
        }
        self.phase = LoadPhase::CountingRoster;

        let settled_early = std::mem::take(&mut self.settled_early);
        self.owing = partner_ids
            .into_iter()
            .map(Into::into)
            .filter(|id| !settled_early.contains(id))
            .collect();
        self.pending.store(self.owing.len(), Ordering::SeqCst);

        if self.owing.is_empty() {
            self.finish();
            return true;
        }
        self.phase = LoadPhase::Resolving;
        false
    }

    /// A partner merged for the first time. Returns true if this finished the load.
    pub fn complete(&mut self, partner_id: &str) -> bool {
        self.settle(partner_id)
    }

    /// A partner that will not resolve (removed, empty, unreadable). Same accounting as `complete`.
    pub fn release(&mut self, partner_id: &str) -> bool {
        self.settle(partner_id)
    }

    fn settle(&mut self, partner_id: &str) -> bool {
        match self.phase {
            LoadPhase::Idle | LoadPhase::CountingRoster => {
                self.settled_early.insert(partner_id.to_string());
                false
            }
            LoadPhase::Resolving => {
                if !self.owing.remove(partner_id) {
                    return false;
                }
                if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                    self.finish();
                    return true;
                }
                false
            }
            LoadPhase::Loaded => false,
        }
    }

    fn finish(&mut self) {
        self.phase = LoadPhase::Loaded;
        self.owing.clear();
        if let Some(callback) = self.on_finished.take() {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_test_coordinator() -> (InitialLoadCoordinator, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let coordinator = InitialLoadCoordinator::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (coordinator, fired)
    }

    #[test]
    fn test_empty_roster_loads_immediately() {
        let (mut coordinator, fired) = make_test_coordinator();
        assert_eq!(coordinator.phase(), LoadPhase::Idle);
        assert!(coordinator.set_initial_roster(Vec::<String>::new()));
        assert_eq!(coordinator.phase(), LoadPhase::Loaded);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loads_once_in_any_completion_order() {
        let orders = [["a", "b", "c"], ["c", "a", "b"], ["b", "c", "a"]];
        for order in orders {
            let (mut coordinator, fired) = make_test_coordinator();
            coordinator.set_initial_roster(["a", "b", "c"]);
            assert_eq!(coordinator.phase(), LoadPhase::Resolving);
            assert_eq!(coordinator.pending(), 3);

            let finished: Vec<bool> = order.iter().map(|p| coordinator.complete(p)).collect();
            assert_eq!(finished, vec![false, false, true]);
            assert_eq!(coordinator.phase(), LoadPhase::Loaded);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_repeated_and_foreign_completions_do_not_count() {
        let (mut coordinator, fired) = make_test_coordinator();
        coordinator.set_initial_roster(["a", "b"]);

        assert!(!coordinator.complete("a"));
        assert!(!coordinator.complete("a"));
        assert!(!coordinator.complete("late-arrival"));
        assert_eq!(coordinator.pending(), 1);

        assert!(coordinator.complete("b"));
        assert!(!coordinator.complete("c"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_completion_before_count_is_credited() {
        let (mut coordinator, fired) = make_test_coordinator();
        assert!(!coordinator.complete("a"));
        coordinator.set_initial_roster(["a", "b"]);
        assert_eq!(coordinator.pending(), 1);

        assert!(coordinator.release("b"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_everything_settled_early_finishes_on_count() {
        let (mut coordinator, fired) = make_test_coordinator();
        coordinator.complete("a");
        assert!(coordinator.set_initial_roster(["a"]));
        assert!(coordinator.is_loaded());
        assert!(!coordinator.set_initial_roster(["x"]));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
