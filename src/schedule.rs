//! Frame-bound delayed-task scheduler.

use crate::foundation::{
    core::Millis,
    error::{CurtainError, CurtainResult},
};
use std::{
    borrow::Cow,
    cell::Cell,
    cmp::Ordering,
    collections::BinaryHeap,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

/// A deferred side effect over context `C`.
pub type Action<C> = Box<dyn FnOnce(&mut C, &mut Scheduler<C>) -> CurtainResult<()>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskState {
    Pending,
    Cancelled,
    Fired,
}

/// Cancellation token for one enqueued task.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    state: Rc<Cell<TaskState>>,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            state: Rc::new(Cell::new(TaskState::Pending)),
        }
    }

    /// Cancel the task if it has not run yet. Returns `true` when this call cancelled it.
    pub fn cancel(&self) -> bool {
        if self.state.get() == TaskState::Pending {
            self.state.set(TaskState::Cancelled);
            return true;
        }
        false
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.get() == TaskState::Cancelled
    }

    pub fn has_fired(&self) -> bool {
        self.state.get() == TaskState::Fired
    }

    pub fn is_pending(&self) -> bool {
        self.state.get() == TaskState::Pending
    }
}

struct Entry<C> {
    deadline: Millis,
    seq: u64,
    label: Cow<'static, str>,
    handle: TaskHandle,
    action: Action<C>,
}

// `BinaryHeap` is a max-heap; reverse so the earliest (deadline, seq) sits on top.
impl<C> Ord for Entry<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.deadline, other.seq).cmp(&(self.deadline, self.seq))
    }
}

impl<C> PartialOrd for Entry<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> PartialEq for Entry<C> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<C> Eq for Entry<C> {}

/// One action that returned an error during a tick.
#[derive(Debug)]
pub struct TaskFailure {
    pub label: String,
    pub error: CurtainError,
}

/// Outcome of a single frame pass.
#[derive(Debug, Default)]
pub struct TickReport {
    pub now: Millis,
    /// Actions that ran (successfully or not).
    pub fired: usize,
    pub failures: Vec<TaskFailure>,
}

/// Deadline-ordered queue of deferred actions over context `C`.
pub struct Scheduler<C> {
    heap: BinaryHeap<Entry<C>>,
    next_seq: u64,
    now: Millis,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            now: Millis::ZERO,
        }
    }

    /// Time of the most recent tick (or explicit sync); new items are stamped with it.
    pub fn now(&self) -> Millis {
        self.now
    }

    /// Sync the enqueue timestamp with an external clock between ticks.
    pub fn sync(&mut self, now: Millis) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Register `action` to run no sooner than `delay` after [`Scheduler::now`].
    ///
    /// The deadline is measured from the last `tick` or `sync`, not from wall time, so a caller
    /// enqueueing between frames must `sync` first. Never runs the action synchronously: even a
    /// zero delay waits for the next tick, and work enqueued while a tick is executing is left
    /// for a later tick.
    pub fn enqueue<F>(
        &mut self,
        label: impl Into<Cow<'static, str>>,
        delay: Millis,
        action: F,
    ) -> TaskHandle
    where
        F: FnOnce(&mut C, &mut Scheduler<C>) -> CurtainResult<()> + 'static,
    {
        let handle = TaskHandle::new();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            deadline: self.now.after(delay),
            seq,
            label: label.into(),
            handle: handle.clone(),
            action: Box::new(action),
        });
        handle
    }

    /// Number of live (not cancelled) pending items.
    pub fn len(&self) -> usize {
        self.heap
            .iter()
            .filter(|e| !e.handle.is_cancelled())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether another frame tick should be requested.
    pub fn needs_frame(&self) -> bool {
        !self.is_empty()
    }

    /// Earliest deadline among live items.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.heap
            .iter()
            .filter(|e| !e.handle.is_cancelled())
            .map(|e| e.deadline)
            .min()
    }

    /// Run one frame pass at `now`.
    ///
    /// Every item ready at the start of the pass runs exactly once, in insertion order. An
    /// action's error is logged and reported but never stops its siblings.
    #[tracing::instrument(level = "trace", skip(self, ctx))]
    pub fn tick(&mut self, ctx: &mut C, now: Millis) -> TickReport {
        self.sync(now);
        self.heap.retain(|e| !e.handle.is_cancelled());

        let mut ready = Vec::new();
        while self.heap.peek().is_some_and(|e| e.deadline <= self.now) {
            if let Some(e) = self.heap.pop() {
                ready.push(e);
            }
        }
        ready.sort_by_key(|e| e.seq);

        let mut report = TickReport {
            now: self.now,
            ..TickReport::default()
        };
        for e in ready {
            // An earlier action in this pass may have cancelled a later one.
            if e.handle.is_cancelled() {
                continue;
            }
            let Entry {
                label,
                handle,
                action,
                ..
            } = e;
            handle.state.set(TaskState::Fired);
            report.fired += 1;

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(ctx, self)))
                .unwrap_or_else(|payload| Err(CurtainError::panicked(panic_message(&*payload))));
            if let Err(error) = outcome {
                tracing::warn!(task = %label, %error, "scheduled action failed");
                report.failures.push(TaskFailure {
                    label: label.into_owned(),
                    error,
                });
            }
        }
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Vec<&'static str>;

    fn push(
        name: &'static str,
    ) -> impl FnOnce(&mut Log, &mut Scheduler<Log>) -> CurtainResult<()> {
        move |log: &mut Log, _: &mut Scheduler<Log>| {
            log.push(name);
            Ok(())
        }
    }

    #[test]
    fn zero_delay_waits_for_tick() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        s.enqueue("a", Millis::ZERO, push("a"));
        assert!(log.is_empty());
        assert!(s.needs_frame());
        s.tick(&mut log, Millis::ZERO);
        assert_eq!(log, vec!["a"]);
        assert!(!s.needs_frame());
    }

    #[test]
    fn work_enqueued_during_tick_runs_next_tick() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        s.enqueue("outer", Millis::ZERO, |log: &mut Log, s: &mut Scheduler<Log>| {
            log.push("outer");
            s.enqueue("inner", Millis::ZERO, push("inner"));
            Ok(())
        });
        s.tick(&mut log, Millis(16));
        assert_eq!(log, vec!["outer"]);
        s.tick(&mut log, Millis(32));
        assert_eq!(log, vec!["outer", "inner"]);
    }

    #[test]
    fn not_ready_items_are_retained() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        s.enqueue("late", Millis(100), push("late"));
        s.tick(&mut log, Millis(96));
        assert!(log.is_empty());
        assert_eq!(s.next_deadline(), Some(Millis(100)));
        s.tick(&mut log, Millis(112));
        assert_eq!(log, vec!["late"]);
    }

    #[test]
    fn ready_items_run_in_insertion_order() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        s.enqueue("slow", Millis(100), push("slow"));
        s.enqueue("fast", Millis(50), push("fast"));
        s.tick(&mut log, Millis(200));
        assert_eq!(log, vec!["slow", "fast"]);
    }

    #[test]
    fn failing_action_does_not_block_siblings() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        s.enqueue("a", Millis::ZERO, push("a"));
        s.enqueue("boom", Millis::ZERO, |_: &mut Log, _: &mut Scheduler<Log>| {
            Err(CurtainError::validation("boom"))
        });
        s.enqueue("b", Millis::ZERO, push("b"));
        s.enqueue("c", Millis(30), push("c"));

        let r = s.tick(&mut log, Millis::ZERO);
        assert_eq!(r.fired, 3);
        assert_eq!(r.failures.len(), 1);
        assert_eq!(r.failures[0].label, "boom");
        assert_eq!(log, vec!["a", "b"]);

        s.tick(&mut log, Millis(32));
        assert_eq!(log, vec!["a", "b", "c"]);
    }

    #[test]
    fn panicking_action_does_not_drop_siblings() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        s.enqueue("boom", Millis::ZERO, |_: &mut Log, _: &mut Scheduler<Log>| {
            panic!("logo target vanished")
        });
        s.enqueue("sibling", Millis::ZERO, push("sibling"));
        s.enqueue("later", Millis(30), push("later"));

        let r = s.tick(&mut log, Millis(16));
        assert_eq!(log, vec!["sibling"]);
        assert_eq!(r.fired, 2);
        assert_eq!(r.failures.len(), 1);
        assert_eq!(r.failures[0].label, "boom");
        assert!(matches!(
            &r.failures[0].error,
            CurtainError::Panicked(msg) if msg == "logo target vanished"
        ));

        s.tick(&mut log, Millis(32));
        assert_eq!(log, vec!["sibling", "later"]);
    }

    #[test]
    fn cancelled_items_never_run() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        let h = s.enqueue("x", Millis(10), push("x"));
        assert!(h.cancel());
        assert!(!h.cancel());
        assert!(!s.needs_frame());
        s.tick(&mut log, Millis(100));
        assert!(log.is_empty());
        assert!(h.is_cancelled());
    }

    #[test]
    fn earlier_action_can_cancel_later_sibling() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        let victim_holder: Rc<std::cell::RefCell<Option<TaskHandle>>> = Rc::default();
        let holder = victim_holder.clone();
        s.enqueue("killer", Millis::ZERO, move |log: &mut Log, _: &mut Scheduler<Log>| {
            log.push("killer");
            if let Some(h) = holder.borrow().as_ref() {
                h.cancel();
            }
            Ok(())
        });
        let victim = s.enqueue("victim", Millis(5), push("victim"));
        *victim_holder.borrow_mut() = Some(victim.clone());

        s.tick(&mut log, Millis(10));
        assert_eq!(log, vec!["killer"]);
        assert!(victim.is_cancelled());
    }

    #[test]
    fn handle_reports_fired() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        let h = s.enqueue("x", Millis::ZERO, push("x"));
        assert!(h.is_pending());
        s.tick(&mut log, Millis::ZERO);
        assert!(h.has_fired());
        assert!(!h.cancel());
    }

    #[test]
    fn enqueue_is_stamped_with_synced_time() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        s.sync(Millis(1000));
        s.enqueue("x", Millis(100), push("x"));
        s.tick(&mut log, Millis(1096));
        assert!(log.is_empty());
        s.tick(&mut log, Millis(1100));
        assert_eq!(log, vec!["x"]);
    }

    #[test]
    fn enqueue_between_ticks_counts_from_last_tick() {
        let mut s = Scheduler::<Log>::new();
        let mut log = Log::new();
        s.tick(&mut log, Millis(100));
        s.enqueue("x", Millis(50), push("x"));
        assert_eq!(s.next_deadline(), Some(Millis(150)));
        s.tick(&mut log, Millis(140));
        assert!(log.is_empty());
        s.tick(&mut log, Millis(150));
        assert_eq!(log, vec!["x"]);
    }
}
