//! Priority-ordered tick scheduler.
//!
//! The [`TickQueue`] is the only thing that advances simulated time. Each
//! registered task is a plain function plus an optional owning object, and
//! every tick:
//!
//! 1. Tasks run grouped by ascending priority, in insertion order within a
//!    priority, each receiving the same [`TickInfo`].
//! 2. After each task returns, any [`QueueRequest`]s it left in the context are
//!    applied. Removals take effect at once (a removed task is never invoked
//!    later in the same tick); additions start on the next tick.
//!
//! Order depends only on numeric priority and on the order registrations
//! happened, never on hashing or addresses, so two runs that register the same
//! tasks in the same order tick identically.
//!
//! # Example
//!
//! ```
//! use orbitfall_sim::tick::{QueueRequest, TickContext, TickInfo, TickQueue};
//! use orbitfall_sim::ObjectId;
//!
//! #[derive(Default)]
//! struct Trace {
//!     calls: Vec<&'static str>,
//!     requests: Vec<QueueRequest<Trace>>,
//! }
//!
//! impl TickContext for Trace {
//!     fn take_requests(&mut self) -> Vec<QueueRequest<Self>> {
//!         std::mem::take(&mut self.requests)
//!     }
//! }
//!
//! fn late(trace: &mut Trace, _: &TickInfo, _: Option<ObjectId>) { trace.calls.push("late") }
//! fn early(trace: &mut Trace, _: &TickInfo, _: Option<ObjectId>) { trace.calls.push("early") }
//!
//! let mut queue = TickQueue::new();
//! queue.add(20, "late", late, None);
//! queue.add(-5, "early", early, None);
//!
//! let mut trace = Trace::default();
//! queue.tick(&mut trace, &TickInfo::new(0, 16));
//! assert_eq!(trace.calls, vec!["early", "late"]);
//! ```

use std::collections::HashMap;

use crate::ObjectId;

// ---------------------------------------------------------------------------
// TickInfo
// ---------------------------------------------------------------------------

/// Timing shared by every task invoked during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Zero-based index of the tick.
    pub tick: u64,
    /// Simulated clock at the start of the tick, in milliseconds.
    pub timestamp_ms: u64,
    /// Length of the tick in milliseconds.
    pub elapsed_ms: u32,
}

impl TickInfo {
    /// Build the info for tick `tick` of a clock running at `elapsed_ms` per
    /// tick. The timestamp is computed from the tick index, not accumulated.
    pub fn new(tick: u64, elapsed_ms: u32) -> Self {
        Self {
            tick,
            timestamp_ms: tick * u64::from(elapsed_ms),
            elapsed_ms,
        }
    }

    /// Tick length in seconds.
    pub fn elapsed(&self) -> f64 {
        f64::from(self.elapsed_ms) / 1000.0
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Ordering key. Lower priorities run first.
pub type Priority = i32;

/// A task invoked once per tick with the run's context, the tick timing and
/// the owner it was registered for.
pub type TickFn<C> = fn(&mut C, &TickInfo, Option<ObjectId>);

/// Identity of a registration: a task name plus an optional owner. At most one
/// registration exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub task: &'static str,
    pub owner: Option<ObjectId>,
}

/// A registered task. Copied into the per-tick run list, so it holds only
/// plain data.
struct Entry<C> {
    key: TaskKey,
    func: TickFn<C>,
    /// Bumped on every (re-)registration so that a snapshot taken at the start
    /// of a tick can tell a live entry from one that was removed and re-added.
    generation: u64,
}

impl<C> Clone for Entry<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Entry<C> {}

/// All entries sharing one priority, in insertion order.
struct Bucket<C> {
    priority: Priority,
    entries: Vec<Entry<C>>,
}

/// A change to the queue requested by a task while the queue is ticking.
pub enum QueueRequest<C> {
    Add {
        priority: Priority,
        task: &'static str,
        func: TickFn<C>,
        owner: Option<ObjectId>,
    },
    Remove {
        task: &'static str,
        owner: Option<ObjectId>,
    },
}

impl<C> std::fmt::Debug for QueueRequest<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add {
                priority,
                task,
                owner,
                ..
            } => f
                .debug_struct("Add")
                .field("priority", priority)
                .field("task", task)
                .field("owner", owner)
                .finish(),
            Self::Remove { task, owner } => f
                .debug_struct("Remove")
                .field("task", task)
                .field("owner", owner)
                .finish(),
        }
    }
}

/// The per-run context a queue ticks against.
///
/// Tasks receive `&mut C` but not the queue itself, so they register and
/// deregister by leaving requests in the context.
pub trait TickContext: Sized {
    /// Hand over (and forget) every request queued since the last call.
    fn take_requests(&mut self) -> Vec<QueueRequest<Self>>;
}

/// What [`TickQueue::add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new registration was created.
    Added,
    /// The key was registered at another priority and has been moved.
    Moved { from: Priority },
    /// The key was already registered at this priority. Nothing changed.
    Unchanged,
}

// ---------------------------------------------------------------------------
// TickQueue
// ---------------------------------------------------------------------------

/// Priority-bucketed task list driving one simulation run.
///
/// Buckets are kept sorted by priority (binary search on insert) so `tick`
/// never sorts. A key index gives constant-time duplicate detection.
pub struct TickQueue<C> {
    buckets: Vec<Bucket<C>>,
    /// Priority and generation of every live registration.
    index: HashMap<TaskKey, (Priority, u64)>,
    next_generation: u64,
    /// Reused run list for `tick`.
    scratch: Vec<Entry<C>>,
}

impl<C> Default for TickQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TickQueue<C> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            index: HashMap::new(),
            next_generation: 0,
            scratch: Vec::new(),
        }
    }

    /// Register `task` for `owner` to run every tick at `priority`.
    ///
    /// Registering a key that already exists at another priority moves it;
    /// registering it again at the same priority does nothing. Both are
    /// logged as misuse but never fail.
    pub fn add(
        &mut self,
        priority: Priority,
        task: &'static str,
        func: TickFn<C>,
        owner: Option<ObjectId>,
    ) -> Registration {
        let key = TaskKey { task, owner };

        let outcome = match self.index.get(&key) {
            Some(&(existing, _)) if existing == priority => {
                tracing::warn!(task, ?owner, priority, "task already registered at this priority");
                return Registration::Unchanged;
            }
            Some(&(existing, _)) => {
                tracing::warn!(
                    task,
                    ?owner,
                    from = existing,
                    to = priority,
                    "task re-registered at a different priority -- moving it"
                );
                self.detach(&key, existing);
                Registration::Moved { from: existing }
            }
            None => Registration::Added,
        };

        let generation = self.next_generation;
        self.next_generation += 1;

        let entry = Entry {
            key,
            func,
            generation,
        };
        match self
            .buckets
            .binary_search_by_key(&priority, |bucket| bucket.priority)
        {
            Ok(pos) => self.buckets[pos].entries.push(entry),
            Err(pos) => self.buckets.insert(
                pos,
                Bucket {
                    priority,
                    entries: vec![entry],
                },
            ),
        }
        self.index.insert(key, (priority, generation));

        outcome
    }

    /// Deregister `task` for `owner`. Returns `false` (and logs misuse) when
    /// nothing was registered under that key.
    pub fn remove(&mut self, task: &'static str, owner: Option<ObjectId>) -> bool {
        let key = TaskKey { task, owner };
        match self.index.remove(&key) {
            Some((priority, _)) => {
                self.detach(&key, priority);
                true
            }
            None => {
                tracing::warn!(task, ?owner, "removing a task that is not registered");
                false
            }
        }
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.index.clear();
    }

    /// Apply one request produced by a task.
    pub fn apply(&mut self, request: QueueRequest<C>) {
        match request {
            QueueRequest::Add {
                priority,
                task,
                func,
                owner,
            } => {
                self.add(priority, task, func, owner);
            }
            QueueRequest::Remove { task, owner } => {
                self.remove(task, owner);
            }
        }
    }

    /// Apply requests in order.
    pub fn apply_all(&mut self, requests: impl IntoIterator<Item = QueueRequest<C>>) {
        for request in requests {
            self.apply(request);
        }
    }

    /// Remove the entry for `key` from its bucket, dropping the bucket if it
    /// empties. Does not touch the index.
    fn detach(&mut self, key: &TaskKey, priority: Priority) {
        if let Ok(pos) = self
            .buckets
            .binary_search_by_key(&priority, |bucket| bucket.priority)
        {
            let bucket = &mut self.buckets[pos];
            bucket.entries.retain(|entry| entry.key != *key);
            if bucket.entries.is_empty() {
                self.buckets.remove(pos);
            }
        }
    }

    // -- accessors ----------------------------------------------------------

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `task` is registered for `owner`.
    pub fn contains(&self, task: &'static str, owner: Option<ObjectId>) -> bool {
        self.index.contains_key(&TaskKey { task, owner })
    }

    /// The priority `task` is registered at for `owner`, if any.
    pub fn priority_of(&self, task: &'static str, owner: Option<ObjectId>) -> Option<Priority> {
        self.index
            .get(&TaskKey { task, owner })
            .map(|&(priority, _)| priority)
    }

    /// The distinct priorities in use, ascending.
    pub fn priorities(&self) -> Vec<Priority> {
        self.buckets.iter().map(|bucket| bucket.priority).collect()
    }

    /// Every registration in the order `tick` would invoke it.
    pub fn run_order(&self) -> Vec<TaskKey> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.entries.iter().map(|entry| entry.key))
            .collect()
    }
}

impl<C: TickContext> TickQueue<C> {
    /// Run every registered task once.
    pub fn tick(&mut self, ctx: &mut C, info: &TickInfo) {
        let mut run_list = std::mem::take(&mut self.scratch);
        run_list.clear();
        run_list.extend(
            self.buckets
                .iter()
                .flat_map(|bucket| bucket.entries.iter().copied()),
        );

        for entry in &run_list {
            // Skip entries removed (or replaced) by an earlier task this tick.
            match self.index.get(&entry.key) {
                Some(&(_, generation)) if generation == entry.generation => {}
                _ => continue,
            }
            (entry.func)(ctx, info, entry.key.owner);
            for request in ctx.take_requests() {
                self.apply(request);
            }
        }

        self.scratch = run_list;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- test context -------------------------------------------------------

    #[derive(Default)]
    struct Trace {
        calls: Vec<(&'static str, Option<ObjectId>)>,
        requests: Vec<QueueRequest<Trace>>,
    }

    impl TickContext for Trace {
        fn take_requests(&mut self) -> Vec<QueueRequest<Self>> {
            std::mem::take(&mut self.requests)
        }
    }

    fn alpha(t: &mut Trace, _: &TickInfo, owner: Option<ObjectId>) {
        t.calls.push(("alpha", owner));
    }

    fn beta(t: &mut Trace, _: &TickInfo, owner: Option<ObjectId>) {
        t.calls.push(("beta", owner));
    }

    fn gamma(t: &mut Trace, _: &TickInfo, owner: Option<ObjectId>) {
        t.calls.push(("gamma", owner));
    }

    /// Removes `beta` for the same owner while the tick is running.
    fn remove_beta(t: &mut Trace, _: &TickInfo, owner: Option<ObjectId>) {
        t.calls.push(("remove_beta", owner));
        t.requests.push(QueueRequest::Remove {
            task: "beta",
            owner,
        });
    }

    /// Adds `gamma` at the same priority while the tick is running.
    fn spawn_gamma(t: &mut Trace, _: &TickInfo, owner: Option<ObjectId>) {
        t.calls.push(("spawn_gamma", owner));
        t.requests.push(QueueRequest::Add {
            priority: 0,
            task: "gamma",
            func: gamma,
            owner,
        });
    }

    fn run(queue: &mut TickQueue<Trace>) -> Vec<(&'static str, Option<ObjectId>)> {
        let mut trace = Trace::default();
        queue.tick(&mut trace, &TickInfo::new(0, 16));
        trace.calls
    }

    // -- ordering -----------------------------------------------------------

    #[test]
    fn ticks_in_ascending_priority_regardless_of_registration_order() {
        let mut queue = TickQueue::new();
        queue.add(10, "alpha", alpha, None);
        queue.add(5, "beta", beta, None);
        queue.add(20, "gamma", gamma, None);

        assert_eq!(queue.priorities(), vec![5, 10, 20]);
        assert_eq!(
            run(&mut queue),
            vec![("beta", None), ("alpha", None), ("gamma", None)]
        );
    }

    #[test]
    fn same_priority_runs_in_insertion_order() {
        let mut queue = TickQueue::new();
        queue.add(1, "gamma", gamma, None);
        queue.add(1, "alpha", alpha, None);
        queue.add(1, "beta", beta, None);

        assert_eq!(
            run(&mut queue),
            vec![("gamma", None), ("alpha", None), ("beta", None)]
        );
    }

    #[test]
    fn negative_priorities_sort_first() {
        let mut queue = TickQueue::new();
        queue.add(0, "alpha", alpha, None);
        queue.add(-3, "beta", beta, None);
        assert_eq!(queue.priorities(), vec![-3, 0]);
    }

    // -- registration identity ----------------------------------------------

    #[test]
    fn re_adding_at_new_priority_moves_the_registration() {
        let mut queue = TickQueue::new();
        let owner = Some(ObjectId(1));
        assert_eq!(queue.add(5, "alpha", alpha, owner), Registration::Added);
        assert_eq!(
            queue.add(9, "alpha", alpha, owner),
            Registration::Moved { from: 5 }
        );

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.priority_of("alpha", owner), Some(9));
        assert_eq!(queue.priorities(), vec![9]);
        assert_eq!(run(&mut queue), vec![("alpha", owner)]);
    }

    #[test]
    fn re_adding_at_same_priority_is_a_no_op() {
        let mut queue = TickQueue::new();
        queue.add(5, "alpha", alpha, None);
        assert_eq!(queue.add(5, "alpha", alpha, None), Registration::Unchanged);
        assert_eq!(queue.len(), 1);
        assert_eq!(run(&mut queue).len(), 1);
    }

    #[test]
    fn same_task_for_different_owners_is_distinct() {
        let mut queue = TickQueue::new();
        queue.add(0, "alpha", alpha, Some(ObjectId(1)));
        queue.add(0, "alpha", alpha, Some(ObjectId(2)));
        queue.add(0, "alpha", alpha, None);

        assert_eq!(queue.len(), 3);
        assert_eq!(
            run(&mut queue),
            vec![
                ("alpha", Some(ObjectId(1))),
                ("alpha", Some(ObjectId(2))),
                ("alpha", None)
            ]
        );
    }

    // -- removal ------------------------------------------------------------

    #[test]
    fn remove_deregisters_and_drops_empty_bucket() {
        let mut queue = TickQueue::new();
        queue.add(3, "alpha", alpha, None);
        queue.add(7, "beta", beta, None);

        assert!(queue.remove("alpha", None));
        assert!(!queue.contains("alpha", None));
        assert_eq!(queue.priorities(), vec![7]);
        assert_eq!(run(&mut queue), vec![("beta", None)]);
    }

    #[test]
    fn removing_absent_task_is_tolerated() {
        let mut queue: TickQueue<Trace> = TickQueue::new();
        assert!(!queue.remove("alpha", Some(ObjectId(4))));

        queue.add(0, "alpha", alpha, None);
        assert!(queue.remove("alpha", None));
        assert!(!queue.remove("alpha", None));
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut queue = TickQueue::new();
        queue.add(0, "alpha", alpha, None);
        queue.add(1, "beta", beta, Some(ObjectId(9)));
        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.priorities().is_empty());
        assert!(run(&mut queue).is_empty());
    }

    // -- changes during a tick ----------------------------------------------

    #[test]
    fn removal_during_tick_takes_effect_immediately() {
        let mut queue = TickQueue::new();
        let owner = Some(ObjectId(3));
        queue.add(0, "remove_beta", remove_beta, owner);
        queue.add(1, "beta", beta, owner);

        assert_eq!(run(&mut queue), vec![("remove_beta", owner)]);
        assert!(!queue.contains("beta", owner));
    }

    #[test]
    fn addition_during_tick_starts_next_tick() {
        let mut queue = TickQueue::new();
        queue.add(0, "spawn_gamma", spawn_gamma, None);

        assert_eq!(run(&mut queue), vec![("spawn_gamma", None)]);
        assert!(queue.contains("gamma", None));

        // The second request for gamma is a same-priority no-op.
        assert_eq!(
            run(&mut queue),
            vec![("spawn_gamma", None), ("gamma", None)]
        );
    }

    #[test]
    fn tick_info_timestamp_is_computed_from_index() {
        let info = TickInfo::new(1000, 16);
        assert_eq!(info.timestamp_ms, 16_000);
        assert!((info.elapsed() - 0.016).abs() < f64::EPSILON);
    }

    #[test]
    fn run_order_matches_invocation_order() {
        let mut queue = TickQueue::new();
        queue.add(2, "alpha", alpha, None);
        queue.add(1, "beta", beta, Some(ObjectId(5)));

        let order: Vec<_> = queue.run_order().iter().map(|k| k.task).collect();
        assert_eq!(order, vec!["beta", "alpha"]);
    }
}
