//! Lazily materialized, permanently cached sequences indexed by grading.
//!
//! A [`Graded<T>`] owns a slot arena (`Empty` → `InProgress` → `Ready`) and a
//! generator. Requesting grading `n` materializes every missing slot `0..=n`
//! in ascending order; a generator may request other sequences at any
//! grading, which grows them on demand.
//!
//! # Design Principles
//! - **Write once**: a `Ready` slot is never recomputed or mutated.
//! - **Explicit cycle detection**: requesting a slot that is `InProgress`
//!   fails with [`EngineError::Cycle`] instead of recursing forever.
//! - **Failures are not cached**: a failed generation returns the slot to
//!   `Empty`, so the same request fails the same way again.
//!
//! # Thread safety
//! Slots live in a `RefCell`; the type is `!Sync`. Callers exploring several
//! gradings in parallel must serialize first materialization themselves.
//!
//! # References
//! - *Memoization with cycle detection*: [Salsa: A Library for Incremental Computation, POPL 2020]

use crate::error::EngineError;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Generator signature: receives the sequence itself and the grading to build.
pub type Generator<T> = dyn Fn(&Graded<T>, usize) -> Result<T, EngineError>;

#[derive(Debug)]
enum Slot<T> {
    Empty,
    InProgress,
    Ready(Rc<T>),
}

/// Cache counters for one sequence.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SequenceMetrics {
    /// `get` calls served without computing anything.
    pub hits: u64,
    /// `get` calls that had to materialize at least one slot.
    pub misses: u64,
    /// Generator invocations that produced a value.
    pub computes: u64,
    /// Requests rejected because the slot was in progress.
    pub cycles_detected: u64,
}

thread_local! {
    /// Materializations currently on the stack, outermost first.
    static MATERIALIZING: RefCell<Vec<(String, usize)>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard for one slot materialization.
///
/// Pushes `(name, grading)` on the thread-local path on creation. On drop,
/// unless finished, resets the slot to `Empty`; the path entry is popped in
/// both cases, including during unwinding.
struct SlotGuard<'a, T> {
    sequence: &'a Graded<T>,
    grading: usize,
    active: bool,
}

impl<'a, T> SlotGuard<'a, T> {
    fn enter(sequence: &'a Graded<T>, grading: usize) -> Self {
        MATERIALIZING.with(|path| path.borrow_mut().push((sequence.name.clone(), grading)));
        Self {
            sequence,
            grading,
            active: true,
        }
    }

    fn finish(mut self, value: Rc<T>) {
        self.active = false;
        self.sequence.slots.borrow_mut()[self.grading] = Slot::Ready(value);
    }
}

impl<T> Drop for SlotGuard<'_, T> {
    fn drop(&mut self) {
        if self.active {
            if let Ok(mut slots) = self.sequence.slots.try_borrow_mut() {
                if matches!(slots[self.grading], Slot::InProgress) {
                    slots[self.grading] = Slot::Empty;
                }
            }
        }
        MATERIALIZING.with(|path| {
            let _ = path.borrow_mut().pop();
        });
    }
}

fn current_path() -> Vec<(String, usize)> {
    MATERIALIZING.with(|path| path.borrow().clone())
}

/// A self-extending sequence `grading -> Rc<T>`.
pub struct Graded<T> {
    name: String,
    slots: RefCell<Vec<Slot<T>>>,
    generator: Box<Generator<T>>,
    limit: Option<usize>,
    metrics: RefCell<SequenceMetrics>,
}

impl<T> Graded<T> {
    /// Creates an empty sequence driven by `generator`.
    pub fn new<F>(name: impl Into<String>, generator: F) -> Self
    where
        F: Fn(&Graded<T>, usize) -> Result<T, EngineError> + 'static,
    {
        Self {
            name: name.into(),
            slots: RefCell::new(Vec::new()),
            generator: Box::new(generator),
            limit: None,
            metrics: RefCell::new(SequenceMetrics::default()),
        }
    }

    /// Rejects gradings above `limit` with [`EngineError::GradingLimit`].
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns `S[n]`, materializing every missing slot `0..=n` first.
    pub fn get(&self, n: usize) -> Result<Rc<T>, EngineError> {
        if let Some(value) = self.ready(n) {
            self.metrics.borrow_mut().hits += 1;
            return Ok(value);
        }
        if let Some(limit) = self.limit {
            if n > limit {
                return Err(EngineError::GradingLimit {
                    sequence: self.name.clone(),
                    grading: n,
                    limit,
                });
            }
        }
        self.metrics.borrow_mut().misses += 1;
        for k in 0..=n {
            self.materialize(k)?;
        }
        self.ready(n).ok_or_else(|| self.cycle(n))
    }

    /// Number of leading slots that are `Ready`.
    pub fn materialized(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .take_while(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// The `Ready` prefix, in grading order.
    pub fn prefix(&self) -> Vec<Rc<T>> {
        self.slots
            .borrow()
            .iter()
            .map_while(|slot| match slot {
                Slot::Ready(value) => Some(Rc::clone(value)),
                _ => None,
            })
            .collect()
    }

    pub fn metrics(&self) -> SequenceMetrics {
        *self.metrics.borrow()
    }

    pub fn reset_metrics(&self) {
        *self.metrics.borrow_mut() = SequenceMetrics::default();
    }

    fn ready(&self, n: usize) -> Option<Rc<T>> {
        match self.slots.borrow().get(n) {
            Some(Slot::Ready(value)) => Some(Rc::clone(value)),
            _ => None,
        }
    }

    fn cycle(&self, n: usize) -> EngineError {
        self.metrics.borrow_mut().cycles_detected += 1;
        EngineError::Cycle {
            sequence: self.name.clone(),
            grading: n,
            path: current_path(),
        }
    }

    fn materialize(&self, k: usize) -> Result<(), EngineError> {
        let busy = {
            let mut slots = self.slots.borrow_mut();
            if slots.len() <= k {
                slots.resize_with(k + 1, || Slot::Empty);
            }
            if matches!(slots[k], Slot::Ready(_)) {
                return Ok(());
            }
            let busy = matches!(slots[k], Slot::InProgress);
            if !busy {
                slots[k] = Slot::InProgress;
            }
            busy
        };
        if busy {
            return Err(self.cycle(k));
        }

        // The borrow is released: the generator may re-enter this sequence.
        let guard = SlotGuard::enter(self, k);
        let value = (self.generator)(self, k)?;
        guard.finish(Rc::new(value));
        self.metrics.borrow_mut().computes += 1;
        trace!(sequence = %self.name, grading = k, "materialized");
        Ok(())
    }
}

impl<T: Clone + 'static> Graded<T> {
    /// A finite sequence over fixed values; gradings past the end are `Unavailable`.
    pub fn from_values(name: impl Into<String>, values: Vec<T>) -> Self {
        let name = name.into();
        let sequence_name = name.clone();
        Self::new(name, move |_, n| {
            values
                .get(n)
                .cloned()
                .ok_or_else(|| EngineError::Unavailable {
                    sequence: sequence_name.clone(),
                    grading: n,
                    available: values.len(),
                })
        })
    }
}

impl<T> fmt::Debug for Graded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graded")
            .field("name", &self.name)
            .field("materialized", &self.materialized())
            .field("limit", &self.limit)
            .field("metrics", &self.metrics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::Cell;

    fn fibonacci() -> Graded<u64> {
        Graded::new("fib", |seq: &Graded<u64>, n| {
            if n < 2 {
                Ok(n as u64)
            } else {
                Ok(*seq.get(n - 1)? + *seq.get(n - 2)?)
            }
        })
    }

    #[test]
    fn reads_own_prefix() {
        let fib = fibonacci();
        assert_eq!(*fib.get(10).unwrap(), 55);
        assert_eq!(fib.materialized(), 11);
        let prefix: Vec<u64> = fib.prefix().iter().map(|v| **v).collect();
        assert_eq!(prefix, vec![0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55]);
    }

    #[test]
    fn computes_each_grading_once() {
        let calls = Rc::new(Cell::new(0usize));
        let probe = Rc::clone(&calls);
        let seq = Graded::new("probe", move |_, n| {
            probe.set(probe.get() + 1);
            Ok(n * n)
        });

        let first = seq.get(4).unwrap();
        let second = seq.get(4).unwrap();
        assert_eq!(first, second);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 5);

        seq.get(2).unwrap();
        assert_eq!(calls.get(), 5);

        let metrics = seq.metrics();
        assert_eq!(metrics.computes, 5);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.hits, 2);
    }

    #[test]
    fn materializes_in_ascending_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&order);
        let seq = Graded::new("ordered", move |_, n| {
            log.borrow_mut().push(n);
            Ok(())
        });
        seq.get(3).unwrap();
        seq.get(5).unwrap();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn forward_reference_grows_other_sequence() {
        let base = Rc::new(Graded::new("base", |_, n| Ok(n as i64)));
        let inner = Rc::clone(&base);
        let shifted = Graded::new("shifted", move |_, n| Ok(*inner.get(n + 2)?));
        assert_eq!(*shifted.get(0).unwrap(), 2);
        assert_eq!(base.materialized(), 3);
        assert_eq!(*shifted.get(3).unwrap(), 5);
        assert_eq!(base.materialized(), 6);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let seq: Graded<u32> = Graded::new("selfish", |seq: &Graded<u32>, n| {
            if n == 2 {
                Ok(*seq.get(3)? + 1)
            } else {
                Ok(0)
            }
        });
        let err = seq.get(3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);
        match err {
            EngineError::Cycle {
                sequence,
                grading,
                path,
            } => {
                assert_eq!(sequence, "selfish");
                assert_eq!(grading, 2);
                assert_eq!(path, vec![("selfish".to_string(), 2)]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(seq.metrics().cycles_detected, 1);
        // Slots below the failure stay cached; the failed slot is retried.
        assert_eq!(seq.materialized(), 2);
        assert!(seq.get(3).is_err());
    }

    #[test]
    fn cycle_through_another_sequence() {
        use std::cell::OnceCell;

        // A[n] reads B[n] and B[n] reads A[n]; B is bound after both exist.
        let late_b: Rc<OnceCell<Rc<Graded<u32>>>> = Rc::new(OnceCell::new());
        let bound = Rc::clone(&late_b);
        let a = Rc::new(Graded::new("A", move |_, n| match bound.get() {
            Some(b) => Ok(*b.get(n)? + 1),
            None => Ok(0),
        }));
        let inner = Rc::clone(&a);
        let b = Rc::new(Graded::new("B", move |_, n| Ok(*inner.get(n)? + 1)));
        assert!(late_b.set(Rc::clone(&b)).is_ok());

        let err = a.get(1).unwrap_err();
        assert_eq!(err.to_string(), "cycle detected at A[0] via A[0] -> B[0]");
        assert_eq!(
            err,
            EngineError::Cycle {
                sequence: "A".to_string(),
                grading: 0,
                path: vec![("A".to_string(), 0), ("B".to_string(), 0)],
            }
        );
        assert_eq!(a.metrics().cycles_detected, 1);
        assert_eq!(a.materialized(), 0);
        assert_eq!(b.materialized(), 0);
        assert!(current_path().is_empty());
    }

    #[test]
    fn failures_are_not_cached() {
        let attempts = Rc::new(Cell::new(0u32));
        let probe = Rc::clone(&attempts);
        let seq = Graded::new("flaky", move |_, n| {
            probe.set(probe.get() + 1);
            if n == 1 {
                Err(EngineError::overflow("test"))
            } else {
                Ok(n)
            }
        });
        assert!(seq.get(1).is_err());
        assert!(seq.get(1).is_err());
        assert_eq!(attempts.get(), 3);
        assert_eq!(seq.materialized(), 1);
    }

    #[test]
    fn grading_limit() {
        let seq = Graded::new("bounded", |_, n| Ok(n)).with_limit(4);
        assert_eq!(*seq.get(4).unwrap(), 4);
        let err = seq.get(5).unwrap_err();
        assert_eq!(
            err,
            EngineError::GradingLimit {
                sequence: "bounded".to_string(),
                grading: 5,
                limit: 4
            }
        );
    }

    #[test]
    fn fixed_values_run_out() {
        let seq = Graded::from_values("table", vec![10, 20]);
        assert_eq!(*seq.get(1).unwrap(), 20);
        assert_eq!(seq.get(2).unwrap_err().kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn panicking_generator_releases_slot() {
        let seq = Graded::new("panicky", |_, n| {
            if n == 1 {
                panic!("boom");
            }
            Ok(n)
        });
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| seq.get(1)));
        assert!(result.is_err());
        assert_eq!(seq.materialized(), 1);
        assert!(current_path().is_empty());
    }
}
