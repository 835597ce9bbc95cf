//! Fusion node state and propagation.
//!
//! Each source holds a listener that keeps the node alive; the result cell
//! and the sources only see the node through weak decay hooks. Dropping
//! every source therefore frees the node, and no cycle runs through the
//! result cell.
//!
//! The node lock is never held while the result cell is written.
//!
//! A strong fusion keeps its outstanding getter fetches as shared futures.
//! Any number of `settle()` calls may drive them at once, and cancelling one
//! leaves the fetches in place for the next.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::cell::{Cell, CellValue, Fetch, ListenerId, WeakCell};

use super::inputs::Inputs;
use super::strategy::Strategy;
use super::waiters::Waiters;

/// A fusion's compute function.
pub type Compute<T> = Arc<dyn Fn(&Inputs<T>) -> T + Send + Sync>;

/// What it takes to unhook one source.
struct Disposer<T> {
    source: WeakCell<T>,
    listener: ListenerId,
    decay_hook: ListenerId,
}

struct State<T> {
    /// Immediate deliveries still owed by `up` during wiring.
    skip: usize,
    decayed: HashSet<u64>,
    /// Last value seen per source uid.
    linked: HashMap<u64, T>,
    disposers: Vec<Disposer<T>>,
    result_hook: Option<ListenerId>,
    /// Async getter results a strong fusion has not settled yet.
    pending: HashMap<u64, Shared<BoxFuture<'static, T>>>,
    traced: bool,
    waiters: Waiters,
    disposed: bool,
}

pub(crate) struct Node<T> {
    strategy: Strategy,
    compute: Compute<T>,
    truthy: Option<fn(&T) -> bool>,
    sources: Vec<WeakCell<T>>,
    result: Cell<T>,
    state: Mutex<State<T>>,
}

impl<T: CellValue> Node<T> {
    pub(crate) fn wire(
        result: Cell<T>,
        sources: &[Cell<T>],
        strategy: Strategy,
        compute: Compute<T>,
        truthy: Option<fn(&T) -> bool>,
    ) -> Arc<Self> {
        let node = Arc::new(Node {
            strategy,
            compute,
            truthy,
            sources: sources.iter().map(Cell::downgrade).collect(),
            result,
            state: Mutex::new(State {
                skip: sources.iter().filter(|source| source.value().is_some()).count(),
                decayed: HashSet::new(),
                linked: HashMap::new(),
                disposers: Vec::with_capacity(sources.len()),
                result_hook: None,
                pending: HashMap::new(),
                traced: false,
                waiters: Waiters::default(),
                disposed: false,
            }),
        });

        let mut disposers = Vec::with_capacity(sources.len());
        for source in sources {
            let listener = {
                let node = Arc::clone(&node);
                source.up(move |value, caller| node.on_source(caller.uid(), value))
            };
            let decay_hook = {
                let node = Arc::downgrade(&node);
                source.on_decay(move |decayed| {
                    if let Some(node) = node.upgrade() {
                        node.on_source_decay(decayed.uid());
                    }
                })
            };
            disposers.push(Disposer {
                source: source.downgrade(),
                listener,
                decay_hook,
            });
        }
        let result_hook = {
            let weak = Arc::downgrade(&node);
            node.result.on_decay(move |_| {
                if let Some(node) = weak.upgrade() {
                    tracing::debug!(result = node.result.uid(), "fusion result decayed");
                    node.dispose();
                }
            })
        };
        {
            let mut state = node.state.lock();
            state.disposers = disposers;
            state.result_hook = Some(result_hook);
            // Every immediate delivery has happened by now.
            state.skip = 0;
        }

        tracing::debug!(
            result = node.result.uid(),
            sources = node.sources.len(),
            strategy = %strategy,
            "fusion wired"
        );
        node.initial();
        node
    }

    pub(crate) fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub(crate) fn result(&self) -> &Cell<T> {
        &self.result
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub(crate) fn is_traced(&self) -> bool {
        self.state.lock().traced
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub(crate) fn waiting_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    pub(crate) fn decayed_sources(&self) -> Vec<u64> {
        let mut decayed: Vec<u64> = self.state.lock().decayed.iter().copied().collect();
        decayed.sort_unstable();
        decayed
    }

    /// Unhook from every source and from the result. Idempotent.
    pub(crate) fn dispose(&self) {
        let (disposers, result_hook, waiters) = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.pending.clear();
            (
                std::mem::take(&mut state.disposers),
                state.result_hook.take(),
                state.waiters.take(),
            )
        };
        for disposer in disposers {
            if let Some(source) = disposer.source.upgrade() {
                source.down(disposer.listener);
                source.off_decay(disposer.decay_hook);
            }
        }
        if let Some(hook) = result_hook {
            self.result.off_decay(hook);
        }
        // Dropping the senders releases anyone still waiting.
        drop(waiters);
        tracing::debug!(result = self.result.uid(), "fusion disposed");
    }

    /// Park until the result holds a value.
    pub(crate) fn park(&self) -> Option<oneshot::Receiver<()>> {
        let mut state = self.state.lock();
        if state.disposed || self.result.value().is_some() {
            return None;
        }
        Some(state.waiters.park())
    }

    /// Drive every pending async getter, then try the first combination.
    pub(crate) async fn settle(&self) {
        let pending: Vec<(u64, Shared<BoxFuture<'static, T>>)> = self
            .state
            .lock()
            .pending
            .iter()
            .map(|(uid, future)| (*uid, future.clone()))
            .collect();
        if pending.is_empty() {
            return;
        }
        tracing::trace!(result = self.result.uid(), count = pending.len(), "settling getters");
        let resolved = join_all(
            pending
                .into_iter()
                .map(|(uid, future)| async move { (uid, future.await) }),
        )
        .await;
        {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            for (uid, value) in resolved {
                // Gone from `pending` means a direct write or another settle
                // got there first.
                if state.pending.remove(&uid).is_some() {
                    state.linked.insert(uid, value);
                }
            }
        }
        self.trace_once();
    }

    fn initial(&self) {
        let values = self.collect(None);
        {
            let mut state = self.state.lock();
            for (source, value) in self.sources.iter().zip(&values) {
                if let Some(value) = value {
                    state.linked.insert(source.uid(), value.clone());
                }
            }
        }
        match self.strategy {
            Strategy::Strong { .. } => self.strong_initial(),
            _ => self.recompute(values),
        }
    }

    fn on_source(&self, caller: u64, value: &T) {
        {
            let mut state = self.state.lock();
            if state.disposed || !state.decayed.is_empty() {
                return;
            }
            if state.skip > 0 {
                state.skip -= 1;
                return;
            }
            if self.strategy.is_safe() && state.linked.get(&caller) == Some(value) {
                tracing::trace!(result = self.result.uid(), source = caller, "unchanged source ignored");
                return;
            }
            state.linked.insert(caller, value.clone());
            // A direct write supersedes an unsettled getter.
            state.pending.remove(&caller);
        }
        match self.strategy {
            Strategy::Strong { .. } => self.strong_update(caller, value),
            _ => self.recompute(self.collect(Some((caller, value)))),
        }
    }

    fn on_source_decay(&self, uid: u64) {
        {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.decayed.insert(uid);
        }
        tracing::debug!(result = self.result.uid(), source = uid, "fusion source decayed");
        self.dispose();
        // Fusions fed by the result see this as their own source decay.
        self.result.decay();
    }

    /// Current source values, with the caller's delivered value taking
    /// precedence over whatever its slot holds.
    fn collect(&self, caller: Option<(u64, &T)>) -> Vec<Option<T>> {
        self.sources
            .iter()
            .map(|source| match caller {
                Some((uid, value)) if uid == source.uid() => Some(value.clone()),
                _ => source.upgrade().and_then(|cell| cell.value()),
            })
            .collect()
    }

    fn ready(&self, values: &[Option<T>]) -> bool {
        match self.strategy {
            Strategy::Alive => values.iter().all(|value| {
                value
                    .as_ref()
                    .is_some_and(|value| self.truthy.map_or(true, |truthy| truthy(value)))
            }),
            Strategy::Any | Strategy::Weak { .. } => true,
            Strategy::Some { .. } | Strategy::Strong { .. } => values.iter().all(Option::is_some),
        }
    }

    fn recompute(&self, values: Vec<Option<T>>) {
        if !self.ready(&values) {
            tracing::trace!(result = self.result.uid(), strategy = %self.strategy, "fusion withheld");
            return;
        }
        let next = (self.compute)(&Inputs::new(values));
        self.publish(next);
    }

    fn publish(&self, value: T) {
        self.result.set(value);
        let waiters = self.state.lock().waiters.take();
        waiters.free();
    }

    fn strong_initial(&self) {
        let mut fetched = Vec::new();
        let mut pending = HashMap::new();
        for source in &self.sources {
            let Some(cell) = source.upgrade() else {
                continue;
            };
            match cell.fetch() {
                Some(Fetch::Ready(value)) => fetched.push((source.uid(), value)),
                Some(Fetch::Pending(future)) => {
                    pending.insert(source.uid(), future.shared());
                }
                None => {}
            }
        }
        {
            let mut state = self.state.lock();
            state.linked.extend(fetched);
            state.pending = pending;
        }
        self.trace_once();
    }

    /// Publish the first complete combination, exactly once.
    fn trace_once(&self) {
        let values = {
            let mut state = self.state.lock();
            if state.traced || state.disposed || !state.pending.is_empty() {
                return;
            }
            let values: Vec<Option<T>> = self
                .sources
                .iter()
                .map(|source| state.linked.get(&source.uid()).cloned())
                .collect();
            if !values.iter().all(Option::is_some) {
                return;
            }
            state.traced = true;
            values
        };
        tracing::trace!(result = self.result.uid(), "strong fusion traced");
        let next = (self.compute)(&Inputs::new(values));
        self.publish(next);
    }

    fn strong_update(&self, caller: u64, value: &T) {
        if !self.is_traced() {
            self.trace_once();
            return;
        }
        let values: Vec<Option<T>> = self
            .sources
            .iter()
            .map(|source| {
                if source.uid() == caller {
                    return Some(value.clone());
                }
                let cell = source.upgrade()?;
                if cell.has_getter() && !cell.is_async() {
                    if let Some(Fetch::Ready(fresh)) = cell.fetch() {
                        self.state.lock().linked.insert(source.uid(), fresh.clone());
                        return Some(fresh);
                    }
                }
                let linked = self.state.lock().linked.get(&source.uid()).cloned();
                linked.or_else(|| cell.value())
            })
            .collect();
        self.recompute(values);
    }
}
