//! Fusions
//!
//! A fusion derives one result cell from an ordered list of source cells.
//! Every source update may trigger the compute function; the strategy
//! decides whether it runs and whether its output is written.
//!
//! # Strategies
//!
//! | name     | recomputes when                                  |
//! |----------|--------------------------------------------------|
//! | `alive`  | every source value is truthy                     |
//! | `any`    | always                                           |
//! | `weak`   | always, empty sources passed through as `None`   |
//! | `some`   | no source is empty                               |
//! | `strong` | getters resolve; first combination traced once   |
//!
//! The `_safe` variants of the legacy trio skip updates whose value equals
//! the one last seen from that source.
//!
//! # Decay
//!
//! Decaying the result disposes the fusion. Decaying a source disposes the
//! fusion and decays the result, so a chain of fusions comes down hop by
//! hop from the decayed source.

mod inputs;
mod node;
mod strategy;
mod waiters;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{select, Either};
use futures_util::FutureExt;

use crate::cell::{Cell, CellValue, Truthy};
use crate::error::Result;

pub use inputs::Inputs;
pub use node::Compute;
pub use strategy::Strategy;

use node::Node;

/// Start a fusion into a fresh result cell.
///
/// ```rust,ignore
/// let total = fusion([&a, &b]).any(|v| v.present().sum());
/// ```
pub fn fusion<'a, T, I>(sources: I) -> FusionBuilder<T>
where
    T: CellValue,
    I: IntoIterator<Item = &'a Cell<T>>,
{
    FusionBuilder {
        result: Cell::new_wired(),
        sources: sources.into_iter().cloned().collect(),
        truthy: None,
    }
}

impl<T: CellValue> Cell<T> {
    /// Make this cell the result of a fusion over `sources`.
    ///
    /// Fails with [`Error::AlreadyWired`](crate::Error::AlreadyWired) if the
    /// cell is already a fusion result.
    pub fn from_sources<'a, I>(&self, sources: I) -> Result<FusionBuilder<T>>
    where
        I: IntoIterator<Item = &'a Cell<T>>,
    {
        self.mark_wired()?;
        Ok(FusionBuilder {
            result: self.clone(),
            sources: sources.into_iter().cloned().collect(),
            truthy: None,
        })
    }
}

/// A fusion waiting for its strategy and compute function.
#[must_use = "a fusion builder does nothing until a strategy is chosen"]
pub struct FusionBuilder<T> {
    result: Cell<T>,
    sources: Vec<Cell<T>>,
    truthy: Option<fn(&T) -> bool>,
}

impl<T: CellValue> FusionBuilder<T> {
    /// Decide what counts as alive for a strategy picked at runtime.
    ///
    /// Without one, `alive` only asks that every source holds a value.
    pub fn alive_when(mut self, truthy: fn(&T) -> bool) -> Self {
        self.truthy = Some(truthy);
        self
    }

    pub fn alive<F>(self, compute: F) -> Fusion<T>
    where
        T: Truthy,
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        self.alive_when(<T as Truthy>::is_truthy)
            .build(Strategy::Alive, Arc::new(compute))
    }

    pub fn any<F>(self, compute: F) -> Fusion<T>
    where
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        self.build(Strategy::Any, Arc::new(compute))
    }

    pub fn weak<F>(self, compute: F) -> Fusion<T>
    where
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        self.build(Strategy::Weak { safe: false }, Arc::new(compute))
    }

    pub fn weak_safe<F>(self, compute: F) -> Fusion<T>
    where
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        self.build(Strategy::Weak { safe: true }, Arc::new(compute))
    }

    pub fn some<F>(self, compute: F) -> Fusion<T>
    where
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        self.build(Strategy::Some { safe: false }, Arc::new(compute))
    }

    pub fn some_safe<F>(self, compute: F) -> Fusion<T>
    where
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        self.build(Strategy::Some { safe: true }, Arc::new(compute))
    }

    pub fn strong<F>(self, compute: F) -> Fusion<T>
    where
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        self.build(Strategy::Strong { safe: false }, Arc::new(compute))
    }

    pub fn strong_safe<F>(self, compute: F) -> Fusion<T>
    where
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        self.build(Strategy::Strong { safe: true }, Arc::new(compute))
    }

    /// Pick the strategy at runtime. See [`alive_when`](Self::alive_when)
    /// for how `alive` judges its sources here.
    pub fn with_strategy<F>(self, strategy: Strategy, compute: F) -> Fusion<T>
    where
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        self.build(strategy, Arc::new(compute))
    }

    /// Pick the strategy by name, e.g. `"some_safe"`.
    pub fn using<F>(self, name: &str, compute: F) -> Result<Fusion<T>>
    where
        F: Fn(&Inputs<T>) -> T + Send + Sync + 'static,
    {
        let strategy: Strategy = name.parse()?;
        Ok(self.with_strategy(strategy, compute))
    }

    fn build(self, strategy: Strategy, compute: Compute<T>) -> Fusion<T> {
        Fusion {
            node: Node::wire(self.result, &self.sources, strategy, compute, self.truthy),
        }
    }
}

/// Handle to a wired fusion.
///
/// Dropping the handle does not unwire anything; the sources keep the
/// fusion running until it is disposed or one of them decays.
pub struct Fusion<T> {
    node: Arc<Node<T>>,
}

impl<T: CellValue> Fusion<T> {
    /// The result cell.
    pub fn cell(&self) -> &Cell<T> {
        self.node.result()
    }

    pub fn value(&self) -> Option<T> {
        self.node.result().value()
    }

    pub fn strategy(&self) -> Strategy {
        self.node.strategy()
    }

    /// Stop listening to the sources. The result keeps its last value.
    pub fn dispose(&self) {
        self.node.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.node.is_disposed()
    }

    /// Uids of the sources whose decay disposed this fusion.
    pub fn decayed_sources(&self) -> Vec<u64> {
        self.node.decayed_sources()
    }

    /// Whether a strong fusion has published its first combination.
    pub fn is_traced(&self) -> bool {
        self.node.is_traced()
    }

    /// Async getters a strong fusion is still holding.
    pub fn pending_count(&self) -> usize {
        self.node.pending_count()
    }

    pub fn waiting_count(&self) -> usize {
        self.node.waiting_count()
    }

    /// Await every pending async getter and publish the first combination
    /// once all of them have resolved.
    pub async fn settle(&self) {
        self.node.settle().await;
    }

    /// Resolve once the result holds a value.
    ///
    /// Returns immediately if it already does. While waiting, a strong
    /// fusion's pending getters are driven as by [`settle`](Self::settle).
    /// A fusion disposed before producing a value also releases its waiters.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let parked = self.node.park();
        let node = Arc::clone(&self.node);
        async move {
            let Some(receiver) = parked else {
                return;
            };
            match select(node.settle().boxed(), receiver).await {
                // Settled without a value; other sources still owe one.
                Either::Left(((), receiver)) => {
                    let _ = receiver.await;
                }
                Either::Right(_) => {}
            }
        }
    }
}

impl<T> Clone for Fusion<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T: CellValue + fmt::Debug> fmt::Debug for Fusion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fusion")
            .field("strategy", &self.strategy())
            .field("result", self.cell())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
