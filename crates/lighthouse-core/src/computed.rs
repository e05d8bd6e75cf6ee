//! # Computed Artifacts
//!
//! Lazily derived, memoized data computed from raw [`Artifacts`].
//!
//! ## Lifecycle
//!
//! 1. A [`ComputedArtifactRegistry`] is built once from a static table of
//!    `(name, compute)` pairs.
//! 2. Each run calls [`ComputedArtifactRegistry::for_run`] to get a fresh
//!    [`ComputedArtifacts`] handle with its own cache. Caches are never shared
//!    between runs.
//! 3. Audits call [`ComputedArtifacts::request`]. A compute function receives
//!    the raw artifacts and a handle of its own, so derivations may request
//!    other derivations.
//!
//! ## Per-name State
//!
//! ```text
//! NotStarted ──request──▶ InFlight ──settle──▶ Settled(Ok | Err)
//! ```
//!
//! At most one computation runs per name per run: concurrent requesters of an
//! in-flight name await the same computation, and a settled outcome (value or
//! error) is returned as-is to every later requester.
//!
//! ## Cycles
//!
//! Every handle carries the chain of names being resolved on its path. A
//! request for a name already on that chain fails with
//! [`LighthouseError::CircularDependency`] instead of waiting on itself.
//!
//! Chains started by different callers can still cross: `A` in flight on one
//! task waits for `B` while `B` in flight on another waits for `A`. The run
//! keeps a waits-for graph of in-flight names; a request that would close a
//! loop through that graph back onto its own chain fails the same way.

use crate::collaborators::BoxFuture;
use crate::types::Artifacts;
use crate::LighthouseError;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// A derivation over raw artifacts.
pub type ComputeFn = Arc<
    dyn Fn(Arc<Artifacts>, ComputedArtifacts) -> BoxFuture<'static, Result<Value, LighthouseError>>
        + Send
        + Sync,
>;

type Outcome = Result<Arc<Value>, LighthouseError>;
type Slot = Arc<OnceCell<Outcome>>;

/// Observable state of one computed artifact within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    NotStarted,
    InFlight,
    Settled,
}

// =============================================================================
// REGISTRY (static table)
// =============================================================================

/// Static table of named derivations.
#[derive(Clone, Default)]
pub struct ComputedArtifactRegistry {
    table: BTreeMap<String, ComputeFn>,
}

impl std::fmt::Debug for ComputedArtifactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedArtifactRegistry")
            .field("names", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ComputedArtifactRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named derivation. Names are unique.
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        compute: F,
    ) -> Result<(), LighthouseError>
    where
        F: Fn(Arc<Artifacts>, ComputedArtifacts) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, LighthouseError>> + Send + 'static,
    {
        let name = name.into();
        if self.table.contains_key(&name) {
            return Err(LighthouseError::DuplicateComputedArtifact(name));
        }
        let compute: ComputeFn = Arc::new(
            move |artifacts: Arc<Artifacts>,
                  computed: ComputedArtifacts|
                  -> BoxFuture<'static, Result<Value, LighthouseError>> {
                Box::pin(compute(artifacts, computed))
            },
        );
        self.table.insert(name, compute);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F, Fut>(mut self, name: impl Into<String>, compute: F) -> Result<Self, LighthouseError>
    where
        F: Fn(Arc<Artifacts>, ComputedArtifacts) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, LighthouseError>> + Send + 'static,
    {
        self.register(name, compute)?;
        Ok(self)
    }

    /// Registered names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Create the per-run cache for one artifact set.
    #[must_use]
    pub fn for_run(&self, artifacts: Arc<Artifacts>) -> ComputedArtifacts {
        ComputedArtifacts {
            run: Arc::new(RunCache {
                artifacts,
                table: self.table.clone(),
                state: Mutex::new(CacheState::default()),
            }),
            chain: Arc::from(Vec::new()),
        }
    }
}

// =============================================================================
// PER-RUN HANDLE
// =============================================================================

struct RunCache {
    artifacts: Arc<Artifacts>,
    table: BTreeMap<String, ComputeFn>,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    slots: BTreeMap<String, Slot>,
    /// In-flight name -> names its computation is awaiting, with a count per
    /// outstanding request.
    waits: BTreeMap<String, BTreeMap<String, usize>>,
}

impl CacheState {
    /// A path of waits-for edges from `from` to any name on `chain`.
    fn path_to_chain(&self, from: &str, chain: &[String]) -> Option<Vec<String>> {
        let mut stack = vec![vec![from.to_string()]];
        let mut seen = BTreeSet::new();
        while let Some(path) = stack.pop() {
            let Some(last) = path.last() else {
                continue;
            };
            if chain.contains(last) {
                return Some(path);
            }
            if !seen.insert(last.clone()) {
                continue;
            }
            for next in self.waits.get(last).into_iter().flat_map(BTreeMap::keys) {
                let mut longer = path.clone();
                longer.push(next.clone());
                stack.push(longer);
            }
        }
        None
    }
}

impl RunCache {
    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // Never held across an await.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slot(&self, name: &str) -> Slot {
        self.lock()
            .slots
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn existing_slot(&self, name: &str) -> Option<Slot> {
        self.lock().slots.get(name).cloned()
    }

    /// Record that the last name on `chain` is about to wait for `name`.
    ///
    /// Fails when `name` already waits, directly or through other in-flight
    /// names, on something in `chain`.
    fn wait_for(
        &self,
        chain: &[String],
        name: &str,
    ) -> Result<Option<WaitEdge<'_>>, LighthouseError> {
        let Some(waiter) = chain.last() else {
            return Ok(None);
        };
        let mut state = self.lock();
        if let Some(path) = state.path_to_chain(name, chain) {
            let mut cycle = chain.to_vec();
            cycle.extend(path);
            return Err(LighthouseError::CircularDependency { chain: cycle });
        }
        *state
            .waits
            .entry(waiter.clone())
            .or_default()
            .entry(name.to_string())
            .or_insert(0) += 1;
        Ok(Some(WaitEdge {
            cache: self,
            waiter: waiter.clone(),
            target: name.to_string(),
        }))
    }
}

/// A live waits-for edge; removed when the wait ends or is dropped.
struct WaitEdge<'a> {
    cache: &'a RunCache,
    waiter: String,
    target: String,
}

impl Drop for WaitEdge<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.lock();
        let Some(targets) = state.waits.get_mut(&self.waiter) else {
            return;
        };
        if let Some(count) = targets.get_mut(&self.target) {
            *count -= 1;
            if *count == 0 {
                targets.remove(&self.target);
            }
        }
        if targets.is_empty() {
            state.waits.remove(&self.waiter);
        }
    }
}

/// Request handle onto one run's computed artifacts. Cheap to clone.
#[derive(Clone)]
pub struct ComputedArtifacts {
    run: Arc<RunCache>,
    chain: Arc<[String]>,
}

impl std::fmt::Debug for ComputedArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedArtifacts")
            .field("chain", &self.chain)
            .finish()
    }
}

impl ComputedArtifacts {
    /// Resolve a computed artifact, computing it at most once per run.
    pub async fn request(&self, name: &str) -> Result<Arc<Value>, LighthouseError> {
        if self.chain.iter().any(|n| n == name) {
            let mut chain = self.chain.to_vec();
            chain.push(name.to_string());
            return Err(LighthouseError::CircularDependency { chain });
        }

        let compute = self
            .run
            .table
            .get(name)
            .cloned()
            .ok_or_else(|| LighthouseError::UnknownComputedArtifact(name.to_string()))?;

        let slot = self.run.slot(name);
        if let Some(settled) = slot.get() {
            return settled.clone();
        }
        let _edge = self.run.wait_for(&self.chain, name)?;
        slot.get_or_init(|| async {
            tracing::debug!(artifact = name, "computing");
            let child = self.descend(name);
            let outcome = compute(Arc::clone(&self.run.artifacts), child)
                .await
                .map(Arc::new);
            if let Err(e) = &outcome {
                tracing::debug!(artifact = name, error = %e, "computed artifact failed");
            }
            outcome
        })
        .await
        .clone()
    }

    /// Current state of `name` in this run.
    #[must_use]
    pub fn state(&self, name: &str) -> SlotState {
        match self.run.existing_slot(name) {
            None => SlotState::NotStarted,
            Some(slot) if slot.initialized() => SlotState::Settled,
            Some(_) => SlotState::InFlight,
        }
    }

    /// The raw artifacts this run derives from.
    #[must_use]
    pub fn artifacts(&self) -> &Arc<Artifacts> {
        &self.run.artifacts
    }

    fn descend(&self, name: &str) -> ComputedArtifacts {
        let mut chain = self.chain.to_vec();
        chain.push(name.to_string());
        ComputedArtifacts {
            run: Arc::clone(&self.run),
            chain: Arc::from(chain),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
