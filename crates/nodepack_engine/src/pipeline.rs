//! Pipelines: ordered operations run together on matching chunks.
//!
//! A pipeline first decides, once per structure, whether every stage's
//! components exist. Chunks of a structure that fails this check skip the
//! whole batch without consulting any stage's router.

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use nodepack_foundation::{StructureId, invariant};
use nodepack_storage::{KindRef, Structure};

use crate::config::EngineConfig;
use crate::operation::Operation;
use crate::request::MatchRequest;
use crate::router::{CacheRouter, RouterStats};
use crate::runner::{RunTarget, dispatch};

/// One operation of a pipeline, with its own routing cache.
pub trait Stage {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Returns true if `structure` has every component the operation requires.
    fn matches(&self, structure: &Structure) -> bool;

    /// Runs the operation on `target`. Returns false on a mismatch.
    fn run(&mut self, target: KindRef<'_>) -> bool;

    /// Counters of the stage's router.
    fn stats(&self) -> RouterStats;

    /// Drops the stage's recorded routes.
    fn clear_cache(&self);

    /// The wrapped operation.
    fn as_any(&self) -> &dyn Any;

    /// The wrapped operation, mutably.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An operation paired with its routing cache.
pub struct CachedStage<Op> {
    op: Op,
    router: CacheRouter<Op>,
}

impl<Op: Operation> CachedStage<Op> {
    /// Wraps `op` with an empty router.
    #[must_use]
    pub fn new(op: Op, config: EngineConfig) -> Self {
        Self {
            op,
            router: CacheRouter::with_config(config),
        }
    }
}

impl<Op: Operation + 'static> Stage for CachedStage<Op> {
    fn name(&self) -> &'static str {
        type_name::<Op>()
    }

    fn matches(&self, structure: &Structure) -> bool {
        let mut binding: Op::Binding<'_> = Default::default();
        let mut request = MatchRequest::new(structure);
        self.op.requirements(&mut binding, &mut request) && request.is_complete()
    }

    fn run(&mut self, target: KindRef<'_>) -> bool {
        dispatch(target, &mut self.op, &self.router)
    }

    fn stats(&self) -> RouterStats {
        self.router.stats()
    }

    fn clear_cache(&self) {
        self.router.clear();
    }

    fn as_any(&self) -> &dyn Any {
        &self.op
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.op
    }
}

/// Ordered stages run on every chunk whose structure they all match.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    matches: RefCell<HashMap<StructureId, bool>>,
    config: EngineConfig,
}

impl Pipeline {
    /// Creates an empty pipeline with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an empty pipeline whose stages use `config`.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            stages: Vec::new(),
            matches: RefCell::new(HashMap::new()),
            config,
        }
    }

    /// Builder method to append an operation.
    #[must_use]
    pub fn with_operation<Op: Operation + 'static>(mut self, op: Op) -> Self {
        self.push(op);
        self
    }

    /// Appends an operation as the last stage.
    pub fn push<Op: Operation + 'static>(&mut self, op: Op) {
        self.stages.push(Box::new(CachedStage::new(op, self.config)));
        self.matches.get_mut().clear();
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Configuration handed to every stage.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// The stages, in run order.
    pub fn stages(&self) -> impl Iterator<Item = &dyn Stage> + '_ {
        self.stages.iter().map(|stage| &**stage)
    }

    /// The operation of stage `index`, if it is an `Op`.
    #[must_use]
    pub fn operation<Op: Operation + 'static>(&self, index: usize) -> Option<&Op> {
        self.stages.get(index)?.as_any().downcast_ref()
    }

    /// The operation of stage `index` mutably, if it is an `Op`.
    pub fn operation_mut<Op: Operation + 'static>(&mut self, index: usize) -> Option<&mut Op> {
        self.stages.get_mut(index)?.as_any_mut().downcast_mut()
    }

    /// Returns true if every stage matches `structure`. Cached per structure.
    #[must_use]
    pub fn matches(&self, structure: &Structure) -> bool {
        let id = structure.id();
        let cached = self.matches.borrow().get(&id).copied();
        if let Some(matched) = cached {
            return matched;
        }
        let matched = self.stages.iter().all(|stage| stage.matches(structure));
        log::debug!("pipeline of {} stages matches {id}: {matched}", self.stages.len());
        self.matches.borrow_mut().insert(id, matched);
        matched
    }

    /// Runs every stage on `target` in order.
    ///
    /// Returns false, running nothing, for null targets and structures some
    /// stage does not match.
    pub fn try_run<T: RunTarget + ?Sized>(&mut self, target: &mut T) -> bool {
        let mut target = target.kind_ref();
        let Some(structure) = target.structure() else {
            return false;
        };
        if !self.matches(structure) {
            if self.config.trace_routing {
                log::trace!("pipeline skipping {}", structure.id());
            }
            return false;
        }
        for stage in &mut self.stages {
            if !stage.run(target.reborrow()) && self.config.trace_routing {
                log::trace!("stage {} declined its target", stage.name());
            }
        }
        true
    }

    /// Runs every stage on `target` in order.
    ///
    /// # Panics
    ///
    /// Panics if the target is null or some stage does not match it.
    pub fn run<T: RunTarget + ?Sized>(&mut self, target: &mut T) {
        let matched = self.try_run(target);
        invariant!(matched, "pipeline does not match its target");
    }

    /// Forgets every cached match and route.
    pub fn clear_cache(&mut self) {
        self.matches.get_mut().clear();
        for stage in &self.stages {
            stage.clear_cache();
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("cached_matches", &self.matches.borrow().len())
            .field("config", &self.config)
            .finish()
    }
}
