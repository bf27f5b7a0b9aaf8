//! Integration tests for pipelines

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use nodepack_engine::{Column, EngineConfig, Operation, Pipeline, Request};
use nodepack_foundation::{Component, ComponentType, Ownership};
use nodepack_storage::{ChunkAllocation, ChunkArray, ChunkForest, KindRef, Structure};

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Stock(u32);
impl Component for Stock {}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Demand(u32);
impl Component for Demand {}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Ledger(u32);
impl Component for Ledger {
    const OWNERSHIP: Ownership = Ownership::PerChunk;
}

#[derive(Default)]
struct Orders<'c> {
    stock: Column<'c, Stock>,
    demand: Column<'c, Demand>,
}

/// Ships what is in stock against demand.
#[derive(Default)]
struct Ship {
    shipped: u32,
}

impl Operation for Ship {
    type Binding<'c> = Orders<'c>;

    fn requirements<'c, R: Request<'c>>(&self, binding: &mut Orders<'c>, request: &mut R) -> bool {
        request.component(&mut binding.stock) && request.component(&mut binding.demand)
    }

    fn execute(&mut self, binding: &mut Orders<'_>, _node_count: usize) {
        for (stock, demand) in binding.stock.iter_mut().zip(binding.demand.iter_mut()) {
            let sent = stock.0.min(demand.0);
            stock.0 -= sent;
            demand.0 -= sent;
            self.shipped += sent;
        }
    }
}

#[derive(Default)]
struct Books<'c> {
    demand: Column<'c, Demand>,
    ledger: Column<'c, Ledger>,
}

/// Totals unmet demand into the chunk's ledger.
#[derive(Default)]
struct Audit {
    audited: usize,
}

impl Operation for Audit {
    type Binding<'c> = Books<'c>;

    fn requirements<'c, R: Request<'c>>(&self, binding: &mut Books<'c>, request: &mut R) -> bool {
        request.component(&mut binding.demand) && request.component(&mut binding.ledger)
    }

    fn execute(&mut self, binding: &mut Books<'_>, node_count: usize) {
        self.audited += node_count;
        binding.ledger[0] = Ledger(binding.demand.iter().map(|d| d.0).sum());
    }
}

fn warehouse() -> Arc<Structure> {
    Structure::shared([
        ComponentType::of::<Ledger>(),
        ComponentType::of::<Demand>(),
        ComponentType::of::<Stock>(),
    ])
}

fn pipeline() -> Pipeline {
    Pipeline::with_config(EngineConfig::development())
        .with_operation(Ship::default())
        .with_operation(Audit::default())
}

fn stocked(structure: &Arc<Structure>, stock: u32, demand: u32) -> ChunkAllocation {
    let mut chunk = ChunkAllocation::new(Arc::clone(structure), 4, 3);
    chunk.column_mut::<Stock>().unwrap().fill(Stock(stock));
    chunk.column_mut::<Demand>().unwrap().fill(Demand(demand));
    chunk
}

#[test]
fn later_stages_see_earlier_writes() {
    let mut pipeline = pipeline();
    let mut chunk = stocked(&warehouse(), 2, 5);

    assert!(pipeline.try_run(&mut chunk));
    assert_eq!(pipeline.operation::<Ship>(0).unwrap().shipped, 6);
    assert_eq!(chunk.column::<Stock>().unwrap(), &[Stock(0); 3]);
    assert_eq!(chunk.column::<Ledger>().unwrap(), &[Ledger(9)]);
}

#[test]
fn stages_route_once_per_structure() {
    let s = warehouse();
    let mut pipeline = pipeline();
    for _ in 0..4 {
        assert!(pipeline.try_run(&mut stocked(&s, 1, 1)));
    }

    for stage in pipeline.stages() {
        let stats = stage.stats();
        assert_eq!(stats.misses, 1, "{}", stage.name());
        assert_eq!(stats.hits, 3, "{}", stage.name());
    }
    assert_eq!(pipeline.operation::<Audit>(1).unwrap().audited, 12);
}

#[test]
fn partial_matches_run_nothing() {
    let shop = Structure::shared([ComponentType::of::<Stock>(), ComponentType::of::<Demand>()]);
    let mut pipeline = pipeline();
    let mut chunk = stocked(&shop, 2, 5);

    assert!(!pipeline.try_run(&mut chunk));
    assert!(!pipeline.matches(&shop));
    assert_eq!(chunk.column::<Stock>().unwrap(), &[Stock(2); 3]);
    assert_eq!(pipeline.operation::<Ship>(0).unwrap().shipped, 0);
    assert!(pipeline.stages().all(|stage| stage.stats().misses == 0));
}

#[test]
fn every_kind_runs_through_a_pipeline() {
    let s = warehouse();
    let mut pipeline = pipeline();

    let mut array = ChunkArray::new(Arc::clone(&s), 4, 3, 3, 2);
    let mut forest = ChunkForest::new();
    let root = forest.insert_chunk(stocked(&s, 0, 1));
    let batch = forest.insert_array(ChunkArray::new(Arc::clone(&s), 4, 2, 2, 4));
    forest.insert_first_child(root, batch);

    assert!(pipeline.try_run(&mut stocked(&s, 0, 1)));
    assert!(pipeline.try_run(&mut array));
    assert!(pipeline.try_run(&mut forest.kind_ref(root)));
    assert!(pipeline.try_run(&mut forest.kind_ref(batch)));

    assert_eq!(pipeline.operation::<Audit>(1).unwrap().audited, 3 + 6 + 3 + 8);
}

#[test]
fn null_targets_are_skipped() {
    let mut pipeline = pipeline();
    assert!(!pipeline.try_run(&mut ChunkAllocation::null()));
    assert!(!pipeline.try_run(&mut ChunkArray::null()));
    assert!(!pipeline.try_run(&mut KindRef::Chunk(&mut ChunkAllocation::null())));
}

#[test]
fn clear_cache_forgets_routes() {
    let s = warehouse();
    let mut pipeline = pipeline();
    assert!(pipeline.try_run(&mut stocked(&s, 1, 1)));

    pipeline.clear_cache();
    assert!(pipeline.stages().all(|stage| stage.stats().routes == 0));
    assert!(pipeline.try_run(&mut stocked(&s, 1, 1)));
    assert!(pipeline.stages().all(|stage| stage.stats().misses == 2));
}
