//! Running operations on every chunk shape.
//!
//! [`dispatch`] is the one place that names all four chunk kinds. Single
//! chunks and tree nodes holding one chunk take the single path; arrays and
//! tree nodes holding arrays take the array path, which routes once against
//! sub-chunk 0 and then steps the binding across the remaining sub-chunks.

use std::any::type_name;

use nodepack_foundation::invariant;
use nodepack_storage::{ChunkAccess, ChunkAllocation, ChunkArray, KindRef, TreeRef};

use crate::operation::Operation;
use crate::request::OffsetRequest;
use crate::router::{DirectRouter, Router};

/// Routes `op` against one chunk and executes it over its live nodes.
fn run_single<'c, Op, R>(access: &ChunkAccess<'c>, op: &mut Op, router: &R) -> bool
where
    Op: Operation,
    R: Router<Op> + ?Sized,
{
    if access.is_null() {
        return false;
    }
    let mut binding: Op::Binding<'c> = Default::default();
    if !router.route(op, &mut binding, access) {
        return false;
    }
    op.execute(&mut binding, access.node_count(0));
    true
}

/// Routes `op` once for a whole array, then executes it per active sub-chunk.
fn run_array<'c, Op, R>(access: &ChunkAccess<'c>, op: &mut Op, router: &R) -> bool
where
    Op: Operation,
    R: Router<Op> + ?Sized,
{
    if access.is_null() {
        return false;
    }
    let mut binding: Op::Binding<'c> = Default::default();
    if !router.route(op, &mut binding, access) {
        return false;
    }
    for index in 0..access.sub_chunk_count() {
        if index > 0 {
            let mut offset = OffsetRequest::new(access, index);
            if !op.requirements(&mut binding, &mut offset) {
                log::debug!(
                    "{} stopped stepping at sub-chunk {index}",
                    type_name::<Op>()
                );
                break;
            }
        }
        op.execute(&mut binding, access.node_count(index));
    }
    true
}

/// Runs `op` on any chunk shape through `router`.
///
/// Returns false, without calling `requirements`, for null targets, and
/// false when the target does not meet the operation's requirements.
pub fn dispatch<Op, R>(target: KindRef<'_>, op: &mut Op, router: &R) -> bool
where
    Op: Operation,
    R: Router<Op> + ?Sized,
{
    match target {
        KindRef::Chunk(chunk) => run_single(&chunk.access(), op, router),
        KindRef::ChunkArray(array) => run_array(&array.access(), op, router),
        KindRef::ChunkTree(mut tree) => run_single(&tree.access(), op, router),
        KindRef::ChunkArrayTree(mut tree) => run_array(&tree.access(), op, router),
    }
}

/// Uniform entry points for running operations, whatever the chunk shape.
pub trait RunTarget {
    /// Borrows the target as a kind-tagged reference.
    fn kind_ref(&mut self) -> KindRef<'_>;

    /// Runs `op` with uncached routing. Returns false on a mismatch.
    fn try_run<Op: Operation>(&mut self, op: &mut Op) -> bool {
        dispatch(self.kind_ref(), op, &DirectRouter)
    }

    /// Runs `op` through `router`. Returns false on a mismatch.
    fn try_run_with_router<Op, R>(&mut self, op: &mut Op, router: &R) -> bool
    where
        Op: Operation,
        R: Router<Op> + ?Sized,
    {
        dispatch(self.kind_ref(), op, router)
    }

    /// Runs `op` with uncached routing.
    ///
    /// # Panics
    ///
    /// Panics if the target is null or does not meet the requirements.
    fn run<Op: Operation>(&mut self, op: &mut Op) {
        self.run_with_router(op, &DirectRouter);
    }

    /// Runs `op` through `router`.
    ///
    /// # Panics
    ///
    /// Panics if the target is null or does not meet the requirements.
    fn run_with_router<Op, R>(&mut self, op: &mut Op, router: &R)
    where
        Op: Operation,
        R: Router<Op> + ?Sized,
    {
        let kind = self.kind_ref().kind();
        let matched = self.try_run_with_router(op, router);
        invariant!(
            matched,
            "{} does not match this {kind}",
            type_name::<Op>()
        );
    }
}

impl RunTarget for ChunkAllocation {
    fn kind_ref(&mut self) -> KindRef<'_> {
        KindRef::Chunk(self)
    }
}

impl RunTarget for ChunkArray {
    fn kind_ref(&mut self) -> KindRef<'_> {
        KindRef::ChunkArray(self)
    }
}

impl RunTarget for TreeRef<'_> {
    fn kind_ref(&mut self) -> KindRef<'_> {
        KindRef::from(self.reborrow())
    }
}

impl RunTarget for KindRef<'_> {
    fn kind_ref(&mut self) -> KindRef<'_> {
        self.reborrow()
    }
}
