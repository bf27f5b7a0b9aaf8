//! The operation protocol.

use crate::request::Request;

/// A unit of work over the nodes of a chunk.
///
/// `requirements` declares what the operation needs by asking the request
/// for columns and neighbours, storing them in its binding, and returns
/// false as soon as something mandatory is missing. A binding after a
/// false result may be partially filled and must not be used.
///
/// For cached routing, `requirements` must make the same capability calls
/// in the same order every time it sees a given structure.
///
/// ```
/// use nodepack_engine::{Column, Operation, Request};
/// # use nodepack_foundation::Component;
/// # #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
/// # #[repr(C)]
/// # struct Health(f32);
/// # impl Component for Health {}
///
/// struct Regenerate(f32);
///
/// #[derive(Default)]
/// struct RegenerateBinding<'c> {
///     health: Column<'c, Health>,
/// }
///
/// impl Operation for Regenerate {
///     type Binding<'c> = RegenerateBinding<'c>;
///
///     fn requirements<'c, R: Request<'c>>(
///         &self,
///         binding: &mut RegenerateBinding<'c>,
///         request: &mut R,
///     ) -> bool {
///         request.component(&mut binding.health)
///     }
///
///     fn execute(&mut self, binding: &mut RegenerateBinding<'_>, _node_count: usize) {
///         for health in binding.health.iter_mut() {
///             health.0 += self.0;
///         }
///     }
/// }
/// ```
pub trait Operation {
    /// Columns and neighbour views bound for one run.
    type Binding<'c>: Default;

    /// Declares the operation's needs against `request`.
    fn requirements<'c, R: Request<'c>>(
        &self,
        binding: &mut Self::Binding<'c>,
        request: &mut R,
    ) -> bool;

    /// Processes `node_count` nodes through a binding `requirements` filled.
    fn execute(&mut self, binding: &mut Self::Binding<'_>, node_count: usize);
}
