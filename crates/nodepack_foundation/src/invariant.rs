//! Fatal assertion primitive.
//!
//! Contract violations (running an operation on a chunk it does not match,
//! extracting a node twice, indexing past capacity) are programmer errors, not
//! recoverable conditions. They are logged at `error` level and then panic.

use std::fmt;

/// Logs the message at `error` level and panics with it.
///
/// Prefer the [`invariant!`](crate::invariant) macro, which only formats the
/// message when the condition fails.
#[cold]
#[inline(never)]
#[track_caller]
pub fn fatal(args: fmt::Arguments<'_>) -> ! {
    let location = std::panic::Location::caller();
    log::error!("invariant violated at {location}: {args}");
    panic!("invariant violated: {args}");
}

/// Asserts a structural invariant, aborting the current operation if it fails.
///
/// ```should_panic
/// use nodepack_foundation::invariant;
///
/// let count = 5;
/// let capacity = 4;
/// invariant!(count <= capacity, "node count {count} exceeds capacity {capacity}");
/// ```
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::fatal(::core::format_args!($($arg)+));
        }
    };
}
