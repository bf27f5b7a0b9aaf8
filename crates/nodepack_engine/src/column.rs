//! Typed column bindings handed to operations.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use nodepack_foundation::{Component, Ownership};

/// Mutable, typed slice of one component column of the chunk being run on.
///
/// A column starts unbound (an empty slice). Routing binds it to the current
/// sub-chunk; array runs move it to each following sub-chunk in turn. It
/// derefs to `[T]`, so `len`, `get`, `first`, and iteration come from the
/// slice.
pub struct Column<'c, T> {
    data: Option<NonNull<T>>,
    len: usize,
    ownership: Ownership,
    _borrow: PhantomData<&'c mut [T]>,
}

impl<T> Default for Column<'_, T> {
    fn default() -> Self {
        Self {
            data: None,
            len: 0,
            ownership: Ownership::PerNode,
            _borrow: PhantomData,
        }
    }
}

impl<'c, T: Component> Column<'c, T> {
    /// Returns true once routing has bound the column.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    /// Ownership of the bound component. Per-node for unbound columns.
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// The records of the current sub-chunk; empty when unbound.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self.data {
            // SAFETY: bound to `len` initialized records of a column the
            // run holds exclusively for `'c`.
            Some(data) => unsafe { slice::from_raw_parts(data.as_ptr(), self.len) },
            None => &[],
        }
    }

    /// The records of the current sub-chunk, mutably; empty when unbound.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.data {
            // SAFETY: as above, and no other binding aliases this column.
            Some(data) => unsafe { slice::from_raw_parts_mut(data.as_ptr(), self.len) },
            None => &mut [],
        }
    }

    /// Binds the column to `len` records starting at `block`.
    ///
    /// Callers guarantee the block holds at least `len` records laid out for
    /// `T` and stays exclusively borrowed for `'c`.
    pub(crate) fn bind(&mut self, block: NonNull<u8>, len: usize, ownership: Ownership) {
        self.data = Some(block.cast::<T>());
        self.len = len;
        self.ownership = ownership;
    }

    /// Moves a bound column `records` forward and shows `len` records there.
    ///
    /// Callers guarantee the new range lies inside the same allocation.
    pub(crate) fn advance(&mut self, records: usize, len: usize) {
        if let Some(data) = self.data {
            // SAFETY: the caller keeps the result inside the allocation.
            self.data = Some(unsafe { data.add(records) });
            self.len = len;
        }
    }
}

impl<T: Component> Deref for Column<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Component> DerefMut for Column<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> fmt::Debug for Column<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("type", &std::any::type_name::<T>())
            .field("bound", &self.data.is_some())
            .field("len", &self.len)
            .field("ownership", &self.ownership)
            .finish()
    }
}
