//! Read/write pair of same-shape fields.
//!
//! `DoubleBuffer` owns both slots and a single index naming the current
//! `read` slot; the other is `write`. A pass reads from `read`, renders into
//! `write`, then calls [`DoubleBuffer::swap`]. Because both slots live in one
//! owner, a pass can never alias a slot as both source and target.

/// Two same-shape slots plus the index of the current read slot.
///
/// The invariant `read_index() + write_index() == 1` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    read: usize,
}

impl<T> DoubleBuffer<T> {
    /// Wraps two slots; the first starts as `read`.
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            read: 0,
        }
    }

    /// Builds both slots with `make`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `make`.
    pub fn try_from_fn<E>(mut make: impl FnMut() -> Result<T, E>) -> Result<Self, E> {
        let first = make()?;
        let second = make()?;
        Ok(Self::new(first, second))
    }

    /// Storage index of the current read slot.
    pub fn read_index(&self) -> usize {
        self.read
    }

    /// Storage index of the current write slot.
    pub fn write_index(&self) -> usize {
        1 - self.read
    }

    /// The current field state.
    pub fn read(&self) -> &T {
        &self.slots[self.read]
    }

    /// Mutable access to the current state, for seeding or in-place scaling
    /// outside the pass pipeline.
    pub fn read_mut(&mut self) -> &mut T {
        &mut self.slots[self.read]
    }

    /// The render target for the next pass.
    pub fn write(&self) -> &T {
        &self.slots[1 - self.read]
    }

    /// Borrows `read` immutably and `write` mutably at once.
    pub fn split(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.slots;
        if self.read == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Exchanges the read and write labels.
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    /// Both slots, in storage order.
    pub fn slots(&self) -> &[T; 2] {
        &self.slots
    }
}
