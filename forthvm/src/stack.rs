//! # Machine stacks
//! The machine holds its values on two descending stacks called the *data* and
//! *return* stacks. Unlike dedicated stack hardware, both live inside the main
//! [`Memory`]: a stack is only a pointer into it, along with the address it was
//! reset to.
//!
//! Pushing first moves the pointer down by one word then stores, popping loads then
//! moves the pointer up. Nothing checks for overflow or underflow: the pointer keeps
//! moving and memory accesses wrap around the address space, exactly like the
//! hardware being emulated.

use core::iter::FusedIterator;

use crate::memory::Memory;

/// Descending stack of 32-bit words living in a [`Memory`].
///
/// Indexing is done in words from the top of the stack, which is at index 0.
///
/// | **Index** | ... | 2 | 1 | **0** |
/// | --------- | --- | - | - | ----- |
/// | **Address** | ... | pointer + 8 | pointer + 4 | pointer |
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct DescendingStack {
    pub pointer: u32,
    pub base: u32,
}
impl DescendingStack {
    /// Returns an empty stack whose first pushed value lands just below `base`.
    /// # Example
    /// ```rust
    /// # use forthvm::stack::DescendingStack;
    /// let stack = DescendingStack::new(0x1000);
    /// assert_eq!(stack.pointer, 0x1000);
    /// assert_eq!(stack.depth(), 0);
    /// ```
    pub const fn new(base: u32) -> Self {
        Self {
            pointer: base,
            base,
        }
    }

    /// Empties the stack by moving its pointer back to its base.
    pub fn reset(&mut self) {
        self.pointer = self.base
    }

    /// Number of words currently on the stack. Negative if more words were popped
    /// than pushed.
    /// # Example
    /// ```rust
    /// # use forthvm::{memory::Memory, stack::DescendingStack};
    /// # let mut memory = Memory::new();
    /// let mut stack = DescendingStack::new(0x1000);
    /// stack.push(&mut memory, 1);
    /// stack.push(&mut memory, 2);
    /// assert_eq!(stack.depth(), 2);
    ///
    /// stack.pop(&memory);
    /// stack.pop(&memory);
    /// stack.pop(&memory);
    /// assert_eq!(stack.depth(), -1);
    /// ```
    pub fn depth(&self) -> i32 {
        (self.base.wrapping_sub(self.pointer) as i32) / 4
    }

    /// Pushes a word on top of the stack.
    /// # Example
    /// ```rust
    /// # use forthvm::{memory::Memory, stack::DescendingStack};
    /// # let mut memory = Memory::new();
    /// let mut stack = DescendingStack::new(0x1000);
    /// stack.push(&mut memory, 0xabcd);
    /// assert_eq!(stack.pointer, 0xffc);
    /// assert_eq!(memory.read_word(0xffc), 0xabcd);
    /// ```
    pub fn push(&mut self, memory: &mut Memory, value: u32) {
        self.pointer = self.pointer.wrapping_sub(4);
        memory.write_word(self.pointer, value);
    }

    /// Pops a word from the top of the stack.
    /// # Example
    /// ```rust
    /// # use forthvm::{memory::Memory, stack::DescendingStack};
    /// # let mut memory = Memory::new();
    /// let mut stack = DescendingStack::new(0x1000);
    /// stack.push(&mut memory, 2);
    /// stack.push(&mut memory, 3);
    ///
    /// assert_eq!(stack.pop(&memory), 3);
    /// assert_eq!(stack.pop(&memory), 2);
    /// ```
    pub fn pop(&mut self, memory: &Memory) -> u32 {
        let value = memory.read_word(self.pointer);
        self.pointer = self.pointer.wrapping_add(4);
        value
    }

    /// Returns the word at the given index, counting from the top of the stack.
    /// # Example
    /// ```rust
    /// # use forthvm::{memory::Memory, stack::DescendingStack};
    /// # let mut memory = Memory::new();
    /// let mut stack = DescendingStack::new(0x1000);
    /// stack.push(&mut memory, 1);
    /// stack.push(&mut memory, 4);
    ///
    /// assert_eq!(stack.get(&memory, 0), 4);
    /// assert_eq!(stack.get(&memory, 1), 1);
    /// ```
    pub fn get(&self, memory: &Memory, index: u32) -> u32 {
        memory.read_word(self.pointer.wrapping_add(index.wrapping_mul(4)))
    }

    /// Replaces the word at the given index, counting from the top of the stack.
    pub fn set(&self, memory: &mut Memory, index: u32, value: u32) {
        memory.write_word(self.pointer.wrapping_add(index.wrapping_mul(4)), value)
    }

    /// Returns an iterator over the words of this stack, from the top down to the
    /// base. Empty if the stack underflowed.
    /// # Example
    /// ```rust
    /// # use forthvm::{memory::Memory, stack::DescendingStack};
    /// # let mut memory = Memory::new();
    /// let mut stack = DescendingStack::new(0x1000);
    /// stack.push(&mut memory, 1);
    /// stack.push(&mut memory, 2);
    /// stack.push(&mut memory, 3);
    ///
    /// assert!(stack.iter(&memory).eq([3u32, 2, 1]));
    /// ```
    pub fn iter<'a>(&self, memory: &'a Memory) -> StackIter<'a> {
        StackIter {
            memory,
            pointer: self.pointer,
            remaining: self.depth().max(0) as usize,
        }
    }
}

/// Iterator over the words of a [`DescendingStack`], see [`DescendingStack::iter`].
#[derive(Clone, Debug)]
pub struct StackIter<'a> {
    memory: &'a Memory,
    pointer: u32,
    remaining: usize,
}
impl Iterator for StackIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.memory.read_word(self.pointer);
        self.pointer = self.pointer.wrapping_add(4);
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
impl ExactSizeIterator for StackIter<'_> {}
impl FusedIterator for StackIter<'_> {}
