//! # Machine memory
//! A flat, 1MiB store of 262,144 little-endian 32-bit words.
//!
//! Memory can be accessed either as words ([`u32`]) or bytes ([`u8`]). Both views
//! alias the same backing buffer, so a byte written with [`Memory::write_byte`] is
//! visible in the word that contains it, and vice-versa.
//!
//! Addresses are never rejected: word accesses are masked to an 18 bit word index,
//! byte accesses to a 20 bit byte address, so anything out of range wraps around.

use std::io::{ErrorKind, Read};

use crate::error::ImageError;

/// Number of 32-bit words in memory.
pub const MEMORY_WORDS: usize = 0x40000;
/// Number of bytes in memory.
pub const MEMORY_BYTES: usize = MEMORY_WORDS * 4;
/// Mask applied to word-aligned addresses, including the program counter.
pub const WORD_ADDRESS_MASK: u32 = 0xffffc;
/// Mask applied to byte addresses.
pub const BYTE_ADDRESS_MASK: u32 = 0xfffff;

/// Images are read in chunks of this size.
const LOAD_CHUNK: usize = 0x1000;

/// The memory of a [`ForthMachine`](crate::machine::ForthMachine).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Memory {
    bytes: Box<[u8]>,
}
impl Default for Memory {
    /// Returns a zeroed [`Memory`].
    /// Same as [`Memory::new`].
    fn default() -> Self {
        Self::new()
    }
}
impl core::fmt::Debug for Memory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Memory")
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
impl Memory {
    /// Returns a zeroed `Memory`.
    /// # Example
    /// ```rust
    /// # use forthvm::memory::Memory;
    /// let memory = Memory::new();
    /// assert_eq!(memory.read_word(0x100), 0);
    /// ```
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; MEMORY_BYTES].into_boxed_slice(),
        }
    }

    /// Reads the word containing the given byte address. The low two bits of the
    /// address are ignored.
    /// # Example
    /// ```rust
    /// # use forthvm::memory::Memory;
    /// # let mut memory = Memory::new();
    /// memory.write_word(0x10, 0xdeadbeef);
    /// assert_eq!(memory.read_word(0x10), 0xdeadbeef);
    /// assert_eq!(memory.read_word(0x13), 0xdeadbeef);
    ///
    /// // Addresses wrap around the 1MiB address space.
    /// assert_eq!(memory.read_word(0x100010), 0xdeadbeef);
    /// ```
    pub fn read_word(&self, address: u32) -> u32 {
        let offset = Self::word_offset(address);
        u32::from_le_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }

    /// Writes the word containing the given byte address. The low two bits of the
    /// address are ignored.
    pub fn write_word(&mut self, address: u32, value: u32) {
        let offset = Self::word_offset(address);
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Reads a single byte.
    /// # Example
    /// ```rust
    /// # use forthvm::memory::Memory;
    /// # let mut memory = Memory::new();
    /// memory.write_word(0x20, 0x11223344);
    ///
    /// // Words are stored least significant byte first.
    /// assert_eq!(memory.read_byte(0x20), 0x44);
    /// assert_eq!(memory.read_byte(0x23), 0x11);
    /// ```
    pub fn read_byte(&self, address: u32) -> u8 {
        self.bytes[(address & BYTE_ADDRESS_MASK) as usize]
    }

    /// Writes a single byte.
    /// # Example
    /// ```rust
    /// # use forthvm::memory::Memory;
    /// # let mut memory = Memory::new();
    /// memory.write_word(0x20, 0x11223344);
    /// memory.write_byte(0x21, 0xaa);
    /// assert_eq!(memory.read_word(0x20), 0x1122aa44);
    /// ```
    pub fn write_byte(&mut self, address: u32, value: u8) {
        self.bytes[(address & BYTE_ADDRESS_MASK) as usize] = value;
    }

    /// Raw view over the whole memory.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies a raw image into memory, starting at byte address `base`.
    ///
    /// The image is read in fixed size chunks until the end of the input is reached.
    /// Returns the number of bytes loaded.
    ///
    /// Images that would run past the end of memory are rejected rather than
    /// wrapped. Memory may have been partially overwritten when an error is returned.
    pub fn load_image<R: Read>(&mut self, mut image: R, base: u32) -> Result<usize, ImageError> {
        let base = (base & BYTE_ADDRESS_MASK) as usize;
        let mut chunk = [0u8; LOAD_CHUNK];
        let mut loaded = 0;
        loop {
            let read = match image.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ImageError::Io(e)),
            };
            let start = base + loaded;
            if start + read > MEMORY_BYTES {
                return Err(ImageError::TooLarge {
                    size: loaded + read,
                    base: base as u32,
                });
            }
            self.bytes[start..start + read].copy_from_slice(&chunk[..read]);
            loaded += read;
        }
        log::info!("loaded {loaded} byte image at {base:#07x}");
        Ok(loaded)
    }

    fn word_offset(address: u32) -> usize {
        (((address >> 2) as usize) & (MEMORY_WORDS - 1)) << 2
    }
}
