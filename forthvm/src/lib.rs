//! # ForthVM: a frame-paced, 32-bit Forth stack machine
//! An emulator for a small 32-bit processor whose instruction set is built around
//! Forth: two stacks, a handful of relative jumps and about thirty primitive words.
//!
//! The machine is meant to be embedded in a host loop. The host resets it once,
//! then repeatedly asks it to [`execute`](machine::ForthMachine::execute) a frame's
//! worth of instructions, drawing and handling input in between through its
//! [`HardwareBridge`](bus::HardwareBridge).

pub mod bus;
pub mod config;
pub mod error;
pub mod instruction;
pub mod machine;
pub mod memory;
pub mod stack;
