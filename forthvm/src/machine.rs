//! # Forth stack machine
//! Represents the full processor: 1MiB of [`Memory`], a program counter, the data
//! and return [`DescendingStack`]s and a cycle counter, plus whatever
//! [`HardwareBridge`] the host plugs in.
//!
//! The host drives the machine in frames. After a [`ForthMachine::reset`], each call
//! to [`ForthMachine::execute`] runs instructions until either a frame's worth of
//! cycles has elapsed or a breakpoint is reached, then hands control back so the
//! host can draw, read input, or inspect the machine.
//!
//! Execution can also be observed one instruction at a time using the [`Trace`]
//! iterator. One could easily log instructions executed, for example.
//! ```rust
//! # use forthvm::{config::MachineConfig, machine::ForthMachine};
//! let mut machine = ForthMachine::new(MachineConfig::default(), ());
//! machine.reset();
//! for traced in machine.trace().take(4) {
//!     println!("{traced}");
//! }
//! ```
//!
//! Word accesses made by the `@`, `!` and `+!` primitives must be aligned. The
//! emulated processor has no way to trap, so a misaligned access halts the whole
//! machine by panicking.

use std::io::Read;

use crate::{
    bus::HardwareBridge,
    config::{MachineConfig, ENTRY_SLOT},
    error::ImageError,
    instruction::{next_address, relative_target, Disassembly, Instruction, Primitive},
    memory::{Memory, WORD_ADDRESS_MASK},
    stack::{DescendingStack, StackIter},
};

/// Up to two addresses [`ForthMachine::execute`] stops at.
pub type Breakpoints = heapless::Vec<u32, 2>;

/// Why [`ForthMachine::execute`] returned.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StopReason {
    /// The program counter reached one of the breakpoints. The instruction there
    /// has not been executed yet.
    Breakpoint,
    /// A frame's worth of cycles was executed, the host should pace itself to
    /// `rate` frames per second.
    Frame { rate: u8 },
}

/// Snapshot of the machine registers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Status {
    pub pc: u32,
    pub dsp: u32,
    pub rsp: u32,
    pub cycles: u32,
}
impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "PC {:05x} DSP {:05x} RSP {:05x} CYC {}",
            self.pc, self.dsp, self.rsp, self.cycles
        )
    }
}

/// The Forth machine, able to execute instructions as described in [`Instruction`].
#[derive(Clone, Debug)]
pub struct ForthMachine<B> {
    memory: Memory,
    program_counter: u32,
    data_stack: DescendingStack,
    return_stack: DescendingStack,
    cycles: u32,

    config: MachineConfig,
    bridge: B,
}
impl<B: HardwareBridge> ForthMachine<B> {
    /// Returns a new [`ForthMachine`] with zeroed memory. Stacks are placed as the
    /// configuration says, but the machine still needs a [`ForthMachine::reset`]
    /// before running.
    pub fn new(config: MachineConfig, bridge: B) -> Self {
        Self {
            memory: Memory::new(),
            program_counter: 0,
            data_stack: DescendingStack::new(config.data_stack_top),
            return_stack: DescendingStack::new(config.return_stack_top),
            cycles: 0,
            config,
            bridge,
        }
    }

    /// Copies the given bytes to memory, starting at the load base. Content past the
    /// end of memory wraps around to address 0.
    pub fn with_memory_content(mut self, content: &[u8]) -> Self {
        let base = self.config.load_base;
        content
            .iter()
            .enumerate()
            .for_each(|(i, byte)| self.memory.write_byte(base.wrapping_add(i as u32), *byte));
        self
    }

    /// Loads a raw binary image at the load base. See [`Memory::load_image`].
    pub fn load_image<R: Read>(&mut self, image: R) -> Result<usize, ImageError> {
        self.memory.load_image(image, self.config.load_base)
    }

    /// Resets the machine registers and the hardware bridge.
    ///
    /// The word at [`ENTRY_SLOT`] past the load base holds the entry point, relative to
    /// that base. The base itself is pushed on the data stack for the program to
    /// relocate itself.
    pub fn reset(&mut self) {
        let base = self.config.load_base;
        self.data_stack.reset();
        self.return_stack.reset();
        self.cycles = 0;

        let entry = self.memory.read_word(base.wrapping_add(ENTRY_SLOT));
        self.program_counter = base.wrapping_add(entry) & WORD_ADDRESS_MASK;
        self.push(base);

        self.bridge.reset();
        log::info!(
            "reset: entry point {:#07x}, base {base:#07x}",
            self.program_counter
        );
    }

    /// Executes a single instruction.
    ///
    /// Returns the frame rate when this instruction completed a frame. The cycle
    /// counter is then lowered by a frame's budget rather than cleared.
    pub fn step(&mut self) -> Option<u8> {
        let word = self.memory.read_word(self.program_counter);
        self.program_counter = next_address(self.program_counter);
        self.execute_instruction(Instruction::decode(word));

        self.cycles = self.cycles.wrapping_add(1);
        if self.cycles < self.config.cycles_per_frame {
            return None;
        }
        self.cycles -= self.config.cycles_per_frame;
        log::trace!("frame completed at {:#07x}", self.program_counter);
        Some(self.config.frame_rate)
    }

    /// Runs until a frame is completed, or the program counter reaches one of
    /// the breakpoints.
    ///
    /// At least one instruction is always executed, so calling this again after
    /// stopping on a breakpoint moves past it.
    pub fn execute(&mut self, breakpoints: &Breakpoints) -> StopReason {
        loop {
            if let Some(rate) = self.step() {
                return StopReason::Frame { rate };
            }
            if breakpoints.contains(&self.program_counter) {
                log::debug!("breakpoint reached at {:#07x}", self.program_counter);
                return StopReason::Breakpoint;
            }
        }
    }

    /// Returns a [`Trace`] that can be iterated on to execute instructions one by one.
    pub fn trace(&mut self) -> Trace<'_, B> {
        Trace { machine: self }
    }

    fn execute_instruction(&mut self, instruction: Instruction) {
        match instruction {
            Instruction::Literal(value) => self.push(value),
            Instruction::Call(offset) => {
                self.return_stack
                    .push(&mut self.memory, self.program_counter);
                self.program_counter = relative_target(self.program_counter, offset);
            }
            Instruction::Branch(offset) => {
                self.program_counter = relative_target(self.program_counter, offset)
            }
            Instruction::BranchIfZero(offset) => {
                if self.pop() == 0 {
                    self.program_counter = relative_target(self.program_counter, offset)
                }
            }
            Instruction::Primitive(code) => self.execute_primitive(code),
            Instruction::Reserved(word) => log::debug!(
                "unassigned instruction class {:#x} ({word:#010x}) ignored",
                word >> 28
            ),
        }
    }

    /// Executes a primitive given its code. Unassigned codes do nothing.
    fn execute_primitive(&mut self, code: u8) {
        let Some(primitive) = Primitive::from_code(code) else {
            log::debug!("unassigned primitive {code:#04x} ignored");
            return;
        };

        match primitive {
            // Memory
            Primitive::Read => {
                let address = aligned(self.pop());
                let value = self.memory.read_word(address);
                self.push(value)
            }
            Primitive::Store => {
                let address = aligned(self.pop());
                let value = self.pop();
                self.memory.write_word(address, value)
            }
            Primitive::ReadByte => {
                let address = self.pop();
                let value = self.memory.read_byte(address);
                self.push(value as u32)
            }
            Primitive::StoreByte => {
                let address = self.pop();
                let value = self.pop();
                self.memory.write_byte(address, value as u8)
            }
            Primitive::AddStore => {
                let address = aligned(self.pop());
                let delta = self.pop();
                let value = self.memory.read_word(address).wrapping_add(delta);
                self.memory.write_word(address, value)
            }

            // Binary
            Primitive::Add => self.binary(u32::wrapping_add),
            Primitive::Sub => self.binary(u32::wrapping_sub),
            Primitive::Mul => self.binary(u32::wrapping_mul),
            Primitive::Div => self.binary(|a, b| {
                if b == 0 {
                    0
                } else {
                    (a as i32).wrapping_div(b as i32) as u32
                }
            }),
            Primitive::And => self.binary(|a, b| a & b),
            Primitive::Or => self.binary(|a, b| a | b),
            Primitive::Xor => self.binary(|a, b| a ^ b),

            // Unary
            Primitive::Not => self.unary(|a| !a),
            Primitive::ZeroEquals => self.unary(|a| flag(a == 0)),
            Primitive::ZeroGreater => self.unary(|a| flag((a as i32) > 0)),
            Primitive::ZeroLess => self.unary(|a| flag((a as i32) < 0)),
            Primitive::Negate => self.unary(u32::wrapping_neg),
            Primitive::Increment => self.unary(|a| a.wrapping_add(1)),
            Primitive::Decrement => self.unary(|a| a.wrapping_sub(1)),
            Primitive::ShiftLeft => self.unary(|a| a << 1),
            Primitive::ShiftRight => self.unary(|a| a >> 1),

            // Stack manipulation
            Primitive::Dup => {
                let a = self.peek(0);
                self.push(a)
            }
            Primitive::Drop => {
                self.pop();
            }
            Primitive::Swap => {
                let b = self.peek(0);
                let a = self.peek(1);
                self.poke(1, b);
                self.poke(0, a);
            }
            Primitive::Rot => {
                let c = self.peek(0);
                let b = self.peek(1);
                let a = self.peek(2);
                self.poke(2, b);
                self.poke(1, c);
                self.poke(0, a);
            }
            Primitive::Over => {
                let a = self.peek(1);
                self.push(a)
            }
            Primitive::Pick => {
                let n = self.peek(0);
                let value = self.peek(n.wrapping_add(1));
                self.poke(0, value)
            }

            // Control flow
            Primitive::Return => {
                self.program_counter = self.return_stack.pop(&self.memory) & WORD_ADDRESS_MASK
            }
            Primitive::FromReturn => {
                let value = self.return_stack.pop(&self.memory);
                self.push(value)
            }
            Primitive::ToReturn => {
                let value = self.pop();
                self.return_stack.push(&mut self.memory, value)
            }
            Primitive::SkipIfZero => {
                if self.pop() == 0 {
                    self.program_counter = next_address(self.program_counter)
                }
            }

            Primitive::HardwareIo => match self.pop() {
                0 => {
                    let key = self.bridge.get_key().unwrap_or(0);
                    self.push(key)
                }
                1 => {
                    let address = self.pop();
                    self.bridge.set_screen_write_address(address)
                }
                2 => {
                    let value = self.pop();
                    self.bridge.write_screen_memory(value)
                }
                command => log::debug!("unknown hardware command {command} ignored"),
            },
        }
    }

    fn push(&mut self, value: u32) {
        self.data_stack.push(&mut self.memory, value)
    }
    fn pop(&mut self) -> u32 {
        self.data_stack.pop(&self.memory)
    }
    fn peek(&self, index: u32) -> u32 {
        self.data_stack.get(&self.memory, index)
    }
    fn poke(&mut self, index: u32, value: u32) {
        self.data_stack.set(&mut self.memory, index, value)
    }

    /// `( a -- op(a) )`, in place.
    fn unary(&mut self, op: impl FnOnce(u32) -> u32) {
        let a = self.peek(0);
        self.poke(0, op(a))
    }
    /// `( a b -- op(a, b) )`
    fn binary(&mut self, op: impl FnOnce(u32, u32) -> u32) {
        let b = self.pop();
        let a = self.peek(0);
        self.poke(0, op(a, b))
    }
}

// Debugging support. None of these are used while executing, they let a host
// inspect and patch the machine between two calls to `execute`.
impl<B: HardwareBridge> ForthMachine<B> {
    pub fn status(&self) -> Status {
        Status {
            pc: self.program_counter,
            dsp: self.data_stack.pointer,
            rsp: self.return_stack.pointer,
            cycles: self.cycles,
        }
    }

    /// Address to run to in order to step over the instruction at the program
    /// counter. Only calls can be stepped over.
    pub fn step_over_target(&self) -> Option<u32> {
        match Instruction::decode(self.memory.read_word(self.program_counter)) {
            Instruction::Call(_) => Some(next_address(self.program_counter)),
            _ => None,
        }
    }

    /// Reads a word of memory. Not subject to alignment checks.
    pub fn read_memory(&self, address: u32) -> u32 {
        self.memory.read_word(address)
    }

    /// Writes a word of memory. Not subject to alignment checks.
    pub fn write_memory(&mut self, address: u32, value: u32) {
        self.memory.write_word(address, value)
    }

    /// Disassembles the word at the given address.
    pub fn disassemble(&self, address: u32) -> Disassembly {
        let address = address & WORD_ADDRESS_MASK;
        Instruction::decode(self.memory.read_word(address)).disassemble(address)
    }

    pub fn program_counter(&self) -> u32 {
        self.program_counter
    }
    pub fn set_program_counter(&mut self, address: u32) {
        self.program_counter = address & WORD_ADDRESS_MASK
    }

    /// Words on the data stack, from the top down.
    pub fn data_stack(&self) -> StackIter<'_> {
        self.data_stack.iter(&self.memory)
    }
    /// Words on the return stack, from the top down.
    pub fn return_stack(&self) -> StackIter<'_> {
        self.return_stack.iter(&self.memory)
    }
    pub fn data_stack_depth(&self) -> i32 {
        self.data_stack.depth()
    }
    pub fn return_stack_depth(&self) -> i32 {
        self.return_stack.depth()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }
    pub fn bridge(&self) -> &B {
        &self.bridge
    }
    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }
}

/// Halts the machine on misaligned word accesses.
fn aligned(address: u32) -> u32 {
    if address & 0b11 != 0 {
        log::error!("misaligned word access at {address:#010x}, halting");
        panic!("misaligned word access at {address:#010x}");
    }
    address
}

fn flag(condition: bool) -> u32 {
    if condition {
        u32::MAX
    } else {
        0
    }
}

/// An executed instruction, as yielded by [`Trace`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Traced {
    pub address: u32,
    pub word: u32,
    /// Set when this instruction completed a frame, see [`ForthMachine::step`].
    pub frame: Option<u8>,
}
impl Traced {
    pub fn instruction(&self) -> Instruction {
        Instruction::decode(self.word)
    }
}
impl core::fmt::Display for Traced {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:05x}  {:08x}  {}",
            self.address,
            self.word,
            self.instruction().disassemble(self.address)
        )
    }
}

/// Executes instructions one at a time, yielding each one after it ran.
///
/// The machine has no halt instruction, so this iterator never ends on its own.
/// Take as many instructions as needed from it.
pub struct Trace<'a, B> {
    machine: &'a mut ForthMachine<B>,
}
impl<B: HardwareBridge> Iterator for Trace<'_, B> {
    type Item = Traced;

    fn next(&mut self) -> Option<Self::Item> {
        let address = self.machine.program_counter;
        let word = self.machine.memory.read_word(address);
        let frame = self.machine.step();
        Some(Traced {
            address,
            word,
            frame,
        })
    }
}
