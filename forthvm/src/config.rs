//! Tunable parameters of a [`ForthMachine`](crate::machine::ForthMachine).

/// Instructions executed per frame before control goes back to the host.
pub const CYCLES_PER_FRAME: u32 = 1_000_000;
/// Frames per second, reported to the host at every frame boundary.
pub const FRAME_RATE: u8 = 60;
/// Initial data stack pointer.
pub const RST_DSP: u32 = 0xfc000;
/// Initial return stack pointer. The first push lands on the last word of memory.
pub const RST_RSP: u32 = 0x100000;
/// Byte offset, from the load base, of the word holding the entry point.
pub const ENTRY_SLOT: u32 = 8;
/// Where images are loaded and relocated by default.
pub const LOAD_BASE: u32 = 0;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MachineConfig {
    pub cycles_per_frame: u32,
    pub frame_rate: u8,
    pub data_stack_top: u32,
    pub return_stack_top: u32,
    pub load_base: u32,
}
impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cycles_per_frame: CYCLES_PER_FRAME,
            frame_rate: FRAME_RATE,
            data_stack_top: RST_DSP,
            return_stack_top: RST_RSP,
            load_base: LOAD_BASE,
        }
    }
}
impl MachineConfig {
    /// Changes the frame cycle budget. A budget of zero is treated as one.
    pub fn with_cycles_per_frame(mut self, cycles_per_frame: u32) -> Self {
        self.cycles_per_frame = cycles_per_frame.max(1);
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: u8) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Moves both stacks.
    pub fn with_stacks(mut self, data_stack_top: u32, return_stack_top: u32) -> Self {
        self.data_stack_top = data_stack_top;
        self.return_stack_top = return_stack_top;
        self
    }

    pub fn with_load_base(mut self, load_base: u32) -> Self {
        self.load_base = load_base;
        self
    }
}
