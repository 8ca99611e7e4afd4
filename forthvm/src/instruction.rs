//! # Instruction encoding
//! Every instruction is a single 32-bit word. Its top nibble selects an opcode
//! class, the remaining 28 bits are an operand whose meaning depends on the class:
//!
//! | Top nibble | Class | Operand |
//! | ---------- | ----- | ------- |
//! | `0..=7` | literal | 31 bit constant, sign extended from bit 30 |
//! | `8` | call | pc-relative offset |
//! | `9` | branch | pc-relative offset |
//! | `a` | branch if zero | pc-relative offset |
//! | `f` | primitive | [`Primitive`] code in the low 8 bits |
//!
//! Classes `b` to `e` are unassigned.
//!
//! Offsets are relative to the address *after* the instruction, and are added
//! modulo the 20 bit address space. A backward jump is thus encoded as the
//! two's complement of its distance, truncated to 28 bits.

use core::fmt::Display;

use crate::memory::WORD_ADDRESS_MASK;

const OPERAND_MASK: u32 = 0x0fff_ffff;
const CLASS_CALL: u32 = 0x8;
const CLASS_BRANCH: u32 = 0x9;
const CLASS_BRANCH_IF_ZERO: u32 = 0xa;
const CLASS_PRIMITIVE: u32 = 0xf;

/// A decoded instruction word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Instruction {
    /// Pushes its (already sign extended) value on the data stack.
    Literal(u32),
    /// Pushes the return address on the return stack, then jumps.
    Call(u32),
    /// Jumps unconditionally.
    Branch(u32),
    /// Pops the data stack and jumps if the popped value is zero.
    BranchIfZero(u32),
    /// Executes the primitive with the given code, which may be unassigned.
    Primitive(u8),
    /// Any word with an unassigned class. Executes as a no-op.
    Reserved(u32),
}
impl Instruction {
    /// Decodes an instruction word.
    /// # Example
    /// ```rust
    /// # use forthvm::instruction::{Instruction, Primitive};
    /// // Bit 30 of a literal is copied into bit 31.
    /// assert_eq!(Instruction::decode(0x4000_0005), Instruction::Literal(0xc000_0005));
    /// assert_eq!(Instruction::decode(0x8000_0010), Instruction::Call(0x10));
    /// assert_eq!(
    ///     Instruction::decode(0xf000_0015),
    ///     Instruction::Primitive(Primitive::Dup as u8)
    /// );
    /// ```
    pub fn decode(word: u32) -> Self {
        let operand = word & OPERAND_MASK;
        match word >> 28 {
            0x0..=0x7 => {
                let value = word & 0x7fff_ffff;
                Self::Literal(if value & 0x4000_0000 != 0 {
                    value | 0x8000_0000
                } else {
                    value
                })
            }
            CLASS_CALL => Self::Call(operand),
            CLASS_BRANCH => Self::Branch(operand),
            CLASS_BRANCH_IF_ZERO => Self::BranchIfZero(operand),
            CLASS_PRIMITIVE => Self::Primitive(word as u8),
            _ => Self::Reserved(word),
        }
    }

    /// Encodes an instruction back into a word.
    ///
    /// Literals are truncated to 31 bits and offsets to 28 bits, see [`Instruction::literal`]
    /// and [`Instruction::call_to`] to build valid instructions.
    pub fn encode(self) -> u32 {
        match self {
            Self::Literal(value) => value & 0x7fff_ffff,
            Self::Call(offset) => (CLASS_CALL << 28) | (offset & OPERAND_MASK),
            Self::Branch(offset) => (CLASS_BRANCH << 28) | (offset & OPERAND_MASK),
            Self::BranchIfZero(offset) => (CLASS_BRANCH_IF_ZERO << 28) | (offset & OPERAND_MASK),
            Self::Primitive(code) => (CLASS_PRIMITIVE << 28) | code as u32,
            Self::Reserved(word) => word,
        }
    }

    /// Returns a literal instruction pushing `value`, if it can be encoded. Only
    /// values whose two top bits are equal survive the sign extension.
    /// # Example
    /// ```rust
    /// # use forthvm::instruction::Instruction;
    /// assert_eq!(Instruction::literal(-2), Some(Instruction::Literal(0xffff_fffe)));
    /// assert_eq!(Instruction::literal(0x4000_0000), None);
    /// ```
    pub fn literal(value: i32) -> Option<Self> {
        match (value as u32) >> 30 {
            0b00 | 0b11 => Some(Self::Literal(value as u32)),
            _ => None,
        }
    }

    /// Returns a call to `target`, for an instruction placed at `address`.
    /// # Example
    /// ```rust
    /// # use forthvm::instruction::Instruction;
    /// assert_eq!(Instruction::call_to(0x100, 0x120), Instruction::Call(0x1c));
    /// assert_eq!(Instruction::call_to(0x100, 0x100).target(0x100), Some(0x100));
    /// ```
    pub fn call_to(address: u32, target: u32) -> Self {
        Self::Call(Self::offset_between(address, target))
    }

    /// Returns a branch to `target`, for an instruction placed at `address`.
    pub fn branch_to(address: u32, target: u32) -> Self {
        Self::Branch(Self::offset_between(address, target))
    }

    /// Returns a branch to `target` taken when the top of the data stack is zero,
    /// for an instruction placed at `address`.
    pub fn branch_if_zero_to(address: u32, target: u32) -> Self {
        Self::BranchIfZero(Self::offset_between(address, target))
    }

    /// Returns the primitive instruction for a given [`Primitive`].
    pub fn primitive(primitive: Primitive) -> Self {
        Self::Primitive(primitive as u8)
    }

    /// Absolute destination of a call or branch placed at `address`.
    pub fn target(self, address: u32) -> Option<u32> {
        match self {
            Self::Call(offset) | Self::Branch(offset) | Self::BranchIfZero(offset) => {
                Some(relative_target(next_address(address), offset))
            }
            _ => None,
        }
    }

    fn offset_between(address: u32, target: u32) -> u32 {
        target.wrapping_sub(next_address(address)) & OPERAND_MASK
    }

    /// Returns a [`Disassembly`] of this instruction, resolving relative jumps
    /// as if it were placed at `address`.
    pub fn disassemble(self, address: u32) -> Disassembly {
        Disassembly {
            instruction: self,
            address,
        }
    }
}
impl From<u32> for Instruction {
    fn from(word: u32) -> Self {
        Self::decode(word)
    }
}
impl From<Instruction> for u32 {
    fn from(instruction: Instruction) -> Self {
        instruction.encode()
    }
}

/// Address of the instruction following the one at `address`.
pub(crate) fn next_address(address: u32) -> u32 {
    address.wrapping_add(4) & WORD_ADDRESS_MASK
}

/// Applies a 28 bit relative offset to an already advanced program counter.
pub(crate) fn relative_target(program_counter: u32, offset: u32) -> u32 {
    program_counter.wrapping_add(offset & OPERAND_MASK) & WORD_ADDRESS_MASK
}

/// One line listing of an instruction at a given address, as shown by debuggers
/// and traces.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Disassembly {
    instruction: Instruction,
    address: u32,
}
impl Display for Disassembly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let target = self.instruction.target(self.address).unwrap_or_default();
        match self.instruction {
            Instruction::Literal(value) => write!(f, "lit {}", value as i32),
            Instruction::Call(_) => write!(f, "call {target:#07x}"),
            Instruction::Branch(_) => write!(f, "br {target:#07x}"),
            Instruction::BranchIfZero(_) => write!(f, "0br {target:#07x}"),
            Instruction::Primitive(code) => match Primitive::from_code(code) {
                Some(primitive) => write!(f, "{primitive}"),
                None => write!(f, "prim {code:#04x}"),
            },
            Instruction::Reserved(word) => write!(f, ".word {word:#010x}"),
        }
    }
}

/// Primitive operations, selected by the low byte of a class `f` instruction.
///
/// Stack effects are written `( before -- after )` with the top of the stack on the
/// right. Booleans are all bits set for true and all bits clear for false.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Primitive {
    /// `@ ( addr -- value )`
    Read = 0x00,
    /// `! ( value addr -- )`
    Store = 0x01,
    /// `C@ ( addr -- byte )`
    ReadByte = 0x02,
    /// `C! ( value addr -- )`
    StoreByte = 0x03,
    /// `+! ( delta addr -- )`
    AddStore = 0x04,
    /// `+ ( a b -- a+b )`
    Add = 0x05,
    /// `- ( a b -- a-b )`
    Sub = 0x06,
    /// `* ( a b -- a*b )`
    Mul = 0x07,
    /// `/ ( a b -- a/b )`, zero when dividing by zero.
    Div = 0x08,
    /// `AND ( a b -- a&b )`
    And = 0x09,
    /// `OR ( a b -- a|b )`
    Or = 0x0a,
    /// `XOR ( a b -- a^b )`
    Xor = 0x0b,
    /// `NOT ( a -- ~a )`
    Not = 0x0c,
    /// `0= ( a -- flag )`
    ZeroEquals = 0x0d,
    /// `0> ( a -- flag )`
    ZeroGreater = 0x0e,
    /// `0< ( a -- flag )`
    ZeroLess = 0x0f,
    /// `0- ( a -- -a )`
    Negate = 0x10,
    /// `1+ ( a -- a+1 )`
    Increment = 0x11,
    /// `1- ( a -- a-1 )`
    Decrement = 0x12,
    /// `2* ( a -- a<<1 )`
    ShiftLeft = 0x13,
    /// `2/ ( a -- a>>1 )`, logical.
    ShiftRight = 0x14,
    /// `DUP ( a -- a a )`
    Dup = 0x15,
    /// `DROP ( a -- )`
    Drop = 0x16,
    /// `SWAP ( a b -- b a )`
    Swap = 0x17,
    /// `ROT ( a b c -- b c a )`
    Rot = 0x18,
    /// `OVER ( a b -- a b a )`
    Over = 0x19,
    /// `PICK ( xn .. x0 n -- xn .. x0 xn )`
    Pick = 0x1a,
    /// `; ( R: addr -- )`, returns from a call.
    Return = 0x1b,
    /// `R> ( -- a ) ( R: a -- )`
    FromReturn = 0x1c,
    /// `>R ( a -- ) ( R: -- a )`
    ToReturn = 0x1d,
    /// `#0IF ( a -- )`, skips the next instruction if `a` is zero.
    SkipIfZero = 0x1e,
    /// `$HWIO ( .. command -- .. )`, talks to the hardware bridge.
    HardwareIo = 0x1f,
}
impl Primitive {
    /// Every primitive, ordered by code.
    pub const ALL: [Primitive; 32] = [
        Self::Read,
        Self::Store,
        Self::ReadByte,
        Self::StoreByte,
        Self::AddStore,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Not,
        Self::ZeroEquals,
        Self::ZeroGreater,
        Self::ZeroLess,
        Self::Negate,
        Self::Increment,
        Self::Decrement,
        Self::ShiftLeft,
        Self::ShiftRight,
        Self::Dup,
        Self::Drop,
        Self::Swap,
        Self::Rot,
        Self::Over,
        Self::Pick,
        Self::Return,
        Self::FromReturn,
        Self::ToReturn,
        Self::SkipIfZero,
        Self::HardwareIo,
    ];

    /// Returns the primitive with the given code, if one is assigned.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// The Forth word for this primitive.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Read => "@",
            Self::Store => "!",
            Self::ReadByte => "c@",
            Self::StoreByte => "c!",
            Self::AddStore => "+!",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Not => "not",
            Self::ZeroEquals => "0=",
            Self::ZeroGreater => "0>",
            Self::ZeroLess => "0<",
            Self::Negate => "0-",
            Self::Increment => "1+",
            Self::Decrement => "1-",
            Self::ShiftLeft => "2*",
            Self::ShiftRight => "2/",
            Self::Dup => "dup",
            Self::Drop => "drop",
            Self::Swap => "swap",
            Self::Rot => "rot",
            Self::Over => "over",
            Self::Pick => "pick",
            Self::Return => ";",
            Self::FromReturn => "r>",
            Self::ToReturn => ">r",
            Self::SkipIfZero => "#0if",
            Self::HardwareIo => "$hwio",
        }
    }
}
impl Display for Primitive {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitive_codes_match_table_order() {
        for (code, primitive) in Primitive::ALL.iter().enumerate() {
            assert_eq!(*primitive as u8, code as u8);
            assert_eq!(Primitive::from_code(code as u8), Some(*primitive));
        }
        for code in 0x20..=0xff {
            assert_eq!(Primitive::from_code(code), None);
        }
    }

    #[test]
    fn literal_sign_extension() {
        assert_eq!(Instruction::decode(0x4000_0005), Instruction::Literal(0xc000_0005));
        assert_eq!(Instruction::decode(0x3fff_ffff), Instruction::Literal(0x3fff_ffff));
        // Any class below 8 is a literal, bit 31 is discarded.
        assert_eq!(Instruction::decode(0x7fff_ffff), Instruction::Literal(0xffff_ffff));
        assert_eq!(Instruction::literal(-1).map(Instruction::encode), Some(0x7fff_ffff));
        assert_eq!(Instruction::literal(i32::MIN), None);
        assert_eq!(Instruction::literal(-0x4000_0000), Some(Instruction::Literal(0xc000_0000)));
    }

    #[test]
    fn control_flow_classes() {
        assert_eq!(Instruction::decode(0x9000_0004), Instruction::Branch(4));
        assert_eq!(Instruction::decode(0xafff_fff8), Instruction::BranchIfZero(0x0fff_fff8));
        assert_eq!(Instruction::decode(0xf000_01ff), Instruction::Primitive(0xff));
        for class in 0xb..=0xe {
            let word = class << 28 | 0x1234;
            assert_eq!(Instruction::decode(word), Instruction::Reserved(word));
            assert_eq!(Instruction::decode(word).encode(), word);
        }
    }

    #[test]
    fn relative_targets_wrap_backwards() {
        let branch = Instruction::branch_to(0x200, 0x100);
        assert_eq!(branch.encode(), 0x9fff_fefc);
        assert_eq!(branch.target(0x200), Some(0x100));
        assert_eq!(Instruction::call_to(0xffffc, 0x8).target(0xffffc), Some(0x8));
        assert_eq!(Instruction::Literal(3).target(0), None);
    }

    #[test]
    fn disassembly() {
        let listing = |word: u32, address: u32| Instruction::decode(word).disassemble(address).to_string();
        assert_eq!(listing(0x7fff_fffe, 0), "lit -2");
        assert_eq!(listing(0x0000_002a, 0), "lit 42");
        assert_eq!(listing(0x8000_0008, 0x100), "call 0x0010c");
        assert_eq!(listing(0x9fff_fffc, 0x100), "br 0x00100");
        assert_eq!(listing(0xa000_0000, 0x100), "0br 0x00104");
        assert_eq!(listing(0xf000_0015, 0), "dup");
        assert_eq!(listing(0xf000_001b, 0), ";");
        assert_eq!(listing(0xf000_002a, 0), "prim 0x2a");
        assert_eq!(listing(0xb000_0000, 0), ".word 0xb0000000");
    }
}
