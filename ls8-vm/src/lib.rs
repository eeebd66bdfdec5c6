//! LS-8 virtual machine
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use core::cmp::Ordering;
use core::fmt;

use log::warn;

/// Number of operand bytes following the opcode (0, 1, or 2)
pub const fn operand_count(op: u8) -> u8 {
    op >> 6
}

/// Checks whether the opcode dispatches to the ALU
pub const fn is_alu(op: u8) -> bool {
    (op & (1 << 5)) != 0
}

/// Checks whether the instruction sets the program counter itself
///
/// When set, the execution loop does not advance `pc` after the handler.
pub const fn sets_pc(op: u8) -> bool {
    (op & (1 << 4)) != 0
}

/// Size of addressable RAM, in bytes
pub const RAM_SIZE: usize = 256;

/// Number of general-purpose registers
pub const REG_COUNT: usize = 8;

/// Register reserved for the stack pointer
pub const SP: usize = 7;

/// Initial stack pointer, at the top region of RAM
///
/// The stack grows toward lower addresses.
pub const STACK_TOP: u8 = 0xF4;

/// Opcode values
///
/// The top two bits encode the operand count, bit 5 marks ALU-class
/// opcodes, and bit 4 marks opcodes that set the program counter
/// themselves.
pub mod opcode {
    /// Halt the machine
    pub const HLT: u8 = 0b0000_0001;
    /// Store an immediate value in a register
    pub const LDI: u8 = 0b1000_0010;
    /// Emit the numeric value stored in a register
    pub const PRN: u8 = 0b0100_0111;
    /// Push a register onto the stack
    pub const PUSH: u8 = 0b0100_0101;
    /// Pop the top of the stack into a register
    pub const POP: u8 = 0b0100_0110;
    /// Call the subroutine at the address in a register
    pub const CALL: u8 = 0b0101_0000;
    /// Return from a subroutine
    pub const RET: u8 = 0b0001_0001;
    /// Jump to the address in a register
    pub const JMP: u8 = 0b0101_0100;
    /// Jump if the equal flag is set
    pub const JEQ: u8 = 0b0101_0101;
    /// Jump if the equal flag is clear
    pub const JNE: u8 = 0b0101_0110;

    /// Add two registers
    pub const ADD: u8 = 0b1010_0000;
    /// Subtract two registers
    pub const SUB: u8 = 0b1010_0001;
    /// Multiply two registers
    pub const MUL: u8 = 0b1010_0010;
    /// Divide two registers
    pub const DIV: u8 = 0b1010_0011;
    /// Remainder of dividing two registers
    pub const MOD: u8 = 0b1010_0100;
    /// Increment a register
    pub const INC: u8 = 0b0110_0101;
    /// Decrement a register
    pub const DEC: u8 = 0b0110_0110;
    /// Compare two registers, setting the flags register
    pub const CMP: u8 = 0b1010_0111;
    /// Bitwise AND of two registers
    pub const AND: u8 = 0b1010_1000;
    /// Bitwise complement of a register
    pub const NOT: u8 = 0b0110_1001;
    /// Bitwise OR of two registers
    pub const OR: u8 = 0b1010_1010;
    /// Bitwise XOR of two registers
    pub const XOR: u8 = 0b1010_1011;
    /// Shift a register left by the value in another register
    pub const SHL: u8 = 0b1010_1100;
    /// Shift a register right by the value in another register
    pub const SHR: u8 = 0b1010_1101;
}

/// Flag bits, set by `CMP` and read by the conditional jumps
pub mod flags {
    /// The first operand compared less than the second
    pub const LESS: u8 = 1 << 2;
    /// The first operand compared greater than the second
    pub const GREATER: u8 = 1 << 1;
    /// The operands compared equal
    pub const EQUAL: u8 = 1 << 0;
}

/// Fatal conditions which abort execution
#[derive(thiserror::Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// An ALU-class opcode with no matching operation
    #[error("unsupported ALU operation {op:#04x} at pc {pc:#04x}")]
    UnsupportedAlu {
        /// The offending opcode byte
        op: u8,
        /// Address of the instruction
        pc: u8,
    },

    /// `DIV` or `MOD` with a zero divisor
    #[error("division by zero at pc {pc:#04x}")]
    DivisionByZero {
        /// Address of the instruction
        pc: u8,
    },

    /// A register index operand outside the register file
    #[error("register index {index} out of bounds at pc {pc:#04x}")]
    OutOfBounds {
        /// The offending register index
        index: u8,
        /// Address of the instruction
        pc: u8,
    },
}

/// Trait for the output peripheral attached to the machine
pub trait Device {
    /// Called when `PRN` emits the value of a register
    fn prn(&mut self, value: u8);
}

/// Device which discards all output
pub struct EmptyDevice;
impl Device for EmptyDevice {
    fn prn(&mut self, _value: u8) {
        // nothing to do here
    }
}

/// Outcome of executing a single instruction
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// The machine can keep running
    Running,
    /// A `HLT` instruction was executed
    Halted,
}

/// The LS-8 machine itself
pub struct Ls8 {
    /// RAM, shared between code, data, and the downward-growing stack
    ram: [u8; RAM_SIZE],
    /// Register file; `reg[SP]` holds the stack pointer
    reg: [u8; REG_COUNT],
    /// Flags register, updated only by `CMP`
    fl: u8,
    /// Program counter
    pc: u8,
}

impl Ls8 {
    /// Builds a new machine, loading the given program image at address 0
    ///
    /// # Panics
    /// If `program` cannot fit in RAM
    pub fn new(program: &[u8]) -> Self {
        let mut out = Self {
            ram: [0u8; RAM_SIZE],
            reg: [0u8; REG_COUNT],
            fl: 0,
            pc: 0,
        };
        out.ram[..program.len()].copy_from_slice(program);
        out.reg[SP] = STACK_TOP;
        out
    }

    /// Current program counter
    #[inline]
    pub fn pc(&self) -> u8 {
        self.pc
    }

    /// Current flags register
    #[inline]
    pub fn flags(&self) -> u8 {
        self.fl
    }

    /// Shared borrow of the register file
    #[inline]
    pub fn registers(&self) -> &[u8; REG_COUNT] {
        &self.reg
    }

    /// Reads a byte from RAM
    #[inline]
    pub fn ram_read_byte(&self, addr: u8) -> u8 {
        self.ram[usize::from(addr)]
    }

    /// Writes a byte to RAM
    #[inline]
    pub fn ram_write_byte(&mut self, addr: u8, v: u8) {
        self.ram[usize::from(addr)] = v;
    }

    /// Returns a renderer for the current machine state
    pub fn trace(&self) -> Trace<'_> {
        Trace(self)
    }

    /// Reads the register at the given index
    fn load(&self, index: u8) -> Result<u8, Error> {
        match self.reg.get(usize::from(index)) {
            Some(v) => Ok(*v),
            None => Err(Error::OutOfBounds { index, pc: self.pc }),
        }
    }

    /// Writes the register at the given index
    fn store(&mut self, index: u8, value: u8) -> Result<(), Error> {
        let pc = self.pc;
        match self.reg.get_mut(usize::from(index)) {
            Some(v) => {
                *v = value;
                Ok(())
            }
            None => Err(Error::OutOfBounds { index, pc }),
        }
    }

    /// Pushes a byte, moving the stack pointer down
    #[inline]
    fn push_byte(&mut self, v: u8) {
        let sp = self.reg[SP].wrapping_sub(1);
        self.reg[SP] = sp;
        self.ram[usize::from(sp)] = v;
    }

    /// Pops a byte, moving the stack pointer up
    #[inline]
    fn pop_byte(&mut self) -> u8 {
        let sp = self.reg[SP];
        self.reg[SP] = sp.wrapping_add(1);
        self.ram[usize::from(sp)]
    }

    /// Executes the instruction at the program counter
    ///
    /// Both operand bytes are always fetched, even for instructions that
    /// use fewer; reads wrap at the top of RAM.
    pub fn step<D: Device>(&mut self, dev: &mut D) -> Result<Step, Error> {
        let ir = self.ram[usize::from(self.pc)];
        let a = self.ram[usize::from(self.pc.wrapping_add(1))];
        let b = self.ram[usize::from(self.pc.wrapping_add(2))];
        match ir {
            opcode::HLT => return Ok(Step::Halted),
            opcode::LDI => op::ldi(self, a, b)?,
            opcode::PRN => op::prn(self, dev, a)?,
            opcode::PUSH => op::push(self, a)?,
            opcode::POP => op::pop(self, a)?,
            opcode::CALL => op::call(self, a)?,
            opcode::RET => op::ret(self),
            opcode::JMP => op::jmp(self, a)?,
            opcode::JEQ => op::jeq(self, a)?,
            opcode::JNE => op::jne(self, a)?,
            _ if is_alu(ir) => op::alu(self, ir, a, b)?,
            _ => warn!("unsupported opcode {ir:#04x} at pc {:#04x}", self.pc),
        }
        if !sets_pc(ir) {
            self.pc = self.pc.wrapping_add(operand_count(ir) + 1);
        }
        Ok(Step::Running)
    }

    /// Runs the machine until it halts
    ///
    /// A fatal condition aborts the run and leaves the machine state as of
    /// the failing instruction.
    pub fn run<D: Device>(&mut self, dev: &mut D) -> Result<(), Error> {
        while self.step(dev)? == Step::Running {}
        Ok(())
    }
}

mod op {
    use super::*;

    /// Load Immediate
    ///
    /// ```text
    /// LDI reg, imm
    /// ```
    ///
    /// Stores an immediate value in a register.
    #[inline]
    pub fn ldi(vm: &mut Ls8, a: u8, b: u8) -> Result<(), Error> {
        vm.store(a, b)
    }

    /// Print Numeric
    ///
    /// ```text
    /// PRN reg
    /// ```
    ///
    /// Emits the value of a register to the output device.
    #[inline]
    pub fn prn(
        vm: &mut Ls8,
        dev: &mut dyn Device,
        a: u8,
    ) -> Result<(), Error> {
        dev.prn(vm.load(a)?);
        Ok(())
    }

    /// Push
    ///
    /// ```text
    /// PUSH reg
    /// ```
    ///
    /// Decrements the stack pointer and stores the register at the new top
    /// of the stack.
    #[inline]
    pub fn push(vm: &mut Ls8, a: u8) -> Result<(), Error> {
        let v = vm.load(a)?;
        vm.push_byte(v);
        Ok(())
    }

    /// Pop
    ///
    /// ```text
    /// POP reg
    /// ```
    ///
    /// Loads the top of the stack into the register and increments the
    /// stack pointer.
    #[inline]
    pub fn pop(vm: &mut Ls8, a: u8) -> Result<(), Error> {
        let v = vm.pop_byte();
        vm.store(a, v)
    }

    /// Call
    ///
    /// ```text
    /// CALL reg
    /// ```
    ///
    /// Pushes the address of the next instruction, then jumps to the
    /// address in the register.
    #[inline]
    pub fn call(vm: &mut Ls8, a: u8) -> Result<(), Error> {
        let target = vm.load(a)?;
        vm.push_byte(vm.pc.wrapping_add(2));
        vm.pc = target;
        Ok(())
    }

    /// Return
    ///
    /// ```text
    /// RET
    /// ```
    ///
    /// Pops the return address into the program counter.
    #[inline]
    pub fn ret(vm: &mut Ls8) {
        vm.pc = vm.pop_byte();
    }

    /// Jump
    ///
    /// ```text
    /// JMP reg
    /// ```
    ///
    /// Jumps to the address in the register.
    #[inline]
    pub fn jmp(vm: &mut Ls8, a: u8) -> Result<(), Error> {
        vm.pc = vm.load(a)?;
        Ok(())
    }

    /// Jump If Equal
    ///
    /// ```text
    /// JEQ reg
    /// ```
    ///
    /// Jumps to the address in the register if the equal flag is set,
    /// otherwise falls through to the next instruction.
    #[inline]
    pub fn jeq(vm: &mut Ls8, a: u8) -> Result<(), Error> {
        let target = vm.load(a)?;
        vm.pc = if vm.fl & flags::EQUAL != 0 {
            target
        } else {
            vm.pc.wrapping_add(2)
        };
        Ok(())
    }

    /// Jump If Not Equal
    ///
    /// ```text
    /// JNE reg
    /// ```
    ///
    /// Jumps to the address in the register if the equal flag is clear,
    /// otherwise falls through to the next instruction.
    #[inline]
    pub fn jne(vm: &mut Ls8, a: u8) -> Result<(), Error> {
        let target = vm.load(a)?;
        vm.pc = if vm.fl & flags::EQUAL == 0 {
            target
        } else {
            vm.pc.wrapping_add(2)
        };
        Ok(())
    }

    /// Arithmetic and logic operations, dispatched on the opcode itself
    ///
    /// Arithmetic wraps at 8 bits; shifts by 8 or more places produce 0.
    /// `CMP` writes the flags register instead of a destination register.
    /// An ALU-class opcode not listed here is a fatal error.
    pub fn alu(vm: &mut Ls8, op: u8, a: u8, b: u8) -> Result<(), Error> {
        let v = match op {
            opcode::ADD => vm.load(a)?.wrapping_add(vm.load(b)?),
            opcode::SUB => vm.load(a)?.wrapping_sub(vm.load(b)?),
            opcode::MUL => vm.load(a)?.wrapping_mul(vm.load(b)?),
            opcode::DIV | opcode::MOD => {
                let x = vm.load(a)?;
                let y = vm.load(b)?;
                if y == 0 {
                    return Err(Error::DivisionByZero { pc: vm.pc });
                }
                if op == opcode::DIV {
                    x / y
                } else {
                    x % y
                }
            }
            opcode::INC => vm.load(a)?.wrapping_add(1),
            opcode::DEC => vm.load(a)?.wrapping_sub(1),
            opcode::CMP => {
                vm.fl = match vm.load(a)?.cmp(&vm.load(b)?) {
                    Ordering::Less => flags::LESS,
                    Ordering::Greater => flags::GREATER,
                    Ordering::Equal => flags::EQUAL,
                };
                return Ok(());
            }
            opcode::AND => vm.load(a)? & vm.load(b)?,
            opcode::OR => vm.load(a)? | vm.load(b)?,
            opcode::XOR => vm.load(a)? ^ vm.load(b)?,
            opcode::NOT => !vm.load(a)?,
            opcode::SHL => {
                let n = vm.load(b)?;
                vm.load(a)?.checked_shl(u32::from(n)).unwrap_or(0)
            }
            opcode::SHR => {
                let n = vm.load(b)?;
                vm.load(a)?.checked_shr(u32::from(n)).unwrap_or(0)
            }
            _ => return Err(Error::UnsupportedAlu { op, pc: vm.pc }),
        };
        vm.store(a, v)
    }
}

/// Machine state renderer for debugging
///
/// Shows the program counter, the next three bytes of RAM, and the
/// register file, all in hexadecimal.
pub struct Trace<'a>(&'a Ls8);

impl fmt::Display for Trace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let vm = self.0;
        write!(
            f,
            "{:02X} | {:02X} {:02X} {:02X} |",
            vm.pc,
            vm.ram[usize::from(vm.pc)],
            vm.ram[usize::from(vm.pc.wrapping_add(1))],
            vm.ram[usize::from(vm.pc.wrapping_add(2))],
        )?;
        for r in &vm.reg {
            write!(f, " {r:02X}")?;
        }
        Ok(())
    }
}
