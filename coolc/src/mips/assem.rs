use std::fmt::{self, Display};

use strum_macros::Display;

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    #[strum(serialize = "$zero")]
    Zero,
    /// Accumulator: every lowered expression leaves its object here.
    #[strum(serialize = "$a0")]
    A0,
    /// Write-barrier address argument.
    #[strum(serialize = "$a1")]
    A1,
    #[strum(serialize = "$t1")]
    T1,
    #[strum(serialize = "$t2")]
    T2,
    #[strum(serialize = "$t3")]
    T3,
    #[strum(serialize = "$t4")]
    T4,
    #[strum(serialize = "$t5")]
    T5,
    #[strum(serialize = "$t6")]
    T6,
    /// Holds `self` for the whole method body.
    #[strum(serialize = "$s0")]
    S0,
    #[strum(serialize = "$sp")]
    Sp,
    #[strum(serialize = "$fp")]
    Fp,
    #[strum(serialize = "$ra")]
    Ra,
}

/// Registers handed out for unboxed values, round robin.
pub const SCRATCH: &[Reg] = &[Reg::T2, Reg::T3, Reg::T4, Reg::T5, Reg::T6];

/// A raw word: in a register or small enough to ride in the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(i32),
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Imm(i) => write!(f, "{}", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Label(String),
    La(Reg, String),
    Li(Reg, i32),
    /// `lw dst offset(base)`
    Lw(Reg, i32, Reg),
    /// `sw src offset(base)`
    Sw(Reg, i32, Reg),
    Move(Reg, Reg),
    Addiu(Reg, Reg, i32),
    Addu(Reg, Reg, Reg),
    Sll(Reg, Reg, u8),
    /// Three-operand arithmetic: `add`, `sub`, `mul`, `div`.
    Arith(&'static str, Reg, Reg, Operand),
    Neg(Reg, Reg),
    /// Conditional branch: `beq`, `blt`, `ble`, `bgt`.
    Branch(&'static str, Reg, Operand, String),
    B(String),
    Jal(String),
    Jalr(Reg),
    Jr(Reg),
}

impl Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Label(l) => write!(f, "{}:", l),
            Instr::La(r, l) => write!(f, "\tla\t{} {}", r, l),
            Instr::Li(r, i) => write!(f, "\tli\t{} {}", r, i),
            Instr::Lw(r, off, base) => write!(f, "\tlw\t{} {}({})", r, off, base),
            Instr::Sw(r, off, base) => write!(f, "\tsw\t{} {}({})", r, off, base),
            Instr::Move(d, s) => write!(f, "\tmove\t{} {}", d, s),
            Instr::Addiu(d, s, i) => write!(f, "\taddiu\t{} {} {}", d, s, i),
            Instr::Addu(d, a, b) => write!(f, "\taddu\t{} {} {}", d, a, b),
            Instr::Sll(d, s, n) => write!(f, "\tsll\t{} {} {}", d, s, n),
            Instr::Arith(op, d, a, b) => write!(f, "\t{}\t{} {} {}", op, d, a, b),
            Instr::Neg(d, s) => write!(f, "\tneg\t{} {}", d, s),
            Instr::Branch(op, a, b, l) => write!(f, "\t{}\t{} {} {}", op, a, b, l),
            Instr::B(l) => write!(f, "\tb\t{}", l),
            Instr::Jal(l) => write!(f, "\tjal\t{}", l),
            Instr::Jalr(r) => write!(f, "\tjalr\t{}", r),
            Instr::Jr(r) => write!(f, "\tjr\t{}", r),
        }
    }
}
