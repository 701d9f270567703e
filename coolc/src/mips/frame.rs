//! Activation record layout.
//!
//! ```text
//!   fp + 4n ... fp + 4   arguments, first argument highest
//!   fp                   caller's fp
//!   fp - 4               caller's s0
//!   fp - 8               return address
//!   fp - 12 ...          locals and saved temporaries, pushed downwards
//! ```
//!
//! `sp` always points at the next free word. The callee pops its arguments
//! in the epilogue.

use super::assem::{Instr, Reg};

pub const WORD_SIZE: i32 = 4;

pub const TAG_OFFSET: i32 = 0;
pub const DISPATCH_TABLE_OFFSET: i32 = 8;
pub const HEADER_SIZE: i32 = 3 * WORD_SIZE;

/// Space for the saved fp, s0 and ra.
const SAVED_AREA: i32 = 3 * WORD_SIZE;

pub fn field_offset(slot: usize) -> i32 {
    HEADER_SIZE + WORD_SIZE * slot as i32
}

#[derive(Debug)]
pub struct Frame {
    pub formals: usize,
    /// `sp - fp`; tracked at compile time so every slot has a fixed fp offset.
    sp_offset: i32,
}

impl Frame {
    pub fn new(formals: usize) -> Self {
        Frame {
            formals,
            sp_offset: -SAVED_AREA,
        }
    }

    pub fn formal_offset(&self, index: usize) -> i32 {
        assert!(index < self.formals, "impl bug: formal {} out of range", index);
        WORD_SIZE * (self.formals - index) as i32
    }

    pub fn sp_offset(&self) -> i32 {
        self.sp_offset
    }

    /// Stores `r` in the next free word; returns that word's fp offset.
    pub fn push(&mut self, r: Reg, out: &mut Vec<Instr>) -> i32 {
        let slot = self.sp_offset;
        out.push(Instr::Sw(r, 0, Reg::Sp));
        out.push(Instr::Addiu(Reg::Sp, Reg::Sp, -WORD_SIZE));
        self.sp_offset -= WORD_SIZE;
        slot
    }

    pub fn pop(&mut self, into: Reg, slot: i32, out: &mut Vec<Instr>) {
        self.check_top(slot);
        out.push(Instr::Lw(into, WORD_SIZE, Reg::Sp));
        out.push(Instr::Addiu(Reg::Sp, Reg::Sp, WORD_SIZE));
        self.sp_offset += WORD_SIZE;
    }

    pub fn discard(&mut self, slot: i32, out: &mut Vec<Instr>) {
        self.check_top(slot);
        out.push(Instr::Addiu(Reg::Sp, Reg::Sp, WORD_SIZE));
        self.sp_offset += WORD_SIZE;
    }

    /// A callee popped `n` argument words that this frame pushed.
    pub fn callee_popped(&mut self, n: usize) {
        self.sp_offset += WORD_SIZE * n as i32;
        assert!(
            self.sp_offset <= -SAVED_AREA,
            "impl bug: callee popped more than was pushed"
        );
    }

    fn check_top(&self, slot: i32) {
        assert_eq!(
            slot,
            self.sp_offset + WORD_SIZE,
            "impl bug: stack slots released out of order"
        );
    }

    pub fn prologue(&self) -> Vec<Instr> {
        vec![
            Instr::Addiu(Reg::Sp, Reg::Sp, -SAVED_AREA),
            Instr::Sw(Reg::Fp, 12, Reg::Sp),
            Instr::Sw(Reg::S0, 8, Reg::Sp),
            Instr::Sw(Reg::Ra, 4, Reg::Sp),
            Instr::Addiu(Reg::Fp, Reg::Sp, SAVED_AREA),
            Instr::Move(Reg::S0, Reg::A0),
        ]
    }

    /// Restores the caller's registers and pops the saved area and arguments.
    pub fn epilogue(&self) -> Vec<Instr> {
        assert_eq!(
            -SAVED_AREA,
            self.sp_offset,
            "impl bug: stack not balanced at method exit"
        );
        vec![
            Instr::Lw(Reg::Ra, 4, Reg::Sp),
            Instr::Lw(Reg::S0, 8, Reg::Sp),
            Instr::Lw(Reg::Fp, 12, Reg::Sp),
            Instr::Addiu(
                Reg::Sp,
                Reg::Sp,
                SAVED_AREA + WORD_SIZE * self.formals as i32,
            ),
            Instr::Jr(Reg::Ra),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formals_sit_above_the_frame_pointer() {
        let f = Frame::new(3);
        assert_eq!(12, f.formal_offset(0));
        assert_eq!(4, f.formal_offset(2));
        assert_eq!(16, field_offset(1));
    }

    #[test]
    fn pushes_get_decreasing_fp_offsets() {
        let mut f = Frame::new(0);
        let mut out = vec![];
        let a = f.push(Reg::A0, &mut out);
        let b = f.push(Reg::A0, &mut out);
        assert_eq!((-12, -16), (a, b));
        f.pop(Reg::T1, b, &mut out);
        f.discard(a, &mut out);
        assert_eq!(-12, f.sp_offset());
        assert_eq!(Instr::Addiu(Reg::Sp, Reg::Sp, 12), f.epilogue()[3]);
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn releasing_a_buried_slot_is_a_bug() {
        let mut f = Frame::new(0);
        let mut out = vec![];
        let a = f.push(Reg::A0, &mut out);
        f.push(Reg::A0, &mut out);
        f.discard(a, &mut out);
    }
}
