//! SPIM-flavoured MIPS assembly backend.
//!
//! Accumulator discipline: every lowered expression leaves its object pointer
//! in `$a0`, `self` lives in `$s0`, and anything that has to outlive another
//! evaluation is pushed on the stack. Unboxed words go to scratch registers.

pub mod assem;
pub mod data;
pub mod frame;

use std::fmt::Write;

use strum_macros::Display;

use crate::{
    basic::{NativeKind, INT, MAIN, MAIN_METHOD, STRING, BOOL},
    codegen::{AbortKind, ArithOp, Relop, TargetOps},
    data::{class_init, class_proto, Const, ConstPool, CLASS_OBJ_TAB},
    int_types::CoolInt,
    layout::{ClassTable, Klass},
    temp::{Label, Uuids, UuidsImpl},
};

use assem::{Instr, Operand, Reg, SCRATCH};
use data::DataSection;
use frame::{field_offset, Frame, DISPATCH_TABLE_OFFSET, TAG_OFFSET, WORD_SIZE};

/// Entry points provided by the companion runtime and collector.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    #[strum(serialize = "Object.copy")]
    ObjectCopy,
    #[strum(serialize = "equality_test")]
    EqualityTest,
    #[strum(serialize = "_case_abort")]
    CaseAbort,
    #[strum(serialize = "_case_abort2")]
    CaseAbort2,
    #[strum(serialize = "_dispatch_abort")]
    DispatchAbort,
    #[strum(serialize = "_GenGC_Assign")]
    GenGcAssign,
    #[strum(serialize = "_GenGC_Init")]
    GenGcInit,
    #[strum(serialize = "_GenGC_Collect")]
    GenGcCollect,
}

impl From<AbortKind> for Runtime {
    fn from(kind: AbortKind) -> Self {
        match kind {
            AbortKind::CaseNoMatch => Runtime::CaseAbort,
            AbortKind::CaseOnVoid => Runtime::CaseAbort2,
            AbortKind::DispatchOnVoid => Runtime::DispatchAbort,
        }
    }
}

/// Raw ints are one 32-bit word on this target.
pub fn raw_word(v: CoolInt) -> i32 {
    match i32::try_from(v) {
        Ok(w) => w,
        Err(_) => panic!("impl bug: {} does not fit in a machine word", v),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot(i32);

/// A pushed value, identified by its stack slot.
#[derive(Debug)]
pub struct Pushed(i32);

#[derive(Debug, Default, Clone, Copy)]
pub struct MipsOptions {
    /// Sets `_MemMgr_TEST` so the collector runs at every allocation.
    pub gc_test: bool,
}

pub struct MipsTarget {
    gen: UuidsImpl,
    text: Vec<Instr>,
    frame: Option<Frame>,
    next_scratch: usize,
    options: MipsOptions,
}

impl MipsTarget {
    pub fn new(options: MipsOptions) -> Self {
        MipsTarget {
            gen: UuidsImpl::new(),
            text: vec![],
            frame: None,
            next_scratch: 0,
            options,
        }
    }

    fn emit(&mut self, instr: Instr) {
        self.text.push(instr);
    }

    fn frame(&mut self) -> &mut Frame {
        match self.frame.as_mut() {
            Some(f) => f,
            None => panic!("impl bug: code emitted outside of a method"),
        }
    }

    fn scratch(&mut self) -> Reg {
        let r = SCRATCH[self.next_scratch % SCRATCH.len()];
        self.next_scratch += 1;
        r
    }

    fn label(&self, l: &Label) -> String {
        l.to_string()
    }

    fn into_acc(&mut self, v: Reg) {
        if v != Reg::A0 {
            self.emit(Instr::Move(Reg::A0, v));
        }
    }

    fn in_reg(&mut self, raw: Operand) -> Reg {
        match raw {
            Operand::Reg(r) => r,
            Operand::Imm(i) => {
                let r = self.scratch();
                self.emit(Instr::Li(r, i));
                r
            }
        }
    }

    fn push(&mut self, r: Reg) -> i32 {
        let mut out = vec![];
        let slot = self.frame().push(r, &mut out);
        self.text.append(&mut out);
        slot
    }

    fn pop(&mut self, into: Reg, slot: i32) {
        let mut out = vec![];
        self.frame().pop(into, slot, &mut out);
        self.text.append(&mut out);
    }

    /// The callee pops its own arguments; they must be the most recent pushes.
    fn after_call(&mut self, args: Vec<Pushed>) {
        let n = args.len();
        if let Some(first) = args.first() {
            let top = self.frame().sp_offset();
            assert_eq!(
                top + WORD_SIZE * n as i32,
                first.0,
                "impl bug: arguments are not on top of the stack"
            );
        }
        self.frame().callee_popped(n);
    }

    fn call_runtime(&mut self, routine: Runtime) {
        self.emit(Instr::Jal(routine.to_string()));
    }
}

impl TargetOps for MipsTarget {
    type Value = Reg;
    type Raw = Operand;
    type Local = Slot;
    type Saved = Pushed;
    type Block = Label;
    type Arm = ();

    fn begin_function(&mut self, label: &str, formals: usize) {
        self.emit(Instr::Label(label.to_string()));
        let frame = Frame::new(formals);
        self.text.extend(frame.prologue());
        self.frame = Some(frame);
        self.next_scratch = 0;
    }

    fn formal(&mut self, index: usize, _count: usize) -> Slot {
        Slot(self.frame().formal_offset(index))
    }

    fn end_function(&mut self, result: Reg, formals: usize) {
        self.into_acc(result);
        let frame = match self.frame.take() {
            Some(f) => f,
            None => panic!("impl bug: end_function without begin_function"),
        };
        assert_eq!(formals, frame.formals, "impl bug: formal count changed");
        self.text.extend(frame.epilogue());
    }

    fn self_object(&mut self) -> Reg {
        Reg::S0
    }

    fn void_value(&mut self) -> Reg {
        Reg::Zero
    }

    fn constant(&mut self, c: Const) -> Reg {
        self.emit(Instr::La(Reg::A0, c.label()));
        Reg::A0
    }

    fn alloc_local(&mut self, init: Reg) -> Slot {
        Slot(self.push(init))
    }

    fn free_local(&mut self, local: Slot) {
        let mut out = vec![];
        self.frame().discard(local.0, &mut out);
        self.text.append(&mut out);
    }

    fn load_local(&mut self, local: &Slot) -> Reg {
        self.emit(Instr::Lw(Reg::A0, local.0, Reg::Fp));
        Reg::A0
    }

    fn store_local(&mut self, local: &Slot, v: Reg) {
        self.emit(Instr::Sw(v, local.0, Reg::Fp));
    }

    fn load_field(&mut self, obj: Reg, _klass: &Klass, slot: usize) -> Reg {
        self.emit(Instr::Lw(Reg::A0, field_offset(slot), obj));
        Reg::A0
    }

    fn store_field(&mut self, obj: Reg, _klass: &Klass, slot: usize, v: Reg) {
        self.emit(Instr::Sw(v, field_offset(slot), obj));
    }

    fn store_native_default(&mut self, obj: Reg, _klass: &Klass, slot: usize, _kind: NativeKind) {
        self.emit(Instr::Sw(Reg::Zero, field_offset(slot), obj));
    }

    fn write_barrier(&mut self, obj: Reg, _klass: &Klass, slot: usize) {
        self.emit(Instr::Addiu(Reg::A1, obj, field_offset(slot)));
        self.call_runtime(Runtime::GenGcAssign);
    }

    fn preserve(&mut self, v: Reg) -> Pushed {
        Pushed(self.push(v))
    }

    fn restore(&mut self, saved: Pushed) -> Reg {
        self.pop(Reg::T1, saved.0);
        Reg::T1
    }

    fn unbox(&mut self, v: Reg, klass: &Klass) -> Operand {
        let r = self.scratch();
        let slot = klass.own_fields_start;
        self.emit(Instr::Lw(r, field_offset(slot), v));
        Operand::Reg(r)
    }

    /// The raw word rides through `Object.copy` in `$t5`, never on the stack,
    /// since the collector treats every stack word as a root.
    fn box_int(&mut self, raw: Operand, int: &Klass) -> Reg {
        match raw {
            Operand::Reg(Reg::T5) => {}
            Operand::Reg(r) => self.emit(Instr::Move(Reg::T5, r)),
            Operand::Imm(i) => self.emit(Instr::Li(Reg::T5, i)),
        }
        self.emit(Instr::La(Reg::A0, class_proto(&int.name)));
        self.call_runtime(Runtime::ObjectCopy);
        // the copy is unreachable from anywhere else yet, so no barrier.
        self.emit(Instr::Sw(Reg::T5, field_offset(int.own_fields_start), Reg::A0));
        Reg::A0
    }

    fn raw_const(&mut self, v: CoolInt) -> Operand {
        Operand::Imm(raw_word(v))
    }

    fn arith(&mut self, op: ArithOp, a: Operand, b: Operand) -> Operand {
        let a = self.in_reg(a);
        let d = self.scratch();
        let mnemonic = match op {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
        };
        self.emit(Instr::Arith(mnemonic, d, a, b));
        Operand::Reg(d)
    }

    fn negate(&mut self, a: Operand) -> Operand {
        let a = self.in_reg(a);
        let d = self.scratch();
        self.emit(Instr::Neg(d, a));
        Operand::Reg(d)
    }

    fn load_tag(&mut self, obj: Reg) -> Operand {
        let r = self.scratch();
        self.emit(Instr::Lw(r, TAG_OFFSET, obj));
        Operand::Reg(r)
    }

    fn new_block(&mut self, hint: &'static str) -> Label {
        self.gen.new_block_label(hint)
    }

    fn switch_to(&mut self, block: &Label) {
        let l = self.label(block);
        self.emit(Instr::Label(l));
    }

    fn jump(&mut self, block: &Label) {
        let l = self.label(block);
        self.emit(Instr::B(l));
    }

    fn branch_raw(&mut self, op: Relop, a: Operand, b: Operand, t: &Label, f: &Label) {
        let a = self.in_reg(a);
        let mnemonic = match op {
            Relop::Eq => "beq",
            Relop::Lt => "blt",
            Relop::Le => "ble",
            Relop::Gt => "bgt",
        };
        let (t, f) = (self.label(t), self.label(f));
        self.emit(Instr::Branch(mnemonic, a, b, t));
        self.emit(Instr::B(f));
    }

    fn branch_void(&mut self, v: Reg, void: &Label, non_void: &Label) {
        self.branch_raw(Relop::Eq, Operand::Reg(v), Operand::Reg(Reg::Zero), void, non_void);
    }

    fn branch_same(&mut self, a: Reg, b: Reg, same: &Label, differ: &Label) {
        self.branch_raw(Relop::Eq, Operand::Reg(a), Operand::Reg(b), same, differ);
    }

    fn finish_arm(&mut self, v: Reg, join: &Label) {
        self.into_acc(v);
        self.jump(join);
    }

    fn merge(&mut self, _arms: Vec<()>, join: &Label) -> Reg {
        self.switch_to(join);
        Reg::A0
    }

    fn allocate(&mut self, klass: &Klass) -> Reg {
        self.emit(Instr::La(Reg::A0, class_proto(&klass.name)));
        self.call_runtime(Runtime::ObjectCopy);
        Reg::A0
    }

    fn call_init(&mut self, klass: &Klass, obj: Reg) -> Reg {
        self.into_acc(obj);
        self.emit(Instr::Jal(class_init(&klass.name)));
        Reg::A0
    }

    /// `class_objTab` holds a (prototype, initializer) pair per tag.
    fn new_self_type(&mut self) -> Reg {
        self.emit(Instr::La(Reg::T1, CLASS_OBJ_TAB.to_string()));
        self.emit(Instr::Lw(Reg::T2, TAG_OFFSET, Reg::S0));
        self.emit(Instr::Sll(Reg::T2, Reg::T2, 3));
        self.emit(Instr::Addu(Reg::T1, Reg::T1, Reg::T2));
        let entry = self.push(Reg::T1);
        self.emit(Instr::Lw(Reg::A0, 0, Reg::T1));
        self.call_runtime(Runtime::ObjectCopy);
        self.emit(Instr::Lw(Reg::T1, WORD_SIZE, Reg::Sp));
        self.emit(Instr::Lw(Reg::T1, WORD_SIZE, Reg::T1));
        self.emit(Instr::Jalr(Reg::T1));
        let mut out = vec![];
        self.frame().discard(entry, &mut out);
        self.text.append(&mut out);
        Reg::A0
    }

    /// `equality_test` compares `$t1` and `$t2` and answers with `$a0` or `$a1`.
    fn call_equals(&mut self, a: Reg, b: Reg) -> Operand {
        assert_ne!(Reg::T2, a, "impl bug: equality operand would be clobbered");
        if b != Reg::T2 {
            self.emit(Instr::Move(Reg::T2, b));
        }
        if a != Reg::T1 {
            self.emit(Instr::Move(Reg::T1, a));
        }
        self.emit(Instr::La(Reg::A0, Const::Bool(true).label()));
        self.emit(Instr::La(Reg::A1, Const::Bool(false).label()));
        self.call_runtime(Runtime::EqualityTest);
        let r = self.scratch();
        self.emit(Instr::Lw(r, field_offset(0), Reg::A0));
        Operand::Reg(r)
    }

    fn call_direct(&mut self, label: &str, recv: Reg, args: Vec<Pushed>) -> Reg {
        self.into_acc(recv);
        self.emit(Instr::Jal(label.to_string()));
        self.after_call(args);
        Reg::A0
    }

    fn call_dynamic(&mut self, recv: Reg, _klass: &Klass, slot: usize, args: Vec<Pushed>) -> Reg {
        self.into_acc(recv);
        self.emit(Instr::Lw(Reg::T1, DISPATCH_TABLE_OFFSET, Reg::A0));
        self.emit(Instr::Lw(Reg::T1, WORD_SIZE * slot as i32, Reg::T1));
        self.emit(Instr::Jalr(Reg::T1));
        self.after_call(args);
        Reg::A0
    }

    fn abort(&mut self, kind: AbortKind, file: Const, line: usize) {
        self.emit(Instr::La(Reg::A0, file.label()));
        self.emit(Instr::Li(Reg::T1, line as i32));
        self.call_runtime(kind.into());
    }

    fn finish(self, classes: &ClassTable, pool: &mut ConstPool) -> String {
        assert!(self.frame.is_none(), "impl bug: unterminated method");
        let mut out = DataSection::new(classes, self.options.gc_test).emit(pool);
        out.push_str("\t.text\n");
        for sym in [
            class_init(MAIN),
            class_init(INT),
            class_init(STRING),
            class_init(BOOL),
            format!("{}.{}", MAIN, MAIN_METHOD),
        ] {
            let _ = writeln!(out, "\t.globl\t{}", sym);
        }
        for instr in &self.text {
            let _ = writeln!(out, "{}", instr);
        }
        tracing::debug!(instructions = self.text.len(), "assembly text done");
        out
    }
}
