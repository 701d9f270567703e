//! Native backend: textual LLVM IR with opaque pointers, handed to `llc`.
//!
//! Objects are `ptr`, unboxed words are `i64`. Every named value is an SSA
//! temporary, so `preserve`/`restore` are free and join points use `phi`.

pub mod data;
pub mod ir;

use itertools::Itertools;
use strum_macros::Display;

use crate::{
    basic::{NativeKind, OBJECT},
    codegen::{AbortKind, ArithOp, Relop, TargetOps},
    data::{class_disp_tab, class_init, class_struct, Const, ConstPool, CLASS_OBJ_TAB},
    int_types::CoolInt,
    layout::{ClassTable, Klass},
    temp::{Label, Uuids, UuidsImpl},
};

use data::{field_index, object_size, ModuleData, CLASS_OBJ_TYPE};
use ir::FunctionBuilder;

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    #[strum(serialize = "_gc_alloc")]
    GcAlloc,
    #[strum(serialize = "_equals")]
    Equals,
    #[strum(serialize = "_gc_write_barrier")]
    WriteBarrier,
    #[strum(serialize = "_case_abort")]
    CaseAbort,
    #[strum(serialize = "_case_abort2")]
    CaseAbort2,
    #[strum(serialize = "_dispatch_abort")]
    DispatchAbort,
}

impl Runtime {
    pub const ALL: [Runtime; 6] = [
        Runtime::GcAlloc,
        Runtime::Equals,
        Runtime::WriteBarrier,
        Runtime::CaseAbort,
        Runtime::CaseAbort2,
        Runtime::DispatchAbort,
    ];

    pub fn declaration(&self) -> String {
        match self {
            Runtime::GcAlloc => format!("declare ptr @{}(i64, i64, ptr)", self),
            Runtime::Equals => format!("declare i64 @{}(ptr, ptr)", self),
            Runtime::WriteBarrier => format!("declare void @{}(ptr)", self),
            Runtime::CaseAbort | Runtime::CaseAbort2 | Runtime::DispatchAbort => {
                format!("declare void @{}(ptr, i64) noreturn", self)
            }
        }
    }
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

pub struct LlvmTarget {
    gen: UuidsImpl,
    source_name: String,
    function: Option<FunctionBuilder>,
    functions: Vec<String>,
}

impl LlvmTarget {
    pub fn new(source_name: &str) -> Self {
        LlvmTarget {
            gen: UuidsImpl::new(),
            source_name: source_name.to_string(),
            function: None,
            functions: vec![],
        }
    }

    fn f(&mut self) -> &mut FunctionBuilder {
        match self.function.as_mut() {
            Some(f) => f,
            None => panic!("impl bug: code emitted outside of a function"),
        }
    }

    fn temp(&mut self) -> String {
        format!("%{}", self.gen.new_temp())
    }

    fn emit(&mut self, instr: String) {
        self.f().emit(instr);
    }

    /// `%t = <rhs>`
    fn assign(&mut self, rhs: String) -> String {
        let t = self.temp();
        self.emit(format!("{} = {}", t, rhs));
        t
    }

    fn label(&self, l: &Label) -> String {
        l.to_string()
    }

    fn field_ptr(&mut self, obj: &str, klass: &Klass, slot: usize) -> String {
        self.assign(format!(
            "getelementptr {}, ptr {}, i32 0, i32 {}",
            class_struct(&klass.name),
            obj,
            field_index(slot)
        ))
    }

    fn header_ptr(&mut self, obj: &str, index: usize) -> String {
        self.assign(format!(
            "getelementptr {}, ptr {}, i32 0, i32 {}",
            class_struct(OBJECT),
            obj,
            index
        ))
    }

    fn call_args(recv: &str, args: &[String]) -> String {
        std::iter::once(format!("ptr {}", recv))
            .chain(args.iter().map(|a| format!("ptr {}", a)))
            .join(", ")
    }
}

impl TargetOps for LlvmTarget {
    type Value = String;
    type Raw = String;
    type Local = String;
    type Saved = String;
    type Block = Label;
    /// Incoming value and the block it comes from.
    type Arm = (String, String);

    fn begin_function(&mut self, label: &str, formals: usize) {
        let params = std::iter::once("ptr %self".to_string())
            .chain((0..formals).map(|i| format!("ptr %arg{}", i)))
            .join(", ");
        self.function = Some(FunctionBuilder::new(format!("ptr @{}({})", label, params)));
    }

    /// Copies the incoming argument into a slot so the body may assign it.
    fn formal(&mut self, index: usize, _count: usize) -> String {
        let slot = self.temp();
        self.f().alloca(&slot);
        self.emit(format!("store ptr %arg{}, ptr {}", index, slot));
        slot
    }

    fn end_function(&mut self, result: String, _formals: usize) {
        self.f().terminate(format!("ret ptr {}", result));
        match self.function.take() {
            Some(f) => self.functions.push(f.render()),
            None => panic!("impl bug: end_function without begin_function"),
        }
    }

    fn self_object(&mut self) -> String {
        "%self".to_string()
    }

    fn void_value(&mut self) -> String {
        "null".to_string()
    }

    fn constant(&mut self, c: Const) -> String {
        format!("@{}", c.label())
    }

    fn alloc_local(&mut self, init: String) -> String {
        let slot = self.temp();
        self.f().alloca(&slot);
        self.emit(format!("store ptr {}, ptr {}", init, slot));
        slot
    }

    fn free_local(&mut self, _local: String) {}

    fn load_local(&mut self, local: &String) -> String {
        self.assign(format!("load ptr, ptr {}", local))
    }

    fn store_local(&mut self, local: &String, v: String) {
        self.emit(format!("store ptr {}, ptr {}", v, local));
    }

    fn load_field(&mut self, obj: String, klass: &Klass, slot: usize) -> String {
        let p = self.field_ptr(&obj, klass, slot);
        self.assign(format!("load ptr, ptr {}", p))
    }

    fn store_field(&mut self, obj: String, klass: &Klass, slot: usize, v: String) {
        let p = self.field_ptr(&obj, klass, slot);
        self.emit(format!("store ptr {}, ptr {}", v, p));
    }

    fn store_native_default(&mut self, obj: String, klass: &Klass, slot: usize, kind: NativeKind) {
        let p = self.field_ptr(&obj, klass, slot);
        let zero = match kind {
            NativeKind::Int | NativeKind::Bool => "i64 0",
            NativeKind::Str => "ptr null",
        };
        self.emit(format!("store {}, ptr {}", zero, p));
    }

    fn write_barrier(&mut self, obj: String, klass: &Klass, slot: usize) {
        let p = self.field_ptr(&obj, klass, slot);
        self.emit(format!("call void @{}(ptr {})", Runtime::WriteBarrier, p));
    }

    fn preserve(&mut self, v: String) -> String {
        v
    }

    fn restore(&mut self, saved: String) -> String {
        saved
    }

    fn unbox(&mut self, v: String, klass: &Klass) -> String {
        let p = self.field_ptr(&v, klass, klass.own_fields_start);
        self.assign(format!("load i64, ptr {}", p))
    }

    fn box_int(&mut self, raw: String, int: &Klass) -> String {
        let obj = self.allocate(int);
        let p = self.field_ptr(&obj, int, int.own_fields_start);
        self.emit(format!("store i64 {}, ptr {}", raw, p));
        obj
    }

    fn raw_const(&mut self, v: CoolInt) -> String {
        v.to_string()
    }

    fn arith(&mut self, op: ArithOp, a: String, b: String) -> String {
        let opcode = match op {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "sdiv",
        };
        self.assign(format!("{} i64 {}, {}", opcode, a, b))
    }

    fn negate(&mut self, a: String) -> String {
        self.assign(format!("sub i64 0, {}", a))
    }

    fn load_tag(&mut self, obj: String) -> String {
        let p = self.header_ptr(&obj, 0);
        self.assign(format!("load i64, ptr {}", p))
    }

    fn new_block(&mut self, hint: &'static str) -> Label {
        self.gen.new_block_label(hint)
    }

    fn switch_to(&mut self, block: &Label) {
        let l = self.label(block);
        self.f().start_block(l);
    }

    fn jump(&mut self, block: &Label) {
        let l = self.label(block);
        self.f().terminate(format!("br label %{}", l));
    }

    fn branch_raw(&mut self, op: Relop, a: String, b: String, t: &Label, f: &Label) {
        let cond = match op {
            Relop::Eq => "eq",
            Relop::Lt => "slt",
            Relop::Le => "sle",
            Relop::Gt => "sgt",
        };
        let c = self.assign(format!("icmp {} i64 {}, {}", cond, a, b));
        self.branch(c, t, f);
    }

    fn branch_void(&mut self, v: String, void: &Label, non_void: &Label) {
        let c = self.assign(format!("icmp eq ptr {}, null", v));
        self.branch(c, void, non_void);
    }

    fn branch_same(&mut self, a: String, b: String, same: &Label, differ: &Label) {
        let c = self.assign(format!("icmp eq ptr {}, {}", a, b));
        self.branch(c, same, differ);
    }

    fn finish_arm(&mut self, v: String, join: &Label) -> (String, String) {
        let from = self.f().current_label().to_string();
        self.jump(join);
        (v, from)
    }

    fn merge(&mut self, arms: Vec<(String, String)>, join: &Label) -> String {
        self.switch_to(join);
        if arms.is_empty() {
            return self.void_value();
        }
        let incoming = arms
            .iter()
            .map(|(v, from)| format!("[ {}, %{} ]", v, from))
            .join(", ");
        self.assign(format!("phi ptr {}", incoming))
    }

    fn allocate(&mut self, klass: &Klass) -> String {
        self.assign(format!(
            "call ptr @{}(i64 {}, i64 {}, ptr @{})",
            Runtime::GcAlloc,
            klass.tag,
            object_size(klass),
            class_disp_tab(&klass.name)
        ))
    }

    fn call_init(&mut self, klass: &Klass, obj: String) -> String {
        self.assign(format!("call ptr @{}(ptr {})", class_init(&klass.name), obj))
    }

    fn new_self_type(&mut self) -> String {
        let tag = self.load_tag("%self".to_string());
        let entry = self.assign(format!(
            "getelementptr {}, ptr @{}, i64 {}",
            CLASS_OBJ_TYPE, CLASS_OBJ_TAB, tag
        ));
        let mut fields = vec![];
        for (i, ty) in [(1, "i64"), (2, "ptr"), (3, "ptr")] {
            let p = self.assign(format!(
                "getelementptr {}, ptr {}, i32 0, i32 {}",
                CLASS_OBJ_TYPE, entry, i
            ));
            fields.push(self.assign(format!("load {}, ptr {}", ty, p)));
        }
        let obj = self.assign(format!(
            "call ptr @{}(i64 {}, i64 {}, ptr {})",
            Runtime::GcAlloc,
            tag,
            fields[0],
            fields[1]
        ));
        self.assign(format!("call ptr {}(ptr {})", fields[2], obj))
    }

    fn call_equals(&mut self, a: String, b: String) -> String {
        self.assign(format!("call i64 @{}(ptr {}, ptr {})", Runtime::Equals, a, b))
    }

    fn call_direct(&mut self, label: &str, recv: String, args: Vec<String>) -> String {
        let args = Self::call_args(&recv, &args);
        self.assign(format!("call ptr @{}({})", label, args))
    }

    fn call_dynamic(&mut self, recv: String, _klass: &Klass, slot: usize, args: Vec<String>) -> String {
        let disp_ptr = self.header_ptr(&recv, 2);
        let disp = self.assign(format!("load ptr, ptr {}", disp_ptr));
        let entry = self.assign(format!("getelementptr ptr, ptr {}, i64 {}", disp, slot));
        let method = self.assign(format!("load ptr, ptr {}", entry));
        let args = Self::call_args(&recv, &args);
        self.assign(format!("call ptr {}({})", method, args))
    }

    fn abort(&mut self, kind: AbortKind, file: Const, line: usize) {
        let routine: Runtime = kind.into();
        self.emit(format!(
            "call void @{}(ptr @{}, i64 {})",
            routine,
            file.label(),
            line
        ));
        self.f().terminate("unreachable".to_string());
    }

    fn finish(self, classes: &ClassTable, pool: &mut ConstPool) -> String {
        assert!(self.function.is_none(), "impl bug: unterminated function");
        let module = ModuleData::new(classes, &self.source_name);
        let mut out = module.emit(pool);
        for f in &self.functions {
            out.push_str(f);
            out.push('\n');
        }
        out.push_str(&module.entry_point());
        tracing::debug!(functions = self.functions.len(), "llvm module done");
        out
    }
}

impl LlvmTarget {
    fn branch(&mut self, cond: String, t: &Label, f: &Label) {
        let (t, f) = (self.label(t), self.label(f));
        self.f()
            .terminate(format!("br i1 {}, label %{}, label %{}", cond, t, f));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{helpers::*, BinOp, ExprKind, Feature, Program},
        basic, codegen,
    };

    fn generate(features: Vec<Feature>) -> String {
        let mut p = Program {
            classes: vec![class("Main", "IO", features)],
        };
        basic::install(&mut p);
        let classes = ClassTable::build(&p);
        codegen::generate(&classes, LlvmTarget::new("main.cl"))
    }

    fn body_of<'t>(text: &'t str, name: &str) -> &'t str {
        let start = match text.find(&format!("@{}(", name)) {
            Some(i) => i,
            None => panic!("no function {}", name),
        };
        let end = start + text[start..].find("\n}\n").unwrap();
        &text[start..end]
    }

    #[test]
    fn runtime_declarations() {
        assert_eq!(
            "declare void @_dispatch_abort(ptr, i64) noreturn",
            Runtime::from(AbortKind::DispatchOnVoid).declaration()
        );
        assert_eq!("declare ptr @_gc_alloc(i64, i64, ptr)", Runtime::GcAlloc.declaration());
    }

    #[test]
    fn conditional_joins_with_phi() {
        let text = generate(vec![method(
            "main",
            &[],
            "Int",
            if_then_else(boolean(true), int(1), int(2), "Int"),
        )]);
        let main = body_of(&text, "Main.main");
        assert!(main.contains("icmp eq i64"));
        assert!(main.contains("phi ptr [ @int_const"));
        assert!(main.contains("ret ptr %t"));
    }

    #[test]
    fn abort_paths_end_in_unreachable() {
        let receiver = expr(ExprKind::Object("o".into()), "Object", 4);
        let text = generate(vec![method(
            "main",
            &[],
            "String",
            let_in(
                "o",
                "Object",
                None,
                dispatch(receiver, "type_name", vec![], "String", 4),
            ),
        )]);
        let main = body_of(&text, "Main.main");
        assert!(main.contains(", i64 4)\n  unreachable\n"));
        // the let slot is hoisted into the entry block.
        let entry = &main[main.find("entry:").unwrap()..];
        assert!(entry.starts_with("entry:\n  %t"));
        assert!(entry.contains(" = alloca ptr\n"));
    }

    #[test]
    fn module_ends_with_entry_point() {
        let text = generate(vec![method("main", &[], "Int", binary(BinOp::Minus, int(3), int(1)))]);
        assert!(text.contains("define ptr @Main.main(ptr %self)"));
        assert!(text.contains("sub i64 "));
        assert!(text.contains("declare ptr @IO.out_string(ptr, ptr)"));
        assert!(text.contains("call ptr @Main_init(ptr %obj)"));
        assert!(text.trim_end().ends_with("ret i32 0\n}"));
    }
}
