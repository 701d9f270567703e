//! Backend-independent code generation.
//!
//! `TargetOps` is the small set of operations a backend supplies; the class
//! driver here and the expression lowering in `expr` are written once against
//! it. A backend value is only guaranteed to stay valid until the next
//! operation that may clobber it, so anything that must survive the
//! evaluation of another expression goes through `preserve`/`restore`.

pub mod expr;

use std::fmt::Debug;

use strum_macros::Display;

use crate::{
    ast::SELF,
    basic::NativeKind,
    data::{class_init, Const, ConstPool},
    int_types::CoolInt,
    layout::{ClassTable, Klass, Tag},
    symbol::{Interner, Symbol},
    symtab::SymbolTable,
};

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relop {
    Eq,
    Lt,
    Le,
    Gt,
}

/// The three fatal runtime errors generated code can raise. Each carries the
/// source file and line of the offending expression.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortKind {
    CaseNoMatch,
    CaseOnVoid,
    DispatchOnVoid,
}

pub trait TargetOps {
    /// An object pointer.
    type Value: Clone + Debug;
    /// An unboxed machine word.
    type Raw: Clone + Debug;
    /// A mutable stack slot holding an object pointer.
    type Local: Clone + Debug;
    /// A value kept alive across the evaluation of other expressions.
    type Saved;
    type Block: Clone + Debug;
    /// One incoming edge of a join point.
    type Arm;

    fn begin_function(&mut self, label: &str, formals: usize);
    fn formal(&mut self, index: usize, count: usize) -> Self::Local;
    fn end_function(&mut self, result: Self::Value, formals: usize);

    fn self_object(&mut self) -> Self::Value;
    fn void_value(&mut self) -> Self::Value;
    fn constant(&mut self, c: Const) -> Self::Value;

    fn alloc_local(&mut self, init: Self::Value) -> Self::Local;
    fn free_local(&mut self, local: Self::Local);
    fn load_local(&mut self, local: &Self::Local) -> Self::Value;
    fn store_local(&mut self, local: &Self::Local, v: Self::Value);

    fn load_field(&mut self, obj: Self::Value, klass: &Klass, slot: usize) -> Self::Value;
    /// A plain store. Callers pair it with `write_barrier` unless the object
    /// is still under construction by its own initializer defaults.
    fn store_field(&mut self, obj: Self::Value, klass: &Klass, slot: usize, v: Self::Value);
    fn store_native_default(&mut self, obj: Self::Value, klass: &Klass, slot: usize, kind: NativeKind);
    fn write_barrier(&mut self, obj: Self::Value, klass: &Klass, slot: usize);

    fn preserve(&mut self, v: Self::Value) -> Self::Saved;
    fn restore(&mut self, saved: Self::Saved) -> Self::Value;

    fn unbox(&mut self, v: Self::Value, klass: &Klass) -> Self::Raw;
    fn box_int(&mut self, raw: Self::Raw, int: &Klass) -> Self::Value;
    fn raw_const(&mut self, v: CoolInt) -> Self::Raw;
    fn arith(&mut self, op: ArithOp, a: Self::Raw, b: Self::Raw) -> Self::Raw;
    fn negate(&mut self, a: Self::Raw) -> Self::Raw;
    fn load_tag(&mut self, obj: Self::Value) -> Self::Raw;

    fn new_block(&mut self, hint: &'static str) -> Self::Block;
    fn switch_to(&mut self, block: &Self::Block);
    fn jump(&mut self, block: &Self::Block);
    fn branch_raw(&mut self, op: Relop, a: Self::Raw, b: Self::Raw, t: &Self::Block, f: &Self::Block);
    fn branch_void(&mut self, v: Self::Value, void: &Self::Block, non_void: &Self::Block);
    fn branch_same(&mut self, a: Self::Value, b: Self::Value, same: &Self::Block, differ: &Self::Block);
    fn finish_arm(&mut self, v: Self::Value, join: &Self::Block) -> Self::Arm;
    fn merge(&mut self, arms: Vec<Self::Arm>, join: &Self::Block) -> Self::Value;

    /// Header-initialized storage for `klass`; fields are not yet set.
    fn allocate(&mut self, klass: &Klass) -> Self::Value;
    fn call_init(&mut self, klass: &Klass, obj: Self::Value) -> Self::Value;
    fn new_self_type(&mut self) -> Self::Value;
    fn call_equals(&mut self, a: Self::Value, b: Self::Value) -> Self::Raw;
    fn call_direct(&mut self, label: &str, recv: Self::Value, args: Vec<Self::Saved>) -> Self::Value;
    fn call_dynamic(
        &mut self,
        recv: Self::Value,
        klass: &Klass,
        slot: usize,
        args: Vec<Self::Saved>,
    ) -> Self::Value;
    fn abort(&mut self, kind: AbortKind, file: Const, line: usize);

    /// Renders the whole unit: code emitted so far plus the data section.
    fn finish(self, classes: &ClassTable, pool: &mut ConstPool) -> String;
}

/// Where an identifier lives.
#[derive(Debug, Clone)]
pub enum Binding<L> {
    /// Attribute of `self`, by field slot.
    Field { slot: usize },
    Local { access: L },
}

pub struct Codegen<'a, T: TargetOps> {
    classes: &'a ClassTable,
    pool: ConstPool,
    target: T,
    env: SymbolTable<Binding<T::Local>>,
    names: Interner,
    current: &'a Klass,
}

/// Generates the full unit for `classes` with the given backend.
pub fn generate<T: TargetOps>(classes: &ClassTable, target: T) -> String {
    Codegen::new(classes, target).run()
}

impl<'a, T: TargetOps> Codegen<'a, T> {
    pub fn new(classes: &'a ClassTable, target: T) -> Self {
        Codegen {
            classes,
            pool: ConstPool::new(),
            target,
            env: SymbolTable::empty(),
            names: Interner::new(),
            current: classes.by_tag(0),
        }
    }

    pub fn run(mut self) -> String {
        self.emit_class_tree(0);
        assert_eq!(0, self.env.depth(), "impl bug: unbalanced scopes");
        tracing::debug!(constants = self.pool.count(), "emitting data");
        let Codegen {
            classes,
            mut pool,
            target,
            ..
        } = self;
        target.finish(classes, &mut pool)
    }

    /// Parent before children; each class sees its ancestors' fields through
    /// the enclosing scopes.
    fn emit_class_tree(&mut self, tag: Tag) {
        let classes = self.classes;
        let klass = classes.by_tag(tag);
        let _span = tracing::debug_span!("class", name = %klass.name).entered();
        tracing::debug!(tag = klass.tag, max_child_tag = klass.max_child_tag, "emitting class");

        self.env.push_scope();
        for (i, field) in klass.own_fields().iter().enumerate() {
            let sym = self.names.intern(&field.name);
            self.env.add_symbol(
                sym,
                Binding::Field {
                    slot: klass.own_fields_start + i,
                },
            );
        }

        self.current = klass;
        self.emit_init(klass);
        if !klass.is_basic() {
            for (name, formals, body) in klass.decl.methods() {
                match body {
                    Some(body) => {
                        let formal_names: Vec<&str> = formals.iter().map(|f| f.name.as_str()).collect();
                        self.emit_method(klass, name, &formal_names, body)
                    }
                    None => panic!("impl bug: method {}.{} has no body", klass.name, name),
                }
            }
        }

        let mut child = tag + 1;
        while child <= klass.max_child_tag {
            self.emit_class_tree(child);
            child = classes.by_tag(child).max_child_tag + 1;
        }
        self.env.pop_scope();
    }

    /// Own-field defaults, then the parent's initializer, then this class's
    /// initializer expressions in declaration order.
    fn emit_init(&mut self, klass: &'a Klass) {
        tracing::trace!(class = %klass.name, "init method");
        self.target.begin_function(&class_init(&klass.name), 0);

        for (i, field) in klass.own_fields().iter().enumerate() {
            let slot = klass.own_fields_start + i;
            let this = self.target.self_object();
            match NativeKind::of(&field.ty) {
                Some(kind) => self.target.store_native_default(this, klass, slot, kind),
                None => {
                    let v = self.default_value(&field.ty);
                    self.target.store_field(this, klass, slot, v);
                }
            }
        }

        if let Some(parent) = &klass.parent {
            let parent = self.classes.klass(parent);
            let this = self.target.self_object();
            self.target.call_init(parent, this);
        }

        for (i, (_, _, init)) in klass.decl.attributes().enumerate() {
            if let Some(init) = init {
                let slot = klass.own_fields_start + i;
                let v = self.lower(init);
                let this = self.target.self_object();
                self.target.store_field(this.clone(), klass, slot, v);
                self.target.write_barrier(this, klass, slot);
            }
        }

        let this = self.target.self_object();
        self.target.end_function(this, 0);
    }

    fn emit_method(&mut self, klass: &Klass, name: &str, formals: &[&str], body: &crate::ast::Expr) {
        let label = format!("{}.{}", klass.name, name);
        tracing::trace!(method = %label, "method");
        self.target.begin_function(&label, formals.len());

        self.env.push_scope();
        for (i, formal) in formals.iter().enumerate() {
            let access = self.target.formal(i, formals.len());
            let sym = self.names.intern(formal);
            self.env.add_symbol(sym, Binding::Local { access });
        }
        let result = self.lower(body);
        self.env.pop_scope();

        self.target.end_function(result, formals.len());
    }

    /// Boxed default for trivial types, void for everything else.
    fn default_value(&mut self, ty: &str) -> T::Value {
        match self.pool.init_value(ty) {
            Some(c) => self.target.constant(c),
            None => self.target.void_value(),
        }
    }

    fn binding(&self, name: &str) -> Binding<T::Local> {
        assert_ne!(SELF, name, "impl bug: self has no binding");
        let sym: Symbol = match self.names.get(name) {
            Some(sym) => sym,
            None => panic!("impl bug: unresolved identifier {}", name),
        };
        self.env.lookup(sym).clone()
    }
}
