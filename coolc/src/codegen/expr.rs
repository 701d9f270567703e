//! Lowering of every expression form onto `TargetOps`.
//!
//! Sub-expressions are evaluated left to right. Arithmetic results are fresh
//! boxed Ints; every boolean result is one of the two pooled Bool objects.

use crate::{
    ast::{BinOp, CaseBranch, Expr, ExprKind, UnOp, SELF, SELF_TYPE},
    basic::{BOOL, INT},
    data::Const,
    int_types::{CoolInt, FALSE_VALUE, TRUE_VALUE},
    layout::Klass,
};

use super::{AbortKind, ArithOp, Binding, Codegen, Relop, TargetOps};

impl<'a, T: TargetOps> Codegen<'a, T> {
    pub(crate) fn lower(&mut self, e: &Expr) -> T::Value {
        tracing::trace!(kind = %e.kind, line = e.line, "lower");
        match &e.kind {
            ExprKind::Bool(b) => {
                let c = self.pool.bool_const(*b);
                self.target.constant(c)
            }
            ExprKind::Int(v) => {
                let c = self.pool.int_const(*v);
                self.target.constant(c)
            }
            ExprKind::Str(s) => {
                let c = self.pool.string_const(s);
                self.target.constant(c)
            }
            ExprKind::Object(name) => self.lower_object(name),
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinOp::Plus => self.lower_arith(ArithOp::Add, lhs, rhs),
                BinOp::Minus => self.lower_arith(ArithOp::Sub, lhs, rhs),
                BinOp::Mul => self.lower_arith(ArithOp::Mul, lhs, rhs),
                BinOp::Div => self.lower_arith(ArithOp::Div, lhs, rhs),
                BinOp::Lt => self.lower_compare(Relop::Lt, lhs, rhs),
                BinOp::Le => self.lower_compare(Relop::Le, lhs, rhs),
                BinOp::Eq => self.lower_equality(lhs, rhs),
            },
            ExprKind::Unary { op, expr } => self.lower_unary(*op, expr),
            ExprKind::New(ty) => self.lower_new(ty),
            ExprKind::Case {
                scrutinee,
                branches,
            } => self.lower_case(scrutinee, branches),
            ExprKind::Let {
                name,
                ty,
                init,
                body,
            } => {
                let init = match init {
                    Some(init) => self.lower(init),
                    None => self.default_value(ty),
                };
                self.lower_in_scope(name, init, body)
            }
            ExprKind::Block(exprs) => {
                let mut last = None;
                for e in exprs {
                    last = Some(self.lower(e));
                }
                match last {
                    Some(v) => v,
                    None => self.target.void_value(),
                }
            }
            ExprKind::While { pred, body } => self.lower_while(pred, body),
            ExprKind::If { pred, then, els } => self.lower_if(pred, then, els),
            ExprKind::Dispatch {
                receiver,
                static_type,
                method,
                args,
            } => self.lower_dispatch(receiver, static_type.as_deref(), method, args),
            ExprKind::Assign { name, expr } => self.lower_assign(name, expr),
        }
    }

    fn int_class(&self) -> &'a Klass {
        self.classes.klass(INT)
    }

    fn bool_class(&self) -> &'a Klass {
        self.classes.klass(BOOL)
    }

    fn lower_object(&mut self, name: &str) -> T::Value {
        if name == SELF {
            return self.target.self_object();
        }
        match self.binding(name) {
            Binding::Field { slot } => {
                let this = self.target.self_object();
                self.target.load_field(this, self.current, slot)
            }
            Binding::Local { access } => self.target.load_local(&access),
        }
    }

    /// Evaluates `lhs` then `rhs`, keeping `lhs` alive across `rhs`.
    fn lower_operands(&mut self, lhs: &Expr, rhs: &Expr) -> (T::Value, T::Value) {
        let l = self.lower(lhs);
        let saved = self.target.preserve(l);
        let r = self.lower(rhs);
        let l = self.target.restore(saved);
        (l, r)
    }

    fn lower_arith(&mut self, op: ArithOp, lhs: &Expr, rhs: &Expr) -> T::Value {
        let int = self.int_class();
        let (l, r) = self.lower_operands(lhs, rhs);
        let a = self.target.unbox(l, int);
        let b = self.target.unbox(r, int);
        // no divide-by-zero guard; the target's division traps or not.
        let raw = self.target.arith(op, a, b);
        self.target.box_int(raw, int)
    }

    fn lower_compare(&mut self, op: Relop, lhs: &Expr, rhs: &Expr) -> T::Value {
        let int = self.int_class();
        let (l, r) = self.lower_operands(lhs, rhs);
        let a = self.target.unbox(l, int);
        let b = self.target.unbox(r, int);
        let (yes, no) = self.bool_blocks();
        self.target.branch_raw(op, a, b, &yes, &no);
        self.select_bool(yes, no)
    }

    /// Identity first; only distinct pointers go to the runtime comparison.
    fn lower_equality(&mut self, lhs: &Expr, rhs: &Expr) -> T::Value {
        let (l, r) = self.lower_operands(lhs, rhs);
        let (yes, no) = self.bool_blocks();
        let slow = self.target.new_block("eq_slow");
        self.target.branch_same(l.clone(), r.clone(), &yes, &slow);

        self.target.switch_to(&slow);
        let equal = self.target.call_equals(l, r);
        let truth = self.target.raw_const(TRUE_VALUE);
        self.target.branch_raw(Relop::Eq, equal, truth, &yes, &no);
        self.select_bool(yes, no)
    }

    fn lower_unary(&mut self, op: UnOp, e: &Expr) -> T::Value {
        let v = self.lower(e);
        match op {
            UnOp::IsVoid => {
                let (yes, no) = self.bool_blocks();
                self.target.branch_void(v, &yes, &no);
                self.select_bool(yes, no)
            }
            UnOp::Not => {
                let bool_class = self.bool_class();
                let raw = self.target.unbox(v, bool_class);
                let falsity = self.target.raw_const(FALSE_VALUE);
                let (yes, no) = self.bool_blocks();
                self.target.branch_raw(Relop::Eq, raw, falsity, &yes, &no);
                self.select_bool(yes, no)
            }
            UnOp::Neg => {
                let int = self.int_class();
                let raw = self.target.unbox(v, int);
                let negated = self.target.negate(raw);
                self.target.box_int(negated, int)
            }
        }
    }

    fn bool_blocks(&mut self) -> (T::Block, T::Block) {
        (
            self.target.new_block("true_branch"),
            self.target.new_block("false_branch"),
        )
    }

    /// Joins the two outcomes of a test into the canonical Bool objects.
    fn select_bool(&mut self, yes: T::Block, no: T::Block) -> T::Value {
        let join = self.target.new_block("merge_block");
        self.target.switch_to(&yes);
        let t = self.target.constant(Const::Bool(true));
        let from_yes = self.target.finish_arm(t, &join);
        self.target.switch_to(&no);
        let f = self.target.constant(Const::Bool(false));
        let from_no = self.target.finish_arm(f, &join);
        self.target.merge(vec![from_yes, from_no], &join)
    }

    fn lower_new(&mut self, ty: &str) -> T::Value {
        if ty == SELF_TYPE {
            return self.target.new_self_type();
        }
        let klass = self.classes.klass(ty);
        let obj = self.target.allocate(klass);
        self.target.call_init(klass, obj)
    }

    /// Binds `name` to a fresh slot holding `init` for the extent of `body`.
    fn lower_in_scope(&mut self, name: &str, init: T::Value, body: &Expr) -> T::Value {
        let access = self.target.alloc_local(init);
        self.env.push_scope();
        let sym = self.names.intern(name);
        self.env.add_symbol(
            sym,
            Binding::Local {
                access: access.clone(),
            },
        );
        let v = self.lower(body);
        self.env.pop_scope();
        self.target.free_local(access);
        v
    }

    fn lower_case(&mut self, scrutinee: &Expr, branches: &[CaseBranch]) -> T::Value {
        let file = self.pool.string_const(self.current.file_name());
        let line = scrutinee.line;

        let v = self.lower(scrutinee);
        let on_void = self.target.new_block("case_void");
        let dispatch = self.target.new_block("case_dispatch");
        self.target.branch_void(v.clone(), &on_void, &dispatch);
        self.target.switch_to(&on_void);
        self.target.abort(AbortKind::CaseOnVoid, file, line);

        self.target.switch_to(&dispatch);
        let tag = self.target.load_tag(v.clone());
        let join = self.target.new_block("case_end");

        // tags are pre-order, so a descendant always sorts before its ancestors.
        let classes = self.classes;
        let mut ordered: Vec<(&CaseBranch, &Klass)> =
            branches.iter().map(|b| (b, classes.klass(&b.ty))).collect();
        ordered.sort_by(|a, b| b.1.tag.cmp(&a.1.tag));

        let mut arms = Vec::with_capacity(ordered.len());
        for (branch, klass) in ordered {
            let next = self.target.new_block("case_next");
            let upper = self.target.new_block("case_upper");
            let matched = self.target.new_block("case_branch");

            let lo = self.target.raw_const(klass.tag as CoolInt);
            self.target.branch_raw(Relop::Lt, tag.clone(), lo, &next, &upper);
            self.target.switch_to(&upper);
            let hi = self.target.raw_const(klass.max_child_tag as CoolInt);
            self.target.branch_raw(Relop::Gt, tag.clone(), hi, &next, &matched);

            self.target.switch_to(&matched);
            let result = self.lower_in_scope(&branch.name, v.clone(), &branch.body);
            arms.push(self.target.finish_arm(result, &join));

            self.target.switch_to(&next);
        }
        self.target.abort(AbortKind::CaseNoMatch, file, line);

        self.target.merge(arms, &join)
    }

    fn lower_while(&mut self, pred: &Expr, body: &Expr) -> T::Value {
        let header = self.target.new_block("loop_header");
        let looping = self.target.new_block("loop_body");
        let tail = self.target.new_block("loop_tail");

        self.target.jump(&header);
        self.target.switch_to(&header);
        let p = self.lower(pred);
        let bool_class = self.bool_class();
        let raw = self.target.unbox(p, bool_class);
        let truth = self.target.raw_const(TRUE_VALUE);
        self.target.branch_raw(Relop::Eq, raw, truth, &looping, &tail);

        self.target.switch_to(&looping);
        self.lower(body);
        self.target.jump(&header);

        self.target.switch_to(&tail);
        self.target.void_value()
    }

    fn lower_if(&mut self, pred: &Expr, then: &Expr, els: &Expr) -> T::Value {
        let p = self.lower(pred);
        let bool_class = self.bool_class();
        let raw = self.target.unbox(p, bool_class);
        let truth = self.target.raw_const(TRUE_VALUE);
        let on_true = self.target.new_block("true_branch");
        let on_false = self.target.new_block("false_branch");
        let join = self.target.new_block("merge_block");
        self.target.branch_raw(Relop::Eq, raw, truth, &on_true, &on_false);

        self.target.switch_to(&on_true);
        let v = self.lower(then);
        let from_true = self.target.finish_arm(v, &join);

        self.target.switch_to(&on_false);
        let v = self.lower(els);
        let from_false = self.target.finish_arm(v, &join);

        self.target.merge(vec![from_true, from_false], &join)
    }

    /// Arguments first, then the receiver, then the void check.
    fn lower_dispatch(
        &mut self,
        receiver: &Expr,
        static_type: Option<&str>,
        method: &str,
        args: &[Expr],
    ) -> T::Value {
        let file = self.pool.string_const(self.current.file_name());

        let mut saved = Vec::with_capacity(args.len());
        for arg in args {
            let v = self.lower(arg);
            saved.push(self.target.preserve(v));
        }
        let recv = self.lower(receiver);

        let on_void = self.target.new_block("dispatch_void");
        let call = self.target.new_block("dispatch_call");
        self.target.branch_void(recv.clone(), &on_void, &call);
        self.target.switch_to(&on_void);
        self.target.abort(AbortKind::DispatchOnVoid, file, receiver.line);

        self.target.switch_to(&call);
        match static_type {
            Some(ty) => {
                let label = self.classes.klass(ty).method_full_name(method);
                self.target.call_direct(&label, recv, saved)
            }
            None => {
                let klass = self.classes.resolve(&receiver.ty, self.current);
                let slot = klass.method_index(method);
                self.target.call_dynamic(recv, klass, slot, saved)
            }
        }
    }

    fn lower_assign(&mut self, name: &str, e: &Expr) -> T::Value {
        let v = self.lower(e);
        match self.binding(name) {
            Binding::Field { slot } => {
                let this = self.target.self_object();
                self.target.store_field(this.clone(), self.current, slot, v.clone());
                self.target.write_barrier(this, self.current, slot);
            }
            Binding::Local { access } => self.target.store_local(&access, v.clone()),
        }
        v
    }
}
