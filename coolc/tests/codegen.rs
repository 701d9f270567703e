use coolc::{
    ast::{helpers::*, BinOp, Class, Expr, ExprKind, Program, UnOp},
    basic,
    codegen::generate,
    data::ConstPool,
    layout::ClassTable,
    llvm::LlvmTarget,
    mips::{MipsOptions, MipsTarget},
};

fn table(classes: Vec<Class>) -> ClassTable {
    let mut p = Program { classes };
    basic::install(&mut p);
    ClassTable::build(&p)
}

fn mips(classes: &ClassTable) -> String {
    generate(classes, MipsTarget::new(MipsOptions::default()))
}

fn llvm(classes: &ClassTable) -> String {
    generate(classes, LlvmTarget::new("main.cl"))
}

fn main_class(main: Expr) -> Class {
    let ty = main.ty.clone();
    class("Main", "IO", vec![method("main", &[], &ty, main)])
}

/// Assembly of `label` up to its return.
fn mips_body<'t>(text: &'t str, label: &str) -> &'t str {
    let start = text.find(&format!("\n{}:\n", label)).unwrap() + 1;
    let end = start + text[start..].find("\tjr\t$ra\n").unwrap();
    &text[start..end]
}

fn llvm_body<'t>(text: &'t str, name: &str) -> &'t str {
    let start = text.find(&format!("define ptr @{}(", name)).unwrap();
    let end = start + text[start..].find("\n}\n").unwrap();
    &text[start..end]
}

/// Name of the first block whose label starts with `hint`.
fn block_named<'t>(body: &'t str, hint: &str) -> &'t str {
    body.lines()
        .find_map(|l| l.strip_suffix(':').filter(|l| l.starts_with(hint)))
        .unwrap()
}

/// Label of the pooled String object holding `s`.
fn mips_string_label(text: &str, s: &str) -> String {
    let mut label = "";
    for line in text.lines() {
        if let Some(l) = line.strip_suffix(':') {
            label = l;
        } else if line == format!("\t.ascii\t\"{}\"", s) {
            return label.to_string();
        }
    }
    panic!("{} not pooled", s);
}

fn llvm_string_label(text: &str, s: &str) -> String {
    let data_line = text
        .lines()
        .find(|l| l.ends_with(&format!("c\"{}\\00\"", s)))
        .unwrap();
    let data = data_line.split(' ').next().unwrap();
    let object_line = text
        .lines()
        .find(|l| l.ends_with(&format!("ptr {} }}", data)))
        .unwrap();
    object_line.split(' ').next().unwrap().trim_start_matches('@').to_string()
}

#[test]
fn tags_are_preorder_and_ranges_nest() {
    let classes = table(vec![
        class("A", "Object", vec![method("m", &[], "Int", int(1))]),
        class(
            "B",
            "A",
            vec![
                method("m", &[], "Int", int(2)),
                method("n", &[], "Int", int(3)),
            ],
        ),
        class("C", "Object", vec![]),
        class("D", "B", vec![]),
        main_class(int(0)),
    ]);

    for k in classes.iter() {
        if let Some(parent) = &k.parent {
            let p = classes.klass(parent);
            assert!(p.tag < k.tag && k.max_child_tag <= p.max_child_tag, "{}", k.name);
        }
    }
    let (a, b, d) = (classes.klass("A"), classes.klass("B"), classes.klass("D"));
    assert!(a.contains_tag(d.tag) && b.contains_tag(d.tag));
    assert!(!classes.klass("C").contains_tag(d.tag));

    // overrides keep the inherited slot, new methods go after.
    let slot = a.method_index("m");
    assert_eq!(slot, b.method_index("m"));
    assert_eq!("B", b.methods[slot].owner);
    assert_eq!("B.m", d.method_full_name("m"));
    assert_eq!(b.methods.len(), a.methods.len() + 1);
}

#[test]
fn constants_are_pooled_once() {
    let mut pool = ConstPool::new();
    assert_eq!(pool.int_const(42), pool.int_const(42));
    let s = pool.string_const("hello");
    assert_eq!(s, pool.string_const("hello"));
    assert_eq!(1, pool.strings().count());
    // the length of "hello" is pooled with it.
    assert!(pool.ints().any(|(_, v)| v == 5));
}

#[test]
fn addition_boxes_a_new_int() {
    let classes = table(vec![main_class(binary(BinOp::Plus, int(1), int(2)))]);

    let asm = mips(&classes);
    let main = mips_body(&asm, "Main.main");
    assert!(main.contains("\tadd\t"));
    assert!(main.contains("\tjal\tObject.copy\n"));

    let ir = llvm(&classes);
    let main = llvm_body(&ir, "Main.main");
    assert!(main.contains("add i64 "));
    assert!(main.contains(&format!(
        "call ptr @_gc_alloc(i64 {}, i64 32, ptr @Int_dispTab)",
        classes.klass("Int").tag
    )));
}

#[test]
fn comparison_yields_pooled_bools_without_allocating() {
    let classes = table(vec![main_class(binary(BinOp::Lt, int(5), int(3)))]);

    let asm = mips(&classes);
    let main = mips_body(&asm, "Main.main");
    assert!(main.contains("\tblt\t"));
    assert!(main.contains("\tla\t$a0 bool_const1\n"));
    assert!(main.contains("\tla\t$a0 bool_const0\n"));
    assert!(!main.contains("Object.copy"));

    let ir = llvm(&classes);
    let main = llvm_body(&ir, "Main.main");
    assert!(main.contains("icmp slt i64"));
    assert!(main.contains("[ @bool_const1, %true_branch"));
    assert!(!main.contains("_gc_alloc"));
}

#[test]
fn void_dispatch_reports_file_and_line() {
    let receiver = expr(ExprKind::Object("o".into()), "Object", 9);
    let body = let_in(
        "o",
        "Object",
        None,
        dispatch(receiver, "type_name", vec![], "String", 9),
    );
    let classes = table(vec![main_class(body)]);

    let asm = mips(&classes);
    let file = mips_string_label(&asm, "main.cl");
    assert!(asm.contains(&format!("\tla\t$a0 {}\n\tli\t$t1 9\n\tjal\t_dispatch_abort\n", file)));

    let ir = llvm(&classes);
    let file = llvm_string_label(&ir, "main.cl");
    assert!(ir.contains(&format!("call void @_dispatch_abort(ptr @{}, i64 9)", file)));
}

#[test]
fn case_tests_most_specific_branch_first() {
    let scrutinee = expr(ExprKind::New("B".into()), "B", 5);
    let body = case(
        scrutinee,
        vec![("a", "A", int(1)), ("b", "B", int(2))],
        "Int",
        5,
    );
    let classes = table(vec![
        class("A", "Object", vec![]),
        class("B", "A", vec![]),
        main_class(body),
    ]);
    let (a, b) = (classes.klass("A").tag, classes.klass("B").tag);

    let asm = mips(&classes);
    let main = mips_body(&asm, "Main.main");
    let lower_bounds: Vec<String> = main
        .lines()
        .filter(|l| l.starts_with("\tblt\t"))
        .map(|l| l.split(' ').nth(1).unwrap().to_string())
        .collect();
    assert_eq!(vec![b.to_string(), a.to_string()], lower_bounds);
    assert!(main.contains("\tli\t$t1 5\n\tjal\t_case_abort2\n"));
    assert!(main.contains("\tli\t$t1 5\n\tjal\t_case_abort\n"));

    let ir = llvm(&classes);
    let main = llvm_body(&ir, "Main.main");
    let first_b = main.find("icmp slt i64 %").unwrap();
    let line = main[first_b..].lines().next().unwrap();
    assert!(line.ends_with(&format!(", {}", b)));
}

#[test]
fn field_assignment_gets_exactly_one_barrier() {
    let classes = table(vec![class(
        "Main",
        "IO",
        vec![
            attr("x", "Int", None),
            method("main", &[], "Int", assign("x", int(5))),
            method(
                "local",
                &[],
                "Int",
                let_in("y", "Int", None, assign("y", int(3))),
            ),
        ],
    )]);

    let asm = mips(&classes);
    assert_eq!(1, mips_body(&asm, "Main.main").matches("_GenGC_Assign").count());
    assert_eq!(0, mips_body(&asm, "Main.local").matches("_GenGC_Assign").count());
    // defaults in the initializer are stored without one.
    assert_eq!(0, mips_body(&asm, "Main_init").matches("_GenGC_Assign").count());

    let ir = llvm(&classes);
    assert_eq!(1, llvm_body(&ir, "Main.main").matches("@_gc_write_barrier").count());
    assert_eq!(0, llvm_body(&ir, "Main.local").matches("@_gc_write_barrier").count());
}

#[test]
fn equality_compares_identity_before_calling_the_runtime() {
    let classes = table(vec![main_class(binary(
        BinOp::Eq,
        string("a"),
        string("b"),
    ))]);

    let asm = mips(&classes);
    let main = mips_body(&asm, "Main.main");
    let identity = main.find("\tbeq\t$t1 $a0 ").unwrap();
    let slow = main.find("\tjal\tequality_test\n").unwrap();
    assert!(identity < slow);

    let ir = llvm(&classes);
    let main = llvm_body(&ir, "Main.main");
    let identity = main.find("icmp eq ptr @str_const").unwrap();
    let slow = main.find("call i64 @_equals(").unwrap();
    assert!(identity < slow);
}

#[test]
fn static_dispatch_calls_the_named_method() {
    let call = static_dispatch(self_object(), "IO", "out_int", vec![int(7)], "SELF_TYPE");
    let classes = table(vec![main_class(call)]);

    let asm = mips(&classes);
    assert!(mips_body(&asm, "Main.main").contains("\tjal\tIO.out_int\n"));

    let ir = llvm(&classes);
    assert!(llvm_body(&ir, "Main.main").contains("call ptr @IO.out_int(ptr %self, ptr @int_const"));
}

#[test]
fn while_yields_void_and_loops_back_to_its_header() {
    let body = while_loop(boolean(false), int(1));
    let classes = table(vec![main_class(body)]);

    let asm = mips(&classes);
    let main = mips_body(&asm, "Main.main");
    let header = block_named(main, "loop_header");
    // the jump in and the back edge.
    assert_eq!(2, main.matches(&format!("\tb\t{}\n", header)).count());
    assert!(main.ends_with("\tmove\t$a0 $zero\n\tlw\t$ra 4($sp)\n\tlw\t$s0 8($sp)\n\tlw\t$fp 12($sp)\n\taddiu\t$sp $sp 12\n"));

    let ir = llvm(&classes);
    let main = llvm_body(&ir, "Main.main");
    let header = block_named(main, "loop_header");
    assert_eq!(2, main.matches(&format!("br label %{}\n", header)).count());
    assert!(main.ends_with("ret ptr null"));
}

#[test]
fn isvoid_and_not_yield_pooled_bools() {
    let classes = table(vec![class(
        "Main",
        "IO",
        vec![
            method("main", &[], "Bool", unary(UnOp::IsVoid, self_object())),
            method("negation", &[], "Bool", unary(UnOp::Not, boolean(true))),
        ],
    )]);

    let asm = mips(&classes);
    for name in ["Main.main", "Main.negation"] {
        let body = mips_body(&asm, name);
        assert!(body.contains("\tla\t$a0 bool_const1\n"), "{}", name);
        assert!(body.contains("\tla\t$a0 bool_const0\n"), "{}", name);
        assert!(!body.contains("Object.copy"), "{}", name);
    }
    assert!(mips_body(&asm, "Main.main").contains("\tbeq\t$s0 $zero "));

    let ir = llvm(&classes);
    for name in ["Main.main", "Main.negation"] {
        let body = llvm_body(&ir, name);
        assert!(body.contains("[ @bool_const1, %true_branch"), "{}", name);
        assert!(body.contains("[ @bool_const0, %false_branch"), "{}", name);
        assert!(!body.contains("_gc_alloc"), "{}", name);
    }
    assert!(llvm_body(&ir, "Main.main").contains("icmp eq ptr %self, null"));
}

#[test]
fn negation_boxes_a_new_int() {
    let classes = table(vec![main_class(unary(UnOp::Neg, int(4)))]);

    let asm = mips(&classes);
    let main = mips_body(&asm, "Main.main");
    let neg = main.find("\tneg\t").unwrap();
    assert!(main[neg..].contains("\tjal\tObject.copy\n"));

    let ir = llvm(&classes);
    let main = llvm_body(&ir, "Main.main");
    let neg = main.find("sub i64 0, ").unwrap();
    assert!(main[neg..].contains(&format!("call ptr @_gc_alloc(i64 {},", classes.klass("Int").tag)));
}

#[test]
fn inner_let_hides_outer_binding_until_it_ends() {
    let body = let_in(
        "x",
        "Int",
        Some(int(1)),
        block(vec![
            let_in("x", "Int", Some(int(2)), object("x", "Int")),
            object("x", "Int"),
        ]),
    );
    let classes = table(vec![main_class(body)]);

    // locals are pushed below the saved fp, s0 and ra.
    let asm = mips(&classes);
    let main = mips_body(&asm, "Main.main");
    let inner = main.find("\tlw\t$a0 -16($fp)\n").unwrap();
    let outer = main.find("\tlw\t$a0 -12($fp)\n").unwrap();
    assert!(inner < outer);

    let ir = llvm(&classes);
    let main = llvm_body(&ir, "Main.main");
    let slots: Vec<&str> = main
        .lines()
        .filter_map(|l| l.trim().strip_suffix(" = alloca ptr"))
        .collect();
    assert_eq!(2, slots.len());
    let inner = main.find(&format!("load ptr, ptr {}\n", slots[1])).unwrap();
    let outer = main.find(&format!("load ptr, ptr {}\n", slots[0])).unwrap();
    assert!(inner < outer);
}

#[test]
fn new_self_type_goes_through_class_obj_tab() {
    let classes = table(vec![main_class(new("SELF_TYPE"))]);

    let ir = llvm(&classes);
    let main = llvm_body(&ir, "Main.main");
    let entry = main.find("getelementptr %class_obj, ptr @class_objTab, i64 %").unwrap();
    let alloc = main.find("call ptr @_gc_alloc(i64 %").unwrap();
    assert!(entry < alloc);

    let asm = mips(&classes);
    assert!(mips_body(&asm, "Main.main").contains("\tla\t$t1 class_objTab\n"));
}

#[test]
fn integer_extremes_keep_their_raw_values() {
    let body = block(vec![
        binary(BinOp::Plus, int(2147483647), int(0)),
        binary(BinOp::Minus, int(0), int(2147483647)),
    ]);
    let classes = table(vec![main_class(body)]);

    let asm = mips(&classes);
    assert!(asm.contains("\t.word\t2147483647\n"));
    let main = mips_body(&asm, "Main.main");
    assert!(main.contains("\tadd\t") && main.contains("\tsub\t"));

    let ir = llvm(&classes);
    assert!(ir.contains(", i64 2147483647 }\n"));
    let main = llvm_body(&ir, "Main.main");
    assert!(main.contains("add i64 ") && main.contains("sub i64 "));
}
