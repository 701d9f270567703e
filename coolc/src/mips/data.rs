//! The `.data` section: pooled constants, prototypes, dispatch tables and the
//! tables and flags the runtime and collector read.

use std::fmt::Write;

use crate::{
    basic::{NativeKind, BOOL, INT, MAIN, STRING},
    data::{class_disp_tab, class_init, class_proto, Const, ConstPool, CLASS_NAME_TAB, CLASS_OBJ_TAB},
    layout::{ClassTable, Klass},
};

use super::{frame::WORD_SIZE, Runtime};

/// Marks the word before every object for the collector.
const EYE_CATCHER: i32 = -1;

pub struct DataSection<'a> {
    classes: &'a ClassTable,
    gc_test: bool,
    out: String,
}

impl<'a> DataSection<'a> {
    pub fn new(classes: &'a ClassTable, gc_test: bool) -> Self {
        DataSection {
            classes,
            gc_test,
            out: String::new(),
        }
    }

    pub fn emit(mut self, pool: &mut ConstPool) -> String {
        let classes = self.classes;
        // everything the tables below point at must be pooled before the pool is dumped.
        let names: Vec<Const> = classes.iter().map(|k| pool.string_const(&k.name)).collect();
        for ty in [INT, BOOL, STRING] {
            pool.init_value(ty);
        }

        self.line("\t.data");
        self.line("\t.align\t2");
        for sym in [
            CLASS_NAME_TAB.to_string(),
            class_proto(MAIN),
            class_proto(INT),
            class_proto(STRING),
            Const::Bool(false).label(),
            Const::Bool(true).label(),
            "_int_tag".to_string(),
            "_bool_tag".to_string(),
            "_string_tag".to_string(),
        ] {
            self.line(&format!("\t.globl\t{}", sym));
        }
        self.word_label("_int_tag", &classes.klass(INT).tag.to_string());
        self.word_label("_bool_tag", &classes.klass(BOOL).tag.to_string());
        self.word_label("_string_tag", &classes.klass(STRING).tag.to_string());

        self.line("\t.globl\t_MemMgr_INITIALIZER");
        self.word_label("_MemMgr_INITIALIZER", &Runtime::GenGcInit.to_string());
        self.line("\t.globl\t_MemMgr_COLLECTOR");
        self.word_label("_MemMgr_COLLECTOR", &Runtime::GenGcCollect.to_string());
        self.line("\t.globl\t_MemMgr_TEST");
        let test = if self.gc_test { "1" } else { "0" };
        self.word_label("_MemMgr_TEST", test);

        self.strings(pool);
        self.ints(pool);
        self.bools();

        self.line(&format!("{}:", CLASS_NAME_TAB));
        for name in names {
            self.word(&name.label());
        }
        self.line(&format!("{}:", CLASS_OBJ_TAB));
        for klass in classes.iter() {
            self.word(&class_proto(&klass.name));
            self.word(&class_init(&klass.name));
        }
        for klass in classes.iter() {
            self.dispatch_table(klass);
        }
        for klass in classes.iter() {
            self.prototype(klass, pool);
        }

        self.line("\t.globl\theap_start");
        self.word_label("heap_start", "0");
        self.out
    }

    fn line(&mut self, s: &str) {
        self.out.push_str(s);
        self.out.push('\n');
    }

    fn word(&mut self, v: &str) {
        let _ = writeln!(self.out, "\t.word\t{}", v);
    }

    fn word_label(&mut self, label: &str, v: &str) {
        self.line(&format!("{}:", label));
        self.word(v);
    }

    fn object_header(&mut self, label: &str, klass: &Klass, size_words: i32) {
        self.word(&EYE_CATCHER.to_string());
        self.line(&format!("{}:", label));
        self.word(&klass.tag.to_string());
        self.word(&size_words.to_string());
        self.word(&class_disp_tab(&klass.name));
    }

    fn strings(&mut self, pool: &ConstPool) {
        let string = self.classes.klass(STRING);
        for (c, s, len) in pool.strings() {
            // header, length pointer, then the bytes with their terminator, word aligned.
            let size = 4 + (s.len() as i32 + 1 + WORD_SIZE - 1) / WORD_SIZE;
            self.object_header(&c.label(), string, size);
            self.word(&len.label());
            self.ascii(s);
            self.line("\t.byte\t0");
            self.line("\t.align\t2");
        }
    }

    fn ascii(&mut self, s: &str) {
        let mut run = String::new();
        for b in s.bytes() {
            match b {
                b'"' | b'\\' => {
                    run.push('\\');
                    run.push(b as char);
                }
                0x20..=0x7e => run.push(b as char),
                _ => {
                    if !run.is_empty() {
                        self.line(&format!("\t.ascii\t\"{}\"", run));
                        run.clear();
                    }
                    self.line(&format!("\t.byte\t{}", b));
                }
            }
        }
        if !run.is_empty() {
            self.line(&format!("\t.ascii\t\"{}\"", run));
        }
    }

    fn ints(&mut self, pool: &ConstPool) {
        let int = self.classes.klass(INT);
        for (c, v) in pool.ints() {
            self.object_header(&c.label(), int, 4);
            self.word(&super::raw_word(v).to_string());
        }
    }

    fn bools(&mut self) {
        let bool_class = self.classes.klass(BOOL);
        for v in [false, true] {
            self.object_header(&Const::Bool(v).label(), bool_class, 4);
            self.word(if v { "1" } else { "0" });
        }
    }

    fn dispatch_table(&mut self, klass: &Klass) {
        self.line(&format!("{}:", class_disp_tab(&klass.name)));
        for m in &klass.methods {
            self.word(&m.label());
        }
    }

    fn prototype(&mut self, klass: &Klass, pool: &mut ConstPool) {
        let size = 3 + klass.fields.len() as i32;
        self.object_header(&class_proto(&klass.name), klass, size);
        for field in &klass.fields {
            let v = match NativeKind::of(&field.ty) {
                Some(_) => "0".to_string(),
                None => match pool.init_value(&field.ty) {
                    Some(c) => c.label(),
                    None => "0".to_string(),
                },
            };
            self.word(&v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::Program, basic};

    fn table() -> ClassTable {
        let mut p = Program {
            classes: vec![crate::ast::helpers::class("Main", "IO", vec![])],
        };
        basic::install(&mut p);
        ClassTable::build(&p)
    }

    #[test]
    fn strings_are_escaped_and_padded() {
        let classes = table();
        let mut pool = ConstPool::new();
        pool.string_const("say \"hi\"\n");
        let text = DataSection::new(&classes, false).emit(&mut pool);
        assert!(text.contains("\t.ascii\t\"say \\\"hi\\\"\"\n\t.byte\t10\n\t.byte\t0\n"));
        assert!(text.contains("_MemMgr_TEST:\n\t.word\t0\n"));
    }

    #[test]
    fn tables_cover_every_class() {
        let classes = table();
        let mut pool = ConstPool::new();
        let text = DataSection::new(&classes, true).emit(&mut pool);
        assert!(text.contains("class_objTab:\n\t.word\tObject_protObj\n\t.word\tObject_init\n"));
        assert!(text.contains("Main_dispTab:\n\t.word\tObject.abort\n"));
        assert!(text.contains("\t.word\tIO.in_int\n"));
        assert!(text.contains("_MemMgr_TEST:\n\t.word\t1\n"));
        // String prototype: header, boxed zero length, empty payload word.
        let string_tag = classes.klass(STRING).tag;
        let zero = pool.int_const(0).label();
        assert_ne!("int_const0", zero, "class name lengths are pooled first");
        assert!(text.contains(&format!(
            "String_protObj:\n\t.word\t{}\n\t.word\t5\n\t.word\tString_dispTab\n\t.word\t{}\n\t.word\t0\n",
            string_tag, zero
        )));
        assert!(text.ends_with("heap_start:\n\t.word\t0\n"));
    }
}
