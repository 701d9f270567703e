//! Module-level IR: class struct types, dispatch tables, pooled constants,
//! the class tables and the declarations of everything defined elsewhere.

use std::fmt::Write;

use itertools::Itertools;

use crate::{
    basic::{NativeKind, BOOL, INT, MAIN, MAIN_METHOD, STRING},
    data::{class_disp_tab, class_init, class_struct, ConstPool, CLASS_NAME_TAB, CLASS_OBJ_TAB},
    layout::{ClassTable, Klass},
};

use super::Runtime;

/// Every header word and field is one 64-bit slot.
pub const SLOT_SIZE: usize = 8;
pub const HEADER_FIELDS: usize = 3;

/// `{tag, size, dispatch table, initializer}` per class, indexed by tag.
pub const CLASS_OBJ_TYPE: &str = "%class_obj";

pub fn field_type(ty: &str) -> &'static str {
    match NativeKind::of(ty) {
        Some(NativeKind::Int) | Some(NativeKind::Bool) => "i64",
        Some(NativeKind::Str) | None => "ptr",
    }
}

pub fn object_size(klass: &Klass) -> usize {
    SLOT_SIZE * (HEADER_FIELDS + klass.fields.len())
}

/// Field slots follow the three header words.
pub fn field_index(slot: usize) -> usize {
    HEADER_FIELDS + slot
}

/// LLVM `c"..."` escaping.
fn c_string(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes().chain(std::iter::once(0)) {
        match b {
            0x20..=0x7e if b != b'"' && b != b'\\' => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:02X}", b);
            }
        }
    }
    out
}

pub struct ModuleData<'a> {
    classes: &'a ClassTable,
    source_name: String,
}

impl<'a> ModuleData<'a> {
    pub fn new(classes: &'a ClassTable, source_name: &str) -> Self {
        ModuleData {
            classes,
            source_name: source_name.to_string(),
        }
    }

    /// Everything except the function definitions. Interns the class names.
    pub fn emit(&self, pool: &mut ConstPool) -> String {
        let classes = self.classes;
        let names: Vec<String> = classes
            .iter()
            .map(|k| pool.string_const(&k.name).label())
            .collect();

        let mut out = String::new();
        let _ = writeln!(out, "; ModuleID = 'coolc'");
        let _ = writeln!(out, "source_filename = \"{}\"\n", self.source_name);

        let _ = writeln!(out, "{} = type {{ i64, i64, ptr, ptr }}", CLASS_OBJ_TYPE);
        for klass in classes.iter() {
            let fields = ["i64", "i64", "ptr"]
                .into_iter()
                .chain(klass.fields.iter().map(|f| field_type(&f.ty)))
                .join(", ");
            let _ = writeln!(out, "{} = type {{ {} }}", class_struct(&klass.name), fields);
        }
        out.push('\n');

        for klass in classes.iter() {
            let entries = klass
                .methods
                .iter()
                .map(|m| format!("ptr @{}", m.label()))
                .join(", ");
            let _ = writeln!(
                out,
                "@{} = constant [{} x ptr] [{}]",
                class_disp_tab(&klass.name),
                klass.methods.len(),
                entries
            );
        }
        out.push('\n');

        self.constants(pool, &mut out);

        let objs = classes
            .iter()
            .map(|k| {
                format!(
                    "{} {{ i64 {}, i64 {}, ptr @{}, ptr @{} }}",
                    CLASS_OBJ_TYPE,
                    k.tag,
                    object_size(k),
                    class_disp_tab(&k.name),
                    class_init(&k.name)
                )
            })
            .join(", ");
        let _ = writeln!(
            out,
            "@{} = constant [{} x {}] [{}]",
            CLASS_OBJ_TAB,
            classes.iter().count(),
            CLASS_OBJ_TYPE,
            objs
        );
        let _ = writeln!(
            out,
            "@{} = constant [{} x ptr] [{}]\n",
            CLASS_NAME_TAB,
            classes.iter().count(),
            names.iter().map(|n| format!("ptr @{}", n)).join(", ")
        );

        for routine in Runtime::ALL {
            let _ = writeln!(out, "{}", routine.declaration());
        }
        for klass in classes.iter().filter(|k| k.is_basic()) {
            for (name, formals, _) in klass.decl.methods() {
                let params = std::iter::repeat("ptr").take(formals.len() + 1).join(", ");
                let _ = writeln!(out, "declare ptr @{}.{}({})", klass.name, name, params);
            }
        }
        out.push('\n');
        out
    }

    fn constants(&self, pool: &ConstPool, out: &mut String) {
        let int = self.classes.klass(INT);
        let bool_class = self.classes.klass(BOOL);
        let string = self.classes.klass(STRING);

        for (c, v) in pool.ints() {
            let _ = writeln!(
                out,
                "@{} = global {} {{ i64 {}, i64 {}, ptr @{}, i64 {} }}",
                c.label(),
                class_struct(INT),
                int.tag,
                object_size(int),
                class_disp_tab(INT),
                v
            );
        }
        for (label, v) in [("bool_const0", 0), ("bool_const1", 1)] {
            let _ = writeln!(
                out,
                "@{} = global {} {{ i64 {}, i64 {}, ptr @{}, i64 {} }}",
                label,
                class_struct(BOOL),
                bool_class.tag,
                object_size(bool_class),
                class_disp_tab(BOOL),
                v
            );
        }
        for (i, (c, s, len)) in pool.strings().enumerate() {
            let _ = writeln!(
                out,
                "@str_data{} = private unnamed_addr constant [{} x i8] c\"{}\"",
                i,
                s.len() + 1,
                c_string(s)
            );
            let _ = writeln!(
                out,
                "@{} = global {} {{ i64 {}, i64 {}, ptr @{}, ptr @{}, ptr @str_data{} }}",
                c.label(),
                class_struct(STRING),
                string.tag,
                object_size(string),
                class_disp_tab(STRING),
                len.label(),
                i
            );
        }
        out.push('\n');
    }

    /// `main`: allocate `Main`, initialize it, run `Main.main`.
    pub fn entry_point(&self) -> String {
        let main = self.classes.klass(MAIN);
        let mut out = String::new();
        let _ = writeln!(out, "define i32 @main() {{");
        let _ = writeln!(out, "entry:");
        let _ = writeln!(
            out,
            "  %obj = call ptr @{}(i64 {}, i64 {}, ptr @{})",
            Runtime::GcAlloc,
            main.tag,
            object_size(main),
            class_disp_tab(MAIN)
        );
        let _ = writeln!(out, "  %main = call ptr @{}(ptr %obj)", class_init(MAIN));
        let _ = writeln!(
            out,
            "  %result = call ptr @{}.{}(ptr %main)",
            MAIN,
            MAIN_METHOD
        );
        let _ = writeln!(out, "  ret i32 0");
        let _ = writeln!(out, "}}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_strings_escape_quotes_and_control_bytes() {
        assert_eq!("a\\22b\\0A\\00", c_string("a\"b\n"));
        assert_eq!("\\00", c_string(""));
    }

    #[test]
    fn native_fields_are_words_or_pointers() {
        assert_eq!("i64", field_type("native_int"));
        assert_eq!("i64", field_type("native_bool"));
        assert_eq!("ptr", field_type("native_string"));
        assert_eq!("ptr", field_type("Int"));
    }
}
