//! The five built-in classes. Their method bodies live in the runtime; only
//! their shape (fields and method signatures) matters to layout and codegen.

use strum_macros::{Display, EnumString};

use crate::ast::{Class, Feature, Formal, Program, SELF_TYPE};

pub const OBJECT: &str = "Object";
pub const IO: &str = "IO";
pub const INT: &str = "Int";
pub const BOOL: &str = "Bool";
pub const STRING: &str = "String";
pub const MAIN: &str = "Main";
pub const MAIN_METHOD: &str = "main";

pub const BASIC_FILE_NAME: &str = "<basic class>";

/// Raw, unboxed field types that only the built-in classes carry.
#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    #[strum(serialize = "native_int")]
    Int,
    #[strum(serialize = "native_bool")]
    Bool,
    #[strum(serialize = "native_string")]
    Str,
}

impl NativeKind {
    pub fn of(ty: &str) -> Option<NativeKind> {
        ty.parse().ok()
    }
}

pub fn is_basic(name: &str) -> bool {
    matches!(name, OBJECT | IO | INT | BOOL | STRING)
}

fn runtime_method(name: &str, formals: &[(&str, &str)], return_type: &str) -> Feature {
    Feature::Method {
        name: name.into(),
        formals: formals
            .iter()
            .map(|(n, t)| Formal {
                name: (*n).into(),
                ty: (*t).into(),
            })
            .collect(),
        return_type: return_type.into(),
        body: None,
    }
}

fn native_field(name: &str, ty: &str) -> Feature {
    Feature::Attribute {
        name: name.into(),
        ty: ty.into(),
        init: None,
    }
}

fn basic_class(name: &str, parent: Option<&str>, features: Vec<Feature>) -> Class {
    Class {
        name: name.into(),
        parent: parent.map(String::from),
        features,
        file_name: BASIC_FILE_NAME.into(),
    }
}

pub fn basic_classes() -> Vec<Class> {
    vec![
        basic_class(
            OBJECT,
            None,
            vec![
                runtime_method("abort", &[], OBJECT),
                runtime_method("type_name", &[], STRING),
                runtime_method("copy", &[], SELF_TYPE),
            ],
        ),
        basic_class(
            IO,
            Some(OBJECT),
            vec![
                runtime_method("out_string", &[("x", STRING)], SELF_TYPE),
                runtime_method("out_int", &[("x", INT)], SELF_TYPE),
                runtime_method("in_string", &[], STRING),
                runtime_method("in_int", &[], INT),
            ],
        ),
        basic_class(
            INT,
            Some(OBJECT),
            vec![native_field("_val", "native_int")],
        ),
        basic_class(
            BOOL,
            Some(OBJECT),
            vec![native_field("_val", "native_bool")],
        ),
        basic_class(
            STRING,
            Some(OBJECT),
            vec![
                native_field("_len", INT),
                native_field("_str", "native_string"),
                runtime_method("length", &[], INT),
                runtime_method("concat", &[("s", STRING)], STRING),
                runtime_method("substr", &[("i", INT), ("l", INT)], STRING),
            ],
        ),
    ]
}

/// Puts any missing built-in class in front of the user classes.
pub fn install(program: &mut Program) {
    let missing: Vec<Class> = basic_classes()
        .into_iter()
        .filter(|b| program.class(&b.name).is_none())
        .collect();
    if !missing.is_empty() {
        tracing::debug!(count = missing.len(), "installing built-in classes");
        program.classes.splice(0..0, missing);
    }
}
