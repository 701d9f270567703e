//! Pooled literal objects and the names of per-class data artifacts.

use std::collections::HashMap;

use crate::{
    basic::{BOOL, INT, STRING},
    int_types::CoolInt,
};

/// Handle to a pre-built boxed literal. Equal literals share a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Const {
    Int(usize),
    Str(usize),
    Bool(bool),
}

impl Const {
    pub fn label(&self) -> String {
        match self {
            Const::Int(idx) => format!("int_const{}", idx),
            Const::Str(idx) => format!("str_const{}", idx),
            Const::Bool(b) => format!("bool_const{}", *b as u8),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConstPool {
    ints: Vec<CoolInt>,
    int_index: HashMap<CoolInt, usize>,
    strings: Vec<String>,
    string_index: HashMap<String, usize>,
}

impl ConstPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int_const(&mut self, v: CoolInt) -> Const {
        if let Some(idx) = self.int_index.get(&v) {
            return Const::Int(*idx);
        }
        let idx = self.ints.len();
        self.ints.push(v);
        self.int_index.insert(v, idx);
        Const::Int(idx)
    }

    /// Also pools the length, which every string object points at.
    pub fn string_const(&mut self, s: &str) -> Const {
        self.int_const(s.len() as CoolInt);
        if let Some(idx) = self.string_index.get(s) {
            return Const::Str(*idx);
        }
        let idx = self.strings.len();
        self.strings.push(s.to_string());
        self.string_index.insert(s.to_string(), idx);
        Const::Str(idx)
    }

    pub fn bool_const(&self, v: bool) -> Const {
        Const::Bool(v)
    }

    /// Boxed default for a field or let variable of type `ty`; `None` means void.
    pub fn init_value(&mut self, ty: &str) -> Option<Const> {
        match ty {
            INT => Some(self.int_const(0)),
            BOOL => Some(self.bool_const(false)),
            STRING => Some(self.string_const("")),
            _ => None,
        }
    }

    pub fn ints(&self) -> impl Iterator<Item = (Const, CoolInt)> + '_ {
        self.ints.iter().enumerate().map(|(i, v)| (Const::Int(i), *v))
    }

    /// Every pooled string with the handle of its pooled length.
    pub fn strings(&self) -> impl Iterator<Item = (Const, &str, Const)> + '_ {
        self.strings.iter().enumerate().map(move |(i, s)| {
            let len = self.int_index[&(s.len() as CoolInt)];
            (Const::Str(i), s.as_str(), Const::Int(len))
        })
    }

    /// Pooled constants, counting the two Bool objects that always exist.
    pub fn count(&self) -> usize {
        self.ints.len() + self.strings.len() + 2
    }
}

pub fn class_disp_tab(class: &str) -> String {
    format!("{}_dispTab", class)
}

pub fn class_proto(class: &str) -> String {
    format!("{}_protObj", class)
}

pub fn class_init(class: &str) -> String {
    format!("{}_init", class)
}

pub fn class_struct(class: &str) -> String {
    format!("%{}", class)
}

pub const CLASS_NAME_TAB: &str = "class_nameTab";
pub const CLASS_OBJ_TAB: &str = "class_objTab";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_literals_share_one_object() {
        let mut pool = ConstPool::new();
        let a = pool.int_const(42);
        let b = pool.int_const(7);
        assert_eq!(a, pool.int_const(42));
        assert_ne!(a, b);
        assert_eq!(pool.string_const("hi"), pool.string_const("hi"));
        assert_eq!(Const::Bool(true), pool.bool_const(true));
    }

    #[test]
    fn strings_carry_their_pooled_length() {
        let mut pool = ConstPool::new();
        pool.int_const(5);
        let s = pool.string_const("hello");
        let (handle, text, len) = pool.strings().next().unwrap();
        assert_eq!(s, handle);
        assert_eq!("hello", text);
        assert_eq!(pool.int_const(5), len);
        assert_eq!(1, pool.ints().count());
        // one Int, one String, and the two Bools.
        assert_eq!(4, pool.count());
    }

    #[test]
    fn defaults_for_trivial_types() {
        let mut pool = ConstPool::new();
        assert_eq!(Some(pool.int_const(0)), pool.init_value("Int"));
        assert_eq!(Some(Const::Bool(false)), pool.init_value("Bool"));
        assert_eq!(Some(pool.string_const("")), pool.init_value("String"));
        assert_eq!(None, pool.init_value("Main"));
        assert_eq!("bool_const0", Const::Bool(false).label());
        assert_eq!("int_const0", pool.int_const(0).label());
    }
}
