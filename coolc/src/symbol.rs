use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

/// An interned identifier: attribute, formal, let or case variable name.
#[derive(Eq, PartialEq, Hash, Copy, Clone, Debug)]
pub struct Symbol(DefaultSymbol);

#[derive(Debug, Default)]
pub struct Interner(StringInterner<DefaultBackend<DefaultSymbol>>);

impl Interner {
    pub fn new() -> Self {
        Interner(StringInterner::new())
    }

    #[inline]
    pub fn intern(&mut self, name: &str) -> Symbol {
        Symbol(self.0.get_or_intern(name))
    }

    /// Lookup without interning. An identifier nobody ever bound can't be in any scope.
    #[inline]
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.0.get(name).map(Symbol)
    }

    #[inline]
    pub fn resolve(&self, s: &Symbol) -> Option<&str> {
        self.0.resolve(s.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_identifier_interns_once() {
        let mut i = Interner::new();
        let s1 = i.intern("counter");
        let s2 = i.intern("counter");
        assert_eq!(s1, s2);
        assert_ne!(s1, i.intern("self"));
    }

    #[test]
    fn resolve_and_get() {
        let mut i = Interner::new();
        let s1 = i.intern("x");
        assert_eq!(Some("x"), i.resolve(&s1));
        assert_eq!(Some(s1), i.get("x"));
        assert_eq!(None, i.get("never_bound"));
    }
}
