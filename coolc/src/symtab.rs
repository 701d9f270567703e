use crate::symbol::Symbol;
use std::collections::HashMap;

/// Scoped identifier -> binding map.
///
/// Each symbol maps to a LIFO list of bindings, so an inner `let` or case
/// branch hides an outer binding of the same name until its scope is popped.
/// The stack records which symbols each scope entered so `pop_scope` knows
/// what to drop.
#[derive(Debug)]
pub struct SymbolTable<T> {
    tbl: HashMap<Symbol, Vec<T>>,
    stack: Vec<StackSymbol>,
}

#[derive(Debug, Copy, Clone)]
enum StackSymbol {
    BeginScopeMarker,
    Sym(Symbol),
}

impl<T> SymbolTable<T> {
    pub fn empty() -> Self {
        SymbolTable {
            tbl: HashMap::new(),
            stack: Vec::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.stack.push(StackSymbol::BeginScopeMarker);
    }

    pub fn pop_scope(&mut self) {
        while let Some(StackSymbol::Sym(s)) = self.stack.last().copied() {
            self.stack.pop();
            let popped = self.tbl.get_mut(&s).and_then(|bindings| bindings.pop());
            assert!(
                popped.is_some(),
                "impl bug: scope stack and symbol table disagree"
            );
        }
        let marker = self.stack.pop();
        assert!(
            matches!(marker, Some(StackSymbol::BeginScopeMarker)),
            "impl bug: pop_scope without a matching push_scope"
        );
    }

    pub fn add_symbol(&mut self, symbol: Symbol, v: T) {
        assert!(
            !self.stack.is_empty(),
            "impl bug: add_symbol outside of any scope"
        );
        self.tbl.entry(symbol).or_default().push(v);
        self.stack.push(StackSymbol::Sym(symbol));
    }

    /// Innermost visible binding, if any.
    pub fn look(&self, symbol: Symbol) -> Option<&T> {
        self.tbl.get(&symbol).and_then(|bindings| bindings.last())
    }

    /// Like `look`, but a miss is an internal-consistency failure: the analyzer
    /// guarantees every reference resolves.
    pub fn lookup(&self, symbol: Symbol) -> &T {
        match self.look(symbol) {
            Some(binding) => binding,
            None => panic!("impl bug: unresolved symbol {:?}", symbol),
        }
    }

    pub fn depth(&self) -> usize {
        self.stack
            .iter()
            .filter(|s| matches!(s, StackSymbol::BeginScopeMarker))
            .count()
    }
}
