use std::fmt::{Debug, Display};
use std::num::NonZeroUsize;

/// A fresh value name. The native backend prints these as SSA registers.
#[derive(Eq, PartialEq, Copy, Clone, Hash)]
pub struct Temp(NonZeroUsize);

/// A branch target local to one method body. The hint makes the emitted text
/// readable (`case_next17`, `loop_header4`); the id makes it unique.
#[derive(Eq, PartialEq, Copy, Clone, Hash)]
pub struct Label {
    id: NonZeroUsize,
    hint: &'static str,
}

impl Debug for Temp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl Display for Temp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl Debug for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.hint, self.id)
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.hint, self.id)
    }
}

pub trait Uuids {
    fn new() -> Self
    where
        Self: Sized;

    fn new_temp(&mut self) -> Temp;

    fn new_block_label(&mut self, hint: &'static str) -> Label;
}

/// Per-compilation generator for temporaries and labels. Temps and block
/// labels share one counter so every emitted name is unique in the unit.
pub struct UuidsImpl {
    next_id: NonZeroUsize,
}

impl UuidsImpl {
    fn bump(&mut self) -> NonZeroUsize {
        let id = self.next_id;
        self.next_id = match self.next_id.checked_add(1) {
            Some(next) => next,
            None => panic!("impl bug: ran out of temporaries"),
        };
        id
    }
}

impl Uuids for UuidsImpl {
    fn new() -> Self {
        Self {
            next_id: NonZeroUsize::MIN,
        }
    }

    fn new_temp(&mut self) -> Temp {
        Temp(self.bump())
    }

    fn new_block_label(&mut self, hint: &'static str) -> Label {
        Label {
            id: self.bump(),
            hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temps_and_blocks_never_collide() {
        let mut gen = UuidsImpl::new();
        let t = gen.new_temp();
        let b1 = gen.new_block_label("loop_header");
        let b2 = gen.new_block_label("loop_header");
        assert_ne!(b1, b2);
        assert_eq!("t1", t.to_string());
        assert_eq!("loop_header2", b1.to_string());
        assert_eq!("loop_header3", b2.to_string());
    }
}
