//! A minimal builder for one LLVM function in textual form.
//!
//! Stack slots are collected separately and hoisted into the entry block so
//! mem2reg can promote them.

use std::fmt::Write;

pub const ENTRY: &str = "entry";

#[derive(Debug)]
struct BasicBlock {
    label: String,
    instrs: Vec<String>,
    terminated: bool,
}

impl BasicBlock {
    fn new(label: String) -> Self {
        BasicBlock {
            label,
            instrs: vec![],
            terminated: false,
        }
    }
}

#[derive(Debug)]
pub struct FunctionBuilder {
    signature: String,
    allocas: Vec<String>,
    blocks: Vec<BasicBlock>,
}

impl FunctionBuilder {
    /// `signature` is everything between `define` and the opening brace.
    pub fn new(signature: String) -> Self {
        FunctionBuilder {
            signature,
            allocas: vec![],
            blocks: vec![BasicBlock::new(ENTRY.to_string())],
        }
    }

    fn current(&mut self) -> &mut BasicBlock {
        match self.blocks.last_mut() {
            Some(b) => b,
            None => panic!("impl bug: function without blocks"),
        }
    }

    pub fn current_label(&self) -> &str {
        match self.blocks.last() {
            Some(b) => &b.label,
            None => ENTRY,
        }
    }

    pub fn alloca(&mut self, name: &str) {
        self.allocas.push(format!("{} = alloca ptr", name));
    }

    pub fn emit(&mut self, instr: String) {
        let block = self.current();
        assert!(
            !block.terminated,
            "impl bug: instruction after terminator in {}",
            block.label
        );
        block.instrs.push(instr);
    }

    pub fn terminate(&mut self, instr: String) {
        self.emit(instr);
        self.current().terminated = true;
    }

    /// Opens a new block; an open predecessor falls through into it.
    pub fn start_block(&mut self, label: String) {
        if !self.current().terminated {
            self.terminate(format!("br label %{}", label));
        }
        self.blocks.push(BasicBlock::new(label));
    }

    pub fn render(self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "define {} {{", self.signature);
        for (i, block) in self.blocks.iter().enumerate() {
            let _ = writeln!(out, "{}:", block.label);
            if i == 0 {
                for a in &self.allocas {
                    let _ = writeln!(out, "  {}", a);
                }
            }
            for instr in &block.instrs {
                let _ = writeln!(out, "  {}", instr);
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocas_are_hoisted_into_entry() {
        let mut f = FunctionBuilder::new("ptr @Main.main(ptr %self)".into());
        f.emit("store ptr null, ptr %t2".into());
        f.alloca("%t2");
        f.start_block("loop_header3".into());
        f.terminate("ret ptr %self".into());
        let text = f.render();
        assert_eq!(
            "define ptr @Main.main(ptr %self) {\nentry:\n  %t2 = alloca ptr\n  store ptr null, ptr %t2\n  br label %loop_header3\nloop_header3:\n  ret ptr %self\n}\n",
            text
        );
    }

    #[test]
    #[should_panic(expected = "after terminator")]
    fn code_after_terminator_is_a_bug() {
        let mut f = FunctionBuilder::new("void @f()".into());
        f.terminate("ret void".into());
        f.emit("unreachable".into());
    }
}
