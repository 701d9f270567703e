// coolc is treated as a lib crate for use in the `tests` folder; the binary
// in `coolc.rs` is a thin driver over these modules.
pub mod ast;
pub mod basic;
pub mod codegen;
pub mod config;
pub mod data;
pub mod error;
pub mod finalize;
pub mod int_types;
pub mod layout;
pub mod llvm;
pub mod logging;
pub mod mips;
pub mod symbol;
pub mod symtab;
pub mod temp;
pub mod util;

use std::{fs, path::Path};

use crate::{
    ast::Program,
    config::BackendKind,
    error::{CodegenError, Result},
    layout::ClassTable,
    llvm::LlvmTarget,
    mips::{MipsOptions, MipsTarget},
};

/// Reads the typed class hierarchy produced by the front end.
pub fn read_program(path: &Path) -> Result<Program> {
    let text = fs::read_to_string(path).map_err(|source| CodegenError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CodegenError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Lays out `program` (adding the basic classes it does not declare) and
/// generates the whole compilation unit for `backend`.
pub fn compile(mut program: Program, backend: BackendKind, mips: MipsOptions, source_name: &str) -> String {
    basic::install(&mut program);
    let classes = ClassTable::build(&program);
    tracing::info!(classes = classes.iter().count(), %backend, "class table built");
    match backend {
        BackendKind::Mips => codegen::generate(&classes, MipsTarget::new(mips)),
        BackendKind::Llvm => codegen::generate(&classes, LlvmTarget::new(source_name)),
    }
}
