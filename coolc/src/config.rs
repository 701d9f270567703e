use std::path::{Path, PathBuf};

use clap::{arg, command, value_parser, Arg, ArgMatches, Command};
use strum_macros::{Display, EnumString};

pub const RUNTIME_ENV: &str = "COOLC_RUNTIME";
pub const LLC_ENV: &str = "COOLC_LLC";
pub const LINKER_ENV: &str = "COOLC_LINKER";
pub const ASSEMBLER_ENV: &str = "COOLC_ASSEMBLER";

#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    Mips,
    Llvm,
}

impl BackendKind {
    pub fn extension(&self) -> &'static str {
        match self {
            BackendKind::Mips => "s",
            BackendKind::Llvm => "ll",
        }
    }
}

pub fn cli() -> Command {
    command!()
        .arg(Arg::new("file").required(true).value_parser(value_parser!(PathBuf)))
        .arg(arg!(-o --output <path> "base name of the artifacts; defaults to <file> without its extension").required(false).value_parser(value_parser!(PathBuf)))
        .arg(arg!(--backend <backend> "mips|llvm").required(false).default_value("mips"))
        .arg(arg!(--"emit-only" "write the .s or .ll file and stop before running any external tool"))
        .arg(arg!(--"target-cpu" <cpu> "cpu passed to llc instead of `native`").required(false))
        .arg(arg!(--"target-features" <features> "llc -mattr list used instead of host detection").required(false))
        .arg(arg!(--runtime <path> "prebuilt runtime to link against; also read from COOLC_RUNTIME").required(false).value_parser(value_parser!(PathBuf)))
        .arg(arg!(--"gc-test" "make the collector run on every allocation (mips)"))
        .arg(arg!(--"trace-codegen" "trace code generation on stderr"))
}

/// Typed view over the parsed command line and the tool environment.
pub struct CompilerOptions(pub ArgMatches);

impl CompilerOptions {
    pub fn parse() -> Self {
        CompilerOptions(cli().get_matches())
    }

    pub fn file(&self) -> &Path {
        match self.0.get_one::<PathBuf>("file") {
            Some(p) => p,
            None => panic!("impl bug: clap enforces the required file argument"),
        }
    }

    /// Base path without extension; each artifact adds its own.
    pub fn output_base(&self) -> PathBuf {
        match self.0.get_one::<PathBuf>("output") {
            Some(p) => p.with_extension(""),
            None => self.file().with_extension(""),
        }
    }

    pub fn backend(&self) -> Result<BackendKind, strum::ParseError> {
        self.0
            .get_one::<String>("backend")
            .map(String::as_str)
            .unwrap_or("mips")
            .parse()
    }

    pub fn emit_only(&self) -> bool {
        self.0.get_flag("emit-only")
    }

    pub fn target_cpu(&self) -> Option<&str> {
        self.0.get_one::<String>("target-cpu").map(String::as_str)
    }

    pub fn target_features(&self) -> Option<&str> {
        self.0.get_one::<String>("target-features").map(String::as_str)
    }

    pub fn runtime(&self) -> Option<PathBuf> {
        self.0
            .get_one::<PathBuf>("runtime")
            .cloned()
            .or_else(|| std::env::var_os(RUNTIME_ENV).map(PathBuf::from))
    }

    pub fn gc_test(&self) -> bool {
        self.0.get_flag("gc-test")
    }

    pub fn trace_codegen(&self) -> bool {
        self.0.get_flag("trace-codegen")
    }

    pub fn llc(&self) -> String {
        std::env::var(LLC_ENV).unwrap_or_else(|_| "llc".to_string())
    }

    pub fn linker(&self) -> String {
        std::env::var(LINKER_ENV).unwrap_or_else(|_| "cc".to_string())
    }

    /// No default: MIPS output is usually run under a simulator, not assembled.
    pub fn assembler(&self) -> Option<String> {
        std::env::var(ASSEMBLER_ENV).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(args: &[&str]) -> CompilerOptions {
        CompilerOptions(cli().get_matches_from(std::iter::once("coolc").chain(args.iter().copied())))
    }

    #[test]
    fn defaults() {
        let o = opts(&["prog.json"]);
        assert_eq!(BackendKind::Mips, o.backend().unwrap());
        assert_eq!(PathBuf::from("prog"), o.output_base());
        assert!(!o.emit_only());
        assert!(!o.gc_test());
        assert_eq!(None, o.target_cpu());
    }

    #[test]
    fn overrides() {
        let o = opts(&[
            "prog.json",
            "--backend",
            "llvm",
            "-o",
            "out/hello.ll",
            "--target-cpu",
            "skylake",
            "--emit-only",
            "--gc-test",
        ]);
        assert_eq!(BackendKind::Llvm, o.backend().unwrap());
        assert_eq!(PathBuf::from("out/hello"), o.output_base());
        assert_eq!(Some("skylake"), o.target_cpu());
        assert!(o.emit_only() && o.gc_test());
        assert_eq!("ll", o.backend().unwrap().extension());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(opts(&["prog.json", "--backend", "x86"]).backend().is_err());
    }
}
