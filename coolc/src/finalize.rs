//! Writes the generated unit to disk and drives the external tools:
//! `llc` and the linker for the native backend, an optional assembler for MIPS.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    config::{BackendKind, CompilerOptions},
    error::{CodegenError, Result},
};

/// Best vector extension of the machine we are running on, in `-mattr` form.
#[cfg(target_arch = "x86_64")]
pub fn host_features() -> Option<&'static str> {
    if std::arch::is_x86_feature_detected!("avx512f") {
        Some("+avx512f")
    } else if std::arch::is_x86_feature_detected!("avx2") {
        Some("+avx2")
    } else if std::arch::is_x86_feature_detected!("sse4.2") {
        Some("+sse4.2")
    } else {
        None
    }
}

#[cfg(target_arch = "aarch64")]
pub fn host_features() -> Option<&'static str> {
    if std::arch::is_aarch64_feature_detected!("neon") {
        Some("+neon")
    } else {
        None
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub fn host_features() -> Option<&'static str> {
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub cpu: String,
    pub features: Option<String>,
}

impl TargetSpec {
    /// Explicit settings win over host detection.
    pub fn resolve(cpu: Option<&str>, features: Option<&str>) -> Result<Self> {
        let cpu = cpu.unwrap_or("native");
        if cpu.trim().is_empty() {
            return Err(CodegenError::Target("empty cpu name".into()));
        }
        Ok(TargetSpec {
            cpu: cpu.to_string(),
            features: features
                .map(String::from)
                .or_else(|| host_features().map(String::from)),
        })
    }
}

pub fn write_artifact(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|source| CodegenError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), bytes = text.len(), "wrote artifact");
    Ok(())
}

pub fn run_command(mut cmd: Command, tool: &str) -> Result<()> {
    tracing::debug!(command = ?cmd, "running {}", tool);
    let status = cmd.status().map_err(|source| CodegenError::ToolMissing {
        tool: tool.to_string(),
        source,
    })?;
    if !status.success() {
        return Err(CodegenError::ToolFailed {
            tool: tool.to_string(),
            status,
        });
    }
    Ok(())
}

pub fn llc_command(llc: &str, target: &TargetSpec, ir: &Path, object: &Path) -> Command {
    let mut cmd = Command::new(llc);
    cmd.arg("-filetype=obj")
        .arg(format!("-mcpu={}", target.cpu));
    if let Some(features) = &target.features {
        cmd.arg(format!("-mattr={}", features));
    }
    cmd.arg("-o").arg(object).arg(ir);
    cmd
}

pub fn link_command(linker: &str, object: &Path, runtime: &Path, exe: &Path) -> Command {
    let mut cmd = Command::new(linker);
    cmd.arg(object).arg(runtime).arg("-o").arg(exe);
    cmd
}

#[derive(Debug)]
pub struct Finalizer {
    pub backend: BackendKind,
    pub output_base: PathBuf,
    pub emit_only: bool,
    pub target: TargetSpec,
    pub llc: String,
    pub linker: String,
    pub assembler: Option<String>,
    pub runtime: Option<PathBuf>,
}

impl Finalizer {
    pub fn from_options(opts: &CompilerOptions, backend: BackendKind) -> Result<Self> {
        Ok(Finalizer {
            backend,
            output_base: opts.output_base(),
            emit_only: opts.emit_only(),
            target: TargetSpec::resolve(opts.target_cpu(), opts.target_features())?,
            llc: opts.llc(),
            linker: opts.linker(),
            assembler: opts.assembler(),
            runtime: opts.runtime(),
        })
    }

    fn artifact(&self, extension: &str) -> PathBuf {
        self.output_base.with_extension(extension)
    }

    /// Returns every file produced, in the order they were produced.
    pub fn run(&self, text: &str) -> Result<Vec<PathBuf>> {
        let source = self.artifact(self.backend.extension());
        write_artifact(&source, text)?;
        let mut produced = vec![source.clone()];
        if self.emit_only {
            return Ok(produced);
        }

        match self.backend {
            BackendKind::Mips => {
                if let Some(assembler) = &self.assembler {
                    let object = self.artifact("o");
                    let mut cmd = Command::new(assembler);
                    cmd.arg(&source).arg("-o").arg(&object);
                    run_command(cmd, assembler)?;
                    produced.push(object);
                }
            }
            BackendKind::Llvm => {
                let object = self.artifact("o");
                run_command(llc_command(&self.llc, &self.target, &source, &object), &self.llc)?;
                produced.push(object.clone());

                match &self.runtime {
                    Some(runtime) => {
                        let exe = self.output_base.clone();
                        run_command(link_command(&self.linker, &object, runtime, &exe), &self.linker)?;
                        produced.push(exe);
                    }
                    None => tracing::info!("no runtime given; stopping after the object file"),
                }
            }
        }
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn finalizer(dir: &Path, backend: BackendKind, emit_only: bool) -> Finalizer {
        Finalizer {
            backend,
            output_base: dir.join("prog"),
            emit_only,
            target: TargetSpec {
                cpu: "native".into(),
                features: None,
            },
            llc: "coolc-test-no-such-llc".into(),
            linker: "cc".into(),
            assembler: None,
            runtime: None,
        }
    }

    #[test]
    fn explicit_target_wins() {
        let t = TargetSpec::resolve(Some("skylake"), Some("+avx2")).unwrap();
        assert_eq!("skylake", t.cpu);
        assert_eq!(Some("+avx2".to_string()), t.features);
        assert!(TargetSpec::resolve(Some(" "), None).is_err());
    }

    #[test]
    fn llc_gets_cpu_and_features() {
        let t = TargetSpec {
            cpu: "native".into(),
            features: Some("+sse4.2".into()),
        };
        let cmd = llc_command("llc", &t, Path::new("a.ll"), Path::new("a.o"));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(
            vec!["-filetype=obj", "-mcpu=native", "-mattr=+sse4.2", "-o", "a.o", "a.ll"],
            args
        );
    }

    #[test]
    fn emit_only_writes_just_the_text() {
        let dir = tempfile::tempdir().unwrap();
        let f = finalizer(dir.path(), BackendKind::Llvm, true);
        let produced = f.run("; empty module\n").unwrap();
        assert_eq!(vec![dir.path().join("prog.ll")], produced);
        assert_eq!("; empty module\n", fs::read_to_string(&produced[0]).unwrap());
    }

    #[test]
    fn mips_without_assembler_stops_after_text() {
        let dir = tempfile::tempdir().unwrap();
        let produced = finalizer(dir.path(), BackendKind::Mips, false).run("\t.text\n").unwrap();
        assert_eq!(vec![dir.path().join("prog.s")], produced);
    }

    #[test]
    fn missing_llc_is_a_toolchain_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = finalizer(dir.path(), BackendKind::Llvm, false)
            .run("; module\n")
            .unwrap_err();
        assert!(matches!(err, CodegenError::ToolMissing { .. }));
        assert_eq!(crate::util::ReturnCode::ToolchainError as i32, err.return_code() as i32);
    }

    #[test]
    fn unwritable_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = finalizer(dir.path(), BackendKind::Mips, true);
        f.output_base = dir.path().join("missing").join("prog");
        assert!(matches!(f.run("x").unwrap_err(), CodegenError::Output { .. }));
    }
}
