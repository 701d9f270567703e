use anyhow::Context;

use coolc::{
    config::CompilerOptions,
    error::CodegenError,
    finalize::Finalizer,
    logging,
    mips::MipsOptions,
    util::{self, ReturnCode},
};

fn run(opts: &CompilerOptions) -> anyhow::Result<()> {
    let backend = match opts.backend() {
        Ok(b) => b,
        Err(_) => {
            eprintln!("--backend must be one of mips|llvm");
            util::exit(ReturnCode::ExUsage);
        }
    };

    let file = opts.file();
    let program = coolc::read_program(file)?;
    let source_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let text = coolc::compile(
        program,
        backend,
        MipsOptions {
            gc_test: opts.gc_test(),
        },
        &source_name,
    );

    let finalizer = Finalizer::from_options(opts, backend)?;
    let produced = finalizer
        .run(&text)
        .with_context(|| format!("finalizing {}", file.display()))?;
    for path in produced {
        tracing::info!(path = %path.display(), "produced");
    }
    Ok(())
}

fn main() {
    let opts = CompilerOptions::parse();
    logging::init(opts.trace_codegen());

    if let Err(err) = run(&opts) {
        eprintln!("{:#}", err);
        let rc = match err.downcast_ref::<CodegenError>() {
            Some(e) => e.return_code(),
            None => ReturnCode::OtherErrors,
        };
        util::exit(rc);
    }
    util::exit(ReturnCode::Ok);
}
