use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `coolc=debug`.
pub const LOG_ENV: &str = "COOLC_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Builds the filter directive from the environment value and the
/// `--trace-codegen` switch. The switch wins for this crate's targets.
pub fn directive(env_value: Option<&str>, trace_codegen: bool) -> String {
    let base = match env_value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => DEFAULT_DIRECTIVE.to_string(),
    };
    if trace_codegen {
        format!("{},coolc=trace", base)
    } else {
        base
    }
}

/// Installs the process-wide subscriber. Only the binary calls this.
pub fn init(trace_codegen: bool) {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = EnvFilter::try_new(directive(env_value.as_deref(), trace_codegen))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    // a second init (e.g. from a test harness) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
