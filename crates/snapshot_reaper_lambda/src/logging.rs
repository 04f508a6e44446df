use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// CloudWatch stamps every line, so Lambda output carries no timestamps and
/// no ANSI colours.
pub fn init_lambda_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(DEFAULT_FILTER))
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();
}

pub fn init_cli_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { DEFAULT_FILTER };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .with_writer(std::io::stderr)
        .init();
}
