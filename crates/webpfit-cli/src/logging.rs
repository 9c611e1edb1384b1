use tracing_subscriber::filter::{EnvFilter, LevelFilter};

fn create_filter(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // RUST_LOG directives still win for the targets they name.
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the stderr subscriber. Must be called once, before any work starts.
pub fn init(verbose: u8) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(create_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to install logger: {err}"))
}
