use tracing_subscriber::EnvFilter;

/// Install the stderr `tracing` subscriber used by the binaries.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks between `debug` and
/// `info` for this crate and `warn` for everything else.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,ctxloop=debug"
    } else {
        "warn,ctxloop=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
