pub mod logging {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    pub const DEFAULT_FILTER: &str = "model_port=info";
    pub const VERBOSE_FILTER: &str = "model_port=debug,info";

    pub fn filter_directive(verbose: bool) -> &'static str {
        if verbose {
            VERBOSE_FILTER
        } else {
            DEFAULT_FILTER
        }
    }

    /// Logs go to stderr so command output on stdout stays machine readable.
    /// `RUST_LOG` wins over the verbosity flag.
    pub fn init_cli_logger(verbose: bool) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose)));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .try_init();
    }

}
