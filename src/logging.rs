use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize structured JSON logging on stderr.
///
/// stdout belongs to the ELAN recognizer protocol, so diagnostics must never
/// land there. Defaults to `error` level unless overridden by
/// `TIERSCRIBE_LOG`.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_env_var("TIERSCRIBE_LOG")
        .with_default_directive(tracing::level_filters::LevelFilter::ERROR.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init();
}
