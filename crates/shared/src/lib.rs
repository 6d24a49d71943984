use std::{path::PathBuf, sync::Once};

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

pub mod api;
pub mod model;

/// Filter used when RUST_LOG isn't set
const DEFAULT_LOG_FILTER: &str = "info,service_worker=debug,server=debug";

pub fn configure_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::TRACE)
            .with_env_filter(filter)
            .with_line_number(true)
            .with_file(true)
            .with_span_events(FmtSpan::CLOSE)
            .finish(),
    )
    .expect("Failed to set default tracing subscriber");
}

/// Configures tracing inside a Once block so multiple calls don't panic
pub fn configure_tracing_once() {
    static ONCE: Once = Once::new();
    ONCE.call_once(configure_tracing);
}

pub fn load_dotenv() -> Result<Option<PathBuf>, dotenv::Error> {
    match dotenv::dotenv() {
        // Swallow NotFound error since the .env is optional
        Err(dotenv::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        r => r.map(Some),
    }
}
