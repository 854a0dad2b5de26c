//! Log output setup shared by the binaries.
//!
//! The scout library never installs a subscriber itself; it logs through
//! whatever [`Dispatch`] it is handed. [`dispatch`] builds one and [`init`]
//! additionally makes it the global default for the calling binary.

use std::env::var;

use tracing::{Dispatch, dispatcher::SetGlobalDefaultError, level_filters::LevelFilter};
use tracing_subscriber::{Layer, Registry, filter::EnvFilter, layer::SubscriberExt};

/// Output format selected with `RUST_LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Compact,
    Json,
}

impl Format {
    /// Read `RUST_LOG_FORMAT`; anything but `json` is compact
    pub fn from_env() -> Self {
        Self::parse(&var("RUST_LOG_FORMAT").unwrap_or_default())
    }

    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") { Format::Json } else { Format::Compact }
    }
}

/// Install the default subscriber at `INFO`, overridable with `RUST_LOG`
pub fn init() -> Dispatch {
    init_with_level(LevelFilter::INFO)
}

/// Install the default subscriber and hand back a clone for injection.
///
/// Calling it twice keeps the first subscriber.
pub fn init_with_level(level: LevelFilter) -> Dispatch {
    let dispatch = dispatch(level, Format::from_env());
    if try_init(dispatch.clone()).is_err() {
        tracing::dispatcher::get_default(Clone::clone)
    } else {
        dispatch
    }
}

pub fn try_init(dispatch: Dispatch) -> Result<(), SetGlobalDefaultError> {
    tracing::dispatcher::set_global_default(dispatch)
}

/// Build a subscriber without installing it
pub fn dispatch(level: LevelFilter, format: Format) -> Dispatch {
    Dispatch::new(tracing_subscriber::registry().with(layer(level, format)))
}

fn layer(level: LevelFilter, format: Format) -> Box<dyn Layer<Registry> + Send + Sync> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    match format {
        Format::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        Format::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    }
}
