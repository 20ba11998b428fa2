use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human readable lines on stderr
    #[default]
    Pretty,
    /// Bunyan JSON records on stdout
    Bunyan,
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "info,ecyber_harvest=debug,webdriver_bindings=debug,ffmpeg_bindings=debug"
    } else {
        "info"
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `verbose`.
///
/// Events are also forwarded to Sentry, which is a no-op unless a client
/// was initialised with a DSN.
pub fn init_tracing_subscriber(format: LogFormat, verbose: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let (pretty, bunyan) = match format {
        LogFormat::Pretty => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Bunyan => (
            None,
            Some(BunyanFormattingLayer::new(
                env!("CARGO_PKG_NAME").into(),
                std::io::stdout,
            )),
        ),
    };

    let subscriber = Registry::default()
        .with(env_filter)
        .with(bunyan.is_some().then_some(JsonStorageLayer))
        .with(bunyan)
        .with(pretty)
        .with(sentry_tracing::layer());

    ::tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
