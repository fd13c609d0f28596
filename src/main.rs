#[cfg(not(target_family = "wasm"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = carkv::config::load_config(None)?;
    tracing::debug!("Using {:?}", config);

    let factory = carkv::Factory::new(config.backend.provider());
    let (events, _receiver) = tokio::sync::mpsc::unbounded_channel();
    carkv::session::run(&factory, &config, &events).await
}

// The browser build starts through `carkv::session::start`
#[cfg(target_family = "wasm")]
fn main() {}
