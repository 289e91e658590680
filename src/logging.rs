use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset. HTTP client internals stay quiet so
/// indexer runs only show their own progress.
pub const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn";

pub fn filter_from(env: Option<&str>) -> anyhow::Result<EnvFilter> {
    match env.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => EnvFilter::try_new(raw).with_context(|| format!("parse RUST_LOG: {raw}")),
        None => EnvFilter::try_new(DEFAULT_DIRECTIVES).context("build default log filter"),
    }
}

pub fn init() -> anyhow::Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_from(env.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
