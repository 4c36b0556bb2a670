use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Lines go to `log_path` (appended, created
/// if missing) when given, otherwise to stderr. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init(log_path: Option<&Path>) -> anyhow::Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

  match log_path {
    Some(path) => {
      let file = OpenOptions::new().create(true).append(true).open(path)?;
      builder
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| anyhow::anyhow!("cannot install logger: {err}"))?;
    }
    None => {
      builder
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("cannot install logger: {err}"))?;
    }
  }
  Ok(())
}
