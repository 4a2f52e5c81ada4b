use crate::error::{ErrorKind, Result};
use cairn_config::{LogConfig, LogFormat};
use exn::ResultExt;
use tracing_subscriber::EnvFilter;

/// The SDK and its HTTP stack log every request at `debug`.
const QUIET_TARGETS: [&str; 4] = ["aws_config", "aws_smithy_runtime", "aws_sdk_glacier", "hyper_util"];

/// `RUST_LOG` wins over the configured level when set.
fn filter(config: &LogConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let mut directives = vec![config.level.clone()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    EnvFilter::try_new(directives.join(",")).or_raise(|| ErrorKind::Logging)
}

/// Install the global subscriber. Logs go to stderr, leaving stdout to command output.
pub fn init(config: &LogConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config)?)
        .with_target(true)
        .with_writer(std::io::stderr);
    let installed = match config.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    installed.or_raise(|| ErrorKind::Logging)
}
