//! Process-wide `tracing` subscriber setup.
//! 进程级 `tracing` 订阅器设置。

use crate::{
    config::{LogFormat, LoggingConfig},
    error::{Error, Result},
};
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured filter. Installing twice,
/// or an unparsable filter, is a fatal configuration error.
///
/// 安装由 `config` 描述的全局订阅器。
///
/// `RUST_LOG` 优先于配置的过滤器。重复安装或无法解析的过滤器都是致命配置错误。
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.filter),
    }
    .map_err(|e| Error::ConfigurationFatal(format!("new logger: {e}")))?;

    let builder = fmt().with_env_filter(filter).with_target(false);
    let installed = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };
    installed.map_err(|e| Error::ConfigurationFatal(format!("new logger: {e}")))
}
