//! 定义了网关连接和进程的可配置参数。
//! Defines configurable parameters for gateway connections and the process.
//!
//! Values are resolved once at startup from command-line flags or the
//! environment. Any parse failure is a fatal configuration error.

use crate::error::{Error, Result};
use clap::Parser;
use std::{ffi::OsString, time::Duration};

/// A structure containing all configurable parameters for the gateway.
///
/// 包含网关所有可配置参数的结构体。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Connection lifecycle parameters shared by every backend connection.
    /// 所有后端连接共享的连接生命周期参数。
    pub connection: ConnectionConfig,

    /// The backend services to connect to, in registration order.
    /// 要连接的后端服务，按注册顺序排列。
    pub services: Vec<ServiceTarget>,

    /// Logging parameters.
    /// 日志参数。
    pub logging: LoggingConfig,
}

/// Connection lifecycle parameters.
///
/// 连接生命周期参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Upper bound for a single connection attempt.
    /// 单次连接尝试的上限。
    pub connect_timeout: Duration,
    /// The maximum delay between reconnection attempts.
    /// 重连尝试之间的最大延迟。
    pub reconnect_interval: Duration,
    /// How often each state watcher polls its connection.
    /// 每个状态观察器轮询其连接的频率。
    pub state_check_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            reconnect_interval: Duration::from_secs(1),
            state_check_interval: Duration::from_millis(500),
        }
    }
}

/// A named backend service address.
///
/// 一个具名的后端服务地址。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    pub name: String,
    pub address: String,
}

/// Output format of the log subscriber.
/// 日志订阅器的输出格式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging parameters.
///
/// 日志参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    /// 默认过滤指令，设置 `RUST_LOG` 时会被覆盖。
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Command-line and environment surface of the gateway binary.
///
/// 网关二进制程序的命令行和环境变量接口。
#[derive(Debug, Parser)]
#[command(name = "front-gateway", version, about = "Front gateway connection supervisor")]
pub struct Cli {
    /// Upper bound for a single connection attempt (e.g. 2s, 500ms).
    #[arg(long, env = "RPC_CONNECTION_TIMEOUT", default_value = "2s", value_parser = parse_duration)]
    pub connect_timeout: Duration,

    /// Maximum delay between reconnection attempts.
    #[arg(long, env = "RPC_RECONNECT_INTERVAL", default_value = "1s", value_parser = parse_duration)]
    pub reconnect_interval: Duration,

    /// Connectivity state polling cadence.
    #[arg(long, env = "RPC_CHECK_STATE_INTERVAL", default_value = "500ms", value_parser = parse_duration)]
    pub check_state_interval: Duration,

    /// Backend services as `name=address`, comma separated.
    #[arg(
        long = "service",
        env = "GATEWAY_SERVICES",
        value_delimiter = ',',
        value_parser = parse_service
    )]
    pub services: Vec<ServiceTarget>,

    /// Default log filter directive.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            connection: ConnectionConfig {
                connect_timeout: cli.connect_timeout,
                reconnect_interval: cli.reconnect_interval,
                state_check_interval: cli.check_state_interval,
            },
            services: cli.services,
            logging: LoggingConfig {
                filter: cli.log_level,
                format: cli.log_format,
            },
        }
    }
}

impl Config {
    /// Resolves the configuration from the process arguments and environment.
    /// `--help` and `--version` print their output and exit the process
    /// with status 0.
    ///
    /// 从进程参数和环境变量解析配置。`--help` 和 `--version` 会打印输出并以状态0退出进程。
    pub fn load() -> Result<Self> {
        match Cli::try_parse() {
            Ok(cli) => Ok(cli.into()),
            Err(e) if is_informational(&e) => e.exit(),
            Err(e) => Err(parse_error(e)),
        }
    }

    /// Resolves the configuration from an explicit argument list. Environment
    /// variables still apply to flags that are not given.
    ///
    /// 从显式参数列表解析配置。未给出的标志仍然使用环境变量。
    pub fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(parse_error)?;
        Ok(cli.into())
    }
}

/// Help and version requests surface as clap errors but are not failures.
fn is_informational(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
    )
}

fn parse_error(err: clap::Error) -> Error {
    Error::ConfigurationFatal(format!("parse config: {err}"))
}

/// Parses a duration such as `500ms`, `2s`, `1m30s` or `1h`.
///
/// 解析诸如 `500ms`、`2s`、`1m30s` 或 `1h` 的时长。
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("missing unit in duration {input:?}"))?;
        if digits_end == 0 {
            return Err(format!("invalid duration {input:?}"));
        }
        let value: f64 = rest[..digits_end]
            .parse()
            .map_err(|_| format!("invalid number in duration {input:?}"))?;
        rest = &rest[digits_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let seconds_per_unit = match unit {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            other => return Err(format!("unknown unit {other:?} in duration {input:?}")),
        };
        total = Duration::try_from_secs_f64(value * seconds_per_unit)
            .ok()
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| format!("duration {input:?} out of range"))?;
    }
    Ok(total)
}

/// Parses a `name=address` service entry.
///
/// 解析 `name=address` 形式的服务条目。
pub fn parse_service(input: &str) -> std::result::Result<ServiceTarget, String> {
    let (name, address) = input
        .split_once('=')
        .ok_or_else(|| format!("service {input:?} must be written as name=address"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("service {input:?} has an empty name"));
    }
    // An empty address is accepted here and rejected by the establisher,
    // which owns that invariant.
    Ok(ServiceTarget {
        name: name.to_string(),
        address: address.trim().to_string(),
    })
}
