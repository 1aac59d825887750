//! 重连间隔的校验和指数退避策略。
//! Reconnect interval sanitizing and the exponential backoff policy.

use std::fmt;
use std::time::Duration;
use tracing::warn;

/// The lowest reconnect interval the supervisor accepts.
/// 监管器接受的最低重连间隔。
pub const MIN_RECONNECT_INTERVAL: Duration = Duration::from_millis(100);

/// The lowest state polling interval the supervisor accepts.
/// 监管器接受的最低状态轮询间隔。
pub const MIN_STATE_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Which interval an [`Adjustment`] applies to.
/// [`Adjustment`] 所针对的间隔。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalKind {
    Reconnect,
    StateCheck,
}

impl IntervalKind {
    fn label(self) -> &'static str {
        match self {
            IntervalKind::Reconnect => "reconnect interval",
            IntervalKind::StateCheck => "check state interval",
        }
    }
}

/// A single clamp applied by [`sanitize`].
///
/// [`sanitize`] 执行的一次钳制。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub kind: IntervalKind,
    pub requested: Duration,
    pub applied: Duration,
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} less than {:?}, using {:?}",
            self.kind.label(),
            self.requested,
            self.applied,
            self.applied
        )
    }
}

/// The result of [`sanitize`]: intervals that are safe to use.
///
/// [`sanitize`] 的结果：可以安全使用的间隔。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedIntervals {
    pub reconnect_interval: Duration,
    pub state_check_interval: Duration,
    /// Every clamp that was applied, in the order it was applied.
    /// 按应用顺序记录的所有钳制。
    pub adjustments: Vec<Adjustment>,
}

/// Clamps the reconnect and state-check intervals to their floors.
///
/// Each clamp is logged as a warning naming the service, the requested value
/// and the value in use. This never fails.
///
/// 将重连间隔和状态检查间隔钳制到其下限。
///
/// 每次钳制都会记录一条警告，包含服务名、请求值和实际使用的值。此函数永不失败。
pub fn sanitize(
    service: &str,
    reconnect_interval: Duration,
    state_check_interval: Duration,
) -> SanitizedIntervals {
    let mut adjustments = Vec::new();
    let reconnect_interval = clamp(
        IntervalKind::Reconnect,
        reconnect_interval,
        MIN_RECONNECT_INTERVAL,
        &mut adjustments,
    );
    let state_check_interval = clamp(
        IntervalKind::StateCheck,
        state_check_interval,
        MIN_STATE_CHECK_INTERVAL,
        &mut adjustments,
    );

    for adjustment in &adjustments {
        warn!(service, "{service} {adjustment}");
    }

    SanitizedIntervals {
        reconnect_interval,
        state_check_interval,
        adjustments,
    }
}

fn clamp(
    kind: IntervalKind,
    requested: Duration,
    floor: Duration,
    adjustments: &mut Vec<Adjustment>,
) -> Duration {
    if requested >= floor {
        return requested;
    }
    adjustments.push(Adjustment {
        kind,
        requested,
        applied: floor,
    });
    floor
}

/// Exponential backoff parameters for reconnection attempts.
///
/// The defaults are the conventional RPC client values; only the maximum
/// delay is tuned per connection.
///
/// 重连尝试的指数退避参数。
///
/// 默认值为常规RPC客户端的取值；每个连接只调整最大延迟。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    /// 第一次重试前的延迟。
    pub base_delay: Duration,
    /// Growth factor applied per failed attempt.
    /// 每次失败尝试后应用的增长因子。
    pub multiplier: f64,
    /// Relative randomization applied to each delay, in `[0, 1)`.
    /// 应用于每次延迟的相对随机化，范围 `[0, 1)`。
    pub jitter: f64,
    /// Upper bound of the un-jittered delay.
    /// 未加抖动时延迟的上限。
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 1.6,
            jitter: 0.2,
            max_delay: Duration::from_secs(120),
        }
    }
}

impl BackoffPolicy {
    /// Standard defaults with `max_delay` replaced.
    /// 使用标准默认值并替换 `max_delay`。
    pub fn with_max_delay(max_delay: Duration) -> Self {
        Self {
            max_delay,
            ..Self::default()
        }
    }

    /// The un-jittered delay before retry number `attempt` (0-based).
    ///
    /// 第 `attempt` 次重试（从0开始）之前未加抖动的延迟。
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let max = self.max_delay.as_secs_f64();
        let mut delay = self.base_delay.as_secs_f64().min(max);
        for _ in 0..attempt {
            if delay >= max {
                break;
            }
            delay = (delay * self.multiplier).min(max);
        }
        Duration::from_secs_f64(delay)
    }

    /// The jittered delay before retry number `attempt`.
    ///
    /// 第 `attempt` 次重试之前加抖动的延迟。
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt).as_secs_f64();
        // random::<f64>() is in [0, 1); map it to [-1, 1).
        let spread = rand::random::<f64>() * 2.0 - 1.0;
        let jittered = delay * (1.0 + self.jitter * spread);
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Tracks consecutive failed attempts against a [`BackoffPolicy`].
///
/// 根据 [`BackoffPolicy`] 跟踪连续失败的尝试次数。
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Returns the delay to wait before the next attempt and counts the failure.
    ///
    /// 返回下一次尝试前需要等待的延迟，并记录这次失败。
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Forgets previous failures, e.g. after a successful connect.
    /// 忘记之前的失败，例如在成功连接之后。
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}
