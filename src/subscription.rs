//! Message-stream subscriptions held by the gateway.
//! 网关持有的消息流订阅。

use crate::error::Result;
use async_trait::async_trait;

/// The releasable side of a publish/subscribe subscription.
///
/// 发布/订阅中可释放的订阅端。
#[async_trait]
pub trait Unsubscribe: Send + Sync + 'static {
    /// Stops delivery for this subscription.
    /// 停止此订阅的投递。
    async fn unsubscribe(&self) -> Result<()>;
}

/// A subscription paired with the subject it listens on.
///
/// 订阅及其监听的主题。
pub struct Subscription {
    subject: String,
    handle: Box<dyn Unsubscribe>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub fn new(subject: impl Into<String>, handle: impl Unsubscribe) -> Self {
        Self {
            subject: subject.into(),
            handle: Box::new(handle),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub async fn unsubscribe(&self) -> Result<()> {
        self.handle.unsubscribe().await
    }
}
