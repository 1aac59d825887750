//! Best-effort cleanup used during shutdown.
//!
//! Nothing here propagates errors: a failed close is logged and reported
//! as `false` so the caller can carry on with the remaining resources.
//!
//! 关闭期间使用的尽力清理。
//!
//! 这里不会传播任何错误：关闭失败会被记录并以 `false` 报告，以便调用者继续处理其余资源。

use crate::{connection::ManagedConnection, subscription::Subscription};
use tracing::{error, info};

/// Closes the connection's channel. Returns `true` on success.
///
/// 关闭连接的通道。成功时返回 `true`。
pub async fn close_connection(connection: &ManagedConnection) -> bool {
    let service = connection.name();
    info!(service, "closing connection {service}");
    match connection.channel().close().await {
        Ok(()) => {
            info!(service, "closed connection {service}");
            true
        }
        Err(e) => {
            error!(service, error = %e, "close connection {service}: {e}");
            false
        }
    }
}

/// Releases the subscription. Returns `true` on success.
///
/// 释放订阅。成功时返回 `true`。
pub async fn unsubscribe(subscription: &Subscription) -> bool {
    let subject = subscription.subject();
    match subscription.unsubscribe().await {
        Ok(()) => {
            info!(subject, "unsubscribed from {subject}");
            true
        }
        Err(e) => {
            error!(subject, error = %e, "unsubscribe from {subject}: {e}");
            false
        }
    }
}
