//! 会话清理与残留暂存目录清理的后台任务。

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::auth::{AuthConfig, prune_expired_sessions, prune_login_attempts};
use crate::config::{SESSION_PRUNE_INTERVAL_SECS, SPOOL_CLEAN_INTERVAL_SECS};
use crate::spool::Spool;

pub fn spawn_background_tasks(auth: Arc<AuthConfig>, spool: Arc<Spool>, spool_ttl: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SESSION_PRUNE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            prune_expired_sessions(&auth).await;
            prune_login_attempts(&auth).await;
        }
    });

    if spool_ttl.is_zero() {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SPOOL_CLEAN_INTERVAL_SECS));
        loop {
            interval.tick().await;
            if let Err(err) = spool.cleanup_stale(spool_ttl).await {
                warn!(error = %err, "spool cleanup failed");
            }
        }
    });
}
