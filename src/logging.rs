//! 日志初始化：`RUST_LOG` 优先，否则使用面板的默认过滤规则。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 请求级日志走 `tower_http`；连接层与 TLS 握手的噪声压到 warn。
const DEFAULT_LOG_FILTER: &str = "info,tower_http=info,hyper=warn,rustls=warn";

pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
