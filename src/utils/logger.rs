use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日誌過濾：RUST_LOG 優先，其次 `--verbose`，最後是設定檔的 `[logging] level`
pub fn build_filter(level: &str, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level, verbose)))
}

fn filter_directive(level: &str, verbose: bool) -> String {
    if verbose {
        // 只有自己的 crate 開到 debug，reqwest/hyper 維持 info
        "cms_dashboard=debug,info".to_string()
    } else {
        format!("cms_dashboard={}", level.trim().to_ascii_lowercase())
    }
}

/// CLI 模式：精簡、無 target 的單行輸出
pub fn init_cli_logger(level: &str, verbose: bool) {
    tracing_subscriber::registry()
        .with(build_filter(level, verbose))
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();
}

/// `serve` 部署用，輸出 JSON 給收集器
pub fn init_json_logger(level: &str, verbose: bool) {
    tracing_subscriber::registry()
        .with(build_filter(level, verbose))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
