use std::time::Duration;

use banner_backend::startup::{load_font_catalog, run_startup_checks};
use banner_backend::{AppConfig, AppState, ShutdownManager, build_app};

#[tokio::main]
async fn main() {
    // Load config（日志尚未初始化，失败时直接输出到 stderr）
    let config = match AppConfig::init_global() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config init failed: {e}");
            std::process::exit(1);
        }
    };

    // RUST_LOG 优先，否则使用配置中的级别
    let fallback_filter = format!(
        "banner_backend={},tower_http={}",
        config.logging.level, config.logging.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback_filter.into());
    if config.logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler() {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run_startup_checks(config).await {
        tracing::error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    let fonts = match load_font_catalog(config).await {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("字体加载失败: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = match AppState::build(config.clone(), fonts) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("应用状态初始化失败: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "渲染并发上限: {}, 响应缓存: {}",
        config.render.effective_parallelism(),
        if config.render.cache_enabled { "开启" } else { "关闭" }
    );

    let app = build_app(app_state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!("Banner API: http://{}{}/banner", addr, config.api.prefix);

    let shutdown_timeout = Duration::from_secs(config.shutdown.timeout_secs.max(1));
    let signal_manager = shutdown_manager.clone();
    let graceful = axum::serve(listener, app).with_graceful_shutdown(async move {
        let reason = signal_manager.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
    });

    // 收到退出信号后，在途请求最多再等待 shutdown.timeout_secs
    let server = tokio::spawn(async move { graceful.await });
    let result = tokio::select! {
        joined = server => joined,
        _ = async {
            shutdown_manager.wait_for_shutdown().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            tracing::warn!("优雅退出超时（{}秒），强制退出", shutdown_timeout.as_secs());
            std::process::exit(1);
        }
    };

    match result {
        Ok(Ok(())) => tracing::info!("服务器已优雅关闭"),
        Ok(Err(e)) => {
            tracing::error!("服务器运行错误: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("服务器任务异常退出: {}", e);
            std::process::exit(1);
        }
    }
}
