//! 优雅退出：监听 Ctrl+C / SIGTERM，并把退出原因广播给等待者。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

/// 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
    /// 进程内主动触发
    Application,
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("信号设置失败: {0}")]
    SignalSetup(String),

    #[error("优雅退出超时")]
    Timeout,
}

/// 退出协调器；克隆后共享同一状态，只有第一次触发生效
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        let first = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if first {
            info!("触发优雅退出: {:?}", reason);
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// 等待退出；已触发过时立即返回首次原因
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).unwrap_or(ShutdownReason::Application),
            Err(_) => ShutdownReason::Application,
        }
    }

    pub async fn wait_with_timeout(&self, limit: Duration) -> Result<ShutdownReason, ShutdownError> {
        tokio::time::timeout(limit, self.wait_for_shutdown())
            .await
            .map_err(|_| ShutdownError::Timeout)
    }

    /// 启动信号监听任务（Unix 监听 SIGINT/SIGTERM，其它平台仅 Ctrl+C）
    pub fn start_signal_handler(&self) -> Result<(), ShutdownError> {
        let manager = self.clone();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigint = signal(SignalKind::interrupt())
                .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
            let mut sigterm = signal(SignalKind::terminate())
                .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
            tokio::spawn(async move {
                let reason = tokio::select! {
                    _ = sigint.recv() => ShutdownReason::Interrupt,
                    _ = sigterm.recv() => ShutdownReason::Terminate,
                };
                manager.trigger_shutdown(reason);
            });
        }

        #[cfg(not(unix))]
        {
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("监听 Ctrl+C 失败: {}", e);
                    return;
                }
                manager.trigger_shutdown(ShutdownReason::Interrupt);
            });
        }

        Ok(())
    }
}
