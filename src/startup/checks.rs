use std::fs;
use std::path::Path;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::features::banner::fonts::FontCatalog;

/// 执行启动检查
///
/// 1. 检查字体目录（缺失时创建并告警，不阻断启动）
/// 2. 校验渲染配置
pub async fn run_startup_checks(config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("🔍 开始执行启动检查...");

    ensure_fonts_folder(&config.fonts_path())?;
    validate_render_config(config)?;

    tracing::info!("✅ 启动检查完成");
    Ok(())
}

/// 确保字体目录存在；目录为空只告警，渲染时回退到系统/默认字体
fn ensure_fonts_folder(dir: &Path) -> Result<(), AppError> {
    if !dir.exists() {
        tracing::warn!("📁 未找到字体目录，正在创建: {:?}", dir);
        fs::create_dir_all(dir)
            .map_err(|e| AppError::Internal(format!("创建字体目录失败: {e}")))?;
        return Ok(());
    }

    let font_files = fs::read_dir(dir)
        .map_err(|e| AppError::Internal(format!("读取字体目录失败: {e}")))?
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf"))
        })
        .count();
    if font_files == 0 {
        tracing::warn!("字体目录 {:?} 中没有 ttf/otf 文件，将使用系统字体", dir);
    } else {
        tracing::info!("✅ 字体目录就绪: {:?}（{} 个字体文件）", dir, font_files);
    }
    Ok(())
}

fn validate_render_config(config: &AppConfig) -> Result<(), AppError> {
    let render = &config.render;
    if render.cache_enabled && render.cache_max_bytes == 0 {
        return Err(AppError::Validation(
            "render.cache_max_bytes 为 0 时请关闭 render.cache_enabled".into(),
        ));
    }
    if config.fetch.max_image_bytes == 0 {
        return Err(AppError::Validation("fetch.max_image_bytes 必须大于 0".into()));
    }
    if !config.api.prefix.starts_with('/') {
        return Err(AppError::Validation(format!(
            "api.prefix 必须以 / 开头: {}",
            config.api.prefix
        )));
    }
    Ok(())
}

/// 在阻塞线程中扫描字体目录（含系统字体），构建共享字体目录
pub async fn load_font_catalog(config: &AppConfig) -> Result<FontCatalog, AppError> {
    let dir = config.fonts_path();
    let t = std::time::Instant::now();
    let catalog = tokio::task::spawn_blocking(move || FontCatalog::load(&dir, true))
        .await
        .map_err(|e| AppError::Internal(format!("字体加载任务失败: {e}")))?;
    tracing::info!(
        "字体目录加载完成: {} 个字体族, {}ms",
        catalog.family_count(),
        t.elapsed().as_millis()
    );
    Ok(catalog)
}
