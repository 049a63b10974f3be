use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3000
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 未设置时生效）
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 日志格式：full | compact | json
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    fn default_format() -> String {
        "full".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
        }
    }
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀
    #[serde(default = "ApiConfig::default_prefix")]
    pub prefix: String,
}

impl ApiConfig {
    fn default_prefix() -> String {
        "/api/v1".to_string()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
        }
    }
}

/// 渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// 是否优先速度渲染（OptimizeSpeed），可能略降画质
    #[serde(default)]
    pub optimize_speed: bool,
    /// 字体目录（ttf/otf），启动时加载一次
    #[serde(default = "RenderConfig::default_fonts_dir")]
    pub fonts_dir: String,
    /// 是否启用响应缓存
    #[serde(default = "RenderConfig::default_cache_enabled")]
    pub cache_enabled: bool,
    /// 缓存最大容量（字节），按图片字节大小加权
    #[serde(default = "RenderConfig::default_cache_max_bytes")]
    pub cache_max_bytes: u64,
    /// 缓存 TTL（秒）
    #[serde(default = "RenderConfig::default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// 缓存 TTI（秒）
    #[serde(default = "RenderConfig::default_cache_tti")]
    pub cache_tti_secs: u64,
    /// 并发渲染许可数（0=自动，取 CPU 核心数）
    #[serde(default)]
    pub max_parallel: u32,
    /// 等待渲染许可的最长时间（秒，0=不限）
    #[serde(default = "RenderConfig::default_permit_timeout")]
    pub permit_timeout_secs: u64,
    /// 客户端缓存时间（秒），用于 Cache-Control
    #[serde(default = "RenderConfig::default_client_max_age")]
    pub client_max_age_secs: u64,
}

impl RenderConfig {
    fn default_fonts_dir() -> String {
        "resources/fonts".to_string()
    }
    fn default_cache_enabled() -> bool {
        true
    }
    fn default_cache_max_bytes() -> u64 {
        64 * 1024 * 1024
    }
    fn default_cache_ttl() -> u64 {
        300
    }
    fn default_cache_tti() -> u64 {
        120
    }
    fn default_permit_timeout() -> u64 {
        30
    }
    fn default_client_max_age() -> u64 {
        300
    }

    /// 实际并发许可数
    pub fn effective_parallelism(&self) -> usize {
        if self.max_parallel == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_parallel as usize
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            optimize_speed: false,
            fonts_dir: Self::default_fonts_dir(),
            cache_enabled: Self::default_cache_enabled(),
            cache_max_bytes: Self::default_cache_max_bytes(),
            cache_ttl_secs: Self::default_cache_ttl(),
            cache_tti_secs: Self::default_cache_tti(),
            max_parallel: 0,
            permit_timeout_secs: Self::default_permit_timeout(),
            client_max_age_secs: Self::default_client_max_age(),
        }
    }
}

/// 远程图片拉取配置（底图、logo）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// 单次请求超时（秒）
    #[serde(default = "FetchConfig::default_timeout")]
    pub timeout_secs: u64,
    /// 单张图片最大字节数
    #[serde(default = "FetchConfig::default_max_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "FetchConfig::default_user_agent")]
    pub user_agent: String,
}

impl FetchConfig {
    fn default_timeout() -> u64 {
        10
    }
    fn default_max_bytes() -> usize {
        15 * 1024 * 1024
    }
    fn default_user_agent() -> String {
        concat!("banner-backend/", env!("CARGO_PKG_VERSION")).to_string()
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
            max_image_bytes: Self::default_max_bytes(),
            user_agent: Self::default_user_agent(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 收到退出信号后等待在途请求完成的最长时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// 渲染配置
    #[serde(default)]
    pub render: RenderConfig,
    /// 远程图片拉取配置
    #[serde(default)]
    pub fetch: FetchConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置（文件可缺省），支持环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            .add_source(File::from(config_path).required(false))
            // 例如：APP_SERVER__PORT=8080
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例（未初始化时使用默认配置）
    pub fn global() -> &'static AppConfig {
        CONFIG.get_or_init(AppConfig::default)
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<&'static AppConfig, ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(Self::global())
    }

    /// 配置文件路径（APP_CONFIG 可覆盖）
    fn get_config_path() -> PathBuf {
        std::env::var_os("APP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn fonts_path(&self) -> PathBuf {
        PathBuf::from(&self.render.fonts_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_a_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.api.prefix, "/api/v1");
        assert_eq!(cfg.server_addr(), "0.0.0.0:3000");
        assert!(cfg.render.effective_parallelism() >= 1);
        assert!(cfg.render.cache_enabled);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let cfg: AppConfig = ConfigBuilder::builder()
            .add_source(File::from_str(
                "[render]\nmax_parallel = 3\n[api]\nprefix = \"/v2\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize");
        assert_eq!(cfg.render.max_parallel, 3);
        assert_eq!(cfg.render.effective_parallelism(), 3);
        assert_eq!(cfg.api.prefix, "/v2");
        assert_eq!(cfg.fetch.timeout_secs, 10);
        assert_eq!(cfg.server.port, 3000);
    }
}
