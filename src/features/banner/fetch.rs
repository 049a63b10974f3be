use std::time::Duration;

use axum::body::Bytes;
use base64::{Engine as _, engine::general_purpose};
use futures_util::StreamExt;
use reqwest::Client;

use super::types::ImageSource;
use crate::config::FetchConfig;
use crate::error::AppError;

/// 解码内联图片：`data:<mime>;base64,<payload>` 或裸 base64。
///
/// 查询串中的 `+` 常被解码为空格，这里按 `+` 还原；其余空白忽略。
pub fn decode_inline(data: &str) -> Result<Vec<u8>, AppError> {
    if data.trim().is_empty() {
        return Err(AppError::InvalidImageData("图片数据为空".into()));
    }
    // 首尾的空格可能是被解码的 `+`，只去掉其它空白
    let trimmed = data.trim_matches(|c: char| c.is_whitespace() && c != ' ');
    let payload = match trimmed.trim_start().strip_prefix("data:") {
        Some(rest) => {
            let (meta, payload) = rest
                .split_once(',')
                .ok_or_else(|| AppError::InvalidImageData("data URI 缺少数据段".into()))?;
            if !meta.to_ascii_lowercase().ends_with(";base64") {
                return Err(AppError::InvalidImageData(
                    "仅支持 base64 编码的 data URI".into(),
                ));
            }
            payload
        }
        None => trimmed,
    };

    let cleaned: String = payload
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('+'),
            c if c.is_whitespace() => None,
            c => Some(c),
        })
        .collect();
    let unpadded = cleaned.trim_end_matches('=');
    if unpadded.is_empty() {
        return Err(AppError::InvalidImageData("图片数据为空".into()));
    }

    general_purpose::STANDARD_NO_PAD
        .decode(unpadded)
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(unpadded))
        .map_err(AppError::from)
}

/// 远程图片拉取（底图、logo），带超时与大小上限
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP 客户端初始化失败: {e}")))?;
        Ok(Self {
            client,
            max_bytes: config.max_image_bytes,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<Bytes, AppError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Network(format!("{url} 返回 {status}")));
        }

        // 先按 Content-Length 快速拒绝，缺失时由流式累计兜底
        if let Some(len) = response.content_length()
            && len as usize > self.max_bytes
        {
            return Err(AppError::InvalidImageData(format!(
                "图片过大: content-length={len} 超过上限 {}",
                self.max_bytes
            )));
        }

        let mut stream = response.bytes_stream();
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if out.len() + chunk.len() > self.max_bytes {
                return Err(AppError::InvalidImageData(format!(
                    "图片过大: 超过上限 {}",
                    self.max_bytes
                )));
            }
            out.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(out))
    }

    /// 读取图片来源的原始字节
    pub async fn load(&self, source: &ImageSource) -> Result<Bytes, AppError> {
        match source {
            ImageSource::Inline(data) => decode_inline(data).map(Bytes::from),
            ImageSource::Url(url) => {
                let started = std::time::Instant::now();
                let bytes = self.fetch(url).await?;
                tracing::debug!(
                    "拉取图片完成: {} ({} 字节, {:?})",
                    url,
                    bytes.len(),
                    started.elapsed()
                );
                Ok(bytes)
            }
        }
    }
}
