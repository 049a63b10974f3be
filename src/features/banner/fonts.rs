use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use resvg::usvg::fontdb;

/// 嵌入 SVG 时使用的字体格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    TrueType,
    OpenType,
}

impl FontFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ttf" => Some(Self::TrueType),
            "otf" => Some(Self::OpenType),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::TrueType => "font/ttf",
            Self::OpenType => "font/otf",
        }
    }

    /// `@font-face` 中 `format()` 的取值
    pub fn css_format(self) -> &'static str {
        match self {
            Self::TrueType => "truetype",
            Self::OpenType => "opentype",
        }
    }
}

/// 可嵌入的字体数据
#[derive(Debug, Clone)]
pub struct Typeface {
    pub family: String,
    pub format: FontFormat,
    pub data: Arc<Vec<u8>>,
}

/// 字体目录：启动时加载一次，之后只读共享。
///
/// 同时维护一份 `fontdb::Database` 供栅格化使用（含系统字体）。
pub struct FontCatalog {
    faces: HashMap<String, Typeface>,
    db: Arc<fontdb::Database>,
}

impl std::fmt::Debug for FontCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCatalog")
            .field("families", &self.faces.len())
            .field("db_faces", &self.db.len())
            .finish()
    }
}

fn family_key(name: &str) -> String {
    name.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase()
}

impl FontCatalog {
    /// 空目录（测试与无字体部署使用；栅格化只依赖系统字体）
    pub fn empty() -> Self {
        Self {
            faces: HashMap::new(),
            db: Arc::new(fontdb::Database::new()),
        }
    }

    /// 从目录加载 ttf/otf；读取失败的文件记录错误后跳过，目录不存在时返回仅含系统字体的目录。
    pub fn load(dir: &Path, include_system_fonts: bool) -> Self {
        let mut db = fontdb::Database::new();
        if include_system_fonts {
            db.load_system_fonts();
        }

        let mut files: HashMap<PathBuf, (FontFormat, Arc<Vec<u8>>)> = HashMap::new();
        match fs::read_dir(dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let Some(format) = FontFormat::from_path(&path) else {
                        continue;
                    };
                    match fs::read(&path) {
                        Ok(bytes) => {
                            let _ids = db.load_font_source(fontdb::Source::File(path.clone()));
                            files.insert(path, (format, Arc::new(bytes)));
                        }
                        Err(e) => {
                            tracing::error!("加载字体文件失败 '{}': {}", path.display(), e);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("字体目录不可用 '{}': {}", dir.display(), e);
            }
        }

        let mut faces = HashMap::new();
        for face in db.faces() {
            let path = match &face.source {
                fontdb::Source::File(p) => p,
                _ => continue,
            };
            let Some((format, data)) = files.get(path) else {
                continue;
            };
            for (family, _) in &face.families {
                faces.entry(family_key(family)).or_insert_with(|| Typeface {
                    family: family.clone(),
                    format: *format,
                    data: data.clone(),
                });
            }
        }
        // 文件名（不含扩展名）也可作为字体名使用
        for (path, (format, data)) in &files {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                faces.entry(family_key(stem)).or_insert_with(|| Typeface {
                    family: stem.to_string(),
                    format: *format,
                    data: data.clone(),
                });
            }
        }

        tracing::info!(
            "字体目录加载完成: {} 个字体文件, {} 个可嵌入字体名, 字体库共 {} 个字形集",
            files.len(),
            faces.len(),
            db.len()
        );

        Self {
            faces,
            db: Arc::new(db),
        }
    }

    /// 按字体名查找可嵌入数据；找不到返回 None（调用方省略该字体继续渲染）。
    pub fn load_typeface(&self, name: &str) -> Option<&Typeface> {
        self.faces.get(&family_key(name))
    }

    pub fn database(&self) -> Arc<fontdb::Database> {
        self.db.clone()
    }

    pub fn family_count(&self) -> usize {
        self.faces.len()
    }
}
