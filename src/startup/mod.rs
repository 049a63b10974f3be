/// 启动检查与字体目录加载
pub mod checks;

pub use checks::{load_font_catalog, run_startup_checks};
