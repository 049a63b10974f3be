/// 横幅渲染
pub mod banner;
/// 健康检查
pub mod health;
