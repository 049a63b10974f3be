use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD as base64_engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat};
use resvg::usvg::{self, Options as UsvgOptions};
use resvg::{
    render,
    tiny_skia::{Pixmap, Transform},
};

use super::fonts::FontCatalog;
use super::scene::ScenePlan;
use super::svg::{SceneImages, SvgOptions, render_svg};
use super::types::OutputFormat;
use crate::error::AppError;

/// 底图嵌入叠加层时使用的 JPEG 质量
const EMBED_JPEG_QUALITY: u8 = 90;

/// 图片合成能力：解码、缩放、按计划叠加、编码。
pub trait Compositor: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, AppError>;

    /// 等比裁剪填充到目标尺寸（居中，相当于 xMidYMid slice）
    fn resize_cover(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// 按绘制计划合成为 RGBA 像素
    fn composite(
        &self,
        plan: &ScenePlan,
        images: &SceneImages,
        fonts: &FontCatalog,
    ) -> Result<Pixmap, AppError>;

    fn encode(&self, pixmap: &Pixmap, format: OutputFormat, quality: u8)
    -> Result<Vec<u8>, AppError>;

    fn render(
        &self,
        plan: &ScenePlan,
        images: &SceneImages,
        fonts: &FontCatalog,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, AppError> {
        let pixmap = self.composite(plan, images, fonts)?;
        self.encode(&pixmap, format, quality)
    }
}

/// 基于 resvg 栅格化叠加层、image/png 编码的合成实现
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCompositor {
    pub optimize_speed: bool,
}

impl RasterCompositor {
    pub fn new(optimize_speed: bool) -> Self {
        Self { optimize_speed }
    }

    fn filter(&self) -> FilterType {
        if self.optimize_speed {
            FilterType::Triangle
        } else {
            FilterType::Lanczos3
        }
    }
}

impl Compositor for RasterCompositor {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, AppError> {
        image::load_from_memory(bytes).map_err(AppError::from)
    }

    fn resize_cover(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        if image.width() == width && image.height() == height {
            return image.clone();
        }
        image.resize_to_fill(width.max(1), height.max(1), self.filter())
    }

    fn composite(
        &self,
        plan: &ScenePlan,
        images: &SceneImages,
        fonts: &FontCatalog,
    ) -> Result<Pixmap, AppError> {
        let svg = render_svg(plan, images, fonts, SvgOptions { embed_fonts: false });
        let speed = self.optimize_speed;
        let opts = UsvgOptions {
            fontdb: fonts.database(),
            font_family: "sans-serif".to_string(),
            languages: vec!["en".to_string(), "zh-CN".to_string()],
            shape_rendering: if speed {
                usvg::ShapeRendering::OptimizeSpeed
            } else {
                usvg::ShapeRendering::GeometricPrecision
            },
            text_rendering: if speed {
                usvg::TextRendering::OptimizeSpeed
            } else {
                usvg::TextRendering::OptimizeLegibility
            },
            image_rendering: if speed {
                usvg::ImageRendering::OptimizeSpeed
            } else {
                usvg::ImageRendering::OptimizeQuality
            },
            ..Default::default()
        };
        let tree = usvg::Tree::from_data(svg.as_bytes(), &opts)
            .map_err(|e| AppError::ImageRendererError(format!("叠加层解析失败: {e}")))?;

        let size = tree.size().to_int_size();
        let mut pixmap = Pixmap::new(size.width(), size.height())
            .ok_or_else(|| AppError::ImageRendererError("无法创建画布".to_string()))?;
        render(&tree, Transform::default(), &mut pixmap.as_mut());
        Ok(pixmap)
    }

    fn encode(
        &self,
        pixmap: &Pixmap,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, AppError> {
        match format {
            OutputFormat::Png => encode_png(pixmap, self.optimize_speed),
            OutputFormat::Jpeg => encode_jpeg(pixmap, quality),
            OutputFormat::Svg => Err(AppError::ImageRendererError(
                "SVG 输出不经过栅格编码".to_string(),
            )),
        }
    }
}

fn encode_png(pixmap: &Pixmap, fast: bool) -> Result<Vec<u8>, AppError> {
    let (w, h) = (pixmap.width(), pixmap.height());
    // tiny-skia 为预乘 alpha，PNG 需要非预乘像素
    let mut data = Vec::with_capacity((w as usize) * (h as usize) * 4);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, w, h);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        if fast {
            encoder.set_compression(png::Compression::Fast);
            encoder.set_filter(png::FilterType::NoFilter);
        } else {
            encoder.set_compression(png::Compression::Default);
            encoder.set_filter(png::FilterType::Paeth);
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| AppError::ImageRendererError(format!("PNG 写入头失败: {e}")))?;
        writer
            .write_image_data(&data)
            .map_err(|e| AppError::ImageRendererError(format!("PNG 编码失败: {e}")))?;
        writer
            .finish()
            .map_err(|e| AppError::ImageRendererError(format!("PNG 编码失败: {e}")))?;
    }
    Ok(out)
}

fn encode_jpeg(pixmap: &Pixmap, quality: u8) -> Result<Vec<u8>, AppError> {
    let (w, h) = (pixmap.width(), pixmap.height());
    // 预乘像素直接取 RGB 即等价于叠加到黑底（JPEG 无透明通道）
    let mut rgb = Vec::with_capacity((w as usize) * (h as usize) * 3);
    for px in pixmap.data().chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }

    let mut out = Vec::new();
    let mut enc = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    enc.encode(&rgb, w, h, ColorType::Rgb8.into())
        .map_err(|e| AppError::ImageRendererError(format!("JPEG 编码失败: {e}")))?;
    Ok(out)
}

/// 将已缩放的图片编码为 data URI 嵌入叠加层；带透明通道的用 PNG，否则 JPEG。
pub fn image_data_uri(image: &DynamicImage) -> Result<String, AppError> {
    let mut out = Vec::new();
    let mime = if image.color().has_alpha() {
        image
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| AppError::ImageRendererError(format!("图片编码失败: {e}")))?;
        "image/png"
    } else {
        let rgb = image.to_rgb8();
        let mut enc = JpegEncoder::new_with_quality(&mut out, EMBED_JPEG_QUALITY);
        enc.encode(&rgb, rgb.width(), rgb.height(), ColorType::Rgb8.into())
            .map_err(|e| AppError::ImageRendererError(format!("图片编码失败: {e}")))?;
        "image/jpeg"
    };
    Ok(format!("data:{mime};base64,{}", base64_engine.encode(out)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::banner::svg::SlotFill;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn plan_for(title: &str) -> ScenePlan {
        use crate::features::banner::layout::{LayoutOptions, layout};
        use crate::features::banner::scene::{SceneInputs, build};
        use crate::features::banner::theme::ThemeRegistry;
        use crate::features::banner::types::{LayoutMode, RenderRequest};
        use crate::features::banner::wrap::wrap;

        let registry = ThemeRegistry::builtin();
        let theme = registry.resolve("default");
        let mut request = RenderRequest::new(title, LayoutMode::BottomAnchored);
        request.canvas_width = 320;
        request.canvas_height = 240;
        let wrapped = wrap(title, 240.0, 24.0, theme.char_width_factor);
        let options = LayoutOptions {
            canvas_width: 320,
            canvas_height: 240,
            title_align: request.title_align,
            website: None,
            website_font_size: 16.0,
            website_align: request.website_align,
            badge: None,
            show_decorative_lines: false,
        };
        let result = layout(&wrapped, theme, LayoutMode::BottomAnchored, &options);
        build(&SceneInputs {
            request: &request,
            theme,
            wrap: &wrapped,
            segments: &[],
            layout: &result,
            logo_size: None,
        })
    }

    #[test]
    fn resize_cover_fills_target_exactly() {
        let c = RasterCompositor::default();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 100, Rgb([10, 20, 30])));
        let out = c.resize_cover(&img, 120, 120);
        assert_eq!((out.width(), out.height()), (120, 120));
    }

    #[test]
    fn decode_rejects_garbage() {
        let c = RasterCompositor::default();
        assert!(matches!(
            c.decode(b"nope"),
            Err(AppError::InvalidImageData(_))
        ));
    }

    #[test]
    fn renders_plan_to_png_and_jpeg() {
        let c = RasterCompositor::new(true);
        let plan = plan_for("Hello");
        let images = SceneImages {
            base: Some(SlotFill::Solid("#336699".into())),
            logo: None,
        };
        let fonts = FontCatalog::empty();

        let png_bytes = c
            .render(&plan, &images, &fonts, OutputFormat::Png, 85)
            .expect("png");
        let decoded = image::load_from_memory(&png_bytes).expect("decode png");
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
        // 左上角不在叠加条内，应为底色
        let px = decoded.to_rgba8().get_pixel(2, 2).0;
        assert_eq!(px, [0x33, 0x66, 0x99, 0xff]);

        let jpeg_bytes = c
            .render(&plan, &images, &fonts, OutputFormat::Jpeg, 80)
            .expect("jpeg");
        assert_eq!(&jpeg_bytes[..2], &[0xFF, 0xD8]);
        assert!(c.render(&plan, &images, &fonts, OutputFormat::Svg, 80).is_err());
    }

    #[test]
    fn data_uri_keeps_alpha_as_png() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])));
        assert!(image_data_uri(&rgba).expect("uri").starts_with("data:image/png;base64,"));
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        assert!(image_data_uri(&rgb).expect("uri").starts_with("data:image/jpeg;base64,"));
    }
}
