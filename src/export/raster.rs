//! PNG export through resvg.

use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use par_markdown_config::ExportConfig;

use crate::diagram::svg_utils::FONTDB;

use super::ExportError;
use super::svg_tree::SvgDocument;

/// Rasterize a rendered diagram to PNG bytes.
///
/// The copy gets an opaque background rectangle covering its bounding box
/// plus `config.margin`, painted first. The image is the bounding box size
/// times `config.scale`; either side exceeding `config.max_dimension` is an
/// error.
pub fn export_raster(svg: &str, config: &ExportConfig) -> Result<Vec<u8>, ExportError> {
    let mut doc = SvgDocument::parse(svg)?;
    doc.ensure_namespace();
    let bbox = doc.bounding_box()?;
    doc.insert_background(&config.background_color, config.margin, &bbox);
    rasterize(&doc.serialize(), config.scale, config.max_dimension)
}

/// Render standalone SVG text to PNG at `scale`.
pub fn rasterize(svg: &str, scale: f32, max_dimension: u32) -> Result<Vec<u8>, ExportError> {
    let opts = resvg::usvg::Options {
        fontdb: FONTDB.clone(),
        ..Default::default()
    };
    let tree = resvg::usvg::Tree::from_str(svg, &opts)
        .map_err(|e| ExportError::Parse(e.to_string()))?;

    let size = tree.size();
    let scaled_width = size.width() * scale;
    let scaled_height = size.height() * scale;
    let width = scaled_width.ceil() as u32;
    let height = scaled_height.ceil() as u32;
    if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
        crate::debug_info!(
            "EXPORT",
            "Raster dimensions out of range: {width}x{height} (max {max_dimension})"
        );
        return Err(ExportError::InvalidDimensions {
            width: scaled_width,
            height: scaled_height,
        });
    }

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ExportError::Rasterize(format!("cannot allocate {width}x{height}")))?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    let mut png_buf = Vec::new();
    PngEncoder::new(&mut png_buf).write_image(
        pixmap.data(),
        width,
        height,
        image::ExtendedColorType::Rgba8,
    )?;

    crate::debug_info!(
        "EXPORT",
        "SVG->PNG conversion succeeded: {width}x{height}, {} bytes",
        png_buf.len()
    );
    Ok(png_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "<svg width=\"40\" height=\"30\"><rect x=\"5\" y=\"5\" width=\"10\" height=\"10\" fill=\"red\"/></svg>";

    fn png_size(bytes: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(bytes).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_raster_matches_bounding_box() {
        let bytes = export_raster(SQUARE, &ExportConfig::default()).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(png_size(&bytes), (40, 30));
    }

    #[test]
    fn test_raster_is_device_scaled() {
        let config = ExportConfig {
            scale: 2.0,
            ..ExportConfig::default()
        };
        let bytes = export_raster(SQUARE, &config).unwrap();
        assert_eq!(png_size(&bytes), (80, 60));
    }

    #[test]
    fn test_background_is_opaque() {
        let bytes = export_raster(SQUARE, &ExportConfig::default()).unwrap();
        let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(35, 25).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(10, 10).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_oversized_raster_is_rejected() {
        let config = ExportConfig {
            max_dimension: 16,
            ..ExportConfig::default()
        };
        assert!(matches!(
            export_raster(SQUARE, &config),
            Err(ExportError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_unparseable_svg_is_an_error() {
        assert!(matches!(
            export_raster("<svg", &ExportConfig::default()),
            Err(ExportError::Parse(_))
        ));
    }
}
