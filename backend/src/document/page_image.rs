//! Page image handling between the browser and the PDF renderer.

use crate::error::AssemblyError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use image::{load_from_memory, DynamicImage, GenericImageView};
use png::{BitDepth as PngBitDepth, ColorType as PngColorType, Encoder as PngEncoder};
use tempfile::NamedTempFile;

/// Embedding resolution; scans above it are downscaled before embedding.
pub const IMAGE_DPI: f64 = 150.0;
const MM_PER_INCH: f64 = 25.4;

/// Decodes a base64 image, dropping a `data:image/...;base64,` envelope if
/// the browser left one on.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match encoded.find(',') {
        Some(comma) if encoded.starts_with("data:") => &encoded[comma + 1..],
        _ => encoded,
    };
    BASE64.decode(payload.trim())
}

/// A side image written to disk for the renderer, with the resolution that
/// makes it fill the target box.
pub struct PreparedImage {
    pub file: NamedTempFile,
    pub dpi: f64,
}

/// Downscales `bytes` to at most [`IMAGE_DPI`] for a `max_width_mm` by
/// `max_height_mm` box, flattens alpha onto white and writes an RGB PNG to a
/// temporary file. The returned DPI makes the image span the full box width,
/// or the full height when the page is too tall for that.
pub fn prepare_for_pdf(
    bytes: &[u8],
    max_width_mm: f64,
    max_height_mm: f64,
) -> Result<PreparedImage, AssemblyError> {
    let img = load_from_memory(bytes)?;
    let (orig_w, orig_h) = img.dimensions();
    let orig_w_f = orig_w as f64;
    let orig_h_f = orig_h as f64;

    let target_w_px = max_width_mm / MM_PER_INCH * IMAGE_DPI;
    let target_h_px = max_height_mm / MM_PER_INCH * IMAGE_DPI;
    let scale = (target_w_px / orig_w_f).min(target_h_px / orig_h_f).min(1.0);

    let resized: DynamicImage = if scale >= 1.0 {
        img
    } else {
        let new_w = (orig_w_f * scale).max(1.0).round() as u32;
        let new_h = (orig_h_f * scale).max(1.0).round() as u32;
        img.resize(new_w, new_h, FilterType::Lanczos3)
    };

    // The renderer rejects images with an alpha channel.
    let rgba = resized.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut background = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
    image::imageops::overlay(&mut background, &rgba, 0, 0);
    let raw = DynamicImage::ImageRgba8(background).to_rgb8().into_raw();

    let mut tmp = tempfile::Builder::new()
        .prefix("scan_side_")
        .suffix(".png")
        .tempfile()?;
    {
        let mut encoder = PngEncoder::new(tmp.as_file_mut(), w, h);
        encoder.set_color(PngColorType::Rgb);
        encoder.set_depth(PngBitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| AssemblyError::Render(e.to_string()))?;
        writer
            .write_image_data(&raw)
            .map_err(|e| AssemblyError::Render(e.to_string()))?;
    }

    let dpi_for_width = w as f64 * MM_PER_INCH / max_width_mm;
    let dpi_for_height = h as f64 * MM_PER_INCH / max_height_mm;
    Ok(PreparedImage {
        file: tmp,
        dpi: dpi_for_width.max(dpi_for_height),
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::jpeg;
    use super::*;

    #[test]
    fn strips_data_uri_envelope() {
        let encoded = format!("data:image/jpeg;base64,{}", BASE64.encode(b"jpeg bytes"));
        assert_eq!(decode_image(&encoded).unwrap(), b"jpeg bytes");
        assert_eq!(decode_image(&BASE64.encode(b"raw")).unwrap(), b"raw");
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_image("data:image/jpeg;base64,@@not base64@@").is_err());
    }

    #[test]
    fn wide_image_fills_the_width() {
        let prepared = prepare_for_pdf(&jpeg(380, 100), 190.0, 250.0).unwrap();
        // 380 px across 190 mm is 50.8 dpi.
        assert!((prepared.dpi - 50.8).abs() < 1e-6);
        let png = image::open(prepared.file.path()).unwrap();
        assert_eq!(png.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn tall_image_is_fitted_to_the_height() {
        let prepared = prepare_for_pdf(&jpeg(100, 1000), 190.0, 250.0).unwrap();
        let height_mm = 1000.0 / prepared.dpi * MM_PER_INCH;
        assert!((height_mm - 250.0).abs() < 1e-6);
    }

    #[test]
    fn large_scans_are_downscaled() {
        let prepared = prepare_for_pdf(&jpeg(2480, 1000), 190.0, 250.0).unwrap();
        let png = image::open(prepared.file.path()).unwrap();
        assert!(png.width() <= (190.0 / MM_PER_INCH * IMAGE_DPI).ceil() as u32);
    }

    #[test]
    fn temporary_file_is_removed_with_the_handle() {
        let prepared = prepare_for_pdf(&jpeg(10, 10), 190.0, 250.0).unwrap();
        let path = prepared.file.path().to_path_buf();
        assert!(path.exists());
        drop(prepared);
        assert!(!path.exists());
    }

    #[test]
    fn undecodable_bytes_are_an_image_error() {
        assert!(matches!(
            prepare_for_pdf(b"not an image", 190.0, 250.0),
            Err(AssemblyError::Image(_))
        ));
    }
}
