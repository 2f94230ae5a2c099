use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageOutputFormat, Rgb, RgbImage, RgbaImage};

use crate::error::CalculateError;

// ── Normalized bitmap ────────────────────────────────────────────────────────

/// A decoded sketch with an opaque 8-bit RGB color model.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: RgbImage,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels.get_pixel(x, y).0
    }

    /// Re-encode as PNG for upload to the model provider.
    pub fn to_png(&self) -> Result<Vec<u8>, CalculateError> {
        let mut buf = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .map_err(|e| CalculateError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Decode a `data:`-style payload (`<media-type>,<base64>`) into an opaque
/// RGB bitmap. Transparent pixels end up white.
pub fn normalize(payload: &str) -> Result<NormalizedImage, CalculateError> {
    let (_media_type, data) = payload
        .split_once(',')
        .ok_or(CalculateError::MalformedPayload)?;

    // MIME-wrapped payloads carry line breaks inside the base64 text.
    let data: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(data)?;

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| CalculateError::UnsupportedImageFormat(e.to_string()))?;

    let pixels = if decoded.color().has_alpha() {
        composite_on_white(&decoded.to_rgba8())
    } else {
        decoded.to_rgb8()
    };

    tracing::debug!(
        width = pixels.width(),
        height = pixels.height(),
        "normalized image"
    );

    Ok(NormalizedImage { pixels })
}

// ── Alpha compositing ────────────────────────────────────────────────────────

fn composite_on_white(src: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(src.width(), src.height(), |x, y| {
        let [r, g, b, a] = src.get_pixel(x, y).0;
        Rgb([blend(r, a), blend(g, a), blend(b, a)])
    })
}

/// `c` over white with coverage `a`, rounded to nearest.
fn blend(c: u8, a: u8) -> u8 {
    let (c, a) = (u32::from(c), u32::from(a));
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayAlphaImage, GrayImage, Luma, LumaA, Rgba};

    fn data_url(image: DynamicImage) -> String {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(buf))
    }

    #[test]
    fn transparent_pixels_become_white_and_opaque_pixels_keep_color() {
        let mut rgba = RgbaImage::new(2, 2);
        rgba.put_pixel(0, 0, Rgba([10, 20, 30, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        rgba.put_pixel(0, 1, Rgba([0, 0, 0, 128]));
        rgba.put_pixel(1, 1, Rgba([255, 0, 0, 255]));

        let image = normalize(&data_url(DynamicImage::ImageRgba8(rgba))).unwrap();

        assert_eq!((image.width(), image.height()), (2, 2));
        assert_eq!(image.pixel(0, 0), [255, 255, 255]);
        assert_eq!(image.pixel(1, 0), [10, 20, 30]);
        assert_eq!(image.pixel(0, 1), [127, 127, 127]);
        assert_eq!(image.pixel(1, 1), [255, 0, 0]);
    }

    #[test]
    fn rgb_input_passes_through() {
        let rgb = RgbImage::from_pixel(3, 1, Rgb([1, 2, 3]));
        let image = normalize(&data_url(DynamicImage::ImageRgb8(rgb))).unwrap();
        assert_eq!(image.pixel(2, 0), [1, 2, 3]);
    }

    #[test]
    fn grayscale_is_converted_to_rgb() {
        let gray = GrayImage::from_pixel(1, 1, Luma([200]));
        let image = normalize(&data_url(DynamicImage::ImageLuma8(gray))).unwrap();
        assert_eq!(image.pixel(0, 0), [200, 200, 200]);
    }

    #[test]
    fn gray_alpha_is_composited_on_white() {
        let mut gray = GrayAlphaImage::new(2, 1);
        gray.put_pixel(0, 0, LumaA([0, 0]));
        gray.put_pixel(1, 0, LumaA([10, 255]));

        let image = normalize(&data_url(DynamicImage::ImageLumaA8(gray))).unwrap();

        assert_eq!(image.pixel(0, 0), [255, 255, 255]);
        assert_eq!(image.pixel(1, 0), [10, 10, 10]);
    }

    #[test]
    fn line_wrapped_base64_is_accepted() {
        let url = data_url(DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([4, 5, 6]))));
        let (prefix, data) = url.split_once(',').unwrap();
        let wrapped = data
            .as_bytes()
            .chunks(20)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");

        let image = normalize(&format!("{prefix},{wrapped}\n")).unwrap();
        assert_eq!(image.pixel(1, 1), [4, 5, 6]);
    }

    #[test]
    fn missing_separator_is_malformed() {
        let err = normalize("iVBORw0KGgo=").unwrap_err();
        assert!(matches!(err, CalculateError::MalformedPayload));
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        let err = normalize("data:image/png;base64,@@not base64@@").unwrap_err();
        assert!(matches!(err, CalculateError::Decode(_)));
    }

    #[test]
    fn non_image_bytes_are_unsupported() {
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(b"hello world"));
        let err = normalize(&payload).unwrap_err();
        assert!(matches!(err, CalculateError::UnsupportedImageFormat(_)));
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let rgb = RgbImage::from_pixel(4, 4, Rgb([9, 8, 7]));
        let image = normalize(&data_url(DynamicImage::ImageRgb8(rgb))).unwrap();
        let png = image.to_png().unwrap();
        let back = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(back.get_pixel(3, 3).0, [9, 8, 7]);
    }

    #[test]
    fn blend_is_exact_at_extremes() {
        for c in [0u8, 17, 128, 255] {
            assert_eq!(blend(c, 0), 255);
            assert_eq!(blend(c, 255), c);
        }
    }
}
