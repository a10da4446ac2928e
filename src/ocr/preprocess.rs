//! Image preprocessing before recognition
//!
//! Order: rotation, crop, brightness, contrast. Crop coordinates refer to the
//! rotated image.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use super::types::{OcrError, PixelRect, ProcessingOptions};

/// Apply `options` to `image`
pub fn apply_options(image: DynamicImage, options: &ProcessingOptions) -> Result<DynamicImage, OcrError> {
    options.validate()?;
    if options.is_noop() {
        return Ok(image);
    }

    let mut image = match options.rotation {
        Some(degrees) => rotate(image, degrees),
        None => image,
    };

    if let Some(crop) = &options.crop {
        image = crop_clamped(&image, crop)?;
    }

    if let Some(brightness) = options.brightness.filter(|b| *b != 0) {
        // -100..=100 onto the full channel range
        image = image.brighten(brightness * 255 / 100);
    }

    if let Some(contrast) = options.contrast.filter(|c| *c != 0) {
        image = image.adjust_contrast(contrast as f32);
    }

    Ok(image)
}

/// Encode as PNG for the engines
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|e| OcrError::ImageError(format!("Failed to encode image: {}", e)))?;
    Ok(buffer)
}

/// Decode an uploaded image
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, OcrError> {
    image::load_from_memory(data)
        .map_err(|e| OcrError::ImageError(format!("Failed to decode image: {}", e)))
}

fn crop_clamped(image: &DynamicImage, crop: &PixelRect) -> Result<DynamicImage, OcrError> {
    let (width, height) = image.dimensions();
    if crop.x >= width || crop.y >= height {
        return Err(OcrError::InvalidOptions(format!(
            "crop origin ({}, {}) lies outside the {}x{} image",
            crop.x, crop.y, width, height
        )));
    }

    let crop_width = crop.width.min(width - crop.x);
    let crop_height = crop.height.min(height - crop.y);
    Ok(image.crop_imm(crop.x, crop.y, crop_width, crop_height))
}

/// Rotate clockwise by `degrees`
fn rotate(image: DynamicImage, degrees: f32) -> DynamicImage {
    let normalized = degrees.rem_euclid(360.0);
    match normalized {
        d if d == 0.0 => image,
        d if d == 90.0 => image.rotate90(),
        d if d == 180.0 => image.rotate180(),
        d if d == 270.0 => image.rotate270(),
        d => DynamicImage::ImageRgba8(rotate_arbitrary(&image.to_rgba8(), d)),
    }
}

/// Nearest-neighbour rotation onto a white canvas large enough for the
/// rotated image
fn rotate_arbitrary(source: &RgbaImage, degrees: f32) -> RgbaImage {
    let radians = (degrees as f64).to_radians();
    let (sin, cos) = radians.sin_cos();
    let (src_w, src_h) = (source.width() as f64, source.height() as f64);

    let out_w = (src_w * cos.abs() + src_h * sin.abs()).ceil().max(1.0) as u32;
    let out_h = (src_w * sin.abs() + src_h * cos.abs()).ceil().max(1.0) as u32;

    let (src_cx, src_cy) = (src_w / 2.0, src_h / 2.0);
    let (out_cx, out_cy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    let mut output = RgbaImage::from_pixel(out_w, out_h, Rgba([255, 255, 255, 255]));
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - out_cx;
        let dy = y as f64 + 0.5 - out_cy;
        // Inverse mapping back into the source
        let sx = dx * cos + dy * sin + src_cx;
        let sy = -dx * sin + dy * cos + src_cy;
        if sx >= 0.0 && sy >= 0.0 && sx < src_w && sy < src_h {
            *pixel = *source.get_pixel(sx as u32, sy as u32);
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([100, 100, 100, 255])))
    }

    #[test]
    fn test_noop_returns_same_dimensions() {
        let image = apply_options(sample(40, 20), &ProcessingOptions::default()).unwrap();
        assert_eq!(image.dimensions(), (40, 20));
    }

    #[test]
    fn test_quarter_rotation_swaps_dimensions() {
        let options = ProcessingOptions {
            rotation: Some(-90.0),
            ..Default::default()
        };
        let image = apply_options(sample(40, 20), &options).unwrap();
        assert_eq!(image.dimensions(), (20, 40));
    }

    #[test]
    fn test_arbitrary_rotation_grows_canvas() {
        let options = ProcessingOptions {
            rotation: Some(45.0),
            ..Default::default()
        };
        let image = apply_options(sample(40, 40), &options).unwrap();
        let (w, h) = image.dimensions();
        assert!(w > 40 && h > 40);
        // Corners fall outside the source and stay white
        assert_eq!(image.to_rgba8().get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_crop_is_clamped_to_bounds() {
        let options = ProcessingOptions {
            crop: Some(PixelRect {
                x: 30,
                y: 10,
                width: 100,
                height: 100,
            }),
            ..Default::default()
        };
        let image = apply_options(sample(40, 20), &options).unwrap();
        assert_eq!(image.dimensions(), (10, 10));
    }

    #[test]
    fn test_crop_outside_image_is_rejected() {
        let options = ProcessingOptions {
            crop: Some(PixelRect {
                x: 50,
                y: 0,
                width: 5,
                height: 5,
            }),
            ..Default::default()
        };
        assert!(matches!(
            apply_options(sample(40, 20), &options),
            Err(OcrError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_brightness_changes_pixels() {
        let options = ProcessingOptions {
            brightness: Some(50),
            ..Default::default()
        };
        let image = apply_options(sample(4, 4), &options).unwrap();
        let pixel = image.to_rgba8().get_pixel(0, 0).0;
        assert!(pixel[0] > 100);
    }

    #[test]
    fn test_png_round_trip() {
        let png = encode_png(&sample(8, 8)).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
        assert_eq!(decode_image(&png).unwrap().dimensions(), (8, 8));
    }
}
