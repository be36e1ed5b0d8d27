//! Image preprocessing for the BLIP vision encoder.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Square input resolution of the BLIP base vision encoder
pub const BLIP_IMAGE_SIZE: u32 = 384;

/// CLIP normalization constants (RGB)
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Resize, rescale and normalize an image into a `[3, H, W]` plane-major buffer.
pub fn blip_pixel_values(image: &RgbImage) -> Vec<f32> {
    let size = BLIP_IMAGE_SIZE;
    let resized = if image.dimensions() == (size, size) {
        image.clone()
    } else {
        imageops::resize(image, size, size, FilterType::CatmullRom)
    };

    let plane = (size * size) as usize;
    let mut values = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y * size + x) as usize;
        for c in 0..3 {
            let scaled = f32::from(pixel[c]) / 255.0;
            values[c * plane + idx] = (scaled - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_output_length() {
        let img = RgbImage::new(10, 20);
        let values = blip_pixel_values(&img);
        assert_eq!(values.len(), 3 * 384 * 384);
    }

    #[test]
    fn test_uniform_image_normalization() {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 0, 128]));
        let values = blip_pixel_values(&img);
        let plane = 384 * 384;

        let red = (1.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        let green = (0.0 - CLIP_MEAN[1]) / CLIP_STD[1];
        let blue = (128.0 / 255.0 - CLIP_MEAN[2]) / CLIP_STD[2];

        // Resampling may round a channel by one step
        let tolerance = 0.02;
        assert!((values[0] - red).abs() < tolerance);
        assert!((values[plane] - green).abs() < tolerance);
        assert!((values[2 * plane + plane / 2] - blue).abs() < tolerance);
    }

    #[test]
    fn test_channels_are_plane_major() {
        let mut img = RgbImage::from_pixel(384, 384, Rgb([0, 0, 0]));
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        let values = blip_pixel_values(&img);
        let plane = 384 * 384;

        let white_red = (1.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        assert!((values[1] - white_red).abs() < 1e-4);
        assert!((values[0] - (-CLIP_MEAN[0] / CLIP_STD[0])).abs() < 1e-4);
        assert!((values[plane + 1] - (1.0 - CLIP_MEAN[1]) / CLIP_STD[1]).abs() < 1e-4);
    }
}
