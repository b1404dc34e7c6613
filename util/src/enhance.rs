use image::{DynamicImage, GrayImage, RgbImage};
use rayon::prelude::*;

/// Enhancement factors, where `1.0` leaves the image untouched
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Enhancement {
	pub brightness: f32,
	pub contrast: f32,
	pub saturation: f32,
	pub sharpness: f32
}
impl Default for Enhancement {
	#[inline]
	fn default() -> Self {
		Self {
			brightness: 1.0,
			contrast: 1.0,
			saturation: 1.0,
			sharpness: 1.0
		}
	}
}
impl Enhancement {
	#[inline]
	pub fn is_identity(&self) -> bool {
		*self == Self::default()
	}
}

#[inline]
fn clip(value: f32) -> u8 {
	if value <= 0.0 {
		0
	} else if value >= 255.0 {
		255
	} else {
		value as u8
	}
}

#[inline]
fn lerp(degenerate: u8, value: u8, factor: f32) -> u8 {
	let degenerate = degenerate as f32;
	clip(degenerate + factor * (value as f32 - degenerate))
}

/// ITU-R 601-2 luma
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
	((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

fn mean_luma(raw: &[u8], channels: usize) -> u8 {
	if raw.is_empty() {
		return 0;
	}

	let sum: u64 = if channels == 3 {
		raw.par_chunks(3).map(|px| luma(px[0], px[1], px[2]) as u64).sum()
	} else {
		raw.par_iter().map(|&v| v as u64).sum()
	};

	let pixels = (raw.len() / channels) as f64;
	(sum as f64 / pixels + 0.5) as u8
}

fn brightness(raw: &mut [u8], factor: f32) {
	raw.par_iter_mut().for_each(|v| *v = lerp(0, *v, factor));
}

fn contrast(raw: &mut [u8], channels: usize, factor: f32) {
	let mean = mean_luma(raw, channels);
	raw.par_iter_mut().for_each(|v| *v = lerp(mean, *v, factor));
}

fn saturation(raw: &mut [u8], factor: f32) {
	raw.par_chunks_mut(3).for_each(|px| {
		let gray = luma(px[0], px[1], px[2]);
		for v in px.iter_mut() {
			*v = lerp(gray, *v, factor);
		}
	});
}

/// 3x3 smoothing (`[1 1 1; 1 5 1; 1 1 1] / 13`); the outermost ring keeps its original pixels
fn smooth(raw: &[u8], width: usize, height: usize, channels: usize) -> Vec<u8> {
	let mut out = raw.to_vec();
	if width < 3 || height < 3 {
		return out;
	}

	let stride = width * channels;
	out.par_chunks_mut(stride).enumerate().skip(1).take(height - 2).for_each(|(y, row)| {
		for x in 1..width - 1 {
			for channel in 0..channels {
				let mut sum = 0u32;
				for dy in 0..3 {
					for dx in 0..3 {
						let weight = if dy == 1 && dx == 1 { 5 } else { 1 };
						sum += weight * raw[(y + dy - 1) * stride + (x + dx - 1) * channels + channel] as u32;
					}
				}
				row[x * channels + channel] = ((sum + 6) / 13) as u8;
			}
		}
	});

	out
}

fn sharpness(raw: &mut [u8], width: usize, height: usize, channels: usize, factor: f32) {
	let smoothed = smooth(raw, width, height, channels);
	raw.par_iter_mut().zip(smoothed.par_iter()).for_each(|(v, &s)| *v = lerp(s, *v, factor));
}

fn enhance_raw(raw: &mut [u8], width: u32, height: u32, channels: usize, enhancement: &Enhancement) {
	if enhancement.brightness != 1.0 {
		brightness(raw, enhancement.brightness);
	}
	if enhancement.contrast != 1.0 {
		contrast(raw, channels, enhancement.contrast);
	}
	if enhancement.saturation != 1.0 && channels == 3 {
		saturation(raw, enhancement.saturation);
	}
	if enhancement.sharpness != 1.0 {
		sharpness(raw, width as usize, height as usize, channels, enhancement.sharpness);
	}
}

pub fn enhance_rgb(mut image: RgbImage, enhancement: &Enhancement) -> RgbImage {
	let (width, height) = image.dimensions();
	enhance_raw(&mut image, width, height, 3, enhancement);
	image
}

pub fn enhance_gray(mut image: GrayImage, enhancement: &Enhancement) -> GrayImage {
	let (width, height) = image.dimensions();
	enhance_raw(&mut image, width, height, 1, enhancement);
	image
}

/// Applies brightness, contrast, saturation and sharpness in that order.
///
/// Anything other than RGB or grayscale is converted to RGB first.
pub fn apply_image_enhancement(image: &DynamicImage, enhancement: &Enhancement) -> DynamicImage {
	match image {
		DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(enhance_gray(gray.clone(), enhancement)),
		DynamicImage::ImageRgb8(rgb) => DynamicImage::ImageRgb8(enhance_rgb(rgb.clone(), enhancement)),
		_ => DynamicImage::ImageRgb8(enhance_rgb(image.to_rgb8(), enhancement))
	}
}

#[cfg(test)]
fn checkerboard() -> RgbImage {
	RgbImage::from_fn(8, 8, |x, y| {
		if (x + y) % 2 == 0 {
			image::Rgb([200, 60, 20])
		} else {
			image::Rgb([40, 100, 180])
		}
	})
}

#[test]
fn test_identity_is_lossless() {
	let image = checkerboard();
	assert!(Enhancement::default().is_identity());
	assert_eq!(enhance_rgb(image.clone(), &Enhancement::default()), image);
}

#[test]
fn test_brightness() {
	let image = RgbImage::from_pixel(2, 2, image::Rgb([100, 200, 10]));

	let darker = enhance_rgb(image.clone(), &Enhancement { brightness: 0.5, ..Default::default() });
	assert_eq!(darker.get_pixel(0, 0), &image::Rgb([50, 100, 5]));

	let brighter = enhance_rgb(image.clone(), &Enhancement { brightness: 2.0, ..Default::default() });
	assert_eq!(brighter.get_pixel(1, 1), &image::Rgb([200, 255, 20]));

	let black = enhance_rgb(image, &Enhancement { brightness: 0.0, ..Default::default() });
	assert!(black.pixels().all(|px| *px == image::Rgb([0, 0, 0])));
}

#[test]
fn test_zero_contrast_is_flat_mean_gray() {
	let mut image = RgbImage::from_pixel(2, 1, image::Rgb([0, 0, 0]));
	image.put_pixel(1, 0, image::Rgb([255, 255, 255]));

	let flat = enhance_rgb(image, &Enhancement { contrast: 0.0, ..Default::default() });
	// (0 + 255) / 2 rounded
	assert!(flat.pixels().all(|px| *px == image::Rgb([128, 128, 128])));
}

#[test]
fn test_zero_saturation_is_grayscale() {
	let gray = enhance_rgb(checkerboard(), &Enhancement { saturation: 0.0, ..Default::default() });
	for px in gray.pixels() {
		assert_eq!(px[0], px[1]);
		assert_eq!(px[1], px[2]);
	}
	assert_eq!(gray.get_pixel(0, 0)[0], luma(200, 60, 20));

	// saturation has no meaning for a single channel
	let luma_image = GrayImage::from_pixel(4, 4, image::Luma([90]));
	assert_eq!(enhance_gray(luma_image.clone(), &Enhancement { saturation: 0.0, ..Default::default() }), luma_image);
}

#[test]
fn test_sharpness_keeps_flat_regions_and_borders() {
	let flat = RgbImage::from_pixel(6, 6, image::Rgb([73, 73, 73]));
	assert_eq!(enhance_rgb(flat.clone(), &Enhancement { sharpness: 2.0, ..Default::default() }), flat);

	let image = checkerboard();
	let blurred = enhance_rgb(image.clone(), &Enhancement { sharpness: 0.0, ..Default::default() });
	assert_eq!(blurred.get_pixel(0, 0), image.get_pixel(0, 0));
	assert_eq!(blurred.get_pixel(7, 3), image.get_pixel(7, 3));
	assert_ne!(blurred.get_pixel(3, 3), image.get_pixel(3, 3));
}

#[test]
fn test_non_rgb_input_is_converted() {
	let rgba = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(3, 3, image::Rgba([10, 20, 30, 0])));
	let out = apply_image_enhancement(&rgba, &Enhancement::default());
	assert!(matches!(out, DynamicImage::ImageRgb8(_)));

	let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, image::Luma([100])));
	let out = apply_image_enhancement(&gray, &Enhancement { brightness: 1.5, ..Default::default() });
	match out {
		DynamicImage::ImageLuma8(gray) => assert_eq!(gray.get_pixel(1, 1), &image::Luma([150])),
		_ => panic!("expected a grayscale image")
	}
}

#[test]
fn test_enhancement_deserializes_partial_settings() {
	let parsed: Enhancement = serde_json::from_str(r#"{ "contrast": 1.4 }"#).unwrap();
	assert_eq!(parsed, Enhancement { contrast: 1.4, ..Default::default() });
}
