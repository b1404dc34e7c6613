use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::{Error, Rect, Result};

/// Radius of the box blur behind padded images
pub const PAD_BLUR_RADIUS: u32 = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
	#[default]
	Horizontal,
	Vertical
}
impl Orientation {
	/// Counter-clockwise rotation applied before the image reaches the panel
	#[inline]
	pub fn angle(self) -> u32 {
		match self {
			Orientation::Horizontal => 0,
			Orientation::Vertical => 90
		}
	}

	/// Dimensions that content should be rendered at for a panel of `resolution`
	#[inline]
	pub fn render_dimensions(self, (width, height): (u32, u32)) -> (u32, u32) {
		match self {
			Orientation::Horizontal => (width, height),
			Orientation::Vertical => (height, width)
		}
	}
}

/// Flags controlling [`resize_image`], stored as a list of strings (`["keep-width"]`)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ResizeOptions {
	/// Crop from the top-left corner instead of the center
	pub keep_width: bool
}
impl ResizeOptions {
	pub fn from_flags<I, S>(flags: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>
	{
		let mut options = Self::default();
		for flag in flags {
			match flag.as_ref() {
				"keep-width" => options.keep_width = true,
				other => log::debug!("ignoring unknown image setting {other:?}")
			}
		}
		options
	}
}
impl From<Vec<String>> for ResizeOptions {
	#[inline]
	fn from(flags: Vec<String>) -> Self {
		Self::from_flags(flags)
	}
}
impl From<ResizeOptions> for Vec<String> {
	fn from(options: ResizeOptions) -> Self {
		let mut flags = Vec::new();
		if options.keep_width {
			flags.push("keep-width".to_owned());
		}
		flags
	}
}

pub fn change_orientation(image: &DynamicImage, orientation: Orientation, inverted: bool) -> DynamicImage {
	let mut angle = orientation.angle();
	if inverted {
		angle = (angle + 180) % 360;
	}

	// image's rotations are clockwise
	match angle {
		90 => image.rotate270(),
		180 => image.rotate180(),
		270 => image.rotate90(),
		_ => image.clone()
	}
}

#[inline]
fn check_dimensions(from: (u32, u32), to: (u32, u32)) -> Result<()> {
	if from.0 == 0 || from.1 == 0 || to.0 == 0 || to.1 == 0 {
		Err(Error::EmptyDimensions { from, to })
	} else {
		Ok(())
	}
}

/// Largest region of a `width`x`height` image with the aspect ratio of `desired`
pub fn aspect_crop((width, height): (u32, u32), (desired_width, desired_height): (u32, u32), keep_width: bool) -> Rect {
	let img_ratio = width as f64 / height as f64;
	let desired_ratio = desired_width as f64 / desired_height as f64;

	if img_ratio > desired_ratio {
		let new_width = ((height as f64 * desired_ratio) as u32).clamp(1, width);
		let x = if keep_width { 0 } else { (width - new_width) / 2 };
		Rect::new(x, 0, new_width, height)
	} else {
		let new_height = ((width as f64 / desired_ratio) as u32).clamp(1, height);
		let y = if keep_width { 0 } else { (height - new_height) / 2 };
		Rect::new(0, y, width, new_height)
	}
}

/// Crops to the target aspect ratio, then resamples to exactly `dimensions`
pub fn resize_image(image: &DynamicImage, dimensions: (u32, u32), options: ResizeOptions) -> Result<DynamicImage> {
	check_dimensions(image.dimensions(), dimensions)?;

	let crop = aspect_crop(image.dimensions(), dimensions, options.keep_width);
	let cropped = image.crop_imm(crop.x, crop.y, crop.width, crop.height);

	if crop.size() == dimensions {
		Ok(cropped)
	} else {
		Ok(cropped.resize_exact(dimensions.0, dimensions.1, FilterType::Lanczos3))
	}
}

/// Centered crop-and-scale that fills `dimensions` completely
#[inline]
pub fn fit(image: &DynamicImage, dimensions: (u32, u32)) -> Result<DynamicImage> {
	resize_image(image, dimensions, ResizeOptions::default())
}

/// Size of the largest aspect-preserving scale of `size` that fits inside `bounds`
pub fn contain_size((width, height): (u32, u32), (bound_width, bound_height): (u32, u32)) -> (u32, u32) {
	let im_ratio = width as f64 / height as f64;
	let dest_ratio = bound_width as f64 / bound_height as f64;

	if im_ratio > dest_ratio {
		let new_height = (height as f64 / width as f64 * bound_width as f64).round() as u32;
		(bound_width, new_height.max(1))
	} else if im_ratio < dest_ratio {
		let new_width = (width as f64 / height as f64 * bound_height as f64).round() as u32;
		(new_width.max(1), bound_height)
	} else {
		(bound_width, bound_height)
	}
}

/// Scales the image so it fits inside `dimensions` without cropping
pub fn contain(image: &DynamicImage, dimensions: (u32, u32)) -> Result<DynamicImage> {
	check_dimensions(image.dimensions(), dimensions)?;

	let (width, height) = contain_size(image.dimensions(), dimensions);
	if (width, height) == image.dimensions() {
		Ok(image.clone())
	} else {
		Ok(image.resize_exact(width, height, FilterType::Lanczos3))
	}
}

fn box_blur_rows(image: &RgbImage, radius: u32) -> RgbImage {
	let (width, height) = image.dimensions();
	let mut out = RgbImage::new(width, height);

	let stride = width as usize * 3;
	let radius = radius as i64;
	let window = (2 * radius + 1) as u32;
	let last = width as i64 - 1;

	out.par_chunks_mut(stride).zip(image.par_chunks(stride)).for_each(|(dst, src)| {
		for x in 0..width as i64 {
			let mut sum = [0u32; 3];
			for offset in -radius..=radius {
				let px = (x + offset).clamp(0, last) as usize * 3;
				sum[0] += src[px] as u32;
				sum[1] += src[px + 1] as u32;
				sum[2] += src[px + 2] as u32;
			}

			let px = x as usize * 3;
			for channel in 0..3 {
				dst[px + channel] = ((sum[channel] + window / 2) / window) as u8;
			}
		}
	});

	out
}

/// Separable box blur with a `2 * radius + 1` window, clamping at the edges
pub fn box_blur(image: &RgbImage, radius: u32) -> RgbImage {
	if radius == 0 || image.width() == 0 || image.height() == 0 {
		return image.clone();
	}

	let horizontal = box_blur_rows(image, radius);
	let transposed = image::imageops::rotate90(&horizontal);
	let vertical = box_blur_rows(&transposed, radius);
	image::imageops::rotate270(&vertical)
}

/// Fills `dimensions` with a blurred copy of the image and centers the uncropped original on top
pub fn pad_image_blur(image: &DynamicImage, dimensions: (u32, u32)) -> Result<DynamicImage> {
	let mut background = box_blur(&fit(image, dimensions)?.into_rgb8(), PAD_BLUR_RADIUS);
	let foreground = contain(image, dimensions)?.into_rgb8();

	let x = dimensions.0.saturating_sub(foreground.width()) / 2;
	let y = dimensions.1.saturating_sub(foreground.height()) / 2;
	image::imageops::replace(&mut background, &foreground, x, y);

	Ok(DynamicImage::ImageRgb8(background))
}

#[inline]
pub fn hash_rgb(image: &RgbImage) -> String {
	hex::encode(Sha256::digest(image.as_raw()))
}

/// SHA-256 of the image's RGB pixels, hex encoded
pub fn compute_image_hash(image: &DynamicImage) -> String {
	match image {
		DynamicImage::ImageRgb8(rgb) => hash_rgb(rgb),
		_ => hash_rgb(&image.to_rgb8())
	}
}

#[cfg(test)]
fn gradient(width: u32, height: u32) -> DynamicImage {
	DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
		image::Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
	}))
}

#[test]
fn test_orientation_rotates_counter_clockwise() {
	let mut image = RgbImage::new(4, 2);
	image.put_pixel(3, 0, image::Rgb([255, 0, 0]));
	let image = DynamicImage::ImageRgb8(image);

	let vertical = change_orientation(&image, Orientation::Vertical, false).into_rgb8();
	assert_eq!(vertical.dimensions(), (2, 4));
	// top-right corner ends up top-left after a quarter turn counter-clockwise
	assert_eq!(vertical.get_pixel(0, 0), &image::Rgb([255, 0, 0]));

	let inverted = change_orientation(&image, Orientation::Vertical, true).into_rgb8();
	assert_eq!(inverted.dimensions(), (2, 4));
	assert_eq!(inverted.get_pixel(1, 3), &image::Rgb([255, 0, 0]));

	let flipped = change_orientation(&image, Orientation::Horizontal, true).into_rgb8();
	assert_eq!(flipped.dimensions(), (4, 2));
	assert_eq!(flipped.get_pixel(0, 1), &image::Rgb([255, 0, 0]));

	let unchanged = change_orientation(&image, Orientation::Horizontal, false).into_rgb8();
	assert_eq!(unchanged, image.to_rgb8());
}

#[test]
fn test_aspect_crop() {
	// wider than target: crop width, centered
	assert_eq!(aspect_crop((1000, 500), (400, 400), false), Rect::new(250, 0, 500, 500));
	assert_eq!(aspect_crop((1000, 500), (400, 400), true), Rect::new(0, 0, 500, 500));

	// taller than target: crop height, centered
	assert_eq!(aspect_crop((600, 1000), (800, 480), false), Rect::new(0, 320, 600, 360));
	assert_eq!(aspect_crop((600, 1000), (800, 480), true), Rect::new(0, 0, 600, 360));

	// same ratio: no crop
	assert_eq!(aspect_crop((1600, 960), (800, 480), false), Rect::new(0, 0, 1600, 960));
}

#[test]
fn test_resize_image_hits_exact_dimensions() {
	for &(source, target) in &[((1000, 500), (800, 480)), ((300, 900), (800, 480)), ((17, 13), (3, 200))] {
		let resized = resize_image(&gradient(source.0, source.1), target, ResizeOptions::default()).unwrap();
		assert_eq!(resized.dimensions(), target);
	}

	assert!(matches!(
		resize_image(&gradient(10, 10), (0, 480), ResizeOptions::default()),
		Err(Error::EmptyDimensions { to: (0, 480), .. })
	));
}

#[test]
fn test_keep_width_crops_from_origin() {
	let mut image = RgbImage::from_pixel(20, 10, image::Rgb([0, 0, 255]));
	for y in 0..10 {
		for x in 0..10 {
			image.put_pixel(x, y, image::Rgb([255, 0, 0]));
		}
	}
	let image = DynamicImage::ImageRgb8(image);

	let kept = resize_image(&image, (10, 10), ResizeOptions { keep_width: true }).unwrap().into_rgb8();
	assert!(kept.pixels().all(|px| *px == image::Rgb([255, 0, 0])));

	let centered = resize_image(&image, (10, 10), ResizeOptions::default()).unwrap().into_rgb8();
	assert_eq!(centered.get_pixel(0, 5), &image::Rgb([255, 0, 0]));
	assert_eq!(centered.get_pixel(9, 5), &image::Rgb([0, 0, 255]));
}

#[test]
fn test_resize_options_flags() {
	assert_eq!(ResizeOptions::from_flags(["keep-width"]), ResizeOptions { keep_width: true });
	assert_eq!(ResizeOptions::from_flags(["fit", "frame"]), ResizeOptions::default());

	let parsed: ResizeOptions = serde_json::from_str(r#"["keep-width", "something-else"]"#).unwrap();
	assert!(parsed.keep_width);
	assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"["keep-width"]"#);
}

#[test]
fn test_contain_size() {
	assert_eq!(contain_size((1000, 500), (800, 480)), (800, 400));
	assert_eq!(contain_size((500, 1000), (800, 480)), (240, 480));
	assert_eq!(contain_size((400, 240), (800, 480)), (800, 480));
	assert_eq!(contain_size((10_000, 1), (800, 480)), (800, 1));
}

#[test]
fn test_box_blur_preserves_flat_color() {
	let flat = RgbImage::from_pixel(30, 20, image::Rgb([12, 200, 77]));
	assert_eq!(box_blur(&flat, PAD_BLUR_RADIUS), flat);
}

#[test]
fn test_box_blur_spreads_a_single_pixel() {
	let mut image = RgbImage::new(9, 9);
	image.put_pixel(4, 4, image::Rgb([255, 255, 255]));

	let blurred = box_blur(&image, 1);
	// 255 / 9 spread over the 3x3 neighbourhood
	assert_eq!(blurred.get_pixel(4, 4), &image::Rgb([28, 28, 28]));
	assert_eq!(blurred.get_pixel(3, 3), &image::Rgb([28, 28, 28]));
	assert_eq!(blurred.get_pixel(2, 2), &image::Rgb([0, 0, 0]));
}

#[test]
fn test_pad_image_blur_centers_original() {
	let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, image::Rgb([255, 0, 0])));
	let padded = pad_image_blur(&red, (300, 100)).unwrap().into_rgb8();

	assert_eq!(padded.dimensions(), (300, 100));
	assert_eq!(padded.get_pixel(150, 50), &image::Rgb([255, 0, 0]));
	let corner = padded.get_pixel(0, 0);
	assert!(corner[0] > 240 && corner[1] < 16 && corner[2] < 16, "{corner:?}");
}

#[test]
fn test_image_hash() {
	let a = gradient(32, 16);
	let b = DynamicImage::ImageRgba8(a.to_rgba8());
	assert_eq!(compute_image_hash(&a), compute_image_hash(&b));
	assert_eq!(compute_image_hash(&a).len(), 64);

	let c = gradient(16, 32);
	assert_ne!(compute_image_hash(&a), compute_image_hash(&c));

	// sha256 of the empty byte string
	assert_eq!(
		compute_image_hash(&DynamicImage::ImageRgb8(RgbImage::new(0, 0))),
		"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
	);
}
