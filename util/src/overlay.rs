use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbaImage};
use rayon::prelude::*;

use crate::Point;

pub const DEFAULT_MARGIN: u32 = 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Position {
	TopLeft,
	TopRight,
	#[default]
	BottomLeft,
	BottomRight,
	Center
}
impl Position {
	pub const ALL: [Position; 5] = [
		Position::TopLeft,
		Position::TopRight,
		Position::BottomLeft,
		Position::BottomRight,
		Position::Center
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Position::TopLeft => "top-left",
			Position::TopRight => "top-right",
			Position::BottomLeft => "bottom-left",
			Position::BottomRight => "bottom-right",
			Position::Center => "center"
		}
	}
}
impl core::str::FromStr for Position {
	type Err = core::convert::Infallible;

	/// Unknown names fall back to [`Position::BottomLeft`]
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Position::ALL.into_iter().find(|position| position.as_str() == s).unwrap_or_default())
	}
}
impl core::fmt::Display for Position {
	#[inline]
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone)]
pub struct Overlay {
	pub image: DynamicImage,
	pub position: Position,
	pub opacity: f32,
	pub margin: u32
}
impl Overlay {
	#[inline]
	pub fn new(image: DynamicImage) -> Self {
		Self {
			image,
			position: Position::default(),
			opacity: 1.0,
			margin: DEFAULT_MARGIN
		}
	}

	#[inline]
	pub fn position(mut self, position: Position) -> Self {
		self.position = position;
		self
	}

	#[inline]
	pub fn opacity(mut self, opacity: f32) -> Self {
		self.opacity = opacity;
		self
	}

	#[inline]
	pub fn margin(mut self, margin: u32) -> Self {
		self.margin = margin;
		self
	}
}
impl core::fmt::Debug for Overlay {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Overlay")
			.field("image", &self.image.dimensions())
			.field("position", &self.position)
			.field("opacity", &self.opacity)
			.field("margin", &self.margin)
			.finish()
	}
}

/// Top-left corner of the overlay on the base. May be negative when the overlay doesn't fit.
pub fn calculate_position(base: (u32, u32), overlay: (u32, u32), position: Position, margin: u32) -> Point<i64> {
	let (bw, bh) = (base.0 as i64, base.1 as i64);
	let (ow, oh) = (overlay.0 as i64, overlay.1 as i64);
	let m = margin as i64;

	match position {
		Position::TopLeft => Point::new(m, m),
		Position::TopRight => Point::new(bw - ow - m, m),
		Position::BottomLeft => Point::new(m, bh - oh - m),
		Position::BottomRight => Point::new(bw - ow - m, bh - oh - m),
		Position::Center => Point::new((bw - ow).div_euclid(2), (bh - oh).div_euclid(2))
	}
}

pub fn apply_opacity(mut image: RgbaImage, opacity: f32) -> RgbaImage {
	if opacity >= 1.0 {
		return image;
	}

	let opacity = opacity.max(0.0);
	image.par_chunks_mut(4).for_each(|px| px[3] = (px[3] as f32 * opacity) as u8);
	image
}

#[inline]
fn blend_over(dst: &mut [u8], src: &[u8]) {
	let src_a = src[3] as f32 / 255.0;
	if src_a <= 0.0 {
		return;
	}

	let dst_a = dst[3] as f32 / 255.0;
	let out_a = src_a + dst_a * (1.0 - src_a);

	for channel in 0..3 {
		let color = (src[channel] as f32 * src_a + dst[channel] as f32 * dst_a * (1.0 - src_a)) / out_a;
		dst[channel] = color.round().clamp(0.0, 255.0) as u8;
	}
	dst[3] = (out_a * 255.0).round() as u8;
}

/// Source-over composite of `top` onto `base` at `at`, clipped to the base
pub fn paste_over(base: &mut RgbaImage, top: &RgbaImage, at: Point<i64>) {
	let (bw, bh) = (base.width() as i64, base.height() as i64);
	let (tw, th) = (top.width() as i64, top.height() as i64);

	let (x0, x1) = (at.x.max(0), (at.x + tw).min(bw));
	let (y0, y1) = (at.y.max(0), (at.y + th).min(bh));
	if x0 >= x1 || y0 >= y1 {
		return;
	}

	let stride = bw as usize * 4;
	let top_stride = tw as usize * 4;
	let top_raw = top.as_raw();

	base.par_chunks_mut(stride).enumerate().skip(y0 as usize).take((y1 - y0) as usize).for_each(|(y, row)| {
		let top_row = &top_raw[(y as i64 - at.y) as usize * top_stride..][..top_stride];
		for x in x0..x1 {
			let src = &top_row[(x - at.x) as usize * 4..][..4];
			blend_over(&mut row[x as usize * 4..][..4], src);
		}
	});
}

fn composite_onto(base: &mut RgbaImage, overlay: &Overlay) {
	let top = apply_opacity(overlay.image.to_rgba8(), overlay.opacity);
	let at = calculate_position(base.dimensions(), top.dimensions(), overlay.position, overlay.margin);
	log::debug!("compositing {}x{} overlay at {} ({}, {})", top.width(), top.height(), overlay.position, at.x, at.y);
	paste_over(base, &top, at);
}

pub fn composite_images(base: &DynamicImage, overlay: &Overlay) -> RgbaImage {
	let mut base = base.to_rgba8();
	composite_onto(&mut base, overlay);
	base
}

/// Composites each overlay in turn, later overlays landing on top of earlier ones
pub fn compose(base: &DynamicImage, overlays: &[Overlay]) -> RgbaImage {
	let mut base = base.to_rgba8();
	for overlay in overlays {
		composite_onto(&mut base, overlay);
	}
	base
}

/// Resizes an overlay to `fraction` of the base width, keeping its aspect ratio
pub fn scale_to_width(image: &DynamicImage, base_width: u32, fraction: f32) -> DynamicImage {
	let (width, height) = image.dimensions();
	if width == 0 || height == 0 {
		return image.clone();
	}

	let new_width = ((base_width as f32 * fraction) as u32).max(1);
	let new_height = ((new_width as f32 * (height as f32 / width as f32)) as u32).max(1);
	image.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

#[cfg(test)]
fn solid(width: u32, height: u32, px: [u8; 4]) -> DynamicImage {
	DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, image::Rgba(px)))
}

#[test]
fn test_calculate_position() {
	let base = (1000, 600);
	let overlay = (400, 300);

	assert_eq!(calculate_position(base, overlay, Position::TopLeft, 20), Point::new(20, 20));
	assert_eq!(calculate_position(base, overlay, Position::TopRight, 20), Point::new(580, 20));
	assert_eq!(calculate_position(base, overlay, Position::BottomLeft, 20), Point::new(20, 280));
	assert_eq!(calculate_position(base, overlay, Position::BottomRight, 20), Point::new(580, 280));
	assert_eq!(calculate_position(base, overlay, Position::Center, 20), Point::new(300, 150));

	// oversized overlays go negative, center floors
	assert_eq!(calculate_position((100, 100), (151, 120), Position::Center, 0), Point::new(-26, -10));
	assert_eq!(calculate_position((100, 100), (150, 50), Position::BottomRight, 10), Point::new(-60, 40));
}

#[test]
fn test_position_parsing() {
	for position in Position::ALL {
		assert_eq!(position.as_str().parse::<Position>(), Ok(position));
	}
	assert_eq!("middle".parse::<Position>(), Ok(Position::BottomLeft));
}

#[test]
fn test_apply_opacity() {
	let image = RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
	assert_eq!(apply_opacity(image.clone(), 1.0), image);
	assert_eq!(apply_opacity(image.clone(), 0.5).get_pixel(0, 0), &image::Rgba([10, 20, 30, 127]));
	assert_eq!(apply_opacity(image, -1.0).get_pixel(1, 1)[3], 0);
}

#[test]
fn test_composite_opaque_overlay() {
	let base = solid(100, 60, [0, 0, 255, 255]);
	let overlay = Overlay::new(solid(20, 10, [255, 0, 0, 255])).position(Position::TopRight).margin(5);

	let out = composite_images(&base, &overlay);
	assert_eq!(out.dimensions(), (100, 60));
	assert_eq!(out.get_pixel(75, 5), &image::Rgba([255, 0, 0, 255]));
	assert_eq!(out.get_pixel(94, 14), &image::Rgba([255, 0, 0, 255]));
	assert_eq!(out.get_pixel(74, 5), &image::Rgba([0, 0, 255, 255]));
	assert_eq!(out.get_pixel(95, 5), &image::Rgba([0, 0, 255, 255]));
}

#[test]
fn test_composite_half_opacity_blends() {
	let base = solid(10, 10, [0, 0, 0, 255]);
	let overlay = Overlay::new(solid(10, 10, [255, 255, 255, 255])).position(Position::TopLeft).margin(0).opacity(0.5);

	let out = composite_images(&base, &overlay);
	// alpha 127 of 255 over black
	assert_eq!(out.get_pixel(5, 5), &image::Rgba([127, 127, 127, 255]));
}

#[test]
fn test_composite_clips_out_of_bounds() {
	let base = solid(10, 10, [0, 0, 0, 255]);
	let overlay = Overlay::new(solid(30, 30, [0, 255, 0, 255])).position(Position::Center);

	let out = composite_images(&base, &overlay);
	assert!(out.pixels().all(|px| *px == image::Rgba([0, 255, 0, 255])));

	let offscreen = Overlay::new(solid(5, 5, [0, 255, 0, 255])).position(Position::TopLeft).margin(50);
	let out = composite_images(&base, &offscreen);
	assert!(out.pixels().all(|px| *px == image::Rgba([0, 0, 0, 255])));
}

#[test]
fn test_compose_stacks_in_order() {
	let base = solid(50, 50, [0, 0, 0, 255]);
	let overlays = [
		Overlay::new(solid(20, 20, [255, 0, 0, 255])).position(Position::TopLeft).margin(0),
		Overlay::new(solid(10, 10, [0, 255, 0, 255])).position(Position::TopLeft).margin(5)
	];

	let out = compose(&base, &overlays);
	assert_eq!(out.get_pixel(1, 1), &image::Rgba([255, 0, 0, 255]));
	assert_eq!(out.get_pixel(7, 7), &image::Rgba([0, 255, 0, 255]));
	assert_eq!(out.get_pixel(30, 30), &image::Rgba([0, 0, 0, 255]));
}

#[test]
fn test_scale_to_width() {
	let overlay = solid(600, 400, [1, 2, 3, 255]);
	assert_eq!(scale_to_width(&overlay, 1000, 0.4).dimensions(), (400, 266));
}
