use std::path::{Path, PathBuf};

use ink_util::{image::ImageFormat, RgbImage};

use crate::{Display, DisplayType, Result};

/// Development sink writing every frame to `output_dir` as PNG
pub struct MockDisplay {
	width: u32,
	height: u32,
	output_dir: PathBuf,
}
impl MockDisplay {
	pub fn new((width, height): (u32, u32), output_dir: impl AsRef<Path>) -> Result<Self> {
		let output_dir = output_dir.as_ref().to_path_buf();
		std::fs::create_dir_all(&output_dir)?;

		Ok(Self { width, height, output_dir })
	}

	#[inline]
	pub fn output_dir(&self) -> &Path {
		&self.output_dir
	}

	#[inline]
	pub fn latest_path(&self) -> PathBuf {
		self.output_dir.join("latest.png")
	}
}
impl Display for MockDisplay {
	#[inline]
	fn kind(&self) -> DisplayType {
		DisplayType::Mock
	}

	#[inline]
	fn resolution(&self) -> (u32, u32) {
		(self.width, self.height)
	}

	fn initialize(&mut self) -> Result<()> {
		log::info!("Mock display initialized: {}x{}", self.width, self.height);
		Ok(())
	}

	fn display_image(&mut self, image: &RgbImage) -> Result<()> {
		let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
		let path = self.output_dir.join(format!("display_{timestamp}.png"));

		image.save_with_format(&path, ImageFormat::Png)?;
		image.save_with_format(self.latest_path(), ImageFormat::Png)?;

		log::info!("Mock display wrote {}", path.display());
		Ok(())
	}
}

#[test]
fn test_mock_display_writes_frames() {
	let dir = tempfile::tempdir().unwrap();
	let mut display = MockDisplay::new((4, 3), dir.path().join("nested").join("out")).unwrap();
	display.initialize().unwrap();

	let frame = RgbImage::from_pixel(4, 3, ink_util::image::Rgb([1, 2, 3]));
	display.display_image(&frame).unwrap();

	let latest = ink_util::image::open(display.latest_path()).unwrap().into_rgb8();
	assert_eq!(latest, frame);

	let frames = std::fs::read_dir(display.output_dir())
		.unwrap()
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.file_name().to_string_lossy().into_owned())
		.filter(|name| name.starts_with("display_") && name.ends_with(".png"))
		.count();
	assert_eq!(frames, 1);
}

#[test]
fn test_mock_display_clear_is_white() {
	let dir = tempfile::tempdir().unwrap();
	let mut display = MockDisplay::new((5, 2), dir.path()).unwrap();
	display.clear().unwrap();

	let latest = ink_util::image::open(display.latest_path()).unwrap().into_rgb8();
	assert_eq!(latest.dimensions(), (5, 2));
	assert!(latest.pixels().all(|px| *px == ink_util::image::Rgb([255, 255, 255])));
}
