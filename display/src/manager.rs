use ink_util::{image::ImageFormat, DynamicImage, Enhancement, ResizeOptions, RgbImage};

use crate::{DeviceSettings, Display, DisplayType, Result};

/// Orients, resizes and enhances images before handing them to a [`Display`]
pub struct DisplayManager<D: Display> {
	display: D,
	device: DeviceSettings,
	last_hash: Option<String>,
}
impl<D: Display> DisplayManager<D> {
	pub fn new(mut display: D, device: DeviceSettings) -> Result<Self> {
		display.initialize()?;

		Ok(Self {
			display,
			device,
			last_hash: None,
		})
	}

	#[inline]
	pub fn display(&self) -> &D {
		&self.display
	}

	#[inline]
	pub fn device(&self) -> &DeviceSettings {
		&self.device
	}

	/// Dimensions plugins and screenshots should be produced at
	#[inline]
	pub fn render_dimensions(&self) -> (u32, u32) {
		self.device.orientation.render_dimensions(self.display.resolution())
	}

	#[inline]
	pub fn last_hash(&self) -> Option<&str> {
		self.last_hash.as_deref()
	}

	/// Seeds the hash of the frame already on the panel, e.g. one saved by a previous run
	#[inline]
	pub fn with_last_hash(mut self, hash: Option<String>) -> Self {
		self.last_hash = hash;
		self
	}

	/// The frame that would be pushed for `image`
	pub fn prepare(&self, image: &DynamicImage, resize: ResizeOptions, enhancement: &Enhancement) -> Result<RgbImage> {
		let image = ink_util::change_orientation(image, self.device.orientation, self.device.inverted_image);
		let image = ink_util::resize_image(&image, self.display.resolution(), resize)?;
		Ok(ink_util::apply_image_enhancement(&image, enhancement).into_rgb8())
	}

	/// Returns `false` when the frame is identical to the one already on the panel
	pub fn display_image(&mut self, image: &DynamicImage, resize: ResizeOptions, enhancement: &Enhancement) -> Result<bool> {
		if let Some(path) = &self.device.current_image_path {
			image.save_with_format(path, ImageFormat::Png)?;
		}

		let frame = self.prepare(image, resize, enhancement)?;

		let hash = ink_util::hash_rgb(&frame);
		if self.last_hash.as_deref() == Some(hash.as_str()) {
			log::info!("Image unchanged, skipping display refresh");
			return Ok(false);
		}

		self.display.display_image(&frame)?;
		self.last_hash = Some(hash);

		Ok(true)
	}

	/// Blanks the panel and puts it to sleep
	pub fn shutdown(&mut self) -> Result<()> {
		log::info!("Starting display shutdown sequence");

		if self.display.kind() == DisplayType::Mock {
			log::info!("Mock display detected, no hardware shutdown needed");
			return Ok(());
		}

		log::info!("Clearing {} display", self.display.kind());
		self.display.initialize()?;
		self.display.clear()?;

		log::info!("Putting {} display into sleep mode", self.display.kind());
		self.display.sleep()?;

		self.last_hash = None;

		log::info!("Display shutdown sequence completed successfully");
		Ok(())
	}
}

#[cfg(test)]
#[derive(Debug, PartialEq)]
enum Event {
	Initialize,
	Frame(RgbImage),
	Clear,
	Sleep,
}

#[cfg(test)]
struct RecordingDisplay {
	kind: DisplayType,
	resolution: (u32, u32),
	events: Vec<Event>,
}
#[cfg(test)]
impl RecordingDisplay {
	fn new(kind: DisplayType, resolution: (u32, u32)) -> Self {
		Self { kind, resolution, events: Vec::new() }
	}

	fn frames(&self) -> Vec<&RgbImage> {
		self.events
			.iter()
			.filter_map(|event| match event {
				Event::Frame(frame) => Some(frame),
				_ => None,
			})
			.collect()
	}
}
#[cfg(test)]
impl Display for RecordingDisplay {
	fn kind(&self) -> DisplayType {
		self.kind.clone()
	}

	fn resolution(&self) -> (u32, u32) {
		self.resolution
	}

	fn initialize(&mut self) -> Result<()> {
		self.events.push(Event::Initialize);
		Ok(())
	}

	fn display_image(&mut self, image: &RgbImage) -> Result<()> {
		self.events.push(Event::Frame(image.clone()));
		Ok(())
	}

	fn clear(&mut self) -> Result<()> {
		self.events.push(Event::Clear);
		Ok(())
	}

	fn sleep(&mut self) -> Result<()> {
		self.events.push(Event::Sleep);
		Ok(())
	}
}

#[cfg(test)]
fn landscape(width: u32, height: u32) -> DynamicImage {
	DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, _| {
		if x < width / 2 {
			ink_util::image::Rgb([255, 0, 0])
		} else {
			ink_util::image::Rgb([0, 0, 255])
		}
	}))
}

#[test]
fn test_display_image_fits_panel() {
	let display = RecordingDisplay::new(DisplayType::Mock, (80, 48));
	let mut manager = DisplayManager::new(display, DeviceSettings::default()).unwrap();

	assert!(manager.display_image(&landscape(400, 100), ResizeOptions::default(), &Enhancement::default()).unwrap());

	let frames = manager.display().frames();
	assert_eq!(frames.len(), 1);
	assert_eq!(frames[0].dimensions(), (80, 48));
	assert_eq!(manager.display().events[0], Event::Initialize);
}

#[test]
fn test_display_image_skips_unchanged_frames() {
	let display = RecordingDisplay::new(DisplayType::Mock, (40, 20));
	let mut manager = DisplayManager::new(display, DeviceSettings::default()).unwrap();
	let image = landscape(40, 20);

	assert!(manager.display_image(&image, ResizeOptions::default(), &Enhancement::default()).unwrap());
	assert!(!manager.display_image(&image, ResizeOptions::default(), &Enhancement::default()).unwrap());
	assert_eq!(manager.display().frames().len(), 1);

	let darker = Enhancement { brightness: 0.5, ..Default::default() };
	assert!(manager.display_image(&image, ResizeOptions::default(), &darker).unwrap());
	assert_eq!(manager.display().frames().len(), 2);
	assert_eq!(manager.display().frames()[1].get_pixel(0, 0), &ink_util::image::Rgb([127, 0, 0]));
}

#[test]
fn test_vertical_orientation_rotates_into_panel() {
	let device = DeviceSettings {
		orientation: ink_util::Orientation::Vertical,
		..Default::default()
	};
	let display = RecordingDisplay::new(DisplayType::Mock, (40, 20));
	let mut manager = DisplayManager::new(display, device).unwrap();
	assert_eq!(manager.render_dimensions(), (20, 40));

	// portrait content, red on the left half
	let portrait = landscape(20, 40);
	manager.display_image(&portrait, ResizeOptions::default(), &Enhancement::default()).unwrap();

	let frame = manager.display().frames()[0];
	assert_eq!(frame.dimensions(), (40, 20));
	// a quarter turn counter-clockwise moves the left half to the bottom
	assert_eq!(frame.get_pixel(20, 19), &ink_util::image::Rgb([255, 0, 0]));
	assert_eq!(frame.get_pixel(20, 0), &ink_util::image::Rgb([0, 0, 255]));
}

#[test]
fn test_current_image_is_saved_untransformed() {
	let dir = tempfile::tempdir().unwrap();
	let device = DeviceSettings {
		current_image_path: Some(dir.path().join("current_image.png")),
		..Default::default()
	};
	let mut manager = DisplayManager::new(RecordingDisplay::new(DisplayType::Mock, (10, 10)), device).unwrap();

	manager.display_image(&landscape(30, 12), ResizeOptions::default(), &Enhancement::default()).unwrap();

	let saved = ink_util::image::open(dir.path().join("current_image.png")).unwrap();
	assert_eq!(ink_util::GenericImageView::dimensions(&saved), (30, 12));
}

#[test]
fn test_mock_shutdown_is_a_no_op() {
	let mut manager = DisplayManager::new(RecordingDisplay::new(DisplayType::Mock, (10, 10)), DeviceSettings::default()).unwrap();
	manager.shutdown().unwrap();
	assert_eq!(manager.display().events, vec![Event::Initialize]);
}

#[test]
fn test_hardware_shutdown_clears_then_sleeps() {
	let display = RecordingDisplay::new(DisplayType::Waveshare("epd7in3f".into()), (10, 10));
	let mut manager = DisplayManager::new(display, DeviceSettings::default()).unwrap();
	manager.shutdown().unwrap();

	assert_eq!(
		manager.display().events,
		vec![Event::Initialize, Event::Initialize, Event::Clear, Event::Sleep]
	);
	assert_eq!(manager.last_hash(), None);
}

#[test]
fn test_current_image_saved_as_png_without_extension() {
	let dir = tempfile::tempdir().unwrap();
	let device = DeviceSettings {
		current_image_path: Some(dir.path().join("current_image")),
		..Default::default()
	};
	let mut manager = DisplayManager::new(RecordingDisplay::new(DisplayType::Mock, (10, 10)), device).unwrap();

	assert!(manager.display_image(&landscape(12, 6), ResizeOptions::default(), &Enhancement::default()).unwrap());

	let saved = ink_util::image::load_from_memory_with_format(&std::fs::read(dir.path().join("current_image")).unwrap(), ImageFormat::Png).unwrap();
	assert_eq!(saved.into_rgb8().dimensions(), (12, 6));
}

#[test]
fn test_seeded_hash_skips_frame_already_shown() {
	let image = landscape(40, 20);

	let mut first = DisplayManager::new(RecordingDisplay::new(DisplayType::Mock, (40, 20)), DeviceSettings::default()).unwrap();
	assert!(first.display_image(&image, ResizeOptions::default(), &Enhancement::default()).unwrap());
	let hash = first.last_hash().map(str::to_owned);

	let mut second = DisplayManager::new(RecordingDisplay::new(DisplayType::Mock, (40, 20)), DeviceSettings::default())
		.unwrap()
		.with_last_hash(hash);
	assert!(!second.display_image(&image, ResizeOptions::default(), &Enhancement::default()).unwrap());
	assert!(second.display().frames().is_empty());
}
