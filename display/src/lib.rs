use std::path::PathBuf;

use ink_util::{Orientation, RgbImage};

mod error;
pub use error::*;

mod mock;
pub use mock::MockDisplay;

mod manager;
pub use manager::DisplayManager;

/// Panel family, from the `display_type` setting.
///
/// Anything that isn't `mock` or `inky` names a Waveshare EPD model (`epd7in3f`, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DisplayType {
	#[default]
	Mock,
	Inky,
	Waveshare(Box<str>),
}
impl DisplayType {
	pub fn as_str(&self) -> &str {
		match self {
			DisplayType::Mock => "mock",
			DisplayType::Inky => "inky",
			DisplayType::Waveshare(model) => model,
		}
	}
}
impl From<String> for DisplayType {
	fn from(name: String) -> Self {
		match name.as_str() {
			"mock" => DisplayType::Mock,
			"inky" => DisplayType::Inky,
			_ => DisplayType::Waveshare(name.into_boxed_str()),
		}
	}
}
impl From<DisplayType> for String {
	#[inline]
	fn from(display_type: DisplayType) -> Self {
		display_type.as_str().to_owned()
	}
}
impl core::fmt::Display for DisplayType {
	#[inline]
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
	pub resolution: (u32, u32),
	pub orientation: Orientation,
	pub inverted_image: bool,
	pub display_type: DisplayType,
	pub output_dir: PathBuf,

	/// Where the last untransformed image is kept, if anywhere
	pub current_image_path: Option<PathBuf>,
}
impl Default for DeviceSettings {
	fn default() -> Self {
		Self {
			resolution: (800, 480),
			orientation: Orientation::Horizontal,
			inverted_image: false,
			display_type: DisplayType::Mock,
			output_dir: PathBuf::from("mock_display_output"),
			current_image_path: None,
		}
	}
}
impl DeviceSettings {
	/// Dimensions content should be generated at, before orientation is applied
	#[inline]
	pub fn render_dimensions(&self) -> (u32, u32) {
		self.orientation.render_dimensions(self.resolution)
	}
}

pub trait Display {
	fn kind(&self) -> DisplayType;

	fn resolution(&self) -> (u32, u32);

	fn initialize(&mut self) -> Result<()>;

	/// Pushes a frame that already matches [`Display::resolution`]
	fn display_image(&mut self, image: &RgbImage) -> Result<()>;

	fn clear(&mut self) -> Result<()> {
		let (width, height) = self.resolution();
		self.display_image(&RgbImage::from_pixel(width, height, ink_util::image::Rgb([255, 255, 255])))
	}

	fn sleep(&mut self) -> Result<()> {
		Ok(())
	}
}
impl<D: Display + ?Sized> Display for Box<D> {
	#[inline]
	fn kind(&self) -> DisplayType {
		(**self).kind()
	}

	#[inline]
	fn resolution(&self) -> (u32, u32) {
		(**self).resolution()
	}

	#[inline]
	fn initialize(&mut self) -> Result<()> {
		(**self).initialize()
	}

	#[inline]
	fn display_image(&mut self, image: &RgbImage) -> Result<()> {
		(**self).display_image(image)
	}

	#[inline]
	fn clear(&mut self) -> Result<()> {
		(**self).clear()
	}

	#[inline]
	fn sleep(&mut self) -> Result<()> {
		(**self).sleep()
	}
}

/// Builds the driver for the configured display type
pub fn open_display(device: &DeviceSettings) -> Result<Box<dyn Display>> {
	log::info!("Display type: {}", device.display_type);

	match &device.display_type {
		DisplayType::Mock => Ok(Box::new(MockDisplay::new(device.resolution, &device.output_dir)?)),
		other => Err(Error::UnsupportedDisplay(other.as_str().into())),
	}
}

#[test]
fn test_display_type_names() {
	assert_eq!(DisplayType::from("mock".to_owned()), DisplayType::Mock);
	assert_eq!(DisplayType::from("inky".to_owned()), DisplayType::Inky);
	assert_eq!(DisplayType::from("epd7in3f".to_owned()), DisplayType::Waveshare("epd7in3f".into()));
	assert_eq!(String::from(DisplayType::Waveshare("epd7in3f".into())), "epd7in3f");
}

#[test]
fn test_open_display() {
	let dir = tempfile::tempdir().unwrap();
	let device = DeviceSettings {
		resolution: (600, 448),
		output_dir: dir.path().join("mock"),
		..Default::default()
	};

	let display = open_display(&device).unwrap();
	assert_eq!(display.kind(), DisplayType::Mock);
	assert_eq!(display.resolution(), (600, 448));
	assert!(dir.path().join("mock").is_dir());

	let inky = DeviceSettings {
		display_type: DisplayType::Inky,
		..device
	};
	assert!(matches!(open_display(&inky), Err(Error::UnsupportedDisplay(name)) if &*name == "inky"));
}
