use std::{io::BufReader, path::Path};

use anyhow::Context;
use ink_display::DeviceSettings;
use ink_screenshot::Browser;
use ink_util::{Enhancement, ResizeOptions};

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScreenshotSettings {
	#[serde(flatten)]
	pub browser: Browser,
	pub timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
	#[serde(flatten)]
	pub device: DeviceSettings,

	pub image_settings: ResizeOptions,
	pub enhancement: Enhancement,
	pub screenshot: ScreenshotSettings,
}
impl Settings {
	/// Missing files fall back to defaults; malformed ones are an error
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		match std::fs::File::open(path) {
			Ok(f) => serde_json::from_reader(BufReader::new(f)).with_context(|| format!("Failed to parse {}", path.display())),

			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				log::warn!("{} not found, using default settings", path.display());
				Ok(Self::default())
			}

			Err(err) => Err(err).with_context(|| format!("Failed to open {}", path.display())),
		}
	}

	pub fn to_json(&self) -> anyhow::Result<String> {
		Ok(serde_json::to_string_pretty(self)?)
	}
}

#[test]
fn test_missing_file_is_default() {
	let dir = tempfile::tempdir().unwrap();
	assert_eq!(Settings::load(&dir.path().join("device.json")).unwrap(), Settings::default());
}

#[test]
fn test_load_device_json() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("device.json");
	std::fs::write(
		&path,
		r#"{
			"resolution": [600, 448],
			"orientation": "vertical",
			"inverted_image": true,
			"display_type": "epd5in65f",
			"image_settings": ["keep-width"],
			"enhancement": { "saturation": 1.6 },
			"screenshot": { "binary": "/usr/bin/chromium", "timeout_ms": 10000 }
		}"#,
	)
	.unwrap();

	let settings = Settings::load(&path).unwrap();
	assert_eq!(settings.device.resolution, (600, 448));
	assert_eq!(settings.device.orientation, ink_util::Orientation::Vertical);
	assert!(settings.device.inverted_image);
	assert_eq!(settings.device.display_type, ink_display::DisplayType::Waveshare("epd5in65f".into()));
	assert_eq!(settings.device.output_dir, std::path::PathBuf::from("mock_display_output"));
	assert!(settings.image_settings.keep_width);
	assert_eq!(settings.enhancement, Enhancement { saturation: 1.6, ..Default::default() });
	assert_eq!(settings.screenshot.browser.binary, std::path::PathBuf::from("/usr/bin/chromium"));
	assert_eq!(settings.screenshot.timeout_ms, Some(10000));
}

#[test]
fn test_malformed_file_is_an_error() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("device.json");
	std::fs::write(&path, r#"{ "resolution": "wide" }"#).unwrap();
	assert!(Settings::load(&path).is_err());
}

#[test]
fn test_json_round_trips_through_load() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("device.json");

	let settings = Settings {
		enhancement: Enhancement { contrast: 1.25, ..Default::default() },
		..Default::default()
	};
	std::fs::write(&path, settings.to_json().unwrap()).unwrap();
	assert_eq!(Settings::load(&path).unwrap(), settings);
}
