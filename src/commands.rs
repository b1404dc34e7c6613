use std::{
	io::Write,
	path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use ink_display::{Display, DisplayManager};
use ink_util::{DynamicImage, GenericImageView, ImageFetcher, Overlay, Position, DEFAULT_FETCH_TIMEOUT};

use crate::{settings::Settings, Command};

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayArg {
	pub source: String,
	pub position: Position,
	pub opacity: f32,
}

fn parse_position(s: &str) -> Option<Position> {
	Position::ALL.into_iter().find(|position| position.as_str() == s)
}

fn parse_opacity(s: &str) -> Option<f32> {
	s.parse::<f32>().ok().filter(|opacity| (0.0..=1.0).contains(opacity))
}

/// Parses `source[:position[:opacity]]`.
///
/// Suffixes are taken from the right and only when they parse, so URLs and paths may contain colons.
pub fn parse_overlay_arg(arg: &str) -> Result<OverlayArg, String> {
	let mut source = arg;
	let mut position = Position::default();
	let mut opacity = 1.0;

	if let Some((rest, value)) = source.rsplit_once(':').and_then(|(rest, last)| Some((rest, parse_opacity(last)?))) {
		source = rest;
		opacity = value;
	}

	if let Some((rest, value)) = source.rsplit_once(':').and_then(|(rest, last)| Some((rest, parse_position(last)?))) {
		source = rest;
		position = value;
	}

	if source.is_empty() {
		return Err("overlay path is empty".to_owned());
	}

	Ok(OverlayArg { source: source.to_owned(), position, opacity })
}

fn load_image(source: &str) -> anyhow::Result<DynamicImage> {
	if ink_util::is_url(source) {
		log::info!("Grabbing image from: {source}");

		let fetcher = ImageFetcher::new(DEFAULT_FETCH_TIMEOUT)?;
		match fetcher.get_image(source).with_context(|| format!("Failed to fetch {source}"))? {
			Some(image) => Ok(image),
			None => bail!("Failed to load image, please check logs."),
		}
	} else {
		ink_util::image::open(source).with_context(|| format!("Failed to open {source}"))
	}
}

/// Hash of the frame last pushed by a previous invocation, kept next to the mock sink's output
fn last_hash_path(settings: &Settings) -> PathBuf {
	settings.device.output_dir.join("last_hash")
}

fn open_manager(settings: &Settings) -> anyhow::Result<DisplayManager<Box<dyn Display>>> {
	let display = ink_display::open_display(&settings.device)?;
	let last_hash = std::fs::read_to_string(last_hash_path(settings)).ok().map(|hash| hash.trim().to_owned()).filter(|hash| !hash.is_empty());
	Ok(DisplayManager::new(display, settings.device.clone())?.with_last_hash(last_hash))
}

fn show(settings: &Settings, image: &DynamicImage) -> anyhow::Result<()> {
	let mut manager = open_manager(settings)?;
	if manager.display_image(image, settings.image_settings, &settings.enhancement)? {
		log::info!("Display updated");

		if let Some(hash) = manager.last_hash() {
			let path = last_hash_path(settings);
			if let Err(err) = std::fs::write(&path, hash) {
				log::warn!("Failed to save {}: {err}", path.display());
			}
		}
	}
	Ok(())
}

/// Command results go to `out`; logging goes to stderr
pub fn run(config: &Path, command: Command, out: &mut dyn Write) -> anyhow::Result<()> {
	let settings = Settings::load(config)?;

	match command {
		Command::Show { source } => show(&settings, &load_image(&source)?),

		Command::Html { page } => {
			let dimensions = settings.device.render_dimensions();
			let image = settings
				.screenshot
				.browser
				.take_screenshot(&page, dimensions, settings.screenshot.timeout_ms)
				.with_context(|| format!("Failed to screenshot {}", page.display()))?;
			show(&settings, &image)
		}

		Command::Compose { base, overlays, scale } => {
			let base = load_image(&base)?;

			let overlays = overlays
				.into_iter()
				.map(|arg| {
					let mut image = load_image(&arg.source)?;
					if let Some(fraction) = scale {
						image = ink_util::scale_to_width(&image, base.width(), fraction);
					}
					Ok(Overlay::new(image).position(arg.position).opacity(arg.opacity))
				})
				.collect::<anyhow::Result<Vec<_>>>()?;

			let composed = ink_util::compose(&base, &overlays);
			show(&settings, &DynamicImage::ImageRgba8(composed))
		}

		Command::Pad { source } => {
			let padded = ink_util::pad_image_blur(&load_image(&source)?, settings.device.render_dimensions())?;
			show(&settings, &padded)
		}

		Command::Hash { source } => {
			writeln!(out, "{}", ink_util::compute_image_hash(&load_image(&source)?))?;
			Ok(())
		}

		Command::Config => {
			writeln!(out, "{}", settings.to_json()?)?;
			Ok(())
		}

		Command::Shutdown => {
			let mut manager = open_manager(&settings).context("Error shutting down display")?;
			manager.shutdown().context("Error shutting down display")?;

			if let Err(err) = std::fs::remove_file(last_hash_path(&settings)) {
				if err.kind() != std::io::ErrorKind::NotFound {
					log::warn!("Failed to remove last frame hash: {err}");
				}
			}
			Ok(())
		}
	}
}

#[test]
fn test_parse_overlay_arg() {
	assert_eq!(
		parse_overlay_arg("weather.png").unwrap(),
		OverlayArg { source: "weather.png".to_owned(), position: Position::BottomLeft, opacity: 1.0 }
	);
	assert_eq!(
		parse_overlay_arg("clock.png:top-right:0.85").unwrap(),
		OverlayArg { source: "clock.png".to_owned(), position: Position::TopRight, opacity: 0.85 }
	);
	assert_eq!(
		parse_overlay_arg("badge.png:0.5").unwrap(),
		OverlayArg { source: "badge.png".to_owned(), position: Position::BottomLeft, opacity: 0.5 }
	);
	assert_eq!(
		parse_overlay_arg("status.png:sideways").unwrap(),
		OverlayArg { source: "status.png:sideways".to_owned(), position: Position::BottomLeft, opacity: 1.0 }
	);
	assert!(parse_overlay_arg(":center").is_err());
	assert!(parse_overlay_arg(":center:0.5").is_err());
}

#[test]
fn test_parse_overlay_arg_keeps_colons_in_source() {
	assert_eq!(
		parse_overlay_arg("https://example.com/weather.png").unwrap(),
		OverlayArg { source: "https://example.com/weather.png".to_owned(), position: Position::BottomLeft, opacity: 1.0 }
	);
	assert_eq!(
		parse_overlay_arg("https://example.com:8080/weather.png").unwrap(),
		OverlayArg { source: "https://example.com:8080/weather.png".to_owned(), position: Position::BottomLeft, opacity: 1.0 }
	);
	assert_eq!(
		parse_overlay_arg("http://localhost:8080:center:0.25").unwrap(),
		OverlayArg { source: "http://localhost:8080".to_owned(), position: Position::Center, opacity: 0.25 }
	);
	assert_eq!(parse_overlay_arg("http://localhost:8080").unwrap().source, "http://localhost:8080");
}

#[test]
fn test_compose_command_writes_mock_frame() {
	let dir = tempfile::tempdir().unwrap();
	let base = dir.path().join("base.png");
	let overlay = dir.path().join("overlay.png");
	ink_util::RgbImage::from_pixel(100, 60, ink_util::image::Rgb([0, 0, 255])).save(&base).unwrap();
	ink_util::RgbImage::from_pixel(20, 10, ink_util::image::Rgb([255, 0, 0])).save(&overlay).unwrap();

	let config = dir.path().join("device.json");
	let output = dir.path().join("frames");
	std::fs::write(
		&config,
		format!(r#"{{ "resolution": [100, 60], "output_dir": {:?} }}"#, output.display().to_string()),
	)
	.unwrap();

	run(
		&config,
		Command::Compose {
			base: base.display().to_string(),
			overlays: vec![parse_overlay_arg(&format!("{}:top-left", overlay.display())).unwrap()],
			scale: None,
		},
		&mut Vec::new(),
	)
	.unwrap();

	let latest = ink_util::image::open(output.join("latest.png")).unwrap().into_rgb8();
	assert_eq!(latest.dimensions(), (100, 60));
	assert_eq!(latest.get_pixel(25, 25), &ink_util::image::Rgb([255, 0, 0]));
	assert_eq!(latest.get_pixel(60, 40), &ink_util::image::Rgb([0, 0, 255]));
}

#[test]
fn test_shutdown_on_unsupported_display_fails() {
	let dir = tempfile::tempdir().unwrap();
	let config = dir.path().join("device.json");
	std::fs::write(&config, r#"{ "display_type": "inky" }"#).unwrap();

	assert!(run(&config, Command::Shutdown, &mut Vec::new()).is_err());
}

#[test]
fn test_config_output_loads_back() {
	let dir = tempfile::tempdir().unwrap();
	let config = dir.path().join("device.json");

	let mut out = Vec::new();
	run(&config, Command::Config, &mut out).unwrap();

	std::fs::write(&config, &out).unwrap();
	assert_eq!(Settings::load(&config).unwrap(), Settings::default());
}

#[test]
fn test_show_persists_last_frame_hash() {
	let dir = tempfile::tempdir().unwrap();
	let source = dir.path().join("photo.png");
	ink_util::RgbImage::from_pixel(50, 30, ink_util::image::Rgb([10, 200, 30])).save(&source).unwrap();

	let config = dir.path().join("device.json");
	let output = dir.path().join("frames");
	std::fs::write(
		&config,
		format!(r#"{{ "resolution": [50, 30], "output_dir": {:?} }}"#, output.display().to_string()),
	)
	.unwrap();

	run(&config, Command::Show { source: source.display().to_string() }, &mut Vec::new()).unwrap();

	let latest = ink_util::image::open(output.join("latest.png")).unwrap();
	let saved = std::fs::read_to_string(output.join("last_hash")).unwrap();
	assert_eq!(saved, ink_util::compute_image_hash(&latest));

	// a second run sees the same frame and leaves the sink alone
	std::fs::remove_file(output.join("latest.png")).unwrap();
	run(&config, Command::Show { source: source.display().to_string() }, &mut Vec::new()).unwrap();
	assert!(!output.join("latest.png").exists());

	run(&config, Command::Shutdown, &mut Vec::new()).unwrap();
	assert!(!output.join("last_hash").exists());
}
