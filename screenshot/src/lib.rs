use std::{
	ffi::{OsStr, OsString},
	io::Write,
	path::{Path, PathBuf},
	process::Command,
};

use image::DynamicImage;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("image error: {0}")]
	Image(#[from] image::ImageError),

	#[error("{0}")]
	Browser(Box<str>),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

pub const DEFAULT_BROWSER: &str = "chromium-headless-shell";

// software rendering, no sandbox
const BROWSER_FLAGS: &[&str] = &[
	"--disable-dev-shm-usage",
	"--disable-gpu",
	"--use-gl=swiftshader",
	"--hide-scrollbars",
	"--in-process-gpu",
	"--js-flags=--jitless",
	"--disable-zero-copy",
	"--disable-gpu-memory-buffer-compositor-resources",
	"--disable-extensions",
	"--disable-plugins",
	"--mute-audio",
	"--no-sandbox",
];

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Browser {
	pub binary: PathBuf,
	pub extra_args: Vec<String>,
}
impl Default for Browser {
	#[inline]
	fn default() -> Self {
		Self {
			binary: PathBuf::from(DEFAULT_BROWSER),
			extra_args: Vec::new(),
		}
	}
}
impl Browser {
	#[inline]
	pub fn new(binary: impl Into<PathBuf>) -> Self {
		Self {
			binary: binary.into(),
			..Default::default()
		}
	}

	pub fn command_args(&self, target: impl AsRef<OsStr>, (width, height): (u32, u32), output: &Path, timeout_ms: Option<u64>) -> Vec<OsString> {
		let mut args = Vec::with_capacity(BROWSER_FLAGS.len() + self.extra_args.len() + 5);

		args.push(target.as_ref().to_owned());
		args.push("--headless".into());

		let mut screenshot = OsString::from("--screenshot=");
		screenshot.push(output);
		args.push(screenshot);

		args.push(format!("--window-size={width},{height}").into());
		args.extend(BROWSER_FLAGS.iter().map(OsString::from));
		args.extend(self.extra_args.iter().map(OsString::from));

		if let Some(timeout_ms) = timeout_ms.filter(|&timeout_ms| timeout_ms > 0) {
			args.push(format!("--timeout={timeout_ms}").into());
		}

		args
	}

	/// Renders `target` (a URL or file path) in the headless browser and loads the result
	pub fn take_screenshot(&self, target: impl AsRef<OsStr>, dimensions: (u32, u32), timeout_ms: Option<u64>) -> Result<DynamicImage> {
		let output = tempfile::Builder::new().prefix("inky-screenshot-").suffix(".png").tempfile()?;

		let mut cmd = Command::new(&self.binary);
		cmd.args(self.command_args(target.as_ref(), dimensions, output.path(), timeout_ms));

		log::debug!("Taking {}x{} screenshot of {:?}", dimensions.0, dimensions.1, target.as_ref());

		let result = cmd.output()?;

		// the temp file exists from the start, so an empty one means nothing was written
		let written = std::fs::metadata(output.path()).map(|meta| meta.len() > 0).unwrap_or(false);

		if !result.status.success() || !written {
			let err = Error::Browser(
				format!(
					"Status: {:?}\n\n======= STDERR =======\n{}",
					result.status,
					String::from_utf8_lossy(&result.stderr)
				)
				.into_boxed_str(),
			);
			log::error!("Failed to take screenshot: {err}");
			return Err(err);
		}

		Ok(image::open(output.path())?)
	}

	pub fn take_screenshot_html(&self, html: &str, dimensions: (u32, u32), timeout_ms: Option<u64>) -> Result<DynamicImage> {
		let mut page = tempfile::Builder::new().prefix("inky-page-").suffix(".html").tempfile()?;
		page.write_all(html.as_bytes())?;
		page.flush()?;

		self.take_screenshot(page.path(), dimensions, timeout_ms)
	}
}

#[cfg(all(test, unix))]
fn fake_browser(dir: &Path, script: &str) -> Browser {
	use std::os::unix::fs::PermissionsExt;

	let path = dir.join("fake-browser");
	std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
	std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

	Browser::new(path)
}

#[cfg(all(test, unix))]
fn fixture_png(dir: &Path) -> PathBuf {
	let path = dir.join("fixture.png");
	image::RgbImage::from_pixel(12, 8, image::Rgb([250, 128, 0])).save(&path).unwrap();
	path
}

#[test]
fn test_command_args() {
	let browser = Browser::default();
	let args = browser.command_args("page.html", (800, 480), Path::new("/tmp/out.png"), Some(5000));

	assert_eq!(args[0], "page.html");
	assert_eq!(args[1], "--headless");
	assert_eq!(args[2], "--screenshot=/tmp/out.png");
	assert_eq!(args[3], "--window-size=800,480");
	assert_eq!(&args[4..4 + BROWSER_FLAGS.len()], BROWSER_FLAGS.iter().map(OsString::from).collect::<Vec<_>>().as_slice());
	assert_eq!(args.last().unwrap(), "--timeout=5000");

	let args = browser.command_args("https://example.com", (10, 20), Path::new("out.png"), Some(0));
	assert!(!args.iter().any(|arg| arg.to_string_lossy().starts_with("--timeout")));

	let browser = Browser {
		extra_args: vec!["--force-device-scale-factor=1".to_owned()],
		..Default::default()
	};
	let args = browser.command_args("page.html", (1, 1), Path::new("out.png"), None);
	assert_eq!(args.last().unwrap(), "--force-device-scale-factor=1");
}

#[test]
#[cfg(unix)]
fn test_take_screenshot_loads_output() {
	use image::GenericImageView;

	let dir = tempfile::tempdir().unwrap();
	let fixture = fixture_png(dir.path());
	let browser = fake_browser(
		dir.path(),
		&format!(r#"for arg in "$@"; do case "$arg" in --screenshot=*) cp '{}' "${{arg#--screenshot=}}";; esac; done"#, fixture.display()),
	);

	let image = browser.take_screenshot("https://example.com", (12, 8), None).unwrap();
	assert_eq!(image.dimensions(), (12, 8));
	assert_eq!(image.to_rgb8().get_pixel(3, 3), &image::Rgb([250, 128, 0]));
}

#[test]
#[cfg(unix)]
fn test_take_screenshot_html_passes_page_file() {
	let dir = tempfile::tempdir().unwrap();
	let fixture = fixture_png(dir.path());
	let browser = fake_browser(
		dir.path(),
		&format!(
			r#"grep -q 'inky-marker' "$1" || exit 7
for arg in "$@"; do case "$arg" in --screenshot=*) cp '{}' "${{arg#--screenshot=}}";; esac; done"#,
			fixture.display()
		),
	);

	assert!(browser.take_screenshot_html("<p>inky-marker</p>", (12, 8), Some(1000)).is_ok());
	assert!(matches!(browser.take_screenshot_html("<p>nothing</p>", (12, 8), None), Err(Error::Browser(_))));
}

#[test]
#[cfg(unix)]
fn test_take_screenshot_reports_failures() {
	let dir = tempfile::tempdir().unwrap();

	let failing = fake_browser(dir.path(), "echo 'cannot open display' >&2; exit 3");
	match failing.take_screenshot("page.html", (10, 10), None) {
		Err(Error::Browser(msg)) => assert!(msg.contains("cannot open display"), "{msg}"),
		_ => panic!("expected browser error"),
	}

	// exits cleanly but never writes the screenshot
	let silent_dir = tempfile::tempdir().unwrap();
	let silent = fake_browser(silent_dir.path(), "exit 0");
	assert!(matches!(silent.take_screenshot("page.html", (10, 10), None), Err(Error::Browser(_))));

	let missing = Browser::new(dir.path().join("no-such-browser"));
	let result: Result<DynamicImage> = missing.take_screenshot("page.html", (10, 10), None);
	assert!(matches!(result, Err(Error::Io(_))));
}
