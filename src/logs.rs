use std::{
	fs::{File, OpenOptions},
	io::Write as IoWrite,
	path::Path,
};

use parking_lot::Mutex;

pub fn format_record(record: &log::Record) -> String {
	format!("[{}] [{}] {}", record.level(), record.module_path().unwrap_or("?"), record.args())
}

struct InkLogger {
	level: log::LevelFilter,
	file: Option<Mutex<File>>,
}
impl InkLogger {
	fn open_dump(path: &Path) -> std::io::Result<Mutex<File>> {
		let mut f = OpenOptions::new().append(true).create(true).open(path)?;
		writeln!(
			f,
			"============ INKY LOG {} ============",
			std::time::SystemTime::now().duration_since(std::time::SystemTime::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
		)?;
		Ok(Mutex::new(f))
	}
}
impl log::Log for InkLogger {
	#[inline]
	fn enabled(&self, metadata: &log::Metadata) -> bool {
		metadata.level() <= self.level
	}

	fn log(&self, record: &log::Record) {
		if !self.enabled(record.metadata()) {
			return;
		}

		let line = format_record(record);

		eprintln!("{line}");

		if let Some(file) = &self.file {
			writeln!(&mut *file.lock(), "{line}").ok();
		}
	}

	fn flush(&self) {
		if let Some(file) = &self.file {
			file.lock().flush().ok();
		}
	}
}

pub fn init(verbose: bool, dump: Option<&Path>) {
	let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };

	let file = dump.and_then(|path| match InkLogger::open_dump(path) {
		Ok(file) => Some(file),
		Err(err) => {
			eprintln!("Failed to open log file {}: {err}", path.display());
			None
		}
	});

	log::set_max_level(level);
	if log::set_logger(Box::leak(Box::new(InkLogger { level, file }))).is_err() {
		eprintln!("Logger was already initialized");
	}
}

#[test]
fn test_format_record() {
	let line = format_record(
		&log::Record::builder()
			.args(format_args!("Display type: mock"))
			.level(log::Level::Info)
			.module_path(Some("inky::commands"))
			.build(),
	);
	assert_eq!(line, "[INFO] [inky::commands] Display type: mock");
}

#[test]
fn test_dump_file_gets_header_and_lines() {
	use log::Log;

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("inky.log");

	let logger = InkLogger {
		level: log::LevelFilter::Info,
		file: Some(InkLogger::open_dump(&path).unwrap()),
	};
	logger.log(&log::Record::builder().args(format_args!("kept")).level(log::Level::Warn).module_path(Some("inky")).build());
	logger.log(&log::Record::builder().args(format_args!("dropped")).level(log::Level::Debug).module_path(Some("inky")).build());
	logger.flush();

	let contents = std::fs::read_to_string(&path).unwrap();
	let lines: Vec<&str> = contents.lines().collect();
	assert_eq!(lines.len(), 2);
	assert!(lines[0].starts_with("============ INKY LOG "));
	assert_eq!(lines[1], "[WARN] [inky] kept");
}
