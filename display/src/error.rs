#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("image error: {0}")]
	Image(#[from] ink_util::image::ImageError),

	#[error("{0}")]
	Transform(#[from] ink_util::Error),

	#[error("no driver for display type {0:?}")]
	UnsupportedDisplay(Box<str>),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
