#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("image error: {0}")]
	Image(#[from] image::ImageError),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("can't fit a {from:?} image into {to:?}")]
	EmptyDimensions {
		from: (u32, u32),
		to: (u32, u32)
	}
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
