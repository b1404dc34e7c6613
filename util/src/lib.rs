pub use image::{DynamicImage, GenericImage, GenericImageView, GrayImage, RgbImage, RgbaImage};
pub use rayon::prelude::*;

pub use rayon;
pub use image;
pub use log;

mod error;
pub use error::*;

mod geometry;
pub use geometry::*;

#[path = "image.rs"]
mod util_image;
pub use util_image::*;

mod enhance;
pub use enhance::*;

mod overlay;
pub use overlay::*;

mod fetch;
pub use fetch::*;
