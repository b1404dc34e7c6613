use std::time::Duration;

use image::DynamicImage;
use reqwest::{blocking::Client, StatusCode};

use crate::Result;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(40);

#[inline]
pub fn is_url(source: &str) -> bool {
	source.starts_with("http://") || source.starts_with("https://")
}

pub struct ImageFetcher {
	client: Client
}
impl ImageFetcher {
	pub fn new(timeout: Duration) -> Result<Self> {
		Ok(Self {
			client: Client::builder().timeout(timeout).build()?
		})
	}

	/// Downloads and decodes an image.
	///
	/// A non-success status (other than 304 Not Modified) is logged and yields `Ok(None)`.
	pub fn get_image(&self, url: &str) -> Result<Option<DynamicImage>> {
		let response = self.client.get(url).send()?;

		let status = response.status();
		if status.is_success() || status == StatusCode::NOT_MODIFIED {
			let body = response.bytes()?;
			Ok(Some(image::load_from_memory(&body)?))
		} else {
			log::error!("Received non-200 response from {url}: status_code: {}", status.as_u16());
			Ok(None)
		}
	}
}

#[cfg(test)]
fn serve_once(status: &'static str, body: Vec<u8>) -> String {
	use std::io::{Read, Write};

	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();

	std::thread::spawn(move || {
		let (mut stream, _) = listener.accept().unwrap();

		let mut request = [0u8; 4096];
		let _ = stream.read(&mut request);

		let head = format!("HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
		stream.write_all(head.as_bytes()).unwrap();
		stream.write_all(&body).unwrap();
	});

	format!("http://{addr}/image.png")
}

#[cfg(test)]
fn png_bytes(width: u32, height: u32) -> Vec<u8> {
	let mut png = Vec::new();
	DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([9, 8, 7])))
		.write_to(&mut png, image::ImageOutputFormat::Png)
		.unwrap();
	png
}

#[test]
fn test_get_image_decodes_success() {
	let url = serve_once("200 OK", png_bytes(7, 3));
	let fetcher = ImageFetcher::new(Duration::from_secs(5)).unwrap();
	let image = fetcher.get_image(&url).unwrap().expect("image should decode");

	use image::GenericImageView;
	assert_eq!(image.dimensions(), (7, 3));
}

#[test]
fn test_get_image_non_success_is_none() {
	let url = serve_once("404 Not Found", b"missing".to_vec());
	let fetcher = ImageFetcher::new(Duration::from_secs(5)).unwrap();
	assert!(fetcher.get_image(&url).unwrap().is_none());
}

#[test]
fn test_get_image_any_2xx_decodes() {
	use image::GenericImageView;

	let url = serve_once("206 Partial Content", png_bytes(4, 5));
	let fetcher = ImageFetcher::new(Duration::from_secs(5)).unwrap();
	assert_eq!(fetcher.get_image(&url).unwrap().unwrap().dimensions(), (4, 5));
}

#[test]
fn test_get_image_not_modified_is_decoded() {
	// 304 carries no body, so decoding fails instead of being treated as a bad status
	let url = serve_once("304 Not Modified", Vec::new());
	let fetcher = ImageFetcher::new(Duration::from_secs(5)).unwrap();
	assert!(matches!(fetcher.get_image(&url), Err(crate::Error::Image(_))));
}

#[test]
fn test_get_image_undecodable_body_is_error() {
	let url = serve_once("200 OK", b"not an image".to_vec());
	let fetcher = ImageFetcher::new(Duration::from_secs(5)).unwrap();
	assert!(matches!(fetcher.get_image(&url), Err(crate::Error::Image(_))));
}

#[test]
fn test_get_image_server_error_is_none() {
	let url = serve_once("500 Internal Server Error", Vec::new());
	let fetcher = ImageFetcher::new(Duration::from_secs(5)).unwrap();
	assert!(fetcher.get_image(&url).unwrap().is_none());
}

#[test]
fn test_is_url() {
	assert!(is_url("https://example.com/a.png"));
	assert!(is_url("http://localhost:8080"));
	assert!(!is_url("/var/lib/inky/a.png"));
	assert!(!is_url("ftp://example.com/a.png"));
}
