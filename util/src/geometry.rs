use core::ops::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point<T> {
	pub x: T,
	pub y: T,
}
impl<T> Point<T> {
	#[inline]
	pub const fn new(x: T, y: T) -> Self {
		Self { x, y }
	}
}
impl<T> From<Point<T>> for (T, T) {
	#[inline]
	fn from(pt: Point<T>) -> Self {
		(pt.x, pt.y)
	}
}
impl<T> From<(T, T)> for Point<T> {
	#[inline]
	fn from((x, y): (T, T)) -> Self {
		Point { x, y }
	}
}
impl<T: Add<T, Output = T>> Add for Point<T> {
	type Output = Point<T>;

	#[inline]
	fn add(self, rhs: Self) -> Self::Output {
		Point::new(self.x + rhs.x, self.y + rhs.y)
	}
}
impl<T: Sub<T, Output = T>> Sub for Point<T> {
	type Output = Point<T>;

	#[inline]
	fn sub(self, rhs: Self) -> Self::Output {
		Point::new(self.x - rhs.x, self.y - rhs.y)
	}
}

/// Pixel-space rectangle as an origin plus a size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}
impl Rect {
	#[inline]
	pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
		Self { x, y, width, height }
	}

	#[inline]
	pub fn size(&self) -> (u32, u32) {
		(self.width, self.height)
	}
}

#[test]
fn test_point_arithmetic() {
	let a = Point::new(10i64, -4);
	let b = Point::from((3, 6));
	assert_eq!(a + b, Point::new(13, 2));
	assert_eq!(a - b, Point::new(7, -10));
	assert_eq!(<(i64, i64)>::from(a), (10, -4));
}
