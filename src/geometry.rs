use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A point (or vector) in the global input coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length of this point interpreted as a vector.
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (other - self).length()
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the cross product of the two vectors.
    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Perpendicular distance of `p` from the ray starting at `origin` in the
/// direction of `ray`, and which side of the ray `p` falls on.
#[derive(Debug, Clone, Copy)]
pub struct PerpendicularDistance {
    pub distance: f64,
    pub is_left_of_ray: bool,
}

pub fn perpendicular_distance_from_ray(p: Point, origin: Point, ray: Point) -> PerpendicularDistance {
    let to_p = p - origin;
    let cross = ray.cross(to_p);
    PerpendicularDistance {
        // |cross| is the area of the parallelogram spanned by the vectors.
        distance: cross.abs() / ray.length(),
        is_left_of_ray: cross > 0.0,
    }
}
