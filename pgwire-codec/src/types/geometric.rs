use std::fmt;

/// `point`, geometric point `(x,y)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// `line`, infinite line `{A,B,C}` satisfying `Ax + By + C = 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Line {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Line {
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{},{}}}", self.a, self.b, self.c)
    }
}

/// `lseg`, finite line segment `[start,end]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
}

impl LineSegment {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for LineSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

/// `box`, rectangular box.
///
/// The upper right corner is always greater than or equal to the lower left corner on both axes,
/// regardless of the order corners are given in.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PgBox {
    upper_right: Point,
    lower_left: Point,
}

impl PgBox {
    /// Create box from any two opposite corners.
    ///
    /// Coordinates are swapped per axis only when `a` is strictly below `b`, so NaN and signed
    /// zeros are kept where they were given.
    pub fn new(a: Point, b: Point) -> Self {
        let mut upper_right = a;
        let mut lower_left = b;
        if a.x < b.x {
            upper_right.x = b.x;
            lower_left.x = a.x;
        }
        if a.y < b.y {
            upper_right.y = b.y;
            lower_left.y = a.y;
        }
        Self { upper_right, lower_left }
    }

    /// Corners in wire order, without reordering.
    pub(crate) const fn from_wire(upper_right: Point, lower_left: Point) -> Self {
        Self { upper_right, lower_left }
    }

    pub fn from_edges(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self::new(Point::new(right, top), Point::new(left, bottom))
    }

    pub fn upper_right(&self) -> Point {
        self.upper_right
    }

    pub fn lower_left(&self) -> Point {
        self.lower_left
    }

    /// Move the upper right corner.
    ///
    /// On each axis where `value` falls below the lower left corner, the previous lower left
    /// coordinate becomes the upper one and `value` becomes the lower one.
    pub fn set_upper_right(&mut self, value: Point) {
        if value.x < self.lower_left.x {
            self.upper_right.x = self.lower_left.x;
            self.lower_left.x = value.x;
        } else {
            self.upper_right.x = value.x;
        }

        if value.y < self.lower_left.y {
            self.upper_right.y = self.lower_left.y;
            self.lower_left.y = value.y;
        } else {
            self.upper_right.y = value.y;
        }
    }

    /// Move the lower left corner, mirror of [`set_upper_right`][PgBox::set_upper_right].
    pub fn set_lower_left(&mut self, value: Point) {
        if value.x > self.upper_right.x {
            self.lower_left.x = self.upper_right.x;
            self.upper_right.x = value.x;
        } else {
            self.lower_left.x = value.x;
        }

        if value.y > self.upper_right.y {
            self.lower_left.y = self.upper_right.y;
            self.upper_right.y = value.y;
        } else {
            self.lower_left.y = value.y;
        }
    }

    pub fn left(&self) -> f64 {
        self.lower_left.x
    }

    pub fn right(&self) -> f64 {
        self.upper_right.x
    }

    pub fn bottom(&self) -> f64 {
        self.lower_left.y
    }

    pub fn top(&self) -> f64 {
        self.upper_right.y
    }

    pub fn width(&self) -> f64 {
        self.right() - self.left()
    }

    pub fn height(&self) -> f64 {
        self.top() - self.bottom()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }
}

impl fmt::Display for PgBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.upper_right, self.lower_left)
    }
}

/// `path`, open or closed sequence of points.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Path {
    pub points: Vec<Point>,
    pub open: bool,
}

impl Path {
    pub fn open(points: Vec<Point>) -> Self {
        Self { points, open: true }
    }

    pub fn closed(points: Vec<Point>) -> Self {
        Self { points, open: false }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = if self.open { ('[', ']') } else { ('(', ')') };
        write!(f, "{start}")?;
        write_points(&self.points, f)?;
        write!(f, "{end}")
    }
}

/// `polygon`, implicitly closed sequence of points.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        write_points(&self.points, f)?;
        write!(f, ")")
    }
}

fn write_points(points: &[Point], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, point) in points.iter().enumerate() {
        if i != 0 {
            write!(f, ",")?;
        }
        write!(f, "{point}")?;
    }
    Ok(())
}

/// `circle`, center point and radius.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Circle {
    pub const fn new(center: Point, radius: f64) -> Self {
        Self { x: center.x, y: center.y, radius }
    }

    pub const fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl fmt::Display for Circle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<({},{}),{}>", self.x, self.y, self.radius)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn box_normalize() {
        let corners = [
            (Point::new(1.0, 1.0), Point::new(5.0, 5.0)),
            (Point::new(5.0, 5.0), Point::new(1.0, 1.0)),
            (Point::new(1.0, 5.0), Point::new(5.0, 1.0)),
            (Point::new(5.0, 1.0), Point::new(1.0, 5.0)),
        ];
        for (a, b) in corners {
            let pg_box = PgBox::new(a, b);
            assert_eq!(pg_box.upper_right(), Point::new(5.0, 5.0));
            assert_eq!(pg_box.lower_left(), Point::new(1.0, 1.0));
        }

        let mut pg_box = PgBox::from_edges(5.0, 5.0, 1.0, 1.0);
        pg_box.set_upper_right(Point::new(0.0, 3.0));
        assert_eq!(pg_box.upper_right(), Point::new(1.0, 3.0));
        assert_eq!(pg_box.lower_left(), Point::new(0.0, 1.0));

        pg_box.set_lower_left(Point::new(2.0, -1.0));
        assert!(pg_box.upper_right().x >= pg_box.lower_left().x);
        assert_eq!(pg_box.lower_left(), Point::new(1.0, -1.0));
        assert_eq!(pg_box.right(), 2.0);
    }

    #[test]
    fn display() {
        assert_eq!(PgBox::from_edges(5.0, 5.0, 1.0, 1.0).to_string(), "(5,5),(1,1)");
        assert_eq!(Path::open(vec![Point::new(0.0, 1.5), Point::new(2.0, 3.0)]).to_string(), "[(0,1.5),(2,3)]");
        assert_eq!(Polygon::new(vec![Point::default()]).to_string(), "((0,0))");
        assert_eq!(Circle::new(Point::new(1.0, 2.0), 3.0).to_string(), "<(1,2),3>");
        assert_eq!(Line::new(1.0, -1.0, 0.0).to_string(), "{1,-1,0}");
    }
}
