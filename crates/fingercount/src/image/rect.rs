//! Axis-aligned and rotated rectangles used for detections and regions of interest.

use std::fmt;

use nalgebra::{Rotation2, Vector2};

/// 2D vector type used for image-space positions and sizes.
pub type Vec2f = Vector2<f32>;

/// An axis-aligned rectangle.
///
/// Coordinates are in pixels, with the origin in the top left corner and Y pointing down.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Rect {
    /// Constructs a [`Rect`] that is centered at `(x_center, y_center)`.
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x: x_center - width * 0.5,
            y: y_center - height * 0.5,
            w: width,
            h: height,
        }
    }

    /// Constructs a [`Rect`] from its top left corner and size.
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self {
            x: top_left_x,
            y: top_left_y,
            w: width,
            h: height,
        }
    }

    /// Computes the smallest rectangle enclosing all `points`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<I: IntoIterator<Item = Vec2f>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        Some(Self::from_top_left(min.x, min.y, max.x - min.x, max.y - min.y))
    }

    /// Scales the width and height of `self` by `scale`, keeping the center in place.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        let c = self.center();
        Self::from_center(c.x, c.y, self.w * scale, self.h * scale)
    }

    /// Extends the shorter side of `self` to match the longer one, keeping the center in place.
    #[must_use]
    pub fn to_square(&self) -> Self {
        let c = self.center();
        let side = self.w.max(self.h);
        Self::from_center(c.x, c.y, side, side)
    }

    /// Grows either the width or height of `self` until its aspect ratio (`width / height`)
    /// matches `aspect`, keeping the center in place.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: f32) -> Self {
        let c = self.center();
        if self.w < self.h * aspect {
            Self::from_center(c.x, c.y, self.h * aspect, self.h)
        } else {
            Self::from_center(c.x, c.y, self.w, self.w / aspect)
        }
    }

    #[must_use]
    pub fn move_by(&self, offset: Vec2f) -> Self {
        Self {
            x: self.x + offset.x,
            y: self.y + offset.y,
            ..*self
        }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    pub fn top_left(&self) -> Vec2f {
        Vec2f::new(self.x, self.y)
    }

    pub fn size(&self) -> Vec2f {
        Vec2f::new(self.w, self.h)
    }

    pub fn center(&self) -> Vec2f {
        Vec2f::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min = self.top_left().sup(&other.top_left());
        let max = (self.top_left() + self.size()).inf(&(other.top_left() + other.size()));
        if min.x > max.x || min.y > max.y {
            return None;
        }

        Rect::bounding([min, max])
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    ///
    /// Returns 0.0 if both rectangles are empty.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |rect| rect.area());
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    pub fn corners(&self) -> [Vec2f; 4] {
        let (x, y, w, h) = (self.x, self.y, self.w, self.h);
        [
            Vec2f::new(x, y),
            Vec2f::new(x + w, y),
            Vec2f::new(x + w, y + h),
            Vec2f::new(x, y + h),
        ]
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x, self.y, self.w, self.h
        )
    }
}

/// A [`Rect`], rotated around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    /// Creates a new rotated rectangle.
    ///
    /// `radians` is the clockwise rotation (as seen on screen) to apply to the [`Rect`].
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Computes the rotated bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = Vec2f>>(radians: f32, points: I) -> Option<Self> {
        // Rotate all points into the rectangle's frame, take the axis-aligned bounds there, and
        // rotate the center back. The pivot does not matter, so the origin is used.
        let into = Rotation2::new(-radians);
        let rect = Rect::bounding(points.into_iter().map(|p| into * p))?;
        let center = into.inverse() * rect.center();

        Some(Self::new(
            Rect::from_center(center.x, center.y, rect.width(), rect.height()),
            radians,
        ))
    }

    /// Returns the rectangle's clockwise rotation in radians.
    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Returns a reference to the underlying non-rotated rectangle.
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Applies a closure to the underlying non-rotated [`Rect`].
    #[must_use]
    pub fn map(mut self, f: impl FnOnce(Rect) -> Rect) -> Self {
        self.rect = f(self.rect);
        self
    }

    pub fn center(&self) -> Vec2f {
        self.rect.center()
    }

    /// Moves the rectangle along its own (rotated) axes.
    ///
    /// `offset` is given relative to the rectangle's width and height, so `(0.0, -0.5)` moves it
    /// up by half its height as seen from inside the rectangle.
    #[must_use]
    pub fn shift_rel(&self, offset: Vec2f) -> Self {
        let local = offset.component_mul(&self.rect.size());
        let global = Rotation2::new(self.radians) * local;
        self.map(|rect| rect.move_by(global))
    }

    /// Returns the rotated rectangle's corners in the parent's coordinate system.
    ///
    /// The order is: top-left, top-right, bottom-right, bottom-left, as seen from the non-rotated
    /// rect.
    pub fn rotated_corners(&self) -> [Vec2f; 4] {
        self.rect
            .corners()
            .map(|p| self.transform_out(p - self.rect.top_left()))
    }

    /// Returns the axis-aligned rectangle enclosing the rotated rectangle.
    pub fn bounding_rect(&self) -> Rect {
        // `rotated_corners` always yields 4 points.
        Rect::bounding(self.rotated_corners()).unwrap_or(self.rect)
    }

    /// Transforms a point from the parent coordinate system into the [`RotatedRect`]'s system.
    ///
    /// The origin of the inner coordinate system is formed by the top left corner of the rectangle.
    pub fn transform_in(&self, pt: Vec2f) -> Vec2f {
        let half = self.rect.size() * 0.5;
        Rotation2::new(-self.radians) * (pt - self.rect.center()) + half
    }

    /// Transforms a point from the [`RotatedRect`]'s coordinate system to the parent system.
    ///
    /// The origin of the inner coordinate system is formed by the top left corner of the rectangle.
    pub fn transform_out(&self, pt: Vec2f) -> Vec2f {
        let half = self.rect.size() * 0.5;
        Rotation2::new(self.radians) * (pt - half) + self.rect.center()
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn iou() {
        let a = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);
        let b = Rect::from_top_left(1.0, 0.0, 2.0, 2.0);
        assert_relative_eq!(a.iou(&b), 2.0 / 6.0);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&Rect::from_top_left(10.0, 10.0, 1.0, 1.0)), 0.0);
        let empty = Rect::from_top_left(0.0, 0.0, 0.0, 0.0);
        assert_eq!(empty.iou(&empty), 0.0);
    }

    #[test]
    fn square_keeps_center() {
        let rect = Rect::from_center(5.0, 5.0, 4.0, 2.0).to_square();
        assert_eq!(rect.width(), 4.0);
        assert_eq!(rect.height(), 4.0);
        assert_eq!(rect.center(), Vec2f::new(5.0, 5.0));
    }

    #[test]
    fn letterbox() {
        let wide = Rect::from_top_left(0.0, 0.0, 640.0, 480.0).grow_to_fit_aspect(1.0);
        assert_eq!(wide, Rect::from_top_left(0.0, -80.0, 640.0, 640.0));

        let tall = Rect::from_top_left(0.0, 0.0, 100.0, 200.0).grow_to_fit_aspect(2.0);
        assert_eq!(tall, Rect::from_top_left(-150.0, 0.0, 400.0, 200.0));
    }

    #[test]
    fn transform_roundtrip() {
        let rect = RotatedRect::new(Rect::from_center(30.0, -4.0, 20.0, 10.0), 0.7);
        for pt in [
            Vec2f::new(0.0, 0.0),
            Vec2f::new(20.0, 10.0),
            Vec2f::new(-3.0, 8.5),
        ] {
            let out = rect.transform_out(pt);
            assert_relative_eq!(rect.transform_in(out), pt, epsilon = 1e-4);
        }
    }

    #[test]
    fn quarter_turn_is_clockwise_on_screen() {
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 2.0, 2.0), FRAC_PI_2);
        let [tl, tr, br, bl] = rect.rotated_corners();
        // Top left corner ends up in the top right.
        assert_relative_eq!(tl, Vec2f::new(1.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(tr, Vec2f::new(1.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(br, Vec2f::new(-1.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(bl, Vec2f::new(-1.0, -1.0), epsilon = 1e-5);
    }

    #[test]
    fn shift_follows_rotation() {
        let up = RotatedRect::new(Rect::from_center(0.0, 0.0, 2.0, 4.0), 0.0)
            .shift_rel(Vec2f::new(0.0, -0.5));
        assert_relative_eq!(up.center(), Vec2f::new(0.0, -2.0));

        // Upside down: "up" inside the rect is down on screen.
        let down = RotatedRect::new(Rect::from_center(0.0, 0.0, 2.0, 4.0), PI)
            .shift_rel(Vec2f::new(0.0, -0.5));
        assert_relative_eq!(down.center(), Vec2f::new(0.0, 2.0), epsilon = 1e-5);
    }

    #[test]
    fn rotated_bounding() {
        let points = [
            Vec2f::new(0.0, 0.0),
            Vec2f::new(1.0, 1.0),
            Vec2f::new(2.0, 2.0),
        ];
        let rect = RotatedRect::bounding(PI / 4.0, points).unwrap();
        assert_relative_eq!(rect.center(), Vec2f::new(1.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(rect.rect().height(), 0.0, epsilon = 1e-5);
        assert_relative_eq!(rect.rect().width(), 8.0f32.sqrt(), epsilon = 1e-5);

        assert!(RotatedRect::bounding(0.0, []).is_none());
    }
}
