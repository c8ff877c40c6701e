//! Geometric primitives for layout analysis.
//!
//! All coordinates are in page units (points) with the origin at the
//! bottom-left corner of the page and Y increasing upward, matching the
//! coordinate space of the source page geometry.

use serde::{Deserialize, Serialize};

/// A 2D point in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point.
    ///
    /// # Examples
    ///
    /// ```
    /// use readalong::geometry::Point;
    ///
    /// let point = Point::new(10.0, 20.0);
    /// assert_eq!(point.x, 10.0);
    /// assert_eq!(point.y, 20.0);
    /// ```
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle on one page.
///
/// `y` is always the *bottom* edge of the rectangle. Callers that need a
/// top-origin value must convert explicitly via [`BoundingBox::top`]; no code
/// in this crate stores a top-origin Y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// One-based page number this box belongs to
    pub page_number: u32,
    /// X coordinate of the left edge
    pub x: f32,
    /// Y coordinate of the bottom edge
    pub y: f32,
    /// Width in page units
    pub width: f32,
    /// Height in page units
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box from the bottom-left corner and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use readalong::geometry::BoundingBox;
    ///
    /// let bbox = BoundingBox::new(1, 72.0, 700.0, 200.0, 14.0);
    /// assert_eq!(bbox.top(), 714.0);
    /// assert_eq!(bbox.right(), 272.0);
    /// ```
    pub fn new(page_number: u32, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            page_number,
            x,
            y,
            width,
            height,
        }
    }

    /// Get the left edge x-coordinate.
    pub fn left(&self) -> f32 {
        self.x
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate (stored directly).
    pub fn bottom(&self) -> f32 {
        self.y
    }

    /// Get the top edge y-coordinate (explicit conversion from bottom-origin).
    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    /// Get the center point of the box.
    ///
    /// # Examples
    ///
    /// ```
    /// use readalong::geometry::BoundingBox;
    ///
    /// let bbox = BoundingBox::new(1, 0.0, 0.0, 100.0, 50.0);
    /// let center = bbox.center();
    /// assert_eq!(center.x, 50.0);
    /// assert_eq!(center.y, 25.0);
    /// ```
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Compute the union of this box with another on the same page.
    ///
    /// Returns the smallest box containing both. The page number is taken
    /// from `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use readalong::geometry::BoundingBox;
    ///
    /// let a = BoundingBox::new(1, 0.0, 0.0, 50.0, 50.0);
    /// let b = BoundingBox::new(1, 25.0, 25.0, 50.0, 50.0);
    /// let union = a.union(&b);
    ///
    /// assert_eq!(union.x, 0.0);
    /// assert_eq!(union.y, 0.0);
    /// assert_eq!(union.right(), 75.0);
    /// assert_eq!(union.top(), 75.0);
    /// ```
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x0 = self.left().min(other.left());
        let y0 = self.bottom().min(other.bottom());
        let x1 = self.right().max(other.right());
        let y1 = self.top().max(other.top());
        BoundingBox {
            page_number: self.page_number,
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// Check if this box intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.bottom() < other.top()
            && self.top() > other.bottom()
    }

    /// Compute the area of the box.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}
