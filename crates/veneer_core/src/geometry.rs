//! Per-axis and box value types
//!
//! Small copyable value types used by the measurement pipeline. Equality is
//! always field-wise; caches comparing these never fall back to identity.

/// A pair of per-axis values (horizontal `x`, vertical `y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Xy<T> {
    pub x: T,
    pub y: T,
}

impl<T> Xy<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    /// Apply `f` to both axes.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Xy<U> {
        Xy {
            x: f(self.x),
            y: f(self.y),
        }
    }
}

impl<T: Copy> Xy<T> {
    /// The same value on both axes.
    pub fn splat(v: T) -> Self {
        Self { x: v, y: v }
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Wh<T = f32> {
    pub w: T,
    pub h: T,
}

impl<T> Wh<T> {
    pub fn new(w: T, h: T) -> Self {
        Self { w, h }
    }
}

impl Wh<f32> {
    pub const ZERO: Self = Self { w: 0.0, h: 0.0 };

    /// Sub-pixel remainder per axis.
    pub fn fract(self) -> Self {
        Self {
            w: self.w.fract(),
            h: self.h.fract(),
        }
    }
}

/// A top/right/bottom/left box, e.g. a padding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Trbl {
    pub t: f32,
    pub r: f32,
    pub b: f32,
    pub l: f32,
}

impl Trbl {
    pub const ZERO: Self = Self {
        t: 0.0,
        r: 0.0,
        b: 0.0,
        l: 0.0,
    };

    pub fn new(t: f32, r: f32, b: f32, l: f32) -> Self {
        Self { t, r, b, l }
    }

    /// Combined left + right extent.
    pub fn horizontal(&self) -> f32 {
        self.l + self.r
    }

    /// Combined top + bottom extent.
    pub fn vertical(&self) -> f32 {
        self.t + self.b
    }
}
