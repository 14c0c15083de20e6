//! Host platform capabilities
//!
//! Everything the scroll system cannot decide for itself lives behind the
//! [`Platform`] trait: native scrollbar geometry, whether native scrollbars
//! can be hidden with a class, how right-to-left scroll coordinates behave,
//! and the window metrics that drive zoom detection.
//!
//! The environment probe never trusts these values directly. It builds probe
//! elements and *measures* them through the tree, so everything downstream of
//! the probe works from observed numbers. The trait is the ground truth the
//! tree emulates; the probe is how that truth is discovered.

use std::cell::Cell;

use veneer_core::Wh;

// ============================================================================
// RTL scroll conventions
// ============================================================================

/// How horizontal scroll coordinates behave inside a right-to-left element.
///
/// Platforms disagree on where the origin sits and which direction is
/// positive. The probe distinguishes them by assigning a large negative
/// scroll offset and reading back what sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtlScrollConvention {
    /// Origin at the right edge, offsets grow negative toward the left.
    Negated,
    /// Origin at the right edge, offsets grow positive toward the left.
    Inverted,
}

// ============================================================================
// Platform trait
// ============================================================================

/// Capabilities and quirks of the hosting environment.
pub trait Platform {
    /// Native scrollbar thickness: `w` is the height a horizontal bar
    /// consumes, `h` the width a vertical bar consumes. Zero on either axis
    /// means overlay scrollbars on that axis.
    fn scrollbar_thickness(&self) -> Wh;

    /// Whether a styling class can fully hide native scrollbars.
    fn supports_scrollbar_hiding(&self) -> bool;

    /// Horizontal scroll coordinate convention for RTL elements.
    fn rtl_convention(&self) -> RtlScrollConvention;

    /// Current device pixel ratio.
    fn device_pixel_ratio(&self) -> f32;

    /// Current window size in layout pixels.
    fn window_size(&self) -> Wh;

    /// Whether style probing is restricted (sandboxed hosts). Probes degrade
    /// to their safe defaults instead of failing construction.
    fn restricted(&self) -> bool {
        false
    }
}

// ============================================================================
// Implementations
// ============================================================================

/// A conventional desktop host: classic scrollbars that consume layout space,
/// hideable via styling, LTR-negated RTL coordinates.
#[derive(Debug, Clone)]
pub struct DesktopPlatform {
    thickness: Wh,
}

impl Default for DesktopPlatform {
    fn default() -> Self {
        Self {
            thickness: Wh::new(15.0, 15.0),
        }
    }
}

impl DesktopPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the native scrollbar thickness (both axes).
    pub fn with_thickness(mut self, thickness: f32) -> Self {
        self.thickness = Wh::new(thickness, thickness);
        self
    }
}

impl Platform for DesktopPlatform {
    fn scrollbar_thickness(&self) -> Wh {
        self.thickness
    }

    fn supports_scrollbar_hiding(&self) -> bool {
        true
    }

    fn rtl_convention(&self) -> RtlScrollConvention {
        RtlScrollConvention::Negated
    }

    fn device_pixel_ratio(&self) -> f32 {
        1.0
    }

    fn window_size(&self) -> Wh {
        Wh::new(1280.0, 800.0)
    }
}

/// Fully configurable platform for tests. Window size and pixel ratio are
/// interior-mutable so zoom and resize scenarios can be driven mid-test.
pub struct TestPlatform {
    pub thickness: Cell<Wh>,
    pub hiding: bool,
    pub convention: RtlScrollConvention,
    pub dpr: Cell<f32>,
    pub window: Cell<Wh>,
    pub restricted: bool,
}

impl Default for TestPlatform {
    fn default() -> Self {
        Self {
            thickness: Cell::new(Wh::new(15.0, 15.0)),
            hiding: true,
            convention: RtlScrollConvention::Negated,
            dpr: Cell::new(1.0),
            window: Cell::new(Wh::new(1280.0, 800.0)),
            restricted: false,
        }
    }
}

impl TestPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay scrollbars: zero thickness on both axes.
    pub fn overlay() -> Self {
        let platform = Self::default();
        platform.thickness.set(Wh::ZERO);
        platform
    }

    pub fn with_thickness(self, thickness: f32) -> Self {
        self.thickness.set(Wh::new(thickness, thickness));
        self
    }

    pub fn without_hiding(mut self) -> Self {
        self.hiding = false;
        self
    }

    pub fn with_restricted(mut self) -> Self {
        self.restricted = true;
        self
    }

    pub fn with_convention(mut self, convention: RtlScrollConvention) -> Self {
        self.convention = convention;
        self
    }
}

impl Platform for TestPlatform {
    fn scrollbar_thickness(&self) -> Wh {
        self.thickness.get()
    }

    fn supports_scrollbar_hiding(&self) -> bool {
        self.hiding
    }

    fn rtl_convention(&self) -> RtlScrollConvention {
        self.convention
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.dpr.get()
    }

    fn window_size(&self) -> Wh {
        self.window.get()
    }

    fn restricted(&self) -> bool {
        self.restricted
    }
}
