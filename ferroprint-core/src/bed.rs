//! Bed probe points and the levelling plane
//!
//! Probed heights are fitted to a plane `z = a·x + b·y + c` by least
//! squares. Three points give the exact plane through them; more points
//! average out probe noise.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of bed probe points
pub const MAX_PROBE_POINTS: usize = 5;

/// Plane describing bed height across the build area
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BedTransform {
    /// dz/dx
    pub a: f32,
    /// dz/dy
    pub b: f32,
    /// Height at the origin
    pub c: f32,
}

impl BedTransform {
    /// Bed height at a point
    pub fn height_at(&self, x: f32, y: f32) -> f32 {
        self.a * x + self.b * y + self.c
    }

    /// Fit a plane through probed points
    ///
    /// Returns `None` with fewer than three points or when the points are
    /// (nearly) collinear.
    pub fn fit(points: &[(f32, f32, f32)]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }

        let n = points.len() as f32;
        let (sx, sy, sz) = points
            .iter()
            .fold((0.0, 0.0, 0.0), |(sx, sy, sz), &(x, y, z)| (sx + x, sy + y, sz + z));
        let (mx, my, mz) = (sx / n, sy / n, sz / n);

        // Centred sums keep the normal equations well conditioned
        let mut sxx = 0.0;
        let mut syy = 0.0;
        let mut sxy = 0.0;
        let mut sxz = 0.0;
        let mut syz = 0.0;
        for &(x, y, z) in points {
            let (dx, dy, dz) = (x - mx, y - my, z - mz);
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
            sxz += dx * dz;
            syz += dy * dz;
        }

        let det = sxx * syy - sxy * sxy;
        if sxx <= 0.0 || syy <= 0.0 || det <= 1e-6 * sxx * syy {
            return None;
        }

        let a = (sxz * syy - syz * sxy) / det;
        let b = (syz * sxx - sxz * sxy) / det;
        let c = mz - a * mx - b * my;
        Some(Self { a, b, c })
    }
}

/// One probe location and its measured bed height
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProbePoint {
    pub x: f32,
    pub y: f32,
    /// Measured bed height, once probed
    pub z: Option<f32>,
}

/// Probe locations and results
#[derive(Debug, Clone, Default)]
pub struct ProbeTable {
    points: [ProbePoint; MAX_PROBE_POINTS],
}

impl ProbeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Set where point `index` is probed; clears any earlier result
    pub fn set_location(&mut self, index: usize, x: f32, y: f32) -> bool {
        match self.points.get_mut(index) {
            Some(p) => {
                *p = ProbePoint { x, y, z: None };
                true
            }
            None => false,
        }
    }

    /// Record the measured height of point `index`
    pub fn record(&mut self, index: usize, z: f32) -> bool {
        match self.points.get_mut(index) {
            Some(p) => {
                p.z = Some(z);
                true
            }
            None => false,
        }
    }

    /// Point `index`
    pub fn get(&self, index: usize) -> Option<&ProbePoint> {
        self.points.get(index)
    }

    /// Fit a plane through the first `count` points
    ///
    /// Every one of them must have been probed.
    pub fn fit(&self, count: usize) -> Option<BedTransform> {
        if count > MAX_PROBE_POINTS {
            return None;
        }
        let mut xyz = [(0.0, 0.0, 0.0); MAX_PROBE_POINTS];
        for (slot, p) in xyz.iter_mut().zip(&self.points[..count]) {
            *slot = (p.x, p.y, p.z?);
        }
        BedTransform::fit(&xyz[..count])
    }
}
