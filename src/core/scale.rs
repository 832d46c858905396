//! Numeric scales used for color and size encoding.

use std::fmt::Display;

/// Linear min-max normalization clamped to `[0, 1]`.
///
/// A degenerate range (`max <= min`), a NaN value, or a non-finite bound yields `0`.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() || !min.is_finite() || !max.is_finite() || max <= min {
        return 0.0;
    }
    let t = (value - min) / (max - min);
    if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
}

/// Smallest and largest finite value, or `None` when there are none.
pub fn extent<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex())
    }
}

/// Two-stop color ramp interpolated channel by channel in RGB space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRamp {
    pub low: Rgb,
    pub high: Rgb,
}

impl ColorRamp {
    /// Pale yellow to deep red, the heatmap ramp.
    pub const HEAT: ColorRamp = ColorRamp {
        low: Rgb::new(0xff, 0xed, 0xa0),
        high: Rgb::new(0xbd, 0x00, 0x26),
    };

    /// Color at position `t`, clamped to `[0, 1]`.
    pub fn at(&self, t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let mix = |a: u8, b: u8| -> u8 {
            let v = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgb {
            r: mix(self.low.r, self.high.r),
            g: mix(self.low.g, self.high.g),
            b: mix(self.low.b, self.high.b),
        }
    }

    pub fn color_for(&self, value: f64, min: f64, max: f64) -> Rgb {
        self.at(normalize(value, min, max))
    }
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self::HEAT
    }
}

/// Heat color for `value` within `[min, max]`.
pub fn color_for(value: f64, min: f64, max: f64) -> Rgb {
    ColorRamp::HEAT.color_for(value, min, max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusCurve {
    /// Area grows linearly with magnitude, which keeps outliers from dominating.
    Sqrt,
    Linear,
}

/// Maps a magnitude onto a marker radius between `min_radius` and `max_radius`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusScale {
    pub min_radius: f64,
    pub max_radius: f64,
    pub curve: RadiusCurve,
}

impl Default for RadiusScale {
    fn default() -> Self {
        Self {
            min_radius: 4.0,
            max_radius: 30.0,
            curve: RadiusCurve::Sqrt,
        }
    }
}

impl RadiusScale {
    /// Radius for `magnitude` relative to `max_magnitude`. The sign of the
    /// magnitude is ignored; zero or invalid input maps to `min_radius`.
    pub fn radius_for(&self, magnitude: f64, max_magnitude: f64) -> f64 {
        let max_magnitude = max_magnitude.abs();
        if !magnitude.is_finite() || !max_magnitude.is_finite() || max_magnitude == 0.0 {
            return self.min_radius;
        }
        let ratio = (magnitude.abs() / max_magnitude).clamp(0.0, 1.0);
        let shaped = match self.curve {
            RadiusCurve::Sqrt => ratio.sqrt(),
            RadiusCurve::Linear => ratio,
        };
        self.min_radius + (self.max_radius - self.min_radius).max(0.0) * shaped
    }
}

pub fn radius_for(magnitude: f64, max_magnitude: f64) -> f64 {
    RadiusScale::default().radius_for(magnitude, max_magnitude)
}
