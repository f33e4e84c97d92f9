// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Smooth 0 → 1 transitions used as pulse edges.
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::interp::linspace;
use crate::{Error, Result};

/// Default vertical margin of the sigmoid ramp.
pub const DEFAULT_SIGMOID_DY: f64 = 0.01;

/// Shape of a ramp between the off (0) and on (1) level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RampShape {
    /// Logistic curve reaching `dy` and `1 - dy` at the ramp edges, rescaled to [0, 1].
    ///
    /// `dy` must lie within (0, 0.5): the curve is flat at 0.5.
    Sigmoid { dy: f64 },
    /// Half a sine period, from trough to crest.
    #[default]
    Sine,
    /// Quarter sine period, with a softer knee at the edges.
    #[serde(rename = "halfsine")]
    HalfSine,
}

impl RampShape {
    pub fn sigmoid() -> Self {
        RampShape::Sigmoid {
            dy: DEFAULT_SIGMOID_DY,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            RampShape::Sigmoid { dy } if !(*dy > 0.0 && *dy < 0.5) => Err(Error::invalid(
                format!("sigmoid margin dy must be within (0, 0.5), got {dy}"),
            )),
            _ => Ok(()),
        }
    }

    /// Rising amplitude at instant `t` of a ramp of length `duration` centered on `t0`.
    ///
    /// Rounding at the ramp edges may overshoot by a few ulps, hence the clamp.
    fn rising(&self, t: f64, duration: f64, t0: f64) -> f64 {
        let y = match self {
            RampShape::Sigmoid { dy } => {
                let k = 2.0 * ((1.0 - dy) / dy).ln() / duration;
                let y = 1.0 / (1.0 + (-k * (t - t0)).exp());
                (y - dy) / (1.0 - 2.0 * dy)
            }
            RampShape::Sine => ((2.0 * PI * (t - t0) / (2.0 * duration)).sin() + 1.0) / 2.0,
            RampShape::HalfSine => (2.0 * PI * (t - t0) / (4.0 * duration) + PI / 4.0).sin(),
        };
        y.clamp(0.0, 1.0)
    }
}

impl FromStr for RampShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sigmoid" => Ok(RampShape::sigmoid()),
            "sine" => Ok(RampShape::Sine),
            "halfsine" => Ok(RampShape::HalfSine),
            _ => Err(Error::InvalidShape(s.to_string())),
        }
    }
}

impl fmt::Display for RampShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RampShape::Sigmoid { dy } => write!(f, "sigmoid (dy = {dy})"),
            RampShape::Sine => write!(f, "sine"),
            RampShape::HalfSine => write!(f, "halfsine"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampDirection {
    Up,
    Down,
}

/// A single ramp: shape, length and half-ramp instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampSpec {
    pub shape: RampShape,
    pub duration: f64,
    pub center_time: f64,
    pub direction: RampDirection,
}

impl RampSpec {
    /// Sample the ramp on `n` points.
    ///
    /// # Returns
    ///
    /// * `(time, amplitude)`: `time` spans `center_time ± duration / 2` linearly,
    ///   `amplitude` goes from 0 to 1 (or 1 to 0 for [`RampDirection::Down`]).
    pub fn generate(&self, n: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        generate(
            n,
            self.duration,
            self.center_time,
            self.shape,
            self.direction,
        )
    }
}

/// Sample a ramp of the given shape on `n` points.
///
/// A falling ramp is the reversal of the rising one; the time vector always runs forward.
pub fn generate(
    n: usize,
    duration: f64,
    center_time: f64,
    shape: RampShape,
    direction: RampDirection,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if n == 0 {
        return Err(Error::invalid("ramp must contain at least one point"));
    }
    if !(duration.is_finite() && duration > 0.0) {
        return Err(Error::invalid(format!(
            "ramp duration must be positive, got {duration}"
        )));
    }
    if !center_time.is_finite() {
        return Err(Error::invalid("ramp center time must be finite"));
    }
    shape.validate()?;

    let time = linspace(
        center_time - duration / 2.0,
        center_time + duration / 2.0,
        n,
    );
    let mut amplitude: Vec<f64> = time
        .iter()
        .map(|&t| shape.rising(t, duration, center_time))
        .collect();
    if direction == RampDirection::Down {
        amplitude.reverse();
    }
    Ok((time, amplitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPES: [RampShape; 3] = [
        RampShape::Sigmoid { dy: 0.01 },
        RampShape::Sine,
        RampShape::HalfSine,
    ];

    #[test]
    fn test_ramp_edges() {
        for shape in SHAPES {
            let (t, y) = generate(101, 2e-3, 1e-3, shape, RampDirection::Up).unwrap();
            assert_eq!(t.len(), 101);
            assert!((t[0] - 0.0).abs() < 1e-15, "{shape}");
            assert!((t[100] - 2e-3).abs() < 1e-15, "{shape}");
            assert!(y[0].abs() < 1e-12, "{shape}: {}", y[0]);
            assert!((y[100] - 1.0).abs() < 1e-12, "{shape}: {}", y[100]);
            assert!(y.windows(2).all(|w| w[1] >= w[0]), "{shape} not monotonic");
            assert!((y[50] - 0.5).abs() < 0.3, "{shape}");
        }
    }

    #[test]
    fn test_sine_ramp_midpoint() {
        let (_, y) = generate(3, 1.0, 0.0, RampShape::Sine, RampDirection::Up).unwrap();
        assert!((y[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_down_is_reversed_up() {
        for shape in SHAPES {
            let (tu, yu) = generate(33, 1.0, 5.0, shape, RampDirection::Up).unwrap();
            let (td, yd) = generate(33, 1.0, 5.0, shape, RampDirection::Down).unwrap();
            assert_eq!(tu, td);
            let reversed: Vec<f64> = yu.iter().rev().copied().collect();
            assert_eq!(yd, reversed);
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            generate(10, 0.0, 0.0, RampShape::Sine, RampDirection::Up),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            generate(10, -1.0, 0.0, RampShape::Sine, RampDirection::Up),
            Err(Error::InvalidParameter(_))
        ));
        for dy in [0.0, 0.5, 0.7, 1.0, -0.5, 1.5] {
            assert!(matches!(
                generate(10, 1.0, 0.0, RampShape::Sigmoid { dy }, RampDirection::Up),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_shape_from_str() {
        assert_eq!("sine".parse::<RampShape>().unwrap(), RampShape::Sine);
        assert_eq!("HalfSine".parse::<RampShape>().unwrap(), RampShape::HalfSine);
        assert_eq!(
            "sigmoid".parse::<RampShape>().unwrap(),
            RampShape::Sigmoid { dy: 0.01 }
        );
        assert!(matches!(
            "gaussian".parse::<RampShape>(),
            Err(Error::InvalidShape(name)) if name == "gaussian"
        ));
    }

    #[test]
    fn test_ramp_spec_generate() {
        let spec = RampSpec {
            shape: RampShape::Sine,
            duration: 1e-3,
            center_time: 5e-4,
            direction: RampDirection::Down,
        };
        let (t, y) = spec.generate(11).unwrap();
        assert_eq!(t.len(), 11);
        assert!((y[0] - 1.0).abs() < 1e-12);
        assert!(y[10].abs() < 1e-12);
    }
}
