// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Smoothed rectangular pulse envelopes.
//!
//! An envelope is made of four consecutive segments, each possibly empty:
//!
//! ```text
//!        ________________
//!       /                \
//!      /                  \
//! ____/                    \_____________
//! |ramp|    plateau     |ramp| baseline |
//! ```
use serde::{Deserialize, Serialize};

use crate::interp::{arange, interp_all, linspace};
use crate::ramp::{self, RampDirection, RampShape};
use crate::{Error, Result};

/// Timing of a single smoothed pulse, sampled on `n_points`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSpec {
    pub n_points: usize,
    pub ramp_time: f64,
    pub plateau_time: f64,
    pub baseline_time: f64,
    #[serde(default)]
    pub ramp_shape: RampShape,
}

impl EnvelopeSpec {
    pub fn new(n_points: usize, ramp_time: f64, plateau_time: f64, baseline_time: f64) -> Self {
        EnvelopeSpec {
            n_points,
            ramp_time,
            plateau_time,
            baseline_time,
            ramp_shape: RampShape::default(),
        }
    }

    pub fn with_ramp_shape(mut self, ramp_shape: RampShape) -> Self {
        self.ramp_shape = ramp_shape;
        self
    }

    /// Total pulse duration: both ramps, the plateau and the baseline.
    pub fn total_duration(&self) -> f64 {
        2.0 * self.ramp_time + self.plateau_time + self.baseline_time
    }

    fn validate(&self) -> Result<()> {
        if self.n_points < 2 {
            return Err(Error::invalid(format!(
                "envelope needs at least 2 points, got {}",
                self.n_points
            )));
        }
        for (name, value) in [
            ("ramp", self.ramp_time),
            ("plateau", self.plateau_time),
            ("baseline", self.baseline_time),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::invalid(format!(
                    "{name} time must be a non-negative number, got {value}"
                )));
            }
        }
        if self.total_duration() <= 0.0 {
            return Err(Error::invalid("envelope duration must be positive"));
        }
        self.ramp_shape.validate()
    }
}

/// Sampled envelope, with amplitudes in [0, 1] on a strictly increasing time base.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    time: Vec<f64>,
    amplitude: Vec<f64>,
}

impl Envelope {
    pub(crate) fn new(time: Vec<f64>, amplitude: Vec<f64>) -> Self {
        debug_assert_eq!(time.len(), amplitude.len());
        Envelope { time, amplitude }
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn amplitude(&self) -> &[f64] {
        &self.amplitude
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Time between the first and the last sample.
    pub fn duration(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Linearly resample the envelope onto `n` uniform points over the same time span.
    ///
    /// Interpolated amplitudes are kept within [0, 1].
    pub fn resample(&self, n: usize) -> Result<Envelope> {
        if n < 2 || self.len() < 2 {
            return Err(Error::invalid(format!(
                "cannot resample a {}-point envelope onto {n} points",
                self.len()
            )));
        }
        let time = linspace(self.time[0], self.time[self.len() - 1], n);
        let amplitude = interp_all(&time, &self.time, &self.amplitude)
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0))
            .collect();
        Ok(Envelope::new(time, amplitude))
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.time, self.amplitude)
    }
}

/// A run of samples, in time order.
struct Segment {
    time: Vec<f64>,
    value: Vec<f64>,
}

impl Segment {
    fn constant(time: Vec<f64>, level: f64) -> Self {
        let value = vec![level; time.len()];
        Segment { time, value }
    }

    fn drop_first(&mut self) {
        if !self.time.is_empty() {
            self.time.remove(0);
            self.value.remove(0);
        }
    }
}

/// Synthesize the envelope described by `spec`.
pub fn synthesize_envelope(spec: &EnvelopeSpec) -> Result<Envelope> {
    spec.validate()?;

    let total = spec.total_duration();
    let n = spec.n_points;
    let ramp_time = spec.ramp_time;
    let offset = ramp_time + spec.plateau_time;
    let coarse_dt = total / (n - 1) as f64;

    let (ramp_up, mut ramp_down, dt) = if ramp_time > 0.0 && ramp_time >= coarse_dt {
        let n_ramp = ((n as f64 * ramp_time / total).round() as usize + 1).max(2);
        let (t, y) = ramp::generate(
            n_ramp,
            ramp_time,
            ramp_time / 2.0,
            spec.ramp_shape,
            RampDirection::Up,
        )?;
        let up = Segment { time: t, value: y };
        let (t, y) = ramp::generate(
            n_ramp,
            ramp_time,
            offset + ramp_time / 2.0,
            spec.ramp_shape,
            RampDirection::Down,
        )?;
        let down = Segment { time: t, value: y };
        let dt = up.time[1] - up.time[0];
        (up, down, dt)
    } else {
        if ramp_time > 0.0 {
            stimulus_log::warn!(
                "Ramp time ({} s) cannot be resolved with {} points over {} s, using a discrete transition",
                ramp_time,
                n,
                total
            );
        }
        let up = Segment {
            time: vec![0.0],
            value: vec![0.0],
        };
        let down = Segment {
            time: vec![offset],
            value: vec![1.0],
        };
        (up, down, coarse_dt)
    };

    let up_end = ramp_up.time[ramp_up.time.len() - 1];
    let down_start = ramp_down.time[0];
    let plateau = Segment::constant(arange(up_end + dt, down_start - dt / 2.0, dt), 1.0);
    if plateau.time.is_empty() && down_start - up_end < dt / 2.0 {
        // Ramps meet without plateau; keep a single crest sample.
        ramp_down.drop_first();
    }

    let last = ramp_down
        .time
        .last()
        .or(plateau.time.last())
        .copied()
        .unwrap_or(up_end);
    let baseline = Segment::constant(arange(last + dt, total + dt / 2.0, dt), 0.0);

    let mut time = Vec::with_capacity(n);
    let mut value = Vec::with_capacity(n);
    for segment in [ramp_up, plateau, ramp_down, baseline] {
        time.extend(segment.time);
        value.extend(segment.value);
    }
    if time.len() < 2 {
        return Err(Error::invalid(
            "envelope timings leave less than two samples to interpolate",
        ));
    }
    Envelope::new(time, value).resample(n)
}

/// Assemble a pulse envelope from its segment durations.
///
/// # Arguments
///
/// * n_points - number of samples of the returned envelope
/// * ramp_time - duration of each of the ramp-up and ramp-down (0 for a rectangular pulse)
/// * plateau_time - duration of the "high" plateau
/// * baseline_time - duration of the trailing "low" baseline
/// * ramp_shape - shape of both ramps
pub fn assemble(
    n_points: usize,
    ramp_time: f64,
    plateau_time: f64,
    baseline_time: f64,
    ramp_shape: RampShape,
) -> Result<Envelope> {
    synthesize_envelope(
        &EnvelopeSpec::new(n_points, ramp_time, plateau_time, baseline_time)
            .with_ramp_shape(ramp_shape),
    )
}
