// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Pulse envelopes specified by repetition frequency and duty cycle.
use crate::envelope::{Envelope, assemble};
use crate::ramp::RampShape;
use crate::{Error, Result};

/// Tolerance on the reconstructed pulse duration vs. the repetition interval (s).
const PRI_TOLERANCE: f64 = 1e-12;

/// Segment durations of one repetition interval.
///
/// The ON time covers the plateau plus half of each ramp, the OFF time covers the
/// baseline plus the other halves:
///
/// ```text
/// plateau = t_on - ramp_time
/// baseline = t_off - ramp_time
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCycleTiming {
    pub pri: f64,
    pub t_on: f64,
    pub t_off: f64,
    pub ramp_time: f64,
    pub plateau: f64,
    pub baseline: f64,
}

impl DutyCycleTiming {
    /// Derive the envelope timings of a pulse train.
    ///
    /// # Arguments
    ///
    /// * prf - pulse repetition frequency (Hz)
    /// * duty_cycle - duty cycle (%), within (0, 100]
    /// * ramp_time - ramp-up (and ramp-down) duration (s)
    ///
    /// # Returns
    ///
    /// * Err(Error::TimingInfeasible): the ramps do not fit in the ON or OFF time
    pub fn new(prf: f64, duty_cycle: f64, ramp_time: f64) -> Result<Self> {
        if !(prf.is_finite() && prf > 0.0) {
            return Err(Error::invalid(format!(
                "pulse repetition frequency must be positive, got {prf}"
            )));
        }
        if !(duty_cycle > 0.0 && duty_cycle <= 100.0) {
            return Err(Error::invalid(format!(
                "duty cycle out of range: {duty_cycle} % (must be within (0, 100] %)"
            )));
        }
        if !(ramp_time.is_finite() && ramp_time >= 0.0) {
            return Err(Error::invalid(format!(
                "ramp time must be non-negative, got {ramp_time}"
            )));
        }

        let pri = 1.0 / prf;
        let t_on = duty_cycle / 100.0 * pri;
        let t_off = pri - t_on;
        let plateau = t_on - ramp_time;
        let baseline = t_off - ramp_time;

        if plateau < 0.0 {
            return Err(Error::TimingInfeasible(format!(
                "ON duration ({:.3e} s) is too short for the specified ramp time ({:.3e} s)",
                t_on, ramp_time
            )));
        }
        if baseline < 0.0 {
            return Err(Error::TimingInfeasible(format!(
                "OFF duration ({:.3e} s) is too short for the specified ramp time ({:.3e} s)",
                t_off, ramp_time
            )));
        }
        let pulse = plateau + baseline + 2.0 * ramp_time;
        if pulse > pri + PRI_TOLERANCE {
            return Err(Error::TimingInfeasible(format!(
                "ramped pulse duration ({pulse:.3e} s) exceeds pulse repetition interval ({pri:.3e} s)"
            )));
        }

        Ok(DutyCycleTiming {
            pri,
            t_on,
            t_off,
            ramp_time,
            plateau,
            baseline,
        })
    }

    pub fn envelope(&self, n_points: usize, ramp_shape: RampShape) -> Result<Envelope> {
        assemble(
            n_points,
            self.ramp_time,
            self.plateau,
            self.baseline,
            ramp_shape,
        )
    }
}

/// One repetition interval of a smoothed pulse train, sampled on `n_points`.
pub fn from_duty_cycle(
    n_points: usize,
    prf: f64,
    duty_cycle: f64,
    ramp_time: f64,
    ramp_shape: RampShape,
) -> Result<Envelope> {
    DutyCycleTiming::new(prf, duty_cycle, ramp_time)?.envelope(n_points, ramp_shape)
}
