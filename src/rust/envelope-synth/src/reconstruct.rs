// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Dense reconstruction of an amplitude-modulated carrier.
use std::f64::consts::TAU;

use crate::envelope::Envelope;
use crate::interp::{arange, interp_all};
use crate::{Error, Result};

pub const DEFAULT_POINTS_PER_CYCLE: usize = 25;

/// Envelope × carrier on a grid fine enough to resolve the carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseWaveform {
    pub time: Vec<f64>,
    pub waveform: Vec<f64>,
    pub envelope: Vec<f64>,
}

impl DenseWaveform {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Sampling interval of the dense grid.
    pub fn sample_spacing(&self) -> Option<f64> {
        match self.time.as_slice() {
            [t0, t1, ..] => Some(t1 - t0),
            _ => None,
        }
    }

    fn repeat(self, repetitions: usize) -> Self {
        if repetitions <= 1 || self.time.len() < 2 {
            return self;
        }
        let n = self.time.len();
        let capacity = n + (n - 1) * (repetitions - 1);
        let mut time = Vec::with_capacity(capacity);
        let mut waveform = Vec::with_capacity(capacity);
        let mut envelope = Vec::with_capacity(capacity);
        time.extend_from_slice(&self.time);
        waveform.extend_from_slice(&self.waveform);
        envelope.extend_from_slice(&self.envelope);
        let t0 = self.time[0];
        for _ in 1..repetitions {
            let offset = time[time.len() - 1] - t0;
            time.extend(self.time[1..].iter().map(|t| t + offset));
            waveform.extend_from_slice(&self.waveform[1..]);
            envelope.extend_from_slice(&self.envelope[1..]);
        }
        DenseWaveform {
            time,
            waveform,
            envelope,
        }
    }
}

/// Multiply `envelope` with a sine carrier sampled at `carrier_freq * points_per_cycle`.
///
/// With `repetitions > 1`, the result is repeated back to back on a continuous time
/// base; the first sample of each repeat coincides with the last of the previous one
/// and is dropped.
pub fn reconstruct(
    envelope: &Envelope,
    carrier_freq: f64,
    points_per_cycle: usize,
    repetitions: usize,
) -> Result<DenseWaveform> {
    if !(carrier_freq.is_finite() && carrier_freq > 0.0) {
        return Err(Error::invalid(format!(
            "carrier frequency must be positive, got {carrier_freq}"
        )));
    }
    if points_per_cycle == 0 {
        return Err(Error::invalid("at least one point per carrier cycle is required"));
    }
    if repetitions == 0 {
        return Err(Error::invalid("at least one repetition is required"));
    }
    if envelope.len() < 2 {
        return Err(Error::invalid("cannot reconstruct an envelope with less than 2 points"));
    }

    let fs = carrier_freq * points_per_cycle as f64;
    let dt = 1.0 / fs;
    let t_start = envelope.time()[0];
    let t_end = envelope.time()[envelope.len() - 1];
    let time = arange(t_start, t_end + dt / 2.0, dt);
    let dense_envelope = interp_all(&time, envelope.time(), envelope.amplitude());
    let waveform = time
        .iter()
        .zip(&dense_envelope)
        .map(|(t, a)| a * (TAU * carrier_freq * t).sin())
        .collect();

    Ok(DenseWaveform {
        time,
        waveform,
        envelope: dense_envelope,
    }
    .repeat(repetitions))
}

/// [`reconstruct`] with the default oversampling of 25 points per carrier cycle.
pub fn reconstruct_waveform(
    envelope: &Envelope,
    carrier_freq: f64,
    repetitions: usize,
) -> Result<DenseWaveform> {
    reconstruct(envelope, carrier_freq, DEFAULT_POINTS_PER_CYCLE, repetitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::assemble;
    use crate::ramp::RampShape;

    fn pulse() -> Envelope {
        assemble(1000, 1e-3, 3e-3, 5e-3, RampShape::Sine).unwrap()
    }

    #[test]
    fn test_dense_grid() {
        let env = pulse();
        let dense = reconstruct(&env, 10e3, 25, 1).unwrap();
        let dt = dense.sample_spacing().unwrap();
        assert!((dt - 4e-6).abs() < 1e-15);
        assert_eq!(dense.time.len(), dense.waveform.len());
        assert_eq!(dense.time.len(), dense.envelope.len());
        assert!((dense.time[dense.len() - 1] - env.time()[env.len() - 1]).abs() <= dt / 2.0);
        assert!(
            dense
                .waveform
                .iter()
                .zip(&dense.envelope)
                .all(|(w, e)| w.abs() <= e + 1e-12)
        );
    }

    #[test]
    fn test_carrier_is_modulated() {
        let env = pulse();
        let dense = reconstruct(&env, 10e3, 25, 1).unwrap();
        let peak = dense.waveform.iter().fold(0.0f64, |m, w| m.max(w.abs()));
        assert!(peak > 0.99 && peak <= 1.0);
        // Baseline is silent
        let n = dense.len();
        assert!(dense.waveform[n - 10..].iter().all(|w| *w == 0.0));
    }

    #[test]
    fn test_repetitions_are_continuous() {
        let env = pulse();
        let single = reconstruct(&env, 10e3, 25, 1).unwrap();
        let repeated = reconstruct(&env, 10e3, 25, 3).unwrap();
        let n = single.len();
        assert_eq!(repeated.len(), 3 * n - 2);
        assert!(repeated.time.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(&repeated.envelope[..n], single.envelope.as_slice());
        assert_eq!(&repeated.envelope[n..2 * n - 1], &single.envelope[1..]);
        let period = single.time[n - 1] - single.time[0];
        assert!((repeated.time[3 * n - 3] - 3.0 * period).abs() < 1e-12);
    }

    #[test]
    fn test_reconstruct_is_deterministic() {
        let env = pulse();
        assert_eq!(
            reconstruct_waveform(&env, 5e3, 2).unwrap(),
            reconstruct_waveform(&env, 5e3, 2).unwrap()
        );
    }

    #[test]
    fn test_invalid_arguments() {
        let env = pulse();
        assert!(reconstruct(&env, 0.0, 25, 1).is_err());
        assert!(reconstruct(&env, 1e3, 0, 1).is_err());
        assert!(reconstruct(&env, 1e3, 25, 0).is_err());
    }
}
