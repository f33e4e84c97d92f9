// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Power spectrum of dense waveforms and pulse repetition frequency recovery.
use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::interp::interp;
use crate::reconstruct::DenseWaveform;
use crate::regions::{RegionKind, Regions, detect_regions};
use crate::{AnalysisError, Error, Result};

/// Floor of the log power, in dB relative to the spectrum maximum.
pub const POWER_FLOOR_DB: f64 = -200.0;

/// One-sided power spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
}

impl Spectrum {
    /// Power at `freq`, in dB relative to the spectrum maximum.
    pub fn log_power_at(&self, freq: f64) -> Result<f64> {
        log_power_at(&self.freqs, &self.power, freq)
    }
}

/// Compute the one-sided power spectrum of a uniformly sampled waveform.
///
/// The FFT is scaled by the sample spacing, so that `power = |X·dt|²`.
pub fn spectrum(time: &[f64], waveform: &[f64]) -> Result<Spectrum> {
    if time.len() != waveform.len() {
        return Err(Error::invalid(format!(
            "time ({}) and waveform ({}) lengths differ",
            time.len(),
            waveform.len()
        )));
    }
    let n = time.len();
    if n < 2 {
        return Err(Error::invalid("spectrum needs at least 2 samples"));
    }
    let dt = time[1] - time[0];
    if !(dt.is_finite() && dt > 0.0) {
        return Err(Error::invalid(format!(
            "sample spacing must be positive, got {dt}"
        )));
    }

    let mut buffer: Vec<Complex64> = waveform.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let n_half = n / 2 + 1;
    let df = 1.0 / (n as f64 * dt);
    let freqs = (0..n_half).map(|k| k as f64 * df).collect();
    let power = buffer[..n_half]
        .iter()
        .map(|x| (*x * dt).norm_sqr())
        .collect();
    Ok(Spectrum { freqs, power })
}

/// Log power at `freq`, interpolated from `10·log10(power / max(power))`.
///
/// Bins without power (and an all-zero spectrum) sit at [`POWER_FLOOR_DB`].
pub fn log_power_at(freqs: &[f64], power: &[f64], freq: f64) -> Result<f64> {
    if freqs.len() != power.len() {
        return Err(Error::invalid(format!(
            "frequency ({}) and power ({}) lengths differ",
            freqs.len(),
            power.len()
        )));
    }
    if freqs.is_empty() {
        return Err(Error::invalid("cannot evaluate an empty spectrum"));
    }
    let max = power.iter().copied().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return Ok(POWER_FLOOR_DB);
    }
    let db: Vec<f64> = power
        .iter()
        .map(|p| {
            let v = 10.0 * (p / max).log10();
            if v.is_nan() { POWER_FLOOR_DB } else { v.max(POWER_FLOOR_DB) }
        })
        .collect();
    Ok(interp(freq, freqs, &db))
}

/// Pulse repetition frequency, from the first two onsets of the most represented region.
///
/// Ties between region kinds resolve in [`RegionKind::ALL`] order.
pub fn prf_from_regions(regions: &Regions) -> Result<f64> {
    let mut best: Option<(RegionKind, &[(f64, f64)])> = None;
    for (kind, intervals) in regions.iter() {
        if best.is_none_or(|(_, b)| intervals.len() > b.len()) {
            best = Some((kind, intervals));
        }
    }
    match best {
        Some((kind, [(first, _), (second, _), ..])) => {
            stimulus_log::debug!("Estimating PRF from {} onsets", kind);
            Ok(1.0 / (second - first))
        }
        Some((_, intervals)) => Err(AnalysisError::UndefinedPrf(intervals.len()).into()),
        None => Err(AnalysisError::UndefinedPrf(0).into()),
    }
}

/// Spectral content of a reconstructed pulse train.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralSummary {
    /// Log power at the carrier frequency (dB re. max).
    pub carrier_db: f64,
    /// Repetition frequency recovered from the envelope regions (Hz).
    pub prf: f64,
    /// Log power at the repetition frequency (dB re. max).
    pub prf_db: f64,
}

/// Recover the repetition frequency of `dense` and evaluate its spectrum at the
/// carrier and repetition frequencies.
pub fn analyze(dense: &DenseWaveform, carrier_freq: f64) -> Result<SpectralSummary> {
    let regions = detect_regions(&dense.time, &dense.envelope)?;
    let prf = prf_from_regions(&regions)?;
    let spectrum = spectrum(&dense.time, &dense.waveform)?;
    Ok(SpectralSummary {
        carrier_db: spectrum.log_power_at(carrier_freq)?,
        prf,
        prf_db: spectrum.log_power_at(prf)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duty_cycle::from_duty_cycle;
    use crate::ramp::RampShape;
    use crate::reconstruct::reconstruct_waveform;

    fn pulse_train(repetitions: usize) -> DenseWaveform {
        let env = from_duty_cycle(8192, 100.0, 50.0, 1e-3, RampShape::Sine).unwrap();
        reconstruct_waveform(&env, 10e3, repetitions).unwrap()
    }

    #[test]
    fn test_pure_tone_spectrum() {
        let fs = 1000.0;
        let time: Vec<f64> = (0..1000).map(|i| i as f64 / fs).collect();
        let wave: Vec<f64> = time
            .iter()
            .map(|t| (std::f64::consts::TAU * 50.0 * t).sin())
            .collect();
        let spec = spectrum(&time, &wave).unwrap();
        assert_eq!(spec.freqs.len(), 501);
        assert!((spec.freqs[1] - 1.0).abs() < 1e-12);
        let peak = spec
            .power
            .iter()
            .enumerate()
            .fold((0, 0.0), |(i, m), (j, &p)| if p > m { (j, p) } else { (i, m) });
        assert_eq!(peak.0, 50);
        // |N·dt/2|² for a unit sine
        assert!((peak.1 - 0.25).abs() < 1e-9);
        assert!(spec.log_power_at(50.0).unwrap().abs() < 1e-9);
        assert!(spec.log_power_at(200.0).unwrap() < -100.0);
    }

    #[test]
    fn test_log_power_floor() {
        assert_eq!(
            log_power_at(&[0.0, 1.0], &[0.0, 0.0], 0.5).unwrap(),
            POWER_FLOOR_DB
        );
        assert_eq!(
            log_power_at(&[0.0, 1.0], &[1.0, 0.0], 1.0).unwrap(),
            POWER_FLOOR_DB
        );
        assert!((log_power_at(&[0.0, 1.0], &[1.0, 0.1], 1.0).unwrap() + 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_power_of_mismatched_spectrum() {
        assert!(matches!(
            log_power_at(&[0.0, 1.0, 2.0], &[1.0, 0.5], 1.5),
            Err(Error::InvalidParameter(_))
        ));
        let truncated = Spectrum {
            freqs: vec![0.0, 1.0],
            power: vec![1.0],
        };
        assert!(truncated.log_power_at(1.0).is_err());
        assert!(log_power_at(&[], &[], 1.0).is_err());
    }

    #[test]
    fn test_prf_from_five_pulses() {
        let dense = pulse_train(5);
        let regions = detect_regions(&dense.time, &dense.envelope).unwrap();
        assert_eq!(
            regions.count(RegionKind::RampUp),
            regions.count(RegionKind::RampDown)
        );
        let prf = prf_from_regions(&regions).unwrap();
        assert!((prf - 100.0).abs() < 0.1, "{prf}");
    }

    #[test]
    fn test_single_pulse_prf_is_undefined() {
        let dense = pulse_train(1);
        let regions = detect_regions(&dense.time, &dense.envelope).unwrap();
        assert!(matches!(
            prf_from_regions(&regions),
            Err(Error::Analysis(AnalysisError::UndefinedPrf(1)))
        ));
        assert!(matches!(
            prf_from_regions(&Regions::default()),
            Err(Error::Analysis(AnalysisError::UndefinedPrf(0)))
        ));
    }

    #[test]
    fn test_analyze_pulse_train() {
        let dense = pulse_train(5);
        let summary = analyze(&dense, 10e3).unwrap();
        assert!((summary.prf - 100.0).abs() < 0.1);
        assert!(summary.carrier_db > -3.0, "{}", summary.carrier_db);
        assert!(summary.carrier_db <= 0.0);
        assert!(summary.prf_db < summary.carrier_db);
        assert!(summary.prf_db >= POWER_FLOOR_DB);
    }
}
