// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Envelope and waveform synthesis for burst stimuli.
//!
//! The pipeline is: [`ramp`] shapes a single transition, [`envelope`] stitches
//! ramps, plateau and baseline into a pulse envelope, [`duty_cycle`] derives
//! those timings from a pulse repetition frequency, [`reconstruct`] multiplies
//! the envelope with its carrier on a dense grid, and [`regions`] / [`spectrum`]
//! analyze the result.
//!
//! All functions are pure: every call builds fresh vectors from its arguments.

pub mod duty_cycle;
pub mod envelope;
pub(crate) mod interp;
pub mod ramp;
pub mod reconstruct;
pub mod regions;
pub mod spectrum;

pub use duty_cycle::{DutyCycleTiming, from_duty_cycle};
pub use envelope::{Envelope, EnvelopeSpec, assemble, synthesize_envelope};
pub use ramp::{RampDirection, RampShape, RampSpec};
pub use reconstruct::{DenseWaveform, reconstruct, reconstruct_waveform};
pub use regions::{RegionKind, Regions, detect_region, detect_regions};
pub use spectrum::{
    SpectralSummary, Spectrum, analyze, log_power_at, prf_from_regions, spectrum,
};

/// Failures of analyses that were asked for an undefined quantity.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("no continuous {0} segment detected")]
    RegionNotDetected(RegionKind),
    #[error("pulse repetition frequency is undefined for {0} detected pulse(s)")]
    UndefinedPrf(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid ramp shape: '{0}' (options are 'sigmoid', 'sine' and 'halfsine')")]
    InvalidShape(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    TimingInfeasible(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl Error {
    pub(crate) fn invalid<T: std::fmt::Display>(msg: T) -> Self {
        Error::InvalidParameter(msg.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
