// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Configuration of gated sine burst trains on two-channel signal generators.
//!
//! One channel (the carrier) plays the sine wave, the other (the gate) either
//! triggers fixed-length carrier bursts or amplitude-modulates the carrier with a
//! smoothed pulse envelope. The instrument itself is abstracted behind
//! [`ChannelController`].

pub mod controller;
pub mod sequencer;
pub mod session;
pub mod settings;
pub mod stimulus;
pub mod traits;

pub use controller::{
    ChannelController, ChannelId, ChannelParameter, HardwareError, IdleLevel, ParameterValue,
    Polarity, TriggerSource, WaveformKind,
};
pub use sequencer::{BurstReport, BurstSequencer, SequenceState, run_burst_sequence};
pub use session::HardwareSession;
pub use settings::{SanitizationChange, SequencerSettings};
pub use stimulus::{BurstPlan, BurstStimulusSpec, GatingMode, LoopingBurstSpec};
pub use traits::{GeneratorModel, GeneratorTraits};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid stimulus or settings, raised before any hardware write.
    #[error("{0}")]
    Configuration(String),

    /// Envelope synthesis failure, raised before any hardware write.
    #[error(transparent)]
    Synthesis(#[from] envelope_synth::Error),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn configuration<T: std::fmt::Display>(msg: T) -> Self {
        Error::Configuration(msg.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
