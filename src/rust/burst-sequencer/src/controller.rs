// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Capability interface of a signal generator, as consumed by the sequencer.
//!
//! Command syntax, transport and response parsing belong to the implementor.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Output channel index, as numbered on the instrument front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u8);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel {}", self.0)
    }
}

/// Channel settings the sequencer writes or reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelParameter {
    Waveform,
    /// Hz
    Frequency,
    /// Vpp
    Amplitude,
    /// V
    Offset,
    /// deg
    Phase,
    /// s
    PulseWidth,
    /// %
    SquareDutyCycle,
    PhaseInverted,
    /// Samples normalized to [-1, 1], stored in volatile memory.
    ArbitraryData,
    BurstEnabled,
    BurstCycles,
    /// s
    BurstInternalPeriod,
    BurstIdleLevel,
    TriggerSource,
    /// Write-only: fire a single trigger now.
    TriggerImmediate,
    SyncEnabled,
    SyncPolarity,
    AmEnabled,
    AmSource,
}

impl fmt::Display for ChannelParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelParameter::Waveform => "waveform",
            ChannelParameter::Frequency => "frequency",
            ChannelParameter::Amplitude => "amplitude",
            ChannelParameter::Offset => "offset",
            ChannelParameter::Phase => "phase",
            ChannelParameter::PulseWidth => "pulse width",
            ChannelParameter::SquareDutyCycle => "square duty cycle",
            ChannelParameter::PhaseInverted => "phase inversion",
            ChannelParameter::ArbitraryData => "arbitrary waveform data",
            ChannelParameter::BurstEnabled => "burst mode",
            ChannelParameter::BurstCycles => "burst cycles",
            ChannelParameter::BurstInternalPeriod => "burst internal period",
            ChannelParameter::BurstIdleLevel => "burst idle level",
            ChannelParameter::TriggerSource => "trigger source",
            ChannelParameter::TriggerImmediate => "immediate trigger",
            ChannelParameter::SyncEnabled => "sync output",
            ChannelParameter::SyncPolarity => "sync polarity",
            ChannelParameter::AmEnabled => "amplitude modulation",
            ChannelParameter::AmSource => "amplitude modulation source",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformKind {
    Sine,
    Square,
    Pulse,
    /// Arbitrary waveform from volatile memory.
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleLevel {
    FirstPoint,
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Internal,
    External,
    Manual,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerSource::Internal => "internal",
            TriggerSource::External => "external",
            TriggerSource::Manual => "manual",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Float(f64),
    Bool(bool),
    Count(u32),
    Waveform(WaveformKind),
    IdleLevel(IdleLevel),
    Trigger(TriggerSource),
    Polarity(Polarity),
    Samples(Vec<f64>),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Count(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<u32> for ParameterValue {
    fn from(value: u32) -> Self {
        ParameterValue::Count(value)
    }
}

impl From<WaveformKind> for ParameterValue {
    fn from(value: WaveformKind) -> Self {
        ParameterValue::Waveform(value)
    }
}

impl From<IdleLevel> for ParameterValue {
    fn from(value: IdleLevel) -> Self {
        ParameterValue::IdleLevel(value)
    }
}

impl From<TriggerSource> for ParameterValue {
    fn from(value: TriggerSource) -> Self {
        ParameterValue::Trigger(value)
    }
}

impl From<Polarity> for ParameterValue {
    fn from(value: Polarity) -> Self {
        ParameterValue::Polarity(value)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(value: Vec<f64>) -> Self {
        ParameterValue::Samples(value)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{channel} rejected {parameter}: {message}")]
    Rejected {
        channel: ChannelId,
        parameter: ChannelParameter,
        message: String,
    },
}

/// A multi-channel signal generator.
///
/// Every call is a blocking round trip to the instrument; implementors must not
/// cache channel state.
pub trait ChannelController {
    fn configure_channel(
        &mut self,
        channel: ChannelId,
        parameter: ChannelParameter,
        value: ParameterValue,
    ) -> Result<(), HardwareError>;

    fn query_channel(
        &mut self,
        channel: ChannelId,
        parameter: ChannelParameter,
    ) -> Result<ParameterValue, HardwareError>;

    fn enable_output(&mut self, channel: ChannelId) -> Result<(), HardwareError>;

    fn disable_output(&mut self, channel: ChannelId) -> Result<(), HardwareError>;
}
