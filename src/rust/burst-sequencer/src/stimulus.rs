// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Stimulus definitions and their validation against the instrument.
use std::fmt;

use envelope_synth::from_duty_cycle;
use serde::{Deserialize, Serialize};

use crate::controller::{ChannelId, TriggerSource};
use crate::settings::SequencerSettings;
use crate::traits::GeneratorTraits;
use crate::{Error, Result};

pub const DEFAULT_REPETITION_PERIOD: f64 = 2.0;

/// How the gating channel shapes the carrier bursts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatingMode {
    /// TTL pulses trigger a fixed-length carrier burst.
    Trigger,
    /// The gating waveform amplitude-modulates a continuous carrier.
    Modulation,
}

impl fmt::Display for GatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatingMode::Trigger => f.write_str("trigger"),
            GatingMode::Modulation => f.write_str("modulation"),
        }
    }
}

/// A train of carrier bursts gated by a second channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstStimulusSpec {
    /// Hz
    pub carrier_freq: f64,
    /// Vpp
    pub amplitude: f64,
    /// Duration of the whole pulse train (s)
    pub total_duration: f64,
    /// Pulse repetition frequency (Hz)
    pub prf: f64,
    /// %
    pub duty_cycle: f64,
    /// s
    #[serde(default)]
    pub ramp_time: f64,
    pub gating_channel: ChannelId,
    pub carrier_channel: ChannelId,
    pub gating_mode: GatingMode,
    pub trigger_source: TriggerSource,
    /// Repetition period of the pulse train under internal triggering (s).
    /// Falls back to the sequencer settings when unset.
    #[serde(default)]
    pub repetition_period: Option<f64>,
}

/// A validated stimulus, ready to be played.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstPlan {
    pub spec: BurstStimulusSpec,
    pub gating_mode: GatingMode,
    pub downgraded: bool,
    /// Repetition period under internal triggering (s)
    pub repetition_period: f64,
    /// Gating waveform normalized to [-1, 1], for smoothed modulation.
    pub arbitrary_waveform: Option<Vec<f64>>,
}

impl BurstPlan {
    /// Carrier burst length in trigger mode (s).
    pub fn carrier_burst_duration(&self) -> f64 {
        self.spec.duty_cycle / (100.0 * self.spec.prf)
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::configuration(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(Error::configuration(format!(
            "{name} must be non-negative, got {value}"
        )));
    }
    Ok(())
}

fn check_channel(traits: &GeneratorTraits, role: &str, channel: ChannelId) -> Result<()> {
    if !traits.has_channel(channel) {
        return Err(Error::configuration(format!(
            "invalid {role} channel: {} (options are {:?} on {})",
            channel.0, traits.channels, traits.name
        )));
    }
    Ok(())
}

/// Stretch `y` linearly so that its minimum maps to -1 and its maximum to +1.
pub fn normalize(y: &[f64]) -> Result<Vec<f64>> {
    let (lo, hi) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;
    if !(span.is_finite() && span > 0.0) {
        return Err(Error::configuration(
            "cannot normalize a constant arbitrary waveform",
        ));
    }
    Ok(y.iter().map(|v| (v - lo) / span * 2.0 - 1.0).collect())
}

impl BurstStimulusSpec {
    /// Check the stimulus against the instrument selected in `settings`, without
    /// touching it.
    ///
    /// A ramped stimulus cannot be trigger-gated, so it is played in modulation
    /// mode instead; the substitution is logged and flagged in the plan.
    pub fn validate(&self, settings: &SequencerSettings) -> Result<BurstPlan> {
        let traits = settings.traits();
        let arbitrary_points = settings.arbitrary_points;
        if self.gating_channel == self.carrier_channel {
            return Err(Error::configuration(format!(
                "gating and carrier channels cannot be identical ({})",
                self.carrier_channel
            )));
        }
        check_channel(traits, "gating", self.gating_channel)?;
        check_channel(traits, "carrier", self.carrier_channel)?;

        check_positive("carrier frequency", self.carrier_freq)?;
        if self.carrier_freq > traits.max_frequency {
            return Err(Error::configuration(format!(
                "carrier frequency ({:.3e} Hz) above max value ({:.3e} Hz)",
                self.carrier_freq, traits.max_frequency
            )));
        }
        check_non_negative("amplitude", self.amplitude)?;
        if self.amplitude > traits.max_amplitude {
            return Err(Error::configuration(format!(
                "amplitude ({} Vpp) above max value ({} Vpp)",
                self.amplitude, traits.max_amplitude
            )));
        }
        check_positive("total duration", self.total_duration)?;
        check_positive("pulse repetition frequency", self.prf)?;
        if !(self.duty_cycle > 0.0 && self.duty_cycle <= 100.0) {
            return Err(Error::configuration(format!(
                "duty cycle out of range: {} % (must be within (0, 100] %)",
                self.duty_cycle
            )));
        }
        check_non_negative("ramp time", self.ramp_time)?;
        let repetition_period = self
            .repetition_period
            .unwrap_or(settings.repetition_period);
        check_positive("repetition period", repetition_period)?;
        if repetition_period > traits.max_burst_period {
            return Err(Error::configuration(format!(
                "repetition period ({repetition_period} s) above max value ({} s)",
                traits.max_burst_period
            )));
        }

        let (gating_mode, downgraded) = match self.gating_mode {
            GatingMode::Trigger if self.ramp_time > 0.0 => {
                stimulus_log::warn!(
                    "Ramping time ({} s) not supported for trigger gating, switching to modulation gating",
                    self.ramp_time
                );
                (GatingMode::Modulation, true)
            }
            mode => (mode, false),
        };

        // Burst lengths, checked against the nominal channel frequencies
        traits.burst_cycles(self.total_duration, 1.0 / self.prf)?;
        if gating_mode == GatingMode::Trigger {
            traits.burst_cycles(
                self.duty_cycle / (100.0 * self.prf),
                1.0 / self.carrier_freq,
            )?;
        }

        let arbitrary_waveform = if gating_mode == GatingMode::Modulation && self.ramp_time > 0.0
        {
            if !traits.arbitrary_points_bounds.contains(&arbitrary_points) {
                return Err(Error::configuration(format!(
                    "invalid waveform size: {arbitrary_points} (must be within {:?})",
                    traits.arbitrary_points_bounds
                )));
            }
            let envelope = from_duty_cycle(
                arbitrary_points,
                self.prf,
                self.duty_cycle,
                self.ramp_time,
                settings.ramp_shape,
            )?;
            Some(normalize(envelope.amplitude())?)
        } else {
            None
        };

        Ok(BurstPlan {
            spec: self.clone(),
            gating_mode,
            downgraded,
            repetition_period,
            arbitrary_waveform,
        })
    }
}

/// An internally looping burst of a fixed number of carrier cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopingBurstSpec {
    pub channel: ChannelId,
    /// Hz
    pub carrier_freq: f64,
    /// Vpp
    pub amplitude: f64,
    pub n_cycles: u32,
    /// Hz
    pub prf: f64,
    /// s
    #[serde(default)]
    pub ramp_time: f64,
    /// Channel gating the carrier; the carrier loops on its own when absent.
    #[serde(default)]
    pub gating_channel: Option<ChannelId>,
    pub gating_mode: GatingMode,
}

impl LoopingBurstSpec {
    /// s
    pub fn burst_duration(&self) -> f64 {
        f64::from(self.n_cycles) / self.carrier_freq
    }

    /// Translate a gated loop into the equivalent internally triggered pulse train.
    ///
    /// Trigger gating plays one burst per gating pulse at full duty cycle. Modulation
    /// gating spreads the burst over a repetition interval of the envelope.
    pub fn to_burst_stimulus(&self, gating_channel: ChannelId) -> Result<BurstStimulusSpec> {
        if self.n_cycles < 1 {
            return Err(Error::configuration(format!(
                "invalid number of cycles: {} (must be >= 1)",
                self.n_cycles
            )));
        }
        check_positive("carrier frequency", self.carrier_freq)?;
        check_positive("pulse repetition frequency", self.prf)?;
        let burst = self.burst_duration();

        let mut gating_mode = self.gating_mode;
        if self.ramp_time > 0.0 && gating_mode == GatingMode::Trigger {
            stimulus_log::warn!(
                "Ramping time not supported for trigger gating, switching to modulation gating"
            );
            gating_mode = GatingMode::Modulation;
        }
        let (duty_cycle, total_duration, prf) = match gating_mode {
            GatingMode::Trigger => (100.0, burst, 1.0 / burst),
            GatingMode::Modulation => {
                let duty_cycle = self.prf * burst * 100.0;
                if duty_cycle > 100.0 {
                    return Err(Error::configuration(format!(
                        "{burst:.3e} s burst cannot be pulsed at {:.2} Hz",
                        self.prf
                    )));
                }
                (duty_cycle, 2.0 / self.prf, self.prf)
            }
        };
        Ok(BurstStimulusSpec {
            carrier_freq: self.carrier_freq,
            amplitude: self.amplitude,
            total_duration,
            prf,
            duty_cycle,
            ramp_time: match gating_mode {
                GatingMode::Modulation => self.ramp_time,
                GatingMode::Trigger => 0.0,
            },
            gating_channel,
            carrier_channel: self.channel,
            gating_mode,
            trigger_source: TriggerSource::Internal,
            repetition_period: Some(1.0 / self.prf),
        })
    }
}
