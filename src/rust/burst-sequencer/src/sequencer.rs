// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Two-channel burst configuration protocol.
//!
//! The order of the writes matters on real hardware: outputs are disabled carrier
//! first and enabled carrier last, and every channel is held on an external trigger
//! while it is being configured, so that no partially configured stimulus ever
//! reaches the output.
use anyhow::anyhow;
use indexmap::IndexMap;

use crate::controller::{
    ChannelController, ChannelId, ChannelParameter, IdleLevel, ParameterValue, Polarity,
    TriggerSource, WaveformKind,
};
use crate::session::HardwareSession;
use crate::settings::SequencerSettings;
use crate::stimulus::{BurstPlan, BurstStimulusSpec, GatingMode, LoopingBurstSpec};
use crate::traits::GeneratorTraits;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    GatingConfigured,
    CarrierConfigured,
    /// Both channels configured, outputs enabled unless the amplitude is zero.
    Armed,
    /// Waiting for external or manual triggers.
    Triggered,
    /// Repeating on the instrument's internal trigger.
    Looping,
}

/// Outcome of a successful burst sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstReport {
    /// Gating mode actually played.
    pub gating_mode: GatingMode,
    /// Set when a ramped trigger-gated stimulus was played in modulation mode.
    pub downgraded: bool,
    pub state: SequenceState,
    pub outputs_enabled: bool,
    /// Burst cycle count written to each channel, in write order.
    pub burst_cycles: IndexMap<ChannelId, u32>,
}

/// Thin write/query layer adding logging and typed query decoding.
struct Channels<'c> {
    controller: &'c mut dyn ChannelController,
    traits: &'static GeneratorTraits,
    burst_cycles: IndexMap<ChannelId, u32>,
}

impl<'c> Channels<'c> {
    fn new(controller: &'c mut dyn ChannelController, traits: &'static GeneratorTraits) -> Self {
        Channels {
            controller,
            traits,
            burst_cycles: IndexMap::new(),
        }
    }

    fn set(
        &mut self,
        channel: ChannelId,
        parameter: ChannelParameter,
        value: impl Into<ParameterValue>,
    ) -> Result<()> {
        let value = value.into();
        stimulus_log::diagnostic!("{}: {} <- {:?}", channel, parameter, value);
        self.controller.configure_channel(channel, parameter, value)?;
        Ok(())
    }

    fn query(&mut self, channel: ChannelId, parameter: ChannelParameter) -> Result<ParameterValue> {
        Ok(self.controller.query_channel(channel, parameter)?)
    }

    fn unexpected(
        channel: ChannelId,
        parameter: ChannelParameter,
        value: &ParameterValue,
    ) -> Error {
        anyhow!("unexpected {parameter} query response from {channel}: {value:?}").into()
    }

    fn query_f64(&mut self, channel: ChannelId, parameter: ChannelParameter) -> Result<f64> {
        let value = self.query(channel, parameter)?;
        value
            .as_f64()
            .ok_or_else(|| Self::unexpected(channel, parameter, &value))
    }

    fn query_bool(&mut self, channel: ChannelId, parameter: ChannelParameter) -> Result<bool> {
        let value = self.query(channel, parameter)?;
        value
            .as_bool()
            .ok_or_else(|| Self::unexpected(channel, parameter, &value))
    }

    fn enable(&mut self, channel: ChannelId) -> Result<()> {
        stimulus_log::debug!("Enabling output of {}", channel);
        self.controller.enable_output(channel)?;
        Ok(())
    }

    fn disable(&mut self, channel: ChannelId) -> Result<()> {
        stimulus_log::debug!("Disabling output of {}", channel);
        self.controller.disable_output(channel)?;
        Ok(())
    }

    fn apply_sine(&mut self, channel: ChannelId, freq: f64, amplitude: f64) -> Result<()> {
        self.set(channel, ChannelParameter::Waveform, WaveformKind::Sine)?;
        self.set(channel, ChannelParameter::Frequency, freq)?;
        self.set(channel, ChannelParameter::Amplitude, amplitude)?;
        self.set(channel, ChannelParameter::Offset, 0.0)?;
        self.set(channel, ChannelParameter::Phase, 0.0)
    }

    fn apply_pulse(&mut self, channel: ChannelId, freq: f64, amplitude: f64) -> Result<()> {
        self.set(channel, ChannelParameter::Waveform, WaveformKind::Pulse)?;
        self.set(channel, ChannelParameter::Frequency, freq)?;
        self.set(channel, ChannelParameter::Amplitude, amplitude)?;
        self.set(channel, ChannelParameter::Offset, amplitude / 2.0)
    }

    fn set_burst_cycles(&mut self, channel: ChannelId, cycles: u32) -> Result<()> {
        self.set(channel, ChannelParameter::BurstCycles, cycles)?;
        self.burst_cycles.insert(channel, cycles);
        Ok(())
    }

    /// Burst length as a cycle count of the channel's current frequency.
    fn set_burst_duration(&mut self, channel: ChannelId, duration: f64) -> Result<()> {
        let freq = self.query_f64(channel, ChannelParameter::Frequency)?;
        let cycles = self.traits.burst_cycles(duration, 1.0 / freq)?;
        self.set_burst_cycles(channel, cycles)
    }

    fn start_trigger_loop(&mut self, channel: ChannelId, period: Option<f64>) -> Result<()> {
        if let Some(period) = period {
            self.set(channel, ChannelParameter::BurstInternalPeriod, period)?;
        }
        self.set(channel, ChannelParameter::TriggerSource, TriggerSource::Internal)
    }
}

/// Drives a gating and a carrier channel into synchronized burst trains.
pub struct BurstSequencer {
    settings: SequencerSettings,
    state: SequenceState,
}

impl Default for BurstSequencer {
    fn default() -> Self {
        BurstSequencer::new(SequencerSettings::default())
    }
}

impl BurstSequencer {
    pub fn new(settings: SequencerSettings) -> Self {
        BurstSequencer {
            settings,
            state: SequenceState::Idle,
        }
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    /// Last state reached, including by a sequence that failed midway.
    pub fn state(&self) -> SequenceState {
        self.state
    }

    fn traits(&self) -> &'static GeneratorTraits {
        self.settings.traits()
    }

    /// Validate `spec` without touching the instrument.
    pub fn plan(&self, spec: &BurstStimulusSpec) -> Result<BurstPlan> {
        spec.validate(&self.settings)
    }

    /// Configure and arm a gated burst train.
    ///
    /// Nothing is written to the instrument unless `spec` is valid. A hardware
    /// failure aborts the sequence with the outputs left disabled.
    pub fn run(
        &mut self,
        spec: &BurstStimulusSpec,
        session: &mut HardwareSession<'_>,
    ) -> Result<BurstReport> {
        let plan = self.plan(spec)?;
        session.exclusive(|controller| self.play(&plan, controller))
    }

    fn play(
        &mut self,
        plan: &BurstPlan,
        controller: &mut dyn ChannelController,
    ) -> Result<BurstReport> {
        let spec = &plan.spec;
        let gate = spec.gating_channel;
        let carrier = spec.carrier_channel;
        let mut channels = Channels::new(controller, self.traits());
        self.state = SequenceState::Idle;

        channels.disable(carrier)?;
        channels.disable(gate)?;

        match plan.gating_mode {
            GatingMode::Trigger => self.configure_trigger_gate(&mut channels, plan)?,
            GatingMode::Modulation => self.configure_modulation_gate(&mut channels, plan)?,
        }
        self.state = SequenceState::GatingConfigured;

        match plan.gating_mode {
            GatingMode::Trigger => {
                let duration = plan.carrier_burst_duration();
                stimulus_log::info!(
                    "Setting {} to output {:.3e} s long ({:.3e} Hz, {} Vpp) sine bursts triggered externally by {}",
                    carrier,
                    duration,
                    spec.carrier_freq,
                    spec.amplitude,
                    gate
                );
                channels.apply_sine(carrier, spec.carrier_freq, spec.amplitude)?;
                channels.set(carrier, ChannelParameter::TriggerSource, TriggerSource::External)?;
                channels.set_burst_duration(carrier, duration)?;
                channels.set(carrier, ChannelParameter::BurstEnabled, true)?;
            }
            GatingMode::Modulation => {
                stimulus_log::info!(
                    "Setting {} to output a ({:.3e} Hz, {} Vpp) sine wave amplitude-modulated externally by {}",
                    carrier,
                    spec.carrier_freq,
                    spec.amplitude,
                    gate
                );
                channels.apply_sine(carrier, spec.carrier_freq, spec.amplitude)?;
                channels.set(carrier, ChannelParameter::AmEnabled, true)?;
                channels.set(carrier, ChannelParameter::AmSource, TriggerSource::External)?;
            }
        }
        self.state = SequenceState::CarrierConfigured;

        let outputs_enabled = spec.amplitude > 0.0;
        if outputs_enabled {
            channels.enable(gate)?;
            channels.enable(carrier)?;
        } else {
            stimulus_log::info!("Zero stimulus amplitude, leaving outputs disabled");
        }
        self.state = SequenceState::Armed;

        self.state = match spec.trigger_source {
            TriggerSource::External => SequenceState::Triggered,
            TriggerSource::Manual => {
                stimulus_log::info!("Waiting for manual/programmatic trigger on {}", gate);
                channels.set(gate, ChannelParameter::TriggerSource, TriggerSource::Manual)?;
                SequenceState::Triggered
            }
            TriggerSource::Internal => {
                // Burst period already set with the gate
                channels.start_trigger_loop(gate, None)?;
                SequenceState::Looping
            }
        };

        Ok(BurstReport {
            gating_mode: plan.gating_mode,
            downgraded: plan.downgraded,
            state: self.state,
            outputs_enabled,
            burst_cycles: channels.burst_cycles,
        })
    }

    fn log_gate(&self, plan: &BurstPlan, what: &str) {
        let spec = &plan.spec;
        if spec.trigger_source == TriggerSource::Internal {
            stimulus_log::info!(
                "Setting {} to {} ({:.3e} s long, {} Hz PRF), repeated every {} s",
                spec.gating_channel,
                what,
                spec.total_duration,
                spec.prf,
                plan.repetition_period
            );
        } else {
            stimulus_log::info!(
                "Setting {} to {} ({:.3e} s long, {} Hz PRF), triggered {}",
                spec.gating_channel,
                what,
                spec.total_duration,
                spec.prf,
                spec.trigger_source
            );
        }
    }

    fn internal_period(plan: &BurstPlan) -> Option<f64> {
        (plan.spec.trigger_source == TriggerSource::Internal)
            .then_some(plan.repetition_period)
    }

    /// TTL pulse train, each pulse triggering one carrier burst.
    fn configure_trigger_gate(&self, channels: &mut Channels<'_>, plan: &BurstPlan) -> Result<()> {
        let spec = &plan.spec;
        let gate = spec.gating_channel;
        let traits = self.traits();
        self.log_gate(plan, "a TTL trigger pulse train");
        channels.apply_pulse(gate, spec.prf, traits.ttl_amplitude)?;
        channels.set(gate, ChannelParameter::PulseWidth, traits.ttl_pulse_width)?;
        channels.set(gate, ChannelParameter::BurstIdleLevel, IdleLevel::Bottom)?;
        channels.set(gate, ChannelParameter::TriggerSource, TriggerSource::External)?;
        if let Some(period) = Self::internal_period(plan) {
            channels.set(gate, ChannelParameter::BurstInternalPeriod, period)?;
        }
        channels.set_burst_duration(gate, spec.total_duration)?;
        channels.set(gate, ChannelParameter::BurstEnabled, true)?;
        channels.set(gate, ChannelParameter::SyncEnabled, true)
    }

    /// Modulation waveform spanning the carrier's external AM input range.
    fn configure_modulation_gate(
        &self,
        channels: &mut Channels<'_>,
        plan: &BurstPlan,
    ) -> Result<()> {
        let spec = &plan.spec;
        let gate = spec.gating_channel;
        let traits = self.traits();
        self.log_gate(plan, "an amplitude-modulating pulse train");
        match plan.arbitrary_waveform.as_deref() {
            Some(samples) => {
                stimulus_log::info!(
                    "Uploading {}-points arbitrary waveform into volatile memory ({} s ramps)",
                    samples.len(),
                    spec.ramp_time
                );
                channels.set(gate, ChannelParameter::ArbitraryData, samples.to_vec())?;
                channels.set(gate, ChannelParameter::Waveform, WaveformKind::User)?;
            }
            None => {
                channels.set(gate, ChannelParameter::Waveform, WaveformKind::Square)?;
                channels.set(gate, ChannelParameter::SquareDutyCycle, spec.duty_cycle)?;
                // Inverted so that the carrier is off between pulses
                channels.set(gate, ChannelParameter::PhaseInverted, true)?;
            }
        }
        channels.set(gate, ChannelParameter::Amplitude, traits.modulation_amplitude())?;
        channels.set(gate, ChannelParameter::Offset, 0.0)?;
        channels.set(gate, ChannelParameter::Frequency, spec.prf)?;
        channels.set(gate, ChannelParameter::TriggerSource, TriggerSource::External)?;
        if let Some(period) = Self::internal_period(plan) {
            channels.set(gate, ChannelParameter::BurstInternalPeriod, period)?;
        }
        channels.set_burst_duration(gate, spec.total_duration)?;
        channels.set(gate, ChannelParameter::BurstEnabled, true)?;
        channels.set(gate, ChannelParameter::SyncEnabled, true)?;
        if channels.query_bool(gate, ChannelParameter::PhaseInverted)? {
            channels.set(gate, ChannelParameter::SyncPolarity, Polarity::Negative)?;
        }
        Ok(())
    }

    /// Trigger a channel programmatically.
    pub fn fire(&self, session: &mut HardwareSession<'_>, channel: ChannelId) -> Result<()> {
        if !self.traits().has_channel(channel) {
            return Err(Error::configuration(format!("unknown {channel}")));
        }
        stimulus_log::info!("Triggering {} programmatically", channel);
        session.exclusive(|controller| {
            Channels::new(controller, self.traits()).set(
                channel,
                ChannelParameter::TriggerImmediate,
                true,
            )
        })
    }

    /// Disable the carrier output, then the gating output.
    pub fn disable_all(
        &mut self,
        session: &mut HardwareSession<'_>,
        carrier: ChannelId,
        gate: ChannelId,
    ) -> Result<()> {
        let traits = self.traits();
        session.exclusive(|controller| {
            let mut channels = Channels::new(controller, traits);
            channels.disable(carrier)?;
            channels.disable(gate)
        })?;
        self.state = SequenceState::Idle;
        Ok(())
    }

    /// Loop a burst of `n_cycles` carrier cycles at `prf` on the internal trigger.
    pub fn configure_looping_burst(
        &mut self,
        spec: &LoopingBurstSpec,
        session: &mut HardwareSession<'_>,
    ) -> Result<BurstReport> {
        if let Some(gate) = spec.gating_channel {
            let stimulus = spec.to_burst_stimulus(gate)?;
            let report = self.run(&stimulus, session)?;
            if report.gating_mode == GatingMode::Modulation {
                stimulus_log::info!("Disabling burst mode on {} to modulate continuously", gate);
                let traits = self.traits();
                session.exclusive(|controller| {
                    Channels::new(controller, traits).set(
                        gate,
                        ChannelParameter::BurstEnabled,
                        false,
                    )
                })?;
            }
            return Ok(report);
        }

        if spec.ramp_time > 0.0 {
            return Err(Error::configuration(
                "ramping time not supported for looping sine burst without gating channel",
            ));
        }
        let traits = self.traits();
        let channel = spec.channel;
        if !traits.has_channel(channel) {
            return Err(Error::configuration(format!("unknown {channel}")));
        }
        if spec.n_cycles < 1 {
            return Err(Error::configuration(format!(
                "invalid number of cycles: {} (must be >= 1)",
                spec.n_cycles
            )));
        }
        if !(spec.carrier_freq > 0.0 && spec.carrier_freq <= traits.max_frequency) {
            return Err(Error::configuration(format!(
                "carrier frequency out of range: {} Hz",
                spec.carrier_freq
            )));
        }
        if !(spec.amplitude >= 0.0 && spec.amplitude <= traits.max_amplitude) {
            return Err(Error::configuration(format!(
                "amplitude out of range: {} Vpp",
                spec.amplitude
            )));
        }
        if !(spec.prf.is_finite() && spec.prf > 0.0) {
            return Err(Error::configuration(format!(
                "pulse repetition frequency must be positive, got {}",
                spec.prf
            )));
        }

        stimulus_log::info!(
            "Setting ({:.3e} Hz, {} Vpp, {} cycles) sine wave looping at {:.1} Hz on {}",
            spec.carrier_freq,
            spec.amplitude,
            spec.n_cycles,
            spec.prf,
            channel
        );
        let state = &mut self.state;
        session.exclusive(|controller| {
            let mut channels = Channels::new(controller, traits);
            *state = SequenceState::Idle;
            channels.disable(channel)?;
            channels.apply_sine(channel, spec.carrier_freq, spec.amplitude)?;
            channels.set(channel, ChannelParameter::BurstInternalPeriod, 1.0 / spec.prf)?;
            channels.set_burst_cycles(channel, spec.n_cycles)?;
            channels.set(channel, ChannelParameter::BurstEnabled, true)?;
            *state = SequenceState::CarrierConfigured;
            channels.start_trigger_loop(channel, None)?;
            channels.enable(channel)?;
            *state = SequenceState::Looping;
            Ok(BurstReport {
                gating_mode: spec.gating_mode,
                downgraded: false,
                state: SequenceState::Looping,
                outputs_enabled: true,
                burst_cycles: channels.burst_cycles,
            })
        })
    }
}

/// Validate `spec` and play it on `session` with the default settings.
pub fn run_burst_sequence(
    spec: &BurstStimulusSpec,
    session: &mut HardwareSession<'_>,
) -> Result<BurstReport> {
    BurstSequencer::default().run(spec, session)
}
