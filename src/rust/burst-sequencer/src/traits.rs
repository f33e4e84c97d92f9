// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::controller::ChannelId;
use crate::{Error, Result};

/// Absolute tolerance on a burst shorter than one period of its channel (s).
const BURST_DURATION_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorModel {
    #[default]
    Dg1022z,
}

impl GeneratorModel {
    pub fn traits(&self) -> &'static GeneratorTraits {
        GeneratorTraits::from_model(self)
    }
}

/// Commonly used generator traits
pub struct GeneratorTraits {
    pub name: &'static str,
    pub channels: &'static [u8],
    /// Hz
    pub max_frequency: f64,
    /// Vpp
    pub max_amplitude: f64,
    /// Longest burst the instrument can play (s)
    pub max_burst_period: f64,
    /// Input voltage range of the external modulation input (V)
    pub modulation_voltage_range: (f64, f64),
    /// Extra relative amplitude applied on both sides of the modulation range
    pub modulation_voltage_margin: f64,
    /// Reference length of an uploaded arbitrary waveform
    pub arbitrary_points: usize,
    pub arbitrary_points_bounds: RangeInclusive<usize>,
    /// s
    pub ttl_pulse_width: f64,
    /// Vpp
    pub ttl_amplitude: f64,
}

impl GeneratorTraits {
    pub fn from_model(model: &GeneratorModel) -> &'static Self {
        match model {
            GeneratorModel::Dg1022z => &DG1022Z_TRAITS,
        }
    }

    pub fn has_channel(&self, channel: ChannelId) -> bool {
        self.channels.contains(&channel.0)
    }

    /// Peak-to-peak span of the external modulation input.
    pub fn modulation_span(&self) -> f64 {
        let (lo, hi) = self.modulation_voltage_range;
        hi - lo
    }

    /// Amplitude driving the full modulation range, with margin on both sides.
    pub fn modulation_amplitude(&self) -> f64 {
        (1.0 + 2.0 * self.modulation_voltage_margin) * self.modulation_span()
    }

    /// Number of channel periods played in a burst of `duration`.
    ///
    /// # Returns
    ///
    /// * Err(Error::Configuration): the burst is shorter than a single period, or
    ///   longer than the instrument can play
    pub fn burst_cycles(&self, duration: f64, period: f64) -> Result<u32> {
        if !(duration.is_finite() && period.is_finite() && period > 0.0) {
            return Err(Error::configuration(format!(
                "invalid burst duration ({duration} s) or period ({period} s)"
            )));
        }
        if duration < period && period - duration > BURST_DURATION_TOLERANCE {
            return Err(Error::configuration(format!(
                "burst duration ({duration:.3e} s) shorter than stimulus periodicity ({period:.3e} s)"
            )));
        }
        if duration > self.max_burst_period {
            return Err(Error::configuration(format!(
                "burst duration ({duration:.2e} s) above max value ({:.2e} s)",
                self.max_burst_period
            )));
        }
        let cycles = (duration / period).round();
        if cycles > f64::from(u32::MAX) {
            return Err(Error::configuration(format!(
                "burst of {cycles} cycles exceeds the cycle counter"
            )));
        }
        Ok((cycles as u32).max(1))
    }
}

pub const DG1022Z_TRAITS: GeneratorTraits = GeneratorTraits {
    name: "Rigol DG1022Z",
    channels: &[1, 2],
    max_frequency: 25e6,
    max_amplitude: 20.0,
    max_burst_period: 500.0,
    modulation_voltage_range: (-5.0, 5.0),
    modulation_voltage_margin: 0.05,
    arbitrary_points: 8192,
    arbitrary_points_bounds: 8..=16384,
    ttl_pulse_width: 1e-5,
    ttl_amplitude: 10.0,
};
