// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Module for defining settings for the burst sequencer.
use envelope_synth::RampShape;
use serde::{Deserialize, Serialize};

use crate::stimulus::DEFAULT_REPETITION_PERIOD;
use crate::traits::{GeneratorModel, GeneratorTraits};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SanitizationChange {
    pub field: &'static str,
    pub original: String,
    pub sanitized: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSettings {
    pub generator: GeneratorModel,
    /// Length of the uploaded modulation envelope
    pub arbitrary_points: usize,
    pub ramp_shape: RampShape,
    /// Repetition period under internal triggering for stimuli that leave it unset (s)
    pub repetition_period: f64,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        let generator = GeneratorModel::default();
        SequencerSettings {
            generator,
            arbitrary_points: generator.traits().arbitrary_points,
            ramp_shape: RampShape::default(),
            repetition_period: DEFAULT_REPETITION_PERIOD,
        }
    }
}

impl SequencerSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| Error::configuration(format!("invalid sequencer settings: {err}")))
    }

    pub fn traits(&self) -> &'static GeneratorTraits {
        self.generator.traits()
    }

    pub fn sanitize(&mut self) -> Result<Vec<SanitizationChange>> {
        let mut changes = vec![];
        let traits = self.traits();

        let bounds = &traits.arbitrary_points_bounds;
        let points = self.arbitrary_points.clamp(*bounds.start(), *bounds.end());
        if points != self.arbitrary_points {
            changes.push(SanitizationChange {
                field: "arbitrary_points",
                original: self.arbitrary_points.to_string(),
                sanitized: points.to_string(),
                reason: format!("Not within {bounds:?} on {}.", traits.name),
            });
            self.arbitrary_points = points;
        }

        if !(self.repetition_period.is_finite() && self.repetition_period > 0.0) {
            changes.push(SanitizationChange {
                field: "repetition_period",
                original: self.repetition_period.to_string(),
                sanitized: DEFAULT_REPETITION_PERIOD.to_string(),
                reason: "Not a positive duration.".to_string(),
            });
            self.repetition_period = DEFAULT_REPETITION_PERIOD;
        } else if self.repetition_period > traits.max_burst_period {
            return Err(Error::configuration(format!(
                "repetition period ({} s) above max value ({} s)",
                self.repetition_period, traits.max_burst_period
            )));
        }

        let invalid_margin =
            matches!(self.ramp_shape, RampShape::Sigmoid { dy } if !(dy > 0.0 && dy < 0.5));
        if invalid_margin {
            let sanitized = RampShape::sigmoid();
            changes.push(SanitizationChange {
                field: "ramp_shape",
                original: self.ramp_shape.to_string(),
                sanitized: sanitized.to_string(),
                reason: "Sigmoid margin not within (0, 0.5).".to_string(),
            });
            self.ramp_shape = sanitized;
        }
        for change in &changes {
            stimulus_log::warn!(
                "Setting '{}' sanitized from {} to {}: {}",
                change.field,
                change.original,
                change.sanitized,
                change.reason
            );
        }
        Ok(changes)
    }
}
