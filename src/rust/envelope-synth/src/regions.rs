// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Detection of ramp-up, plateau, ramp-down and baseline intervals in a dense envelope.
//!
//! Regions are diagnostic only: they are used to validate synthesized pulse trains
//! and to recover their repetition period, never fed back into synthesis.
use std::fmt;

use indexmap::IndexMap;

use crate::{AnalysisError, Error, Result};

/// Tolerance on the envelope levels considered fully on (1) or fully off (0).
const LEVEL_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionKind {
    RampUp,
    Plateau,
    RampDown,
    Baseline,
}

impl RegionKind {
    pub const ALL: [RegionKind; 4] = [
        RegionKind::RampUp,
        RegionKind::Plateau,
        RegionKind::RampDown,
        RegionKind::Baseline,
    ];
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegionKind::RampUp => "ramp-up",
            RegionKind::Plateau => "plateau",
            RegionKind::RampDown => "ramp-down",
            RegionKind::Baseline => "baseline",
        };
        f.write_str(name)
    }
}

/// Detected `(start, end)` intervals per region kind, in [`RegionKind::ALL`] order.
///
/// Kinds that were not detected are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Regions(IndexMap<RegionKind, Vec<(f64, f64)>>);

impl Regions {
    pub fn get(&self, kind: RegionKind) -> Option<&[(f64, f64)]> {
        self.0.get(&kind).map(Vec::as_slice)
    }

    pub fn count(&self, kind: RegionKind) -> usize {
        self.0.get(&kind).map_or(0, Vec::len)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionKind, &[(f64, f64)])> {
        self.0.iter().map(|(kind, v)| (*kind, v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn classify(envelope: &[f64], i: usize) -> Option<RegionKind> {
    let value = envelope[i];
    if (value - 1.0).abs() <= LEVEL_TOLERANCE {
        return Some(RegionKind::Plateau);
    }
    // Forward difference, backward on the last sample
    let slope = if i + 1 < envelope.len() {
        envelope[i + 1] - value
    } else {
        value - envelope[i - 1]
    };
    if slope > 0.0 {
        // A zero sample followed by a rise is the onset of the ramp, not baseline.
        Some(RegionKind::RampUp)
    } else if slope < 0.0 {
        Some(RegionKind::RampDown)
    } else if value.abs() <= LEVEL_TOLERANCE {
        Some(RegionKind::Baseline)
    } else {
        None
    }
}

/// Split the selected sample indices into runs of consecutive samples.
///
/// Runs of a single sample are not continuous segments and are skipped.
fn group_intervals(time: &[f64], indices: &[usize]) -> Vec<(f64, f64)> {
    let mut intervals = vec![];
    let mut start = match indices.first() {
        Some(&i) => i,
        None => return intervals,
    };
    let mut previous = start;
    for &i in &indices[1..] {
        if i != previous + 1 {
            if previous > start {
                intervals.push((time[start], time[previous]));
            }
            start = i;
        }
        previous = i;
    }
    if previous > start {
        intervals.push((time[start], time[previous]));
    }
    intervals
}

fn validate(time: &[f64], envelope: &[f64]) -> Result<()> {
    if time.len() != envelope.len() {
        return Err(Error::invalid(format!(
            "time ({}) and envelope ({}) lengths differ",
            time.len(),
            envelope.len()
        )));
    }
    if time.len() < 2 {
        return Err(Error::invalid("region detection needs at least 2 samples"));
    }
    Ok(())
}

fn region_indices(envelope: &[f64]) -> IndexMap<RegionKind, Vec<usize>> {
    let mut indices: IndexMap<RegionKind, Vec<usize>> = RegionKind::ALL
        .iter()
        .map(|kind| (*kind, vec![]))
        .collect();
    for i in 0..envelope.len() {
        if let Some(kind) = classify(envelope, i) {
            indices[&kind].push(i);
        }
    }
    indices
}

fn intervals_of(
    time: &[f64],
    kind: RegionKind,
    indices: &[usize],
) -> Result<Vec<(f64, f64)>, AnalysisError> {
    if indices.len() < 2 {
        return Err(AnalysisError::RegionNotDetected(kind));
    }
    let intervals = group_intervals(time, indices);
    if intervals.is_empty() {
        return Err(AnalysisError::RegionNotDetected(kind));
    }
    Ok(intervals)
}

/// Detect the intervals of every region kind in a dense envelope.
///
/// A kind that cannot be detected (e.g. the baseline of a continuous wave) is
/// logged and left out of the result.
pub fn detect_regions(time: &[f64], envelope: &[f64]) -> Result<Regions> {
    validate(time, envelope)?;
    let mut regions = IndexMap::new();
    for (kind, indices) in region_indices(envelope) {
        match intervals_of(time, kind, &indices) {
            Ok(intervals) => {
                regions.insert(kind, intervals);
            }
            Err(err) => {
                stimulus_log::warn!("{}", err);
            }
        }
    }
    Ok(Regions(regions))
}

/// Detect the intervals of a single region kind.
pub fn detect_region(time: &[f64], envelope: &[f64], kind: RegionKind) -> Result<Vec<(f64, f64)>> {
    validate(time, envelope)?;
    let indices = region_indices(envelope);
    Ok(intervals_of(time, kind, &indices[&kind])?)
}
