pub mod errors;

pub use errors::{XsectError, XsectErrorCategory, XsectResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Number of parallel series pulled per phase.
pub const SERIES_COUNT: usize = 10;

/// Result quantities requested for every phase, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    SoilX,
    SoilY,
    SoilUtot,
    SoilUx,
    SoilUy,
    SoilSigxxE,
    SoilSigyyE,
    EffNormalStress,
    TotNormalStress,
    TotShearStress,
}

impl ResultKind {
    pub const ALL: [ResultKind; SERIES_COUNT] = [
        Self::SoilX,
        Self::SoilY,
        Self::SoilUtot,
        Self::SoilUx,
        Self::SoilUy,
        Self::SoilSigxxE,
        Self::SoilSigyyE,
        Self::EffNormalStress,
        Self::TotNormalStress,
        Self::TotShearStress,
    ];

    /// Dotted name of the result type as the output server knows it.
    pub const fn remote_name(self) -> &'static str {
        match self {
            Self::SoilX => "Soil.X",
            Self::SoilY => "Soil.Y",
            Self::SoilUtot => "Soil.Utot",
            Self::SoilUx => "Soil.Ux",
            Self::SoilUy => "Soil.Uy",
            Self::SoilSigxxE => "Soil.SigxxE",
            Self::SoilSigyyE => "Soil.SigyyE",
            Self::EffNormalStress => "CrossSection.EffNormalStress",
            Self::TotNormalStress => "CrossSection.TotNormalStress",
            Self::TotShearStress => "CrossSection.TotShearStress",
        }
    }

    pub const fn column_name(self) -> &'static str {
        match self {
            Self::SoilX => "x",
            Self::SoilY => "y",
            Self::SoilUtot => "utot",
            Self::SoilUx => "ux",
            Self::SoilUy => "uy",
            Self::SoilSigxxE => "sigxxe",
            Self::SoilSigyyE => "sigyye",
            Self::EffNormalStress => "eff_normal_stress",
            Self::TotNormalStress => "tot_normal_stress",
            Self::TotShearStress => "tot_shear_stress",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl Display for ResultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).remote_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point2 {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<Point2> for [f64; 2] {
    fn from(value: Point2) -> Self {
        [value.x, value.y]
    }
}

/// Measurement line shared by every model of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossSectionLine {
    pub start: Point2,
    pub end: Point2,
}

impl Default for CrossSectionLine {
    fn default() -> Self {
        Self {
            start: Point2::new(10.0, 0.0),
            end: Point2::new(10.0, -6.0),
        }
    }
}

/// One computed construction stage as reported by the output server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseInfo {
    /// Remote object reference used to address the phase in queries.
    pub id: String,
    pub ordinal: usize,
    pub identification: Option<String>,
}

impl PhaseInfo {
    pub fn new(id: impl Into<String>, ordinal: usize, identification: Option<String>) -> Self {
        Self {
            id: id.into(),
            ordinal,
            identification,
        }
    }

    /// Human label for output rows; never empty.
    pub fn label(&self) -> String {
        if let Some(identification) = self
            .identification
            .as_deref()
            .filter(|value| !value.trim().is_empty())
        {
            return identification.to_string();
        }
        if !self.id.trim().is_empty() {
            return self.id.clone();
        }
        format!("Phase_{}", self.ordinal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossSectionSample {
    pub x: f64,
    pub y: f64,
    pub utot: f64,
    pub ux: f64,
    pub uy: f64,
    pub sigxxe: f64,
    pub sigyye: f64,
    pub eff_normal_stress: f64,
    pub tot_normal_stress: f64,
    pub tot_shear_stress: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "series length mismatch in '{path}' phase '{phase}': {kind} has {actual} values, expected {expected}",
    path = .model.display()
)]
pub struct AlignmentError {
    pub model: PathBuf,
    pub phase: String,
    pub kind: ResultKind,
    pub expected: usize,
    pub actual: usize,
}

/// Wide record: one phase of one model with its ten parallel series.
///
/// All series share one length; `new` is the only constructor and rejects
/// anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRow {
    model: PathBuf,
    phase: String,
    series: [Vec<f64>; SERIES_COUNT],
}

impl ExtractionRow {
    pub fn new(
        model: impl Into<PathBuf>,
        phase: impl Into<String>,
        series: [Vec<f64>; SERIES_COUNT],
    ) -> Result<Self, AlignmentError> {
        let model = model.into();
        let phase = phase.into();
        let expected = series[0].len();
        if let Some(kind) = ResultKind::ALL
            .iter()
            .copied()
            .find(|kind| series[kind.index()].len() != expected)
        {
            return Err(AlignmentError {
                actual: series[kind.index()].len(),
                model,
                phase,
                kind,
                expected,
            });
        }

        Ok(Self {
            model,
            phase,
            series,
        })
    }

    pub fn model(&self) -> &Path {
        &self.model
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn len(&self) -> usize {
        self.series[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn series(&self, kind: ResultKind) -> &[f64] {
        &self.series[kind.index()]
    }

    pub fn sample(&self, index: usize) -> Option<CrossSectionSample> {
        if index >= self.len() {
            return None;
        }
        let value = |kind: ResultKind| self.series[kind.index()][index];
        Some(CrossSectionSample {
            x: value(ResultKind::SoilX),
            y: value(ResultKind::SoilY),
            utot: value(ResultKind::SoilUtot),
            ux: value(ResultKind::SoilUx),
            uy: value(ResultKind::SoilUy),
            sigxxe: value(ResultKind::SoilSigxxE),
            sigyye: value(ResultKind::SoilSigyyE),
            eff_normal_stress: value(ResultKind::EffNormalStress),
            tot_normal_stress: value(ResultKind::TotNormalStress),
            tot_shear_stress: value(ResultKind::TotShearStress),
        })
    }
}

/// Long record: one sample point tagged with its model and phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub model: PathBuf,
    pub stage: String,
    pub sample: CrossSectionSample,
}
