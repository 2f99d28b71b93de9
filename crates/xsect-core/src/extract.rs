use crate::domain::{AlignmentError, CrossSectionLine, ExtractionRow, ResultKind, SERIES_COUNT};
use crate::session::{CrossSectionHandle, ModelController, ResultReader, SessionError};
use std::fmt::{Display, Formatter};
use std::path::Path;
use tracing::debug;

/// Step of the per-model session sequence, used to say where a model failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStep {
    OpenModel,
    GoToStages,
    ViewFirstPhase,
    SelectPlot,
    BuildCrossSection,
    ListPhases,
}

impl ExtractionStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenModel => "open model",
            Self::GoToStages => "switch to staged construction",
            Self::ViewFirstPhase => "view first phase",
            Self::SelectPlot => "select output plot",
            Self::BuildCrossSection => "build cross-section",
            Self::ListPhases => "list phases",
        }
    }
}

impl Display for ExtractionStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to {step}: {source}")]
    Session {
        step: ExtractionStep,
        source: SessionError,
    },
    #[error("failed to read {kind} for phase '{phase}': {source}")]
    Query {
        phase: String,
        kind: ResultKind,
        source: SessionError,
    },
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
}

fn at(step: ExtractionStep) -> impl FnOnce(SessionError) -> ExtractionError {
    move |source| ExtractionError::Session { step, source }
}

/// Opens `model`, drives it to computed stages and binds the cross-section.
pub fn prepare_model<C, R>(
    controller: &mut C,
    reader: &mut R,
    model: &Path,
    line: &CrossSectionLine,
) -> Result<CrossSectionHandle, ExtractionError>
where
    C: ModelController + ?Sized,
    R: ResultReader + ?Sized,
{
    controller.open(model).map_err(at(ExtractionStep::OpenModel))?;
    controller
        .go_to_stages()
        .map_err(at(ExtractionStep::GoToStages))?;
    controller
        .view_first_phase()
        .map_err(at(ExtractionStep::ViewFirstPhase))?;

    let plot = reader.active_plot().map_err(at(ExtractionStep::SelectPlot))?;
    reader
        .line_cross_section(&plot, line)
        .map_err(at(ExtractionStep::BuildCrossSection))
}

/// Reads the ten result series of every phase of the open model.
///
/// Fails on the first phase whose series disagree in length.
pub fn extract_phases<R>(
    reader: &mut R,
    model: &Path,
    cross_section: &CrossSectionHandle,
) -> Result<Vec<ExtractionRow>, ExtractionError>
where
    R: ResultReader + ?Sized,
{
    let phases = reader.phases().map_err(at(ExtractionStep::ListPhases))?;

    let mut rows = Vec::with_capacity(phases.len());
    for phase in &phases {
        let label = phase.label();
        let mut series: [Vec<f64>; SERIES_COUNT] = Default::default();
        for kind in ResultKind::ALL {
            series[kind.index()] = reader
                .cross_section_results(cross_section, phase, kind)
                .map_err(|source| ExtractionError::Query {
                    phase: label.clone(),
                    kind,
                    source,
                })?;
        }

        let row = ExtractionRow::new(model, label, series)?;
        debug!(
            model = %model.display(),
            phase = row.phase(),
            samples = row.len(),
            "extracted phase"
        );
        rows.push(row);
    }

    Ok(rows)
}
