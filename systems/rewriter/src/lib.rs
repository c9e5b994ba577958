#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Two-pass gcode rewriter that applies the woodgrain effect.
//!
//! The first pass samples every layer height and normalizes the samples
//! globally. The planning pass then walks the program with the rewrite state
//! machine and records edits by line index; the emitting pass copies the input
//! with those edits applied and appends the `;WoodGraph:` trailer.

mod emit;
mod plan;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use woodgrain_core::{ConfigError, ProgressSink, WoodgrainConfig, ZKey};
use woodgrain_gcode::{InputDocument, InputError, LineTerminator, ParseWarning, Program};
use woodgrain_system_sampling::{AcceptanceRule, GrainSampler, SampleMap};
use woodgrain_system_temperature::TemperatureSource;

use crate::plan::Planner;

/// Failures that abort a run before any output exists.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum WoodgrainError {
    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The host input cannot be split into lines.
    #[error("invalid input: {0}")]
    Input(#[from] InputError),
}

/// How the output relates to the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The woodgrain effect was applied.
    Woodified,
    /// The input already carried the effect and was returned unchanged.
    PassThrough,
}

/// Outcome of one accepted layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerRecord {
    #[serde(rename = "z_um")]
    z: ZKey,
    noise: f64,
    temperature: f64,
    source: TemperatureSource,
    wall_feedrate: Option<f64>,
}

impl LayerRecord {
    /// Canonical layer height.
    #[must_use]
    pub const fn z(&self) -> ZKey {
        self.z
    }

    /// Normalized noise sampled for the layer.
    #[must_use]
    pub const fn noise(&self) -> f64 {
        self.noise
    }

    /// Resolved layer temperature.
    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Where the temperature came from.
    #[must_use]
    pub const fn source(&self) -> TemperatureSource {
        self.source
    }

    /// First wall feedrate written on the layer, if any.
    #[must_use]
    pub const fn wall_feedrate(&self) -> Option<f64> {
        self.wall_feedrate
    }
}

/// Rewritten gcode together with what happened while producing it.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputDocument {
    lines: Vec<String>,
    terminator: LineTerminator,
    layers: Vec<LayerRecord>,
    warnings: Vec<ParseWarning>,
    status: RunStatus,
}

impl OutputDocument {
    /// Output lines without terminators.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Terminator reused from the input.
    #[must_use]
    pub const fn terminator(&self) -> LineTerminator {
        self.terminator
    }

    /// Accepted layers in print order.
    #[must_use]
    pub fn layers(&self) -> &[LayerRecord] {
        &self.layers
    }

    /// Recoverable parse problems found in the input.
    #[must_use]
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    /// Whether the effect was applied.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Full output text, every line terminated.
    #[must_use]
    pub fn render(&self) -> String {
        let terminator = self.terminator.as_str();
        let capacity = self
            .lines
            .iter()
            .map(|line| line.len() + terminator.len())
            .sum();
        let mut text = String::with_capacity(capacity);
        for line in &self.lines {
            text.push_str(line);
            text.push_str(terminator);
        }
        text
    }

    /// Consumes the document, returning each line with its terminator attached.
    #[must_use]
    pub fn into_terminated_lines(self) -> Vec<String> {
        let terminator = self.terminator.as_str();
        self.lines
            .into_iter()
            .map(|mut line| {
                line.push_str(terminator);
                line
            })
            .collect()
    }
}

/// Configured woodgrain run.
pub struct Woodgrain<'a> {
    config: WoodgrainConfig,
    generated_on: Option<NaiveDateTime>,
    progress: &'a dyn ProgressSink,
}

impl Woodgrain<'static> {
    /// Validates the input-independent parameters and prepares a run.
    pub fn new(config: WoodgrainConfig) -> Result<Self, WoodgrainError> {
        config.validate()?;
        Ok(Self {
            config,
            generated_on: None,
            progress: &(),
        })
    }
}

impl<'a> Woodgrain<'a> {
    /// Stamps the output header with a generation time.
    #[must_use]
    pub fn generated_on(mut self, timestamp: NaiveDateTime) -> Self {
        self.generated_on = Some(timestamp);
        self
    }

    /// Reports progress to `sink` while the run advances.
    #[must_use]
    pub fn with_progress<'b>(self, sink: &'b dyn ProgressSink) -> Woodgrain<'b> {
        Woodgrain {
            config: self.config,
            generated_on: self.generated_on,
            progress: sink,
        }
    }

    /// Configuration the run uses.
    #[must_use]
    pub const fn config(&self) -> &WoodgrainConfig {
        &self.config
    }

    /// Rewrites the host chunks.
    ///
    /// Input that already carries the effect is returned unchanged with
    /// [`RunStatus::PassThrough`].
    pub fn run<S: AsRef<str>>(&self, chunks: &[S]) -> Result<OutputDocument, WoodgrainError> {
        let document = InputDocument::from_chunks(chunks)?;
        self.config.validate_for_input(document.len())?;

        let program = Program::parse(document.lines());
        let total = document.len();

        if program.is_woodified() {
            warn!("input was already woodified; passing it through unchanged");
            self.progress.report(total, total);
            let warnings = program.warnings().to_vec();
            let (lines, terminator) = document.into_parts();
            return Ok(OutputDocument {
                lines,
                terminator,
                layers: Vec::new(),
                warnings,
                status: RunStatus::PassThrough,
            });
        }

        let sampler = GrainSampler::from_config(&self.config)?;
        let samples = SampleMap::collect(
            program.lines(),
            &sampler,
            AcceptanceRule::from_config(&self.config),
        );
        let field = samples.normalize();

        let plan = Planner::new(&self.config, &field).plan(
            program.lines(),
            document.lines(),
            self.progress,
        );
        let lines = emit::emit(&self.config, self.generated_on, document.lines(), &plan);
        self.progress.report(total, total);

        info!(
            input_lines = total,
            output_lines = lines.len(),
            edited_lines = plan.edited_lines(),
            layers = plan.layers().len(),
            samples = samples.len(),
            "woodified gcode"
        );

        Ok(OutputDocument {
            lines,
            terminator: document.terminator(),
            layers: plan.into_layers(),
            warnings: program.warnings().to_vec(),
            status: RunStatus::Woodified,
        })
    }
}

/// Rewrites `chunks` with `config`, without a header timestamp or progress reporting.
pub fn apply<S: AsRef<str>>(
    chunks: &[S],
    config: &WoodgrainConfig,
) -> Result<OutputDocument, WoodgrainError> {
    Woodgrain::new(config.clone())?.run(chunks)
}

/// Temperatures are written as whole degrees.
pub(crate) fn format_temperature(temperature: f64) -> String {
    format!("{:.0}", temperature.round())
}
