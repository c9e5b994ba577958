use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;
use woodgrain_core::WoodgrainConfig;
use woodgrain_system_rewriter::{LayerRecord, OutputDocument, RunStatus};

/// Machine-readable summary of one run.
#[derive(Debug, Serialize)]
pub(crate) struct RunReport<'a> {
    status: RunStatus,
    input_lines: usize,
    output_lines: usize,
    warnings: Vec<String>,
    config: &'a WoodgrainConfig,
    layers: &'a [LayerRecord],
}

impl<'a> RunReport<'a> {
    pub(crate) fn new(
        config: &'a WoodgrainConfig,
        input_lines: usize,
        output: &'a OutputDocument,
    ) -> Self {
        Self {
            status: output.status(),
            input_lines,
            output_lines: output.lines().len(),
            warnings: output
                .warnings()
                .iter()
                .map(ToString::to_string)
                .collect(),
            config,
            layers: output.layers(),
        }
    }

    pub(crate) fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialise the run report")
    }

    pub(crate) fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("failed to write run report to {}", path.display()))
    }
}
