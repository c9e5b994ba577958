use std::collections::BTreeMap;

use tracing::{debug, trace};
use woodgrain_core::{ProgressSink, TempCommand, WoodgrainConfig, ZKey};
use woodgrain_gcode::GcodeLine;
use woodgrain_system_feedrate::{format_feedrate, FeedrateMapper};
use woodgrain_system_sampling::NormalizedField;
use woodgrain_system_temperature::{LayerTemperature, TemperatureMapper};
use woodgrain_system_zhop::ZHopDetector;

use crate::{format_temperature, LayerRecord};

/// Position of the planning pass within the print.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RewriteState {
    /// No layer accepted yet; hotend directives are forced to the raft temperature.
    Warmup,
    /// Printing a layer outside any wall segment.
    Layer,
    /// Inside a wall segment; `armed` while a feedrate substitution is pending.
    WallBlock {
        /// Whether the next applicable move still gets its feedrate rewritten.
        armed: bool,
    },
}

/// Changes applied to one input line while emitting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct LineEdit {
    before: Vec<String>,
    replacement: Option<String>,
}

impl LineEdit {
    /// Lines emitted ahead of the input line, in order.
    pub(crate) fn before(&self) -> &[String] {
        &self.before
    }

    /// Text replacing the input line, if it was rewritten.
    pub(crate) fn replacement(&self) -> Option<&str> {
        self.replacement.as_deref()
    }
}

/// Edits indexed by input line plus the layers accepted along the way.
#[derive(Clone, Debug, Default)]
pub(crate) struct RewritePlan {
    edits: BTreeMap<usize, LineEdit>,
    layers: Vec<LayerRecord>,
}

impl RewritePlan {
    /// Edit recorded for the input line at `index`.
    pub(crate) fn edit(&self, index: usize) -> Option<&LineEdit> {
        self.edits.get(&index)
    }

    /// Number of input lines that carry an edit.
    pub(crate) fn edited_lines(&self) -> usize {
        self.edits.len()
    }

    /// Consumes the plan, returning its layer records.
    pub(crate) fn into_layers(self) -> Vec<LayerRecord> {
        self.layers
    }

    /// Accepted layers in print order.
    pub(crate) fn layers(&self) -> &[LayerRecord] {
        &self.layers
    }

    fn insert_before(&mut self, index: usize, line: String) {
        self.edits.entry(index).or_default().before.push(line);
    }

    fn replace(&mut self, index: usize, line: String) {
        self.edits.entry(index).or_default().replacement = Some(line);
    }
}

/// Walks the parsed program once and records every edit by line index.
pub(crate) struct Planner<'a> {
    field: &'a NormalizedField,
    temperatures: TemperatureMapper,
    feedrates: FeedrateMapper,
    zhop: ZHopDetector,
    temp_command: TempCommand,
    raft_temp: String,
    state: RewriteState,
    current: Option<(ZKey, f64)>,
    modal_feedrate: Option<f64>,
    plan: RewritePlan,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(config: &WoodgrainConfig, field: &'a NormalizedField) -> Self {
        Self {
            field,
            temperatures: TemperatureMapper::from_config(config),
            feedrates: FeedrateMapper::from_config(config),
            zhop: ZHopDetector::new(config.scan_for_zhop_lines),
            temp_command: config.temp_command,
            raft_temp: format_temperature(config.raft_temp),
            state: RewriteState::Warmup,
            current: None,
            modal_feedrate: None,
            plan: RewritePlan::default(),
        }
    }

    /// Plans the rewrite of `sources`, whose parsed form is `lines`.
    pub(crate) fn plan<S: AsRef<str>>(
        mut self,
        lines: &[GcodeLine],
        sources: &[S],
        progress: &dyn ProgressSink,
    ) -> RewritePlan {
        let total = lines.len();
        for (index, (line, source)) in lines.iter().zip(sources).enumerate() {
            self.visit(lines, index, line, source.as_ref());
            progress.report(index + 1, total);
        }
        self.plan
    }

    fn visit(&mut self, lines: &[GcodeLine], index: usize, line: &GcodeLine, source: &str) {
        if let Some(z) = line.z() {
            self.consider_layer_change(lines, index, z);
        }

        if line.feature().is_some() {
            self.enter_feature(line);
            return;
        }

        if self.state == RewriteState::Warmup {
            if line.is_temperature_directive() {
                if let Some(rewritten) = line.replace_word(source, 'S', &self.raft_temp) {
                    trace!(line = index + 1, "forcing warmup directive to raft temperature");
                    self.plan.replace(index, rewritten);
                }
            }
        } else if self.state == (RewriteState::WallBlock { armed: true }) {
            self.substitute_feedrate(index, line, source);
        }

        if line.is_move() {
            if let Some(feedrate) = line.value('F') {
                self.modal_feedrate = Some(feedrate);
            }
        }
    }

    fn consider_layer_change(&mut self, lines: &[GcodeLine], index: usize, z: f64) {
        let key = ZKey::from_mm(z);
        if key <= ZKey::ZERO || self.current.map(|(current, _)| current) == Some(key) {
            return;
        }
        let Some(noise) = self.field.get(key) else {
            return;
        };
        if self.zhop.is_transient(lines, index, key) {
            debug!(line = index + 1, %key, "ignoring transient z-hop");
            return;
        }

        let resolved = self.temperatures.accept_layer(key, noise);
        self.accept_layer(index, key, noise, resolved);
    }

    fn accept_layer(&mut self, index: usize, key: ZKey, noise: f64, resolved: LayerTemperature) {
        let temperature = resolved.temperature();
        self.plan.insert_before(
            index,
            format!(
                "{} S{}",
                self.temp_command.as_str(),
                format_temperature(temperature)
            ),
        );
        self.plan.layers.push(LayerRecord {
            z: key,
            noise,
            temperature,
            source: resolved.source(),
            wall_feedrate: None,
        });
        self.current = Some((key, temperature));

        self.state = match self.state {
            RewriteState::WallBlock { .. } => RewriteState::WallBlock { armed: true },
            RewriteState::Warmup | RewriteState::Layer => RewriteState::Layer,
        };
        debug!(line = index + 1, %key, temperature, "accepted layer");
    }

    fn enter_feature(&mut self, line: &GcodeLine) {
        if self.state == RewriteState::Warmup {
            return;
        }
        self.state = if line.is_wall_feature() {
            RewriteState::WallBlock { armed: true }
        } else {
            RewriteState::Layer
        };
    }

    fn substitute_feedrate(&mut self, index: usize, line: &GcodeLine, source: &str) {
        if !line.is_linear_move() || !(line.has('X') || line.has('Y')) {
            return;
        }
        let Some((_, temperature)) = self.current else {
            return;
        };

        let applied = if let Some(original) = line.value('F') {
            let feedrate = self.feedrates.wall_feedrate(original, temperature);
            match line.replace_word(source, 'F', &format_feedrate(feedrate)) {
                Some(rewritten) => {
                    self.plan.replace(index, rewritten);
                    feedrate
                }
                None => return,
            }
        } else if line.has('E') {
            let Some(original) = self.modal_feedrate else {
                return;
            };
            let feedrate = self.feedrates.wall_feedrate(original, temperature);
            self.plan
                .insert_before(index, format!("G1 F{}", format_feedrate(feedrate)));
            feedrate
        } else {
            return;
        };

        self.state = RewriteState::WallBlock { armed: false };
        if let Some(layer) = self.plan.layers.last_mut() {
            let _ = layer.wall_feedrate.get_or_insert(applied);
        }
        trace!(line = index + 1, feedrate = applied, "rewrote wall feedrate");
    }
}
