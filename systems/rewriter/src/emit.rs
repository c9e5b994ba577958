use chrono::NaiveDateTime;
use woodgrain_core::{TemperatureRange, WoodgrainConfig, WOODGRAPH_PREFIX, WOODIFIED_HEADER};

use crate::plan::RewritePlan;
use crate::{format_temperature, LayerRecord};

/// Width of the bar drawn for each graph row.
pub(crate) const GRAPH_WIDTH: usize = 20;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M";

/// Copies the input while applying the plan, framed by the header and the graph trailer.
pub(crate) fn emit<S: AsRef<str>>(
    config: &WoodgrainConfig,
    generated_on: Option<NaiveDateTime>,
    sources: &[S],
    plan: &RewritePlan,
) -> Vec<String> {
    let range = TemperatureRange::from_config(config);
    let mut output = Vec::with_capacity(sources.len() + plan.layers().len() * 2 + 4);

    output.push(header(generated_on));
    output.push(format!(
        "{} S{}",
        config.temp_command.as_str(),
        format_temperature(config.raft_temp)
    ));
    output.push("M116".to_owned());

    for (index, source) in sources.iter().enumerate() {
        match plan.edit(index) {
            Some(edit) => {
                output.extend(edit.before().iter().cloned());
                output.push(edit.replacement().unwrap_or(source.as_ref()).to_owned());
            }
            None => output.push(source.as_ref().to_owned()),
        }
    }

    output.push(trailer_header(config, plan.layers().len()));
    output.extend(plan.layers().iter().map(|layer| graph_row(layer, range)));
    output
}

fn header(generated_on: Option<NaiveDateTime>) -> String {
    match generated_on {
        Some(timestamp) => format!(
            "{WOODIFIED_HEADER}, generated on {}",
            timestamp.format(TIMESTAMP_FORMAT)
        ),
        None => WOODIFIED_HEADER.to_owned(),
    }
}

fn trailer_header(config: &WoodgrainConfig, layers: usize) -> String {
    format!(
        "{WOODGRAPH_PREFIX} avg={}C variation={}C maxDelta={}C grain={}mm spikiness={} seed={} layers={layers}",
        config.avg_temp,
        config.temp_variation,
        config.max_delta_per_layer,
        config.grain_size_mm,
        config.spikiness_power,
        config.seed,
    )
}

/// One `;WoodGraph:` row: height, rounded temperature and a bar scaled to the band.
pub(crate) fn graph_row(layer: &LayerRecord, range: TemperatureRange) -> String {
    let filled = bar_length(range.position(layer.temperature));
    format!(
        "{WOODGRAPH_PREFIX} Z{} @{}C | {}{}",
        layer.z,
        format_temperature(layer.temperature),
        "#".repeat(filled),
        ".".repeat(GRAPH_WIDTH - filled),
    )
}

fn bar_length(position: f64) -> usize {
    let scaled = (19.0 * position).round();
    if scaled.is_nan() || scaled <= 0.0 {
        0
    } else {
        (scaled as usize).min(GRAPH_WIDTH)
    }
}
