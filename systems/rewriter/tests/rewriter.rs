use chrono::NaiveDate;
use woodgrain_core::{ConfigError, Progress, TemperatureRange, WoodgrainConfig, ZKey};
use woodgrain_gcode::{InputError, LineTerminator};
use woodgrain_system_rewriter::{apply, RunStatus, Woodgrain, WoodgrainError};

fn text(lines: &[&str]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn three_layers() -> String {
    text(&[
        "G28",
        "G1 Z0.2 F1200",
        "G1 X10 Y10 E1",
        "G1 Z0.3",
        "G1 X20 Y10 E2",
        "G1 Z0.4",
        "G1 X10 Y20 E3",
    ])
}

fn walled_print(layers: u32) -> String {
    let mut lines = vec!["G28".to_owned(), "M109 S200".to_owned()];
    for layer in 1..=layers {
        lines.push(format!(";LAYER:{}", layer - 1));
        lines.push(format!("G0 X0 Y0 Z{:.2}", f64::from(layer) * 0.2));
        lines.push(";TYPE:WALL-OUTER".to_owned());
        lines.push("G1 X10 Y0 E1 F1800".to_owned());
        lines.push("G1 X10 Y10 E2".to_owned());
        lines.push(";TYPE:FILL".to_owned());
        lines.push("G1 X5 Y5 E3 F3000".to_owned());
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn temperatures(config: &WoodgrainConfig, input: &str) -> Vec<f64> {
    apply(&[input], config)
        .expect("run succeeds")
        .layers()
        .iter()
        .map(|layer| layer.temperature())
        .collect()
}

#[test]
fn identical_runs_are_byte_identical() {
    let config = WoodgrainConfig {
        seed: 42,
        avg_temp: 210.0,
        temp_variation: 20.0,
        grain_size_mm: 2.0,
        ..WoodgrainConfig::default()
    };
    let input = three_layers();

    let first = apply(&[&input], &config).expect("first run");
    let second = apply(&[&input], &config).expect("second run");

    assert_eq!(first.status(), RunStatus::Woodified);
    assert_eq!(first.render(), second.render());
    assert_eq!(first.layers(), second.layers());
}

#[test]
fn default_run_matches_recorded_output() {
    let output = apply(&[three_layers()], &WoodgrainConfig::default()).expect("run succeeds");

    assert_eq!(
        output.lines(),
        [
            ";woodified gcode",
            "M104 S210",
            "M116",
            "G28",
            "M104 S230",
            "G1 Z0.2 F1200",
            "G1 X10 Y10 E1",
            "G1 Z0.3",
            "G1 X20 Y10 E2",
            "M104 S228",
            "G1 Z0.4",
            "G1 X10 Y20 E3",
            ";WoodGraph: avg=210C variation=20C maxDelta=2.5C grain=2mm spikiness=1 seed=42 layers=2",
            ";WoodGraph: Z0.200 @230C | ###################.",
            ";WoodGraph: Z0.400 @228C | ##################..",
        ]
    );
    assert_eq!(output.layers()[0].noise(), 1.0);
    assert_eq!(output.layers()[1].temperature(), 227.5);
}

#[test]
fn changing_the_seed_changes_a_temperature() {
    let reference = WoodgrainConfig::default();
    let reseeded = WoodgrainConfig {
        seed: 7,
        ..WoodgrainConfig::default()
    };
    let input = three_layers();

    let before = apply(&[&input], &reference).expect("run succeeds");
    let after = apply(&[&input], &reseeded).expect("run succeeds");

    // 0.3 mm merges into the 0.2 mm layer under either seed.
    for output in [&before, &after] {
        let heights: Vec<ZKey> = output.layers().iter().map(|layer| layer.z()).collect();
        assert_eq!(heights, vec![ZKey::from_mm(0.2), ZKey::from_mm(0.4)]);
    }

    let range = TemperatureRange::from_config(&reseeded);
    let reseeded_temperatures = temperatures(&reseeded, &input);
    assert!(reseeded_temperatures
        .iter()
        .all(|&temperature| range.contains(temperature)));
    assert_ne!(reseeded_temperatures, temperatures(&reference, &input));
    assert_eq!(before.layers()[0].temperature(), 230.0);
    assert_eq!(
        after.lines()[after.lines().len() - 2..],
        [
            ";WoodGraph: Z0.200 @208C | ########............",
            ";WoodGraph: Z0.400 @210C | ##########..........",
        ]
    );
}

#[test]
fn output_is_framed_by_header_and_graph() {
    let timestamp = NaiveDate::from_ymd_opt(2024, 5, 17)
        .and_then(|date| date.and_hms_opt(8, 30, 0))
        .expect("valid timestamp");
    let config = WoodgrainConfig {
        raft_temp: 215.0,
        ..WoodgrainConfig::default()
    };
    let output = Woodgrain::new(config)
        .expect("valid config")
        .generated_on(timestamp)
        .run(&[three_layers()])
        .expect("run succeeds");

    let lines = output.lines();
    assert_eq!(lines[0], ";woodified gcode, generated on 20240517-0830");
    assert_eq!(lines[1], "M104 S215");
    assert_eq!(lines[2], "M116");

    let layers = output.layers().len();
    let trailer = &lines[lines.len() - layers - 1..];
    assert!(trailer[0].starts_with(";WoodGraph: avg=210C variation=20C"));
    assert!(trailer[0].ends_with(&format!("layers={layers}")));
    for (row, layer) in trailer[1..].iter().zip(output.layers()) {
        assert!(row.starts_with(&format!(";WoodGraph: Z{} @", layer.z())));
        let bar = row.rsplit("| ").next().expect("bar");
        assert_eq!(bar.len(), 20);
        assert!(bar.chars().all(|c| c == '#' || c == '.'));
    }
}

#[test]
fn temperature_directive_precedes_each_layer_change() {
    let output = apply(&[three_layers()], &WoodgrainConfig::default()).expect("run succeeds");
    let lines = output.lines();
    let layers = output.layers();

    // 0.3 mm lies within the minimum delta of 0.2 mm and is not a new layer.
    let heights: Vec<ZKey> = layers.iter().map(|layer| layer.z()).collect();
    assert_eq!(heights, vec![ZKey::from_mm(0.2), ZKey::from_mm(0.4)]);

    for (change, layer) in ["G1 Z0.2 F1200", "G1 Z0.4"].into_iter().zip(layers) {
        let index = lines
            .iter()
            .position(|line| line == change)
            .expect("layer change kept");
        assert_eq!(
            lines[index - 1],
            format!("M104 S{:.0}", layer.temperature().round())
        );
    }

    let skipped = lines
        .iter()
        .position(|line| line == "G1 Z0.3")
        .expect("line kept");
    assert_eq!(lines[skipped - 1], "G1 X10 Y10 E1");
}

#[test]
fn z_hops_do_not_start_layers() {
    let input = text(&[
        "G1 Z0.2 F1200",
        "G1 X1 Y1 E1",
        "G1 Z0.6",
        "G0 X5 Y5",
        "G1 Z0.2",
        "G1 X2 Y2 E2",
        "G1 Z0.4",
        "G1 X3 Y3 E3",
    ]);

    let output = apply(&[&input], &WoodgrainConfig::default()).expect("run succeeds");
    let heights: Vec<ZKey> = output.layers().iter().map(|layer| layer.z()).collect();
    assert_eq!(heights, vec![ZKey::from_mm(0.2), ZKey::from_mm(0.4)]);
    assert!(!output.lines().iter().any(|line| line.starts_with(";WoodGraph: Z0.600")));

    let hop = output
        .lines()
        .iter()
        .position(|line| line == "G1 Z0.6")
        .expect("hop kept");
    assert!(!output.lines()[hop - 1].starts_with("M104"));

    let unguarded = WoodgrainConfig {
        scan_for_zhop_lines: 0,
        ..WoodgrainConfig::default()
    };
    let output = apply(&[&input], &unguarded).expect("run succeeds");
    assert_eq!(output.layers().len(), 4);
}

#[test]
fn wall_feedrates_stay_within_bounds() {
    let config = WoodgrainConfig::default();
    let output = apply(&[walled_print(40)], &config).expect("run succeeds");
    assert_eq!(output.layers().len(), 40);

    let lower = 1_800.0 * 0.8;
    let upper = 1_800.0 * 1.2;
    let mut rewritten = 0;
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("G1 X10 Y0 E1 F") {
            let feedrate: f64 = rest.parse().expect("numeric feedrate");
            assert!(
                feedrate >= lower - 1e-3 && feedrate <= upper + 1e-3,
                "feedrate {feedrate} out of bounds"
            );
            rewritten += 1;
        }
    }
    assert_eq!(rewritten, 40);

    assert_eq!(
        output
            .lines()
            .iter()
            .filter(|line| *line == "G1 X5 Y5 E3 F3000")
            .count(),
        40
    );
    assert_eq!(
        output
            .lines()
            .iter()
            .filter(|line| *line == "G1 X10 Y10 E2")
            .count(),
        40
    );
    assert!(output.layers().iter().all(|layer| layer.wall_feedrate().is_some()));
}

#[test]
fn layer_temperatures_respect_band_and_delta() {
    let config = WoodgrainConfig::default();
    let output = apply(&[walled_print(120)], &config).expect("run succeeds");
    let range = TemperatureRange::from_config(&config);

    let temperatures: Vec<f64> = output.layers().iter().map(|layer| layer.temperature()).collect();
    assert!(temperatures.iter().all(|&temperature| range.contains(temperature)));
    for pair in temperatures.windows(2) {
        assert!((pair[1] - pair[0]).abs() <= config.max_delta_per_layer + 1e-9);
    }
}

#[test]
fn warmup_directives_use_raft_temperature() {
    let config = WoodgrainConfig {
        raft_temp: 230.0,
        ..WoodgrainConfig::default()
    };
    let output = apply(&[walled_print(3)], &config).expect("run succeeds");
    assert!(output.lines().iter().any(|line| line == "M109 S230"));
    assert!(!output.lines().iter().any(|line| line == "M109 S200"));
}

#[test]
fn woodified_output_passes_through_unchanged() {
    let config = WoodgrainConfig::default();
    let first = apply(&[walled_print(5)], &config).expect("first run");
    let rendered = first.render();

    let second = apply(&[&rendered], &config).expect("second run");
    assert_eq!(second.status(), RunStatus::PassThrough);
    assert!(second.layers().is_empty());
    assert_eq!(second.render(), rendered);
}

#[test]
fn line_terminator_is_preserved() {
    let input = three_layers().replace('\n', "\r\n");
    let output = apply(&[&input], &WoodgrainConfig::default()).expect("run succeeds");
    assert_eq!(output.terminator(), LineTerminator::CrLf);
    assert!(output.render().ends_with("\r\n"));
    assert!(!output.render().replace("\r\n", "").contains('\n'));
    assert!(output
        .clone()
        .into_terminated_lines()
        .iter()
        .all(|line| line.ends_with("\r\n")));
}

#[test]
fn chunk_boundaries_carry_no_meaning() {
    let input = walled_print(4);
    let (head, tail) = input.split_at(input.len() / 3);
    let config = WoodgrainConfig::default();
    assert_eq!(
        apply(&[head, tail], &config).expect("chunked run").render(),
        apply(&[&input], &config).expect("whole run").render()
    );
}

#[test]
fn flat_input_still_produces_output() {
    let input = text(&["G28", "M104 S210", "G1 X1 Y1", "G1 X2 Y2", "G1 X3 Y3"]);
    let output = apply(&[&input], &WoodgrainConfig::default()).expect("run succeeds");
    assert!(output.layers().is_empty());
    assert!(output
        .lines()
        .last()
        .is_some_and(|line| line.ends_with("layers=0")));
}

#[test]
fn malformed_words_are_reported_not_fatal() {
    let input = text(&["G1 Z0.2", "G1 X1..5 Y1 E1", "G1 Z0.4", "G1 X2 E2", "G1 X3 E3"]);
    let output = apply(&[&input], &WoodgrainConfig::default()).expect("run succeeds");
    assert_eq!(output.warnings().len(), 1);
    assert_eq!(output.warnings()[0].line(), 1);
}

#[test]
fn progress_reaches_the_final_line() {
    let progress = Progress::new();
    let input = walled_print(6);
    let total = input.lines().count();

    let _ = Woodgrain::new(WoodgrainConfig::default())
        .expect("valid config")
        .with_progress(&progress)
        .run(&[&input])
        .expect("run succeeds");

    assert_eq!(progress.snapshot(), (total, total));
    assert!(progress.is_complete());
}

#[test]
fn malformed_input_is_rejected() {
    let config = WoodgrainConfig::default();
    let empty: [&str; 0] = [];
    assert_eq!(
        apply(&empty, &config),
        Err(WoodgrainError::Input(InputError::Empty))
    );
    assert_eq!(
        apply(&["G1 Z0.2"], &config),
        Err(WoodgrainError::Input(InputError::MissingTerminator))
    );
    assert_eq!(
        apply(&["G1 X1\nG1 Z0.2"], &config),
        Err(WoodgrainError::Input(InputError::UnterminatedFinalLine(
            "G1 Z0.2".to_owned()
        )))
    );
}

#[test]
fn mixed_line_terminators_are_rejected() {
    let config = WoodgrainConfig::default();
    let crlf = three_layers().replace('\n', "\r\n");

    let stray_lf = crlf.replacen("G1 X10 Y10 E1\r\n", "G1 X10 Y10 E1\n", 1);
    assert_eq!(
        apply(&[&stray_lf], &config),
        Err(WoodgrainError::Input(InputError::MixedTerminators { line: 3 }))
    );

    let bare_final = format!("{}\n", crlf.trim_end());
    assert_eq!(
        apply(&[&bare_final], &config),
        Err(WoodgrainError::Input(InputError::MixedTerminators { line: 7 }))
    );
}

#[test]
fn invalid_configuration_is_rejected_before_processing() {
    let config = WoodgrainConfig {
        grain_size_mm: 0.0,
        ..WoodgrainConfig::default()
    };
    assert!(matches!(
        Woodgrain::new(config),
        Err(WoodgrainError::Config(ConfigError::GrainSize(_)))
    ));

    let short = text(&["G1 Z0.2", "G1 X1 E1"]);
    assert_eq!(
        apply(&[&short], &WoodgrainConfig::default()),
        Err(WoodgrainError::Config(ConfigError::ScanExceedsInput {
            scan: 5,
            lines: 2
        }))
    );
}
