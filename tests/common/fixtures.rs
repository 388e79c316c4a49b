use std::path::{Path, PathBuf};

use icardfinder::config::{AppConfig, RunConfig, RunOverrides, DEFAULT_CONFIG};

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

/// Default configuration with run files placed under `dir`
pub fn run_config_in(dir: &Path, overrides: RunOverrides) -> RunConfig {
    let app = AppConfig::from_toml_str(DEFAULT_CONFIG).expect("default config should be valid");
    let overrides = RunOverrides {
        input_path: overrides
            .input_path
            .or_else(|| Some(dir.join("input.csv").display().to_string())),
        output_path: overrides
            .output_path
            .or_else(|| Some(dir.join("output.csv").display().to_string())),
        ..overrides
    };
    RunConfig::resolve(&app, &overrides).expect("test overrides should be valid")
}

/// Write an input CSV with a header row
pub fn write_input(config: &RunConfig, rows: &[&str]) {
    let mut content = String::from("borough,house,street,notes\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(&config.input_path, content).expect("Failed to write input");
}

/// Lines of a log, or nothing if it does not exist
pub fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}
