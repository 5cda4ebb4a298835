use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Import fitness-tracker exercise recordings into a normalized table
#[derive(Parser, Debug, Clone)]
#[command(
    name = "exercise-import",
    about = "Import fitness-tracker exercise recordings into a normalized table",
    version
)]
pub struct Settings {
    /// File or directory to import (defaults to the platform data directory)
    #[arg(env = "EXERCISE_IMPORT_PATH")]
    pub input: Option<PathBuf>,

    /// Source format of the input documents
    #[arg(long, default_value = "suunto", value_parser = ["suunto", "records", "qs"])]
    pub mode: String,

    /// Round sample timestamps to this many milliseconds (0 = exact)
    #[arg(long, default_value = "1000")]
    pub resolution_ms: u64,

    /// Add smoothed copies of the measurement columns using this window
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=600))]
    pub smooth_window: Option<u32>,

    /// Activity type to record when the document has none
    #[arg(long)]
    pub activity: Option<String>,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Print at most this many rows per session in text output
    #[arg(long)]
    pub max_rows: Option<usize>,

    /// Keep records that carried no known measurement for inspection
    #[arg(long)]
    pub keep_unparsed: bool,

    /// JSON file with default option values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Store the effective options in the config file for later runs
    #[arg(long)]
    pub save_config: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── InputMode ──────────────────────────────────────────────────────────────────

/// Which reader decodes the input documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Vendor app export: `{"Samples": [...]}` with `suunto/sml` attributes.
    Suunto,
    /// A JSON array of flat records, or one flat record per line.
    Records,
    /// quantified-self.io export; only the R-R stream is read.
    Qs,
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "suunto" => Ok(InputMode::Suunto),
            "records" => Ok(InputMode::Records),
            "qs" => Ok(InputMode::Qs),
            other => Err(format!(
                "No valid mode entered: {}. Allowed modes are suunto, records, qs",
                other
            )),
        }
    }
}

// ── NormalizerConfig ───────────────────────────────────────────────────────────

/// Options controlling the sample normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizerConfig {
    /// Timestamps are rounded to this many milliseconds before ordering and
    /// merging. `0` compares timestamps exactly.
    pub resolution_ms: u64,
    /// Retain raw records that carried no known measurement.
    pub keep_unparsed: bool,
}

// ── FileConfig ─────────────────────────────────────────────────────────────────

/// Option defaults read from `~/.exercise-import/config.json` or `--config`.
///
/// Values given on the command line always win.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smooth_window: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_unparsed: Option<bool>,
}

impl FileConfig {
    /// Default location: `~/.exercise-import/config.json`.
    pub fn default_path() -> PathBuf {
        Self::path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".exercise-import").join("config.json")
    }

    /// Load from `path`. Returns `Default` when the file is absent or cannot
    /// be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and merge in the config file.
    pub fn load() -> Self {
        Self::load_impl(std::env::args_os().collect(), &FileConfig::default_path())
    }

    /// Parse `args`, then fill every option not given on the command line
    /// from the config file (`--config` when present, else `default_config`).
    pub fn load_impl(args: Vec<std::ffi::OsString>, default_config: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        let config_path = settings.config_path(default_config);
        let file = FileConfig::load_from(&config_path);

        if !is_arg_explicitly_set(&matches, "mode") {
            if let Some(v) = file.mode.filter(|m| m.parse::<InputMode>().is_ok()) {
                settings.mode = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "resolution_ms") {
            if let Some(v) = file.resolution_ms {
                settings.resolution_ms = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "smooth_window") && settings.smooth_window.is_none() {
            settings.smooth_window = file.smooth_window.filter(|w| *w >= 1);
        }
        if !is_arg_explicitly_set(&matches, "activity") && settings.activity.is_none() {
            settings.activity = file.activity;
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = file.format.filter(|f| f == "text" || f == "json") {
                settings.format = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "keep_unparsed") {
            if let Some(v) = file.keep_unparsed {
                settings.keep_unparsed = v;
            }
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }

    /// `--config` when given, else `default_config`.
    pub fn config_path(&self, default_config: &Path) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| default_config.to_path_buf())
    }

    /// The reader selected by `--mode`.
    pub fn input_mode(&self) -> InputMode {
        self.mode.parse().unwrap_or(InputMode::Suunto)
    }

    /// Resolve the input path, falling back to
    /// `<platform data dir>/exercise-import`.
    pub fn input_path(&self) -> PathBuf {
        if let Some(p) = &self.input {
            return p.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("exercise-import")
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            resolution_ms: self.resolution_ms,
            keep_unparsed: self.keep_unparsed,
        }
    }
}

impl From<&Settings> for FileConfig {
    fn from(s: &Settings) -> Self {
        Self {
            mode: Some(s.mode.clone()),
            resolution_ms: Some(s.resolution_ms),
            smooth_window: s.smooth_window,
            activity: s.activity.clone(),
            format: Some(s.format.clone()),
            keep_unparsed: Some(s.keep_unparsed),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(tmp: &TempDir, args: &[&str]) -> Settings {
        let mut full: Vec<std::ffi::OsString> = vec!["exercise-import".into()];
        full.extend(args.iter().map(|a| a.into()));
        Settings::load_impl(full, &FileConfig::path_in(tmp.path()))
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["exercise-import", "/data/run.json"]);

        assert_eq!(settings.input, Some(PathBuf::from("/data/run.json")));
        assert_eq!(settings.mode, "suunto");
        assert_eq!(settings.resolution_ms, 1000);
        assert!(settings.smooth_window.is_none());
        assert_eq!(settings.format, "text");
        assert!(!settings.keep_unparsed);
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_rejects_unknown_mode() {
        let result = Settings::try_parse_from(["exercise-import", "--mode", "garmin"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_rejects_zero_smooth_window() {
        let result = Settings::try_parse_from(["exercise-import", "--smooth-window", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_input_mode_parse() {
        assert_eq!("suunto".parse::<InputMode>(), Ok(InputMode::Suunto));
        assert_eq!("Records".parse::<InputMode>(), Ok(InputMode::Records));
        assert_eq!("qs".parse::<InputMode>(), Ok(InputMode::Qs));
        let err = "fit".parse::<InputMode>().unwrap_err();
        assert!(err.contains("Allowed modes"));
    }

    #[test]
    fn test_normalizer_config_from_settings() {
        let settings = Settings::parse_from([
            "exercise-import",
            "--resolution-ms",
            "0",
            "--keep-unparsed",
        ]);
        assert_eq!(
            settings.normalizer_config(),
            NormalizerConfig {
                resolution_ms: 0,
                keep_unparsed: true,
            }
        );
    }

    #[test]
    fn test_input_path_prefers_explicit() {
        let settings = Settings::parse_from(["exercise-import", "/tmp/x.json"]);
        assert_eq!(settings.input_path(), PathBuf::from("/tmp/x.json"));
    }

    #[test]
    fn test_file_config_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = FileConfig::load_from(&FileConfig::path_in(tmp.path()));
        assert_eq!(loaded, FileConfig::default());
    }

    #[test]
    fn test_file_config_invalid_json_is_default() {
        let tmp = TempDir::new().expect("tempdir");
        let path = FileConfig::path_in(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(FileConfig::load_from(&path), FileConfig::default());
    }

    #[test]
    fn test_load_merges_file_config() {
        let tmp = TempDir::new().expect("tempdir");
        FileConfig {
            mode: Some("records".to_string()),
            resolution_ms: Some(0),
            smooth_window: Some(5),
            activity: Some("sleep".to_string()),
            format: Some("json".to_string()),
            keep_unparsed: Some(true),
        }
        .save_to(&FileConfig::path_in(tmp.path()))
        .expect("save");

        let settings = load(&tmp, &[]);
        assert_eq!(settings.input_mode(), InputMode::Records);
        assert_eq!(settings.resolution_ms, 0);
        assert_eq!(settings.smooth_window, Some(5));
        assert_eq!(settings.activity.as_deref(), Some("sleep"));
        assert_eq!(settings.format, "json");
        assert!(settings.keep_unparsed);
    }

    #[test]
    fn test_load_cli_overrides_file_config() {
        let tmp = TempDir::new().expect("tempdir");
        FileConfig {
            mode: Some("records".to_string()),
            resolution_ms: Some(0),
            ..Default::default()
        }
        .save_to(&FileConfig::path_in(tmp.path()))
        .expect("save");

        let settings = load(&tmp, &["--mode", "qs", "--resolution-ms", "500"]);
        assert_eq!(settings.input_mode(), InputMode::Qs);
        assert_eq!(settings.resolution_ms, 500);
    }

    #[test]
    fn test_load_ignores_invalid_mode_in_file() {
        let tmp = TempDir::new().expect("tempdir");
        FileConfig {
            mode: Some("garmin".to_string()),
            ..Default::default()
        }
        .save_to(&FileConfig::path_in(tmp.path()))
        .expect("save");

        let settings = load(&tmp, &[]);
        assert_eq!(settings.mode, "suunto");
    }

    #[test]
    fn test_load_explicit_config_path() {
        let tmp = TempDir::new().expect("tempdir");
        let custom = tmp.path().join("custom.json");
        FileConfig {
            format: Some("json".to_string()),
            ..Default::default()
        }
        .save_to(&custom)
        .expect("save");

        let settings = load(&tmp, &["--config", custom.to_str().unwrap()]);
        assert_eq!(settings.format, "json");
    }

    #[test]
    fn test_saved_settings_round_trip_through_config() {
        let tmp = TempDir::new().expect("tempdir");
        let first = load(
            &tmp,
            &["--mode", "records", "--smooth-window", "9", "--activity", "cycling", "--save-config"],
        );
        assert!(first.save_config);
        let path = first.config_path(&FileConfig::path_in(tmp.path()));
        FileConfig::from(&first).save_to(&path).expect("save");

        assert!(!path.with_extension("json.tmp").exists());
        let second = load(&tmp, &[]);
        assert_eq!(second.input_mode(), InputMode::Records);
        assert_eq!(second.smooth_window, Some(9));
        assert_eq!(second.activity.as_deref(), Some("cycling"));
        assert_eq!(second.resolution_ms, 1000);
    }

    #[test]
    fn test_load_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = load(&tmp, &["--debug"]);
        assert_eq!(settings.log_level, "DEBUG");
    }
}
