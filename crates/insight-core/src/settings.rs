use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::exclusion::ExclusionPolicy;

/// Default session length in minutes.
pub const DEFAULT_SESSION_MINUTES: f64 = 60.0;

/// Default timeline sampling interval in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 5;

/// Default score below which a lead goes on an owner's follow-up list.
pub const DEFAULT_MIN_SCORE: f64 = 40.0;

/// Default number of critical drop-off moments to report.
pub const DEFAULT_TOP_DROPOFFS: usize = 3;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Reconcile masterclass attendance, chat and CRM exports into scored leads
#[derive(Parser, Debug, Clone)]
#[command(
    name = "masterclass-insights",
    about = "Reconcile masterclass attendance, chat and CRM exports into scored leads",
    version
)]
pub struct Settings {
    /// Attendance (participant report) export
    #[arg(long)]
    pub participants: PathBuf,

    /// Chat transcript export
    #[arg(long)]
    pub chat: Option<PathBuf>,

    /// CRM leads export
    #[arg(long)]
    pub crm: Option<PathBuf>,

    /// Session length in minutes
    #[arg(long, default_value_t = DEFAULT_SESSION_MINUTES)]
    pub duration: f64,

    /// Exit-timeline sampling interval in minutes
    #[arg(long, default_value_t = DEFAULT_INTERVAL_MINUTES)]
    pub interval: u32,

    /// Leads scoring below this go on the owner follow-up lists
    #[arg(long, default_value_t = DEFAULT_MIN_SCORE)]
    pub min_score: f64,

    /// Number of critical drop-off moments to report
    #[arg(long, default_value_t = DEFAULT_TOP_DROPOFFS)]
    pub top_dropoffs: usize,

    /// Output directory for exported results
    #[arg(long, default_value = "./output")]
    pub output: PathBuf,

    /// Exclusion config file (JSON with `domains`, `emails`, `sender_names`)
    #[arg(long)]
    pub exclusions: Option<PathBuf>,

    /// Exclude every email ending with this domain (repeatable)
    #[arg(long = "exclude-domain")]
    pub exclude_domains: Vec<String>,

    /// Exclude this exact email (repeatable)
    #[arg(long = "exclude-email")]
    pub exclude_emails: Vec<String>,

    /// Drop chat messages whose sender contains this text (repeatable)
    #[arg(long = "exclude-sender")]
    pub exclude_senders: Vec<String>,

    /// Persist the merged exclusion lists as the default config
    #[arg(long)]
    pub save_exclusions: bool,

    /// Logging level
    #[arg(
        long,
        default_value = "INFO",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Do not print the console summary
    #[arg(long)]
    pub quiet: bool,
}

impl Settings {
    /// Parse CLI arguments and apply the `--debug` override.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Same as [`Settings::load`] but with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Resolve the exclusion lists for this run.
    ///
    /// An explicit `--exclusions` file must load cleanly. Otherwise the
    /// persisted default at `config_path` is used when present. CLI lists are
    /// merged on top, and with `--save-exclusions` the merged result is
    /// written back to `config_path`.
    pub fn resolve_exclusions(&self, config_path: &Path) -> Result<ExclusionConfig, ConfigError> {
        let mut config = match &self.exclusions {
            Some(path) => ExclusionConfig::load_strict(path)?,
            None => ExclusionConfig::load_from(config_path),
        };

        config.merge(ExclusionConfig {
            domains: self.exclude_domains.clone(),
            emails: self.exclude_emails.clone(),
            sender_names: self.exclude_senders.clone(),
        });

        if self.save_exclusions {
            config
                .save_to(config_path)
                .map_err(|e| ConfigError::ExclusionFile {
                    path: config_path.to_path_buf(),
                    message: e.to_string(),
                })?;
            debug!("Saved exclusion config to {}", config_path.display());
        }

        Ok(config)
    }

    /// Build a validated [`PipelineConfig`] for this run.
    pub fn pipeline_config(
        &self,
        exclusions: ExclusionPolicy,
    ) -> Result<PipelineConfig, ConfigError> {
        let config = PipelineConfig {
            session_minutes: self.duration,
            interval_minutes: self.interval,
            min_score: self.min_score,
            top_dropoffs: self.top_dropoffs,
            exclusions,
        };
        config.validate()?;
        Ok(config)
    }
}

// ── PipelineConfig ─────────────────────────────────────────────────────────────

/// Parameters shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Session duration `D` in minutes.
    pub session_minutes: f64,
    /// Timeline sampling interval `I` in minutes.
    pub interval_minutes: u32,
    /// Inactive-lead threshold for owner follow-ups.
    pub min_score: f64,
    /// How many critical drop-off moments to keep.
    pub top_dropoffs: usize,
    pub exclusions: ExclusionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            session_minutes: DEFAULT_SESSION_MINUTES,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            min_score: DEFAULT_MIN_SCORE,
            top_dropoffs: DEFAULT_TOP_DROPOFFS,
            exclusions: ExclusionPolicy::none(),
        }
    }
}

impl PipelineConfig {
    /// Reject parameters that would make any stage undefined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_session_minutes(self.session_minutes)?;
        if self.interval_minutes == 0 {
            return Err(ConfigError::InvalidInterval(self.interval_minutes));
        }
        if self.top_dropoffs == 0 {
            return Err(ConfigError::InvalidTopK(self.top_dropoffs));
        }
        if !(0.0..=100.0).contains(&self.min_score) {
            return Err(ConfigError::InvalidThreshold(self.min_score));
        }
        Ok(())
    }
}

/// `D` must be a finite number of minutes greater than zero.
pub fn validate_session_minutes(minutes: f64) -> Result<(), ConfigError> {
    if minutes.is_finite() && minutes > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveDuration(minutes))
    }
}

// ── ExclusionConfig ────────────────────────────────────────────────────────────

/// Exclusion lists persisted to `~/.masterclass-insights/exclusions.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ExclusionConfig {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub sender_names: Vec<String>,
}

impl ExclusionConfig {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".masterclass-insights").join("exclusions.json")
    }

    /// Load from `path`, falling back to an empty config when the file is
    /// absent. A file that exists but cannot be parsed is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unreadable exclusion config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load from an explicitly requested path; any failure is an error.
    pub fn load_strict(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ExclusionFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ExclusionFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Atomically write the config, creating parent directories if needed.
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

    /// Append entries from `other` that are not already present.
    pub fn merge(&mut self, other: ExclusionConfig) {
        merge_unique(&mut self.domains, other.domains);
        merge_unique(&mut self.emails, other.emails);
        merge_unique(&mut self.sender_names, other.sender_names);
    }

    /// Compile into the policy handed to the loaders.
    pub fn to_policy(&self) -> ExclusionPolicy {
        ExclusionPolicy::new(&self.domains, &self.emails, &self.sender_names)
    }
}

fn merge_unique(target: &mut Vec<String>, extra: Vec<String>) {
    for item in extra {
        if !target.iter().any(|t| t.eq_ignore_ascii_case(&item)) {
            target.push(item);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> Vec<String> {
        let mut v = vec![
            "masterclass-insights".to_string(),
            "--participants".to_string(),
            "p.csv".to_string(),
        ];
        v.extend(extra.iter().map(|s| s.to_string()));
        v
    }

    // ── Settings parsing ──────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::load_from_args(args(&[]));

        assert_eq!(settings.participants, PathBuf::from("p.csv"));
        assert!(settings.chat.is_none());
        assert!(settings.crm.is_none());
        assert!((settings.duration - 60.0).abs() < f64::EPSILON);
        assert_eq!(settings.interval, 5);
        assert!((settings.min_score - 40.0).abs() < f64::EPSILON);
        assert_eq!(settings.top_dropoffs, 3);
        assert_eq!(settings.output, PathBuf::from("./output"));
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.quiet);
        assert!(!settings.save_exclusions);
    }

    #[test]
    fn test_settings_repeatable_exclusions() {
        let settings = Settings::load_from_args(args(&[
            "--exclude-domain",
            "@acme.com",
            "--exclude-domain",
            "acme.org",
            "--exclude-email",
            "coach@gmail.com",
        ]));
        assert_eq!(settings.exclude_domains, vec!["@acme.com", "acme.org"]);
        assert_eq!(settings.exclude_emails, vec!["coach@gmail.com"]);
    }

    #[test]
    fn test_settings_debug_overrides_log_level() {
        let settings = Settings::load_from_args(args(&["--debug"]));
        assert_eq!(settings.log_level, "DEBUG");
    }

    // ── PipelineConfig ────────────────────────────────────────────────────────

    #[test]
    fn test_pipeline_config_rejects_zero_duration() {
        let settings = Settings::load_from_args(args(&["--duration", "0"]));
        let err = settings.pipeline_config(ExclusionPolicy::none()).unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveDuration(0.0));
    }

    #[test]
    fn test_pipeline_config_rejects_negative_duration() {
        let settings = Settings::load_from_args(args(&["--duration=-5"]));
        assert!(matches!(
            settings.pipeline_config(ExclusionPolicy::none()),
            Err(ConfigError::NonPositiveDuration(_))
        ));
    }

    #[test]
    fn test_pipeline_config_rejects_zero_interval() {
        let settings = Settings::load_from_args(args(&["--interval", "0"]));
        assert_eq!(
            settings.pipeline_config(ExclusionPolicy::none()).unwrap_err(),
            ConfigError::InvalidInterval(0)
        );
    }

    #[test]
    fn test_pipeline_config_rejects_out_of_range_threshold() {
        let config = PipelineConfig {
            min_score: 140.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidThreshold(140.0)));
    }

    #[test]
    fn test_validate_session_minutes_rejects_nan() {
        assert!(validate_session_minutes(f64::NAN).is_err());
        assert!(validate_session_minutes(f64::INFINITY).is_err());
        assert!(validate_session_minutes(0.5).is_ok());
    }

    // ── ExclusionConfig persistence ───────────────────────────────────────────

    #[test]
    fn test_exclusion_config_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = ExclusionConfig::config_path_in(tmp.path());
        let config = ExclusionConfig {
            domains: vec!["@acme.com".to_string()],
            emails: vec!["coach@gmail.com".to_string()],
            sender_names: vec!["admin".to_string()],
        };

        config.save_to(&path).expect("save");
        assert_eq!(ExclusionConfig::load_from(&path), config);
    }

    #[test]
    fn test_exclusion_config_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = ExclusionConfig::load_from(&ExclusionConfig::config_path_in(tmp.path()));
        assert_eq!(loaded, ExclusionConfig::default());
    }

    #[test]
    fn test_exclusion_config_strict_rejects_garbage() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").expect("write");

        assert!(matches!(
            ExclusionConfig::load_strict(&path),
            Err(ConfigError::ExclusionFile { .. })
        ));
        // The lenient loader falls back to empty lists.
        assert_eq!(ExclusionConfig::load_from(&path), ExclusionConfig::default());
    }

    #[test]
    fn test_exclusion_config_partial_json() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("partial.json");
        std::fs::write(&path, r#"{"domains": ["@acme.com"]}"#).expect("write");

        let loaded = ExclusionConfig::load_strict(&path).expect("load");
        assert_eq!(loaded.domains, vec!["@acme.com"]);
        assert!(loaded.emails.is_empty());
    }

    #[test]
    fn test_merge_skips_duplicates_case_insensitively() {
        let mut config = ExclusionConfig {
            domains: vec!["@Acme.com".to_string()],
            ..Default::default()
        };
        config.merge(ExclusionConfig {
            domains: vec!["@acme.com".to_string(), "@other.com".to_string()],
            ..Default::default()
        });
        assert_eq!(config.domains, vec!["@Acme.com", "@other.com"]);
    }

    // ── resolve_exclusions ────────────────────────────────────────────────────

    #[test]
    fn test_resolve_exclusions_merges_cli_over_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let path = ExclusionConfig::config_path_in(tmp.path());
        ExclusionConfig {
            domains: vec!["@acme.com".to_string()],
            ..Default::default()
        }
        .save_to(&path)
        .expect("save");

        let settings = Settings::load_from_args(args(&["--exclude-email", "coach@gmail.com"]));
        let resolved = settings.resolve_exclusions(&path).expect("resolve");

        assert_eq!(resolved.domains, vec!["@acme.com"]);
        assert_eq!(resolved.emails, vec!["coach@gmail.com"]);
        let policy = resolved.to_policy();
        assert!(policy.is_excluded_email("alice@acme.com"));
        assert!(policy.is_excluded_email("coach@gmail.com"));
    }

    #[test]
    fn test_resolve_exclusions_explicit_missing_file_fails() {
        let tmp = TempDir::new().expect("tempdir");
        let missing = tmp.path().join("nope.json");
        let settings =
            Settings::load_from_args(args(&["--exclusions", missing.to_str().unwrap()]));
        assert!(settings
            .resolve_exclusions(&ExclusionConfig::config_path_in(tmp.path()))
            .is_err());
    }

    #[test]
    fn test_resolve_exclusions_saves_when_requested() {
        let tmp = TempDir::new().expect("tempdir");
        let path = ExclusionConfig::config_path_in(tmp.path());
        let settings = Settings::load_from_args(args(&[
            "--exclude-domain",
            "@acme.com",
            "--save-exclusions",
        ]));

        settings.resolve_exclusions(&path).expect("resolve");

        assert!(path.exists(), "config file must be persisted");
        assert_eq!(ExclusionConfig::load_from(&path).domains, vec!["@acme.com"]);
    }
}
