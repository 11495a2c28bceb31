use crate::admission::controller::AdmissionConfig;
use crate::classifier::classify::ClassifierConfig;
use crate::defaults;
use crate::error::SignflowError;
use crate::features::buffer::FeatureConfig;
use crate::features::hands_down::HandsDownConfig;
use crate::sequence::accumulator::AccumulatorConfig;
use crate::stability::controller::StabilityConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub admission: AdmissionConfig,
    pub features: FeatureConfig,
    pub hands_down: HandsDownConfig,
    pub classifier: ClassifierConfig,
    pub stability: StabilityConfig,
    pub accumulator: AccumulatorConfig,
    pub session: SessionConfig,
    pub assets: AssetsConfig,
}

/// Session wiring: channel sizes and UI throttling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Landmark frames buffered ahead of the feature station; extra frames are dropped.
    pub frame_buffer: usize,
    /// Items buffered between the later stations.
    pub station_buffer: usize,
    pub simple_event_interval_ms: u64,
    /// Commit the sequence when both hands are lowered.
    pub commit_on_hands_down: bool,
    pub bus_extra_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_buffer: 64,
            station_buffer: 8,
            simple_event_interval_ms: defaults::SIMPLE_EVENT_INTERVAL_MS,
            commit_on_hands_down: false,
            bus_extra_capacity: defaults::BUS_EXTRA_CAPACITY,
        }
    }
}

/// Asset locations; all optional until a session is built from them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AssetsConfig {
    /// Gloss model in safetensors format.
    pub model: Option<PathBuf>,
    /// Label list (`.json` array or one label per line).
    pub labels: Option<PathBuf>,
    /// Feature scaler (`{"mean": [...], "scale": [...]}`).
    pub scaler: Option<PathBuf>,
}

/// Device-class tuning applied explicitly to a [`Config`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PerformancePreset {
    Low,
    #[default]
    Balanced,
    High,
}

impl PerformancePreset {
    /// Overwrite the throughput-related knobs of `config`.
    pub fn apply(self, config: &mut Config) {
        let admission = &mut config.admission;
        match self {
            Self::Low => {
                admission.target_fps = 10.0;
                admission.initial_frame_skip = 2;
                admission.max_frame_skip = 6;
                admission.motion_detection = true;
                config.classifier.smoothing_window = 2;
                config.session.simple_event_interval_ms = 100;
            }
            Self::Balanced => {
                let base = AdmissionConfig::default();
                admission.target_fps = base.target_fps;
                admission.initial_frame_skip = base.initial_frame_skip;
                admission.max_frame_skip = base.max_frame_skip;
                admission.motion_detection = base.motion_detection;
                config.classifier.smoothing_window = defaults::SMOOTHING_WINDOW;
                config.session.simple_event_interval_ms = defaults::SIMPLE_EVENT_INTERVAL_MS;
            }
            Self::High => {
                admission.target_fps = 30.0;
                admission.initial_frame_skip = 1;
                admission.max_frame_skip = 2;
                admission.motion_detection = false;
                config.classifier.smoothing_window = 4;
                config.session.simple_event_interval_ms = 33;
            }
        }
    }
}

impl FromStr for PerformancePreset {
    type Err = SignflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "balanced" => Ok(Self::Balanced),
            "high" => Ok(Self::High),
            other => Err(SignflowError::ConfigInvalidValue {
                key: "preset".to_string(),
                message: format!("unknown preset '{other}' (expected low, balanced or high)"),
            }),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// A missing file is reported as [`SignflowError::ConfigFileNotFound`];
    /// invalid TOML is an error too. Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SignflowError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if matches!(
                    e.downcast_ref::<SignflowError>(),
                    Some(SignflowError::ConfigFileNotFound { .. })
                ) =>
            {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SIGNFLOW_PRESET → performance preset (low, balanced, high)
    /// - SIGNFLOW_MODEL → assets.model
    /// - SIGNFLOW_LABELS → assets.labels
    /// - SIGNFLOW_SCALER → assets.scaler
    ///
    /// Unknown preset names are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(preset) = std::env::var("SIGNFLOW_PRESET")
            && !preset.is_empty()
        {
            match preset.parse::<PerformancePreset>() {
                Ok(preset) => preset.apply(&mut self),
                Err(e) => tracing::warn!("ignoring SIGNFLOW_PRESET: {e}"),
            }
        }

        if let Ok(model) = std::env::var("SIGNFLOW_MODEL")
            && !model.is_empty()
        {
            self.assets.model = Some(PathBuf::from(model));
        }

        if let Ok(labels) = std::env::var("SIGNFLOW_LABELS")
            && !labels.is_empty()
        {
            self.assets.labels = Some(PathBuf::from(labels));
        }

        if let Ok(scaler) = std::env::var("SIGNFLOW_SCALER")
            && !scaler.is_empty()
        {
            self.assets.scaler = Some(PathBuf::from(scaler));
        }

        self
    }

    /// Reject values the components cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        fn invalid(key: &str, message: &str) -> crate::error::Result<()> {
            Err(SignflowError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        }

        if self.features.window_frames == 0 {
            return invalid("features.window_frames", "must be at least 1");
        }
        if self.features.min_valid_frames > self.features.window_frames {
            return invalid(
                "features.min_valid_frames",
                "must not exceed features.window_frames",
            );
        }
        if self.classifier.smoothing_window == 0 {
            return invalid("classifier.smoothing_window", "must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.stability.high_confidence) {
            return invalid("stability.high_confidence", "must be within 0.0..=1.0");
        }
        if self.accumulator.max_tokens == 0 {
            return invalid("accumulator.max_tokens", "must be at least 1");
        }
        if self.accumulator.max_word_letters == 0 {
            return invalid("accumulator.max_word_letters", "must be at least 1");
        }
        if self.admission.target_fps <= 0.0 {
            return invalid("admission.target_fps", "must be positive");
        }
        if self.session.frame_buffer == 0 || self.session.station_buffer == 0 {
            return invalid("session", "channel buffers must be at least 1");
        }
        Ok(())
    }

    /// Render the value at a dotted key path (e.g. `stability.debounce_ms`).
    ///
    /// Sections render as TOML, scalars as their bare value.
    pub fn get_value_by_path(&self, key: &str) -> crate::error::Result<String> {
        let root = toml::Value::try_from(self).map_err(|e| SignflowError::ConfigParse {
            message: e.to_string(),
        })?;

        let mut current = &root;
        for part in key.split('.').filter(|p| !p.is_empty()) {
            current = current
                .get(part)
                .ok_or_else(|| SignflowError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "no such key".to_string(),
                })?;
        }

        match current {
            toml::Value::String(s) => Ok(s.clone()),
            toml::Value::Table(table) => {
                toml::to_string(table).map_err(|e| SignflowError::ConfigParse {
                    message: e.to_string(),
                })
            }
            other => Ok(other.to_string()),
        }
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/signflow/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("signflow").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::policy::TokenPolicyKind;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_signflow_env() {
        remove_env("SIGNFLOW_PRESET");
        remove_env("SIGNFLOW_MODEL");
        remove_env("SIGNFLOW_LABELS");
        remove_env("SIGNFLOW_SCALER");
    }

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.features.window_frames, 30);
        assert_eq!(config.features.min_valid_frames, 20);
        assert_eq!(config.classifier.smoothing_window, 3);
        assert_eq!(config.classifier.stuck_threshold, 3);
        assert_eq!(config.stability.high_confidence, 0.75);
        assert_eq!(config.stability.debounce_ms, 50);
        assert_eq!(config.accumulator.max_tokens, 7);
        assert_eq!(config.session.bus_extra_capacity, 10);
        assert_eq!(config.session.simple_event_interval_ms, 62);
        assert_eq!(config.assets, AssetsConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_temp(
            r#"
            [admission]
            target_fps = 20.0
            motion_detection = false

            [features]
            window_frames = 24
            min_valid_frames = 16

            [accumulator]
            max_tokens = 5
            policy = "accept_all"
            idle_commit_after_ms = 2500

            [session]
            commit_on_hands_down = true

            [assets]
            model = "/models/gloss.safetensors"
            labels = "/models/labels.json"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.admission.target_fps, 20.0);
        assert!(!config.admission.motion_detection);
        assert_eq!(config.features.window_frames, 24);
        assert_eq!(config.features.min_valid_frames, 16);
        assert_eq!(config.accumulator.max_tokens, 5);
        assert_eq!(config.accumulator.policy, TokenPolicyKind::AcceptAll);
        assert_eq!(config.accumulator.idle_commit_after_ms, Some(2500));
        assert!(config.session.commit_on_hands_down);
        assert_eq!(
            config.assets.model.as_deref(),
            Some(Path::new("/models/gloss.safetensors"))
        );
        assert_eq!(config.assets.scaler, None);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_temp(
            r#"
            [stability]
            min_stable_frames = 5
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.stability.min_stable_frames, 5);
        assert_eq!(config.stability.confidence_delta, 0.05);
        assert_eq!(config.features, FeatureConfig::default());
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_env_override_assets() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_signflow_env();

        set_env("SIGNFLOW_MODEL", "/tmp/model.safetensors");
        set_env("SIGNFLOW_LABELS", "/tmp/labels.txt");
        let config = Config::default().with_env_overrides();

        assert_eq!(
            config.assets.model,
            Some(PathBuf::from("/tmp/model.safetensors"))
        );
        assert_eq!(config.assets.labels, Some(PathBuf::from("/tmp/labels.txt")));
        assert_eq!(config.assets.scaler, None);

        clear_signflow_env();
    }

    #[test]
    fn test_env_override_preset() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_signflow_env();

        set_env("SIGNFLOW_PRESET", "high");
        let config = Config::default().with_env_overrides();
        assert_eq!(config.admission.target_fps, 30.0);
        assert!(!config.admission.motion_detection);

        set_env("SIGNFLOW_PRESET", "turbo");
        let config = Config::default().with_env_overrides();
        assert_eq!(config, Config::default());

        clear_signflow_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_signflow_env();

        set_env("SIGNFLOW_MODEL", "");
        let config = Config::default().with_env_overrides();
        assert_eq!(config.assets.model, None);

        clear_signflow_env();
    }

    #[test]
    fn test_presets_differ_and_balanced_restores_defaults() {
        let mut low = Config::default();
        PerformancePreset::Low.apply(&mut low);
        let mut high = Config::default();
        PerformancePreset::High.apply(&mut high);
        assert!(low.admission.target_fps < high.admission.target_fps);
        assert!(low.admission.max_frame_skip > high.admission.max_frame_skip);

        PerformancePreset::Balanced.apply(&mut low);
        assert_eq!(low, Config::default());
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("Low".parse::<PerformancePreset>().unwrap(), PerformancePreset::Low);
        assert_eq!(
            " balanced ".parse::<PerformancePreset>().unwrap(),
            PerformancePreset::Balanced
        );
        let err = "fast".parse::<PerformancePreset>().unwrap_err();
        assert!(err.to_string().contains("unknown preset 'fast'"));
    }

    #[test]
    fn test_validate_rejects_impossible_window() {
        let mut config = Config::default();
        config.features.min_valid_frames = 31;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("features.min_valid_frames"));

        let mut config = Config::default();
        config.accumulator.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_temp(
            r#"
            [features
            window_frames = "broken
        "#,
        );

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_get_value_by_path() {
        let mut config = Config::default();
        config.assets.model = Some(PathBuf::from("gloss.safetensors"));

        assert_eq!(config.get_value_by_path("stability.debounce_ms").unwrap(), "50");
        assert_eq!(
            config.get_value_by_path("stability.min_stable_frames").unwrap(),
            "3"
        );
        assert_eq!(config.get_value_by_path("assets.model").unwrap(), "gloss.safetensors");
        assert_eq!(
            config.get_value_by_path("accumulator.policy").unwrap(),
            "distinct_from_previous"
        );
        assert!(
            config
                .get_value_by_path("features")
                .unwrap()
                .contains("window_frames = 30")
        );

        let err = config.get_value_by_path("features.missing").unwrap_err();
        assert!(err.to_string().contains("no such key"));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_default_path_is_xdg_compliant() {
        let Some(path) = Config::default_path() else {
            return;
        };
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("signflow"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Config::load(&path).unwrap_err();
        match err.downcast_ref::<SignflowError>() {
            Some(SignflowError::ConfigFileNotFound { path: reported }) => {
                assert_eq!(reported, &path.display().to_string());
            }
            other => panic!("expected ConfigFileNotFound, got {other:?}"),
        }
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_load_or_default_errors_on_invalid_toml() {
        let temp_file = write_temp("[features\n");
        let err = Config::load_or_default(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_serializes_back_to_toml() {
        let mut config = Config::default();
        config.assets.model = Some(PathBuf::from("model.safetensors"));
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
