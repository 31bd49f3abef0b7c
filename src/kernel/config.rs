use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::error::CoreError;

/// Application settings. Every field has a default, so an empty TOML file
/// (or no file at all) yields a working configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    pub local_llm_base_url: String,
    pub local_llm_model_fast: String,
    pub local_llm_model_quality: String,

    /// Tried in order; entries without an api key are skipped.
    pub cloud_providers: Vec<CloudProviderSettings>,

    pub generation: GenerationSettings,
    pub gaze: GazeSettings,
    pub blink: BlinkSettings,

    pub tts_default_speaker: String,
    pub tts_command: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudProviderSettings {
    pub name: String,
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub num_candidates: usize,
    pub max_tokens: u32,
    pub stage1_timeout_ms: u64,
    pub stage2_timeout_ms: u64,
    pub stage3_timeout_ms: u64,
    pub stage1_temperature: f32,
    pub stage2_temperature: f32,
    pub stage3_temperature: f32,
}

impl GenerationSettings {
    pub fn stage1_timeout(&self) -> Duration {
        Duration::from_millis(self.stage1_timeout_ms)
    }

    pub fn stage2_timeout(&self) -> Duration {
        Duration::from_millis(self.stage2_timeout_ms)
    }

    pub fn stage3_timeout(&self) -> Duration {
        Duration::from_millis(self.stage3_timeout_ms)
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            num_candidates: 4,
            max_tokens: 200,
            stage1_timeout_ms: 300,
            stage2_timeout_ms: 600,
            stage3_timeout_ms: 2000,
            stage1_temperature: 0.4,
            stage2_temperature: 0.5,
            stage3_temperature: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GazeSettings {
    pub num_zones: usize,
    pub hysteresis_margin: f32,
    /// Symmetric yaw range in degrees mapped onto screen x.
    pub yaw_range_deg: f32,
    /// Symmetric pitch range in degrees mapped onto screen y.
    pub pitch_range_deg: f32,
    pub process_noise: f32,
    pub measurement_noise: f32,
    pub saccade_threshold: f32,
    pub saccade_noise_multiplier: f32,
}

impl Default for GazeSettings {
    fn default() -> Self {
        Self {
            num_zones: 4,
            hysteresis_margin: 0.05,
            yaw_range_deg: 30.0,
            pitch_range_deg: 20.0,
            process_noise: 0.1,
            measurement_noise: 1.0,
            saccade_threshold: 15.0,
            saccade_noise_multiplier: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlinkSettings {
    pub ear_threshold: f32,
    pub min_blink_duration_ms: u64,
    pub max_blink_duration_ms: u64,
    pub long_blink_duration_ms: u64,
    pub double_blink_window_ms: u64,
}

impl Default for BlinkSettings {
    fn default() -> Self {
        Self {
            ear_threshold: 0.21,
            min_blink_duration_ms: 100,
            max_blink_duration_ms: 500,
            long_blink_duration_ms: 800,
            double_blink_window_ms: 600,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            local_llm_base_url: "http://127.0.0.1:8000/v1".to_string(),
            local_llm_model_fast: "Qwen/Qwen3-0.6B".to_string(),
            local_llm_model_quality: "Qwen/Qwen3-1.7B".to_string(),
            cloud_providers: Vec::new(),
            generation: GenerationSettings::default(),
            gaze: GazeSettings::default(),
            blink: BlinkSettings::default(),
            tts_default_speaker: "default".to_string(),
            tts_command: "say".to_string(),
        }
    }
}

const ENV_PREFIX: &str = "VOICEREACH_";

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, CoreError> {
        let settings: Self = toml::from_str(text).map_err(|e| CoreError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values that would make gaze normalization divide by zero.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (key, range) in [
            ("gaze.yaw_range_deg", self.gaze.yaw_range_deg),
            ("gaze.pitch_range_deg", self.gaze.pitch_range_deg),
        ] {
            if !(range > 0.0) {
                return Err(CoreError::Config(format!("{} must be positive, got {}", key, range)));
            }
        }
        Ok(())
    }

    /// Reads `path` if it exists, then applies `VOICEREACH_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut settings = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)
                    .map_err(|e| CoreError::Config(format!("{}: {}", p.display(), e)))?;
                Self::from_toml_str(&text)?
            }
            _ => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies scalar overrides from `lookup` (keys without the prefix, upper case).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.port = parse_override("PORT", &v)?;
        }
        if let Some(v) = lookup("LOCAL_LLM_BASE_URL") {
            self.local_llm_base_url = v;
        }
        if let Some(v) = lookup("LOCAL_LLM_MODEL_FAST") {
            self.local_llm_model_fast = v;
        }
        if let Some(v) = lookup("LOCAL_LLM_MODEL_QUALITY") {
            self.local_llm_model_quality = v;
        }
        if let Some(v) = lookup("NUM_CANDIDATES") {
            self.generation.num_candidates = parse_override("NUM_CANDIDATES", &v)?;
        }
        if let Some(v) = lookup("NUM_ZONES") {
            self.gaze.num_zones = parse_override("NUM_ZONES", &v)?;
        }
        if let Some(v) = lookup("STAGE1_TIMEOUT_MS") {
            self.generation.stage1_timeout_ms = parse_override("STAGE1_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("STAGE2_TIMEOUT_MS") {
            self.generation.stage2_timeout_ms = parse_override("STAGE2_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("STAGE3_TIMEOUT_MS") {
            self.generation.stage3_timeout_ms = parse_override("STAGE3_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("TTS_DEFAULT_SPEAKER") {
            self.tts_default_speaker = v;
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CoreError> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("{}{}: cannot parse '{}'", ENV_PREFIX, key, value)))
}
