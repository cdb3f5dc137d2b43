use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{EnrollError, Result};
use crate::common::paths::{local_config_file, system_config_file};
use crate::core::controller::{CapturePlan, CaptureTiming};
use crate::core::instruction::{default_instructions, Instruction};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_instructions")]
    pub instructions: Vec<Instruction>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            capture: CaptureConfig::default(),
            enrollment: EnrollmentConfig::default(),
            storage: StorageConfig::default(),
            instructions: default_instructions(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    /// 999 means auto-detect
    #[serde(default)]
    pub device_index: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_warmup_frames() -> u32 { 5 }
fn default_warmup_delay() -> u64 { 50 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: default_width(),
            height: default_height(),
            warmup_frames: default_warmup_frames(),
            warmup_delay_ms: default_warmup_delay(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_tick")]
    pub tick_ms: u64,
    #[serde(default = "default_cadence")]
    pub cadence_ms: u64,
    #[serde(default = "default_countdown")]
    pub countdown_secs: u32,
    #[serde(default = "default_target_count")]
    pub target_count: usize,
}

fn default_tick() -> u64 { 50 }
fn default_cadence() -> u64 { 200 }
fn default_countdown() -> u32 { 3 }
fn default_target_count() -> usize { 10 }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick(),
            cadence_ms: default_cadence(),
            countdown_secs: default_countdown(),
            target_count: default_target_count(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EnrollmentConfig {
    #[serde(default = "default_min_frames")]
    pub min_frames: usize,
    #[serde(default = "default_max_dimension")]
    pub max_image_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_true")]
    pub enable_ascii_preview: bool,
    #[serde(default)]
    pub ascii_width: Option<usize>,
    #[serde(default)]
    pub ascii_height: Option<usize>,
}

fn default_min_frames() -> usize { 5 }
fn default_max_dimension() -> u32 { 800 }
fn default_jpeg_quality() -> u8 { 90 }
fn default_true() -> bool { true }

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            min_frames: default_min_frames(),
            max_image_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            enable_ascii_preview: true,
            ascii_width: None,
            ascii_height: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub enrollment_dir: Option<PathBuf>,
}

impl Config {
    /// Load from the local or system config file, falling back to built-in
    /// defaults when neither exists.
    pub fn load() -> Result<Self> {
        for path in [local_config_file(), system_config_file()] {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        tracing::warn!("No config file found, using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EnrollError::InvalidConfig(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| EnrollError::InvalidConfig(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Validate camera dimensions
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(EnrollError::InvalidConfig(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(EnrollError::InvalidConfig(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }

        if self.enrollment.jpeg_quality == 0 || self.enrollment.jpeg_quality > 100 {
            return Err(EnrollError::InvalidConfig(format!(
                "JPEG quality must be between 1 and 100, got {}", self.enrollment.jpeg_quality
            )));
        }
        if self.enrollment.max_image_dimension == 0 {
            return Err(EnrollError::InvalidConfig(
                "max_image_dimension must be positive".into()
            ));
        }

        // Timing and instruction checks live with the plan
        self.capture_plan().map(|_| ())
    }

    pub fn capture_timing(&self) -> CaptureTiming {
        CaptureTiming {
            tick_ms: self.capture.tick_ms,
            cadence_ms: self.capture.cadence_ms,
            countdown_secs: self.capture.countdown_secs,
        }
    }

    pub fn capture_plan(&self) -> Result<CapturePlan> {
        CapturePlan::new(
            self.instructions.clone(),
            self.capture_timing(),
            self.capture.target_count,
        )
    }
}
