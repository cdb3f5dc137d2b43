use std::path::PathBuf;
use std::fs;
use crate::common::error::Result;

#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        // Create dev directories if in dev mode
        if enabled {
            fs::create_dir_all(&base_dir)?;
            fs::create_dir_all(base_dir.join("enrollment"))?;
            fs::create_dir_all(base_dir.join("captures"))?;

            println!("📁 Development mode enabled - data will be saved to: {}",
                     base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enrollment output directory, only defined in dev mode.
    pub fn enrollment_dir(&self) -> Option<PathBuf> {
        self.enabled.then(|| self.base_dir.join("enrollment"))
    }

    pub fn captures_dir(&self) -> Option<PathBuf> {
        self.enabled.then(|| self.base_dir.join("captures"))
    }

    pub fn get_capture_path(&self, prefix: &str) -> PathBuf {
        match self.captures_dir() {
            Some(dir) => {
                let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
                dir.join(format!("{}_{}.jpg", prefix, timestamp))
            }
            // In production mode, use current directory
            None => PathBuf::from(format!("{}.jpg", prefix)),
        }
    }
}
