use crate::common::config::{EnrollmentConfig, StorageConfig};
use crate::common::dev_mode::DevMode;
use crate::common::error::{EnrollError, Result};
use crate::common::paths::system_enrollment_dir;
use crate::core::instruction::Pose;
use crate::core::session::CapturedFrame;
use directories::ProjectDirs;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

const STORAGE_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "manifest.json";

/// Minimum number of selected frames a completed capture needs before it
/// may be submitted. Applied by callers after capture, never by the core.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionPolicy {
    pub min_frames: usize,
}

impl SubmissionPolicy {
    pub fn new(min_frames: usize) -> Self {
        Self { min_frames }
    }

    pub fn check(&self, selected: usize) -> Result<()> {
        if selected < self.min_frames {
            return Err(EnrollError::InsufficientFrames {
                selected,
                required: self.min_frames,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Longest side of written images; larger frames are downscaled.
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl From<&EnrollmentConfig> for ExportOptions {
    fn from(config: &EnrollmentConfig) -> Self {
        Self {
            max_dimension: config.max_image_dimension,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub file: String,
    pub pose: Pose,
    pub offset_ms: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub version: u32,
    pub username: String,
    pub created_at: String,
    /// Raw frames buffered during capture, before selection.
    pub frames_captured: usize,
    pub frames: Vec<FrameEntry>,
}

pub struct EnrollmentStore {
    root: PathBuf,
}

impl EnrollmentStore {
    pub fn new_with_paths(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn new_with_dev_mode(dev_mode: &DevMode, storage: &StorageConfig) -> Result<Self> {
        let root = if let Some(dir) = dev_mode.enrollment_dir() {
            tracing::debug!("EnrollmentStore using dev directory: {:?}", dir);
            dir
        } else if let Some(dir) = &storage.enrollment_dir {
            dir.clone()
        } else {
            ProjectDirs::from("com", "guided-enroll", "GuidedEnroll")
                .map(|dirs| dirs.data_dir().join("enrollment"))
                .unwrap_or_else(system_enrollment_dir)
        };

        Self::new_with_paths(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_dir(&self, username: &str) -> Result<PathBuf> {
        // Dot-prefixed names are reserved for staging directories
        let valid = !username.is_empty()
            && !username.starts_with('.')
            && !username.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
        if !valid {
            return Err(EnrollError::Storage(format!("Invalid username: {:?}", username)));
        }
        Ok(self.root.join(username))
    }

    /// Write the selected frames and their manifest, replacing any earlier
    /// enrollment of the same user. The previous enrollment is only removed
    /// once the new one is complete on disk.
    pub fn save(
        &self,
        username: &str,
        frames: &[CapturedFrame<DynamicImage>],
        frames_captured: usize,
        options: ExportOptions,
    ) -> Result<EnrollmentRecord> {
        let user_dir = self.user_dir(username)?;
        let staging = self.root.join(format!(".{}.tmp", username));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let record = match write_enrollment(&staging, username, frames, frames_captured, options) {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    tracing::warn!("Could not remove staging dir {}: {}", staging.display(), cleanup);
                }
                return Err(e);
            }
        };

        if user_dir.exists() {
            fs::remove_dir_all(&user_dir)?;
        }
        fs::rename(&staging, &user_dir)?;

        tracing::info!(
            "Saved {} enrollment frames for '{}' to {}",
            record.frames.len(), username, user_dir.display()
        );
        Ok(record)
    }

    pub fn load_record(&self, username: &str) -> Result<EnrollmentRecord> {
        let manifest = self.user_dir(username)?.join(MANIFEST_FILE);
        if !manifest.exists() {
            return Err(EnrollError::UserNotFound(username.to_string()));
        }

        let data = fs::read(manifest)?;
        let record: EnrollmentRecord = serde_json::from_slice(&data)?;
        if record.version > STORAGE_VERSION {
            return Err(EnrollError::Storage(format!(
                "Manifest version {} is newer than supported {}", record.version, STORAGE_VERSION
            )));
        }
        Ok(record)
    }
}

fn write_enrollment(
    dir: &Path,
    username: &str,
    frames: &[CapturedFrame<DynamicImage>],
    frames_captured: usize,
    options: ExportOptions,
) -> Result<EnrollmentRecord> {
    let mut entries = Vec::with_capacity(frames.len());
    for (i, captured) in frames.iter().enumerate() {
        let bytes = encode_jpeg(&captured.frame, options)?;
        let file = format!("frame_{:02}_{}.jpg", i, captured.pose);
        fs::write(dir.join(&file), &bytes)?;

        entries.push(FrameEntry {
            file,
            pose: captured.pose,
            offset_ms: captured.offset_ms,
            sha256: format!("{:x}", Sha256::digest(&bytes)),
        });
    }

    let record = EnrollmentRecord {
        version: STORAGE_VERSION,
        username: username.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        frames_captured,
        frames: entries,
    };

    let manifest = serde_json::to_vec_pretty(&record)?;
    fs::write(dir.join(MANIFEST_FILE), manifest)?;
    Ok(record)
}

fn encode_jpeg(frame: &DynamicImage, options: ExportOptions) -> Result<Vec<u8>> {
    let max = options.max_dimension;
    let rgb = if frame.width() > max || frame.height() > max {
        frame.resize(max, max, FilterType::Triangle).to_rgb8()
    } else {
        frame.to_rgb8()
    };

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, options.jpeg_quality).encode_image(&rgb)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{SyntheticSource, VideoSource};

    fn frames(n: usize, width: u32, height: u32) -> Vec<CapturedFrame<DynamicImage>> {
        let mut source = SyntheticSource::new(width, height);
        (0..n)
            .map(|i| CapturedFrame {
                frame: source.try_snapshot().unwrap(),
                pose: if i % 2 == 0 { Pose::Center } else { Pose::Left },
                offset_ms: (i as u64 + 1) * 200,
                sequence: i,
            })
            .collect()
    }

    fn options() -> ExportOptions {
        ExportOptions { max_dimension: 64, jpeg_quality: 80 }
    }

    #[test]
    fn policy_requires_minimum() {
        let policy = SubmissionPolicy::new(5);
        assert!(policy.check(5).is_ok());
        assert!(matches!(
            policy.check(3),
            Err(EnrollError::InsufficientFrames { selected: 3, required: 5 })
        ));
    }

    #[test]
    fn save_writes_frames_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::new_with_paths(tmp.path().to_path_buf()).unwrap();

        let record = store.save("alice", &frames(3, 128, 72), 13, options()).unwrap();
        assert_eq!(record.frames.len(), 3);
        assert_eq!(record.frames_captured, 13);
        assert_eq!(record.frames[1].file, "frame_01_left.jpg");
        assert_eq!(record.frames[2].offset_ms, 600);

        let written = image::open(tmp.path().join("alice").join("frame_00_center.jpg")).unwrap();
        assert_eq!((written.width(), written.height()), (64, 36));

        let bytes = fs::read(tmp.path().join("alice").join("frame_00_center.jpg")).unwrap();
        assert_eq!(record.frames[0].sha256, format!("{:x}", Sha256::digest(&bytes)));

        assert_eq!(store.load_record("alice").unwrap(), record);
    }

    #[test]
    fn re_enrollment_replaces_previous_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::new_with_paths(tmp.path().to_path_buf()).unwrap();

        store.save("bob", &frames(4, 32, 32), 4, options()).unwrap();
        store.save("bob", &frames(2, 32, 32), 2, options()).unwrap();

        let files = fs::read_dir(tmp.path().join("bob")).unwrap().count();
        assert_eq!(files, 3); // two frames + manifest
    }

    #[test]
    fn failed_save_keeps_previous_enrollment() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::new_with_paths(tmp.path().to_path_buf()).unwrap();
        let previous = store.save("carol", &frames(3, 32, 32), 3, options()).unwrap();

        // Wider than JPEG allows, so encoding fails after the first good frame
        let mut bad = frames(2, 32, 32);
        bad[1].frame = DynamicImage::new_rgb8(70_000, 1);
        let wide = ExportOptions { max_dimension: 100_000, jpeg_quality: 80 };

        assert!(matches!(store.save("carol", &bad, 2, wide), Err(EnrollError::Image(_))));
        assert_eq!(store.load_record("carol").unwrap(), previous);

        let entries: Vec<_> = fs::read_dir(store.root()).unwrap().collect();
        assert_eq!(entries.len(), 1, "staging directory left behind");
        assert_eq!(fs::read_dir(store.root().join("carol")).unwrap().count(), 4);
    }

    #[test]
    fn unknown_user_and_bad_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::new_with_paths(tmp.path().to_path_buf()).unwrap();

        assert!(matches!(store.load_record("nobody"), Err(EnrollError::UserNotFound(_))));
        assert!(store.user_dir("../escape").is_err());
        assert!(store.user_dir("").is_err());
        assert!(store.user_dir(".carol.tmp").is_err());
    }
}
