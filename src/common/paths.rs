use std::path::PathBuf;

// System-wide locations. Per-user and dev-mode locations are resolved by
// DevMode and EnrollmentStore.

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/guided-enroll/guided-enroll.toml")
}

pub fn local_config_file() -> PathBuf {
    PathBuf::from("configs/guided-enroll.toml")
}

pub fn system_enrollment_dir() -> PathBuf {
    PathBuf::from("/var/lib/guided-enroll/enrollment")
}
