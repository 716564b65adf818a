use tempfile::TempDir;

use crate::fs::{FlatFs, Geometry, DEFAULT_IMAGE_PATH, DEFAULT_IMAGE_SIZE};

/// format a fresh default-sized image inside a temporary directory,
/// the directory (and the image) is removed when the returned [TempDir] is dropped
pub fn init_test_environment() -> (TempDir, FlatFs) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let geometry = Geometry::new(DEFAULT_IMAGE_SIZE).expect("Failed to compute geometry");
    let fs = FlatFs::format(dir.path().join(DEFAULT_IMAGE_PATH), geometry)
        .expect("Failed to format test image");
    (dir, fs)
}
