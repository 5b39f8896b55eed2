use std::{fs, path::PathBuf};

/// Structure to manage temporary filter files that are automatically cleaned up
pub struct TestFile {
    path: PathBuf,
}

impl TestFile {
    /// Create a new test file with a name based on the test name
    pub fn new(test_name: &str) -> Self {
        let path = format!("test_filter_{}.bin", test_name).into();
        Self { path }
    }

    /// Get a clone of the file path
    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }
}

impl Drop for TestFile {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}
