use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::error::{FilterError, Result};

/// Byte-range access to a filter's backing store.
///
/// The filter owns its device exclusively; ranges are validated against the
/// device length before any transfer happens.
pub trait BlockDevice {
    /// Acquires the backing resource, creating it zero-filled when absent.
    fn open(&mut self) -> Result<()>;
    /// Reads exactly `length` bytes starting at `offset`.
    fn read_range(&mut self, offset: u64, length: usize) -> Result<Vec<u8>>;
    /// Writes `bytes` starting at `offset`.
    fn write_range(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;
    /// Releases the backing resource. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Flat-file device of a fixed length.
///
/// On first open the file is created zero-filled at exactly `len_bytes`,
/// creating parent directories as needed. Reopening an existing file checks
/// its length against `len_bytes`: the file is headerless, so a length
/// mismatch is the only way to tell that the caller's parameters do not
/// describe it.
pub struct FileBlockDevice {
    path: PathBuf,
    len_bytes: u64,
    file: Option<fs::File>,
}

impl FileBlockDevice {
    pub fn new(path: PathBuf, len_bytes: u64) -> Self {
        Self {
            path,
            len_bytes,
            file: None,
        }
    }

    fn check_range(&self, offset: u64, length: usize) -> Result<()> {
        if offset.saturating_add(length as u64) > self.len_bytes {
            return Err(FilterError::RangeOutOfBounds {
                offset,
                length,
                len_bytes: self.len_bytes,
            });
        }
        Ok(())
    }
}

impl BlockDevice for FileBlockDevice {
    fn open(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = if self.path.exists() {
            let file =
                OpenOptions::new().read(true).write(true).open(&self.path)?;
            let actual = file.metadata()?.len();
            if actual != self.len_bytes {
                return Err(FilterError::FileLengthMismatch {
                    expected: self.len_bytes,
                    actual,
                });
            }
            debug!("opened bit file {} ({} bytes)", self.path.display(), actual);
            file
        } else {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&self.path)?;
            file.set_len(self.len_bytes)?;
            debug!(
                "created bit file {} ({} bytes)",
                self.path.display(),
                self.len_bytes
            );
            file
        };

        self.file = Some(file);
        Ok(())
    }

    fn read_range(&mut self, offset: u64, length: usize) -> Result<Vec<u8>> {
        self.check_range(offset, length)?;
        let Some(file) = self.file.as_mut() else {
            return Err(FilterError::InvalidState {
                operation: "read range",
                state: "device is closed",
            });
        };

        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = vec![0u8; length];
        file.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn write_range(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.check_range(offset, bytes.len())?;
        let Some(file) = self.file.as_mut() else {
            return Err(FilterError::InvalidState {
                operation: "write range",
                state: "device is closed",
            });
        };

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            debug!("closed bit file {}", self.path.display());
        }
        Ok(())
    }
}

/// In-memory device for tests and benchmarks. Counts the reads and writes
/// the paging layer issues.
pub struct MemoryBlockDevice {
    bytes: Vec<u8>,
    open: bool,
    pub reads: usize,
    pub writes: usize,
}

impl MemoryBlockDevice {
    pub fn new(len_bytes: usize) -> Self {
        Self {
            bytes: vec![0; len_bytes],
            open: false,
            reads: 0,
            writes: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn check_range(&self, offset: u64, length: usize) -> Result<()> {
        if offset.saturating_add(length as u64) > self.bytes.len() as u64 {
            return Err(FilterError::RangeOutOfBounds {
                offset,
                length,
                len_bytes: self.bytes.len() as u64,
            });
        }
        Ok(())
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if !self.open {
            return Err(FilterError::InvalidState {
                operation,
                state: "device is closed",
            });
        }
        Ok(())
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn read_range(&mut self, offset: u64, length: usize) -> Result<Vec<u8>> {
        self.check_range(offset, length)?;
        self.ensure_open("read range")?;
        self.reads += 1;
        let start = offset as usize;
        Ok(self.bytes[start..start + length].to_vec())
    }

    fn write_range(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.check_range(offset, bytes.len())?;
        self.ensure_open("write range")?;
        self.writes += 1;
        let start = offset as usize;
        self.bytes[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_device(len_bytes: u64) -> (FileBlockDevice, PathBuf) {
        let path: PathBuf =
            format!("test_device_{}.bin", rand::random::<u64>()).into();
        (FileBlockDevice::new(path.clone(), len_bytes), path)
    }

    fn cleanup(path: &PathBuf) {
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_create_zero_filled_exact_length() {
        let (mut device, path) = temp_device(100);
        device.open().unwrap();

        assert_eq!(
            fs::metadata(&path).unwrap().len(),
            100,
            "File must be created at exactly the target length"
        );
        assert_eq!(
            device.read_range(0, 100).unwrap(),
            vec![0u8; 100],
            "A fresh file must read back as all zeros"
        );

        device.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_write_read_round_trip() {
        let (mut device, path) = temp_device(64);
        device.open().unwrap();

        device.write_range(10, &[1, 2, 3]).unwrap();
        assert_eq!(device.read_range(10, 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            device.read_range(9, 5).unwrap(),
            vec![0, 1, 2, 3, 0],
            "Surrounding bytes must stay zero"
        );

        device.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_reopen_preserves_content() {
        let path: PathBuf =
            format!("test_device_{}.bin", rand::random::<u64>()).into();

        {
            let mut device = FileBlockDevice::new(path.clone(), 32);
            device.open().unwrap();
            device.write_range(0, &[0xAB; 8]).unwrap();
            device.close().unwrap();
        }

        {
            let mut device = FileBlockDevice::new(path.clone(), 32);
            device.open().unwrap();
            assert_eq!(device.read_range(0, 8).unwrap(), vec![0xAB; 8]);
            device.close().unwrap();
        }

        cleanup(&path);
    }

    #[test]
    fn test_reopen_rejects_wrong_length() {
        let (mut device, path) = temp_device(32);
        device.open().unwrap();
        device.close().unwrap();

        let mut wrong = FileBlockDevice::new(path.clone(), 64);
        let result = wrong.open();
        assert!(
            matches!(
                result,
                Err(FilterError::FileLengthMismatch {
                    expected: 64,
                    actual: 32
                })
            ),
            "Opening with mismatched length must fail, got: {result:?}"
        );

        cleanup(&path);
    }

    #[test]
    fn test_range_validation() {
        let (mut device, path) = temp_device(16);
        device.open().unwrap();

        assert!(matches!(
            device.read_range(10, 7),
            Err(FilterError::RangeOutOfBounds { .. })
        ));
        assert!(matches!(
            device.write_range(16, &[1]),
            Err(FilterError::RangeOutOfBounds { .. })
        ));
        assert!(device.read_range(10, 6).is_ok());

        device.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_closed_device_rejects_access() {
        let (mut device, path) = temp_device(16);
        device.open().unwrap();
        device.close().unwrap();

        assert!(matches!(
            device.read_range(0, 1),
            Err(FilterError::InvalidState { .. })
        ));
        assert!(matches!(
            device.write_range(0, &[1]),
            Err(FilterError::InvalidState { .. })
        ));

        cleanup(&path);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut device, path) = temp_device(16);
        device.open().unwrap();
        device.close().unwrap();
        device.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir: PathBuf = format!("test_device_dir_{}", rand::random::<u64>()).into();
        let path = dir.join("nested").join("filter.bin");

        let mut device = FileBlockDevice::new(path.clone(), 8);
        device.open().unwrap();
        assert!(path.exists(), "Parent directories must be created on open");
        device.close().unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_memory_device_round_trip_and_counters() {
        let mut device = MemoryBlockDevice::new(32);
        device.open().unwrap();

        device.write_range(4, &[7, 8]).unwrap();
        assert_eq!(device.read_range(4, 2).unwrap(), vec![7, 8]);
        assert_eq!(device.writes, 1);
        assert_eq!(device.reads, 1);
        assert_eq!(device.as_bytes()[4], 7);

        assert!(matches!(
            device.read_range(31, 2),
            Err(FilterError::RangeOutOfBounds { .. })
        ));

        device.close().unwrap();
        assert!(matches!(
            device.write_range(0, &[1]),
            Err(FilterError::InvalidState { .. })
        ));
    }
}
