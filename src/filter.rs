use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::chunk::PagedBitStore;
use crate::config::{FilterConfig, FilterParams};
use crate::device::{BlockDevice, FileBlockDevice};
use crate::error::{FilterError, Result};
use crate::hash::derive_indices;
use crate::record::serialize_record;

/// Lifecycle of a [`PagedBloomFilter`]. The filter starts unopened, must be
/// opened before any record operation, and stays closed once closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Unopened,
    Open,
    Closed,
}

impl FilterState {
    fn as_str(self) -> &'static str {
        match self {
            FilterState::Unopened => "filter is unopened",
            FilterState::Open => "filter is already open",
            FilterState::Closed => "filter is closed",
        }
    }
}

/// Options for [`PagedBloomFilter::add_batch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Derive every record's positions first, deduplicate them, and set
    /// them with a single flush at the end. Much less I/O than one flush
    /// per record, but a crash mid-batch can leave any subset of the
    /// batch's bits on disk with no way to tell which.
    pub dangerously: bool,
}

/// A Bloom filter whose bit array is paged to a block device.
///
/// Records are serialized against the configured attribute schema and
/// hashed to `hash_count` bit positions. Membership tests can report false
/// positives at the configured rate but never false negatives for records
/// added through the same configuration.
pub struct PagedBloomFilter<D: BlockDevice = FileBlockDevice> {
    config: FilterConfig,
    params: FilterParams,
    store: PagedBitStore<D>,
    state: FilterState,
}

impl PagedBloomFilter<FileBlockDevice> {
    /// Builds a filter backed by the file named in the config. The file is
    /// not touched until [`open`](Self::open).
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        let params = FilterParams::from(&config);
        let device = FileBlockDevice::new(
            config.path.clone(),
            params.total_bytes as u64,
        );
        Ok(Self::assemble(config, params, device))
    }
}

impl<D: BlockDevice> PagedBloomFilter<D> {
    /// Builds a filter over a caller-supplied device. The device must span
    /// exactly the derived bit array size.
    pub fn with_device(config: FilterConfig, device: D) -> Result<Self> {
        config.validate()?;
        let params = FilterParams::from(&config);
        Ok(Self::assemble(config, params, device))
    }

    fn assemble(config: FilterConfig, params: FilterParams, device: D) -> Self {
        let store =
            PagedBitStore::new(device, params.total_bits, config.chunk_size_bytes);
        Self {
            config,
            params,
            store,
            state: FilterState::Unopened,
        }
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.state != FilterState::Open {
            return Err(FilterError::InvalidState {
                operation,
                state: self.state.as_str(),
            });
        }
        Ok(())
    }

    /// Acquires the backing store. Valid only once, from the unopened state.
    pub fn open(&mut self) -> Result<()> {
        if self.state != FilterState::Unopened {
            return Err(FilterError::InvalidState {
                operation: "open filter",
                state: self.state.as_str(),
            });
        }
        self.store.open()?;
        self.state = FilterState::Open;
        info!(
            "filter open: {} ({} bits, {} hashes, {} chunks)",
            self.config.path.display(),
            self.params.total_bits,
            self.params.hash_count,
            self.store.total_chunks()
        );
        Ok(())
    }

    /// Adds one record and flushes, making the add durable on return.
    pub fn add(&mut self, record: &Value) -> Result<()> {
        self.ensure_open("add record")?;
        let payload = serialize_record(record, &self.config.attributes)?;
        let indices =
            derive_indices(&payload, self.params.total_bits, self.params.hash_count);
        for index in indices {
            self.store.set_bit(index)?;
        }
        self.store.flush()
    }

    /// Adds a batch of records.
    ///
    /// By default each record is added like [`add`](Self::add): positions in
    /// derivation order, one flush per record, every record durable before
    /// the next starts. With [`BatchOptions::dangerously`] all positions are
    /// derived up front, deduplicated, set in ascending order (each chunk is
    /// loaded at most once) and flushed once at the end.
    pub fn add_batch(
        &mut self,
        records: &[Value],
        options: BatchOptions,
    ) -> Result<()> {
        self.ensure_open("add batch")?;

        if !options.dangerously {
            for record in records {
                self.add(record)?;
            }
            return Ok(());
        }

        let mut positions = BTreeSet::new();
        for record in records {
            let payload = serialize_record(record, &self.config.attributes)?;
            positions.extend(derive_indices(
                &payload,
                self.params.total_bits,
                self.params.hash_count,
            ));
        }
        debug!(
            "batch add: {} records, {} distinct bits",
            records.len(),
            positions.len()
        );

        for index in positions {
            self.store.set_bit(index)?;
        }
        self.store.flush()
    }

    /// Tests a record for membership: false means definitely never added,
    /// true means possibly added. Takes `&mut self` because probing may
    /// swap the resident chunk.
    pub fn test(&mut self, record: &Value) -> Result<bool> {
        self.ensure_open("test record")?;
        let payload = serialize_record(record, &self.config.attributes)?;
        let indices =
            derive_indices(&payload, self.params.total_bits, self.params.hash_count);
        for index in indices {
            if !self.store.test_bit(index)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Flushes pending changes and releases the backing store. Closing a
    /// closed filter is a no-op; closing an unopened one is an error, since
    /// there is nothing to release.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            FilterState::Open => {
                self.store.close()?;
                self.state = FilterState::Closed;
                info!("filter closed: {}", self.config.path.display());
                Ok(())
            }
            FilterState::Closed => Ok(()),
            FilterState::Unopened => Err(FilterError::InvalidState {
                operation: "close filter",
                state: self.state.as_str(),
            }),
        }
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn total_bits(&self) -> usize {
        self.params.total_bits
    }

    pub fn hash_count(&self) -> usize {
        self.params.hash_count
    }

    pub fn total_chunks(&self) -> usize {
        self.store.total_chunks()
    }
}

impl<D: BlockDevice> Drop for PagedBloomFilter<D> {
    fn drop(&mut self) {
        if self.state == FilterState::Open
            && let Err(err) = self.store.close()
        {
            error!("Error closing filter on drop: {}", err);
        }
    }
}
