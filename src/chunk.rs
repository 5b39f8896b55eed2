use bitvec::{order::Lsb0, view::BitView};
use tracing::debug;

use crate::device::BlockDevice;
use crate::error::{FilterError, Result};

/// The single cached chunk of the bit file.
enum ChunkState {
    Empty,
    Resident {
        index: usize,
        bytes: Vec<u8>,
        dirty: bool,
    },
}

/// A logical array of `total_bits` bits paged to a block device in
/// fixed-size byte chunks.
///
/// Exactly one chunk is resident at a time. Bit reads and writes load the
/// owning chunk on demand, writing the outgoing chunk back first when it
/// carries unflushed changes. Alternating between bits of two different
/// chunks therefore reloads on every access; callers that can batch should
/// touch bits in ascending order.
///
/// Bit `i` lives in byte `i / 8` of the device, at bit `i % 8` counted from
/// the least significant bit.
pub struct PagedBitStore<D: BlockDevice> {
    device: D,
    total_bits: usize,
    total_bytes: usize,
    chunk_size: usize,
    state: ChunkState,
}

impl<D: BlockDevice> PagedBitStore<D> {
    /// `chunk_size` is the paging granularity in bytes and must be positive.
    pub fn new(device: D, total_bits: usize, chunk_size: usize) -> Self {
        Self {
            device,
            total_bits,
            total_bytes: total_bits.div_ceil(8),
            chunk_size,
            state: ChunkState::Empty,
        }
    }

    pub fn open(&mut self) -> Result<()> {
        self.device.open()
    }

    pub fn total_bits(&self) -> usize {
        self.total_bits
    }

    pub fn total_chunks(&self) -> usize {
        self.total_bytes.div_ceil(self.chunk_size)
    }

    /// Splits a logical bit index into (chunk index, bit offset inside the
    /// chunk), failing before any I/O when the index is past the bit array.
    fn locate(&self, index: usize) -> Result<(usize, usize)> {
        if index >= self.total_bits {
            return Err(FilterError::IndexOutOfBounds {
                index,
                total_bits: self.total_bits,
            });
        }
        let byte_index = index / 8;
        let chunk_index = byte_index / self.chunk_size;
        let local_bit = (byte_index % self.chunk_size) * 8 + index % 8;
        Ok((chunk_index, local_bit))
    }

    /// Makes `chunk_index` the resident chunk. The outgoing chunk is
    /// flushed first if dirty; the final chunk of the file may be shorter
    /// than the configured chunk size.
    fn ensure_resident(&mut self, chunk_index: usize) -> Result<()> {
        if let ChunkState::Resident { index, .. } = &self.state
            && *index == chunk_index
        {
            return Ok(());
        }

        self.flush()?;

        let offset = chunk_index * self.chunk_size;
        let length = self.chunk_size.min(self.total_bytes - offset);
        let bytes = self.device.read_range(offset as u64, length)?;
        debug!("chunk {} resident ({} bytes)", chunk_index, length);

        self.state = ChunkState::Resident {
            index: chunk_index,
            bytes,
            dirty: false,
        };
        Ok(())
    }

    pub fn set_bit(&mut self, index: usize) -> Result<()> {
        let (chunk_index, local_bit) = self.locate(index)?;
        self.ensure_resident(chunk_index)?;

        match &mut self.state {
            ChunkState::Resident { bytes, dirty, .. } => {
                bytes.view_bits_mut::<Lsb0>().set(local_bit, true);
                *dirty = true;
                Ok(())
            }
            ChunkState::Empty => Err(FilterError::InvalidState {
                operation: "set bit",
                state: "no chunk is resident",
            }),
        }
    }

    pub fn test_bit(&mut self, index: usize) -> Result<bool> {
        let (chunk_index, local_bit) = self.locate(index)?;
        self.ensure_resident(chunk_index)?;

        match &self.state {
            ChunkState::Resident { bytes, .. } => {
                Ok(bytes.view_bits::<Lsb0>()[local_bit])
            }
            ChunkState::Empty => Err(FilterError::InvalidState {
                operation: "test bit",
                state: "no chunk is resident",
            }),
        }
    }

    /// Writes the resident chunk back if it carries unflushed changes.
    /// A failed write leaves the dirty flag set, so the next flush retries.
    pub fn flush(&mut self) -> Result<()> {
        if let ChunkState::Resident {
            index,
            bytes,
            dirty,
        } = &mut self.state
            && *dirty
        {
            let offset = (*index * self.chunk_size) as u64;
            self.device.write_range(offset, bytes)?;
            *dirty = false;
            debug!("chunk {} flushed ({} bytes)", index, bytes.len());
        }
        Ok(())
    }

    /// Flushes and releases the device. The cached chunk is discarded, so a
    /// reopened store reloads from the device.
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.state = ChunkState::Empty;
        self.device.close()
    }
}
