//! Disk-resident Bloom filter that pages its bit array through fixed-size
//! chunks, keeping at most one chunk in memory at a time.
//!
//! This crate provides a Bloom filter sized far beyond available RAM: the
//! bit array lives in a headerless file and operations fault in only the
//! chunk they touch.
//!
//! HowTo:
//!    * Sizing: pick expected element count n and target false positive
//!      rate p; the filter derives m = ceil(-n*ln(p)/ln(2)^2) bits and
//!      k = round((m/n)*ln(2)) hash functions.
//!    * Records: elements are JSON records projected onto a fixed attribute
//!      schema (declared order, missing attributes become null), so the
//!      same logical record always hashes identically.
//!    * Paging: the file is split into fixed-size chunks; touching a bit in
//!      a non-resident chunk flushes the current chunk (if dirty) and loads
//!      the needed one.
//!
//! Add:
//!     * Serialize the record against the schema, derive k bit positions
//!       from one SHA-256 digest, set them, flush. Durable on return.
//!     * add_batch with the dangerous flag dedups all positions first and
//!       flushes once, trading crash atomicity for far fewer writes.
//! Test:
//!     * Probe the k positions in ascending order and stop at the first
//!       unset bit. False means definitely never added.
//!
//! Obvious problems:
//!     * Alternating between records that live in different chunks reloads
//!       a chunk per operation; sort or batch by locality when you can.
//!     * The file is headerless. Opening it with different sizing
//!       parameters silently gives garbage answers; only the byte length
//!       is checked.
//!     * False positives happen at roughly the configured rate once the
//!       filter holds n elements, and grow past it if you keep adding.

mod chunk;
pub mod common;
mod config;
mod device;
mod error;
mod filter;
mod hash;
mod record;

pub use chunk::PagedBitStore;
pub use config::{
    DEFAULT_CHUNK_SIZE_BYTES, FilterConfig, FilterConfigBuilder,
    FilterConfigBuilderError, FilterParams,
};
pub use device::{BlockDevice, FileBlockDevice, MemoryBlockDevice};
pub use error::{FilterError, Result};
pub use filter::{BatchOptions, FilterState, PagedBloomFilter};
pub use hash::{
    calculate_parameters, derive_indices, optimal_bit_vector_size,
    optimal_num_hashes,
};
pub use record::serialize_record;
