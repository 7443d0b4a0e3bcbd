// This module serves as the hub for the build-time half of the encoder core: the flag
// registry that assigns bit positions and word-aligned fields to named instruction flags,
// the fixed-capacity FlagBits bitset those positions index into, the arena-backed intern
// pool that deduplicates per-template flag sets into a dense table, and the shared error
// types. Everything here runs during a single sequential build pass; the frozen FlagTable
// it produces is immutable and safe to share between threads.

//! Flag registry, bitsets and the flag-set intern pool.
//!
//! # Key Components
//!
//! ## Registry (`registry`)
//! - Declaration-ordered bit assignment
//! - 32-bit aligned fields partitioning the bit space
//!
//! ## Bitsets (`bitset`)
//! - `FlagBits`, a `Copy` bitset of up to 8 words
//!
//! ## Intern pool (`interner`)
//! - Canonical-key deduplication of flag sets
//! - Contiguous, stable indices and a frozen `FlagTable`

pub mod bitset;
pub mod error;
pub mod interner;
pub mod registry;

pub use bitset::{FlagBit, FlagBits, MAX_FLAG_WORDS, WORD_BITS};
pub use error::{FlagError, FlagResult};
pub use interner::{canonical_key, FlagSetIndex, FlagSetInterner, FlagTable, InternStats, IGNORE_KEY};
pub use registry::{FlagDefinition, FlagField, FlagRegistry, RegistryBuilder};
