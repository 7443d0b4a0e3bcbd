//! x86 encoder core: instruction flag tables and EVEX compressed displacement.
//!
//! This crate holds the two bit-exact pieces of an x86 instruction encoder that
//! the rest of the assembler treats as opaque: the interned table of
//! instruction-eligibility flag sets, and the EVEX disp8*N calculator.
//!
//! # Primary Usage
//!
//! ```
//! use bumpalo::Bump;
//! use x86_encode_core::core::FlagSetInterner;
//! use x86_encode_core::x86::{compress, standard_registry, EvexDescriptor, TupleType, VectorLength};
//!
//! // Build phase: intern each template's flags, then freeze the table.
//! let arena = Bump::new();
//! let mut pool = FlagSetInterner::new(&arena, standard_registry());
//! let idx = pool.intern(["SSE", "LOCK"]).unwrap().unwrap();
//! assert_eq!(pool.intern(["LOCK", "SSE"]).unwrap(), Some(idx));
//! let table = pool.freeze();
//! assert!(table.has_flag(idx, standard_registry().bit("LOCK").unwrap()));
//!
//! // Encode phase: compress a displacement.
//! let desc = EvexDescriptor::new(TupleType::Fv, VectorLength::Vl512, false, false);
//! assert_eq!(compress(128, desc.scale_factor()), Some(2));
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Flag registry, bitsets, intern pool, errors
//! - [`x86`] - Standard x86 flags, CPU levels, EVEX disp8*N
//! - [`flaggen`] - Rust source generator for frozen flag tables

pub mod core;
pub mod flaggen;
pub mod x86;

pub use crate::core::{
    FlagBit, FlagBits, FlagError, FlagRegistry, FlagResult, FlagSetIndex, FlagSetInterner,
    FlagTable, RegistryBuilder,
};
pub use crate::x86::{compress, scale_factor, Displacement, EvexDescriptor, TupleType, VectorLength};
