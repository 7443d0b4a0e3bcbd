//! x86-specific components.
//!
//! This module contains the x86 side of the encoder core:
//! - The standard instruction flag declarations and CPU-level logic
//! - EVEX disp8*N scale factors and displacement compression

pub mod evex;
pub mod iflags;

pub use evex::{compress, scale_factor, Displacement, EvexDescriptor, TupleType, VectorLength};
pub use iflags::{build_registry, standard_registry, CpuLevels, CpuSelection, Decl, STANDARD_DECLS};
