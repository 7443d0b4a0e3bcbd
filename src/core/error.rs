// This module defines error types for the flag registry, the flag-set interner and the
// table generator using the thiserror crate. FlagError is the main error enum covering
// build-time configuration failures: malformed or duplicate flag and field names, empty or unterminated
// fields, running out of bitset capacity, flag sets that reference undeclared flags,
// unknown CPU names, malformed declaration/template listings and I/O failures while
// reading them. Each variant carries the offending name, key or line number so a broken
// table can be fixed from the message alone. FlagResult<T> is the convenience alias.
// Displacement compression is not represented here: "not representable" is an ordinary
// `None` the encoder falls back from, never an error.

//! Error types for flag table construction.
//!
//! Using thiserror for idiomatic error handling.

use thiserror::Error;

/// Main error type for building flag registries and interned tables.
#[derive(Error, Debug)]
pub enum FlagError {
    #[error("Flag declared twice: {name}")]
    DuplicateFlag {
        name: String,
    },

    #[error("Invalid flag name \"{name}\": use uppercase letters, digits and '_'")]
    InvalidName {
        name: String,
    },

    #[error("Field declared twice: {name}")]
    DuplicateField {
        name: String,
    },

    #[error("Field {name} closed without any flags")]
    EmptyField {
        name: String,
    },

    #[error("{pending} flag(s) declared after the last field boundary")]
    UnterminatedField {
        pending: usize,
    },

    #[error("Flag bit {bits} exceeds bitset capacity of {capacity} bits")]
    CapacityExceeded {
        bits: u32,
        capacity: u32,
    },

    #[error("Unknown flag {name} in flag set \"{key}\"")]
    UnknownFlag {
        name: String,
        key: String,
    },

    #[error("Unknown CPU: {name}")]
    UnknownCpu {
        name: String,
    },

    #[error("Line {line}: {reason}")]
    Parse {
        line: usize,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for flag table operations.
pub type FlagResult<T> = Result<T, FlagError>;
