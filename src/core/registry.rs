// This module implements the flag registry: the declaration-ordered list of named
// instruction-eligibility flags and the 32-bit aligned fields that partition them.
// RegistryBuilder hands out bit indices in declaration order; close_field() seals the
// current field, rounding its end up to the next word boundary so later categories
// never shift when a field grows. The finished FlagRegistry is immutable and answers
// name -> bit, bit -> field and word-count queries for the interner, the CPU level
// helpers and the table generator. Declarations can be fed programmatically or parsed
// from a small line-oriented declaration file.

//! Flag registry and field partition.
//!
//! Flags get globally unique, monotonically increasing bit indices. Fields
//! are contiguous word-aligned bit ranges; every flag belongs to exactly one
//! field and the fields partition `[0, total_bits)`.

use super::bitset::{FlagBit, FlagBits, WORD_BITS};
use super::error::{FlagError, FlagResult};
use super::interner::IGNORE_KEY;
use hashbrown::HashMap;
use std::ops::Range;

/// A declared flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagDefinition {
    pub name: String,
    pub bit: FlagBit,
    pub description: String,
    /// Index of the owning field in [`FlagRegistry::fields`].
    pub field: usize,
}

/// A word-aligned range of bits; `last_bit` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagField {
    pub name: String,
    pub first_bit: FlagBit,
    pub last_bit: FlagBit,
}

impl FlagField {
    /// Number of bits covered by the field.
    pub fn width(&self) -> u32 {
        self.last_bit - self.first_bit + 1
    }

    /// Bitset words covered by the field.
    pub fn word_range(&self) -> Range<usize> {
        FlagBits::word_index(self.first_bit)..FlagBits::word_index(self.last_bit) + 1
    }

    pub fn contains(&self, bit: FlagBit) -> bool {
        (self.first_bit..=self.last_bit).contains(&bit)
    }
}

/// Incrementally declares flags and fields.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    flags: Vec<FlagDefinition>,
    by_name: HashMap<String, usize>,
    fields: Vec<FlagField>,
    /// Next bit to hand out.
    next_bit: FlagBit,
    /// First bit of the field currently open.
    field_start: FlagBit,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a flag, returning its bit index.
    ///
    /// Names are uppercase ASCII letters, digits and `_`, so they can never
    /// contain the key separator or spell the `ignore` sentinel.
    pub fn declare(&mut self, name: &str, description: &str) -> FlagResult<FlagBit> {
        if !is_flag_name(name) || name == IGNORE_KEY {
            return Err(FlagError::InvalidName {
                name: name.to_string(),
            });
        }
        if self.by_name.contains_key(name) {
            return Err(FlagError::DuplicateFlag {
                name: name.to_string(),
            });
        }
        if self.next_bit >= FlagBits::CAPACITY {
            return Err(FlagError::CapacityExceeded {
                bits: self.next_bit,
                capacity: FlagBits::CAPACITY,
            });
        }

        let bit = self.next_bit;
        self.by_name.insert(name.to_string(), self.flags.len());
        self.flags.push(FlagDefinition {
            name: name.to_string(),
            bit,
            description: description.to_string(),
            field: self.fields.len(),
        });
        self.next_bit += 1;
        Ok(bit)
    }

    /// Close the open field and align the cursor to the next word.
    pub fn close_field(&mut self, name: &str) -> FlagResult<&FlagField> {
        if self.fields.iter().any(|f| f.name.eq_ignore_ascii_case(name)) {
            return Err(FlagError::DuplicateField {
                name: name.to_string(),
            });
        }
        if self.next_bit == self.field_start {
            return Err(FlagError::EmptyField {
                name: name.to_string(),
            });
        }

        let end = self.next_bit.next_multiple_of(WORD_BITS);
        let field = FlagField {
            name: name.to_string(),
            first_bit: self.field_start,
            last_bit: end - 1,
        };
        log::debug!(
            "closed field {} bits {}..={} ({} flags)",
            field.name,
            field.first_bit,
            field.last_bit,
            self.next_bit - self.field_start
        );

        self.fields.push(field);
        self.next_bit = end;
        self.field_start = end;
        Ok(&self.fields[self.fields.len() - 1])
    }

    /// Number of flags declared so far.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Finish the registry. Every flag must sit inside a closed field.
    pub fn build(self) -> FlagResult<FlagRegistry> {
        let pending = self.flags.iter().filter(|f| f.bit >= self.field_start).count();
        if pending > 0 {
            return Err(FlagError::UnterminatedField { pending });
        }

        Ok(FlagRegistry {
            total_bits: self.field_start,
            flags: self.flags,
            by_name: self.by_name,
            fields: self.fields,
        })
    }
}

/// Immutable set of declared flags and fields.
#[derive(Debug, Clone)]
pub struct FlagRegistry {
    flags: Vec<FlagDefinition>,
    by_name: HashMap<String, usize>,
    fields: Vec<FlagField>,
    total_bits: u32,
}

impl FlagRegistry {
    /// Parse a declaration listing.
    ///
    /// One flag per line as `NAME description...`; `%field NAME` closes the
    /// current field; `#` at the start of a line or after whitespace starts a
    /// comment.
    pub fn parse(text: &str) -> FlagResult<Self> {
        let mut builder = RegistryBuilder::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            let (head, rest) = match line.split_once(char::is_whitespace) {
                Some((head, rest)) => (head, rest.trim()),
                None => (line, ""),
            };

            if head == "%field" {
                if !is_field_name(rest) {
                    return Err(FlagError::Parse {
                        line: line_no,
                        reason: format!("bad field name \"{rest}\""),
                    });
                }
                builder.close_field(rest).map_err(|e| at_line(line_no, e))?;
            } else {
                builder.declare(head, rest).map_err(|e| at_line(line_no, e))?;
            }
        }

        builder.build()
    }

    /// Bit index of a flag.
    pub fn bit(&self, name: &str) -> Option<FlagBit> {
        self.flag(name).map(|f| f.bit)
    }

    pub fn flag(&self, name: &str) -> Option<&FlagDefinition> {
        self.by_name.get(name).map(|&i| &self.flags[i])
    }

    /// Flag stored at `bit`, if any.
    pub fn flag_at(&self, bit: FlagBit) -> Option<&FlagDefinition> {
        self.flags
            .binary_search_by_key(&bit, |f| f.bit)
            .ok()
            .map(|i| &self.flags[i])
    }

    /// Flags in declaration order.
    pub fn flags(&self) -> &[FlagDefinition] {
        &self.flags
    }

    pub fn fields(&self) -> &[FlagField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FlagField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field containing `bit`.
    pub fn field_of(&self, bit: FlagBit) -> Option<&FlagField> {
        self.fields.iter().find(|f| f.contains(bit))
    }

    /// Flags belonging to a field, in declaration order.
    pub fn flags_in<'a>(&'a self, field: &'a FlagField) -> impl Iterator<Item = &'a FlagDefinition> + 'a {
        self.flags.iter().filter(move |f| field.contains(f.bit))
    }

    /// Total bits covered by all fields, a multiple of 32.
    pub fn total_bits(&self) -> u32 {
        self.total_bits
    }

    /// Words per bitset: `ceil(total_bits / 32)`.
    pub fn word_count(&self) -> usize {
        self.total_bits.div_ceil(WORD_BITS) as usize
    }

    /// Bits of `set` that belong to `field`.
    pub fn field_bits(&self, set: &FlagBits, field: &FlagField) -> FlagBits {
        set.masked_words(field.word_range())
    }
}

fn is_flag_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn is_field_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Drop a trailing `#` comment. A `#` glued to a word is kept.
fn strip_comment(line: &str) -> &str {
    let mut prev_space = true;
    for (i, c) in line.char_indices() {
        if c == '#' && prev_space {
            return &line[..i];
        }
        prev_space = c.is_whitespace();
    }
    line
}

fn at_line(line: usize, err: FlagError) -> FlagError {
    FlagError::Parse {
        line,
        reason: err.to_string(),
    }
}
