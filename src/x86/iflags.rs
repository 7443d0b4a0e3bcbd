// This module declares the standard x86 instruction flag table and the CPU-level logic
// built on top of it. The declarations are grouped into three word-aligned fields:
// "general" (operand size matching, size restrictions, LOCK, long-mode availability,
// HLE/BND prefix properties), "feature" (instruction set extensions from the FPU through
// the AVX-512 and AMX families, plus VEX/EVEX and the obsolete/never/nop markers) and
// "cpu" (processor generations from the 8086 to FUTURE and IA64, the DEFAULT and ANY
// levels, then the CYRIX and AMD vendor preference bits). The registry is built once,
// lazily, from the declaration list and shared for the life of the program.
//
// CpuLevels interprets the cpu field: the level of a bitset is its highest set bit among
// the generation bits; vendor bits never count as a level but feed the preference mask
// the disassembler uses to rank otherwise equivalent templates. CpuLevels also resolves
// CPU directive names (with the usual aliases) into the assembler's current-CPU bitset.

//! Standard x86 instruction flags and CPU levels.

use crate::core::{FlagBit, FlagBits, FlagError, FlagField, FlagRegistry, FlagResult, RegistryBuilder};
use once_cell::sync::Lazy;
use std::cmp::Ordering;

pub const GENERAL_FIELD: &str = "general";
pub const FEATURE_FIELD: &str = "feature";
pub const CPU_FIELD: &str = "cpu";

/// Last CPU level; cpu-field bits after it are vendor preferences.
pub const LAST_LEVEL: &str = "ANY";

/// One entry of a declaration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decl {
    Flag(&'static str, &'static str),
    EndField(&'static str),
}

use Decl::{EndField, Flag};

/// The standard declaration list, in bit order.
pub const STANDARD_DECLS: &[Decl] = &[
    Flag("SM0", "Size match operand 0"),
    Flag("SM1", "Size match operand 1"),
    Flag("SM2", "Size match operand 2"),
    Flag("SM3", "Size match operand 3"),
    Flag("SM4", "Size match operand 4"),
    Flag("AR0", "SB, SW, SD applies to argument 0"),
    Flag("AR1", "SB, SW, SD applies to argument 1"),
    Flag("AR2", "SB, SW, SD applies to argument 2"),
    Flag("AR3", "SB, SW, SD applies to argument 3"),
    Flag("AR4", "SB, SW, SD applies to argument 4"),
    Flag("OPT", "Optimizing assembly only"),
    Flag("LATEVEX", "Only if EVEX instructions are disabled"),
    Flag("SB", "Unsized operands can't be non-byte"),
    Flag("SW", "Unsized operands can't be non-word"),
    Flag("SD", "Unsized operands can't be non-dword"),
    Flag("SQ", "Unsized operands can't be non-qword"),
    Flag("SO", "Unsized operands can't be non-oword"),
    Flag("SY", "Unsized operands can't be non-yword"),
    Flag("SZ", "Unsized operands can't be non-zword"),
    Flag("SIZE", "Unsized operands must match the bitsize"),
    Flag("SX", "Unsized operands not allowed"),
    Flag("ANYSIZE", "Ignore operand size even if explicit"),
    Flag("PRIV", "Privileged instruction"),
    Flag("SMM", "Only valid in SMM"),
    Flag("PROT", "Protected mode only"),
    Flag("LOCK", "Lockable if operand 0 is memory"),
    Flag("NOLONG", "Not available in long mode"),
    Flag("LONG", "Long mode"),
    Flag("NOHLE", "HLE prefixes forbidden"),
    Flag("MIB", "Split base/index EA"),
    Flag("SIB", "SIB encoding required"),
    Flag("BND", "BND (0xF2) prefix available"),
    Flag("UNDOC", "Undocumented"),
    Flag("HLE", "HLE prefixed"),
    EndField(GENERAL_FIELD),
    Flag("FPU", "FPU"),
    Flag("MMX", "MMX"),
    Flag("3DNOW", "3DNow!"),
    Flag("SSE", "SSE (KNI, MMX2)"),
    Flag("SSE2", "SSE2"),
    Flag("SSE3", "SSE3 (PNI)"),
    Flag("VMX", "VMX"),
    Flag("SSSE3", "SSSE3"),
    Flag("SSE4A", "AMD SSE4a"),
    Flag("SSE41", "SSE4.1"),
    Flag("SSE42", "SSE4.2"),
    Flag("SSE5", "SSE5"),
    Flag("AVX", "AVX (256-bit floating point)"),
    Flag("AVX2", "AVX2 (256-bit integer)"),
    Flag("FMA", "Fused multiply-add"),
    Flag("BMI1", "Bit manipulation 1"),
    Flag("BMI2", "Bit manipulation 2"),
    Flag("TBM", "Trailing bit manipulation"),
    Flag("RTM", "Restricted transactional memory"),
    Flag("INVPCID", "INVPCID"),
    Flag("AVX512", "AVX-512 (any subset)"),
    Flag("AVX512F", "AVX-512 foundation"),
    Flag("AVX512CD", "AVX-512 conflict detection"),
    Flag("AVX512ER", "AVX-512 exponential and reciprocal"),
    Flag("AVX512PF", "AVX-512 prefetch"),
    Flag("AVX512DQ", "AVX-512 doubleword and quadword"),
    Flag("AVX512BW", "AVX-512 byte and word"),
    Flag("AVX512VL", "AVX-512 vector length orthogonality"),
    Flag("AVX512IFMA", "AVX-512 integer fused multiply-add"),
    Flag("AVX512VBMI", "AVX-512 vector byte manipulation"),
    Flag("AES", "AES instructions"),
    Flag("VAES", "AES AVX instructions"),
    Flag("VPCLMULQDQ", "AVX carryless multiplication"),
    Flag("GFNI", "Galois field instructions"),
    Flag("AVX512VBMI2", "AVX-512 vector byte manipulation 2"),
    Flag("AVX512VNNI", "AVX-512 vector neural network"),
    Flag("AVX512BITALG", "AVX-512 bit algorithms"),
    Flag("AVX512VPOPCNTDQ", "AVX-512 VPOPCNTD/VPOPCNTQ"),
    Flag("AVX5124FMAPS", "AVX-512 4-iteration multiply-add"),
    Flag("AVX5124VNNIW", "AVX-512 4-iteration dot product"),
    Flag("AVX512FP16", "AVX-512 FP16 instructions"),
    Flag("AVX512FC16", "AVX-512 FC16 instructions"),
    Flag("SGX", "Intel Software Guard Extensions"),
    Flag("CET", "Intel Control-Flow Enforcement Technology"),
    Flag("ENQCMD", "Enqueue command instructions"),
    Flag("PCONFIG", "Platform configuration instruction"),
    Flag("WBNOINVD", "Writeback and do not invalidate instruction"),
    Flag("TSXLDTRK", "TSX suspend load address tracking"),
    Flag("SERIALIZE", "SERIALIZE instruction"),
    Flag("AVX512BF16", "AVX-512 bfloat16"),
    Flag("AVX512VP2INTERSECT", "AVX-512 VP2INTERSECT instructions"),
    Flag("AMXTILE", "AMX tile configuration instructions"),
    Flag("AMXBF16", "AMX bfloat16 multiplication"),
    Flag("AMXINT8", "AMX 8-bit integer multiplication"),
    Flag("FRED", "Flexible return and exception delivery"),
    Flag("RAOINT", "Remote atomic operations"),
    Flag("UINTR", "User interrupts"),
    Flag("CMPCCXADD", "CMPccXADD instructions"),
    Flag("PREFETCHI", "PREFETCHI0 and PREFETCHI1"),
    Flag("WRMSRNS", "WRMSRNS"),
    Flag("MSRLIST", "RDMSRLIST and WRMSRLIST"),
    Flag("AVXNECONVERT", "AVX exceptionless floating-point conversions"),
    Flag("AVXVNNIINT8", "AVX Vector Neural Network 8-bit integer instructions"),
    Flag("AVXIFMA", "AVX integer multiply and add"),
    Flag("HSD", "History reset"),
    Flag("OBSOLETE", "Instruction removed from architecture"),
    Flag("NEVER", "Instruction never implemented"),
    Flag("NOP", "Instruction is always a (nonintentional) NOP"),
    Flag("VEX", "VEX or XOP encoded instruction"),
    Flag("EVEX", "EVEX encoded instruction"),
    EndField(FEATURE_FIELD),
    Flag("8086", "8086"),
    Flag("186", "186+"),
    Flag("286", "286+"),
    Flag("386", "386+"),
    Flag("486", "486+"),
    Flag("PENT", "Pentium"),
    Flag("P6", "P6"),
    Flag("KATMAI", "Katmai"),
    Flag("WILLAMETTE", "Willamette"),
    Flag("PRESCOTT", "Prescott"),
    Flag("X86_64", "x86-64 (long or legacy mode)"),
    Flag("NEHALEM", "Nehalem"),
    Flag("WESTMERE", "Westmere"),
    Flag("SANDYBRIDGE", "Sandy Bridge"),
    Flag("FUTURE", "Ivy Bridge or newer"),
    Flag("IA64", "IA64 (in x86 mode)"),
    Flag("DEFAULT", "Default CPU level"),
    Flag(LAST_LEVEL, "Allow any known instruction"),
    Flag("CYRIX", "Cyrix-specific"),
    Flag("AMD", "AMD-specific"),
    EndField(CPU_FIELD),
];

/// Feed a declaration list into a fresh builder.
pub fn build_registry(decls: &[Decl]) -> FlagResult<FlagRegistry> {
    let mut builder = RegistryBuilder::new();
    for decl in decls {
        match *decl {
            Flag(name, description) => {
                builder.declare(name, description)?;
            }
            EndField(name) => {
                builder.close_field(name)?;
            }
        }
    }
    builder.build()
}

static STANDARD: Lazy<FlagRegistry> =
    Lazy::new(|| build_registry(STANDARD_DECLS).expect("standard flag declarations are well-formed"));

/// The built-in x86 flag registry.
pub fn standard_registry() -> &'static FlagRegistry {
    &STANDARD
}

/// CPU-level view of a registry's cpu field.
#[derive(Debug, Clone, Copy)]
pub struct CpuLevels<'r> {
    registry: &'r FlagRegistry,
    /// Lowest level bit.
    first: FlagBit,
    /// Highest level bit (`ANY`).
    last: FlagBit,
    /// End of the cpu field, exclusive; bits in `last+1..end` are vendor preferences.
    end: FlagBit,
}

/// A resolved CPU directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSelection {
    pub level: FlagBit,
    /// Level bit plus every feature bit.
    pub flags: FlagBits,
}

impl<'r> CpuLevels<'r> {
    /// Interpret the `cpu` field of `registry`, whose levels end at `ANY`.
    pub fn new(registry: &'r FlagRegistry) -> FlagResult<Self> {
        let field = registry.field(CPU_FIELD).ok_or_else(|| FlagError::UnknownCpu {
            name: CPU_FIELD.to_string(),
        })?;
        let last = registry
            .flag(LAST_LEVEL)
            .filter(|f| field.contains(f.bit))
            .map(|f| f.bit)
            .ok_or_else(|| FlagError::UnknownCpu {
                name: LAST_LEVEL.to_string(),
            })?;

        Ok(Self {
            registry,
            first: field.first_bit,
            last,
            end: field.last_bit + 1,
        })
    }

    /// Levels of the built-in registry.
    pub fn standard() -> CpuLevels<'static> {
        CpuLevels::new(standard_registry()).expect("standard registry has a cpu field")
    }

    /// Highest CPU level set in `bits`.
    pub fn level(&self, bits: &FlagBits) -> Option<FlagBit> {
        (self.first..=self.last).rev().find(|bit| bits.test(*bit))
    }

    /// Order two bitsets by CPU level; no level sorts lowest.
    pub fn cmp_level(&self, a: &FlagBits, b: &FlagBits) -> Ordering {
        self.level(a).cmp(&self.level(b))
    }

    /// Whether `bits` is at or above `level`.
    pub fn level_ok(&self, bits: &FlagBits, level: FlagBit) -> bool {
        self.level(bits).is_some_and(|l| l >= level)
    }

    /// Vendor preference bits of `bits` only.
    pub fn preference_mask(&self, bits: &FlagBits) -> FlagBits {
        let mut out = FlagBits::new();
        for bit in (self.last + 1..self.end).filter(|b| bits.test(*b)) {
            out.set(bit);
        }
        out
    }

    /// Whether a template needing `template` may be used at CPU `cpu`.
    pub fn template_allowed(&self, template: &FlagBits, cpu: &FlagBits) -> bool {
        self.cmp_level(template, cpu) != Ordering::Greater
    }

    /// Current-CPU bitset for a level: the level bit plus every feature.
    pub fn cpu_flags(&self, level: FlagBit) -> FlagBits {
        let mut flags = FlagBits::new();
        if let Some(feature) = self.registry.field(FEATURE_FIELD) {
            for flag in self.registry.flags_in(feature) {
                flags.set(flag.bit);
            }
        }
        flags.set(level);
        flags
    }

    /// The level used when no CPU directive is given.
    pub fn default_selection(&self) -> CpuSelection {
        CpuSelection {
            level: self.last,
            flags: self.cpu_flags(self.last),
        }
    }

    /// Resolve a CPU directive name such as `386`, `p4`, `x64` or `any`.
    pub fn select(&self, name: &str) -> FlagResult<CpuSelection> {
        let lower = name.trim().to_ascii_lowercase();
        let canonical = match lower.as_str() {
            "586" | "pentium" => "PENT".to_string(),
            "686" | "ppro" | "pentiumpro" | "p2" => "P6".to_string(),
            "p3" => "KATMAI".to_string(),
            "p4" => "WILLAMETTE".to_string(),
            "x64" | "x86-64" => "X86_64".to_string(),
            "all" => LAST_LEVEL.to_string(),
            other => other.to_ascii_uppercase(),
        };

        let level = self
            .registry
            .bit(&canonical)
            .filter(|bit| (self.first..=self.last).contains(bit))
            .ok_or_else(|| FlagError::UnknownCpu {
                name: name.to_string(),
            })?;

        log::debug!("selected cpu {canonical} (bit {level})");
        Ok(CpuSelection {
            level,
            flags: self.cpu_flags(level),
        })
    }

    /// The cpu field.
    pub fn field(&self) -> Option<&'r FlagField> {
        self.registry.field(CPU_FIELD)
    }
}
