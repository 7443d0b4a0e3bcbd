// This module turns an instruction template listing into Rust source for a frozen flag
// table. A listing names one template per line together with its comma-separated flags;
// every flag set is interned against a registry (the built-in x86 one or a registry parsed
// from a declaration file), and the frozen table is rendered as constants: the word count,
// one IF_<NAME> bit constant per flag, the word range of each field, the INSNS_FLAGS
// bit-vector table and the per-template index list. The generated file is meant to be
// checked in or included by the assembler so the run-time side never rebuilds the table.
// The flaggen binary is a thin command line wrapper around these functions.

//! Flag table generator.
//!
//! Reads template listings, interns their flag sets and emits Rust source
//! for the resulting frozen table.

use crate::core::{FlagError, FlagRegistry, FlagResult, FlagSetIndex, FlagSetInterner, FlagTable, InternStats};
use bumpalo::Bump;
use std::fs;
use std::path::Path;

/// One line of a template listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub mnemonic: String,
    pub flags: Vec<String>,
    pub line: usize,
}

/// Interned result for a whole listing.
#[derive(Debug, Clone)]
pub struct GeneratedTable {
    pub table: FlagTable,
    /// Template mnemonic and its table index, in listing order.
    pub templates: Vec<(String, Option<FlagSetIndex>)>,
    pub stats: InternStats,
}

/// Parse a template listing.
///
/// Each non-empty line is `MNEMONIC FLAGS` where `FLAGS` is a comma-separated
/// list, `ignore`, or absent. `;` starts a comment.
pub fn parse_templates(text: &str) -> FlagResult<Vec<Template>> {
    let mut templates = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split(';').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m, rest.trim()),
            None => (line, ""),
        };
        if !mnemonic.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FlagError::Parse {
                line: idx + 1,
                reason: format!("bad mnemonic \"{mnemonic}\""),
            });
        }

        let flags = rest
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        templates.push(Template {
            mnemonic: mnemonic.to_string(),
            flags,
            line: idx + 1,
        });
    }

    Ok(templates)
}

/// Intern every template's flags and freeze the table.
pub fn build_table(registry: &FlagRegistry, templates: &[Template]) -> FlagResult<GeneratedTable> {
    let arena = Bump::new();
    let mut pool = FlagSetInterner::new(&arena, registry);
    let mut indices = Vec::with_capacity(templates.len());

    for template in templates {
        let idx = pool.intern(&template.flags).map_err(|e| FlagError::Parse {
            line: template.line,
            reason: format!("{}: {e}", template.mnemonic),
        })?;
        indices.push((template.mnemonic.clone(), idx));
    }

    let stats = pool.stats();
    log::info!(
        "{} templates, {} distinct flag sets, {} without flags",
        templates.len(),
        pool.len(),
        stats.ignored
    );

    Ok(GeneratedTable {
        table: pool.freeze(),
        templates: indices,
        stats,
    })
}

/// Render a generated table as Rust source.
pub fn render_rust(registry: &FlagRegistry, generated: &GeneratedTable) -> String {
    let words = registry.word_count();
    let mut out = String::from("// Generated by flaggen. Do not edit.\n\n");

    out.push_str(&format!("pub const FLAG_WORDS: usize = {words};\n\n"));

    for flag in registry.flags() {
        let description: Vec<&str> = flag.description.split_whitespace().collect();
        out.push_str(&format!(
            "/// {}\npub const IF_{}: u32 = {};\n",
            description.join(" "),
            flag.name,
            flag.bit
        ));
    }
    out.push('\n');

    for field in registry.fields() {
        let range = field.word_range();
        out.push_str(&format!(
            "pub const IF_FIELD_{}: core::ops::Range<usize> = {}..{};\n",
            field.name.to_ascii_uppercase(),
            range.start,
            range.end
        ));
    }
    out.push('\n');

    out.push_str(&format!(
        "pub static INSNS_FLAGS: [[u32; FLAG_WORDS]; {}] = [\n",
        generated.table.len()
    ));
    for (idx, key, bits) in generated.table.iter() {
        let row: Vec<String> = bits.words(words).iter().map(|w| format!("0x{w:08x}")).collect();
        out.push_str(&format!("    [{}], // {idx}: {key}\n", row.join(", ")));
    }
    out.push_str("];\n\n");

    out.push_str(&format!(
        "pub static TEMPLATE_FLAGS: [(&str, Option<u32>); {}] = [\n",
        generated.templates.len()
    ));
    for (mnemonic, idx) in &generated.templates {
        let idx = match idx {
            Some(i) => format!("Some({i})"),
            None => "None".to_string(),
        };
        out.push_str(&format!("    (\"{mnemonic}\", {idx}),\n"));
    }
    out.push_str("];\n");

    out
}

/// Convenience helper: listing text in, Rust source out.
pub fn generate(registry: &FlagRegistry, listing: &str) -> FlagResult<String> {
    let templates = parse_templates(listing)?;
    let generated = build_table(registry, &templates)?;
    Ok(render_rust(registry, &generated))
}

/// Read a listing or declaration file.
pub fn read_source(path: &Path) -> FlagResult<String> {
    Ok(fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RegistryBuilder;

    fn registry() -> FlagRegistry {
        let mut b = RegistryBuilder::new();
        b.declare("LOCK", "Lockable").unwrap();
        b.close_field("general").unwrap();
        b.declare("SSE", "SSE").unwrap();
        b.declare("AVX", "AVX").unwrap();
        b.close_field("feature").unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_parse_templates() {
        let text = "\
; comment line
ADD    LOCK, SSE
NOP    ignore
HLT
";
        let templates = parse_templates(text).unwrap();
        assert_eq!(templates.len(), 3);
        assert_eq!(templates[0].mnemonic, "ADD");
        assert_eq!(templates[0].flags, vec!["LOCK", "SSE"]);
        assert_eq!(templates[0].line, 2);
        assert_eq!(templates[1].flags, vec!["ignore"]);
        assert!(templates[2].flags.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_mnemonic() {
        let err = parse_templates("ADD LOCK\nA-B SSE\n").unwrap_err();
        assert!(matches!(err, FlagError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_build_table_dedups() {
        let reg = registry();
        let templates = parse_templates("A SSE,LOCK\nB LOCK,SSE\nC AVX\nD\n").unwrap();
        let generated = build_table(&reg, &templates).unwrap();

        assert_eq!(generated.table.len(), 2);
        assert_eq!(
            generated.templates,
            vec![
                ("A".to_string(), Some(0)),
                ("B".to_string(), Some(0)),
                ("C".to_string(), Some(1)),
                ("D".to_string(), None),
            ]
        );
        assert_eq!(generated.stats.hits, 1);
    }

    #[test]
    fn test_unknown_flag_reports_line() {
        let reg = registry();
        let templates = parse_templates("A SSE\nB MMX\n").unwrap();
        let err = build_table(&reg, &templates).unwrap_err();
        match err {
            FlagError::Parse { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("MMX"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_source(Path::new("/nonexistent/flaggen/listing.txt")).unwrap_err();
        assert!(matches!(err, FlagError::Io(_)));
    }

    #[test]
    fn test_render_rust() {
        let reg = registry();
        let source = generate(&reg, "A SSE,LOCK\nB ignore\n").unwrap();

        assert!(source.contains("pub const FLAG_WORDS: usize = 2;"));
        assert!(source.contains("pub const IF_LOCK: u32 = 0;"));
        assert!(source.contains("pub const IF_SSE: u32 = 32;"));
        assert!(source.contains("pub const IF_FIELD_FEATURE: core::ops::Range<usize> = 1..2;"));
        assert!(source.contains("[0x00000001, 0x00000001], // 0: LOCK,SSE"));
        assert!(source.contains("(\"B\", None),"));
    }

    #[test]
    fn test_render_keeps_descriptions_on_one_line() {
        let mut b = RegistryBuilder::new();
        b.declare("LOCK", "Lockable\nif operand 0\r\nis memory").unwrap();
        b.close_field("general").unwrap();
        let reg = b.build().unwrap();

        let source = generate(&reg, "A LOCK\n").unwrap();
        assert!(source.contains("/// Lockable if operand 0 is memory\npub const IF_LOCK: u32 = 0;\n"));
        assert!(source.lines().all(|l| !l.starts_with("if ") && !l.starts_with("is ")));
    }
}
