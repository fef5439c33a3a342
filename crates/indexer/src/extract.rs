// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Regex symbol extraction.
//!
//! One pattern table per language, matched line by line; the first
//! matching pattern wins for a line. This is deliberately shallow (the
//! LSP tier produces richer results) but it is fast, dependency-free and
//! good enough to keep the index useful when no server is installed.

use std::sync::LazyLock;

use mayla_core::{Language, RefKind, Symbol, SymbolKind};
use regex::Regex;

/// Maximum characters of a line kept as a signature.
const MAX_SIGNATURE_LEN: usize = 200;

/// How a table decides whether a matched symbol is exported.
#[derive(Debug, Clone, Copy)]
enum Export {
    /// Name starts with an uppercase letter (Go).
    UppercaseName,
    /// Line contains the given keyword (`pub`, `export`, `public`).
    Keyword(&'static str),
    /// Name does not start with an underscore (Python).
    NoLeadingUnderscore,
    /// Everything is exported (shell).
    Always,
}

struct SymbolPattern {
    regex: Regex,
    kind: SymbolKind,
    export: Export,
}

fn compile(table: &[(&str, SymbolKind, Export)]) -> Vec<SymbolPattern> {
    table
        .iter()
        .filter_map(|(pattern, kind, export)| {
            Regex::new(pattern).ok().map(|regex| SymbolPattern {
                regex,
                kind: *kind,
                export: *export,
            })
        })
        .collect()
}

static GO_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    compile(&[
        (
            r"^func\s+\([^)]+\)\s+(?P<name>[A-Za-z_]\w*)\s*\(",
            SymbolKind::Method,
            Export::UppercaseName,
        ),
        (
            r"^func\s+(?P<name>[A-Za-z_]\w*)\s*\(",
            SymbolKind::Function,
            Export::UppercaseName,
        ),
        (
            r"^type\s+(?P<name>[A-Za-z_]\w*)\s+struct\b",
            SymbolKind::Struct,
            Export::UppercaseName,
        ),
        (
            r"^type\s+(?P<name>[A-Za-z_]\w*)\s+interface\b",
            SymbolKind::Interface,
            Export::UppercaseName,
        ),
        (
            r"^type\s+(?P<name>[A-Za-z_]\w*)\b",
            SymbolKind::Type,
            Export::UppercaseName,
        ),
        (
            r"^const\s+(?P<name>[A-Za-z_]\w*)\b",
            SymbolKind::Const,
            Export::UppercaseName,
        ),
        (
            r"^var\s+(?P<name>[A-Za-z_]\w*)\b",
            SymbolKind::Variable,
            Export::UppercaseName,
        ),
    ])
});

static RUST_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    compile(&[
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(?P<name>[A-Za-z_]\w*)",
            SymbolKind::Function,
            Export::Keyword("pub"),
        ),
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(?P<name>[A-Za-z_]\w*)",
            SymbolKind::Struct,
            Export::Keyword("pub"),
        ),
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+(?P<name>[A-Za-z_]\w*)",
            SymbolKind::Enum,
            Export::Keyword("pub"),
        ),
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+(?P<name>[A-Za-z_]\w*)",
            SymbolKind::Trait,
            Export::Keyword("pub"),
        ),
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?type\s+(?P<name>[A-Za-z_]\w*)",
            SymbolKind::Type,
            Export::Keyword("pub"),
        ),
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+(?P<name>[A-Za-z_]\w*)",
            SymbolKind::Const,
            Export::Keyword("pub"),
        ),
        (
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+(?P<name>[A-Za-z_]\w*)",
            SymbolKind::Module,
            Export::Keyword("pub"),
        ),
    ])
});

static PYTHON_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    compile(&[
        (
            r"^class\s+(?P<name>\w+)",
            SymbolKind::Class,
            Export::NoLeadingUnderscore,
        ),
        (
            r"^(?:async\s+)?def\s+(?P<name>\w+)",
            SymbolKind::Function,
            Export::NoLeadingUnderscore,
        ),
        (
            r"^\s+(?:async\s+)?def\s+(?P<name>\w+)",
            SymbolKind::Method,
            Export::NoLeadingUnderscore,
        ),
        (
            r"^(?P<name>[A-Z_][A-Z0-9_]+)\s*=",
            SymbolKind::Const,
            Export::NoLeadingUnderscore,
        ),
    ])
});

static JAVASCRIPT_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    compile(&[
        (
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>\w+)",
            SymbolKind::Function,
            Export::Keyword("export"),
        ),
        (
            r"^\s*(?:export\s+)?(?:default\s+)?class\s+(?P<name>\w+)",
            SymbolKind::Class,
            Export::Keyword("export"),
        ),
        (
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>\w+)\s*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*=>|\w+\s*=>)",
            SymbolKind::Function,
            Export::Keyword("export"),
        ),
        (
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>\w+)",
            SymbolKind::Variable,
            Export::Keyword("export"),
        ),
    ])
});

static TYPESCRIPT_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    let mut patterns = compile(&[
        (
            r"^\s*(?:export\s+)?interface\s+(?P<name>\w+)",
            SymbolKind::Interface,
            Export::Keyword("export"),
        ),
        (
            r"^\s*(?:export\s+)?(?:const\s+)?enum\s+(?P<name>\w+)",
            SymbolKind::Enum,
            Export::Keyword("export"),
        ),
        (
            r"^\s*(?:export\s+)?type\s+(?P<name>\w+)\s*=",
            SymbolKind::Type,
            Export::Keyword("export"),
        ),
        (
            r"^\s*(?:export\s+)?namespace\s+(?P<name>\w+)",
            SymbolKind::Module,
            Export::Keyword("export"),
        ),
    ]);
    patterns.extend(compile(&[
        (
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>\w+)",
            SymbolKind::Function,
            Export::Keyword("export"),
        ),
        (
            r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(?P<name>\w+)",
            SymbolKind::Class,
            Export::Keyword("export"),
        ),
        (
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>\w+)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::\s*[\w<>,\[\]\s]+)?\s*=>|\w+\s*=>)",
            SymbolKind::Function,
            Export::Keyword("export"),
        ),
        (
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>\w+)",
            SymbolKind::Variable,
            Export::Keyword("export"),
        ),
    ]));
    patterns
});

static JAVA_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    compile(&[
        (
            r"^\s*(?:public\s+|protected\s+|private\s+)?(?:abstract\s+|final\s+|static\s+)*class\s+(?P<name>\w+)",
            SymbolKind::Class,
            Export::Keyword("public"),
        ),
        (
            r"^\s*(?:public\s+|protected\s+|private\s+)?interface\s+(?P<name>\w+)",
            SymbolKind::Interface,
            Export::Keyword("public"),
        ),
        (
            r"^\s*(?:public\s+|protected\s+|private\s+)?enum\s+(?P<name>\w+)",
            SymbolKind::Enum,
            Export::Keyword("public"),
        ),
        (
            r"^\s*(?:public|protected|private)\s+(?:static\s+|final\s+|synchronized\s+)*[\w<>\[\],.\s]+\s+(?P<name>\w+)\s*\(",
            SymbolKind::Method,
            Export::Keyword("public"),
        ),
    ])
});

static C_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    compile(&[
        (
            r"^(?:typedef\s+)?struct\s+(?P<name>\w+)",
            SymbolKind::Struct,
            Export::Always,
        ),
        (
            r"^(?:typedef\s+)?enum\s+(?P<name>\w+)",
            SymbolKind::Enum,
            Export::Always,
        ),
        (
            r"^#define\s+(?P<name>\w+)",
            SymbolKind::Const,
            Export::Always,
        ),
        (
            r"^[A-Za-z_][\w\s\*]*[\s\*](?P<name>[A-Za-z_]\w*)\s*\([^;]*$",
            SymbolKind::Function,
            Export::Always,
        ),
    ])
});

static CPP_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    let mut patterns = compile(&[
        (
            r"^\s*(?:template\s*<[^>]*>\s*)?class\s+(?P<name>\w+)",
            SymbolKind::Class,
            Export::Always,
        ),
        (
            r"^\s*namespace\s+(?P<name>\w+)",
            SymbolKind::Module,
            Export::Always,
        ),
    ]);
    patterns.extend(compile(&[
        (
            r"^(?:typedef\s+)?struct\s+(?P<name>\w+)",
            SymbolKind::Struct,
            Export::Always,
        ),
        (
            r"^(?:typedef\s+)?enum\s+(?P<name>\w+)",
            SymbolKind::Enum,
            Export::Always,
        ),
        (
            r"^#define\s+(?P<name>\w+)",
            SymbolKind::Const,
            Export::Always,
        ),
        (
            r"^[A-Za-z_][\w\s\*:<>,~]*[\s\*](?P<name>[A-Za-z_]\w*)\s*\([^;]*$",
            SymbolKind::Function,
            Export::Always,
        ),
    ]));
    patterns
});

static RUBY_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    compile(&[
        (
            r"^\s*class\s+(?P<name>\w+)",
            SymbolKind::Class,
            Export::Always,
        ),
        (
            r"^\s*module\s+(?P<name>\w+)",
            SymbolKind::Module,
            Export::Always,
        ),
        (
            r"^\s*def\s+(?:self\.)?(?P<name>[\w?!]+)",
            SymbolKind::Method,
            Export::Always,
        ),
        (
            r"^\s*(?P<name>[A-Z][A-Z0-9_]*)\s*=",
            SymbolKind::Const,
            Export::Always,
        ),
    ])
});

static SHELL_PATTERNS: LazyLock<Vec<SymbolPattern>> = LazyLock::new(|| {
    compile(&[
        (
            r"^\s*function\s+(?P<name>[A-Za-z_]\w*)",
            SymbolKind::Function,
            Export::Always,
        ),
        (
            r"^\s*(?P<name>[A-Za-z_]\w*)\s*\(\)\s*\{",
            SymbolKind::Function,
            Export::Always,
        ),
    ])
});

fn patterns_for(language: Language) -> &'static [SymbolPattern] {
    match language {
        Language::Go => &GO_PATTERNS,
        Language::Rust => &RUST_PATTERNS,
        Language::Python => &PYTHON_PATTERNS,
        Language::JavaScript => &JAVASCRIPT_PATTERNS,
        Language::TypeScript => &TYPESCRIPT_PATTERNS,
        Language::Java => &JAVA_PATTERNS,
        Language::C => &C_PATTERNS,
        Language::Cpp => &CPP_PATTERNS,
        Language::Ruby => &RUBY_PATTERNS,
        Language::Shell => &SHELL_PATTERNS,
    }
}

fn is_exported(export: Export, name: &str, line: &str) -> bool {
    match export {
        Export::UppercaseName => name.chars().next().is_some_and(|c| c.is_uppercase()),
        Export::Keyword(kw) => line
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .any(|token| token == kw),
        Export::NoLeadingUnderscore => !name.starts_with('_'),
        Export::Always => true,
    }
}

/// Control-flow keywords that the looser C-style function patterns can
/// capture by accident.
const NON_SYMBOL_NAMES: &[&str] = &["if", "else", "for", "while", "switch", "do", "return"];

/// Extract symbols from normalized text. Lines and columns are 1-based.
pub fn extract_symbols(text: &str, language: Language) -> Vec<Symbol> {
    let patterns = patterns_for(language);
    let mut symbols = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        for pattern in patterns {
            let Some(caps) = pattern.regex.captures(line) else {
                continue;
            };
            let Some(m) = caps.name("name") else {
                continue;
            };
            let name = m.as_str().to_string();
            if NON_SYMBOL_NAMES.contains(&name.as_str()) {
                continue;
            }
            let signature: String = line.trim().chars().take(MAX_SIGNATURE_LEN).collect();
            let exported = is_exported(pattern.export, &name, line);
            symbols.push(Symbol {
                name,
                kind: pattern.kind,
                signature: Some(signature),
                line_start: line_no,
                line_end: line_no,
                column_start: Some((m.start() + 1) as u32),
                column_end: Some((m.end() + 1) as u32),
                visibility: exported.then(|| "public".to_string()),
                documentation: None,
                is_exported: exported,
            });
            break; // first matching pattern wins for this line
        }
    }

    symbols
}

static IMPORT_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:import\b|from\s+\S+\s+import\b|use\s+|#include\b|require\s*\(|require\s+')"#).ok()
});

static DEFINITION_BEFORE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:func|fn|def|class|struct|type|interface|trait|enum|impl|module|function)\s*(?:\([^)]*\)\s*)?$",
    )
    .ok()
});

/// Classify a reference site by cheap lexical cues on its line.
///
/// `column` is the 0-based byte offset of the symbol name in `line`.
pub fn classify_reference(line: &str, column: usize) -> RefKind {
    let before = &line[..column.min(line.len())];

    // Import lines first: `#include` would otherwise read as a comment
    if IMPORT_LINE.as_ref().is_some_and(|re| re.is_match(line)) {
        return RefKind::Import;
    }

    // Comment markers anywhere before the match
    if before.contains("//") || before.contains('#') || before.contains("/*") {
        return RefKind::Comment;
    }

    // Inside a string if an odd number of unescaped quotes precede the match
    for quote in ['"', '\''] {
        let mut open = false;
        let mut prev = '\0';
        for c in before.chars() {
            if c == quote && prev != '\\' {
                open = !open;
            }
            prev = c;
        }
        if open {
            return RefKind::String;
        }
    }

    if DEFINITION_BEFORE
        .as_ref()
        .is_some_and(|re| re.is_match(before.trim_end()))
    {
        return RefKind::Definition;
    }

    RefKind::Usage
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
