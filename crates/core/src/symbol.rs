// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symbols and references: the vocabulary produced by extraction (regex or
//! LSP) and persisted by the index store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a code symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Type,
    Struct,
    Interface,
    Class,
    Enum,
    Trait,
    Const,
    Variable,
    Field,
    Module,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Type => "type",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Class => "class",
            Self::Enum => "enum",
            Self::Trait => "trait",
            Self::Const => "const",
            Self::Variable => "variable",
            Self::Field => "field",
            Self::Module => "module",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "type" => Some(Self::Type),
            "struct" => Some(Self::Struct),
            "interface" => Some(Self::Interface),
            "class" => Some(Self::Class),
            "enum" => Some(Self::Enum),
            "trait" => Some(Self::Trait),
            "const" => Some(Self::Const),
            "variable" => Some(Self::Variable),
            "field" => Some(Self::Field),
            "module" => Some(Self::Module),
            _ => None,
        }
    }

    /// Case-insensitive comparison against a user-supplied kind filter.
    pub fn matches_filter(&self, filter: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(filter)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A symbol as produced by extraction. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub line_start: u32,
    pub line_end: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_end: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default)]
    pub is_exported: bool,
}

impl Symbol {
    /// Minimal constructor used by extractors; optional attributes default
    /// to empty.
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            signature: None,
            line_start: line,
            line_end: line,
            column_start: None,
            column_end: None,
            visibility: None,
            documentation: None,
            is_exported: false,
        }
    }
}

/// How a reference site relates to the symbol it mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Definition,
    Usage,
    Import,
    Comment,
    String,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Usage => "usage",
            Self::Import => "import",
            Self::Comment => "comment",
            Self::String => "string",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "definition" => Some(Self::Definition),
            "usage" => Some(Self::Usage),
            "import" => Some(Self::Import),
            "comment" => Some(Self::Comment),
            "string" => Some(Self::String),
            _ => None,
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reference site. Line is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub kind: RefKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Lifecycle status of a file record in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Indexed,
    Failed,
    Skipped,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Indexed => "indexed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "pending" => Some(Self::Pending),
            "indexed" => Some(Self::Indexed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "symbol_tests.rs"]
mod tests;
