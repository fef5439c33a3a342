// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mayla_core::{Language, RefKind, SymbolKind};

use super::*;

#[test]
fn go_functions_methods_and_types() {
    let src = "\
package server

type Server struct {
\tAddr string
}

type Handler interface {
\tServe() error
}

func NewServer(addr string) *Server {
\treturn &Server{Addr: addr}
}

func (s *Server) Serve() error {
\treturn nil
}

func helper() {}

const MaxConns = 64
var defaultAddr = \":8080\"
";
    let symbols = extract_symbols(src, Language::Go);
    let found: Vec<_> = symbols
        .iter()
        .map(|s| (s.name.as_str(), s.kind, s.line_start, s.is_exported))
        .collect();

    assert!(found.contains(&("Server", SymbolKind::Struct, 3, true)));
    assert!(found.contains(&("Handler", SymbolKind::Interface, 7, true)));
    assert!(found.contains(&("NewServer", SymbolKind::Function, 11, true)));
    assert!(found.contains(&("Serve", SymbolKind::Method, 15, true)));
    assert!(found.contains(&("helper", SymbolKind::Function, 19, false)));
    assert!(found.contains(&("MaxConns", SymbolKind::Const, 21, true)));
    assert!(found.contains(&("defaultAddr", SymbolKind::Variable, 22, false)));
}

#[test]
fn rust_items_and_visibility() {
    let src = "\
pub struct Daemon;

pub(crate) enum State { Idle, Busy }

trait Runner {
    fn run(&self);
}

pub async fn serve() {}

fn private_helper() {}

pub const LIMIT: usize = 50;
";
    let symbols = extract_symbols(src, Language::Rust);
    let by_name = |name: &str| symbols.iter().find(|s| s.name == name);

    assert_eq!(by_name("Daemon").map(|s| s.kind), Some(SymbolKind::Struct));
    assert_eq!(by_name("State").map(|s| s.kind), Some(SymbolKind::Enum));
    assert_eq!(by_name("Runner").map(|s| s.kind), Some(SymbolKind::Trait));
    assert_eq!(by_name("serve").map(|s| s.kind), Some(SymbolKind::Function));
    assert_eq!(by_name("LIMIT").map(|s| s.kind), Some(SymbolKind::Const));

    assert_eq!(by_name("Daemon").map(|s| s.is_exported), Some(true));
    assert_eq!(by_name("private_helper").map(|s| s.is_exported), Some(false));
}

#[test]
fn python_classes_functions_and_methods() {
    let src = "\
class Indexer:
    def run(self):
        pass

    def _private(self):
        pass

def main():
    pass

MAX_SIZE = 1024
";
    let symbols = extract_symbols(src, Language::Python);
    let by_name = |name: &str| symbols.iter().find(|s| s.name == name);

    assert_eq!(by_name("Indexer").map(|s| s.kind), Some(SymbolKind::Class));
    assert_eq!(by_name("run").map(|s| s.kind), Some(SymbolKind::Method));
    assert_eq!(by_name("main").map(|s| s.kind), Some(SymbolKind::Function));
    assert_eq!(by_name("MAX_SIZE").map(|s| s.kind), Some(SymbolKind::Const));
    assert_eq!(by_name("_private").map(|s| s.is_exported), Some(false));
}

#[test]
fn typescript_interfaces_and_arrows() {
    let src = "\
export interface Config {
  root: string;
}

export type Result = string | null;

export const load = async (path: string) => {
  return path;
};

export class Loader {}

function internal() {}
";
    let symbols = extract_symbols(src, Language::TypeScript);
    let by_name = |name: &str| symbols.iter().find(|s| s.name == name);

    assert_eq!(by_name("Config").map(|s| s.kind), Some(SymbolKind::Interface));
    assert_eq!(by_name("Result").map(|s| s.kind), Some(SymbolKind::Type));
    assert_eq!(by_name("load").map(|s| s.kind), Some(SymbolKind::Function));
    assert_eq!(by_name("Loader").map(|s| s.kind), Some(SymbolKind::Class));
    assert_eq!(by_name("internal").map(|s| s.is_exported), Some(false));
}

#[test]
fn shell_functions_both_syntaxes() {
    let src = "\
#!/bin/sh
setup() {
  true
}
function teardown {
  true
}
";
    let symbols = extract_symbols(src, Language::Shell);
    let names: Vec<_> = symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"setup"));
    assert!(names.contains(&"teardown"));
}

#[test]
fn c_control_flow_is_not_a_function() {
    let src = "\
int add(int a, int b) {
    if (a > b) {
        return a;
    }
    while (b > 0) {
        b--;
    }
    return a + b;
}
";
    let symbols = extract_symbols(src, Language::C);
    let names: Vec<_> = symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"add"));
    assert!(!names.contains(&"if"));
    assert!(!names.contains(&"while"));
    assert!(!names.contains(&"return"));
}

#[test]
fn lines_and_columns_are_one_based() {
    let symbols = extract_symbols("func Foo() {}\n", Language::Go);
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].line_start, 1);
    assert_eq!(symbols[0].column_start, Some(6));
}

#[test]
fn empty_input_extracts_nothing() {
    assert!(extract_symbols("", Language::Go).is_empty());
    assert!(extract_symbols("\n\n\n", Language::Rust).is_empty());
}

#[yare::parameterized(
    go_import = { "import \"fmt\"", 8, RefKind::Import },
    rust_use = { "use crate::Foo;", 11, RefKind::Import },
    python_from = { "from os import path", 15, RefKind::Import },
    c_include = { "#include <foo.h>", 10, RefKind::Import },
    line_comment = { "x = 1 // Foo is unused", 10, RefKind::Comment },
    hash_comment = { "x = 1  # Foo is unused", 9, RefKind::Comment },
    in_string = { "msg = \"call Foo now\"", 12, RefKind::String },
    go_definition = { "func Foo() {}", 5, RefKind::Definition },
    method_definition = { "func (s *Server) Foo() {}", 17, RefKind::Definition },
    plain_usage = { "result := Foo()", 10, RefKind::Usage },
)]
fn classifies_reference_sites(line: &str, column: usize, expected: RefKind) {
    assert_eq!(classify_reference(line, column), expected);
}
