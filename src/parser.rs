//! Syntactic position extractor.
//!
//! Parses model sources with tree-sitter (never executing them) and maps
//! each declared table name to the 1-based line of its declaration. Two
//! declaration shapes are recognized:
//!
//! - a class whose body assigns a string literal to `__tablename__`; the
//!   recorded line is the class statement's, not the assignment's;
//! - a `Table("name", ...)` or `<expr>.Table("name", ...)` call whose
//!   first positional argument is a string literal; the recorded line is
//!   the call's.
//!
//! A name declared twice in one file keeps the later line (last write
//! wins). Decorators, default arguments, and nested expressions are only
//! ever inspected as syntax.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tree_sitter::Node;

use crate::error::{ProviderError, Result};

/// Extract `table name -> declaration line` for one file.
///
/// Fails if the file cannot be read or is not valid Python syntax; the
/// caller decides whether a parse failure aborts the whole run.
pub fn extract_tables(path: &Path) -> Result<IndexMap<String, u32>> {
    let source = fs::read_to_string(path)?;
    extract_from_source(&source).map_err(|message| ProviderError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Extraction over in-memory source, line numbers 1-based.
pub fn extract_from_source(source: &str) -> std::result::Result<IndexMap<String, u32>, String> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|err| err.to_string())?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| "parser produced no syntax tree".to_string())?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(first_error_message(root));
    }

    let mut tables = IndexMap::new();
    visit(root, source, &mut tables);
    Ok(tables)
}

/// tree-sitter is error-tolerant, so malformed input surfaces as ERROR or
/// missing nodes in an otherwise well-formed tree. Report the first one.
fn first_error_message(root: Node<'_>) -> String {
    let mut cursor = root.walk();
    let mut node = root;
    'descend: loop {
        for child in node.children(&mut cursor) {
            if child.has_error() {
                if child.is_error() || child.is_missing() {
                    return format!("invalid syntax at line {}", child.start_position().row + 1);
                }
                node = child;
                continue 'descend;
            }
        }
        return "invalid syntax".to_string();
    }
}

fn visit(node: Node<'_>, source: &str, tables: &mut IndexMap<String, u32>) {
    match node.kind() {
        "class_definition" => {
            if let Some((name, line)) = class_table(node, source) {
                tables.insert(name, line);
            }
        }
        "call" => {
            if let Some((name, line)) = call_table(node, source) {
                tables.insert(name, line);
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, tables);
    }
}

/// `class User(Base):` with a `__tablename__ = "user_account"` body
/// statement. Returns the class statement's line.
fn class_table(node: Node<'_>, source: &str) -> Option<(String, u32)> {
    let body = node.child_by_field_name("body")?;
    let line = node.start_position().row as u32 + 1;
    let mut cursor = body.walk();
    for statement in body.named_children(&mut cursor) {
        if statement.kind() != "expression_statement" {
            continue;
        }
        let Some(assignment) = statement.named_child(0) else {
            continue;
        };
        if assignment.kind() != "assignment" {
            continue;
        }
        let Some(left) = assignment.child_by_field_name("left") else {
            continue;
        };
        if left.kind() != "identifier" || node_text(left, source) != "__tablename__" {
            continue;
        }
        let name = assignment
            .child_by_field_name("right")
            .and_then(|right| string_literal(right, source));
        if let Some(name) = name {
            return Some((name, line));
        }
    }
    None
}

/// `Table("user_account", metadata, ...)` or `sa.Table("user_account", ...)`.
/// Returns the call's own line.
fn call_table(node: Node<'_>, source: &str) -> Option<(String, u32)> {
    let function = node.child_by_field_name("function")?;
    let is_table_call = match function.kind() {
        "identifier" => node_text(function, source) == "Table",
        "attribute" => function
            .child_by_field_name("attribute")
            .map(|attr| node_text(attr, source) == "Table")
            .unwrap_or(false),
        _ => false,
    };
    if !is_table_call {
        return None;
    }
    let arguments = node.child_by_field_name("arguments")?;
    let first = arguments.named_child(0)?;
    let name = string_literal(first, source)?;
    Some((name, node.start_position().row as u32 + 1))
}

/// Plain string literal text, with quotes stripped and escape sequences
/// evaluated. F-strings and other interpolated forms are not literals and
/// yield `None`.
fn string_literal(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut text = String::new();
    let mut cursor = node.walk();
    for part in node.named_children(&mut cursor) {
        match part.kind() {
            // tree-sitter-python nests escape_sequence nodes inside
            // string_content; splice their evaluated text into the raw spans.
            "string_content" => {
                let mut pos = part.start_byte();
                let mut inner = part.walk();
                for piece in part.named_children(&mut inner) {
                    text.push_str(&source[pos..piece.start_byte()]);
                    if piece.kind() == "escape_sequence" {
                        text.push_str(&unescape_sequence(node_text(piece, source)));
                    } else {
                        text.push_str(node_text(piece, source));
                    }
                    pos = piece.end_byte();
                }
                text.push_str(&source[pos..part.end_byte()]);
            }
            "escape_sequence" => text.push_str(&unescape_sequence(node_text(part, source))),
            "string_start" | "string_end" => {}
            _ => return None,
        }
    }
    Some(text)
}

/// Evaluate one Python escape sequence (`\n`, `\x5f`, `\101`, ...).
/// Unrecognized escapes keep their literal text, as Python does.
fn unescape_sequence(raw: &str) -> String {
    let mut rest = raw.chars();
    if rest.next() != Some('\\') {
        return raw.to_string();
    }
    let Some(marker) = rest.next() else {
        return raw.to_string();
    };
    let decoded = match marker {
        '\\' => Some('\\'),
        '\'' => Some('\''),
        '"' => Some('"'),
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        'a' => Some('\u{7}'),
        'b' => Some('\u{8}'),
        'v' => Some('\u{b}'),
        'f' => Some('\u{c}'),
        // backslash-newline is a line continuation, contributing nothing
        '\n' => return String::new(),
        'x' | 'u' | 'U' => {
            let digits: String = rest.collect();
            return u32::from_str_radix(&digits, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| raw.to_string());
        }
        '0'..='7' => {
            let mut digits = String::from(marker);
            digits.extend(rest);
            return u32::from_str_radix(&digits, 8)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| raw.to_string());
        }
        _ => None,
    };
    decoded.map(String::from).unwrap_or_else(|| raw.to_string())
}

fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}
