//! Theme metadata files.
//!
//! Line-oriented `key=value` text in the Java properties dialect: `#`/`!`
//! comments, `=`, `:` or whitespace as separator, trailing-backslash line
//! continuation and backslash escapes (including `\uXXXX`).

use std::collections::HashMap;
use std::path::Path;

use crate::error::CatalogError;

/// Recognised metadata of one theme. Missing keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

impl ThemeMetadata {
    /// Reads and parses a metadata file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path).map_err(|e| CatalogError::io(path, e))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(Self::from_properties(parse_properties(&text)))
    }

    /// Picks the recognised keys out of a parsed property map.
    pub fn from_properties(mut props: HashMap<String, String>) -> Self {
        Self {
            name: props.remove("name"),
            description: props.remove("description"),
            author: props.remove("author"),
        }
    }

    /// Display name, falling back to the theme id.
    pub fn name_or(&self, id: &str) -> String {
        self.name.clone().unwrap_or_else(|| id.to_string())
    }

    /// Description, falling back to the theme id.
    pub fn description_or(&self, id: &str) -> String {
        self.description.clone().unwrap_or_else(|| id.to_string())
    }

    /// Author, falling back to the theme id.
    pub fn author_or(&self, id: &str) -> String {
        self.author.clone().unwrap_or_else(|| id.to_string())
    }
}

/// Parses properties text into a key/value map. Later keys win.
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    let mut lines = text.lines();

    while let Some(raw) = lines.next() {
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let mut logical = line.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        props.insert(unescape(key), unescape(value));
    }

    props
}

/// A line continues when it ends in an odd number of backslashes.
fn ends_with_continuation(line: &str) -> bool {
    line.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let bytes = line.as_bytes();
    let mut key_end = bytes.len();
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'=' | b':' | b' ' | b'\t' | b'\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t', '\x0c']);
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    (key, rest.trim_start_matches([' ', '\t', '\x0c']))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    _ => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}
