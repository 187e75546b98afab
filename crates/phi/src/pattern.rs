//! Pattern parsing.
//!
//! A routing pattern is a `/`-rooted template. Each `/`-delimited
//! segment is either literal bytes, a `{name}` parameter binding one
//! path segment, or a terminal `*` binding the remainder of the path.

use std::mem;

use crate::error::{Result, RouterError};

/// One parsed unit of a pattern. Consecutive literal segments are
/// merged into a single static run (separators included) so the tree
/// can graft them as one radix edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Static(Vec<u8>),
    Param(String),
    CatchAll,
}

/// Splits `pattern` into segments, validating the grammar.
pub(crate) fn parse(pattern: &str) -> Result<Vec<Segment>> {
    if !pattern.starts_with('/') {
        return Err(RouterError::PatternMissingLeadingSlash(pattern.to_owned()));
    }

    let parts: Vec<&str> = pattern.split('/').collect();
    let mut segments = Vec::new();
    let mut run: Vec<u8> = Vec::new();
    let mut names: Vec<&str> = Vec::new();

    // parts[0] is the empty string before the leading slash
    for (i, part) in parts.iter().enumerate().skip(1) {
        run.push(b'/');
        if part.contains('{') || part.contains('}') {
            let name = part
                .strip_prefix('{')
                .and_then(|p| p.strip_suffix('}'))
                .filter(|name| !name.contains('{') && !name.contains('}'))
                .ok_or_else(|| RouterError::MalformedParam(pattern.to_owned()))?;
            if !is_valid_name(name) {
                return Err(RouterError::InvalidParamName {
                    name: name.to_owned(),
                    pattern: pattern.to_owned(),
                });
            }
            if names.contains(&name) {
                return Err(RouterError::DuplicateParamName {
                    name: name.to_owned(),
                    pattern: pattern.to_owned(),
                });
            }
            names.push(name);
            segments.push(Segment::Static(mem::take(&mut run)));
            segments.push(Segment::Param(name.to_owned()));
        } else if part.contains('*') {
            if *part != "*" || i != parts.len() - 1 {
                return Err(RouterError::WildcardNotLast(pattern.to_owned()));
            }
            segments.push(Segment::Static(mem::take(&mut run)));
            segments.push(Segment::CatchAll);
        } else {
            run.extend_from_slice(part.as_bytes());
        }
    }

    if !run.is_empty() {
        segments.push(Segment::Static(run));
    }
    Ok(segments)
}

// Parameter names match [A-Za-z_][A-Za-z0-9_]*.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
