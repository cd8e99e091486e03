//! Path-to-page-name mapping.
//!
//! A relative document path below the documentation root maps to a canonical
//! wiki page identifier. The mapping is pure and deterministic, and it is a
//! fixed point: feeding a produced identifier back in yields the identifier
//! unchanged. It is not injective (`A_B.md` and `A-B.md` both normalize to
//! `A-B`), so callers that process document sets must collision-check via
//! [`map_directory_structure`] or the planner rather than assume uniqueness.

use std::collections::BTreeMap;

use crate::error::{Result, SyncError};

/// File suffixes recognized as markdown documents.
pub const MARKDOWN_EXTENSIONS: &[&str] = &[".md", ".markdown"];

/// Characters the remote wiki namespace cannot represent inside a segment.
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Map a relative document path to its canonical page identifier.
///
/// The input is `/`-separated (the indexer normalizes OS separators before
/// mapping, so a literal backslash here is document-name content, not a
/// separator). The markdown extension is stripped from the final segment
/// only, each segment is normalized (reserved characters and
/// space/underscore/hyphen runs become a single hyphen, hyphen-delimited
/// words are title-cased) and segments are joined with `/`.
pub fn map_path(relative_path: &str) -> Result<String> {
    let segments: Vec<&str> = relative_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(SyncError::InvalidPath {
            segment: String::new(),
            path: relative_path.to_string(),
        });
    }

    let last = segments.len() - 1;
    let mut mapped = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let raw = if index == last {
            strip_markdown_extension(segment)
        } else {
            segment
        };
        let page = normalize_segment(raw).ok_or_else(|| SyncError::InvalidPath {
            segment: (*segment).to_string(),
            path: relative_path.to_string(),
        })?;
        mapped.push(page);
    }
    Ok(mapped.join("/"))
}

/// Build the directory-to-pages structural index over a set of relative
/// document paths, in mapped-identifier order per directory.
///
/// The empty string keys pages that live directly under the documentation
/// root. Fails with `MappingCollision` when two distinct paths normalize to
/// the same identifier.
pub fn map_directory_structure<I, S>(relative_paths: I) -> Result<BTreeMap<String, Vec<String>>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sources: BTreeMap<String, String> = BTreeMap::new();
    let mut structure: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for path in relative_paths {
        let path = path.as_ref();
        let identifier = map_path(path)?;
        if let Some(first) = sources.get(&identifier) {
            return Err(SyncError::MappingCollision {
                identifier,
                first: first.clone(),
                second: path.to_string(),
            });
        }
        sources.insert(identifier.clone(), path.to_string());

        let directory = match identifier.rfind('/') {
            Some(index) => identifier[..index].to_string(),
            None => String::new(),
        };
        structure.entry(directory).or_default().push(identifier);
    }

    for pages in structure.values_mut() {
        pages.sort();
    }
    Ok(structure)
}

fn strip_markdown_extension(segment: &str) -> &str {
    for extension in MARKDOWN_EXTENSIONS {
        if segment.len() > extension.len()
            && segment.to_ascii_lowercase().ends_with(extension)
        {
            return &segment[..segment.len() - extension.len()];
        }
    }
    segment
}

/// Normalize one path segment into a page-name segment, or `None` when
/// nothing representable remains (a name made entirely of reserved or
/// separator characters).
fn normalize_segment(segment: &str) -> Option<String> {
    let mut collapsed = String::with_capacity(segment.len());
    let mut pending_hyphen = false;
    for ch in segment.chars() {
        let ch = if RESERVED_CHARS.contains(&ch) { '-' } else { ch };
        if ch == ' ' || ch == '_' || ch == '-' {
            pending_hyphen = true;
            continue;
        }
        if pending_hyphen && !collapsed.is_empty() {
            collapsed.push('-');
        }
        pending_hyphen = false;
        collapsed.push(ch);
    }
    if collapsed.is_empty() {
        return None;
    }

    let titled = collapsed
        .split('-')
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join("-");
    Some(titled)
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
