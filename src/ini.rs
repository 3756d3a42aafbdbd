//! # Song Index Parser
//!
//! Parses the line-oriented song index: numeric bracketed section headers,
//! each followed by `field = value` lines.
//!
//! ```text
//! ; comment
//! [10001]
//! arquivo = 10001.mp4
//! artista = Some Artist
//! musica  = Some Title
//! inicio  = First words of the song
//! ```
//!
//! Parsing never fails on content: blank lines and `;` comments are skipped,
//! field lines before the first header are dropped, lines without `=` are
//! ignored. A repeated header restarts its record.

use log::{debug, trace};
use std::collections::BTreeMap;

/// Fields of one section by name; a repeated name keeps the last value.
pub type Fields = BTreeMap<String, String>;

/// Result of parsing an index document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    /// Section key (the digits between the brackets) to its fields.
    pub sections: BTreeMap<String, Fields>,
    /// Field lines dropped because no section was open yet.
    pub orphan_lines: usize,
    /// Lines that were neither blank nor comments.
    pub content_lines: usize,
}

impl IndexDocument {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Parse index text into sections.
pub fn parse(content: &str) -> IndexDocument {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut doc = IndexDocument::default();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        doc.content_lines += 1;

        if let Some(key) = section_header(line) {
            trace!("Opening section [{key}]");
            doc.sections.insert(key.to_string(), Fields::new());
            current = Some(key.to_string());
            continue;
        }

        let Some((name, value)) = split_field(line) else {
            trace!("Ignoring line without field: {line}");
            continue;
        };

        match current.as_ref().and_then(|key| doc.sections.get_mut(key)) {
            Some(fields) => {
                fields.insert(name.to_string(), value.to_string());
            }
            None => {
                debug!("Dropping field {name:?} outside of any section");
                doc.orphan_lines += 1;
            }
        }
    }

    doc
}

/// Returns the digits of a `[<digits>]` line.
fn section_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
        Some(inner)
    } else {
        None
    }
}

/// Split on the first `=`; the value keeps any further `=` characters.
fn split_field(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}
