// src/cfg.rs

//! Ordered INI documents
//!
//! All on-disk manifests (`mpm.ini`, `pr.ini`, `package-manifests.ini`,
//! `.tpm` files and the flat `package.ini`) share one dialect: `[section]`
//! headers, `key=value` lines, and the multi-value form `key;=value` which
//! appends instead of replacing. Keys before any section header belong to
//! the unnamed section `""`. Section and key lookup is case-insensitive;
//! insertion order is preserved because section order is wire-visible.
//!
//! Lines starting with `;` are comments. A trailing `;;;ed25519:<base64>`
//! comment is the detached signature emitted by [`Document::write`] when a
//! signer is configured; the parser skips it like any other comment.

use crate::error::{Error, Result};
use crate::signing::Signer;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Document {
    sections: Vec<Section>,
}

#[derive(Debug, Clone)]
pub struct Section {
    name: String,
    entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    values: Vec<String>,
    multi: bool,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key.eq_ignore_ascii_case(key))
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|e| e.key.eq_ignore_ascii_case(key))
    }
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = Document::new();
        let mut current: Option<usize> = None;
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[') {
                let name = name
                    .strip_suffix(']')
                    .ok_or_else(|| Error::InvalidManifest(format!("bad section header: {}", line)))?;
                current = Some(doc.section_index(name));
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::InvalidManifest(format!("bad line: {}", line)))?;
            let idx = match current {
                Some(idx) => idx,
                None => {
                    let idx = doc.section_index("");
                    current = Some(idx);
                    idx
                }
            };
            if let Some(key) = key.strip_suffix(';') {
                doc.append_at(idx, key, value);
            } else {
                doc.put_at(idx, key, value);
            }
        }
        Ok(doc)
    }

    fn section_index(&mut self, name: &str) -> usize {
        if let Some(idx) = self
            .sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
        {
            return idx;
        }
        self.sections.push(Section {
            name: name.to_string(),
            entries: Vec::new(),
        });
        self.sections.len() - 1
    }

    fn put_at(&mut self, idx: usize, key: &str, value: &str) {
        match self.sections[idx].find_mut(key) {
            Some(entry) => {
                entry.values = vec![value.to_string()];
                entry.multi = false;
            }
            None => self.sections[idx].entries.push(Entry {
                key: key.to_string(),
                values: vec![value.to_string()],
                multi: false,
            }),
        }
    }

    fn append_at(&mut self, idx: usize, key: &str, value: &str) {
        match self.sections[idx].find_mut(key) {
            Some(entry) => {
                entry.values.push(value.to_string());
                entry.multi = true;
            }
            None => self.sections[idx].entries.push(Entry {
                key: key.to_string(),
                values: vec![value.to_string()],
                multi: true,
            }),
        }
    }

    /// Set a single-valued key, replacing any previous value(s).
    pub fn put(&mut self, section: &str, key: &str, value: impl AsRef<str>) {
        let idx = self.section_index(section);
        self.put_at(idx, key, value.as_ref());
    }

    /// Append one value to a multi-valued key.
    pub fn append(&mut self, section: &str, key: &str, value: impl AsRef<str>) {
        let idx = self.section_index(section);
        self.append_at(idx, key, value.as_ref());
    }

    /// First value of a key, if present.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?
            .find(key)?
            .values
            .first()
            .map(|s| s.as_str())
    }

    /// All values of a (multi-valued) key; empty when absent.
    pub fn get_all(&self, section: &str, key: &str) -> &[String] {
        self.section(section)
            .and_then(|s| s.find(key))
            .map(|e| e.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn delete_value(&mut self, section: &str, key: &str) {
        if let Some(sec) = self.section_mut(section) {
            sec.entries.retain(|e| !e.key.eq_ignore_ascii_case(key));
        }
    }

    pub fn delete_section(&mut self, name: &str) {
        self.sections.retain(|s| !s.name.eq_ignore_ascii_case(name));
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Number of sections (the unnamed section counts when present).
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Render the document. Sections appear in insertion order; the unnamed
    /// section, when present, is rendered first without a header.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if !section.name.is_empty() {
                if i > 0 {
                    out.push('\n');
                }
                let _ = writeln!(out, "[{}]", section.name);
            }
            for entry in &section.entries {
                if entry.multi {
                    for value in &entry.values {
                        let _ = writeln!(out, "{};={}", entry.key, value);
                    }
                } else {
                    let _ = writeln!(out, "{}={}", entry.key, entry.values[0]);
                }
            }
        }
        out
    }

    /// Write the document to disk, appending a detached signature comment
    /// when a signer is supplied.
    pub fn write(&self, path: &Path, signer: Option<&Signer>) -> Result<()> {
        let mut text = self.render();
        if let Some(signer) = signer {
            let line = signer.signature_line(text.as_bytes());
            text.push_str(&line);
            text.push('\n');
        }
        fs::write(path, text)?;
        Ok(())
    }
}
