//! Sanitizer - Turns display names into unique block labels

use std::collections::{BTreeMap, BTreeSet};

use crate::resource::{LabeledMeta, ResourceIdMetaMap, SanitizedResourceMap};

const FNV32_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV32_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1 hash
fn fnv32(data: &[u8]) -> u32 {
    data.iter().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        hash.wrapping_mul(FNV32_PRIME) ^ u32::from(*byte)
    })
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn replace_unsafe(s: &str) -> String {
    s.chars()
        .map(|c| if is_label_char(c) { c } else { '_' })
        .collect()
}

/// Convert a display name into a Terraform identifier.
///
/// Unsafe characters become `_`. When anything was replaced, a hash of the
/// original name is appended so that names differing only in replaced
/// characters stay apart. Labels always start with a letter or `_`.
pub fn sanitize_label(name: &str) -> String {
    if name.is_empty() {
        return "resource".to_string();
    }

    let mut label = replace_unsafe(name);
    if label != name {
        label = format!("{}_{}", label, fnv32(name.as_bytes()));
    }
    if !label.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        label.insert(0, '_');
    }
    label
}

/// Assigns labels to every object of one resource type
#[derive(Debug, Clone)]
pub struct Sanitizer {
    /// Initial length of the ID fragment used to break ties
    pub fragment_len: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self { fragment_len: 8 }
    }
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label every object in the map. Labels are unique within the map and
    /// depend only on its contents.
    pub fn sanitize(&self, objects: &ResourceIdMetaMap) -> SanitizedResourceMap {
        let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for (id, meta) in objects {
            groups
                .entry(sanitize_label(&meta.name))
                .or_default()
                .push(id.as_str());
        }

        let mut labels: BTreeMap<&str, String> = BTreeMap::new();
        for (base, ids) in &groups {
            if let [id] = ids.as_slice() {
                labels.insert(*id, base.clone());
                continue;
            }
            for (id, fragment) in self.distinct_fragments(ids) {
                labels.insert(id, format!("{}_{}", base, fragment));
            }
        }

        // Tie-broken labels may still clash with another object's base label
        let mut used = BTreeSet::new();
        let mut sanitized = SanitizedResourceMap::new();
        for (id, meta) in objects {
            let base = labels
                .remove(id.as_str())
                .unwrap_or_else(|| sanitize_label(&meta.name));
            let mut label = base.clone();
            let mut ordinal = 2;
            while used.contains(&label) {
                label = format!("{}_{}", base, ordinal);
                ordinal += 1;
            }
            used.insert(label.clone());
            sanitized.insert(
                id.clone(),
                LabeledMeta {
                    label,
                    meta: meta.clone(),
                },
            );
        }
        sanitized
    }

    /// Shortest ID prefixes (at least `fragment_len` long) that tell the IDs apart
    fn distinct_fragments<'a>(&self, ids: &[&'a str]) -> Vec<(&'a str, String)> {
        let safe: Vec<String> = ids.iter().map(|id| replace_unsafe(id)).collect();
        let longest = safe.iter().map(|s| s.chars().count()).max().unwrap_or(0);

        let mut len = self.fragment_len.max(1);
        loop {
            let fragments: Vec<String> = safe.iter().map(|s| s.chars().take(len).collect()).collect();
            let distinct: BTreeSet<&String> = fragments.iter().collect();
            if distinct.len() == fragments.len() || len >= longest {
                return ids.iter().copied().zip(fragments).collect();
            }
            len += 4;
        }
    }
}
