//! Part search over the loaded scene

use std::ops::Range;

use crate::part::PartId;
use crate::registry::SceneRegistry;

/// Icon hint for a search result, picked from the part name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartIcon {
    Heart,
    Brain,
    Lungs,
    Liver,
    Kidney,
    Bone,
    Muscle,
    Nerve,
    Vessel,
    Generic,
}

impl PartIcon {
    pub fn for_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        let has = |s: &str| lower.contains(s);
        if has("heart") {
            PartIcon::Heart
        } else if has("brain") {
            PartIcon::Brain
        } else if has("lung") {
            PartIcon::Lungs
        } else if has("liver") {
            PartIcon::Liver
        } else if has("kidney") {
            PartIcon::Kidney
        } else if has("bone") {
            PartIcon::Bone
        } else if has("muscle") {
            PartIcon::Muscle
        } else if has("nerve") {
            PartIcon::Nerve
        } else if has("artery") || has("vein") {
            PartIcon::Vessel
        } else {
            PartIcon::Generic
        }
    }

    /// Short glyph for text-only surfaces
    pub fn glyph(&self) -> &'static str {
        match self {
            PartIcon::Heart => "♥",
            PartIcon::Brain | PartIcon::Nerve => "⚡",
            PartIcon::Lungs => "≋",
            PartIcon::Liver | PartIcon::Kidney => "◗",
            PartIcon::Bone => "⊥",
            PartIcon::Muscle => "≡",
            PartIcon::Vessel => "∿",
            PartIcon::Generic => "•",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchEntry {
    pub name: String,
    /// Owning system
    pub category: String,
    pub part: PartId,
    pub icon: PartIcon,
}

/// Read-only projection of the registry, rebuilt for each query
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<SearchEntry>,
}

impl SearchIndex {
    pub fn build(registry: &SceneRegistry) -> Self {
        let entries = registry
            .all_parts()
            .map(|part| {
                let name = part.display_name().to_string();
                SearchEntry {
                    icon: PartIcon::for_name(&name),
                    name,
                    category: part.system.clone(),
                    part: part.id,
                }
            })
            .collect();
        Self { entries }
    }

    /// Entries whose name or category contains the query, ignoring case.
    /// A blank query matches nothing.
    pub fn query(&self, query: &str) -> Vec<SearchEntry> {
        let needle = normalize_query(query);
        if needle.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&needle) || e.category.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Byte ranges of every non-overlapping case-insensitive occurrence of
/// `query` in `text`. Ranges always fall on char boundaries of `text`.
pub fn match_ranges(text: &str, query: &str) -> Vec<Range<usize>> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return Vec::new();
    }

    // Lowercasing can change byte lengths, so remember which source char
    // produced every byte of the folded text
    let mut folded = String::with_capacity(text.len());
    let mut origin: Vec<Range<usize>> = Vec::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        let span = i..i + c.len_utf8();
        for lower in c.to_lowercase() {
            folded.push(lower);
            origin.extend((0..lower.len_utf8()).map(|_| span.clone()));
        }
    }

    let mut ranges: Vec<Range<usize>> = Vec::new();
    let mut from = 0;
    while let Some(pos) = folded[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();
        let range = origin[start].start..origin[end - 1].end;
        if ranges.last().is_none_or(|last| last.end <= range.start) {
            ranges.push(range);
        }
        from = end;
    }
    ranges
}

/// Keyboard focus within a result list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchCursor {
    focus: Option<usize>,
}

impl SearchCursor {
    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn down(&mut self, len: usize) {
        if len == 0 {
            self.focus = None;
            return;
        }
        self.focus = Some(match self.focus {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        });
    }

    pub fn up(&mut self, len: usize) {
        if len == 0 {
            self.focus = None;
            return;
        }
        self.focus = Some(self.focus.map_or(0, |i| i.saturating_sub(1)));
    }

    /// Index to activate on Enter, if one is focused and still in range
    pub fn enter(&self, len: usize) -> Option<usize> {
        self.focus.filter(|&i| i < len)
    }

    pub fn reset(&mut self) {
        self.focus = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::Appearance;
    use crate::part::{Aabb, PartDraft};
    use bevy_math::Vec3;

    fn registry() -> SceneRegistry {
        let mut registry = SceneRegistry::new();
        for (name, system) in [
            ("Heart", "visceral"),
            ("Femoral Artery", "arterial"),
            ("Femur", "skeletal"),
            ("Left Kidney", "visceral"),
        ] {
            registry.register(
                PartDraft {
                    name: name.to_string(),
                    parent_name: None,
                    appearance: Appearance::default(),
                    bounds: Aabb::new(Vec3::ZERO, Vec3::ONE),
                    surface: None,
                },
                system,
                false,
            );
        }
        registry
    }

    #[test]
    fn test_query_name_and_category() {
        let index = SearchIndex::build(&registry());
        let names: Vec<String> = index.query("  FEM ").into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Femoral Artery", "Femur"]);

        let visceral: Vec<String> = index.query("visc").into_iter().map(|e| e.name).collect();
        assert_eq!(visceral, vec!["Heart", "Left Kidney"]);

        assert!(index.query("   ").is_empty());
        assert!(index.query("spleen").is_empty());
    }

    #[test]
    fn test_icons() {
        assert_eq!(PartIcon::for_name("Heart"), PartIcon::Heart);
        assert_eq!(PartIcon::for_name("Left Lung"), PartIcon::Lungs);
        assert_eq!(PartIcon::for_name("Portal Vein"), PartIcon::Vessel);
        assert_eq!(PartIcon::for_name("Sciatic Nerve"), PartIcon::Nerve);
        assert_eq!(PartIcon::for_name("Thymus"), PartIcon::Generic);
    }

    #[test]
    fn test_match_ranges() {
        assert_eq!(match_ranges("Femoral Artery", "fem"), vec![0..3]);
        assert_eq!(match_ranges("Banana", "AN"), vec![1..3, 3..5]);
        assert!(match_ranges("Heart", "").is_empty());
    }

    #[test]
    fn test_match_ranges_non_ascii_capitals() {
        let text = "Éminence İliaca";
        assert_eq!(match_ranges(text, "émi"), vec![0..4]);
        assert_eq!(&text[0..4], "Émi");
        // 'İ' folds to two chars; the range still covers the whole source char
        let ranges = match_ranges(text, "i\u{307}li");
        assert_eq!(ranges, vec![10..14]);
        assert_eq!(&text[10..14], "İli");
        assert_eq!(match_ranges("ÄRM ärm", "ärm"), vec![0..4, 5..9]);
    }

    #[test]
    fn test_cursor_navigation() {
        let mut cursor = SearchCursor::default();
        assert_eq!(cursor.enter(3), None);

        cursor.down(3);
        assert_eq!(cursor.focus(), Some(0));
        cursor.down(3);
        cursor.down(3);
        cursor.down(3);
        assert_eq!(cursor.focus(), Some(2));
        cursor.up(3);
        assert_eq!(cursor.enter(3), Some(1));
        assert_eq!(cursor.enter(1), None);

        cursor.reset();
        cursor.up(3);
        assert_eq!(cursor.focus(), Some(0));
    }
}
