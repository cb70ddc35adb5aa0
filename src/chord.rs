//! Chord Identifier
//!
//! Names a chord from a handful of detected notes by matching their pitch
//! classes against an ordered table of interval templates.

use crate::note::{Note, NoteName, SEMITONES};
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Built-in templates in match priority order. Intervals are semitones above the root.
#[rustfmt::skip]
const DEFAULT_TEMPLATES: &[(&str, &[u8])] = &[
    ("Major",      &[0, 4, 7]),
    ("Minor",      &[0, 3, 7]),
    ("Diminished", &[0, 3, 6]),
    ("Augmented",  &[0, 4, 8]),
    ("Major 7",    &[0, 4, 7, 11]),
    ("Minor 7",    &[0, 3, 7, 10]),
    ("Dominant 7", &[0, 4, 7, 10]),
    ("Sus 2",      &[0, 2, 7]),
    ("Sus 4",      &[0, 5, 7]),
    ("Major 6",    &[0, 4, 7, 9]),
    ("Minor 6",    &[0, 3, 7, 9]),
    ("9th",        &[0, 4, 7, 10, 2]),
    ("Major 9",    &[0, 4, 7, 11, 2]),
    ("Minor 9",    &[0, 3, 7, 10, 2]),
    ("Add 9",      &[0, 4, 7, 2]),
    ("7sus4",      &[0, 5, 7, 10]),
];

/// A named set of intervals above an assumed root.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChordTemplate {
    /// Chord type, e.g. `"Minor 7"`.
    pub name: String,
    /// Semitone offsets from the root, `0` included.
    pub intervals: Vec<u8>,
}

impl ChordTemplate {
    /// Create a template.
    pub fn new(name: impl Into<String>, intervals: impl Into<Vec<u8>>) -> Self {
        ChordTemplate {
            name: name.into(),
            intervals: intervals.into(),
        }
    }
}

/// The built-in template table, in priority order.
pub fn default_templates() -> Vec<ChordTemplate> {
    DEFAULT_TEMPLATES
        .iter()
        .map(|&(name, intervals)| ChordTemplate::new(name, intervals))
        .collect()
}

/// A chord named from a set of notes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChordMatch {
    /// Root pitch class.
    pub root: NoteName,
    /// Template name, e.g. `"Dominant 7"`.
    pub kind: String,
    /// The matched template's intervals.
    pub intervals: Vec<u8>,
    /// Distinct pitch classes of the input notes, in first-seen order.
    pub detected: Vec<NoteName>,
}

impl ChordMatch {
    /// Root and type, e.g. `"C Major"`.
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl Display for ChordMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.root, self.kind)
    }
}

/// Interval-template chord matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordIdentifier {
    templates: Vec<ChordTemplate>,
}

impl ChordIdentifier {
    /// Identifier using [`default_templates`].
    pub fn new() -> Self {
        Self::with_templates(default_templates())
    }

    /// Identifier using a custom template table. Earlier templates win ties.
    pub fn with_templates(templates: Vec<ChordTemplate>) -> Self {
        ChordIdentifier { templates }
    }

    /// The template table in priority order.
    pub fn templates(&self) -> &[ChordTemplate] {
        &self.templates
    }

    /// Name the chord formed by `notes`, or `None` with fewer than two notes
    /// or when no template fits.
    ///
    /// Roots are tried lowest frequency first. A template fits when all of
    /// its intervals are present above the root; among fits, more intervals
    /// wins, and the first root/template pair to reach a size keeps it.
    pub fn identify(&self, notes: &[Note]) -> Option<ChordMatch> {
        if notes.len() < 2 {
            return None;
        }

        let mut present = [false; SEMITONES];
        for n in notes {
            present[n.name.index()] = true;
        }

        let mut by_frequency: Vec<&Note> = notes.iter().collect();
        by_frequency.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));

        let mut best: Option<(usize, NoteName, &ChordTemplate)> = None;
        for root in by_frequency.iter().map(|n| n.name) {
            // 1) offsets above this root
            let mut offsets = [false; SEMITONES];
            for class in (0..SEMITONES).filter(|&c| present[c]) {
                offsets[(class + SEMITONES - root.index()) % SEMITONES] = true;
            }

            // 2) templates fully contained in the offsets
            for template in &self.templates {
                let fits = template
                    .intervals
                    .iter()
                    .all(|&i| offsets.get(i as usize).copied().unwrap_or(false));
                if !fits {
                    continue;
                }
                let grade = template.intervals.len();
                let better = match best {
                    Some((g, _, _)) => grade > g,
                    None => true,
                };
                if better {
                    best = Some((grade, root, template));
                }
            }
        }

        let (_, root, template) = best?;
        let mut detected: Vec<NoteName> = Vec::with_capacity(SEMITONES);
        for n in notes {
            if !detected.contains(&n.name) {
                detected.push(n.name);
            }
        }

        Some(ChordMatch {
            root,
            kind: template.name.clone(),
            intervals: template.intervals.clone(),
            detected,
        })
    }
}

impl Default for ChordIdentifier {
    fn default() -> Self {
        ChordIdentifier::new()
    }
}
