//! Tunings
//!
//! Named string tunings and custom tuning text, turned into the `Target`
//! list searched by the targeted detector.

use crate::note::{midi_to_frequency, NoteName, SEMITONES};
use crate::targets::Target;
use thiserror::Error;

/// Errors when building a tuning
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TuningError {
    /// None of the comma separated entries was a note like `E2` or `c#4`.
    #[error("no valid notes in `{input}` (expected e.g. \"E4, B3, G3, D3, A2, E2\")")]
    NoValidNotes {
        /// The rejected input.
        input: String,
    },
}

/// One string of a tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningString {
    /// String number; 1 is the highest string.
    pub id: u32,
    /// Label as written, e.g. `"e"` for the high E string.
    pub label: String,
    /// MIDI note number of the open string.
    pub midi: i32,
}

impl TuningString {
    fn new(id: u32, label: &str, midi: i32) -> Self {
        TuningString {
            id,
            label: label.to_string(),
            midi,
        }
    }
}

/// An ordered set of open-string pitches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuning {
    name: String,
    strings: Vec<TuningString>,
}

/// Keys accepted by [`Tuning::preset`], in display order.
pub const PRESET_KEYS: [&str; 7] = [
    "standard",
    "drop_d",
    "open_g",
    "eb_standard",
    "open_esus2",
    "dadgad",
    "rain_song",
];

/// (label, midi) from the lowest (id 6) to the highest (id 1) string
type PresetStrings = [(&'static str, i32); 6];

#[rustfmt::skip]
const PRESETS: [(&str, PresetStrings); 7] = [
    ("standard",    [("E", 40), ("A", 45), ("D", 50), ("G", 55), ("B", 59), ("e", 64)]),
    ("drop_d",      [("D", 38), ("A", 45), ("D", 50), ("G", 55), ("B", 59), ("e", 64)]),
    ("open_g",      [("D", 38), ("G", 43), ("D", 50), ("G", 55), ("B", 59), ("d", 62)]),
    ("eb_standard", [("D#", 39), ("G#", 44), ("C#", 49), ("F#", 54), ("A#", 58), ("d#", 63)]),
    ("open_esus2",  [("E", 40), ("B", 47), ("E", 52), ("F#", 54), ("B", 59), ("e", 64)]),
    ("dadgad",      [("D", 38), ("A", 45), ("D", 50), ("G", 55), ("A", 57), ("d", 62)]),
    ("rain_song",   [("D", 38), ("G", 43), ("C", 48), ("G", 55), ("C", 60), ("d", 62)]),
];

impl Tuning {
    /// A tuning from explicit strings.
    pub fn new(name: impl Into<String>, strings: Vec<TuningString>) -> Self {
        Tuning {
            name: name.into(),
            strings,
        }
    }

    /// Look up a built-in six-string tuning by key (see [`PRESET_KEYS`]).
    pub fn preset(key: &str) -> Option<Tuning> {
        PRESETS
            .iter()
            .find(|(name, _)| *name == key)
            .map(Self::from_preset)
    }

    /// Standard guitar tuning, E2 A2 D3 G3 B3 E4.
    pub fn standard() -> Tuning {
        Self::from_preset(&PRESETS[0])
    }

    fn from_preset((name, strings): &(&str, PresetStrings)) -> Tuning {
        let strings = strings
            .iter()
            .zip((1..=6).rev())
            .map(|(&(label, midi), id)| TuningString::new(id, label, midi))
            .collect();
        Tuning::new(*name, strings)
    }

    /// Parse a comma separated note list such as `"E4, B3, G3, D3, A2, E2"`.
    ///
    /// Each entry is a letter `a`-`g` (either case), an optional `#` and a
    /// single octave digit. Entries that don't match are skipped. Ids count
    /// down from the number of entries, so the first entry is string N.
    pub fn parse_custom(text: &str) -> Result<Tuning, TuningError> {
        let entries: Vec<&str> = text.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        let count = entries.len() as u32;

        let strings: Vec<TuningString> = entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let (label, midi) = parse_entry(entry)?;
                Some(TuningString {
                    id: count - index as u32,
                    label: label.to_string(),
                    midi,
                })
            })
            .collect();

        if strings.is_empty() {
            return Err(TuningError::NoValidNotes {
                input: text.to_string(),
            });
        }
        Ok(Tuning::new("custom", strings))
    }

    /// Name of the tuning (preset key or `"custom"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strings in declaration order.
    pub fn strings(&self) -> &[TuningString] {
        &self.strings
    }

    /// Target frequencies for every string at the given A4 reference.
    pub fn targets(&self, reference_pitch: f32) -> Vec<Target> {
        self.strings
            .iter()
            .map(|s| Target::new(s.id, s.label.clone(), midi_to_frequency(s.midi, reference_pitch)))
            .collect()
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::standard()
    }
}

/// `"c#4"` -> (`"c#"`, 61). Returns the label as written.
fn parse_entry(entry: &str) -> Option<(&str, i32)> {
    if !entry.is_ascii() || !(2..=3).contains(&entry.len()) {
        return None;
    }
    let (label, digit) = entry.split_at(entry.len() - 1);
    let octave: i32 = digit.parse().ok()?;

    let mut chars = label.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !('A'..='G').contains(&letter) {
        return None;
    }
    let sharp = match chars.next() {
        None => false,
        Some('#') => true,
        Some(_) => return None,
    };
    // B# and E# are spelled as the next natural, octave unchanged
    let pitch_class = match (letter, sharp) {
        ('B', true) => NoteName::C,
        ('E', true) => NoteName::F,
        _ => label.parse::<NoteName>().ok()?,
    };

    Some((label, (octave + 1) * SEMITONES as i32 + pitch_class.index() as i32))
}
