//! Frequency to equal-tempered note conversion.
//!
//! MIDI note 69 is A4 at the concert pitch (440 Hz unless configured
//! otherwise). There are 100 cents between neighbouring notes, so a deviation
//! outside +/-50 cents means the frequency is closer to another note.

use serde::Serialize;

pub const DEFAULT_CONCERT_PITCH: f32 = 440.0;

const OCTAVE_LENGTH: f32 = 12.0;
const A4_MIDI: i32 = 69;

pub const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Nearest note to a detected frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub name: &'static str,
    pub octave: i32,
    pub midi: i32,
    /// Deviation from the note's exact frequency, floored to whole cents.
    pub cents: i32,
}

/// MIDI number of the nearest note.
pub fn note_number(frequency: f32, concert_pitch: f32) -> i32 {
    let semitones = OCTAVE_LENGTH * (frequency / concert_pitch).log2();
    (semitones.round() as i32).saturating_add(A4_MIDI)
}

pub fn frequency_of(midi: i32, concert_pitch: f32) -> f32 {
    concert_pitch * 2f32.powf((midi - A4_MIDI) as f32 / OCTAVE_LENGTH)
}

pub fn cents_off(frequency: f32, midi: i32, concert_pitch: f32) -> i32 {
    (OCTAVE_LENGTH * 100.0 * (frequency / frequency_of(midi, concert_pitch)).log2()).floor() as i32
}

impl Note {
    /// `None` for frequencies that cannot be a pitch (sentinels, zero, NaN).
    pub fn from_frequency(frequency: f32, concert_pitch: f32) -> Option<Self> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return None;
        }
        let midi = note_number(frequency, concert_pitch);
        Some(Self {
            name: NOTE_NAMES[midi.rem_euclid(12) as usize],
            octave: midi.div_euclid(12) - 1,
            midi,
            cents: cents_off(frequency, midi, concert_pitch),
        })
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{} {:+}c", self.name, self.octave, self.cents)
    }
}
