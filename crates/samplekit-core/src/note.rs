//! Note names and frequency conversion.
//!
//! Names use scientific pitch notation: middle C is `C4`, `A4` is 440 Hz.

use crate::{Error, Result};

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Convert frequency to a fractional MIDI note number.
pub fn freq_to_midi(freq: f64) -> Result<f64> {
    if !(freq > 0.0) || !freq.is_finite() {
        return Err(Error::Domain { value: freq });
    }
    // MIDI note = 69 + 12 * log2(freq / 440)
    Ok(69.0 + 12.0 * (freq / 440.0).log2())
}

/// Convert a (possibly fractional) MIDI note number to Hz.
pub fn midi_to_freq(note: f64) -> f64 {
    440.0 * 2.0f64.powf((note - 69.0) / 12.0)
}

/// Name of the nearest equal-tempered note, in sharps.
pub fn midi_to_note(note: i32) -> String {
    let name = SHARP_NAMES[note.rem_euclid(12) as usize];
    let octave = note.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Nearest note name for a frequency, e.g. `261.6 -> "C4"`.
pub fn hz_to_note(freq: f64) -> Result<String> {
    let midi = freq_to_midi(freq).map_err(|_| Error::InvalidNote(format!("{} Hz", freq)))?;
    Ok(midi_to_note(midi.round() as i32))
}

/// Parse a note name into a MIDI note number.
///
/// Accepts `#`/`♯` and `b`/`♭` accidentals (repeatable) and negative
/// octaves, e.g. `"C#4"`, `"Bb-1"`, `"E♭3"`.
pub fn note_to_midi(name: &str) -> Result<i32> {
    let invalid = || Error::InvalidNote(name.to_string());
    let trimmed = name.trim();
    let mut chars = trimmed.chars();

    let letter = chars.next().ok_or_else(invalid)?;
    let base = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(invalid()),
    };

    let rest = chars.as_str();
    let mut offset = 0i32;
    let mut octave_start = rest.len();
    for (idx, c) in rest.char_indices() {
        match c {
            '#' | '♯' => offset += 1,
            'b' | '♭' => offset -= 1,
            _ => {
                octave_start = idx;
                break;
            }
        }
    }

    let octave: i32 = rest[octave_start..].parse().map_err(|_| invalid())?;
    Ok((octave + 1) * 12 + base + offset)
}

/// Frequency of a note name, e.g. `"A4" -> 440.0`.
pub fn note_to_hz(name: &str) -> Result<f64> {
    note_to_midi(name).map(|midi| midi_to_freq(midi as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_reference_pitches() {
        assert_relative_eq!(note_to_hz("A4").unwrap(), 440.0);
        assert_relative_eq!(note_to_hz("C4").unwrap(), 261.6255653005986, epsilon = 1e-9);
        assert_relative_eq!(note_to_hz("C1").unwrap(), 32.70319566257483, epsilon = 1e-9);
        assert_relative_eq!(note_to_hz("C7").unwrap(), 2093.004522404789, epsilon = 1e-9);
    }

    #[test]
    fn test_accidentals() {
        assert_eq!(note_to_midi("C#4").unwrap(), 61);
        assert_eq!(note_to_midi("Db4").unwrap(), 61);
        assert_eq!(note_to_midi("E♭3").unwrap(), 51);
        assert_eq!(note_to_midi("F♯2").unwrap(), 42);
        assert_eq!(note_to_midi("C-1").unwrap(), 0);
        assert_eq!(note_to_midi("B#3").unwrap(), 60);
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(note_to_midi("H4"), Err(Error::InvalidNote(_))));
        assert!(matches!(note_to_midi(""), Err(Error::InvalidNote(_))));
        assert!(matches!(note_to_midi("C"), Err(Error::InvalidNote(_))));
        assert!(matches!(hz_to_note(0.0), Err(Error::InvalidNote(_))));
    }

    #[test]
    fn test_hz_to_note() {
        assert_eq!(hz_to_note(440.0).unwrap(), "A4");
        assert_eq!(hz_to_note(261.0).unwrap(), "C4");
        assert_eq!(hz_to_note(277.18).unwrap(), "C#4");
        assert_eq!(hz_to_note(29.2).unwrap(), "A#0");
    }

    proptest! {
        #[test]
        fn prop_note_name_round_trip(midi in 0i32..128) {
            let name = midi_to_note(midi);
            prop_assert_eq!(note_to_midi(&name).unwrap(), midi);
            let hz = midi_to_freq(midi as f64);
            prop_assert_eq!(hz_to_note(hz).unwrap(), name);
        }
    }
}
