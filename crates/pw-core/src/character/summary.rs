//! Read-only previews derived from a character: the appearance one-liner,
//! voice and narrative summaries, canon facts and the readiness status.

use super::model::{Appearance, Character, Gender, Narrative};
use super::voice::Voice;

/// Longest appearance line before optional clauses are dropped.
pub const APPEARANCE_LINE_MAX: usize = 220;

const APPEARANCE_PLACEHOLDER: &str = "(add details in Appearance tab)";

/// Composes a single descriptive sentence from appearance fields.
///
/// When the sentence exceeds [`APPEARANCE_LINE_MAX`] characters the clothing
/// clause is dropped first, then the notable-marks clause.
pub fn compose_appearance_line(appearance: &Appearance, gender: Gender) -> String {
    let a = appearance;

    let mut lead_parts: Vec<&str> = Vec::new();
    if !a.build.is_empty() {
        lead_parts.push(&a.build);
    }
    if !a.species.is_empty() {
        lead_parts.push(&a.species);
    }
    if !lead_parts.is_empty() && !gender.noun().is_empty() {
        lead_parts.push(gender.noun());
    }
    let lead = lead_parts.join(" ");

    let hair_words: Vec<&str> = [a.hair_style.as_str(), a.hair_color.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    let hair = if hair_words.is_empty() {
        String::new()
    } else {
        format!("{} hair", hair_words.join(" "))
    };
    let eyes = if a.eye_color.is_empty() {
        String::new()
    } else {
        format!("{} eyes", a.eye_color)
    };
    let skin = if a.skin_tone.is_empty() {
        String::new()
    } else {
        format!("with {} skin", a.skin_tone)
    };
    let marks = marks_clause(&a.notable_marks);
    let clothes = if a.clothing_style.is_empty() {
        String::new()
    } else {
        format!("typically wearing {}", a.clothing_style)
    };

    let render = |with_marks: bool, with_clothes: bool| -> String {
        let mut clauses: Vec<&str> = Vec::new();
        for clause in [&lead, &hair, &eyes, &skin] {
            if !clause.is_empty() {
                clauses.push(clause);
            }
        }
        if with_marks && !marks.is_empty() {
            clauses.push(&marks);
        }
        if with_clothes && !clothes.is_empty() {
            clauses.push(&clothes);
        }
        let mut s = clauses.join(", ");
        if !s.is_empty() && !s.ends_with(['.', '!', '?']) {
            s.push('.');
        }
        s
    };

    let mut line = render(true, true);
    if line.chars().count() > APPEARANCE_LINE_MAX && !clothes.is_empty() {
        line = render(true, false);
    }
    if line.chars().count() > APPEARANCE_LINE_MAX && !marks.is_empty() {
        line = render(false, false);
    }

    if line.is_empty() {
        APPEARANCE_PLACEHOLDER.to_string()
    } else {
        line
    }
}

fn marks_clause(marks: &[String]) -> String {
    let shown: Vec<&str> = marks
        .iter()
        .map(String::as_str)
        .filter(|m| !m.is_empty())
        .take(3)
        .collect();
    match shown.split_last() {
        None => String::new(),
        Some((last, [])) => format!("notable for {last}"),
        Some((last, rest)) => format!("notable for {} and {last}", rest.join(", ")),
    }
}

/// `archetype • Formality n • Sentences: x • Vocab: y • Disfluency: z [• Tones: ...]`
pub fn voice_summary(voice: &Voice) -> String {
    let mut bits: Vec<String> = Vec::new();
    if let Some(label) = voice.archetype.label() {
        bits.push(label.to_string());
    }
    bits.push(format!("Formality {}", voice.formality));
    bits.push(format!("Sentences: {}", voice.sentence_length));
    bits.push(format!("Vocab: {}", voice.vocabulary));
    bits.push(format!("Disfluency: {}", voice.disfluency));

    let tones: Vec<String> = voice
        .emotion_names
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .take(3)
        .map(|(i, name)| {
            let weight = voice.emotion_weights.get(i).copied().unwrap_or(0.0);
            format!("{name} {weight}")
        })
        .collect();
    if !tones.is_empty() {
        bits.push(format!("Tones: {}", tones.join(", ")));
    }
    bits.join(" • ")
}

/// Logline, else the non-empty beats, else the pillars, else a dash.
pub fn narrative_summary(narrative: &Narrative) -> String {
    if !narrative.logline.is_empty() {
        return narrative.logline.clone();
    }
    if let Some(beats) = &narrative.beats {
        let pieces: Vec<&str> = [
            beats.hook.as_str(),
            beats.complication.as_str(),
            beats.midpoint.as_str(),
            beats.crisis.as_str(),
            beats.resolution.as_str(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
        if !pieces.is_empty() {
            return pieces.join(" • ");
        }
    }
    let pillars: Vec<&str> = narrative
        .pillars
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    if !pillars.is_empty() {
        return format!("Pillars: {}", pillars.join(" / "));
    }
    "—".to_string()
}

/// Facts the narrative tab pins as canon (`Name: ...`, `Hair: ...`).
pub fn canon_facts(character: &Character) -> Vec<String> {
    let mut facts = Vec::new();
    let a = &character.appearance;
    if !character.name.is_empty() {
        facts.push(format!("Name: {}", character.name));
    }
    if !character.role.is_empty() {
        facts.push(format!("Role: {}", character.role));
    }
    if !character.gender.as_str().is_empty() {
        facts.push(format!("Gender: {}", character.gender.as_str()));
    }
    if !a.species.is_empty() {
        facts.push(format!("Species: {}", a.species));
    }

    let mut hair = Vec::new();
    if !a.hair_style.is_empty() {
        hair.push(a.hair_style.clone());
    }
    if !a.hair_color.is_empty() {
        hair.push(format!("{} hair", a.hair_color));
    }
    if !hair.is_empty() {
        facts.push(format!("Hair: {}", hair.join(" ")));
    }

    let mut eyes = Vec::new();
    if !a.eye_color.is_empty() {
        eyes.push(format!("{} eyes", a.eye_color));
    }
    if !a.eye_shape.is_empty() {
        eyes.push(a.eye_shape.clone());
    }
    if !eyes.is_empty() {
        facts.push(format!("Eyes: {}", eyes.join(", ")));
    }

    if !a.skin_tone.is_empty() {
        facts.push(format!("Skin: {}", a.skin_tone));
    }
    if !a.clothing_style.is_empty() {
        facts.push(format!("Clothing: {}", a.clothing_style));
    }
    if !a.notable_marks.is_empty() {
        facts.push(format!("Marks: {}", a.notable_marks.join(", ")));
    }
    facts
}

/// Whether the draft may be saved, with the status line to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NameRequired,
    AdultAgeRequired,
}

impl Readiness {
    pub fn of(character: &Character) -> Self {
        let name_ok = character.name.trim().chars().count() >= 2;
        let age_ok = !character.appearance.nsfw_allowed || character.age.is_some_and(|a| a >= 18);
        if !name_ok {
            Readiness::NameRequired
        } else if !age_ok {
            Readiness::AdultAgeRequired
        } else {
            Readiness::Ready
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Readiness::Ready => "Ready to save or generate.",
            Readiness::NameRequired => "Name required.",
            Readiness::AdultAgeRequired => "Age must be 18+ when NSFW is enabled.",
        }
    }
}
