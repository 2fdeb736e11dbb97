//! Rule-based sentence detector
//!
//! A boundary is a run of terminators (optionally followed by closing quotes
//! or brackets) that ends the text or is followed by whitespace, unless the
//! word ending in `.` is a known abbreviation.

use serde::Deserialize;
use std::collections::HashSet;

/// `en-sent` resource
#[derive(Debug, Clone, Deserialize)]
pub struct SentenceModel {
    /// Sentence-ending characters
    pub terminators: String,
    /// Characters that may follow a terminator inside the same sentence
    #[serde(default)]
    pub closing: String,
    /// Words ending in `.` that do not end a sentence
    #[serde(default)]
    pub abbreviations: Vec<String>,
}

#[derive(Debug)]
pub struct SentenceDetector {
    terminators: HashSet<char>,
    closing: HashSet<char>,
    abbreviations: HashSet<String>,
}

impl SentenceDetector {
    pub fn new(model: SentenceModel) -> Self {
        Self {
            terminators: model.terminators.chars().collect(),
            closing: model.closing.chars().collect(),
            abbreviations: model.abbreviations.into_iter().collect(),
        }
    }

    /// Sentences in text order, trimmed; empty input gives no sentences
    pub fn detect(&self, text: &str) -> Vec<String> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            let (pos, c) = chars[i];
            if !self.terminators.contains(&c) {
                i += 1;
                continue;
            }

            let mut j = i + 1;
            while j < chars.len()
                && (self.terminators.contains(&chars[j].1) || self.closing.contains(&chars[j].1))
            {
                j += 1;
            }

            let at_boundary = j == chars.len() || chars[j].1.is_whitespace();
            let abbreviated = c == '.' && self.ends_with_abbreviation(&text[start..pos + 1]);

            if at_boundary && !abbreviated {
                let end = chars.get(j).map_or(text.len(), |(p, _)| *p);
                push_trimmed(&mut sentences, &text[start..end]);
                start = end;
            }
            i = j;
        }

        push_trimmed(&mut sentences, &text[start..]);
        sentences
    }

    fn ends_with_abbreviation(&self, segment: &str) -> bool {
        segment
            .split_whitespace()
            .last()
            .map(|word| word.trim_start_matches(|c: char| !c.is_alphanumeric()))
            .is_some_and(|word| self.abbreviations.contains(word))
    }
}

fn push_trimmed(sentences: &mut Vec<String>, segment: &str) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}
