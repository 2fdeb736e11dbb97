//! Gazetteer person name finder
//!
//! A span starts at a known given name or a title and extends over the
//! following capitalized words, up to `max_tokens`. A title on its own is not
//! a name. Span probability is the mean of the per-token scores.

use companion_common::Token;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use super::{NameSpans, Span};

/// `en-ner-person` resource
#[derive(Debug, Clone, Deserialize)]
pub struct NameFinderModel {
    /// Longest span produced
    pub max_tokens: usize,
    /// Score of a title token (`Mr.`)
    pub title_probability: f64,
    /// Score of a capitalized word continuing a name
    pub continuation_probability: f64,
    #[serde(default)]
    pub titles: Vec<String>,
    /// Capitalized words that never belong to a name
    #[serde(default)]
    pub stop_words: Vec<String>,
    /// Given name -> score
    pub given_names: HashMap<String, f64>,
}

#[derive(Debug)]
pub struct NameFinder {
    max_tokens: usize,
    title_probability: f64,
    continuation_probability: f64,
    titles: HashSet<String>,
    stop_words: HashSet<String>,
    given_names: HashMap<String, f64>,
}

impl NameFinder {
    pub fn new(model: NameFinderModel) -> Self {
        Self {
            max_tokens: model.max_tokens.max(1),
            title_probability: model.title_probability,
            continuation_probability: model.continuation_probability,
            titles: model.titles.into_iter().collect(),
            stop_words: model.stop_words.into_iter().collect(),
            given_names: model.given_names,
        }
    }

    /// Disjoint spans in token order
    pub fn find(&self, tokens: &[Token]) -> NameSpans {
        let mut found = NameSpans::default();
        let mut i = 0;

        while i < tokens.len() {
            let Some(first_score) = self.start_score(&tokens[i]) else {
                i += 1;
                continue;
            };

            let mut scores = vec![first_score];
            let mut j = i + 1;
            while j < tokens.len() && j - i < self.max_tokens && self.continues_name(&tokens[j]) {
                scores.push(
                    self.given_names
                        .get(&tokens[j])
                        .copied()
                        .unwrap_or(self.continuation_probability),
                );
                j += 1;
            }

            if j == i + 1 && self.titles.contains(&tokens[i]) {
                i += 1;
                continue;
            }

            found.spans.push(Span::new(i, j));
            found
                .probabilities
                .push(scores.iter().sum::<f64>() / scores.len() as f64);
            i = j;
        }

        found
    }

    fn start_score(&self, token: &str) -> Option<f64> {
        if self.titles.contains(token) {
            Some(self.title_probability)
        } else {
            self.given_names.get(token).copied()
        }
    }

    fn continues_name(&self, token: &str) -> bool {
        let mut chars = token.chars();
        chars.next().is_some_and(char::is_uppercase)
            && chars.all(|c| c.is_alphabetic() || c == '-' || c == '\'')
            && !self.stop_words.contains(token)
            && !self.titles.contains(token)
    }
}
