//! Lexicon POS tagger
//!
//! Tag resolution order for each token:
//! 1. lexicon entry (exact, then lowercase)
//! 2. punctuation table
//! 3. number
//! 4. capitalized word -> proper noun
//! 5. longest matching suffix rule
//! 6. default tag

use companion_common::{PosTag, Token};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct SuffixRule {
    pub suffix: String,
    pub tag: String,
}

/// `en-pos-maxent` resource
#[derive(Debug, Clone, Deserialize)]
pub struct PosTaggerModel {
    pub default_tag: String,
    pub proper_noun_tag: String,
    pub number_tag: String,
    #[serde(default)]
    pub punctuation: HashMap<String, String>,
    #[serde(default)]
    pub lexicon: HashMap<String, String>,
    #[serde(default)]
    pub suffixes: Vec<SuffixRule>,
}

#[derive(Debug)]
pub struct PosTagger {
    model: PosTaggerModel,
}

impl PosTagger {
    pub fn new(mut model: PosTaggerModel) -> Self {
        // Longest suffix first
        model
            .suffixes
            .sort_by(|a, b| b.suffix.len().cmp(&a.suffix.len()));
        Self { model }
    }

    /// One tag per token, same order
    pub fn tag(&self, tokens: &[Token]) -> Vec<PosTag> {
        tokens.iter().map(|token| self.tag_token(token)).collect()
    }

    fn tag_token(&self, token: &str) -> PosTag {
        let lower = token.to_lowercase();

        if let Some(tag) = self
            .model
            .lexicon
            .get(token)
            .or_else(|| self.model.lexicon.get(&lower))
        {
            return tag.clone();
        }

        if let Some(tag) = self.model.punctuation.get(token) {
            return tag.clone();
        }

        if is_number(token) {
            return self.model.number_tag.clone();
        }

        if token.chars().next().is_some_and(char::is_uppercase) {
            return self.model.proper_noun_tag.clone();
        }

        self.model
            .suffixes
            .iter()
            .find(|rule| lower.len() > rule.suffix.len() && lower.ends_with(&rule.suffix))
            .map(|rule| rule.tag.clone())
            .unwrap_or_else(|| self.model.default_tag.clone())
    }
}

fn is_number(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '%'))
}
