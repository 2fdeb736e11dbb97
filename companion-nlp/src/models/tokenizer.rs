//! Rule-based tokenizer
//!
//! Splits on whitespace, then peels punctuation off both ends of each chunk
//! and splits known clitics (`don't` -> `do` `n't`). Configured
//! abbreviations keep their trailing period.

use companion_common::Token;
use serde::Deserialize;
use std::collections::HashSet;

/// `en-token` resource
#[derive(Debug, Clone, Deserialize)]
pub struct TokenizerModel {
    /// Tokens kept whole, period included (`Mr.`, `e.g.`)
    #[serde(default)]
    pub abbreviations: Vec<String>,
    /// Characters split off the start of a chunk
    pub leading_punctuation: String,
    /// Characters split off the end of a chunk
    pub trailing_punctuation: String,
    /// Suffixes split into their own token, matched case-insensitively
    #[serde(default)]
    pub clitics: Vec<String>,
}

#[derive(Debug)]
pub struct Tokenizer {
    abbreviations: HashSet<String>,
    leading: HashSet<char>,
    trailing: HashSet<char>,
    clitics: Vec<String>,
}

impl Tokenizer {
    pub fn new(model: TokenizerModel) -> Self {
        Self {
            abbreviations: model.abbreviations.into_iter().collect(),
            leading: model.leading_punctuation.chars().collect(),
            trailing: model.trailing_punctuation.chars().collect(),
            clitics: model.clitics,
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        for chunk in text.split_whitespace() {
            self.tokenize_chunk(chunk, &mut tokens);
        }
        tokens
    }

    fn tokenize_chunk(&self, chunk: &str, tokens: &mut Vec<Token>) {
        if self.abbreviations.contains(chunk) {
            tokens.push(chunk.to_string());
            return;
        }

        let mut core = chunk;
        while let Some(c) = core.chars().next() {
            if !self.leading.contains(&c) {
                break;
            }
            tokens.push(c.to_string());
            core = &core[c.len_utf8()..];
        }

        let mut trailing = Vec::new();
        while let Some(c) = core.chars().next_back() {
            if !self.trailing.contains(&c) || self.abbreviations.contains(core) {
                break;
            }
            trailing.push(c.to_string());
            core = &core[..core.len() - c.len_utf8()];
        }

        if !core.is_empty() {
            match self.clitic_split(core) {
                Some(split) => {
                    tokens.push(core[..split].to_string());
                    tokens.push(core[split..].to_string());
                }
                None => tokens.push(core.to_string()),
            }
        }

        tokens.extend(trailing.into_iter().rev());
    }

    /// Byte offset where a known clitic starts, if `word` ends with one
    fn clitic_split(&self, word: &str) -> Option<usize> {
        self.clitics.iter().find_map(|clitic| {
            let split = word.len().checked_sub(clitic.len())?;
            if split == 0 || !word.is_char_boundary(split) {
                return None;
            }
            word[split..].eq_ignore_ascii_case(clitic).then_some(split)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(TokenizerModel {
            abbreviations: vec!["Mr.".into(), "e.g.".into()],
            leading_punctuation: "\"'([".into(),
            trailing_punctuation: "\"'.,;:!?)]".into(),
            clitics: vec!["n't".into(), "'s".into()],
        })
    }

    #[test]
    fn test_splits_trailing_punctuation() {
        assert_eq!(
            tokenizer().tokenize("John Smith went home."),
            vec!["John", "Smith", "went", "home", "."]
        );
    }

    #[test]
    fn test_abbreviation_keeps_period() {
        assert_eq!(
            tokenizer().tokenize("(Mr. Smith)"),
            vec!["(", "Mr.", "Smith", ")"]
        );
        assert_eq!(tokenizer().tokenize("Mr.,"), vec!["Mr.", ","]);
    }

    #[test]
    fn test_clitics_split() {
        assert_eq!(
            tokenizer().tokenize("John's car DON'T"),
            vec!["John", "'s", "car", "DO", "N'T"]
        );
    }

    #[test]
    fn test_quotes_and_multiple_marks() {
        assert_eq!(
            tokenizer().tokenize("\"Really?!\""),
            vec!["\"", "Really", "?", "!", "\""]
        );
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(tokenizer().tokenize("").is_empty());
        assert!(tokenizer().tokenize(" \n\t ").is_empty());
    }

    #[test]
    fn test_all_punctuation_chunk() {
        assert_eq!(tokenizer().tokenize("..."), vec![".", ".", "."]);
    }
}
