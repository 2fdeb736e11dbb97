//! Analysis result types exchanged over the bus
//!
//! Field names on the wire follow the camelCase layout existing consumers
//! already parse (`posTags`, `personNames`).

use serde::{Deserialize, Serialize};

/// A single token, significant only by its position in the owning sequence
pub type Token = String;

/// Part-of-speech label aligned with the token at the same index
pub type PosTag = String;

/// Person name recognized over a contiguous run of tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonName {
    /// Surface form: the single token, or first and last token joined by a space
    pub name: String,
    /// Every token the span covered, interior tokens included
    pub tokens: Vec<Token>,
    /// Name finder confidence (0.0-1.0)
    pub probability: f64,
}

/// One analyzed sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    /// Sentence text as returned by the sentence detector
    pub raw: String,
    /// Tokens of `raw`
    pub tokens: Vec<Token>,
    /// POS tags, same length as `tokens`
    pub pos_tags: Vec<PosTag>,
    /// Person names found in `tokens`, in span order
    pub person_names: Vec<PersonName>,
}

/// Full analysis of a text, sentences in detection order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedText {
    pub sentences: Vec<Sentence>,
}

impl AnalyzedText {
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self { sentences }
    }

    /// All person names across sentences, in document order
    pub fn person_names(&self) -> impl Iterator<Item = &PersonName> {
        self.sentences.iter().flat_map(|s| s.person_names.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_serializes_camel_case_fields() {
        let sentence = Sentence {
            raw: "John left.".to_string(),
            tokens: vec!["John".into(), "left".into(), ".".into()],
            pos_tags: vec!["NNP".into(), "VBD".into(), ".".into()],
            person_names: vec![PersonName {
                name: "John".to_string(),
                tokens: vec!["John".into()],
                probability: 0.9,
            }],
        };

        let json = serde_json::to_value(&sentence).unwrap();
        assert!(json.get("posTags").is_some());
        assert!(json.get("personNames").is_some());
        assert!(json.get("pos_tags").is_none());
        assert_eq!(json["personNames"][0]["name"], "John");
    }

    #[test]
    fn test_person_names_flattens_in_document_order() {
        let name = |n: &str| PersonName {
            name: n.to_string(),
            tokens: vec![n.to_string()],
            probability: 1.0,
        };
        let sentence = |names: Vec<PersonName>| Sentence {
            raw: String::new(),
            tokens: vec![],
            pos_tags: vec![],
            person_names: names,
        };

        let text = AnalyzedText::new(vec![
            sentence(vec![name("Ann")]),
            sentence(vec![]),
            sentence(vec![name("Bob"), name("Cy")]),
        ]);

        let names: Vec<&str> = text.person_names().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bob", "Cy"]);
    }
}
