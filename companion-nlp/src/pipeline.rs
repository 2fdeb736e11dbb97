//! Analysis Pipeline: text -> AnalyzedText
//!
//! Per sentence: tokenize, tag, find names, resolve spans. The first error
//! aborts the whole analysis; no partial result is returned.

use companion_common::{AnalyzedText, PersonName, PosTag, Sentence, Token};
use tracing::debug;

use crate::error::{NlpError, NlpResult};
use crate::models::ModelPort;
use crate::resolver::resolve_names;

/// Analyze `text`; empty or whitespace-only text gives zero sentences
pub fn analyze(models: &dyn ModelPort, text: &str) -> NlpResult<AnalyzedText> {
    if text.trim().is_empty() {
        return Ok(AnalyzedText::default());
    }

    let sentences = models
        .detect_sentences(text)?
        .into_iter()
        .map(|raw| analyze_sentence(models, raw))
        .collect::<NlpResult<Vec<_>>>()?;

    debug!(sentence_count = sentences.len(), "Text analyzed");
    Ok(AnalyzedText::new(sentences))
}

/// Analyze one sentence
pub fn analyze_sentence(models: &dyn ModelPort, raw: String) -> NlpResult<Sentence> {
    let tokens = models.tokenize(&raw)?;
    let pos_tags = tag_tokens(models, &tokens)?;
    let person_names = find_person_names(models, &tokens)?;

    Ok(Sentence {
        raw,
        tokens,
        pos_tags,
        person_names,
    })
}

/// Tag `tokens`, checking one tag per token
pub fn tag_tokens(models: &dyn ModelPort, tokens: &[Token]) -> NlpResult<Vec<PosTag>> {
    let pos_tags = models.tag(tokens)?;
    if pos_tags.len() != tokens.len() {
        return Err(NlpError::Model(format!(
            "Tagger returned {} tags for {} tokens",
            pos_tags.len(),
            tokens.len()
        )));
    }
    Ok(pos_tags)
}

/// Name finding plus span resolution, as served by `nlp.personname`
pub fn find_person_names(models: &dyn ModelPort, tokens: &[Token]) -> NlpResult<Vec<PersonName>> {
    let found = models.find_names(tokens)?;
    resolve_names(tokens, &found.spans, &found.probabilities)
}
