//! Span Resolver: name spans -> PersonName records
//!
//! A span `[start, end)` is resolved through its inclusive last index
//! `end - 1`. The name is the single token for one-token spans, otherwise the
//! first and last token joined by a space; interior tokens appear only in
//! the token slice.

use companion_common::{PersonName, Token};

use crate::error::{NlpError, NlpResult};
use crate::models::Span;

/// Resolve `spans` over `tokens`, keeping span order
pub fn resolve_names(
    tokens: &[Token],
    spans: &[Span],
    probabilities: &[f64],
) -> NlpResult<Vec<PersonName>> {
    if spans.len() != probabilities.len() {
        return Err(NlpError::Index(format!(
            "{} spans but {} probabilities",
            spans.len(),
            probabilities.len()
        )));
    }

    spans
        .iter()
        .zip(probabilities)
        .map(|(span, probability)| resolve_span(tokens, *span, *probability))
        .collect()
}

fn resolve_span(tokens: &[Token], span: Span, probability: f64) -> NlpResult<PersonName> {
    let Span { start, end } = span;
    if end == 0 || start >= end {
        return Err(NlpError::Index(format!("Empty span [{}, {})", start, end)));
    }

    let last = end - 1;
    if last >= tokens.len() {
        return Err(NlpError::Index(format!(
            "Span [{}, {}) outside {} tokens",
            start,
            end,
            tokens.len()
        )));
    }

    let name = if start == last {
        tokens[start].clone()
    } else {
        format!("{} {}", tokens[start], tokens[last])
    };

    Ok(PersonName {
        name,
        tokens: tokens[start..=last].to_vec(),
        probability,
    })
}
