//! Model Port: the four analyzers behind one capability object
//!
//! Lifecycle has two phases:
//! 1. **Load**: [`ModelSet::load`] reads every resource from the models
//!    directory. Blocking I/O; callers run it on the blocking pool. Any
//!    failure aborts the load as a whole.
//! 2. **Serve**: the loaded set is immutable and shared as
//!    `Arc<dyn ModelPort>` across all handlers without locking.
//!
//! Resources are TOML documents (see `resources/nlp/` for the bundled set).

use companion_common::{PosTag, Token};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::error::{NlpError, NlpResult};

mod name_finder;
mod sentence;
mod tagger;
mod tokenizer;

pub use name_finder::{NameFinder, NameFinderModel};
pub use sentence::{SentenceDetector, SentenceModel};
pub use tagger::{PosTagger, PosTaggerModel, SuffixRule};
pub use tokenizer::{Tokenizer, TokenizerModel};

/// Tokenizer resource file
pub const TOKEN_MODEL: &str = "en-token.toml";
/// Person name finder resource file
pub const NER_PERSON_MODEL: &str = "en-ner-person.toml";
/// POS tagger resource file
pub const POS_MAXENT_MODEL: &str = "en-pos-maxent.toml";
/// Sentence detector resource file
pub const SENT_MODEL: &str = "en-sent.toml";

/// Half-open token interval `[start, end)` produced by the name finder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Name finder output: spans and their probabilities, index-aligned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameSpans {
    pub spans: Vec<Span>,
    pub probabilities: Vec<f64>,
}

/// Analysis capabilities consumed by the pipeline and the router
///
/// Implementations are read-only after construction and safe to call
/// concurrently from any number of threads.
pub trait ModelPort: Send + Sync {
    /// Split text into tokens
    fn tokenize(&self, text: &str) -> NlpResult<Vec<Token>>;

    /// One POS tag per token
    fn tag(&self, tokens: &[Token]) -> NlpResult<Vec<PosTag>>;

    /// Split text into sentences; text without a boundary is one sentence
    fn detect_sentences(&self, text: &str) -> NlpResult<Vec<String>>;

    /// Person name spans over `tokens`
    fn find_names(&self, tokens: &[Token]) -> NlpResult<NameSpans>;
}

/// Run model inference on the blocking pool
///
/// Keeps dispatch tasks free while a model call is in progress.
pub async fn infer<T, F>(models: &Arc<dyn ModelPort>, f: F) -> NlpResult<T>
where
    F: FnOnce(&dyn ModelPort) -> NlpResult<T> + Send + 'static,
    T: Send + 'static,
{
    let models = Arc::clone(models);
    tokio::task::spawn_blocking(move || f(models.as_ref()))
        .await
        .map_err(|e| NlpError::Internal(format!("Inference task failed: {}", e)))?
}

/// The bundled lexicon-driven analyzers
#[derive(Debug)]
pub struct ModelSet {
    tokenizer: Tokenizer,
    tagger: PosTagger,
    sentences: SentenceDetector,
    names: NameFinder,
}

impl ModelSet {
    /// Load all four resources from `dir`
    ///
    /// Blocking. Fails on the first resource that cannot be read or parsed.
    pub fn load(dir: &Path) -> NlpResult<Self> {
        let started = Instant::now();
        info!("Loading NLP models from {}", dir.display());

        let tokenizer = Tokenizer::new(load_resource(dir, TOKEN_MODEL, "token")?);
        let names = NameFinder::new(load_resource(dir, NER_PERSON_MODEL, "ner-person")?);
        let tagger = PosTagger::new(load_resource(dir, POS_MAXENT_MODEL, "pos-maxent")?);
        let sentences = SentenceDetector::new(load_resource(dir, SENT_MODEL, "sent")?);

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "All NLP models loaded"
        );

        Ok(Self {
            tokenizer,
            tagger,
            sentences,
            names,
        })
    }

    /// Resources shipped with this crate
    pub fn bundled_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("resources").join("nlp")
    }
}

impl ModelPort for ModelSet {
    fn tokenize(&self, text: &str) -> NlpResult<Vec<Token>> {
        Ok(self.tokenizer.tokenize(text))
    }

    fn tag(&self, tokens: &[Token]) -> NlpResult<Vec<PosTag>> {
        Ok(self.tagger.tag(tokens))
    }

    fn detect_sentences(&self, text: &str) -> NlpResult<Vec<String>> {
        Ok(self.sentences.detect(text))
    }

    fn find_names(&self, tokens: &[Token]) -> NlpResult<NameSpans> {
        Ok(self.names.find(tokens))
    }
}

fn load_resource<T: DeserializeOwned>(
    dir: &Path,
    file: &str,
    resource: &'static str,
) -> NlpResult<T> {
    let path = dir.join(file);
    let content = std::fs::read_to_string(&path).map_err(|e| NlpError::ModelLoad {
        resource,
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let model = toml::from_str(&content).map_err(|e| NlpError::ModelLoad {
        resource,
        path: path.clone(),
        reason: e.to_string(),
    })?;

    info!("Loaded {} model ({})", resource, path.display());
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_models_load() {
        let models = ModelSet::load(&ModelSet::bundled_dir()).unwrap();
        let tokens = models.tokenize("John Smith left.").unwrap();
        assert_eq!(tokens, vec!["John", "Smith", "left", "."]);
    }

    #[test]
    fn test_missing_directory_fails_on_first_resource() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelSet::load(dir.path()).unwrap_err();
        assert!(matches!(err, NlpError::ModelLoad { resource: "token", .. }));
    }

    #[test]
    fn test_malformed_resource_names_the_resource() {
        let dir = tempfile::tempdir().unwrap();
        for file in [TOKEN_MODEL, POS_MAXENT_MODEL, SENT_MODEL] {
            std::fs::copy(ModelSet::bundled_dir().join(file), dir.path().join(file)).unwrap();
        }
        std::fs::write(dir.path().join(NER_PERSON_MODEL), "given_names = [").unwrap();

        match ModelSet::load(dir.path()).unwrap_err() {
            NlpError::ModelLoad { resource, path, .. } => {
                assert_eq!(resource, "ner-person");
                assert!(path.ends_with(NER_PERSON_MODEL));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_infer_runs_on_blocking_pool() {
        let models: Arc<dyn ModelPort> =
            Arc::new(ModelSet::load(&ModelSet::bundled_dir()).unwrap());
        let sentences = infer(&models, |m| m.detect_sentences("One. Two."))
            .await
            .unwrap();
        assert_eq!(sentences, vec!["One.", "Two."]);
    }
}
