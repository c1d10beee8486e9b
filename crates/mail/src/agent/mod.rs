//! Question answering over downloaded messages

mod gemini;
mod prompt;

pub use gemini::{API_KEY_VAR, GeminiClient, Generator};
pub use prompt::{Turn, build_prompt};

use log::debug;

use crate::error::ModelError;
use crate::models::MessageRecord;

/// Answers natural-language questions against a set of records
///
/// Stateless: each call sends the full record set. Callers that want a
/// running conversation keep the turns themselves and use
/// [`QueryAgent::ask_with_history`].
pub struct QueryAgent<G> {
    generator: G,
}

impl<G: Generator> QueryAgent<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Ask a single question
    pub fn ask(
        &self,
        model_id: &str,
        records: &[MessageRecord],
        question: &str,
    ) -> Result<String, ModelError> {
        self.ask_with_history(model_id, records, question, &[])
    }

    /// Ask a question following earlier turns of a conversation
    pub fn ask_with_history(
        &self,
        model_id: &str,
        records: &[MessageRecord],
        question: &str,
        history: &[Turn],
    ) -> Result<String, ModelError> {
        let prompt = build_prompt(records, question, history).map_err(ModelError::Request)?;
        debug!(
            "Asking {} about {} emails ({} earlier turns)",
            model_id,
            records.len(),
            history.len()
        );

        let answer = self.generator.generate(model_id, &prompt)?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(answer.to_string())
    }
}
