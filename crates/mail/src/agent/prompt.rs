//! Prompt construction for mailbox questions

use anyhow::{Context, Result};

use crate::models::MessageRecord;

/// One prior question/answer exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

impl Turn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Build the prompt sent to the model
///
/// Every record is embedded as JSON. Earlier turns, if any, are rendered as
/// `You:`/`AI:` lines between the records and the new question.
pub fn build_prompt(records: &[MessageRecord], question: &str, history: &[Turn]) -> Result<String> {
    let records_json =
        serde_json::to_string(records).context("Failed to serialize email records")?;

    let mut prompt = format!("Based on these emails:\n\n{}\n\n", records_json);

    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for turn in history {
            prompt.push_str(&format!("You: {}\nAI: {}\n", turn.question, turn.answer));
        }
        prompt.push('\n');
    }

    prompt.push_str("Answer this:\n");
    prompt.push_str(question);
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_history() {
        let records = vec![MessageRecord::new("m1").with_subject("Hi")];
        let prompt = build_prompt(&records, "Who wrote?", &[]).unwrap();

        assert!(prompt.starts_with("Based on these emails:\n\n[{\"id\":\"m1\",\"subject\":\"Hi\""));
        assert!(prompt.ends_with("\n\nAnswer this:\nWho wrote?"));
        assert!(!prompt.contains("Conversation so far"));
    }

    #[test]
    fn test_prompt_with_history() {
        let history = vec![Turn::new("Any invoices?", "One from ACME.")];
        let prompt = build_prompt(&[], "How much?", &history).unwrap();

        assert_eq!(
            prompt,
            "Based on these emails:\n\n[]\n\nConversation so far:\nYou: Any invoices?\nAI: One from ACME.\n\nAnswer this:\nHow much?"
        );
    }
}
