//! Interactive question loop on a terminal (or any reader/writer pair)

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::agent::{Generator, QueryAgent, Turn};
use crate::models::{ModelCatalog, ModelDescriptor};
use crate::storage::RecordStore;

/// Typed at the question prompt to leave the loop
const EXIT_COMMAND: &str = "exit()";

/// Question/answer turns of one interactive session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn::new(question, answer));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Interactive session: pick a model, ask questions, optionally clean up
pub struct InteractiveShell<'a, G, S> {
    agent: &'a QueryAgent<G>,
    store: &'a S,
    catalog: &'a ModelCatalog,
}

impl<'a, G: Generator, S: RecordStore> InteractiveShell<'a, G, S> {
    pub fn new(agent: &'a QueryAgent<G>, store: &'a S, catalog: &'a ModelCatalog) -> Self {
        Self {
            agent,
            store,
            catalog,
        }
    }

    /// Run the whole session; returns the conversation that took place
    pub fn run<R: BufRead, W: Write>(&self, input: &mut R, out: &mut W) -> Result<Conversation> {
        writeln!(out, "== Gemini Email Agent ==")?;

        let Some(model) = self.select_model(input, out)? else {
            writeln!(out)?;
            return Ok(Conversation::new());
        };
        writeln!(out, "\n[+] Selected model: {}", model.name)?;

        let records = self.store.load_all().context("Failed to load emails")?;
        if records.is_empty() {
            writeln!(out, "[!] No emails loaded. Exiting.")?;
            return Ok(Conversation::new());
        }
        writeln!(out, "[+] Loaded {} emails", records.len())?;

        writeln!(out, "\n[+] Ask about your emails. Type '{}' to quit.\n", EXIT_COMMAND)?;
        let mut conversation = Conversation::new();
        loop {
            let Some(line) = prompt(input, out, "You: ")? else {
                writeln!(out)?;
                break;
            };
            let question = line.trim();
            if question == EXIT_COMMAND {
                break;
            }
            if question.is_empty() {
                continue;
            }

            match self
                .agent
                .ask_with_history(&model.id, &records, question, conversation.turns())
            {
                Ok(answer) => {
                    writeln!(out, "AI: {}", answer)?;
                    conversation.push(question, answer);
                }
                Err(e) => writeln!(out, "[!] Error with Gemini: {}", e)?,
            }
        }

        self.cleanup_prompt(input, out)?;
        Ok(conversation)
    }

    /// List the catalog and read a 1-based choice until it is valid
    ///
    /// Returns `None` if input ends first.
    fn select_model<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        out: &mut W,
    ) -> Result<Option<&'a ModelDescriptor>> {
        writeln!(out, "[?] Select a Gemini model:")?;
        for (i, model) in self.catalog.models.iter().enumerate() {
            let limits = serde_json::to_string(&model.limits)?;
            writeln!(out, " {}. {}", i + 1, model.name)?;
            writeln!(out, "    {}", model.description)?;
            writeln!(out, "    Limits: {}\n", limits)?;
        }

        loop {
            let Some(line) = prompt(input, out, "> ")? else {
                return Ok(None);
            };
            match line.trim().parse::<usize>() {
                Ok(choice) => match self.catalog.by_position(choice) {
                    Some(model) => return Ok(Some(model)),
                    None => writeln!(
                        out,
                        "Please enter a number between 1 and {}.",
                        self.catalog.len()
                    )?,
                },
                Err(_) => writeln!(out, "Invalid input. Please enter a valid number.")?,
            }
        }
    }

    fn cleanup_prompt<R: BufRead, W: Write>(&self, input: &mut R, out: &mut W) -> Result<()> {
        let answer = prompt(input, out, "\nDo you want to delete the temp folder? (y/n): ")?;
        if answer.is_some_and(|a| a.trim().eq_ignore_ascii_case("y")) {
            self.store.clear()?;
            writeln!(out, "[+] Temp folder deleted.")?;
        } else {
            writeln!(out, "[+] Temp folder preserved.")?;
        }
        Ok(())
    }
}

/// Print `text` and read one line; `None` at end of input
fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, text: &str) -> Result<Option<String>> {
    write!(out, "{}", text)?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}
