//! Catalog of generative models offered to the user
//!
//! The catalog is a single versioned table shared by every front end. The
//! built-in table can be replaced by dropping a `models.json` file into the
//! config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Catalog override filename in the mailsage config directory
const CATALOG_FILE: &str = "models.json";

/// Version of the built-in table
const BUILTIN_VERSION: u32 = 1;

/// One selectable model and its published rate limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Display name
    pub name: String,
    /// Model ID sent to the API
    pub id: String,
    pub description: String,
    /// Rate-limit dimension (e.g. `requests_per_minute`) to its value, in
    /// catalog order
    #[serde(default)]
    pub limits: serde_json::Map<String, serde_json::Value>,
}

impl ModelDescriptor {
    fn new(name: &str, id: &str, description: &str, limits: &[(&str, u64)]) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            description: description.to_string(),
            limits: limits
                .iter()
                .map(|(dimension, value)| (dimension.to_string(), (*value).into()))
                .collect(),
        }
    }
}

/// Versioned table of model descriptors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub version: u32,
    pub models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Load the catalog override from the config directory, falling back to
    /// the built-in table when no override exists
    pub fn load() -> Result<Self> {
        if config::config_exists(CATALOG_FILE) {
            let catalog: ModelCatalog = config::load_json(CATALOG_FILE)?;
            return catalog.validated();
        }
        Ok(Self::builtin())
    }

    /// Load a catalog from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let catalog: ModelCatalog = config::load_json_file(path)?;
        catalog.validated()
    }

    fn validated(self) -> Result<Self> {
        if self.models.is_empty() {
            anyhow::bail!("Model catalog version {} lists no models", self.version);
        }
        Ok(self)
    }

    /// Look up a model by its 1-based position, as shown in menus
    pub fn by_position(&self, position: usize) -> Option<&ModelDescriptor> {
        position.checked_sub(1).and_then(|i| self.models.get(i))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Serialize the model list (without the version envelope)
    pub fn models_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.models).context("Failed to serialize model catalog")
    }

    /// The built-in Gemini catalog
    pub fn builtin() -> Self {
        let models = vec![
            ModelDescriptor::new(
                "Gemini 2.5 Flash Preview 04-17 (Experimental)",
                "gemini-1.5-flash-latest",
                "Optimized for adaptive thinking and cost efficiency, it accepts audio, images, videos, and text as input and generates text.",
                &[
                    ("requests_per_minute", 10),
                    ("tokens_per_minute", 250_000),
                    ("requests_per_day", 500),
                ],
            ),
            ModelDescriptor::new(
                "Gemini 2.5 Pro Experimental 03-25 (Experimental)",
                "gemini-1.5-pro-latest",
                "The most advanced reasoning Gemini model, excelling in multimodal understanding, coding, and world knowledge. It supports audio, images, videos, and text inputs and provides text outputs.",
                &[
                    ("requests_per_minute", 5),
                    ("tokens_per_minute", 250_000),
                    ("tokens_per_day", 1_000_000),
                    ("requests_per_day", 25),
                ],
            ),
            ModelDescriptor::new(
                "Gemini 2.0 Flash",
                "gemini-2.0-flash-001",
                "A fast, next-generation multimodal model supporting audio, images, videos, and text inputs, with text, and experimental image outputs, and audio output coming soon. It's designed for diverse tasks and real-time streaming.",
                &[
                    ("requests_per_minute", 15),
                    ("tokens_per_minute", 1_000_000),
                    ("requests_per_day", 1500),
                ],
            ),
            ModelDescriptor::new(
                "Gemini 2.0 Flash-Lite",
                "gemini-2.0-flash-lite-001",
                "A cost-effective version of Gemini 2.0 Flash, optimized for high throughput and low latency, supporting the same input types and providing text output.",
                &[
                    ("requests_per_minute", 30),
                    ("tokens_per_minute", 1_000_000),
                    ("requests_per_day", 1500),
                ],
            ),
            ModelDescriptor::new(
                "Gemini 1.5 Flash",
                "gemini-1.5-flash",
                "Offers fast and versatile performance across various tasks, with audio, images, videos, and text input and text output, also featuring a 2M token context window.",
                &[
                    ("requests_per_minute", 15),
                    ("tokens_per_minute", 250_000),
                    ("requests_per_day", 500),
                ],
            ),
            ModelDescriptor::new(
                "Gemini 1.5 Flash-8B",
                "gemini-1.5-flash-8b",
                "Designed for high-volume and lower-intelligence tasks, it supports multimodal inputs and text output.",
                &[
                    ("requests_per_minute", 15),
                    ("tokens_per_minute", 250_000),
                    ("requests_per_day", 500),
                ],
            ),
            ModelDescriptor::new(
                "Gemma 3",
                "gemma-3",
                "A small-sized, lightweight open model for text generation and image understanding.",
                &[
                    ("requests_per_minute", 30),
                    ("tokens_per_minute", 15_000),
                    ("requests_per_day", 14_400),
                ],
            ),
            ModelDescriptor::new(
                "Gemini Embedding Experimental 03-07",
                "embedding-001",
                "Creates text embeddings to measure the relatedness of text strings.",
                &[("requests_per_minute", 5), ("requests_per_day", 100)],
            ),
        ];

        Self {
            version: BUILTIN_VERSION,
            models,
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
