//! Model catalog
//!
//! The selectable models offered at load time. Any other id the runtime
//! understands can still be requested through [`ModelChoice::Custom`].

use super::types::{EmptyModelKey, ModelKey};

/// Catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDef {
    /// Runtime model id, forwarded verbatim as the [`ModelKey`]
    pub id: &'static str,
    /// Human-readable label
    pub display_name: &'static str,
    /// Approximate download size, for display only
    pub approximate_size: &'static str,
}

impl ModelDef {
    #[must_use]
    pub fn key(&self) -> ModelKey {
        ModelKey(self.id.to_string())
    }
}

/// All catalog entries, in presentation order
#[must_use]
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "Qwen2.5-1.5B-Instruct-q4f16_1-MLC",
            display_name: "Qwen 2.5 1.5B (Chinese, fast)",
            approximate_size: "~1.6GB",
        },
        ModelDef {
            id: "Llama-3.2-1B-Instruct-q4f16_1-MLC",
            display_name: "Llama 3.2 1B (lightweight, strong English)",
            approximate_size: "~1.2GB",
        },
        ModelDef {
            id: "Qwen2.5-7B-Instruct-q4f16_1-MLC",
            display_name: "Qwen 2.5 7B (smarter, needs 8GB VRAM)",
            approximate_size: "~5.2GB",
        },
        ModelDef {
            id: "Llama-3.1-8B-Instruct-q4f32_1-MLC",
            display_name: "Llama 3.1 8B (balanced, needs 8GB VRAM)",
            approximate_size: "~5.8GB",
        },
    ]
}

/// The entry preselected when nothing else is configured
#[must_use]
pub fn default_model() -> &'static ModelDef {
    &all_models()[0]
}

/// Look up catalog metadata for an id
#[must_use]
pub fn find_model(id: &str) -> Option<&'static ModelDef> {
    all_models().iter().find(|m| m.id == id)
}

/// What the user picked: a catalog entry or a typed-in id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChoice {
    Catalog(&'static ModelDef),
    Custom(String),
}

impl ModelChoice {
    /// Interpret free text: catalog ids map to their entry, anything else is custom
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        match find_model(trimmed) {
            Some(def) => Self::Catalog(def),
            None => Self::Custom(trimmed.to_string()),
        }
    }

    /// # Errors
    ///
    /// [`EmptyModelKey`] for a blank custom id.
    pub fn resolve(&self) -> Result<ModelKey, EmptyModelKey> {
        match self {
            Self::Catalog(def) => Ok(def.key()),
            Self::Custom(id) => ModelKey::new(id),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Catalog(def) => def.display_name,
            Self::Custom(id) if id.trim().is_empty() => "Custom",
            Self::Custom(id) => id.as_str(),
        }
    }
}
