use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Number of distinct section ids that fit in the packed position word
pub const MAX_SECTIONS: usize = 8;

/// Name of the section that headings are rendered into
pub const SUBJECT_SECTION: &str = "Subject";

/// Index settings configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Number of documents that fill one chunk
    pub chunk_capacity: usize,
    pub tokenizer: TokenizerConfig,
    pub context: ContextConfig,
    /// Section names by section id; index 0 is the default body section
    pub sections: Vec<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            chunk_capacity: 1000,
            tokenizer: TokenizerConfig::default(),
            context: ContextConfig::default(),
            sections: vec![
                "Body".to_string(),
                SUBJECT_SECTION.to_string(),
                "Annotation".to_string(),
                "Source".to_string(),
            ],
        }
    }
}

impl IndexSettings {
    /// Set the number of documents per chunk
    pub fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity;
        self
    }

    /// Replace the section name table
    pub fn with_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections = sections.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    /// Check the settings can be honoured by the packed layouts
    pub fn validate(&self) -> Result<()> {
        if self.chunk_capacity == 0 {
            return Err(IndexError::InvalidRequest(
                "chunk capacity must be at least 1".to_string(),
            ));
        }
        if self.sections.is_empty() || self.sections.len() > MAX_SECTIONS {
            return Err(IndexError::InvalidRequest(format!(
                "expected 1..={} section names, got {}",
                MAX_SECTIONS,
                self.sections.len()
            )));
        }
        if self.context.min_radius > self.context.radius {
            return Err(IndexError::InvalidRequest(
                "context min_radius exceeds radius".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize the settings to JSON
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| IndexError::InvalidRequest(e.to_string()))
    }

    /// Deserialize settings from JSON
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let settings: Self =
            serde_json::from_slice(data).map_err(|e| IndexError::InvalidRequest(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Tokenizer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Longer tokens are classified as unusable
    pub max_token_length: usize,
    /// Tokens with more special characters are classified as unusable
    pub max_special_chars: usize,
    /// Sentence numbers wrap at this value
    pub sentence_modulus: u16,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            max_token_length: 56,
            max_special_chars: 1,
            sentence_modulus: 32600,
        }
    }
}

/// Context snippet configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Characters opened on each side of a match
    pub radius: usize,
    /// Border tuning never shrinks a side below this
    pub min_radius: usize,
    /// Leading instances that each get their own window
    pub min_windows: usize,
    /// Joins windows in the output
    pub delimiter: String,
    /// Inserted between rendered sections
    pub section_delimiter: String,
    /// Returned when no context could be built
    pub no_context: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            radius: 36,
            min_radius: 20,
            min_windows: 2,
            delimiter: "...".to_string(),
            section_delimiter: " ".to_string(),
            no_context: "No context available".to_string(),
        }
    }
}
