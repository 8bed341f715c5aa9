use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::position::Position;

/// Lexical class of a token
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[default]
    Undefined,
    Word,
    Number,
    /// Too long or too many special characters to be indexed
    Unusable,
    /// `www.` host or `http://` URL with the scheme stripped
    WebAddress,
    EndOfStream,
}

impl TokenType {
    /// Whether tokens of this type produce postings
    pub fn is_indexable(&self) -> bool {
        matches!(self, TokenType::Word | TokenType::Number | TokenType::WebAddress)
    }
}

/// A single lexical unit produced by the tokenizer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    text: String,
    token_type: TokenType,
    position: Position,
    sentence: u16,
    order: u16,
}

impl Token {
    pub(crate) fn new(
        text: String,
        token_type: TokenType,
        position: Position,
        sentence: u16,
        order: u16,
    ) -> Self {
        Self {
            text,
            token_type,
            position,
            sentence,
            order,
        }
    }

    pub(crate) fn end_of_stream(position: Position, sentence: u16, order: u16) -> Self {
        Self::new(String::new(), TokenType::EndOfStream, position, sentence, order)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Packed 32-bit position word
    pub fn packed_position(&self) -> u32 {
        self.position.pack()
    }

    pub fn sentence_number(&self) -> u16 {
        self.sentence
    }

    pub fn order(&self) -> u16 {
        self.order
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.token_type == TokenType::EndOfStream
    }

    /// Number of characters in the surface form
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Token {}

// The surface form is already lowercased, so hashing it keeps lookups case-insensitive.
impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}
