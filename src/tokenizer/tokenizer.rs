use crate::config::TokenizerConfig;

use super::position::Position;
use super::token::{Token, TokenType};

/// Scheme stripped from web address tokens
const HTTP_SCHEME: &str = "http://";

/// Punctuation that may appear inside a token without counting as special
const JOINERS: [char; 6] = ['.', '-', '\'', '/', ':', '\u{2019}'];

/// Characters kept inside a token but counted as special
fn is_special(c: char) -> bool {
    matches!(
        c,
        '@' | '&' | '=' | '%' | '#' | '+' | '$' | '*' | '~' | '^' | '|' | '\\' | '_' | '<' | '>'
    )
}

fn is_token_start(c: char) -> bool {
    c.is_alphanumeric()
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || JOINERS.contains(&c) || is_special(c)
}

/// Consecutive line breaks that enclose two blank lines
const PARAGRAPH_BREAK_NEWLINES: u8 = 3;

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Chunked text tokenizer.
///
/// Text arrives in successive chunks; offsets, sentence numbers and token
/// order carry over from one chunk to the next until [`Tokenizer::init`]
/// starts a new stream. External scanners that strip markup can advance the
/// offset and sentence counters without supplying characters.
pub struct Tokenizer {
    config: TokenizerConfig,
    chars: Vec<char>,
    cursor: usize,
    /// Absolute offset of `chars[0]`
    base_offset: u32,
    /// Whether the next chunk shifts past the current one
    carry_chunk: bool,
    section: u8,
    sentence: u16,
    order: u16,
    newlines: u8,
    sentence_closed: bool,
}

impl Tokenizer {
    pub fn new(config: &TokenizerConfig) -> Self {
        Self {
            config: config.clone(),
            chars: Vec::new(),
            cursor: 0,
            base_offset: 0,
            carry_chunk: true,
            section: 0,
            sentence: 0,
            order: 0,
            newlines: 0,
            sentence_closed: false,
        }
    }

    /// Reset every cursor and begin a new stream with `text`
    pub fn init(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = 0;
        self.base_offset = 0;
        self.carry_chunk = true;
        self.section = 0;
        self.sentence = 0;
        self.order = 0;
        self.newlines = 0;
        self.sentence_closed = false;
    }

    /// Continue the stream with the next chunk of text
    pub fn next_chunk(&mut self, text: &str) {
        if self.carry_chunk {
            self.base_offset = self.base_offset.wrapping_add(self.chars.len() as u32);
        }
        self.carry_chunk = true;
        self.chars = text.chars().collect();
        self.cursor = 0;
    }

    /// Advance the offset by `n` characters that were skipped outside the tokenizer
    pub fn increment_offset(&mut self, n: u32) {
        self.base_offset = self.base_offset.wrapping_add(n);
    }

    /// Start a new sentence without supplying punctuation
    pub fn increment_sentence(&mut self) {
        self.bump_sentence();
        self.sentence_closed = true;
    }

    /// Reset the offset baseline; the next chunk starts at offset zero
    pub fn flush_offset(&mut self) {
        self.base_offset = 0;
        self.carry_chunk = false;
    }

    /// Section id stamped on subsequent token positions
    pub fn set_section(&mut self, section: u8) {
        self.section = section;
    }

    pub fn sentence_number(&self) -> u16 {
        self.sentence
    }

    pub fn order(&self) -> u16 {
        self.order
    }

    /// Produce the next token, or an end-of-stream token once the chunk is exhausted
    pub fn next_word(&mut self) -> Token {
        while self.cursor < self.chars.len() && !is_token_start(self.chars[self.cursor]) {
            self.observe_delimiter(self.cursor);
            self.cursor += 1;
        }

        if self.cursor >= self.chars.len() {
            let offset = self.base_offset.wrapping_add(self.chars.len() as u32);
            return Token::end_of_stream(
                Position::new(offset, self.section),
                self.sentence,
                self.order,
            );
        }

        let start = self.cursor;
        let mut specials = 0usize;
        let mut has_upper = false;
        while self.cursor < self.chars.len() && is_token_char(self.chars[self.cursor]) {
            let c = self.chars[self.cursor];
            if is_special(c) {
                specials += 1;
            }
            if c.is_uppercase() {
                has_upper = true;
            }
            self.cursor += 1;
        }

        // Trailing punctuation goes back to the delimiter scan so sentence ends are seen
        let mut end = self.cursor;
        while end > start + 1 && self.chars[end - 1].is_ascii_punctuation() {
            if is_special(self.chars[end - 1]) {
                specials -= 1;
            }
            end -= 1;
        }
        self.cursor = end;

        let raw: String = self.chars[start..end].iter().collect();
        let (text, token_type, stripped) = self.classify(raw, end - start, specials, has_upper);

        // Offsets point at the first character the token text keeps
        let offset = self.base_offset.wrapping_add((start + stripped) as u32);
        let token = Token::new(
            text,
            token_type,
            Position::new(offset, self.section),
            self.sentence,
            self.order,
        );
        self.order = self.order.wrapping_add(1);
        self.newlines = 0;
        self.sentence_closed = false;
        token
    }

    /// Tokenize a whole text as one stream
    pub fn tokenize(&mut self, text: &str) -> Vec<Token> {
        self.init(text);
        let mut tokens = Vec::new();
        loop {
            let token = self.next_word();
            if token.is_end_of_stream() {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    /// Classify a raw token; the last value counts leading characters
    /// dropped from the text
    fn classify(
        &self,
        raw: String,
        len: usize,
        specials: usize,
        has_upper: bool,
    ) -> (String, TokenType, usize) {
        if len > self.config.max_token_length || specials > self.config.max_special_chars {
            return (raw, TokenType::Unusable, 0);
        }
        let text = if has_upper { raw.to_lowercase() } else { raw };

        if len >= 4 && text.starts_with("www.") {
            return (text, TokenType::WebAddress, 0);
        }
        if len > HTTP_SCHEME.len() && text.starts_with(HTTP_SCHEME) {
            return (
                text[HTTP_SCHEME.len()..].to_string(),
                TokenType::WebAddress,
                HTTP_SCHEME.len(),
            );
        }
        if text.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return (text, TokenType::Number, 0);
        }
        (text, TokenType::Word, 0)
    }

    fn observe_delimiter(&mut self, index: usize) {
        let c = self.chars[index];
        if is_sentence_end(c) {
            let followed_by_space = self
                .chars
                .get(index + 1)
                .map_or(true, |next| next.is_whitespace());
            if followed_by_space && !self.sentence_closed {
                self.bump_sentence();
                self.sentence_closed = true;
            }
            self.newlines = 0;
        } else if c == '\n' {
            self.newlines += 1;
            if self.newlines >= PARAGRAPH_BREAK_NEWLINES {
                if !self.sentence_closed {
                    self.bump_sentence();
                    self.sentence_closed = true;
                }
                self.newlines = 0;
            }
        } else if !c.is_whitespace() {
            self.newlines = 0;
        }
    }

    fn bump_sentence(&mut self) {
        self.sentence = (self.sentence + 1) % self.config.sentence_modulus.max(1);
    }
}
