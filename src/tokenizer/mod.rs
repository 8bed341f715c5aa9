//! Tokenization: packed positions, tokens, the chunked tokenizer and
//! wordform heuristics.

pub mod morphology;
pub mod position;
mod token;
#[allow(clippy::module_inception)]
mod tokenizer;

pub use morphology::{analyze, inflect, Lemma, WordForm};
pub use position::{pack_instance, unpack_instance, GrammarTag, Position, MAX_VARIANTS};
pub use token::{Token, TokenType};
pub use tokenizer::Tokenizer;
