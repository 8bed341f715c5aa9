//! Token positions and their packed 32-bit layout
//!
//! Layout of the position word (bit 31 = MSB):
//!
//! | Bits   | Meaning                                              |
//! |--------|------------------------------------------------------|
//! | 31     | plural marker                                        |
//! | 30     | proper-past marker                                   |
//! | 29     | continuous marker                                    |
//! | 28..26 | section id (same bits as comma/colon/paren markers)  |
//! | 25..24 | low bits of a wordform variant code                  |
//! | 23..0  | raw character offset, modulo 2^24 - 1                |
//!
//! A wordform variant code borrows bits 31..29 for its high part, so the
//! grammar markers are mutually exclusive. Variant `i` is not a plain 5-bit
//! index: it is stored as `i / 3` in bits 31..29 and `i % 3 + 1` in bits
//! 25..24. A non-zero low part is what marks the word as a variant, so only
//! three of the four low values are usable and there are 8 * 3 = 24 slots
//! ([`MAX_VARIANTS`]). [`Position`] keeps them apart as
//! a [`GrammarTag`] and only produces the packed form at the storage boundary.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Offsets wrap at this value
pub const OFFSET_MODULUS: u32 = 0x00FF_FFFF;

const OFFSET_MASK: u32 = 0x00FF_FFFF;
const PLURAL_BIT: u32 = 1 << 31;
const PAST_BIT: u32 = 1 << 30;
const CONTINUOUS_BIT: u32 = 1 << 29;
const GRAMMAR_HIGH_SHIFT: u32 = 29;
const GRAMMAR_HIGH_MASK: u32 = 0b111 << GRAMMAR_HIGH_SHIFT;
const SECTION_SHIFT: u32 = 26;
const SECTION_MASK: u32 = 0b111 << SECTION_SHIFT;
const VARIANT_LOW_SHIFT: u32 = 24;
const VARIANT_LOW_MASK: u32 = 0b11 << VARIANT_LOW_SHIFT;

/// Legacy punctuation markers; they alias the section id field.
pub const COMMA_SUFFIX_BIT: u32 = 1 << 28;
pub const COLON_SUFFIX_BIT: u32 = 1 << 27;
pub const LEFT_PAREN_BIT: u32 = 1 << 26;

/// Number of wordform variants a single base lexeme can carry.
///
/// A variant code needs non-zero low bits to be told apart from the
/// plain plural/past/continuous markers: 8 high values x 3 low values.
pub const MAX_VARIANTS: u8 = 24;

/// Grammatical form of a token relative to its base lexeme
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrammarTag {
    #[default]
    None,
    Plural,
    Past,
    Continuous,
    /// Index into the dictionary's table of irregular forms for the base
    Variant(u8),
}

impl GrammarTag {
    pub fn is_none(&self) -> bool {
        matches!(self, GrammarTag::None)
    }

    fn encode(self) -> u32 {
        match self {
            GrammarTag::None => 0,
            GrammarTag::Plural => PLURAL_BIT,
            GrammarTag::Past => PAST_BIT,
            GrammarTag::Continuous => CONTINUOUS_BIT,
            GrammarTag::Variant(index) => {
                let index = (index % MAX_VARIANTS) as u32;
                let high = index / 3;
                let low = index % 3 + 1;
                (high << GRAMMAR_HIGH_SHIFT) | (low << VARIANT_LOW_SHIFT)
            }
        }
    }

    fn decode(word: u32) -> Result<Self> {
        let high = (word & GRAMMAR_HIGH_MASK) >> GRAMMAR_HIGH_SHIFT;
        let low = (word & VARIANT_LOW_MASK) >> VARIANT_LOW_SHIFT;
        if low != 0 {
            return Ok(GrammarTag::Variant((high * 3 + low - 1) as u8));
        }
        match word & GRAMMAR_HIGH_MASK {
            0 => Ok(GrammarTag::None),
            PLURAL_BIT => Ok(GrammarTag::Plural),
            PAST_BIT => Ok(GrammarTag::Past),
            CONTINUOUS_BIT => Ok(GrammarTag::Continuous),
            other => Err(IndexError::data_format(format!(
                "conflicting grammar markers {:#010x} in position word",
                other
            ))),
        }
    }
}

/// Position of a token inside a document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    offset: u32,
    section: u8,
    grammar: GrammarTag,
}

impl Position {
    /// Create a position; the offset is reduced modulo 2^24 - 1
    pub fn new(offset: u32, section: u8) -> Self {
        debug_assert!(section < 8, "section id {} does not fit in 3 bits", section);
        Self {
            offset: offset % OFFSET_MODULUS,
            section: section & 0b111,
            grammar: GrammarTag::None,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn section_id(&self) -> u8 {
        self.section
    }

    pub fn grammar(&self) -> GrammarTag {
        self.grammar
    }

    /// Replace the section id, keeping any grammar mark
    pub fn with_section(mut self, section: u8) -> Self {
        debug_assert!(section < 8, "section id {} does not fit in 3 bits", section);
        self.section = section & 0b111;
        self
    }

    /// Apply a grammar mark.
    ///
    /// Marking a token that already carries a different mark is a contract
    /// violation: debug builds panic, release builds keep the first mark.
    pub fn with_grammar(self, tag: GrammarTag) -> Self {
        match self.try_with_grammar(tag) {
            Ok(position) => position,
            Err(err) => {
                debug_assert!(false, "{}", err);
                self
            }
        }
    }

    /// Apply a grammar mark, rejecting a second conflicting mark
    pub fn try_with_grammar(mut self, tag: GrammarTag) -> Result<Self> {
        if !self.grammar.is_none() && !tag.is_none() && self.grammar != tag {
            return Err(IndexError::ContractViolation(format!(
                "position already marked {:?}, cannot mark {:?}",
                self.grammar, tag
            )));
        }
        if let GrammarTag::Variant(index) = tag {
            if index >= MAX_VARIANTS {
                return Err(IndexError::ContractViolation(format!(
                    "wordform variant {} exceeds {}",
                    index, MAX_VARIANTS
                )));
            }
        }
        if !tag.is_none() {
            self.grammar = tag;
        }
        Ok(self)
    }

    /// Drop the grammar mark; section bits are untouched
    pub fn clear_grammar(mut self) -> Self {
        self.grammar = GrammarTag::None;
        self
    }

    /// Serialize to the packed 32-bit layout
    pub fn pack(&self) -> u32 {
        self.grammar.encode() | ((self.section as u32) << SECTION_SHIFT) | (self.offset & OFFSET_MASK)
    }

    /// Decode a packed position word
    pub fn unpack(word: u32) -> Result<Self> {
        Ok(Self {
            offset: word & OFFSET_MASK,
            section: ((word & SECTION_MASK) >> SECTION_SHIFT) as u8,
            grammar: GrammarTag::decode(word)?,
        })
    }
}

/// Pack a posting instance into one 64-bit word: position in the high half,
/// then sentence number and token order.
pub fn pack_instance(position: Position, sentence: u16, order: u16) -> u64 {
    ((position.pack() as u64) << 32) | ((sentence as u64) << 16) | order as u64
}

/// Inverse of [`pack_instance`]
pub fn unpack_instance(word: u64) -> Result<(Position, u16, u16)> {
    let position = Position::unpack((word >> 32) as u32)?;
    Ok((position, (word >> 16) as u16, word as u16))
}
