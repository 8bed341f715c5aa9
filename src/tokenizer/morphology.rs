//! Suffix heuristics relating English wordforms to their base lexeme
//!
//! [`analyze`] maps a surface word to a base and a grammatical form;
//! [`inflect`] rebuilds the surface from the base and a regular form. Any
//! surface that the regular rules cannot rebuild is reported as irregular
//! and kept verbatim by the dictionary's variant table.

use super::position::GrammarTag;
use crate::error::Result;

/// Grammatical form found by [`analyze`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WordForm {
    Base,
    Plural,
    Past,
    Continuous,
    /// Surface that the regular rules do not rebuild
    Irregular(String),
}

/// A surface word split into base lexeme and form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lemma {
    pub base: String,
    pub form: WordForm,
}

impl Lemma {
    fn base(word: &str) -> Self {
        Self {
            base: word.to_string(),
            form: WordForm::Base,
        }
    }
}

const MIN_ANALYZED_LEN: usize = 4;

fn is_vowel(c: u8) -> bool {
    matches!(c, b'a' | b'e' | b'i' | b'o' | b'u' | b'y')
}

/// A doubled final consonant, as in `crabb` from `crabbing`
fn doubled_consonant(stem: &str) -> bool {
    let bytes = stem.as_bytes();
    if bytes.len() < 3 {
        return false;
    }
    let last = bytes[bytes.len() - 1];
    last == bytes[bytes.len() - 2] && !is_vowel(last) && !matches!(last, b'l' | b's' | b'f' | b'z')
}

fn plausible_stem(stem: &str) -> bool {
    stem.len() >= 3 && stem.bytes().any(is_vowel)
}

/// Rebuild the surface of `base` in a regular form; `None` for variants.
pub fn inflect(base: &str, tag: GrammarTag) -> Option<String> {
    match tag {
        GrammarTag::None => Some(base.to_string()),
        GrammarTag::Plural => {
            let mut word = match base.strip_suffix('y') {
                Some(stem) => format!("{}ie", stem),
                None => base.to_string(),
            };
            word.push('s');
            Some(word)
        }
        GrammarTag::Past => {
            let mut word = match base.strip_suffix('y') {
                Some(stem) => format!("{}i", stem),
                None => base.to_string(),
            };
            if !word.ends_with('e') {
                word.push('e');
            }
            word.push('d');
            Some(word)
        }
        GrammarTag::Continuous => {
            let stem = base.strip_suffix('e').unwrap_or(base);
            Some(format!("{}ing", stem))
        }
        GrammarTag::Variant(_) => None,
    }
}

/// Split `word` into base lexeme and form.
///
/// `is_known` reports whether a candidate base already exists in the
/// dictionary; it decides between `stem` and `stem + "e"` for `-ed`/`-ing`.
/// Its errors are returned unchanged.
pub fn analyze<F>(word: &str, is_known: F) -> Result<Lemma>
where
    F: Fn(&str) -> Result<bool>,
{
    if word.len() < MIN_ANALYZED_LEN || !word.bytes().all(|b| b.is_ascii_lowercase()) {
        return Ok(Lemma::base(word));
    }

    if word.len() > 4 {
        if let Some(stem) = word.strip_suffix("ies") {
            return Ok(settle(format!("{}y", stem), GrammarTag::Plural, word));
        }
        if let Some(stem) = word.strip_suffix("ied") {
            return Ok(settle(format!("{}y", stem), GrammarTag::Past, word));
        }
        if !word.ends_with("eed") {
            if let Some(stem) = word.strip_suffix("ed") {
                if plausible_stem(stem) {
                    return settle_stem(stem, GrammarTag::Past, word, &is_known);
                }
            }
        }
    }
    if word.len() > 5 {
        if let Some(stem) = word.strip_suffix("ing") {
            if plausible_stem(stem) {
                return settle_stem(stem, GrammarTag::Continuous, word, &is_known);
            }
        }
    }
    if let Some(stem) = word.strip_suffix('s') {
        if !(word.ends_with("ss") || word.ends_with("us") || word.ends_with("is")) {
            return Ok(settle(stem.to_string(), GrammarTag::Plural, word));
        }
    }
    Ok(Lemma::base(word))
}

fn settle_stem<F>(stem: &str, tag: GrammarTag, word: &str, is_known: &F) -> Result<Lemma>
where
    F: Fn(&str) -> Result<bool>,
{
    if doubled_consonant(stem) {
        return Ok(settle(stem[..stem.len() - 1].to_string(), tag, word));
    }
    let with_e = format!("{}e", stem);
    let base = if !is_known(stem)? && is_known(&with_e)? {
        with_e
    } else {
        stem.to_string()
    };
    Ok(settle(base, tag, word))
}

fn settle(base: String, tag: GrammarTag, word: &str) -> Lemma {
    let regular = inflect(&base, tag);
    let form = if regular.as_deref() == Some(word) {
        match tag {
            GrammarTag::Plural => WordForm::Plural,
            GrammarTag::Past => WordForm::Past,
            GrammarTag::Continuous => WordForm::Continuous,
            _ => WordForm::Base,
        }
    } else {
        WordForm::Irregular(word.to_string())
    };
    Lemma { base, form }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;

    fn unknown(_: &str) -> Result<bool> {
        Ok(false)
    }

    #[test]
    fn test_inflect_regular_forms() {
        assert_eq!(inflect("bright", GrammarTag::None).unwrap(), "bright");
        assert_eq!(inflect("price", GrammarTag::Plural).unwrap(), "prices");
        assert_eq!(inflect("city", GrammarTag::Plural).unwrap(), "cities");
        assert_eq!(inflect("walk", GrammarTag::Past).unwrap(), "walked");
        assert_eq!(inflect("try", GrammarTag::Past).unwrap(), "tried");
        assert_eq!(inflect("price", GrammarTag::Past).unwrap(), "priced");
        assert_eq!(inflect("make", GrammarTag::Continuous).unwrap(), "making");
        assert_eq!(inflect("walk", GrammarTag::Continuous).unwrap(), "walking");
        assert!(inflect("walk", GrammarTag::Variant(0)).is_none());
    }

    #[test]
    fn test_analyze_plurals() {
        assert_eq!(
            analyze("prices", unknown).unwrap(),
            Lemma { base: "price".to_string(), form: WordForm::Plural }
        );
        assert_eq!(
            analyze("cities", unknown).unwrap(),
            Lemma { base: "city".to_string(), form: WordForm::Plural }
        );
        assert_eq!(analyze("glass", unknown).unwrap().form, WordForm::Base);
        assert_eq!(analyze("this", unknown).unwrap().form, WordForm::Base);

        // Regular rules give "daies", so the surface is kept verbatim
        let days = analyze("days", unknown).unwrap();
        assert_eq!(days.base, "day");
        assert_eq!(days.form, WordForm::Irregular("days".to_string()));
    }

    #[test]
    fn test_analyze_verbs() {
        assert_eq!(analyze("walked", unknown).unwrap().form, WordForm::Past);
        assert_eq!(analyze("tried", unknown).unwrap().base, "try");
        assert_eq!(analyze("speed", unknown).unwrap().form, WordForm::Base);

        let crabbing = analyze("crabbing", unknown).unwrap();
        assert_eq!(crabbing.base, "crab");
        assert_eq!(crabbing.form, WordForm::Irregular("crabbing".to_string()));

        let falling = analyze("falling", unknown).unwrap();
        assert_eq!(falling.base, "fall");
        assert_eq!(falling.form, WordForm::Continuous);
    }

    #[test]
    fn test_known_base_with_e_wins() {
        let known = |w: &str| Ok(w == "make");
        let making = analyze("making", known).unwrap();
        assert_eq!(making.base, "make");
        assert_eq!(making.form, WordForm::Continuous);

        assert_eq!(analyze("making", unknown).unwrap().base, "mak");
    }

    #[test]
    fn test_short_or_mixed_words_untouched() {
        assert_eq!(analyze("bright", unknown).unwrap().form, WordForm::Base);
        assert_eq!(analyze("is", unknown).unwrap().form, WordForm::Base);
        assert_eq!(analyze("token3s", unknown).unwrap().form, WordForm::Base);
        assert_eq!(analyze("fourplay", unknown).unwrap().form, WordForm::Base);
    }

    #[test]
    fn test_lookup_errors_propagate() {
        fn failing(_: &str) -> Result<bool> {
            Err(IndexError::Disposed)
        }
        assert!(matches!(analyze("making", failing), Err(IndexError::Disposed)));
        // Words that never consult the dictionary still resolve
        assert_eq!(analyze("prices", failing).unwrap().base, "price");
    }
}
