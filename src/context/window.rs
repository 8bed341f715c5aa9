//! Window placement around a hit in rendered text
//!
//! All positions are character indices into the rendered document.

use crate::config::ContextConfig;

/// Half-open character range shown in the snippet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn overlaps(&self, other: &Window) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn merge(&mut self, other: &Window) {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }
}

fn is_break(c: char) -> bool {
    c.is_whitespace()
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '?' | '!')
}

/// Open a window around `[hit, hit + hit_len)` and tune its borders
pub(crate) fn open_window(text: &[char], hit: usize, hit_len: usize, config: &ContextConfig) -> Window {
    let len = text.len();
    let hit = hit.min(len);
    let hit_end = (hit + hit_len).min(len);

    let start = snap_start(text, hit.saturating_sub(config.radius), hit, config);
    let end = snap_end(text, (hit_end + config.radius).min(len), hit_end, config);

    match sentence_start(text, start, hit) {
        Some(sentence) => {
            let width = end - start;
            let end = (sentence + width).min(len).max(hit_end);
            Window {
                start: sentence,
                end: snap_end(text, end, hit_end, config),
            }
        }
        None => Window { start, end },
    }
}

/// Move a left border onto a word start: outward first, then inward
/// without leaving less than `min_radius` before the hit.
fn snap_start(text: &[char], start: usize, hit: usize, config: &ContextConfig) -> usize {
    if start == 0 || is_break(text[start - 1]) {
        return start;
    }

    let floor = start.saturating_sub(config.radius);
    let mut k = start;
    while k > floor {
        k -= 1;
        if k == 0 || is_break(text[k - 1]) {
            return k;
        }
    }

    let limit = hit.saturating_sub(config.min_radius);
    let mut k = start;
    while k < limit {
        k += 1;
        if is_break(text[k - 1]) {
            return k;
        }
    }
    start
}

/// Move a right border onto a word end, mirroring [`snap_start`]
fn snap_end(text: &[char], end: usize, hit_end: usize, config: &ContextConfig) -> usize {
    let len = text.len();
    if end >= len || is_break(text[end]) {
        return end.min(len);
    }

    let ceiling = (end + config.radius).min(len);
    let mut k = end;
    while k < ceiling {
        k += 1;
        if k == len || is_break(text[k]) {
            return k;
        }
    }

    let limit = (hit_end + config.min_radius).min(len);
    let mut k = end;
    while k > limit {
        k -= 1;
        if is_break(text[k]) {
            return k;
        }
    }
    end
}

/// Start of the sentence containing the hit, if it begins inside the window
fn sentence_start(text: &[char], start: usize, hit: usize) -> Option<usize> {
    let mut j = hit;
    while j > start {
        j -= 1;
        if is_sentence_end(text[j]) && j + 1 < hit && matches!(text[j + 1], ' ' | '\r' | '\n') {
            let mut begin = j + 1;
            while begin < hit && is_break(text[begin]) {
                begin += 1;
            }
            return Some(begin);
        }
    }
    None
}
