use crate::config::MAX_SECTIONS;

use super::{SectionTable, SectionTracker, TextConsumer};

/// A document rendered back into plain text
#[derive(Clone, Debug, Default)]
pub struct RenderedText {
    text: String,
    section_starts: [Option<u32>; MAX_SECTIONS],
}

impl RenderedText {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Character offset where a section's text begins
    pub fn section_start(&self, section: u8) -> Option<u32> {
        self.section_starts.get(section as usize).copied().flatten()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// [`TextConsumer`] that concatenates a rendering into one string.
///
/// Section changes insert the section delimiter; blank directives become
/// spaces so that indexed offsets stay valid.
pub struct TextCollector {
    sections: SectionTable,
    delimiter: String,
    tracker: SectionTracker,
    text: String,
}

impl TextCollector {
    pub fn new(sections: SectionTable, section_delimiter: &str) -> Self {
        Self {
            sections,
            delimiter: section_delimiter.to_string(),
            tracker: SectionTracker::new(section_delimiter.chars().count() as u32),
            text: String::new(),
        }
    }

    pub fn finish(self) -> RenderedText {
        RenderedText {
            section_starts: self.tracker.starts(),
            text: self.text,
        }
    }

    fn open_content(&mut self) {
        if let Some(boundary) = self.tracker.begin_content() {
            if boundary.delimiter {
                self.text.push_str(&self.delimiter);
            }
        }
    }
}

impl TextConsumer for TextCollector {
    fn add_fragment(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.open_content();
        self.text.push_str(text);
        self.tracker.advance(text.chars().count() as u32);
    }

    fn add_heading(&mut self, text: &str) {
        let previous = self.tracker.requested();
        self.tracker.request(self.sections.subject_id());
        self.add_fragment(text);
        self.tracker.request(previous);
    }

    fn increment_offset(&mut self, blanks: u32) {
        if blanks == 0 {
            return;
        }
        self.open_content();
        self.text.extend(std::iter::repeat(' ').take(blanks as usize));
        self.tracker.advance(blanks);
    }

    fn start_section(&mut self, name: &str) {
        let id = self.sections.id_of(name);
        self.tracker.request(id);
    }
}
