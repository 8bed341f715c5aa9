//! Text callbacks between the host and the index
//!
//! The host owns document text. Both indexing and context reconstruction
//! ask a [`TextProvider`] to render a document into a [`TextConsumer`]; the
//! section bookkeeping both sides share lives in [`SectionTracker`] so that
//! offsets recorded at indexing time line up with the re-rendered text.

mod collector;
mod memory;

use tracing::warn;

use crate::chunk::DocumentId;
use crate::config::{MAX_SECTIONS, SUBJECT_SECTION};

pub use collector::{RenderedText, TextCollector};
pub use memory::{InMemoryTextProvider, TextPart};

/// Receives a rendered document
pub trait TextConsumer {
    /// Append body text to the current section
    fn add_fragment(&mut self, text: &str);

    /// Append a heading; it goes to the subject section, then the previous
    /// section resumes
    fn add_heading(&mut self, text: &str);

    /// Account for `blanks` characters of stripped markup
    fn increment_offset(&mut self, blanks: u32);

    /// Switch subsequent text to the named section
    fn start_section(&mut self, name: &str);
}

/// Host callback that renders a document's current text
pub trait TextProvider: Send + Sync {
    /// Render `doc_id` into `consumer`. Returns false when the document no
    /// longer exists.
    fn render(&self, doc_id: DocumentId, consumer: &mut dyn TextConsumer) -> bool;
}

/// Section names by id
#[derive(Clone, Debug)]
pub struct SectionTable {
    names: Vec<String>,
}

impl SectionTable {
    pub fn new(names: &[String]) -> Self {
        Self {
            names: names.iter().take(MAX_SECTIONS).cloned().collect(),
        }
    }

    /// Id of a section name; unknown names fall back to the body section
    pub fn id_of(&self, name: &str) -> u8 {
        match self.names.iter().position(|n| n.eq_ignore_ascii_case(name)) {
            Some(id) => id as u8,
            None => {
                warn!(section = name, "unknown section, using body");
                0
            }
        }
    }

    pub fn subject_id(&self) -> u8 {
        self.id_of(SUBJECT_SECTION)
    }

    pub fn name(&self, id: u8) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// What happens to the offset stream when content opens a new section run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SectionBoundary {
    pub section: u8,
    /// A section delimiter precedes the content
    pub delimiter: bool,
    /// Distance from the section's first start to this content
    pub shift: u32,
    pub first: bool,
}

/// Tracks section starts in rendered characters.
///
/// A section's start is where its first content lands; re-entering a
/// section continues its offsets from that start. Switching sections only
/// takes effect once content follows, so a trailing heading leaves no
/// dangling delimiter.
#[derive(Clone, Debug)]
pub(crate) struct SectionTracker {
    requested: u8,
    active: Option<u8>,
    starts: [Option<u32>; MAX_SECTIONS],
    rendered: u32,
    delimiter_len: u32,
}

impl SectionTracker {
    pub fn new(delimiter_len: u32) -> Self {
        Self {
            requested: 0,
            active: None,
            starts: [None; MAX_SECTIONS],
            rendered: 0,
            delimiter_len,
        }
    }

    pub fn request(&mut self, section: u8) {
        self.requested = section.min(MAX_SECTIONS as u8 - 1);
    }

    pub fn requested(&self) -> u8 {
        self.requested
    }

    /// Call before emitting content
    pub fn begin_content(&mut self) -> Option<SectionBoundary> {
        if self.active == Some(self.requested) {
            return None;
        }
        let first = self.active.is_none();
        let delimiter = !first && self.delimiter_len > 0;
        if delimiter {
            self.rendered += self.delimiter_len;
        }
        let rendered = self.rendered;
        let start = *self.starts[self.requested as usize].get_or_insert(rendered);
        self.active = Some(self.requested);
        Some(SectionBoundary {
            section: self.requested,
            delimiter,
            shift: rendered - start,
            first,
        })
    }

    /// Record `chars` characters of emitted content
    pub fn advance(&mut self, chars: u32) {
        self.rendered += chars;
    }

    pub fn starts(&self) -> [Option<u32>; MAX_SECTIONS] {
        self.starts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SectionTable {
        SectionTable::new(&crate::config::IndexSettings::default().sections)
    }

    #[test]
    fn test_section_lookup() {
        let sections = table();
        assert_eq!(sections.id_of("Body"), 0);
        assert_eq!(sections.id_of("subject"), 1);
        assert_eq!(sections.subject_id(), 1);
        assert_eq!(sections.id_of("Attachment"), 0);
        assert_eq!(sections.name(2), Some("Annotation"));
    }

    #[test]
    fn test_tracker_starts_and_reentry() {
        let mut tracker = SectionTracker::new(1);

        let first = tracker.begin_content().unwrap();
        assert_eq!((first.section, first.delimiter, first.shift, first.first), (0, false, 0, true));
        tracker.advance(10);
        assert!(tracker.begin_content().is_none());

        tracker.request(1);
        let subject = tracker.begin_content().unwrap();
        assert!(subject.delimiter);
        assert_eq!(subject.shift, 0);
        tracker.advance(5);

        tracker.request(0);
        let back = tracker.begin_content().unwrap();
        // body restarted after 10 chars, a delimiter, 5 subject chars and another delimiter
        assert_eq!(back.shift, 17);
        assert_eq!(tracker.starts()[0], Some(0));
        assert_eq!(tracker.starts()[1], Some(11));
    }

    #[test]
    fn test_switch_without_content_is_free() {
        let mut tracker = SectionTracker::new(1);
        tracker.begin_content();
        tracker.advance(3);
        tracker.request(2);
        tracker.request(0);
        assert!(tracker.begin_content().is_none());
        assert_eq!(tracker.starts()[2], None);
    }
}
