//! Context snippet reconstruction against a live index

use std::sync::Arc;
use std::time::Duration;

use omnidex::{
    ContextBuilder, IndexSettings, IndexingQueue, InMemoryTextProvider, TermDictionary, TextIndex,
    TextPart, TrieTermDictionary,
};

struct Setup {
    index: Arc<TextIndex>,
    provider: Arc<InMemoryTextProvider>,
    builder: ContextBuilder,
}

fn setup() -> Setup {
    let settings = IndexSettings::default();
    let dictionary: Arc<dyn TermDictionary> = Arc::new(TrieTermDictionary::in_memory().unwrap());
    let index = Arc::new(TextIndex::new(settings.clone(), dictionary.clone()).unwrap());
    let provider = Arc::new(InMemoryTextProvider::new());
    let builder =
        ContextBuilder::new(dictionary, provider.clone(), &settings).with_index(index.clone());
    Setup {
        index,
        provider,
        builder,
    }
}

#[test]
fn test_mail_with_subject_and_markup_gap() {
    let s = setup();
    s.provider.insert(
        1,
        vec![
            TextPart::Heading("Quarterly prices".to_string()),
            TextPart::Fragment("Hello team,".to_string()),
            TextPart::Blanks(4),
            TextPart::Fragment("the new price list is attached.".to_string()),
        ],
    );
    s.index.index_document(1, s.provider.as_ref()).unwrap();
    s.index.end_batch_update().unwrap();

    let entries = s.index.process_query("price").unwrap().unwrap();
    assert_eq!(entries.len(), 1);
    let context = s.builder.build(&entries[0]).unwrap();

    assert_eq!(
        context.text,
        "Quarterly prices Hello team,    the new price list is attached."
    );
    // body hits sort before subject hits
    assert_eq!(context.highlighted(), vec!["price", "prices"]);
}

#[test]
fn test_context_sentinel_after_delete() {
    let s = setup();
    s.provider.insert_text(1, "fourplay in the first document");
    s.index.index_document(1, s.provider.as_ref()).unwrap();
    s.index.end_batch_update().unwrap();
    let entry = s.index.process_query("fourplay").unwrap().unwrap().remove(0);

    s.index.delete_document(1).unwrap();
    let context = s.builder.context_or_sentinel(&entry);
    assert!(context.is_sentinel());
    assert_eq!(context.text, "No context available");
    assert!(context.highlights.is_empty());
}

#[test]
fn test_long_document_windows() {
    let s = setup();
    let mut text = String::from("Fourplay opens the match. ");
    for i in 0..40 {
        text.push_str(&format!("filler{} ", i));
    }
    text.push_str("Then fourplay again near the end. More filler follows here.");
    s.provider.insert_text(3, text.clone());
    s.index.index_document(3, s.provider.as_ref()).unwrap();
    s.index.end_batch_update().unwrap();

    let entry = s.index.process_query("fourplay").unwrap().unwrap().remove(0);
    let context = s.builder.build(&entry).unwrap();

    assert!(context.text.len() < text.len());
    assert_eq!(context.text.matches("...").count(), 1);
    // highlights point at the text as written
    assert_eq!(context.highlighted(), vec!["Fourplay", "fourplay"]);
    assert!(context.text.contains("Then fourplay again"));
}

#[test]
fn test_queue_indexing_then_context() {
    let s = setup();
    s.provider.insert_text(5, "queued crabbing expedition");
    let queue = IndexingQueue::spawn(s.index.clone());
    queue.add_document(5, s.provider.clone()).unwrap();
    queue.end_batch().unwrap();
    assert!(queue.wait_idle(Duration::from_secs(5)));

    let entry = s.index.process_query("crab").unwrap().unwrap().remove(0);
    let context = s.builder.context_or_sentinel(&entry);
    assert!(!context.is_sentinel());
    assert_eq!(context.highlighted(), vec!["crabbing"]);
    queue.shutdown().unwrap();
}
