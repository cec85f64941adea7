use bookpress::assemble::{sort_parts, Assembler};
use bookpress::config::PressConfig;
use bookpress::model::{Book, BookPart, PartType};

fn book() -> Book {
    Book {
        id: "b1".to_string(),
        title: "Small Gardens".to_string(),
        author: Some("R. Vale".to_string()),
        ..Default::default()
    }
}

fn body(html: &str) -> &str {
    let start = html.find("<body").unwrap();
    &html[start..]
}

#[test]
fn test_parts_render_in_index_order_and_ties_keep_input_order() {
    let parts = vec![
        BookPart::new(5, PartType::Conclusion, r#"{"title":"End"}"#),
        BookPart::new(1, PartType::ChapterTitle, r#"{"title":"First tie"}"#),
        BookPart::new(0, PartType::Cover, "{}"),
        BookPart::new(1, PartType::ChapterTitle, r#"{"title":"Second tie"}"#),
    ];
    let order: Vec<i64> = sort_parts(&parts).iter().map(|p| p.part_index).collect();
    assert_eq!(order, vec![0, 1, 1, 5]);

    let config = PressConfig::default();
    let html = Assembler::new(&config).assemble_full(&book(), &parts);
    let body = body(&html);
    let positions: Vec<usize> = ["cover-title", "First tie", "Second tie", "End"]
        .iter()
        .map(|needle| body.find(needle).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_chapter_body_keeps_subchapter_order_and_markup() {
    let content = r#"{
        "title": "Soil",
        "introduction": "Good soil is **alive** and **dark**.",
        "subchapters": [
            { "title": "Zinc", "content": "- one\n- two\n1. first\n2. second\nAfter." },
            { "title": "Acids", "content": "Test it." }
        ]
    }"#;
    let parts = vec![BookPart::new(3, PartType::ChapterContent, content)];
    let config = PressConfig::default();
    let html = Assembler::new(&config).assemble_full(&book(), &parts);
    let body = body(&html);

    assert!(body.contains("<strong>alive</strong> and <strong>dark</strong>"));
    assert!(body.find("Zinc").unwrap() < body.find("Acids").unwrap());
    assert_eq!(body.matches("<ul>").count(), 1);
    assert_eq!(body.matches("<ol>").count(), 1);
    assert!(body.find("</ul>").unwrap() < body.find("<ol>").unwrap());
    assert!(body.contains("<p>After.</p>"));
}

#[test]
fn test_malformed_payload_falls_back_to_its_raw_text() {
    let parts = vec![BookPart::new(2, PartType::Introduction, "this is {not json")];
    let config = PressConfig::default();
    let html = Assembler::new(&config).assemble_full(&book(), &parts);
    assert!(body(&html).contains("this is {not json"));
}

#[test]
fn test_empty_and_unknown_parts_still_give_a_valid_document() {
    let config = PressConfig::default();
    let assembler = Assembler::new(&config);

    let empty = assembler.assemble_full(&book(), &[]);
    assert!(empty.starts_with("<!DOCTYPE html>"));
    assert!(empty.trim_end().ends_with("</html>"));

    let parts = vec![
        BookPart::new(0, PartType::from("appendix"), r#"{"content":"hidden"}"#),
        BookPart::new(1, PartType::ChapterTitle, r#"{"title":"Kept"}"#),
    ];
    let html = assembler.assemble_full(&book(), &parts);
    assert!(!html.contains("hidden"));
    assert!(html.contains("Kept"));
}

#[test]
fn test_standalone_documents_frame_everything_but_the_cover() {
    let config = PressConfig::default();
    let assembler = Assembler::new(&config);
    let cover = assembler.assemble_part(&book(), &BookPart::new(0, PartType::Cover, "{}"));
    let chapter = assembler.assemble_part(
        &book(),
        &BookPart::new(1, PartType::ChapterTitle, r#"{"title":"One"}"#),
    );
    assert!(!body(&cover).contains("page-frame"));
    assert!(body(&chapter).contains("page-frame"));
    assert!(!body(&chapter).contains("running-title"));
}
