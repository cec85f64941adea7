use crate::model::{Book, Manuscript, PartContent, PartType};
use serde::Serialize;

#[derive(Serialize)]
struct DecodedPart<'a> {
    part_index: i64,
    part_type: &'a PartType,
    degraded: bool,
    content: PartContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_url: Option<&'a str>,
}

#[derive(Serialize)]
struct DecodedManuscript<'a> {
    book: &'a Book,
    parts: Vec<DecodedPart<'a>>,
}

impl Manuscript {
    /// The decoded content model as pretty JSON, parts in reading order.
    ///
    /// Each part shows the payload the renderers actually see, so a payload that fell back to
    /// plain text is easy to spot (`"degraded": true`).
    pub fn to_readable_json(&self) -> String {
        let parts = crate::assemble::sort_parts(&self.parts)
            .into_iter()
            .map(|part| {
                let content = part.decode();
                DecodedPart {
                    part_index: part.part_index,
                    part_type: &part.part_type,
                    degraded: content.is_degraded(),
                    content,
                    pdf_url: part.pdf_url.as_deref(),
                }
            })
            .collect();
        let decoded = DecodedManuscript {
            book: &self.book,
            parts,
        };
        serde_json::to_string_pretty(&decoded)
            .unwrap_or_else(|e| format!("{{\"error\": {:?}}}", e.to_string()))
    }

    /// Saves the decoded content model to a JSON file for inspection.
    ///
    /// # Example
    /// ```no_run
    /// use bookpress::model::Manuscript;
    ///
    /// let manuscript = Manuscript::from_json(&std::fs::read_to_string("book.json").unwrap()).unwrap();
    /// manuscript.save_to_json_file("model.json").unwrap();
    /// ```
    pub fn save_to_json_file(&self, file_path: &str) -> std::io::Result<()> {
        std::fs::write(file_path, self.to_readable_json())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Book, BookPart, Manuscript, PartType};

    #[test]
    fn test_readable_json_shows_decoded_parts_in_order() {
        let manuscript = Manuscript {
            book: Book {
                id: "b1".to_string(),
                title: "T".to_string(),
                ..Default::default()
            },
            parts: vec![
                BookPart::new(4, PartType::ChapterTitle, "{broken"),
                BookPart::new(1, PartType::Toc, r#"{"content":"Chapter 1\n- Roots"}"#),
            ],
        };
        let json: serde_json::Value =
            serde_json::from_str(&manuscript.to_readable_json()).unwrap();
        let parts = json["parts"].as_array().unwrap();
        assert_eq!(parts[0]["part_index"], 1);
        assert_eq!(parts[0]["content"]["kind"], "toc");
        assert_eq!(parts[0]["content"]["entries"][1]["subchapter"], true);
        assert_eq!(parts[1]["degraded"], true);
        assert_eq!(parts[1]["content"]["text"], "{broken");
        assert_eq!(json["book"]["title"], "T");
    }

    #[test]
    fn test_save_to_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let manuscript = Manuscript {
            book: Book::default(),
            parts: Vec::new(),
        };
        manuscript
            .save_to_json_file(path.to_str().unwrap())
            .unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"parts\": []"));
    }
}
