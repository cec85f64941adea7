//! Publishing pipeline: per-part pagination, merge and final upload for one book.
//!
//! ```text
//! content_ready --> processing_parts --> generating_pdf --> ready
//!                   render each part      check artifacts
//!                   store artifact        fetch + merge + stamp
//!                   record pdf_url        upload book.pdf
//! ```
//!
//! Parts are rendered one at a time in `part_index` order. Each artifact is stored under a key
//! derived from the part's content, so a retry reuses every artifact whose part has not changed.
//! When an engine or storage call fails the error is returned and the book keeps its last
//! recorded status, ready to resume. A missing artifact at merge time is different: the book
//! moves to `error` and nothing is merged.

use crate::assemble::Assembler;
use crate::config::PressConfig;
use crate::engine::{PaginationEngine, PartDocument};
use crate::merge;
use crate::model::{Book, BookPart, BookStatus};
use crate::storage::{BookStore, ObjectStore};
use crate::PressError;
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};

/// Storage key of a part's rendered artifact.
///
/// The key changes whenever anything that shapes the rendered part changes: its type, its
/// payload, the book fields a cover falls back to, the book language, the page and style
/// configuration, or the engine.
pub fn artifact_key(config: &PressConfig, book: &Book, part: &BookPart, engine: &str) -> String {
    let layout = layout_fingerprint(config);
    let mut hasher = Sha256::new();
    for field in [
        engine,
        part.part_type.as_str(),
        part.content.as_str(),
        book.title.as_str(),
        book.subtitle.as_deref().unwrap_or(""),
        book.author.as_deref().unwrap_or(""),
        book.language.as_deref().unwrap_or(""),
        layout.as_str(),
    ] {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    format!(
        "books/{}/parts/{:04}-{}.pdf",
        book.id,
        part.part_index,
        &digest[..16]
    )
}

// Stamp settings are left out: they only apply at merge time.
fn layout_fingerprint(config: &PressConfig) -> String {
    format!(
        "{:?}\0{:?}\0{:?}\0{}\0{}\0{:?}",
        config.page,
        config.style,
        config.cover,
        config.copyright_notice,
        config.engine.command,
        config.engine.args
    )
}

pub fn book_key(book_id: &str) -> String {
    format!("books/{}/book.pdf", book_id)
}

/// What a publishing run did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PublishReport {
    pub book_id: String,
    /// Parts paginated during this run.
    pub rendered: Vec<i64>,
    /// Parts whose stored artifact was still current.
    pub reused: Vec<i64>,
    /// Parts with an unknown type.
    pub skipped: Vec<i64>,
    pub pages: usize,
    pub locator: Option<String>,
}

pub struct Publisher<'a> {
    config: &'a PressConfig,
    books: &'a dyn BookStore,
    objects: &'a dyn ObjectStore,
    engine: &'a dyn PaginationEngine,
}

impl<'a> Publisher<'a> {
    pub fn new(
        config: &'a PressConfig,
        books: &'a dyn BookStore,
        objects: &'a dyn ObjectStore,
        engine: &'a dyn PaginationEngine,
    ) -> Self {
        Self {
            config,
            books,
            objects,
            engine,
        }
    }

    fn move_to(&self, book: &mut Book, next: BookStatus) -> Result<(), PressError> {
        if book.status == next && next != BookStatus::ProcessingParts {
            return Ok(());
        }
        book.status.transition(next)?;
        self.books.set_status(&book.id, next)
    }

    /// Renders every part that has no current artifact and records its locator.
    pub fn render_parts(&self, book_id: &str) -> Result<PublishReport, PressError> {
        let mut book = self.books.book(book_id)?;
        self.move_to(&mut book, BookStatus::ProcessingParts)?;
        let parts = self.books.parts(book_id)?;
        let assembler = Assembler::new(self.config);

        let mut report = PublishReport {
            book_id: book_id.to_string(),
            ..Default::default()
        };
        for part in crate::assemble::sort_parts(&parts) {
            if !part.part_type.is_known() {
                warn!(
                    "part {} has unknown type {:?}, leaving it out of the book",
                    part.part_index,
                    part.part_type.as_str()
                );
                report.skipped.push(part.part_index);
                continue;
            }

            let key = artifact_key(self.config, &book, part, self.engine.name());
            if self.objects.exists(&key) {
                debug!("part {} is current at {}", part.part_index, key);
                if part.pdf_url.as_deref() != Some(key.as_str()) {
                    self.books.set_part_pdf_url(book_id, part.part_index, &key)?;
                }
                report.reused.push(part.part_index);
                continue;
            }

            let content = part.decode();
            let html = assembler.assemble_part(&book, part);
            let bytes = self.engine.paginate(&PartDocument {
                book: &book,
                part,
                content: &content,
                html: &html,
            })?;
            let locator = self.objects.put(&key, &bytes)?;
            self.books
                .set_part_pdf_url(book_id, part.part_index, &locator)?;
            info!(
                "rendered part {} ({}) with {} -> {}",
                part.part_index,
                part.part_type,
                self.engine.name(),
                locator
            );
            report.rendered.push(part.part_index);
        }
        Ok(report)
    }

    /// Merges the stored part artifacts into the final book and uploads it.
    pub fn merge_book(&self, book_id: &str) -> Result<String, PressError> {
        let mut book = self.books.book(book_id)?;
        let parts = self.books.parts(book_id)?;

        if let Err(e) = merge::check_artifacts(book_id, &parts) {
            error!("cannot merge book {:?}: {}", book_id, e);
            self.move_to(&mut book, BookStatus::Error)?;
            return Err(e);
        }
        self.move_to(&mut book, BookStatus::GeneratingPdf)?;

        let merged = merge::merge_part_artifacts(&book, &parts, &self.config.stamp, |locator| {
            self.objects.get(locator)
        })?;
        let locator = self.objects.put(&book_key(book_id), &merged)?;
        self.books.set_book_pdf_url(book_id, &locator)?;
        self.move_to(&mut book, BookStatus::Ready)?;
        info!("book {:?} is ready at {}", book_id, locator);
        Ok(locator)
    }

    /// Renders outstanding parts, merges and uploads.
    pub fn publish(&self, book_id: &str) -> Result<PublishReport, PressError> {
        let mut report = self.render_parts(book_id)?;
        let locator = self.merge_book(book_id)?;
        report.pages = lopdf::Document::load_mem(&self.objects.get(&locator)?)
            .map(|doc| doc.get_pages().len())
            .unwrap_or(0);
        report.locator = Some(locator);
        Ok(report)
    }
}
