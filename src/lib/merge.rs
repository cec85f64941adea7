//! Merge stage: concatenates independently paginated per-part PDFs into the final book and
//! stamps running heads.
//!
//! Pages are concatenated in `part_index` order and, inside each part, in their own page order.
//! Every page except the first (the cover) then receives a centred header holding the book title
//! in upper case and a centred footer holding its absolute position in the merged document
//! counted from 1. The cover is counted but never stamped, so the first stamped page reads "2".
//!
//! Merging needs a rendered artifact for every renderable part. [`check_artifacts`] runs before
//! anything is fetched and rejects the whole book when one is missing; a book with a hole in it
//! is never produced.

use crate::config::StampStyle;
use crate::fonts::{self, FontFace};
use crate::model::{Book, BookPart};
use crate::pdf::document_to_bytes;
use crate::PressError;
use log::{debug, info};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];
const MAX_TREE_DEPTH: usize = 32;
const STAMP_FONT: &str = "FStamp";

fn lopdf_error(context: &str) -> impl FnOnce(lopdf::Error) -> PressError + '_ {
    move |e| PressError::pdf_error(format!("{}: {}", context, e), None)
}

/// Rendered locator of every renderable part, in reading order.
///
/// Parts with an unknown type are not rendered and are ignored here. Fails with
/// [`PressError::MissingArtifacts`] naming every part that has no locator yet.
pub fn check_artifacts<'p>(
    book_id: &str,
    parts: &'p [BookPart],
) -> Result<Vec<(&'p BookPart, &'p str)>, PressError> {
    let mut artifacts = Vec::new();
    let mut missing = Vec::new();
    for part in crate::assemble::sort_parts(parts) {
        if !part.part_type.is_known() {
            continue;
        }
        match part.pdf_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => artifacts.push((part, url)),
            None => missing.push(part.part_index),
        }
    }
    if !missing.is_empty() {
        return Err(PressError::MissingArtifacts {
            book_id: book_id.to_string(),
            part_indices: missing,
        });
    }
    if artifacts.is_empty() {
        return Err(PressError::pdf_error(
            format!("book {:?} has no renderable parts", book_id),
            Some("Add at least one part with a known part type".to_string()),
        ));
    }
    Ok(artifacts)
}

fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Copies attributes a page inherits from its page tree onto the page itself, so the page
/// keeps its geometry and resources once it is re-parented.
fn flatten_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), PressError> {
    let mut inherited = Vec::new();
    for key in INHERITABLE {
        let own = doc
            .get_dictionary(page_id)
            .map(|page| page.has(key))
            .map_err(lopdf_error("reading page"))?;
        if own {
            continue;
        }
        if let Some(value) = inherited_attribute(doc, page_id, key) {
            inherited.push((key, value));
        }
    }
    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(lopdf_error("updating page"))?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}

/// Concatenates documents page by page, preserving document order and page order.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document, PressError> {
    let mut next_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;
        for page_id in doc.get_pages().into_values() {
            flatten_inherited(&mut doc, page_id)?;
            page_ids.push(page_id);
        }
        objects.extend(doc.objects);
    }

    if page_ids.is_empty() {
        return Err(PressError::pdf_error(
            "nothing to merge: no pages in any input document".to_string(),
            None,
        ));
    }

    let mut merged = Document::with_version("1.5");
    merged.objects = objects
        .into_iter()
        .filter(|(_, object)| {
            !matches!(
                object.type_name().unwrap_or(b""),
                b"Catalog" | b"Pages" | b"Outlines" | b"Outline"
            )
        })
        .collect();
    merged.max_id = merged.objects.keys().map(|id| id.0).max().unwrap_or(0);

    let pages_id = merged.new_object_id();
    for page_id in &page_ids {
        let page = merged
            .get_object_mut(*page_id)
            .and_then(Object::as_dict_mut)
            .map_err(lopdf_error("re-parenting page"))?;
        page.set("Parent", pages_id);
    }
    let count = page_ids.len() as i64;
    let kids: Vec<Object> = page_ids.into_iter().map(Object::Reference).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    debug!("merged {} page(s)", count);
    Ok(merged)
}

/// Lower-left corner and size of a page's MediaBox, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageBox {
    x0: f32,
    y0: f32,
    width: f32,
    height: f32,
}

impl Default for PageBox {
    // A5 portrait.
    fn default() -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            width: 419.53,
            height: 595.28,
        }
    }
}

fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox");
    let corners = media_box.as_ref().and_then(|b| b.as_array().ok()).and_then(|b| {
        let mut corners = [0.0f32; 4];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = b.get(i)?.as_float().ok()?;
        }
        Some(corners)
    });
    match corners {
        Some([llx, lly, urx, ury]) => PageBox {
            x0: llx.min(urx),
            y0: lly.min(ury),
            width: (urx - llx).abs(),
            height: (ury - lly).abs(),
        },
        None => PageBox::default(),
    }
}

/// Gives the page its own resource dictionary with the stamp font added.
fn add_stamp_font(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Result<(), PressError> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Reference(id)) => doc
            .get_dictionary(id)
            .map_err(lopdf_error("reading page resources"))?
            .clone(),
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    let mut font_dict = match resources.get(b"Font") {
        Ok(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .map_err(lopdf_error("reading page fonts"))?
            .clone(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    font_dict.set(STAMP_FONT, font_id);
    resources.set("Font", font_dict);
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(lopdf_error("updating page resources"))?
        .set("Resources", resources);
    Ok(())
}

fn centered_text(text: &str, size: f32, page: PageBox, baseline: f32) -> Vec<Operation> {
    let encoded = fonts::encode_win_ansi(text);
    let text_width = fonts::encoded_width(&encoded, FontFace::Regular, size);
    let x = page.x0 + (page.width - text_width) / 2.0;
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(STAMP_FONT.as_bytes().to_vec()), size.into()]),
        Operation::new("Td", vec![x.into(), baseline.into()]),
        Operation::new("Tj", vec![Object::string_literal(encoded)]),
        Operation::new("ET", vec![]),
    ]
}

/// Stamps the running header and page-number footer on every page but the first.
pub fn stamp_running_heads(
    doc: &mut Document,
    title: &str,
    stamp: &StampStyle,
) -> Result<(), PressError> {
    let header = title.to_uppercase();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => FontFace::Regular.base_font(),
        "Encoding" => "WinAnsiEncoding",
    });
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for (index, page_id) in page_ids.iter().copied().enumerate().skip(1) {
        let page = page_box(doc, page_id);
        add_stamp_font(doc, page_id, font_id)?;

        let mut operations = vec![Operation::new("rg", vec![0.into(), 0.into(), 0.into()])];
        operations.extend(centered_text(
            &header,
            stamp.size,
            page,
            page.y0 + page.height - stamp.header_offset,
        ));
        operations.extend(centered_text(
            &(index + 1).to_string(),
            stamp.size,
            page,
            page.y0 + stamp.footer_offset,
        ));
        let encoded = Content { operations }
            .encode()
            .map_err(lopdf_error("encoding stamp"))?;

        let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let stamp_id = doc.add_object(Stream::new(
            dictionary! {},
            [b"\nQ\n".as_slice(), encoded.as_slice()].concat(),
        ));

        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(lopdf_error("updating page contents"))?;
        let mut contents = vec![Object::Reference(save_id)];
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => contents.push(Object::Reference(*id)),
            Ok(Object::Array(items)) => contents.extend(items.iter().cloned()),
            _ => {}
        }
        contents.push(Object::Reference(stamp_id));
        page.set("Contents", contents);
    }
    debug!("stamped {} page(s)", page_ids.len().saturating_sub(1));
    Ok(())
}

fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Records title and author in the document information dictionary.
pub fn set_document_info(doc: &mut Document, book: &Book) {
    let mut info = dictionary! {
        "Title" => text_string(&book.title),
        "Producer" => text_string(concat!("bookpress ", env!("CARGO_PKG_VERSION"))),
    };
    if let Some(author) = &book.author {
        info.set("Author", text_string(author));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);
}

/// Fetches every part artifact, merges them in reading order and stamps the result.
///
/// The artifact precondition is checked before `fetch` is called for the first time.
pub fn merge_part_artifacts<F>(
    book: &Book,
    parts: &[BookPart],
    stamp: &StampStyle,
    mut fetch: F,
) -> Result<Vec<u8>, PressError>
where
    F: FnMut(&str) -> Result<Vec<u8>, PressError>,
{
    let artifacts = check_artifacts(&book.id, parts)?;
    info!(
        "merging {} part artifact(s) for book {:?}",
        artifacts.len(),
        book.id
    );

    let mut documents = Vec::with_capacity(artifacts.len());
    for (part, url) in artifacts {
        let bytes = fetch(url)?;
        let doc = Document::load_mem(&bytes).map_err(|e| {
            PressError::pdf_error(
                format!(
                    "artifact of part {} ({}) is not a readable PDF: {}",
                    part.part_index, url, e
                ),
                Some("Re-render the part to replace its artifact".to_string()),
            )
        })?;
        documents.push(doc);
    }

    let mut merged = merge_documents(documents)?;
    stamp_running_heads(&mut merged, &book.title, stamp)?;
    set_document_info(&mut merged, book);
    merged.compress();
    document_to_bytes(&mut merged)
}
