use crate::error::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Catalog entries that point into the source page tree and make no sense
/// once pages have been sliced and reordered.
const STALE_CATALOG_KEYS: [&str; 4] = ["Outlines", "OpenAction", "PageLabels", "StructTreeRoot"];

pub struct PdfDocument {
    pub doc: Document,
    pub path: PathBuf,
}

impl PdfDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let doc = Document::load(path).map_err(|e| Error::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), pages = doc.get_pages().len(), "opened PDF");
        Ok(PdfDocument {
            doc,
            path: path.to_path_buf(),
        })
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Page object IDs in page order; position `i` holds 0-based page `i`.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        // get_pages is keyed by 1-based page number, so the values come out in order
        self.doc.get_pages().into_values().collect()
    }

    /// Get metadata from the document info dictionary
    pub fn get_info(&self) -> PdfInfo {
        let mut info = PdfInfo {
            page_count: self.page_count(),
            ..Default::default()
        };

        let dict = match self.doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => self.doc.get_dictionary(*id).ok(),
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        };

        if let Some(dict) = dict {
            info.title = string_entry(dict, b"Title");
            info.author = string_entry(dict, b"Author");
            info.subject = string_entry(dict, b"Subject");
            info.creator = string_entry(dict, b"Creator");
            info.producer = string_entry(dict, b"Producer");
        }

        info
    }

    /// Build a new document holding the given 0-based pages in the given order.
    ///
    /// A page listed more than once is emitted as separate page objects that
    /// share the same content streams and resources.
    pub fn extract_pages(&self, indices: &[u32]) -> Result<Document> {
        let page_ids = self.page_ids();
        let total = page_ids.len() as u32;

        if let Some(&index) = indices.iter().find(|&&index| index >= total) {
            return Err(Error::OutOfRange {
                page: i64::from(index) + 1,
                total,
            });
        }

        let mut new_doc = self.doc.clone();
        let root_id = catalog_id(&new_doc).map_err(|e| self.malformed(e))?;
        let pages_id = pages_root_id(&new_doc).map_err(|e| self.malformed(e))?;

        let mut placed = HashSet::new();
        let mut kids = Vec::with_capacity(indices.len());
        for &index in indices {
            let source_id = page_ids[index as usize];
            let mut page = flatten_page(&self.doc, source_id).map_err(|e| self.malformed(e))?;
            page.set("Parent", Object::Reference(pages_id));

            let id = if placed.insert(source_id) {
                new_doc.objects.insert(source_id, Object::Dictionary(page));
                source_id
            } else {
                new_doc.add_object(Object::Dictionary(page))
            };
            kids.push(Object::Reference(id));
        }

        let pages = new_doc
            .get_dictionary_mut(pages_id)
            .map_err(|e| self.malformed(e))?;
        pages.set("Kids", Object::Array(kids));
        pages.set("Count", Object::Integer(indices.len() as i64));

        let catalog = new_doc
            .get_dictionary_mut(root_id)
            .map_err(|e| self.malformed(e))?;
        for key in STALE_CATALOG_KEYS {
            catalog.remove(key.as_bytes());
        }

        let pruned = new_doc.prune_objects();
        debug!(
            pages = indices.len(),
            pruned = pruned.len(),
            "built sliced document"
        );

        Ok(new_doc)
    }

    /// Save to a file
    pub fn save<P: AsRef<Path>>(doc: &mut Document, path: P) -> Result<()> {
        let path = path.as_ref();
        doc.save(path).map_err(|e| Error::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    fn malformed(&self, e: lopdf::Error) -> Error {
        Error::Read {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: u32,
}

fn catalog_id(doc: &Document) -> lopdf::Result<ObjectId> {
    doc.trailer.get(b"Root")?.as_reference()
}

fn pages_root_id(doc: &Document) -> lopdf::Result<ObjectId> {
    doc.catalog()?.get(b"Pages")?.as_reference()
}

/// Copy a page dictionary, filling in any attribute it inherits from the page tree.
fn flatten_page(doc: &Document, page_id: ObjectId) -> lopdf::Result<Dictionary> {
    let mut page = doc.get_dictionary(page_id)?.clone();
    let mut visited = HashSet::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    while let Some(node_id) = parent {
        if !visited.insert(node_id) {
            break;
        }
        let node = doc.get_dictionary(node_id)?;
        for key in INHERITABLE_KEYS {
            if page.has(key.as_bytes()) {
                continue;
            }
            if let Ok(value) = node.get(key.as_bytes()) {
                page.set(key, value.clone());
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(page)
}

fn string_entry(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
}

fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        // PDFDocEncoding, close enough to Latin-1 for metadata display
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}
