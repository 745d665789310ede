//! Slide deck page counting.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use lopdf::Document;

/// Async page counting for slide decks.
#[async_trait]
pub trait PageCounter: Send + Sync {
    async fn count_pages(&self, path: &Path) -> io::Result<u32>;
}

/// Counts the pages of a PDF's page tree.
///
/// The document is loaded through its cross-reference data, so incremental
/// updates resolve to the latest revision of each object and pages stored
/// in compressed object streams are found.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageCounter;

#[async_trait]
impl PageCounter for PdfPageCounter {
    async fn count_pages(&self, path: &Path) -> io::Result<u32> {
        let data = tokio::fs::read(path).await?;
        let name = path.display().to_string();

        tokio::task::spawn_blocking(move || page_count(&data))
            .await
            .map_err(io::Error::other)?
            .map_err(|e| io::Error::new(e.kind(), format!("{name}: {e}")))
    }
}

/// Number of pages reachable from the catalog of the PDF in `data`.
pub fn page_count(data: &[u8]) -> io::Result<u32> {
    let invalid = |message: String| io::Error::new(io::ErrorKind::InvalidData, message);

    let document =
        Document::load_mem(data).map_err(|e| invalid(format!("not a readable PDF file: {e}")))?;
    let pages = document.get_pages().len();
    match u32::try_from(pages) {
        Ok(0) => Err(invalid("the document has no pages".to_string())),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid(format!("too many pages ({pages})"))),
    }
}

// ============================================================================
// Test fixtures
// ============================================================================

/// Writes PDF files object by object, keeping cross-reference offsets right.
#[cfg(test)]
pub(crate) struct PdfBuilder {
    data: Vec<u8>,
    offsets: std::collections::BTreeMap<u32, usize>,
    last_xref: Option<usize>,
}

#[cfg(test)]
pub(crate) const TEST_PAGE: &str = "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>";

#[cfg(test)]
impl PdfBuilder {
    pub fn new(version: &str) -> Self {
        Self {
            data: format!("%PDF-{version}\n").into_bytes(),
            offsets: Default::default(),
            last_xref: None,
        }
    }

    pub fn object(&mut self, id: u32, body: &str) -> &mut Self {
        self.offsets.insert(id, self.data.len());
        self.data
            .extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
        self
    }

    pub fn stream(&mut self, id: u32, dict: &str, content: &[u8]) -> &mut Self {
        self.offsets.insert(id, self.data.len());
        self.data.extend_from_slice(
            format!("{id} 0 obj\n<< {dict} /Length {} >>\nstream\n", content.len()).as_bytes(),
        );
        self.data.extend_from_slice(content);
        self.data.extend_from_slice(b"\nendstream\nendobj\n");
        self
    }

    pub fn comment(&mut self, text: &str) -> &mut Self {
        self.data.extend_from_slice(format!("% {text}\n").as_bytes());
        self
    }

    /// End a revision with a classic cross-reference table listing every
    /// object written so far.
    pub fn xref_table(&mut self, root: u32) -> &mut Self {
        let start = self.data.len();
        let size = self.size(0);
        let mut table = format!("xref\n0 {size}\n");
        for id in 0..size {
            match self.offsets.get(&id) {
                Some(offset) => table.push_str(&format!("{offset:010} 00000 n\r\n")),
                None => table.push_str("0000000000 65535 f\r\n"),
            }
        }
        let prev = self
            .last_xref
            .map(|p| format!(" /Prev {p}"))
            .unwrap_or_default();
        table.push_str(&format!("trailer\n<< /Size {size} /Root {root} 0 R{prev} >>\n"));
        self.data.extend_from_slice(table.as_bytes());
        self.end_revision(start)
    }

    /// End a revision with a cross-reference stream. `compressed` lists
    /// objects stored in object streams as `(id, container, index)`.
    pub fn xref_stream(&mut self, id: u32, root: u32, compressed: &[(u32, u32, u16)]) -> &mut Self {
        let start = self.data.len();
        self.offsets.insert(id, start);
        let max_compressed = compressed.iter().map(|c| c.0 + 1).max().unwrap_or(0);
        let size = self.size(max_compressed);

        let mut entries = Vec::new();
        for obj in 0..size {
            if let Some(&offset) = self.offsets.get(&obj) {
                entries.push(1);
                entries.extend(u32::try_from(offset).unwrap().to_be_bytes());
                entries.extend([0, 0]);
            } else if let Some(&(_, container, index)) = compressed.iter().find(|c| c.0 == obj) {
                entries.push(2);
                entries.extend(container.to_be_bytes());
                entries.extend(index.to_be_bytes());
            } else {
                entries.extend([0, 0, 0, 0, 0, 0xff, 0xff]);
            }
        }

        let dict = format!("/Type /XRef /Size {size} /W [1 4 2] /Root {root} 0 R");
        self.stream(id, &dict, &entries);
        self.end_revision(start)
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }

    fn size(&self, at_least: u32) -> u32 {
        self.offsets
            .keys()
            .max()
            .map_or(1, |max| max + 1)
            .max(at_least)
    }

    fn end_revision(&mut self, xref_start: usize) -> &mut Self {
        self.data
            .extend_from_slice(format!("startxref\n{xref_start}\n%%EOF\n").as_bytes());
        self.last_xref = Some(xref_start);
        self
    }
}

/// A single-revision PDF with `pages` plain pages.
#[cfg(test)]
pub(crate) fn test_pdf_bytes(pages: u32) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
    let mut pdf = PdfBuilder::new("1.4");
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>").object(
        2,
        &format!("<< /Type /Pages /Kids [{}] /Count {pages} >>", kids.join(" ")),
    );
    for i in 0..pages {
        pdf.object(i + 3, TEST_PAGE);
    }
    pdf.xref_table(1).build()
}

/// Write [`test_pdf_bytes`] to `path`. Shared with the extractor and
/// compiler tests.
#[cfg(test)]
pub(crate) fn write_test_pdf(path: &Path, pages: u32) {
    std::fs::write(path, test_pdf_bytes(pages)).unwrap();
}
