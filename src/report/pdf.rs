//! Minimal PDF 1.4 writer.
//!
//! Produces one document with fixed-size pages, each holding Helvetica text
//! lines and at most one JPEG image (embedded as-is with `DCTDecode`).
//! Content streams are left uncompressed.
//!
//! Object layout: 1 catalog, 2 page tree, 3 font, 4 document info, then
//! three objects per page (page, content stream, image).

use super::layout::{FONT_SIZE, PAGE_HEIGHT, PAGE_WIDTH, Rect};
use crate::imaging::EncodedJpeg;
use chrono::{DateTime, Utc};

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const FONT_ID: usize = 3;
const INFO_ID: usize = 4;
const FIRST_PAGE_ID: usize = 5;
const OBJECTS_PER_PAGE: usize = 3;

/// A text line whose top edge is at (`x`, `top`), top-left origin.
#[derive(Clone, Debug)]
pub struct TextLine {
    pub x: f64,
    pub top: f64,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct PdfPage {
    pub lines: Vec<TextLine>,
    pub image: EncodedJpeg,
    pub image_rect: Rect,
}

#[derive(Clone, Debug)]
pub struct DocumentInfo {
    pub title: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
}

/// Serialize `pages` into a complete PDF file.
pub fn render(pages: &[PdfPage], info: &DocumentInfo) -> Vec<u8> {
    let mut writer = PdfWriter::new(FIRST_PAGE_ID + pages.len() * OBJECTS_PER_PAGE);

    writer.object(
        CATALOG_ID,
        &format!("<< /Type /Catalog /Pages {} 0 R >>", PAGES_ID),
    );

    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", page_object_id(i)))
        .collect::<Vec<_>>()
        .join(" ");
    writer.object(
        PAGES_ID,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            pages.len()
        ),
    );

    writer.object(
        FONT_ID,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );

    writer.object(
        INFO_ID,
        &format!(
            "<< /Title {} /Creator {} /Producer {} /CreationDate {} >>",
            pdf_string(&info.title),
            pdf_string(&info.creator),
            pdf_string(concat!("fruit-catalog ", env!("CARGO_PKG_VERSION"))),
            pdf_string(&info.created_at.format("D:%Y%m%d%H%M%SZ").to_string()),
        ),
    );

    for (index, page) in pages.iter().enumerate() {
        let page_id = page_object_id(index);
        let contents_id = page_id + 1;
        let image_id = page_id + 2;

        writer.object(
            page_id,
            &format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 {} 0 R >> /XObject << /Im1 {} 0 R >> >> \
                 /Contents {} 0 R >>",
                PAGES_ID,
                number(PAGE_WIDTH),
                number(PAGE_HEIGHT),
                FONT_ID,
                image_id,
                contents_id
            ),
        );
        writer.stream(contents_id, "", page_content(page).as_bytes());
        writer.stream(
            image_id,
            &format!(
                "/Type /XObject /Subtype /Image /Width {} /Height {} \
                 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode",
                page.image.width, page.image.height
            ),
            &page.image.bytes,
        );
    }

    writer.finish()
}

fn page_object_id(index: usize) -> usize {
    FIRST_PAGE_ID + index * OBJECTS_PER_PAGE
}

/// Content stream: text lines, then the image placed in its rectangle.
fn page_content(page: &PdfPage) -> String {
    let mut content = String::new();
    for line in &page.lines {
        let baseline = PAGE_HEIGHT - line.top - FONT_SIZE;
        content.push_str(&format!(
            "BT /F1 {} Tf {} {} Td {} Tj ET\n",
            number(FONT_SIZE),
            number(line.x),
            number(baseline),
            pdf_string(&line.text)
        ));
    }

    let rect = page.image_rect;
    let bottom = PAGE_HEIGHT - rect.y - rect.height;
    content.push_str(&format!(
        "q {} 0 0 {} {} {} cm /Im1 Do Q\n",
        number(rect.width),
        number(rect.height),
        number(rect.x),
        number(bottom)
    ));
    content
}

/// Literal string in WinAnsi: printable ASCII as-is, the Latin-1 range
/// U+00A0..=U+00FF as octal escapes, anything else as `?`.
///
/// WinAnsi assigns other glyphs to bytes 0x80..=0x9F, so those code points
/// are never passed through.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{A0}'..='\u{FF}' => out.push_str(&format!("\\{:03o}", c as u32)),
            _ => out.push('?'),
        }
    }
    out.push(')');
    out
}

/// Shortest decimal form with at most two fractional digits.
fn number(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new(object_count: usize) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: vec![0; object_count],
        }
    }

    fn push(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
    }

    fn begin(&mut self, id: usize) {
        self.offsets[id] = self.buf.len();
        self.push(&format!("{} 0 obj\n", id));
    }

    fn object(&mut self, id: usize, body: &str) {
        self.begin(id);
        self.push(body);
        self.push("\nendobj\n");
    }

    fn stream(&mut self, id: usize, dict_entries: &str, data: &[u8]) {
        self.begin(id);
        let separator = if dict_entries.is_empty() { "" } else { " " };
        self.push(&format!(
            "<< {}{}/Length {} >>\nstream\n",
            dict_entries,
            separator,
            data.len()
        ));
        self.buf.extend_from_slice(data);
        self.push("\nendstream\nendobj\n");
    }

    fn finish(mut self) -> Vec<u8> {
        let xref_offset = self.buf.len();
        let size = self.offsets.len();
        self.push(&format!("xref\n0 {}\n0000000000 65535 f \n", size));
        for offset in self.offsets[1..].to_vec() {
            self.push(&format!("{:010} 00000 n \n", offset));
        }
        self.push(&format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, CATALOG_ID, INFO_ID, xref_offset
        ));
        self.buf
    }
}
