//! Minimal paginated PDF writer: standard Helvetica fonts, text, rectangles.
//!
//! Coordinates are millimetres from the top-left corner of the page; the
//! conversion to PDF user space happens when content is emitted.

use std::fmt::Write as _;

use crate::error::RenderError;

const PT_PER_MM: f64 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const BLACK: Color = Color(0, 0, 0);
    pub const GREEN: Color = Color(0, 128, 0);
    pub const RED: Color = Color(200, 0, 0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl PageGeometry {
    pub fn a4_portrait() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            margin: 10.0,
        }
    }

    pub fn a4_landscape() -> Self {
        Self {
            width: 297.0,
            height: 210.0,
            margin: 15.0,
        }
    }

    pub fn content_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    fn validate(&self) -> Result<(), RenderError> {
        if self.content_width() <= 0.0 || self.height - 2.0 * self.margin <= 0.0 {
            return Err(RenderError::InvalidGeometry(format!(
                "{}x{} mm with {} mm margins",
                self.width, self.height, self.margin
            )));
        }
        Ok(())
    }
}

// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

fn glyph_width(c: char, font: Font) -> f64 {
    let base = f64::from(match c as u32 {
        code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
        _ => 556,
    });
    match font {
        Font::Regular => base,
        // Bold glyphs run slightly wider; close enough for layout.
        Font::Bold => base * 1.06,
    }
}

/// Rendered width of `text` in millimetres.
pub fn text_width(text: &str, font: Font, size: f64) -> f64 {
    let em: f64 = text.chars().map(|c| glyph_width(c, font)).sum();
    em / 1000.0 * size / PT_PER_MM
}

/// WinAnsi bytes for a PDF string literal. Unmappable characters become '?'.
fn encode_literal(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 2);
    out.push(b'(');
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            ' '..='~' => out.push(c as u8),
            '\u{a0}'..='\u{ff}' => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out.push(b')');
    out
}

#[derive(Debug)]
pub struct PdfDocument {
    geometry: PageGeometry,
    pages: Vec<Vec<u8>>,
    cursor: f64,
}

impl PdfDocument {
    pub fn new(geometry: PageGeometry) -> Result<Self, RenderError> {
        geometry.validate()?;
        let mut doc = Self {
            geometry,
            pages: Vec::new(),
            cursor: geometry.margin,
        };
        doc.add_page();
        Ok(doc)
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn add_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = self.geometry.margin;
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn advance(&mut self, height: f64) {
        self.cursor += height;
    }

    /// Vertical room on an empty page.
    pub fn usable_height(&self) -> f64 {
        self.geometry.height - 2.0 * self.geometry.margin
    }

    pub fn fits(&self, height: f64) -> bool {
        self.cursor + height <= self.geometry.height - self.geometry.margin
    }

    /// Starts a new page if `height` does not fit; returns whether it did.
    pub fn ensure_space(&mut self, height: f64) -> bool {
        if self.fits(height) || self.cursor <= self.geometry.margin {
            return false;
        }
        self.add_page();
        true
    }

    fn page(&mut self) -> &mut Vec<u8> {
        // `new` always pushes a first page.
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn to_pdf_y(&self, y: f64) -> f64 {
        (self.geometry.height - y) * PT_PER_MM
    }

    /// Draws one line of text whose box starts at (`x`, `top`) and is `height` tall.
    #[allow(clippy::too_many_arguments)]
    pub fn text(
        &mut self,
        x: f64,
        top: f64,
        width: f64,
        height: f64,
        text: &str,
        font: Font,
        size: f64,
        color: Color,
        align: Align,
    ) {
        let offset = match align {
            Align::Left => 1.0,
            Align::Center => ((width - text_width(text, font, size)) / 2.0).max(0.0),
        };
        let size_mm = size / PT_PER_MM;
        let baseline = top + height / 2.0 + size_mm * 0.35;
        let x_pt = (x + offset) * PT_PER_MM;
        let y_pt = self.to_pdf_y(baseline);

        let mut ops = String::new();
        let Color(r, g, b) = color;
        let _ = write!(
            ops,
            "BT {:.3} {:.3} {:.3} rg /{} {:.1} Tf {:.2} {:.2} Td ",
            r as f64 / 255.0,
            g as f64 / 255.0,
            b as f64 / 255.0,
            font.resource(),
            size,
            x_pt,
            y_pt
        );
        let literal = encode_literal(text);
        let page = self.page();
        page.extend_from_slice(ops.as_bytes());
        page.extend_from_slice(&literal);
        page.extend_from_slice(b" Tj ET\n");
    }

    /// Full-width line at the cursor, then moves the cursor down.
    pub fn line(
        &mut self,
        text: &str,
        font: Font,
        size: f64,
        height: f64,
        color: Color,
        align: Align,
    ) {
        self.ensure_space(height);
        let (x, width) = (self.geometry.margin, self.geometry.content_width());
        let top = self.cursor;
        self.text(x, top, width, height, text, font, size, color, align);
        self.advance(height);
    }

    pub fn rect(&mut self, x: f64, top: f64, width: f64, height: f64) {
        let y_pt = self.to_pdf_y(top + height);
        let ops = format!(
            "0 0 0 RG 0.2 w {:.2} {:.2} {:.2} {:.2} re S\n",
            x * PT_PER_MM,
            y_pt,
            width * PT_PER_MM,
            height * PT_PER_MM
        );
        self.page().extend_from_slice(ops.as_bytes());
    }

    /// Serializes the document: catalog, page tree, two fonts, then one page and
    /// one content stream object per page, followed by the xref table.
    pub fn finish(self) -> Vec<u8> {
        let page_count = self.pages.len();
        let first_page_obj = 5;
        let kids: Vec<String> = (0..page_count)
            .map(|i| format!("{} 0 R", first_page_obj + 2 * i))
            .collect();

        let mut objects: Vec<Vec<u8>> = vec![
            b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                page_count
            )
            .into_bytes(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_vec(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_vec(),
        ];

        let (width_pt, height_pt) = (
            self.geometry.width * PT_PER_MM,
            self.geometry.height * PT_PER_MM,
        );
        for (i, content) in self.pages.into_iter().enumerate() {
            let content_obj = first_page_obj + 2 * i + 1;
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width_pt:.2} {height_pt:.2}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {content_obj} 0 R >>"
                )
                .into_bytes(),
            );
            let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            stream.extend_from_slice(&content);
            stream.extend_from_slice(b"\nendstream");
            objects.push(stream);
        }

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_at = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = writeln!(xref, "{offset:010} 00000 n ");
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        );
        out.extend_from_slice(xref.as_bytes());
        out
    }
}
