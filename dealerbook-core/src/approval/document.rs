use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};
use std::io::BufWriter;

use crate::error::RenderError;
use crate::lines::numeric::parse;
use crate::lines::totals::{format_fixed, format_quantity, line_amount, total};
use crate::models::invoice::Invoice;
use crate::models::line_item::LineItem;
use crate::stores::PDF_CONTENT_TYPE;

pub const TITLE: &str = "INVOICE";
pub const COLUMNS: [&str; 6] = ["Product", "Description", "Quantity", "Units", "Rate", "Amount"];
pub const SIGNATURE_LINE: &str = "Authorized Signature: ____________________";

/// Content of a rendered invoice, independent of any layout engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDocument {
    pub title: String,

    /// Header block as `(label, value)` pairs, one per line
    pub header: Vec<(String, String)>,

    /// One row per line item, cells in `COLUMNS` order
    pub rows: Vec<[String; 6]>,

    /// Closing row: `Total` under Rate and the total under Amount
    pub total_row: [String; 6],

    pub signature: String,
}

impl InvoiceDocument {
    /// Builds the document for an invoice and its materialized rows.
    ///
    /// Header values are taken from the invoice as given; callers pass the
    /// display-normalized invoice with whatever status should be printed.
    pub fn build(invoice: &Invoice, rows: &[LineItem]) -> Self {
        let header = [
            ("Invoice No", &invoice.invoice_number),
            ("Dealer", &invoice.dealer),
            ("Phone", &invoice.phone_number),
            ("Date", &invoice.invoice_date),
        ]
        .into_iter()
        .map(|(label, value)| (label.to_string(), value.clone()))
        .chain(std::iter::once((
            "Status".to_string(),
            invoice.status.to_string(),
        )))
        .collect();

        let table = rows
            .iter()
            .map(|row| {
                [
                    row.product_name.clone(),
                    row.description.clone(),
                    format_quantity(parse(&row.quantity)),
                    row.units.clone(),
                    format_fixed(parse(&row.rate)),
                    format_fixed(line_amount(row)),
                ]
            })
            .collect();

        let total_row = [
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            "Total".to_string(),
            format_fixed(total(rows)),
        ];

        Self {
            title: TITLE.to_string(),
            header,
            rows: table,
            total_row,
            signature: SIGNATURE_LINE.to_string(),
        }
    }

    pub fn header_lines(&self) -> Vec<String> {
        self.header
            .iter()
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect()
    }
}

/// Turns document content into bytes.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &InvoiceDocument) -> Result<Vec<u8>, RenderError>;

    fn content_type(&self) -> &'static str {
        PDF_CONTENT_TYPE
    }
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const ROW_HEIGHT: f32 = 8.0;
const TABLE_LEFT: f32 = 14.0;
const TABLE_RIGHT: f32 = 196.0;
/// Left edge of each column, then the right edge of the table.
const COLUMN_EDGES: [f32; 7] = [14.0, 50.0, 100.0, 124.0, 144.0, 168.0, 196.0];
const POINT_TO_MM: f32 = 0.3528;

/// A4 PDF renderer using the built-in Helvetica fonts.
///
/// Layout: centered title, header block, a gridded table continuing on new
/// pages as needed, then the signature line below the table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl PdfRenderer {
    fn new_page(doc: &PdfDocumentReference) -> PdfLayerReference {
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        doc.get_page(page).get_layer(layer)
    }

    fn rule(layer: &PdfLayerReference, y: f32) {
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(TABLE_LEFT), Mm(y)), false),
                (Point::new(Mm(TABLE_RIGHT), Mm(y)), false),
            ],
            is_closed: false,
        });
    }

    fn column_rules(layer: &PdfLayerReference, top: f32, bottom: f32) {
        for x in COLUMN_EDGES {
            layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(x), Mm(top)), false),
                    (Point::new(Mm(x), Mm(bottom)), false),
                ],
                is_closed: false,
            });
        }
    }

    /// Draws one table row whose top edge is at `top`.
    fn table_row(layer: &PdfLayerReference, font: &IndirectFontRef, cells: &[String; 6], top: f32) {
        let baseline = top - ROW_HEIGHT + 2.5;
        for (i, cell) in cells.iter().enumerate() {
            let width = COLUMN_EDGES[i + 1] - COLUMN_EDGES[i];
            let text = fit(cell, width, 9.0);
            let x = COLUMN_EDGES[i] + (width - text_width(&text, 9.0)) / 2.0;
            layer.use_text(text, 9.0, Mm(x), Mm(baseline), font);
        }
        Self::rule(layer, top - ROW_HEIGHT);
        Self::column_rules(layer, top, top - ROW_HEIGHT);
    }

    fn column_headings(layer: &PdfLayerReference, fonts: &Fonts, top: f32) {
        Self::rule(layer, top);
        let headings = COLUMNS.map(str::to_string);
        Self::table_row(layer, &fonts.bold, &headings, top);
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, document: &InvoiceDocument) -> Result<Vec<u8>, RenderError> {
        let (doc, page, layer) = PdfDocument::new(
            document.title.as_str(),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Layer 1",
        );
        let fonts = Fonts {
            regular: doc
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(|e| RenderError(e.to_string()))?,
            bold: doc
                .add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(|e| RenderError(e.to_string()))?,
        };
        let mut layer = doc.get_page(page).get_layer(layer);

        let mut y = PAGE_HEIGHT - 20.0;
        let title_x = (PAGE_WIDTH - text_width(&document.title, 18.0)) / 2.0;
        layer.use_text(document.title.as_str(), 18.0, Mm(title_x), Mm(y), &fonts.bold);

        y = PAGE_HEIGHT - 40.0;
        for line in document.header_lines() {
            layer.use_text(line, 12.0, Mm(MARGIN), Mm(y), &fonts.regular);
            y -= 10.0;
        }

        y = PAGE_HEIGHT - 95.0;
        Self::column_headings(&layer, &fonts, y);
        y -= ROW_HEIGHT;

        for cells in document.rows.iter().chain(std::iter::once(&document.total_row)) {
            if y - ROW_HEIGHT < MARGIN {
                layer = Self::new_page(&doc);
                y = PAGE_HEIGHT - MARGIN;
                Self::column_headings(&layer, &fonts, y);
                y -= ROW_HEIGHT;
            }
            Self::table_row(&layer, &fonts.regular, cells, y);
            y -= ROW_HEIGHT;
        }

        if y - 20.0 < MARGIN {
            layer = Self::new_page(&doc);
            y = PAGE_HEIGHT - MARGIN;
        }
        layer.use_text(document.signature.as_str(), 12.0, Mm(MARGIN), Mm(y - 20.0), &fonts.regular);

        let mut writer = BufWriter::new(Vec::<u8>::new());
        doc.save(&mut writer).map_err(|e| RenderError(e.to_string()))?;
        writer.into_inner().map_err(|e| RenderError(e.to_string()))
    }
}

/// Approximate width of Helvetica text in millimetres.
fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * 0.55 * POINT_TO_MM
}

/// Truncates `text` so it fits a column of `width` millimetres.
fn fit(text: &str, width: f32, font_size: f32) -> String {
    let max_chars = ((width - 2.0) / (font_size * 0.55 * POINT_TO_MM)).floor() as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut fitted: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    fitted.push('~');
    fitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::{InvoiceKey, InvoiceStatus};

    fn approved_invoice() -> Invoice {
        Invoice {
            dealer: "ACME TRADERS".to_string(),
            invoice_date: "12 MAR 2024".to_string(),
            status: InvoiceStatus::Approved,
            ..Invoice::draft(InvoiceKey::new("5550100", "INV-7"))
        }
    }

    fn rows() -> Vec<LineItem> {
        vec![
            LineItem::new("Bolt", "", "10", "pcs", "2.50"),
            LineItem::new("Nut", "hex", "5", "pcs", "1"),
        ]
    }

    #[test]
    fn test_document_content() {
        let document = InvoiceDocument::build(&approved_invoice(), &rows());

        assert_eq!(document.title, "INVOICE");
        assert_eq!(
            document.header_lines(),
            vec![
                "Invoice No: INV-7",
                "Dealer: ACME TRADERS",
                "Phone: 5550100",
                "Date: 12 MAR 2024",
                "Status: APPROVED",
            ]
        );
        assert_eq!(
            document.rows[0],
            ["Bolt", "", "10", "pcs", "2.50", "25.00"].map(str::to_string)
        );
        assert_eq!(
            document.rows[1],
            ["Nut", "hex", "5", "pcs", "1.00", "5.00"].map(str::to_string)
        );
        assert_eq!(
            document.total_row,
            ["", "", "", "", "Total", "30.00"].map(str::to_string)
        );
        assert_eq!(document.signature, "Authorized Signature: ____________________");
    }

    #[test]
    fn test_document_without_rows() {
        let document = InvoiceDocument::build(&approved_invoice(), &[]);
        assert!(document.rows.is_empty());
        assert_eq!(document.total_row[5], "0.00");
    }

    #[test]
    fn test_pdf_renderer_produces_pdf() {
        let document = InvoiceDocument::build(&approved_invoice(), &rows());
        let bytes = PdfRenderer.render(&document).expect("Should render");

        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(PdfRenderer.content_type(), "application/pdf");
    }

    #[test]
    fn test_pdf_renderer_spills_onto_new_pages() {
        let many: Vec<LineItem> = (0..80)
            .map(|i| LineItem::new(format!("Part {}", i), "a rather long description of the part", "1", "pcs", "3"))
            .collect();
        let document = InvoiceDocument::build(&approved_invoice(), &many);

        let bytes = PdfRenderer.render(&document).expect("Should render");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_fit_truncates_long_cells() {
        let fitted = fit("a rather long description of the part", 24.0, 9.0);
        assert!(fitted.ends_with('~'));
        assert!(fitted.chars().count() < 20);
        assert_eq!(fit("Bolt", 24.0, 9.0), "Bolt");
    }
}
