use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::SessionError;
use crate::lines::codec::decode;
use crate::lines::totals::total;
use crate::models::invoice::{Invoice, InvoiceKey};
use crate::models::line_item::{HeaderField, InvoiceHeader, LineItem, LineItemField};

/// In-memory draft of one invoice while it is being edited.
///
/// The session copies the invoice's header and materialized rows when it is
/// opened and never touches the store itself; `SaveWorkflow::commit` writes
/// it back. It stays keyed by the invoice's original identity even when the
/// header's phone or invoice number is edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditSession {
    key: InvoiceKey,
    header: InvoiceHeader,
    rows: Vec<LineItem>,
    row_id: Option<i64>,
    pdf_url: Option<String>,
}

impl EditSession {
    /// Opens an editing session over `invoice`.
    pub fn begin(invoice: &Invoice) -> Self {
        Self {
            key: invoice.key(),
            header: invoice.header(),
            rows: decode(invoice),
            row_id: invoice.row_id,
            pdf_url: invoice.pdf_url.clone(),
        }
    }

    /// Identity the session writes back to.
    pub fn key(&self) -> &InvoiceKey {
        &self.key
    }

    pub fn header(&self) -> &InvoiceHeader {
        &self.header
    }

    pub fn rows(&self) -> &[LineItem] {
        &self.rows
    }

    pub fn row_id(&self) -> Option<i64> {
        self.row_id
    }

    /// Document link the invoice had when the session was opened.
    pub fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref()
    }

    /// Overwrites one header attribute. Any string is accepted, including empty.
    pub fn set_header_field(&mut self, field: HeaderField, value: impl Into<String>) {
        self.header.set(field, value);
    }

    /// Like `set_header_field`, with the attribute given by name.
    pub fn set_header_field_named(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        let field = name.parse::<HeaderField>()?;
        self.set_header_field(field, value);
        Ok(())
    }

    /// Updates one field of the row at `index`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IndexOutOfRange` when there is no such row.
    pub fn set_row_field(
        &mut self,
        index: usize,
        field: LineItemField,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        let len = self.rows.len();
        let row = self
            .rows
            .get_mut(index)
            .ok_or(SessionError::IndexOutOfRange { index, len })?;
        row.set(field, value);
        Ok(())
    }

    /// Like `set_row_field`, with the field given by name.
    pub fn set_row_field_named(
        &mut self,
        index: usize,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        let field = name.parse::<LineItemField>()?;
        self.set_row_field(index, field, value)
    }

    /// Appends a row with every field empty.
    pub fn add_row(&mut self) {
        self.rows.push(LineItem::default());
    }

    /// Removes the row at `index`, leaving the rows untouched when it is absent.
    pub fn remove_row(&mut self, index: usize) -> Result<LineItem, SessionError> {
        if index >= self.rows.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(self.rows.remove(index))
    }

    /// Replaces header and rows wholesale, as submitted by an edit form.
    pub fn replace(&mut self, header: InvoiceHeader, rows: Vec<LineItem>) {
        self.header = header;
        self.rows = rows;
    }

    /// Total over the current rows.
    pub fn compute_total(&self) -> Decimal {
        total(&self.rows)
    }
}
