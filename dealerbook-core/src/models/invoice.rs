use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::lines::codec::EncodedRows;
use crate::models::line_item::InvoiceHeader;

/// Invoice status enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Approved,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Approved => "APPROVED",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = std::convert::Infallible;

    /// Statuses are stored case-insensitively; anything that is not an
    /// approval (including blank) reads as a draft.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("approved") {
            Ok(InvoiceStatus::Approved)
        } else {
            Ok(InvoiceStatus::Draft)
        }
    }
}

/// Identity of an invoice: the owning phone number plus the invoice number.
///
/// Every update and delete is keyed this way. The store-assigned row id is
/// only ever used as a query filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceKey {
    pub phone_number: String,
    pub invoice_number: String,
}

impl InvoiceKey {
    pub fn new(phone_number: impl Into<String>, invoice_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            invoice_number: invoice_number.into(),
        }
    }

    /// Name of the rendered document in the document store.
    ///
    /// Both parts are percent-encoded, so the name is always a single path
    /// segment even when the invoice number contains `/`, `\` or spaces.
    pub fn document_name(&self) -> String {
        format!(
            "invoice_{}_{}.pdf",
            urlencoding::encode(&self.phone_number),
            urlencoding::encode(&self.invoice_number)
        )
    }
}

impl fmt::Display for InvoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.phone_number, self.invoice_number)
    }
}

/// Invoice model representing a dealer invoice.
///
/// Line items are persisted as five parallel sequences. Each sequence is kept
/// exactly as the store returned it (usually JSON text, sometimes already an
/// array, sometimes null) and is only interpreted by the row codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Store-assigned row id, when the store exposes one
    pub row_id: Option<i64>,

    /// Phone number of the owning party
    pub phone_number: String,

    /// Invoice number (unique per phone number)
    pub invoice_number: String,

    /// Dealer name
    pub dealer: String,

    /// Invoice date as entered
    pub invoice_date: String,

    /// Invoice status
    pub status: InvoiceStatus,

    /// Persisted product name sequence
    pub product_names: Option<Value>,

    /// Persisted description sequence
    pub descriptions: Option<Value>,

    /// Persisted quantity sequence
    pub quantities: Option<Value>,

    /// Persisted units sequence
    pub units: Option<Value>,

    /// Persisted rate sequence
    pub rates: Option<Value>,

    /// Invoice total
    pub total: Decimal,

    /// Legacy copy of `total`; always written together with it
    pub amount: Decimal,

    /// Public link to the approved document
    pub pdf_url: Option<String>,
}

impl Invoice {
    /// Creates a draft invoice with no line items.
    pub fn draft(key: InvoiceKey) -> Self {
        Self {
            row_id: None,
            phone_number: key.phone_number,
            invoice_number: key.invoice_number,
            dealer: String::new(),
            invoice_date: String::new(),
            status: InvoiceStatus::Draft,
            product_names: None,
            descriptions: None,
            quantities: None,
            units: None,
            rates: None,
            total: Decimal::ZERO,
            amount: Decimal::ZERO,
            pdf_url: None,
        }
    }

    pub fn key(&self) -> InvoiceKey {
        InvoiceKey::new(self.phone_number.clone(), self.invoice_number.clone())
    }

    pub fn header(&self) -> InvoiceHeader {
        InvoiceHeader {
            invoice_number: self.invoice_number.clone(),
            dealer: self.dealer.clone(),
            phone_number: self.phone_number.clone(),
            invoice_date: self.invoice_date.clone(),
        }
    }

    /// Presentation copy with dealer and date upper-cased.
    pub fn display_normalized(&self) -> Self {
        Self {
            dealer: self.dealer.to_uppercase(),
            invoice_date: self.invoice_date.to_uppercase(),
            ..self.clone()
        }
    }

    /// Applies an update in place, with the same field semantics a store uses.
    pub fn apply(&mut self, update: &InvoiceUpdate) {
        if let Some(header) = &update.header {
            self.invoice_number = header.invoice_number.clone();
            self.dealer = header.dealer.clone();
            self.phone_number = header.phone_number.clone();
            self.invoice_date = header.invoice_date.clone();
        }
        if let Some(rows) = &update.rows {
            self.product_names = Some(Value::String(rows.product_names.clone()));
            self.descriptions = Some(Value::String(rows.descriptions.clone()));
            self.quantities = Some(Value::String(rows.quantities.clone()));
            self.units = Some(Value::String(rows.units.clone()));
            self.rates = Some(Value::String(rows.rates.clone()));
        }
        if let Some(total) = update.total {
            self.total = total;
            self.amount = total;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(pdf_url) = &update.pdf_url {
            self.pdf_url = Some(pdf_url.clone());
        }
    }
}

/// Row ordering requested from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceOrder {
    #[default]
    Unspecified,
    RowIdDescending,
}

/// Invoice query filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFilter {
    pub phone_number: Option<String>,
    pub invoice_number: Option<String>,
    pub row_id: Option<i64>,
    #[serde(default)]
    pub order: InvoiceOrder,
}

impl InvoiceFilter {
    pub fn by_phone(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: Some(phone_number.into()),
            ..Self::default()
        }
    }

    pub fn by_key(key: &InvoiceKey) -> Self {
        Self {
            phone_number: Some(key.phone_number.clone()),
            invoice_number: Some(key.invoice_number.clone()),
            ..Self::default()
        }
    }

    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.phone_number
            .as_ref()
            .map_or(true, |p| *p == invoice.phone_number)
            && self
                .invoice_number
                .as_ref()
                .map_or(true, |n| *n == invoice.invoice_number)
            && self.row_id.map_or(true, |id| invoice.row_id == Some(id))
    }
}

/// Invoice update request. Unset fields are left untouched.
///
/// `total` writes both the `total` and `amount` columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceUpdate {
    pub header: Option<InvoiceHeader>,
    pub rows: Option<EncodedRows>,
    pub total: Option<Decimal>,
    pub status: Option<InvoiceStatus>,
    pub pdf_url: Option<String>,
}

impl InvoiceUpdate {
    /// Status and frozen total written by the approval workflow.
    pub fn approval(total: Decimal) -> Self {
        Self {
            total: Some(total),
            status: Some(InvoiceStatus::Approved),
            ..Self::default()
        }
    }

    /// Document link written once the approved document is stored.
    pub fn document_link(pdf_url: impl Into<String>) -> Self {
        Self {
            pdf_url: Some(pdf_url.into()),
            ..Self::default()
        }
    }

    /// Full draft payload written when an edit is saved.
    pub fn draft(header: InvoiceHeader, rows: EncodedRows, total: Decimal) -> Self {
        Self {
            header: Some(header),
            rows: Some(rows),
            total: Some(total),
            status: Some(InvoiceStatus::Draft),
            pdf_url: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_none()
            && self.rows.is_none()
            && self.total.is_none()
            && self.status.is_none()
            && self.pdf_url.is_none()
    }
}
