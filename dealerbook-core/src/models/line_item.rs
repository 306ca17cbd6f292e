use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// One product entry of an invoice, in row-oriented form.
///
/// Rows are never persisted on their own; the row codec converts them to and
/// from the parallel sequences stored on the invoice. Quantity and rate are
/// kept as entered and only coerced to numbers when amounts are computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub rate: String,
}

impl LineItem {
    pub fn new(
        product_name: impl Into<String>,
        description: impl Into<String>,
        quantity: impl Into<String>,
        units: impl Into<String>,
        rate: impl Into<String>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            description: description.into(),
            quantity: quantity.into(),
            units: units.into(),
            rate: rate.into(),
        }
    }

    /// A row is blank when every field is empty after trimming.
    pub fn is_blank(&self) -> bool {
        LineItemField::ALL
            .iter()
            .all(|field| self.get(*field).trim().is_empty())
    }

    pub fn get(&self, field: LineItemField) -> &str {
        match field {
            LineItemField::ProductName => &self.product_name,
            LineItemField::Description => &self.description,
            LineItemField::Quantity => &self.quantity,
            LineItemField::Units => &self.units,
            LineItemField::Rate => &self.rate,
        }
    }

    pub fn set(&mut self, field: LineItemField, value: impl Into<String>) {
        let slot = match field {
            LineItemField::ProductName => &mut self.product_name,
            LineItemField::Description => &mut self.description,
            LineItemField::Quantity => &mut self.quantity,
            LineItemField::Units => &mut self.units,
            LineItemField::Rate => &mut self.rate,
        };
        *slot = value.into();
    }
}

/// The five fields of a line item, in persisted column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemField {
    ProductName,
    Description,
    Quantity,
    Units,
    Rate,
}

impl LineItemField {
    pub const ALL: [LineItemField; 5] = [
        LineItemField::ProductName,
        LineItemField::Description,
        LineItemField::Quantity,
        LineItemField::Units,
        LineItemField::Rate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemField::ProductName => "product_name",
            LineItemField::Description => "description",
            LineItemField::Quantity => "quantity",
            LineItemField::Units => "units",
            LineItemField::Rate => "rate",
        }
    }
}

impl fmt::Display for LineItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineItemField {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product_name" | "productName" | "productname" => Ok(LineItemField::ProductName),
            "description" => Ok(LineItemField::Description),
            "quantity" => Ok(LineItemField::Quantity),
            "units" => Ok(LineItemField::Units),
            "rate" => Ok(LineItemField::Rate),
            other => Err(SessionError::UnknownField(other.to_string())),
        }
    }
}

/// Editable header attributes of an invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub dealer: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub invoice_date: String,
}

impl InvoiceHeader {
    pub fn set(&mut self, field: HeaderField, value: impl Into<String>) {
        let slot = match field {
            HeaderField::InvoiceNumber => &mut self.invoice_number,
            HeaderField::Dealer => &mut self.dealer,
            HeaderField::PhoneNumber => &mut self.phone_number,
            HeaderField::InvoiceDate => &mut self.invoice_date,
        };
        *slot = value.into();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderField {
    InvoiceNumber,
    Dealer,
    PhoneNumber,
    InvoiceDate,
}

impl FromStr for HeaderField {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice_number" | "invoiceNumber" => Ok(HeaderField::InvoiceNumber),
            "dealer" | "Dealer" => Ok(HeaderField::Dealer),
            "phone_number" | "phoneNumber" | "phonenumber" => Ok(HeaderField::PhoneNumber),
            "invoice_date" | "invoiceDate" => Ok(HeaderField::InvoiceDate),
            other => Err(SessionError::UnknownField(other.to_string())),
        }
    }
}
