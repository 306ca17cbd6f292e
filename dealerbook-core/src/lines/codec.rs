use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::invoice::Invoice;
use crate::models::line_item::{LineItem, LineItemField};

/// Line items in their persisted form: five parallel sequences, each
/// serialized independently as JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRows {
    pub product_names: String,
    pub descriptions: String,
    pub quantities: String,
    pub units: String,
    pub rates: String,
}

/// Materializes the rows of an invoice.
///
/// Each stored sequence is read leniently (see [`sequence`]), rows are built
/// positionally up to the longest sequence with missing cells read as empty
/// strings, and rows that are blank in every field are dropped. Order follows
/// the stored positions.
pub fn decode(invoice: &Invoice) -> Vec<LineItem> {
    decode_columns([
        invoice.product_names.as_ref(),
        invoice.descriptions.as_ref(),
        invoice.quantities.as_ref(),
        invoice.units.as_ref(),
        invoice.rates.as_ref(),
    ])
}

/// Same as [`decode`] for raw stored columns, in `LineItemField::ALL` order.
pub fn decode_columns(columns: [Option<&Value>; 5]) -> Vec<LineItem> {
    let columns = columns.map(sequence);
    let max_len = columns.iter().map(Vec::len).max().unwrap_or(0);

    (0..max_len)
        .map(|i| {
            let mut row = LineItem::default();
            for (field, column) in LineItemField::ALL.iter().zip(columns.iter()) {
                row.set(*field, cell(column.get(i)));
            }
            row
        })
        .filter(|row| !row.is_blank())
        .collect()
}

/// Projects rows back into the five persisted sequences.
///
/// All five sequences have one entry per row, in row order.
pub fn encode(rows: &[LineItem]) -> EncodedRows {
    let column = |field: LineItemField| {
        let values: Vec<&str> = rows.iter().map(|row| row.get(field)).collect();
        Value::from(values).to_string()
    };

    EncodedRows {
        product_names: column(LineItemField::ProductName),
        descriptions: column(LineItemField::Description),
        quantities: column(LineItemField::Quantity),
        units: column(LineItemField::Units),
        rates: column(LineItemField::Rate),
    }
}

/// Reads one stored sequence.
///
/// An array is used as-is and a string is parsed as JSON. Anything else, a
/// string that is not a JSON array, or an empty string, is an empty sequence.
pub fn sequence(stored: Option<&Value>) -> Vec<Value> {
    match stored {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(text)) if !text.is_empty() => {
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
