pub mod invoice;
pub mod line_item;

pub use invoice::{Invoice, InvoiceFilter, InvoiceKey, InvoiceOrder, InvoiceStatus, InvoiceUpdate};
pub use line_item::{HeaderField, InvoiceHeader, LineItem, LineItemField};
