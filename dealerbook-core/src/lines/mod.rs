pub mod codec;
pub mod numeric;
pub mod totals;

pub use codec::{decode, encode, EncodedRows};
pub use numeric::parse;
pub use totals::{format_fixed, line_amount, total};
