use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{info, warn};

use crate::error::{StoreError, StoreOperation};
use crate::models::invoice::{Invoice, InvoiceFilter, InvoiceKey, InvoiceOrder, InvoiceUpdate};
use crate::stores::InvoiceStore;

const SELECT_INVOICES: &str = r#"
    SELECT
        id, phone_number, invoice_number, dealer, invoice_date, status,
        product_names, descriptions, quantities, units, rates,
        total, amount, pdf_url
    FROM invoices
    WHERE 1 = 1"#;

/// Row of the `invoices` table.
///
/// Everything except the key columns is nullable, and the line item
/// sequences are JSON text written by whichever client last saved the row.
#[derive(Debug, Clone, FromRow)]
struct InvoiceRow {
    id: i64,
    phone_number: String,
    invoice_number: Option<String>,
    dealer: Option<String>,
    invoice_date: Option<String>,
    status: Option<String>,
    product_names: Option<String>,
    descriptions: Option<String>,
    quantities: Option<String>,
    units: Option<String>,
    rates: Option<String>,
    total: Option<Decimal>,
    amount: Option<Decimal>,
    pdf_url: Option<String>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        let total = row.total.or(row.amount).unwrap_or(Decimal::ZERO);
        Invoice {
            row_id: Some(row.id),
            phone_number: row.phone_number,
            invoice_number: row.invoice_number.unwrap_or_default(),
            dealer: row.dealer.unwrap_or_default(),
            invoice_date: row.invoice_date.unwrap_or_default(),
            status: row
                .status
                .as_deref()
                .unwrap_or_default()
                .parse()
                .unwrap_or_default(),
            product_names: row.product_names.map(Value::String),
            descriptions: row.descriptions.map(Value::String),
            quantities: row.quantities.map(Value::String),
            units: row.units.map(Value::String),
            rates: row.rates.map(Value::String),
            total,
            amount: row.amount.unwrap_or(total),
            pdf_url: row.pdf_url,
        }
    }
}

/// Invoice store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgInvoiceStore {
    pool: PgPool,
}

impl PgInvoiceStore {
    /// Creates a new store over an existing connection pool.
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_key(builder: &mut QueryBuilder<'_, Postgres>, key: &InvoiceKey) {
        builder
            .push(" WHERE phone_number = ")
            .push_bind(key.phone_number.clone())
            .push(" AND invoice_number = ")
            .push_bind(key.invoice_number.clone());
    }
}

#[async_trait]
impl InvoiceStore for PgInvoiceStore {
    async fn query(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_INVOICES);
        if let Some(phone) = &filter.phone_number {
            builder.push(" AND phone_number = ").push_bind(phone.clone());
        }
        if let Some(number) = &filter.invoice_number {
            builder.push(" AND invoice_number = ").push_bind(number.clone());
        }
        if let Some(row_id) = filter.row_id {
            builder.push(" AND id = ").push_bind(row_id);
        }
        if filter.order == InvoiceOrder::RowIdDescending {
            builder.push(" ORDER BY id DESC");
        }

        let rows = builder
            .build_query_as::<InvoiceRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::new(StoreOperation::Query, e))?;

        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    async fn update(&self, key: &InvoiceKey, fields: &InvoiceUpdate) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE invoices SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(header) = &fields.header {
                set.push("invoice_number = ")
                    .push_bind_unseparated(header.invoice_number.clone());
                set.push("dealer = ").push_bind_unseparated(header.dealer.clone());
                set.push("phone_number = ")
                    .push_bind_unseparated(header.phone_number.clone());
                set.push("invoice_date = ")
                    .push_bind_unseparated(header.invoice_date.clone());
            }
            if let Some(rows) = &fields.rows {
                set.push("product_names = ")
                    .push_bind_unseparated(rows.product_names.clone());
                set.push("descriptions = ")
                    .push_bind_unseparated(rows.descriptions.clone());
                set.push("quantities = ").push_bind_unseparated(rows.quantities.clone());
                set.push("units = ").push_bind_unseparated(rows.units.clone());
                set.push("rates = ").push_bind_unseparated(rows.rates.clone());
            }
            if let Some(total) = fields.total {
                set.push("total = ").push_bind_unseparated(total);
                set.push("amount = ").push_bind_unseparated(total);
            }
            if let Some(status) = fields.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
            }
            if let Some(pdf_url) = &fields.pdf_url {
                set.push("pdf_url = ").push_bind_unseparated(pdf_url.clone());
            }
        }
        Self::push_key(&mut builder, key);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::new(StoreOperation::Update, e))?;

        if result.rows_affected() == 0 {
            warn!("Update of invoice {} matched no rows", key);
        } else {
            info!("Updated invoice {} ({} row(s))", key, result.rows_affected());
        }
        Ok(())
    }

    async fn delete(&self, key: &InvoiceKey) -> Result<(), StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM invoices");
        Self::push_key(&mut builder, key);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::new(StoreOperation::Delete, e))?;

        info!("Deleted invoice {} ({} row(s))", key, result.rows_affected());
        Ok(())
    }

    async fn phone_numbers(&self) -> Result<Vec<String>, StoreError> {
        let phones = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT phone_number
            FROM invoices
            WHERE phone_number IS NOT NULL AND phone_number <> ''
            ORDER BY phone_number
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::new(StoreOperation::PhoneNumbers, e))?;

        Ok(phones)
    }
}
