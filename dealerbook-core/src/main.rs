use anyhow::Context;
use dealerbook_core::approval::{ApprovalWorkflow, PdfRenderer};
use dealerbook_core::config::{AppConfig, DocumentStoreConfig};
use dealerbook_core::db::create_pool;
use dealerbook_core::editing::SaveWorkflow;
use dealerbook_core::handlers::{create_router, AppState};
use dealerbook_core::stores::{
    DisabledNotificationSink, DocumentStore, HttpObjectStore, InvoiceStore, LocalDocumentStore,
    NotificationSink, PgInvoiceStore, WebhookNotificationSink,
};
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env)
    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting DealerBook server...");

    // Initialize database connection pool
    let db_pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to the database")?;
    let invoices: Arc<dyn InvoiceStore> = Arc::new(PgInvoiceStore::new(db_pool.clone()));

    let http = reqwest::Client::builder()
        .timeout(config.step_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let (documents, local_documents) = match &config.documents {
        DocumentStoreConfig::Local {
            dir,
            public_base_url,
        } => {
            let store = Arc::new(
                LocalDocumentStore::new(dir.clone(), public_base_url.clone())
                    .await
                    .with_context(|| format!("Failed to prepare document directory {}", dir.display()))?,
            );
            info!("Storing documents under {}", store.base_path().display());
            let documents: Arc<dyn DocumentStore> = store.clone();
            (documents, Some(store))
        }
        DocumentStoreConfig::Http {
            url,
            bucket,
            api_key,
        } => {
            info!("Storing documents in bucket {} at {}", bucket, url);
            let store: Arc<dyn DocumentStore> = Arc::new(HttpObjectStore::new(
                http.clone(),
                url.clone(),
                bucket.clone(),
                api_key.clone(),
            ));
            (store, None)
        }
    };

    let notifier: Arc<dyn NotificationSink> = match &config.notify_webhook_url {
        Some(url) => {
            info!("Approval notifications go to {}", url);
            Arc::new(WebhookNotificationSink::new(http.clone(), url.clone()))
        }
        None => {
            info!("NOTIFY_WEBHOOK_URL not set, approval notifications are disabled");
            Arc::new(DisabledNotificationSink)
        }
    };

    let approvals = ApprovalWorkflow::new(invoices.clone(), documents, notifier, Arc::new(PdfRenderer))
        .with_notify_failure_policy(config.notify_failure_policy)
        .with_step_timeout(config.step_timeout);
    let saves = SaveWorkflow::new(invoices.clone()).with_timeout(config.step_timeout);

    // Create application state
    let app_state = AppState {
        db: db_pool,
        invoices,
        saves: Arc::new(saves),
        approvals: Arc::new(approvals),
        documents: local_documents,
    };

    // Create router
    let app = create_router(app_state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", address, e))?;

    info!("Server listening on {}", address);

    // Start the server
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
