//! HTTP routes for listing exports
//!
//! Every route has the shape `GET /<search>/<format>/{city}/{min_size}/{max_size}`.
//! A request runs the search, reshapes the result and returns it as a download.
//! Any failure along the way becomes an [`ErrorEnvelope`] with status 404.
//!
//! ## Endpoints
//!
//! - `GET /latest/{csv,json}/...`           - newest scrape of each listing
//! - `GET /all/{csv,json}/...`              - every scrape
//! - `GET /prices_over_time/{csv,json}/...` - average price per m² by day
//! - `GET /price_change/{csv,json}/...`     - price observations per listing

pub mod error;

pub use error::ErrorEnvelope;

use crate::error::ExportError;
use crate::export::{self, Attachment, Format};
use crate::query::{QueryKind, SearchQuery};
use crate::store::ListingStore;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

// ── Shared state ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ListingStore>,
}

impl AppState {
    pub fn new(store: impl ListingStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Path segments shared by every route
#[derive(Debug, Deserialize)]
pub struct SearchPath {
    pub city: String,
    pub min_size: String,
    pub max_size: String,
}

// ── Route table ─────────────────────────────────────────────────────────

/// One export route: which search it runs and how the result is delivered
#[derive(Debug)]
pub struct Endpoint {
    pub name: &'static str,
    pub kind: QueryKind,
    pub format: Format,
    /// Filename suffix of the download, `<city>_<suffix>.<ext>`
    pub file_suffix: &'static str,
    /// Whether failures report a traceback
    pub traced: bool,
}

impl Endpoint {
    pub fn route(&self) -> String {
        format!("/{}/:city/:min_size/:max_size", self.name)
    }
}

pub static ENDPOINTS: [Endpoint; 8] = [
    Endpoint {
        name: "latest/csv",
        kind: QueryKind::Latest,
        format: Format::Csv,
        file_suffix: "latest",
        traced: true,
    },
    Endpoint {
        name: "latest/json",
        kind: QueryKind::Latest,
        format: Format::Json,
        file_suffix: "all",
        traced: true,
    },
    Endpoint {
        name: "all/csv",
        kind: QueryKind::Entire,
        format: Format::Csv,
        file_suffix: "all",
        traced: true,
    },
    Endpoint {
        name: "all/json",
        kind: QueryKind::Entire,
        format: Format::Json,
        file_suffix: "all",
        traced: true,
    },
    Endpoint {
        name: "prices_over_time/json",
        kind: QueryKind::PricesOverTime,
        format: Format::Json,
        file_suffix: "all",
        traced: true,
    },
    Endpoint {
        name: "prices_over_time/csv",
        kind: QueryKind::PricesOverTime,
        format: Format::Csv,
        file_suffix: "prices_over_time",
        traced: true,
    },
    Endpoint {
        name: "price_change/json",
        kind: QueryKind::PriceChange,
        format: Format::Json,
        file_suffix: "price_change",
        traced: false,
    },
    Endpoint {
        name: "price_change/csv",
        kind: QueryKind::PriceChange,
        format: Format::Csv,
        file_suffix: "price_change",
        traced: false,
    },
];

// ── Router creation ─────────────────────────────────────────────────────

/// Build the axum router with every export route
pub fn router(state: AppState) -> Router {
    ENDPOINTS
        .iter()
        .fold(Router::<AppState>::new(), |router, endpoint| {
            router.route(
                &endpoint.route(),
                get(
                    move |State(state): State<AppState>, Path(path): Path<SearchPath>| {
                        dispatch(state, endpoint, path)
                    },
                ),
            )
        })
        .with_state(state)
}

// ── Dispatch ────────────────────────────────────────────────────────────

async fn dispatch(state: AppState, endpoint: &'static Endpoint, path: SearchPath) -> Response {
    let query = SearchQuery::build(endpoint.kind, path.city, path.min_size, path.max_size);

    match export_attachment(state.store.as_ref(), endpoint, &query).await {
        Ok(attachment) => {
            info!(
                endpoint = endpoint.name,
                city = %query.city,
                bytes = attachment.body.len(),
                "export served"
            );
            attachment.into_response()
        }
        Err(err) => {
            let request = format!(
                "GET /{}/{}/{}/{}",
                endpoint.name, query.city, query.min_size, query.max_size
            );
            warn!(
                endpoint = endpoint.name,
                backend = state.store.backend_name(),
                error_type = err.kind(),
                error = %err,
                "export failed"
            );
            let context = endpoint.traced.then_some(request.as_str());
            ErrorEnvelope::from_error(&err, context).into_response()
        }
    }
}

/// Query, reshape and encode one export
pub async fn export_attachment(
    store: &dyn ListingStore,
    endpoint: &Endpoint,
    query: &SearchQuery,
) -> Result<Attachment, ExportError> {
    let table = store.fetch(query).await?;
    let body = export::render(endpoint.kind, endpoint.format, table)?;
    Ok(Attachment::new(
        endpoint.format,
        &query.city,
        endpoint.file_suffix,
        body,
    ))
}
