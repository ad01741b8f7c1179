use crate::error::ExecutionError;
use crate::models::ResultTable;
use crate::query::SearchQuery;
use async_trait::async_trait;

/// Read access to the listing store
/// The API only ever sees this trait, so tests can swap the database for a fake
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Run a search and materialize its full result
    async fn fetch(&self, query: &SearchQuery) -> Result<ResultTable, ExecutionError>;

    /// Get the name of the backing store
    fn backend_name(&self) -> &'static str;
}
