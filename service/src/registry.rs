use std::sync::Arc;

use popclock_shared::{CountryIndex, SupportedCountry};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::{ClockError, ClockResult, SourceError};
use crate::source::CountryDataSource;

/// Supported-country cache, filled from the source on first use.
///
/// A failed or empty fetch leaves the cell unset so the next call retries.
pub struct CountryRegistry<S> {
    source: Arc<S>,
    index: OnceCell<CountryIndex>,
}

impl<S: CountryDataSource> CountryRegistry<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            index: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.index.initialized()
    }

    async fn index(&self) -> Result<&CountryIndex, SourceError> {
        self.index
            .get_or_try_init(|| async {
                match self.source.list_countries().await {
                    Ok(names) if names.is_empty() => {
                        warn!("country source returned an empty list; not caching");
                        Err(SourceError::unavailable("empty country list"))
                    }
                    Ok(names) => {
                        info!(count = names.len(), "loaded supported countries");
                        Ok(CountryIndex::new(names))
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to fetch supported countries");
                        Err(e)
                    }
                }
            })
            .await
    }

    pub async fn list(&self) -> ClockResult<Vec<SupportedCountry>> {
        Ok(self.index().await?.names().to_vec())
    }

    pub async fn resolve(&self, input: &str) -> ClockResult<SupportedCountry> {
        let index = self.index().await?;
        index.resolve(input).map_err(ClockError::from)
    }
}
