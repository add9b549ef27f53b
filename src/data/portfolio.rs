//! Portfolio overview assembly
//!
//! Combines the backend's list of holdings with cached dividends and company
//! profiles from the market-data API.

use futures::future::join_all;
use tracing::{error, warn};

use super::{BackendClient, BackendError, Holding, MarketClient, PortfolioItem, PortfolioOverview};
use crate::cache::{Clock, FileSlotStore, SlotStore, SystemClock};

/// Loads and mutates the user's portfolio
#[derive(Debug, Clone)]
pub struct PortfolioService<S = FileSlotStore, C = SystemClock> {
    backend: BackendClient,
    market: MarketClient<S, C>,
}

impl<S: SlotStore, C: Clock> PortfolioService<S, C> {
    pub fn new(backend: BackendClient, market: MarketClient<S, C>) -> Self {
        Self { backend, market }
    }

    /// Loads every holding together with its dividends and latest price
    ///
    /// Holdings are enriched concurrently. A holding whose dividends cannot
    /// be loaded gets an empty list; one whose profile cannot be loaded gets
    /// no price. Only a failure to list the portfolio is an error.
    pub async fn load(&self) -> Result<PortfolioOverview, BackendError> {
        let items = self.backend.list_portfolio().await?;
        let holdings = join_all(items.into_iter().map(|item| self.load_holding(item))).await;
        Ok(PortfolioOverview { holdings })
    }

    async fn load_holding(&self, item: PortfolioItem) -> Holding {
        let dividends = match self.market.dividends(&item.symbol).await {
            Ok(dividends) => dividends,
            Err(e) => {
                warn!(symbol = %item.symbol, error = %e, "Failed to load dividends");
                Vec::new()
            }
        };

        let price = match self.market.company_profile(&item.symbol).await {
            Ok(profile) => profile.price,
            Err(e) => {
                error!(symbol = %item.symbol, error = %e, "Failed to load profile");
                None
            }
        };

        Holding {
            item,
            price,
            dividends,
        }
    }

    /// Adds a symbol to the portfolio
    pub async fn add(&self, symbol: &str) -> Result<(), BackendError> {
        self.backend.add_to_portfolio(symbol).await
    }

    /// Removes a symbol from the portfolio and drops its cached market data
    pub async fn remove(&self, symbol: &str) -> Result<(), BackendError> {
        self.backend.remove_from_portfolio(symbol).await?;
        self.market.cache().invalidate_symbol(symbol);
        Ok(())
    }
}
