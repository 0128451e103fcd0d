use async_trait::async_trait;
use delta_hedge_core::{GatewayError, IndexPriceSource, Symbol};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::client::DeribitClient;
use crate::models::IndexPrice;

/// Reference price from the public `get_index_price` endpoint.
pub struct DeribitIndexSource {
    client: Arc<DeribitClient>,
}

impl DeribitIndexSource {
    #[must_use]
    pub const fn new(client: Arc<DeribitClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IndexPriceSource for DeribitIndexSource {
    async fn index_price(&self, symbol: Symbol) -> Result<Decimal, GatewayError> {
        let price: IndexPrice = self
            .client
            .public("get_index_price", &[("index_name", symbol.index_name())])
            .await?;
        Ok(price.index_price)
    }
}
