use serde::Serialize;
use shared::domain::{BusStatus, Resource};
use thiserror::Error;
use tracing::warn;

use crate::{error::CollectionError, http::HttpCollection};

pub const DASHBOARD_ERROR: &str = "Não foi possível carregar os dados do painel.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_buses: usize,
    pub buses_in_operation: usize,
    pub work_orders_in_progress: usize,
    pub stock_below_minimum: usize,
}

#[derive(Debug, Error)]
#[error("{}", DASHBOARD_ERROR)]
pub struct DashboardError {
    #[source]
    pub source: CollectionError,
}

/// Loads the home-page counters. `http` may point at any resource; the
/// sibling collections are derived from it.
pub async fn load_dashboard(http: &HttpCollection) -> Result<DashboardSummary, DashboardError> {
    count_all(http).await.map_err(|source| {
        warn!(%source, "dashboard load failed");
        DashboardError { source }
    })
}

async fn count_all(http: &HttpCollection) -> Result<DashboardSummary, CollectionError> {
    let buses = http.for_resource(Resource::Bus);
    let work_orders = http.for_resource(Resource::WorkOrder);
    let stock = http.for_resource(Resource::Stock);

    let total_buses = buses.fetch_named(&[]).await?.item_count();
    let buses_in_operation = buses
        .fetch_named(&["status", BusStatus::InOperation.as_str()])
        .await?
        .item_count();
    let work_orders_in_progress = work_orders.fetch_named(&["em-execucao"]).await?.item_count();
    let stock_below_minimum = stock.fetch_named(&["abaixo-minimo"]).await?.item_count();

    Ok(DashboardSummary {
        total_buses,
        buses_in_operation,
        work_orders_in_progress,
        stock_below_minimum,
    })
}
