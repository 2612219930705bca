//! Back-office summary figures.

use std::collections::BTreeMap;

use serde::Serialize;

use tasfiya_core::{Money, OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub product_count: i64,
    /// Keyed by order status wire name; every status is present.
    pub orders_by_status: BTreeMap<String, i64>,
    pub unread_contacts: i64,
    pub pending_appointments: i64,
    pub active_auctions: i64,
    /// Sum of totals of paid orders.
    pub revenue: Money,
}

impl DashboardStats {
    /// Order counts with a zero entry for every status not in `counts`.
    #[must_use]
    pub fn order_counts(counts: impl IntoIterator<Item = (OrderStatus, i64)>) -> BTreeMap<String, i64> {
        let mut map: BTreeMap<String, i64> = OrderStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_owned(), 0))
            .collect();
        for (status, count) in counts {
            *map.entry(status.as_str().to_owned()).or_default() += count;
        }
        map
    }
}
