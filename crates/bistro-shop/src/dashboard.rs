use serde::Serialize;

use crate::model::{Order, OrderStatus, Product, round_cents};

/// Number of orders shown in the dashboard's recent list.
pub const RECENT_ORDERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_orders: usize,
    pub pending_orders: usize,
    pub completed_orders: usize,
    pub total_products: usize,
    pub available_products: usize,
    /// Sum of completed orders only.
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_orders: Vec<Order>,
}

/// Summarize `orders` (newest first) and the catalog.
pub fn summarize(mut orders: Vec<Order>, products: &[Product]) -> Dashboard {
    let with_status = |status| orders.iter().filter(|o| o.status == status).count();
    let revenue: f64 = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Completed)
        .map(|o| o.total_amount)
        .sum();

    let stats = DashboardStats {
        total_orders: orders.len(),
        pending_orders: with_status(OrderStatus::Pending),
        completed_orders: with_status(OrderStatus::Completed),
        total_products: products.len(),
        available_products: products.iter().filter(|p| p.available).count(),
        total_revenue: round_cents(revenue),
    };
    orders.truncate(RECENT_ORDERS);
    Dashboard {
        stats,
        recent_orders: orders,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn order(status: OrderStatus, total: f64) -> Order {
        Order {
            id: bistro_common::new_record_id(),
            user_id: "u".into(),
            user_name: "jane".into(),
            user_cellphone: "+1".into(),
            items: Vec::new(),
            total_amount: total,
            status,
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn product(available: bool) -> Product {
        Product {
            id: bistro_common::new_record_id(),
            name: "p".into(),
            description: String::new(),
            price: 1.0,
            category: "c".into(),
            image_url: None,
            available,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn revenue_counts_completed_orders_only() {
        let orders = vec![
            order(OrderStatus::Completed, 10.1),
            order(OrderStatus::Pending, 50.0),
            order(OrderStatus::Completed, 20.2),
            order(OrderStatus::Declined, 7.0),
        ];
        let dash = summarize(orders, &[product(true), product(false)]);
        assert_eq!(dash.stats.total_orders, 4);
        assert_eq!(dash.stats.pending_orders, 1);
        assert_eq!(dash.stats.completed_orders, 2);
        assert_eq!(dash.stats.total_products, 2);
        assert_eq!(dash.stats.available_products, 1);
        assert_eq!(dash.stats.total_revenue, 30.3);
    }

    #[test]
    fn recent_orders_are_capped() {
        let orders = (0..15).map(|_| order(OrderStatus::Pending, 1.0)).collect();
        let dash = summarize(orders, &[]);
        assert_eq!(dash.stats.total_orders, 15);
        assert_eq!(dash.recent_orders.len(), RECENT_ORDERS);
    }
}
