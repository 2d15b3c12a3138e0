//! Read-only views over stored products.

use chrono::NaiveDate;
use common::{BatchRef, OrderId, Sku};
use domain::{Batch, Product};
use serde::Serialize;
use stock_store::StockStore;

use crate::Result;
use crate::unit_of_work::UnitOfWork;

/// Current state of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    pub sku: Sku,
    pub version: i64,
    pub available_quantity: i64,
    pub batches: Vec<BatchView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchView {
    pub reference: BatchRef,
    pub eta: Option<NaiveDate>,
    pub purchased_quantity: u32,
    pub allocated_quantity: i64,
    pub available_quantity: i64,
    pub allocations: Vec<AllocationView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationView {
    pub order_id: OrderId,
    pub quantity: u32,
}

impl From<&Batch> for BatchView {
    fn from(batch: &Batch) -> Self {
        Self {
            reference: batch.reference().clone(),
            eta: batch.eta(),
            purchased_quantity: batch.purchased_quantity(),
            allocated_quantity: batch.allocated_quantity(),
            available_quantity: batch.available_quantity(),
            allocations: batch
                .allocations()
                .iter()
                .map(|line| AllocationView {
                    order_id: line.order_id().clone(),
                    quantity: line.quantity(),
                })
                .collect(),
        }
    }
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            sku: product.sku().clone(),
            version: product.version().as_i64(),
            available_quantity: product.available_quantity(),
            batches: product.batches().iter().map(BatchView::from).collect(),
        }
    }
}

/// Reads a product without changing it. The scope is always rolled back.
pub async fn product_view<S: StockStore>(
    uow: &mut UnitOfWork<S>,
    sku: &Sku,
) -> Result<Option<ProductView>> {
    let mut scope = uow.begin().await?;
    let view = scope
        .products()
        .get(sku)
        .await?
        .map(|product| ProductView::from(&*product));
    scope.rollback().await?;
    Ok(view)
}
