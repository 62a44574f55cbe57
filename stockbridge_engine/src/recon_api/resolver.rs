//! Turns the SKUs a customer ordered into concrete, costed catalog line items.
//!
//! Resolution happens in three steps:
//! 1. Bundle SKUs are replaced by one unit of each component per bundle unit.
//! 2. Duplicate SKUs are merged by summing their quantities. Output keeps the order in which SKUs first appear.
//! 3. Name and unit cost are looked up in the catalog in a single query.
//!
//! SKUs that are not in the catalog are dropped from the items and reported in [`ResolvedItems::missing`]. If none of
//! the SKUs are in the catalog, resolution fails with `CatalogMismatch`.
use std::collections::HashMap;

use log::*;
use marketplace_tools::OrderedItem;
use serde::{Deserialize, Serialize};
use stockbridge_common::Cents;

use crate::{
    db_types::{CatalogEntry, ResolvedItem},
    traits::{InventoryManagement, ReconciliationError},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedItems {
    pub items: Vec<ResolvedItem>,
    /// SKUs that were ordered but are not in the catalog.
    pub missing: Vec<String>,
}

impl ResolvedItems {
    pub fn total_cost(&self) -> Cents {
        self.items.iter().map(|i| i.cost * i.quantity).sum()
    }

    pub fn total_units(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Expands bundles and merges duplicates. Items with no positive quantity are discarded.
pub fn expand_and_merge(requested: &[OrderedItem], bundles: &HashMap<String, Vec<String>>) -> Vec<OrderedItem> {
    let mut merged: Vec<OrderedItem> = Vec::with_capacity(requested.len());
    let mut add = |sku: &str, quantity: i64| match merged.iter_mut().find(|i| i.sku == sku) {
        Some(item) => item.quantity += quantity,
        None => merged.push(OrderedItem::new(sku, quantity)),
    };
    for item in requested.iter().filter(|i| i.quantity > 0) {
        match bundles.get(&item.sku) {
            Some(components) => components.iter().for_each(|c| add(c.as_str(), item.quantity)),
            None => add(item.sku.as_str(), item.quantity),
        }
    }
    merged
}

/// Zips catalog names and costs into the merged items.
pub fn zip_catalog(merged: Vec<OrderedItem>, catalog: &[CatalogEntry]) -> Result<ResolvedItems, ReconciliationError> {
    if !merged.is_empty() && catalog.is_empty() {
        return Err(ReconciliationError::CatalogMismatch(merged.into_iter().map(|i| i.sku).collect()));
    }
    let mut result = ResolvedItems::default();
    for item in merged {
        match catalog.iter().find(|e| e.sku == item.sku) {
            Some(entry) => result.items.push(ResolvedItem {
                sku: item.sku,
                name: entry.product_name.clone(),
                cost: entry.cost_of_goods,
                quantity: item.quantity,
            }),
            None => result.missing.push(item.sku),
        }
    }
    Ok(result)
}

#[derive(Debug, Clone)]
pub struct InventoryResolver<B> {
    db: B,
}

impl<B> InventoryResolver<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> InventoryResolver<B>
where B: InventoryManagement
{
    pub async fn resolve(&self, requested: &[OrderedItem]) -> Result<ResolvedItems, ReconciliationError> {
        if requested.iter().all(|i| i.quantity <= 0) {
            return Err(ReconciliationError::InvalidRequest("The order has no line items".into()));
        }
        let skus = requested.iter().map(|i| i.sku.clone()).collect::<Vec<_>>();
        let bundles = self.db.fetch_bundle_components(&skus).await?;
        let merged = expand_and_merge(requested, &bundles);
        let merged_skus = merged.iter().map(|i| i.sku.clone()).collect::<Vec<_>>();
        let catalog = self.db.fetch_catalog_entries(&merged_skus).await?;
        let resolved = zip_catalog(merged, &catalog)?;
        if !resolved.missing.is_empty() {
            warn!("📦️ These SKUs are not in the catalog and were left out: {}", resolved.missing.join(", "));
        }
        trace!("📦️ Resolved {} SKUs into {} catalog items", requested.len(), resolved.items.len());
        Ok(resolved)
    }
}
