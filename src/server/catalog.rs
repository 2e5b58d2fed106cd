//! Catalog lookup: turn item references into priced `{name, unit_price}`
//! pairs. Resolution order is internal product id, then external catalog id,
//! then whatever freeform name/price the caller supplied.

use crate::server::database::pool::Pool;
use crate::server::model::item::{ItemRequest, ResolvedItem};
use async_trait::async_trait;
use derive_more::{Display, Error};
use log::warn;

#[derive(Debug, Display, Error)]
pub(crate) enum CatalogError {
    #[display("catalog query failed, {message}")]
    Query { message: String },
    #[display("no catalog connection available")]
    Busy,
}

#[derive(Debug, Clone)]
pub(crate) struct CatalogEntry {
    pub external_id: Option<String>,
    pub name: String,
    pub unit_price: i64,
}

#[async_trait]
pub(crate) trait CatalogProvider: Send + Sync {
    async fn lookup_by_id(&self, id: i64) -> Result<Option<CatalogEntry>, CatalogError>;
    async fn lookup_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<CatalogEntry>, CatalogError>;
}

/// Resolve a normalized item batch. Items that cannot be named are dropped
/// with a warning, never fatal to the batch. Items that cannot be priced are
/// dropped too, unless the legacy `zero_price_fallback` is on, in which case
/// they are carried at zero.
pub(crate) async fn resolve_items(
    provider: &dyn CatalogProvider,
    requested: Vec<ItemRequest>,
    zero_price_fallback: bool,
) -> Vec<ResolvedItem> {
    let mut resolved = Vec::with_capacity(requested.len());
    for item in requested {
        let entry = match lookup(provider, &item).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("catalog lookup failed for {:?}, dropping item, {}", item, e);
                continue;
            }
        };

        let name = match entry.as_ref().map(|e| e.name.clone()).or(item.name.clone()) {
            Some(name) => name,
            None => {
                warn!("item has no resolvable name, dropping: {:?}", item);
                continue;
            }
        };

        let unit_price = match entry.as_ref().map(|e| e.unit_price).or(item.unit_price) {
            Some(price) => price,
            None if zero_price_fallback => {
                warn!("item {} has no resolvable price, carrying at zero", name);
                0
            }
            None => {
                warn!("item {} has no resolvable price, dropping", name);
                continue;
            }
        };

        resolved.push(ResolvedItem {
            external_item_id: entry.and_then(|e| e.external_id).or(item.external_id),
            name,
            unit_price,
            quantity: item.quantity,
            note: item.note,
        });
    }
    resolved
}

async fn lookup(
    provider: &dyn CatalogProvider,
    item: &ItemRequest,
) -> Result<Option<CatalogEntry>, CatalogError> {
    if let Some(id) = item.product_id {
        if let Some(entry) = provider.lookup_by_id(id).await? {
            return Ok(Some(entry));
        }
    }
    if let Some(external_id) = item.external_id.as_deref() {
        if let Some(entry) = provider.lookup_by_external_id(external_id).await? {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

/// Postgres-backed catalog over the `product` table.
pub(crate) struct PgCatalog {
    pool: Pool,
}

impl PgCatalog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn select_one(
        &self,
        stmt: &str,
        param: &(dyn tokio_postgres::types::ToSql + Sync),
    ) -> Result<Option<CatalogEntry>, CatalogError> {
        let conn = self.pool.acquire().ok_or(CatalogError::Busy)?;
        let row = conn
            .client()
            .query_opt(stmt, &[param])
            .await
            .map_err(|e| CatalogError::Query {
                message: e.to_string(),
            })?;
        Ok(row.map(|r| CatalogEntry {
            external_id: r.get("external_id"),
            name: r.get("name"),
            unit_price: r.get("price"),
        }))
    }
}

#[async_trait]
impl CatalogProvider for PgCatalog {
    async fn lookup_by_id(&self, id: i64) -> Result<Option<CatalogEntry>, CatalogError> {
        self.select_one(
            "SELECT external_id, name, price FROM product WHERE id = $1 AND active",
            &id,
        )
        .await
    }

    async fn lookup_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<CatalogEntry>, CatalogError> {
        self.select_one(
            "SELECT external_id, name, price FROM product WHERE external_id = $1 AND active",
            &external_id.to_string(),
        )
        .await
    }
}

/// for test
#[cfg(test)]
pub(crate) struct StaticCatalog {
    entries: Vec<(Option<i64>, Option<String>, CatalogEntry)>,
}

#[cfg(test)]
impl StaticCatalog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with(mut self, id: Option<i64>, external_id: Option<&str>, name: &str, price: i64) -> Self {
        self.entries.push((
            id,
            external_id.map(str::to_string),
            CatalogEntry {
                external_id: external_id.map(str::to_string),
                name: name.to_string(),
                unit_price: price,
            },
        ));
        self
    }
}

#[cfg(test)]
#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn lookup_by_id(&self, id: i64) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self
            .entries
            .iter()
            .find(|(candidate, _, _)| *candidate == Some(id))
            .map(|(_, _, entry)| entry.clone()))
    }

    async fn lookup_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self
            .entries
            .iter()
            .find(|(_, candidate, _)| candidate.as_deref() == Some(external_id))
            .map(|(_, _, entry)| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with(Some(1), Some("SQ-COFFEE"), "Coffee", 500)
            .with(Some(2), None, "Tea", 400)
    }

    fn request(product_id: Option<i64>, name: Option<&str>, price: Option<i64>) -> ItemRequest {
        ItemRequest {
            product_id,
            name: name.map(str::to_string),
            unit_price: price,
            quantity: 1,
            ..ItemRequest::default()
        }
    }

    #[tokio::test]
    async fn internal_id_wins_over_freeform() {
        let resolved = resolve_items(
            &catalog(),
            vec![request(Some(1), Some("Wrong Name"), Some(9999))],
            false,
        )
        .await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "Coffee");
        assert_eq!(resolved[0].unit_price, 500);
        assert_eq!(resolved[0].external_item_id.as_deref(), Some("SQ-COFFEE"));
    }

    #[tokio::test]
    async fn external_id_resolves_when_internal_misses() {
        let mut item = request(Some(99), None, None);
        item.external_id = Some("SQ-COFFEE".to_string());
        let resolved = resolve_items(&catalog(), vec![item], false).await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "Coffee");
    }

    #[tokio::test]
    async fn freeform_name_and_price_pass_through() {
        let resolved = resolve_items(
            &catalog(),
            vec![request(None, Some("Birthday Cake"), Some(3000))],
            false,
        )
        .await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "Birthday Cake");
        assert_eq!(resolved[0].unit_price, 3000);
        assert!(resolved[0].external_item_id.is_none());
    }

    #[tokio::test]
    async fn nameless_item_is_dropped() {
        let resolved = resolve_items(&catalog(), vec![request(Some(99), None, Some(100))], false).await;
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn unpriceable_item_is_rejected_by_default() {
        let resolved = resolve_items(&catalog(), vec![request(None, Some("Mystery"), None)], false).await;
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn unpriceable_item_carried_at_zero_with_fallback() {
        let resolved = resolve_items(&catalog(), vec![request(None, Some("Mystery"), None)], true).await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].unit_price, 0);
    }
}
