use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the service catalog (cut, colour, treatment, ...).
///
/// Owned by the catalog store; the engines only read `duration_min`,
/// `price_cents` and `category` through the catalog cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCatalogEntry {
    pub id: Uuid,
    pub name: String,
    pub duration_min: u32,
    pub price_cents: i64,
    pub category: String,
    pub active: bool,
}
