use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_core::{DomainError, DomainResult, OrganizationId, aggregate_id};

aggregate_id!(
    /// A tradable good.
    ItemId
);

/// How an item is packed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packaging {
    Box,
    Tin,
    Jar,
}

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub organization: OrganizationId,
    pub name: String,
    pub material_description: String,
    pub packaging: Packaging,
    /// Units per pack.
    pub pack_size: u32,
    pub net_weight_grams: u32,
    pub gross_weight_grams: u32,
    /// GST rate in whole percent.
    pub gst_percent: u8,
    /// Static price in minor currency units.
    pub static_price: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub organization: OrganizationId,
    pub item_id: ItemId,
    pub name: String,
    #[serde(default)]
    pub material_description: String,
    pub packaging: Packaging,
    pub pack_size: u32,
    pub net_weight_grams: u32,
    pub gross_weight_grams: u32,
    pub gst_percent: u8,
    #[serde(default)]
    pub static_price: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

impl Item {
    pub fn create(cmd: CreateItem) -> DomainResult<Self> {
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if cmd.pack_size == 0 {
            return Err(DomainError::validation("pack size must be positive"));
        }
        if cmd.gross_weight_grams < cmd.net_weight_grams {
            return Err(DomainError::validation(
                "gross weight cannot be less than net weight",
            ));
        }
        if cmd.gst_percent > 100 {
            return Err(DomainError::validation("gst rate must be a percentage (0-100)"));
        }
        if matches!(cmd.static_price, Some(p) if p < 0) {
            return Err(DomainError::validation("static price cannot be negative"));
        }

        Ok(Self {
            id: cmd.item_id,
            organization: cmd.organization,
            name: cmd.name.trim().to_string(),
            material_description: cmd.material_description,
            packaging: cmd.packaging,
            pack_size: cmd.pack_size,
            net_weight_grams: cmd.net_weight_grams,
            gross_weight_grams: cmd.gross_weight_grams,
            gst_percent: cmd.gst_percent,
            static_price: cmd.static_price,
            active: true,
            created_at: cmd.occurred_at,
        })
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// Item lookup consumed by every ledger transaction.
///
/// Items belonging to another organization, and inactive items, are reported
/// as not found.
pub trait ItemCatalog {
    fn get_item(&self, organization: OrganizationId, id: ItemId) -> DomainResult<Item>;
}

impl<C: ItemCatalog + ?Sized> ItemCatalog for &C {
    fn get_item(&self, organization: OrganizationId, id: ItemId) -> DomainResult<Item> {
        (**self).get_item(organization, id)
    }
}

/// Map-backed catalog.
///
/// Used directly in tests, and by services as a snapshot of the items a
/// transaction references.
#[derive(Debug, Clone, Default)]
pub struct InMemoryItemCatalog {
    items: BTreeMap<ItemId, Item>,
}

impl InMemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.id, item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<Item> for InMemoryItemCatalog {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().map(|item| (item.id, item)).collect(),
        }
    }
}

impl ItemCatalog for InMemoryItemCatalog {
    fn get_item(&self, organization: OrganizationId, id: ItemId) -> DomainResult<Item> {
        self.items
            .get(&id)
            .filter(|item| item.organization == organization && item.active)
            .cloned()
            .ok_or_else(|| DomainError::not_found("item", id))
    }
}

/// Check that every referenced item exists, reporting the first bad line.
pub fn require_items<C, I>(catalog: &C, organization: OrganizationId, items: I) -> DomainResult<()>
where
    C: ItemCatalog + ?Sized,
    I: IntoIterator<Item = ItemId>,
{
    for (line, id) in items.into_iter().enumerate() {
        catalog
            .get_item(organization, id)
            .map_err(|e| e.at_line(line))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeflow_core::{AggregateId, ErrorKind};

    fn test_org() -> OrganizationId {
        OrganizationId::new()
    }

    fn create_cmd(organization: OrganizationId) -> CreateItem {
        CreateItem {
            organization,
            item_id: ItemId::new(AggregateId::new()),
            name: "Mustard Oil".to_string(),
            material_description: "cold pressed".to_string(),
            packaging: Packaging::Tin,
            pack_size: 12,
            net_weight_grams: 15_000,
            gross_weight_grams: 15_800,
            gst_percent: 5,
            static_price: Some(210_000),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn create_item_starts_active() {
        let item = Item::create(create_cmd(test_org())).unwrap();
        assert!(item.active);
        assert_eq!(item.name, "Mustard Oil");
    }

    #[test]
    fn create_item_rejects_inverted_weights() {
        let mut cmd = create_cmd(test_org());
        cmd.gross_weight_grams = 100;
        match Item::create(cmd).unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("gross weight")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn create_item_rejects_blank_name() {
        let mut cmd = create_cmd(test_org());
        cmd.name = "  ".to_string();
        assert!(matches!(Item::create(cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn catalog_hides_other_organizations_and_inactive_items() {
        let org = test_org();
        let visible = Item::create(create_cmd(org)).unwrap();
        let mut retired = Item::create(create_cmd(org)).unwrap();
        retired.deactivate();
        let foreign = Item::create(create_cmd(test_org())).unwrap();

        let catalog: InMemoryItemCatalog =
            [visible.clone(), retired.clone(), foreign.clone()].into_iter().collect();

        assert_eq!(catalog.get_item(org, visible.id).unwrap(), visible);
        assert_eq!(catalog.get_item(org, retired.id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(catalog.get_item(org, foreign.id).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn require_items_reports_the_offending_line() {
        let org = test_org();
        let known = Item::create(create_cmd(org)).unwrap();
        let catalog: InMemoryItemCatalog = [known.clone()].into_iter().collect();
        let unknown = ItemId::generate();

        let err = require_items(&catalog, org, [known.id, known.id, unknown]).unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
