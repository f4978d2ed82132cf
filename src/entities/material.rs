use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Condition;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum MaterialCategory {
    #[sea_orm(string_value = "t-shirt")]
    TShirt,
    #[sea_orm(string_value = "dye")]
    Dye,
    #[sea_orm(string_value = "print-film")]
    PrintFilm,
    #[sea_orm(string_value = "packaging")]
    Packaging,
}

impl MaterialCategory {
    /// Consumables handed to Production as raw supplies rather than as garments.
    pub fn is_raw_supply(self) -> bool {
        matches!(
            self,
            MaterialCategory::Dye | MaterialCategory::PrintFilm | MaterialCategory::Packaging
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Material)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub warehouse_id: i64,
    pub category: MaterialCategory,
    /// Catalog item; `false` marks a one-off custom print.
    pub is_standard: bool,
    pub material_type: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub artwork_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
    #[sea_orm(has_many = "super::stock_lot::Entity")]
    StockLots,
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The attribute tuple two receipts must share to refer to the same material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MaterialIdentity {
    pub warehouse_id: i64,
    pub category: MaterialCategory,
    pub material_type: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub artwork_url: Option<String>,
}

impl MaterialIdentity {
    pub fn condition(&self) -> Condition {
        Condition::all()
            .add(Column::WarehouseId.eq(self.warehouse_id))
            .add(Column::Category.eq(self.category))
            .add(optional_eq(Column::MaterialType, &self.material_type))
            .add(optional_eq(Column::Size, &self.size))
            .add(optional_eq(Column::Color, &self.color))
            .add(optional_eq(Column::ArtworkUrl, &self.artwork_url))
    }
}

impl From<&Model> for MaterialIdentity {
    fn from(m: &Model) -> Self {
        Self {
            warehouse_id: m.warehouse_id,
            category: m.category,
            material_type: m.material_type.clone(),
            size: m.size.clone(),
            color: m.color.clone(),
            artwork_url: m.artwork_url.clone(),
        }
    }
}

fn optional_eq(column: Column, value: &Option<String>) -> Condition {
    match value {
        Some(v) => Condition::all().add(column.eq(v.clone())),
        None => Condition::all().add(column.is_null()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn raw_supplies_exclude_textiles() {
        assert!(MaterialCategory::Dye.is_raw_supply());
        assert!(MaterialCategory::PrintFilm.is_raw_supply());
        assert!(MaterialCategory::Packaging.is_raw_supply());
        assert!(!MaterialCategory::TShirt.is_raw_supply());
    }

    #[test]
    fn category_names_normalize() {
        assert_eq!(MaterialCategory::TShirt.to_string(), "t-shirt");
        assert_eq!(
            MaterialCategory::from_str("PRINT-FILM").unwrap(),
            MaterialCategory::PrintFilm
        );
        assert!(MaterialCategory::from_str("Farbe").is_err());
    }
}
