use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Condition;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Measured attributes of a batch. Textiles carry absorbency and whiteness,
/// dyes carry ink density, viscosity and color delta.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Quality)]
#[sea_orm(table_name = "qualities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub absorbency: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub whiteness: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub ink_density: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub viscosity: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub color_delta: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QualityAttributes {
    pub absorbency: Option<Decimal>,
    pub whiteness: Option<Decimal>,
    pub ink_density: Option<Decimal>,
    pub viscosity: Option<Decimal>,
    pub color_delta: Option<Decimal>,
}

impl QualityAttributes {
    pub fn is_empty(&self) -> bool {
        self.absorbency.is_none()
            && self.whiteness.is_none()
            && self.ink_density.is_none()
            && self.viscosity.is_none()
            && self.color_delta.is_none()
    }

    /// Exact-value match, `NULL` matching only `NULL`.
    pub fn condition(&self) -> Condition {
        Condition::all()
            .add(decimal_eq(Column::Absorbency, self.absorbency))
            .add(decimal_eq(Column::Whiteness, self.whiteness))
            .add(decimal_eq(Column::InkDensity, self.ink_density))
            .add(decimal_eq(Column::Viscosity, self.viscosity))
            .add(decimal_eq(Column::ColorDelta, self.color_delta))
    }
}

impl From<&Model> for QualityAttributes {
    fn from(m: &Model) -> Self {
        Self {
            absorbency: m.absorbency,
            whiteness: m.whiteness,
            ink_density: m.ink_density,
            viscosity: m.viscosity,
            color_delta: m.color_delta,
        }
    }
}

fn decimal_eq(column: Column, value: Option<Decimal>) -> Condition {
    match value {
        Some(v) => Condition::all().add(column.eq(v)),
        None => Condition::all().add(column.is_null()),
    }
}
