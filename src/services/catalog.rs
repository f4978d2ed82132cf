//! Lookup-or-create helpers for warehouses, materials and quality batches.
//! All functions take any connection so they can join a caller's transaction.

use crate::entities::material::{self, MaterialIdentity};
use crate::entities::quality::{self, QualityAttributes};
use crate::entities::warehouse::{self, WarehouseKind};
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::info;

pub async fn warehouse_by_kind<C: ConnectionTrait>(
    db: &C,
    kind: WarehouseKind,
) -> Result<warehouse::Model, ServiceError> {
    warehouse::Entity::find()
        .filter(warehouse::Column::Kind.eq(kind))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Warehouse", kind))
}

pub async fn get_material<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
) -> Result<material::Model, ServiceError> {
    material::Entity::find_by_id(material_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Material", material_id))
}

pub async fn find_material<C: ConnectionTrait>(
    db: &C,
    identity: &MaterialIdentity,
) -> Result<Option<material::Model>, ServiceError> {
    Ok(material::Entity::find()
        .filter(identity.condition())
        .order_by_asc(material::Column::Id)
        .one(db)
        .await?)
}

/// Returns the material with this identity, creating it on first sight.
pub async fn find_or_create_material<C: ConnectionTrait>(
    db: &C,
    identity: &MaterialIdentity,
    is_standard: bool,
) -> Result<material::Model, ServiceError> {
    if let Some(existing) = find_material(db, identity).await? {
        return Ok(existing);
    }

    let created = material::ActiveModel {
        warehouse_id: Set(identity.warehouse_id),
        category: Set(identity.category),
        is_standard: Set(is_standard),
        material_type: Set(identity.material_type.clone()),
        size: Set(identity.size.clone()),
        color: Set(identity.color.clone()),
        artwork_url: Set(identity.artwork_url.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        material_id = created.id,
        category = %created.category,
        is_standard,
        "material created"
    );
    Ok(created)
}

/// Reuses a quality record with exactly these values or stores a new one.
/// An empty attribute set means "no quality" and yields `None`.
pub async fn find_or_create_quality<C: ConnectionTrait>(
    db: &C,
    attributes: &QualityAttributes,
) -> Result<Option<quality::Model>, ServiceError> {
    if attributes.is_empty() {
        return Ok(None);
    }

    if let Some(existing) = quality::Entity::find()
        .filter(attributes.condition())
        .order_by_asc(quality::Column::Id)
        .one(db)
        .await?
    {
        return Ok(Some(existing));
    }

    let created = quality::ActiveModel {
        absorbency: Set(attributes.absorbency),
        whiteness: Set(attributes.whiteness),
        ink_density: Set(attributes.ink_density),
        viscosity: Set(attributes.viscosity),
        color_delta: Set(attributes.color_delta),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(Some(created))
}

pub async fn get_quality<C: ConnectionTrait>(
    db: &C,
    quality_id: Option<i64>,
) -> Result<Option<quality::Model>, ServiceError> {
    match quality_id {
        Some(id) => Ok(quality::Entity::find_by_id(id).one(db).await?),
        None => Ok(None),
    }
}
