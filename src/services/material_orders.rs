use crate::entities::material_order::{self, MaterialOrderStatus};
use crate::errors::ServiceError;
use crate::services::{catalog, BatchOutcome};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewMaterialOrder {
    pub supplier_id: i64,
    pub material_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Purchase orders for replenishing raw supplies.
#[derive(Clone)]
pub struct MaterialOrderService {
    db: Arc<DatabaseConnection>,
}

impl MaterialOrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, order), fields(material_id = order.material_id))]
    pub async fn create(&self, order: NewMaterialOrder) -> Result<material_order::Model, ServiceError> {
        order.validate()?;
        catalog::get_material(&*self.db, order.material_id).await?;

        let now = Utc::now();
        let created = material_order::ActiveModel {
            supplier_id: Set(order.supplier_id),
            material_id: Set(order.material_id),
            quantity: Set(order.quantity),
            status: Set(MaterialOrderStatus::Open),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(order_id = created.id, "material order created");
        Ok(created)
    }

    /// Sends open orders to their suppliers.
    #[instrument(skip(self, order_ids), fields(orders = order_ids.len()))]
    pub async fn submit(&self, order_ids: Vec<i64>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for id in order_ids {
            match self.mark_ordered(id).await {
                Ok(()) => outcome.complete(id),
                Err(e) => outcome.skip(id, &e),
            }
        }
        outcome
    }

    async fn mark_ordered(&self, order_id: i64) -> Result<(), ServiceError> {
        let res = material_order::Entity::update_many()
            .col_expr(
                material_order::Column::Status,
                Expr::value(MaterialOrderStatus::Ordered),
            )
            .col_expr(material_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(material_order::Column::Id.eq(order_id))
            .filter(material_order::Column::Status.eq(MaterialOrderStatus::Open))
            .exec(&*self.db)
            .await?;
        if res.rows_affected == 1 {
            info!(order_id, "material order submitted");
            return Ok(());
        }

        let current = material_order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material order", order_id))?;
        Err(ServiceError::InvalidTransition(format!(
            "material order {} is {}, expected open",
            order_id, current.status
        )))
    }

    pub async fn list(
        &self,
        status: Option<MaterialOrderStatus>,
    ) -> Result<Vec<material_order::Model>, ServiceError> {
        let mut query = material_order::Entity::find();
        if let Some(status) = status {
            query = query.filter(material_order::Column::Status.eq(status));
        }
        Ok(query
            .order_by_asc(material_order::Column::Id)
            .all(&*self.db)
            .await?)
    }
}
