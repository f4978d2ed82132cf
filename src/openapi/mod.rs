use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Print Shop Warehouse API",
        version = "1.0.0",
        description = r#"
# Print Shop Warehouse API

Stock reservation and fulfillment for the raw-material and finished-goods warehouses.

## Concepts

- **Lots** hold a quantity of one material, optionally tied to a quality batch and the delivery it came from.
- **Allocations** reserve free stock oldest-lot-first and are all or nothing per material.
- **Tasks** record each reservation or put-away. Batch completion skips tasks that cannot move and reports them.
- **Notifications** to Production and Sales-and-Shipping go through a persistent outbox with retries.

## Errors

Failures use one body shape:

```json
{
  "error": {
    "code": "insufficient_stock",
    "message": "Insufficient stock for material 7: requested 12, available 11",
    "status": 422
  }
}
```
        "#,
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "allocations", description = "Reserving stock"),
        (name = "tasks", description = "Task lifecycle and queries"),
        (name = "stock", description = "Stock views, returns and finished-goods deliveries"),
        (name = "intake", description = "Goods receipt, quarantine and complaints"),
        (name = "procurement", description = "Material orders and minimum stock"),
        (name = "Health", description = "Health check endpoints"),
        (name = "Admin", description = "Notification outbox")
    ),
    paths(
        crate::handlers::allocations::allocate,
        crate::handlers::allocations::allocate_batch,

        crate::handlers::tasks::create_withdrawal_task,
        crate::handlers::tasks::create_put_away_task,
        crate::handlers::tasks::complete_tasks,
        crate::handlers::tasks::mark_ready_for_pickup,
        crate::handlers::tasks::open_tasks,
        crate::handlers::tasks::task_history,
        crate::handlers::tasks::get_task,

        crate::handlers::stock::material_lots,
        crate::handlers::stock::material_stock,
        crate::handlers::stock::raw_material_availability,
        crate::handlers::stock::finished_goods_availability,
        crate::handlers::stock::return_raw_material,
        crate::handlers::stock::deliver_finished_goods,

        crate::handlers::intake::receive_delivery,
        crate::handlers::intake::lock_deliveries,
        crate::handlers::intake::release_deliveries,
        crate::handlers::intake::put_away_deliveries,
        crate::handlers::intake::list_deliveries,
        crate::handlers::intake::list_complaints,

        crate::handlers::procurement::create_material_order,
        crate::handlers::procurement::submit_material_orders,
        crate::handlers::procurement::list_material_orders,
        crate::handlers::procurement::set_minimum_stock,
        crate::handlers::procurement::below_minimum,

        crate::handlers::outbox::list_outbox,
        crate::handlers::outbox::retry_outbox,

        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::services::SkipReason,
            crate::services::SkippedItem,
            crate::services::BatchOutcome,
            crate::notifications::OutboundMessage,
            crate::notifications::DispatchOutcome,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_the_core_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Print Shop Warehouse API"));
        assert!(json.contains("/api/v1/allocations"));
        assert!(json.contains("/api/v1/tasks/complete"));
        assert!(json.contains("/api/v1/deliveries/put-away"));
    }
}
