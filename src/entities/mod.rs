pub mod complaint;
pub mod inbound_delivery;
pub mod material;
pub mod material_order;
pub mod minimum_stock;
pub mod notification_outbox;
pub mod quality;
pub mod stock_lot;
pub mod task;
pub mod warehouse;

pub use material::MaterialCategory;
pub use task::{Requester, TaskDirection, TaskStatus};
pub use warehouse::WarehouseKind;
