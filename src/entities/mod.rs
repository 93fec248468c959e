//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables. Each entity has a Model struct
//! for data and an Entity struct for operations.

pub mod app_setting;
pub mod daily_attendance;
pub mod expense;
pub mod inventory_item;
pub mod inventory_refund;
pub mod inventory_transaction;
pub mod payment;
pub mod person;
pub mod student_holding;
pub mod term;

// Re-export specific types to avoid conflicts
pub use app_setting::{Column as AppSettingColumn, Entity as AppSetting, Model as AppSettingModel};
pub use daily_attendance::{
    AttendanceMark, AttendanceStatus, Column as DailyAttendanceColumn,
    Entity as DailyAttendance, Model as DailyAttendanceModel, StatusMap,
};
pub use expense::{Column as ExpenseColumn, Entity as Expense, Model as ExpenseModel};
pub use inventory_item::{
    Column as InventoryItemColumn, Entity as InventoryItem, LevelPrices, LevelStock,
    Model as InventoryItemModel,
};
pub use inventory_refund::{
    Column as InventoryRefundColumn, Entity as InventoryRefund, Model as InventoryRefundModel,
};
pub use inventory_transaction::{
    Column as InventoryTransactionColumn, Entity as InventoryTransaction,
    Model as InventoryTransactionModel,
};
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel};
pub use person::{Column as PersonColumn, Entity as Person, Model as PersonModel, Population};
pub use student_holding::{
    Column as StudentHoldingColumn, Entity as StudentHolding, Model as StudentHoldingModel,
};
pub use term::{Column as TermColumn, Entity as Term, Model as TermModel};
