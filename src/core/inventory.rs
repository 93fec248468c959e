//! Inventory checkout ledger.
//!
//! Items live in a folder tree and carry stock and a unit price per level. A
//! checkout takes stock out and records a transaction; the student's open holding
//! for (item, level) aggregates every outstanding checkout of that pair. Returning
//! restores stock and, when the checkout had been paid, logs a refund.
//!
//! [`delete_holding`] retracts a mistaken checkout outside the return flow and must
//! book the same stock and refund effects as [`return_item`].

use crate::{
    core::{directory, term::TermContext},
    entities::{
        InventoryItem, InventoryRefund, InventoryTransaction, LevelPrices, LevelStock, Population,
        StudentHolding, inventory_item, inventory_refund, inventory_transaction,
        inventory_transaction::ACTION_CHECKOUT, student_holding,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Editable fields of an item or folder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemDetails {
    /// Display name
    pub name: String,
    /// Free-form category
    pub category: String,
    /// Optional description
    pub description: Option<String>,
    /// Optional size label
    pub size: Option<String>,
    /// Containing folder
    pub parent_id: Option<i64>,
    /// Stock per level
    pub stock: BTreeMap<String, i64>,
    /// Unit price per level
    pub prices: BTreeMap<String, f64>,
}

/// What a checkout wrote.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutReceipt {
    /// The new transaction
    pub transaction: inventory_transaction::Model,
    /// The created or incremented open holding
    pub holding: student_holding::Model,
    /// Stock left at the level
    pub remaining_stock: i64,
}

/// What a return wrote.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnReceipt {
    /// The transaction, now returned
    pub transaction: inventory_transaction::Model,
    /// The open holding after the decrement, if one was found
    pub holding: Option<student_holding::Model>,
    /// Refund logged because the checkout had been paid
    pub refund: Option<inventory_refund::Model>,
}

/// What a holding retraction did.
#[derive(Clone, Debug, PartialEq)]
pub struct HoldingRetraction {
    /// Quantity put back into stock (zero when already returned)
    pub restored: i64,
    /// One refund per paid checkout that was still outstanding
    pub refunds: Vec<inventory_refund::Model>,
}

fn validate_details(details: &ItemDetails) -> Result<()> {
    if details.name.trim().is_empty() {
        return Err(Error::validation("Item name cannot be empty"));
    }
    if let Some((level, count)) = details.stock.iter().find(|(_, count)| **count < 0) {
        return Err(Error::validation(format!(
            "Stock for level '{level}' cannot be negative ({count})"
        )));
    }
    if let Some((_, price)) = details
        .prices
        .iter()
        .find(|(_, price)| !price.is_finite() || **price < 0.0)
    {
        return Err(Error::InvalidAmount { amount: *price });
    }
    Ok(())
}

async fn require_node<C>(db: &C, item_id: i64) -> Result<inventory_item::Model>
where
    C: ConnectionTrait,
{
    InventoryItem::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("inventory item", item_id))
}

async fn require_folder_parent<C>(db: &C, parent_id: Option<i64>) -> Result<()>
where
    C: ConnectionTrait,
{
    if let Some(parent_id) = parent_id {
        let parent = require_node(db, parent_id).await?;
        if !parent.is_folder {
            return Err(Error::validation(format!(
                "'{}' is not a folder",
                parent.name
            )));
        }
    }
    Ok(())
}

/// Creates an empty folder.
#[instrument(skip(db))]
pub async fn create_folder<C>(
    db: &C,
    name: &str,
    parent_id: Option<i64>,
) -> Result<inventory_item::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::validation("Folder name cannot be empty"));
    }
    require_folder_parent(db, parent_id).await?;

    let folder = inventory_item::ActiveModel {
        name: Set(name.trim().to_string()),
        category: Set(String::new()),
        description: Set(None),
        size: Set(None),
        is_folder: Set(true),
        parent_id: Set(parent_id),
        stock: Set(LevelStock::default()),
        prices: Set(LevelPrices::default()),
        ..Default::default()
    };
    Ok(folder.insert(db).await?)
}

/// Creates a stocked item.
#[instrument(skip(db, details), fields(name = %details.name))]
pub async fn create_item<C>(db: &C, details: ItemDetails) -> Result<inventory_item::Model>
where
    C: ConnectionTrait,
{
    validate_details(&details)?;
    require_folder_parent(db, details.parent_id).await?;

    let item = inventory_item::ActiveModel {
        name: Set(details.name.trim().to_string()),
        category: Set(details.category),
        description: Set(details.description),
        size: Set(details.size),
        is_folder: Set(false),
        parent_id: Set(details.parent_id),
        stock: Set(LevelStock(details.stock)),
        prices: Set(LevelPrices(details.prices)),
        ..Default::default()
    };
    Ok(item.insert(db).await?)
}

/// Replaces an item's editable fields.
#[instrument(skip(db, details))]
pub async fn update_item<C>(
    db: &C,
    item_id: i64,
    details: ItemDetails,
) -> Result<inventory_item::Model>
where
    C: ConnectionTrait,
{
    validate_details(&details)?;
    let existing = require_node(db, item_id).await?;
    if details.parent_id == Some(item_id) {
        return Err(Error::validation("An item cannot be its own parent"));
    }
    require_folder_parent(db, details.parent_id).await?;

    let mut active_model: inventory_item::ActiveModel = existing.into();
    active_model.name = Set(details.name.trim().to_string());
    active_model.category = Set(details.category);
    active_model.description = Set(details.description);
    active_model.size = Set(details.size);
    active_model.parent_id = Set(details.parent_id);
    active_model.stock = Set(LevelStock(details.stock));
    active_model.prices = Set(LevelPrices(details.prices));
    Ok(active_model.update(db).await?)
}

/// Deletes an item. Past transactions and holdings keep their snapshots.
#[instrument(skip(db))]
pub async fn delete_item<C>(db: &C, item_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let item = require_node(db, item_id).await?;
    if item.is_folder {
        return Err(Error::validation(format!(
            "'{}' is a folder; delete it as a folder",
            item.name
        )));
    }
    item.delete(db).await?;
    info!("Deleted inventory item {item_id}");
    Ok(())
}

/// Deletes a folder that no item or folder references as its parent.
#[instrument(skip(db))]
pub async fn delete_folder<C>(db: &C, folder_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let folder = require_node(db, folder_id).await?;
    if !folder.is_folder {
        return Err(Error::validation(format!("'{}' is not a folder", folder.name)));
    }

    let children = InventoryItem::find()
        .filter(inventory_item::Column::ParentId.eq(folder_id))
        .count(db)
        .await?;
    if children > 0 {
        return Err(Error::NotEmpty {
            name: folder.name,
            children,
        });
    }

    folder.delete(db).await?;
    info!("Deleted inventory folder {folder_id}");
    Ok(())
}

/// Every item and folder, ordered by name. Tree shaping happens client side.
pub async fn list_inventory<C>(db: &C) -> Result<Vec<inventory_item::Model>>
where
    C: ConnectionTrait,
{
    InventoryItem::find()
        .order_by_asc(inventory_item::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Direct children of `parent` (root when `None`), folders first then by name.
#[must_use]
pub fn children_of(
    items: &[inventory_item::Model],
    parent: Option<i64>,
) -> Vec<&inventory_item::Model> {
    let mut children: Vec<_> = items.iter().filter(|i| i.parent_id == parent).collect();
    children.sort_by(|a, b| b.is_folder.cmp(&a.is_folder).then_with(|| a.name.cmp(&b.name)));
    children
}

async fn find_open_holding<C>(
    db: &C,
    student_id: i64,
    item_id: i64,
    level: &str,
) -> Result<Option<student_holding::Model>>
where
    C: ConnectionTrait,
{
    StudentHolding::find()
        .filter(student_holding::Column::StudentId.eq(student_id))
        .filter(student_holding::Column::ItemId.eq(item_id))
        .filter(student_holding::Column::Level.eq(level))
        .filter(student_holding::Column::Returned.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn adjust_stock<C>(db: &C, item: inventory_item::Model, level: &str, delta: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    let mut stock = item.stock.clone();
    let updated = stock.at(level) + delta;
    stock.0.insert(level.to_string(), updated);

    let mut active_model: inventory_item::ActiveModel = item.into();
    active_model.stock = Set(stock);
    active_model.update(db).await?;
    Ok(updated)
}

async fn log_refund<C>(
    db: &C,
    transaction: &inventory_transaction::Model,
    quantity: i64,
) -> Result<inventory_refund::Model>
where
    C: ConnectionTrait,
{
    #[allow(clippy::cast_precision_loss)]
    let amount = transaction.unit_price * quantity as f64;
    let refund = inventory_refund::ActiveModel {
        term_id: Set(transaction.term_id),
        transaction_id: Set(transaction.id),
        item_id: Set(transaction.item_id),
        student_id: Set(transaction.student_id),
        level: Set(transaction.level.clone()),
        quantity: Set(quantity),
        amount: Set(amount),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let refund = refund.insert(db).await?;
    info!(
        "Refunded {:.2} to student {} for transaction {}",
        amount, transaction.student_id, transaction.id
    );
    Ok(refund)
}

/// Checks `quantity` of an item at `level` out to a student.
///
/// Free items (unit price 0) are paid on creation.
///
/// # Errors
/// - `Validation` for a non-positive quantity, a blank level, or a folder
/// - `NotFound` for a missing item or student
/// - `InsufficientStock` when the level holds less than `quantity`
#[instrument(skip(db, term))]
pub async fn check_out(
    db: &DatabaseConnection,
    term: &TermContext,
    item_id: i64,
    level: &str,
    quantity: i64,
    student_id: i64,
) -> Result<CheckoutReceipt> {
    if quantity <= 0 {
        return Err(Error::validation(format!(
            "Quantity must be positive (got {quantity})"
        )));
    }
    if level.trim().is_empty() {
        return Err(Error::validation("Level cannot be empty"));
    }

    let txn = db.begin().await?;

    let item = require_node(&txn, item_id).await?;
    if item.is_folder {
        return Err(Error::validation(format!(
            "'{}' is a folder and cannot be checked out",
            item.name
        )));
    }
    directory::require_person(&txn, Population::Student, student_id).await?;

    let available = item.stock.at(level);
    if quantity > available {
        return Err(Error::InsufficientStock {
            item: item.name,
            level: level.to_string(),
            requested: quantity,
            available,
        });
    }

    let unit_price = item.prices.at(level);
    let item_name = item.name.clone();
    let remaining_stock = adjust_stock(&txn, item, level, -quantity).await?;

    let now = Utc::now();
    let paid = unit_price <= 0.0;
    let transaction = inventory_transaction::ActiveModel {
        term_id: Set(term.id),
        item_id: Set(item_id),
        item_name: Set(item_name.clone()),
        level: Set(level.to_string()),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        student_id: Set(student_id),
        action: Set(ACTION_CHECKOUT.to_string()),
        created_at: Set(now),
        returned: Set(false),
        paid: Set(paid),
        refunded: Set(false),
        paid_at: Set(paid.then_some(now)),
        returned_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let holding = match find_open_holding(&txn, student_id, item_id, level).await? {
        Some(open) => {
            let aggregated = open.quantity + quantity;
            let mut active_model: student_holding::ActiveModel = open.into();
            active_model.quantity = Set(aggregated);
            active_model.updated_at = Set(now);
            active_model.update(&txn).await?
        }
        None => {
            student_holding::ActiveModel {
                term_id: Set(term.id),
                student_id: Set(student_id),
                item_id: Set(item_id),
                item_name: Set(item_name),
                level: Set(level.to_string()),
                quantity: Set(quantity),
                paid: Set(paid),
                refunded: Set(false),
                returned: Set(false),
                transaction_id: Set(transaction.id),
                paid_at: Set(paid.then_some(now)),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;

    info!(
        "Checked out {quantity} x {} ({level}) to student {student_id}, {remaining_stock} left",
        transaction.item_name
    );
    Ok(CheckoutReceipt {
        transaction,
        holding,
        remaining_stock,
    })
}

/// Marks a checkout paid and mirrors it onto the open holding.
///
/// Already-paid checkouts are returned unchanged; returned ones are rejected.
#[instrument(skip(db))]
pub async fn mark_paid(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<inventory_transaction::Model> {
    let txn = db.begin().await?;

    let transaction = InventoryTransaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("inventory transaction", transaction_id))?;
    if transaction.paid {
        return Ok(transaction);
    }
    if transaction.returned {
        return Err(Error::validation(format!(
            "Transaction {transaction_id} was already returned"
        )));
    }

    let now = Utc::now();
    let open = find_open_holding(
        &txn,
        transaction.student_id,
        transaction.item_id,
        &transaction.level,
    )
    .await?;

    let mut active_model: inventory_transaction::ActiveModel = transaction.into();
    active_model.paid = Set(true);
    active_model.paid_at = Set(Some(now));
    let transaction = active_model.update(&txn).await?;

    if let Some(open) = open {
        let mut holding: student_holding::ActiveModel = open.into();
        holding.paid = Set(true);
        holding.paid_at = Set(Some(now));
        holding.updated_at = Set(now);
        holding.update(&txn).await?;
    }

    txn.commit().await?;
    info!("Marked inventory transaction {transaction_id} paid");
    Ok(transaction)
}

/// Returns a checkout: restores stock, shrinks the open holding and refunds a paid
/// checkout.
///
/// Returning an already-returned checkout is a silent no-op (`Ok(None)`).
#[instrument(skip(db))]
pub async fn return_item(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<ReturnReceipt>> {
    let txn = db.begin().await?;

    let transaction = InventoryTransaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("inventory transaction", transaction_id))?;
    if transaction.returned {
        return Ok(None);
    }

    let now = Utc::now();

    match InventoryItem::find_by_id(transaction.item_id).one(&txn).await? {
        Some(item) => {
            adjust_stock(&txn, item, &transaction.level, transaction.quantity).await?;
        }
        None => warn!(
            "Item {} no longer exists; stock for transaction {transaction_id} not restored",
            transaction.item_id
        ),
    }

    let refund = if transaction.paid {
        Some(log_refund(&txn, &transaction, transaction.quantity).await?)
    } else {
        None
    };

    let open = find_open_holding(
        &txn,
        transaction.student_id,
        transaction.item_id,
        &transaction.level,
    )
    .await?;
    let holding = match open {
        Some(open) => {
            let left = open.quantity - transaction.quantity;
            let mut active_model: student_holding::ActiveModel = open.into();
            if left <= 0 {
                active_model.returned = Set(true);
            } else {
                active_model.quantity = Set(left);
            }
            if refund.is_some() {
                active_model.refunded = Set(true);
                active_model.paid = Set(false);
            }
            active_model.updated_at = Set(now);
            Some(active_model.update(&txn).await?)
        }
        None => None,
    };

    let refunded = refund.is_some();
    let mut active_model: inventory_transaction::ActiveModel = transaction.into();
    active_model.returned = Set(true);
    active_model.returned_at = Set(Some(now));
    if refunded {
        active_model.refunded = Set(true);
    }
    let transaction = active_model.update(&txn).await?;

    txn.commit().await?;
    info!("Returned inventory transaction {transaction_id}");
    Ok(Some(ReturnReceipt {
        transaction,
        holding,
        refund,
    }))
}

/// Retracts a holding and every checkout it aggregates.
///
/// Each outstanding checkout of the holding's (student, item, level) puts its own
/// quantity back into stock and, when paid, logs a refund at its own unit price.
/// Those checkouts, the originating transaction and the holding are then deleted.
/// A holding that was already returned has no outstanding checkouts, so only the
/// records are removed.
///
/// The steps run one after another without a surrounding transaction; a failure
/// part way leaves the earlier steps applied.
#[instrument(skip(db))]
pub async fn delete_holding(db: &DatabaseConnection, holding_id: i64) -> Result<HoldingRetraction> {
    let holding = StudentHolding::find_by_id(holding_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("student holding", holding_id))?;

    let outstanding = if holding.returned {
        Vec::new()
    } else {
        InventoryTransaction::find()
            .filter(inventory_transaction::Column::StudentId.eq(holding.student_id))
            .filter(inventory_transaction::Column::ItemId.eq(holding.item_id))
            .filter(inventory_transaction::Column::Level.eq(holding.level.as_str()))
            .filter(inventory_transaction::Column::Returned.eq(false))
            .order_by_asc(inventory_transaction::Column::Id)
            .all(db)
            .await?
    };

    let mut restored = 0;
    let mut refunds = Vec::new();
    for checkout in &outstanding {
        match InventoryItem::find_by_id(checkout.item_id).one(db).await? {
            Some(item) => {
                adjust_stock(db, item, &checkout.level, checkout.quantity).await?;
                restored += checkout.quantity;
            }
            None => warn!(
                "Item {} no longer exists; stock for transaction {} not restored",
                checkout.item_id, checkout.id
            ),
        }
        if checkout.paid {
            refunds.push(log_refund(db, checkout, checkout.quantity).await?);
        }
    }

    let mut deleted = 0;
    for checkout in outstanding {
        if checkout.id == holding.transaction_id {
            continue;
        }
        checkout.delete(db).await?;
        deleted += 1;
    }
    if let Some(origin) = InventoryTransaction::find_by_id(holding.transaction_id)
        .one(db)
        .await?
    {
        origin.delete(db).await?;
        deleted += 1;
    }
    holding.delete(db).await?;

    info!("Retracted holding {holding_id}: restored {restored}, deleted {deleted} checkouts");
    Ok(HoldingRetraction { restored, refunds })
}

/// All holdings of a student, open and returned.
pub async fn holdings_for_student<C>(db: &C, student_id: i64) -> Result<Vec<student_holding::Model>>
where
    C: ConnectionTrait,
{
    StudentHolding::find()
        .filter(student_holding::Column::StudentId.eq(student_id))
        .order_by_asc(student_holding::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every holding not yet fully returned.
pub async fn open_holdings<C>(db: &C) -> Result<Vec<student_holding::Model>>
where
    C: ConnectionTrait,
{
    StudentHolding::find()
        .filter(student_holding::Column::Returned.eq(false))
        .order_by_asc(student_holding::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Checkouts recorded in a term.
pub async fn transactions_for_term<C>(
    db: &C,
    term_id: i64,
) -> Result<Vec<inventory_transaction::Model>>
where
    C: ConnectionTrait,
{
    InventoryTransaction::find()
        .filter(inventory_transaction::Column::TermId.eq(term_id))
        .order_by_asc(inventory_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Refunds booked against a term.
pub async fn refunds_for_term<C>(db: &C, term_id: i64) -> Result<Vec<inventory_refund::Model>>
where
    C: ConnectionTrait,
{
    InventoryRefund::find()
        .filter(inventory_refund::Column::TermId.eq(term_id))
        .order_by_asc(inventory_refund::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    const LEVEL: &str = "JuniorBasic";

    async fn stock_of(db: &DatabaseConnection, item_id: i64) -> Result<i64> {
        Ok(require_node(db, item_id).await?.stock.at(LEVEL))
    }

    #[tokio::test]
    async fn test_checkout_mark_paid_return_round_trip() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Sweater", LEVEL, 10, 500.0).await?;

        let receipt = check_out(&db, &term, item.id, LEVEL, 3, ada.id).await?;
        assert_eq!(receipt.remaining_stock, 7);
        assert_eq!(stock_of(&db, item.id).await?, 7);
        assert_eq!(receipt.holding.quantity, 3);
        assert!(!receipt.holding.paid);
        assert!(!receipt.transaction.paid);

        let paid = mark_paid(&db, receipt.transaction.id).await?;
        assert!(paid.paid);
        assert!(paid.paid_at.is_some());
        let holdings = holdings_for_student(&db, ada.id).await?;
        assert!(holdings[0].paid);

        let returned = return_item(&db, receipt.transaction.id)
            .await?
            .ok_or_else(|| Error::validation("expected a return receipt"))?;
        assert_eq!(stock_of(&db, item.id).await?, 10);
        assert!(returned.transaction.returned);
        assert!(returned.transaction.refunded);
        let refund = returned
            .refund
            .ok_or_else(|| Error::validation("expected a refund"))?;
        assert_eq!(refund.amount, 1500.0);

        let holding = returned
            .holding
            .ok_or_else(|| Error::validation("expected a holding"))?;
        assert!(holding.returned);
        assert!(holding.refunded);
        assert!(!holding.paid);
        assert!(open_holdings(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejected() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Tie", LEVEL, 2, 100.0).await?;

        let result = check_out(&db, &term, item.id, LEVEL, 3, ada.id).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            })
        ));

        // Unstocked level reads as zero
        let result = check_out(&db, &term, item.id, "Senior", 1, ada.id).await;
        assert!(matches!(result, Err(Error::InsufficientStock { available: 0, .. })));

        assert_eq!(stock_of(&db, item.id).await?, 2);
        assert!(transactions_for_term(&db, term.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_stock_never_negative() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Tie", LEVEL, 5, 100.0).await?;

        let mut successes = 0;
        for quantity in [2, 2, 2, 1, 1] {
            if check_out(&db, &term, item.id, LEVEL, quantity, ada.id).await.is_ok() {
                successes += 1;
            }
            assert!(stock_of(&db, item.id).await? >= 0);
        }
        assert_eq!(successes, 3);
        assert_eq!(stock_of(&db, item.id).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_checkout_validation() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Tie", LEVEL, 5, 100.0).await?;
        let folder = create_folder(&db, "Uniforms", None).await?;

        let result = check_out(&db, &term, item.id, LEVEL, 0, ada.id).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        let result = check_out(&db, &term, folder.id, LEVEL, 1, ada.id).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        let result = check_out(&db, &term, 999, LEVEL, 1, ada.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        let result = check_out(&db, &term, item.id, LEVEL, 1, 999).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert_eq!(stock_of(&db, item.id).await?, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_free_items_are_paid_and_not_refunded() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Handbook", LEVEL, 4, 0.0).await?;

        let receipt = check_out(&db, &term, item.id, LEVEL, 1, ada.id).await?;
        assert!(receipt.transaction.paid);
        assert!(receipt.holding.paid);

        let returned = return_item(&db, receipt.transaction.id)
            .await?
            .ok_or_else(|| Error::validation("expected a return receipt"))?;
        // Paid at zero price still logs a zero refund
        assert_eq!(returned.refund.map(|r| r.amount), Some(0.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_repeat_checkouts_aggregate_into_one_holding() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Socks", LEVEL, 10, 200.0).await?;

        let first = check_out(&db, &term, item.id, LEVEL, 2, ada.id).await?;
        let second = check_out(&db, &term, item.id, LEVEL, 3, ada.id).await?;
        assert_eq!(first.holding.id, second.holding.id);
        assert_eq!(second.holding.quantity, 5);
        assert_eq!(second.holding.transaction_id, first.transaction.id);

        // Partial return only reduces the quantity
        let partial = return_item(&db, first.transaction.id)
            .await?
            .ok_or_else(|| Error::validation("expected a return receipt"))?;
        let holding = partial
            .holding
            .ok_or_else(|| Error::validation("expected a holding"))?;
        assert_eq!(holding.quantity, 3);
        assert!(!holding.returned);
        assert!(partial.refund.is_none());

        return_item(&db, second.transaction.id).await?;
        let holdings = holdings_for_student(&db, ada.id).await?;
        assert_eq!(holdings.len(), 1);
        assert!(holdings[0].returned);
        assert_eq!(stock_of(&db, item.id).await?, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_return_is_silent_noop() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Socks", LEVEL, 10, 200.0).await?;
        let receipt = check_out(&db, &term, item.id, LEVEL, 2, ada.id).await?;
        mark_paid(&db, receipt.transaction.id).await?;

        assert!(return_item(&db, receipt.transaction.id).await?.is_some());
        assert!(return_item(&db, receipt.transaction.id).await?.is_none());

        assert_eq!(stock_of(&db, item.id).await?, 10);
        assert_eq!(refunds_for_term(&db, term.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_holding_restores_and_refunds() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Blazer", LEVEL, 6, 4000.0).await?;
        let receipt = check_out(&db, &term, item.id, LEVEL, 2, ada.id).await?;
        mark_paid(&db, receipt.transaction.id).await?;

        let retraction = delete_holding(&db, receipt.holding.id).await?;
        assert_eq!(retraction.restored, 2);
        let amounts: Vec<_> = retraction.refunds.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![8000.0]);
        assert_eq!(stock_of(&db, item.id).await?, 6);
        assert!(holdings_for_student(&db, ada.id).await?.is_empty());
        assert!(transactions_for_term(&db, term.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_returned_holding_books_nothing_twice() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Blazer", LEVEL, 6, 4000.0).await?;
        let receipt = check_out(&db, &term, item.id, LEVEL, 1, ada.id).await?;
        mark_paid(&db, receipt.transaction.id).await?;
        return_item(&db, receipt.transaction.id).await?;

        let retraction = delete_holding(&db, receipt.holding.id).await?;
        assert_eq!(retraction.restored, 0);
        assert!(retraction.refunds.is_empty());
        assert_eq!(stock_of(&db, item.id).await?, 6);
        assert_eq!(refunds_for_term(&db, term.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_aggregated_holding_retracts_every_checkout() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Socks", LEVEL, 10, 200.0).await?;
        let first = check_out(&db, &term, item.id, LEVEL, 2, ada.id).await?;
        let second = check_out(&db, &term, item.id, LEVEL, 3, ada.id).await?;
        assert_eq!(first.holding.id, second.holding.id);
        assert_eq!(stock_of(&db, item.id).await?, 5);

        let retraction = delete_holding(&db, first.holding.id).await?;
        assert_eq!(retraction.restored, 5);
        assert!(retraction.refunds.is_empty());
        assert_eq!(stock_of(&db, item.id).await?, 10);
        assert!(transactions_for_term(&db, term.id).await?.is_empty());

        // Nothing is left to return, so stock cannot be restored twice
        assert!(matches!(
            return_item(&db, second.transaction.id).await,
            Err(Error::NotFound { .. })
        ));
        assert_eq!(stock_of(&db, item.id).await?, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_holding_refunds_only_paid_checkouts() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Socks", LEVEL, 10, 200.0).await?;
        let unpaid = check_out(&db, &term, item.id, LEVEL, 2, ada.id).await?;
        let paid = check_out(&db, &term, item.id, LEVEL, 3, ada.id).await?;
        mark_paid(&db, paid.transaction.id).await?;

        let retraction = delete_holding(&db, unpaid.holding.id).await?;
        assert_eq!(retraction.restored, 5);
        assert_eq!(retraction.refunds.len(), 1);
        assert_eq!(retraction.refunds[0].amount, 600.0);
        assert_eq!(retraction.refunds[0].transaction_id, paid.transaction.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_holding_failure_keeps_earlier_steps() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Blazer", LEVEL, 6, 4000.0).await?;
        let receipt = check_out(&db, &term, item.id, LEVEL, 2, ada.id).await?;
        mark_paid(&db, receipt.transaction.id).await?;

        db.execute_unprepared(
            "CREATE TRIGGER refunds_locked BEFORE INSERT ON inventory_refunds \
             BEGIN SELECT RAISE(ABORT, 'refunds locked'); END;",
        )
        .await?;

        let result = delete_holding(&db, receipt.holding.id).await;
        assert!(matches!(result, Err(Error::Database(_))));

        // Stock came back before the refund step failed; nothing was deleted
        assert_eq!(stock_of(&db, item.id).await?, 6);
        assert!(refunds_for_term(&db, term.id).await?.is_empty());
        assert_eq!(holdings_for_student(&db, ada.id).await?.len(), 1);
        assert_eq!(transactions_for_term(&db, term.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_folder_deletion_guard() -> Result<()> {
        let db = setup_test_db().await?;
        let folder = create_folder(&db, "Uniforms", None).await?;
        let item = create_item(
            &db,
            ItemDetails {
                name: "Sweater".to_string(),
                category: "uniform".to_string(),
                parent_id: Some(folder.id),
                ..Default::default()
            },
        )
        .await?;

        let result = delete_folder(&db, folder.id).await;
        assert!(matches!(result, Err(Error::NotEmpty { children: 1, .. })));

        delete_item(&db, item.id).await?;
        delete_folder(&db, folder.id).await?;
        assert!(list_inventory(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_nested_folder_blocks_deletion() -> Result<()> {
        let db = setup_test_db().await?;
        let outer = create_folder(&db, "Store", None).await?;
        let inner = create_folder(&db, "Books", Some(outer.id)).await?;

        assert!(matches!(
            delete_folder(&db, outer.id).await,
            Err(Error::NotEmpty { .. })
        ));
        assert!(matches!(
            delete_item(&db, inner.id).await,
            Err(Error::Validation { .. })
        ));
        delete_folder(&db, inner.id).await?;
        delete_folder(&db, outer.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_item_tree_and_updates() -> Result<()> {
        let db = setup_test_db().await?;
        let folder = create_folder(&db, "Uniforms", None).await?;
        let loose = create_test_item(&db, "Atlas", LEVEL, 1, 10.0).await?;
        let mut details = ItemDetails {
            name: "Tie".to_string(),
            category: "uniform".to_string(),
            parent_id: Some(folder.id),
            ..Default::default()
        };
        details.stock.insert(LEVEL.to_string(), 3);
        let tie = create_item(&db, details.clone()).await?;

        let all = list_inventory(&db).await?;
        let root: Vec<_> = children_of(&all, None).iter().map(|i| i.id).collect();
        assert_eq!(root, vec![folder.id, loose.id]);
        assert_eq!(children_of(&all, Some(folder.id)).len(), 1);

        details.stock.insert(LEVEL.to_string(), 9);
        details.size = Some("M".to_string());
        let updated = update_item(&db, tie.id, details.clone()).await?;
        assert_eq!(updated.stock.at(LEVEL), 9);
        assert_eq!(updated.size.as_deref(), Some("M"));

        details.stock.insert(LEVEL.to_string(), -1);
        assert!(matches!(
            update_item(&db, tie.id, details.clone()).await,
            Err(Error::Validation { .. })
        ));

        details.stock.insert(LEVEL.to_string(), 1);
        details.parent_id = Some(loose.id);
        assert!(matches!(
            update_item(&db, tie.id, details).await,
            Err(Error::Validation { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_item_keeps_history() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let item = create_test_item(&db, "Cap", LEVEL, 3, 50.0).await?;
        let receipt = check_out(&db, &term, item.id, LEVEL, 1, ada.id).await?;

        delete_item(&db, item.id).await?;
        let history = transactions_for_term(&db, term.id).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].item_name, "Cap");

        // Returning after the item is gone still closes the transaction
        let returned = return_item(&db, receipt.transaction.id).await?;
        assert!(returned.is_some());
        Ok(())
    }
}
