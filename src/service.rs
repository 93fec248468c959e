//! Ledger service - the shared handle front ends hold.
//!
//! Wraps the database connection together with the [`ChangeFeed`]. Every write
//! method calls the matching `core` function and, when it succeeds, publishes the
//! collections it touched so live subscriptions reload.

use crate::{
    config::Section,
    core::{
        attendance::{self, BulkMarkSummary, MarkOutcome},
        directory, expense,
        feed::{ChangeFeed, Collection, Subscription},
        fees::{self, FeeSchedule},
        inventory::{self, CheckoutReceipt, HoldingRetraction, ItemDetails, ReturnReceipt},
        rollover::{self, RolloverOutcome},
        term::TermContext,
    },
    entities::{
        AttendanceStatus, Population, expense as expense_entity, inventory_item,
        inventory_transaction, payment, person,
    },
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

/// Database connection plus change notifications.
#[derive(Clone, Debug)]
pub struct Ledger {
    db: DatabaseConnection,
    feed: ChangeFeed,
}

impl Ledger {
    /// Creates a ledger with a fresh feed.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_feed(db, ChangeFeed::default())
    }

    /// Creates a ledger publishing into an existing feed.
    #[must_use]
    pub const fn with_feed(db: DatabaseConnection, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    /// The underlying connection, for reads
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Watches one collection for changes made through this ledger.
    #[must_use]
    pub fn subscribe(&self, collection: Collection) -> Subscription {
        self.feed.subscribe(collection)
    }

    fn published<T>(&self, result: Result<T>, collections: &[Collection]) -> Result<T> {
        if result.is_ok() {
            for collection in collections {
                self.feed.publish(*collection);
            }
        }
        result
    }

    /// See [`attendance::mark_status`].
    pub async fn mark_status(
        &self,
        term: &TermContext,
        population: Population,
        person_id: i64,
        status: AttendanceStatus,
        date: NaiveDate,
    ) -> Result<MarkOutcome> {
        let result =
            attendance::mark_status(&self.db, term, population, person_id, status, date).await;
        self.published(result, &[Collection::Attendance])
    }

    /// See [`attendance::mark_all_in_population`]. A failure part way still leaves
    /// counter writes behind, so subscribers are told either way.
    pub async fn mark_all_in_population(
        &self,
        term: &TermContext,
        population: Population,
        section: &Section,
        status: AttendanceStatus,
        date: NaiveDate,
    ) -> Result<BulkMarkSummary> {
        let result = attendance::mark_all_in_population(
            &self.db, term, population, section, status, date,
        )
        .await;
        self.feed.publish(Collection::Attendance);
        result
    }

    /// See [`directory::create_person`].
    pub async fn create_person(
        &self,
        population: Population,
        name: &str,
        class_name: &str,
    ) -> Result<person::Model> {
        let result = directory::create_person(&self.db, population, name, class_name).await;
        self.published(result, &[Collection::Directory])
    }

    /// See [`directory::update_person`].
    pub async fn update_person(
        &self,
        person_id: i64,
        name: &str,
        class_name: &str,
    ) -> Result<person::Model> {
        let result = directory::update_person(&self.db, person_id, name, class_name).await;
        self.published(result, &[Collection::Directory])
    }

    /// See [`directory::delete_person`].
    pub async fn delete_person(&self, person_id: i64) -> Result<usize> {
        let result = directory::delete_person(&self.db, person_id).await;
        self.published(result, &[Collection::Directory, Collection::Attendance])
    }

    /// See [`fees::add_payment`].
    pub async fn add_payment(
        &self,
        schedule: &FeeSchedule,
        term: &TermContext,
        student_id: i64,
        amount: f64,
    ) -> Result<payment::Model> {
        let result = fees::add_payment(&self.db, schedule, term, student_id, amount).await;
        self.published(result, &[Collection::Payments])
    }

    /// See [`fees::delete_payment`].
    pub async fn delete_payment(&self, payment_id: i64) -> Result<()> {
        let result = fees::delete_payment(&self.db, payment_id).await;
        self.published(result, &[Collection::Payments])
    }

    /// See [`inventory::create_folder`].
    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<inventory_item::Model> {
        let result = inventory::create_folder(&self.db, name, parent_id).await;
        self.published(result, &[Collection::Inventory])
    }

    /// See [`inventory::create_item`].
    pub async fn create_item(&self, details: ItemDetails) -> Result<inventory_item::Model> {
        let result = inventory::create_item(&self.db, details).await;
        self.published(result, &[Collection::Inventory])
    }

    /// See [`inventory::update_item`].
    pub async fn update_item(
        &self,
        item_id: i64,
        details: ItemDetails,
    ) -> Result<inventory_item::Model> {
        let result = inventory::update_item(&self.db, item_id, details).await;
        self.published(result, &[Collection::Inventory])
    }

    /// See [`inventory::delete_item`].
    pub async fn delete_item(&self, item_id: i64) -> Result<()> {
        let result = inventory::delete_item(&self.db, item_id).await;
        self.published(result, &[Collection::Inventory])
    }

    /// See [`inventory::delete_folder`].
    pub async fn delete_folder(&self, folder_id: i64) -> Result<()> {
        let result = inventory::delete_folder(&self.db, folder_id).await;
        self.published(result, &[Collection::Inventory])
    }

    /// See [`inventory::check_out`].
    pub async fn check_out(
        &self,
        term: &TermContext,
        item_id: i64,
        level: &str,
        quantity: i64,
        student_id: i64,
    ) -> Result<CheckoutReceipt> {
        let result =
            inventory::check_out(&self.db, term, item_id, level, quantity, student_id).await;
        self.published(result, &[Collection::Inventory])
    }

    /// See [`inventory::mark_paid`].
    pub async fn mark_paid(&self, transaction_id: i64) -> Result<inventory_transaction::Model> {
        let result = inventory::mark_paid(&self.db, transaction_id).await;
        self.published(result, &[Collection::Inventory])
    }

    /// See [`inventory::return_item`].
    pub async fn return_item(&self, transaction_id: i64) -> Result<Option<ReturnReceipt>> {
        let result = inventory::return_item(&self.db, transaction_id).await;
        match result {
            Ok(None) => Ok(None),
            other => self.published(other, &[Collection::Inventory]),
        }
    }

    /// See [`inventory::delete_holding`]. Published even on failure since earlier
    /// steps may have been applied.
    pub async fn delete_holding(&self, holding_id: i64) -> Result<HoldingRetraction> {
        let result = inventory::delete_holding(&self.db, holding_id).await;
        self.feed.publish(Collection::Inventory);
        result
    }

    /// See [`expense::add_expense`].
    pub async fn add_expense(
        &self,
        term: &TermContext,
        input: expense::NewExpense,
    ) -> Result<expense_entity::Model> {
        let result = expense::add_expense(&self.db, term, input).await;
        self.published(result, &[Collection::Expenses])
    }

    /// See [`expense::update_expense`].
    pub async fn update_expense(
        &self,
        expense_id: i64,
        input: expense::NewExpense,
    ) -> Result<expense_entity::Model> {
        let result = expense::update_expense(&self.db, expense_id, input).await;
        self.published(result, &[Collection::Expenses])
    }

    /// See [`expense::delete_expense`].
    pub async fn delete_expense(&self, expense_id: i64) -> Result<()> {
        let result = expense::delete_expense(&self.db, expense_id).await;
        self.published(result, &[Collection::Expenses])
    }

    /// See [`rollover::close_and_start_new`].
    pub async fn close_and_start_new(&self, new_term_name: &str) -> Result<RolloverOutcome> {
        let result = rollover::close_and_start_new(&self.db, new_term_name).await;
        self.published(result, &[Collection::Terms])
    }

    /// See [`rollover::resume_rollover`].
    pub async fn resume_rollover(&self, fallback_name: &str) -> Result<Option<TermContext>> {
        let result = rollover::resume_rollover(&self.db, fallback_name).await;
        match result {
            Ok(None) => Ok(None),
            other => self.published(other, &[Collection::Terms]),
        }
    }
}
