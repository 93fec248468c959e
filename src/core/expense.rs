//! Expense ledger - dated expense lines booked against a term.

use super::{DateRange, term::TermContext};
use crate::{
    entities::{Expense, expense},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Input for a new or edited expense line.
#[derive(Clone, Debug, PartialEq)]
pub struct NewExpense {
    /// What was bought
    pub name: String,
    /// Reporting category
    pub category: String,
    /// Optional notes
    pub description: Option<String>,
    /// Units bought; negative values are stored as zero
    pub quantity: f64,
    /// Price per unit; negative values are stored as zero
    pub unit_price: f64,
    /// Replaces `quantity * unit_price` when set
    pub total_override: Option<f64>,
    /// Day of the expense
    pub spent_on: NaiveDate,
}

/// Clamped quantity, unit price and total of an expense line.
fn clamped_amounts(input: &NewExpense) -> Result<(f64, f64, f64)> {
    for amount in [Some(input.quantity), Some(input.unit_price), input.total_override]
        .into_iter()
        .flatten()
    {
        if !amount.is_finite() {
            return Err(Error::InvalidAmount { amount });
        }
    }

    let quantity = input.quantity.max(0.0);
    let unit_price = input.unit_price.max(0.0);
    let total = input
        .total_override
        .unwrap_or(quantity * unit_price)
        .max(0.0);
    Ok((quantity, unit_price, total))
}

/// Books an expense against `term`.
#[instrument(skip(db, term, input), fields(term = term.id, name = %input.name))]
pub async fn add_expense<C>(db: &C, term: &TermContext, input: NewExpense) -> Result<expense::Model>
where
    C: ConnectionTrait,
{
    if input.name.trim().is_empty() {
        return Err(Error::validation("Expense name cannot be empty"));
    }
    let (quantity, unit_price, total) = clamped_amounts(&input)?;

    let model = expense::ActiveModel {
        term_id: Set(term.id),
        name: Set(input.name.trim().to_string()),
        category: Set(input.category),
        description: Set(input.description),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        total: Set(total),
        spent_on: Set(input.spent_on),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let expense = model.insert(db).await?;
    info!("Recorded expense '{}' of {:.2}", expense.name, expense.total);
    Ok(expense)
}

/// Rewrites an expense line. The term it is booked against does not change.
#[instrument(skip(db, input))]
pub async fn update_expense<C>(db: &C, expense_id: i64, input: NewExpense) -> Result<expense::Model>
where
    C: ConnectionTrait,
{
    if input.name.trim().is_empty() {
        return Err(Error::validation("Expense name cannot be empty"));
    }
    let (quantity, unit_price, total) = clamped_amounts(&input)?;

    let existing = Expense::find_by_id(expense_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("expense", expense_id))?;

    let mut active_model: expense::ActiveModel = existing.into();
    active_model.name = Set(input.name.trim().to_string());
    active_model.category = Set(input.category);
    active_model.description = Set(input.description);
    active_model.quantity = Set(quantity);
    active_model.unit_price = Set(unit_price);
    active_model.total = Set(total);
    active_model.spent_on = Set(input.spent_on);
    Ok(active_model.update(db).await?)
}

/// Removes an expense line.
#[instrument(skip(db))]
pub async fn delete_expense<C>(db: &C, expense_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Expense::delete_by_id(expense_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("expense", expense_id));
    }
    Ok(())
}

/// Expense lines of a term, oldest day first.
pub async fn expenses_for_term<C>(db: &C, term_id: i64) -> Result<Vec<expense::Model>>
where
    C: ConnectionTrait,
{
    Expense::find()
        .filter(expense::Column::TermId.eq(term_id))
        .order_by_asc(expense::Column::SpentOn)
        .order_by_asc(expense::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sum of a term's expense totals, restricted to `window` when given.
pub async fn total_expenses<C>(db: &C, term_id: i64, window: Option<DateRange>) -> Result<f64>
where
    C: ConnectionTrait,
{
    let expenses = expenses_for_term(db, term_id).await?;
    Ok(expenses
        .iter()
        .filter(|e| window.is_none_or(|w| w.contains(e.spent_on)))
        .map(|e| e.total)
        .sum())
}

/// Totals per category, for reports.
#[must_use]
pub fn totals_by_category(expenses: &[expense::Model]) -> BTreeMap<String, f64> {
    expenses.iter().fold(BTreeMap::new(), |mut totals, e| {
        *totals.entry(e.category.clone()).or_insert(0.0) += e.total;
        totals
    })
}
