//! Term rollover - snapshot the closing term, close it and open the next one.
//!
//! The rollover is four separate writes (snapshot read, close, create, repoint)
//! with no surrounding transaction. A crash between them leaves either a closed
//! active term or a new term the pointer never reached; [`resume_rollover`] repairs
//! both.

use super::{
    attendance, directory, expense, fees, inventory,
    term::{self, TermContext},
};
use crate::{
    entities::{Population, Term, term as term_entity},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, prelude::*};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write;
use tracing::{info, instrument, warn};

/// Aggregate totals of one term, taken just before it is closed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TermSnapshot {
    /// Term the totals belong to
    pub term_id: i64,
    /// Its display name
    pub term_name: String,
    /// Sum of fee payments
    pub fees_income: f64,
    /// Value of paid checkouts
    pub inventory_income: f64,
    /// Refunds booked against the term
    pub inventory_refunds: f64,
    /// Sum of expense totals
    pub total_expenses: f64,
    /// Student day records created in the term
    pub student_attendance_days: u64,
    /// Teacher day records created in the term
    pub teacher_attendance_days: u64,
    /// Students on the roster
    pub student_count: u64,
    /// Teachers on the roster
    pub teacher_count: u64,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl TermSnapshot {
    /// Inventory income after refunds
    #[must_use]
    pub fn inventory_net(&self) -> f64 {
        self.inventory_income - self.inventory_refunds
    }

    /// Fees plus net inventory income, less expenses
    #[must_use]
    pub fn net_balance(&self) -> f64 {
        self.fees_income + self.inventory_net() - self.total_expenses
    }
}

/// Result of a completed rollover.
#[derive(Clone, Debug, PartialEq)]
pub struct RolloverOutcome {
    /// Totals of the closed term
    pub snapshot: TermSnapshot,
    /// The closed term
    pub closed: term_entity::Model,
    /// The newly active term
    pub opened: TermContext,
}

/// Sums the ledgers of `term`.
#[instrument(skip(db, term), fields(term = term.id))]
pub async fn compute_snapshot<C>(db: &C, term: &TermContext) -> Result<TermSnapshot>
where
    C: ConnectionTrait,
{
    let fees_income = fees::payments_for_term(db, term.id)
        .await?
        .iter()
        .map(|p| p.amount)
        .sum();

    let checkouts = inventory::transactions_for_term(db, term.id).await?;
    #[allow(clippy::cast_precision_loss)]
    let inventory_income = checkouts
        .iter()
        .filter(|t| t.paid)
        .map(|t| t.unit_price * t.quantity as f64)
        .sum();
    // A retracted checkout takes its income with it, so its refund is dropped too
    let surviving: HashSet<i64> = checkouts.iter().map(|t| t.id).collect();
    let inventory_refunds = inventory::refunds_for_term(db, term.id)
        .await?
        .iter()
        .filter(|r| surviving.contains(&r.transaction_id))
        .map(|r| r.amount)
        .sum();

    Ok(TermSnapshot {
        term_id: term.id,
        term_name: term.name.clone(),
        fees_income,
        inventory_income,
        inventory_refunds,
        total_expenses: expense::total_expenses(db, term.id, None).await?,
        student_attendance_days: attendance::count_days_in_term(db, Population::Student, term.id)
            .await?,
        teacher_attendance_days: attendance::count_days_in_term(db, Population::Teacher, term.id)
            .await?,
        student_count: directory::count_people(db, Population::Student).await?,
        teacher_count: directory::count_people(db, Population::Teacher).await?,
        taken_at: Utc::now(),
    })
}

/// Snapshots and closes the active term, opens `new_term_name` and points the
/// active term at it.
///
/// # Errors
/// - `Validation` for a blank name, or when the active term is already closed
///   (an earlier rollover was interrupted; run [`resume_rollover`])
/// - `NotFound` when there is no active term
#[instrument(skip(db))]
pub async fn close_and_start_new<C>(db: &C, new_term_name: &str) -> Result<RolloverOutcome>
where
    C: ConnectionTrait,
{
    if new_term_name.trim().is_empty() {
        return Err(Error::validation("Term name cannot be empty"));
    }

    let current = term::active_term(db).await?;
    if term::get_term(db, current.id)
        .await?
        .is_some_and(|t| t.closed)
    {
        return Err(Error::validation(format!(
            "Term '{}' is already closed; resume the interrupted rollover first",
            current.name
        )));
    }

    let snapshot = compute_snapshot(db, &current).await?;
    let closed = term::close_term(db, current.id).await?;
    let created = term::create_term(db, new_term_name).await?;
    term::set_active_term(db, created.id).await?;

    info!(
        "Rolled over from '{}' to '{}' (net balance {:.2})",
        closed.name,
        created.name,
        snapshot.net_balance()
    );
    Ok(RolloverOutcome {
        snapshot,
        closed,
        opened: TermContext::from(&created),
    })
}

/// Repairs an interrupted rollover.
///
/// When the pointer references a closed or missing term it is moved to the newest
/// open term created after it, or to a new term named `fallback_name` when there is
/// none. Returns the repointed term, or `None` when nothing needed fixing.
#[instrument(skip(db))]
pub async fn resume_rollover<C>(db: &C, fallback_name: &str) -> Result<Option<TermContext>>
where
    C: ConnectionTrait,
{
    let Some(pointer) = term::active_term_id(db).await? else {
        return Ok(None);
    };
    if term::get_term(db, pointer)
        .await?
        .is_some_and(|t| !t.closed)
    {
        return Ok(None);
    }

    warn!("Active term {pointer} is closed or missing; resuming rollover");
    let newer = Term::find()
        .filter(term_entity::Column::Closed.eq(false))
        .filter(term_entity::Column::Id.gt(pointer))
        .order_by_desc(term_entity::Column::Id)
        .one(db)
        .await?;
    let target = match newer {
        Some(open) => open,
        None => term::create_term(db, fallback_name).await?,
    };
    term::set_active_term(db, target.id).await?;

    info!("Active term resumed at '{}'", target.name);
    Ok(Some(TermContext::from(&target)))
}

/// Renders a snapshot as a printable report.
pub fn format_snapshot(snapshot: &TermSnapshot) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "Term report: {}", snapshot.term_name)?;
    writeln!(out, "Taken: {}", snapshot.taken_at.format("%Y-%m-%d %H:%M UTC"))?;
    writeln!(out)?;
    writeln!(out, "Fees income:        {:>12.2}", snapshot.fees_income)?;
    writeln!(out, "Inventory income:   {:>12.2}", snapshot.inventory_income)?;
    writeln!(out, "Inventory refunds:  {:>12.2}", snapshot.inventory_refunds)?;
    writeln!(out, "Expenses:           {:>12.2}", snapshot.total_expenses)?;
    writeln!(out, "Net balance:        {:>12.2}", snapshot.net_balance())?;
    writeln!(out)?;
    writeln!(
        out,
        "Students: {} ({} attendance days)",
        snapshot.student_count, snapshot.student_attendance_days
    )?;
    write!(
        out,
        "Teachers: {} ({} attendance days)",
        snapshot.teacher_count, snapshot.teacher_attendance_days
    )?;
    Ok(out)
}

/// Serializes a snapshot for export.
pub fn snapshot_to_json(snapshot: &TermSnapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}
