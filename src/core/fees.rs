//! Fee payment ledger.
//!
//! Payments are append-only events per (term, student). Each event stores the
//! running total after it, the remaining balance and a status label, all computed
//! at write time against the class fee. A payment that would take the running total
//! past the class fee is rejected before anything is written.
//!
//! Deleting an event does not touch later events: their stored totals describe the
//! ledger as it was when they were written. [`replay_history`] recomputes the
//! point-in-time values for display without persisting them.

use crate::{
    core::{directory, term::TermContext},
    entities::{Payment, Population, payment, person},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{info, instrument};

/// Termly fee per class, with the lookup fallbacks used for arm and prefix variants.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeeSchedule {
    fees: BTreeMap<String, f64>,
}

impl FeeSchedule {
    /// Builds a schedule from (class, fee) pairs; later duplicates win.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        Self {
            fees: entries.into_iter().collect(),
        }
    }

    /// Number of classes with a fee
    #[must_use]
    pub fn len(&self) -> usize {
        self.fees.len()
    }

    /// True when no fees are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fees.is_empty()
    }

    /// Fee for a class, or 0 when nothing matches.
    ///
    /// Tried in order: the exact name, the name without a trailing " A"/" B" arm,
    /// then both of those with a leading "JS" rewritten to "JSS".
    #[must_use]
    pub fn class_fee(&self, class_name: &str) -> f64 {
        let name = class_name.trim();
        let stripped = strip_arm(name);

        let candidates = [
            Some(name.to_string()),
            stripped.map(str::to_string),
            js_to_jss(name),
            stripped.and_then(js_to_jss),
        ];

        candidates
            .into_iter()
            .flatten()
            .find_map(|candidate| self.fees.get(&candidate).copied())
            .unwrap_or(0.0)
    }
}

fn strip_arm(name: &str) -> Option<&str> {
    name.strip_suffix(" A")
        .or_else(|| name.strip_suffix(" B"))
        .map(str::trim_end)
}

fn js_to_jss(name: &str) -> Option<String> {
    match name.strip_prefix("JS") {
        Some(rest) if !rest.starts_with('S') => Some(format!("JSS{rest}")),
        _ => None,
    }
}

/// Fee status of a student for a term
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    /// Running total reached the class fee
    Paid,
    /// Something paid, not everything
    Owing,
    /// Nothing paid yet
    NotPaid,
    /// The class has no fee
    NotApplicable,
}

impl PaymentStatus {
    /// Label stored on payment events
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Paid => "Paid",
            Self::Owing => "Owing",
            Self::NotPaid => "Not Paid",
            Self::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status for a running total against a class fee.
#[must_use]
pub fn payment_status(total: f64, class_fee: f64) -> PaymentStatus {
    if class_fee <= 0.0 {
        PaymentStatus::NotApplicable
    } else if total >= class_fee {
        PaymentStatus::Paid
    } else if total > 0.0 {
        PaymentStatus::Owing
    } else {
        PaymentStatus::NotPaid
    }
}

/// Balance still owed, never negative.
#[must_use]
pub fn remaining_balance(total: f64, class_fee: f64) -> f64 {
    (class_fee - total).max(0.0)
}

async fn prior_total<C>(db: &C, term_id: i64, student_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let events = Payment::find()
        .filter(payment::Column::TermId.eq(term_id))
        .filter(payment::Column::StudentId.eq(student_id))
        .all(db)
        .await?;
    Ok(events.iter().map(|event| event.amount).sum())
}

/// Records a fee payment for a student in `term`.
///
/// # Errors
/// - `InvalidAmount` when the amount is negative or not finite
/// - `NotFound` when the student does not exist
/// - `Overpayment` when the running total would exceed the class fee
#[instrument(skip(db, schedule, term))]
pub async fn add_payment(
    db: &DatabaseConnection,
    schedule: &FeeSchedule,
    term: &TermContext,
    student_id: i64,
    amount: f64,
) -> Result<payment::Model> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let student = directory::require_person(&txn, Population::Student, student_id).await?;
    let class_fee = schedule.class_fee(&student.class_name);
    let prior_total = prior_total(&txn, term.id, student_id).await?;
    let running_total = prior_total + amount;

    if running_total > class_fee {
        return Err(Error::Overpayment {
            amount,
            prior_total,
            class_fee,
            attempted_total: running_total,
        });
    }

    let status = payment_status(running_total, class_fee);
    let event = payment::ActiveModel {
        term_id: Set(term.id),
        student_id: Set(student_id),
        class_name: Set(student.class_name.clone()),
        amount: Set(amount),
        paid_at: Set(Utc::now()),
        running_total: Set(running_total),
        remaining: Set(remaining_balance(running_total, class_fee)),
        status: Set(status.label().to_string()),
        ..Default::default()
    };
    let created = event.insert(&txn).await?;
    txn.commit().await?;

    info!(
        "Recorded payment {:.2} for student {student_id} in term {} ({status}, total {:.2})",
        amount, term.id, running_total
    );
    Ok(created)
}

/// Deletes one payment event. Later events keep their stored totals.
#[instrument(skip(db))]
pub async fn delete_payment<C>(db: &C, payment_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let event = Payment::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("payment", payment_id))?;
    event.delete(db).await?;
    info!("Deleted payment {payment_id}");
    Ok(())
}

/// All payments of a term in creation order.
pub async fn payments_for_term<C>(db: &C, term_id: i64) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::TermId.eq(term_id))
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Payments recorded against a class in a term, in creation order.
pub async fn payments_for_class<C>(
    db: &C,
    class_name: &str,
    term_id: i64,
) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::ClassName.eq(class_name))
        .filter(payment::Column::TermId.eq(term_id))
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// One student's payments in a term, in creation order.
pub async fn payment_history<C>(
    db: &C,
    term_id: i64,
    student_id: i64,
) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::TermId.eq(term_id))
        .filter(payment::Column::StudentId.eq(student_id))
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A payment event with its point-in-time values recomputed from the amounts.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryLine {
    /// Event id
    pub payment_id: i64,
    /// Amount of the event
    pub amount: f64,
    /// Running total recomputed from the surviving events
    pub running_total: f64,
    /// Remaining balance at that point
    pub remaining: f64,
    /// Status at that point
    pub status: PaymentStatus,
    /// Stored values disagree with the replay (an earlier event was deleted)
    pub stale: bool,
}

/// Replays events in order against `class_fee`. Nothing is persisted.
#[must_use]
pub fn replay_history(events: &[payment::Model], class_fee: f64) -> Vec<HistoryLine> {
    let mut total = 0.0;
    events
        .iter()
        .map(|event| {
            total += event.amount;
            HistoryLine {
                payment_id: event.id,
                amount: event.amount,
                running_total: total,
                remaining: remaining_balance(total, class_fee),
                status: payment_status(total, class_fee),
                stale: (event.running_total - total).abs() > f64::EPSILON,
            }
        })
        .collect()
}

/// Where a student stands for a term.
#[derive(Clone, Debug, PartialEq)]
pub struct StudentFeeSummary {
    /// Student id
    pub student_id: i64,
    /// Student name
    pub name: String,
    /// Current class
    pub class_name: String,
    /// Fee for the class
    pub class_fee: f64,
    /// Sum of the term's payments
    pub total_paid: f64,
    /// Balance still owed
    pub remaining: f64,
    /// Derived status
    pub status: PaymentStatus,
}

fn summarize(student: &person::Model, schedule: &FeeSchedule, total_paid: f64) -> StudentFeeSummary {
    let class_fee = schedule.class_fee(&student.class_name);
    StudentFeeSummary {
        student_id: student.id,
        name: student.name.clone(),
        class_name: student.class_name.clone(),
        class_fee,
        total_paid,
        remaining: remaining_balance(total_paid, class_fee),
        status: payment_status(total_paid, class_fee),
    }
}

/// Fee position of one student for a term.
pub async fn student_fee_summary<C>(
    db: &C,
    schedule: &FeeSchedule,
    term: &TermContext,
    student_id: i64,
) -> Result<StudentFeeSummary>
where
    C: ConnectionTrait,
{
    let student = directory::require_person(db, Population::Student, student_id).await?;
    let total = prior_total(db, term.id, student_id).await?;
    Ok(summarize(&student, schedule, total))
}

/// Fee position of every student currently in `class_name`.
pub async fn class_fee_roster<C>(
    db: &C,
    schedule: &FeeSchedule,
    term: &TermContext,
    class_name: &str,
) -> Result<Vec<StudentFeeSummary>>
where
    C: ConnectionTrait,
{
    let students =
        directory::list_in_classes(db, Population::Student, &[class_name.to_string()]).await?;
    let ids: Vec<i64> = students.iter().map(|s| s.id).collect();

    let events = Payment::find()
        .filter(payment::Column::TermId.eq(term.id))
        .filter(payment::Column::StudentId.is_in(ids))
        .all(db)
        .await?;

    let mut totals: HashMap<i64, f64> = HashMap::new();
    for event in &events {
        *totals.entry(event.student_id).or_default() += event.amount;
    }

    Ok(students
        .iter()
        .map(|student| {
            let total = totals.get(&student.id).copied().unwrap_or(0.0);
            summarize(student, schedule, total)
        })
        .collect())
}
