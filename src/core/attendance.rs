//! Daily attendance ledger.
//!
//! Each population (students, teachers) has one record per calendar day holding a
//! person → status map and the derived present count. Every status change also
//! moves the person's four counters: lifetime present/absent and term
//! present/absent. Term counters are reset lazily: a person whose
//! `last_counted_term_id` is not the active term reads as zero and the first write
//! in the new term persists the reset.
//!
//! Edits to past days move the counters exactly like edits to today.

use super::DateRange;
use crate::{
    config::Section,
    core::{directory, term::TermContext},
    entities::{
        AttendanceMark, AttendanceStatus, DailyAttendance, Person, Population, StatusMap,
        daily_attendance, person,
    },
    errors::Result,
};
use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument, warn};

/// A person's four attendance counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Present days across all terms
    pub lifetime_present: i64,
    /// Absent days across all terms
    pub lifetime_absent: i64,
    /// Present days this term
    pub term_present: i64,
    /// Absent days this term
    pub term_absent: i64,
}

/// Change to apply to a person's counters for one status transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterDelta {
    /// Change to lifetime present
    pub lifetime_present: i64,
    /// Change to lifetime absent
    pub lifetime_absent: i64,
    /// Change to term present
    pub term_present: i64,
    /// Change to term absent
    pub term_absent: i64,
}

impl CounterDelta {
    /// True when applying the delta would change nothing
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.lifetime_present == 0
            && self.lifetime_absent == 0
            && self.term_present == 0
            && self.term_absent == 0
    }

    /// Clamps decrements so no counter drops below zero.
    #[must_use]
    pub fn floored(self, current: &Counters) -> Self {
        let floor = |value: i64, delta: i64| if value + delta < 0 { -value } else { delta };
        Self {
            lifetime_present: floor(current.lifetime_present, self.lifetime_present),
            lifetime_absent: floor(current.lifetime_absent, self.lifetime_absent),
            term_present: floor(current.term_present, self.term_present),
            term_absent: floor(current.term_absent, self.term_absent),
        }
    }
}

/// Counter movement for a status transition on one day.
///
/// `previous` is `None` when the person had no entry for the day yet.
#[must_use]
pub const fn transition_delta(
    previous: Option<AttendanceStatus>,
    next: AttendanceStatus,
) -> CounterDelta {
    use AttendanceStatus::{Absent, Present};

    let (present, absent) = match (previous, next) {
        (None, Present) => (1, 0),
        (None, Absent) => (0, 1),
        (Some(Present), Absent) => (-1, 1),
        (Some(Absent), Present) => (1, -1),
        (Some(Present), Present) | (Some(Absent), Absent) => (0, 0),
    };

    CounterDelta {
        lifetime_present: present,
        lifetime_absent: absent,
        term_present: present,
        term_absent: absent,
    }
}

/// Counters as seen under `term`: term counters of a stale person read as zero.
#[must_use]
pub fn effective_counters(person: &person::Model, term: &TermContext) -> Counters {
    let current_term = person.last_counted_term_id == Some(term.id);
    Counters {
        lifetime_present: person.lifetime_present,
        lifetime_absent: person.lifetime_absent,
        term_present: if current_term { person.term_present } else { 0 },
        term_absent: if current_term { person.term_absent } else { 0 },
    }
}

/// Display key of a day record: `{year}-{month}-{day}` without zero padding.
#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    format!("{}-{}-{}", date.year(), date.month(), date.day())
}

/// Result of marking one person.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkOutcome {
    /// Status before the mark, if any
    pub previous: Option<AttendanceStatus>,
    /// Status after the mark
    pub status: AttendanceStatus,
    /// Counter change that was applied
    pub delta: CounterDelta,
    /// Present count of the day after the write
    pub present_count: i64,
}

/// Result of a bulk mark over a section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkMarkSummary {
    /// People whose status changed (counters were updated for each)
    pub affected: usize,
    /// People already at the requested status
    pub skipped: usize,
    /// Present count of the day after the write
    pub present_count: i64,
}

/// Present/absent/unmarked breakdown of one day against a roster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DaySummary {
    /// Roster members marked present
    pub present: usize,
    /// Roster members marked absent
    pub absent: usize,
    /// Roster members with no entry
    pub unmarked: usize,
}

/// Loads the day record for (population, date), creating an empty one if absent.
pub async fn get_or_create_day<C>(
    db: &C,
    term: &TermContext,
    population: Population,
    date: NaiveDate,
) -> Result<daily_attendance::Model>
where
    C: ConnectionTrait,
{
    let existing = DailyAttendance::find()
        .filter(daily_attendance::Column::Population.eq(population))
        .filter(daily_attendance::Column::Date.eq(date))
        .one(db)
        .await?;

    if let Some(day) = existing {
        return Ok(day);
    }

    debug!("Creating empty {population} day record {}", day_key(date));
    let model = daily_attendance::ActiveModel {
        population: Set(population),
        date: Set(date),
        term_id: Set(term.id),
        entries: Set(StatusMap::default()),
        present_count: Set(0),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

async fn write_day<C>(
    db: &C,
    day: daily_attendance::Model,
    entries: StatusMap,
) -> Result<daily_attendance::Model>
where
    C: ConnectionTrait,
{
    let present_count = entries.present_count();
    let mut active_model: daily_attendance::ActiveModel = day.into();
    active_model.entries = Set(entries);
    active_model.present_count = Set(present_count);
    active_model.updated_at = Set(Utc::now());
    Ok(active_model.update(db).await?)
}

fn mark_for(person: &person::Model, status: AttendanceStatus) -> AttendanceMark {
    AttendanceMark {
        status,
        marked_at: Utc::now(),
        class_name: person.class_name.clone(),
        name: person.name.clone(),
    }
}

/// Applies a transition delta to a person's counters.
///
/// Lifetime counters (and term counters of a person already counted this term) use
/// an in-place `col = col + delta` update. A stale person gets the term counters
/// overwritten instead, which persists the lazy reset. Returns the delta actually
/// applied after flooring.
async fn apply_counters<C>(
    db: &C,
    person: &person::Model,
    delta: CounterDelta,
    term: &TermContext,
) -> Result<CounterDelta>
where
    C: ConnectionTrait,
{
    let current = effective_counters(person, term);
    let delta = delta.floored(&current);
    if delta.is_zero() {
        return Ok(delta);
    }

    let stale = person.last_counted_term_id != Some(term.id);
    let mut update = Person::update_many()
        .col_expr(
            person::Column::LifetimePresent,
            Expr::col(person::Column::LifetimePresent).add(delta.lifetime_present),
        )
        .col_expr(
            person::Column::LifetimeAbsent,
            Expr::col(person::Column::LifetimeAbsent).add(delta.lifetime_absent),
        );

    update = if stale {
        debug!(
            "Resetting term counters of person {} for term {}",
            person.id, term.id
        );
        update
            .col_expr(person::Column::TermPresent, Expr::value(delta.term_present))
            .col_expr(person::Column::TermAbsent, Expr::value(delta.term_absent))
            .col_expr(person::Column::LastCountedTermId, Expr::value(term.id))
    } else {
        update
            .col_expr(
                person::Column::TermPresent,
                Expr::col(person::Column::TermPresent).add(delta.term_present),
            )
            .col_expr(
                person::Column::TermAbsent,
                Expr::col(person::Column::TermAbsent).add(delta.term_absent),
            )
    };

    update
        .filter(person::Column::Id.eq(person.id))
        .exec(db)
        .await?;
    Ok(delta)
}

/// Marks one person present or absent on `date`.
///
/// The day entry, the recomputed present count and the counter delta are written in
/// one database transaction. A missing person fails with `NotFound` before anything
/// is written. Re-marking the same status refreshes the entry's timestamp and class
/// snapshot without touching counters.
#[instrument(skip(db, term))]
pub async fn mark_status(
    db: &DatabaseConnection,
    term: &TermContext,
    population: Population,
    person_id: i64,
    status: AttendanceStatus,
    date: NaiveDate,
) -> Result<MarkOutcome> {
    let txn = db.begin().await?;

    let person = directory::require_person(&txn, population, person_id).await?;
    let day = get_or_create_day(&txn, term, population, date).await?;

    let previous = day.entries.status_of(person_id);
    let mut entries = day.entries.clone();
    entries.0.insert(person_id, mark_for(&person, status));
    let day = write_day(&txn, day, entries).await?;

    let delta = apply_counters(&txn, &person, transition_delta(previous, status), term).await?;

    txn.commit().await?;

    debug!(
        "Marked {population} {person_id} {} on {} (was {:?})",
        status.as_str(),
        day_key(date),
        previous
    );
    Ok(MarkOutcome {
        previous,
        status,
        delta,
        present_count: day.present_count,
    })
}

/// Marks everyone in every class of `section` with `status` on `date`.
///
/// People already at `status` are skipped, so repeating the call changes nothing.
/// Counters are written person by person and the merged day map is written once at
/// the end. The steps are not atomic: a failure part way leaves the counter updates
/// made so far in place and the day record unwritten.
#[instrument(skip(db, term, section), fields(section = %section.name))]
pub async fn mark_all_in_population(
    db: &DatabaseConnection,
    term: &TermContext,
    population: Population,
    section: &Section,
    status: AttendanceStatus,
    date: NaiveDate,
) -> Result<BulkMarkSummary> {
    let people = directory::list_in_classes(db, population, &section.classes).await?;
    let day = get_or_create_day(db, term, population, date).await?;

    let mut entries = day.entries.clone();
    let mut summary = BulkMarkSummary::default();

    for person in &people {
        let previous = entries.status_of(person.id);
        if previous == Some(status) {
            summary.skipped += 1;
            continue;
        }

        if let Err(e) =
            apply_counters(db, person, transition_delta(previous, status), term).await
        {
            warn!(
                "Bulk mark stopped at {population} {} after {} updates: {e}",
                person.id, summary.affected
            );
            return Err(e);
        }
        entries.0.insert(person.id, mark_for(person, status));
        summary.affected += 1;
    }

    summary.present_count = if summary.affected > 0 {
        write_day(db, day, entries).await?.present_count
    } else {
        day.present_count
    };

    info!(
        "Bulk marked {} {population}s {} on {} ({} already marked)",
        summary.affected,
        status.as_str(),
        day_key(date),
        summary.skipped
    );
    Ok(summary)
}

/// Day records of a population ordered by date, optionally bounded by `range`.
pub async fn list_days<C>(
    db: &C,
    population: Population,
    range: Option<DateRange>,
) -> Result<Vec<daily_attendance::Model>>
where
    C: ConnectionTrait,
{
    let mut query =
        DailyAttendance::find().filter(daily_attendance::Column::Population.eq(population));
    if let Some(range) = range {
        query = query.filter(daily_attendance::Column::Date.between(range.from, range.to));
    }
    query
        .order_by_asc(daily_attendance::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Counts the days on which a person is marked present.
///
/// Always recomputed from the day records; term counters are reset at rollover but
/// this history is not.
pub async fn query_present_days<C>(
    db: &C,
    population: Population,
    person_id: i64,
    range: Option<DateRange>,
) -> Result<usize>
where
    C: ConnectionTrait,
{
    let days = list_days(db, population, range).await?;
    Ok(days
        .iter()
        .filter(|day| day.entries.status_of(person_id) == Some(AttendanceStatus::Present))
        .count())
}

/// Number of day records of a population created under `term_id`.
pub async fn count_days_in_term<C>(db: &C, population: Population, term_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    DailyAttendance::find()
        .filter(daily_attendance::Column::Population.eq(population))
        .filter(daily_attendance::Column::TermId.eq(term_id))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Breaks a day down against a roster; entries for people not on it are ignored.
#[must_use]
pub fn day_summary(day: &daily_attendance::Model, roster: &[person::Model]) -> DaySummary {
    roster
        .iter()
        .fold(DaySummary::default(), |mut summary, person| {
            match day.entries.status_of(person.id) {
                Some(AttendanceStatus::Present) => summary.present += 1,
                Some(AttendanceStatus::Absent) => summary.absent += 1,
                None => summary.unmarked += 1,
            }
            summary
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::directory::get_person;
    use crate::errors::Error;
    use crate::test_utils::*;
    use AttendanceStatus::{Absent, Present};

    async fn reload(db: &DatabaseConnection, id: i64) -> Result<person::Model> {
        Ok(get_person(db, id).await?.ok_or_else(|| Error::not_found("person", id))?)
    }

    #[test]
    fn test_transition_table() {
        let delta = transition_delta(None, Present);
        assert_eq!((delta.lifetime_present, delta.term_present), (1, 1));
        assert_eq!((delta.lifetime_absent, delta.term_absent), (0, 0));

        let delta = transition_delta(None, Absent);
        assert_eq!((delta.lifetime_absent, delta.term_absent), (1, 1));

        let delta = transition_delta(Some(Present), Absent);
        assert_eq!(delta.lifetime_present, -1);
        assert_eq!(delta.lifetime_absent, 1);
        assert_eq!(delta.term_present, -1);
        assert_eq!(delta.term_absent, 1);

        let delta = transition_delta(Some(Absent), Present);
        assert_eq!(delta.lifetime_present, 1);
        assert_eq!(delta.term_absent, -1);

        assert!(transition_delta(Some(Present), Present).is_zero());
        assert!(transition_delta(Some(Absent), Absent).is_zero());
    }

    #[test]
    fn test_floored_never_goes_below_zero() {
        let delta = transition_delta(Some(Present), Absent).floored(&Counters::default());
        assert_eq!(delta.lifetime_present, 0);
        assert_eq!(delta.term_present, 0);
        assert_eq!(delta.lifetime_absent, 1);
    }

    #[test]
    fn test_day_key_is_unpadded() {
        assert_eq!(day_key(test_date(2025, 3, 7)), "2025-3-7");
        assert_eq!(day_key(test_date(2025, 11, 21)), "2025-11-21");
    }

    #[tokio::test]
    async fn test_mark_creates_day_and_counts() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;

        let outcome = mark_status(
            &db,
            &term,
            Population::Student,
            ada.id,
            Present,
            test_date(2025, 1, 6),
        )
        .await?;
        assert_eq!(outcome.previous, None);
        assert_eq!(outcome.present_count, 1);

        let ada = reload(&db, ada.id).await?;
        assert_eq!(ada.lifetime_present, 1);
        assert_eq!(ada.term_present, 1);
        assert_eq!(ada.last_counted_term_id, Some(term.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_present_absent_present_round_trip() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let date = test_date(2025, 1, 6);

        for status in [Present, Absent, Present] {
            mark_status(&db, &term, Population::Student, ada.id, status, date).await?;
        }

        let ada = reload(&db, ada.id).await?;
        assert_eq!(ada.lifetime_present, 1);
        assert_eq!(ada.lifetime_absent, 0);
        assert_eq!(ada.term_present, 1);
        assert_eq!(ada.term_absent, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_same_status_refreshes_entry_only() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let date = test_date(2025, 1, 6);

        mark_status(&db, &term, Population::Student, ada.id, Absent, date).await?;
        crate::core::directory::update_person(&db, ada.id, "Ada", "JSS 2").await?;
        let outcome = mark_status(&db, &term, Population::Student, ada.id, Absent, date).await?;
        assert!(outcome.delta.is_zero());

        let day = get_or_create_day(&db, &term, Population::Student, date).await?;
        assert_eq!(day.entries.0[&ada.id].class_name, "JSS 2");
        assert_eq!(reload(&db, ada.id).await?.lifetime_absent, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_present_count_matches_map_after_every_write() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let date = test_date(2025, 1, 6);
        let mut ids = Vec::new();
        for name in ["Ada", "Bola", "Chidi", "Dayo"] {
            ids.push(create_test_student(&db, name, "JSS 1").await?.id);
        }

        let script = [
            (0, Present),
            (1, Present),
            (2, Absent),
            (1, Absent),
            (3, Present),
            (2, Present),
        ];
        for (index, status) in script {
            mark_status(&db, &term, Population::Student, ids[index], status, date).await?;
            let day = get_or_create_day(&db, &term, Population::Student, date).await?;
            assert_eq!(day.present_count, day.entries.present_count());
        }

        let day = get_or_create_day(&db, &term, Population::Student, date).await?;
        assert_eq!(day.present_count, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_lazy_term_reset() -> Result<()> {
        let (db, first_term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;

        for day in [6, 7] {
            mark_status(
                &db,
                &first_term,
                Population::Student,
                ada.id,
                Present,
                test_date(2025, 1, day),
            )
            .await?;
        }

        let second_term = open_new_test_term(&db, "Second Term").await?;

        // Stale counters read as zero before any write in the new term
        let ada_before = reload(&db, ada.id).await?;
        assert_eq!(ada_before.term_present, 2);
        let view = effective_counters(&ada_before, &second_term);
        assert_eq!(view.term_present, 0);
        assert_eq!(view.term_absent, 0);
        assert_eq!(view.lifetime_present, 2);

        mark_status(
            &db,
            &second_term,
            Population::Student,
            ada.id,
            Absent,
            test_date(2025, 4, 28),
        )
        .await?;

        let ada_after = reload(&db, ada.id).await?;
        assert_eq!(ada_after.last_counted_term_id, Some(second_term.id));
        assert_eq!(ada_after.term_present, 0);
        assert_eq!(ada_after.term_absent, 1);
        assert_eq!(ada_after.lifetime_present, 2);
        assert_eq!(ada_after.lifetime_absent, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_historical_edit_moves_counters_once() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let three_days_ago = Utc::now().date_naive() - chrono::Duration::days(3);

        mark_status(&db, &term, Population::Student, ada.id, Absent, three_days_ago).await?;

        let ada = reload(&db, ada.id).await?;
        assert_eq!(ada.lifetime_absent, 1);
        assert_eq!(ada.term_absent, 1);
        assert_eq!(ada.lifetime_present, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_missing_person_writes_nothing() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let date = test_date(2025, 1, 6);

        let result = mark_status(&db, &term, Population::Student, 404, Present, date).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert!(list_days(&db, Population::Student, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_teacher_records_are_separate() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let obi = create_test_teacher(&db, "Mr Obi", "JSS 1").await?;
        let date = test_date(2025, 1, 6);

        mark_status(&db, &term, Population::Student, ada.id, Present, date).await?;
        mark_status(&db, &term, Population::Teacher, obi.id, Present, date).await?;

        let student_day = get_or_create_day(&db, &term, Population::Student, date).await?;
        let teacher_day = get_or_create_day(&db, &term, Population::Teacher, date).await?;
        assert_ne!(student_day.id, teacher_day.id);
        assert_eq!(student_day.entries.0.len(), 1);
        assert!(teacher_day.entries.0.contains_key(&obi.id));

        // A teacher id is not a student
        let result = mark_status(&db, &term, Population::Student, obi.id, Present, date).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_mark_skips_already_marked() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let section = test_section("junior", &["JSS 1 A", "JSS 1 B"]);
        let date = test_date(2025, 1, 6);

        let mut ids = Vec::new();
        for (name, class) in [
            ("Ada", "JSS 1 A"),
            ("Bola", "JSS 1 A"),
            ("Chidi", "JSS 1 B"),
            ("Dayo", "JSS 1 B"),
            ("Emeka", "JSS 1 B"),
        ] {
            ids.push(create_test_student(&db, name, class).await?.id);
        }
        create_test_student(&db, "Outsider", "SS 3").await?;

        for id in &ids[..2] {
            mark_status(&db, &term, Population::Student, *id, Present, date).await?;
        }

        let summary =
            mark_all_in_population(&db, &term, Population::Student, &section, Present, date)
                .await?;
        assert_eq!(summary.affected, 3);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.present_count, 5);

        for id in &ids {
            let person = reload(&db, *id).await?;
            assert_eq!(person.lifetime_present, 1);
            assert_eq!(person.term_present, 1);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_mark_is_idempotent() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let section = test_section("junior", &["JSS 1"]);
        let date = test_date(2025, 1, 6);
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let bola = create_test_student(&db, "Bola", "JSS 1").await?;
        mark_status(&db, &term, Population::Student, bola.id, Present, date).await?;

        mark_all_in_population(&db, &term, Population::Student, &section, Absent, date).await?;
        let day_after_first = get_or_create_day(&db, &term, Population::Student, date).await?;
        let ada_after_first = reload(&db, ada.id).await?;
        let bola_after_first = reload(&db, bola.id).await?;

        let second =
            mark_all_in_population(&db, &term, Population::Student, &section, Absent, date)
                .await?;
        assert_eq!(second.affected, 0);
        assert_eq!(second.skipped, 2);

        let day_after_second = get_or_create_day(&db, &term, Population::Student, date).await?;
        assert_eq!(day_after_first.entries, day_after_second.entries);
        assert_eq!(reload(&db, ada.id).await?, ada_after_first);
        assert_eq!(reload(&db, bola.id).await?, bola_after_first);

        assert_eq!(bola_after_first.lifetime_present, 0);
        assert_eq!(bola_after_first.lifetime_absent, 1);
        assert_eq!(day_after_second.present_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_mark_failure_leaves_partial_counters() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let section = test_section("junior", &["JSS 1"]);
        let date = test_date(2025, 1, 6);
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let bola = create_test_student(&db, "Bola", "JSS 1").await?;
        let chidi = create_test_student(&db, "Chidi", "JSS 1").await?;

        // Counter writes for the third person in roster order fail
        db.execute_unprepared(
            "CREATE TRIGGER chidi_locked BEFORE UPDATE ON people WHEN OLD.name = 'Chidi' \
             BEGIN SELECT RAISE(ABORT, 'locked'); END;",
        )
        .await?;

        let result =
            mark_all_in_population(&db, &term, Population::Student, &section, Present, date)
                .await;
        assert!(matches!(result, Err(Error::Database(_))));

        assert_eq!(reload(&db, ada.id).await?.lifetime_present, 1);
        assert_eq!(reload(&db, bola.id).await?.lifetime_present, 1);
        assert_eq!(reload(&db, chidi.id).await?.lifetime_present, 0);

        // The day record was created up front but its map was never written
        let day = get_or_create_day(&db, &term, Population::Student, date).await?;
        assert!(day.entries.0.is_empty());
        assert_eq!(day.present_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_query_present_days_with_range() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;

        for (day, status) in [(6, Present), (7, Absent), (8, Present), (13, Present)] {
            mark_status(
                &db,
                &term,
                Population::Student,
                ada.id,
                status,
                test_date(2025, 1, day),
            )
            .await?;
        }

        assert_eq!(
            query_present_days(&db, Population::Student, ada.id, None).await?,
            3
        );
        let week = DateRange::new(test_date(2025, 1, 10), test_date(2025, 1, 6));
        assert_eq!(
            query_present_days(&db, Population::Student, ada.id, Some(week)).await?,
            2
        );
        assert_eq!(count_days_in_term(&db, Population::Student, term.id).await?, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_day_summary_against_roster() -> Result<()> {
        let (db, term) = setup_with_term().await?;
        let date = test_date(2025, 1, 6);
        let ada = create_test_student(&db, "Ada", "JSS 1").await?;
        let bola = create_test_student(&db, "Bola", "JSS 1").await?;
        create_test_student(&db, "Chidi", "JSS 1").await?;

        mark_status(&db, &term, Population::Student, ada.id, Present, date).await?;
        mark_status(&db, &term, Population::Student, bola.id, Absent, date).await?;

        let roster = directory::list_people(&db, Population::Student).await?;
        let day = get_or_create_day(&db, &term, Population::Student, date).await?;
        let summary = day_summary(&day, &roster);
        assert_eq!(
            summary,
            DaySummary {
                present: 1,
                absent: 1,
                unmarked: 1
            }
        );
        Ok(())
    }
}
