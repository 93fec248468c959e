//! Student/teacher directory - the roster the ledgers read identity and class
//! membership from.
//!
//! Deleting a person cascades into attendance history: the person's entry is
//! stripped from every day record of their population. The cascade and the delete
//! run in one database transaction so a concurrent mark cannot slip an entry for
//! the deleted person back in between the scan and the delete.

use crate::{
    entities::{DailyAttendance, Person, Population, daily_attendance, person},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

fn validate_identity(name: &str, class_name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("Name cannot be empty"));
    }
    if class_name.trim().is_empty() {
        return Err(Error::validation("Class cannot be empty"));
    }
    Ok(())
}

/// Adds a person to the roster with all counters at zero.
#[instrument(skip(db))]
pub async fn create_person<C>(
    db: &C,
    population: Population,
    name: &str,
    class_name: &str,
) -> Result<person::Model>
where
    C: ConnectionTrait,
{
    validate_identity(name, class_name)?;

    let model = person::ActiveModel {
        population: Set(population),
        name: Set(name.trim().to_string()),
        class_name: Set(class_name.trim().to_string()),
        lifetime_present: Set(0),
        lifetime_absent: Set(0),
        term_present: Set(0),
        term_absent: Set(0),
        last_counted_term_id: Set(None),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Finds a person by id.
pub async fn get_person<C>(db: &C, person_id: i64) -> Result<Option<person::Model>>
where
    C: ConnectionTrait,
{
    Person::find_by_id(person_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a person of the given population, failing with `NotFound` otherwise.
pub async fn require_person<C>(
    db: &C,
    population: Population,
    person_id: i64,
) -> Result<person::Model>
where
    C: ConnectionTrait,
{
    get_person(db, person_id)
        .await?
        .filter(|p| p.population == population)
        .ok_or_else(|| Error::not_found(population.as_str(), person_id))
}

/// Everyone in a population, ordered by class then name.
pub async fn list_people<C>(db: &C, population: Population) -> Result<Vec<person::Model>>
where
    C: ConnectionTrait,
{
    Person::find()
        .filter(person::Column::Population.eq(population))
        .order_by_asc(person::Column::ClassName)
        .order_by_asc(person::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Everyone in a population whose class is one of `classes`.
pub async fn list_in_classes<C>(
    db: &C,
    population: Population,
    classes: &[String],
) -> Result<Vec<person::Model>>
where
    C: ConnectionTrait,
{
    Person::find()
        .filter(person::Column::Population.eq(population))
        .filter(person::Column::ClassName.is_in(classes.iter().cloned()))
        .order_by_asc(person::Column::ClassName)
        .order_by_asc(person::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of people in a population.
pub async fn count_people<C>(db: &C, population: Population) -> Result<u64>
where
    C: ConnectionTrait,
{
    Person::find()
        .filter(person::Column::Population.eq(population))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Changes a person's name and class. Counters are left alone.
#[instrument(skip(db))]
pub async fn update_person<C>(
    db: &C,
    person_id: i64,
    name: &str,
    class_name: &str,
) -> Result<person::Model>
where
    C: ConnectionTrait,
{
    validate_identity(name, class_name)?;

    let existing = get_person(db, person_id)
        .await?
        .ok_or_else(|| Error::not_found("person", person_id))?;

    let mut active_model: person::ActiveModel = existing.into();
    active_model.name = Set(name.trim().to_string());
    active_model.class_name = Set(class_name.trim().to_string());
    Ok(active_model.update(db).await?)
}

/// Deletes a person and strips them from every historical day record.
///
/// Returns the number of day records that were rewritten.
#[instrument(skip(db))]
pub async fn delete_person(db: &DatabaseConnection, person_id: i64) -> Result<usize> {
    let txn = db.begin().await?;

    let existing = Person::find_by_id(person_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("person", person_id))?;

    let days = DailyAttendance::find()
        .filter(daily_attendance::Column::Population.eq(existing.population))
        .all(&txn)
        .await?;

    let mut rewritten = 0;
    for day in days {
        if !day.entries.0.contains_key(&person_id) {
            continue;
        }
        let mut entries = day.entries.clone();
        entries.0.remove(&person_id);
        let present_count = entries.present_count();

        let mut active_model: daily_attendance::ActiveModel = day.into();
        active_model.entries = Set(entries);
        active_model.present_count = Set(present_count);
        active_model.updated_at = Set(Utc::now());
        active_model.update(&txn).await?;
        rewritten += 1;
    }

    existing.delete(&txn).await?;
    txn.commit().await?;

    info!("Deleted person {person_id}, stripped from {rewritten} day records");
    Ok(rewritten)
}
