//! Term context - the active academic term and the term records themselves.
//!
//! The active term is a pointer stored in the `app_settings` table. Ledger calls do
//! not read it themselves; callers resolve it once with [`active_term`] and pass the
//! resulting [`TermContext`] along.

use crate::{
    entities::{AppSetting, Term, app_setting, term},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

const ACTIVE_TERM_KEY: &str = "active_term_id";

/// The term all reads and writes of one operation are scoped to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermContext {
    /// Term id
    pub id: i64,
    /// Term display name
    pub name: String,
}

impl From<&term::Model> for TermContext {
    fn from(model: &term::Model) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
        }
    }
}

/// Reads the active term pointer without resolving it.
pub async fn active_term_id<C>(db: &C) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let setting = AppSetting::find()
        .filter(app_setting::Column::Key.eq(ACTIVE_TERM_KEY))
        .one(db)
        .await?;

    match setting {
        Some(s) => s.value.parse::<i64>().map(Some).map_err(|e| Error::Config {
            message: format!("Active term pointer '{}' is not an id: {e}", s.value),
        }),
        None => Ok(None),
    }
}

/// Resolves the active term.
///
/// A pointer to a closed term still resolves; [`crate::core::rollover::resume_rollover`]
/// is what repairs an interrupted rollover.
pub async fn active_term<C>(db: &C) -> Result<TermContext>
where
    C: ConnectionTrait,
{
    let id = active_term_id(db).await?.ok_or_else(|| Error::NotFound {
        entity: "active term",
        id: ACTIVE_TERM_KEY.to_string(),
    })?;
    let model = get_term(db, id)
        .await?
        .ok_or_else(|| Error::not_found("term", id))?;
    Ok(TermContext::from(&model))
}

/// Points the active term at `term_id`.
#[instrument(skip(db))]
pub async fn set_active_term<C>(db: &C, term_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();

    let existing = AppSetting::find()
        .filter(app_setting::Column::Key.eq(ACTIVE_TERM_KEY))
        .one(db)
        .await?;

    if let Some(setting) = existing {
        let mut active_model: app_setting::ActiveModel = setting.into();
        active_model.value = Set(term_id.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_setting = app_setting::ActiveModel {
            key: Set(ACTIVE_TERM_KEY.to_string()),
            value: Set(term_id.to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        new_setting.insert(db).await?;
    }

    info!("Active term set to {term_id}");
    Ok(())
}

/// Creates a new open term. Does not repoint the active term.
#[instrument(skip(db))]
pub async fn create_term<C>(db: &C, name: &str) -> Result<term::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::validation("Term name cannot be empty"));
    }

    let model = term::ActiveModel {
        name: Set(name.trim().to_string()),
        started_at: Set(Utc::now()),
        closed: Set(false),
        ended_at: Set(None),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Marks a term closed and stamps its end time.
#[instrument(skip(db))]
pub async fn close_term<C>(db: &C, term_id: i64) -> Result<term::Model>
where
    C: ConnectionTrait,
{
    let model = get_term(db, term_id)
        .await?
        .ok_or_else(|| Error::not_found("term", term_id))?;

    let mut active_model: term::ActiveModel = model.into();
    active_model.closed = Set(true);
    active_model.ended_at = Set(Some(Utc::now()));
    Ok(active_model.update(db).await?)
}

/// Finds a term by id.
pub async fn get_term<C>(db: &C, term_id: i64) -> Result<Option<term::Model>>
where
    C: ConnectionTrait,
{
    Term::find_by_id(term_id).one(db).await.map_err(Into::into)
}

/// All terms, oldest first.
pub async fn list_terms<C>(db: &C) -> Result<Vec<term::Model>>
where
    C: ConnectionTrait,
{
    Term::find()
        .order_by_asc(term::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Returns the active term, opening one named `name` on first run.
pub async fn ensure_active_term<C>(db: &C, name: &str) -> Result<TermContext>
where
    C: ConnectionTrait,
{
    if active_term_id(db).await?.is_some() {
        return active_term(db).await;
    }

    let created = create_term(db, name).await?;
    set_active_term(db, created.id).await?;
    info!("Opened first term '{}'", created.name);
    Ok(TermContext::from(&created))
}
