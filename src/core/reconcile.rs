//! Child-collection reconciliation.
//!
//! Turns a parent's persisted child ids plus a caller-submitted desired list into
//! an explicit [`ReconcilePlan`]. The plan is computed before anything is written;
//! the order and booking services apply it (deletes, then updates, then inserts)
//! inside the same transaction as the parent update.

use crate::errors::{Error, Result};
use std::collections::HashSet;

/// One entry of a submitted child list.
///
/// Replaces the "id 0 means new" convention: a child either has never been
/// persisted or names the row it wants to overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredChild<T> {
    /// Not yet persisted; the store assigns an id on insert.
    New(T),
    /// Targets the persisted row `id`.
    Existing {
        /// Persisted row id
        id: i64,
        /// Full replacement payload
        data: T,
    },
}

impl<T> DesiredChild<T> {
    /// Builds a child from the legacy wire form, where a missing id or id `0`
    /// means "new".
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for negative ids.
    pub fn from_wire(id: Option<i64>, data: T) -> Result<Self> {
        match id {
            None | Some(0) => Ok(Self::New(data)),
            Some(id) if id > 0 => Ok(Self::Existing { id, data }),
            Some(id) => Err(Error::validation(format!("invalid child id {id}"))),
        }
    }
}

/// Computed insert/update/delete sets for one child collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan<T> {
    /// Persisted ids absent from the desired list
    pub to_delete: Vec<i64>,
    /// Persisted rows to overwrite, with their replacement payload
    pub to_update: Vec<(i64, T)>,
    /// Payloads to insert as new rows
    pub to_insert: Vec<T>,
}

impl<T> ReconcilePlan<T> {
    /// Whether applying the plan would touch no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_update.is_empty() && self.to_insert.is_empty()
    }
}

/// Row counts produced by applying a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// Rows inserted
    pub added: usize,
    /// Rows overwritten
    pub updated: usize,
    /// Rows removed
    pub deleted: usize,
}

impl<T> From<&ReconcilePlan<T>> for ReconcileSummary {
    fn from(plan: &ReconcilePlan<T>) -> Self {
        Self {
            added: plan.to_insert.len(),
            updated: plan.to_update.len(),
            deleted: plan.to_delete.len(),
        }
    }
}

/// Classifies `desired` against the parent's `persisted_ids`.
///
/// - [`DesiredChild::New`] is always an insert; repeated `New` entries are
///   distinct inserts.
/// - [`DesiredChild::Existing`] whose id is persisted is an update; one whose id
///   is not persisted (for instance deleted meanwhile, or belonging to another
///   parent) is inserted as a new row.
/// - Persisted ids not named by any `Existing` entry are deleted.
///
/// Output order follows input order, deletes in ascending id order.
///
/// # Errors
/// Returns [`Error::Validation`] when the same existing id is named twice.
pub fn plan<T, I>(persisted_ids: I, desired: Vec<DesiredChild<T>>) -> Result<ReconcilePlan<T>>
where
    I: IntoIterator<Item = i64>,
{
    let persisted: HashSet<i64> = persisted_ids.into_iter().collect();
    let mut kept = HashSet::new();
    let mut to_update = Vec::new();
    let mut to_insert = Vec::new();

    for child in desired {
        match child {
            DesiredChild::New(data) => to_insert.push(data),
            DesiredChild::Existing { id, data } => {
                if !kept.insert(id) {
                    return Err(Error::validation(format!(
                        "child id {id} appears more than once"
                    )));
                }
                if persisted.contains(&id) {
                    to_update.push((id, data));
                } else {
                    to_insert.push(data);
                }
            }
        }
    }

    let mut to_delete: Vec<i64> = persisted.difference(&kept).copied().collect();
    to_delete.sort_unstable();

    Ok(ReconcilePlan {
        to_delete,
        to_update,
        to_insert,
    })
}
