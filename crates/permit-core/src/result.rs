//! Result aggregate delivered to every waiter of a request.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::catalog::Permission;
use crate::error::{Error, Result};
use crate::grant::GrantOutcome;
use crate::rationale::RationaleOracle;

/// Immutable mapping from requested permission to its outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionResult {
    outcomes: BTreeMap<Permission, GrantOutcome>,
}

impl PermissionResult {
    pub const fn new(outcomes: BTreeMap<Permission, GrantOutcome>) -> Self {
        Self { outcomes }
    }

    /// Single-entry result.
    pub fn single(permission: Permission, outcome: GrantOutcome) -> Self {
        Self::new(BTreeMap::from([(permission, outcome)]))
    }

    /// Build a result from a platform response, classifying each position.
    ///
    /// `permissions` and `grants` are correlated by position; extra entries on
    /// either side are ignored.
    pub fn from_platform(
        permissions: &[Permission],
        grants: &[bool],
        oracle: &dyn RationaleOracle,
    ) -> Self {
        permissions
            .iter()
            .zip(grants)
            .map(|(p, granted)| (*p, GrantOutcome::classify(*p, *granted, oracle)))
            .collect()
    }

    /// Outcome for `permission`. Errors if it was never requested.
    pub fn outcome(&self, permission: Permission) -> Result<GrantOutcome> {
        self.outcomes
            .get(&permission)
            .copied()
            .ok_or(Error::PermissionNotInResult { permission })
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.outcomes.contains_key(&permission)
    }

    /// `true` if every named permission was granted.
    pub fn is_all_granted(&self, permissions: &[Permission]) -> Result<bool> {
        self.all_match(permissions, GrantOutcome::is_granted)
    }

    /// `true` if every named permission was denied, permanently or not.
    pub fn is_all_denied(&self, permissions: &[Permission]) -> Result<bool> {
        self.all_match(permissions, |o| !o.is_granted())
    }

    fn all_match(
        &self,
        permissions: &[Permission],
        predicate: impl Fn(GrantOutcome) -> bool,
    ) -> Result<bool> {
        let mut all = true;
        for permission in permissions {
            all &= predicate(self.outcome(*permission)?);
        }
        Ok(all)
    }

    pub fn granted(&self) -> BTreeSet<Permission> {
        self.filter(|o| o == GrantOutcome::Granted)
    }

    /// Denied permissions, including permanently denied ones.
    pub fn denied(&self) -> BTreeSet<Permission> {
        self.filter(|o| o != GrantOutcome::Granted)
    }

    pub fn permanently_denied(&self) -> BTreeSet<Permission> {
        self.filter(|o| o == GrantOutcome::PermanentlyDenied)
    }

    fn filter(&self, keep: impl Fn(GrantOutcome) -> bool) -> BTreeSet<Permission> {
        self.outcomes
            .iter()
            .filter(|(_, o)| keep(**o))
            .map(|(p, _)| *p)
            .collect()
    }

    pub fn permissions(&self) -> impl Iterator<Item = Permission> + '_ {
        self.outcomes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Key-wise union; entries of `other` win on collision.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.outcomes.extend(other.outcomes);
        self
    }
}

impl FromIterator<(Permission, GrantOutcome)> for PermissionResult {
    fn from_iter<I: IntoIterator<Item = (Permission, GrantOutcome)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Add for PermissionResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

/// Fold a partial result into an optional accumulator.
pub fn fold_result(acc: Option<PermissionResult>, next: PermissionResult) -> PermissionResult {
    match acc {
        Some(acc) => acc + next,
        None => next,
    }
}

impl fmt::Display for PermissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (permission, outcome) in &self.outcomes {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{permission} -> {outcome}")?;
            first = false;
        }
        Ok(())
    }
}
