//! # Error Aggregation
//!
//! [`MultiError`] is the flattened, ordered collection of every violation
//! found in one validation pass, plus the rule used to derive a single status
//! from it.

use std::fmt;

use serde::Serialize;

use crate::error::ServiceError;

/// Status reported when something is wrong on the server side.
pub const INTERNAL_STATUS: u16 = 500;

/// Status reported for mixed client errors.
pub const BAD_REQUEST_STATUS: u16 = 400;

/// An error composed of any number of [`ServiceError`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MultiError {
    errors: Vec<ServiceError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: ServiceError) {
        self.errors.push(err);
    }

    /// Appends every error of `other`, keeping the order.
    pub fn merge(&mut self, other: impl Into<MultiError>) {
        self.errors.extend(other.into().errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ServiceError] {
        &self.errors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Derives one status from all the collected errors.
    ///
    /// - no error: 500, this should never be called on an empty aggregate
    /// - one error: its own status
    /// - several: 500 if any of them is 500, the shared status if they all
    ///   agree, 400 otherwise
    ///
    /// The last rule is lossy on purpose: 404 and 409 together report 400.
    pub fn status(&self) -> u16 {
        let Some((first, rest)) = self.errors.split_first() else {
            return INTERNAL_STATUS;
        };
        let mut status = first.status;
        if status == INTERNAL_STATUS {
            return INTERNAL_STATUS;
        }
        for err in rest {
            if err.status == INTERNAL_STATUS {
                return INTERNAL_STATUS;
            }
            if err.status != status {
                status = BAD_REQUEST_STATUS;
            }
        }
        status
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&err.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl From<ServiceError> for MultiError {
    fn from(err: ServiceError) -> Self {
        Self { errors: vec![err] }
    }
}

impl From<Vec<ServiceError>> for MultiError {
    fn from(errors: Vec<ServiceError>) -> Self {
        Self { errors }
    }
}

impl From<Option<MultiError>> for MultiError {
    fn from(err: Option<MultiError>) -> Self {
        err.unwrap_or_default()
    }
}

impl Extend<ServiceError> for MultiError {
    fn extend<T: IntoIterator<Item = ServiceError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

impl FromIterator<ServiceError> for MultiError {
    fn from_iter<T: IntoIterator<Item = ServiceError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MultiError {
    type Item = ServiceError;
    type IntoIter = std::vec::IntoIter<ServiceError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a ServiceError;
    type IntoIter = std::slice::Iter<'a, ServiceError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Folds two errors or aggregates into one flattened aggregate.
pub fn merge_errors(first: impl Into<MultiError>, second: impl Into<MultiError>) -> MultiError {
    let mut merged = first.into();
    merged.merge(second);
    merged
}
