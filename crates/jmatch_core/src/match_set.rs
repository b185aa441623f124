//! The one-shot mutation facade over a match
//!
//! A [`MatchSet`] couples the reference produced by evaluating an expression
//! with the root variable of the document and a lifecycle flag: values can be
//! read any number of times until exactly one mutating operation has run;
//! after that every further operation fails. This keeps each match set bound
//! to one consistent snapshot of the document.

use serde_json::Value;

use crate::refs::{MutateError, Ref, RefError, VarRef};

/// Error performing an operation on a match set
#[derive(Debug)]
pub enum MatchSetError {
    /// The match set has already performed its one mutation
    AlreadyMutated,
    /// An operation failed at the reference level
    Ref(RefError),
    /// Region mutation was requested on a selection that is not all arrays
    RegionMutation { kind: &'static str },
}

impl std::fmt::Display for MatchSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchSetError::AlreadyMutated => {
                write!(f, "This match set has already been mutated once")
            }
            MatchSetError::Ref(err) => write!(f, "{err}"),
            MatchSetError::RegionMutation { kind } => {
                write!(
                    f,
                    "Cannot mutate regions of a {kind} ref. All selected values must be array members"
                )
            }
        }
    }
}

impl std::error::Error for MatchSetError {}

impl From<RefError> for MatchSetError {
    fn from(err: RefError) -> Self {
        MatchSetError::Ref(err)
    }
}

/// One match of an expression against a document, with functions for
/// extracting or mutating the matched values
#[derive(Debug)]
pub struct MatchSet {
    /// The variable holding the root value of the match
    root: VarRef,
    /// The ref describing the matched locations
    selection: Ref,
    /// True once the underlying value has been mutated
    mutated: bool,
}

impl MatchSet {
    pub(crate) fn new(root: VarRef, selection: Ref) -> Self {
        Self {
            root,
            selection,
            mutated: false,
        }
    }

    fn check_not_mutated(&self) -> Result<(), MatchSetError> {
        if self.mutated {
            return Err(MatchSetError::AlreadyMutated);
        }
        Ok(())
    }

    /// The reference describing the matched locations
    pub fn selection(&self) -> &Ref {
        &self.selection
    }

    /// All values selected by the match. Idempotent, but unavailable after a
    /// mutation.
    pub fn values(&self) -> Result<Vec<Value>, MatchSetError> {
        self.check_not_mutated()?;
        Ok(self.selection.values())
    }

    /// Set all selected values to the provided value and return the new
    /// document
    pub fn set(&mut self, value: Value) -> Result<Value, MatchSetError> {
        self.check_not_mutated()?;
        self.selection.set(&value)?;
        self.mutated = true;
        Ok(self.root.value())
    }

    /// Delete all selected values from the document and return the new
    /// document
    pub fn delete(&mut self) -> Result<Value, MatchSetError> {
        self.check_not_mutated()?;
        self.selection.delete()?;
        self.mutated = true;
        Ok(self.root.value())
    }

    /// Pass every selected value through the mutator, store the results and
    /// return the new document
    pub fn mutate(
        &mut self,
        mut mutator: impl FnMut(&str, Value) -> Result<Value, MutateError>,
    ) -> Result<Value, MatchSetError> {
        self.check_not_mutated()?;
        self.selection.mutate(&mut mutator)?;
        self.mutated = true;
        Ok(self.root.value())
    }

    /// Mutate each selected array region as a whole
    ///
    /// The current values arrive as one sub-list per contiguous region; the
    /// returned sub-lists are spliced back in their place and may differ in
    /// length, growing or shrinking the arrays accordingly. The main use case
    /// is splice-style operations like append and replace. Every selected
    /// reference must be an array reference; anything else is an error.
    pub fn mutate_regions(
        &mut self,
        mut mutator: impl FnMut(&str, Vec<Vec<Value>>) -> Result<Vec<Vec<Value>>, MutateError>,
    ) -> Result<Value, MatchSetError> {
        self.check_not_mutated()?;
        match &mut self.selection {
            Ref::Array(array) => array.mutate_regions(&mut mutator)?,
            Ref::Union(union) => {
                if let Some(other) = union.refs().iter().find(|r| !matches!(r, Ref::Array(_))) {
                    return Err(MatchSetError::RegionMutation { kind: other.kind() });
                }
                for member in union.refs_mut() {
                    if let Ref::Array(array) = member {
                        array.mutate_regions(&mut mutator)?;
                    }
                }
            }
            other => {
                return Err(MatchSetError::RegionMutation { kind: other.kind() });
            }
        }
        self.mutated = true;
        Ok(self.root.value())
    }
}
