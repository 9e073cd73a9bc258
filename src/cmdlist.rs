//! `CmdList` — immutable-append list of command tokens.
//!
//! `CmdList` intentionally does not implement `Extend`, `DerefMut`, or any
//! other trait that would let a caller push a token around validation.
//! `add` is the only way in; see `tests/ui/cmdlist_no_direct_mutation.rs`
//! for a compile-fail check that direct mutation isn't reachable.

use crate::error::RunError;
use std::collections::HashMap;

/// Items accepted by [`CmdList::add`]: either a single token or a sequence
/// of tokens, matching the original's "string or list of strings" contract.
pub enum Items {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for Items {
    fn from(s: &str) -> Self {
        Items::One(s.to_string())
    }
}

impl From<String> for Items {
    fn from(s: String) -> Self {
        Items::One(s)
    }
}

impl From<Vec<String>> for Items {
    fn from(v: Vec<String>) -> Self {
        Items::Many(v)
    }
}

impl From<&[&str]> for Items {
    fn from(v: &[&str]) -> Self {
        Items::Many(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Items {
    fn from(v: [&str; N]) -> Self {
        Items::Many(v.iter().map(|s| s.to_string()).collect())
    }
}

/// An ordered, validated sequence of command tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdList(Vec<String>);

impl CmdList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add one or more tokens to the command.
    ///
    /// - `tmpl_vals`, if given, `%(key)s`-substitutes each item before
    ///   validation.
    /// - If `allow_spaces` is false, any item containing an ASCII space is
    ///   rejected and nothing from this call is appended.
    pub fn add(
        &mut self,
        items: impl Into<Items>,
        tmpl_vals: Option<&HashMap<String, String>>,
        allow_spaces: bool,
    ) -> Result<(), RunError> {
        let items = match items.into() {
            Items::One(s) => vec![s],
            Items::Many(v) => v,
        };

        let mut rendered = Vec::with_capacity(items.len());
        for item in items {
            let item = match tmpl_vals {
                Some(vals) => crate::subst::percent_format(&item, vals),
                None => item,
            };
            if !allow_spaces && item.contains(' ') {
                return Err(RunError::SpaceInItem { item });
            }
            rendered.push(item);
        }

        self.0.extend(rendered);
        Ok(())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'a> IntoIterator for &'a CmdList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
