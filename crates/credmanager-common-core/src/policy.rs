// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Sets of Vault policy names.
//!
//! Admission uses [`PolicySet::is_subset_of`] to refuse requests that ask for
//! more than a node's role allows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An ordered set of policy names. Duplicate inserts are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicySet(BTreeSet<String>);

impl PolicySet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a policy, returning `false` if it was already present.
	pub fn add(&mut self, policy: impl Into<String>) -> bool {
		self.0.insert(policy.into())
	}

	pub fn contains(&self, policy: &str) -> bool {
		self.0.contains(policy)
	}

	/// True iff every policy in `self` is also in `other`. The empty set is a
	/// subset of everything.
	pub fn is_subset_of(&self, other: &PolicySet) -> bool {
		self.0.is_subset(&other.0)
	}

	/// Policies in `self` that `other` does not contain.
	pub fn difference(&self, other: &PolicySet) -> Vec<String> {
		self.0.difference(&other.0).cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Sorted list form, as sent to Vault.
	pub fn to_vec(&self) -> Vec<String> {
		self.0.iter().cloned().collect()
	}
}

impl<S: Into<String>> FromIterator<S> for PolicySet {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self(iter.into_iter().map(Into::into).collect())
	}
}

impl<S: Into<String>> Extend<S> for PolicySet {
	fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
		self.0.extend(iter.into_iter().map(Into::into));
	}
}

impl fmt::Display for PolicySet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut first = true;
		for policy in &self.0 {
			if !first {
				f.write_str(",")?;
			}
			f.write_str(policy)?;
			first = false;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn set(items: &[&str]) -> PolicySet {
		items.iter().copied().collect()
	}

	#[test]
	fn subset_of_superset() {
		assert!(set(&["a", "b"]).is_subset_of(&set(&["a", "b", "c"])));
	}

	#[test]
	fn not_subset_when_element_missing() {
		let requested = set(&["a", "d"]);
		let allowed = set(&["a", "b", "c"]);
		assert!(!requested.is_subset_of(&allowed));
		assert_eq!(requested.difference(&allowed), vec!["d".to_string()]);
	}

	#[test]
	fn empty_set_is_subset_of_anything() {
		assert!(PolicySet::new().is_subset_of(&PolicySet::new()));
		assert!(PolicySet::new().is_subset_of(&set(&["a"])));
		assert!(!set(&["a"]).is_subset_of(&PolicySet::new()));
	}

	#[test]
	fn duplicate_add_is_noop() {
		let mut policies = PolicySet::new();
		assert!(policies.add("ssh-cert"));
		assert!(!policies.add("ssh-cert"));
		assert_eq!(policies.len(), 1);
	}

	#[test]
	fn display_and_vec_are_sorted() {
		let policies = set(&["zeta", "alpha", "mid", "alpha"]);
		assert_eq!(policies.to_string(), "alpha,mid,zeta");
		assert_eq!(policies.to_vec(), vec!["alpha", "mid", "zeta"]);
	}

	#[test]
	fn serializes_as_json_list() {
		let policies = set(&["b", "a"]);
		assert_eq!(serde_json::to_string(&policies).unwrap(), r#"["a","b"]"#);
		let back: PolicySet = serde_json::from_str(r#"["x","x","y"]"#).unwrap();
		assert_eq!(back, set(&["x", "y"]));
	}

	proptest! {
		#[test]
		fn set_is_subset_of_its_union(
			a in prop::collection::vec("[a-z]{1,6}", 0..8),
			b in prop::collection::vec("[a-z]{1,6}", 0..8),
		) {
			let left: PolicySet = a.iter().cloned().collect();
			let mut union = left.clone();
			union.extend(b.iter().cloned());
			prop_assert!(left.is_subset_of(&union));
		}

		#[test]
		fn subset_matches_difference(
			a in prop::collection::vec("[a-c]", 0..4),
			b in prop::collection::vec("[a-c]", 0..4),
		) {
			let left: PolicySet = a.iter().cloned().collect();
			let right: PolicySet = b.iter().cloned().collect();
			prop_assert_eq!(left.is_subset_of(&right), left.difference(&right).is_empty());
		}
	}
}
