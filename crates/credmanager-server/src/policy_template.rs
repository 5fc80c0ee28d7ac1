// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-node ACL policy documents.
//!
//! Templates substitute `{{ node.<field> }}` placeholders, where field is
//! `id`, `hostname`, `role`, `system` or `attributes.<key>`. Nothing else is
//! evaluated.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

use crate::inventory::Node;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").unwrap());

/// Built-in policy granting a node read access to its role's and its own
/// secrets, plus self-renewal.
pub const DEFAULT_POLICY_TEMPLATE: &str = r#"# Managed by credmanager for {{ node.hostname }}
path "secret/data/roles/{{ node.role }}/*" {
  capabilities = ["read", "list"]
}

path "secret/data/nodes/{{ node.id }}/*" {
  capabilities = ["read", "list"]
}

path "auth/token/renew-self" {
  capabilities = ["update"]
}

path "auth/token/lookup-self" {
  capabilities = ["read"]
}
"#;

#[derive(Debug, Error)]
pub enum TemplateError {
	#[error("unsupported placeholder {{{{ {0} }}}}")]
	UnknownField(String),

	#[error("node {node} has no attribute {key}")]
	MissingAttribute { node: String, key: String },

	#[error("failed to read policy template {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
	Id,
	Hostname,
	Role,
	System,
	Attribute(String),
}

impl Field {
	fn parse(expr: &str) -> Result<Self, TemplateError> {
		let unknown = || TemplateError::UnknownField(expr.to_string());
		let field = expr.strip_prefix("node.").ok_or_else(unknown)?;
		match field {
			"id" => Ok(Field::Id),
			"hostname" => Ok(Field::Hostname),
			"role" => Ok(Field::Role),
			"system" => Ok(Field::System),
			other => match other.strip_prefix("attributes.") {
				Some(key) if !key.is_empty() => Ok(Field::Attribute(key.to_string())),
				_ => Err(unknown()),
			},
		}
	}

	fn value<'a>(&self, node: &'a Node) -> Result<&'a str, TemplateError> {
		match self {
			Field::Id => Ok(&node.id),
			Field::Hostname => Ok(&node.hostname),
			Field::Role => Ok(&node.role),
			Field::System => Ok(&node.system),
			Field::Attribute(key) => node.attributes.get(key).map(String::as_str).ok_or_else(|| {
				TemplateError::MissingAttribute {
					node: node.id.clone(),
					key: key.clone(),
				}
			}),
		}
	}
}

#[derive(Debug, Clone)]
pub struct PolicyTemplate {
	source: String,
}

impl PolicyTemplate {
	/// Checks every placeholder up front so a bad template fails at startup.
	pub fn new(source: impl Into<String>) -> Result<Self, TemplateError> {
		let source = source.into();
		for caps in PLACEHOLDER.captures_iter(&source) {
			Field::parse(&caps[1])?;
		}
		Ok(Self { source })
	}

	pub fn load(path: &Path) -> Result<Self, TemplateError> {
		let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
			path: path.display().to_string(),
			source,
		})?;
		Self::new(source)
	}

	pub fn render(&self, node: &Node) -> Result<String, TemplateError> {
		let mut out = String::with_capacity(self.source.len());
		let mut last = 0;
		for caps in PLACEHOLDER.captures_iter(&self.source) {
			let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
			out.push_str(&self.source[last..whole.start]);
			out.push_str(Field::parse(&caps[1])?.value(node)?);
			last = whole.end;
		}
		out.push_str(&self.source[last..]);
		Ok(out)
	}
}

impl Default for PolicyTemplate {
	fn default() -> Self {
		Self {
			source: DEFAULT_POLICY_TEMPLATE.to_string(),
		}
	}
}
