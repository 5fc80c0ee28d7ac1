// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! On-disk credential material.

use serde::{Deserialize, Deserializer};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Default mode for credential files.
pub const DEFAULT_MODE: u32 = 0o600;

/// A file holding credential material.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so readers never observe a partially written
/// certificate or key and a failed write leaves the old material intact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialFile {
	pub path: PathBuf,
	#[serde(default = "default_mode", deserialize_with = "deserialize_mode")]
	pub mode: u32,
}

fn default_mode() -> u32 {
	DEFAULT_MODE
}

/// Accepts `0o640` integers as well as `"0640"` strings.
fn deserialize_mode<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Mode {
		Number(u32),
		Octal(String),
	}

	match Mode::deserialize(deserializer)? {
		Mode::Number(mode) => Ok(mode),
		Mode::Octal(text) => {
			let digits = text.trim_start_matches("0o");
			u32::from_str_radix(digits, 8)
				.map_err(|_| serde::de::Error::custom(format!("invalid file mode {text:?}")))
		}
	}
}

impl CredentialFile {
	pub fn new(path: impl Into<PathBuf>, mode: u32) -> Self {
		Self {
			path: path.into(),
			mode,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Atomically replaces the file contents.
	pub fn write(&self, content: &str) -> io::Result<()> {
		self.stage(content)?.commit()
	}

	/// Writes `content` next to the target without replacing it. The
	/// target changes only on [`StagedFile::commit`]; dropping the staged
	/// file discards it.
	pub fn stage(&self, content: &str) -> io::Result<StagedFile> {
		let dir = match self.path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent,
			_ => Path::new("."),
		};
		fs::create_dir_all(dir)?;

		let mut tmp = tempfile::Builder::new()
			.prefix(".credmanager-")
			.tempfile_in(dir)?;
		tmp.write_all(content.as_bytes())?;
		tmp.as_file().sync_all()?;
		set_mode(tmp.path(), self.mode)?;
		Ok(StagedFile {
			tmp,
			target: self.path.clone(),
		})
	}

	/// Contents of the file, or `None` if it does not exist.
	pub fn read(&self) -> io::Result<Option<String>> {
		match fs::read_to_string(&self.path) {
			Ok(content) => Ok(Some(content)),
			Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err),
		}
	}
}

/// Fully written replacement for a [`CredentialFile`].
#[derive(Debug)]
pub struct StagedFile {
	tmp: NamedTempFile,
	target: PathBuf,
}

impl StagedFile {
	pub fn target(&self) -> &Path {
		&self.target
	}

	/// Renames the staged content over the target.
	pub fn commit(self) -> io::Result<()> {
		self.tmp.persist(&self.target).map_err(|e| e.error)?;
		Ok(())
	}
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
	Ok(())
}
