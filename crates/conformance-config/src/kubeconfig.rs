// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kubeconfig path resolution.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::ConfigError;

/// Expand a leading `~` to `home`.
///
/// Paths without a leading `~` are returned unchanged and never need a home
/// directory.
pub fn expand_tilde(path: &Path, home: Option<&Path>) -> Result<PathBuf, ConfigError> {
	let mut components = path.components();
	match components.next() {
		Some(Component::Normal(first)) if first == "~" => {
			let home = home.ok_or(ConfigError::HomeDirNotFound)?;
			Ok(home.join(components.as_path()))
		}
		_ => Ok(path.to_path_buf()),
	}
}

/// Resolve the kubeconfig path from explicit inputs.
///
/// Order: the configured path, then the first entry of `$KUBECONFIG`, then
/// `~/.kube/config`.
pub fn resolve_kubeconfig_with(
	configured: Option<&Path>,
	env_kubeconfig: Option<&OsStr>,
	home: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
	if let Some(path) = configured {
		debug!(path = %path.display(), "using configured kubeconfig");
		return expand_tilde(path, home);
	}

	if let Some(first) = env_kubeconfig
		.into_iter()
		.flat_map(std::env::split_paths)
		.find(|p| !p.as_os_str().is_empty())
	{
		debug!(path = %first.display(), "using kubeconfig from KUBECONFIG");
		return expand_tilde(&first, home);
	}

	let home = home.ok_or(ConfigError::HomeDirNotFound)?;
	Ok(home.join(".kube").join("config"))
}

/// Resolve the kubeconfig path against the process environment.
pub fn resolve_kubeconfig(configured: Option<&Path>) -> Result<PathBuf, ConfigError> {
	let env_kubeconfig = std::env::var_os("KUBECONFIG");
	let home = dirs::home_dir();
	resolve_kubeconfig_with(configured, env_kubeconfig.as_deref(), home.as_deref())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::ffi::OsString;

	fn home() -> PathBuf {
		PathBuf::from("/home/tester")
	}

	#[test]
	fn test_configured_path_wins() {
		let path = resolve_kubeconfig_with(
			Some(Path::new("/etc/kube/admin.conf")),
			Some(OsStr::new("/from/env")),
			Some(&home()),
		)
		.unwrap();
		assert_eq!(path, PathBuf::from("/etc/kube/admin.conf"));
	}

	#[test]
	fn test_configured_path_expands_tilde() {
		let path =
			resolve_kubeconfig_with(Some(Path::new("~/clusters/kind")), None, Some(&home())).unwrap();
		assert_eq!(path, PathBuf::from("/home/tester/clusters/kind"));
	}

	#[test]
	fn test_env_uses_first_entry() {
		let joined: OsString =
			std::env::join_paths(["/first/config", "/second/config"]).unwrap();
		let path = resolve_kubeconfig_with(None, Some(&joined), Some(&home())).unwrap();
		assert_eq!(path, PathBuf::from("/first/config"));
	}

	#[test]
	fn test_empty_env_falls_back_to_home() {
		let path = resolve_kubeconfig_with(None, Some(OsStr::new("")), Some(&home())).unwrap();
		assert_eq!(path, PathBuf::from("/home/tester/.kube/config"));
	}

	#[test]
	fn test_missing_home_is_an_error() {
		let result = resolve_kubeconfig_with(None, None, None);
		assert!(matches!(result, Err(ConfigError::HomeDirNotFound)));

		let result = resolve_kubeconfig_with(Some(Path::new("~/x")), None, None);
		assert!(matches!(result, Err(ConfigError::HomeDirNotFound)));
	}

	#[test]
	fn test_absolute_path_needs_no_home() {
		let path = expand_tilde(Path::new("/abs/config"), None).unwrap();
		assert_eq!(path, PathBuf::from("/abs/config"));

		let path = expand_tilde(Path::new("rel/~/config"), None).unwrap();
		assert_eq!(path, PathBuf::from("rel/~/config"));
	}
}
