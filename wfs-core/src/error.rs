//! Error kinds surfaced by the core to its callers.

use std::fmt;

/// The only two failure kinds the core ever produces. All other failures a POSIX filesystem might
/// report are conflated into one of these by path resolution, matching the original driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WfsError {
	/// A path component is missing, or a non-directory was encountered mid-path.
	NotFound,
	/// The inode bitmap, the data bitmap, or a directory's entry ceiling is exhausted.
	NoSpace,
}

impl fmt::Display for WfsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NotFound => write!(f, "no such file or directory"),
			Self::NoSpace => write!(f, "no space left on device"),
		}
	}
}

impl std::error::Error for WfsError {}
