//! Path resolution: walking a `/`-separated path down from the root inode.

use crate::dir;
use crate::error::WfsError;
use crate::layout::Superblock;

/// Resolves `path` to an inode index, starting from the root (index 0).
///
/// `path` is always resolved relative to the root regardless of a leading `/`: empty components
/// (from a leading `/`, a trailing `/`, or a run of `//`) are ignored, so `"/a/b"`, `"a/b"`, and
/// `"//a//b/"` are all equivalent. The root itself resolves to `0` for `path == "/"` or `""`.
/// Every intermediate component must name a directory; the final component may name anything.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes laid out per `sb`.
pub unsafe fn lookup(base: *mut u8, sb: &Superblock, path: &str) -> Result<u32, WfsError> {
	let mut current = 0u32;
	for component in path.split('/').filter(|c| !c.is_empty()) {
		current = dir::find_entry(base, sb, current, component).ok_or(WfsError::NotFound)?;
	}
	Ok(current)
}

/// Splits an absolute path into its parent directory path and final component name.
///
/// `/` itself has no parent and returns `None`. `/a` splits into `("/", "a")`; `/a/b` splits into
/// `("/a", "b")`.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
	let trimmed = path.strip_suffix('/').unwrap_or(path);
	if trimmed.is_empty() {
		return None;
	}
	let slash = trimmed.rfind('/')?;
	let parent = &trimmed[..slash];
	let name = &trimmed[slash + 1..];
	if name.is_empty() {
		return None;
	}
	Some((if parent.is_empty() { "/" } else { parent }, name))
}

/// Resolves the parent directory of `path` and returns `(parent_inode_index, final_component)`.
///
/// # Safety
/// Same requirements as `lookup`.
pub unsafe fn lookup_parent<'p>(
	base: *mut u8,
	sb: &Superblock,
	path: &'p str,
) -> Result<(u32, &'p str), WfsError> {
	let (parent, name) = split_parent(path).ok_or(WfsError::NotFound)?;
	let parent_idx = lookup(base, sb, parent)?;
	Ok((parent_idx, name))
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::format;
	use crate::inode::Inode;
	use crate::layout::S_IFREG;

	fn fresh_image() -> (Vec<u8>, Superblock) {
		let sb = Superblock::compute(32, 32);
		let mut data = vec![0u8; sb.required_image_size() as usize];
		format::format(&mut data, 32, 32, 0, 0, 0).unwrap();
		(data, sb)
	}

	#[test]
	fn split_parent_cases() {
		assert_eq!(split_parent("/"), None);
		assert_eq!(split_parent("/a"), Some(("/", "a")));
		assert_eq!(split_parent("/a/b"), Some(("/a", "b")));
		assert_eq!(split_parent("/a/b/c"), Some(("/a/b", "c")));
		assert_eq!(split_parent("/a/"), Some(("/", "a")));
	}

	#[test]
	fn root_resolves_to_zero() {
		let (mut data, sb) = fresh_image();
		let idx = unsafe { lookup(data.as_mut_ptr(), &sb, "/") }.unwrap();
		assert_eq!(idx, 0);
		assert_eq!(unsafe { lookup(data.as_mut_ptr(), &sb, "") }.unwrap(), 0);
	}

	#[test]
	fn leading_slash_is_not_required() {
		let (mut data, sb) = fresh_image();
		let base = data.as_mut_ptr();
		let child = unsafe { crate::alloc::alloc_inode(base, &sb) }.unwrap();
		let mut inode = Inode::new(S_IFREG | 0o644, 0, 0, 0);
		inode.num = child;
		unsafe {
			std::ptr::write_unaligned(crate::raw::inode_ptr(base, &sb, child), inode);
		}
		unsafe { dir::add_entry(base, &sb, 0, "file.txt", child) }.unwrap();

		assert_eq!(unsafe { lookup(base, &sb, "/file.txt") }, Ok(child));
		assert_eq!(unsafe { lookup(base, &sb, "file.txt") }, Ok(child));
		assert_eq!(unsafe { lookup(base, &sb, "//file.txt") }, Ok(child));
		assert_eq!(unsafe { lookup(base, &sb, "file.txt/") }, Ok(child));
	}

	#[test]
	fn missing_path_is_not_found() {
		let (mut data, sb) = fresh_image();
		let err = unsafe { lookup(data.as_mut_ptr(), &sb, "/nope") }.unwrap_err();
		assert_eq!(err, WfsError::NotFound);
	}

	#[test]
	fn nested_lookup_walks_each_component() {
		let (mut data, sb) = fresh_image();
		let base = data.as_mut_ptr();
		let child = unsafe { crate::alloc::alloc_inode(base, &sb) }.unwrap();
		let mut inode = Inode::new(S_IFREG | 0o644, 0, 0, 0);
		inode.num = child;
		unsafe {
			std::ptr::write_unaligned(crate::raw::inode_ptr(base, &sb, child), inode);
		}
		unsafe { dir::add_entry(base, &sb, 0, "file.txt", child) }.unwrap();

		let idx = unsafe { lookup(base, &sb, "/file.txt") }.unwrap();
		assert_eq!(idx, child);
	}

	#[test]
	fn component_through_non_directory_is_not_found() {
		let (mut data, sb) = fresh_image();
		let base = data.as_mut_ptr();
		let child = unsafe { crate::alloc::alloc_inode(base, &sb) }.unwrap();
		let mut inode = Inode::new(S_IFREG | 0o644, 0, 0, 0);
		inode.num = child;
		unsafe {
			std::ptr::write_unaligned(crate::raw::inode_ptr(base, &sb, child), inode);
		}
		unsafe { dir::add_entry(base, &sb, 0, "file.txt", child) }.unwrap();

		let err = unsafe { lookup(base, &sb, "/file.txt/nested") }.unwrap_err();
		assert_eq!(err, WfsError::NotFound);
	}

	#[test]
	fn lookup_parent_splits_correctly() {
		let (mut data, sb) = fresh_image();
		let (idx, name) = unsafe { lookup_parent(data.as_mut_ptr(), &sb, "/a") }.unwrap();
		assert_eq!(idx, 0);
		assert_eq!(name, "a");
	}
}
