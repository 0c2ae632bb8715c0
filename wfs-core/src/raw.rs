//! Low-level pointer arithmetic over the mapped image.
//!
//! Every function here is a thin, typed wrapper around pointer arithmetic identical in spirit to
//! the original C driver's `(struct wfs_inode *)(data_map + sb.i_blocks_ptr + ...)` casts. Callers
//! are responsible for the bounds invariants documented on each function; those invariants are
//! established once, at `Filesystem::mount` / `format`, by validating the superblock against the
//! buffer length, and preserved afterwards because `num_inodes`/`num_data_blocks` never change.

use crate::inode::{DirEntry, Inode};
use crate::layout::{Superblock, PTRS_PER_INDIRECT};

/// Returns a pointer to inode `idx`'s block in the inode table.
///
/// # Safety
/// `idx < sb.num_inodes` and `base` points to a buffer of at least `sb.required_image_size()`
/// bytes.
pub unsafe fn inode_ptr(base: *mut u8, sb: &Superblock, idx: u32) -> *mut Inode {
	base.add(sb.inode_addr(idx) as usize) as *mut Inode
}

/// Returns a pointer to the directory entry at slot `slot` of the block at absolute offset
/// `block_off`.
///
/// # Safety
/// `block_off` is a valid, `BLOCK_SIZE`-aligned data block offset and `slot < DirEntry::PER_BLOCK`.
pub unsafe fn dentry_ptr(base: *mut u8, block_off: u64, slot: usize) -> *mut DirEntry {
	(base.add(block_off as usize) as *mut DirEntry).add(slot)
}

/// Returns a pointer to the indirect block's pointer table at absolute offset `block_off`.
///
/// # Safety
/// `block_off` is a valid, `BLOCK_SIZE`-aligned data block offset.
pub unsafe fn indirect_ptr(base: *mut u8, block_off: u64) -> *mut [u64; PTRS_PER_INDIRECT] {
	base.add(block_off as usize) as *mut [u64; PTRS_PER_INDIRECT]
}

/// Returns a mutable byte slice over the inode bitmap.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes.
pub unsafe fn inode_bitmap<'a>(base: *mut u8, sb: &Superblock) -> &'a mut [u8] {
	std::slice::from_raw_parts_mut(base.add(sb.i_bitmap_ptr as usize), (sb.num_inodes / 8) as usize)
}

/// Returns a mutable byte slice over the data bitmap.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes.
pub unsafe fn data_bitmap<'a>(base: *mut u8, sb: &Superblock) -> &'a mut [u8] {
	std::slice::from_raw_parts_mut(
		base.add(sb.d_bitmap_ptr as usize),
		(sb.num_data_blocks / 8) as usize,
	)
}
