//! Directory contents: a packed array of `DirEntry`s spread across a directory inode's direct
//! blocks, addressed by a linear index `0..nlinks`. There is no tombstone scanning: `nlinks` is the
//! exact count of live entries, and removal swaps the last live entry into the removed slot so the
//! packed range never develops holes.

use crate::alloc;
use crate::error::WfsError;
use crate::inode::{DirEntry, Inode, MAX_DIR_ENTRIES};
use crate::layout::Superblock;
use crate::raw;

fn slot_for(idx: u32) -> (usize, usize) {
	let idx = idx as usize;
	(idx / DirEntry::PER_BLOCK, idx % DirEntry::PER_BLOCK)
}

/// Reads the directory entry at linear index `idx` of directory inode `dir_inode`.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes; `dir_inode.is_dir()`
/// and `idx < dir_inode.nlinks`.
unsafe fn read_entry(base: *mut u8, dir_inode: &Inode, idx: u32) -> DirEntry {
	let (block, slot) = slot_for(idx);
	let block_off = dir_inode.blocks[block];
	std::ptr::read_unaligned(raw::dentry_ptr(base, block_off, slot))
}

/// Writes `entry` at linear index `idx` of directory inode `dir_inode`.
///
/// # Safety
/// Same as `read_entry`.
unsafe fn write_entry(base: *mut u8, dir_inode: &Inode, idx: u32, entry: DirEntry) {
	let (block, slot) = slot_for(idx);
	let block_off = dir_inode.blocks[block];
	std::ptr::write_unaligned(raw::dentry_ptr(base, block_off, slot), entry);
}

/// Looks up `name` in directory `dir_idx`, returning the inode index it refers to.
///
/// Returns `None` if `dir_idx` does not name a directory, or the directory has no entry `name`.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes.
pub unsafe fn find_entry(base: *mut u8, sb: &Superblock, dir_idx: u32, name: &str) -> Option<u32> {
	let dir_inode = std::ptr::read_unaligned(raw::inode_ptr(base, sb, dir_idx));
	if !dir_inode.is_dir() {
		return None;
	}
	for idx in 0..dir_inode.nlinks {
		let entry = read_entry(base, &dir_inode, idx);
		if entry.name_eq(name) {
			return Some(entry.num);
		}
	}
	None
}

/// Inserts an entry named `name` pointing at inode `child_idx` into directory `dir_idx`.
///
/// No check is made for a pre-existing entry with the same name: inserting a duplicate creates a
/// second, unreachable-by-name-lookup-order entry rather than replacing the first, matching the
/// original driver's behavior.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes, and `dir_idx` names a
/// directory.
pub unsafe fn add_entry(
	base: *mut u8,
	sb: &Superblock,
	dir_idx: u32,
	name: &str,
	child_idx: u32,
) -> Result<(), WfsError> {
	let mut dir_inode = std::ptr::read_unaligned(raw::inode_ptr(base, sb, dir_idx));
	if !dir_inode.is_dir() {
		return Err(WfsError::NotFound);
	}
	if dir_inode.nlinks >= MAX_DIR_ENTRIES {
		return Err(WfsError::NoSpace);
	}

	let (block, _slot) = slot_for(dir_inode.nlinks);
	if dir_inode.blocks[block] == 0 {
		let off = alloc::alloc_dblock(base, sb).ok_or(WfsError::NoSpace)?;
		let zeroed = std::slice::from_raw_parts_mut(
			base.add(off as usize),
			crate::layout::BLOCK_SIZE,
		);
		zeroed.fill(0);
		dir_inode.blocks[block] = off;
	}

	write_entry(base, &dir_inode, dir_inode.nlinks, DirEntry::new(name, child_idx));
	dir_inode.nlinks += 1;
	std::ptr::write_unaligned(raw::inode_ptr(base, sb, dir_idx), dir_inode);
	Ok(())
}

/// Removes the entry named `name` from directory `dir_idx` by swapping the last live entry into
/// its slot and shrinking `nlinks`. If the swap empties out the last entry's block, that block is
/// freed. Does not check whether the removed entry refers to a non-empty directory — callers
/// (`ops::rmdir`) are responsible for that.
///
/// Returns the inode index the removed entry referred to, or `None` if no such entry exists.
///
/// # Safety
/// Same requirements as `add_entry`.
pub unsafe fn remove_entry(
	base: *mut u8,
	sb: &Superblock,
	dir_idx: u32,
	name: &str,
) -> Option<u32> {
	let mut dir_inode = std::ptr::read_unaligned(raw::inode_ptr(base, sb, dir_idx));
	if !dir_inode.is_dir() {
		return None;
	}

	let mut found = None;
	for idx in 0..dir_inode.nlinks {
		let entry = read_entry(base, &dir_inode, idx);
		if entry.name_eq(name) {
			found = Some((idx, entry.num));
			break;
		}
	}
	let (idx, removed_num) = found?;

	let last = dir_inode.nlinks - 1;
	if idx != last {
		let last_entry = read_entry(base, &dir_inode, last);
		write_entry(base, &dir_inode, idx, last_entry);
	}
	// The slot just vacated by the swap was the only entry left in its block: free that block.
	if last % DirEntry::PER_BLOCK as u32 == 0 && last > 0 {
		let (block, _) = slot_for(last);
		let block_off = dir_inode.blocks[block];
		alloc::free_dblock(base, sb, block_off);
		dir_inode.blocks[block] = 0;
	}
	dir_inode.nlinks = last;
	std::ptr::write_unaligned(raw::inode_ptr(base, sb, dir_idx), dir_inode);
	Some(removed_num)
}
