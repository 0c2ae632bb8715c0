//! Top-level filesystem operations, each built from `path`/`dir`/`blockmap`/`alloc` primitives.
//!
//! Every function here takes a freshly-resolved inode index rather than a path; path resolution
//! happens once, at the call site (`Filesystem` in `lib.rs`), the same split the original driver
//! makes between its FUSE callbacks and its internal helpers.

use crate::alloc;
use crate::blockmap;
use crate::dir;
use crate::error::WfsError;
use crate::inode::{DirEntry, Inode};
use crate::layout::{Superblock, IND_BLOCK, PTRS_PER_INDIRECT};
use crate::raw;

/// Largest file size this format can represent: `IND_BLOCK` direct blocks plus
/// `PTRS_PER_INDIRECT` indirect blocks.
pub const MAX_FILE_BLOCKS: u64 = IND_BLOCK as u64 + PTRS_PER_INDIRECT as u64;

/// Reads the inode at `idx`.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes and `idx` is in range.
pub unsafe fn getattr(base: *mut u8, sb: &Superblock, idx: u32) -> Inode {
	std::ptr::read_unaligned(raw::inode_ptr(base, sb, idx))
}

/// Lists the (name, inode index) pairs in directory `dir_idx`.
///
/// # Safety
/// Same as `getattr`; `dir_idx` names a directory.
pub unsafe fn readdir(base: *mut u8, sb: &Superblock, dir_idx: u32) -> Vec<(String, u32)> {
	let dir_inode = getattr(base, sb, dir_idx);
	let mut out = Vec::with_capacity(dir_inode.nlinks as usize);
	for idx in 0..dir_inode.nlinks {
		let (block, slot) = (
			idx as usize / DirEntry::PER_BLOCK,
			idx as usize % DirEntry::PER_BLOCK,
		);
		let entry: DirEntry =
			std::ptr::read_unaligned(raw::dentry_ptr(base, dir_inode.blocks[block], slot));
		out.push((entry.name_str(), entry.num));
	}
	out
}

/// Creates a new inode of the given `mode` as `name` inside `parent_idx`, returning its index.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes; `parent_idx` names a
/// directory.
pub unsafe fn create(
	base: *mut u8,
	sb: &Superblock,
	parent_idx: u32,
	name: &str,
	mode: u32,
	uid: u32,
	gid: u32,
	now: i64,
) -> Result<u32, WfsError> {
	let child_idx = alloc::alloc_inode(base, sb).ok_or(WfsError::NoSpace)?;
	let mut child = Inode::new(mode, uid, gid, now);
	child.num = child_idx;
	std::ptr::write_unaligned(raw::inode_ptr(base, sb, child_idx), child);

	if let Err(e) = dir::add_entry(base, sb, parent_idx, name, child_idx) {
		// The inode allocated above is leaked here, matching the original driver: it never rolls
		// back a successful inode allocation when the subsequent directory insert fails.
		return Err(e);
	}
	Ok(child_idx)
}

/// Creates directory `name` inside `parent_idx`. Thin wrapper over `create` with `S_IFDIR` set.
///
/// # Safety
/// Same as `create`.
pub unsafe fn mkdir(
	base: *mut u8,
	sb: &Superblock,
	parent_idx: u32,
	name: &str,
	mode: u32,
	uid: u32,
	gid: u32,
	now: i64,
) -> Result<u32, WfsError> {
	create(
		base,
		sb,
		parent_idx,
		name,
		mode | crate::layout::S_IFDIR,
		uid,
		gid,
		now,
	)
}

/// Removes directory entry `name` from `parent_idx` and frees the inode and data blocks it
/// referred to, provided it is not itself a directory. Use `rmdir` for directories.
///
/// # Safety
/// Same as `create`.
pub unsafe fn unlink(base: *mut u8, sb: &Superblock, parent_idx: u32, name: &str) -> Result<(), WfsError> {
	let child_idx = dir::remove_entry(base, sb, parent_idx, name).ok_or(WfsError::NotFound)?;
	free_inode_and_blocks(base, sb, child_idx);
	Ok(())
}

/// Removes directory entry `name` from `parent_idx` and frees the directory inode it referred to.
///
/// Does not check whether the directory is empty before removing it — entries it still held
/// become unreachable (their inodes and blocks stay marked allocated), matching the original
/// driver's `rmdir`. Unlike `unlink`, only `blocks[0]` is freed rather than every block the
/// directory held: a deliberately preserved asymmetry with `unlink` (see spec's "known warts"),
/// not an oversight. Any further blocks the directory had allocated (entries beyond the 16th)
/// leak, same as the original.
///
/// # Safety
/// Same as `create`.
pub unsafe fn rmdir(base: *mut u8, sb: &Superblock, parent_idx: u32, name: &str) -> Result<(), WfsError> {
	let child_idx = dir::remove_entry(base, sb, parent_idx, name).ok_or(WfsError::NotFound)?;
	let inode = getattr(base, sb, child_idx);
	if inode.blocks[0] != 0 {
		alloc::free_dblock(base, sb, inode.blocks[0]);
	}
	alloc::free_inode(base, sb, child_idx);
	Ok(())
}

unsafe fn free_inode_and_blocks(base: *mut u8, sb: &Superblock, idx: u32) {
	let inode = getattr(base, sb, idx);
	for &b in inode.blocks[..IND_BLOCK].iter() {
		if b != 0 {
			alloc::free_dblock(base, sb, b);
		}
	}
	let ind = inode.blocks[IND_BLOCK];
	if ind != 0 {
		let table = &*raw::indirect_ptr(base, ind);
		for &b in table.iter() {
			if b != 0 {
				alloc::free_dblock(base, sb, b);
			}
		}
		alloc::free_dblock(base, sb, ind);
	}
	alloc::free_inode(base, sb, idx);
}

/// Reads up to `buf.len()` bytes from file `idx` starting at `offset`, returning the number of
/// bytes actually read (fewer than `buf.len()` at end-of-file).
///
/// # Safety
/// Same as `create`.
pub unsafe fn read(base: *mut u8, sb: &Superblock, idx: u32, offset: u64, buf: &mut [u8]) -> usize {
	let inode = getattr(base, sb, idx);
	if offset >= inode.size {
		return 0;
	}
	let to_read = buf.len().min((inode.size - offset) as usize);
	let mut done = 0;
	while done < to_read {
		let pos = offset + done as u64;
		let blk = (pos / crate::layout::BLOCK_SIZE as u64) as usize;
		let in_block = (pos % crate::layout::BLOCK_SIZE as u64) as usize;
		let mut inode_copy = inode;
		let Ok(Some(block_off)) = blockmap::block_for(base, sb, &mut inode_copy, blk, false) else {
			break;
		};
		let chunk = (crate::layout::BLOCK_SIZE - in_block).min(to_read - done);
		let src = std::slice::from_raw_parts(base.add(block_off as usize + in_block), chunk);
		buf[done..done + chunk].copy_from_slice(src);
		done += chunk;
	}
	done
}

/// Writes `data` to file `idx` starting at `offset`, growing the file and allocating blocks as
/// needed. Returns the number of bytes written on success. On `NoSpace` (either bitmap exhausted,
/// or the write reaches a block at or beyond `MAX_FILE_BLOCKS`), whatever in-bounds prefix was
/// already written is still persisted and the inode's `size` reflects it; only the unwritten
/// remainder is lost.
///
/// # Safety
/// Same as `create`.
pub unsafe fn write(
	base: *mut u8,
	sb: &Superblock,
	idx: u32,
	offset: u64,
	data: &[u8],
	now: i64,
) -> Result<usize, WfsError> {
	let mut inode = getattr(base, sb, idx);
	let mut done = 0;
	let mut failure = None;
	while done < data.len() {
		let pos = offset + done as u64;
		let blk = (pos / crate::layout::BLOCK_SIZE as u64) as usize;
		let in_block = (pos % crate::layout::BLOCK_SIZE as u64) as usize;
		let block_off = match blockmap::block_for(base, sb, &mut inode, blk, true) {
			Ok(off) => off.expect("block_for always returns Some when allocate=true and no error"),
			Err(e) => {
				failure = Some(e);
				break;
			}
		};
		let chunk = (crate::layout::BLOCK_SIZE - in_block).min(data.len() - done);
		let dst = std::slice::from_raw_parts_mut(base.add(block_off as usize + in_block), chunk);
		dst.copy_from_slice(&data[done..done + chunk]);
		done += chunk;
	}

	// Persist whatever was written (and any blocks allocated to hold it) even on failure: a
	// partial write leaves the file extended up to the last successfully written byte, and any
	// newly allocated block pointers must be saved or the blocks they name become unreferenced.
	// If nothing was written (done == 0, e.g. the very first byte's block allocation failed),
	// the file must not grow at all.
	if done > 0 {
		let written_end = offset + done as u64;
		if written_end > inode.size {
			inode.size = written_end;
		}
	}
	inode.mtim = now;
	inode.ctim = now;
	std::ptr::write_unaligned(raw::inode_ptr(base, sb, idx), inode);

	match failure {
		Some(e) => Err(e),
		None => Ok(done),
	}
}
