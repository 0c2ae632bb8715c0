//! Maps a file-relative block number to its absolute byte offset in the data region, walking
//! direct pointers and, for block numbers at or beyond `IND_BLOCK`, the single indirect block.

use crate::alloc;
use crate::error::WfsError;
use crate::inode::Inode;
use crate::layout::{Superblock, IND_BLOCK, PTRS_PER_INDIRECT};
use crate::raw;

/// Returns the absolute byte offset of file-relative block `blk` of `inode`, allocating it (and,
/// if needed, the indirect block) on demand when `allocate` is true. Returns `None` when
/// `allocate` is false and the block has never been written, or `Some(Err(NoSpace))`-equivalent
/// (via `Err`) when an allocation is required but the data bitmap is exhausted.
///
/// `inode` is read fresh by the caller before each call and written back afterwards if this
/// allocates, since block pointers may change.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes.
pub unsafe fn block_for(
	base: *mut u8,
	sb: &Superblock,
	inode: &mut Inode,
	blk: usize,
	allocate: bool,
) -> Result<Option<u64>, WfsError> {
	if blk < IND_BLOCK {
		return direct_block(base, sb, &mut inode.blocks[blk], allocate);
	}

	let ind_slot = blk - IND_BLOCK;
	if ind_slot >= PTRS_PER_INDIRECT {
		return Err(WfsError::NoSpace);
	}

	if inode.blocks[IND_BLOCK] == 0 {
		if !allocate {
			return Ok(None);
		}
		let off = alloc::alloc_dblock(base, sb).ok_or(WfsError::NoSpace)?;
		let table = std::slice::from_raw_parts_mut(base.add(off as usize), crate::layout::BLOCK_SIZE);
		table.fill(0);
		inode.blocks[IND_BLOCK] = off;
	}

	let table = raw::indirect_ptr(base, inode.blocks[IND_BLOCK]);
	direct_block(base, sb, &mut (*table)[ind_slot], allocate)
}

unsafe fn direct_block(
	base: *mut u8,
	sb: &Superblock,
	slot: &mut u64,
	allocate: bool,
) -> Result<Option<u64>, WfsError> {
	if *slot == 0 {
		if !allocate {
			return Ok(None);
		}
		let off = alloc::alloc_dblock(base, sb).ok_or(WfsError::NoSpace)?;
		let block = std::slice::from_raw_parts_mut(base.add(off as usize), crate::layout::BLOCK_SIZE);
		block.fill(0);
		*slot = off;
	}
	Ok(Some(*slot))
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::format;
	use crate::layout::S_IFREG;

	fn fresh_image(num_blocks: u32) -> (Vec<u8>, Superblock) {
		let sb = Superblock::compute(32, num_blocks);
		let mut data = vec![0u8; sb.required_image_size() as usize];
		format::format(&mut data, 32, num_blocks, 0, 0, 0).unwrap();
		(data, sb)
	}

	#[test]
	fn direct_block_not_allocated_returns_none() {
		let (mut data, sb) = fresh_image(128);
		let base = data.as_mut_ptr();
		let mut inode = Inode::new(S_IFREG | 0o644, 0, 0, 0);
		let off = unsafe { block_for(base, &sb, &mut inode, 0, false) }.unwrap();
		assert_eq!(off, None);
	}

	#[test]
	fn direct_block_allocates_and_is_idempotent() {
		let (mut data, sb) = fresh_image(128);
		let base = data.as_mut_ptr();
		let mut inode = Inode::new(S_IFREG | 0o644, 0, 0, 0);
		let off1 = unsafe { block_for(base, &sb, &mut inode, 3, true) }.unwrap().unwrap();
		let off2 = unsafe { block_for(base, &sb, &mut inode, 3, true) }.unwrap().unwrap();
		assert_eq!(off1, off2);
		assert_eq!(inode.blocks[3], off1);
	}

	#[test]
	fn indirect_block_allocates_table_then_data_block() {
		let (mut data, sb) = fresh_image(128);
		let base = data.as_mut_ptr();
		let mut inode = Inode::new(S_IFREG | 0o644, 0, 0, 0);
		let off = unsafe { block_for(base, &sb, &mut inode, IND_BLOCK, true) }.unwrap().unwrap();
		assert_ne!(inode.blocks[IND_BLOCK], 0);
		let table = unsafe { &*raw::indirect_ptr(base, inode.blocks[IND_BLOCK]) };
		assert_eq!(table[0], off);
	}

	#[test]
	fn indirect_slot_out_of_range_is_no_space() {
		let (mut data, sb) = fresh_image(128);
		let base = data.as_mut_ptr();
		let mut inode = Inode::new(S_IFREG | 0o644, 0, 0, 0);
		let err = unsafe {
			block_for(base, &sb, &mut inode, IND_BLOCK + PTRS_PER_INDIRECT, true)
		}
		.unwrap_err();
		assert_eq!(err, WfsError::NoSpace);
	}

	#[test]
	fn allocation_exhaustion_propagates_no_space() {
		let (mut data, sb) = fresh_image(32);
		let base = data.as_mut_ptr();
		// One block is already used by the root directory's bitmap accounting is separate (root
		// has no blocks allocated at format time), so all 32 data blocks are free here.
		let mut inode = Inode::new(S_IFREG | 0o644, 0, 0, 0);
		for i in 0..IND_BLOCK {
			unsafe { block_for(base, &sb, &mut inode, i, true) }.unwrap();
		}
		// The indirect table itself consumes one block; fill the rest of the data region.
		let remaining = 32 - IND_BLOCK;
		for i in 0..remaining - 1 {
			unsafe { block_for(base, &sb, &mut inode, IND_BLOCK + i, true) }.unwrap();
		}
		let err = unsafe { block_for(base, &sb, &mut inode, IND_BLOCK + remaining - 1, true) }
			.unwrap_err();
		assert_eq!(err, WfsError::NoSpace);
	}
}
