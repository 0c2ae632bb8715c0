//! Inode and data-block allocation via bitmap scans.
//!
//! Both allocators use the same lowest-free-index scan (see `bitmap::alloc_first_clear`), giving
//! deterministic allocation order. Inode index 0 is never handed out because the formatter marks
//! it permanently allocated for the root directory.

use crate::bitmap;
use crate::layout::Superblock;
use crate::raw;

/// Allocates a free inode and returns its index, or `None` if the inode bitmap is exhausted.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes.
pub unsafe fn alloc_inode(base: *mut u8, sb: &Superblock) -> Option<u32> {
	let bm = raw::inode_bitmap(base, sb);
	bitmap::alloc_first_clear(bm, sb.num_inodes as usize).map(|k| k as u32)
}

/// Allocates a free data block and returns its absolute byte offset, or `None` if the data bitmap
/// is exhausted.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes.
pub unsafe fn alloc_dblock(base: *mut u8, sb: &Superblock) -> Option<u64> {
	let bm = raw::data_bitmap(base, sb);
	let k = bitmap::alloc_first_clear(bm, sb.num_data_blocks as usize)?;
	Some(sb.block_addr(k as u64))
}

/// Frees the data block at absolute byte offset `off`.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes and `off` is a valid
/// data block offset previously returned by `alloc_dblock`.
pub unsafe fn free_dblock(base: *mut u8, sb: &Superblock, off: u64) {
	let bm = raw::data_bitmap(base, sb);
	let k = sb.block_index_of(off);
	bitmap::clear(bm, k as usize);
}

/// Frees inode `idx`'s bitmap bit.
///
/// # Safety
/// `base` points to a buffer of at least `sb.required_image_size()` bytes.
pub unsafe fn free_inode(base: *mut u8, sb: &Superblock, idx: u32) {
	let bm = raw::inode_bitmap(base, sb);
	bitmap::clear(bm, idx as usize);
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::format;

	fn fresh_image() -> (Vec<u8>, Superblock) {
		let sb = Superblock::compute(32, 32);
		let mut data = vec![0u8; sb.required_image_size() as usize];
		format::format(&mut data, 32, 32, 0, 0, 0).unwrap();
		(data, sb)
	}

	#[test]
	fn alloc_inode_skips_root() {
		let (mut data, sb) = fresh_image();
		let idx = unsafe { alloc_inode(data.as_mut_ptr(), &sb) }.unwrap();
		assert_eq!(idx, 1);
	}

	#[test]
	fn alloc_dblock_returns_absolute_offset() {
		let (mut data, sb) = fresh_image();
		let off = unsafe { alloc_dblock(data.as_mut_ptr(), &sb) }.unwrap();
		assert_eq!(off, sb.d_blocks_ptr);
		let off2 = unsafe { alloc_dblock(data.as_mut_ptr(), &sb) }.unwrap();
		assert_eq!(off2, sb.d_blocks_ptr + crate::layout::BLOCK_SIZE as u64);
	}

	#[test]
	fn free_then_realloc_reuses_lowest_index() {
		let (mut data, sb) = fresh_image();
		let base = data.as_mut_ptr();
		let a = unsafe { alloc_dblock(base, &sb) }.unwrap();
		let _b = unsafe { alloc_dblock(base, &sb) }.unwrap();
		unsafe { free_dblock(base, &sb, a) };
		let c = unsafe { alloc_dblock(base, &sb) }.unwrap();
		assert_eq!(c, a);
	}

	#[test]
	fn exhaustion_returns_none() {
		let (mut data, sb) = fresh_image();
		let base = data.as_mut_ptr();
		for _ in 0..32 {
			unsafe { alloc_dblock(base, &sb) }.unwrap();
		}
		assert_eq!(unsafe { alloc_dblock(base, &sb) }, None);
	}
}
