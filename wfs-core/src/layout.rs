//! On-disk layout constants and the superblock structure.
//!
//! The layout is strictly: superblock, inode bitmap, data bitmap, inode table, data region. All
//! block pointers inside inodes are absolute byte offsets into the image, not block indices, which
//! is why `block_index_of`/`block_addr` exist: they are the only place that converts between the
//! two.

use std::mem::size_of;

/// Size of a block, in bytes. Every inode occupies exactly one block; every directory entry block
/// and indirect-pointer block is exactly this size.
pub const BLOCK_SIZE: usize = 512;

/// Number of block pointer slots in an inode.
pub const N_BLOCKS: usize = 8;

/// Index of the single-indirect pointer slot. Slots `0..IND_BLOCK` are direct.
pub const IND_BLOCK: usize = N_BLOCKS - 1;

/// Maximum length of a directory entry's name, in bytes.
pub const MAX_NAME_LEN: usize = 28;

/// Number of `u64` block-offset entries that fit in one indirect block.
pub const PTRS_PER_INDIRECT: usize = BLOCK_SIZE / size_of::<u64>();

/// File mode bit: directory.
pub const S_IFDIR: u32 = 0o040000;
/// File mode bit: regular file.
pub const S_IFREG: u32 = 0o100000;
/// Mask isolating the file-type bits of a mode.
pub const S_IFMT: u32 = 0o170000;

/// The superblock. Lives at offset 0 of the image.
///
/// Field order is chosen so that the natural `#[repr(C)]` layout already has no padding: all
/// `u64` offsets precede the two `u32` counts.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Superblock {
	/// Byte offset of the inode bitmap.
	pub i_bitmap_ptr: u64,
	/// Byte offset of the data bitmap.
	pub d_bitmap_ptr: u64,
	/// Byte offset of the inode table.
	pub i_blocks_ptr: u64,
	/// Byte offset of the data region.
	pub d_blocks_ptr: u64,
	/// Total number of inodes. Always a multiple of 32.
	pub num_inodes: u32,
	/// Total number of data blocks. Always a multiple of 32.
	pub num_data_blocks: u32,
}

const _: () = assert!(size_of::<Superblock>() == 40);

impl Superblock {
	/// Computes the four region offsets for a filesystem with the given (already rounded) inode
	/// and data block counts.
	pub fn compute(num_inodes: u32, num_data_blocks: u32) -> Self {
		let i_bitmap_ptr = size_of::<Superblock>() as u64;
		let d_bitmap_ptr = i_bitmap_ptr + (num_inodes / 8) as u64;
		let i_blocks_ptr = d_bitmap_ptr + (num_data_blocks / 8) as u64;
		let d_blocks_ptr = i_blocks_ptr + num_inodes as u64 * BLOCK_SIZE as u64;
		Self {
			i_bitmap_ptr,
			d_bitmap_ptr,
			i_blocks_ptr,
			d_blocks_ptr,
			num_inodes,
			num_data_blocks,
		}
	}

	/// Returns the size in bytes the image must have for this layout to fit.
	pub fn required_image_size(&self) -> u64 {
		self.d_blocks_ptr + self.num_data_blocks as u64 * BLOCK_SIZE as u64
	}

	/// Returns the byte offset of inode `i`'s block in the inode table.
	pub fn inode_addr(&self, i: u32) -> u64 {
		self.i_blocks_ptr + i as u64 * BLOCK_SIZE as u64
	}

	/// Returns the data-block index of the block at absolute offset `off`.
	pub fn block_index_of(&self, off: u64) -> u64 {
		(off - self.d_blocks_ptr) / BLOCK_SIZE as u64
	}

	/// Returns the absolute byte offset of data block `k`.
	pub fn block_addr(&self, k: u64) -> u64 {
		self.d_blocks_ptr + k * BLOCK_SIZE as u64
	}

	/// Rounds `n` up to the nearest multiple of 32.
	pub fn round_up_32(n: u32) -> u32 {
		n.div_ceil(32) * 32
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn round_up() {
		assert_eq!(Superblock::round_up_32(0), 0);
		assert_eq!(Superblock::round_up_32(1), 32);
		assert_eq!(Superblock::round_up_32(32), 32);
		assert_eq!(Superblock::round_up_32(33), 64);
	}

	#[test]
	fn layout_offsets() {
		let sb = Superblock::compute(32, 32);
		assert_eq!(sb.i_bitmap_ptr, 40);
		assert_eq!(sb.d_bitmap_ptr, 40 + 4);
		assert_eq!(sb.i_blocks_ptr, 44 + 4);
		assert_eq!(sb.d_blocks_ptr, 48 + 32 * BLOCK_SIZE as u64);
		assert_eq!(
			sb.required_image_size(),
			sb.d_blocks_ptr + 32 * BLOCK_SIZE as u64
		);
	}

	#[test]
	fn block_addr_roundtrip() {
		let sb = Superblock::compute(32, 32);
		for k in 0..32u64 {
			let addr = sb.block_addr(k);
			assert_eq!(sb.block_index_of(addr), k);
		}
	}
}
