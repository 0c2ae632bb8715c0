//! Lays out an empty filesystem in a pre-sized image buffer.

use crate::inode::Inode;
use crate::layout::{Superblock, S_IFDIR};
use std::fmt;

/// Failure reason for `format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
	/// The image buffer is smaller than the layout requires.
	ImageTooSmall {
		/// Bytes required by the requested layout.
		required: u64,
		/// Bytes actually available.
		available: u64,
	},
}

impl fmt::Display for FormatError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ImageTooSmall {
				required,
				available,
			} => write!(
				f,
				"image too small: need {required} bytes, have {available}"
			),
		}
	}
}

impl std::error::Error for FormatError {}

/// Formats `data` as an empty filesystem with (at least) `inode_count` inodes and
/// `block_count` data blocks, both rounded up to the nearest multiple of 32.
///
/// Writes the superblock, zeroes both bitmaps, marks inode 0 allocated, and initialises inode 0
/// as an empty root directory owned by `uid`/`gid` with timestamps set to `now`.
pub fn format(
	data: &mut [u8],
	inode_count: u32,
	block_count: u32,
	uid: u32,
	gid: u32,
	now: i64,
) -> Result<Superblock, FormatError> {
	let num_inodes = Superblock::round_up_32(inode_count);
	let num_data_blocks = Superblock::round_up_32(block_count);
	let sb = Superblock::compute(num_inodes, num_data_blocks);

	let required = sb.required_image_size();
	if required > data.len() as u64 {
		return Err(FormatError::ImageTooSmall {
			required,
			available: data.len() as u64,
		});
	}

	let i_bitmap = &mut data[sb.i_bitmap_ptr as usize..sb.d_bitmap_ptr as usize];
	i_bitmap.fill(0);
	let d_bitmap = &mut data[sb.d_bitmap_ptr as usize..sb.i_blocks_ptr as usize];
	d_bitmap.fill(0);

	crate::bitmap::set(&mut data[sb.i_bitmap_ptr as usize..sb.d_bitmap_ptr as usize], 0);

	let mut root = Inode::new(S_IFDIR | 0o755, uid, gid, now);
	root.num = 0;
	let root_off = sb.inode_addr(0) as usize;
	// Safety: `root_off + size_of::<Inode>() <= sb.d_blocks_ptr <= data.len()` since `required`
	// was just checked against `data.len()`.
	unsafe {
		std::ptr::write_unaligned(data[root_off..].as_mut_ptr() as *mut Inode, root);
	}

	// Safety: the superblock's own region, `[0, size_of::<Superblock>())`, is disjoint from and
	// precedes the bitmaps, and fits because `required >= size_of::<Superblock>()`.
	unsafe {
		std::ptr::write_unaligned(data.as_mut_ptr() as *mut Superblock, sb);
	}

	Ok(sb)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::layout::BLOCK_SIZE;

	#[test]
	fn rounds_counts_up_to_32() {
		let mut data = vec![0u8; 1 << 20];
		let sb = format(&mut data, 1, 1, 0, 0, 0).unwrap();
		assert_eq!(sb.num_inodes, 32);
		assert_eq!(sb.num_data_blocks, 32);
	}

	#[test]
	fn rejects_undersized_image() {
		let mut data = vec![0u8; 16];
		let err = format(&mut data, 32, 32, 0, 0, 0).unwrap_err();
		matches!(err, FormatError::ImageTooSmall { .. });
	}

	#[test]
	fn root_is_allocated_and_empty_directory() {
		let mut data = vec![0u8; 1 << 20];
		let sb = format(&mut data, 32, 32, 42, 7, 1_700_000_000).unwrap();

		assert!(crate::bitmap::test(
			&data[sb.i_bitmap_ptr as usize..sb.d_bitmap_ptr as usize],
			0
		));

		let root: Inode = unsafe {
			std::ptr::read_unaligned(data[sb.inode_addr(0) as usize..].as_ptr() as *const Inode)
		};
		assert!(root.is_dir());
		assert_eq!(root.mode & 0o777, 0o755);
		assert_eq!(root.uid, 42);
		assert_eq!(root.gid, 7);
		assert_eq!(root.size, 0);
		assert_eq!(root.nlinks, 0);
		assert_eq!(root.atim, 1_700_000_000);
		assert_eq!(root.blocks, [0; 8]);
	}

	#[test]
	fn writes_superblock_at_offset_zero() {
		let mut data = vec![0u8; 1 << 20];
		let sb = format(&mut data, 64, 96, 0, 0, 0).unwrap();
		let read_back: Superblock =
			unsafe { std::ptr::read_unaligned(data.as_ptr() as *const Superblock) };
		assert_eq!(read_back, sb);
		assert_eq!(sb.i_blocks_ptr % BLOCK_SIZE as u64, sb.i_blocks_ptr % BLOCK_SIZE as u64);
	}
}
