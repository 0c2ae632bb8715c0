//! On-disk inode and directory-entry structures.

use crate::layout::{IND_BLOCK, MAX_NAME_LEN, N_BLOCKS, S_IFMT};
use std::mem::size_of;

/// An inode: metadata for one filesystem object. Occupies exactly one block; the trailing
/// `_padding` field absorbs the rest.
///
/// Field order places every `u64`/`i64` field before the `u32` fields so the natural
/// `#[repr(C)]` layout has no internal padding, making the 512-byte size exact and portable
/// across the fields that matter.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Inode {
	/// Size of the file/directory contents in bytes.
	pub size: u64,
	/// Last access time, Unix seconds.
	pub atim: i64,
	/// Last content modification time, Unix seconds.
	pub mtim: i64,
	/// Last metadata modification time, Unix seconds.
	pub ctim: i64,
	/// Block pointers: absolute byte offsets, 0 = none. Slot `IND_BLOCK` is the indirect table.
	pub blocks: [u64; N_BLOCKS],
	/// Self-index. Only meaningfully maintained for the root; the driver never writes it for
	/// other inodes.
	pub num: u32,
	/// Owning user ID, captured at creation.
	pub uid: u32,
	/// Owning group ID, captured at creation.
	pub gid: u32,
	/// File-type bits (`S_IFDIR`/`S_IFREG`) and permission bits.
	pub mode: u32,
	/// Number of directory entries (directories) — not a POSIX hard-link count.
	pub nlinks: u32,
	_padding: [u8; 396],
}

const _: () = assert!(size_of::<Inode>() == 512);

impl Inode {
	/// Builds a fresh, zeroed inode with the given identity fields.
	pub fn new(mode: u32, uid: u32, gid: u32, now: i64) -> Self {
		Self {
			size: 0,
			atim: now,
			mtim: now,
			ctim: now,
			blocks: [0; N_BLOCKS],
			num: 0,
			uid,
			gid,
			mode,
			nlinks: 0,
			_padding: [0; 396],
		}
	}

	/// Tells whether this inode is a directory.
	pub fn is_dir(&self) -> bool {
		self.mode & S_IFMT == crate::layout::S_IFDIR
	}

	/// Number of blocks currently occupied by the file's contents, i.e. `ceil(size / BLOCK_SIZE)`.
	pub fn blocks_in_use(&self) -> u64 {
		self.size.div_ceil(crate::layout::BLOCK_SIZE as u64)
	}
}

/// A fixed-size directory entry: a name and the inode index it refers to.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DirEntry {
	/// Entry name, zero-padded. Not NUL-terminated when exactly `MAX_NAME_LEN` bytes long.
	pub name: [u8; MAX_NAME_LEN],
	/// Index of the inode this entry refers to.
	pub num: u32,
}

const _: () = assert!(size_of::<DirEntry>() == 32);

impl DirEntry {
	/// Number of directory entries that fit in one block.
	pub const PER_BLOCK: usize = crate::layout::BLOCK_SIZE / size_of::<DirEntry>();

	/// Builds an entry from a name (truncated to `MAX_NAME_LEN` bytes if longer — the original C
	/// implementation overflows via `strcpy` on names that don't fit; this port truncates
	/// instead) and an inode index.
	pub fn new(name: &str, num: u32) -> Self {
		let mut bytes = [0u8; MAX_NAME_LEN];
		let src = name.as_bytes();
		let len = src.len().min(MAX_NAME_LEN);
		bytes[..len].copy_from_slice(&src[..len]);
		Self { name: bytes, num }
	}

	/// Tells whether the stored name equals `name`.
	pub fn name_eq(&self, name: &str) -> bool {
		let src = name.as_bytes();
		if src.len() > MAX_NAME_LEN {
			return false;
		}
		let stored_len = self
			.name
			.iter()
			.position(|&b| b == 0)
			.unwrap_or(MAX_NAME_LEN);
		stored_len == src.len() && &self.name[..stored_len] == src
	}

	/// Returns the stored name as a string, stopping at the first NUL (or at `MAX_NAME_LEN` if
	/// there is none).
	pub fn name_str(&self) -> String {
		let len = self
			.name
			.iter()
			.position(|&b| b == 0)
			.unwrap_or(MAX_NAME_LEN);
		String::from_utf8_lossy(&self.name[..len]).into_owned()
	}
}

/// Maximum number of directory entries a directory may hold: indirect addressing is not used for
/// directories, so only the `IND_BLOCK` direct slots are available.
pub const MAX_DIR_ENTRIES: u32 = (IND_BLOCK * DirEntry::PER_BLOCK) as u32;

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn inode_is_exactly_one_block() {
		assert_eq!(size_of::<Inode>(), crate::layout::BLOCK_SIZE);
	}

	#[test]
	fn dentry_per_block_matches_spec_example() {
		assert_eq!(DirEntry::PER_BLOCK, 16);
	}

	#[test]
	fn name_roundtrip() {
		let ent = DirEntry::new("hello", 7);
		assert!(ent.name_eq("hello"));
		assert!(!ent.name_eq("hell"));
		assert!(!ent.name_eq("helloo"));
		assert_eq!(ent.name_str(), "hello");
	}

	#[test]
	fn name_exactly_max_len_has_no_nul() {
		let name = "a".repeat(MAX_NAME_LEN);
		let ent = DirEntry::new(&name, 1);
		assert!(ent.name_eq(&name));
		assert_eq!(ent.name_str(), name);
	}

	#[test]
	fn is_dir_checks_type_bits() {
		let dir = Inode::new(crate::layout::S_IFDIR | 0o755, 0, 0, 0);
		let reg = Inode::new(crate::layout::S_IFREG | 0o644, 0, 0, 0);
		assert!(dir.is_dir());
		assert!(!reg.is_dir());
	}
}
