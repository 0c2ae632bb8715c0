//! On-disk format and algorithms for the wfs filesystem.
//!
//! This crate has no knowledge of FUSE, files, or command-line arguments — it operates entirely
//! on an in-memory byte buffer laid out per `layout::Superblock`. `mkfs` calls `format::format`
//! directly against a `std::fs::File`-backed `Vec<u8>`; `wfs` mmaps the image and wraps it in
//! `Filesystem`.
//!
//! Internally, `ops`/`dir`/`blockmap`/`alloc` operate through raw pointers (`raw.rs`) rather than
//! `&mut self` methods, mirroring the pointer arithmetic of the system this format is modeled on:
//! several of these operations need simultaneous mutable views into disjoint regions of the same
//! buffer (e.g. a directory inode, a newly allocated inode, and a bitmap), which safe, exclusive
//! `&mut` borrows of one struct cannot express. `Filesystem` is the safe boundary around that.

pub mod alloc;
pub mod bitmap;
pub mod blockmap;
pub mod dir;
pub mod error;
pub mod format;
pub mod inode;
pub mod layout;
pub mod ops;
pub mod path;
mod raw;

pub use error::WfsError;
pub use inode::Inode;
pub use layout::Superblock;
pub use ops::MAX_FILE_BLOCKS;

/// A mounted filesystem: an owned mutable view over an image buffer plus its cached superblock.
///
/// The superblock is read once at construction and never rewritten (`num_inodes`/
/// `num_data_blocks`/the four region offsets are fixed for the life of an image), so caching it
/// avoids re-parsing it on every call.
pub struct Filesystem<'a> {
	data: &'a mut [u8],
	sb: Superblock,
}

impl<'a> Filesystem<'a> {
	/// Wraps `data` as a filesystem, reading the superblock from its first bytes.
	///
	/// Returns `None` if `data` is too small to hold even a superblock, or the superblock it
	/// describes doesn't fit within `data`.
	pub fn mount(data: &'a mut [u8]) -> Option<Self> {
		if data.len() < std::mem::size_of::<Superblock>() {
			return None;
		}
		let sb: Superblock = unsafe { std::ptr::read_unaligned(data.as_ptr() as *const Superblock) };
		if sb.required_image_size() > data.len() as u64 {
			return None;
		}
		Some(Self { data, sb })
	}

	fn base(&mut self) -> *mut u8 {
		self.data.as_mut_ptr()
	}

	/// Resolves `path` to an inode index.
	pub fn lookup(&mut self, path: &str) -> Result<u32, WfsError> {
		unsafe { path::lookup(self.base(), &self.sb, path) }
	}

	/// Returns a copy of inode `idx`'s metadata.
	pub fn getattr(&mut self, idx: u32) -> Inode {
		unsafe { ops::getattr(self.base(), &self.sb, idx) }
	}

	/// Lists the entries of directory `idx`.
	pub fn readdir(&mut self, idx: u32) -> Vec<(String, u32)> {
		unsafe { ops::readdir(self.base(), &self.sb, idx) }
	}

	/// Creates a regular file or device node named `name` under `parent`.
	pub fn create(
		&mut self,
		parent: u32,
		name: &str,
		mode: u32,
		uid: u32,
		gid: u32,
		now: i64,
	) -> Result<u32, WfsError> {
		unsafe { ops::create(self.base(), &self.sb, parent, name, mode, uid, gid, now) }
	}

	/// Creates a directory named `name` under `parent`.
	pub fn mkdir(
		&mut self,
		parent: u32,
		name: &str,
		mode: u32,
		uid: u32,
		gid: u32,
		now: i64,
	) -> Result<u32, WfsError> {
		unsafe { ops::mkdir(self.base(), &self.sb, parent, name, mode, uid, gid, now) }
	}

	/// Removes a non-directory entry named `name` from `parent`.
	pub fn unlink(&mut self, parent: u32, name: &str) -> Result<(), WfsError> {
		unsafe { ops::unlink(self.base(), &self.sb, parent, name) }
	}

	/// Removes a directory entry named `name` from `parent`.
	pub fn rmdir(&mut self, parent: u32, name: &str) -> Result<(), WfsError> {
		unsafe { ops::rmdir(self.base(), &self.sb, parent, name) }
	}

	/// Reads into `buf` from file `idx` at `offset`, returning the number of bytes read.
	pub fn read(&mut self, idx: u32, offset: u64, buf: &mut [u8]) -> usize {
		unsafe { ops::read(self.base(), &self.sb, idx, offset, buf) }
	}

	/// Writes `data` to file `idx` at `offset`, returning the number of bytes written.
	pub fn write(&mut self, idx: u32, offset: u64, data: &[u8], now: i64) -> Result<usize, WfsError> {
		unsafe { ops::write(self.base(), &self.sb, idx, offset, data, now) }
	}

	/// Resolves the parent directory and final component name of `path`.
	pub fn lookup_parent<'p>(&mut self, path: &'p str) -> Result<(u32, &'p str), WfsError> {
		unsafe { path::lookup_parent(self.base(), &self.sb, path) }
	}

	/// Returns the cached superblock.
	pub fn superblock(&self) -> &Superblock {
		&self.sb
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::layout::S_IFREG;

	fn fresh_image() -> Vec<u8> {
		let sb = Superblock::compute(32, 32);
		let mut data = vec![0u8; sb.required_image_size() as usize];
		format::format(&mut data, 32, 32, 0, 0, 0).unwrap();
		data
	}

	#[test]
	fn mount_rejects_truncated_image() {
		let mut data = vec![0u8; 4];
		assert!(Filesystem::mount(&mut data).is_none());
	}

	#[test]
	fn mount_then_full_path_roundtrip() {
		let mut data = fresh_image();
		let mut fs = Filesystem::mount(&mut data).unwrap();
		let (parent, name) = fs.lookup_parent("/a.txt").unwrap();
		let idx = fs.create(parent, name, S_IFREG | 0o644, 0, 0, 0).unwrap();
		fs.write(idx, 0, b"hi", 1).unwrap();

		let resolved = fs.lookup("/a.txt").unwrap();
		assert_eq!(resolved, idx);
		let mut buf = [0u8; 2];
		assert_eq!(fs.read(idx, 0, &mut buf), 2);
		assert_eq!(&buf, b"hi");
	}
}
