//! FUSE runtime driver: mmaps a wfs image and answers kernel callbacks by delegating to
//! `wfs_core::Filesystem`.
//!
//! The core API is path-based; FUSE's low-level protocol is inode-number-based. This driver
//! bridges the two with `ino_to_path`, a cache from FUSE inode numbers to the full path they were
//! last resolved at. Inode number 1 (FUSE reserves it for the mountpoint root) is seeded to `/`,
//! which resolves to core index 0. Every other FUSE inode number is assigned the first time an
//! entry is looked up or created, and never reused within a run.
//!
//! Every failed operation logs a one-line `warn!` diagnostic (path + error) via the `log` facade;
//! run with `RUST_LOG=wfs=debug` or similar to see them on stderr.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
	FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
	ReplyEmpty, ReplyEntry, ReplyWrite, Request,
};
use memmap2::MmapMut;
use wfs_core::{Inode, WfsError};

/// Exit code used when no image path argument is supplied.
const NO_IMAGE_ERROR: i32 = 69;

/// FUSE's fixed root inode number.
const ROOT_INO: u64 = 1;

/// Attribute cache TTL handed back on every reply. The image can only change through this
/// process, so there is no need to ever invalidate early.
const TTL: Duration = Duration::from_secs(1);

struct WfsDriver {
	mmap: MmapMut,
	ino_to_path: HashMap<u64, PathBuf>,
	next_ino: u64,
}

impl WfsDriver {
	fn new(mmap: MmapMut) -> Self {
		let mut ino_to_path = HashMap::new();
		ino_to_path.insert(ROOT_INO, PathBuf::from("/"));
		Self {
			mmap,
			ino_to_path,
			next_ino: ROOT_INO + 1,
		}
	}

	fn path_of(&self, ino: u64) -> Option<PathBuf> {
		self.ino_to_path.get(&ino).cloned()
	}

	/// Returns the FUSE inode number for `path`, assigning a fresh one if this is the first time
	/// it has been seen.
	fn ino_for(&mut self, path: &Path) -> u64 {
		if let Some((&ino, _)) = self.ino_to_path.iter().find(|(_, p)| p.as_path() == path) {
			return ino;
		}
		let ino = self.next_ino;
		self.next_ino += 1;
		self.ino_to_path.insert(ino, path.to_path_buf());
		ino
	}

	fn child_path(parent_path: &Path, name: &OsStr) -> PathBuf {
		parent_path.join(name)
	}
}

/// Mounts the core filesystem view over the image, freshly each call so it never outlives the
/// borrow of a single callback — it reads the superblock from the mapped bytes, which is cheap.
fn mount(mmap: &mut MmapMut) -> wfs_core::Filesystem<'_> {
	wfs_core::Filesystem::mount(&mut mmap[..]).expect("image validated at startup")
}

fn errno_for(err: WfsError) -> i32 {
	match err {
		WfsError::NotFound => libc::ENOENT,
		WfsError::NoSpace => libc::ENOSPC,
	}
}

/// Logs a one-line diagnostic for a failed operation and returns its errno, so every call site
/// can just write `reply.error(fail(op, path, e))`.
fn fail(op: &str, path: &Path, err: WfsError) -> i32 {
	log::warn!("{op} {}: {err}", path.display());
	errno_for(err)
}

fn file_attr(ino: u64, inode: &Inode) -> FileAttr {
	let kind = if inode.is_dir() {
		FileType::Directory
	} else {
		FileType::RegularFile
	};
	let secs_to_time = |s: i64| UNIX_EPOCH + Duration::from_secs(s.max(0) as u64);
	FileAttr {
		ino,
		size: inode.size,
		blocks: inode.blocks_in_use(),
		atime: secs_to_time(inode.atim),
		mtime: secs_to_time(inode.mtim),
		ctime: secs_to_time(inode.ctim),
		crtime: secs_to_time(inode.ctim),
		kind,
		perm: (inode.mode & 0o7777) as u16,
		nlink: if inode.is_dir() { 2 } else { 1 },
		uid: inode.uid,
		gid: inode.gid,
		rdev: 0,
		blksize: wfs_core::layout::BLOCK_SIZE as u32,
		flags: 0,
	}
}

fn now_secs() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}

impl Filesystem for WfsDriver {
	fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
		let Some(parent_path) = self.path_of(parent) else {
			reply.error(libc::ENOENT);
			return;
		};
		let child_path = Self::child_path(&parent_path, name);
		let mut fs = mount(&mut self.mmap);
		match fs.lookup(&child_path.to_string_lossy()) {
			Ok(idx) => {
				let inode = fs.getattr(idx);
				drop(fs);
				let ino = self.ino_for(&child_path);
				let _ = req;
				reply.entry(&TTL, &file_attr(ino, &inode), 0);
			}
			Err(e) => reply.error(fail("lookup", &child_path, e)),
		}
	}

	fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
		let Some(path) = self.path_of(ino) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut fs = mount(&mut self.mmap);
		match fs.lookup(&path.to_string_lossy()) {
			Ok(idx) => {
				let inode = fs.getattr(idx);
				reply.attr(&TTL, &file_attr(ino, &inode));
			}
			Err(e) => reply.error(fail("getattr", &path, e)),
		}
	}

	fn readdir(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		mut reply: ReplyDirectory,
	) {
		let Some(path) = self.path_of(ino) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut fs = mount(&mut self.mmap);
		let dir_idx = match fs.lookup(&path.to_string_lossy()) {
			Ok(idx) => idx,
			Err(e) => {
				reply.error(fail("readdir", &path, e));
				return;
			}
		};
		let mut entries = vec![(".".to_owned(), dir_idx), ("..".to_owned(), dir_idx)];
		entries.extend(fs.readdir(dir_idx));
		drop(fs);

		for (i, (name, child_idx)) in entries.into_iter().enumerate().skip(offset as usize) {
			let child_path = if name == "." || name == ".." {
				path.clone()
			} else {
				Self::child_path(&path, OsStr::new(&name))
			};
			let child_ino = self.ino_for(&child_path);
			let mut fs = mount(&mut self.mmap);
			let kind = if fs.getattr(child_idx).is_dir() {
				FileType::Directory
			} else {
				FileType::RegularFile
			};
			drop(fs);
			if reply.add(child_ino, (i + 1) as i64, kind, &name) {
				break;
			}
		}
		reply.ok();
	}

	fn mkdir(
		&mut self,
		req: &Request<'_>,
		parent: u64,
		name: &OsStr,
		mode: u32,
		_umask: u32,
		reply: ReplyEntry,
	) {
		let Some(parent_path) = self.path_of(parent) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut fs = mount(&mut self.mmap);
		let Ok(parent_idx) = fs.lookup(&parent_path.to_string_lossy()) else {
			reply.error(libc::ENOENT);
			return;
		};
		let name_str = name.to_string_lossy();
		let child_path = Self::child_path(&parent_path, name);
		match fs.mkdir(parent_idx, &name_str, mode, req.uid(), req.gid(), now_secs()) {
			Ok(idx) => {
				let inode = fs.getattr(idx);
				drop(fs);
				let child_ino = self.ino_for(&child_path);
				reply.entry(&TTL, &file_attr(child_ino, &inode), 0);
			}
			Err(e) => reply.error(fail("mkdir", &child_path, e)),
		}
	}

	fn mknod(
		&mut self,
		req: &Request<'_>,
		parent: u64,
		name: &OsStr,
		mode: u32,
		_umask: u32,
		_rdev: u32,
		reply: ReplyEntry,
	) {
		let Some(parent_path) = self.path_of(parent) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut fs = mount(&mut self.mmap);
		let Ok(parent_idx) = fs.lookup(&parent_path.to_string_lossy()) else {
			reply.error(libc::ENOENT);
			return;
		};
		let name_str = name.to_string_lossy();
		let child_path = Self::child_path(&parent_path, name);
		match fs.create(
			parent_idx,
			&name_str,
			mode | libc::S_IFREG,
			req.uid(),
			req.gid(),
			now_secs(),
		) {
			Ok(idx) => {
				let inode = fs.getattr(idx);
				drop(fs);
				let child_ino = self.ino_for(&child_path);
				reply.entry(&TTL, &file_attr(child_ino, &inode), 0);
			}
			Err(e) => reply.error(fail("mknod", &child_path, e)),
		}
	}

	fn create(
		&mut self,
		req: &Request<'_>,
		parent: u64,
		name: &OsStr,
		mode: u32,
		_umask: u32,
		_flags: i32,
		reply: ReplyCreate,
	) {
		let Some(parent_path) = self.path_of(parent) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut fs = mount(&mut self.mmap);
		let Ok(parent_idx) = fs.lookup(&parent_path.to_string_lossy()) else {
			reply.error(libc::ENOENT);
			return;
		};
		let name_str = name.to_string_lossy();
		let child_path = Self::child_path(&parent_path, name);
		match fs.create(
			parent_idx,
			&name_str,
			mode | libc::S_IFREG,
			req.uid(),
			req.gid(),
			now_secs(),
		) {
			Ok(idx) => {
				let inode = fs.getattr(idx);
				drop(fs);
				let child_ino = self.ino_for(&child_path);
				reply.created(&TTL, &file_attr(child_ino, &inode), 0, child_ino, 0);
			}
			Err(e) => reply.error(fail("create", &child_path, e)),
		}
	}

	fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
		let Some(parent_path) = self.path_of(parent) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut fs = mount(&mut self.mmap);
		let Ok(parent_idx) = fs.lookup(&parent_path.to_string_lossy()) else {
			reply.error(libc::ENOENT);
			return;
		};
		let child_path = Self::child_path(&parent_path, name);
		match fs.unlink(parent_idx, &name.to_string_lossy()) {
			Ok(()) => reply.ok(),
			Err(e) => reply.error(fail("unlink", &child_path, e)),
		}
	}

	fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
		let Some(parent_path) = self.path_of(parent) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut fs = mount(&mut self.mmap);
		let Ok(parent_idx) = fs.lookup(&parent_path.to_string_lossy()) else {
			reply.error(libc::ENOENT);
			return;
		};
		let child_path = Self::child_path(&parent_path, name);
		match fs.rmdir(parent_idx, &name.to_string_lossy()) {
			Ok(()) => reply.ok(),
			Err(e) => reply.error(fail("rmdir", &child_path, e)),
		}
	}

	fn read(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		size: u32,
		_flags: i32,
		_lock_owner: Option<u64>,
		reply: ReplyData,
	) {
		let Some(path) = self.path_of(ino) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut fs = mount(&mut self.mmap);
		let idx = match fs.lookup(&path.to_string_lossy()) {
			Ok(idx) => idx,
			Err(e) => {
				reply.error(fail("read", &path, e));
				return;
			}
		};
		let mut buf = vec![0u8; size as usize];
		let n = fs.read(idx, offset.max(0) as u64, &mut buf);
		reply.data(&buf[..n]);
	}

	fn write(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		data: &[u8],
		_write_flags: u32,
		_flags: i32,
		_lock_owner: Option<u64>,
		reply: ReplyWrite,
	) {
		let Some(path) = self.path_of(ino) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut fs = mount(&mut self.mmap);
		let idx = match fs.lookup(&path.to_string_lossy()) {
			Ok(idx) => idx,
			Err(e) => {
				reply.error(fail("write", &path, e));
				return;
			}
		};
		match fs.write(idx, offset.max(0) as u64, data, now_secs()) {
			Ok(n) => reply.written(n as u32),
			Err(e) => reply.error(fail("write", &path, e)),
		}
	}
}

fn main() {
	env_logger::init();

	let mut args = std::env::args().skip(1);

	let Some(image_path) = args.next() else {
		eprintln!("usage: wfs <image_path> [fuse mount options...]");
		exit(NO_IMAGE_ERROR);
	};
	let mount_args: Vec<String> = args.collect();
	let Some(mountpoint) = mount_args.first().cloned() else {
		eprintln!("usage: wfs <image_path> <mountpoint> [fuse mount options...]");
		exit(NO_IMAGE_ERROR);
	};

	let file = std::fs::OpenOptions::new()
		.read(true)
		.write(true)
		.open(&image_path)
		.unwrap_or_else(|e| {
			eprintln!("wfs: {image_path}: {e}");
			exit(1);
		});

	let mut mmap = unsafe { MmapMut::map_mut(&file) }.unwrap_or_else(|e| {
		eprintln!("wfs: {image_path}: {e}");
		exit(1);
	});

	if wfs_core::Filesystem::mount(&mut mmap[..]).is_none() {
		eprintln!("wfs: {image_path}: not a valid wfs image");
		exit(1);
	}

	let driver = WfsDriver::new(mmap);
	let options = vec![MountOption::FSName("wfs".to_owned())];
	if let Err(e) = fuser::mount2(driver, &mountpoint, &options) {
		eprintln!("wfs: mount failed: {e}");
		exit(1);
	}
}
