//! `mkfs.wfs` formats an existing, appropriately-sized file as an empty wfs image.

use std::env;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::exit;
use std::time::{SystemTime, UNIX_EPOCH};

/// Exit code used for any argument error, duplicate flag, missing value, or insufficient image
/// size.
const ARG_ERROR: i32 = 200;

/// Exit code used when the arguments themselves are well-formed but opening, reading, or writing
/// the image file fails.
const IO_ERROR: i32 = 1;

#[derive(Default)]
struct Args {
	image_path: Option<PathBuf>,
	num_inodes: Option<u32>,
	num_data_blocks: Option<u32>,
}

fn usage_error(prog: &str, msg: &str) -> ! {
	eprintln!("{prog}: {msg}");
	eprintln!("usage: {prog} -d <image_path> -i <inode_count> -b <block_count>");
	exit(ARG_ERROR);
}

fn parse_args(prog: &str) -> Args {
	let mut args = Args::default();
	let mut iter = env::args().skip(1);

	while let Some(flag) = iter.next() {
		let value = iter
			.next()
			.unwrap_or_else(|| usage_error(prog, &format!("missing value for `{flag}`")));

		match flag.as_str() {
			"-d" => {
				if args.image_path.is_some() {
					usage_error(prog, "duplicate `-d`");
				}
				args.image_path = Some(PathBuf::from(value));
			}
			"-i" => {
				if args.num_inodes.is_some() {
					usage_error(prog, "duplicate `-i`");
				}
				let n = value
					.parse()
					.unwrap_or_else(|_| usage_error(prog, &format!("invalid inode count `{value}`")));
				args.num_inodes = Some(n);
			}
			"-b" => {
				if args.num_data_blocks.is_some() {
					usage_error(prog, "duplicate `-b`");
				}
				let n = value
					.parse()
					.unwrap_or_else(|_| usage_error(prog, &format!("invalid block count `{value}`")));
				args.num_data_blocks = Some(n);
			}
			other => usage_error(prog, &format!("unrecognized flag `{other}`")),
		}
	}

	args
}

fn main() {
	let prog = env::args().next().unwrap_or_else(|| "mkfs.wfs".to_owned());
	let args = parse_args(&prog);

	let image_path = args
		.image_path
		.unwrap_or_else(|| usage_error(&prog, "missing required `-d <image_path>`"));
	let num_inodes = args
		.num_inodes
		.unwrap_or_else(|| usage_error(&prog, "missing required `-i <inode_count>`"));
	let num_data_blocks = args
		.num_data_blocks
		.unwrap_or_else(|| usage_error(&prog, "missing required `-b <block_count>`"));

	let mut file = OpenOptions::new()
		.read(true)
		.write(true)
		.open(&image_path)
		.unwrap_or_else(|e| {
			eprintln!("{prog}: {}: {e}", image_path.display());
			exit(IO_ERROR);
		});

	let mut data = Vec::new();
	file.read_to_end(&mut data).unwrap_or_else(|e| {
		eprintln!("{prog}: {}: {e}", image_path.display());
		exit(IO_ERROR);
	});

	let now = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0);
	let uid = unsafe { libc::getuid() };
	let gid = unsafe { libc::getgid() };

	wfs_core::format::format(&mut data, num_inodes, num_data_blocks, uid, gid, now).unwrap_or_else(
		|e| {
			eprintln!("{prog}: {}: {e}", image_path.display());
			exit(ARG_ERROR);
		},
	);

	file.seek(SeekFrom::Start(0)).unwrap_or_else(|e| {
		eprintln!("{prog}: {}: {e}", image_path.display());
		exit(IO_ERROR);
	});
	file.write_all(&data).unwrap_or_else(|e| {
		eprintln!("{prog}: {}: {e}", image_path.display());
		exit(IO_ERROR);
	});
}
