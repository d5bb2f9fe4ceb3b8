//! Platform constants re-exported to embedders.
//!
//! Hosts branch on these instead of reimplementing OS-specific numbers.
//! Unix values come straight from libc; the Windows branch carries the
//! CRT/runtime-library values so the external contract is identical on
//! every platform the record format reaches.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(windows)] {
        pub const IS_WINDOWS: bool = true;

        pub const O_RDONLY: i32 = 0x0000;
        pub const O_WRONLY: i32 = 0x0001;
        pub const O_RDWR: i32 = 0x0002;
        pub const O_APPEND: i32 = 0x0008;
        pub const O_CREAT: i32 = 0x0100;
        pub const O_TRUNC: i32 = 0x0200;

        pub const S_IFMT: u32 = 0xF000;
        pub const S_IFREG: u32 = 0x8000;
        pub const S_IFDIR: u32 = 0x4000;
        pub const S_IFCHR: u32 = 0x2000;
        pub const S_IFIFO: u32 = 0x1000;
        // Synthesized for stat decoding parity; the CRT has no native
        // block/symlink/socket modes.
        pub const S_IFBLK: u32 = 0x6000;
        pub const S_IFLNK: u32 = 0xA000;
        pub const S_IFSOCK: u32 = 0xC000;

        pub const S_IRUSR: u32 = 0o400;
        pub const S_IWUSR: u32 = 0o200;
        pub const S_IXUSR: u32 = 0o100;
        pub const S_IRGRP: u32 = 0o040;
        pub const S_IWGRP: u32 = 0o020;
        pub const S_IXGRP: u32 = 0o010;
        pub const S_IROTH: u32 = 0o004;
        pub const S_IWOTH: u32 = 0o002;
        pub const S_IXOTH: u32 = 0o001;

        pub const ENOENT: i32 = 2;
    } else {
        pub const IS_WINDOWS: bool = false;

        pub const O_RDONLY: i32 = libc::O_RDONLY;
        pub const O_WRONLY: i32 = libc::O_WRONLY;
        pub const O_RDWR: i32 = libc::O_RDWR;
        pub const O_APPEND: i32 = libc::O_APPEND;
        pub const O_CREAT: i32 = libc::O_CREAT;
        pub const O_TRUNC: i32 = libc::O_TRUNC;

        pub const S_IFMT: u32 = libc::S_IFMT as u32;
        pub const S_IFREG: u32 = libc::S_IFREG as u32;
        pub const S_IFDIR: u32 = libc::S_IFDIR as u32;
        pub const S_IFCHR: u32 = libc::S_IFCHR as u32;
        pub const S_IFIFO: u32 = libc::S_IFIFO as u32;
        pub const S_IFBLK: u32 = libc::S_IFBLK as u32;
        pub const S_IFLNK: u32 = libc::S_IFLNK as u32;
        pub const S_IFSOCK: u32 = libc::S_IFSOCK as u32;

        pub const S_IRUSR: u32 = libc::S_IRUSR as u32;
        pub const S_IWUSR: u32 = libc::S_IWUSR as u32;
        pub const S_IXUSR: u32 = libc::S_IXUSR as u32;
        pub const S_IRGRP: u32 = libc::S_IRGRP as u32;
        pub const S_IWGRP: u32 = libc::S_IWGRP as u32;
        pub const S_IXGRP: u32 = libc::S_IXGRP as u32;
        pub const S_IROTH: u32 = libc::S_IROTH as u32;
        pub const S_IWOTH: u32 = libc::S_IWOTH as u32;
        pub const S_IXOTH: u32 = libc::S_IXOTH as u32;

        pub const ENOENT: i32 = libc::ENOENT;
    }
}

/// Maximum path length accepted at the dispatch boundary, in bytes.
pub const MAX_PATH: usize = 4096;
