//! Read identifying metadata out of other running processes on Windows.
//!
//! The engine walks the target's Process Environment Block to find its
//! command line, current directory and environment block, copies the
//! bytes out with the remote-read primitive matching the caller/target
//! bitness relation, and decodes them locally. Everything is
//! point-in-time: handles and buffers live for a single call, nothing
//! is cached across calls.

mod error;
mod layout;
mod wstr;

#[cfg(target_os = "windows")]
mod windows;

pub use self::error::{set_error_sink, Error, ErrorSink, Result};
#[cfg(target_os = "windows")]
pub use self::windows::{
    cmdline, cwd, environ, pids, process_entry, Bitness, Field, ProcessEntry, ProcessHandle, RemoteSpan,
};

pub type Pid = u32;
