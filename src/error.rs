use std::{collections::TryReserveError, sync::OnceLock};

use crate::Pid;

/// Cause codes for errors that carry no native diagnostic code.
pub const CAUSE_NO_SUCH_PROCESS: u32 = 1;
pub const CAUSE_ACCESS_DENIED: u32 = 2;
pub const CAUSE_OUT_OF_MEMORY: u32 = 3;
pub const CAUSE_INCONSISTENCY: u32 = 4;

#[derive(Debug)]
pub enum Error {
    /// The target is absent or already exited. A normal negative result.
    NoSuchProcess(Pid),
    /// Insufficient privilege to open or read the target.
    AccessDenied(Pid),
    /// Local allocation failure. Never retried.
    OutOfMemory,
    /// Unexpected OS failure; `code` is the native win32 error or the
    /// raw NTSTATUS bits of the failing call.
    Platform { call: &'static str, code: u32 },
    /// Liveness evidence contradicted itself. Produced only when the
    /// `verify` feature is enabled; production downgrades to
    /// `NoSuchProcess` after logging.
    Inconsistency { pid: Pid, evidence: &'static str },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    pub fn cause_code(&self) -> u32 {
        match self {
            Error::NoSuchProcess(_) => CAUSE_NO_SUCH_PROCESS,
            Error::AccessDenied(_) => CAUSE_ACCESS_DENIED,
            Error::OutOfMemory => CAUSE_OUT_OF_MEMORY,
            Error::Platform { code, .. } => *code,
            Error::Inconsistency { .. } => CAUSE_INCONSISTENCY,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoSuchProcess(pid) => write!(f, "process {pid} does not exist"),
            Error::AccessDenied(pid) => write!(f, "access denied for process {pid}"),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::Platform { call, code } => write!(f, "{call} failed, code: {code:#x}"),
            Error::Inconsistency { pid, evidence } => {
                write!(f, "conflicting liveness evidence for process {pid}: {evidence}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

/// Receives `(pid, cause_code, message)` for every failed public
/// operation, independently of the `Err` the caller gets.
pub trait ErrorSink: Send + Sync {
    fn report(&self, pid: Pid, cause_code: u32, message: &str);
}

static SINK: OnceLock<Box<dyn ErrorSink>> = OnceLock::new();

/// Install the process-wide failure sink. Returns `false` if one is
/// already installed; the first installation wins.
pub fn set_error_sink(sink: Box<dyn ErrorSink>) -> bool {
    SINK.set(sink).is_ok()
}

pub(crate) fn report(pid: Pid, err: &Error) {
    if let Some(sink) = SINK.get() {
        sink.report(pid, err.cause_code(), &err.to_string());
    }
}

#[test]
fn cause_codes_are_stable() {
    assert_eq!(Error::NoSuchProcess(42).cause_code(), CAUSE_NO_SUCH_PROCESS);
    assert_eq!(Error::AccessDenied(42).cause_code(), CAUSE_ACCESS_DENIED);
    assert_eq!(Error::OutOfMemory.cause_code(), CAUSE_OUT_OF_MEMORY);
    assert_eq!(Error::Platform { call: "OpenProcess", code: 5 }.cause_code(), 5);
}

#[test]
fn display_names_the_failing_call() {
    let err = Error::Platform { call: "ReadProcessMemory", code: 0x12 };
    assert_eq!(err.to_string(), "ReadProcessMemory failed, code: 0x12");
}
