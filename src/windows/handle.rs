use windows_sys::Win32::{
    Foundation::{
        CloseHandle, GetLastError, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, FALSE, HANDLE, STILL_ACTIVE,
    },
    System::Threading::{GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ},
};

use super::pids;
use crate::error::{Error, Result};
use crate::Pid;

/// Exclusive owner of one OS process handle, scoped to the extraction
/// call that opened it. Closed on every exit path by `Drop`.
pub struct ProcessHandle {
    raw: HANDLE,
    pid: Pid,
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.raw);
        }
    }
}

impl ProcessHandle {
    /// Open with the rights the control-block walk needs.
    pub fn open_for_query(pid: Pid) -> Result<Self> {
        Self::open(pid, PROCESS_QUERY_INFORMATION | PROCESS_VM_READ)
    }

    pub fn open(pid: Pid, access: u32) -> Result<Self> {
        // Opening the idle-process identifier does not fail cleanly;
        // report the denial directly.
        if pid == 0 {
            return Err(Error::AccessDenied(pid));
        }

        let raw = unsafe { OpenProcess(access, FALSE, pid) };
        if raw == 0 {
            let code = unsafe { GetLastError() };
            return Err(match code {
                // The OS overloads this code to also mean "no such
                // process"; the enumeration disambiguates.
                ERROR_INVALID_PARAMETER => match pids::pid_present(pid)? {
                    false => Error::NoSuchProcess(pid),
                    true => stale_evidence(pid, "open rejected the pid but the enumeration still lists it"),
                },
                ERROR_ACCESS_DENIED => Error::AccessDenied(pid),
                _ => Error::Platform { call: "OpenProcess", code },
            });
        }

        let handle = Self { raw, pid };
        handle.confirm_running()?;
        Ok(handle)
    }

    /// The exit-status query is not fully trustworthy in either
    /// direction, so both outcomes are cross-checked against the
    /// current enumeration before being believed.
    fn confirm_running(&self) -> Result<()> {
        let mut exit_code = 0u32;
        let ret = unsafe { GetExitCodeProcess(self.raw, &mut exit_code) };
        if ret == FALSE {
            let code = unsafe { GetLastError() };
            return Err(Error::Platform { call: "GetExitCodeProcess", code });
        }

        if exit_code == STILL_ACTIVE as u32 {
            match pids::pid_present(self.pid)? {
                true => Ok(()),
                false => Err(stale_evidence(self.pid, "exit status says running, enumeration says gone")),
            }
        } else {
            match pids::pid_present(self.pid)? {
                true => {
                    tracing::warn!(
                        pid = self.pid,
                        exit_code,
                        "exit code set for an enumerated process; trusting the enumeration"
                    );
                    Ok(())
                }
                false => Err(Error::NoSuchProcess(self.pid)),
            }
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub(crate) fn raw(&self) -> HANDLE {
        self.raw
    }
}

/// Contradicting liveness evidence: the enumeration is ground truth.
/// Production logs the contradiction and reports the target gone;
/// `verify` builds surface it instead.
fn stale_evidence(pid: Pid, evidence: &'static str) -> Error {
    if cfg!(feature = "verify") {
        Error::Inconsistency { pid, evidence }
    } else {
        tracing::warn!(pid, evidence);
        Error::NoSuchProcess(pid)
    }
}
