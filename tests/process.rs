#![cfg(windows)]

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use procdata::{cmdline, cwd, environ, pids, process_entry, Error};

/// Kills the child on the way out so a failing assert can't leak it.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

const SLEEPER: &str = "ping -n 30 127.0.0.1 > nul";

fn spawn_sleeper(configure: impl FnOnce(&mut Command)) -> ChildGuard {
    let mut cmd = Command::new("cmd");
    cmd.args(["/d", "/c", SLEEPER]).stdout(Stdio::null()).stderr(Stdio::null());
    configure(&mut cmd);
    ChildGuard(cmd.spawn().expect("spawn cmd"))
}

fn wait_until_gone(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while pids().unwrap().contains(&pid) {
        assert!(Instant::now() < deadline, "pid {pid} still enumerated");
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn live_child_is_enumerated() {
    let child = spawn_sleeper(|_| {});
    assert!(pids().unwrap().contains(&child.0.id()));
}

#[test]
fn cmdline_preserves_embedded_whitespace() {
    let child = spawn_sleeper(|_| {});
    let args = cmdline(child.0.id()).unwrap();
    // The sleeper command travels as one quoted argument; it must come
    // back as one element, spaces intact.
    assert_eq!(args.last().map(String::as_str), Some(SLEEPER));
}

#[test]
fn cwd_has_no_trailing_separator() {
    let dir = tempfile::tempdir().unwrap();
    let child = spawn_sleeper(|cmd| {
        cmd.current_dir(dir.path());
    });
    let got = cwd(child.0.id()).unwrap();
    let want = dir.path().to_string_lossy();
    assert!(!got.ends_with('\\') && !got.ends_with('/'));
    assert!(got.eq_ignore_ascii_case(want.trim_end_matches('\\')), "{got} != {want}");
}

#[test]
fn environ_carries_injected_variable() {
    let child = spawn_sleeper(|cmd| {
        cmd.env("MYVAR", "123");
    });
    let env = environ(child.0.id()).unwrap();
    assert_eq!(env.get("MYVAR").map(String::as_str), Some("123"));
}

#[test]
fn reaped_pid_fails_with_no_such_process() {
    let mut child = Command::new("cmd").args(["/d", "/c", "exit"]).spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    wait_until_gone(pid);

    for result in [cmdline(pid).map(drop), cwd(pid).map(drop), environ(pid).map(drop)] {
        match result {
            Err(Error::NoSuchProcess(p)) => assert_eq!(p, pid),
            other => panic!("expected NoSuchProcess, got {other:?}"),
        }
    }
}

#[test]
fn repeated_extraction_is_stable() {
    let child = spawn_sleeper(|cmd| {
        cmd.env("MYVAR", "123");
    });
    let pid = child.0.id();
    assert_eq!(cmdline(pid).unwrap(), cmdline(pid).unwrap());
    assert_eq!(environ(pid).unwrap(), environ(pid).unwrap());
    assert_eq!(cwd(pid).unwrap(), cwd(pid).unwrap());
}

#[test]
fn snapshot_scan_finds_the_caller() {
    let me = std::process::id();
    let entry = process_entry(me).unwrap();
    assert_eq!(entry.pid, me);
    assert!(entry.threads >= 1);
}

#[test]
fn snapshot_scan_misses_a_reaped_pid() {
    let mut child = Command::new("cmd").args(["/d", "/c", "exit"]).spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    wait_until_gone(pid);
    assert!(matches!(process_entry(pid), Err(Error::NoSuchProcess(p)) if p == pid));
}
