//! Helper process launch and bounded wait.
//!
//! A [`ChildProcess`] is one-shot: `Unstarted → Running → Exited`, or
//! `Unstarted → FailedToStart`. Waiting past the deadline leaves the helper
//! running; nothing here ever kills or reaps a child.

use cn_common::{Error, ProcessIds, Result};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace};

use crate::command_line::{format_command_line, quote_if_needed};

/// Poll interval while waiting for the helper.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// Windows process creation flags.
#[cfg(windows)]
mod creation {
    use windows::Win32::System::Threading;

    pub const CREATE_NEW_CONSOLE: u32 = Threading::CREATE_NEW_CONSOLE.0;
    pub const NORMAL_PRIORITY_CLASS: u32 = Threading::NORMAL_PRIORITY_CLASS.0;
    pub const CREATE_NEW_PROCESS_GROUP: u32 = Threading::CREATE_NEW_PROCESS_GROUP.0;
}

#[cfg(not(windows))]
mod creation {
    pub const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;
    pub const NORMAL_PRIORITY_CLASS: u32 = 0x0000_0020;
    pub const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
}

use creation::{CREATE_NEW_CONSOLE, CREATE_NEW_PROCESS_GROUP, NORMAL_PRIORITY_CLASS};

/// How the helper is detached from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationFlags {
    /// Own console on Windows; detached stdio elsewhere.
    pub new_console: bool,
    /// Own process group, so host signals do not reach it.
    pub new_process_group: bool,
    pub normal_priority: bool,
}

impl CreationFlags {
    /// Fully detached from the host's console and process group.
    pub const fn detached() -> Self {
        CreationFlags {
            new_console: true,
            new_process_group: true,
            normal_priority: true,
        }
    }

    /// The Windows `dwCreationFlags` equivalent.
    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.new_console {
            bits |= CREATE_NEW_CONSOLE;
        }
        if self.new_process_group {
            bits |= CREATE_NEW_PROCESS_GROUP;
        }
        if self.normal_priority {
            bits |= NORMAL_PRIORITY_CLASS;
        }
        bits
    }
}

impl Default for CreationFlags {
    fn default() -> Self {
        Self::detached()
    }
}

/// Lifecycle state of a [`ChildProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Unstarted,
    Running,
    Exited(ExitStatus),
    FailedToStart,
}

/// One helper process invocation.
#[derive(Debug)]
pub struct ChildProcess {
    state: ProcessState,
    child: Option<Child>,
    ids: Option<ProcessIds>,
    command_line: Option<String>,
}

impl Default for ChildProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl ChildProcess {
    pub fn new() -> Self {
        ChildProcess {
            state: ProcessState::Unstarted,
            child: None,
            ids: None,
            command_line: None,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn ids(&self) -> Option<ProcessIds> {
        self.ids
    }

    /// The escaped command line, once it has been built.
    pub fn command_line(&self) -> Option<&str> {
        self.command_line.as_deref()
    }

    /// Start `executable` with `args`.
    #[instrument(skip(self, executable, args), fields(exe = %executable.display()))]
    pub fn create<S: AsRef<str>>(
        &mut self,
        executable: &Path,
        args: &[S],
        flags: CreationFlags,
    ) -> Result<ProcessIds> {
        if self.state != ProcessState::Unstarted {
            return Err(Error::AlreadyRunning);
        }

        let exe = executable.to_string_lossy();
        let line = match format_command_line(&exe, args) {
            Ok(line) => line,
            Err(e) => {
                self.state = ProcessState::FailedToStart;
                return Err(e);
            }
        };
        let exe_token_len = quote_if_needed(&exe).len();
        let mut command = build_command(executable, &line[exe_token_len..], args, flags);
        self.command_line = Some(line);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!(error = %e, "spawn failed");
                self.state = ProcessState::FailedToStart;
                return Err(Error::LaunchFailed(e));
            }
        };

        let pid = child.id();
        let ids = ProcessIds::new(pid, primary_thread_id(pid));
        debug!(pid = ids.pid, tid = ids.tid, "helper started");
        self.child = Some(child);
        self.ids = Some(ids);
        self.state = ProcessState::Running;
        Ok(ids)
    }

    /// Block until the helper exits or `timeout` elapses.
    ///
    /// On timeout the helper keeps running and [`Error::WaitTimedOut`] is
    /// returned.
    #[instrument(skip(self), fields(pid = self.ids.map(|ids| ids.pid)))]
    pub fn wait(&mut self, timeout: Duration) -> Result<()> {
        match self.state {
            ProcessState::Running => {}
            ProcessState::Exited(_) => return Ok(()),
            ProcessState::Unstarted | ProcessState::FailedToStart => {
                return Err(Error::NotStarted)
            }
        }
        let child = self.child.as_mut().ok_or(Error::NotStarted)?;

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    trace!(status = %status, "helper exited");
                    self.state = ProcessState::Exited(status);
                    return Ok(());
                }
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::WaitTimedOut { timeout });
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    return Err(Error::WaitAbandoned);
                }
                Err(e) => return Err(Error::WaitFailed(e)),
            }
        }
    }

    /// Exit code of a helper that has been waited on.
    pub fn exit_code(&self) -> Result<u32> {
        match self.state {
            ProcessState::Exited(status) => status
                .code()
                .map(|code| code as u32)
                .ok_or_else(|| Error::ExitCodeUnavailable(status.to_string())),
            _ => Err(Error::NotStarted),
        }
    }
}

#[cfg(unix)]
fn build_command<S: AsRef<str>>(
    executable: &Path,
    _raw_args: &str,
    args: &[S],
    flags: CreationFlags,
) -> Command {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new(executable);
    for arg in args {
        let arg: &str = arg.as_ref();
        command.arg(arg);
    }
    if flags.new_console {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
    }
    if flags.new_process_group {
        command.process_group(0);
    }
    command
}

#[cfg(windows)]
fn build_command<S: AsRef<str>>(
    executable: &Path,
    raw_args: &str,
    _args: &[S],
    flags: CreationFlags,
) -> Command {
    use std::os::windows::process::CommandExt;

    let mut command = Command::new(executable);
    if let Some(raw) = raw_args.strip_prefix(' ') {
        command.raw_arg(raw);
    }
    if flags.new_console {
        command.stdin(Stdio::null());
    }
    command.creation_flags(flags.bits());
    command
}

#[cfg(not(windows))]
fn primary_thread_id(pid: u32) -> u32 {
    pid
}

#[cfg(windows)]
fn primary_thread_id(pid: u32) -> u32 {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD, THREADENTRY32,
    };

    // SAFETY: the snapshot handle is closed before returning and the entry
    // struct is sized as the API requires.
    unsafe {
        let Ok(snapshot) = CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) else {
            return 0;
        };
        let mut entry = THREADENTRY32 {
            dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
            ..Default::default()
        };
        let mut found = 0;
        if Thread32First(snapshot, &mut entry).is_ok() {
            loop {
                if entry.th32OwnerProcessID == pid {
                    found = entry.th32ThreadID;
                    break;
                }
                if Thread32Next(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }
        let _ = CloseHandle(snapshot);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_flags_map_to_windows_bits() {
        assert_eq!(CreationFlags::detached().bits(), 0x230);
        assert_eq!(
            CreationFlags {
                new_console: false,
                new_process_group: true,
                normal_priority: false,
            }
            .bits(),
            CREATE_NEW_PROCESS_GROUP
        );
    }

    #[test]
    fn wait_before_create_is_not_started() {
        let mut process = ChildProcess::new();
        assert!(matches!(
            process.wait(Duration::from_millis(1)),
            Err(Error::NotStarted)
        ));
        assert!(matches!(process.exit_code(), Err(Error::NotStarted)));
    }

    #[test]
    fn missing_executable_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = ChildProcess::new();
        let err = process
            .create(
                &dir.path().join("no-such-helper"),
                &["x"],
                CreationFlags::detached(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::LaunchFailed(_)));
        assert_eq!(process.state(), ProcessState::FailedToStart);
        assert!(process.command_line().is_some());
        assert!(matches!(
            process.create(Path::new("again"), &["x"], CreationFlags::detached()),
            Err(Error::AlreadyRunning)
        ));
    }

    #[test]
    fn oversized_command_line_fails_before_spawn() {
        let huge = "a".repeat(crate::command_line::MAX_COMMAND_LINE);
        let mut process = ChildProcess::new();
        let err = process
            .create(Path::new("helper"), &[huge], CreationFlags::detached())
            .unwrap_err();
        assert!(matches!(err, Error::CommandLineTooLong { .. }));
        assert!(process.command_line().is_none());
        assert_eq!(process.state(), ProcessState::FailedToStart);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn sh(script: &str) -> ChildProcess {
            let mut process = ChildProcess::new();
            process
                .create(Path::new("/bin/sh"), &["-c", script], CreationFlags::detached())
                .unwrap();
            process
        }

        #[test]
        fn exit_code_is_reported() {
            let mut process = sh("exit 7");
            process.wait(Duration::from_secs(10)).unwrap();
            assert_eq!(process.exit_code().unwrap(), 7);
            assert!(matches!(process.state(), ProcessState::Exited(_)));
        }

        #[test]
        fn ids_use_pid_as_thread() {
            let mut process = sh("exit 0");
            let ids = process.ids().unwrap();
            assert_eq!(ids.pid, ids.tid);
            process.wait(Duration::from_secs(10)).unwrap();
            assert_eq!(process.exit_code().unwrap(), 0);
        }

        #[test]
        fn timeout_leaves_process_running() {
            let mut process = sh("sleep 5");
            let pid = process.ids().unwrap().pid;
            let err = process.wait(Duration::from_millis(50)).unwrap_err();
            assert!(err.is_timeout());
            assert_eq!(process.state(), ProcessState::Running);

            // Still alive: signal 0 succeeds.
            let alive = std::process::Command::new("kill")
                .args(["-0", &pid.to_string()])
                .status()
                .unwrap();
            assert!(alive.success());

            let _ = std::process::Command::new("kill")
                .arg(pid.to_string())
                .status();
        }

        #[test]
        fn signal_death_has_no_exit_code() {
            let mut process = sh("kill -9 $$");
            process.wait(Duration::from_secs(10)).unwrap();
            assert!(matches!(
                process.exit_code(),
                Err(Error::ExitCodeUnavailable(_))
            ));
        }

        #[test]
        fn command_line_is_recorded() {
            let mut process = sh("exit 0");
            assert_eq!(process.command_line(), Some("/bin/sh -c \"exit 0\""));
            process.wait(Duration::from_secs(10)).unwrap();
        }
    }
}
