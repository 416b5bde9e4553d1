use std::thread::{self, JoinHandle};

use thiserror::Error;

#[cfg(windows)]
use winapi::um::processthreadsapi::{
    GetCurrentProcess, GetCurrentThread, SetPriorityClass, SetThreadPriority,
};
#[cfg(windows)]
use winapi::um::winbase::{HIGH_PRIORITY_CLASS, THREAD_PRIORITY_IDLE};

/// Nice values used for the process/worker split on Linux.
#[cfg(any(target_os = "linux", target_os = "android"))]
const HIGH_NICE: libc::c_int = -10;
#[cfg(any(target_os = "linux", target_os = "android"))]
const IDLE_NICE: libc::c_int = 19;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn task `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("scheduling priority hints are not supported on this host")]
    PriorityUnsupported,
    #[error("priority hint rejected by the host: {0}")]
    PriorityRejected(String),
}

/// Task body handed to a [`HostScheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a task started by a [`HostScheduler`].
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    inner: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn from_thread(name: impl Into<String>, handle: JoinHandle<()>) -> Self {
        Self {
            name: name.into(),
            inner: Some(handle),
        }
    }

    /// A handle for a task the host runs without a joinable context.
    pub fn detached(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the task to return. Returns `false` if it panicked.
    pub fn join(mut self) -> bool {
        match self.inner.take() {
            Some(handle) => handle.join().is_ok(),
            None => true,
        }
    }
}

/// Execution contexts and scheduling hints supplied by the host platform.
///
/// Priority hints are advisory: callers log failures and carry on.
pub trait HostScheduler: Send + Sync {
    fn spawn(&self, name: &str, task: Task) -> Result<TaskHandle, SchedulerError>;

    fn raise_process_priority(&self) -> Result<(), SchedulerError> {
        Err(SchedulerError::PriorityUnsupported)
    }

    fn lower_current_thread_priority(&self) -> Result<(), SchedulerError> {
        Err(SchedulerError::PriorityUnsupported)
    }
}

#[cfg(any(target_os = "linux", target_os = "android", windows))]
fn last_os_error() -> SchedulerError {
    SchedulerError::PriorityRejected(std::io::Error::last_os_error().to_string())
}

/// Linux nice values are per thread; `who` is a thread id.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn set_nice(who: libc::id_t, nice: libc::c_int) -> Result<(), SchedulerError> {
    // SAFETY: setpriority only reads its integer arguments.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, who, nice) };
    if rc == 0 { Ok(()) } else { Err(last_os_error()) }
}

#[cfg(windows)]
fn win_result(ok: winapi::shared::minwindef::BOOL) -> Result<(), SchedulerError> {
    if ok != 0 { Ok(()) } else { Err(last_os_error()) }
}

/// Runs every task on a dedicated, named OS thread.
///
/// Priority hints map to `setpriority` on Linux and Android and to the
/// priority class / thread priority APIs on Windows. Elsewhere they report
/// [`SchedulerError::PriorityUnsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl HostScheduler for ThreadScheduler {
    fn spawn(&self, name: &str, task: Task) -> Result<TaskHandle, SchedulerError> {
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(task)
            .map(|handle| TaskHandle::from_thread(name, handle))
            .map_err(|source| SchedulerError::Spawn {
                name: name.to_owned(),
                source,
            })
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn raise_process_priority(&self) -> Result<(), SchedulerError> {
        // SAFETY: getpid has no preconditions.
        let pid = unsafe { libc::getpid() };
        set_nice(pid as libc::id_t, HIGH_NICE)
    }

    #[cfg(windows)]
    fn raise_process_priority(&self) -> Result<(), SchedulerError> {
        // SAFETY: pseudo-handle for the calling process, always valid.
        win_result(unsafe { SetPriorityClass(GetCurrentProcess(), HIGH_PRIORITY_CLASS) })
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn lower_current_thread_priority(&self) -> Result<(), SchedulerError> {
        // SAFETY: gettid has no preconditions.
        let tid = unsafe { libc::syscall(libc::SYS_gettid) };
        set_nice(tid as libc::id_t, IDLE_NICE)
    }

    #[cfg(windows)]
    fn lower_current_thread_priority(&self) -> Result<(), SchedulerError> {
        // SAFETY: pseudo-handle for the calling thread, always valid.
        win_result(unsafe {
            SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_IDLE as winapi::ctypes::c_int)
        })
    }
}
