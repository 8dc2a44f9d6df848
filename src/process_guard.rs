//! Process lifecycle management
//!
//! Two jobs live here:
//!
//! - Package-manager children run in their own process group and are tracked
//!   in a global registry, so a SIGINT/SIGTERM/SIGHUP delivered to us also
//!   takes down a half-finished `opkg install`.
//! - Restarting the host GUI after an install: every process whose
//!   `/proc/<pid>/comm` matches the configured name gets SIGKILL, which the
//!   box's init respawns.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry of package-manager children still running
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered child process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered child process PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// SIGTERM every tracked group, then SIGKILL survivors after `grace_period`
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.pids.is_empty() {
            return;
        }

        info!("Terminating {} child process group(s)", self.pids.len());
        let pids: Vec<u32> = self.pids.drain().collect();

        for &pid in &pids {
            if let Err(e) = signal::kill(group_of(pid), Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to process group {}: {}", pid, e);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !is_process_alive(pid)) {
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in pids.iter().filter(|&&pid| is_process_alive(pid)) {
            warn!("Process group {} ignored SIGTERM, sending SIGKILL", pid);
            let _ = signal::kill(group_of(pid), Signal::SIGKILL);
        }
    }
}

fn group_of(pid: u32) -> Pid {
    Pid::from_raw(-(pid as i32))
}

/// Whether `pid` exists and is not a zombie
pub fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Field 3 of /proc/pid/stat is the state
    match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .map(|state| !matches!(state, "Z" | "X"))
            .unwrap_or(true),
        Err(_) => true,
    }
}

/// Install SIGINT/SIGTERM/SIGHUP handlers that clean up tracked children.
/// Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {}, cleaning up child processes", sig);
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Run the command as leader of a new process group
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        self.process_group(0)
    }
}

/// Spawn `cmd` in its own group, track it, and collect its output
pub fn run_tracked(cmd: &mut Command) -> std::io::Result<Output> {
    let child = cmd
        .in_new_process_group()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let pid = child.id();
    let registry = ChildRegistry::global();
    if let Ok(mut reg) = registry.lock() {
        reg.register(pid);
    }

    let output = child.wait_with_output();

    if let Ok(mut reg) = registry.lock() {
        reg.unregister(pid);
    }
    output
}

/// PIDs whose `comm` equals `name`, scanned from a procfs root
pub fn find_pids_by_name(proc_root: &Path, name: &str) -> Vec<u32> {
    let Ok(entries) = fs::read_dir(proc_root) else {
        return Vec::new();
    };

    let mut pids: Vec<u32> = entries
        .flatten()
        .filter_map(|entry| {
            let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
            let comm = fs::read_to_string(entry.path().join("comm")).ok()?;
            (comm.trim_end() == name).then_some(pid)
        })
        .collect();
    pids.sort_unstable();
    pids
}

/// SIGKILL every process named `name`; returns how many were signalled
pub fn kill_by_name(name: &str) -> usize {
    let own = std::process::id();
    let mut killed = 0;
    for pid in find_pids_by_name(Path::new("/proc"), name) {
        if pid == own {
            continue;
        }
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) => killed += 1,
            Err(e) => warn!("Failed to kill {} (PID {}): {}", name, pid, e),
        }
    }
    killed
}

/// Wait `delay`, then kill the host GUI so its supervisor restarts it
pub fn restart_host(name: &str, delay: Duration) -> usize {
    info!("Restarting host process {} in {:?}", name, delay);
    std::thread::sleep(delay);
    let killed = kill_by_name(name);
    if killed == 0 {
        warn!("No running process named {} found", name);
    }
    killed
}
