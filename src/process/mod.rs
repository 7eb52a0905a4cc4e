//! Process supervision
//!
//! Local and remote worker handles behind a common capability trait,
//! plus the monitor that implements required-dies-fails-all, delayed
//! respawn, and fan-out shutdown.

mod local;
mod monitor;
mod remote;

pub use local::{build_node_argv, build_node_env, LocalProcess};
pub use monitor::ProcessMonitor;
pub use remote::RemoteProcess;

use crate::error::LaunchError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Capability set shared by local and remote handles.
pub trait Process: Send {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn is_required(&self) -> bool;
    fn should_respawn(&self) -> bool;
    /// Seconds to wait after death before a restart.
    fn respawn_delay(&self) -> f64;
    fn is_running(&mut self) -> bool;
    /// Stop the process. Safe to call on an already-dead handle.
    fn destroy(&mut self);
    /// Block until the process has exited.
    fn wait(&mut self);
    fn restart(&mut self) -> Result<(), LaunchError>;
    /// Human-readable account of how the process exited.
    fn exit_description(&mut self) -> String;
}

static PROCESS_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique process name: `<base>-<counter>` with a run-wide monotonic
/// counter, so names stay unique across respawns.
pub fn next_process_name(base: &str) -> String {
    let base = base.trim_start_matches('/');
    let count = PROCESS_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", base, count)
}

/// Bump the trailing counter of an existing process name. Everything
/// before the last `-` is the base.
pub fn bump_process_name(name: &str) -> String {
    let base = match name.rfind('-') {
        Some(idx) => &name[..idx],
        None => name,
    };
    next_process_name(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let a = next_process_name("talker");
        let b = next_process_name("talker");
        assert_ne!(a, b);
        assert!(a.starts_with("talker-"));
    }

    #[test]
    fn test_leading_slash_stripped() {
        assert!(next_process_name("/ns/node").starts_with("ns/node-"));
    }

    #[test]
    fn test_bump_replaces_tail_counter() {
        let first = next_process_name("q");
        let second = bump_process_name(&first);
        assert!(second.starts_with("q-"));
        assert_ne!(first, second);
        // The base survives even when it contains dashes itself.
        let bumped = bump_process_name("multi-part-7");
        assert!(bumped.starts_with("multi-part-"));
    }
}
