//! Process monitor

use crate::process::{bump_process_name, Process};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

enum EntryStatus {
    Active,
    Respawning { died_at: Instant },
    Dead,
}

struct Entry {
    process: Box<dyn Process>,
    status: EntryStatus,
}

struct MonitorState {
    entries: Vec<Entry>,
    shutdown_done: bool,
}

/// Supervises every launched handle: detects death, enforces the
/// required-dies-fails-all rule, schedules delayed respawns, and
/// fans out shutdown.
pub struct ProcessMonitor {
    state: Mutex<MonitorState>,
    is_shutdown: AtomicBool,
}

impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState {
                entries: Vec::new(),
                shutdown_done: false,
            }),
            is_shutdown: AtomicBool::new(false),
        }
    }

    pub fn add_process(&self, process: Box<dyn Process>) {
        let mut state = self.state.lock();
        state.entries.push(Entry {
            process,
            status: EntryStatus::Active,
        });
    }

    /// True once shutdown has been requested or triggered.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Number of handles currently believed to be alive.
    pub fn active_count(&self) -> usize {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .filter(|e| matches!(e.status, EntryStatus::Active))
            .count()
    }

    /// One monitoring cycle. Cycles are best-effort: when the mutex
    /// is held elsewhere the cycle is skipped, and a later cycle
    /// picks up whatever happened in between.
    pub fn monitor(&self) {
        let Some(mut state) = self.state.try_lock() else {
            return;
        };
        if state.shutdown_done || self.is_shutdown() {
            return;
        }

        // Pass 1: find newly dead handles.
        let mut required_died = false;
        let mut freshly_died = Vec::new();
        for (index, entry) in state.entries.iter_mut().enumerate() {
            if !matches!(entry.status, EntryStatus::Active) {
                continue;
            }
            if entry.process.is_running() {
                continue;
            }

            let description = entry.process.exit_description();

            if entry.process.is_required() {
                let bar = "=".repeat(80);
                println!("{}", bar);
                println!("REQUIRED process [{}] has died!", entry.process.name());
                println!("{}", description);
                println!("Initiating shutdown!");
                println!("{}", bar);

                required_died = true;
                break;
            }

            println!("[{}]: {}", entry.process.name(), description);
            freshly_died.push(index);
        }

        if required_died {
            self.shutdown_locked(&mut state);
            return;
        }

        // Pass 2: move the fresh deaths to the respawn map or the
        // dead set.
        for index in freshly_died {
            let entry = &mut state.entries[index];
            if entry.process.should_respawn() {
                entry.status = EntryStatus::Respawning {
                    died_at: Instant::now(),
                };
            } else {
                entry.process.destroy();
                entry.status = EntryStatus::Dead;
            }
        }

        // Pass 3: restart every respawning handle whose delay has
        // elapsed.
        for entry in state.entries.iter_mut() {
            let EntryStatus::Respawning { died_at } = entry.status else {
                continue;
            };
            if died_at.elapsed().as_secs_f64() < entry.process.respawn_delay() {
                continue;
            }

            println!("[{}] restarting process", entry.process.name());
            let new_name = bump_process_name(entry.process.name());
            entry.process.set_name(new_name);

            match entry.process.restart() {
                Ok(()) => entry.status = EntryStatus::Active,
                Err(e) => {
                    eprintln!(
                        "Restart of process [{}] failed: {}",
                        entry.process.name(),
                        e
                    );
                    entry.process.destroy();
                    entry.status = EntryStatus::Dead;
                }
            }
        }
    }

    /// Stop every running handle and mark the monitor shut down.
    /// Blocking, and idempotent: a second call observes the done
    /// flag and returns immediately.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        self.shutdown_locked(&mut state);
    }

    fn shutdown_locked(&self, state: &mut MonitorState) {
        if state.shutdown_done {
            self.is_shutdown.store(true, Ordering::SeqCst);
            return;
        }

        for entry in state.entries.iter_mut() {
            if matches!(entry.status, EntryStatus::Dead) {
                continue;
            }
            if entry.process.is_running() {
                println!("[{}] killing on exit", entry.process.name());
            }
            entry.process.destroy();
        }

        for entry in state.entries.iter_mut() {
            entry.process.wait();
            entry.status = EntryStatus::Dead;
        }

        state.shutdown_done = true;
        self.is_shutdown.store(true, Ordering::SeqCst);
    }
}
