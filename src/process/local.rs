//! Locally forked worker processes

use crate::error::LaunchError;
use crate::logs;
use crate::process::Process;
use crate::ros;
use crate::tags::{CwdPolicy, NodeTag, OutputPolicy};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Build the argv for a node: launch-prefix tokens, executable path,
/// remappings, `__name:=`, node args, and the `__log:=` file when
/// output goes to a file.
pub fn build_node_argv(
    node: &NodeTag,
    node_name: &str,
    log_file: Option<&Path>,
    with_namespace_env: bool,
) -> Result<Vec<String>, LaunchError> {
    let executable = ros::find_node_executable(node.package(), node.node_type()).ok_or_else(
        || LaunchError::SpawnFailure {
            name: node.resolved_name(),
            reason: format!(
                "cannot locate node of type [{}] in package [{}]",
                node.node_type(),
                node.package()
            ),
        },
    )?;

    let mut argv = Vec::new();

    // The namespace is exported as an inline env assignment for the
    // `--args` listing; the real spawn passes it via the environment.
    if with_namespace_env {
        let ns = node.namespace().trim_end_matches('/');
        if !ns.is_empty() {
            argv.push(format!("{}={}", ros::ENV_ROS_NAMESPACE, ns));
        }
    }

    if let Some(prefix) = node.launch_prefix() {
        argv.extend(prefix.split_whitespace().map(str::to_string));
    }

    argv.push(executable.display().to_string());

    for (from, to) in node.remaps() {
        argv.push(format!("{}:={}", from, to));
    }

    argv.push(format!("__name:={}", node_name));
    argv.extend(node.args().iter().cloned());

    if let Some(log_file) = log_file {
        if node.output() == OutputPolicy::Log {
            argv.push(format!("__log:={}", log_file.display()));
        }
    }

    Ok(argv)
}

/// Build a node's environment: the parent environment without the
/// namespace variable, plus the registry URI, the node's namespace
/// (trailing slash stripped), and the node's own env overrides.
pub fn build_node_env(node: &NodeTag, master_uri: &str) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    env.remove(ros::ENV_ROS_NAMESPACE);
    env.insert(ros::ENV_MASTER_URI.to_string(), master_uri.to_string());

    let ns = node.namespace().trim_end_matches('/');
    if !ns.is_empty() {
        env.insert(ros::ENV_ROS_NAMESPACE.to_string(), ns.to_string());
    }

    for (name, value) in node.env() {
        env.insert(name.clone(), value.clone());
    }

    env
}

/// Resolve the working directory for the node's cwd policy.
fn working_dir(node: &NodeTag, executable: Option<&Path>) -> Option<PathBuf> {
    match node.cwd() {
        CwdPolicy::RosHome => Some(ros::ros_home()),
        CwdPolicy::RosRoot => ros::ros_root(),
        CwdPolicy::Cwd => None,
        CwdPolicy::Node => executable.and_then(|p| p.parent().map(Path::to_path_buf)),
    }
}

/// A worker forked on this host.
pub struct LocalProcess {
    name: String,
    argv: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    run_id: String,
    is_core: bool,
    required: bool,
    respawn: bool,
    respawn_delay: f64,
    log_output: bool,
    child: Option<Child>,
    exit_status: Option<ExitStatus>,
}

impl LocalProcess {
    /// Spawn a node process.
    pub fn spawn_node(
        node: &NodeTag,
        name: String,
        run_id: &str,
        master_uri: &str,
        is_core: bool,
        force_screen: bool,
    ) -> Result<Self, LaunchError> {
        let log_output = node.output() == OutputPolicy::Log && !force_screen && !is_core;

        let log_file = logs::process_log_file(&name, run_id);
        let argv = build_node_argv(node, &name, Some(&log_file), false)?;
        let env = build_node_env(node, master_uri);
        let executable = ros::find_node_executable(node.package(), node.node_type());
        let cwd = working_dir(node, executable.as_deref());

        let mut process = Self {
            name,
            argv,
            env,
            cwd,
            run_id: run_id.to_string(),
            is_core,
            required: node.required(),
            respawn: node.respawn(),
            respawn_delay: node.respawn_delay(),
            log_output,
            child: None,
            exit_status: None,
        };
        process.start(false)?;
        Ok(process)
    }

    /// Adopt an already-spawned child (the forked master).
    pub fn adopt(
        name: String,
        child: Child,
        argv: Vec<String>,
        run_id: &str,
        is_core: bool,
    ) -> Self {
        Self {
            name,
            argv,
            env: std::env::vars().collect(),
            cwd: None,
            run_id: run_id.to_string(),
            is_core,
            required: false,
            respawn: false,
            respawn_delay: 0.0,
            log_output: false,
            child: Some(child),
            exit_status: None,
        }
    }

    fn start(&mut self, append_logs: bool) -> Result<(), LaunchError> {
        // Children connected to a pipe or file buffer their stdout;
        // the stdbuf shim forces line buffering so output is visible
        // as it happens.
        let mut command = Command::new("stdbuf");
        command.arg("-oL").args(&self.argv);
        command.env_clear().envs(&self.env);

        if let Some(cwd) = &self.cwd {
            if cwd.is_dir() {
                command.current_dir(cwd);
            }
        }

        if self.log_output {
            logs::ensure_run_log_dir(&self.run_id)?;
            let open = |path: PathBuf| -> Result<std::fs::File, LaunchError> {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(append_logs)
                    .write(true)
                    .open(&path)
                    .map_err(|e| LaunchError::SpawnFailure {
                        name: self.name.clone(),
                        reason: format!("cannot open log file {}: {}", path.display(), e),
                    })
            };
            command.stdout(Stdio::from(open(logs::process_stdout_log(
                &self.name,
                &self.run_id,
            ))?));
            command.stderr(Stdio::from(open(logs::process_stderr_log(
                &self.name,
                &self.run_id,
            ))?));
        } else {
            command.stdout(Stdio::inherit());
            command.stderr(Stdio::inherit());
        }

        let child = command.spawn().map_err(|e| LaunchError::SpawnFailure {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;

        self.child = Some(child);
        self.exit_status = None;
        Ok(())
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Announce the start the way the launcher reports every worker.
    pub fn print_start_message(&self) {
        if self.is_core {
            println!("started core service [{}]", self.name);
        } else {
            match self.pid() {
                Some(pid) => println!("process[{}]: started with pid [{}]", self.name, pid),
                None => println!("process[{}]: started", self.name),
            }
        }
    }

    fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

impl Process for LocalProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn is_required(&self) -> bool {
        self.required
    }

    fn should_respawn(&self) -> bool {
        self.respawn
    }

    fn respawn_delay(&self) -> f64 {
        self.respawn_delay
    }

    fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                self.child = None;
                false
            }
            Ok(None) => true,
            Err(e) => {
                log::error!("[{}] error polling process: {}", self.name, e);
                false
            }
        }
    }

    fn destroy(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        let pid = Pid::from_raw(child.id() as i32);
        let _ = kill(pid, Signal::SIGTERM);

        let deadline = Instant::now() + STOP_TIMEOUT;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.exit_status = Some(status);
                    self.child = None;
                    return;
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        log::warn!("[{}] did not exit after SIGTERM, killing", self.name);
                        let _ = kill(pid, Signal::SIGKILL);
                        if let Ok(status) = child.wait() {
                            self.exit_status = Some(status);
                        }
                        self.child = None;
                        return;
                    }
                    std::thread::sleep(STOP_POLL_INTERVAL);
                }
                Err(e) => {
                    log::error!("[{}] error waiting for process: {}", self.name, e);
                    self.child = None;
                    return;
                }
            }
        }
    }

    fn wait(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Ok(status) = child.wait() {
                self.exit_status = Some(status);
            }
            self.child = None;
        }
    }

    fn restart(&mut self) -> Result<(), LaunchError> {
        self.destroy();

        // Only the log-file argument changes across restarts; every
        // other argv entry is preserved verbatim.
        let new_log = logs::process_log_file(&self.name, &self.run_id);
        for arg in self.argv.iter_mut() {
            if arg.starts_with("__log:=") {
                *arg = format!("__log:={}", new_log.display());
            }
        }

        self.start(true)?;
        self.print_start_message();
        Ok(())
    }

    fn exit_description(&mut self) -> String {
        let mut output = match self.exit_status {
            Some(status) if status.success() => "process has finished cleanly".to_string(),
            Some(status) => format!(
                "process has died [exit code: {}, cmd: {}]",
                status.code().unwrap_or(-1),
                self.command_line()
            ),
            None => format!("process has died [cmd: {}]", self.command_line()),
        };

        if self.log_output {
            output.push_str(&format!(
                "\nlog file: {}",
                logs::process_log_file(&self.name, &self.run_id).display()
            ));
        }

        output
    }
}

impl Drop for LocalProcess {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substitution::Scope;
    use crate::xml::XmlEntity;

    fn node(xml: &str) -> NodeTag {
        let doc = roxmltree::Document::parse(xml).unwrap();
        NodeTag::from_entity(
            &XmlEntity::new(doc.root_element()),
            &Scope::new(),
            &PathBuf::from("f"),
        )
        .unwrap()
    }

    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    fn with_fake_executable(f: impl FnOnce(&NodeTag)) {
        let _guard = ENV_LOCK.lock();
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("demo");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join("talker"), "#!/bin/sh\n").unwrap();

        std::env::set_var(ros::ENV_LD_LIBRARY_PATH, dir.path());
        let n = node(
            r#"<node pkg="demo" type="talker" name="n" args="--rate 10" ns="space">
                 <remap from="in" to="out"/>
               </node>"#,
        );
        f(&n);
    }

    #[test]
    fn test_argv_layout() {
        with_fake_executable(|n| {
            let argv =
                build_node_argv(n, "n-1", Some(Path::new("/tmp/n-1.log")), false).unwrap();
            // executable, remap, __name, two args, __log
            assert!(argv[0].ends_with("demo/talker"));
            assert_eq!(argv[1], "in:=out");
            assert_eq!(argv[2], "__name:=n-1");
            assert_eq!(argv[3], "--rate");
            assert_eq!(argv[4], "10");
            assert_eq!(argv[5], "__log:=/tmp/n-1.log");
        });
    }

    #[test]
    fn test_argv_without_log_file() {
        with_fake_executable(|n| {
            let argv = build_node_argv(n, "n-1", None, false).unwrap();
            assert!(!argv.iter().any(|a| a.starts_with("__log:=")));
        });
    }

    #[test]
    fn test_argv_with_namespace_env_prefix() {
        with_fake_executable(|n| {
            let argv = build_node_argv(n, "n-1", None, true).unwrap();
            assert_eq!(argv[0], "ROS_NAMESPACE=/space");
        });
    }

    #[test]
    fn test_missing_executable_is_spawn_failure() {
        let _guard = ENV_LOCK.lock();
        std::env::set_var(ros::ENV_LD_LIBRARY_PATH, "/definitely/not/here");
        let n = node(r#"<node pkg="ghost" type="prog" name="n"/>"#);
        assert!(build_node_argv(&n, "n-1", None, false).is_err());
    }

    #[test]
    fn test_node_env() {
        let n = node(
            r#"<node pkg="p" type="t" name="n" ns="space">
                 <env name="EXTRA" value="1"/>
               </node>"#,
        );
        let env = build_node_env(&n, "http://host:11311");
        assert_eq!(env.get(ros::ENV_MASTER_URI).unwrap(), "http://host:11311");
        assert_eq!(env.get(ros::ENV_ROS_NAMESPACE).unwrap(), "/space");
        assert_eq!(env.get("EXTRA").unwrap(), "1");
    }

    #[test]
    fn test_node_env_without_namespace() {
        std::env::remove_var(ros::ENV_ROS_NAMESPACE);
        let n = node(r#"<node pkg="p" type="t" name="n"/>"#);
        let env = build_node_env(&n, "http://host:11311");
        assert!(!env.contains_key(ros::ENV_ROS_NAMESPACE));
    }
}
