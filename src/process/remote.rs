//! Workers tunneled over SSH
//!
//! One remote handle runs the launcher binary in child mode on the
//! target machine; the machine-side launcher owns the actual worker
//! processes there.

use crate::error::LaunchError;
use crate::process::Process;
use crate::ros;
use crate::tags::MachineTag;
use parking_lot::Mutex;
use ssh2::{CheckResult, KnownHostFileKind, Session};
use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

const GLOBAL_KNOWN_HOSTS: &str = "/etc/ssh/ssh_known_hosts";
const USER_KNOWN_HOSTS: &str = "~/.ssh/known_hosts";

struct RemoteState {
    session: Option<Session>,
    channel: Option<ssh2::Channel>,
    started: bool,
    exit_code: Option<i32>,
}

/// A launcher child running on a remote machine.
pub struct RemoteProcess {
    name: String,
    machine: MachineTag,
    master_uri: String,
    command: String,
    required: bool,
    respawn: bool,
    respawn_delay: f64,
    state: Mutex<RemoteState>,
}

impl RemoteProcess {
    pub fn new(
        name: String,
        machine: MachineTag,
        master_uri: &str,
        run_id: &str,
    ) -> Result<Self, LaunchError> {
        let env_loader = machine.env_loader().ok_or_else(|| {
            LaunchError::RemoteConnection {
                name: name.clone(),
                reason: "machine env-loader must be set before creating an ssh child"
                    .to_string(),
            }
        })?;

        let command = format!(
            "{} rlaunch -c {} -u {} --run_id {}",
            env_loader, name, master_uri, run_id
        );

        Ok(Self {
            name,
            machine,
            master_uri: master_uri.to_string(),
            command,
            required: false,
            respawn: false,
            respawn_delay: 10.0,
            state: Mutex::new(RemoteState {
                session: None,
                channel: None,
                started: false,
                exit_code: None,
            }),
        })
    }

    /// Open the SSH session and start the remote child.
    pub fn start(&self) -> Result<(), LaunchError> {
        let mut state = self.state.lock();

        let address = self.machine.address();
        let port = self.machine.ssh_port();
        let user = self
            .machine
            .user()
            .map(str::to_string)
            .or_else(ros::local_username)
            .unwrap_or_else(|| "root".to_string());

        println!(
            "remote[{}]: creating ssh connection to {}:{}, user[{}]",
            self.name, address, port, user
        );

        let timeout = Duration::from_secs_f64(self.machine.timeout());
        let stream = TcpStream::connect((address, port)).map_err(|e| self.conn_err(e))?;
        stream.set_read_timeout(Some(timeout)).ok();
        stream.set_write_timeout(Some(timeout)).ok();

        let mut session = Session::new().map_err(|e| self.conn_err(e))?;
        session.set_timeout(timeout.as_millis() as u32);
        session.set_tcp_stream(stream);
        session.handshake().map_err(|e| self.conn_err(e))?;

        self.verify_host_key(&session)?;

        if let Some(password) = self.machine.password() {
            session
                .userauth_password(&user, password)
                .map_err(|e| self.conn_err(e))?;
        } else if session.userauth_agent(&user).is_err() {
            return Err(LaunchError::RemoteConnection {
                name: self.name.clone(),
                reason: format!("authentication failed for {}@{}", user, address),
            });
        }

        // The child inherits the registry URI through an env prefix.
        let command = format!(
            "env {}={} {}",
            ros::ENV_MASTER_URI,
            self.master_uri,
            self.command
        );
        println!(
            "launching remote launch child with command: [{}]",
            command
        );

        let mut channel = session.channel_session().map_err(|e| self.conn_err(e))?;
        channel.exec(&command).map_err(|e| self.conn_err(e))?;

        // Polled reads from the monitor must not block.
        session.set_blocking(false);

        state.session = Some(session);
        state.channel = Some(channel);
        state.started = true;
        state.exit_code = None;

        println!("remote[{}]: ssh connection created", self.name);
        Ok(())
    }

    fn conn_err(&self, err: impl std::fmt::Display) -> LaunchError {
        LaunchError::RemoteConnection {
            name: self.name.clone(),
            reason: err.to_string(),
        }
    }

    /// Check the host key against the known-hosts databases; refused
    /// unless found or ROSLAUNCH_SSH_UNKNOWN=1.
    fn verify_host_key(&self, session: &Session) -> Result<(), LaunchError> {
        let allow_unknown = std::env::var(ros::ENV_SSH_UNKNOWN)
            .map(|v| v == "1")
            .unwrap_or(false);
        if allow_unknown {
            return Ok(());
        }

        let address = self.machine.address();
        let port = self.machine.ssh_port();

        let mut known_hosts = session.known_hosts().map_err(|e| self.conn_err(e))?;

        let global = Path::new(GLOBAL_KNOWN_HOSTS);
        let user_file = ros::expand_user(USER_KNOWN_HOSTS);
        let file = if global.is_file() {
            global.to_path_buf()
        } else {
            user_file
        };

        if file.is_file() {
            known_hosts
                .read_file(&file, KnownHostFileKind::OpenSSH)
                .map_err(|_| LaunchError::RemoteConnection {
                    name: self.name.clone(),
                    reason: "cannot load SSH host keys, your known_hosts file may be corrupt"
                        .to_string(),
                })?;
        }

        let (key, _key_type) = session.host_key().ok_or_else(|| {
            self.conn_err("no host key presented by server")
        })?;

        match known_hosts.check_port(address, port, key) {
            CheckResult::Match => Ok(()),
            _ => {
                let port_str = if port != crate::tags::DEFAULT_SSH_PORT {
                    format!("-p {} ", port)
                } else {
                    String::new()
                };
                let user_str = self
                    .machine
                    .user()
                    .map(|u| format!("{}@", u))
                    .unwrap_or_default();
                Err(LaunchError::UnknownSshHost {
                    host: address.to_string(),
                    ssh_args: format!("{}{}{}", port_str, user_str, address),
                })
            }
        }
    }

    fn command_line(&self) -> &str {
        &self.command
    }
}

impl Process for RemoteProcess {
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
        let mut state = self.state.lock();
        if !state.started {
            return false;
        }

        let RemoteState {
            session,
            channel,
            exit_code,
            ..
        } = &mut *state;
        let Some(channel) = channel.as_mut() else {
            return false;
        };

        // Drain whatever the remote child has written since the last
        // cycle.
        let mut buffer = [0u8; 2048];
        let mut drained_everything = true;
        match channel.read(&mut buffer) {
            Ok(0) => {}
            Ok(n) => {
                let text = String::from_utf8_lossy(&buffer[..n]);
                for line in text.lines().filter(|l| !l.is_empty()) {
                    println!("remote[{}]: {}", self.name, line);
                }
                drained_everything = false;
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                log::error!(
                    "error while checking if remote process [{}] is running: {}",
                    self.name,
                    e
                );
            }
        }

        if channel.eof() && drained_everything {
            if let Some(session) = session.as_ref() {
                session.set_blocking(true);
            }
            let _ = channel.wait_close();
            *exit_code = Some(channel.exit_status().unwrap_or(-1));
            return false;
        }

        true
    }

    fn destroy(&mut self) {
        let mut state = self.state.lock();
        if !state.started {
            return;
        }

        if let Some(session) = state.session.as_ref() {
            session.set_blocking(true);
        }
        if let Some(mut channel) = state.channel.take() {
            let _ = channel.close();
            let _ = channel.wait_close();
            if state.exit_code.is_none() {
                state.exit_code = channel.exit_status().ok();
            }
        }
        if let Some(session) = state.session.take() {
            let _ = session.disconnect(None, "shutting down", None);
        }
        state.started = false;
    }

    fn wait(&mut self) {
        loop {
            {
                let state = self.state.lock();
                if !state.started {
                    return;
                }
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    fn restart(&mut self) -> Result<(), LaunchError> {
        Err(LaunchError::RemoteRestartUnsupported)
    }

    fn exit_description(&mut self) -> String {
        let state = self.state.lock();
        match state.exit_code {
            Some(0) => "process has finished cleanly".to_string(),
            Some(code) => format!(
                "process has died [exit code: {}, cmd: {}]",
                code,
                self.command_line()
            ),
            None => format!("process has died [cmd: {}]", self.command_line()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substitution::Scope;
    use crate::xml::XmlEntity;

    fn machine(xml: &str) -> MachineTag {
        let doc = roxmltree::Document::parse(xml).unwrap();
        MachineTag::from_entity(&XmlEntity::new(doc.root_element()), &Scope::new(), "f").unwrap()
    }

    #[test]
    fn test_requires_env_loader() {
        let m = machine(r#"<machine name="m" address="host"/>"#);
        assert!(RemoteProcess::new("m-1".to_string(), m, "http://x:1", "run").is_err());
    }

    #[test]
    fn test_remote_command_shape() {
        let m = machine(r#"<machine name="m" address="host" env-loader="/opt/env.sh"/>"#);
        let proc = RemoteProcess::new("m-1".to_string(), m, "http://x:11311", "runid").unwrap();
        assert_eq!(
            proc.command_line(),
            "/opt/env.sh rlaunch -c m-1 -u http://x:11311 --run_id runid"
        );
    }

    #[test]
    fn test_restart_fails_loudly() {
        let m = machine(r#"<machine name="m" address="host" env-loader="/opt/env.sh"/>"#);
        let mut proc =
            RemoteProcess::new("m-1".to_string(), m, "http://x:11311", "runid").unwrap();
        let err = proc.restart().unwrap_err();
        assert!(err.to_string().contains("do not support respawning"));
    }

    #[test]
    fn test_not_running_before_start() {
        let m = machine(r#"<machine name="m" address="host" env-loader="/opt/env.sh"/>"#);
        let mut proc =
            RemoteProcess::new("m-1".to_string(), m, "http://x:11311", "runid").unwrap();
        assert!(!proc.is_running());
    }
}
