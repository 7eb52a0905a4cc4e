//! Orchestrator
//!
//! Owns the main loop: brings up the master, pushes parameters,
//! starts every worker, and spins the process monitor until shutdown.

use crate::compiler::LaunchFile;
use crate::error::LaunchError;
use crate::master;
use crate::plan::LaunchPlan;
use crate::process::{next_process_name, LocalProcess, ProcessMonitor, RemoteProcess};
use crate::ros;
use crate::rpc::RegistryClient;
use crate::substitution::Scope;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const SPIN_INTERVAL: Duration = Duration::from_millis(100);
const ROSCORE_CONFIG: &str = "/etc/ros/roscore.xml";

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown_signal(_signal: i32) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install SIGINT/SIGTERM handlers that raise the termination flag
/// the main loop observes.
pub fn install_signal_handlers() {
    let action = SigAction::new(
        SigHandler::Handler(handle_shutdown_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        let _ = sigaction(Signal::SIGINT, &action);
        let _ = sigaction(Signal::SIGTERM, &action);
    }
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Launch options carried from the command line.
#[derive(Debug, Default, Clone)]
pub struct RunnerOpts {
    pub screen: bool,
    pub local_only: bool,
    pub port: Option<u16>,
    pub num_workers: Option<u32>,
    pub disable_title: bool,
    pub override_hostname: Option<String>,
    pub override_ip: Option<String>,
}

/// Top-level controller for one launch.
pub struct LaunchRunner {
    run_id: String,
    opts: RunnerOpts,
    plan: LaunchPlan,
    core_plan: Option<LaunchPlan>,
    uri: String,
    monitor: ProcessMonitor,
}

impl LaunchRunner {
    pub fn new(
        run_id: String,
        opts: RunnerOpts,
        launch_files: &[LaunchFile],
    ) -> Result<Self, LaunchError> {
        let plan = LaunchPlan::assemble(launch_files)?;
        let uri = ros::master_uri(
            opts.override_hostname.as_deref(),
            opts.override_ip.as_deref(),
            opts.port,
        );
        let core_plan = load_core_plan()?;

        Ok(Self {
            run_id,
            opts,
            plan,
            core_plan,
            uri,
            monitor: ProcessMonitor::new(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn plan(&self) -> &LaunchPlan {
        &self.plan
    }

    /// Bring the whole configuration up. On any failure every process
    /// started so far is torn down before the error propagates.
    pub fn launch(&mut self) -> Result<(), LaunchError> {
        self.plan.print_summary();

        match self.try_launch() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stop();
                Err(e)
            }
        }
    }

    fn try_launch(&mut self) -> Result<(), LaunchError> {
        let client = self.setup()?;

        // Parameters land on the registry before any worker starts.
        if let Some(core_plan) = &self.core_plan {
            master::push_parameters(&client, core_plan)?;
        }
        master::push_parameters(&client, &self.plan)?;

        if !self.opts.local_only {
            self.launch_remote_nodes()?;
        }
        self.launch_local_nodes()?;

        Ok(())
    }

    /// Detect or start the master, reconcile the run id, and start
    /// the core services.
    fn setup(&mut self) -> Result<RegistryClient, LaunchError> {
        let mut client = RegistryClient::new(self.uri.clone());

        if !master::is_master_running(&client) {
            let port = self.opts.port.unwrap_or(ros::DEFAULT_MASTER_PORT);
            let workers = self.opts.num_workers.unwrap_or(master::DEFAULT_NUM_WORKERS);
            let child = master::start_master(port, workers)?;

            self.uri = ros::create_master_uri(
                self.opts.override_hostname.as_deref(),
                self.opts.override_ip.as_deref(),
                port,
            );
            client = RegistryClient::new(self.uri.clone());
            master::wait_for_master(&client)?;

            let argv = vec![
                "rosmaster".to_string(),
                "--core".to_string(),
                "-p".to_string(),
                port.to_string(),
                "-w".to_string(),
                workers.to_string(),
            ];
            self.monitor.add_process(Box::new(LocalProcess::adopt(
                "rosmaster".to_string(),
                child,
                argv,
                &self.run_id,
                true,
            )));
        }

        println!("ROS_MASTER_URI={}", self.uri);
        master::reconcile_run_id(&client, &self.run_id)?;
        self.update_terminal_title();
        self.launch_core_nodes()?;
        Ok(client)
    }

    fn update_terminal_title(&self) {
        if !self.opts.disable_title {
            print!("\x1b]2;{}\x07", self.uri);
        }
    }

    fn launch_core_nodes(&mut self) -> Result<(), LaunchError> {
        let Some(core_plan) = &self.core_plan else {
            return Ok(());
        };
        // Core nodes always run locally and never log to files.
        for plan_node in core_plan.nodes() {
            let name = next_process_name(&plan_node.node.resolved_name());
            let process = LocalProcess::spawn_node(
                &plan_node.node,
                name,
                &self.run_id,
                &self.uri,
                true,
                self.opts.screen,
            )?;
            process.print_start_message();
            self.monitor.add_process(Box::new(process));
        }
        Ok(())
    }

    fn launch_local_nodes(&mut self) -> Result<(), LaunchError> {
        for plan_node in self.plan.local_nodes() {
            let name = next_process_name(&plan_node.node.resolved_name());
            match LocalProcess::spawn_node(
                &plan_node.node,
                name,
                &self.run_id,
                &self.uri,
                false,
                self.opts.screen,
            ) {
                Ok(process) => {
                    process.print_start_message();
                    self.monitor.add_process(Box::new(process));
                }
                Err(e) if plan_node.node.required() => return Err(e),
                Err(e) => {
                    eprintln!(
                        "failed to start node {}: {}",
                        plan_node.node.resolved_name(),
                        e
                    );
                }
            }
        }
        Ok(())
    }

    /// One remote launcher child per distinct machine.
    fn launch_remote_nodes(&mut self) -> Result<(), LaunchError> {
        // A connection failure is fatal when any node bound to the
        // machine is required.
        let required_machines: HashSet<String> = self
            .plan
            .remote_nodes()
            .filter(|pn| pn.node.required())
            .map(|pn| pn.machine.name().to_string())
            .collect();

        let mut seen: HashSet<String> = HashSet::new();

        for plan_node in self.plan.remote_nodes() {
            if !seen.insert(plan_node.machine.name().to_string()) {
                continue;
            }

            let name = next_process_name(plan_node.machine.name());
            let result = RemoteProcess::new(
                name,
                plan_node.machine.clone(),
                &self.uri,
                &self.run_id,
            )
            .and_then(|process| {
                process.start()?;
                Ok(process)
            });

            match result {
                Ok(process) => self.monitor.add_process(Box::new(process)),
                Err(e) if required_machines.contains(plan_node.machine.name()) => return Err(e),
                Err(e) => {
                    eprintln!(
                        "remote[{}]: failed to launch on {}\n\n{}\n",
                        plan_node.node.resolved_name(),
                        plan_node.machine.name(),
                        e
                    );
                }
            }
        }

        Ok(())
    }

    /// Drive the monitor until a required process dies or termination
    /// is requested.
    pub fn spin(&self) {
        while !self.monitor.is_shutdown() && !shutdown_requested() {
            self.monitor.monitor();
            std::thread::sleep(SPIN_INTERVAL);
        }
        self.stop();
    }

    /// Tear down every process. Idempotent.
    pub fn stop(&self) {
        self.monitor.shutdown();
    }
}

/// The optional core-services config is just another launch file.
fn load_core_plan() -> Result<Option<LaunchPlan>, LaunchError> {
    let mut candidates = vec![Path::new(ROSCORE_CONFIG).to_path_buf()];
    if let Some(root) = ros::ros_root() {
        candidates.push(root.join("../roslaunch/resources/roscore.xml"));
    }

    for path in candidates {
        if path.is_file() {
            let launch = LaunchFile::from_path(&path, Scope::new(), &HashSet::new())?;
            return Ok(Some(LaunchPlan::assemble(std::slice::from_ref(&launch))?));
        }
    }

    log::debug!("no roscore.xml found; starting without core nodes");
    Ok(None)
}
