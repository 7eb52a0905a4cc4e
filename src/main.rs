//! rlaunch CLI

use clap::Parser;
use rlaunch::{
    compiler::LaunchFile,
    error::LaunchError,
    logs, master,
    process::build_node_argv,
    ros,
    rpc::RegistryClient,
    runner::{install_signal_handlers, LaunchRunner, RunnerOpts},
};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const LAUNCH_FILE_EXTENSIONS: &[&str] = &[".launch", ".xml", ".test"];

#[derive(Parser, Debug)]
#[command(name = "rlaunch")]
#[command(about = "Launch and supervise a tree of ROS nodes", long_about = None)]
#[command(version)]
struct Cli {
    /// Print list of files loaded by launch file, including the
    /// launch file itself
    #[arg(long)]
    files: bool,

    /// Print command-line arguments for a node
    #[arg(long, value_name = "NODE_NAME")]
    args: Option<String>,

    /// Print list of node names in launch file
    #[arg(long)]
    nodes: bool,

    /// Find the launch file that a node is defined in
    #[arg(long, value_name = "NODE_NAME")]
    find_node: Option<String>,

    /// Run as child service NAME. Required with -u
    #[arg(short = 'c', long, value_name = "NAME")]
    child: Option<String>,

    /// Do not launch remote nodes
    #[arg(long)]
    local: bool,

    /// Force output of all local nodes to screen
    #[arg(long)]
    screen: bool,

    /// URI of the parent server. Required with -c
    #[arg(short = 'u', long = "server_uri", value_name = "URI")]
    server_uri: Option<String>,

    /// run_id of the session. Required with -c
    #[arg(long = "run_id", value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Wait for the master to start before launching
    #[arg(long)]
    wait: bool,

    /// Master port. Only valid if the master is launched
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Launch core services only
    #[arg(long)]
    core: bool,

    /// Write the launcher pid to a file
    #[arg(long, value_name = "PATH")]
    pid: Option<PathBuf>,

    /// Verbose printing
    #[arg(short = 'v')]
    verbose: bool,

    /// Dump parameters of all launch files to stdout
    #[arg(long)]
    dump_params: bool,

    /// Skip the log-folder size check
    #[arg(long)]
    skip_log_check: bool,

    /// Display command-line arguments for this launch file
    #[arg(long)]
    ros_args: bool,

    /// Disable setting of the terminal title
    #[arg(long)]
    disable_title: bool,

    /// Override the number of master worker threads
    #[arg(short = 'w', long, value_name = "N")]
    numworkers: Option<u32>,

    /// Override the socket connection timeout (seconds)
    #[arg(short = 't', long, value_name = "SEC")]
    timeout: Option<f64>,

    /// Launch files and name:=value argument bindings
    #[arg(value_name = "ARGS")]
    positional: Vec<String>,
}

/// The positional arguments split into their three kinds.
struct Positionals {
    launch_files: Vec<String>,
    read_stdin: bool,
    bindings: HashMap<String, String>,
    special_hostname: Option<String>,
    special_ip: Option<String>,
}

fn split_positionals(positional: &[String]) -> Result<Positionals, String> {
    let mut launch_files = Vec::new();
    let mut read_stdin = false;
    let mut bindings = HashMap::new();
    let mut special_hostname = None;
    let mut special_ip = None;

    for arg in positional {
        if let Some((name, value)) = arg.split_once(":=") {
            // Names with the double-underscore prefix configure the
            // launcher itself rather than worker nodes.
            if let Some(special) = name.strip_prefix("__") {
                match special {
                    "hostname" => special_hostname = Some(value.to_string()),
                    "ip" => special_ip = Some(value.to_string()),
                    other => return Err(format!("unknown special argument: __{}", other)),
                }
            } else {
                bindings.insert(name.to_string(), value.to_string());
            }
        } else if arg == "-" {
            read_stdin = true;
        } else {
            launch_files.push(arg.clone());
        }
    }

    Ok(Positionals {
        launch_files,
        read_stdin,
        bindings,
        special_hostname,
        special_ip,
    })
}

fn validate(cli: &Cli, positionals: &Positionals) -> Result<(), String> {
    let info_modes = [
        cli.nodes,
        cli.find_node.is_some(),
        cli.args.is_some(),
        cli.ros_args,
    ];
    if info_modes.iter().filter(|&&m| m).count() > 1 {
        return Err(
            "only one of --nodes, --find-node, --args, --ros-args may be given".to_string(),
        );
    }

    if cli.wait && cli.core {
        return Err("--wait and --core are mutually exclusive".to_string());
    }

    if cli.child.is_some() {
        if cli.server_uri.is_none() || cli.run_id.is_none() {
            return Err("--child requires --server_uri and --run_id".to_string());
        }
        if cli.port.is_some() {
            return Err("--child and --port are mutually exclusive".to_string());
        }
        if !positionals.launch_files.is_empty() || positionals.read_stdin {
            return Err("launch files cannot be given with --child".to_string());
        }
        // Child mode has no way to receive the parent's configuration
        // yet; refuse up front so a remote invocation dies loudly
        // instead of holding an idle session open.
        return Err("the --child option is not yet supported".to_string());
    }

    if cli.core {
        if !positionals.launch_files.is_empty() || positionals.read_stdin {
            return Err("launch files cannot be given with --core".to_string());
        }
        if cli.run_id.is_some() {
            return Err("--run_id cannot be given with --core".to_string());
        }
    }

    let needs_files = cli.files
        || cli.nodes
        || cli.dump_params
        || cli.find_node.is_some()
        || cli.ros_args
        || cli.args.is_some();
    if needs_files && positionals.launch_files.is_empty() && !positionals.read_stdin {
        return Err("at least one launch file is required".to_string());
    }

    if !cli.core && positionals.launch_files.is_empty() && !positionals.read_stdin {
        return Err("you must specify at least one launch file".to_string());
    }

    for filename in &positionals.launch_files {
        let valid = LAUNCH_FILE_EXTENSIONS
            .iter()
            .any(|ext| filename.ends_with(ext));
        if !valid {
            return Err(format!("[{}] is not a launch file name", filename));
        }
    }

    Ok(())
}

fn has_info_request(cli: &Cli) -> bool {
    cli.files
        || cli.nodes
        || cli.dump_params
        || cli.find_node.is_some()
        || cli.ros_args
        || cli.args.is_some()
}

/// Use the configured run id, wait for a master to publish one, or
/// generate a fresh one.
fn resolve_run_id(cli: &Cli, positionals: &Positionals) -> String {
    if let Some(run_id) = &cli.run_id {
        return run_id.clone();
    }

    if cli.wait {
        let uri = ros::master_uri(
            positionals.special_hostname.as_deref(),
            positionals.special_ip.as_deref(),
            cli.port,
        );
        let client = RegistryClient::new(uri);
        loop {
            if let Ok(Some(value)) = client.get_param(ros::RUN_ID_PARAM) {
                if let Some(run_id) = value.as_str() {
                    return run_id.to_string();
                }
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    uuid::Uuid::new_v4().to_string()
}

fn parse_launch_files(
    cli: &Cli,
    positionals: &Positionals,
) -> Result<Vec<LaunchFile>, LaunchError> {
    let mut launch_files = Vec::new();
    let show_output = !has_info_request(cli);

    if positionals.read_stdin {
        if show_output {
            println!("Passed '-' as file argument, attempting to read launch XML from stdin");
        }
        let mut data = String::new();
        std::io::stdin().read_to_string(&mut data)?;
        if show_output {
            println!("... {} bytes read successfully.", data.len());
        }
        launch_files.push(rlaunch::parse_launch_string(
            &data,
            positionals.bindings.clone(),
        )?);
    }

    for filename in &positionals.launch_files {
        let path = ros::expand_user(filename);
        let launch = rlaunch::parse_launch_file(&path, positionals.bindings.clone())
            .map_err(|e| {
                eprintln!("[{}]: {}", path.display(), e);
                e
            })?;

        if let Some(notice) = launch.deprecated() {
            log::warn!("[{}] DEPRECATED: {}", path.display(), notice);
        }

        launch_files.push(launch);
    }

    Ok(launch_files)
}

fn print_ros_args(launch_files: &[LaunchFile]) {
    fn collect<'a>(launch: &'a LaunchFile, out: &mut Vec<&'a rlaunch::tags::ArgTag>) {
        out.extend(launch.args());
        for group in launch.groups() {
            collect(group.launch(), out);
        }
    }

    let mut args = Vec::new();
    for launch in launch_files {
        collect(launch, &mut args);
    }

    let required: Vec<_> = args.iter().filter(|a| a.is_required()).collect();
    let optional: Vec<_> = args.iter().filter(|a| a.is_optional()).collect();

    if !required.is_empty() {
        println!("Required Arguments:");
        for arg in &required {
            println!("  {}: {}", arg.name(), arg.doc().unwrap_or("undocumented"));
        }
    }
    if !optional.is_empty() {
        println!("Optional Arguments:");
        for arg in &optional {
            println!(
                "  {} (default \"{}\"): {}",
                arg.name(),
                arg.value().unwrap_or(""),
                arg.doc().unwrap_or("undocumented")
            );
        }
    }
    if required.is_empty() && optional.is_empty() {
        println!("No arguments.");
    }
}

fn print_nodes(launch: &LaunchFile) {
    for node in launch.nodes() {
        println!("{}", node.resolved_name());
    }
    for include in launch.includes() {
        print_nodes(include.launch());
    }
    for group in launch.groups() {
        print_nodes(group.launch());
    }
}

/// Idempotent end-of-process cleanup.
struct Cleanup {
    pid_file: Option<PathBuf>,
}

impl Cleanup {
    fn run(&mut self) {
        if let Some(path) = self.pid_file.take() {
            logs::delete_pid_file(&path);
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        self.run();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let positionals = match split_positionals(&cli.positional) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("rlaunch: error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = validate(&cli, &positionals) {
        eprintln!("rlaunch: error: {}", e);
        return ExitCode::FAILURE;
    }

    let run_id = resolve_run_id(&cli, &positionals);

    let mut cleanup = Cleanup { pid_file: None };

    if !has_info_request(&cli) {
        println!(
            "... logging to {}",
            logs::run_log_dir(&run_id).display()
        );
        if !cli.skip_log_check {
            logs::check_log_disk_usage();
        }
    }

    // PID file: the explicit --pid path, or the conventional
    // roscore-<port>.pid under ROS_HOME in core mode.
    let pid_path = cli.pid.clone().or_else(|| {
        if cli.core {
            let port = cli.port.unwrap_or(ros::DEFAULT_MASTER_PORT);
            Some(ros::ros_home().join(format!("roscore-{}.pid", port)))
        } else {
            None
        }
    });
    if let Some(path) = pid_path {
        if let Err(e) = logs::write_pid_file(&path) {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
        cleanup.pid_file = Some(path);
    }

    let launch_files = match parse_launch_files(&cli, &positionals) {
        Ok(files) => files,
        Err(_) => {
            cleanup.run();
            return ExitCode::FAILURE;
        }
    };

    // Information-only modes print and exit without starting anything.
    if cli.ros_args {
        print_ros_args(&launch_files);
        return ExitCode::SUCCESS;
    }
    if cli.nodes {
        for launch in &launch_files {
            print_nodes(launch);
        }
        return ExitCode::SUCCESS;
    }
    if cli.files {
        let mut files = Vec::new();
        for launch in &launch_files {
            launch.collect_files(&mut files);
        }
        for file in files {
            println!("{}", file.display());
        }
        return ExitCode::SUCCESS;
    }
    if cli.dump_params {
        match rlaunch::plan::LaunchPlan::assemble(&launch_files) {
            Ok(plan) => {
                println!("{}", plan.dump_params_string());
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                eprintln!("ERROR: dump params failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    if let Some(node_name) = &cli.find_node {
        let node_name = globalized(node_name);
        for launch in &launch_files {
            if let Some(node) = launch.find_node(&node_name) {
                println!("{}", node.file().display());
                return ExitCode::SUCCESS;
            }
        }
        eprintln!("ERROR: cannot find node named [{}]. Run", node_name);
        eprintln!("    rlaunch --nodes <files>");
        eprintln!("to see the list of node names");
        return ExitCode::FAILURE;
    }
    if let Some(node_name) = &cli.args {
        let node_name = globalized(node_name);
        for launch in &launch_files {
            if let Some(node) = launch.find_node(&node_name) {
                return match build_node_argv(node, node.name(), None, true) {
                    Ok(argv) => {
                        println!("{}", argv.join(" "));
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        eprintln!("{}", e);
                        ExitCode::FAILURE
                    }
                };
            }
        }
        eprintln!("ERROR: cannot find node named [{}]", node_name);
        return ExitCode::FAILURE;
    }

    // Wait mode: block until a master is reachable.
    if cli.wait {
        let uri = ros::master_uri(
            positionals.special_hostname.as_deref(),
            positionals.special_ip.as_deref(),
            cli.port,
        );
        let client = RegistryClient::new(uri);
        if !master::is_master_running(&client) {
            println!("master is not yet running, will wait for it to start");
            while !master::is_master_running(&client) {
                std::thread::sleep(Duration::from_millis(100));
            }
        }
        println!("master has started, initiating launch");
    }

    install_signal_handlers();

    let opts = RunnerOpts {
        screen: cli.screen,
        local_only: cli.local,
        port: cli.port,
        num_workers: cli.numworkers,
        disable_title: cli.disable_title,
        override_hostname: positionals.special_hostname.clone(),
        override_ip: positionals.special_ip.clone(),
    };

    let mut launch_runner = match LaunchRunner::new(run_id, opts, &launch_files) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{}", e);
            cleanup.run();
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = launch_runner.launch() {
        eprintln!("ERROR: launch failed: {}", e);
        cleanup.run();
        return ExitCode::FAILURE;
    }

    launch_runner.spin();

    cleanup.run();
    ExitCode::SUCCESS
}

fn globalized(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}", name)
    }
}
