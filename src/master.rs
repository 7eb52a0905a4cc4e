//! Master bootstrap
//!
//! Detects or starts the registry, reconciles the run identifier, and
//! pushes parameters in the order delete, dump, clear, rosparam-set,
//! param-set.

use crate::error::{LaunchError, RpcError};
use crate::plan::LaunchPlan;
use crate::ros;
use crate::rpc::{RegistryClient, RpcValue};
use crate::tags::RosParamCommand;
use std::time::{Duration, Instant};

pub const DEFAULT_NUM_WORKERS: u32 = 3;
const MASTER_START_TIMEOUT: Duration = Duration::from_secs(10);
const MASTER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// True when a master answers `getSystemState` at the client's URI.
pub fn is_master_running(client: &RegistryClient) -> bool {
    client.get_system_state().is_ok()
}

/// Fork the external master binary.
pub fn start_master(port: u16, num_workers: u32) -> Result<std::process::Child, LaunchError> {
    println!("auto-starting new master");
    std::process::Command::new("rosmaster")
        .arg("--core")
        .arg("-p")
        .arg(port.to_string())
        .arg("-w")
        .arg(num_workers.to_string())
        .spawn()
        .map_err(|e| LaunchError::SpawnFailure {
            name: "rosmaster".to_string(),
            reason: e.to_string(),
        })
}

/// Poll the master until it answers or the startup deadline passes.
pub fn wait_for_master(client: &RegistryClient) -> Result<(), LaunchError> {
    let deadline = Instant::now() + MASTER_START_TIMEOUT;
    while Instant::now() < deadline {
        if is_master_running(client) {
            return Ok(());
        }
        std::thread::sleep(MASTER_POLL_INTERVAL);
    }
    Err(LaunchError::MasterTimeout(client.uri().to_string()))
}

/// Ensure the registry's `/run_id` agrees with ours: set it when
/// absent, accept it when equal, abort when different.
pub fn reconcile_run_id(client: &RegistryClient, run_id: &str) -> Result<(), LaunchError> {
    let known = client.has_param(ros::RUN_ID_PARAM)?;

    if !known {
        println!("setting {} to {}", ros::RUN_ID_PARAM, run_id);
        client.set_param(ros::RUN_ID_PARAM, &RpcValue::Str(run_id.to_string()))?;
        return Ok(());
    }

    match client.get_param(ros::RUN_ID_PARAM)? {
        Some(RpcValue::Str(server_id)) => {
            if server_id == run_id {
                Ok(())
            } else {
                Err(LaunchError::RunIdMismatch {
                    server: server_id,
                    declared: run_id.to_string(),
                })
            }
        }
        Some(other) => Err(LaunchError::Rpc(RpcError::MalformedResponse(format!(
            "retrieved invalid run_id from parameter server: {:?}",
            other
        )))),
        None => Err(LaunchError::Rpc(RpcError::ErrorStatus(format!(
            "unable to retrieve {} from the parameter server",
            ros::RUN_ID_PARAM
        )))),
    }
}

/// The registry operations the parameter push needs.
pub trait ParamOps {
    fn delete_param(&self, key: &str) -> Result<(), RpcError>;
    fn set_param(&self, key: &str, value: &RpcValue) -> Result<(), RpcError>;
    fn set_yaml_param(&self, name: &str, yaml: &serde_yaml::Value) -> Result<bool, RpcError>;
}

impl ParamOps for RegistryClient {
    fn delete_param(&self, key: &str) -> Result<(), RpcError> {
        RegistryClient::delete_param(self, key)
    }

    fn set_param(&self, key: &str, value: &RpcValue) -> Result<(), RpcError> {
        RegistryClient::set_param(self, key, value)
    }

    fn set_yaml_param(&self, name: &str, yaml: &serde_yaml::Value) -> Result<bool, RpcError> {
        RegistryClient::set_yaml_param(self, name, yaml)
    }
}

/// Apply every parameter directive of the plan against the registry.
///
/// Ordering is load-bearing: deletes first, then the dump stubs, then
/// the unified clear set, then rosparam bodies, then plain params, so
/// each directive sees a clean slate and later sets win on overlaps.
pub fn push_parameters(client: &impl ParamOps, plan: &LaunchPlan) -> Result<(), LaunchError> {
    let (node_params, node_rosparams) = plan.node_scoped_params();
    let rosparams: Vec<_> = plan
        .rosparams()
        .iter()
        .chain(node_rosparams.into_iter())
        .collect();

    for rosparam in rosparams
        .iter()
        .filter(|r| r.command() == RosParamCommand::Delete)
    {
        if let Err(e) = checked(client.delete_param(&rosparam.resolved_name()))? {
            // Deleting a parameter that is not set is not a failure.
            log::debug!("delete of {} reported: {}", rosparam.resolved_name(), e);
        }
    }

    for rosparam in rosparams
        .iter()
        .filter(|r| r.command() == RosParamCommand::Dump)
    {
        log::warn!(
            "rosparam dump of {} is not implemented; skipping",
            rosparam.resolved_name()
        );
    }

    for namespace in plan.unified_clear_params() {
        if let Err(e) = checked(client.delete_param(namespace))? {
            log::debug!("clear of {} reported: {}", namespace, e);
        }
    }

    for rosparam in rosparams
        .iter()
        .filter(|r| r.command() == RosParamCommand::Load)
    {
        if let Some(yaml) = rosparam.yaml() {
            if !yaml.is_null() {
                client.set_yaml_param(&rosparam.resolved_name(), yaml)?;
            }
        }
    }

    for param in plan.params().iter().chain(node_params.into_iter()) {
        client.set_param(&param.resolved_name(), &RpcValue::from(param.value()))?;
    }

    Ok(())
}

/// Split transport failures (fatal) from error statuses (reported to
/// the caller for a per-key decision).
fn checked(result: Result<(), RpcError>) -> Result<Result<(), RpcError>, LaunchError> {
    match result {
        Ok(()) => Ok(Ok(())),
        Err(RpcError::Connection { uri, reason }) => {
            Err(LaunchError::Rpc(RpcError::Connection { uri, reason }))
        }
        Err(other) => Ok(Err(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::LaunchFile;
    use crate::substitution::Scope;
    use std::cell::RefCell;

    #[test]
    fn test_master_not_running_on_dead_port() {
        let client = RegistryClient::new("http://127.0.0.1:9/");
        assert!(!is_master_running(&client));
    }

    /// Records the kind of every registry write in call order.
    struct RecordingSink {
        ops: RefCell<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                ops: RefCell::new(Vec::new()),
            }
        }
    }

    impl ParamOps for RecordingSink {
        fn delete_param(&self, key: &str) -> Result<(), RpcError> {
            self.ops
                .borrow_mut()
                .push(("delete".to_string(), key.to_string()));
            Ok(())
        }

        fn set_param(&self, key: &str, _value: &RpcValue) -> Result<(), RpcError> {
            self.ops
                .borrow_mut()
                .push(("set".to_string(), key.to_string()));
            Ok(())
        }

        fn set_yaml_param(
            &self,
            name: &str,
            _yaml: &serde_yaml::Value,
        ) -> Result<bool, RpcError> {
            self.ops
                .borrow_mut()
                .push(("set".to_string(), name.to_string()));
            Ok(true)
        }
    }

    #[test]
    fn test_parameter_push_ordering() {
        let launch = LaunchFile::from_str_data(
            r#"<launch>
                <rosparam command="delete" param="/stale"/>
                <group ns="/wipe" clear_params="true">
                    <param name="inner" value="1"/>
                </group>
                <rosparam param="/loaded">5</rosparam>
                <param name="plain" value="2"/>
            </launch>"#,
            Scope::new(),
        )
        .unwrap();
        let plan = LaunchPlan::assemble(std::slice::from_ref(&launch)).unwrap();

        let sink = RecordingSink::new();
        push_parameters(&sink, &plan).unwrap();

        let ops = sink.ops.borrow();
        let last_delete = ops.iter().rposition(|(kind, _)| kind == "delete").unwrap();
        let first_set = ops.iter().position(|(kind, _)| kind == "set").unwrap();

        // Every delete (explicit and clear-set) precedes every set.
        assert!(last_delete < first_set);
        assert_eq!(ops[0], ("delete".to_string(), "/stale".to_string()));
        assert!(ops.contains(&("delete".to_string(), "/wipe/".to_string())));
        assert!(ops.contains(&("set".to_string(), "/loaded".to_string())));
        assert!(ops.contains(&("set".to_string(), "/plain".to_string())));
    }

    #[test]
    fn test_rosparam_sets_precede_param_sets() {
        let launch = LaunchFile::from_str_data(
            r#"<launch>
                <param name="plain" value="2"/>
                <rosparam param="/loaded">5</rosparam>
            </launch>"#,
            Scope::new(),
        )
        .unwrap();
        let plan = LaunchPlan::assemble(std::slice::from_ref(&launch)).unwrap();

        let sink = RecordingSink::new();
        push_parameters(&sink, &plan).unwrap();

        let ops = sink.ops.borrow();
        let loaded = ops
            .iter()
            .position(|(_, key)| key == "/loaded")
            .unwrap();
        let plain = ops.iter().position(|(_, key)| key == "/plain").unwrap();
        assert!(loaded < plain);
    }
}

