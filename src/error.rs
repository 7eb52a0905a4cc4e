//! Error types for rlaunch

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("XML parsing error: {0}")]
    XmlError(#[from] roxmltree::Error),

    #[error("invalid roslaunch XML syntax: no root <launch> tag")]
    MissingLaunchRoot,

    #[error("failed to read launch file: [{0}]")]
    LaunchFileUnreadable(String),

    #[error("<{element}> tag is missing required attribute: '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("invalid <{element}> tag: cannot set both 'if' and 'unless' on the same tag")]
    IfUnlessConflict { element: String },

    #[error("invalid <{element}> tag: bool value for {attribute} must be non-empty")]
    EmptyBoolAttribute { element: String, attribute: String },

    #[error("invalid <{element}> tag: invalid bool value for {attribute}: {value}")]
    InvalidBoolAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("invalid <{element}> tag: invalid {expected_type} value for {attribute}: '{value}'")]
    TypeCoercion {
        element: String,
        attribute: String,
        value: String,
        expected_type: &'static str,
    },

    #[error("invalid <{element}> tag: {reason}")]
    InvalidTag { element: String, reason: String },

    #[error("invalid <include> tag: No such file or directory: {0}")]
    IncludeNotFound(String),

    #[error(
        "there is a cycle in the launch graph.\nThe file [{parent}] includes one of its ancestors [{ancestor}]"
    )]
    IncludeCycle { parent: String, ancestor: String },

    #[error("unused args [{args}] for include of [{file}]")]
    UnusedIncludeArgs { args: String, file: String },

    #[error("invalid substitution: {0}")]
    InvalidSubstitution(String),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<SubstitutionError> for ParseError {
    fn from(err: SubstitutionError) -> Self {
        ParseError::InvalidSubstitution(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum SubstitutionError {
    #[error("arg '{0}' is not defined")]
    UndefinedArg(String),

    #[error("environment variable '{0}' is not set")]
    UndefinedEnvVar(String),

    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("invalid substitution: {0}")]
    InvalidSubstitution(String),
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("network error contacting [{uri}]: {reason}")]
    Connection { uri: String, reason: String },

    #[error("XML-RPC fault: {0}")]
    Fault(String),

    #[error("malformed XML-RPC response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    ErrorStatus(String),
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Rpc(#[from] RpcError),

    #[error("could not contact master [{0}]")]
    MasterTimeout(String),

    #[error("run_id on parameter server does not match declared run_id: {server} vs {declared}")]
    RunIdMismatch { server: String, declared: String },

    #[error("launch file contains multiple nodes named [{name}].\nPlease check all <node> 'name' attributes to make sure they are unique.\nAlso check that $(anon id) use different ids.\nThe nodes were found in [{file1}] and [{file2}]")]
    DuplicateNodeName {
        name: String,
        file1: String,
        file2: String,
    },

    #[error("machine [{machine}] for node [{node}] is not defined")]
    UnknownMachine { machine: String, node: String },

    #[error("failed to start node [{name}]: {reason}")]
    SpawnFailure { name: String, reason: String },

    #[error("remote processes do not support respawning at this time")]
    RemoteRestartUnsupported,

    #[error("{host} is not in your SSH known_hosts file\nPlease manually:\n   ssh {ssh_args}\n\nthen try launching again.\n\nIf you wish to allow connections to unknown hosts automatically,\nset the environment variable ROSLAUNCH_SSH_UNKNOWN=1")]
    UnknownSshHost { host: String, ssh_args: String },

    #[error("remote[{name}]: {reason}")]
    RemoteConnection { name: String, reason: String },

    #[error("failed to write pid file {path}: {reason}")]
    PidFile { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;
