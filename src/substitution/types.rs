//! Substitution types

use crate::error::{Result, SubstitutionError};
use crate::ros;
use crate::substitution::Scope;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Memo of anonymized ids: the first `$(anon id)` for a given id wins
/// and every later use returns the same string.
static ANON_IDS: Lazy<Mutex<HashMap<String, String>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// One segment of a substitution string
#[derive(Debug, Clone, PartialEq)]
pub enum Substitution {
    /// Plain text (no substitution)
    Text(String),
    /// $(arg name) - scoped launch argument
    Arg(String),
    /// $(env VAR) - required environment variable
    Env(String),
    /// $(optenv VAR [default words...]) - optional environment variable
    OptEnv { name: String, default: Vec<String> },
    /// $(find pkg) - package directory lookup
    Find(String),
    /// $(anon id) - per-process memoized anonymous name
    Anon(String),
}

impl Substitution {
    /// Resolve this segment to its string value.
    pub fn resolve(&self, scope: &Scope) -> std::result::Result<String, SubstitutionError> {
        match self {
            Substitution::Text(s) => Ok(s.clone()),
            Substitution::Arg(name) => scope
                .get_arg(name)
                .cloned()
                .ok_or_else(|| SubstitutionError::UndefinedArg(name.clone())),
            Substitution::Env(name) => scope
                .get_env(name)
                .cloned()
                .or_else(|| std::env::var(name).ok())
                .ok_or_else(|| SubstitutionError::UndefinedEnvVar(name.clone())),
            Substitution::OptEnv { name, default } => Ok(scope
                .get_env(name)
                .cloned()
                .or_else(|| std::env::var(name).ok())
                .unwrap_or_else(|| default.join(" "))),
            Substitution::Find(pkg) => ros::find_package(pkg)
                .ok_or_else(|| SubstitutionError::PackageNotFound(pkg.clone())),
            Substitution::Anon(id) => Ok(anonymous_id(id)),
        }
    }
}

/// Get or generate the anonymized name for an id. First write wins;
/// the memo is process-global.
fn anonymous_id(id: &str) -> String {
    let mut ids = ANON_IDS.lock();
    if let Some(existing) = ids.get(id) {
        return existing.clone();
    }

    let hostname = ros::local_hostname().unwrap_or_else(|| "localhost".to_string());
    let pid = std::process::id();
    let random: u32 = rand::random::<u32>() & i32::MAX as u32;

    // Hyphens, periods and colons from hostnames and addresses are
    // illegal in resolved names.
    let anon = format!("{}_{}_{}_{}", id, hostname, pid, random)
        .replace(['.', '-', ':'], "_");

    ids.insert(id.to_string(), anon.clone());
    anon
}

/// Resolve a list of substitution segments to a single string.
pub fn resolve_substitutions(subs: &[Substitution], scope: &Scope) -> Result<String> {
    let mut result = String::new();
    for sub in subs {
        result.push_str(&sub.resolve(scope)?);
    }
    Ok(result)
}
