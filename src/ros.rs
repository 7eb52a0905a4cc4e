//! ROS environment and naming utilities
//!
//! Package lookup, namespace joining, master URI construction, and the
//! environment variables the launcher reads.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

pub const ENV_MASTER_URI: &str = "ROS_MASTER_URI";
pub const ENV_PACKAGE_PATH: &str = "ROS_PACKAGE_PATH";
pub const ENV_LD_LIBRARY_PATH: &str = "LD_LIBRARY_PATH";
pub const ENV_ROS_HOME: &str = "ROS_HOME";
pub const ENV_ROS_ROOT: &str = "ROS_ROOT";
pub const ENV_ROS_LOG_DIR: &str = "ROS_LOG_DIR";
pub const ENV_ROS_NAMESPACE: &str = "ROS_NAMESPACE";
pub const ENV_ROS_HOSTNAME: &str = "ROS_HOSTNAME";
pub const ENV_ROS_IP: &str = "ROS_IP";
pub const ENV_ROS_IPV6: &str = "ROS_IPV6";
pub const ENV_SSH_UNKNOWN: &str = "ROSLAUNCH_SSH_UNKNOWN";

/// The registry key every process in a run shares.
pub const RUN_ID_PARAM: &str = "/run_id";

pub const DEFAULT_MASTER_PORT: u16 = 11311;

/// Expand a leading `~` to the user's home directory.
pub fn expand_user(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

/// Locate a package directory by walking every entry of
/// ROS_PACKAGE_PATH. The first directory named `pkg` that contains a
/// `package.xml` manifest wins. Directories below a directory that
/// itself carries a manifest are never descended into.
pub fn find_package(pkg: &str) -> Option<String> {
    let package_path = std::env::var(ENV_PACKAGE_PATH).ok()?;

    for folder in package_path.split(':').filter(|s| !s.is_empty()) {
        if let Some(found) = find_package_in(Path::new(folder), pkg) {
            return Some(found);
        }
    }

    None
}

fn find_package_in(dir: &Path, pkg: &str) -> Option<String> {
    if !dir.is_dir() {
        return None;
    }

    let has_manifest = dir.join("package.xml").is_file();

    if dir.file_name().map(|n| n == pkg).unwrap_or(false) && has_manifest {
        return Some(dir.to_string_lossy().into_owned());
    }

    // Packages cannot nest, so a manifest directory that is not the
    // one we want ends the search along this branch.
    if has_manifest {
        return None;
    }

    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_package_in(&path, pkg) {
                return Some(found);
            }
        }
    }

    None
}

/// Locate a node executable: for `.py` types search the package tree
/// under ROS_PACKAGE_PATH, otherwise check `<dir>/<pkg>/<type>` for
/// every LD_LIBRARY_PATH entry.
pub fn find_node_executable(pkg: &str, node_type: &str) -> Option<PathBuf> {
    if node_type.ends_with(".py") {
        let package_dir = find_package(pkg)?;
        return find_file_recursive(Path::new(&package_dir), node_type);
    }

    let lib_path = std::env::var(ENV_LD_LIBRARY_PATH).ok()?;
    for folder in lib_path.split(':').filter(|s| !s.is_empty()) {
        let candidate = Path::new(folder).join(pkg).join(node_type);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    None
}

fn find_file_recursive(dir: &Path, filename: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.file_name().map(|n| n == filename).unwrap_or(false) {
            return Some(path);
        }
        if path.is_dir() {
            if let Some(found) = find_file_recursive(&path, filename) {
                return Some(found);
            }
        }
    }
    None
}

/// Join a namespace attribute onto a parent namespace. A leading `/`
/// makes the child global; otherwise it extends the parent.
pub fn add_namespace(parent: &str, ns: &str) -> String {
    if ns.is_empty() {
        return parent.to_string();
    }
    if ns.starts_with('/') {
        return ns.trim_end_matches('/').to_string();
    }
    if parent.is_empty() {
        ns.trim_end_matches('/').to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), ns.trim_end_matches('/'))
    }
}

/// Join a namespace and a name into a fully resolved global name.
/// The result always starts with `/` and never contains `//`.
pub fn join_namespace(namespace: &str, name: &str) -> String {
    let mut resolved = String::new();
    if !namespace.is_empty() {
        if !namespace.starts_with('/') {
            resolved.push('/');
        }
        resolved.push_str(namespace);
    }
    if !resolved.ends_with('/') {
        resolved.push('/');
    }
    resolved.push_str(name.trim_start_matches('/'));
    resolved
}

/// Convert a namespace into global form with leading and trailing `/`.
pub fn make_global_namespace(namespace: &str) -> String {
    let mut ns = namespace.to_string();
    if !ns.starts_with('/') {
        ns.insert(0, '/');
    }
    if !ns.ends_with('/') {
        ns.push('/');
    }
    ns
}

/// True when ROS_IPV6=on.
pub fn use_ipv6() -> bool {
    std::env::var(ENV_ROS_IPV6).map(|v| v == "on").unwrap_or(false)
}

/// Hostname of this machine.
pub fn local_hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
}

/// Every address bound to an up interface on this host, filtered by
/// the ROS_IPV6 setting.
pub fn local_addresses() -> Vec<IpAddr> {
    let ipv6 = use_ipv6();
    let mut addresses = Vec::new();

    if let Ok(ifaddrs) = nix::ifaddrs::getifaddrs() {
        for ifaddr in ifaddrs {
            let Some(storage) = ifaddr.address else {
                continue;
            };
            if let Some(sin) = storage.as_sockaddr_in() {
                addresses.push(IpAddr::V4(sin.ip()));
            } else if ipv6 {
                if let Some(sin6) = storage.as_sockaddr_in6() {
                    addresses.push(IpAddr::V6(sin6.ip()));
                }
            }
        }
    }

    addresses
}

/// Name of the current OS user.
pub fn local_username() -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.name)
}

/// Hostname override: `__hostname`/`__ip` specials first, then
/// ROS_HOSTNAME, then ROS_IP.
pub fn configured_hostname(override_hostname: Option<&str>, override_ip: Option<&str>) -> Option<String> {
    if let Some(h) = override_hostname {
        return Some(h.to_string());
    }
    if let Some(ip) = override_ip {
        return Some(ip.to_string());
    }

    if let Ok(hostname) = std::env::var(ENV_ROS_HOSTNAME) {
        if hostname.is_empty() {
            log::warn!("invalid ROS_HOSTNAME (an empty string)");
        } else if hostname.contains("://") {
            log::warn!("invalid ROS_HOSTNAME (protocol should not be included)");
        } else if hostname.contains(':') {
            log::warn!("invalid ROS_HOSTNAME (port should not be included)");
        }
        return Some(hostname);
    }

    if let Ok(ip) = std::env::var(ENV_ROS_IP) {
        if ip.is_empty() {
            log::warn!("invalid ROS_IP (an empty string)");
        } else if ip.contains("://") {
            log::warn!("invalid ROS_IP (protocol should not be included)");
        }
        return Some(ip);
    }

    None
}

/// Build the master URI for the given port, choosing a hostname from
/// the overrides, this host's name, or its first non-loopback address.
pub fn create_master_uri(
    override_hostname: Option<&str>,
    override_ip: Option<&str>,
    port: u16,
) -> String {
    let hostname = configured_hostname(override_hostname, override_ip)
        .or_else(|| {
            local_hostname().filter(|h| h != "localhost" && !h.starts_with("127."))
        })
        .unwrap_or_else(|| {
            let addresses = local_addresses();
            addresses
                .iter()
                .find(|a| !a.is_loopback())
                .map(|a| a.to_string())
                .unwrap_or_else(|| {
                    if use_ipv6() {
                        "::1".to_string()
                    } else {
                        "localhost".to_string()
                    }
                })
        });

    format!("http://{}:{}", hostname, port)
}

/// The master URI from the environment, overridden by `--port`.
pub fn master_uri(
    override_hostname: Option<&str>,
    override_ip: Option<&str>,
    port: Option<u16>,
) -> String {
    if let Some(port) = port {
        return create_master_uri(override_hostname, override_ip, port);
    }
    std::env::var(ENV_MASTER_URI)
        .unwrap_or_else(|_| create_master_uri(override_hostname, override_ip, DEFAULT_MASTER_PORT))
}

/// ROS_HOME, defaulting to ~/.ros.
pub fn ros_home() -> PathBuf {
    match std::env::var(ENV_ROS_HOME) {
        Ok(home) if !home.is_empty() => PathBuf::from(home),
        _ => expand_user("~").join(".ros"),
    }
}

/// ROS_ROOT, if configured.
pub fn ros_root() -> Option<PathBuf> {
    match std::env::var(ENV_ROS_ROOT) {
        Ok(root) if !root.is_empty() => Some(PathBuf::from(root)),
        _ => None,
    }
}
