//! Scoped symbol tables carried down the launch tree

use std::collections::HashMap;

/// The symbols visible at one point of the launch tree: arg bindings,
/// environment overrides, topic remappings, and the current namespace.
///
/// A child scope is produced with [`Scope::child`]; bindings added to
/// the child never escape to the parent.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    args: HashMap<String, String>,
    env: HashMap<String, String>,
    remaps: HashMap<String, String>,
    ns: String,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a root scope from caller-supplied arg bindings.
    pub fn with_args(args: HashMap<String, String>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    /// Copy this scope for a nested launch context.
    pub fn child(&self) -> Self {
        self.clone()
    }

    pub fn get_arg(&self, name: &str) -> Option<&String> {
        self.args.get(name)
    }

    pub fn has_arg(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    pub fn set_arg(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.args.insert(name.into(), value.into());
    }

    pub fn args(&self) -> &HashMap<String, String> {
        &self.args
    }

    pub fn get_env(&self, name: &str) -> Option<&String> {
        self.env.get(name)
    }

    pub fn set_env(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.env.insert(name.into(), value.into());
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn set_remap(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.remaps.insert(from.into(), to.into());
    }

    pub fn remaps(&self) -> &HashMap<String, String> {
        &self.remaps
    }

    /// The current namespace as a slash-separated path ("" is the root).
    pub fn namespace(&self) -> &str {
        &self.ns
    }

    pub fn set_namespace(&mut self, ns: impl Into<String>) {
        self.ns = ns.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_scope_isolated() {
        let mut parent = Scope::new();
        parent.set_arg("outer", "1");

        let mut child = parent.child();
        child.set_arg("inner", "2");

        assert_eq!(child.get_arg("outer"), Some(&"1".to_string()));
        assert_eq!(child.get_arg("inner"), Some(&"2".to_string()));
        assert!(parent.get_arg("inner").is_none());
    }

    #[test]
    fn test_child_inherits_env_and_remaps() {
        let mut parent = Scope::new();
        parent.set_env("VAR", "val");
        parent.set_remap("chatter", "/chat");

        let child = parent.child();
        assert_eq!(child.get_env("VAR"), Some(&"val".to_string()));
        assert_eq!(child.remaps().get("chatter"), Some(&"/chat".to_string()));
    }

    #[test]
    fn test_namespace_default_root() {
        let scope = Scope::new();
        assert_eq!(scope.namespace(), "");
    }
}
