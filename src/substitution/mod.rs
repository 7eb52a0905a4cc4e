//! Substitution argument handling
//!
//! Expands `$(arg ...)`, `$(env ...)`, `$(optenv ...)`, `$(find ...)`,
//! and `$(anon ...)` expressions inside attribute values. Resolution is
//! iterated until a fixed point because resolved text may itself
//! contain further substitutions.

mod context;
mod parser;
mod types;

pub use context::Scope;
pub use parser::parse_substitutions;
pub use types::{resolve_substitutions, Substitution};

use crate::error::{Result, SubstitutionError};

/// Ceiling on resolution passes; a value that keeps producing new
/// substitutions past this is self-referential.
const MAX_PASSES: usize = 64;

/// Resolve all substitutions in a string, iterating until the result
/// no longer changes.
pub fn resolve_str(input: &str, scope: &Scope) -> Result<String> {
    let mut current = input.to_string();

    for _ in 0..MAX_PASSES {
        let subs = parse_substitutions(&current)?;
        let resolved = resolve_substitutions(&subs, scope)?;
        if resolved == current {
            return Ok(resolved);
        }
        current = resolved;
    }

    Err(SubstitutionError::InvalidSubstitution(format!(
        "substitution does not converge: {}",
        input
    ))
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_text() {
        let scope = Scope::new();
        assert_eq!(resolve_str("hello world", &scope).unwrap(), "hello world");
    }

    #[test]
    fn test_resolve_fixed_point() {
        let mut scope = Scope::new();
        scope.set_arg("a", "$(arg b)");
        scope.set_arg("b", "42");
        assert_eq!(resolve_str("$(arg a)", &scope).unwrap(), "42");
    }

    #[test]
    fn test_resolve_left_to_right() {
        let mut scope = Scope::new();
        scope.set_arg("x", "1");
        scope.set_arg("y", "2");
        assert_eq!(resolve_str("$(arg x)-$(arg y)", &scope).unwrap(), "1-2");
    }

    #[test]
    fn test_resolve_divergent_fails() {
        let mut scope = Scope::new();
        scope.set_arg("loop", "$(arg loop)x");
        assert!(resolve_str("$(arg loop)", &scope).is_err());
    }
}
