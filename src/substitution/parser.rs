//! Substitution parser

use crate::error::{Result, SubstitutionError};
use crate::substitution::types::Substitution;
use once_cell::sync::Lazy;
use regex::Regex;

static SUBST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\(([a-z]+)(?:\s+([^)]*))?\)").unwrap());

/// Parse a substitution string like "$(arg x)" or "text $(env Y) more"
/// into an ordered list of segments.
pub fn parse_substitutions(input: &str) -> Result<Vec<Substitution>> {
    let mut result = Vec::new();
    let mut last_end = 0;

    for cap in SUBST_RE.captures_iter(input) {
        let match_obj = cap.get(0).unwrap();
        let start = match_obj.start();
        let end = match_obj.end();

        if start > last_end {
            result.push(Substitution::Text(input[last_end..start].to_string()));
        }

        let command = cap.get(1).unwrap().as_str();
        let args: Vec<String> = cap
            .get(2)
            .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        result.push(parse_single_substitution(command, args)?);
        last_end = end;
    }

    if last_end < input.len() {
        result.push(Substitution::Text(input[last_end..].to_string()));
    }

    if result.is_empty() {
        result.push(Substitution::Text(input.to_string()));
    }

    Ok(result)
}

fn parse_single_substitution(command: &str, args: Vec<String>) -> Result<Substitution> {
    let require_one = |args: Vec<String>, what: &str| -> Result<String> {
        match args.len() {
            0 => Err(SubstitutionError::InvalidSubstitution(format!(
                "$({cmd} var) must specify {what} [{cmd}]",
                cmd = command,
                what = what
            ))
            .into()),
            1 => Ok(args.into_iter().next().unwrap()),
            _ => Err(SubstitutionError::InvalidSubstitution(format!(
                "$({cmd} var) may only specify one {what} [{cmd} {rest}]",
                cmd = command,
                what = what,
                rest = args.join(" ")
            ))
            .into()),
        }
    };

    match command {
        "arg" => Ok(Substitution::Arg(require_one(args, "an arg")?)),
        "env" => Ok(Substitution::Env(require_one(
            args,
            "an environment variable",
        )?)),
        "optenv" => {
            if args.is_empty() {
                return Err(SubstitutionError::InvalidSubstitution(
                    "$(optenv var) must specify an environment variable [optenv]".to_string(),
                )
                .into());
            }
            let mut iter = args.into_iter();
            let name = iter.next().unwrap();
            let default: Vec<String> = iter.collect();
            Ok(Substitution::OptEnv { name, default })
        }
        "find" => Ok(Substitution::Find(require_one(args, "a package")?)),
        "anon" => Ok(Substitution::Anon(require_one(args, "a name")?)),
        other => Err(SubstitutionError::InvalidSubstitution(format!(
            "unknown substitution command: {}",
            other
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text() {
        let subs = parse_substitutions("hello world").unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0], Substitution::Text("hello world".to_string()));
    }

    #[test]
    fn test_parse_arg_substitution() {
        let subs = parse_substitutions("$(arg my_var)").unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0], Substitution::Arg("my_var".to_string()));
    }

    #[test]
    fn test_parse_env_substitution() {
        let subs = parse_substitutions("$(env HOME)").unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0], Substitution::Env("HOME".to_string()));
    }

    #[test]
    fn test_parse_optenv_with_default_words() {
        let subs = parse_substitutions("$(optenv MY_VAR one two)").unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(
            subs[0],
            Substitution::OptEnv {
                name: "MY_VAR".to_string(),
                default: vec!["one".to_string(), "two".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_optenv_no_default() {
        let subs = parse_substitutions("$(optenv MY_VAR)").unwrap();
        assert_eq!(
            subs[0],
            Substitution::OptEnv {
                name: "MY_VAR".to_string(),
                default: Vec::new(),
            }
        );
    }

    #[test]
    fn test_parse_mixed() {
        let subs = parse_substitutions("prefix $(arg x) middle $(env Y) suffix").unwrap();
        assert_eq!(subs.len(), 5);
        assert_eq!(subs[0], Substitution::Text("prefix ".to_string()));
        assert_eq!(subs[1], Substitution::Arg("x".to_string()));
        assert_eq!(subs[2], Substitution::Text(" middle ".to_string()));
        assert_eq!(subs[3], Substitution::Env("Y".to_string()));
        assert_eq!(subs[4], Substitution::Text(" suffix".to_string()));
    }

    #[test]
    fn test_parse_consecutive_substitutions() {
        let subs = parse_substitutions("$(arg a)$(arg b)").unwrap();
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn test_parse_find_in_path() {
        let subs = parse_substitutions("$(find my_pkg)/launch/foo.launch").unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0], Substitution::Find("my_pkg".to_string()));
        assert_eq!(
            subs[1],
            Substitution::Text("/launch/foo.launch".to_string())
        );
    }

    #[test]
    fn test_arg_requires_exactly_one() {
        assert!(parse_substitutions("$(arg)").is_err());
        assert!(parse_substitutions("$(arg a b)").is_err());
    }

    #[test]
    fn test_unknown_command_fails() {
        assert!(parse_substitutions("$(bogus x)").is_err());
    }
}
