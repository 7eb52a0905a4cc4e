//! Clear-namespace unification

/// Reduce a set of namespaces to the shortest ancestors: if `/foo/`
/// and `/foo/bar/` are both present only `/foo/` survives, since
/// clearing it already clears the subtree.
pub fn unify_clear_params(clear_params: &[String]) -> Vec<String> {
    let mut sorted: Vec<&String> = clear_params.iter().collect();
    // Longest first, so for any entry every candidate ancestor sits
    // after it.
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut unified: Vec<String> = Vec::new();
    for (i, param) in sorted.iter().enumerate() {
        let mut shortest = param.as_str();
        for candidate in &sorted[i..] {
            if param.starts_with(candidate.as_str()) && candidate.len() < shortest.len() {
                shortest = candidate;
            }
        }
        if !unified.iter().any(|existing| existing == shortest) {
            unified.push(shortest.to_string());
        }
    }

    unified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespaces(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty() {
        assert!(unify_clear_params(&[]).is_empty());
    }

    #[test]
    fn test_single() {
        assert_eq!(
            unify_clear_params(&namespaces(&["/foo/"])),
            namespaces(&["/foo/"])
        );
    }

    #[test]
    fn test_prefix_collapse() {
        let unified = unify_clear_params(&namespaces(&["/foo/bar/", "/foo/", "/foo/bar/bang/"]));
        assert_eq!(unified, namespaces(&["/foo/"]));
    }

    #[test]
    fn test_disjoint_namespaces_kept() {
        let mut unified = unify_clear_params(&namespaces(&["/a/", "/b/"]));
        unified.sort();
        assert_eq!(unified, namespaces(&["/a/", "/b/"]));
    }

    #[test]
    fn test_duplicates_collapse() {
        assert_eq!(
            unify_clear_params(&namespaces(&["/x/", "/x/"])),
            namespaces(&["/x/"])
        );
    }

    #[test]
    fn test_non_prefix_similar_names_kept() {
        // /foo2/ is not inside /foo/ even though the strings share a
        // prefix up to the slash.
        let mut unified = unify_clear_params(&namespaces(&["/foo/", "/foo2/"]));
        unified.sort();
        assert_eq!(unified, namespaces(&["/foo/", "/foo2/"]));
    }

    #[test]
    fn test_unified_set_properties() {
        let input = namespaces(&["/a/b/c/", "/a/b/", "/a/", "/z/", "/z/y/"]);
        let unified = unify_clear_params(&input);

        // Every input is covered by some surviving ancestor.
        for ns in &input {
            assert!(unified.iter().any(|u| ns.starts_with(u.as_str())));
        }
        // No survivor is a prefix of another.
        for a in &unified {
            for b in &unified {
                if a != b {
                    assert!(!a.starts_with(b.as_str()));
                }
            }
        }
    }
}
