//! Resolution of model-proposed tag names into the owner's tag IDs.

use std::collections::HashSet;

use uuid::Uuid;

use notegen_core::Tag;

/// Intersect `proposed` names case-insensitively with `owner_tags`.
///
/// Unknown names are dropped and duplicates collapse; the result keeps the
/// order in which names were proposed.
pub fn filter_tags(proposed: &[String], owner_tags: &[Tag]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    proposed
        .iter()
        .filter_map(|name| {
            let wanted = name.trim().to_lowercase();
            owner_tags
                .iter()
                .find(|tag| tag.name.trim().to_lowercase() == wanted)
        })
        .filter(|tag| seen.insert(tag.id))
        .map(|tag| tag.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> Tag {
        Tag {
            id: Uuid::new_v4(),
            owner_id: Uuid::nil(),
            name: name.to_string(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_case_insensitive_match() {
        let owner = vec![tag("Biology"), tag("Chemistry")];
        let ids = filter_tags(&names(&["biology", " CHEMISTRY "]), &owner);
        assert_eq!(ids, vec![owner[0].id, owner[1].id]);
    }

    #[test]
    fn test_unknown_names_dropped() {
        let owner = vec![tag("Biology")];
        let ids = filter_tags(&names(&["Physics", "Biology", "Art"]), &owner);
        assert_eq!(ids, vec![owner[0].id]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let owner = vec![tag("Biology")];
        let ids = filter_tags(&names(&["Biology", "BIOLOGY", "biology"]), &owner);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(filter_tags(&[], &[tag("Biology")]).is_empty());
        assert!(filter_tags(&names(&["Biology"]), &[]).is_empty());
    }
}
