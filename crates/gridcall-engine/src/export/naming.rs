//! Export naming
//!
//! Names are composed as `namespace + prefix + base` with no inserted
//! separator — namespaces conventionally carry their own trailing
//! punctuation. Base names come from explicit export names when declared,
//! otherwise from the member identity: the class simple name for
//! constructors, `Class.method` for methods, `Class.FIELD` for fields.
//!
//! Within one registration batch, colliding names are disambiguated by
//! suffixing `_$2`, `_$3`, … in member-enumeration order; the first
//! occurrence keeps the unsuffixed name. Only one member of an unnamed
//! same-name family is therefore reachable under the short name; callers
//! wanting every overload must declare distinct export names.

use gridcall_sdk::ExportAttrs;
use rustc_hash::FxHashMap;

/// Compose the full display name for one member.
pub(crate) fn compose(attrs: &ExportAttrs, base: &str) -> String {
    let mut name = String::new();
    if let Some(ns) = &attrs.namespace {
        name.push_str(ns);
    }
    if let Some(prefix) = &attrs.prefix {
        name.push_str(prefix);
    }
    name.push_str(base);
    name
}

/// Allocates collision-free names within one registration batch.
#[derive(Debug, Default)]
pub(crate) struct NameAllocator {
    // Composed name -> occurrences seen so far.
    seen: FxHashMap<String, u32>,
}

impl NameAllocator {
    pub(crate) fn new() -> Self {
        NameAllocator::default()
    }

    /// Claim `name`, suffixing duplicates with `_$n` (n starting at 2).
    pub(crate) fn claim(&mut self, name: String) -> String {
        let count = self.seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            name
        } else {
            format!("{name}_${count}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_concatenates_without_separator() {
        let attrs = ExportAttrs {
            namespace: Some("Fin.".to_string()),
            prefix: Some("X".to_string()),
            ..ExportAttrs::default()
        };
        assert_eq!(compose(&attrs, "Bond"), "Fin.XBond");

        let bare = ExportAttrs::default();
        assert_eq!(compose(&bare, "Bond"), "Bond");
    }

    #[test]
    fn first_claim_keeps_bare_name() {
        let mut names = NameAllocator::new();
        assert_eq!(names.claim("Point".to_string()), "Point");
        assert_eq!(names.claim("Point".to_string()), "Point_$2");
        assert_eq!(names.claim("Point".to_string()), "Point_$3");
        assert_eq!(names.claim("Other".to_string()), "Other");
    }
}
