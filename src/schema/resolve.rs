//! Ordered name-resolution strategies.
//!
//! Lookups try each [`Strategy`] in turn and stop at the first hit, so an
//! exact match always beats a case-insensitive one.

use std::collections::BTreeMap;

use crate::schema::edm::strip_qualifier;

/// One way of matching a requested name against a declared one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
    /// Byte-for-byte equality.
    Exact,
    /// ASCII case-insensitive equality.
    CaseInsensitive,
}

impl Strategy {
    fn matches(self, declared: &str, wanted: &str) -> bool {
        match self {
            Strategy::Exact => declared == wanted,
            Strategy::CaseInsensitive => declared.eq_ignore_ascii_case(wanted),
        }
    }
}

/// Strategies in the order they are tried.
pub const STRATEGIES: [Strategy; 2] = [Strategy::Exact, Strategy::CaseInsensitive];

/// Finds `wanted` among `names`, returning the declared spelling.
pub fn find_name<'a, I>(names: I, wanted: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: Clone,
{
    let names = names.into_iter();
    STRATEGIES
        .iter()
        .find_map(|strategy| names.clone().find(|name| strategy.matches(name, wanted)))
}

/// Finds `wanted` among the keys of `map`.
pub fn find_entry<'a, V>(map: &'a BTreeMap<String, V>, wanted: &str) -> Option<(&'a str, &'a V)> {
    if let Some((key, value)) = map.get_key_value(wanted) {
        return Some((key.as_str(), value));
    }
    let key = find_name(map.keys().map(String::as_str), wanted)?;
    map.get_key_value(key).map(|(k, v)| (k.as_str(), v))
}

/// Finds a schema-level name, also accepting it qualified by namespace or alias.
pub fn find_qualified<'a, V>(
    map: &'a BTreeMap<String, V>,
    wanted: &str,
    namespace: &str,
    alias: Option<&str>,
) -> Option<(&'a str, &'a V)> {
    find_entry(map, wanted).or_else(|| {
        let stripped = strip_qualifier(wanted, namespace, alias);
        if stripped.len() == wanted.len() {
            return None;
        }
        find_entry(map, stripped)
    })
}
