//! Cross-row reductions: duplicate detection over the full row set.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::mapping::{parse_integer, MappedRow};

/// Values of `column` that occur on more than one row, each listed once and
/// sorted (numerically when every value is a number).
pub fn duplicate_values(rows: &[MappedRow], column: &str) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        if let Some(value) = row.get(column) {
            *counts.entry(value).or_default() += 1;
        }
    }
    sorted_unique(
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(v, _)| v.to_string()),
    )
}

/// Groups of row numbers that share the same key. Rows for which `key`
/// returns `None` are ignored. Groups are ordered by their first row.
pub fn colliding_rows<K, F>(rows: &[MappedRow], mut key: F) -> Vec<Vec<usize>>
where
    K: Eq + Hash,
    F: FnMut(&MappedRow) -> Option<K>,
{
    let mut groups: HashMap<K, Vec<usize>> = HashMap::new();
    for row in rows {
        if let Some(k) = key(row) {
            groups.entry(k).or_default().push(row.row_number);
        }
    }
    let mut collisions: Vec<Vec<usize>> = groups.into_values().filter(|g| g.len() > 1).collect();
    collisions.sort_by_key(|g| g[0]);
    collisions
}

/// Sort and de-duplicate identifiers for error messages. Numeric ids sort
/// by value, everything else lexically after them.
pub fn sorted_unique<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut numeric: BTreeMap<i64, String> = BTreeMap::new();
    let mut text: BTreeMap<String, ()> = BTreeMap::new();
    for value in values {
        match parse_integer(&value) {
            Some(n) => {
                numeric.entry(n).or_insert(value);
            }
            None => {
                text.insert(value, ());
            }
        }
    }
    numeric.into_values().chain(text.into_keys()).collect()
}

/// `"a, b, c"` over [`sorted_unique`].
pub fn format_id_list<I>(values: I) -> String
where
    I: IntoIterator<Item = String>,
{
    sorted_unique(values).join(", ")
}
