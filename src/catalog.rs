use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

/// Position of a `(root, sub)` group in the panel grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub root: String,
    pub sub: String,
}

impl GroupKey {
    pub fn new(root: impl Into<String>, sub: impl Into<String>) -> Self {
        Self { root: root.into(), sub: sub.into() }
    }

    /// `<root>/<sub>/<file>`: grand-parent and parent directory names.
    pub fn from_path(path: &Path) -> Self {
        let mut dirs = path
            .parent()
            .into_iter()
            .flat_map(|p| p.components().rev())
            .filter_map(|c| match c {
                std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            });
        let sub = dirs.next().unwrap_or_else(|| ".".to_string());
        let root = dirs.next().unwrap_or_else(|| ".".to_string());
        Self::new(root, sub)
    }
}

#[derive(Clone, Debug)]
pub struct Group<'a, T> {
    pub key: &'a GroupKey,
    pub cell: Cell,
    pub items: &'a [T],
}

/// Groups items by experiment and configuration with a declared ordering.
#[derive(Clone, Debug)]
pub struct ExperimentCatalog<T> {
    groups: BTreeMap<String, BTreeMap<String, (GroupKey, Vec<T>)>>,
    order: Vec<String>,
}

impl<T> Default for ExperimentCatalog<T> {
    fn default() -> Self {
        Self { groups: BTreeMap::new(), order: Vec::new() }
    }
}

impl<T> ExperimentCatalog<T> {
    /// Sub groups named here come first, in this order; the rest follow
    /// lexicographically.
    pub fn with_order(order: Vec<String>) -> Self {
        Self { groups: BTreeMap::new(), order }
    }

    pub fn insert(&mut self, key: GroupKey, item: T) {
        self.groups
            .entry(key.root.clone())
            .or_default()
            .entry(key.sub.clone())
            .or_insert_with(|| (key, Vec::new()))
            .1
            .push(item);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.values().flat_map(|subs| subs.values()).map(|(_, v)| v.len()).sum()
    }

    fn compare_sub(&self, a: &str, b: &str) -> Ordering {
        let rank = |s: &str| self.order.iter().position(|o| o == s);
        match (rank(a), rank(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    /// Every group in declared order, with its panel coordinate.
    pub fn groups(&self) -> Vec<Group<'_, T>> {
        let mut out = Vec::new();
        for (row, subs) in self.groups.values().enumerate() {
            let mut entries: Vec<&(GroupKey, Vec<T>)> = subs.values().collect();
            entries.sort_by(|a, b| self.compare_sub(&a.0.sub, &b.0.sub));
            for (col, (key, items)) in entries.into_iter().enumerate() {
                out.push(Group { key, cell: Cell { row, col }, items });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    type Row = (String, String, usize, usize, Vec<&'static str>);

    fn summary(c: &ExperimentCatalog<&'static str>) -> Vec<Row> {
        c.groups()
            .into_iter()
            .map(|g| {
                let key = g.key.clone();
                (key.root, key.sub, g.cell.row, g.cell.col, g.items.to_vec())
            })
            .collect()
    }

    #[test]
    fn groups_sort_by_root_then_sub_and_keep_arrival_order() {
        let mut c = ExperimentCatalog::default();
        c.insert(GroupKey::new("exp-b", "streams-2"), "b2-0");
        c.insert(GroupKey::new("exp-a", "streams-4"), "a4-0");
        c.insert(GroupKey::new("exp-a", "streams-1"), "a1-0");
        c.insert(GroupKey::new("exp-a", "streams-4"), "a4-1");

        assert_eq!(
            summary(&c),
            vec![
                ("exp-a".to_string(), "streams-1".to_string(), 0, 0, vec!["a1-0"]),
                ("exp-a".to_string(), "streams-4".to_string(), 0, 1, vec!["a4-0", "a4-1"]),
                ("exp-b".to_string(), "streams-2".to_string(), 1, 0, vec!["b2-0"]),
            ]
        );
        assert_eq!(c.len(), 4);
    }

    #[test]
    fn explicit_order_wins_over_lexicographic() {
        let mut c = ExperimentCatalog::with_order(vec!["2".into(), "10".into()]);
        for sub in ["1", "10", "2", "3"] {
            c.insert(GroupKey::new("exp", sub), "x");
        }
        let subs: Vec<String> = c.groups().into_iter().map(|g| g.key.sub.clone()).collect();
        assert_eq!(subs, vec!["2", "10", "1", "3"]);
    }

    #[test]
    fn key_from_path_uses_parent_directories() {
        assert_eq!(
            GroupKey::from_path(Path::new("runs/exp1/streams_4/flow0.json")),
            GroupKey::new("exp1", "streams_4")
        );
        assert_eq!(GroupKey::from_path(Path::new("result_3.json")), GroupKey::new(".", "."));
        assert_eq!(
            GroupKey::from_path(Path::new("cubic/result_3.json")),
            GroupKey::new(".", "cubic")
        );
    }

    #[test]
    fn empty_catalog() {
        let c: ExperimentCatalog<()> = ExperimentCatalog::default();
        assert!(c.is_empty());
        assert!(c.groups().is_empty());
    }
}
