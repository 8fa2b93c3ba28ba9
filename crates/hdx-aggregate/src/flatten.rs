//! Expansion of wide rows with repeated, indexed columns.

use std::collections::BTreeSet;

use hdx_model::Row;

use crate::schema::FlattenRule;

/// Indices `n` for which `template` with `#` replaced by `n` is a header of `row`.
fn template_indices(template: &str, row: &Row) -> Vec<u32> {
    let Some((prefix, suffix)) = template.split_once('#') else {
        return Vec::new();
    };
    let indices: BTreeSet<u32> = row
        .headers()
        .filter_map(|header| {
            let middle = header.strip_prefix(prefix)?.strip_suffix(suffix)?;
            if middle.is_empty() || !middle.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            middle.parse().ok()
        })
        .collect();
    indices.into_iter().collect()
}

/// Lazily yields the rows one source row expands into.
///
/// Without rules the row is yielded once, unchanged. With rules, the k-th
/// expanded row takes the k-th smallest index present for each rule; the
/// sequence ends as soon as any rule runs out of indices.
pub struct Flatten<'a> {
    row: &'a Row,
    rules: &'a [FlattenRule],
    indices: Vec<Vec<u32>>,
    next: usize,
}

impl<'a> Flatten<'a> {
    pub fn new(row: &'a Row, rules: &'a [FlattenRule]) -> Self {
        let indices = rules
            .iter()
            .map(|rule| template_indices(&rule.original, row))
            .collect();
        Self {
            row,
            rules,
            indices,
            next: 0,
        }
    }
}

impl Iterator for Flatten<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let k = self.next;
        self.next += 1;
        if self.rules.is_empty() {
            return (k == 0).then(|| self.row.clone());
        }

        let mut expanded = self.row.clone();
        for (rule, indices) in self.rules.iter().zip(&self.indices) {
            let n = indices.get(k)?;
            let column = rule.original.replacen('#', &n.to_string(), 1);
            let value = self.row.get(&column).cloned().unwrap_or_default();
            expanded.set(rule.new.clone(), value);
        }
        Some(expanded)
    }
}
