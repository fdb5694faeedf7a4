// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::DatasetStats;
use prettytable::{cell, format::consts::FORMAT_NO_LINESEP, row, table, Table};
use std::collections::{BTreeMap, HashMap};

pub trait ToTable {
    fn to_table(&self) -> Table;
}

impl ToTable for DatasetStats {
    fn to_table(&self) -> Table {
        let mut table = table![
            ["users", self.num_users],
            ["items", self.num_items],
            ["checkins", self.num_checkins]
        ];

        table.add_row(row!["sparsity", format!("{:.6}", self.sparsity())]);
        table.set_format(*FORMAT_NO_LINESEP);
        table
    }
}

impl<K, V> ToTable for BTreeMap<K, V>
where
    K: ToString,
    V: ToString,
{
    fn to_table(&self) -> Table {
        let mut table = Table::new();

        for (key, val) in self {
            table.add_row(row![key, val]);
        }

        table.set_format(*FORMAT_NO_LINESEP);
        table
    }
}

impl<K, V, B> ToTable for HashMap<K, V, B>
where
    K: ToString + Ord,
    V: ToString,
{
    fn to_table(&self) -> Table {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut table = Table::new();
        for (key, val) in entries {
            table.add_row(row![key, val]);
        }

        table.set_format(*FORMAT_NO_LINESEP);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_rows_are_sorted_by_key() {
        let mut measures = HashMap::new();
        measures.insert("b", 2);
        measures.insert("a", 1);

        let table = measures.to_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get_row(0).and_then(|r| r.get_cell(0)).map(|c| c.get_content()), Some("a".to_string()));
    }

    #[test]
    fn stats_table_has_four_rows() {
        let stats = DatasetStats {
            num_users: 2,
            num_items: 2,
            num_checkins: 3,
            distinct_pairs: 2,
        };

        assert_eq!(stats.to_table().len(), 4);
    }
}
