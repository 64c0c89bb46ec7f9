//! Categorical encodings for identifier columns.

use std::collections::{BTreeSet, HashMap};

use crate::table::{format_bool, CsvTable, TableError};

/// Integer code per distinct value, numbered in order of first appearance.
pub fn label_encode(values: &[&str]) -> Vec<usize> {
    let mut codes: HashMap<&str, usize> = HashMap::new();
    values
        .iter()
        .map(|&value| {
            let next = codes.len();
            *codes.entry(value).or_insert(next)
        })
        .collect()
}

/// One indicator column per distinct value, named `{prefix}_{value}`, in
/// lexicographic value order.
pub fn one_hot(values: &[&str], prefix: &str) -> Vec<(String, Vec<bool>)> {
    let categories: BTreeSet<&str> = values.iter().copied().collect();
    categories
        .into_iter()
        .map(|category| {
            (
                format!("{prefix}_{category}"),
                values.iter().map(|value| *value == category).collect(),
            )
        })
        .collect()
}

/// Appends `label_column` and the one-hot columns for `source_column`.
///
/// Returns the names of the one-hot columns in the order they were added.
pub fn append_encodings(
    table: &mut CsvTable,
    source_column: &str,
    label_column: &str,
    prefix: &str,
) -> Result<Vec<String>, TableError> {
    let values: Vec<String> = table
        .column_values(source_column)?
        .into_iter()
        .map(str::to_string)
        .collect();
    let views: Vec<&str> = values.iter().map(String::as_str).collect();

    let labels = label_encode(&views)
        .into_iter()
        .map(|code| code.to_string())
        .collect();
    table.push_column(label_column, labels)?;

    let mut added = Vec::new();
    for (name, flags) in one_hot(&views, prefix) {
        table.push_column(name.clone(), flags.into_iter().map(format_bool).collect())?;
        added.push(name);
    }
    Ok(added)
}
