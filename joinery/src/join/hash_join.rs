use std::collections::HashMap;

use tracing::{debug, instrument};

use super::{output_names, JoinOptions, JoinType};
use crate::core::{ColumnSpec, PrimaryKey, Row, Scalar, TabularDataset};
use crate::error::{JoinSide, JoineryError, Result};

/// Joins two datasets in memory.
///
/// Keys are compared through [`Scalar::coerce_key`], so `1`, `1.0` and `"1"`
/// match each other, dates match their ISO-8601 strings, and nulls never
/// match anything. A left row matching several right rows fans out into one
/// output row per match.
///
/// The output schema is the left columns followed by the right columns, with
/// names present on both sides suffixed per `options.suffixes`. Every output
/// row carries every output column; fields from the side that did not match
/// are null.
///
/// The primary key is kept from the left for `inner`/`left` joins and from
/// the right for `right` joins (renamed along with its columns); `outer`
/// joins have none.
///
/// # Errors
///
/// [`JoineryError::ColumnNotFound`] when a join column is missing from its
/// side's schema.
#[instrument(skip_all, fields(how = %options.how, left_rows = left.len(), right_rows = right.len()))]
pub fn hash_join(
    left: &TabularDataset,
    right: &TabularDataset,
    options: &JoinOptions,
) -> Result<TabularDataset> {
    let left_on = options.on.left();
    let right_on = options.on.right();
    if !left.has_column(left_on) {
        return Err(JoineryError::column_not_found(left_on, JoinSide::Left));
    }
    if !right.has_column(right_on) {
        return Err(JoineryError::column_not_found(right_on, JoinSide::Right));
    }

    let (left_names, right_names) =
        output_names(&left.column_names(), &right.column_names(), &options.suffixes);
    let merger = RowMerger {
        left: left
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(left_names.iter().map(String::as_str))
            .collect(),
        right: right
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(right_names.iter().map(String::as_str))
            .collect(),
    };

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, row) in right.rows.iter().enumerate() {
        if let Some(key) = row.get(right_on).and_then(Scalar::coerce_key) {
            index.entry(key).or_default().push(idx);
        }
    }

    let mut matched = vec![false; right.rows.len()];
    let mut rows = Vec::new();

    for left_row in &left.rows {
        let matches = left_row
            .get(left_on)
            .and_then(Scalar::coerce_key)
            .and_then(|key| index.get(&key));

        match matches {
            Some(indices) => {
                for &idx in indices {
                    matched[idx] = true;
                    rows.push(merger.merge(Some(left_row), Some(&right.rows[idx])));
                }
            }
            None if options.how.keeps_left() => rows.push(merger.merge(Some(left_row), None)),
            None => {}
        }
    }

    if options.how.keeps_right() {
        for (idx, right_row) in right.rows.iter().enumerate() {
            if !matched[idx] {
                rows.push(merger.merge(None, Some(right_row)));
            }
        }
    }

    let columns: Vec<ColumnSpec> = left
        .columns
        .iter()
        .zip(&left_names)
        .chain(right.columns.iter().zip(&right_names))
        .map(|(spec, name)| spec.renamed(name.as_str()))
        .collect();

    let primary_key = match options.how {
        JoinType::Inner | JoinType::Left => left
            .primary_key
            .as_ref()
            .map(|key| rename_key(key, &merger.left)),
        JoinType::Right => right
            .primary_key
            .as_ref()
            .map(|key| rename_key(key, &merger.right)),
        JoinType::Outer => None,
    };

    debug!(output_rows = rows.len(), "Completed hash join");

    Ok(TabularDataset {
        columns,
        rows,
        primary_key,
    })
}

/// Maps input column names of each side to their output names.
struct RowMerger<'a> {
    left: Vec<(&'a str, &'a str)>,
    right: Vec<(&'a str, &'a str)>,
}

impl RowMerger<'_> {
    fn merge(&self, left: Option<&Row>, right: Option<&Row>) -> Row {
        let mut row = Row::new();
        for (columns, source) in [(&self.left, left), (&self.right, right)] {
            for (input, output) in columns {
                let value = source
                    .and_then(|r| r.get(*input))
                    .cloned()
                    .unwrap_or(Scalar::Null);
                row.insert(output.to_string(), value);
            }
        }
        row
    }
}

fn rename_key(key: &PrimaryKey, names: &[(&str, &str)]) -> PrimaryKey {
    key.map_columns(|column| {
        names
            .iter()
            .find(|(input, _)| *input == column)
            .map(|(_, output)| output.to_string())
            .unwrap_or_else(|| column.to_string())
    })
}
