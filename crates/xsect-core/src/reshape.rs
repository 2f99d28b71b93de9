use crate::domain::{ExtractionRow, ResultRow};

/// Flattens wide per-phase records into one row per sample point.
///
/// Output keeps record order, then sample order inside each record. Sample
/// `i` of a row takes element `i` of every series.
pub fn to_long_table(rows: &[ExtractionRow]) -> Vec<ResultRow> {
    let total = rows.iter().map(ExtractionRow::len).sum();
    let mut table = Vec::with_capacity(total);
    for row in rows {
        table.extend((0..row.len()).filter_map(|index| {
            row.sample(index).map(|sample| ResultRow {
                model: row.model().to_path_buf(),
                stage: row.phase().to_string(),
                sample,
            })
        }));
    }
    table
}
