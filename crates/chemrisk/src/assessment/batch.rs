use std::collections::BTreeMap;
use std::io::Read;

use super::form::{FormError, FormState};

/// One data line of a batch file, keyed by column header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    /// 1-based line number in the source file, header included.
    pub line: u64,
    pub values: BTreeMap<String, String>,
}

/// Read a headed CSV file of form submissions.
pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<BatchRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|position| position.line()).unwrap_or(0);
        let values = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        rows.push(BatchRow { line, values });
    }

    Ok(rows)
}

/// Copy a batch row into `form`. Columns may be headed by field name, wire name, or
/// label; blank cells are left untouched.
pub fn apply_row(form: &mut FormState, row: &BatchRow) -> Result<(), FormError> {
    let schema = form.schema();
    for (header, value) in &row.values {
        let spec = schema
            .fields
            .iter()
            .find(|spec| {
                spec.name == header
                    || spec.wire_name == header
                    || spec.label.eq_ignore_ascii_case(header)
            })
            .ok_or_else(|| FormError::UnknownField(header.clone()))?;
        if value.is_empty() {
            continue;
        }
        form.set(spec.name, value.as_str())?;
    }
    Ok(())
}
