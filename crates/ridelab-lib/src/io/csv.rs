use anyhow::{anyhow, Context, Result};
use ::csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;

/// Read one numeric column, by header name, from a delimited export.
/// Empty cells are skipped.
pub fn read_csv_column_from<R: Read>(reader: R, column: &str, delimiter: u8) -> Result<Vec<f64>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers().context("missing header row")?.clone();
    let idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(column))
        .ok_or_else(|| anyhow!("column {column:?} not found in {:?}", headers))?;
    let mut out = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("malformed row {}", row + 2))?;
        let Some(cell) = record.get(idx) else {
            continue;
        };
        if cell.is_empty() {
            continue;
        }
        let value: f64 = cell
            .parse()
            .with_context(|| format!("row {} column {column:?} is not a number: {cell}", row + 2))?;
        out.push(value);
    }
    if out.is_empty() {
        anyhow::bail!("column {column:?} has no numeric samples");
    }
    Ok(out)
}

pub fn read_csv_column(path: &Path, column: &str) -> Result<Vec<f64>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let delimiter = match path.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };
    read_csv_column_from(file, column, delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_named_column() {
        let data = "time,Power,hr\n0,150,120\n1,,121\n2,162.5,121\n";
        let watts = read_csv_column_from(data.as_bytes(), "power", b',').unwrap();
        assert_eq!(watts, vec![150.0, 162.5]);
        assert!(read_csv_column_from(data.as_bytes(), "cadence", b',').is_err());
    }

    #[test]
    fn tsv_files_use_tabs() {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        writeln!(file, "rr\tflag").unwrap();
        writeln!(file, "812\t0").unwrap();
        writeln!(file, "790\t1").unwrap();
        let rr = read_csv_column(file.path(), "rr").unwrap();
        assert_eq!(rr, vec![812.0, 790.0]);
    }
}
