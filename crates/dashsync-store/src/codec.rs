//! Table encodings for artifacts on disk.
//!
//! `.xlsx` artifacts are single-sheet workbooks; every other artifact is
//! comma-separated text with a header row.

use std::path::Path;

use dashsync::Table;
use rust_xlsxwriter::{ColNum, RowNum, Workbook, XlsxError};
use serde_json::{Number, Value};

use crate::StoreError;

pub fn encode_csv(table: &Table) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(csv_cell))?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn encode_xlsx(table: &Table) -> Result<Vec<u8>, StoreError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (c, name) in table.columns.iter().enumerate() {
        sheet.write_string(0, col_num(c)?, name.as_str())?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = row_num(r + 1)?;
        for (c, cell) in row.iter().enumerate() {
            let c = col_num(c)?;
            match cell {
                Value::Null => {}
                Value::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Value::Number(n) => match n.as_f64() {
                    Some(f) => {
                        sheet.write_number(r, c, f)?;
                    }
                    None => {
                        sheet.write_string(r, c, &n.to_string())?;
                    }
                },
                Value::String(s) => {
                    sheet.write_string(r, c, s.as_str())?;
                }
                other => {
                    sheet.write_string(r, c, &other.to_string())?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn row_num(index: usize) -> Result<RowNum, StoreError> {
    RowNum::try_from(index).map_err(|_| StoreError::Xlsx(XlsxError::RowColumnLimitError))
}

fn col_num(index: usize) -> Result<ColNum, StoreError> {
    ColNum::try_from(index).map_err(|_| StoreError::Xlsx(XlsxError::RowColumnLimitError))
}

/// Read a CSV artifact. Cells that parse as numbers become numbers; empty
/// cells become `null`.
pub fn decode_csv(path: &Path) -> Result<Table, StoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns = reader.headers()?.iter().map(str::to_owned).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(parse_cell).collect());
    }

    Ok(Table::new(columns, rows))
}

fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Table {
        Table::new(
            vec!["name".into(), "qty".into(), "ok".into(), "note".into()],
            vec![
                vec![json!("apple, red"), json!(3), json!(true), Value::Null],
                vec![json!("pear"), json!(1.5), json!(false), json!({"k": 1})],
            ],
        )
    }

    #[test]
    fn csv_has_header_and_raw_cells() {
        let text = String::from_utf8(encode_csv(&sample()).unwrap()).unwrap();
        assert_eq!(
            text,
            "name,qty,ok,note\n\"apple, red\",3,true,\npear,1.5,false,\"{\"\"k\"\":1}\"\n"
        );
    }

    #[test]
    fn csv_reads_back_numbers_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "a,b,c\n1,2.5,x\n,-4,\n").unwrap();

        let table = decode_csv(&path).unwrap();
        assert_eq!(table.columns, vec!["a", "b", "c"]);
        assert_eq!(
            table.rows,
            vec![
                vec![json!(1), json!(2.5), json!("x")],
                vec![Value::Null, json!(-4), Value::Null],
            ]
        );
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let table = Table::new(vec!["a".into(), "b".into()], vec![vec![json!(1)]]);
        assert!(matches!(encode_csv(&table), Err(StoreError::Csv(_))));
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = encode_xlsx(&sample()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn nan_text_stays_text() {
        assert_eq!(parse_cell("NaN"), json!("NaN"));
        assert_eq!(parse_cell("inf"), json!("inf"));
        assert_eq!(parse_cell("007"), json!(7));
    }
}
