//! CSV export of a board: one header row of column names in display order,
//! one record per item in board order.
use std::io::Write;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::store::Store;
use crate::store::models::{ColumnDef, ColumnType};

/// Render one cell for its column type. Absent and null values are empty.
fn render_value(column: &ColumnDef, value: Option<&Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    if value.is_null() {
        return String::new();
    }
    match column.column_type {
        ColumnType::Text
        | ColumnType::Date
        | ColumnType::SingleSelect
        | ColumnType::Status => match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
        ColumnType::Number => value.to_string(),
        ColumnType::MultiSelect => match value {
            Value::Array(entries) => entries
                .iter()
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        },
        ColumnType::File | ColumnType::Image => value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        ColumnType::BoardLink => value.to_string(),
    }
}

/// Write a board as CSV. Columns come out in `column_order`, items in
/// `item_order`; data keys with no matching column are not exported.
pub fn export_board<W: Write>(store: &Store, board_id: i64, writer: W) -> Result<()> {
    let board = store.get_board(board_id)?;
    let columns = store.list_columns(board_id)?;
    let items = store.list_items(board_id)?;

    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(columns.iter().map(|c| c.name.as_str()))
        .context("failed to write CSV header")?;

    for item in &items {
        let record: Vec<String> = columns
            .iter()
            .map(|c| render_value(c, item.data.get(&c.name)))
            .collect();
        csv_writer
            .write_record(&record)
            .context("failed to write CSV record")?;
    }

    csv_writer.flush().context("failed to flush CSV")?;
    tracing::info!(board_id, board = %board.name, rows = items.len(), "Exported board");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{ColumnOptions, DataMap};
    use serde_json::json;

    fn data(entries: serde_json::Value) -> DataMap {
        entries.as_object().unwrap().clone()
    }

    #[test]
    fn test_export_renders_types_in_column_order() {
        let store = Store::open_in_memory().unwrap();
        let board = store.create_board("Deals", None).unwrap();
        store
            .create_column(board.id, "Name", ColumnType::Text, ColumnOptions::default(), true, None)
            .unwrap();
        store
            .create_column(board.id, "Amount", ColumnType::Number, ColumnOptions::default(), false, None)
            .unwrap();
        store
            .create_column(
                board.id,
                "Tags",
                ColumnType::MultiSelect,
                ColumnOptions::with_options(vec!["vip".into(), "churn".into()]),
                false,
                None,
            )
            .unwrap();
        store
            .create_column(board.id, "Contract", ColumnType::File, ColumnOptions::default(), false, None)
            .unwrap();

        store
            .create_item(
                board.id,
                data(json!({
                    "Name": "Acme",
                    "Amount": 1500,
                    "Tags": ["vip", "churn"],
                    "Contract": {"name": "acme.pdf", "url": "https://files/acme.pdf"},
                    "stale_key": "not exported"
                })),
            )
            .unwrap();
        store.create_item(board.id, data(json!({"Name": "Globex"}))).unwrap();

        let mut out = Vec::new();
        export_board(&store, board.id, &mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Name,Amount,Tags,Contract");
        assert_eq!(lines[1], "Acme,1500,vip; churn,acme.pdf");
        assert_eq!(lines[2], "Globex,,,");
    }

    #[test]
    fn test_export_unknown_board() {
        let store = Store::open_in_memory().unwrap();
        let mut out = Vec::new();
        assert!(export_board(&store, 9, &mut out).is_err());
    }
}
