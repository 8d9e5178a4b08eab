//! Item CRUD, board-link search and seeded linked-item creation.
use rusqlite::{OptionalExtension, Row, params};
use serde_json::Value;

use super::{Store, json_column, models::*};
use crate::columns::{normalize_item_data, validate_item_data, validate_value};
use crate::error::{Result, StoreError};

pub(crate) fn map_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        board_id: row.get(1)?,
        item_order: row.get(2)?,
        data: json_column(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub(crate) const ITEM_COLS: &str = "id, board_id, item_order, data, created_at, updated_at";

/// Substring match over one data value, case-insensitive.
///
/// Strings match directly, numbers through their decimal rendering, arrays
/// element-wise. Objects (file values) and booleans never match.
fn value_matches(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Number(n) => n.to_string().contains(needle),
        Value::Array(entries) => entries.iter().any(|e| value_matches(e, needle)),
        Value::Null | Value::Bool(_) | Value::Object(_) => false,
    }
}

impl Store {
    /// A board's items ordered by `item_order`, ties by creation.
    pub fn list_items(&self, board_id: i64) -> Result<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLS} FROM items WHERE board_id = ? ORDER BY item_order, id"
        ))?;
        let rows = stmt.query_map(params![board_id], map_item)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    pub fn get_item(&self, id: i64) -> Result<Item> {
        self.conn
            .query_row(
                &format!("SELECT {ITEM_COLS} FROM items WHERE id = ?"),
                params![id],
                map_item,
            )
            .optional()?
            .ok_or(StoreError::not_found("item", id))
    }

    /// Create an item from submitted form data.
    ///
    /// Required fields are checked first and reported all at once; value
    /// shapes second. Nothing is written on a validation failure. The new
    /// item appends after the board's current last `item_order`.
    pub fn create_item(&self, board_id: i64, data: DataMap) -> Result<Item> {
        self.get_board(board_id)?;
        let columns = self.list_columns(board_id)?;
        validate_item_data(&columns, &data)?;
        let data = normalize_item_data(&columns, data);

        let item = self.insert_item(board_id, &data)?;
        tracing::debug!(item_id = item.id, board_id, "Created item");
        Ok(item)
    }

    pub(crate) fn insert_item(&self, board_id: i64, data: &DataMap) -> Result<Item> {
        let data_json = serde_json::to_string(data)?;
        let item = self.conn.query_row(
            &format!(
                "INSERT INTO items (board_id, item_order, data)
                 VALUES (?1, (SELECT COALESCE(MAX(item_order) + 1, 0) FROM items WHERE board_id = ?1), ?2)
                 RETURNING {ITEM_COLS}"
            ),
            params![board_id, data_json],
            map_item,
        )?;
        Ok(item)
    }

    /// Merge a patch into an item's data map.
    ///
    /// Patched values are shape-checked and normalized against the board's
    /// columns; the required check only applies at creation. Keys with no
    /// matching column are stored untouched, and existing stale keys survive.
    pub fn update_item(&self, id: i64, patch: DataMap) -> Result<Item> {
        let item = self.get_item(id)?;
        let columns = self.list_columns(item.board_id)?;

        for column in &columns {
            if let Some(value) = patch.get(&column.name) {
                if !value.is_null() {
                    validate_value(column, value)?;
                }
            }
        }

        let mut data = item.data;
        for (key, value) in patch {
            data.insert(key, value);
        }
        let data = normalize_item_data(&columns, data);

        let data_json = serde_json::to_string(&data)?;
        self.conn
            .query_row(
                &format!(
                    "UPDATE items SET data = ?2, updated_at = CURRENT_TIMESTAMP
                     WHERE id = ?1 RETURNING {ITEM_COLS}"
                ),
                params![id, data_json],
                map_item,
            )
            .optional()?
            .ok_or(StoreError::not_found("item", id))
    }

    pub fn delete_item(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM items WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    /// Search a board's items by case-insensitive substring across all data
    /// values. An empty query returns every item.
    pub fn search_items(&self, board_id: i64, query: &str) -> Result<Vec<Item>> {
        let items = self.list_items(board_id)?;
        if query.is_empty() {
            return Ok(items);
        }
        let needle = query.to_lowercase();
        Ok(items
            .into_iter()
            .filter(|item| item.data.values().any(|v| value_matches(v, &needle)))
            .collect())
    }

    /// Create an item in a board with its first column pre-populated from a
    /// search string — the "create new" path of the board-link widget when a
    /// search comes back empty. This path skips the required-field check.
    pub fn create_linked_item(&self, board_id: i64, seed_text: &str) -> Result<Item> {
        let columns = self.list_columns(board_id)?;
        let first = columns
            .first()
            .ok_or(StoreError::not_found("board", board_id))?;

        let mut data = DataMap::new();
        data.insert(first.name.clone(), Value::String(seed_text.to_string()));
        let data = normalize_item_data(&columns, data);

        self.insert_item(board_id, &data)
    }
}
