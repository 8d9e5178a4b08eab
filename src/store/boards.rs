//! Board and column CRUD.
use rusqlite::{OptionalExtension, Row, params};

use super::{Store, json_column, models::*};
use crate::error::{Result, StoreError};

fn map_board(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn map_column(row: &Row<'_>) -> rusqlite::Result<ColumnDef> {
    Ok(ColumnDef {
        id: row.get(0)?,
        board_id: row.get(1)?,
        name: row.get(2)?,
        column_type: row.get(3)?,
        column_order: row.get(4)?,
        options: json_column(row, 5)?,
        is_required: row.get(6)?,
    })
}

const BOARD_COLS: &str = "id, name, description, created_at, updated_at";
const COLUMN_COLS: &str = "id, board_id, name, column_type, column_order, options, is_required";

impl Store {
    pub fn list_boards(&self) -> Result<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {BOARD_COLS} FROM boards ORDER BY id"))?;
        let rows = stmt.query_map([], map_board)?;

        let mut boards = Vec::new();
        for row in rows {
            boards.push(row?);
        }
        Ok(boards)
    }

    pub fn get_board(&self, id: i64) -> Result<Board> {
        self.conn
            .query_row(
                &format!("SELECT {BOARD_COLS} FROM boards WHERE id = ?"),
                params![id],
                map_board,
            )
            .optional()?
            .ok_or(StoreError::not_found("board", id))
    }

    pub fn create_board(&self, name: &str, description: Option<&str>) -> Result<Board> {
        let board = self.conn.query_row(
            &format!("INSERT INTO boards (name, description) VALUES (?, ?) RETURNING {BOARD_COLS}"),
            params![name, description],
            map_board,
        )?;
        tracing::info!(board_id = board.id, name, "Created board");
        Ok(board)
    }

    /// Update a board's name and/or description. `None` leaves a field alone.
    pub fn update_board(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Board> {
        self.conn
            .query_row(
                &format!(
                    "UPDATE boards SET
                        name = COALESCE(?2, name),
                        description = COALESCE(?3, description),
                        updated_at = CURRENT_TIMESTAMP
                     WHERE id = ?1 RETURNING {BOARD_COLS}"
                ),
                params![id, name, description],
                map_board,
            )
            .optional()?
            .ok_or(StoreError::not_found("board", id))
    }

    /// Delete a board. Columns, items, relationships and links cascade.
    pub fn delete_board(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM boards WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    /// A board's columns in display order; ties break by creation.
    pub fn list_columns(&self, board_id: i64) -> Result<Vec<ColumnDef>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMN_COLS} FROM board_columns WHERE board_id = ? ORDER BY column_order, id"
        ))?;
        let rows = stmt.query_map(params![board_id], map_column)?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    pub fn get_column(&self, id: i64) -> Result<ColumnDef> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMN_COLS} FROM board_columns WHERE id = ?"),
                params![id],
                map_column,
            )
            .optional()?
            .ok_or(StoreError::not_found("column", id))
    }

    /// Add a column to a board. With no explicit order the column appends
    /// after the board's current last one.
    pub fn create_column(
        &self,
        board_id: i64,
        name: &str,
        column_type: ColumnType,
        options: ColumnOptions,
        is_required: bool,
        column_order: Option<i64>,
    ) -> Result<ColumnDef> {
        // A board-link column must point at an existing board.
        if column_type == ColumnType::BoardLink {
            let linked = options
                .linked_board_id
                .ok_or_else(|| StoreError::DanglingLinkedBoard(name.to_string()))?;
            if self.get_board(linked).is_err() {
                return Err(StoreError::DanglingLinkedBoard(name.to_string()));
            }
        }

        let options_json = serde_json::to_string(&options)?;
        let column = self.conn.query_row(
            &format!(
                "INSERT INTO board_columns (board_id, name, column_type, column_order, options, is_required)
                 VALUES (?1, ?2, ?3,
                         COALESCE(?4, (SELECT COALESCE(MAX(column_order) + 1, 0) FROM board_columns WHERE board_id = ?1)),
                         ?5, ?6)
                 RETURNING {COLUMN_COLS}"
            ),
            params![board_id, name, column_type, column_order, options_json, is_required],
            map_column,
        )?;
        Ok(column)
    }

    /// Update a column definition. `None` leaves a field alone.
    ///
    /// Renaming does not rewrite item data keys: values stored under the old
    /// name stay where they are and fall out of rendering.
    pub fn update_column(
        &self,
        id: i64,
        name: Option<&str>,
        options: Option<&ColumnOptions>,
        is_required: Option<bool>,
        column_order: Option<i64>,
    ) -> Result<ColumnDef> {
        let options_json = options.map(serde_json::to_string).transpose()?;
        self.conn
            .query_row(
                &format!(
                    "UPDATE board_columns SET
                        name = COALESCE(?2, name),
                        options = COALESCE(?3, options),
                        is_required = COALESCE(?4, is_required),
                        column_order = COALESCE(?5, column_order)
                     WHERE id = ?1 RETURNING {COLUMN_COLS}"
                ),
                params![id, name, options_json, is_required, column_order],
                map_column,
            )
            .optional()?
            .ok_or(StoreError::not_found("column", id))
    }

    pub fn delete_column(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM board_columns WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }
}
