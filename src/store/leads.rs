//! Lead CRUD and the one-shot conversion into a board item.
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use super::items::{ITEM_COLS, map_item};
use super::{Store, models::*};
use crate::error::{Result, StoreError};

fn map_lead(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        source: row.get(2)?,
        status: row.get(3)?,
        rating: row.get(4)?,
        notes: row.get(5)?,
        converted_to_board_id: row.get(6)?,
        converted_to_item_id: row.get(7)?,
        converted_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const LEAD_COLS: &str = "id, name, source, status, rating, notes, converted_to_board_id, converted_to_item_id, converted_at, created_at, updated_at";

impl Store {
    pub fn list_leads(&self) -> Result<Vec<Lead>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {LEAD_COLS} FROM leads ORDER BY id"))?;
        let rows = stmt.query_map([], map_lead)?;

        let mut leads = Vec::new();
        for row in rows {
            leads.push(row?);
        }
        Ok(leads)
    }

    pub fn get_lead(&self, id: i64) -> Result<Lead> {
        self.conn
            .query_row(
                &format!("SELECT {LEAD_COLS} FROM leads WHERE id = ?"),
                params![id],
                map_lead,
            )
            .optional()?
            .ok_or(StoreError::not_found("lead", id))
    }

    /// New leads start in `new`; every other transition goes through
    /// [`Store::update_lead`] or [`Store::convert_lead`].
    pub fn create_lead(
        &self,
        name: &str,
        source: &str,
        rating: Option<i64>,
        notes: Option<&str>,
    ) -> Result<Lead> {
        let lead = self.conn.query_row(
            &format!(
                "INSERT INTO leads (name, source, rating, notes)
                 VALUES (?, ?, ?, ?) RETURNING {LEAD_COLS}"
            ),
            params![name, source, rating, notes],
            map_lead,
        )?;
        tracing::info!(lead_id = lead.id, name, "Created lead");
        Ok(lead)
    }

    /// Update a lead's workflow fields. `None` leaves a field alone.
    pub fn update_lead(
        &self,
        id: i64,
        status: Option<LeadStatus>,
        rating: Option<i64>,
        notes: Option<&str>,
    ) -> Result<Lead> {
        self.conn
            .query_row(
                &format!(
                    "UPDATE leads SET
                        status = COALESCE(?2, status),
                        rating = COALESCE(?3, rating),
                        notes = COALESCE(?4, notes),
                        updated_at = CURRENT_TIMESTAMP
                     WHERE id = ?1 RETURNING {LEAD_COLS}"
                ),
                params![id, status, rating, notes],
                map_lead,
            )
            .optional()?
            .ok_or(StoreError::not_found("lead", id))
    }

    pub fn delete_lead(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM leads WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    /// Convert a lead into a new item on the target board.
    ///
    /// The item is created with the given data as-is and the lead is stamped
    /// `converted` with the new item's coordinates — both inside one
    /// transaction, so a failure of either step leaves neither an orphan item
    /// nor a half-stamped lead. A lead already in `converted` is refused.
    pub fn convert_lead(
        &mut self,
        lead_id: i64,
        target_board_id: i64,
        data: DataMap,
    ) -> Result<(Lead, Item)> {
        let data_json = serde_json::to_string(&data)?;
        let tx = self.conn.transaction()?;

        let status: Option<LeadStatus> = tx
            .query_row(
                "SELECT status FROM leads WHERE id = ?",
                params![lead_id],
                |row| row.get(0),
            )
            .optional()?;
        match status {
            None => return Err(StoreError::not_found("lead", lead_id)),
            Some(LeadStatus::Converted) => return Err(StoreError::LeadAlreadyConverted(lead_id)),
            Some(_) => {}
        }

        let board_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM boards WHERE id = ?)",
            params![target_board_id],
            |row| row.get(0),
        )?;
        if !board_exists {
            return Err(StoreError::not_found("board", target_board_id));
        }

        let item = tx.query_row(
            &format!(
                "INSERT INTO items (board_id, item_order, data)
                 VALUES (?1, (SELECT COALESCE(MAX(item_order) + 1, 0) FROM items WHERE board_id = ?1), ?2)
                 RETURNING {ITEM_COLS}"
            ),
            params![target_board_id, data_json],
            map_item,
        )?;

        let lead = tx.query_row(
            &format!(
                "UPDATE leads SET
                    status = 'converted',
                    converted_to_board_id = ?2,
                    converted_to_item_id = ?3,
                    converted_at = ?4,
                    updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?1 RETURNING {LEAD_COLS}"
            ),
            params![lead_id, target_board_id, item.id, Utc::now()],
            map_lead,
        )?;

        tx.commit()?;
        tracing::info!(lead_id, item_id = item.id, board_id = target_board_id, "Converted lead");
        Ok((lead, item))
    }
}
