//! Schema-level relationships between boards and item-level links.
use rusqlite::{OptionalExtension, Row, params};

use super::{Store, models::*};
use crate::error::{Result, StoreError};

fn map_relationship(row: &Row<'_>) -> rusqlite::Result<Relationship> {
    Ok(Relationship {
        id: row.get(0)?,
        source_board_id: row.get(1)?,
        target_board_id: row.get(2)?,
        relationship_type: row.get(3)?,
        source_field_name: row.get(4)?,
        target_field_name: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_link(row: &Row<'_>) -> rusqlite::Result<ItemRelationship> {
    Ok(ItemRelationship {
        id: row.get(0)?,
        relationship_id: row.get(1)?,
        source_item_id: row.get(2)?,
        target_item_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

const REL_COLS: &str =
    "id, source_board_id, target_board_id, relationship_type, source_field_name, target_field_name, created_at";
const LINK_COLS: &str = "id, relationship_id, source_item_id, target_item_id, created_at";

impl Store {
    pub fn create_relationship(
        &self,
        source_board_id: i64,
        target_board_id: i64,
        relationship_type: RelationshipType,
        source_field_name: &str,
        target_field_name: &str,
    ) -> Result<Relationship> {
        self.get_board(source_board_id)?;
        self.get_board(target_board_id)?;

        let rel = self.conn.query_row(
            &format!(
                "INSERT INTO relationships
                    (source_board_id, target_board_id, relationship_type, source_field_name, target_field_name)
                 VALUES (?, ?, ?, ?, ?) RETURNING {REL_COLS}"
            ),
            params![
                source_board_id,
                target_board_id,
                relationship_type,
                source_field_name,
                target_field_name,
            ],
            map_relationship,
        )?;
        Ok(rel)
    }

    pub fn get_relationship(&self, id: i64) -> Result<Relationship> {
        self.conn
            .query_row(
                &format!("SELECT {REL_COLS} FROM relationships WHERE id = ?"),
                params![id],
                map_relationship,
            )
            .optional()?
            .ok_or(StoreError::not_found("relationship", id))
    }

    pub fn delete_relationship(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM relationships WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    /// Every relationship a board participates in, as source or target.
    ///
    /// One query over both sides, so a row can never come back twice.
    pub fn relationships_for_board(&self, board_id: i64) -> Result<Vec<Relationship>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REL_COLS} FROM relationships
             WHERE source_board_id = ?1 OR target_board_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![board_id], map_relationship)?;

        let mut rels = Vec::new();
        for row in rows {
            rels.push(row?);
        }
        Ok(rels)
    }

    /// Link two items under a relationship, enforcing its declared cardinality:
    /// `one_to_one` rejects a second link touching either endpoint,
    /// `one_to_many` rejects a second link claiming the same target item,
    /// `many_to_many` only rejects exact duplicates.
    pub fn create_item_relationship(
        &self,
        relationship_id: i64,
        source_item_id: i64,
        target_item_id: i64,
    ) -> Result<ItemRelationship> {
        let rel = self.get_relationship(relationship_id)?;

        let duplicate: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM item_relationships
             WHERE relationship_id = ? AND source_item_id = ? AND target_item_id = ?)",
            params![relationship_id, source_item_id, target_item_id],
            |row| row.get(0),
        )?;
        if duplicate {
            return Err(StoreError::CardinalityViolation {
                relationship_id,
                cardinality: rel.relationship_type.as_str(),
                reason: "link already exists".to_string(),
            });
        }

        match rel.relationship_type {
            RelationshipType::OneToOne => {
                let taken: bool = self.conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM item_relationships
                     WHERE relationship_id = ?1 AND (source_item_id = ?2 OR target_item_id = ?3))",
                    params![relationship_id, source_item_id, target_item_id],
                    |row| row.get(0),
                )?;
                if taken {
                    return Err(StoreError::CardinalityViolation {
                        relationship_id,
                        cardinality: "one_to_one",
                        reason: "an endpoint is already linked".to_string(),
                    });
                }
            }
            RelationshipType::OneToMany => {
                let claimed: bool = self.conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM item_relationships
                     WHERE relationship_id = ? AND target_item_id = ?)",
                    params![relationship_id, target_item_id],
                    |row| row.get(0),
                )?;
                if claimed {
                    return Err(StoreError::CardinalityViolation {
                        relationship_id,
                        cardinality: "one_to_many",
                        reason: "target item is already claimed".to_string(),
                    });
                }
            }
            RelationshipType::ManyToMany => {}
        }

        let link = self.conn.query_row(
            &format!(
                "INSERT INTO item_relationships (relationship_id, source_item_id, target_item_id)
                 VALUES (?, ?, ?) RETURNING {LINK_COLS}"
            ),
            params![relationship_id, source_item_id, target_item_id],
            map_link,
        )?;
        Ok(link)
    }

    /// Remove the link(s) between two specific items, any relationship.
    pub fn delete_item_relationship(&self, source_item_id: i64, target_item_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM item_relationships WHERE source_item_id = ? AND target_item_id = ?",
            params![source_item_id, target_item_id],
        )?;
        Ok(rows > 0)
    }

    /// Raw link rows an item participates in, filtered by direction.
    pub fn list_item_relationships(
        &self,
        item_id: i64,
        direction: LinkDirection,
    ) -> Result<Vec<ItemRelationship>> {
        let where_clause = match direction {
            LinkDirection::Outgoing => "source_item_id = ?1",
            LinkDirection::Incoming => "target_item_id = ?1",
            LinkDirection::Both => "source_item_id = ?1 OR target_item_id = ?1",
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LINK_COLS} FROM item_relationships WHERE {where_clause} ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![item_id], map_link)?;

        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }

    /// The peer items an item is linked to, resolved through the link table.
    /// Read-only: opening the linked-records view re-runs this each time.
    pub fn linked_items(&self, item_id: i64, direction: LinkDirection) -> Result<Vec<Item>> {
        let links = self.list_item_relationships(item_id, direction)?;

        let mut peers = Vec::new();
        for link in links {
            let peer_id = if link.source_item_id == item_id {
                link.target_item_id
            } else {
                link.source_item_id
            };
            peers.push(self.get_item(peer_id)?);
        }
        Ok(peers)
    }
}
