//! Organization and tenant provisioning, board permissions, template usage.
use rusqlite::{OptionalExtension, Row, params};

use super::{Store, models::*};
use crate::error::{Result, StoreError};

fn map_organization(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        subdomain: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_tenant(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        schema_name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_template(row: &Row<'_>) -> rusqlite::Result<BoardTemplate> {
    Ok(BoardTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        usage_count: row.get(2)?,
        created_at: row.get(3)?,
    })
}

const ORG_COLS: &str = "id, name, subdomain, created_at";
const TENANT_COLS: &str = "id, organization_id, schema_name, created_at";
const TEMPLATE_COLS: &str = "id, name, usage_count, created_at";

impl Store {
    pub fn create_organization(&self, name: &str, subdomain: &str) -> Result<Organization> {
        let org = self.conn.query_row(
            &format!("INSERT INTO organizations (name, subdomain) VALUES (?, ?) RETURNING {ORG_COLS}"),
            params![name, subdomain],
            map_organization,
        )?;
        tracing::info!(organization_id = org.id, subdomain, "Created organization");
        Ok(org)
    }

    /// Provision a tenant for an organization. The schema name is derived
    /// from the organization's subdomain and must be unique.
    pub fn create_tenant(&self, organization_id: i64) -> Result<Tenant> {
        let subdomain: Option<String> = self
            .conn
            .query_row(
                "SELECT subdomain FROM organizations WHERE id = ?",
                params![organization_id],
                |row| row.get(0),
            )
            .optional()?;
        let subdomain =
            subdomain.ok_or(StoreError::not_found("organization", organization_id))?;

        let schema_name = format!("tenant_{subdomain}");
        let tenant = self.conn.query_row(
            &format!(
                "INSERT INTO tenants (organization_id, schema_name)
                 VALUES (?, ?) RETURNING {TENANT_COLS}"
            ),
            params![organization_id, schema_name],
            map_tenant,
        )?;
        tracing::info!(tenant_id = tenant.id, schema = %tenant.schema_name, "Provisioned tenant");
        Ok(tenant)
    }

    pub fn get_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
        let tenant = self
            .conn
            .query_row(
                &format!(
                    "SELECT t.id, t.organization_id, t.schema_name, t.created_at
                     FROM tenants t
                     JOIN organizations o ON t.organization_id = o.id
                     WHERE o.subdomain = ?"
                ),
                params![subdomain],
                map_tenant,
            )
            .optional()?;
        Ok(tenant)
    }

    /// Grant (or replace) a user's access level on a board.
    pub fn grant_board_permission(
        &self,
        board_id: i64,
        user: &str,
        permission: Permission,
    ) -> Result<()> {
        self.get_board(board_id)?;
        self.conn.execute(
            "INSERT INTO board_permissions (board_id, user_name, permission)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(board_id, user_name) DO UPDATE SET permission = excluded.permission",
            params![board_id, user, permission],
        )?;
        Ok(())
    }

    /// Whether a user holds at least the required access level on a board.
    /// Users with no grant hold nothing.
    pub fn check_board_permission(
        &self,
        board_id: i64,
        user: &str,
        required: Permission,
    ) -> Result<bool> {
        let held: Option<Permission> = self
            .conn
            .query_row(
                "SELECT permission FROM board_permissions WHERE board_id = ? AND user_name = ?",
                params![board_id, user],
                |row| row.get(0),
            )
            .optional()?;
        Ok(held.is_some_and(|p| p >= required))
    }

    pub fn create_template(&self, name: &str) -> Result<BoardTemplate> {
        let template = self.conn.query_row(
            &format!("INSERT INTO board_templates (name) VALUES (?) RETURNING {TEMPLATE_COLS}"),
            params![name],
            map_template,
        )?;
        Ok(template)
    }

    /// Bump a template's usage counter, returning the new count.
    pub fn increment_template_usage(&self, template_id: i64) -> Result<i64> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "UPDATE board_templates SET usage_count = usage_count + 1
                 WHERE id = ? RETURNING usage_count",
                params![template_id],
                |row| row.get(0),
            )
            .optional()?;
        count.ok_or(StoreError::not_found("template", template_id))
    }
}
