//! Widget repository: the `widgets` table, keyed for writes by
//! `content_reference`.

use holiday_core::{Widget, WidgetUpsert};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::{now_rfc3339, DbError};

const WIDGET_COLUMNS: &str =
    "id, name, content_reference, deletable, enabled, created_at, updated_at";

pub struct WidgetRepository<'a> {
    conn: &'a Connection,
}

impl<'a> WidgetRepository<'a> {
    /// Works on a plain connection or on an open transaction.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_content_reference(
        &self,
        content_reference: &str,
    ) -> Result<Option<Widget>, DbError> {
        let sql = format!("SELECT {WIDGET_COLUMNS} FROM widgets WHERE content_reference = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![content_reference], scan_widget)
            .optional()?)
    }

    pub fn get(&self, id: &str) -> Result<Widget, DbError> {
        let sql = format!("SELECT {WIDGET_COLUMNS} FROM widgets WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], scan_widget)
            .optional()?
            .ok_or(DbError::WidgetNotFound)
    }

    /// Inserts the widget, or updates name/flags of the row that already
    /// owns the content reference. A single statement, so two writers can
    /// never both insert. The existing id and created_at are kept.
    pub fn upsert(&self, widget: &WidgetUpsert) -> Result<Widget, DbError> {
        if widget.content_reference.trim().is_empty() {
            return Err(DbError::Validation(
                "content_reference: content reference is required".into(),
            ));
        }
        if widget.name.trim().is_empty() {
            return Err(DbError::Validation("name: widget name is required".into()));
        }

        let now = now_rfc3339();
        self.conn.execute(
            "INSERT INTO widgets (
                id, name, content_reference, deletable, enabled, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(content_reference) DO UPDATE SET
                name = excluded.name,
                deletable = excluded.deletable,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                widget.name,
                widget.content_reference,
                widget.deletable,
                widget.enabled,
                now,
            ],
        )?;

        self.find_by_content_reference(&widget.content_reference)?
            .ok_or(DbError::WidgetNotFound)
    }

    pub fn list(&self) -> Result<Vec<Widget>, DbError> {
        let sql = format!("SELECT {WIDGET_COLUMNS} FROM widgets ORDER BY content_reference");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], scan_widget)?;
        let mut widgets = Vec::new();
        for row in rows {
            widgets.push(row?);
        }
        Ok(widgets)
    }

    /// Removes the widget row. Its placements go with it through the
    /// cascading foreign key.
    pub fn delete(&self, id: &str) -> Result<(), DbError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM widgets WHERE id = ?1", params![id])?;
        if rows_affected == 0 {
            return Err(DbError::WidgetNotFound);
        }
        Ok(())
    }
}

fn scan_widget(row: &rusqlite::Row) -> rusqlite::Result<Widget> {
    Ok(Widget {
        id: row.get(0)?,
        name: row.get(1)?,
        content_reference: row.get(2)?,
        deletable: row.get(3)?,
        enabled: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
