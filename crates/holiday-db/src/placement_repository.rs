//! Placement repository: widget slots on page-layout surfaces.

use holiday_core::{NewPlacement, Placement};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::{now_rfc3339, DbError};

const PLACEMENT_COLUMNS: &str =
    "id, widget_id, page_id, surface_id, order_index, visible, created_at";

pub struct PlacementRepository<'a> {
    conn: &'a Connection,
}

impl<'a> PlacementRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Highest order_index on (page, surface); `None` on an empty surface.
    pub fn max_order_index(&self, page_id: i64, surface_id: &str) -> Result<Option<i64>, DbError> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(order_index) FROM placements WHERE page_id = ?1 AND surface_id = ?2",
            params![page_id, surface_id],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    /// The widget's placement on (page, surface), if it has one.
    pub fn find_for_slot(
        &self,
        widget_id: &str,
        page_id: i64,
        surface_id: &str,
    ) -> Result<Option<Placement>, DbError> {
        let sql = format!(
            "SELECT {PLACEMENT_COLUMNS} FROM placements
             WHERE widget_id = ?1 AND page_id = ?2 AND surface_id = ?3
             ORDER BY order_index LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![widget_id, page_id, surface_id], scan_placement)
            .optional()?)
    }

    pub fn get(&self, id: &str) -> Result<Placement, DbError> {
        let sql = format!("SELECT {PLACEMENT_COLUMNS} FROM placements WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], scan_placement)
            .optional()?
            .ok_or(DbError::PlacementNotFound)
    }

    pub fn create(&self, placement: &NewPlacement) -> Result<Placement, DbError> {
        if placement.order_index < 1 {
            return Err(DbError::Validation(format!(
                "order_index: must be >= 1, got {}",
                placement.order_index
            )));
        }

        let created = Placement {
            id: Uuid::new_v4().to_string(),
            widget_id: placement.widget_id.clone(),
            page_id: placement.page_id,
            surface_id: placement.surface_id.clone(),
            order_index: placement.order_index,
            visible: placement.visible,
            created_at: now_rfc3339(),
        };

        self.conn.execute(
            "INSERT INTO placements (
                id, widget_id, page_id, surface_id, order_index, visible, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                created.id,
                created.widget_id,
                created.page_id,
                created.surface_id,
                created.order_index,
                created.visible,
                created.created_at,
            ],
        )?;
        Ok(created)
    }

    pub fn list_by_widget(&self, widget_id: &str) -> Result<Vec<Placement>, DbError> {
        let sql = format!(
            "SELECT {PLACEMENT_COLUMNS} FROM placements WHERE widget_id = ?1
             ORDER BY page_id, surface_id, order_index"
        );
        self.collect(&sql, params![widget_id])
    }

    /// Every placement on (page, surface) in display order.
    pub fn list_by_surface(&self, page_id: i64, surface_id: &str) -> Result<Vec<Placement>, DbError> {
        let sql = format!(
            "SELECT {PLACEMENT_COLUMNS} FROM placements WHERE page_id = ?1 AND surface_id = ?2
             ORDER BY order_index"
        );
        self.collect(&sql, params![page_id, surface_id])
    }

    /// Returns the number of rows removed.
    pub fn delete_by_widget(&self, widget_id: &str) -> Result<usize, DbError> {
        Ok(self
            .conn
            .execute("DELETE FROM placements WHERE widget_id = ?1", params![widget_id])?)
    }

    fn collect(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Placement>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, scan_placement)?;
        let mut placements = Vec::new();
        for row in rows {
            placements.push(row?);
        }
        Ok(placements)
    }
}

fn scan_placement(row: &rusqlite::Row) -> rusqlite::Result<Placement> {
    Ok(Placement {
        id: row.get(0)?,
        widget_id: row.get(1)?,
        page_id: row.get(2)?,
        surface_id: row.get(3)?,
        order_index: row.get(4)?,
        visible: row.get(5)?,
        created_at: row.get(6)?,
    })
}
