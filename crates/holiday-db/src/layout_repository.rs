//! Page layouts and the surfaces (layout zones) widgets are placed on.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::{is_unique_constraint_error, DbError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLayout {
    pub id: i64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Surface {
    pub id: String,
    pub name: String,
}

pub struct LayoutRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LayoutRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn page_exists(&self, page_id: i64) -> Result<bool, DbError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM page_layouts WHERE id = ?1",
                params![page_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_page(&self, page_id: i64) -> Result<PageLayout, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, url FROM page_layouts WHERE id = ?1",
                params![page_id],
                |row| {
                    Ok(PageLayout {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        url: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(DbError::PageNotFound)
    }

    /// Inserts a page layout and returns its assigned id.
    pub fn create_page(&self, name: &str, url: &str) -> Result<PageLayout, DbError> {
        if name.trim().is_empty() {
            return Err(DbError::Validation("name: page name is required".into()));
        }
        self.conn.execute(
            "INSERT INTO page_layouts (name, url) VALUES (?1, ?2)",
            params![name, url],
        )?;
        Ok(PageLayout {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            url: url.to_string(),
        })
    }

    pub fn list_surfaces(&self) -> Result<Vec<Surface>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM surfaces ORDER BY sort_order, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Surface {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut surfaces = Vec::new();
        for row in rows {
            surfaces.push(row?);
        }
        Ok(surfaces)
    }

    pub fn surface_exists(&self, surface_id: &str) -> Result<bool, DbError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM surfaces WHERE id = ?1",
                params![surface_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Adds a surface after the existing ones.
    pub fn create_surface(&self, id: &str, name: &str) -> Result<Surface, DbError> {
        if id.trim().is_empty() {
            return Err(DbError::Validation("id: surface id is required".into()));
        }
        let result = self.conn.execute(
            "INSERT INTO surfaces (id, name, sort_order)
             VALUES (?1, ?2, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM surfaces))",
            params![id, name],
        );
        match result {
            Ok(_) => Ok(Surface {
                id: id.to_string(),
                name: name.to_string(),
            }),
            Err(err) if is_unique_constraint_error(&err) => Err(DbError::Validation(format!(
                "surface {id} already exists"
            ))),
            Err(err) => Err(DbError::Sqlite(err)),
        }
    }
}
