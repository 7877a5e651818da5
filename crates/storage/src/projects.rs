// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project queries.

use crate::StoreError;
use ccdash_core::{Project, ProjectId};
use rusqlite::{params, Connection, Row};

fn from_row(row: &Row<'_>) -> Result<Project, rusqlite::Error> {
    Ok(Project {
        id: ProjectId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        path: row.get(2)?,
    })
}

/// Insert a project if its path is new. Existing rows are left untouched.
pub fn upsert(conn: &Connection, project: &Project) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO projects (id, name, path) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO NOTHING",
        params![project.id.as_str(), project.name, project.path],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &ProjectId) -> Result<Project, StoreError> {
    let project = conn.query_row(
        "SELECT id, name, path FROM projects WHERE id = ?1",
        params![id.as_str()],
        from_row,
    )?;
    Ok(project)
}

pub fn get_by_name(conn: &Connection, name: &str) -> Result<Project, StoreError> {
    let project = conn.query_row(
        "SELECT id, name, path FROM projects WHERE name = ?1 ORDER BY path LIMIT 1",
        params![name],
        from_row,
    )?;
    Ok(project)
}

pub fn list(conn: &Connection) -> Result<Vec<Project>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name, path FROM projects ORDER BY name")?;
    let rows = stmt.query_map([], from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "projects_tests.rs"]
mod tests;
