//! LanceDB connection and housekeeping helpers.

use lancedb::{connect, Connection};
use std::sync::Arc;

use semdex_core::error::{Error, Result};

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(Error::cache)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(Error::cache)?;
    Ok(names.iter().any(|n| n == name))
}

/// Create an empty table with `schema` unless one named `name` exists.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    match conn.create_empty_table(name, schema).execute().await {
        Ok(_) => Ok(()),
        // Another process may have created it between the check and the create.
        Err(_) if table_exists(conn, name).await? => Ok(()),
        Err(e) => Err(Error::cache(e)),
    }
}

/// SQL string literal with single quotes doubled.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
