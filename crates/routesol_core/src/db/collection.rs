//! JSON document collections on top of the `documents` table.
//!
//! # Responsibility
//! - Expose document-store style operations (`insert_one`, `find_one`, `find`,
//!   `set_field`, `delete_one`, `delete_many`, `count`) for one collection.
//! - Keep SQL and JSON encoding details out of repositories.
//!
//! # Invariants
//! - Every statement is scoped to one `(namespace, collection)` pair.
//! - Document keys keep their SQLite storage class: `Int(1)` and `Text("1")`
//!   address different documents.
//! - `set_field` touches exactly one top-level field of exactly one document.

use super::{DbError, DbResult};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Primary key of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocKey {
    Int(i64),
    Text(String),
}

impl Display for DocKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl ToSql for DocKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Int(value) => ToSqlOutput::from(*value),
            Self::Text(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

/// Handle to one named collection inside a namespace.
pub struct Collection<'conn> {
    conn: &'conn Connection,
    namespace: String,
    name: String,
}

impl<'conn> Collection<'conn> {
    pub fn new(conn: &'conn Connection, namespace: &str, name: &str) -> Self {
        Self {
            conn,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Inserts a new document; a duplicate key fails with a unique violation.
    pub fn insert_one(&self, key: &DocKey, body: &Value) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO documents (namespace, collection, doc_id, body)
             VALUES (?1, ?2, ?3, ?4);",
            params![self.namespace, self.name, key, body.to_string()],
        )?;
        Ok(())
    }

    /// Returns the document stored under `key`, if any.
    pub fn find_one(&self, key: &DocKey) -> DbResult<Option<Value>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents
                 WHERE namespace = ?1 AND collection = ?2 AND doc_id = ?3;",
                params![self.namespace, self.name, key],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|text| parse_body(&text)).transpose()
    }

    /// Returns the first document whose top-level text `field` equals `value`.
    pub fn find_one_by_field(&self, field: &str, value: &str) -> DbResult<Option<(DocKey, Value)>> {
        let mut stmt = self.conn.prepare(
            "SELECT doc_id, body FROM documents
             WHERE namespace = ?1 AND collection = ?2 AND json_extract(body, ?3) = ?4
             ORDER BY rowid
             LIMIT 1;",
        )?;
        let mut rows = stmt.query(params![self.namespace, self.name, field_path(field), value])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_document_row(row)?)),
            None => Ok(None),
        }
    }

    /// Returns every document in insertion order.
    pub fn find(&self) -> DbResult<Vec<(DocKey, Value)>> {
        let mut stmt = self.conn.prepare(
            "SELECT doc_id, body FROM documents
             WHERE namespace = ?1 AND collection = ?2
             ORDER BY rowid;",
        )?;
        let mut rows = stmt.query(params![self.namespace, self.name])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }
        Ok(documents)
    }

    /// Sets one top-level field of the document under `key`, leaving the
    /// rest of the document untouched. Returns the matched document count.
    pub fn set_field(&self, key: &DocKey, field: &str, value: &Value) -> DbResult<usize> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET
                body = json_set(body, ?1, json(?2)),
                updated_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
             WHERE namespace = ?3 AND collection = ?4 AND doc_id = ?5;",
            params![
                field_path(field),
                value.to_string(),
                self.namespace,
                self.name,
                key
            ],
        )?;
        Ok(changed)
    }

    /// Deletes the document under `key`. Returns 0 or 1.
    pub fn delete_one(&self, key: &DocKey) -> DbResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM documents
             WHERE namespace = ?1 AND collection = ?2 AND doc_id = ?3;",
            params![self.namespace, self.name, key],
        )?;
        Ok(deleted)
    }

    /// Deletes every document in the collection.
    pub fn delete_many(&self) -> DbResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM documents WHERE namespace = ?1 AND collection = ?2;",
            params![self.namespace, self.name],
        )?;
        Ok(deleted)
    }

    pub fn count(&self) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE namespace = ?1 AND collection = ?2;",
            params![self.namespace, self.name],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

fn field_path(field: &str) -> String {
    format!("$.{field}")
}

fn parse_body(text: &str) -> DbResult<Value> {
    serde_json::from_str(text).map_err(|err| DbError::InvalidDocument(err.to_string()))
}

fn parse_document_row(row: &Row<'_>) -> DbResult<(DocKey, Value)> {
    let key = match row.get_ref("doc_id")? {
        ValueRef::Integer(value) => DocKey::Int(value),
        ValueRef::Text(bytes) => DocKey::Text(
            String::from_utf8(bytes.to_vec())
                .map_err(|err| DbError::InvalidDocument(format!("doc_id is not UTF-8: {err}")))?,
        ),
        other => {
            return Err(DbError::InvalidDocument(format!(
                "unsupported doc_id storage class {:?}",
                other.data_type()
            )));
        }
    };
    let body: String = row.get("body")?;
    Ok((key, parse_body(&body)?))
}

#[cfg(test)]
mod tests {
    use super::{Collection, DocKey};
    use crate::db::open_db_in_memory;
    use serde_json::json;

    #[test]
    fn integer_and_text_keys_do_not_collide() {
        let conn = open_db_in_memory().unwrap();
        let collection = Collection::new(&conn, "ns", "Things");

        collection
            .insert_one(&DocKey::Int(1), &json!({"kind": "int"}))
            .unwrap();
        collection
            .insert_one(&DocKey::Text("1".to_string()), &json!({"kind": "text"}))
            .unwrap();

        let int_doc = collection.find_one(&DocKey::Int(1)).unwrap().unwrap();
        let text_doc = collection
            .find_one(&DocKey::Text("1".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(int_doc["kind"], "int");
        assert_eq!(text_doc["kind"], "text");
        assert_eq!(collection.count().unwrap(), 2);
    }

    #[test]
    fn set_field_only_touches_named_field() {
        let conn = open_db_in_memory().unwrap();
        let collection = Collection::new(&conn, "ns", "Things");
        collection
            .insert_one(&DocKey::Int(7), &json!({"a": 1, "b": "two"}))
            .unwrap();

        let matched = collection
            .set_field(&DocKey::Int(7), "c", &json!({"nested": true}))
            .unwrap();
        assert_eq!(matched, 1);

        let doc = collection.find_one(&DocKey::Int(7)).unwrap().unwrap();
        assert_eq!(doc, json!({"a": 1, "b": "two", "c": {"nested": true}}));
    }

    #[test]
    fn collections_and_namespaces_are_isolated() {
        let conn = open_db_in_memory().unwrap();
        let first = Collection::new(&conn, "ns", "Things");
        let second = Collection::new(&conn, "ns", "Others");
        let other_ns = Collection::new(&conn, "other", "Things");

        first.insert_one(&DocKey::Int(1), &json!({})).unwrap();
        second.insert_one(&DocKey::Int(1), &json!({})).unwrap();
        other_ns.insert_one(&DocKey::Int(1), &json!({})).unwrap();

        assert_eq!(first.delete_many().unwrap(), 1);
        assert_eq!(second.count().unwrap(), 1);
        assert_eq!(other_ns.count().unwrap(), 1);
    }

    #[test]
    fn find_one_by_field_matches_text_values() {
        let conn = open_db_in_memory().unwrap();
        let collection = Collection::new(&conn, "ns", "Users");
        collection
            .insert_one(
                &DocKey::Text("u-1".to_string()),
                &json!({"username": "alice"}),
            )
            .unwrap();

        let (key, doc) = collection
            .find_one_by_field("username", "alice")
            .unwrap()
            .unwrap();
        assert_eq!(key, DocKey::Text("u-1".to_string()));
        assert_eq!(doc["username"], "alice");
        assert!(collection
            .find_one_by_field("username", "Alice")
            .unwrap()
            .is_none());
    }
}
