//! Dynamic tables produced by the pipeline.
//!
//! Every write replaces the table: drop, create with inferred column types,
//! insert, all inside one transaction.

use crate::pipeline::Table;
use anyhow::{Context, Result};
use sea_orm::sea_query::{Alias, ColumnDef, Query, Table as SqlTable};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, Statement, TransactionTrait, Value as SqlValue,
};
use serde_json::Value;
use tracing::{debug, warn};

// SQLite caps bound parameters per statement; 100 rows of ~20 columns stays
// well under the limit.
const INSERT_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ColumnKind {
    Integer,
    Real,
    Text,
}

fn kind_of(value: &Value) -> Option<ColumnKind> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(ColumnKind::Integer),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(ColumnKind::Integer),
        Value::Number(_) => Some(ColumnKind::Real),
        Value::String(_) | Value::Array(_) | Value::Object(_) => Some(ColumnKind::Text),
    }
}

/// Widest kind seen in the column; all-null columns are TEXT.
fn infer_kinds(table: &Table) -> Vec<ColumnKind> {
    (0..table.columns.len())
        .map(|idx| {
            table
                .rows
                .iter()
                .filter_map(|row| kind_of(&row[idx]))
                .max()
                .unwrap_or(ColumnKind::Text)
        })
        .collect()
}

fn sql_value(value: &Value, kind: ColumnKind) -> SqlValue {
    match kind {
        ColumnKind::Integer => {
            let v: Option<i64> = match value {
                Value::Bool(b) => Some(i64::from(*b)),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            v.into()
        }
        ColumnKind::Real => value.as_f64().into(),
        ColumnKind::Text => {
            let v: Option<String> = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
            v.into()
        }
    }
}

fn check_identifier(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!("Invalid table name: {name:?}");
    }
    Ok(())
}

pub struct TableRepository {
    conn: DatabaseConnection,
}

impl TableRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn backend(&self) -> DbBackend {
        self.conn.get_database_backend()
    }

    /// Overwrites `name` with the contents of `table`. Returns the number of
    /// rows written.
    pub async fn replace(&self, name: &str, table: &Table) -> Result<usize> {
        check_identifier(name)?;
        let backend = self.backend();
        let ident = Alias::new(name);
        let kinds = infer_kinds(table);

        let txn = self.conn.begin().await?;

        let drop = SqlTable::drop().table(ident.clone()).if_exists().to_owned();
        txn.execute(backend.build(&drop)).await?;

        if table.columns.is_empty() {
            warn!(table = name, "No columns to write; table dropped");
            txn.commit().await?;
            return Ok(0);
        }

        let mut create = SqlTable::create();
        create.table(ident.clone());
        for (column, kind) in table.columns.iter().zip(&kinds) {
            let mut def = ColumnDef::new(Alias::new(column));
            match kind {
                ColumnKind::Integer => def.big_integer(),
                ColumnKind::Real => def.double(),
                ColumnKind::Text => def.text(),
            };
            create.col(&mut def);
        }
        txn.execute(backend.build(&create)).await?;

        for chunk in table.rows.chunks(INSERT_BATCH) {
            let mut insert = Query::insert();
            insert
                .into_table(ident.clone())
                .columns(table.columns.iter().map(Alias::new));
            for row in chunk {
                insert
                    .values(
                        row.iter()
                            .zip(&kinds)
                            .map(|(value, kind)| sql_value(value, *kind).into()),
                    )
                    .map_err(|e| anyhow::anyhow!("Failed to build insert for {name}: {e:?}"))?;
            }
            txn.execute(backend.build(&insert)).await?;
        }

        txn.commit()
            .await
            .with_context(|| format!("Failed to commit table {name}"))?;

        debug!(table = name, rows = table.row_count(), "Table replaced");
        Ok(table.row_count())
    }

    /// Materializes `sql` as table `name`, replacing any previous contents.
    pub async fn create_as(&self, name: &str, sql: &str) -> Result<u64> {
        check_identifier(name)?;

        let txn = self.conn.begin().await?;
        txn.execute_unprepared(&format!("DROP TABLE IF EXISTS \"{name}\""))
            .await?;
        txn.execute_unprepared(&format!("CREATE TABLE \"{name}\" AS {sql}"))
            .await
            .with_context(|| format!("Aggregation {name} failed"))?;
        txn.commit().await?;

        self.count(name).await
    }

    pub async fn count(&self, name: &str) -> Result<u64> {
        check_identifier(name)?;

        let row = self
            .conn
            .query_one(Statement::from_string(
                self.backend(),
                format!("SELECT COUNT(*) AS n FROM \"{name}\""),
            ))
            .await?
            .with_context(|| format!("COUNT on {name} returned nothing"))?;

        let n: i64 = row.try_get("", "n")?;
        Ok(u64::try_from(n).unwrap_or_default())
    }

    /// The given columns of every row in `name`, as JSON objects in insertion
    /// order.
    pub async fn fetch_json(&self, name: &str, columns: &[&str]) -> Result<Vec<Value>> {
        check_identifier(name)?;
        for column in columns {
            check_identifier(column)?;
        }

        let select = columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = self
            .conn
            .query_all(Statement::from_string(
                self.backend(),
                format!("SELECT {select} FROM \"{name}\" ORDER BY rowid"),
            ))
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut object = serde_json::Map::new();
            for &column in columns {
                let value = row
                    .try_get::<Option<i64>>("", column)
                    .map(Value::from)
                    .or_else(|_| row.try_get::<Option<f64>>("", column).map(Value::from))
                    .or_else(|_| row.try_get::<Option<String>>("", column).map(Value::from))
                    .unwrap_or(Value::Null);
                object.insert(column.to_string(), value);
            }
            out.push(Value::Object(object));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_kinds_widens() {
        let table = Table {
            columns: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            rows: vec![
                vec![json!(1), json!(1), json!(null), json!([1])],
                vec![json!(2), json!(1.5), json!(null), json!(null)],
            ],
        };
        assert_eq!(
            infer_kinds(&table),
            vec![
                ColumnKind::Integer,
                ColumnKind::Real,
                ColumnKind::Text,
                ColumnKind::Text
            ]
        );
    }

    #[test]
    fn test_sql_value_serializes_nested_json() {
        let value = sql_value(&json!({"a": [1, 2]}), ColumnKind::Text);
        assert_eq!(value, SqlValue::from(Some(r#"{"a":[1,2]}"#.to_string())));
    }

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("anilist_fact_anime").is_ok());
        assert!(check_identifier("x; DROP TABLE y").is_err());
        assert!(check_identifier("").is_err());
    }
}
