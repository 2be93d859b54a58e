//! Column/row view of flattened records plus the post-flatten normalizer.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Unit conversions applied by [`normalize`]: `(column, divisor)`.
///
/// `score` is already on the 1-10 scale; it is listed so every score column
/// goes through the same conversion.
const SCORE_SCALES: &[(&str, f64)] = &[("score", 1.0), ("average_score", 10.0), ("mean_score", 10.0)];

const NULLABLE_INT_COLUMNS: &[&str] = &["episodes", "season_year"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Builds a table from serializable records. Columns follow the field order
    /// of the first record; an empty slice gives a table without columns.
    pub fn from_records<T: Serialize>(records: &[T]) -> serde_json::Result<Self> {
        let mut table = Self::default();

        for record in records {
            let Value::Object(map) = serde_json::to_value(record)? else {
                continue;
            };
            if table.columns.is_empty() {
                table.columns = map.keys().cloned().collect();
            }
            let row = table
                .columns
                .iter()
                .map(|c| map.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            table.rows.push(row);
        }

        Ok(table)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The last `n` rows, without the given columns.
    #[must_use]
    pub fn tail_without(&self, n: usize, excluded: &[&str]) -> Self {
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !excluded.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();

        let start = self.rows.len().saturating_sub(n);

        Self {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self.rows[start..]
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    #[must_use]
    pub fn to_markdown(&self) -> String {
        fn cell(value: &Value) -> String {
            match value {
                Value::Null => String::new(),
                Value::String(s) => s.replace('|', "\\|"),
                other => other.to_string(),
            }
        }

        let mut out = format!("| {} |\n", self.columns.join(" | "));
        out.push_str(&format!(
            "|{}\n",
            self.columns.iter().map(|_| "---|").collect::<String>()
        ));
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(cell).collect();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        out
    }
}

/// `averageScore` -> `average_score`. A leading uppercase letter gets no
/// separator; names already in lowercase are unchanged.
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn scaled(value: &Value, divisor: f64) -> Value {
    value
        .as_f64()
        .and_then(|v| serde_json::Number::from_f64(v / divisor))
        .map_or(Value::Null, Value::Number)
}

#[allow(clippy::cast_possible_truncation)]
fn nullable_int(column: &str, value: &Value) -> Value {
    let coerced = match value {
        Value::Null => return Value::Null,
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    coerced.map_or_else(
        || {
            warn!(column, "Dropping non-integer value {} during normalize", value);
            Value::Null
        },
        Value::from,
    )
}

/// Renames columns to snake case, rescales score columns and coerces
/// nullable integer columns.
///
/// The rename is stable but the rescale is not: normalizing a batch twice
/// divides its scores twice. Call it exactly once per batch.
#[must_use]
pub fn normalize(mut table: Table) -> Table {
    table.columns = table.columns.iter().map(|c| to_snake_case(c)).collect();

    for &(column, divisor) in SCORE_SCALES {
        if let Some(idx) = table.column_index(column) {
            for row in &mut table.rows {
                row[idx] = scaled(&row[idx], divisor);
            }
        }
    }

    for &column in NULLABLE_INT_COLUMNS {
        if let Some(idx) = table.column_index(column) {
            for row in &mut table.rows {
                row[idx] = nullable_int(column, &row[idx]);
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(columns: &[&str], row: Vec<Value>) -> Table {
        Table {
            columns: columns.iter().map(ToString::to_string).collect(),
            rows: vec![row],
        }
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("averageScore"), "average_score");
        assert_eq!(to_snake_case("seasonYear"), "season_year");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("MediaListCollection"), "media_list_collection");
    }

    #[test]
    fn test_normalize_rescales_once_per_call() {
        let table = single(&["averageScore", "score"], vec![json!(50), json!(7)]);

        let once = normalize(table);
        assert_eq!(once.columns, vec!["average_score", "score"]);
        assert_eq!(once.rows[0][0], json!(5.0));
        assert_eq!(once.rows[0][1], json!(7.0));

        let twice = normalize(once);
        assert_eq!(twice.rows[0][0], json!(0.5));
    }

    #[test]
    fn test_normalize_keeps_null_scores() {
        let table = normalize(single(&["meanScore"], vec![Value::Null]));
        assert_eq!(table.rows[0][0], Value::Null);
    }

    #[test]
    fn test_normalize_coerces_nullable_ints() {
        let table = normalize(single(
            &["episodes", "seasonYear"],
            vec![json!(12.0), json!("2025")],
        ));
        assert_eq!(table.rows[0], vec![json!(12), json!(2025)]);

        let table = normalize(single(&["episodes"], vec![json!("twelve")]));
        assert_eq!(table.rows[0][0], Value::Null);
    }

    #[test]
    fn test_from_records_follows_field_order() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Row {
            id: i64,
            media_id: i64,
        }

        let table = Table::from_records(&[Row { id: 1, media_id: 2 }]).unwrap();
        assert_eq!(table.columns, vec!["id", "mediaId"]);
        assert_eq!(table.rows, vec![vec![json!(1), json!(2)]]);

        let empty = Table::from_records::<Row>(&[]).unwrap();
        assert!(empty.columns.is_empty());
    }

    #[test]
    fn test_tail_without_drops_bulky_columns() {
        let table = Table {
            columns: vec!["id".into(), "tags".into()],
            rows: (0..8).map(|i| vec![json!(i), json!([])]).collect(),
        };

        let preview = table.tail_without(5, &["tags"]);
        assert_eq!(preview.columns, vec!["id"]);
        assert_eq!(preview.rows.len(), 5);
        assert_eq!(preview.rows[0][0], json!(3));
        assert!(preview.to_markdown().starts_with("| id |"));
    }
}
