//! Row tuples for multi-row `INSERT OR REPLACE` statements
//!
//! A tuple is the SQL text of one `VALUES (...)` row plus its positional
//! parameters. In coalesce mode, a column whose incoming value is unknown is
//! emitted as a same-table lookup, `(SELECT col FROM Table WHERE uri = ?)`,
//! so the stored value survives the replace (or becomes NULL for a new row).

use super::WriteMode;
use crate::db::schema;
use crate::db::transaction::{SqlParam, SqlTransaction};
use crate::media::{Artist, MediaImage};
use serde_json::json;

/// Upper bound on rows per statement, well below SQLite's variable limit
pub(crate) const MAX_ROWS_PER_STATEMENT: usize = 200;

#[derive(Debug, Clone)]
pub(crate) struct Tuple {
    sql: String,
    params: Vec<SqlParam>,
}

/// Builds one tuple column by column, in schema column order
pub(crate) struct TupleBuilder<'a> {
    table: &'static str,
    uri: &'a str,
    mode: WriteMode,
    parts: Vec<String>,
    params: Vec<SqlParam>,
}

impl<'a> TupleBuilder<'a> {
    /// Tuple for a row of `table` keyed by `uri`
    pub(crate) fn new(table: &'static str, uri: &'a str, mode: WriteMode) -> Self {
        Self {
            table,
            uri,
            mode,
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Tuple for a join or state row; nothing is ever coalesced
    pub(crate) fn literal(table: &'static str) -> Self {
        Self::new(table, "", WriteMode::Full)
    }

    /// Column always written from the record
    pub(crate) fn param(mut self, value: impl Into<SqlParam>) -> Self {
        self.parts.push("?".to_string());
        self.params.push(value.into());
        self
    }

    /// Column written from the record, or kept when unknown in coalesce mode
    pub(crate) fn maybe_coalesce(self, column: &str, value: SqlParam) -> Self {
        if self.mode == WriteMode::Coalesce && value.is_null() {
            self.coalesce(column)
        } else {
            self.param(value)
        }
    }

    /// Column always kept from the stored row
    pub(crate) fn coalesce(mut self, column: &str) -> Self {
        self.parts
            .push(format!("(SELECT {} FROM {} WHERE uri = ?)", column, self.table));
        self.params.push(SqlParam::Text(self.uri.to_string()));
        self
    }

    pub(crate) fn now(mut self) -> Self {
        self.parts.push("CURRENT_TIMESTAMP".to_string());
        self
    }

    pub(crate) fn build(self) -> Tuple {
        Tuple {
            sql: format!("({})", self.parts.join(", ")),
            params: self.params,
        }
    }
}

/// Pending rows for one table, grouped by write mode
///
/// Full and coalesce rows have different placeholder shapes, so they go
/// into separate statements; full rows are written first.
#[derive(Debug)]
pub(crate) struct TupleSet {
    table: &'static str,
    columns: &'static [&'static str],
    full: Vec<Tuple>,
    coalesce: Vec<Tuple>,
}

impl TupleSet {
    pub(crate) fn new(table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            table,
            columns,
            full: Vec::new(),
            coalesce: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, mode: WriteMode, tuple: Tuple) {
        match mode {
            WriteMode::Full => self.full.push(tuple),
            WriteMode::Coalesce => self.coalesce.push(tuple),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.full.is_empty() && self.coalesce.is_empty()
    }

    pub(crate) fn apply(self, tx: &mut SqlTransaction) {
        let table = self.table;
        let columns = self.columns.join(", ");
        for tuples in [self.full, self.coalesce] {
            for chunk in tuples.chunks(MAX_ROWS_PER_STATEMENT) {
                let values: Vec<&str> = chunk.iter().map(|t| t.sql.as_str()).collect();
                let params: Vec<SqlParam> =
                    chunk.iter().flat_map(|t| t.params.iter().cloned()).collect();
                tx.add_sql(
                    format!(
                        "INSERT OR REPLACE INTO {} ({}) VALUES {}",
                        table,
                        columns,
                        values.join(", ")
                    ),
                    params,
                );
            }
        }
    }
}

/// Artist references embedded in track/collection rows, NULL when there are none
pub(crate) fn artists_json(artists: &[Artist]) -> SqlParam {
    if artists.is_empty() {
        return SqlParam::Null;
    }
    let entries: Vec<serde_json::Value> = artists
        .iter()
        .map(|artist| {
            json!({
                "type": artist.kind,
                "uri": artist.uri,
                "provider": artist.provider,
                "name": artist.name,
            })
        })
        .collect();
    SqlParam::Text(serde_json::Value::Array(entries).to_string())
}

/// Images column; `None` is unknown, `Some(vec![])` is a known empty list
pub(crate) fn images_json(images: &Option<Vec<MediaImage>>) -> SqlParam {
    match images {
        None => SqlParam::Null,
        Some(images) => match serde_json::to_string(images) {
            Ok(encoded) => SqlParam::Text(encoded),
            Err(_) => SqlParam::Null,
        },
    }
}

/// Empty strings are stored as NULL
pub(crate) fn opt_text(value: &Option<String>) -> SqlParam {
    match value {
        Some(text) => SqlParam::text_or_null(text),
        None => SqlParam::Null,
    }
}

pub(crate) fn artist_set() -> TupleSet {
    TupleSet::new(schema::ARTIST, schema::ARTIST_COLUMNS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ImageSize;

    #[test]
    fn test_coalesce_substitutes_lookup_for_unknown_values() {
        let tuple = TupleBuilder::new(schema::TRACK, "t:1", WriteMode::Coalesce)
            .param("t:1")
            .maybe_coalesce("images", SqlParam::Null)
            .maybe_coalesce("duration", SqlParam::Real(3.0))
            .now()
            .build();

        assert_eq!(
            tuple.sql,
            "(?, (SELECT images FROM Track WHERE uri = ?), ?, CURRENT_TIMESTAMP)"
        );
        assert_eq!(
            tuple.params,
            vec![
                SqlParam::Text("t:1".into()),
                SqlParam::Text("t:1".into()),
                SqlParam::Real(3.0)
            ]
        );
    }

    #[test]
    fn test_full_mode_writes_null_literally() {
        let tuple = TupleBuilder::new(schema::TRACK, "t:1", WriteMode::Full)
            .maybe_coalesce("images", SqlParam::Null)
            .build();
        assert_eq!(tuple.sql, "(?)");
        assert_eq!(tuple.params, vec![SqlParam::Null]);
    }

    #[test]
    fn test_modes_split_into_separate_statements() {
        let mut set = TupleSet::new(schema::ARTIST, schema::ARTIST_COLUMNS);
        set.push(WriteMode::Full, TupleBuilder::literal(schema::ARTIST).param("a").build());
        set.push(WriteMode::Coalesce, TupleBuilder::literal(schema::ARTIST).param("b").build());
        set.push(WriteMode::Full, TupleBuilder::literal(schema::ARTIST).param("c").build());

        let mut tx = SqlTransaction::new();
        set.apply(&mut tx);
        assert_eq!(tx.len(), 2);
    }

    #[test]
    fn test_large_sets_are_chunked() {
        let mut set = TupleSet::new(schema::DB_STATE, schema::DB_STATE_COLUMNS);
        for i in 0..(MAX_ROWS_PER_STATEMENT + 1) {
            set.push(WriteMode::Full, TupleBuilder::literal(schema::DB_STATE).param(i).build());
        }
        let mut tx = SqlTransaction::new();
        set.apply(&mut tx);
        assert_eq!(tx.len(), 2);
    }

    #[test]
    fn test_images_json_distinguishes_unknown_from_empty() {
        assert_eq!(images_json(&None), SqlParam::Null);
        assert_eq!(images_json(&Some(vec![])), SqlParam::Text("[]".into()));
        let encoded = images_json(&Some(vec![MediaImage::new("http://img/1", ImageSize::Large)]));
        assert_eq!(
            encoded,
            SqlParam::Text(r#"[{"url":"http://img/1","size":"LARGE"}]"#.into())
        );
    }
}
