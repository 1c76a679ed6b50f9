use std::collections::BTreeSet;

use accel_common::err::AccelError;
use accel_connection::Session;

/// One row of `information_schema.COLUMNS`, ordered by `ORDINAL_POSITION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn is_blob(&self) -> bool {
        self.data_type.to_ascii_lowercase().contains("blob")
    }

    pub fn is_text(&self) -> bool {
        self.data_type.to_ascii_lowercase().contains("text")
    }
}

/// Export-side SELECT-list expressions for a table, plus whether the
/// table requires paging because it carries a BLOB/TEXT column.
pub struct ExportExpressions {
    pub expressions: Vec<String>,
    pub paging_required: bool,
}

/// Import-side column placeholder list and `SET` clause for `LOAD DATA`.
pub struct ImportExpressions {
    pub columns: Vec<String>,
    pub set_clauses: Vec<String>,
}

/// Queries `information_schema` for table lists, column types, keys and
/// row counts. Stateless apart from the session it borrows.
pub struct MetadataProbe<'a> {
    session: &'a mut Session,
    database: String,
}

impl<'a> MetadataProbe<'a> {
    pub fn new(session: &'a mut Session, database: impl Into<String>) -> Self {
        MetadataProbe {
            session,
            database: database.into(),
        }
    }

    pub fn list_base_tables(
        &mut self,
        filter: Option<&BTreeSet<String>>,
    ) -> Result<Vec<String>, AccelError> {
        let sql = format!(
            "SELECT TABLE_NAME FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME",
            escape_literal(&self.database)
        );
        let rows: Vec<String> = self.session.query(&sql)?;
        Ok(match filter {
            Some(allow) => rows.into_iter().filter(|t| allow.contains(t)).collect(),
            None => rows,
        })
    }

    pub fn get_row_count(&mut self, table: &str) -> Result<u64, AccelError> {
        let sql = format!("SELECT COUNT(*) FROM `{table}`");
        let count: Option<u64> = self.session.query_first(&sql)?;
        Ok(count.unwrap_or(0))
    }

    pub fn get_column_types(&mut self, table: &str) -> Result<Vec<ColumnInfo>, AccelError> {
        let sql = format!(
            "SELECT COLUMN_NAME, DATA_TYPE FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}' \
             ORDER BY ORDINAL_POSITION",
            escape_literal(&self.database),
            escape_literal(table)
        );
        let rows: Vec<(String, String)> = self.session.query(&sql)?;
        Ok(rows
            .into_iter()
            .map(|(name, data_type)| ColumnInfo { name, data_type })
            .collect())
    }

    /// Primary key columns if one exists, else the first unique key's
    /// columns, else empty.
    pub fn get_primary_or_unique_keys(&mut self, table: &str) -> Result<Vec<String>, AccelError> {
        let sql = format!(
            "SELECT COLUMN_NAME, INDEX_NAME, NON_UNIQUE FROM information_schema.STATISTICS \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}' \
             ORDER BY INDEX_NAME = 'PRIMARY' DESC, INDEX_NAME, SEQ_IN_INDEX",
            escape_literal(&self.database),
            escape_literal(table)
        );
        let rows: Vec<(String, String, i64)> = self.session.query(&sql)?;

        if let Some(primary) = collect_index(&rows, "PRIMARY") {
            return Ok(primary);
        }

        let first_unique = rows
            .iter()
            .find(|(_, _, non_unique)| *non_unique == 0)
            .map(|(_, name, _)| name.clone());

        Ok(match first_unique {
            Some(name) => collect_index(&rows, &name).unwrap_or_default(),
            None => Vec::new(),
        })
    }
}

fn collect_index(rows: &[(String, String, i64)], index_name: &str) -> Option<Vec<String>> {
    let cols: Vec<String> = rows
        .iter()
        .filter(|(_, name, _)| name == index_name)
        .map(|(col, _, _)| col.clone())
        .collect();
    if cols.is_empty() {
        None
    } else {
        Some(cols)
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// `\`col\`` for ordinary columns, `HEX(\`col\`)` for BLOBs; `paging_required`
/// is true iff any column is BLOB or TEXT.
pub fn derive_export_expressions(cols: &[ColumnInfo]) -> ExportExpressions {
    let expressions = cols
        .iter()
        .map(|c| {
            if c.is_blob() {
                format!("HEX(`{}`)", c.name)
            } else {
                format!("`{}`", c.name)
            }
        })
        .collect();

    let paging_required = cols.iter().any(|c| c.is_blob() || c.is_text());

    ExportExpressions {
        expressions,
        paging_required,
    }
}

/// BLOB columns bind to `@col` user variables with a `SET col=UNHEX(@col)`
/// clause; everything else binds straight to its column name.
pub fn derive_import_expressions(cols: &[ColumnInfo]) -> ImportExpressions {
    let mut columns = Vec::with_capacity(cols.len());
    let mut set_clauses = Vec::new();

    for c in cols {
        if c.is_blob() {
            columns.push(format!("@{}", c.name));
            set_clauses.push(format!("{0}=UNHEX(@{0})", c.name));
        } else {
            columns.push(format!("`{}`", c.name));
        }
    }

    ImportExpressions {
        columns,
        set_clauses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, data_type: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
        }
    }

    #[test]
    fn export_expressions_hexify_blobs_and_flag_paging() {
        let cols = vec![col("id", "int"), col("payload", "longblob")];
        let out = derive_export_expressions(&cols);
        assert_eq!(out.expressions, vec!["`id`", "HEX(`payload`)"]);
        assert!(out.paging_required);
    }

    #[test]
    fn export_expressions_text_column_flags_paging_without_hex() {
        let cols = vec![col("notes", "text")];
        let out = derive_export_expressions(&cols);
        assert_eq!(out.expressions, vec!["`notes`"]);
        assert!(out.paging_required);
    }

    #[test]
    fn import_expressions_bind_blobs_through_unhex() {
        let cols = vec![col("id", "int"), col("payload", "blob")];
        let out = derive_import_expressions(&cols);
        assert_eq!(out.columns, vec!["`id`", "@payload"]);
        assert_eq!(out.set_clauses, vec!["payload=UNHEX(@payload)"]);
    }
}
