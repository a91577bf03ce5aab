//! Staging table lifecycle.
//!
//! Every run drops the staging table if it exists and creates it again from
//! the cached column mappings. The table is not dropped after the merge.

use tracing::debug;

use crate::core::identifier::quote_mssql;
use crate::core::schema::TableDescriptor;
use crate::core::traits::StoreConnection;
use crate::error::{BulkMergeError, Result};

/// Build the drop-if-exists and create batch for a staging table.
///
/// The identity column comes first, then one column per mapping in
/// declaration order.
pub fn build_prepare_sql<R>(descriptor: &TableDescriptor<R>) -> String {
    let qualified = descriptor.qualified_name();

    let mut col_defs = Vec::with_capacity(descriptor.columns().len() + 1);
    col_defs.push(format!(
        "{} INT IDENTITY(1,1) NOT NULL PRIMARY KEY",
        quote_mssql(descriptor.surrogate_key())
    ));
    for col in descriptor.columns() {
        let collate = match col.collation() {
            Some(collation) => format!(" COLLATE {}", collation),
            None => String::new(),
        };
        let null_clause = if col.is_nullable() { "NULL" } else { "NOT NULL" };
        col_defs.push(format!(
            "{} {}{} {}",
            quote_mssql(col.column_name()),
            col.sql_type().trim(),
            collate,
            null_clause
        ));
    }

    format!(
        "IF OBJECT_ID(N'{}', N'U') IS NOT NULL DROP TABLE {};\nCREATE TABLE {} (\n    {}\n);",
        descriptor.existence_check_name(),
        qualified,
        qualified,
        col_defs.join(",\n    ")
    )
}

/// Drop and recreate the staging table on the given connection.
///
/// Failure is fatal for the run and reported as a schema error.
pub async fn prepare<R, C>(conn: &mut C, descriptor: &TableDescriptor<R>) -> Result<()>
where
    C: StoreConnection + ?Sized,
{
    let ddl = build_prepare_sql(descriptor);
    conn.execute(&ddl, &[]).await.map_err(|e| {
        BulkMergeError::schema(
            descriptor.qualified_name(),
            format!("creating staging table: {}", e),
        )
    })?;
    debug!("Created staging table {}", descriptor.qualified_name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnMapping, TableDeclaration};
    use crate::core::value::SqlValue;
    use async_trait::async_trait;

    struct Row {
        code: String,
        amount: i64,
        memo: Option<String>,
    }

    fn descriptor(name: &str) -> TableDescriptor<Row> {
        TableDescriptor::new(
            Some(TableDeclaration::new(name)),
            vec![
                ColumnMapping::new("code", "varchar(20)", |r: &Row| SqlValue::from(&r.code))
                    .collate("Latin1_General_BIN2"),
                ColumnMapping::new("amount", "bigint", |r: &Row| SqlValue::from(r.amount)),
                ColumnMapping::new("memo", "nvarchar(max)", |r: &Row| {
                    SqlValue::from(r.memo.as_deref())
                })
                .nullable(),
            ],
            "dbo",
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_sql_permanent_table() {
        let sql = build_prepare_sql(&descriptor("ledger_stage"));
        assert_eq!(
            sql,
            "IF OBJECT_ID(N'[dbo].[ledger_stage]', N'U') IS NOT NULL DROP TABLE [dbo].[ledger_stage];\n\
             CREATE TABLE [dbo].[ledger_stage] (\n    \
             [id] INT IDENTITY(1,1) NOT NULL PRIMARY KEY,\n    \
             [code] varchar(20) COLLATE Latin1_General_BIN2 NOT NULL,\n    \
             [amount] bigint NOT NULL,\n    \
             [memo] nvarchar(max) NULL\n);"
        );
    }

    #[test]
    fn test_prepare_sql_temp_table_checks_tempdb() {
        let sql = build_prepare_sql(&descriptor("##ledger_stage"));
        assert!(sql.starts_with(
            "IF OBJECT_ID(N'tempdb..[##ledger_stage]', N'U') IS NOT NULL DROP TABLE [##ledger_stage];"
        ));
        assert!(sql.contains("CREATE TABLE [##ledger_stage] ("));
        assert!(!sql.contains("[dbo]"));
    }

    #[test]
    fn test_prepare_sql_identity_column_first() {
        let sql = build_prepare_sql(&descriptor("ledger_stage"));
        let id_pos = sql.find("[id] INT IDENTITY").unwrap();
        let code_pos = sql.find("[code]").unwrap();
        let amount_pos = sql.find("[amount]").unwrap();
        let memo_pos = sql.find("[memo]").unwrap();
        assert!(id_pos < code_pos && code_pos < amount_pos && amount_pos < memo_pos);
    }

    #[test]
    fn test_prepare_sql_escapes_quotes_in_existence_check() {
        let sql = build_prepare_sql(&descriptor("o'brien_stage"));
        assert!(sql.contains("OBJECT_ID(N'[dbo].[o''brien_stage]', N'U')"));
        assert!(sql.contains("DROP TABLE [dbo].[o'brien_stage]"));
    }

    struct FailingConnection;

    #[async_trait]
    impl StoreConnection for FailingConnection {
        async fn execute(&mut self, _sql: &str, _params: &[SqlValue<'_>]) -> Result<u64> {
            Err(BulkMergeError::Store(tiberius::error::Error::Protocol(
                "permission denied in database".into(),
            )))
        }
    }

    #[tokio::test]
    async fn test_prepare_failure_is_schema_error() {
        let mut conn = FailingConnection;
        let err = prepare(&mut conn, &descriptor("ledger_stage"))
            .await
            .unwrap_err();
        match err {
            BulkMergeError::Schema { table, message } => {
                assert_eq!(table, "[dbo].[ledger_stage]");
                assert!(message.contains("permission denied"));
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }
}
