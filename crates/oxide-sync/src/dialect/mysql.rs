//! MySQL / MariaDB dialect. Also drives engines the resolver does not know.

use tracing::warn;

use crate::error::Result;
use crate::introspect::LiveTable;
use crate::schema::{ColumnSpec, SqlType};

use super::DdlDialect;

/// MySQL DDL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DdlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "INT".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Text => "LONGTEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({len})"),
            SqlType::Char(len) => format!("CHAR({len})"),
            SqlType::Boolean => "TINYINT(1)".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Real => "FLOAT".to_string(),
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Decimal(p, s) => format!("DECIMAL({p},{s})"),
            SqlType::Blob => "LONGBLOB".to_string(),
            SqlType::Binary(len) => format!("BINARY({len})"),
            SqlType::Json => "JSON".to_string(),
            SqlType::Uuid => "CHAR(36)".to_string(),
        }
    }

    fn autoincrement_clause(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn drop_foreign_key(&self, table: &str, constraint: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_identifier(table),
            self.quote_identifier(constraint)
        )
    }

    fn alter_column(&self, live: &LiveTable, column: &ColumnSpec) -> Result<Vec<String>> {
        let mut modify = format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(&live.name),
            self.column_definition(column)
        );

        let was_key = live.column(&column.name).is_some_and(|c| c.primary_key);
        if column.primary_key && !was_key {
            if live.columns.iter().any(|c| c.primary_key) {
                warn!(
                    table = %live.name,
                    column = %column.name,
                    "Table already has a different primary key, not extending it"
                );
            } else {
                modify.push_str(" PRIMARY KEY");
            }
        }

        let mut statements = vec![modify];
        statements.extend(self.replace_foreign_key(live, column));
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{LiveColumn, LiveForeignKey};
    use crate::schema::{DefaultValue, TableSpec};

    fn dialect() -> MySqlDialect {
        MySqlDialect::new()
    }

    fn live_column(name: &str, raw_type: &str) -> LiveColumn {
        LiveColumn {
            name: name.to_string(),
            raw_type: raw_type.to_string(),
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
        }
    }

    fn live_articles() -> LiveTable {
        let mut id = live_column("id", "varchar(255)");
        id.primary_key = true;
        id.nullable = false;
        LiveTable {
            name: "articles".to_string(),
            columns: vec![id, live_column("mp_id", "varchar(100)")],
            foreign_keys: vec![LiveForeignKey {
                name: Some("articles_ibfk_1".to_string()),
                column: "mp_id".to_string(),
                references_table: "old_feeds".to_string(),
                references_column: Some("id".to_string()),
            }],
            unique_constraints: Vec::new(),
            indexes: Vec::new(),
        }
    }

    #[test]
    fn test_create_table_auto_increment() {
        let table = TableSpec::new("message_tasks")
            .column(ColumnSpec::new("id", SqlType::BigInt).primary_key().auto_increment())
            .column(ColumnSpec::new("message_template", SqlType::Text).not_null());

        let sql = dialect().create_table(&table);
        assert!(sql.contains("`id` BIGINT NOT NULL AUTO_INCREMENT"));
        assert!(sql.contains("`message_template` LONGTEXT NOT NULL"));
        assert!(sql.contains("PRIMARY KEY (`id`)"));
    }

    #[test]
    fn test_add_column_with_foreign_key() {
        let column = ColumnSpec::new("mp_id", SqlType::Varchar(255)).references("feeds", "id");
        let sql = dialect().add_column("articles", &column);

        assert_eq!(sql.len(), 2);
        assert_eq!(
            sql[0],
            "ALTER TABLE `articles` ADD COLUMN `mp_id` VARCHAR(255) NULL DEFAULT NULL"
        );
        assert_eq!(
            sql[1],
            "ALTER TABLE `articles` ADD CONSTRAINT `fk_articles_mp_id` \
             FOREIGN KEY (`mp_id`) REFERENCES `feeds` (`id`)"
        );
    }

    #[test]
    fn test_alter_column_modify() {
        let column = ColumnSpec::new("title", SqlType::Varchar(500))
            .not_null()
            .default(DefaultValue::String(String::new()));
        let mut live = live_articles();
        live.columns.push(live_column("title", "varchar(255)"));

        let sql = dialect().alter_column(&live, &column).unwrap();
        assert_eq!(
            sql,
            vec!["ALTER TABLE `articles` MODIFY COLUMN `title` VARCHAR(500) NOT NULL DEFAULT ''"]
        );
    }

    #[test]
    fn test_alter_column_replaces_foreign_key() {
        let column = ColumnSpec::new("mp_id", SqlType::Varchar(255)).references("feeds", "id");
        let sql = dialect().alter_column(&live_articles(), &column).unwrap();

        assert_eq!(sql.len(), 3);
        assert!(sql[0].starts_with("ALTER TABLE `articles` MODIFY COLUMN `mp_id` VARCHAR(255)"));
        assert_eq!(
            sql[1],
            "ALTER TABLE `articles` DROP FOREIGN KEY `articles_ibfk_1`"
        );
        assert!(sql[2].contains("ADD CONSTRAINT `fk_articles_mp_id`"));
    }

    #[test]
    fn test_alter_column_drops_undeclared_foreign_key() {
        let column = ColumnSpec::new("mp_id", SqlType::Varchar(100));
        let sql = dialect().alter_column(&live_articles(), &column).unwrap();

        assert_eq!(sql.len(), 2);
        assert_eq!(
            sql[1],
            "ALTER TABLE `articles` DROP FOREIGN KEY `articles_ibfk_1`"
        );
    }

    #[test]
    fn test_alter_column_keeps_existing_primary_key() {
        let column = ColumnSpec::new("mp_id", SqlType::Varchar(100)).primary_key();
        let sql = dialect().alter_column(&live_articles(), &column).unwrap();
        assert!(!sql[0].ends_with("PRIMARY KEY"));
    }

    #[test]
    fn test_type_names() {
        let d = dialect();
        assert_eq!(d.type_name(&SqlType::Integer), "INT");
        assert_eq!(d.type_name(&SqlType::Text), "LONGTEXT");
        assert_eq!(d.type_name(&SqlType::Boolean), "TINYINT(1)");
        assert_eq!(d.type_name(&SqlType::Decimal(10, 2)), "DECIMAL(10,2)");
    }
}
