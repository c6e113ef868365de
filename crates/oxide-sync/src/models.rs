//! Built-in table declarations of the RSS application.
//!
//! These are the tables synchronized at startup when no schema file is
//! given. `oxide-sync models` prints them as JSON.

use crate::schema::{ColumnSpec, DefaultValue, SqlType, TableSpec};

/// Default avatar path for new users.
pub const DEFAULT_AVATAR: &str = "/static/default-avatar.png";

/// Every application table, in synchronization order.
#[must_use]
pub fn application_tables() -> Vec<TableSpec> {
    vec![users(), articles(), config_management(), feeds(), message_tasks()]
}

/// Accounts allowed into the web UI.
#[must_use]
pub fn users() -> TableSpec {
    TableSpec::new("users")
        .column(ColumnSpec::new("id", SqlType::Varchar(255)).primary_key())
        .column(ColumnSpec::new("username", SqlType::Varchar(50)).not_null())
        .column(ColumnSpec::new("password_hash", SqlType::Varchar(255)).not_null())
        .column(ColumnSpec::new("is_active", SqlType::Boolean).default(DefaultValue::Bool(true)))
        .column(ColumnSpec::new("role", SqlType::Varchar(20)))
        .column(ColumnSpec::new("permissions", SqlType::Text))
        .column(
            ColumnSpec::new("nickname", SqlType::Varchar(50))
                .default(DefaultValue::String(String::new())),
        )
        .column(
            ColumnSpec::new("avatar", SqlType::Varchar(255))
                .default(DefaultValue::String(DEFAULT_AVATAR.to_string())),
        )
        .column(
            ColumnSpec::new("email", SqlType::Varchar(50))
                .default(DefaultValue::String(String::new())),
        )
        .column(ColumnSpec::new("mp_name", SqlType::Varchar(255)))
        .column(ColumnSpec::new("mp_cover", SqlType::Varchar(255)))
        .column(ColumnSpec::new("mp_intro", SqlType::Varchar(255)))
        .column(ColumnSpec::new("status", SqlType::Integer))
        .column(ColumnSpec::new("sync_time", SqlType::DateTime))
        .column(ColumnSpec::new("update_time", SqlType::DateTime))
        .column(ColumnSpec::new("created_at", SqlType::DateTime))
        .column(ColumnSpec::new("updated_at", SqlType::DateTime))
        .column(ColumnSpec::new("faker_id", SqlType::Varchar(255)))
}

/// Harvested articles.
#[must_use]
pub fn articles() -> TableSpec {
    TableSpec::new("articles")
        .column(ColumnSpec::new("id", SqlType::Varchar(255)).primary_key())
        .column(ColumnSpec::new("mp_id", SqlType::Varchar(255)))
        .column(ColumnSpec::new("title", SqlType::Varchar(500)))
        .column(ColumnSpec::new("pic_url", SqlType::Varchar(500)))
        .column(ColumnSpec::new("publish_time", SqlType::Integer))
        .column(ColumnSpec::new("created_at", SqlType::DateTime))
        .column(ColumnSpec::new("updated_at", SqlType::DateTime))
        .column(ColumnSpec::new("is_export", SqlType::Integer))
}

/// Key/value runtime configuration.
#[must_use]
pub fn config_management() -> TableSpec {
    TableSpec::new("config_management")
        .column(ColumnSpec::new("config_key", SqlType::Varchar(100)).primary_key())
        .column(ColumnSpec::new("config_value", SqlType::Text).not_null())
        .column(ColumnSpec::new("description", SqlType::Varchar(200)))
}

/// Subscribed sources.
#[must_use]
pub fn feeds() -> TableSpec {
    TableSpec::new("feeds")
        .column(ColumnSpec::new("id", SqlType::Varchar(255)).primary_key())
        .column(ColumnSpec::new("mp_name", SqlType::Varchar(255)))
        .column(ColumnSpec::new("mp_cover", SqlType::Varchar(255)))
        .column(ColumnSpec::new("mp_intro", SqlType::Varchar(255)))
        .column(ColumnSpec::new("status", SqlType::Integer))
        .column(ColumnSpec::new("sync_time", SqlType::DateTime))
        .column(ColumnSpec::new("update_time", SqlType::DateTime))
        .column(ColumnSpec::new("created_at", SqlType::DateTime))
        .column(ColumnSpec::new("updated_at", SqlType::DateTime))
        .column(ColumnSpec::new("faker_id", SqlType::Varchar(255)))
}

/// Scheduled notification jobs.
#[must_use]
pub fn message_tasks() -> TableSpec {
    TableSpec::new("message_tasks")
        .column(ColumnSpec::new("id", SqlType::Integer).primary_key().auto_increment())
        .column(ColumnSpec::new("message_template", SqlType::Text).not_null())
        .column(ColumnSpec::new("web_hook_url", SqlType::Varchar(500)).not_null())
        .column(ColumnSpec::new("mps_id", SqlType::Text))
        .column(ColumnSpec::new("status", SqlType::Integer).default(DefaultValue::Integer(0)))
        .column(
            ColumnSpec::new("created_at", SqlType::DateTime)
                .default(DefaultValue::Generated("now".to_string())),
        )
        .column(
            ColumnSpec::new("updated_at", SqlType::DateTime)
                .default(DefaultValue::Generated("now".to_string())),
        )
}
