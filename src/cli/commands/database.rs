use anyhow::Context;
use serde_json::json;

use crate::cli::utils::{output_empty_collection, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::{DatabaseManager, PgStore, Store};

pub async fn migrate(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("could not connect to the database")?;

    let result = DatabaseManager::migrate(&pool).await;
    DatabaseManager::close(&pool).await;
    result.context("migration failed")?;

    output_success(&output_format, "Migrations applied", None)
}

pub async fn users(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("could not connect to the database")?;

    let store = PgStore::new(pool);
    let users = store.list_users().await;
    DatabaseManager::close(store.pool()).await;
    let users = users.context("could not list users")?;

    if users.is_empty() {
        return output_empty_collection(&output_format, "users", "No users registered");
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "users": users }))?);
        }
        OutputFormat::Text => {
            for user in &users {
                println!("{}  {:<24} {:<32} {} place(s)", user.id, user.name, user.email, user.places.len());
            }
        }
    }
    Ok(())
}
