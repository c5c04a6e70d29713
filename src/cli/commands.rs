//! CLI command implementations

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::auth::models::{AdminChanges, AdminView};
use crate::auth::password::{check_new_password, PasswordHasher};
use crate::cli::{
    error, info, print_admin_table, print_page_table, success, warn, AdminAction, ContentAction,
    OutputFormat,
};
use crate::config::{self, loader::CONFIG_FILENAME, Config};
use crate::content::{seed, seed_page, DisabledPageCache};
use crate::db::{self, PgStore, Store};

/// Initialize a new schoolhouse.toml configuration file
pub async fn init() -> Result<()> {
    let config_path = Path::new(CONFIG_FILENAME);

    if config_path.exists() {
        warn(&format!("{} already exists", CONFIG_FILENAME));
        return Ok(());
    }

    fs::write(config_path, config::loader::default_config_content())?;

    success(&format!("Created {}", CONFIG_FILENAME));
    info("Set [database] url and [auth] secret_key, then run 'schoolhouse migrate'");
    Ok(())
}

/// Start the HTTP API server
pub async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config()?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info(&format!("Starting server at http://{}:{}", host, port));

    crate::api::run_server(config, &host, port).await?;
    Ok(())
}

/// Apply the schema and create the bootstrap principal if needed
pub async fn migrate() -> Result<()> {
    let config = load_config()?;
    let store = connect(&config).await?;
    store.migrate().await.context("Failed to apply schema")?;
    success("Schema is up to date");

    let hasher = PasswordHasher::new(config.auth.bcrypt_cost);
    match db::ensure_principal(&store, &config.bootstrap, &hasher).await? {
        Some(admin) => success(&format!("Principal account ready: {}", admin.username)),
        None => info("A principal account already exists"),
    }
    Ok(())
}

/// Administrator account commands
pub async fn admin(action: AdminAction) -> Result<()> {
    let config = load_config()?;
    let store = connect(&config).await?;

    match action {
        AdminAction::List { format } => {
            let admins: Vec<AdminView> = store
                .list_admins()
                .await?
                .iter()
                .map(AdminView::from)
                .collect();

            match format {
                OutputFormat::Table => print_admin_table(&admins),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&admins)?),
                OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&admins)?),
            }
        }
        AdminAction::ResetPassword { username, password } => {
            check_new_password(&password)?;

            let Some(admin) = store.find_admin_by_username(&username).await? else {
                error(&format!("No administrator named '{}'", username));
                bail!("unknown administrator: {}", username);
            };

            let hasher = PasswordHasher::new(config.auth.bcrypt_cost);
            store
                .update_admin(
                    admin.id,
                    AdminChanges {
                        password_hash: Some(hasher.hash(&password).await?),
                        ..Default::default()
                    },
                )
                .await?;

            tracing::info!(username = %admin.username, "password_reset");
            success(&format!("Password updated for {}", admin.username));
        }
    }

    Ok(())
}

/// Page content commands
pub async fn content(action: ContentAction) -> Result<()> {
    let config = load_config()?;
    let store = connect(&config).await?;

    match action {
        ContentAction::Pages => {
            let pages = store.list_pages().await?;
            print_page_table(&pages, &seed::seeded_pages());
        }
        ContentAction::Seed { page, all } => {
            let pages = match page {
                Some(page) if !all => vec![page],
                _ => seed::seeded_pages(),
            };

            for page in &pages {
                let report = seed_page(&store, &DisabledPageCache, page).await?;
                success(&report.message);
            }

            // Running servers keep serving their cached copy until it expires
            info(&format!(
                "Cached pages on running servers refresh within {} seconds",
                config.content.cache_ttl_secs
            ));
        }
    }

    Ok(())
}

fn load_config() -> Result<Config> {
    config::load_config().map_err(|e| anyhow::anyhow!("{}", e))
}

async fn connect(config: &Config) -> Result<PgStore> {
    let Some(url) = &config.database.url else {
        error("No database configured");
        bail!("set [database] url in {} or DATABASE_URL", CONFIG_FILENAME);
    };

    PgStore::connect(url, config.database.connect_timeout())
        .await
        .context("Failed to connect to the database")
}
