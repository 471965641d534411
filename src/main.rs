//! Administrative CLI over the MySQL-backed permission and tenant stores.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use identity_permissions::{
    config::Config,
    domain::{Permission, Tenant},
    error::IdentityResult,
    repository::{PermissionStoreImpl, TenantStoreImpl, UserDirectoryImpl},
    service::{ClaimsProvider, PermissionManager, TenantManager},
    telemetry,
};
use serde::Serialize;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "identity-permissions")]
#[command(about = "Manage permissions and tenants and inspect resolved claims")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved claim set of a user as JSON
    Claims {
        /// User id
        user_id: String,
    },
    /// Permission administration
    #[command(subcommand)]
    Permission(PermissionCommand),
    /// Tenant administration
    #[command(subcommand)]
    Tenant(TenantCommand),
}

#[derive(Subcommand)]
enum PermissionCommand {
    /// Create a permission
    Create { name: String },
    /// Delete a permission and its role associations
    Delete { name: String },
    /// List all permissions
    List,
    /// Grant a permission to a role
    AddToRole { name: String, role: String },
    /// Revoke a permission from a role
    RemoveFromRole { name: String, role: String },
    /// List the roles holding a permission
    Roles { name: String },
}

#[derive(Subcommand)]
enum TenantCommand {
    /// Create a tenant
    Create {
        name: String,
        /// Defaults to the name
        #[arg(long)]
        display_name: Option<String>,
        /// Physical database for tenants with separate storage
        #[arg(long)]
        database: Option<String>,
    },
    /// List all tenants
    List,
    /// Attach a tenant to a role
    AddToRole { name: String, role: String },
    /// Detach a tenant from a role
    RemoveFromRole { name: String, role: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    telemetry::init(&config.telemetry);

    let pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    let permissions = Arc::new(PermissionManager::with_defaults(Arc::new(
        PermissionStoreImpl::new(pool.clone()),
    )));
    let tenants = Arc::new(TenantManager::with_defaults(Arc::new(TenantStoreImpl::new(
        pool.clone(),
    ))));
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Claims { user_id } => {
            let provider = ClaimsProvider::new(
                Arc::new(UserDirectoryImpl::new(pool.clone())),
                permissions.clone(),
            )
            .configure(&config.claims, tenants.clone());
            let claims = provider.get_claims(&user_id, &cancel).await?;
            print_json(&claims)?;
        }
        Commands::Permission(command) => {
            run_permission(command, &permissions, &cancel).await?;
        }
        Commands::Tenant(command) => {
            run_tenant(command, &tenants, &cancel).await?;
        }
    }

    permissions.close();
    tenants.close();
    pool.close().await;
    Ok(())
}

async fn run_permission(
    command: PermissionCommand,
    manager: &PermissionManager<PermissionStoreImpl>,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        PermissionCommand::Create { name } => {
            let mut permission = Permission::new(name);
            ensure_succeeded(manager.create(&mut permission, cancel).await?)?;
            print_json(&permission)?;
        }
        PermissionCommand::Delete { name } => {
            let permission = find_permission(manager, &name, cancel).await?;
            ensure_succeeded(manager.delete(&permission, cancel).await?)?;
            info!(permission_id = %permission.id, "Permission deleted");
        }
        PermissionCommand::List => {
            print_json(&manager.permissions(cancel).await?)?;
        }
        PermissionCommand::AddToRole { name, role } => {
            let permission = find_permission(manager, &name, cancel).await?;
            manager.add_to_role(&permission, &role, cancel).await?;
        }
        PermissionCommand::RemoveFromRole { name, role } => {
            let permission = find_permission(manager, &name, cancel).await?;
            manager.remove_from_role(&permission, &role, cancel).await?;
        }
        PermissionCommand::Roles { name } => {
            let permission = find_permission(manager, &name, cancel).await?;
            print_json(&manager.get_roles(&permission, cancel).await?)?;
        }
    }
    Ok(())
}

async fn run_tenant(
    command: TenantCommand,
    manager: &TenantManager<TenantStoreImpl>,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        TenantCommand::Create {
            name,
            display_name,
            database,
        } => {
            let display_name = display_name.unwrap_or_else(|| name.clone());
            let mut tenant = Tenant::new(name, display_name);
            if let Some(database) = database {
                tenant = tenant.with_separate_database(database);
            }
            ensure_succeeded(manager.create(&mut tenant, cancel).await?)?;
            print_json(&tenant)?;
        }
        TenantCommand::List => {
            print_json(&manager.tenants(cancel).await?)?;
        }
        TenantCommand::AddToRole { name, role } => {
            let tenant = find_tenant(manager, &name, cancel).await?;
            manager.add_to_role(&tenant, &role, cancel).await?;
        }
        TenantCommand::RemoveFromRole { name, role } => {
            let tenant = find_tenant(manager, &name, cancel).await?;
            manager.remove_from_role(&tenant, &role, cancel).await?;
        }
    }
    Ok(())
}

async fn find_permission(
    manager: &PermissionManager<PermissionStoreImpl>,
    name: &str,
    cancel: &CancellationToken,
) -> Result<Permission> {
    manager
        .find_by_name(name, cancel)
        .await?
        .with_context(|| format!("Permission '{}' not found", name))
}

async fn find_tenant(
    manager: &TenantManager<TenantStoreImpl>,
    name: &str,
    cancel: &CancellationToken,
) -> Result<Tenant> {
    manager
        .find_by_name(name, cancel)
        .await?
        .with_context(|| format!("Tenant '{}' not found", name))
}

fn ensure_succeeded(result: IdentityResult) -> Result<()> {
    if !result.succeeded() {
        bail!("{}", result);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
