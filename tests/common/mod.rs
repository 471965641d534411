//! Common test utilities
#![allow(dead_code)]

use identity_permissions::domain::{Key, Role, User};
use identity_permissions::repository::memory::{MemoryPermissionStore, MemoryTenantStore};
use identity_permissions::repository::MemoryDatabase;
use identity_permissions::service::{PermissionManager, TenantManager};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::sync::{Arc, Once};

static ENV_INIT: Once = Once::new();

fn init_env() {
    ENV_INIT.call_once(|| {
        let _ = dotenvy::dotenv();
    });
}

/// In-memory database plus default managers over it.
pub struct MemoryFixture {
    pub db: MemoryDatabase,
    pub permissions: Arc<PermissionManager<MemoryPermissionStore>>,
    pub tenants: Arc<TenantManager<MemoryTenantStore>>,
}

impl MemoryFixture {
    pub fn new() -> Self {
        let db = MemoryDatabase::new();
        let permissions = Arc::new(PermissionManager::with_defaults(Arc::new(
            db.permission_store(),
        )));
        let tenants = Arc::new(TenantManager::with_defaults(Arc::new(db.tenant_store())));
        Self {
            db,
            permissions,
            tenants,
        }
    }

    /// Seed a role using the same normalization as the managers.
    pub async fn role(&self, name: &str) -> Role {
        self.db
            .add_role(name, self.permissions.normalize_name(name))
            .await
            .unwrap()
    }

    pub async fn user(&self, user_name: &str, tenant: Option<Key>, roles: &[&str]) -> User {
        let mut user = User::new(user_name);
        if let Some(tenant_id) = tenant {
            user = user.in_tenant(tenant_id);
        }
        let user = self.db.add_user(user).await.unwrap();
        for role in roles {
            self.db
                .add_user_to_role(user.id, &self.permissions.normalize_name(role))
                .await
                .unwrap();
        }
        user
    }
}

/// Pool for the database named by `DATABASE_URL`.
pub async fn get_test_pool() -> anyhow::Result<MySqlPool> {
    init_env();
    let url = std::env::var("DATABASE_URL")?;
    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    Ok(pool)
}

/// Setup test database (run migrations)
pub async fn setup_database(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert a role row. Role management lives outside this crate.
pub async fn insert_role(pool: &MySqlPool, name: &str) -> Role {
    let role = Role::new(name, name.trim().to_uppercase());
    sqlx::query("INSERT INTO roles (id, name, normalized_name) VALUES (?, ?, ?)")
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.normalized_name)
        .execute(pool)
        .await
        .unwrap();
    role
}

pub async fn insert_user(pool: &MySqlPool, user: &User, roles: &[&Role]) {
    sqlx::query("INSERT INTO users (id, user_name, tenant_id) VALUES (?, ?, ?)")
        .bind(user.id)
        .bind(&user.user_name)
        .bind(user.tenant_id)
        .execute(pool)
        .await
        .unwrap();
    for role in roles {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user.id)
            .bind(role.id)
            .execute(pool)
            .await
            .unwrap();
    }
}

/// Name unique to one test run, so tests can share a database.
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}
