//! Tenant manager and in-memory store integration tests

use identity_permissions::domain::Tenant;
use identity_permissions::error::{AppError, ErrorCode};
use identity_permissions::service::TenantDirectory;
use tokio_util::sync::CancellationToken;

mod common;

#[tokio::test]
async fn test_create_and_list_tenants() {
    let fixture = common::MemoryFixture::new();
    let cancel = CancellationToken::new();

    let mut beta = Tenant::new("beta", "Beta Ltd");
    let mut acme = Tenant::new("acme", "Acme Corp").with_separate_database("acme_db");
    assert!(fixture.tenants.create(&mut beta, &cancel).await.unwrap().succeeded());
    assert!(fixture.tenants.create(&mut acme, &cancel).await.unwrap().succeeded());

    let names: Vec<String> = fixture
        .tenants
        .tenants(&cancel)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.normalized_name)
        .collect();
    assert_eq!(names, vec!["ACME".to_string(), "BETA".to_string()]);

    let stored = fixture.tenants.find_by_name("Acme", &cancel).await.unwrap().unwrap();
    assert_eq!(stored.database_name, "acme_db");
    assert!(stored.has_separate_database);
}

#[tokio::test]
async fn test_duplicate_tenant_name() {
    let fixture = common::MemoryFixture::new();
    let cancel = CancellationToken::new();

    let mut first = Tenant::new("acme", "Acme Corp");
    fixture.tenants.create(&mut first, &cancel).await.unwrap();

    let mut second = Tenant::new("ACME", "Another Acme");
    let result = fixture.tenants.create(&mut second, &cancel).await.unwrap();
    assert!(result.has_code(ErrorCode::DuplicateTenantName));
}

#[tokio::test]
async fn test_tenant_role_round_trip() {
    let fixture = common::MemoryFixture::new();
    let cancel = CancellationToken::new();
    fixture.role("Manager").await;

    let mut tenant = Tenant::new("acme", "Acme Corp");
    fixture.tenants.create(&mut tenant, &cancel).await.unwrap();

    fixture.tenants.add_to_role(&tenant, "Manager", &cancel).await.unwrap();
    assert!(fixture.tenants.is_in_role(&tenant, "manager", &cancel).await.unwrap());
    assert_eq!(
        fixture.tenants.get_tenants_in_role("Manager", &cancel).await.unwrap()[0].id,
        tenant.id
    );
    assert_eq!(fixture.tenants.get_role_ids(&tenant, &cancel).await.unwrap().len(), 1);

    let err = fixture
        .tenants
        .add_to_role(&tenant, "Manager", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    fixture.tenants.remove_from_role(&tenant, "Manager", &cancel).await.unwrap();
    assert!(!fixture.tenants.is_in_role(&tenant, "Manager", &cancel).await.unwrap());
    assert!(fixture
        .tenants
        .get_tenants_in_role("UNKNOWN_ROLE", &cancel)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_stale_tenant_update() {
    let fixture = common::MemoryFixture::new();
    let cancel = CancellationToken::new();

    let mut tenant = Tenant::new("acme", "Acme Corp");
    fixture.tenants.create(&mut tenant, &cancel).await.unwrap();

    let mut stale = tenant.clone();
    tenant.display_name = "Acme Corporation".to_string();
    assert!(fixture.tenants.update(&mut tenant, &cancel).await.unwrap().succeeded());

    stale.display_name = "Acme Inc".to_string();
    let result = fixture.tenants.update(&mut stale, &cancel).await.unwrap();
    assert!(result.has_code(ErrorCode::ConcurrencyFailure));

    let stored = fixture
        .tenants
        .find_by_id(&tenant.id.to_string(), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.display_name, "Acme Corporation");
}

#[tokio::test]
async fn test_delete_tenant_cascades() {
    let fixture = common::MemoryFixture::new();
    let cancel = CancellationToken::new();
    fixture.role("Manager").await;

    let mut tenant = Tenant::new("acme", "Acme Corp");
    fixture.tenants.create(&mut tenant, &cancel).await.unwrap();
    fixture.tenants.add_to_role(&tenant, "Manager", &cancel).await.unwrap();

    assert!(fixture.tenants.delete(&tenant, &cancel).await.unwrap().succeeded());
    assert!(fixture
        .tenants
        .get_tenants_in_role("Manager", &cancel)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_manager_serves_as_tenant_directory() {
    let fixture = common::MemoryFixture::new();
    let cancel = CancellationToken::new();
    fixture.role("Manager").await;

    let mut tenant = Tenant::new("acme", "Acme Corp");
    fixture.tenants.create(&mut tenant, &cancel).await.unwrap();
    fixture.tenants.add_to_role(&tenant, "Manager", &cancel).await.unwrap();

    let directory: &dyn TenantDirectory = &*fixture.tenants;
    let found = directory
        .find_by_id(&tenant.id.to_string(), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(directory.get_roles(&found, &cancel).await.unwrap(), vec!["Manager".to_string()]);
    assert_eq!(directory.get_tenant_name(&found, &cancel).await.unwrap(), "acme");
    assert_eq!(
        directory.get_tenant_display_name(&found, &cancel).await.unwrap(),
        "Acme Corp"
    );
    assert!(directory.find_by_id("garbage", &cancel).await.unwrap().is_none());
}
