//! End-to-end claims resolution over the in-memory backend

use identity_permissions::config::ClaimsConfig;
use identity_permissions::domain::{claim_types, ClaimSet, Permission, Tenant};
use identity_permissions::error::AppError;
use identity_permissions::service::{
    ClaimsProvider, PermissionClaimsPrincipalFactory, UserPermissions,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod common;

async fn grant(fixture: &common::MemoryFixture, role: &str, names: &[&str]) {
    let cancel = CancellationToken::new();
    for name in names {
        let permission = match fixture.permissions.find_by_name(name, &cancel).await.unwrap() {
            Some(existing) => existing,
            None => {
                let mut permission = Permission::new(*name);
                assert!(fixture
                    .permissions
                    .create(&mut permission, &cancel)
                    .await
                    .unwrap()
                    .succeeded());
                permission
            }
        };
        fixture
            .permissions
            .add_to_role(&permission, role, &cancel)
            .await
            .unwrap();
    }
}

fn pairs(claims: &ClaimSet) -> Vec<(String, String)> {
    claims
        .iter()
        .map(|c| (c.claim_type.clone(), c.value.clone()))
        .collect()
}

fn permission(value: &str) -> (String, String) {
    (claim_types::PERMISSION.to_string(), value.to_string())
}

#[tokio::test]
async fn test_employee_without_tenant() {
    let fixture = common::MemoryFixture::new();
    fixture.role("Employee").await;
    grant(&fixture, "Employee", &["Invoice.Read"]).await;
    let u1 = fixture.user("U1", None, &["Employee"]).await;

    let provider = ClaimsProvider::new(
        Arc::new(fixture.db.user_directory()),
        fixture.permissions.clone(),
    )
    .with_tenants(fixture.tenants.clone());

    let claims = provider
        .get_claims(&u1.id.to_string(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(pairs(&claims), vec![permission("Invoice.Read")]);
    assert!(claims.first_value(claim_types::TENANT_ID).is_none());
}

#[tokio::test]
async fn test_manager_in_tenant_gets_undeduplicated_claims() {
    let fixture = common::MemoryFixture::new();
    let cancel = CancellationToken::new();
    fixture.role("Manager").await;
    grant(
        &fixture,
        "Manager",
        &["Invoice.Read", "Invoice.Delete", "Invoice.Approve"],
    )
    .await;

    let mut t1 = Tenant::new("T1", "Tenant One");
    assert!(fixture.tenants.create(&mut t1, &cancel).await.unwrap().succeeded());
    fixture.tenants.add_to_role(&t1, "Manager", &cancel).await.unwrap();

    let u2 = fixture.user("U2", Some(t1.id), &["Manager"]).await;

    let provider = ClaimsProvider::new(
        Arc::new(fixture.db.user_directory()),
        fixture.permissions.clone(),
    )
    .with_tenants(fixture.tenants.clone());

    let claims = provider.get_claims(&u2.id.to_string(), &cancel).await.unwrap();

    assert_eq!(
        pairs(&claims),
        vec![
            permission("Invoice.Read"),
            permission("Invoice.Delete"),
            permission("Invoice.Approve"),
            permission("Invoice.Read"),
            permission("Invoice.Delete"),
            permission("Invoice.Approve"),
            (claim_types::TENANT_ID.to_string(), t1.id.to_string()),
            (claim_types::TENANT_NAME.to_string(), "T1".to_string()),
            (
                claim_types::TENANT_DISPLAY_NAME.to_string(),
                "Tenant One".to_string()
            ),
        ]
    );
    assert_eq!(claims.values_of(claim_types::PERMISSION).count(), 6);
}

#[tokio::test]
async fn test_configured_deduplication_and_tenant_unaware_mode() {
    let fixture = common::MemoryFixture::new();
    let cancel = CancellationToken::new();
    fixture.role("Manager").await;
    grant(&fixture, "Manager", &["Invoice.Read", "Invoice.Delete"]).await;

    let mut t1 = Tenant::new("T1", "Tenant One");
    fixture.tenants.create(&mut t1, &cancel).await.unwrap();
    fixture.tenants.add_to_role(&t1, "Manager", &cancel).await.unwrap();
    let u2 = fixture.user("U2", Some(t1.id), &["Manager"]).await;

    let deduplicated = ClaimsProvider::new(
        Arc::new(fixture.db.user_directory()),
        fixture.permissions.clone(),
    )
    .configure(
        &ClaimsConfig {
            tenant_aware: true,
            deduplicate_permission_claims: true,
        },
        fixture.tenants.clone(),
    );
    let claims = deduplicated.get_claims(&u2.id.to_string(), &cancel).await.unwrap();
    assert_eq!(claims.values_of(claim_types::PERMISSION).count(), 2);
    assert_eq!(claims.first_value(claim_types::TENANT_NAME), Some("T1"));

    let tenant_unaware = ClaimsProvider::new(
        Arc::new(fixture.db.user_directory()),
        fixture.permissions.clone(),
    )
    .configure(
        &ClaimsConfig {
            tenant_aware: false,
            deduplicate_permission_claims: false,
        },
        fixture.tenants.clone(),
    );
    assert!(!tenant_unaware.is_tenant_aware());
    let claims = tenant_unaware.get_claims(&u2.id.to_string(), &cancel).await.unwrap();
    assert_eq!(
        pairs(&claims),
        vec![permission("Invoice.Read"), permission("Invoice.Delete")]
    );
}

#[tokio::test]
async fn test_unknown_user_and_malformed_id() {
    let fixture = common::MemoryFixture::new();
    let provider = ClaimsProvider::new(
        Arc::new(fixture.db.user_directory()),
        fixture.permissions.clone(),
    );
    let cancel = CancellationToken::new();

    for user_id in ["not-a-key", "00000000-0000-0000-0000-000000000001"] {
        let err = provider.get_claims(user_id, &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

#[tokio::test]
async fn test_signed_in_identity_answers_permission_checks() {
    let fixture = common::MemoryFixture::new();
    fixture.role("Employee").await;
    grant(&fixture, "Employee", &["Invoice.Read"]).await;
    let u1 = fixture.user("U1", None, &["Employee"]).await;

    let provider = Arc::new(
        ClaimsProvider::new(
            Arc::new(fixture.db.user_directory()),
            fixture.permissions.clone(),
        )
        .with_tenants(fixture.tenants.clone()),
    );
    let factory = PermissionClaimsPrincipalFactory::new(provider);
    let identity = factory
        .create(&u1.id.to_string(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(identity.claims().first_value(claim_types::USER_NAME), Some("U1"));

    let checker = UserPermissions::default();
    assert!(checker.has_permission(identity.claims(), "invoice.read"));
    assert!(!checker.has_permission(identity.claims(), "Invoice.Delete"));

    let json = serde_json::to_value(identity.claims()).unwrap();
    assert_eq!(json[2]["type"], "permission");
    assert_eq!(json[2]["value"], "Invoice.Read");
}
