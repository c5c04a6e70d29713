use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use schoolhouse::auth::models::Admin;
use schoolhouse::auth::{Permission, Role, TokenIssuer};

fn admin(role: Role) -> Admin {
    Admin {
        id: 7,
        admin_id: Some("ADM-007".to_string()),
        username: "clerk".to_string(),
        password_hash: String::new(),
        role,
        full_name: None,
        profile_image: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

fn bench_permission_check(c: &mut Criterion) {
    let principal = Role::Principal;
    let clerk = Role::admin([
        Permission::ViewStudents,
        Permission::AddStudents,
        Permission::ViewClasses,
    ]);

    c.bench_function("allows_principal", |b| {
        b.iter(|| black_box(&principal).allows(black_box(Permission::DeleteExams)))
    });

    c.bench_function("allows_admin_granted", |b| {
        b.iter(|| black_box(&clerk).allows(black_box(Permission::AddStudents)))
    });

    c.bench_function("allows_admin_denied", |b| {
        b.iter(|| black_box(&clerk).allows(black_box(Permission::ManageSiteContent)))
    });
}

fn bench_token_validation(c: &mut Criterion) {
    let issuer = TokenIssuer::new("bench-secret", "HS256", 240).unwrap();
    let token = issuer.issue(&admin(Role::admin([Permission::ViewStudents]))).unwrap();

    c.bench_function("token_issue", |b| {
        let admin = admin(Role::Principal);
        b.iter(|| issuer.issue(black_box(&admin)))
    });

    c.bench_function("token_validate", |b| {
        b.iter(|| issuer.validate(black_box(&token)))
    });

    c.bench_function("token_validate_and_subject", |b| {
        b.iter(|| {
            issuer
                .validate(black_box(&token))
                .and_then(|claims| claims.subject_id())
        })
    });
}

criterion_group!(benches, bench_permission_check, bench_token_validation);
criterion_main!(benches);
