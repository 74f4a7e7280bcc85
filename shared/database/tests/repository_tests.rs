//! Repository tests against a real Postgres.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p cardhub-database -- --ignored`.

use std::collections::BTreeMap;

use cardhub_database::{
    migrations::run_postgres_migrations, IdCardRepository, NewIdCard, NewOrganization, NewTemplate,
    NewUser, OrganizationRepository, TemplateRepository, UserRepository,
};
use cardhub_models::{
    CardSide, CardStatus, FieldType, IdCardFilter, Orientation, PageRequest, Principal, Resource,
    Role, Scope, TemplateField,
};
use cardhub_utils::CardHubError;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    let pool = PgPool::connect(&url).await.unwrap();
    run_postgres_migrations(&pool).await.unwrap();
    pool
}

/// Random 10-digit mobile so runs do not collide.
fn mobile() -> String {
    format!("9{:09}", Uuid::new_v4().as_u128() % 1_000_000_000)
}

fn code() -> String {
    format!("T{}", &Uuid::new_v4().simple().to_string()[..8].to_uppercase())
}

fn new_user(role: Role) -> NewUser {
    NewUser {
        name: format!("{role} user"),
        email: None,
        mobile: mobile(),
        password_hash: "not-a-real-hash".to_string(),
        role,
        organization_id: None,
        created_by: None,
    }
}

fn new_organization(code: String, agent_id: Option<Uuid>) -> NewOrganization {
    NewOrganization {
        name: "Test School".to_string(),
        code,
        email: None,
        mobile: None,
        address: None,
        logo_url: None,
        agent_id,
        created_by: Uuid::new_v4(),
    }
}

async fn organization(pool: &PgPool, agent_id: Option<Uuid>) -> (Uuid, Uuid) {
    let (org, admin) = OrganizationRepository::new(pool.clone())
        .create_with_admin(&new_organization(code(), agent_id), new_user(Role::Admin))
        .await
        .unwrap();
    assert_eq!(admin.organization_id, Some(org.id));
    (org.id, admin.id)
}

fn new_template(organization_id: Uuid, name: &str, created_by: Uuid) -> NewTemplate {
    NewTemplate {
        organization_id,
        name: name.to_string(),
        description: None,
        orientation: Orientation::Portrait,
        front_background_url: None,
        back_background_url: None,
        fields: vec![TemplateField {
            key: "roll_no".to_string(),
            label: "Roll No".to_string(),
            field_type: FieldType::Number,
            side: CardSide::Front,
            position: 0,
            required: true,
        }],
        created_by,
    }
}

async fn template(pool: &PgPool, organization_id: Uuid, created_by: Uuid) -> Uuid {
    TemplateRepository::new(pool.clone())
        .create(&new_template(
            organization_id,
            &format!("Student {}", Uuid::new_v4()),
            created_by,
        ))
        .await
        .unwrap()
        .id
}

fn new_card(organization_id: Uuid, template_id: Uuid, created_by: Uuid) -> NewIdCard {
    let mut data = BTreeMap::new();
    data.insert("roll_no".to_string(), "12".to_string());
    NewIdCard {
        organization_id,
        template_id,
        holder_name: "Asha".to_string(),
        photo_url: None,
        data,
        issue_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        expiry_date: NaiveDate::from_ymd_opt(2025, 5, 31),
        created_by,
    }
}

#[tokio::test]
#[ignore]
async fn card_numbers_are_sequential_per_organization() {
    let pool = pool().await;
    let (org, admin) = organization(&pool, None).await;
    let template_id = template(&pool, org, admin).await;
    let cards = IdCardRepository::new(pool.clone());

    let first = cards.create(&new_card(org, template_id, admin)).await.unwrap();
    let second = cards.create(&new_card(org, template_id, admin)).await.unwrap();

    assert!(first.card_number.ends_with("-2024-000001"));
    assert!(second.card_number.ends_with("-2024-000002"));
    assert_eq!(first.status, CardStatus::Draft);
}

#[tokio::test]
#[ignore]
async fn staff_only_see_their_own_cards() {
    let pool = pool().await;
    let (org, admin) = organization(&pool, None).await;
    let template_id = template(&pool, org, admin).await;
    let staff = UserRepository::new(pool.clone())
        .create(&NewUser {
            organization_id: Some(org),
            ..new_user(Role::Staff)
        })
        .await
        .unwrap();

    let cards = IdCardRepository::new(pool.clone());
    let by_admin = cards.create(&new_card(org, template_id, admin)).await.unwrap();
    let by_staff = cards.create(&new_card(org, template_id, staff.id)).await.unwrap();

    let scope = staff.principal().scope(Resource::IdCards);
    let (visible, total) = cards
        .list(&scope, &IdCardFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(visible[0].id, by_staff.id);
    assert!(cards.find_scoped(by_admin.id, &scope).await.unwrap().is_none());

    let admin_scope = Scope::Organization(org);
    let (_, total) = cards
        .list(&admin_scope, &IdCardFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(total, 2);
}

#[tokio::test]
#[ignore]
async fn agents_only_see_their_organizations() {
    let pool = pool().await;
    let agent = UserRepository::new(pool.clone())
        .create(&new_user(Role::Agent))
        .await
        .unwrap();
    let (mine, _) = organization(&pool, Some(agent.id)).await;
    let (theirs, _) = organization(&pool, None).await;

    let scope = Principal::new(agent.id, Role::Agent, None).scope(Resource::Organizations);
    let organizations = OrganizationRepository::new(pool.clone());
    assert!(organizations.find_scoped(mine, &scope).await.unwrap().is_some());
    assert!(organizations.find_scoped(theirs, &scope).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn status_update_requires_the_expected_current_status() {
    let pool = pool().await;
    let (org, admin) = organization(&pool, None).await;
    let template_id = template(&pool, org, admin).await;
    let cards = IdCardRepository::new(pool.clone());
    let card = cards.create(&new_card(org, template_id, admin)).await.unwrap();

    let approved = cards
        .update_status(card.id, CardStatus::Draft, CardStatus::Approved)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approved.status, CardStatus::Approved);

    let stale = cards
        .update_status(card.id, CardStatus::Draft, CardStatus::Revoked)
        .await
        .unwrap();
    assert!(stale.is_none());
}

#[tokio::test]
#[ignore]
async fn deleting_an_organization_removes_its_members() {
    let pool = pool().await;
    let (org, admin) = organization(&pool, None).await;
    let users = UserRepository::new(pool.clone());

    assert!(OrganizationRepository::new(pool.clone()).delete(org).await.unwrap());
    assert!(users.find_by_id(admin).await.unwrap().is_none());
}

/// Status the API would answer with for a failed repository call.
fn api_status(error: anyhow::Error) -> u16 {
    CardHubError::from(error).http_status_code()
}

#[tokio::test]
#[ignore]
async fn duplicate_mobile_is_detected_and_rejected() {
    let pool = pool().await;
    let users = UserRepository::new(pool.clone());
    let first = users.create(&new_user(Role::Agent)).await.unwrap();

    assert!(users.mobile_exists(&first.mobile, None).await.unwrap());
    assert!(!users.mobile_exists(&first.mobile, Some(first.id)).await.unwrap());

    let err = users
        .create(&NewUser {
            mobile: first.mobile.clone(),
            ..new_user(Role::Agent)
        })
        .await
        .unwrap_err();
    assert_eq!(api_status(err), 409);
}

#[tokio::test]
#[ignore]
async fn template_names_are_unique_per_organization_ignoring_case() {
    let pool = pool().await;
    let (org, admin) = organization(&pool, None).await;
    let (other_org, other_admin) = organization(&pool, None).await;
    let templates = TemplateRepository::new(pool.clone());

    let name = format!("Visitor {}", Uuid::new_v4().simple());
    let created = templates.create(&new_template(org, &name, admin)).await.unwrap();

    let shouted = name.to_uppercase();
    assert!(templates.name_exists(org, &shouted, None).await.unwrap());
    assert!(!templates.name_exists(org, &shouted, Some(created.id)).await.unwrap());
    assert!(!templates.name_exists(other_org, &name, None).await.unwrap());

    let err = templates
        .create(&new_template(org, &shouted, admin))
        .await
        .unwrap_err();
    assert_eq!(api_status(err), 409);

    templates
        .create(&new_template(other_org, &name, other_admin))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn duplicate_organization_code_is_rejected() {
    let pool = pool().await;
    let organizations = OrganizationRepository::new(pool.clone());
    let taken = code();
    organizations
        .create_with_admin(&new_organization(taken.clone(), None), new_user(Role::Admin))
        .await
        .unwrap();

    assert!(organizations.code_exists(&taken).await.unwrap());
    let err = organizations
        .create_with_admin(&new_organization(taken, None), new_user(Role::Admin))
        .await
        .unwrap_err();
    assert_eq!(api_status(err), 409);
}

#[tokio::test]
#[ignore]
async fn deleting_a_template_in_use_is_a_conflict() {
    let pool = pool().await;
    let (org, admin) = organization(&pool, None).await;
    let template_id = template(&pool, org, admin).await;
    IdCardRepository::new(pool.clone())
        .create(&new_card(org, template_id, admin))
        .await
        .unwrap();

    let err = TemplateRepository::new(pool.clone())
        .delete(template_id)
        .await
        .unwrap_err();
    assert_eq!(api_status(err), 409);
}
