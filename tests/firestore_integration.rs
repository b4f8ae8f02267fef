// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running and are skipped
//! when `FIRESTORE_EMULATOR_HOST` is not set.

use backend_boilerplate::db::{
    DocumentQuery, DocumentStore, Repository, SortDirection, UserDirectory, UserLookup,
};
use backend_boilerplate::error::AppError;
use backend_boilerplate::models::{AuthProvider, Item, SubscriptionTier, User, UserPatch};
use backend_boilerplate::time_utils::now_rfc3339;
use std::sync::Arc;

mod common;
use common::{test_db, unique_suffix};

fn test_user(suffix: &str) -> User {
    let now = now_rfc3339();
    User {
        id: format!("user-{}", suffix),
        email: format!("{}@example.com", suffix),
        password_hash: Some("$2b$04$hash".to_string()),
        full_name: Some("Test User".to_string()),
        avatar_url: None,
        provider: AuthProvider::Email,
        github_id: None,
        subscription_tier: SubscriptionTier::Free,
        created_at: now.clone(),
        updated_at: now,
        last_login: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_insert_and_lookup() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique_suffix());

    assert!(db
        .find_user(UserLookup::Email(&user.email))
        .await
        .unwrap()
        .is_none());

    let id = db.insert_user(&user).await.unwrap();
    assert_eq!(id, user.id);

    let by_id = db.find_user(UserLookup::Id(&user.id)).await.unwrap();
    assert_eq!(by_id.as_ref(), Some(&user));

    let by_email = db.find_user(UserLookup::Email(&user.email)).await.unwrap();
    assert_eq!(by_email.map(|u| u.id), Some(user.id.clone()));
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let user = test_user(&suffix);
    db.insert_user(&user).await.unwrap();

    let mut twin = test_user(&suffix);
    twin.id = format!("other-{}", suffix);

    assert!(matches!(
        db.insert_user(&twin).await,
        Err(AppError::Conflict(_))
    ));
    assert!(db.find_user(UserLookup::Id(&twin.id)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_inserts_admit_one() {
    require_emulator!();

    let db = Arc::new(test_db().await);
    let suffix = unique_suffix();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let db = db.clone();
            let mut user = test_user(&suffix);
            user.id = format!("racer-{}-{}", i, suffix);
            tokio::spawn(async move { db.insert_user(&user).await })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AppError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn test_github_link_and_lookup() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let user = test_user(&suffix);
    db.insert_user(&user).await.unwrap();

    let github_id = format!("gh-{}", suffix);
    db.update_user(
        &user.id,
        &UserPatch {
            github_id: Some(github_id.clone()),
            avatar_url: Some("https://avatars.test/a.png".to_string()),
            updated_at: now_rfc3339(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let found = db
        .find_user(UserLookup::GithubId(&github_id))
        .await
        .unwrap()
        .expect("linked user");
    assert_eq!(found.id, user.id);
    assert_eq!(found.full_name.as_deref(), Some("Test User"));
    assert_eq!(found.avatar_url.as_deref(), Some("https://avatars.test/a.png"));

    // A second account cannot claim the same GitHub id.
    let other = test_user(&unique_suffix());
    db.insert_user(&other).await.unwrap();
    let claim = db
        .update_user(
            &other.id,
            &UserPatch {
                github_id: Some(github_id),
                updated_at: now_rfc3339(),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(claim, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_rejected_insert_leaves_no_index_behind() {
    require_emulator!();

    let db = test_db().await;
    let github_id = format!("gh-{}", unique_suffix());

    let mut first = test_user(&unique_suffix());
    first.github_id = Some(github_id.clone());
    db.insert_user(&first).await.unwrap();

    // The email is free but the GitHub id is taken, so the whole insert fails.
    let mut second = test_user(&unique_suffix());
    second.github_id = Some(github_id.clone());
    assert!(matches!(
        db.insert_user(&second).await,
        Err(AppError::Conflict(msg)) if msg.contains("GitHub")
    ));
    assert!(db
        .find_user(UserLookup::Email(&second.email))
        .await
        .unwrap()
        .is_none());
    assert!(db.find_user(UserLookup::Id(&second.id)).await.unwrap().is_none());

    // Nothing from the failed attempt still holds the email.
    second.github_id = None;
    assert_eq!(db.insert_user(&second).await.unwrap(), second.id);

    let linked = db
        .find_user(UserLookup::GithubId(&github_id))
        .await
        .unwrap()
        .expect("original owner keeps the link");
    assert_eq!(linked.id, first.id);
}

#[tokio::test]
async fn test_relinking_github_releases_old_id() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let old_github = format!("gh-old-{}", suffix);
    let new_github = format!("gh-new-{}", suffix);

    let mut user = test_user(&suffix);
    user.github_id = Some(old_github.clone());
    db.insert_user(&user).await.unwrap();

    db.update_user(
        &user.id,
        &UserPatch {
            github_id: Some(new_github.clone()),
            updated_at: now_rfc3339(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(db
        .find_user(UserLookup::GithubId(&old_github))
        .await
        .unwrap()
        .is_none());
    let found = db
        .find_user(UserLookup::GithubId(&new_github))
        .await
        .unwrap()
        .expect("relinked user");
    assert_eq!(found.github_id.as_deref(), Some(new_github.as_str()));
}

#[tokio::test]
async fn test_ping() {
    require_emulator!();

    let db = test_db().await;
    db.ping().await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// DOCUMENT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_document_crud() {
    require_emulator!();

    let store: Arc<dyn DocumentStore> = Arc::new(test_db().await);
    let items: Repository<Item> = Repository::new(store);
    let item = Item {
        id: unique_suffix(),
        name: "Widget".to_string(),
        description: "".to_string(),
        price: 3.25,
    };

    items.insert(&item).await.unwrap();
    assert!(matches!(
        items.insert(&item).await,
        Err(AppError::Conflict(_))
    ));

    let fetched = items.get(&item.id).await.unwrap().expect("stored item");
    assert_eq!(fetched.price, 3.25);

    let renamed = Item {
        name: "Gadget".to_string(),
        ..item.clone()
    };
    assert!(items.replace(&renamed).await.unwrap());
    assert_eq!(items.get(&item.id).await.unwrap().unwrap().name, "Gadget");

    assert!(items.delete(&item.id).await.unwrap());
    assert!(items.get(&item.id).await.unwrap().is_none());
    assert!(!items.delete(&item.id).await.unwrap());
    assert!(!items.replace(&renamed).await.unwrap());
}

#[tokio::test]
async fn test_document_query_filter_order_page() {
    require_emulator!();

    let store: Arc<dyn DocumentStore> = Arc::new(test_db().await);
    let items: Repository<Item> = Repository::new(store);
    let tag = unique_suffix();

    for (name, price) in [("b", 2.0), ("a", 1.0), ("c", 3.0)] {
        items
            .insert(&Item {
                id: format!("{}-{}", tag, name),
                name: name.to_string(),
                description: tag.clone(),
                price,
            })
            .await
            .unwrap();
    }

    let query = DocumentQuery::new()
        .filter("description", tag.as_str())
        .order_by("price", SortDirection::Descending)
        .limit(2)
        .offset(1);
    let page = items.find(&query).await.unwrap();

    let names: Vec<&str> = page.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["b", "a"]);
}
