//! Gated views over the ambient identity.

use super::harness::{TestHarness, PASSWORD};
use crate::{
    AuthError, Avatar, BookmarkChange, Bookmarks, GatedSession, Gender, MediaType,
    ProfileRecord,
};

const EMAIL: &str = "ada@example.com";

async fn signed_in() -> (TestHarness, String) {
    let h = TestHarness::new();
    let id = h.provider.add_account(EMAIL, PASSWORD, true);
    h.flow.open();
    h.flow.submit_sign_in(EMAIL, PASSWORD).await.unwrap();
    (h, id)
}

#[tokio::test]
async fn bookmarks_require_identity() {
    let h = TestHarness::new();
    let bookmarks = Bookmarks::new(GatedSession::new(h.flow.subscribe_identity()), h.store.clone());

    assert!(matches!(bookmarks.list().await, Err(AuthError::NotSignedIn)));
    assert!(matches!(
        bookmarks.toggle(MediaType::Movie, 603, "The Matrix", None).await,
        Err(AuthError::NotSignedIn)
    ));
}

#[tokio::test]
async fn toggle_adds_then_removes() {
    let (h, _) = signed_in().await;
    let bookmarks = Bookmarks::new(GatedSession::new(h.flow.subscribe_identity()), h.store.clone());

    assert_eq!(
        bookmarks
            .toggle(MediaType::Movie, 603, "The Matrix", Some("/m.jpg".to_string()))
            .await
            .unwrap(),
        BookmarkChange::Added
    );
    bookmarks
        .toggle(MediaType::Tv, 1399, "Game of Thrones", None)
        .await
        .unwrap();

    let keys: Vec<String> = bookmarks.list().await.unwrap().iter().map(|b| b.key()).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"movie:603".to_string()));
    assert!(keys.contains(&"tv:1399".to_string()));

    assert_eq!(
        bookmarks
            .toggle(MediaType::Movie, 603, "The Matrix", None)
            .await
            .unwrap(),
        BookmarkChange::Removed
    );
    assert!(!bookmarks.remove(MediaType::Movie, 603).await.unwrap());
    assert!(bookmarks.remove(MediaType::Tv, 1399).await.unwrap());
    assert!(bookmarks.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn gated_session_follows_sign_out() {
    let (h, id) = signed_in().await;
    let session = GatedSession::new(h.flow.subscribe_identity());
    assert_eq!(session.require_identity().unwrap().id, id);

    h.flow.sign_out().await.unwrap();

    assert!(session.current().is_none());
}

#[tokio::test]
async fn avatar_from_profile_gender() {
    let (h, id) = signed_in().await;
    let mut record = h.store.record(&id).unwrap_or_else(|| ProfileRecord::empty(&id));
    record.gender = Some(Gender::Male);
    h.store.insert(record);
    let session = GatedSession::new(h.flow.subscribe_identity());

    assert_eq!(session.avatar(h.store.as_ref()).await.unwrap(), Avatar::Male);
}

#[tokio::test]
async fn avatar_degrades_when_read_fails() {
    let (h, _) = signed_in().await;
    h.store.fail_reads(true);
    let session = GatedSession::new(h.flow.subscribe_identity());

    assert_eq!(session.avatar(h.store.as_ref()).await.unwrap(), Avatar::Neutral);
}
