//! Views that only make sense for a verified identity.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::provider::ProfileStore;
use crate::{AuthError, AuthResult, Bookmark, Gender, Identity, MediaType, ProfileRecord};

/// Read-only handle on the ambient identity.
///
/// Gated views never sign anyone in or out; they only read what
/// [`crate::AuthFlow`] publishes.
#[derive(Debug, Clone)]
pub struct GatedSession {
    identity: watch::Receiver<Option<Identity>>,
}

impl GatedSession {
    pub fn new(identity: watch::Receiver<Option<Identity>>) -> Self {
        Self { identity }
    }

    /// The verified identity, if one is signed in.
    pub fn current(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// The verified identity, or [`AuthError::NotSignedIn`].
    pub fn require_identity(&self) -> AuthResult<Identity> {
        self.current().ok_or(AuthError::NotSignedIn)
    }

    /// Wait until the identity changes. Returns `false` once the flow is gone.
    pub async fn changed(&mut self) -> bool {
        self.identity.changed().await.is_ok()
    }

    /// Avatar for the signed-in identity, from its profile record.
    /// A failed read degrades to [`Avatar::Neutral`].
    pub async fn avatar(&self, profiles: &dyn ProfileStore) -> AuthResult<Avatar> {
        let identity = self.require_identity()?;
        match profiles.read_profile(&identity.id).await {
            Ok(record) => Ok(Avatar::for_profile(record.as_ref())),
            Err(error) => {
                warn!(user_id = %identity.id, error = %error, "Profile read failed, using neutral avatar");
                Ok(Avatar::Neutral)
            }
        }
    }
}

/// Avatar variant picked from the profile's gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Avatar {
    Male,
    Female,
    Neutral,
}

impl Avatar {
    pub fn for_profile(record: Option<&ProfileRecord>) -> Self {
        match record.and_then(|r| r.gender) {
            Some(Gender::Male) => Avatar::Male,
            Some(Gender::Female) => Avatar::Female,
            None => Avatar::Neutral,
        }
    }
}

/// Outcome of [`Bookmarks::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkChange {
    Added,
    Removed,
}

/// The signed-in identity's bookmarks.
pub struct Bookmarks {
    session: GatedSession,
    store: Arc<dyn ProfileStore>,
}

impl Bookmarks {
    pub fn new(session: GatedSession, store: Arc<dyn ProfileStore>) -> Self {
        Self { session, store }
    }

    /// All bookmarks, newest first.
    pub async fn list(&self) -> AuthResult<Vec<Bookmark>> {
        let identity = self.session.require_identity()?;
        let mut bookmarks = self.store.list_bookmarks(&identity.id).await?;
        bookmarks.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(bookmarks)
    }

    /// Add the title if absent, remove it if present.
    pub async fn toggle(
        &self,
        media_type: MediaType,
        media_id: u64,
        title: &str,
        poster_path: Option<String>,
    ) -> AuthResult<BookmarkChange> {
        let identity = self.session.require_identity()?;

        if self
            .store
            .remove_bookmark(&identity.id, media_type, media_id)
            .await?
        {
            debug!(user_id = %identity.id, media_type = media_type.as_str(), media_id, "Bookmark removed");
            return Ok(BookmarkChange::Removed);
        }

        let bookmark = Bookmark {
            media_type,
            media_id,
            title: title.to_string(),
            poster_path,
            added_at: Utc::now(),
        };
        self.store.put_bookmark(&identity.id, &bookmark).await?;
        debug!(user_id = %identity.id, key = %bookmark.key(), "Bookmark added");
        Ok(BookmarkChange::Added)
    }

    /// Remove a bookmark. Returns whether it existed.
    pub async fn remove(&self, media_type: MediaType, media_id: u64) -> AuthResult<bool> {
        let identity = self.session.require_identity()?;
        Ok(self
            .store
            .remove_bookmark(&identity.id, media_type, media_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_from_gender() {
        let mut record = ProfileRecord::empty("uid-1");
        assert_eq!(Avatar::for_profile(Some(&record)), Avatar::Neutral);
        record.gender = Some(Gender::Female);
        assert_eq!(Avatar::for_profile(Some(&record)), Avatar::Female);
        record.gender = Some(Gender::Male);
        assert_eq!(Avatar::for_profile(Some(&record)), Avatar::Male);
        assert_eq!(Avatar::for_profile(None), Avatar::Neutral);
    }

    #[test]
    fn test_require_identity_when_signed_out() {
        let (_tx, rx) = watch::channel(None);
        let session = GatedSession::new(rx);
        assert!(matches!(
            session.require_identity(),
            Err(AuthError::NotSignedIn)
        ));
    }
}
