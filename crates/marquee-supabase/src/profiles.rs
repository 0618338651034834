//! Profile and bookmark storage in Supabase PostgREST tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_auth::{
    Bookmark, MediaType, ProfileRecord, ProfileStore, ProfileUpdate, StoreError, WriteMode,
};
use marquee_config::Config;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{map_rest_error, map_store_transport_error, summarize_response_body};
use crate::session::SharedSession;

/// Row of the bookmarks table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BookmarkRow {
    user_id: String,
    media_type: MediaType,
    media_id: u64,
    title: String,
    #[serde(default)]
    poster_path: Option<String>,
    added_at: DateTime<Utc>,
}

impl BookmarkRow {
    fn new(user_id: &str, bookmark: &Bookmark) -> Self {
        Self {
            user_id: user_id.to_string(),
            media_type: bookmark.media_type,
            media_id: bookmark.media_id,
            title: bookmark.title.clone(),
            poster_path: bookmark.poster_path.clone(),
            added_at: bookmark.added_at,
        }
    }
}

impl From<BookmarkRow> for Bookmark {
    fn from(row: BookmarkRow) -> Self {
        Bookmark {
            media_type: row.media_type,
            media_id: row.media_id,
            title: row.title,
            poster_path: row.poster_path,
            added_at: row.added_at,
        }
    }
}

/// Profile store over the `profiles` and `bookmarks` tables, called as the
/// signed-in user. Row level security decides what is allowed.
#[derive(Clone)]
pub struct SupabaseProfileStore {
    http_client: reqwest::Client,
    supabase_url: String,
    anon_key: String,
    profiles_table: String,
    bookmarks_table: String,
    session: SharedSession,
}

impl SupabaseProfileStore {
    pub fn new(config: &Config, session: SharedSession) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            supabase_url: config.supabase_base(),
            anon_key: config.supabase_anon_key.clone(),
            profiles_table: config.profiles_table.clone(),
            bookmarks_table: config.bookmarks_table.clone(),
            session,
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.supabase_url, table)
    }

    /// Attach the API key and the user's token, or the anon key when signed out.
    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self
            .session
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<reqwest::Response, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(map_store_transport_error)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        let error = map_rest_error(status, &body);
        debug!(
            operation = %operation,
            status = %status,
            body_summary = %body_summary,
            "Supabase REST request failed"
        );
        Err(error)
    }
}

/// Full row for a replace write; unset fields are sent as null.
fn replace_body(id: &str, fields: &ProfileUpdate) -> serde_json::Value {
    let mut record = ProfileRecord::empty(id);
    record.apply(fields);
    serde_json::json!({
        "id": record.id,
        "email": record.email,
        "display_name": record.display_name,
        "gender": record.gender,
        "created_at": record.created_at,
        "last_login": record.last_login,
        "has_welcome_email_sent": record.has_welcome_email_sent,
        "email_verified": record.email_verified,
    })
}

/// Partial row for a merge write: only the set fields plus the key.
fn merge_body(id: &str, fields: &ProfileUpdate) -> Result<serde_json::Value, StoreError> {
    let mut body = serde_json::to_value(fields)
        .map_err(|e| StoreError::Other(format!("Could not encode profile: {}", e)))?;
    if let Some(object) = body.as_object_mut() {
        object.insert("id".to_string(), serde_json::json!(id));
    }
    Ok(body)
}

#[async_trait]
impl ProfileStore for SupabaseProfileStore {
    async fn write_profile(
        &self,
        id: &str,
        fields: &ProfileUpdate,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let request = match mode {
            WriteMode::Merge => self
                .http_client
                .post(format!("{}?on_conflict=id", self.rest_url(&self.profiles_table)))
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&merge_body(id, fields)?),
            WriteMode::Replace => self
                .http_client
                .put(format!("{}?id=eq.{}", self.rest_url(&self.profiles_table), id))
                .header("Prefer", "return=minimal")
                .json(&replace_body(id, fields)),
        };

        self.send(request, "write profile").await?;
        debug!(user_id = %id, mode = ?mode, "Profile written");
        Ok(())
    }

    async fn read_profile(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        let url = format!(
            "{}?id=eq.{}&select=*&limit=1",
            self.rest_url(&self.profiles_table),
            id
        );
        let response = self
            .send(
                self.http_client.get(&url).header("Accept", "application/json"),
                "read profile",
            )
            .await?;

        let rows: Vec<ProfileRecord> = response.json().await.map_err(map_store_transport_error)?;
        Ok(rows.into_iter().next())
    }

    async fn list_bookmarks(&self, id: &str) -> Result<Vec<Bookmark>, StoreError> {
        let url = format!(
            "{}?user_id=eq.{}&select=*&order=added_at.desc",
            self.rest_url(&self.bookmarks_table),
            id
        );
        let response = self
            .send(
                self.http_client.get(&url).header("Accept", "application/json"),
                "list bookmarks",
            )
            .await?;

        let rows: Vec<BookmarkRow> = response.json().await.map_err(map_store_transport_error)?;
        debug!(user_id = %id, count = rows.len(), "Fetched bookmarks");
        Ok(rows.into_iter().map(Bookmark::from).collect())
    }

    async fn put_bookmark(&self, id: &str, bookmark: &Bookmark) -> Result<(), StoreError> {
        let url = format!(
            "{}?on_conflict=user_id,media_type,media_id",
            self.rest_url(&self.bookmarks_table)
        );
        let request = self
            .http_client
            .post(&url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&BookmarkRow::new(id, bookmark));

        self.send(request, "put bookmark").await?;
        Ok(())
    }

    async fn remove_bookmark(
        &self,
        id: &str,
        media_type: MediaType,
        media_id: u64,
    ) -> Result<bool, StoreError> {
        let url = format!(
            "{}?user_id=eq.{}&media_type=eq.{}&media_id=eq.{}",
            self.rest_url(&self.bookmarks_table),
            id,
            media_type.as_str(),
            media_id
        );
        let request = self
            .http_client
            .delete(&url)
            .header("Prefer", "return=representation");

        let response = self.send(request, "remove bookmark").await?;
        let removed: Vec<serde_json::Value> =
            response.json().await.map_err(map_store_transport_error)?;
        Ok(!removed.is_empty())
    }
}
