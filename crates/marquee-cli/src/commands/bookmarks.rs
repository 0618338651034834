//! Bookmark commands. These need a verified sign-in first.

use anyhow::Result;
use marquee_auth::{BookmarkChange, Bookmarks, GatedSession, MediaType};
use marquee_config::Config;

use super::{prompt_line, AuthContext};
use crate::output::{self, OutputFormat};

/// Sign in interactively and hand back bookmarks for the identity.
async fn signed_in(
    config: &Config,
    email: Option<String>,
    format: &OutputFormat,
) -> Result<Option<(AuthContext, Bookmarks)>> {
    let ctx = AuthContext::new(config);
    ctx.flow.open();

    let email = prompt_line("Email", email)?;
    let password = rpassword::prompt_password("Password: ")?;

    if let Err(e) = ctx.flow.submit_sign_in(&email, &password).await {
        output::print_error(&format!("Sign-in failed: {}", e.user_message()), format);
        ctx.finish().await;
        return Ok(None);
    }

    let session = GatedSession::new(ctx.flow.subscribe_identity());
    if session.current().is_none() {
        output::print_view(&ctx.flow.view(), format);
        ctx.finish().await;
        return Ok(None);
    }

    let bookmarks = Bookmarks::new(session, ctx.store.clone());
    Ok(Some((ctx, bookmarks)))
}

/// List bookmarks, newest first.
pub async fn bookmarks_list(
    config: &Config,
    email: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let Some((ctx, bookmarks)) = signed_in(config, email, format).await? else {
        return Ok(());
    };

    match bookmarks.list().await {
        Ok(list) => output::print_bookmarks(&list, format),
        Err(e) => output::print_error(&e.user_message(), format),
    }

    ctx.finish().await;
    Ok(())
}

/// Add or remove a title depending on whether it is bookmarked.
pub async fn bookmarks_toggle(
    config: &Config,
    email: Option<String>,
    media_type: MediaType,
    media_id: u64,
    title: &str,
    format: &OutputFormat,
) -> Result<()> {
    let Some((ctx, bookmarks)) = signed_in(config, email, format).await? else {
        return Ok(());
    };

    match bookmarks.toggle(media_type, media_id, title, None).await {
        Ok(BookmarkChange::Added) => output::print_success(&format!("Bookmarked {}", title), format),
        Ok(BookmarkChange::Removed) => {
            output::print_success(&format!("Removed {} from bookmarks", title), format)
        }
        Err(e) => output::print_error(&e.user_message(), format),
    }

    ctx.finish().await;
    Ok(())
}

/// Bookmark a title (no-op if already bookmarked).
pub async fn bookmarks_add(
    config: &Config,
    email: Option<String>,
    media_type: MediaType,
    media_id: u64,
    title: &str,
    poster_path: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let Some((ctx, bookmarks)) = signed_in(config, email, format).await? else {
        return Ok(());
    };

    let existing = bookmarks.list().await;
    let already = existing
        .as_ref()
        .map(|list| {
            list.iter()
                .any(|b| b.media_type == media_type && b.media_id == media_id)
        })
        .unwrap_or(false);

    if already {
        output::print_success(&format!("{} is already bookmarked", title), format);
    } else {
        match bookmarks
            .toggle(media_type, media_id, title, poster_path)
            .await
        {
            Ok(_) => output::print_success(&format!("Bookmarked {}", title), format),
            Err(e) => output::print_error(&e.user_message(), format),
        }
    }

    ctx.finish().await;
    Ok(())
}

/// Remove a bookmark.
pub async fn bookmarks_remove(
    config: &Config,
    email: Option<String>,
    media_type: MediaType,
    media_id: u64,
    format: &OutputFormat,
) -> Result<()> {
    let Some((ctx, bookmarks)) = signed_in(config, email, format).await? else {
        return Ok(());
    };

    match bookmarks.remove(media_type, media_id).await {
        Ok(true) => output::print_success("Bookmark removed", format),
        Ok(false) => output::print_success("Nothing to remove", format),
        Err(e) => output::print_error(&e.user_message(), format),
    }

    ctx.finish().await;
    Ok(())
}
