//! Authentication commands.

use anyhow::Result;
use marquee_auth::{AuthStage, GatedSession, Gender, SignUpForm};
use marquee_config::Config;

use super::{confirm, prompt_line, AuthContext};
use crate::output::{self, OutputFormat};

/// Print the outcome of an auth operation, including the signed-in identity.
async fn report(ctx: &AuthContext, format: &OutputFormat) {
    let view = ctx.flow.view();
    if view.stage == AuthStage::SignedIn {
        let session = GatedSession::new(ctx.flow.subscribe_identity());
        if let Ok(identity) = session.require_identity() {
            let avatar = session
                .avatar(ctx.store.as_ref())
                .await
                .unwrap_or(marquee_auth::Avatar::Neutral);
            output::print_identity(&identity, avatar, format);
        }
    }
    output::print_view(&view, format);
}

/// Offer to resend the verification email until the user declines.
async fn offer_resend(ctx: &AuthContext, format: &OutputFormat) {
    while ctx.flow.stage() == AuthStage::VerificationPending
        && confirm("Resend the verification email?")
    {
        match ctx.flow.resend_verification().await {
            Ok(_) => output::print_view(&ctx.flow.view(), format),
            Err(e) => output::print_error(&e.user_message(), format),
        }
    }
}

/// Sign in with email and password.
pub async fn sign_in(config: &Config, email: Option<String>, format: &OutputFormat) -> Result<()> {
    let ctx = AuthContext::new(config);
    ctx.flow.open();

    let email = prompt_line("Email", email)?;
    let password = rpassword::prompt_password("Password: ")?;

    println!("Signing in...");
    match ctx.flow.submit_sign_in(&email, &password).await {
        Ok(AuthStage::SignUp) => {
            output::print_view(&ctx.flow.view(), format);
            println!("Run 'marquee sign-up' to create an account.");
        }
        Ok(AuthStage::VerificationPending) => {
            output::print_view(&ctx.flow.view(), format);
            offer_resend(&ctx, format).await;
        }
        Ok(_) => report(&ctx, format).await,
        Err(e) => output::print_error(&format!("Sign-in failed: {}", e.user_message()), format),
    }

    ctx.finish().await;
    Ok(())
}

/// Sign in through the configured federated provider in the browser.
pub async fn sign_in_federated(config: &Config, format: &OutputFormat) -> Result<()> {
    let ctx = AuthContext::new(config);
    ctx.flow.open();

    println!("Waiting for {} sign-in to complete...", config.federated_provider);
    match ctx.flow.submit_federated_sign_in().await {
        Ok(_) => report(&ctx, format).await,
        Err(e) => output::print_error(&format!("Sign-in failed: {}", e.user_message()), format),
    }

    ctx.finish().await;
    Ok(())
}

/// Create an account and wait for email verification.
pub async fn sign_up(
    config: &Config,
    email: Option<String>,
    display_name: Option<String>,
    gender: Option<Gender>,
    format: &OutputFormat,
) -> Result<()> {
    let ctx = AuthContext::new(config);
    ctx.flow.open();
    ctx.flow.request_sign_up()?;

    let email = prompt_line("Email", email)?;
    let display_name = prompt_line("Display name", display_name)?;
    let gender = match gender {
        Some(gender) => Some(gender),
        None => prompt_line("Gender (male/female)", None)?.parse().ok(),
    };
    let password = rpassword::prompt_password("Password: ")?;
    let confirm_password = rpassword::prompt_password("Confirm password: ")?;

    let form = SignUpForm {
        email,
        password,
        confirm_password,
        display_name,
        gender,
    };

    println!("Creating account...");
    match ctx.flow.submit_sign_up(&form).await {
        Ok(_) => {
            output::print_view(&ctx.flow.view(), format);
            offer_resend(&ctx, format).await;
        }
        Err(e) => output::print_error(&format!("Sign-up failed: {}", e.user_message()), format),
    }

    ctx.finish().await;
    Ok(())
}

/// Send a password reset link.
pub async fn reset_password(
    config: &Config,
    email: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let ctx = AuthContext::new(config);
    ctx.flow.open();
    ctx.flow.request_password_reset()?;

    let email = prompt_line("Email", email)?;
    match ctx.flow.submit_reset(&email).await {
        Ok(_) => output::print_success(
            &format!("If an account exists for {}, a reset link is on its way.", email),
            format,
        ),
        Err(e) => output::print_error(&format!("Reset failed: {}", e.user_message()), format),
    }

    ctx.finish().await;
    Ok(())
}

/// Resend the verification email for an account that is not verified yet.
///
/// Signing in to an unverified account already resends the link, so this
/// only reports the outcome.
pub async fn resend_verification(
    config: &Config,
    email: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let ctx = AuthContext::new(config);
    ctx.flow.open();

    let email = prompt_line("Email", email)?;
    let password = rpassword::prompt_password("Password: ")?;

    match ctx.flow.submit_sign_in(&email, &password).await {
        Ok(AuthStage::VerificationPending) => output::print_view(&ctx.flow.view(), format),
        Ok(AuthStage::SignedIn) => {
            output::print_success("Your email is already verified. You can sign in.", format)
        }
        Ok(_) => output::print_view(&ctx.flow.view(), format),
        Err(e) => output::print_error(&e.user_message(), format),
    }

    ctx.finish().await;
    Ok(())
}
