//! The auth flow: single authority over the ambient identity.
//!
//! `AuthFlow` drives the [`AuthMachine`] in response to form events, calls the
//! credential provider and profile store, and publishes two channels:
//!
//! - the ambient identity (`Option<Identity>`), only ever `Some` for a
//!   verified identity;
//! - an [`AuthView`] snapshot telling the auth surface what to render.
//!
//! Explicit handlers and the provider's session observer both funnel through
//! [`AuthFlow::reconcile`], the only writer of the identity channel, so the
//! two paths converge on the same stage whichever resolves first.
//!
//! Handlers hold an in-flight ticket: a second submit while one is pending
//! fails with [`AuthError::Busy`]. Closing the surface starts a new epoch;
//! results that arrive for an older epoch only perform the forced sign-out of
//! unverified sessions and otherwise leave state alone.

use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthStage};
use crate::provider::{CredentialProvider, ProfileStore, WelcomeNotifier};
use crate::validation::{validate_email, validate_sign_in, SignUpForm};
use crate::{
    AuthError, AuthResult, Identity, PendingVerification, ProfileUpdate, ProviderError,
    StoreError, WriteMode,
};

const NOTICE_VERIFICATION_SENT: &str = "Verification email sent. Check your inbox.";
const NOTICE_ALREADY_VERIFIED: &str = "Your email is already verified. Please sign in.";
const NOTICE_NO_ACCOUNT: &str = "No account found for this email. Create one below.";
const NOTICE_SIGNED_OUT: &str = "You have been signed out.";

/// What the auth surface should render right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthView {
    pub stage: AuthStage,
    /// Inline error for the active form.
    pub error: Option<String>,
    /// Non-fatal problems from best-effort side effects.
    pub warnings: Vec<String>,
    /// Transient confirmation (e.g. "verification email sent").
    pub notice: Option<String>,
    /// True while an operation is outstanding; controls should be disabled.
    pub busy: bool,
    /// Email of the account waiting for verification.
    pub pending_email: Option<String>,
    /// Email the last reset link was sent to.
    pub reset_email: Option<String>,
}

impl Default for AuthView {
    fn default() -> Self {
        Self {
            stage: AuthStage::SignedOut,
            error: None,
            warnings: Vec::new(),
            notice: None,
            busy: false,
            pending_email: None,
            reset_email: None,
        }
    }
}

/// Which path delivered a session to [`AuthFlow::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionSource {
    Observer,
    SignIn,
    SignUp,
    Resend,
    SignOut,
}

struct FlowInner {
    fsm: AuthMachine,
    pending: Option<PendingVerification>,
    reset_email: Option<String>,
    error: Option<String>,
    warnings: Vec<String>,
    notice: Option<String>,
    busy: bool,
    epoch: u64,
}

impl FlowInner {
    fn stage(&self) -> AuthStage {
        AuthStage::from(self.fsm.state())
    }

    fn transition(&mut self, input: AuthMachineInput) -> AuthResult<AuthStage> {
        let old_stage = self.stage();

        self.fsm.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                self.fsm.state()
            ))
        })?;

        let new_stage = self.stage();
        if old_stage != new_stage {
            debug!(old_stage = %old_stage, new_stage = %new_stage, "Auth stage transition");
        }
        Ok(new_stage)
    }

    fn clear_ephemeral(&mut self) {
        self.pending = None;
        self.reset_email = None;
        self.error = None;
        self.warnings.clear();
        self.notice = None;
    }

    fn pending_token(&self) -> Option<&str> {
        self.pending.as_ref().and_then(|p| p.identity_id.as_deref())
    }

    /// Whether `identity` is the account waiting for verification. Accounts
    /// reached through a refused sign-in have no token, only an email.
    fn is_pending(&self, identity: &Identity) -> bool {
        self.pending_token() == Some(identity.id.as_str())
            || self
                .pending
                .as_ref()
                .is_some_and(|p| p.email.eq_ignore_ascii_case(&identity.email))
    }

    fn snapshot(&self) -> AuthView {
        AuthView {
            stage: self.stage(),
            error: self.error.clone(),
            warnings: self.warnings.clone(),
            notice: self.notice.clone(),
            busy: self.busy,
            pending_email: self.pending.as_ref().map(|p| p.email.clone()),
            reset_email: self.reset_email.clone(),
        }
    }
}

/// In-flight marker for one handler invocation.
struct Ticket<'a> {
    flow: &'a AuthFlow,
    epoch: u64,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        {
            let mut inner = self.flow.inner.lock();
            if inner.epoch == self.epoch {
                inner.busy = false;
            }
        }
        self.flow.publish_view();
    }
}

/// The auth state machine holder. Share it as `Arc<AuthFlow>`.
pub struct AuthFlow {
    provider: Arc<dyn CredentialProvider>,
    profiles: Arc<dyn ProfileStore>,
    welcome: Option<Arc<dyn WelcomeNotifier>>,
    inner: Mutex<FlowInner>,
    identity_tx: watch::Sender<Option<Identity>>,
    view_tx: watch::Sender<AuthView>,
}

impl AuthFlow {
    /// Create a flow in the signed-out stage.
    pub fn new(provider: Arc<dyn CredentialProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        let (identity_tx, _) = watch::channel(None);
        let (view_tx, _) = watch::channel(AuthView::default());

        Self {
            provider,
            profiles,
            welcome: None,
            inner: Mutex::new(FlowInner {
                fsm: AuthMachine::new(),
                pending: None,
                reset_email: None,
                error: None,
                warnings: Vec::new(),
                notice: None,
                busy: false,
                epoch: 0,
            }),
            identity_tx,
            view_tx,
        }
    }

    /// Send a welcome email after the first verified sign-in.
    pub fn with_welcome_notifier(mut self, notifier: Arc<dyn WelcomeNotifier>) -> Self {
        self.welcome = Some(notifier);
        self
    }

    /// The current verified identity, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.identity_tx.borrow().clone()
    }

    /// Subscribe to identity changes. Read-only for views.
    pub fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    /// Current surface snapshot.
    pub fn view(&self) -> AuthView {
        self.inner.lock().snapshot()
    }

    /// Subscribe to surface snapshots.
    pub fn subscribe_view(&self) -> watch::Receiver<AuthView> {
        self.view_tx.subscribe()
    }

    /// Current stage.
    pub fn stage(&self) -> AuthStage {
        self.inner.lock().stage()
    }

    // ==========================================
    // Surface navigation
    // ==========================================

    /// Open the auth surface on the sign-in form.
    pub fn open(&self) -> AuthStage {
        let stage = {
            let mut inner = self.inner.lock();
            match inner.stage() {
                AuthStage::SignedOut => inner
                    .transition(AuthMachineInput::OpenSurface)
                    .unwrap_or(AuthStage::SignedOut),
                stage => stage,
            }
        };
        self.publish_view();
        stage
    }

    /// Close the auth surface, discarding all ephemeral form state.
    ///
    /// Outstanding requests are not cancelled; their results are ignored.
    /// A signed-in identity is unaffected.
    pub fn close(&self) -> AuthStage {
        let stage = {
            let mut inner = self.inner.lock();
            if inner.stage().is_signed_in() {
                return AuthStage::SignedIn;
            }

            inner.epoch += 1;
            inner.busy = false;
            inner.clear_ephemeral();
            if inner.stage() != AuthStage::SignedOut {
                // Every form stage accepts CloseSurface.
                let _ = inner.transition(AuthMachineInput::CloseSurface);
            }
            inner.stage()
        };
        self.publish_view();
        stage
    }

    /// Switch to the sign-up form.
    pub fn request_sign_up(&self) -> AuthResult<AuthStage> {
        self.navigate(AuthMachineInput::RequestSignUp)
    }

    /// Switch to the password reset form.
    pub fn request_password_reset(&self) -> AuthResult<AuthStage> {
        self.navigate(AuthMachineInput::RequestPasswordReset)
    }

    /// Leave verification / reset / sign-up screens for the sign-in form.
    /// Discards any pending verification.
    pub fn return_to_sign_in(&self) -> AuthResult<AuthStage> {
        self.navigate(AuthMachineInput::ReturnToSignIn)
    }

    fn navigate(&self, input: AuthMachineInput) -> AuthResult<AuthStage> {
        let result = {
            let mut inner = self.inner.lock();
            if inner.busy {
                return Err(AuthError::Busy);
            }
            let stage = inner.transition(input)?;
            inner.clear_ephemeral();
            Ok(stage)
        };
        self.publish_view();
        result
    }

    // ==========================================
    // Sign-in
    // ==========================================

    /// Sign in with email and password.
    ///
    /// - verified account: profile is merged (best-effort), stage `SignedIn`
    /// - unverified account: verification mail resent, session dropped,
    ///   stage `VerificationPending`
    /// - no such account: stage `SignUp`
    /// - any other failure: stage unchanged, error shown inline
    pub async fn submit_sign_in(&self, email: &str, password: &str) -> AuthResult<AuthStage> {
        let ticket = self.begin(&[AuthStage::SignedOut, AuthStage::SignIn])?;
        let result = self.sign_in_with_password(&ticket, email, password).await;
        self.finish(ticket, result)
    }

    /// Sign in through the federated provider.
    pub async fn submit_federated_sign_in(&self) -> AuthResult<AuthStage> {
        let ticket = self.begin(&[AuthStage::SignedOut, AuthStage::SignIn])?;
        let result = match self.provider.sign_in_with_federated_provider().await {
            Ok(identity) => self.complete_sign_in(&ticket, identity, None).await,
            Err(error) => Err(error.into()),
        };
        self.finish(ticket, result)
    }

    async fn sign_in_with_password(
        &self,
        ticket: &Ticket<'_>,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthStage> {
        validate_sign_in(email, password)?;
        let email = email.trim();

        match self.provider.sign_in_with_password(email, password).await {
            Ok(identity) => {
                self.complete_sign_in(ticket, identity, Some(password))
                    .await
            }
            Err(ProviderError::EmailNotVerified) => {
                // Provider refused the session outright; nothing to sign out.
                debug!(email = %email, "Sign-in refused until email is verified, resending link");
                self.enter_verification_pending(
                    ticket,
                    PendingVerification {
                        email: email.to_string(),
                        password: Some(password.to_string()),
                        display_name: None,
                        gender: None,
                        identity_id: None,
                    },
                )
                .await
            }
            Err(ProviderError::NoAccount) => {
                let mut inner = self.inner.lock();
                if inner.epoch != ticket.epoch {
                    return Ok(inner.stage());
                }
                let stage = inner.transition(AuthMachineInput::NoAccount)?;
                inner.notice = Some(NOTICE_NO_ACCOUNT.to_string());
                Ok(stage)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn complete_sign_in(
        &self,
        ticket: &Ticket<'_>,
        identity: Identity,
        password: Option<&str>,
    ) -> AuthResult<AuthStage> {
        if !identity.email_verified {
            info!(user_id = %identity.id, "Signed in with unverified email, routing to verification");
            let pending = PendingVerification {
                email: identity.email.clone(),
                password: password.map(str::to_string),
                display_name: identity.display_name.clone(),
                gender: None,
                identity_id: Some(identity.id.clone()),
            };
            // Send while the provider session is still open, then drop it.
            let send_result = self.provider.send_verification_email(&identity.email).await;
            self.reconcile(SessionSource::SignIn, Some(identity)).await;
            return self
                .enter_verification_pending_with(ticket, pending, send_result)
                .await;
        }

        // The observer may already have published this identity, which
        // retires the ticket; the sign-in still has to be recorded.
        let observer_won = self
            .identity()
            .is_some_and(|current| current.id == identity.id);
        if !self.is_current(ticket) && !observer_won {
            debug!(user_id = %identity.id, "Ignoring sign-in result from a closed surface");
            return Ok(self.stage());
        }

        let warnings = self.record_sign_in(&identity).await;

        let user_id = identity.id.clone();
        let stage = self.reconcile(SessionSource::SignIn, Some(identity)).await;
        if stage.is_signed_in() && !warnings.is_empty() {
            self.inner.lock().warnings.extend(warnings);
            self.publish_view();
        }
        info!(user_id = %user_id, "Sign-in complete");
        Ok(stage)
    }

    async fn enter_verification_pending(
        &self,
        ticket: &Ticket<'_>,
        pending: PendingVerification,
    ) -> AuthResult<AuthStage> {
        let send_result = self.provider.send_verification_email(&pending.email).await;
        self.enter_verification_pending_with(ticket, pending, send_result)
            .await
    }

    async fn enter_verification_pending_with(
        &self,
        ticket: &Ticket<'_>,
        pending: PendingVerification,
        send_result: Result<(), ProviderError>,
    ) -> AuthResult<AuthStage> {
        let mut inner = self.inner.lock();
        if inner.epoch != ticket.epoch {
            return Ok(inner.stage());
        }

        let stage = inner.transition(AuthMachineInput::SignInUnverified)?;
        inner.pending = Some(pending);
        match send_result {
            Ok(()) => inner.notice = Some(NOTICE_VERIFICATION_SENT.to_string()),
            Err(error) => {
                warn!(error = %error, "Verification email could not be sent");
                inner
                    .warnings
                    .push(format!("Verification email could not be sent: {}", error));
            }
        }
        Ok(stage)
    }

    // ==========================================
    // Sign-up and verification
    // ==========================================

    /// Create a password account and wait for email verification.
    pub async fn submit_sign_up(&self, form: &SignUpForm) -> AuthResult<AuthStage> {
        let ticket = self.begin(&[AuthStage::SignUp])?;
        let result = self.sign_up(&ticket, form).await;
        self.finish(ticket, result)
    }

    async fn sign_up(&self, ticket: &Ticket<'_>, form: &SignUpForm) -> AuthResult<AuthStage> {
        let valid = form.validate()?;

        // Mark the email pending before the account exists: an auto-confirming
        // provider may report the new session before `create` returns.
        let pending = PendingVerification {
            email: valid.email.clone(),
            password: Some(valid.password.clone()),
            display_name: Some(valid.display_name.clone()),
            gender: Some(valid.gender),
            identity_id: None,
        };
        {
            let mut inner = self.inner.lock();
            if inner.epoch == ticket.epoch {
                inner.pending = Some(pending.clone());
            }
        }

        let identity = match self
            .provider
            .create_account_with_password(&valid.email, &valid.password, &valid.display_name)
            .await
        {
            Ok(identity) => identity,
            Err(error) => {
                let mut inner = self.inner.lock();
                if inner.epoch == ticket.epoch {
                    inner.pending = None;
                }
                return Err(error.into());
            }
        };

        // The id becomes the pending token.
        let current = {
            let mut inner = self.inner.lock();
            let current = inner.epoch == ticket.epoch;
            if current {
                inner.pending = Some(PendingVerification {
                    identity_id: Some(identity.id.clone()),
                    ..pending
                });
            }
            current
        };
        if !current {
            debug!(user_id = %identity.id, "Account created after surface closed, signing out");
            self.reconcile(SessionSource::SignUp, Some(identity)).await;
            return Ok(self.stage());
        }

        info!(user_id = %identity.id, "Account created, awaiting verification");
        let mut warnings = Vec::new();

        if let Err(error) = self
            .provider
            .update_display_name(&identity, &valid.display_name)
            .await
        {
            warn!(user_id = %identity.id, error = %error, "Display name update failed");
        }

        let profile = ProfileUpdate {
            email: Some(valid.email.clone()),
            display_name: Some(valid.display_name.clone()),
            gender: Some(valid.gender),
            created_at: Some(Utc::now()),
            has_welcome_email_sent: Some(false),
            email_verified: Some(false),
            ..Default::default()
        };
        if let Err(error) = self
            .profiles
            .write_profile(&identity.id, &profile, WriteMode::Merge)
            .await
        {
            warnings.extend(store_warning(&identity.id, "write profile", &error));
        }

        let sent = match self.provider.send_verification_email(&valid.email).await {
            Ok(()) => true,
            Err(error) => {
                warn!(user_id = %identity.id, error = %error, "Verification email could not be sent");
                warnings.push(format!("Verification email could not be sent: {}", error));
                false
            }
        };

        self.reconcile(SessionSource::SignUp, Some(identity)).await;

        let mut inner = self.inner.lock();
        if inner.epoch != ticket.epoch {
            return Ok(inner.stage());
        }
        let stage = inner.transition(AuthMachineInput::AccountCreated)?;
        inner.warnings.extend(warnings);
        if sent {
            inner.notice = Some(NOTICE_VERIFICATION_SENT.to_string());
        }
        Ok(stage)
    }

    /// Resend the verification email for the pending account.
    ///
    /// Signs in transiently with the held credentials only to trigger the
    /// send, then signs out again. The profile store is not touched.
    pub async fn resend_verification(&self) -> AuthResult<AuthStage> {
        let ticket = self.begin(&[AuthStage::VerificationPending])?;
        let result = self.resend(&ticket).await;
        self.finish(ticket, result)
    }

    async fn resend(&self, ticket: &Ticket<'_>) -> AuthResult<AuthStage> {
        let pending = self
            .inner
            .lock()
            .pending
            .clone()
            .ok_or(AuthError::NothingPending)?;

        let outcome = match pending.password.as_deref() {
            Some(password) => {
                match self
                    .provider
                    .sign_in_with_password(&pending.email, password)
                    .await
                {
                    Ok(identity) if identity.email_verified => {
                        self.reconcile(SessionSource::Resend, Some(identity)).await;
                        Ok(NOTICE_ALREADY_VERIFIED)
                    }
                    Ok(identity) => {
                        let sent = self.provider.send_verification_email(&pending.email).await;
                        self.reconcile(SessionSource::Resend, Some(identity)).await;
                        sent.map(|()| NOTICE_VERIFICATION_SENT)
                    }
                    Err(ProviderError::EmailNotVerified) => self
                        .provider
                        .send_verification_email(&pending.email)
                        .await
                        .map(|()| NOTICE_VERIFICATION_SENT),
                    Err(error) => Err(error),
                }
            }
            None => self
                .provider
                .send_verification_email(&pending.email)
                .await
                .map(|()| NOTICE_VERIFICATION_SENT),
        };

        let notice = outcome?;
        let mut inner = self.inner.lock();
        if inner.epoch == ticket.epoch {
            inner.notice = Some(notice.to_string());
        }
        Ok(inner.stage())
    }

    // ==========================================
    // Password reset
    // ==========================================

    /// Send a password reset link. Invalid emails never reach the provider.
    pub async fn submit_reset(&self, email: &str) -> AuthResult<AuthStage> {
        let ticket = self.begin(&[AuthStage::PasswordReset])?;
        let result = self.reset(&ticket, email).await;
        self.finish(ticket, result)
    }

    async fn reset(&self, ticket: &Ticket<'_>, email: &str) -> AuthResult<AuthStage> {
        validate_email(email)?;
        let email = email.trim();

        self.provider.send_password_reset_email(email).await?;
        debug!(email = %email, "Password reset email sent");

        let mut inner = self.inner.lock();
        if inner.epoch != ticket.epoch {
            return Ok(inner.stage());
        }
        let stage = inner.transition(AuthMachineInput::ResetEmailSent)?;
        inner.reset_email = Some(email.to_string());
        Ok(stage)
    }

    // ==========================================
    // Sign-out and session observation
    // ==========================================

    /// Sign the current identity out.
    pub async fn sign_out(&self) -> AuthResult<AuthStage> {
        let ticket = self.begin(&[AuthStage::SignedIn])?;

        if let Err(error) = self.provider.sign_out().await {
            warn!(error = %error, "Provider sign-out failed, clearing local identity anyway");
        }

        let result = {
            let mut inner = self.inner.lock();
            // The observer may already have seen the session end.
            let stage = if inner.stage().is_signed_in() {
                inner.transition(AuthMachineInput::SignOut)
            } else {
                Ok(inner.stage())
            };
            if stage.is_ok() {
                inner.clear_ephemeral();
                inner.notice = Some(NOTICE_SIGNED_OUT.to_string());
            }
            stage
        };
        self.reconcile(SessionSource::SignOut, None).await;
        info!("Signed out");
        self.finish(ticket, result)
    }

    /// Feed a session change reported by the provider.
    pub async fn on_session_changed(&self, session: Option<Identity>) -> AuthStage {
        self.reconcile(SessionSource::Observer, session).await
    }

    /// Spawn a task forwarding provider session changes into
    /// [`AuthFlow::on_session_changed`]. The task ends when the flow is
    /// dropped or the provider closes its channel.
    pub fn spawn_session_observer(self: &Arc<Self>) -> JoinHandle<()> {
        let mut sessions = self.provider.observe_session_changes();
        let flow: Weak<AuthFlow> = Arc::downgrade(self);

        tokio::spawn(async move {
            let initial = sessions.borrow_and_update().clone();
            match flow.upgrade() {
                Some(flow) => {
                    flow.on_session_changed(initial).await;
                }
                None => return,
            }

            while sessions.changed().await.is_ok() {
                let session = sessions.borrow_and_update().clone();
                let Some(flow) = flow.upgrade() else {
                    break;
                };
                flow.on_session_changed(session).await;
            }
            debug!("Session observer stopped");
        })
    }

    /// Bring the ambient identity in line with a reported session.
    ///
    /// Rules:
    /// - no session: identity cleared; a signed-in stage falls to `SignedOut`
    /// - unverified session, the pending account's session, or a session
    ///   opened only to sign up / resend: identity cleared and the provider
    ///   session forced closed; a signed-in stage falls to `SignedOut`,
    ///   form stages are untouched
    /// - verified session: identity published, stage `SignedIn`
    async fn reconcile(&self, source: SessionSource, session: Option<Identity>) -> AuthStage {
        let Some(identity) = session else {
            self.publish_identity(None);
            return self.end_signed_in();
        };

        let gated = {
            let inner = self.inner.lock();
            !identity.email_verified
                || inner.is_pending(&identity)
                || matches!(source, SessionSource::SignUp | SessionSource::Resend)
        };

        if gated {
            self.publish_identity(None);
            debug!(
                user_id = %identity.id,
                source = ?source,
                verified = identity.email_verified,
                "Forcing sign-out of gated session"
            );
            if let Err(error) = self.provider.sign_out().await {
                warn!(user_id = %identity.id, error = %error, "Forced sign-out failed");
            }
            return self.end_signed_in();
        }

        self.publish_identity(Some(identity));
        let stage = {
            let mut inner = self.inner.lock();
            let was_signed_in = inner.stage().is_signed_in();
            match inner.transition(AuthMachineInput::SessionVerified) {
                Ok(stage) => {
                    if !was_signed_in {
                        // Any form request still in flight is now moot.
                        inner.clear_ephemeral();
                        inner.epoch += 1;
                        inner.busy = false;
                    }
                    stage
                }
                Err(error) => {
                    warn!(error = %error, "Verified session could not be applied");
                    inner.stage()
                }
            }
        };
        self.publish_view();
        stage
    }

    // ==========================================
    // Internals
    // ==========================================

    /// Leave `SignedIn` after the session ended or turned out gated.
    fn end_signed_in(&self) -> AuthStage {
        let stage = {
            let mut inner = self.inner.lock();
            if inner.stage().is_signed_in() {
                let _ = inner.transition(AuthMachineInput::SessionLost);
            }
            inner.stage()
        };
        self.publish_view();
        stage
    }

    fn begin(&self, allowed: &[AuthStage]) -> AuthResult<Ticket<'_>> {
        let epoch = {
            let mut inner = self.inner.lock();
            if inner.busy {
                return Err(AuthError::Busy);
            }
            let stage = inner.stage();
            if !allowed.contains(&stage) {
                return Err(AuthError::InvalidStateTransition(format!(
                    "Operation not available in state {:?}",
                    stage
                )));
            }
            inner.busy = true;
            inner.error = None;
            inner.notice = None;
            inner.warnings.clear();
            inner.epoch
        };
        self.publish_view();
        Ok(Ticket { flow: self, epoch })
    }

    fn finish(&self, ticket: Ticket<'_>, result: AuthResult<AuthStage>) -> AuthResult<AuthStage> {
        if let Err(error) = &result {
            let mut inner = self.inner.lock();
            if inner.epoch == ticket.epoch {
                inner.error = Some(error.user_message());
            }
            debug!(error = %error, "Auth operation failed");
        }
        drop(ticket);
        result
    }

    fn is_current(&self, ticket: &Ticket<'_>) -> bool {
        self.inner.lock().epoch == ticket.epoch
    }

    /// Merge sign-in facts into the profile and send the welcome email once.
    /// Returns user-facing warnings for failures other than permission denials.
    async fn record_sign_in(&self, identity: &Identity) -> Vec<String> {
        let mut warnings = Vec::new();
        let now = Utc::now();

        let existing = match self.profiles.read_profile(&identity.id).await {
            Ok(record) => Some(record),
            Err(error) => {
                warnings.extend(store_warning(&identity.id, "read profile", &error));
                None
            }
        };

        let mut update = ProfileUpdate {
            email: Some(identity.email.clone()),
            last_login: Some(now),
            email_verified: Some(true),
            ..Default::default()
        };
        match &existing {
            Some(None) => {
                update.created_at = Some(now);
                update.has_welcome_email_sent = Some(false);
                update.display_name = identity.display_name.clone();
            }
            Some(Some(record)) if record.display_name.is_empty() => {
                update.display_name = identity.display_name.clone();
            }
            _ => {}
        }

        if let Err(error) = self
            .profiles
            .write_profile(&identity.id, &update, WriteMode::Merge)
            .await
        {
            warnings.extend(store_warning(&identity.id, "write profile", &error));
            return warnings;
        }

        // Unknown when the read failed; skip rather than risk a duplicate.
        let Some(record) = existing else {
            return warnings;
        };
        let already_sent = record.as_ref().is_some_and(|r| r.has_welcome_email_sent);
        if already_sent {
            return warnings;
        }
        let Some(notifier) = &self.welcome else {
            return warnings;
        };

        let display_name = record
            .as_ref()
            .map(|r| r.display_name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| identity.display_name.clone())
            .unwrap_or_default();

        match notifier.send_welcome(identity, &display_name).await {
            Ok(()) => {
                let flag = ProfileUpdate {
                    has_welcome_email_sent: Some(true),
                    ..Default::default()
                };
                if let Err(error) = self
                    .profiles
                    .write_profile(&identity.id, &flag, WriteMode::Merge)
                    .await
                {
                    warnings.extend(store_warning(&identity.id, "write welcome flag", &error));
                }
            }
            Err(error) => {
                warn!(user_id = %identity.id, error = %error, "Welcome email failed");
            }
        }

        warnings
    }

    fn publish_identity(&self, identity: Option<Identity>) {
        self.identity_tx.send_if_modified(|current| {
            if *current != identity {
                *current = identity;
                true
            } else {
                false
            }
        });
    }

    fn publish_view(&self) {
        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current != view {
                *current = view;
                true
            } else {
                false
            }
        });
    }
}

/// Log a profile store failure; permission denials are expected while the
/// email is unverified and produce no user-facing warning.
fn store_warning(user_id: &str, operation: &str, error: &StoreError) -> Option<String> {
    match error {
        StoreError::PermissionDenied(_) => {
            debug!(user_id = %user_id, operation = %operation, error = %error, "Profile store denied access");
            None
        }
        _ => {
            warn!(user_id = %user_id, operation = %operation, error = %error, "Profile store failure");
            Some(format!("Your profile could not be saved: {}", error))
        }
    }
}
