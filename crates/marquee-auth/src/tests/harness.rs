//! Test harness for auth flow tests.
//!
//! Provides:
//! - MemoryCredentialProvider: an in-memory identity service with scripted failures
//! - MemoryProfileStore: an in-memory document store with merge semantics
//! - RecordingWelcome: a welcome notifier that counts sends
//! - TestHarness: wires the three into an `AuthFlow`

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use uuid::Uuid;

use crate::{
    AuthFlow, AuthStage, Bookmark, CredentialProvider, Gender, Identity, MediaType,
    ProfileRecord, ProfileStore, ProfileUpdate, ProviderError, SignUpForm, StoreError,
    WelcomeNotifier, WriteMode,
};

pub const PASSWORD: &str = "Aaaaaaa1!";

/// Provider operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SignIn,
    Federated,
    Create,
    SendVerification,
    SendReset,
    SignOut,
}

#[derive(Debug, Clone)]
struct Account {
    id: String,
    password: String,
    verified: bool,
    display_name: Option<String>,
}

impl Account {
    fn identity(&self, email: &str) -> Identity {
        Identity {
            id: self.id.clone(),
            email: email.to_string(),
            email_verified: self.verified,
            display_name: self.display_name.clone(),
            photo_url: None,
        }
    }
}

/// In-memory credential provider.
///
/// Behaves like a provider that opens a session for unverified accounts
/// unless `refuse_unverified` is set, in which case sign-in reports
/// `EmailNotVerified` the way a confirm-email-first backend does.
pub struct MemoryCredentialProvider {
    accounts: Mutex<HashMap<String, Account>>,
    failures: Mutex<HashMap<Op, ProviderError>>,
    federated: Mutex<Option<Identity>>,
    session_tx: watch::Sender<Option<Identity>>,
    refuse_unverified: AtomicBool,
    auto_confirm: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
    pub sign_in_calls: AtomicUsize,
    pub verification_calls: AtomicUsize,
    pub reset_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub verification_emails: Mutex<Vec<String>>,
}

impl MemoryCredentialProvider {
    pub fn new() -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            federated: Mutex::new(None),
            session_tx,
            refuse_unverified: AtomicBool::new(false),
            auto_confirm: AtomicBool::new(false),
            gate: Mutex::new(None),
            sign_in_calls: AtomicUsize::new(0),
            verification_calls: AtomicUsize::new(0),
            reset_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            verification_emails: Mutex::new(Vec::new()),
        }
    }

    /// Register an account and return its id.
    pub fn add_account(&self, email: &str, password: &str, verified: bool) -> String {
        let id = Uuid::new_v4().to_string();
        self.accounts.lock().insert(
            email.to_string(),
            Account {
                id: id.clone(),
                password: password.to_string(),
                verified,
                display_name: None,
            },
        );
        id
    }

    /// Mark the account as verified, as clicking the emailed link would.
    pub fn verify(&self, email: &str) {
        if let Some(account) = self.accounts.lock().get_mut(email) {
            account.verified = true;
        }
    }

    pub fn identity_for(&self, email: &str) -> Option<Identity> {
        self.accounts.lock().get(email).map(|a| a.identity(email))
    }

    pub fn has_account(&self, email: &str) -> bool {
        self.accounts.lock().contains_key(email)
    }

    pub fn display_name_of(&self, email: &str) -> Option<String> {
        self.accounts
            .lock()
            .get(email)
            .and_then(|a| a.display_name.clone())
    }

    pub fn fail_next(&self, op: Op, error: ProviderError) {
        self.failures.lock().insert(op, error);
    }

    pub fn set_federated(&self, identity: Identity) {
        *self.federated.lock() = Some(identity);
    }

    pub fn refuse_unverified(&self) {
        self.refuse_unverified.store(true, Ordering::SeqCst);
    }

    /// Create new accounts already verified, like a backend with email
    /// confirmation turned off.
    pub fn auto_confirm(&self) {
        self.auto_confirm.store(true, Ordering::SeqCst);
    }

    /// Hold sign-in and account creation until the returned notify fires.
    pub fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock() = Some(notify.clone());
        notify
    }

    /// Current provider-side session.
    pub fn session(&self) -> Option<Identity> {
        self.session_tx.borrow().clone()
    }

    /// Push a session change as if it originated outside the flow.
    pub fn emit_session(&self, session: Option<Identity>) {
        self.session_tx.send_replace(session);
    }

    fn take_failure(&self, op: Op) -> Result<(), ProviderError> {
        match self.failures.lock().remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl CredentialProvider for MemoryCredentialProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        self.take_failure(Op::SignIn)?;

        let account = self
            .accounts
            .lock()
            .get(email)
            .cloned()
            .ok_or(ProviderError::NoAccount)?;
        if account.password != password {
            return Err(ProviderError::BadCredential);
        }
        if !account.verified && self.refuse_unverified.load(Ordering::SeqCst) {
            return Err(ProviderError::EmailNotVerified);
        }

        let identity = account.identity(email);
        self.session_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_federated_provider(&self) -> Result<Identity, ProviderError> {
        self.take_failure(Op::Federated)?;
        let identity = self
            .federated
            .lock()
            .clone()
            .ok_or_else(|| ProviderError::FederatedCancelled("popup closed".to_string()))?;
        self.session_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account_with_password(
        &self,
        email: &str,
        password: &str,
        _display_name: &str,
    ) -> Result<Identity, ProviderError> {
        self.wait_gate().await;
        self.take_failure(Op::Create)?;
        if self.has_account(email) {
            return Err(ProviderError::EmailInUse);
        }

        self.add_account(email, password, self.auto_confirm.load(Ordering::SeqCst));
        let identity = self
            .identity_for(email)
            .ok_or_else(|| ProviderError::Other("account vanished".to_string()))?;
        // New accounts come back signed in.
        self.session_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn update_display_name(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<(), ProviderError> {
        if let Some(account) = self.accounts.lock().get_mut(&identity.email) {
            account.display_name = Some(display_name.to_string());
        }
        Ok(())
    }

    async fn send_verification_email(&self, email: &str) -> Result<(), ProviderError> {
        self.verification_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(Op::SendVerification)?;
        self.verification_emails.lock().push(email.to_string());
        Ok(())
    }

    async fn send_password_reset_email(&self, _email: &str) -> Result<(), ProviderError> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(Op::SendReset)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(Op::SignOut)?;
        self.session_tx.send_replace(None);
        Ok(())
    }

    fn observe_session_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.session_tx.subscribe()
    }
}

/// In-memory profile store.
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, ProfileRecord>>,
    bookmarks: Mutex<HashMap<String, Vec<Bookmark>>>,
    deny_writes: AtomicBool,
    fail_reads: AtomicBool,
    pub writes: AtomicUsize,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            bookmarks: Mutex::new(HashMap::new()),
            deny_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn deny_writes(&self, deny: bool) {
        self.deny_writes.store(deny, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn record(&self, id: &str) -> Option<ProfileRecord> {
        self.profiles.lock().get(id).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.profiles.lock().len()
    }

    pub fn insert(&self, record: ProfileRecord) {
        self.profiles.lock().insert(record.id.clone(), record);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn write_profile(
        &self,
        id: &str,
        fields: &ProfileUpdate,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        if self.deny_writes.load(Ordering::SeqCst) {
            return Err(StoreError::PermissionDenied(
                "Missing or insufficient permissions".to_string(),
            ));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut profiles = self.profiles.lock();
        let record = match mode {
            WriteMode::Merge => profiles
                .entry(id.to_string())
                .or_insert_with(|| ProfileRecord::empty(id)),
            WriteMode::Replace => {
                profiles.insert(id.to_string(), ProfileRecord::empty(id));
                profiles
                    .get_mut(id)
                    .ok_or_else(|| StoreError::Other("record vanished".to_string()))?
            }
        };
        record.apply(fields);
        Ok(())
    }

    async fn read_profile(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Network("unavailable".to_string()));
        }
        Ok(self.record(id))
    }

    async fn list_bookmarks(&self, id: &str) -> Result<Vec<Bookmark>, StoreError> {
        Ok(self.bookmarks.lock().get(id).cloned().unwrap_or_default())
    }

    async fn put_bookmark(&self, id: &str, bookmark: &Bookmark) -> Result<(), StoreError> {
        let mut bookmarks = self.bookmarks.lock();
        let list = bookmarks.entry(id.to_string()).or_default();
        list.retain(|b| b.key() != bookmark.key());
        list.push(bookmark.clone());
        Ok(())
    }

    async fn remove_bookmark(
        &self,
        id: &str,
        media_type: MediaType,
        media_id: u64,
    ) -> Result<bool, StoreError> {
        let mut bookmarks = self.bookmarks.lock();
        let Some(list) = bookmarks.get_mut(id) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|b| !(b.media_type == media_type && b.media_id == media_id));
        Ok(list.len() != before)
    }
}

/// Counts welcome emails.
pub struct RecordingWelcome {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingWelcome {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WelcomeNotifier for RecordingWelcome {
    async fn send_welcome(&self, identity: &Identity, _display_name: &str) -> Result<(), StoreError> {
        self.sent.lock().push(identity.id.clone());
        Ok(())
    }
}

/// Orchestrates an `AuthFlow` over in-memory collaborators.
pub struct TestHarness {
    pub flow: Arc<AuthFlow>,
    pub provider: Arc<MemoryCredentialProvider>,
    pub store: Arc<MemoryProfileStore>,
    pub welcome: Arc<RecordingWelcome>,
}

impl TestHarness {
    pub fn new() -> Self {
        let provider = Arc::new(MemoryCredentialProvider::new());
        let store = Arc::new(MemoryProfileStore::new());
        let welcome = Arc::new(RecordingWelcome::new());
        let flow = Arc::new(
            AuthFlow::new(provider.clone(), store.clone()).with_welcome_notifier(welcome.clone()),
        );
        Self {
            flow,
            provider,
            store,
            welcome,
        }
    }

    /// Open the surface and move to the sign-up form.
    pub fn at_sign_up(self) -> Self {
        self.flow.open();
        self.flow.request_sign_up().unwrap();
        self
    }

    /// Wait until the flow reports an outstanding operation.
    pub async fn wait_busy(&self) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !self.flow.view().busy {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("operation never started");
    }

    /// Wait until the flow reaches `stage`.
    pub async fn wait_stage(&self, stage: AuthStage) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while self.flow.stage() != stage {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {:?}, at {:?}", stage, self.flow.stage()));
    }
}

pub fn sign_up_form(email: &str) -> SignUpForm {
    SignUpForm {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        confirm_password: PASSWORD.to_string(),
        display_name: "Ada".to_string(),
        gender: Some(Gender::Female),
    }
}
