//! Opening and closing the auth surface, in-flight guard, stale results.

use std::sync::atomic::Ordering;

use super::harness::{sign_up_form, TestHarness, PASSWORD};
use crate::{AuthError, AuthStage};

const EMAIL: &str = "ada@example.com";

fn assert_clean(h: &TestHarness) {
    let view = h.flow.view();
    assert_eq!(view.stage, AuthStage::SignIn);
    assert_eq!(view.error, None);
    assert_eq!(view.notice, None);
    assert!(view.warnings.is_empty());
    assert_eq!(view.pending_email, None);
    assert_eq!(view.reset_email, None);
    assert!(!view.busy);
}

#[tokio::test]
async fn close_and_reopen_from_sign_up() {
    let h = TestHarness::new().at_sign_up();
    let mut form = sign_up_form(EMAIL);
    form.gender = None;
    assert!(h.flow.submit_sign_up(&form).await.is_err());
    assert!(h.flow.view().error.is_some());

    assert_eq!(h.flow.close(), AuthStage::SignedOut);
    assert_eq!(h.flow.open(), AuthStage::SignIn);
    assert_clean(&h);
}

#[tokio::test]
async fn close_and_reopen_from_verification() {
    let h = TestHarness::new().at_sign_up();
    h.flow.submit_sign_up(&sign_up_form(EMAIL)).await.unwrap();

    h.flow.close();
    h.flow.open();
    assert_clean(&h);
    assert!(matches!(
        h.flow.resend_verification().await,
        Err(AuthError::InvalidStateTransition(_))
    ));
}

#[tokio::test]
async fn close_and_reopen_from_password_reset() {
    let h = TestHarness::new();
    h.flow.open();
    h.flow.request_password_reset().unwrap();
    assert!(h.flow.submit_reset("nope").await.is_err());

    h.flow.close();
    h.flow.open();
    assert_clean(&h);
}

#[tokio::test]
async fn close_leaves_signed_in_identity_alone() {
    let h = TestHarness::new();
    h.provider.add_account(EMAIL, PASSWORD, true);
    h.flow.open();
    h.flow.submit_sign_in(EMAIL, PASSWORD).await.unwrap();

    assert_eq!(h.flow.close(), AuthStage::SignedIn);
    assert_eq!(h.flow.open(), AuthStage::SignedIn);
    assert!(h.flow.identity().is_some());
}

#[tokio::test]
async fn second_submit_while_busy_is_rejected() {
    let h = TestHarness::new();
    h.provider.add_account(EMAIL, PASSWORD, true);
    let gate = h.provider.hold();
    h.flow.open();

    let flow = h.flow.clone();
    let first = tokio::spawn(async move { flow.submit_sign_in(EMAIL, PASSWORD).await });
    h.wait_busy().await;

    assert!(matches!(
        h.flow.submit_sign_in(EMAIL, PASSWORD).await,
        Err(AuthError::Busy)
    ));
    assert!(matches!(h.flow.request_sign_up(), Err(AuthError::Busy)));
    assert_eq!(h.provider.sign_in_calls.load(Ordering::SeqCst), 1);

    gate.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), AuthStage::SignedIn);
    assert!(!h.flow.view().busy);
}

/// A sign-up that resolves after the surface closed still signs the new
/// account out, but leaves the surface closed.
#[tokio::test]
async fn late_sign_up_result_only_signs_out() {
    let h = TestHarness::new().at_sign_up();
    let gate = h.provider.hold();

    let flow = h.flow.clone();
    let task = tokio::spawn(async move { flow.submit_sign_up(&sign_up_form(EMAIL)).await });
    h.wait_busy().await;

    h.flow.close();
    assert!(!h.flow.view().busy);
    gate.notify_one();
    task.await.unwrap().unwrap();

    let view = h.flow.view();
    assert_eq!(view.stage, AuthStage::SignedOut);
    assert_eq!(view.pending_email, None);
    assert_eq!(view.error, None);
    assert_eq!(h.provider.session(), None);
    assert_eq!(h.flow.identity(), None);
}

#[tokio::test]
async fn late_unverified_sign_in_only_signs_out() {
    let h = TestHarness::new();
    h.provider.add_account(EMAIL, PASSWORD, false);
    let gate = h.provider.hold();
    h.flow.open();

    let flow = h.flow.clone();
    let task = tokio::spawn(async move { flow.submit_sign_in(EMAIL, PASSWORD).await });
    h.wait_busy().await;

    h.flow.close();
    gate.notify_one();
    task.await.unwrap().unwrap();

    assert_eq!(h.flow.stage(), AuthStage::SignedOut);
    assert_eq!(h.flow.view().pending_email, None);
    assert_eq!(h.provider.session(), None);
}

#[tokio::test]
async fn late_failure_does_not_resurface() {
    let h = TestHarness::new();
    let gate = h.provider.hold();
    h.provider.add_account(EMAIL, PASSWORD, true);
    h.flow.open();

    let flow = h.flow.clone();
    let task = tokio::spawn(async move { flow.submit_sign_in(EMAIL, "Wrong1!pass").await });
    h.wait_busy().await;

    h.flow.close();
    h.flow.open();
    gate.notify_one();
    assert!(task.await.unwrap().is_err());

    assert_clean(&h);
}

#[tokio::test]
async fn view_subscribers_see_transitions() {
    let h = TestHarness::new();
    let mut views = h.flow.subscribe_view();

    h.flow.open();
    assert!(views.has_changed().unwrap());
    assert_eq!(views.borrow_and_update().stage, AuthStage::SignIn);

    h.flow.request_sign_up().unwrap();
    assert_eq!(views.borrow_and_update().stage, AuthStage::SignUp);
}
