//! Single-slot interaction coordinator semantics

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_pending, assert_ready, task};

use acp_runtime::{AnswerSource, InteractionCoordinator, InteractionId};
use common::{RecordingSink, sample_request};

const OPTIONS: &[(&str, &str)] = &[("allow", "Allow"), ("deny", "Deny")];

#[test]
fn submit_without_pending_request_is_rejected() {
    let coordinator = InteractionCoordinator::new();
    let outcome = coordinator.submit_answer("1", AnswerSource::Terminal);
    assert!(!outcome.accepted);
    assert!(outcome.message.contains("no pending"));
}

#[test]
fn empty_answer_is_rejected() {
    let coordinator = InteractionCoordinator::new();
    coordinator.publish(sample_request("int-1", OPTIONS, false));

    let outcome = coordinator.submit_answer("   ", AnswerSource::Terminal);
    assert!(!outcome.accepted);
    assert!(coordinator.snapshot().request.is_some());
    assert!(!coordinator.snapshot().answered);
}

#[test]
fn digit_answer_maps_to_the_declared_option() {
    let coordinator = InteractionCoordinator::new();
    coordinator.publish(sample_request("int-1", OPTIONS, false));

    let outcome = coordinator.submit_answer("2", AnswerSource::Channel);
    assert!(outcome.accepted);
    let answer = outcome.answer.unwrap();
    assert_eq!(answer.selected_index, Some(2));
    assert_eq!(answer.selected_option_id.as_deref(), Some("deny"));
    assert!(answer.custom_text.is_none());
    assert_eq!(answer.source, AnswerSource::Channel);
}

#[test]
fn out_of_range_digit_is_rejected_without_custom_input() {
    let coordinator = InteractionCoordinator::new();
    coordinator.publish(sample_request("int-1", OPTIONS, false));

    let outcome = coordinator.submit_answer("9", AnswerSource::Terminal);
    assert!(!outcome.accepted);
    assert!(outcome.message.contains("invalid option"));
}

#[test]
fn out_of_range_digit_becomes_free_text_when_allowed() {
    let coordinator = InteractionCoordinator::new();
    coordinator.publish(sample_request("int-1", OPTIONS, true));

    let outcome = coordinator.submit_answer("9", AnswerSource::Terminal);
    assert!(outcome.accepted);
    let answer = outcome.answer.unwrap();
    assert!(answer.selected_option_id.is_none());
    assert_eq!(answer.custom_text.as_deref(), Some("9"));
}

#[test]
fn free_text_is_gated_on_allow_custom_input() {
    let coordinator = InteractionCoordinator::new();
    coordinator.publish(sample_request("int-1", OPTIONS, false));
    let outcome = coordinator.submit_answer("do something else", AnswerSource::Terminal);
    assert!(!outcome.accepted);

    coordinator.resolve(&InteractionId::new("int-1"));
    coordinator.publish(sample_request("int-2", OPTIONS, true));
    let outcome = coordinator.submit_answer("do something else", AnswerSource::Terminal);
    assert!(outcome.accepted);
    assert_eq!(
        outcome.answer.unwrap().custom_text.as_deref(),
        Some("do something else")
    );
}

#[test]
fn first_answer_wins() {
    let coordinator = InteractionCoordinator::new();
    coordinator.publish(sample_request("int-1", OPTIONS, false));

    assert!(coordinator.submit_answer("1", AnswerSource::Terminal).accepted);
    let second = coordinator.submit_answer("2", AnswerSource::Channel);
    assert!(!second.accepted);
    assert!(second.message.contains("already answered"));

    // The recorded answer is still the first one.
    let snapshot = coordinator.snapshot();
    assert!(snapshot.answered);
}

#[tokio::test]
async fn waiter_receives_the_answer() {
    let coordinator = Arc::new(InteractionCoordinator::new());
    coordinator.publish(sample_request("int-1", OPTIONS, false));

    let waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .wait_for_answer(&InteractionId::new("int-1"))
                .await
        })
    };

    // Let the waiter park on the notify before answering.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(coordinator.submit_answer("1", AnswerSource::Api).accepted);

    let answer = waiter.await.unwrap().unwrap();
    assert_eq!(answer.selected_option_id.as_deref(), Some("allow"));
}

#[test]
fn waiter_stays_pending_until_the_answer_lands() {
    let coordinator = InteractionCoordinator::new();
    coordinator.publish(sample_request("int-1", OPTIONS, false));

    let id = InteractionId::new("int-1");
    let mut waiter = task::spawn(coordinator.wait_for_answer(&id));
    assert_pending!(waiter.poll());

    assert!(coordinator.submit_answer("1", AnswerSource::Terminal).accepted);
    assert!(waiter.is_woken());
    let answer = assert_ready!(waiter.poll()).unwrap();
    assert_eq!(answer.selected_option_id.as_deref(), Some("allow"));
}

#[tokio::test]
async fn publish_replaces_unanswered_and_fails_the_stale_waiter() {
    let events = RecordingSink::new();
    let coordinator = Arc::new(InteractionCoordinator::with_events(events.clone()));
    coordinator.publish(sample_request("int-1", OPTIONS, false));

    let stale_waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .wait_for_answer(&InteractionId::new("int-1"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    coordinator.publish(sample_request("int-2", OPTIONS, false));

    let err = stale_waiter.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("replaced"));

    // The new request is live and answerable.
    assert!(coordinator.submit_answer("1", AnswerSource::Terminal).accepted);
    assert!(
        events
            .names()
            .contains(&"interaction_replaced_by_new_request")
    );
}

#[test]
fn answered_request_is_not_discarded_silently() {
    let events = RecordingSink::new();
    let coordinator = InteractionCoordinator::with_events(events.clone());
    coordinator.publish(sample_request("int-1", OPTIONS, false));
    assert!(coordinator.submit_answer("1", AnswerSource::Terminal).accepted);

    // Replacing an already-answered slot is a plain publish, not a discard.
    coordinator.publish(sample_request("int-2", OPTIONS, false));
    assert!(
        !events
            .names()
            .contains(&"interaction_replaced_by_new_request")
    );
}

#[test]
fn resolve_is_id_guarded_and_idempotent() {
    let events = RecordingSink::new();
    let coordinator = InteractionCoordinator::with_events(events.clone());
    coordinator.publish(sample_request("int-1", OPTIONS, false));

    // Wrong id leaves the slot untouched.
    coordinator.resolve(&InteractionId::new("int-other"));
    assert!(coordinator.has_pending());

    coordinator.resolve(&InteractionId::new("int-1"));
    assert!(!coordinator.has_pending());

    // Second resolve is a no-op.
    coordinator.resolve(&InteractionId::new("int-1"));
    let resolved_count = events
        .names()
        .iter()
        .filter(|n| **n == "interaction_resolved")
        .count();
    assert_eq!(resolved_count, 1);
}

#[tokio::test]
async fn waiter_errors_when_the_slot_is_resolved_underneath_it() {
    let coordinator = Arc::new(InteractionCoordinator::new());
    coordinator.publish(sample_request("int-1", OPTIONS, false));

    let waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .wait_for_answer(&InteractionId::new("int-1"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    coordinator.resolve(&InteractionId::new("int-1"));

    let err = waiter.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("no longer pending"));
}
