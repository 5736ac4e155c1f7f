use quiz_core::model::{QuestionId, Subject};

use super::test_harness::{ViewKind, mount, seed_questions, test_services};

#[tokio::test(flavor = "current_thread")]
async fn login_view_renders_form_when_signed_out() {
    let services = test_services(false).await;
    let mut harness = mount(ViewKind::Login, services);
    harness.settle(2).await;

    let html = harness.render();
    assert!(html.contains("Sign in"), "missing submit button in {html}");
    assert!(html.contains("Username"), "missing username field in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn dashboard_renders_subject_cards_after_login() {
    let services = test_services(true).await;
    seed_questions(&services, "Anatomy", 3).await;
    let mut harness = mount(ViewKind::Dashboard(String::new()), services);
    harness.settle(6).await;

    let html = harness.render();
    assert!(html.contains("Anatomy"), "missing subject card in {html}");
    assert!(html.contains("3 questions"), "missing count in {html}");
    assert!(html.contains("Attempted: 0"), "missing attempted label in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn dashboard_search_with_no_match_shows_empty_state() {
    let services = test_services(true).await;
    let mut harness = mount(ViewKind::Dashboard("zzz".into()), services);
    harness.settle(6).await;

    let html = harness.render();
    assert!(html.contains("No subjects match"), "missing empty state in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn bookmarks_view_lists_saved_questions() {
    let services = test_services(true).await;
    seed_questions(&services, "Anatomy", 2).await;
    let user = services.auth().current_user().expect("signed in");
    services
        .progress()
        .save_bookmark(
            &user.id,
            &QuestionId::new("Anatomy-01").unwrap(),
            &Subject::new("Anatomy"),
        )
        .await
        .expect("bookmark");

    let mut harness = mount(ViewKind::Bookmarks, services);
    harness.settle(6).await;

    let html = harness.render();
    assert!(html.contains("Anatomy question 1"), "missing bookmark text in {html}");
    assert!(html.contains("Remove"), "missing remove button in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn bookmarks_view_shows_empty_state() {
    let services = test_services(true).await;
    let mut harness = mount(ViewKind::Bookmarks, services);
    harness.settle(4).await;

    let html = harness.render();
    assert!(html.contains("No bookmarks yet"), "missing empty state in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn prepdna_view_shows_overall_progress() {
    let services = test_services(true).await;
    seed_questions(&services, "Anatomy", 4).await;
    let mut harness = mount(ViewKind::PrepDna, services);
    harness.settle(6).await;

    let html = harness.render();
    assert!(html.contains("0 of 4 questions attempted"), "missing overall in {html}");
    assert!(html.contains("Answer a few questions"), "missing empty profile in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn quiz_view_shows_first_question() {
    let services = test_services(true).await;
    seed_questions(&services, "Anatomy", 3).await;
    let mut harness = mount(ViewKind::Quiz("Anatomy".into()), services);
    harness.settle(10).await;

    let html = harness.render();
    assert!(html.contains("Anatomy question 0"), "missing question text in {html}");
    assert!(html.contains("Alpha"), "missing option in {html}");
    assert!(html.contains("Question 1 of 3"), "missing position in {html}");
}
