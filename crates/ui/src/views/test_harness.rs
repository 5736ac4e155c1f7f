use std::sync::Arc;
use std::time::Duration;

use dioxus::core::NoOpMutations;
use dioxus::prelude::*;
use dioxus_router::{Routable, Router};
use quiz_core::model::QuestionDraft;
use quiz_core::time::{fixed_clock, fixed_now};
use services::quiz::QuizRunner;
use services::{
    AccessCredentials, AppServices, AuthService, OverviewService, PreferencesService,
    ProgressService,
};
use storage::repository::QuestionRecord;

use crate::auth_state::AuthProvider;
use crate::context::{UiApp, build_app_context};
use crate::views::{BookmarksView, DashboardView, LoginView, PrepDnaView, QuizView};

pub const USERNAME: &str = "student";
pub const PASSWORD: &str = "pass";

#[derive(Clone)]
struct TestApp {
    services: AppServices,
}

impl UiApp for TestApp {
    fn auth(&self) -> Arc<AuthService> {
        self.services.auth()
    }

    fn overview(&self) -> Arc<OverviewService> {
        self.services.overview()
    }

    fn progress(&self) -> Arc<ProgressService> {
        self.services.progress()
    }

    fn preferences(&self) -> Arc<PreferencesService> {
        self.services.preferences()
    }

    fn quiz_runner(&self) -> QuizRunner {
        self.services.quiz_runner()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum ViewKind {
    Login,
    Dashboard(String),
    Bookmarks,
    PrepDna,
    Quiz(String),
}

#[derive(Props, Clone)]
struct ViewHarnessProps {
    app: Arc<TestApp>,
    view: ViewKind,
}

impl PartialEq for ViewHarnessProps {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

#[component]
fn ViewRouterHarness(props: ViewHarnessProps) -> Element {
    let app: Arc<dyn UiApp> = props.app.clone();
    use_context_provider(|| build_app_context(&app));
    use_context_provider(|| props.view.clone());
    rsx! {
        AuthProvider {
            Router::<TestRoute> {}
        }
    }
}

#[derive(Clone, Routable, PartialEq)]
#[rustfmt::skip]
enum TestRoute {
    #[route("/")]
    Root {},
}

#[component]
fn Root() -> Element {
    match use_context::<ViewKind>() {
        ViewKind::Login => rsx! { LoginView {} },
        ViewKind::Dashboard(q) => rsx! { DashboardView { q } },
        ViewKind::Bookmarks => rsx! { BookmarksView {} },
        ViewKind::PrepDna => rsx! { PrepDnaView {} },
        ViewKind::Quiz(subject) => rsx! { QuizView { subject, qid: String::new() } },
    }
}

pub struct ViewHarness {
    pub dom: VirtualDom,
    pub services: AppServices,
}

impl ViewHarness {
    pub fn rebuild(&mut self) {
        self.dom.rebuild_in_place();
        drive_dom(&mut self.dom);
    }

    pub async fn drive_async(&mut self) {
        let _ = tokio::time::timeout(Duration::from_millis(50), self.dom.wait_for_work()).await;
        self.dom.render_immediate(&mut NoOpMutations);
        self.dom.process_events();
    }

    /// Rebuild, then let spawned work and resources run for a few rounds.
    pub async fn settle(&mut self, rounds: usize) {
        self.rebuild();
        for _ in 0..rounds {
            self.drive_async().await;
        }
    }

    pub fn render(&self) -> String {
        dioxus_ssr::render(&self.dom)
    }
}

pub fn drive_dom(dom: &mut VirtualDom) {
    dom.process_events();
    dom.render_immediate(&mut NoOpMutations);
    dom.process_events();
}

/// Services with one configured login. When `signed_in` is set the user is
/// logged in before the view mounts; otherwise the session probe has run.
pub async fn test_services(signed_in: bool) -> AppServices {
    let services = AppServices::in_memory(
        fixed_clock(),
        Some(AccessCredentials::new(USERNAME, PASSWORD, "student@example.com", "pw")),
    );
    if signed_in {
        services.auth().login(USERNAME, PASSWORD).await.expect("login");
    } else {
        services.auth().init().await.expect("init auth");
    }
    services
}

pub async fn seed_questions(services: &AppServices, subject: &str, n: usize) {
    let storage = services.gateway().storage().expect("local storage").clone();
    let rows: Vec<_> = (0..n)
        .map(|i| QuestionRecord {
            draft: QuestionDraft {
                id: format!("{subject}-{i:02}"),
                text: Some(format!("{subject} question {i}")),
                options: Some(vec!["Alpha".into(), "Beta".into(), "Gamma".into()]),
                correct_indices: Some(vec![1]),
                explanation: Some("Beta is right".into()),
                subject: Some(subject.into()),
                ..QuestionDraft::default()
            },
            created_at: fixed_now() - chrono::Duration::seconds(i64::try_from(i).unwrap_or(0)),
        })
        .collect();
    storage
        .questions
        .upsert_questions(&rows)
        .await
        .expect("seed questions");
}

pub fn mount(view: ViewKind, services: AppServices) -> ViewHarness {
    let app = Arc::new(TestApp {
        services: services.clone(),
    });
    let dom = VirtualDom::new_with_props(ViewRouterHarness, ViewHarnessProps { app, view });
    ViewHarness { dom, services }
}
