use dioxus::prelude::*;
use quiz_core::model::ThemePreference;

use crate::context::AppContext;

#[derive(Clone, Copy)]
pub struct ThemeSignal(pub Signal<ThemePreference>);

/// Order the toggle walks through.
#[must_use]
pub fn next_theme(current: ThemePreference) -> ThemePreference {
    match current {
        ThemePreference::System => ThemePreference::Light,
        ThemePreference::Light => ThemePreference::Dark,
        ThemePreference::Dark => ThemePreference::System,
    }
}

#[must_use]
pub fn theme_label(theme: ThemePreference) -> &'static str {
    match theme {
        ThemePreference::System => "Theme: System",
        ThemePreference::Light => "Theme: Light",
        ThemePreference::Dark => "Theme: Dark",
    }
}

/// Loads the saved theme and exposes it to the tree as `data-theme`.
#[component]
pub fn ThemeProvider(children: Element) -> Element {
    let ctx = use_context::<AppContext>();
    let preferences = ctx.preferences();
    let mut theme = use_context_provider(|| ThemeSignal(Signal::new(ThemePreference::default()))).0;

    use_future(move || {
        let preferences = preferences.clone();
        async move {
            match preferences.load_theme().await {
                Ok(saved) => theme.set(saved),
                Err(err) => tracing::warn!(error = %err, "failed to load theme preference"),
            }
        }
    });

    let data_theme = theme().data_theme().unwrap_or_default();
    rsx! {
        div { class: "theme-root", "data-theme": "{data_theme}",
            {children}
        }
    }
}

#[component]
pub fn ThemeToggle() -> Element {
    let ctx = use_context::<AppContext>();
    let mut theme = use_context::<ThemeSignal>().0;
    let label = theme_label(theme());

    let on_toggle = move |_| {
        let next = next_theme(theme());
        theme.set(next);
        let preferences = ctx.preferences();
        spawn(async move {
            if let Err(err) = preferences.save_theme(next).await {
                tracing::warn!(error = %err, "failed to save theme preference");
            }
        });
    };

    rsx! {
        button { class: "btn btn-ghost theme-toggle", r#type: "button", onclick: on_toggle, "{label}" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_cycles_through_every_theme() {
        let mut theme = ThemePreference::System;
        let mut seen = Vec::new();
        for _ in 0..3 {
            theme = next_theme(theme);
            seen.push(theme);
        }
        assert_eq!(
            seen,
            vec![ThemePreference::Light, ThemePreference::Dark, ThemePreference::System]
        );
    }
}
