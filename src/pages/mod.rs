use crate::api::ApiErrorKind;
use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, ButtonVariant, Card, CardContent,
    CardDescription, CardHeader, CardItem, CardList, CardTitle, Input, Label, Spinner,
};
use crate::realtime::{BookmarkChange, ChannelConfig, ChannelStatus, RealtimeChannel};
use crate::state::bookmark_feed::{apply_change, ListPhase};
use crate::state::AppContext;
use crate::util::{current_year_local, display_hostname, favicon_url, format_created_date};
use icons::{Bookmark as BookmarkIcon, Trash2};
use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::JsCast;

const SUCCESS_CLEAR_MS: i32 = 2000;

fn navigate_to(path: &str) {
    let _ = window().location().set_href(path);
}

fn app_origin() -> String {
    window().location().origin().unwrap_or_default()
}

#[component]
pub fn LoginPage() -> impl IntoView {
    let loading: RwSignal<bool> = RwSignal::new(false);
    let app_state = expect_context::<AppContext>();

    // Already signed in: the login view is not for you.
    Effect::new(move |_| {
        if app_state.0.supabase.get_untracked().is_authenticated() {
            navigate_to("/");
        }
    });

    let on_google_login = move |_| {
        loading.set(true);
        let client = app_state.0.supabase.get_untracked();
        let redirect_to = format!("{}/", app_origin());
        // Dead end locally: the hosted provider takes over from here.
        navigate_to(&client.authorize_url("google", &redirect_to));
    };

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto flex min-h-screen w-full max-w-sm flex-col justify-center px-4 py-10">
                <div class="mb-6 text-center">
                    <h1 class="text-xl font-semibold text-foreground">"Smart Bookmark"</h1>
                    <p class="text-xs text-muted-foreground">"Save and organize your favorite links"</p>
                </div>

                <Card>
                    <CardHeader>
                        <CardTitle class="text-lg">"Get started"</CardTitle>
                        <CardDescription class="text-xs">
                            "No password needed. Sign in securely with your Google account."
                        </CardDescription>
                    </CardHeader>

                    <CardContent>
                        <Button
                            class="w-full"
                            attr:disabled=move || loading.get()
                            on:click=on_google_login
                        >
                            <span class="inline-flex items-center gap-2">
                                <Show when=move || loading.get() fallback=|| ().into_view()>
                                    <Spinner />
                                </Show>
                                {move || if loading.get() { "Connecting..." } else { "Continue with Google" }}
                            </span>
                        </Button>

                        <p class="pt-4 text-center text-xs text-muted-foreground">
                            "By continuing, you agree to our Terms & Privacy Policy"
                        </p>
                    </CardContent>
                </Card>
            </div>
        </div>
    }
}

#[component]
fn Navbar() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let email = move || {
        app_state
            .0
            .session
            .get()
            .and_then(|s| s.user.email)
            .unwrap_or_default()
    };

    let signing_out: RwSignal<bool> = RwSignal::new(false);

    let on_sign_out = move |_| {
        signing_out.set(true);
        spawn_local(async move {
            let mut client = app_state.0.supabase.get_untracked();
            client.sign_out().await;
            app_state.0.supabase.set(client);
            // The session gate reacts to this and navigates to the login view.
            app_state.0.session.set(None);
        });
    };

    view! {
        <header class="sticky top-0 z-50 border-b bg-background/80 backdrop-blur">
            <div class="mx-auto flex h-14 w-full max-w-3xl items-center justify-between px-4">
                <h1 class="text-sm font-semibold tracking-tight">"Smart Bookmark"</h1>
                <div class="flex items-center gap-3">
                    <span class="text-xs text-muted-foreground">{email}</span>
                    <Button
                        variant=ButtonVariant::Outline
                        size=ButtonSize::Sm
                        attr:disabled=move || signing_out.get()
                        on:click=on_sign_out
                    >
                        {move || if signing_out.get() { "Signing out..." } else { "Sign out" }}
                    </Button>
                </div>
            </div>
        </header>
    }
}

/// Pre-flight checks for the creation form; no request is issued when this
/// fails. The error strings are rendered inline as-is.
fn validate_submission(user_id: &str, url: &str) -> Result<(), &'static str> {
    if user_id.trim().is_empty() {
        return Err("User not authenticated.");
    }

    // Case-sensitive prefix check, same as the backend-side constraint.
    if !url.starts_with("http") {
        return Err("Please enter a valid URL including http or https.");
    }

    Ok(())
}

#[component]
fn BookmarkForm(#[prop(into)] user_id: Signal<String>) -> impl IntoView {
    let url: RwSignal<String> = RwSignal::new(String::new());
    let title: RwSignal<String> = RwSignal::new(String::new());
    let loading: RwSignal<bool> = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let success: RwSignal<bool> = RwSignal::new(false);

    let app_state = expect_context::<AppContext>();

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();

        let uid = user_id.get_untracked();
        let url_val = url.get_untracked();
        let title_val = title.get_untracked();

        if let Err(msg) = validate_submission(&uid, &url_val) {
            error.set(Some(msg.to_string()));
            return;
        }

        loading.set(true);
        error.set(None);
        success.set(false);

        let client = app_state.0.supabase.get_untracked();
        spawn_local(async move {
            match client.create_bookmark(&uid, &url_val, &title_val).await {
                Ok(()) => {
                    url.set(String::new());
                    title.set(String::new());
                    success.set(true);

                    // The created row shows up through the live feed; here we
                    // only flash the confirmation and clear it again.
                    let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
                        success.set(false);
                    });
                    let _ = window().set_timeout_with_callback_and_timeout_and_arguments_0(
                        cb.as_ref().unchecked_ref(),
                        SUCCESS_CLEAR_MS,
                    );
                }
                Err(e) => {
                    error.set(Some(e.to_string()));
                }
            }
            loading.set(false);
        });
    };

    view! {
        <Card>
            <CardHeader>
                <CardTitle class="text-base">"Add bookmark"</CardTitle>
            </CardHeader>

            <CardContent>
                <form class="flex flex-col gap-3" on:submit=on_submit>
                    <div class="flex flex-col gap-1.5">
                        <Label html_for="url" class="text-xs">"Website URL"</Label>
                        <Input
                            id="url"
                            r#type="url"
                            placeholder="https://example.com"
                            bind_value=url
                            required=true
                            class="h-8 text-sm"
                        />
                    </div>

                    <div class="flex flex-col gap-1.5">
                        <Label html_for="title" class="text-xs">"Title"</Label>
                        <Input
                            id="title"
                            r#type="text"
                            placeholder="Bookmark title"
                            bind_value=title
                            required=true
                            class="h-8 text-sm"
                        />
                    </div>

                    <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                        {move || {
                            error.get().map(|e| view! {
                                <Alert class="border-destructive/30">
                                    <AlertDescription class="text-destructive text-xs">{e}</AlertDescription>
                                </Alert>
                            })
                        }}
                    </Show>

                    <Show when=move || success.get() fallback=|| ().into_view()>
                        <Alert class="border-success/40">
                            <AlertDescription class="text-xs">"Bookmark saved successfully!"</AlertDescription>
                        </Alert>
                    </Show>

                    <Button
                        class="w-full"
                        size=ButtonSize::Sm
                        attr:disabled=move || loading.get()
                    >
                        <span class="inline-flex items-center gap-2">
                            <Show when=move || loading.get() fallback=|| ().into_view()>
                                <Spinner />
                            </Show>
                            {move || if loading.get() { "Adding..." } else { "Save bookmark" }}
                        </span>
                    </Button>
                </form>
            </CardContent>
        </Card>
    }
}

#[component]
fn BookmarkList(#[prop(into)] user_id: Signal<String>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let bookmarks: RwSignal<Vec<crate::models::Bookmark>> = RwSignal::new(vec![]);
    let phase: RwSignal<ListPhase> = RwSignal::new(ListPhase::Loading);

    // Standing error (feed failure, delete failure): shown above the list
    // without discarding already-loaded rows.
    let banner_error: RwSignal<Option<String>> = RwSignal::new(None);

    let deleting_id: RwSignal<Option<String>> = RwSignal::new(None);

    // Cancellation token: bumped on user-id changes and on teardown, so
    // in-flight work is abandoned at its next checkpoint instead of writing
    // stale state.
    let request_id: RwSignal<u64> = RwSignal::new(0);

    // The channel handle owns JS callbacks, so it lives in arena-local storage.
    let channel = StoredValue::new_local(None::<RealtimeChannel>);

    let close_channel = move || {
        // try_update: teardown may run while the owner is being disposed.
        let _ = request_id.try_update(|n| *n = n.saturating_add(1));
        channel.update_value(|c| {
            if let Some(ch) = c.take() {
                ch.close();
            }
        });
    };

    Effect::new(move |_| {
        let uid = user_id.get();

        // Tear down any previous subscription before resubscribing.
        close_channel();

        if uid.trim().is_empty() {
            return;
        }

        let rid = request_id.get_untracked().saturating_add(1);
        request_id.set(rid);

        phase.set(ListPhase::Loading);
        banner_error.set(None);

        let client = app_state.0.supabase.get_untracked();
        spawn_local(async move {
            // A failed or absent session reads the same: not authenticated.
            let Some(session) = client.current_session() else {
                if request_id.get_untracked() == rid {
                    phase.set(ListPhase::Error("User not authenticated.".to_string()));
                }
                return;
            };

            let result = client.list_bookmarks(&uid).await;

            // Ignore stale responses.
            if request_id.get_untracked() != rid {
                return;
            }

            match result {
                Ok(rows) => {
                    bookmarks.set(rows);
                    phase.set(ListPhase::Ready);
                }
                Err(e) => {
                    if e.kind == ApiErrorKind::Unauthorized {
                        let mut c = app_state.0.supabase.get_untracked();
                        c.clear_session();
                        app_state.0.supabase.set(c);
                        app_state.0.session.set(None);
                        return;
                    }
                    phase.set(ListPhase::Error(e.to_string()));
                }
            }

            // Open the push feed regardless of the fetch outcome; the channel
            // is authorized with the session's access credential.
            let cfg = ChannelConfig {
                base_url: client.base_url.clone(),
                anon_key: client.anon_key.clone(),
                access_token: session.access_token.clone(),
                user_id: uid.clone(),
            };

            let on_change = move |change: BookmarkChange| {
                bookmarks.update(|list| apply_change(list, change));
            };
            let on_status = move |status: ChannelStatus| match status {
                ChannelStatus::Joined => banner_error.set(None),
                ChannelStatus::Error(msg) => banner_error.set(Some(msg)),
            };

            match RealtimeChannel::connect(cfg, on_change, on_status) {
                Ok(ch) => channel.set_value(Some(ch)),
                Err(msg) => banner_error.set(Some(msg)),
            }
        });
    });

    on_cleanup(close_channel);

    let on_delete = move |id: String| {
        let uid = user_id.get_untracked();
        deleting_id.set(Some(id.clone()));

        let client = app_state.0.supabase.get_untracked();
        spawn_local(async move {
            // Removal is not optimistic: the feed's DELETE event takes the
            // row out of the list.
            if let Err(e) = client.delete_bookmark(&id, &uid).await {
                banner_error.set(Some(e.to_string()));
            }
            if deleting_id.get_untracked().as_deref() == Some(id.as_str()) {
                deleting_id.set(None);
            }
        });
    };

    let current_year = current_year_local();

    view! {
        <section class="flex flex-col gap-3">
            <Show when=move || banner_error.get().is_some() fallback=|| ().into_view()>
                {move || {
                    banner_error.get().map(|e| view! {
                        <Alert class="border-destructive/30">
                            <AlertDescription class="text-destructive text-xs">{e}</AlertDescription>
                        </Alert>
                    })
                }}
            </Show>

            <Show
                when=move || phase.get() == ListPhase::Loading
                fallback=|| ().into_view()
            >
                <div class="flex items-center justify-center py-16">
                    <Spinner class="size-8" />
                </div>
            </Show>

            <Show when=move || matches!(phase.get(), ListPhase::Error(_)) fallback=|| ().into_view()>
                {move || {
                    if let ListPhase::Error(e) = phase.get() {
                        Some(view! {
                            <Alert class="border-destructive/30">
                                <AlertDescription class="text-destructive text-xs">{e}</AlertDescription>
                            </Alert>
                        })
                    } else {
                        None
                    }
                }}
            </Show>

            <Show when=move || phase.get() == ListPhase::Ready fallback=|| ().into_view()>
                <div class="flex items-center justify-between">
                    <h2 class="text-base font-semibold">
                        "Bookmarks"
                        <span class="ml-2 text-sm font-normal text-muted-foreground">
                            {move || format!("({})", bookmarks.get().len())}
                        </span>
                    </h2>
                </div>

                <Show
                    when=move || !bookmarks.get().is_empty()
                    fallback=|| view! {
                        <div class="rounded-lg border border-dashed py-12 text-center">
                            <BookmarkIcon class="mx-auto mb-3 size-10 text-muted-foreground" />
                            <p class="text-sm font-medium">"No bookmarks yet"</p>
                            <p class="mt-1 text-xs text-muted-foreground">
                                "Start by adding your first bookmark above"
                            </p>
                        </div>
                    }
                >
                    <CardList>
                        {move || {
                            bookmarks
                                .get()
                                .into_iter()
                                .map(|b| {
                                    let id = b.id.clone();
                                    let delete_id = id.clone();
                                    let hostname = display_hostname(&b.url);
                                    let favicon = favicon_url(&b.url);
                                    let date = format_created_date(&b.created_at, current_year);
                                    let is_deleting = move || {
                                        deleting_id.get().as_deref() == Some(id.as_str())
                                    };
                                    let is_deleting_btn = is_deleting.clone();

                                    view! {
                                        <CardItem class="group gap-3 rounded-lg border bg-card p-4 transition-colors hover:bg-accent/40">
                                            <div class="shrink-0 pt-0.5">
                                                {favicon.map(|src| view! {
                                                    <img
                                                        src=src
                                                        alt=hostname.clone()
                                                        class="size-6 rounded-md bg-muted"
                                                    />
                                                })}
                                            </div>

                                            <div class="min-w-0 flex-1">
                                                <h3 class="truncate text-sm font-medium">{b.title.clone()}</h3>
                                                <a
                                                    href=b.url.clone()
                                                    target="_blank"
                                                    rel="noopener noreferrer"
                                                    class="mt-0.5 block truncate text-xs text-primary hover:underline"
                                                >
                                                    {hostname.clone()}
                                                </a>
                                                <p class="mt-1 text-xs text-muted-foreground">{date}</p>
                                            </div>

                                            <Button
                                                variant=ButtonVariant::Ghost
                                                size=ButtonSize::Icon
                                                class="text-muted-foreground hover:text-destructive"
                                                attr:disabled=is_deleting_btn
                                                attr:title="Delete bookmark"
                                                on:click=move |_| on_delete(delete_id.clone())
                                            >
                                                <Show
                                                    when=is_deleting.clone()
                                                    fallback=|| view! { <Trash2 class="size-4" /> }
                                                >
                                                    <Spinner />
                                                </Show>
                                            </Button>
                                        </CardItem>
                                    }
                                })
                                .collect_view()
                        }}
                    </CardList>
                </Show>
            </Show>
        </section>
    }
}

/// Session gate: resolves the current session on mount (completing an OAuth
/// redirect when tokens are present in the fragment), and keeps watching the
/// session signal while the shell is mounted; any transition to "no
/// session" navigates to the login view.
#[component]
pub fn RootPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let checking: RwSignal<bool> = RwSignal::new(true);

    // Runs once: nothing reactive is read.
    Effect::new(move |_| {
        spawn_local(async move {
            let mut client = app_state.0.supabase.get_untracked();

            let resolved = match client.current_session() {
                Some(s) => Some(s),
                // A failed completion is treated the same as no session.
                None => client.complete_oauth_redirect().await.ok().flatten(),
            };
            app_state.0.supabase.set(client);

            match resolved {
                Some(session) => {
                    app_state.0.session.set(Some(session));
                    checking.set(false);
                }
                None => navigate_to("/login"),
            }
        });
    });

    // Session-change watch for the lifetime of the shell.
    Effect::new(move |_| {
        if !checking.get() && app_state.0.session.get().is_none() {
            navigate_to("/login");
        }
    });

    let user_id = Signal::derive(move || {
        app_state
            .0
            .session
            .get()
            .map(|s| s.user.id)
            .unwrap_or_default()
    });

    view! {
        <Show
            when=move || !checking.get()
            fallback=|| view! {
                <div class="flex min-h-screen items-center justify-center bg-background">
                    <Spinner class="size-10" />
                </div>
            }
        >
            <div class="min-h-screen bg-background">
                <Navbar />
                <main class="mx-auto flex w-full max-w-3xl flex-col gap-6 px-4 py-8">
                    <BookmarkForm user_id=user_id />
                    <BookmarkList user_id=user_id />
                </main>
            </div>
        </Show>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_rejected_without_authenticated_user() {
        assert_eq!(
            validate_submission("", "https://example.com"),
            Err("User not authenticated.")
        );
        assert_eq!(
            validate_submission("   ", "https://example.com"),
            Err("User not authenticated.")
        );
    }

    #[test]
    fn test_submission_rejected_for_non_http_url() {
        let expected = Err("Please enter a valid URL including http or https.");
        assert_eq!(validate_submission("u-1", "example.com"), expected);
        assert_eq!(validate_submission("u-1", "ftp://example.com"), expected);
        assert_eq!(validate_submission("u-1", ""), expected);
        // The prefix check is case-sensitive.
        assert_eq!(validate_submission("u-1", "HTTP://example.com"), expected);
    }

    #[test]
    fn test_submission_accepted_for_http_and_https() {
        assert_eq!(validate_submission("u-1", "http://example.com"), Ok(()));
        assert_eq!(validate_submission("u-1", "https://example.com/a?b=c"), Ok(()));
    }
}
