use crate::models::{Bookmark, Session, UserInfo};
use crate::storage::{clear_session_storage, load_session_from_storage, save_session_to_storage};
use crate::util::now_secs;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug)]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Unauthorized".to_string(),
        }
    }

    /// Backend failure: surface the backend's own message when the body
    /// carries one, otherwise fall back to the caller-provided string.
    fn backend(body: &str, fallback: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: parse_error_body(body).unwrap_or_else(|| fallback.to_string()),
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Extract a human-readable message from a PostgREST / GoTrue error body.
///
/// PostgREST uses `message`, GoTrue uses `msg` or `error_description`.
pub(crate) fn parse_error_body(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    for key in ["message", "msg", "error_description"] {
        if let Some(s) = v.get(key).and_then(|m| m.as_str()) {
            if !s.trim().is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct EnvConfig {
    pub supabase_url: String,
    pub anon_key: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let mut cfg = Self {
            // Supabase CLI local stack default.
            supabase_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
        };

        // Deployment config is injected as `window.ENV` by index.html.
        if let Some(window) = web_sys::window() {
            if let Some(env) = window.get("ENV") {
                if !env.is_undefined() && env.is_object() {
                    if let Ok(url) = js_sys::Reflect::get(&env, &"SUPABASE_URL".into()) {
                        if let Some(s) = url.as_string() {
                            cfg.supabase_url = s;
                        }
                    }
                    if let Ok(key) = js_sys::Reflect::get(&env, &"SUPABASE_ANON_KEY".into()) {
                        if let Some(s) = key.as_string() {
                            cfg.anon_key = s;
                        }
                    }
                }
            }
        }

        cfg
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Authorize URL for the hosted OAuth flow. Navigating here leaves the app;
/// the provider redirects back to `redirect_to` with tokens in the fragment.
pub(crate) fn oauth_authorize_url(base_url: &str, provider: &str, redirect_to: &str) -> String {
    format!(
        "{}/auth/v1/authorize?provider={}&redirect_to={}",
        base_url,
        urlencoding::encode(provider),
        urlencoding::encode(redirect_to)
    )
}

/// Tokens delivered in the URL fragment after the provider redirect.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct OauthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// Parse `access_token=...&refresh_token=...&expires_in=...` from a location
/// fragment (leading `#` optional). `None` when no access token is present.
pub(crate) fn parse_oauth_fragment(fragment: &str) -> Option<OauthTokens> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);

    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_in = 3600_i64;

    for pair in fragment.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());

        match key {
            "access_token" if !value.is_empty() => access_token = Some(value),
            "refresh_token" if !value.is_empty() => refresh_token = Some(value),
            "expires_in" => {
                if let Ok(n) = value.parse::<i64>() {
                    expires_in = n;
                }
            }
            _ => {}
        }
    }

    Some(OauthTokens {
        access_token: access_token?,
        refresh_token,
        expires_in,
    })
}

/// Query string for the scoped list fetch: only the user's rows, newest first.
pub(crate) fn list_bookmarks_path(user_id: &str) -> String {
    format!(
        "/rest/v1/bookmarks?select=*&user_id=eq.{}&order=created_at.desc",
        urlencoding::encode(user_id)
    )
}

/// Delete is constrained by BOTH the row id and the owning user id, so a
/// guessed id belonging to another user never even reaches their row.
pub(crate) fn delete_bookmark_path(id: &str, user_id: &str) -> String {
    format!(
        "/rest/v1/bookmarks?id=eq.{}&user_id=eq.{}",
        urlencoding::encode(id),
        urlencoding::encode(user_id)
    )
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct CreateBookmarkRequest {
    pub user_id: String,
    pub url: String,
    pub title: String,
}

/// Tolerant row extraction: skip entries that don't carry the full shape
/// instead of failing the whole fetch.
pub(crate) fn parse_bookmark_list_response(data: serde_json::Value) -> Vec<Bookmark> {
    let list = data.as_array().cloned().unwrap_or_default();

    let mut out: Vec<Bookmark> = Vec::with_capacity(list.len());
    for item in list {
        if let Ok(b) = serde_json::from_value::<Bookmark>(item) {
            if !b.id.trim().is_empty() {
                out.push(b);
            }
        }
    }

    out
}

#[derive(Clone)]
pub(crate) struct SupabaseClient {
    pub(crate) base_url: String,
    pub(crate) anon_key: String,
    pub(crate) session: Option<Session>,
}

impl SupabaseClient {
    pub fn new(base_url: String, anon_key: String) -> Self {
        Self {
            base_url,
            anon_key,
            session: None,
        }
    }

    pub fn load_from_storage() -> Self {
        let cfg = EnvConfig::new();
        Self {
            base_url: cfg.supabase_url,
            anon_key: cfg.anon_key,
            session: load_session_from_storage(),
        }
    }

    pub fn set_session(&mut self, session: Session) {
        save_session_to_storage(&session);
        self.session = Some(session);
    }

    pub fn clear_session(&mut self) {
        self.session = None;
        clear_session_storage();
    }

    /// Stored session if it has not expired; an expired session is absence.
    pub fn current_session_at(&self, now_secs: i64) -> Option<&Session> {
        self.session.as_ref().filter(|s| !s.is_expired(now_secs))
    }

    pub fn current_session(&self) -> Option<Session> {
        self.current_session_at(now_secs()).cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_session_at(now_secs()).is_some()
    }

    pub fn user_id(&self) -> Option<String> {
        self.current_session_at(now_secs())
            .map(|s| s.user.id.clone())
    }

    pub fn authorize_url(&self, provider: &str, redirect_to: &str) -> String {
        oauth_authorize_url(&self.base_url, provider, redirect_to)
    }

    fn with_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req = req.header("apikey", self.anon_key.clone());
        let bearer = self
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());
        req.header("Authorization", format!("Bearer {}", bearer))
    }

    async fn check(res: reqwest::Response, fallback: &str) -> ApiResult<reqwest::Response> {
        if res.status().is_success() {
            Ok(res)
        } else if res.status().as_u16() == 401 {
            Err(ApiError::unauthorized())
        } else {
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::backend(&body, fallback))
        }
    }

    /// Fetch the authenticated user for a freshly issued access token.
    async fn fetch_user(&self, access_token: &str) -> ApiResult<UserInfo> {
        let client = reqwest::Client::new();
        let res = client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", self.anon_key.clone())
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await
            .map_err(ApiError::network)?;

        let res = Self::check(res, "Failed to load user profile.").await?;
        res.json::<UserInfo>().await.map_err(ApiError::parse)
    }

    /// Complete an OAuth redirect: if the location fragment carries tokens,
    /// resolve the user, persist the session, and scrub the fragment from
    /// the address bar. `Ok(None)` when there is nothing to complete.
    pub async fn complete_oauth_redirect(&mut self) -> ApiResult<Option<Session>> {
        let Some(window) = web_sys::window() else {
            return Ok(None);
        };
        let fragment = window.location().hash().unwrap_or_default();
        let Some(tokens) = parse_oauth_fragment(&fragment) else {
            return Ok(None);
        };

        // Drop the token fragment first, before any network round-trip: even
        // a failed completion must not leave tokens in the address bar,
        // history, or bookmarks.
        let path = format!(
            "{}{}",
            window.location().pathname().unwrap_or_default(),
            window.location().search().unwrap_or_default()
        );
        if let Ok(history) = window.history() {
            let _ = history.replace_state_with_url(
                &wasm_bindgen::JsValue::NULL,
                "",
                Some(&path),
            );
        }

        let user = self.fetch_user(&tokens.access_token).await?;
        let session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: now_secs() + tokens.expires_in,
            user,
        };
        self.set_session(session.clone());

        Ok(Some(session))
    }

    /// Best-effort server-side sign-out; local state is cleared regardless.
    pub async fn sign_out(&mut self) {
        if let Some(session) = self.session.clone() {
            let client = reqwest::Client::new();
            let _ = client
                .post(format!("{}/auth/v1/logout", self.base_url))
                .header("apikey", self.anon_key.clone())
                .header("Authorization", format!("Bearer {}", session.access_token))
                .send()
                .await;
        }
        self.clear_session();
    }

    pub async fn list_bookmarks(&self, user_id: &str) -> ApiResult<Vec<Bookmark>> {
        let client = reqwest::Client::new();
        let req = client.get(format!(
            "{}{}",
            self.base_url,
            list_bookmarks_path(user_id)
        ));

        let res = self
            .with_headers(req)
            .send()
            .await
            .map_err(ApiError::network)?;
        let res = Self::check(res, "Failed to load bookmarks.").await?;

        let data: serde_json::Value = res.json().await.map_err(ApiError::parse)?;
        Ok(parse_bookmark_list_response(data))
    }

    pub async fn create_bookmark(&self, user_id: &str, url: &str, title: &str) -> ApiResult<()> {
        let client = reqwest::Client::new();
        let req = client
            .post(format!("{}/rest/v1/bookmarks", self.base_url))
            // The row arrives via the realtime feed; no payload needed back.
            .header("Prefer", "return=minimal")
            .json(&CreateBookmarkRequest {
                user_id: user_id.to_string(),
                url: url.trim().to_string(),
                title: title.trim().to_string(),
            });

        let res = self
            .with_headers(req)
            .send()
            .await
            .map_err(ApiError::network)?;
        Self::check(res, "Failed to add bookmark.").await?;
        Ok(())
    }

    pub async fn delete_bookmark(&self, id: &str, user_id: &str) -> ApiResult<()> {
        let client = reqwest::Client::new();
        let req = client.delete(format!(
            "{}{}",
            self.base_url,
            delete_bookmark_path(id, user_id)
        ));

        let res = self
            .with_headers(req)
            .send()
            .await
            .map_err(ApiError::network)?;
        Self::check(res, "Failed to delete bookmark.").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: "jwt".to_string(),
            refresh_token: None,
            expires_at,
            user: UserInfo {
                id: "u-1".to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn test_parse_error_body_postgrest_message() {
        let body = r#"{"code":"23514","message":"new row violates check constraint"}"#;
        assert_eq!(
            parse_error_body(body).as_deref(),
            Some("new row violates check constraint")
        );
    }

    #[test]
    fn test_parse_error_body_gotrue_variants() {
        assert_eq!(
            parse_error_body(r#"{"msg":"Invalid token"}"#).as_deref(),
            Some("Invalid token")
        );
        assert_eq!(
            parse_error_body(r#"{"error":"x","error_description":"Bad request"}"#).as_deref(),
            Some("Bad request")
        );
    }

    #[test]
    fn test_parse_error_body_fallback_cases() {
        assert!(parse_error_body("").is_none());
        assert!(parse_error_body("<html>502</html>").is_none());
        assert!(parse_error_body(r#"{"message":"  "}"#).is_none());
    }

    #[test]
    fn test_backend_error_uses_message_or_fallback() {
        let e = ApiError::backend(r#"{"message":"duplicate key"}"#, "Failed to add bookmark.");
        assert_eq!(e.message, "duplicate key");
        assert_eq!(e.kind, ApiErrorKind::Http);

        let e = ApiError::backend("oops", "Failed to add bookmark.");
        assert_eq!(e.message, "Failed to add bookmark.");
    }

    #[test]
    fn test_oauth_authorize_url_encodes_redirect() {
        let url = oauth_authorize_url(
            "https://proj.supabase.co",
            "google",
            "https://app.example.com/",
        );
        assert_eq!(
            url,
            "https://proj.supabase.co/auth/v1/authorize?provider=google&redirect_to=https%3A%2F%2Fapp.example.com%2F"
        );
    }

    #[test]
    fn test_parse_oauth_fragment_full() {
        let t = parse_oauth_fragment(
            "#access_token=abc.def.ghi&expires_in=3600&refresh_token=r1&token_type=bearer",
        )
        .expect("fragment should parse");
        assert_eq!(t.access_token, "abc.def.ghi");
        assert_eq!(t.refresh_token.as_deref(), Some("r1"));
        assert_eq!(t.expires_in, 3600);
    }

    #[test]
    fn test_parse_oauth_fragment_without_access_token() {
        assert!(parse_oauth_fragment("").is_none());
        assert!(parse_oauth_fragment("#error=access_denied").is_none());
        assert!(parse_oauth_fragment("#access_token=").is_none());
    }

    #[test]
    fn test_parse_oauth_fragment_defaults_expiry() {
        let t = parse_oauth_fragment("access_token=abc").expect("should parse");
        assert_eq!(t.expires_in, 3600);
        assert!(t.refresh_token.is_none());
    }

    #[test]
    fn test_list_path_scopes_to_user_and_orders_descending() {
        let path = list_bookmarks_path("u-1");
        assert!(path.contains("user_id=eq.u-1"));
        assert!(path.contains("order=created_at.desc"));
    }

    #[test]
    fn test_delete_path_constrained_by_id_and_user() {
        // Defense-in-depth: a delete for id=5 is always scoped to the
        // current user as well.
        let path = delete_bookmark_path("5", "u-1");
        assert!(path.contains("id=eq.5"));
        assert!(path.contains("user_id=eq.u-1"));
    }

    #[test]
    fn test_parse_bookmark_list_skips_malformed_rows() {
        let data = serde_json::json!([
            {
                "id": "b-1",
                "user_id": "u-1",
                "url": "https://a.example",
                "title": "A",
                "created_at": "2026-08-02T00:00:00Z"
            },
            { "id": "b-2" },
            {
                "id": "b-3",
                "user_id": "u-1",
                "url": "https://c.example",
                "title": "C",
                "created_at": "2026-08-01T00:00:00Z"
            }
        ]);
        let rows = parse_bookmark_list_response(data);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "b-1");
        assert_eq!(rows[1].id, "b-3");
    }

    #[test]
    fn test_parse_bookmark_list_non_array_is_empty() {
        assert!(parse_bookmark_list_response(serde_json::json!({"message": "x"})).is_empty());
    }

    #[test]
    fn test_current_session_at_treats_expired_as_absent() {
        let mut client = SupabaseClient::new("http://localhost:54321".to_string(), "k".to_string());
        client.session = Some(session(1_000));

        assert!(client.current_session_at(999).is_some());
        assert!(client.current_session_at(1_000).is_none());
    }

    #[test]
    fn test_create_request_serializes_snake_case_columns() {
        let req = CreateBookmarkRequest {
            user_id: "u-1".to_string(),
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
        };
        let v = serde_json::to_value(req).expect("should serialize");
        assert_eq!(v["user_id"], "u-1");
        assert_eq!(v["url"], "https://example.com");
        assert_eq!(v["title"], "Example");
    }
}

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    async fn test_failed_redirect_completion_still_scrubs_fragment() {
        let window = web_sys::window().expect("browser test needs a window");
        let _ = window.location().set_hash("access_token=tok-123&expires_in=3600");

        // Unroutable backend: the user fetch fails, the fragment must not
        // survive anyway.
        let mut client = SupabaseClient::new("http://127.0.0.1:1".to_string(), "k".to_string());
        let result = client.complete_oauth_redirect().await;

        assert!(result.is_err());
        let hash = window.location().hash().unwrap_or_default();
        assert!(!hash.contains("access_token"), "token left in fragment: {hash}");
    }
}
