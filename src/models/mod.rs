use serde::{Deserialize, Serialize};

/// One bookmark row, as stored in the backend `bookmarks` table.
///
/// `id` and `created_at` are assigned server-side; `user_id` is the only
/// authorization key (row-level security on the backend matches it against
/// the authenticated user).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub created_at: String,
}

/// Authenticated user, as returned by the auth endpoint.
///
/// The backend user object carries many more fields (identities, metadata);
/// we only need the id for row scoping and the email for the navbar.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// OAuth session: access credential plus the owning user.
///
/// Assembled after the provider redirect and persisted in localStorage.
/// An expired session is treated the same as no session at all.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub expires_at: i64,
    pub user: UserInfo,
}

impl Session {
    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.expires_at <= now_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmark_row_deserialize() {
        // Contract: PostgREST returns snake_case columns with full payloads.
        let json = r#"{
            "id": "0b9f3c74-9d2e-4d8c-8a57-0d6a9cf07e11",
            "user_id": "u-1",
            "url": "https://example.com/article",
            "title": "An article",
            "created_at": "2026-08-01T10:20:30.000Z"
        }"#;
        let b: Bookmark = serde_json::from_str(json).expect("bookmark row should parse");
        assert_eq!(b.user_id, "u-1");
        assert_eq!(b.title, "An article");
        assert!(b.created_at.starts_with("2026-08-01"));
    }

    #[test]
    fn test_user_info_tolerates_missing_email() {
        let u: UserInfo = serde_json::from_str(r#"{"id": "u-1"}"#).expect("should parse");
        assert_eq!(u.id, "u-1");
        assert!(u.email.is_none());
    }

    #[test]
    fn test_session_expiry() {
        let s = Session {
            access_token: "jwt".to_string(),
            refresh_token: None,
            expires_at: 1_000,
            user: UserInfo {
                id: "u-1".to_string(),
                email: None,
            },
        };
        assert!(!s.is_expired(999));
        assert!(s.is_expired(1_000));
        assert!(s.is_expired(2_000));
    }

    #[test]
    fn test_session_storage_roundtrip_json() {
        let s = Session {
            access_token: "jwt".to_string(),
            refresh_token: Some("r".to_string()),
            expires_at: 42,
            user: UserInfo {
                id: "u-1".to_string(),
                email: Some("u@example.com".to_string()),
            },
        };
        let json = serde_json::to_string(&s).expect("should serialize");
        let back: Session = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(back, s);
    }
}
