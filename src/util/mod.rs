/// Host part of an absolute http(s) URL, or `None` when the string does not
/// look like one. Userinfo and port are dropped.
fn host_of(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;

    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];

    let host = authority.rsplit('@').next().unwrap_or(authority);
    let host = host.split(':').next().unwrap_or(host);

    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Hostname for display, with a leading `www.` stripped.
/// A malformed URL falls back to the raw input string.
pub(crate) fn display_hostname(url: &str) -> String {
    match host_of(url.trim()) {
        Some(h) => h.strip_prefix("www.").unwrap_or(h).to_string(),
        None => url.to_string(),
    }
}

/// Favicon image URL (Google s2 service) for a bookmark's site.
/// `None` when the URL cannot be parsed; callers render no image then.
pub(crate) fn favicon_url(url: &str) -> Option<String> {
    let host = host_of(url.trim())?;
    let domain = host.strip_prefix("www.").unwrap_or(host);
    Some(format!(
        "https://www.google.com/s2/favicons?sz=128&domain={}",
        domain
    ))
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Short date label for a server timestamp: "Aug 1", or "Aug 1, 2025" when
/// the year differs from `current_year`. Unparseable input is returned as-is.
pub(crate) fn format_created_date(created_at: &str, current_year: i32) -> String {
    let date = created_at.get(..10).unwrap_or("");
    let mut parts = date.split('-');

    let (Some(y), Some(m), Some(d)) = (parts.next(), parts.next(), parts.next()) else {
        return created_at.to_string();
    };

    let (Ok(year), Ok(month), Ok(day)) = (y.parse::<i32>(), m.parse::<usize>(), d.parse::<u32>())
    else {
        return created_at.to_string();
    };

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return created_at.to_string();
    }

    if year == current_year {
        format!("{} {}", MONTHS[month - 1], day)
    } else {
        format!("{} {}, {}", MONTHS[month - 1], day, year)
    }
}

pub(crate) fn now_secs() -> i64 {
    // Use system clock (browser runtime).
    (js_sys::Date::now() / 1000.0).round() as i64
}

pub(crate) fn current_year_local() -> i32 {
    js_sys::Date::new_0().get_full_year() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_hostname_strips_www() {
        assert_eq!(display_hostname("https://www.example.com/a/b"), "example.com");
        assert_eq!(display_hostname("http://example.com"), "example.com");
    }

    #[test]
    fn test_display_hostname_keeps_subdomains() {
        assert_eq!(
            display_hostname("https://docs.rs/leptos/latest"),
            "docs.rs"
        );
        assert_eq!(
            display_hostname("https://news.ycombinator.com?id=1"),
            "news.ycombinator.com"
        );
    }

    #[test]
    fn test_display_hostname_drops_port_and_userinfo() {
        assert_eq!(display_hostname("http://localhost:3000/x"), "localhost");
        assert_eq!(display_hostname("https://user@host.io/p"), "host.io");
    }

    #[test]
    fn test_display_hostname_malformed_returns_input() {
        // Not http(s), or no host at all: fall back to the raw string.
        assert_eq!(display_hostname("ftp://example.com"), "ftp://example.com");
        assert_eq!(display_hostname("not a url"), "not a url");
        assert_eq!(display_hostname("https://"), "https://");
    }

    #[test]
    fn test_favicon_url_for_valid_site() {
        assert_eq!(
            favicon_url("https://www.example.com/page").as_deref(),
            Some("https://www.google.com/s2/favicons?sz=128&domain=example.com")
        );
    }

    #[test]
    fn test_favicon_url_malformed_is_none() {
        assert!(favicon_url("example.com").is_none());
        assert!(favicon_url("").is_none());
        assert!(favicon_url("https://#frag").is_none());
    }

    #[test]
    fn test_format_created_date_same_year() {
        assert_eq!(
            format_created_date("2026-08-01T10:20:30.000Z", 2026),
            "Aug 1"
        );
    }

    #[test]
    fn test_format_created_date_other_year() {
        assert_eq!(
            format_created_date("2025-12-31T23:59:59Z", 2026),
            "Dec 31, 2025"
        );
    }

    #[test]
    fn test_format_created_date_unparseable_passthrough() {
        assert_eq!(format_created_date("yesterday", 2026), "yesterday");
        assert_eq!(format_created_date("", 2026), "");
    }
}
