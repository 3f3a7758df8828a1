use crate::models::Bookmark;
use std::cell::Cell;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

pub(crate) const REALTIME_ERROR_MESSAGE: &str = "Realtime connection failed.";

const HEARTBEAT_MS: i32 = 30_000;
const JOIN_REF: &str = "1";

/// One row-change event from the push feed, already narrowed to this app's
/// table. DELETE payloads only carry the old row's identity columns, so the
/// variant holds just the id.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum BookmarkChange {
    Insert(Bookmark),
    Update(Bookmark),
    Delete(String),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ChannelStatus {
    Joined,
    Error(String),
}

/// Everything needed to open and authorize the per-user change feed.
#[derive(Clone, Debug)]
pub(crate) struct ChannelConfig {
    pub base_url: String,
    pub anon_key: String,
    /// Session credential; the server authorizes row visibility with it.
    pub access_token: String,
    pub user_id: String,
}

pub(crate) fn websocket_url(base_url: &str, anon_key: &str) -> String {
    let (scheme, rest) = if let Some(rest) = base_url.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        ("ws", rest)
    } else {
        ("wss", base_url)
    };

    format!(
        "{}://{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        scheme,
        rest.trim_end_matches('/'),
        urlencoding::encode(anon_key)
    )
}

pub(crate) fn channel_topic(user_id: &str) -> String {
    format!("realtime:bookmarks-{}", user_id)
}

/// Phoenix join frame: subscribes to `bookmarks` changes filtered to the
/// user's rows, carrying the access token for channel authorization.
pub(crate) fn join_message(topic: &str, user_id: &str, access_token: &str) -> String {
    serde_json::json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": "bookmarks",
                    "filter": format!("user_id=eq.{}", user_id),
                }],
            },
            "access_token": access_token,
        },
        "ref": JOIN_REF,
    })
    .to_string()
}

pub(crate) fn heartbeat_message() -> String {
    serde_json::json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": "hb",
    })
    .to_string()
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ServerMessage {
    Change(BookmarkChange),
    JoinedOk,
    JoinFailed(String),
}

/// Decode one server frame. `None` for frames this app does not act on
/// (heartbeat replies, presence, unknown topics, malformed rows).
pub(crate) fn parse_server_message(raw: &str) -> Option<ServerMessage> {
    let v: serde_json::Value = serde_json::from_str(raw).ok()?;
    let event = v.get("event").and_then(|e| e.as_str())?;

    match event {
        "postgres_changes" => {
            let data = v.get("payload")?.get("data")?;
            let kind = data.get("type").and_then(|t| t.as_str())?;

            match kind {
                "INSERT" | "UPDATE" => {
                    let record = data.get("record")?.clone();
                    let bookmark: Bookmark = serde_json::from_value(record).ok()?;
                    if kind == "INSERT" {
                        Some(ServerMessage::Change(BookmarkChange::Insert(bookmark)))
                    } else {
                        Some(ServerMessage::Change(BookmarkChange::Update(bookmark)))
                    }
                }
                "DELETE" => {
                    let id = data
                        .get("old_record")?
                        .get("id")
                        .and_then(|i| i.as_str())?
                        .to_string();
                    Some(ServerMessage::Change(BookmarkChange::Delete(id)))
                }
                _ => None,
            }
        }
        "phx_reply" => {
            // Only the join reply matters; heartbeat replies use other refs.
            if v.get("ref").and_then(|r| r.as_str()) != Some(JOIN_REF) {
                return None;
            }
            let status = v
                .get("payload")
                .and_then(|p| p.get("status"))
                .and_then(|s| s.as_str())
                .unwrap_or_default();
            if status == "ok" {
                Some(ServerMessage::JoinedOk)
            } else {
                Some(ServerMessage::JoinFailed(REALTIME_ERROR_MESSAGE.to_string()))
            }
        }
        "phx_error" => Some(ServerMessage::JoinFailed(REALTIME_ERROR_MESSAGE.to_string())),
        "system" => {
            let payload = v.get("payload")?;
            let status = payload.get("status").and_then(|s| s.as_str())?;
            if status == "error" {
                Some(ServerMessage::JoinFailed(REALTIME_ERROR_MESSAGE.to_string()))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Open subscription to the per-user change feed.
///
/// Owns the socket, the heartbeat interval, and the JS callbacks; dropping
/// the handle without calling [`RealtimeChannel::close`] would leak the
/// interval, so the collection view closes it from `on_cleanup`.
pub(crate) struct RealtimeChannel {
    ws: WebSocket,
    heartbeat_id: i32,
    closed: Rc<Cell<bool>>,

    _on_open: Closure<dyn FnMut(web_sys::Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(web_sys::Event)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
    _heartbeat_cb: Closure<dyn FnMut()>,
}

impl RealtimeChannel {
    pub fn connect(
        cfg: ChannelConfig,
        on_change: impl Fn(BookmarkChange) + 'static,
        on_status: impl Fn(ChannelStatus) + 'static,
    ) -> Result<Self, String> {
        let win = web_sys::window().ok_or_else(|| REALTIME_ERROR_MESSAGE.to_string())?;

        let ws = WebSocket::new(&websocket_url(&cfg.base_url, &cfg.anon_key))
            .map_err(|_| REALTIME_ERROR_MESSAGE.to_string())?;

        let closed = Rc::new(Cell::new(false));
        let on_status = Rc::new(on_status);
        let topic = channel_topic(&cfg.user_id);

        // Join (with channel authorization) once the socket is up.
        let join = join_message(&topic, &cfg.user_id, &cfg.access_token);
        let ws_open = ws.clone();
        let on_open = Closure::wrap(Box::new(move |_ev: web_sys::Event| {
            let _ = ws_open.send_with_str(&join);
        }) as Box<dyn FnMut(web_sys::Event)>);
        ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

        let status_msg = Rc::clone(&on_status);
        let on_message = Closure::wrap(Box::new(move |ev: MessageEvent| {
            let Some(text) = ev.data().as_string() else {
                return;
            };
            match parse_server_message(&text) {
                Some(ServerMessage::Change(change)) => on_change(change),
                Some(ServerMessage::JoinedOk) => (*status_msg)(ChannelStatus::Joined),
                Some(ServerMessage::JoinFailed(msg)) => (*status_msg)(ChannelStatus::Error(msg)),
                None => {}
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        let status_err = Rc::clone(&on_status);
        let closed_err = Rc::clone(&closed);
        let on_error = Closure::wrap(Box::new(move |_ev: web_sys::Event| {
            if !closed_err.get() {
                (*status_err)(ChannelStatus::Error(REALTIME_ERROR_MESSAGE.to_string()));
            }
        }) as Box<dyn FnMut(web_sys::Event)>);
        ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        // A close we did not ask for is a connection failure too.
        let status_close = Rc::clone(&on_status);
        let closed_close = Rc::clone(&closed);
        let on_close = Closure::wrap(Box::new(move |_ev: CloseEvent| {
            if !closed_close.get() {
                (*status_close)(ChannelStatus::Error(REALTIME_ERROR_MESSAGE.to_string()));
            }
        }) as Box<dyn FnMut(CloseEvent)>);
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        let ws_hb = ws.clone();
        let heartbeat_cb = Closure::wrap(Box::new(move || {
            if ws_hb.ready_state() == WebSocket::OPEN {
                let _ = ws_hb.send_with_str(&heartbeat_message());
            }
        }) as Box<dyn FnMut()>);
        let heartbeat_id = win
            .set_interval_with_callback_and_timeout_and_arguments_0(
                heartbeat_cb.as_ref().unchecked_ref(),
                HEARTBEAT_MS,
            )
            .unwrap_or(0);

        Ok(Self {
            ws,
            heartbeat_id,
            closed,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
            _on_close: on_close,
            _heartbeat_cb: heartbeat_cb,
        })
    }

    /// Deterministic teardown: stop the heartbeat, detach callbacks, close
    /// the socket. Idempotent.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }

        if let Some(win) = web_sys::window() {
            win.clear_interval_with_handle(self.heartbeat_id);
        }

        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
        let _ = self.ws.close();
    }
}
