//! Lighthouse wire protocol: request envelopes and server messages.
//!
//! Every message is a MessagePack map carried in one binary WebSocket
//! frame. Field names are upper case on the wire.
//!
//! ## Outbound
//! ```text
//! { REID: uint,
//!   AUTH: { USER: str, TOKEN: str },
//!   VERB: "PUT" | "STREAM",
//!   PATH: ["user", <username>, "model"],
//!   META: {},
//!   PAYL: bin(1176) | {} }
//! ```
//!
//! ## Inbound
//! ```text
//! { REID?: uint, RNUM: int, RESPONSE?: str, WARNINGS?: [str], PAYL?: any }
//! ```
//!
//! Some server versions spell the warnings field `WARNIGS`; both are
//! accepted. A `PAYL` carrying `key` and `dwn` is a remote key event.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::error::LighthouseError;
use crate::event::Event;

/// Reply code the server uses for a successful request.
pub const RNUM_OK: i64 = 200;

// ── Verb ─────────────────────────────────────────────────────────

/// Request verbs used by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Verb {
    /// Replace the user's display model with the payload.
    Put,
    /// Subscribe to updates of the model, including remote input.
    Stream,
}

impl Verb {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Stream => "STREAM",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verb> for String {
    fn from(verb: Verb) -> Self {
        verb.as_str().to_string()
    }
}

impl TryFrom<String> for Verb {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "PUT" => Ok(Self::Put),
            "STREAM" => Ok(Self::Stream),
            _ => Err(format!("unknown verb {s:?}")),
        }
    }
}

// ── Auth ─────────────────────────────────────────────────────────

/// Credentials attached to every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Auth {
    pub user: String,
    pub token: String,
}

impl Auth {
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }
}

// ── Payload ──────────────────────────────────────────────────────

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Raw canvas bytes, encoded as a MessagePack `bin`.
    Image(ByteBuf),
    /// An empty map, used by requests that carry no data.
    Empty(BTreeMap<String, String>),
}

impl Payload {
    pub fn image(bytes: &[u8]) -> Self {
        Payload::Image(ByteBuf::from(bytes))
    }

    pub fn empty() -> Self {
        Payload::Empty(BTreeMap::new())
    }
}

// ── Envelope ─────────────────────────────────────────────────────

/// One outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Envelope {
    pub reid: u64,
    pub auth: Auth,
    pub verb: Verb,
    pub path: Vec<String>,
    /// Reserved; always empty.
    pub meta: BTreeMap<String, String>,
    pub payl: Payload,
}

impl Envelope {
    /// Build a request against `auth.user`'s display model.
    pub fn new(reid: u64, auth: &Auth, verb: Verb, payl: Payload) -> Self {
        Self {
            reid,
            path: model_path(&auth.user),
            auth: auth.clone(),
            verb,
            meta: BTreeMap::new(),
            payl,
        }
    }

    /// A PUT carrying a full canvas.
    pub fn put(reid: u64, auth: &Auth, image: &[u8]) -> Self {
        Self::new(reid, auth, Verb::Put, Payload::image(image))
    }

    /// A STREAM subscription request.
    pub fn stream(reid: u64, auth: &Auth) -> Self {
        Self::new(reid, auth, Verb::Stream, Payload::empty())
    }

    /// Serialize as a MessagePack map.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LighthouseError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserialize from MessagePack.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LighthouseError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// `["user", <username>, "model"]`
pub fn model_path(username: &str) -> Vec<String> {
    vec!["user".into(), username.into(), "model".into()]
}

// ── Inbound ──────────────────────────────────────────────────────

/// A remote input record carried in a reply's `PAYL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPayload {
    /// Key code of the input device.
    pub key: i32,
    /// `true` while the key is held down.
    pub dwn: bool,
    /// Source (client) identifier, when the server reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<i64>,
}

/// Reply body: either a recognised input record or something else.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReplyPayload {
    Input(InputPayload),
    Other(IgnoredAny),
}

/// A decoded server message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ServerMessage {
    #[serde(default)]
    pub reid: Option<u64>,
    pub rnum: i64,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default, alias = "WARNIGS")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub payl: Option<ReplyPayload>,
}

impl ServerMessage {
    /// Decode one binary frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LighthouseError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Whether the server accepted the request.
    pub fn is_ok(&self) -> bool {
        self.rnum == RNUM_OK
    }

    /// The remote input event carried by this message, if any.
    pub fn event(&self) -> Option<Event> {
        match &self.payl {
            Some(ReplyPayload::Input(input)) => Some(Event::key(input.key, input.dwn)),
            _ => None,
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rnum)?;
        if let Some(response) = &self.response {
            write!(f, " {response}")?;
        }
        if !self.warnings.is_empty() {
            write!(f, " {}", self.warnings.join(", "))?;
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, IMAGE_LEN};

    #[derive(Serialize)]
    #[serde(rename_all = "UPPERCASE")]
    struct FakeReply<'a, P: Serialize> {
        reid: u64,
        rnum: i64,
        response: &'a str,
        warnings: Vec<&'a str>,
        payl: P,
    }

    #[derive(Serialize)]
    struct LegacyReply<'a> {
        #[serde(rename = "RNUM")]
        rnum: i64,
        #[serde(rename = "RESPONSE")]
        response: &'a str,
        #[serde(rename = "WARNIGS")]
        warnings: Vec<&'a str>,
    }

    #[test]
    fn put_envelope_layout() {
        let auth = Auth::new("alice", "secret");
        let canvas = Canvas::new();
        let env = Envelope::put(7, &auth, canvas.as_bytes());

        assert_eq!(env.verb, Verb::Put);
        assert_eq!(env.path, vec!["user", "alice", "model"]);
        assert!(env.meta.is_empty());

        let decoded = Envelope::from_bytes(&env.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.reid, 7);
        assert_eq!(decoded.auth, auth);
        match decoded.payl {
            Payload::Image(bytes) => assert_eq!(bytes.len(), IMAGE_LEN),
            Payload::Empty(_) => panic!("image payload decoded as map"),
        }
    }

    #[test]
    fn envelope_is_a_named_map_with_binary_payload() {
        let auth = Auth::new("bob", "t");
        let bytes = Envelope::put(0, &auth, &[1, 2, 3]).to_bytes().unwrap();

        // fixmap with six entries
        assert_eq!(bytes[0], 0x86);
        let find = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
        for key in ["REID", "AUTH", "USER", "TOKEN", "VERB", "PUT", "PATH", "META", "PAYL"] {
            assert!(find(key.as_bytes()), "missing {key}");
        }
        // bin8 marker, length 3, then the raw bytes
        assert!(find(&[0xc4, 0x03, 1, 2, 3]));
    }

    #[test]
    fn stream_envelope_has_empty_map_payload() {
        let env = Envelope::stream(3, &Auth::new("carol", "x"));
        let decoded = Envelope::from_bytes(&env.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.verb, Verb::Stream);
        assert_eq!(decoded.payl, Payload::empty());
    }

    #[test]
    fn decodes_warning_reply() {
        let raw = rmp_serde::to_vec_named(&FakeReply {
            reid: 4,
            rnum: 401,
            response: "Unauthorized",
            warnings: vec!["bad token"],
            payl: (),
        })
        .unwrap();
        let msg = ServerMessage::from_bytes(&raw).unwrap();
        assert_eq!(msg.reid, Some(4));
        assert!(!msg.is_ok());
        assert_eq!(msg.warnings, vec!["bad token"]);
        assert_eq!(msg.to_string(), "401 Unauthorized bad token");
        assert!(msg.event().is_none());
    }

    #[test]
    fn accepts_misspelled_warnings_field() {
        let raw = rmp_serde::to_vec_named(&LegacyReply {
            rnum: 418,
            response: "Teapot",
            warnings: vec!["a", "b"],
        })
        .unwrap();
        let msg = ServerMessage::from_bytes(&raw).unwrap();
        assert_eq!(msg.warnings, vec!["a", "b"]);
        assert_eq!(msg.reid, None);
    }

    #[test]
    fn decodes_key_event_payload() {
        let raw = rmp_serde::to_vec_named(&FakeReply {
            reid: 1,
            rnum: 200,
            response: "OK",
            warnings: vec![],
            payl: InputPayload {
                key: 65,
                dwn: true,
                src: Some(2),
            },
        })
        .unwrap();
        let msg = ServerMessage::from_bytes(&raw).unwrap();
        assert!(msg.is_ok());
        assert_eq!(msg.event(), Some(Event::key(65, true)));
    }

    #[test]
    fn unknown_payload_is_not_an_event() {
        let raw = rmp_serde::to_vec_named(&FakeReply {
            reid: 1,
            rnum: 200,
            response: "OK",
            warnings: vec![],
            payl: vec![1u8, 2, 3],
        })
        .unwrap();
        let msg = ServerMessage::from_bytes(&raw).unwrap();
        assert!(msg.payl.is_some());
        assert!(msg.event().is_none());
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            ServerMessage::from_bytes(&[0xc1, 0x00]),
            Err(LighthouseError::Decode(_))
        ));
    }
}
