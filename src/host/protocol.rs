//! Host message protocol
//!
//! Requests from the UI host and the replies and push events sent back.
//! Every message is a JSON object tagged by `"type"`; on a byte stream each
//! message occupies exactly one line.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::bridge::OutputChunk;
use crate::error::{Error, Result};
use crate::models::{ProcessExit, SessionId, TerminalSession};
use crate::session::SessionEvent;
use crate::split::SplitDirection;

/// Identity of a UI host connection, stable across reconnects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(Uuid);

impl HostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for HostId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Messages sent by the UI host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostRequest {
    /// First message of a connection. Reuse a previous id to reconnect.
    Hello {
        #[serde(default)]
        host_id: Option<HostId>,
    },
    Create {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        profile: Option<String>,
        #[serde(default)]
        theme: Option<String>,
        #[serde(default)]
        cwd: Option<PathBuf>,
        #[serde(default)]
        cols: Option<u16>,
        #[serde(default)]
        rows: Option<u16>,
    },
    /// Keystrokes. `data` is a byte array or a UTF-8 string.
    Write {
        session_id: SessionId,
        #[serde(deserialize_with = "bytes_or_string")]
        data: Vec<u8>,
    },
    Resize {
        session_id: SessionId,
        cols: u16,
        rows: u16,
    },
    Dispose {
        #[serde(default)]
        request_id: Option<String>,
        session_id: SessionId,
    },
    Activate {
        session_id: SessionId,
    },
    List,
    Split {
        #[serde(default)]
        request_id: Option<String>,
        parent_id: SessionId,
        direction: SplitDirection,
    },
}

/// Messages sent to the UI host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Welcome {
        host_id: HostId,
    },
    Created {
        request_id: Option<String>,
        session_id: SessionId,
    },
    Disposed {
        request_id: Option<String>,
        session_id: SessionId,
        ok: bool,
    },
    Sessions {
        sessions: Vec<TerminalSession>,
    },
    /// Session output
    Data {
        session_id: SessionId,
        data: Vec<u8>,
    },
    Exit {
        session_id: SessionId,
        code: u32,
        signal: Option<String>,
    },
    Activated {
        session_id: SessionId,
    },
    Title {
        session_id: SessionId,
        title: String,
    },
    /// A theme was registered, replaced or removed; `sessions` use it
    ThemeChanged {
        theme: String,
        sessions: Vec<SessionId>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        session_id: Option<SessionId>,
        message: String,
    },
}

impl HostRequest {
    /// Parse one line of the wire format
    pub fn from_line(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim()).map_err(|e| Error::Protocol {
            reason: e.to_string(),
        })
    }
}

impl HostMessage {
    /// Encode as one line, newline included
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn error(session_id: Option<SessionId>, message: impl Into<String>) -> Self {
        HostMessage::Error {
            request_id: None,
            session_id,
            message: message.into(),
        }
    }

    fn exit(session_id: SessionId, exit: ProcessExit) -> Self {
        HostMessage::Exit {
            session_id,
            code: exit.code,
            signal: exit.signal,
        }
    }

    /// Push event for a session event, if the host is told about it
    pub fn from_event(event: SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::Exited { id, exit } => Some(Self::exit(id, exit)),
            SessionEvent::Error { id, message } => Some(Self::error(Some(id), message)),
            SessionEvent::Activated { id } => Some(HostMessage::Activated { session_id: id }),
            SessionEvent::TitleChanged { id, title } => Some(HostMessage::Title {
                session_id: id,
                title,
            }),
            SessionEvent::Created { .. }
            | SessionEvent::Failed { .. }
            | SessionEvent::Removed { .. } => None,
        }
    }
}

impl From<OutputChunk> for HostMessage {
    fn from(chunk: OutputChunk) -> Self {
        HostMessage::Data {
            session_id: chunk.session_id,
            data: chunk.data,
        }
    }
}

fn bytes_or_string<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        Text(String),
        Bytes(Vec<u8>),
    }

    Ok(match Payload::deserialize(deserializer)? {
        Payload::Text(text) => text.into_bytes(),
        Payload::Bytes(bytes) => bytes,
    })
}
