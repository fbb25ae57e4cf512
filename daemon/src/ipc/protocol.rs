//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::events::AppEvent;
use crate::settings::{HotkeyBinding, Profile, ProfileId};
use crate::state::AppState;

/// Frames larger than this are refused
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from a front-end to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Settings plus the last applied profile
    GetState,

    /// Names of the connected displays
    ListDisplays,

    /// Apply a profile to the selected displays
    ApplyProfile { profile_id: ProfileId },

    /// Add or update a profile
    SaveProfile { profile: Profile },

    DeleteProfile { profile_id: ProfileId },

    /// Replace every hotkey binding
    SetHotkeys { hotkeys: Vec<HotkeyBinding> },

    SetSelectedDisplays { displays: Vec<String> },

    SetFlags {
        start_minimized: bool,
        start_with_os: bool,
        hide_on_close: bool,
    },

    /// Receive every event from now on
    Subscribe,
}

/// Messages from the daemon to a front-end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current state snapshot
    State { state: AppState },

    /// Connected displays
    Displays { displays: Vec<String> },

    /// Request handed to the controller; its outcome arrives as an event
    Accepted,

    /// Subscription confirmed
    Subscribed,

    /// Pushed to subscribed clients
    Event { event: AppEvent },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Send a length-prefixed JSON message
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = u32::try_from(msg_bytes.len()).context("message too large")?;

    writer.write_all(&msg_len.to_le_bytes()).await?;
    writer.write_all(&msg_bytes).await?;
    writer.flush().await?;

    Ok(())
}

/// Read one length-prefixed JSON message; `None` on a clean disconnect
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        bail!("message of {len} bytes exceeds the {MAX_MESSAGE_LEN} byte limit");
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;

    let msg = serde_json::from_slice(&msg_buf).context("failed to parse message")?;
    Ok(Some(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::SetSelectedDisplays {
            displays: vec!["DISPLAY1".to_string()],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("set_selected_displays"));
        assert!(json.contains("DISPLAY1"));
    }

    #[test]
    fn test_request_from_front_end_json() {
        let json = r#"{"type":"set_flags","start_minimized":true,"start_with_os":false,"hide_on_close":true}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(
            req,
            Request::SetFlags {
                start_minimized: true,
                start_with_os: false,
                hide_on_close: true
            }
        ));
    }

    #[test]
    fn test_event_response_serialization() {
        let resp = Response::Event {
            event: AppEvent::SettingsSaved,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"type":"event","event":{"type":"settings_saved"}}"#);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_refused() {
        let len = (MAX_MESSAGE_LEN as u32 + 1).to_le_bytes();
        let mut reader: &[u8] = &len;
        let result: Result<Option<Request>> = read_message(&mut reader).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clean_eof_is_not_an_error() {
        let mut reader: &[u8] = &[];
        let result: Option<Request> = read_message(&mut reader).await.unwrap();
        assert!(result.is_none());
    }
}
