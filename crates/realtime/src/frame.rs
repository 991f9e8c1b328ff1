//! STOMP 1.2 frame codec
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```
//!
//! One WebSocket text message may carry several frames. End-of-line
//! heart-beats between frames are skipped.

use syncrift_core::{Credential, Result, SyncriftError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            _ => return None,
        })
    }

    /// CONNECT and CONNECTED headers are never escaped
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header; repeated headers keep the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str, credential: &Credential) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2,1.1")
            .header("host", host)
            .header("heart-beat", "0,0")
            .header("Authorization", credential.bearer())
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn send(destination: &str, json_body: String) -> Self {
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", json_body.len().to_string())
            .with_body(json_body)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode exactly one frame (trailing heart-beats allowed)
    pub fn decode(raw: &str) -> Result<Frame> {
        let mut frames = decode_all(raw)?;
        match frames.len() {
            1 => Ok(frames.remove(0)),
            n => Err(SyncriftError::Protocol(format!("expected 1 frame, got {n}"))),
        }
    }
}

/// Decode every frame in a transport payload
pub fn decode_all(payload: &str) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut rest = payload;
    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            break;
        }
        let (frame, consumed) = decode_one(rest)?;
        frames.push(frame);
        rest = &rest[consumed..];
    }
    Ok(frames)
}

fn decode_one(input: &str) -> Result<(Frame, usize)> {
    let mut pos = 0;
    let command_line = read_line(input, &mut pos)?;
    let command = Command::parse(command_line)
        .ok_or_else(|| SyncriftError::Protocol(format!("unknown command: {command_line}")))?;

    let mut headers = Vec::new();
    loop {
        let line = read_line(input, &mut pos)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| SyncriftError::Protocol(format!("malformed header: {line}")))?;
        if command.escapes_headers() {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| SyncriftError::Protocol(format!("bad content-length: {v}")))
        })
        .transpose()?;

    let (body, end) = match content_length {
        Some(len) => {
            let end = pos
                .checked_add(len)
                .ok_or_else(|| SyncriftError::Protocol(format!("content-length out of range: {len}")))?;
            let body = input
                .get(pos..end)
                .ok_or_else(|| SyncriftError::Protocol("truncated frame body".to_string()))?;
            if !input[end..].starts_with('\0') {
                return Err(SyncriftError::Protocol(
                    "missing NUL after content-length body".to_string(),
                ));
            }
            (body, end)
        }
        None => {
            let nul = input[pos..]
                .find('\0')
                .ok_or_else(|| SyncriftError::Protocol("missing NUL terminator".to_string()))?;
            (&input[pos..pos + nul], pos + nul)
        }
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        end + 1,
    ))
}

fn read_line<'a>(input: &'a str, pos: &mut usize) -> Result<&'a str> {
    let rest = &input[*pos..];
    let nl = rest
        .find('\n')
        .ok_or_else(|| SyncriftError::Protocol("unterminated frame header".to_string()))?;
    *pos += nl + 1;
    let line = &rest[..nl];
    Ok(line.strip_suffix('\r').unwrap_or(line))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(SyncriftError::Protocol(format!(
                    "invalid header escape: \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_spring_message_frame() {
        let raw = "MESSAGE\ndestination:/user/topic/battle/create\ncontent-type:application/json\nsubscription:sub-3\nmessage-id:abc-1\ncontent-length:14\n\n{\"battleId\":7}\0";
        let frame = Frame::decode(raw).unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-3"));
        assert_eq!(frame.body, "{\"battleId\":7}");
    }

    #[test]
    fn test_connect_frame_carries_bearer_unescaped() {
        let frame = Frame::connect("localhost", &Credential::new("a:b"));
        let encoded = frame.encode();
        assert!(encoded.starts_with("CONNECT\n"));
        assert!(encoded.contains("Authorization:Bearer a:b\n"));
        assert!(encoded.ends_with("\n\n\0"));
    }

    #[test]
    fn test_send_frame_escapes_header_values() {
        let encoded = Frame::send("/app/odd:dest", "1".to_string()).encode();
        assert!(encoded.contains("destination:/app/odd\\cdest\n"));

        let back = Frame::decode(&encoded).unwrap();
        assert_eq!(back.get("destination"), Some("/app/odd:dest"));
        assert_eq!(back.get("content-length"), Some("1"));
    }

    #[test]
    fn test_decode_all_skips_heartbeats_between_frames() {
        let payload = "\nRECEIPT\nreceipt-id:1\n\n\0\r\nMESSAGE\nsubscription:sub-1\n\nhello\0\n";
        let frames = decode_all(payload).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, Command::Receipt);
        assert_eq!(frames[1].body, "hello");
    }

    #[test]
    fn test_heartbeat_only_payload_is_empty() {
        assert!(decode_all("\n").unwrap().is_empty());
    }

    #[test]
    fn test_content_length_allows_nul_in_body() {
        let raw = "MESSAGE\ncontent-length:3\n\na\0b\0";
        let frame = Frame::decode(raw).unwrap();
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Frame::decode("HELLO\n\n\0").is_err());
        assert!(Frame::decode("MESSAGE\nno-colon\n\n\0").is_err());
        assert!(Frame::decode("MESSAGE\nsubscription:sub-1\n\nunterminated").is_err());
        assert!(Frame::decode("MESSAGE\nbad:\\x\n\n\0").is_err());
        assert!(Frame::decode("MESSAGE\ncontent-length:50\n\nshort\0").is_err());
    }

    #[test]
    fn test_error_frame_message_header() {
        let raw = "ERROR\nmessage:Failed to send message to ExecutorSubscribableChannel\n\n\0";
        let frame = Frame::decode(raw).unwrap();
        assert_eq!(frame.command, Command::Error);
        assert!(frame.get("message").unwrap().starts_with("Failed"));
    }

    #[test]
    fn test_huge_content_length_is_a_protocol_error() {
        let raw = format!(
            "MESSAGE\nsubscription:sub-1\ncontent-length:{}\n\nhi\0",
            usize::MAX
        );
        assert!(matches!(decode_all(&raw), Err(SyncriftError::Protocol(_))));
    }

    #[test]
    fn test_content_length_inside_multibyte_char_is_rejected() {
        let raw = "MESSAGE\ncontent-length:1\n\n\u{e9}\0";
        assert!(matches!(Frame::decode(raw), Err(SyncriftError::Protocol(_))));
    }
}
