//
// Copyright 2026 The Portal Project Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Control-frame parsing (§4.5).
//!
//! A browser frame is a control frame iff its first byte is `{`; everything
//! else is opaque user input. Recognized keys are all optional and
//! truthy-only: a falsy value (`0`, `""`, `false`, `null`, or simply absent)
//! never updates session state, it only means "don't touch this field".

use serde_json::Value;

/// One MSDP value: a single string or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsdpValue {
    /// `sendMSDP(key, val)`.
    Scalar(String),
    /// `sendMSDP(key, [val, ...])`.
    List(Vec<String>),
}

/// A parsed `msdp` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsdpRequest {
    /// MSDP variable name.
    pub key: String,
    /// MSDP variable value(s).
    pub val: MsdpValue,
}

/// A parsed `chat` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    /// Target channel, if given.
    pub channel: Option<String>,
    /// Message body, if given.
    pub msg: Option<String>,
    /// Display name override, if given.
    pub name: Option<String>,
}

/// A fully parsed control frame. Every field reflects only the truthy
/// updates present in the JSON payload; absent/falsy keys leave the
/// corresponding field `None`/`false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFrame {
    /// New upstream host, if set.
    pub host: Option<String>,
    /// New upstream port, if set (0 is falsy and ignored).
    pub port: Option<u16>,
    /// Replacement single-element terminal-type queue, if set.
    pub ttype: Option<String>,
    /// Display name, if set.
    pub name: Option<String>,
    /// Display client identity, if set.
    pub client: Option<String>,
    /// Enable MCCP.
    pub mccp: bool,
    /// Enable UTF-8.
    pub utf8: bool,
    /// Enable debug logging.
    pub debug: bool,
    /// Chat Bus post, if present.
    pub chat: Option<ChatRequest>,
    /// Initiate the upstream dial.
    pub connect: bool,
    /// Raw bytes to forward to upstream verbatim.
    pub bin: Option<Vec<u8>>,
    /// `sendMSDP` invocation, if present.
    pub msdp: Option<MsdpRequest>,
}

impl ControlFrame {
    /// A browser text frame is a control frame iff its first byte is `{`.
    pub fn looks_like_control_frame(payload: &str) -> bool {
        payload.as_bytes().first() == Some(&b'{')
    }

    /// Parse a control frame. Returns `Err` on malformed JSON; the caller
    /// is expected to log and discard the frame in that case (§4.5).
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(payload)?;
        Ok(Self::from_value(&value))
    }

    fn from_value(value: &Value) -> Self {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => return Self::default(),
        };

        Self {
            host: truthy_string(obj.get("host")),
            port: truthy_port(obj.get("port")),
            ttype: truthy_string(obj.get("ttype")),
            name: truthy_string(obj.get("name")),
            client: truthy_string(obj.get("client")),
            mccp: truthy_bool(obj.get("mccp")),
            utf8: truthy_bool(obj.get("utf8")),
            debug: truthy_bool(obj.get("debug")),
            chat: obj.get("chat").and_then(parse_chat),
            connect: is_truthy(obj.get("connect")),
            bin: obj.get("bin").and_then(parse_bin),
            msdp: obj.get("msdp").and_then(parse_msdp),
        }
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn truthy_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn truthy_bool(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn truthy_port(value: Option<&Value>) -> Option<u16> {
    match value.and_then(Value::as_u64) {
        Some(0) | None => None,
        Some(n) => u16::try_from(n).ok(),
    }
}

fn parse_chat(value: &Value) -> Option<ChatRequest> {
    let obj = value.as_object()?;
    Some(ChatRequest {
        channel: truthy_string(obj.get("channel")),
        msg: truthy_string(obj.get("msg")),
        name: truthy_string(obj.get("name")),
    })
}

fn parse_bin(value: &Value) -> Option<Vec<u8>> {
    let arr = value.as_array()?;
    Some(arr.iter().filter_map(|v| v.as_u64()).map(|n| n as u8).collect())
}

fn parse_msdp(value: &Value) -> Option<MsdpRequest> {
    let obj = value.as_object()?;
    let key = truthy_string(obj.get("key"))?;
    let val = match obj.get("val") {
        Some(Value::Array(items)) => {
            let strings: Vec<String> = items
                .iter()
                .filter_map(value_to_msdp_string)
                .collect();
            if strings.is_empty() {
                return None;
            }
            MsdpValue::List(strings)
        }
        other => MsdpValue::Scalar(value_to_msdp_string(other?)?),
    };
    Some(MsdpRequest { key, val })
}

fn value_to_msdp_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_brace_payload_is_not_a_control_frame() {
        assert!(!ControlFrame::looks_like_control_frame("look"));
        assert!(ControlFrame::looks_like_control_frame("{\"connect\":true}"));
    }

    #[test]
    fn falsy_fields_are_ignored() {
        let frame = ControlFrame::parse(
            r#"{"host":"","port":0,"name":null,"mccp":false,"connect":false}"#,
        )
        .unwrap();
        assert_eq!(frame.host, None);
        assert_eq!(frame.port, None);
        assert_eq!(frame.name, None);
        assert!(!frame.mccp);
        assert!(!frame.connect);
    }

    #[test]
    fn truthy_fields_populate() {
        let frame = ControlFrame::parse(
            r#"{"host":"mud.example","port":4000,"ttype":"xterm","mccp":true,"connect":true}"#,
        )
        .unwrap();
        assert_eq!(frame.host.as_deref(), Some("mud.example"));
        assert_eq!(frame.port, Some(4000));
        assert_eq!(frame.ttype.as_deref(), Some("xterm"));
        assert!(frame.mccp);
        assert!(frame.connect);
    }

    #[test]
    fn chat_object_parses_fields() {
        let frame = ControlFrame::parse(
            r#"{"chat":{"channel":"ooc","msg":"hi","name":"Bob"}}"#,
        )
        .unwrap();
        let chat = frame.chat.unwrap();
        assert_eq!(chat.channel.as_deref(), Some("ooc"));
        assert_eq!(chat.msg.as_deref(), Some("hi"));
        assert_eq!(chat.name.as_deref(), Some("Bob"));
    }

    #[test]
    fn bin_array_becomes_raw_bytes() {
        let frame = ControlFrame::parse(r#"{"bin":[1,2,255]}"#).unwrap();
        assert_eq!(frame.bin, Some(vec![1, 2, 255]));
    }

    #[test]
    fn msdp_scalar_and_list() {
        let scalar = ControlFrame::parse(r#"{"msdp":{"key":"GROUP","val":"zone"}}"#).unwrap();
        assert_eq!(
            scalar.msdp,
            Some(MsdpRequest { key: "GROUP".into(), val: MsdpValue::Scalar("zone".into()) })
        );

        let list = ControlFrame::parse(r#"{"msdp":{"key":"ROOM_EXITS","val":["n","s"]}}"#).unwrap();
        assert_eq!(
            list.msdp,
            Some(MsdpRequest {
                key: "ROOM_EXITS".into(),
                val: MsdpValue::List(vec!["n".into(), "s".into()])
            })
        );
    }

    #[test]
    fn msdp_missing_key_or_val_is_absent() {
        let no_key = ControlFrame::parse(r#"{"msdp":{"val":"zone"}}"#).unwrap();
        assert_eq!(no_key.msdp, None);

        let no_val = ControlFrame::parse(r#"{"msdp":{"key":"GROUP"}}"#).unwrap();
        assert_eq!(no_val.msdp, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ControlFrame::parse("{not json").is_err());
    }
}
