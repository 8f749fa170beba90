use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every request sent to the console.
pub const REQUEST_PREFIX: &str = "/eos";
/// Prefix of every reply the console sends back.
pub const REPLY_PREFIX: &str = "/eos/out";

/// A single typed OSC argument as the console sends it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Argument::Int(value)
    }
}

impl From<f32> for Argument {
    fn from(value: f32) -> Self {
        Argument::Float(value)
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Bool(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::String(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::String(value)
    }
}

/// An addressed message with its ordered arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EosMessage {
    pub address: String,
    pub arguments: Vec<Argument>,
}

impl EosMessage {
    pub fn new(address: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            address: address.into(),
            arguments,
        }
    }

    /// A message without arguments, the shape of every `get` request.
    pub fn request(address: impl Into<String>) -> Self {
        Self::new(address, Vec::new())
    }

    pub fn is_reply(&self) -> bool {
        self.address == REPLY_PREFIX || self.address.starts_with(&format!("{}/", REPLY_PREFIX))
    }

    /// Returns the message re-addressed without the reply prefix, or `None`
    /// when the address does not carry it.
    pub fn into_reply(self) -> Option<EosMessage> {
        if !self.is_reply() {
            return None;
        }
        let address = self.address[REPLY_PREFIX.len()..].to_string();
        Some(EosMessage {
            address,
            arguments: self.arguments,
        })
    }

    /// Address segments, ignoring the leading slash.
    pub fn address_parts(&self) -> Vec<&str> {
        self.address
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    pub fn address_part(&self, index: usize) -> Option<&str> {
        self.address
            .split('/')
            .filter(|segment| !segment.is_empty())
            .nth(index)
    }

    /// Parses an address segment as a display number (`"5"`, `"0.5"`).
    pub fn address_number(&self, index: usize) -> Option<f64> {
        self.address_part(index)?.parse::<f64>().ok()
    }

    /// The console identifier, always carried as the second argument.
    pub fn uuid(&self) -> Option<Uuid> {
        match self.arguments.get(1)? {
            Argument::String(value) => Uuid::parse_str(value).ok(),
            _ => None,
        }
    }

    pub fn int(&self, index: usize) -> Option<i32> {
        match self.arguments.get(index)? {
            Argument::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer argument that must also be non-negative.
    pub fn uint(&self, index: usize) -> Option<u32> {
        self.int(index).and_then(|value| u32::try_from(value).ok())
    }

    pub fn string(&self, index: usize) -> Option<&str> {
        match self.arguments.get(index)? {
            Argument::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Booleans arrive either as OSC `T`/`F` or as integers.
    pub fn bool(&self, index: usize) -> Option<bool> {
        match self.arguments.get(index)? {
            Argument::Bool(value) => Some(*value),
            Argument::Int(value) => Some(*value != 0),
            _ => None,
        }
    }

    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.arguments.get(index)
    }
}

impl std::fmt::Display for EosMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)?;
        for argument in &self.arguments {
            match argument {
                Argument::Bool(value) => write!(f, " {}(b)", value)?,
                Argument::Int(value) => write!(f, " {}(i)", value)?,
                Argument::Float(value) => write!(f, " {}(f)", value)?,
                Argument::String(value) => write!(f, " \"{}\"(s)", value)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_prefix_is_stripped() {
        let message = EosMessage::new("/eos/out/get/group/count", vec![Argument::Int(4)]);
        let reply = message.into_reply().unwrap();
        assert_eq!(reply.address, "/get/group/count");
        assert_eq!(reply.int(0), Some(4));
    }

    #[test]
    fn test_non_reply_addresses() {
        assert!(EosMessage::request("/eos/outside").into_reply().is_none());
        assert!(EosMessage::request("/etc/discovery/reply")
            .into_reply()
            .is_none());
    }

    #[test]
    fn test_address_numbers() {
        let message = EosMessage::request("/get/cue/1/0.5/noparts/list/0/1");
        assert_eq!(message.address_parts().len(), 8);
        assert_eq!(message.address_number(2), Some(1.0));
        assert_eq!(message.address_number(3), Some(0.5));
        assert_eq!(message.address_number(4), None);
    }

    #[test]
    fn test_typed_arguments() {
        let id = Uuid::new_v4();
        let message = EosMessage::new(
            "/get/group/1/list/0/1",
            vec![
                Argument::Int(0),
                Argument::String(id.to_string().to_uppercase()),
                Argument::Int(1),
                Argument::Bool(false),
            ],
        );
        assert_eq!(message.uuid(), Some(id));
        assert_eq!(message.bool(2), Some(true));
        assert_eq!(message.bool(3), Some(false));
        assert_eq!(message.string(2), None);
        assert_eq!(message.uint(0), Some(0));
    }
}
