use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Family member reported by a console.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsoleType {
    Nomad,
    NomadPuck,
    Element,
    Element2,
    Ion,
    IonXe,
    IonXe20,
    Eos,
    EosRvi,
    EosRpu,
    Ti,
    Gio,
    Gio5,
    Unknown,
}

impl ConsoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleType::Nomad => "ETCnomad",
            ConsoleType::NomadPuck => "ETCnomad Puck",
            ConsoleType::Element => "Element",
            ConsoleType::Element2 => "Element2",
            ConsoleType::Ion => "Ion",
            ConsoleType::IonXe => "IonXE",
            ConsoleType::IonXe20 => "IonXE20",
            ConsoleType::Eos => "Eos",
            ConsoleType::EosRvi => "Eos RVI",
            ConsoleType::EosRpu => "Eos RPU",
            ConsoleType::Ti => "Ti",
            ConsoleType::Gio => "Gio",
            ConsoleType::Gio5 => "Gio@5",
            ConsoleType::Unknown => "unknown",
        }
    }

    const KNOWN: [ConsoleType; 13] = [
        ConsoleType::Nomad,
        ConsoleType::NomadPuck,
        ConsoleType::Element,
        ConsoleType::Element2,
        ConsoleType::Ion,
        ConsoleType::IonXe,
        ConsoleType::IonXe20,
        ConsoleType::Eos,
        ConsoleType::EosRvi,
        ConsoleType::EosRpu,
        ConsoleType::Ti,
        ConsoleType::Gio,
        ConsoleType::Gio5,
    ];
}

impl FromStr for ConsoleType {
    type Err = std::convert::Infallible;

    /// Unrecognised strings parse as `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ConsoleType::KNOWN
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .unwrap_or(ConsoleType::Unknown))
    }
}

impl fmt::Display for ConsoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A console the client can connect to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Console {
    pub name: String,
    pub console_type: ConsoleType,
    pub host: String,
    pub port: u16,
}

impl Console {
    pub fn new(name: impl Into<String>, console_type: ConsoleType, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            console_type,
            host: host.into(),
            port,
        }
    }

    /// Splits a label such as `"RPU3 (Eos RPU)"` into name and type.
    pub fn parse_label(label: &str) -> Option<(String, ConsoleType)> {
        let open = label.rfind('(')?;
        let close = label.rfind(')')?;
        if close < open {
            return None;
        }
        let name = label[..open].trim_end().to_string();
        let kind = label[open + 1..close].parse().unwrap_or(ConsoleType::Unknown);
        Some((name, kind))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.name, self.console_type, self.address())
    }
}
