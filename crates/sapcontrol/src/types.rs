//! Wire types of the sapcontrol webservice.

use std::fmt;

/// Dispatch status color reported for processes and instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateColor {
    Gray,
    Green,
    Yellow,
    Red,
}

impl StateColor {
    /// Parse the wire representation, e.g. `SAPControl-GREEN`.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "SAPControl-GRAY" => Some(StateColor::Gray),
            "SAPControl-GREEN" => Some(StateColor::Green),
            "SAPControl-YELLOW" => Some(StateColor::Yellow),
            "SAPControl-RED" => Some(StateColor::Red),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            StateColor::Gray => "SAPControl-GRAY",
            StateColor::Green => "SAPControl-GREEN",
            StateColor::Yellow => "SAPControl-YELLOW",
            StateColor::Red => "SAPControl-RED",
        }
    }
}

impl fmt::Display for StateColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// One entry of `GetProcessList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsProcess {
    pub name: String,
    pub description: String,
    pub dispstatus: Option<StateColor>,
    pub textstatus: String,
    pub pid: i32,
}

/// One entry of `GetSystemInstanceList`.
///
/// `features` is a pipe-separated tag string (e.g. `ABAP|GATEWAY|ICMAN`)
/// used to classify the instance for start/stop filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInstance {
    pub hostname: String,
    pub instance_nr: i32,
    pub features: String,
    pub dispstatus: Option<StateColor>,
}

/// Instance-type selector carried by `StartSystem`/`StopSystem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartStopOption {
    #[default]
    AllInstances,
    AbapInstances,
    J2eeInstances,
    ScsInstances,
    EnqrepInstances,
}

impl StartStopOption {
    pub fn as_wire(&self) -> &'static str {
        match self {
            StartStopOption::AllInstances => "SAPControl-ALL-INSTANCES",
            StartStopOption::AbapInstances => "SAPControl-ABAP-INSTANCES",
            StartStopOption::J2eeInstances => "SAPControl-J2EE-INSTANCES",
            StartStopOption::ScsInstances => "SAPControl-SCS-INSTANCES",
            StartStopOption::EnqrepInstances => "SAPControl-ENQREP-INSTANCES",
        }
    }

    /// Substring an instance's `features` must contain to be part of this
    /// selection; empty means every instance matches.
    pub fn features_filter(&self) -> &'static str {
        match self {
            StartStopOption::AllInstances => "",
            StartStopOption::AbapInstances => "ABAP",
            StartStopOption::J2eeInstances => "J2EE",
            StartStopOption::ScsInstances => "MESSAGESERVER",
            StartStopOption::EnqrepInstances => "ENQREP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_color_round_trip() {
        for color in [
            StateColor::Gray,
            StateColor::Green,
            StateColor::Yellow,
            StateColor::Red,
        ] {
            assert_eq!(StateColor::from_wire(color.as_wire()), Some(color));
        }
        assert_eq!(StateColor::from_wire("SAPControl-BLUE"), None);
    }

    #[test]
    fn test_features_filter() {
        assert_eq!(StartStopOption::AllInstances.features_filter(), "");
        assert_eq!(StartStopOption::ScsInstances.features_filter(), "MESSAGESERVER");
    }
}
