//! Service manager commands per operating system

use crate::module::wait_for::LAUNCHD_LABEL_PREFIX;
use crate::topology::OsKind;

/// Service manager action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceVerb {
    Start,
    Stop,
    Enable,
    Disable,
}

impl std::fmt::Display for ServiceVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceVerb::Start => write!(f, "start"),
            ServiceVerb::Stop => write!(f, "stop"),
            ServiceVerb::Enable => write!(f, "enable"),
            ServiceVerb::Disable => write!(f, "disable"),
        }
    }
}

/// Command applying `verb` to the service `unit` on a host running `os`
pub fn service_command(os: OsKind, verb: ServiceVerb, unit: &str) -> String {
    match os {
        OsKind::Linux => format!(
            "systemctl daemon-reload && systemctl {} {}.service",
            verb, unit
        ),
        OsKind::Darwin => {
            let label = format!("{}.{}", LAUNCHD_LABEL_PREFIX, unit);
            match verb {
                ServiceVerb::Start | ServiceVerb::Stop => format!("launchctl {} {}", verb, label),
                ServiceVerb::Enable | ServiceVerb::Disable => {
                    format!("launchctl {} system/{}", verb, label)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_commands() {
        assert_eq!(
            service_command(OsKind::Linux, ServiceVerb::Start, "meta-2379"),
            "systemctl daemon-reload && systemctl start meta-2379.service"
        );
        assert_eq!(
            service_command(OsKind::Linux, ServiceVerb::Disable, "meta-2379"),
            "systemctl daemon-reload && systemctl disable meta-2379.service"
        );
    }

    #[test]
    fn test_darwin_commands() {
        assert_eq!(
            service_command(OsKind::Darwin, ServiceVerb::Stop, "meta-2379"),
            "launchctl stop com.evoker.rune-cluster.meta-2379"
        );
        assert_eq!(
            service_command(OsKind::Darwin, ServiceVerb::Enable, "meta-2379"),
            "launchctl enable system/com.evoker.rune-cluster.meta-2379"
        );
    }
}
