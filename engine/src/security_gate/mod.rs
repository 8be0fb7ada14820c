use thiserror::Error;
use tracing::warn;

/// Known-destructive command fragments, matched as lower-case substrings.
///
/// Grouped by the kind of damage they do. Keep every entry lower-case.
const DEFAULT_DENYLIST: &[&str] = &[
    // Recursive deletion of the root filesystem
    "rm -rf /",
    "rm -fr /",
    "rm -r -f /",
    "rm -f -r /",
    "rm -rf /*",
    "rm --recursive --force /",
    "rm --force --recursive /",
    "--no-preserve-root",
    "rm -rf ~",
    "rm -rf $home",
    // Fork bombs
    ":(){ :|:& };:",
    ":(){:|:&};:",
    "fork while fork",
    // Raw block-device writes and filesystem creation
    "of=/dev/sd",
    "of=/dev/hd",
    "of=/dev/nvme",
    "of=/dev/mmcblk",
    "> /dev/sd",
    ">/dev/sd",
    "> /dev/nvme",
    "mkfs",
    "dd if=/dev/zero of=/dev/",
    "dd if=/dev/random of=/dev/",
    "dd if=/dev/urandom of=/dev/",
    "wipefs",
    // Shutdown and reboot
    "shutdown",
    "reboot",
    "poweroff",
    "halt -f",
    "init 0",
    "init 6",
    "systemctl halt",
    "systemctl poweroff",
    "systemctl reboot",
    // Destructive Windows directory deletion
    "rd /s /q c:\\",
    "rmdir /s /q c:\\",
    "del /f /s /q c:\\",
    "del /s /q c:\\windows",
    "remove-item -recurse -force c:\\",
    "remove-item c:\\windows",
    "format c:",
    // Reverse shells
    "nc -e",
    "ncat -e",
    "netcat -e",
    "nc -c /bin/",
    "/dev/tcp/",
    "/dev/udp/",
    "bash -i >&",
    "sh -i >&",
    "socat exec:",
    "socat tcp",
    "mkfifo /tmp/",
    "import socket,subprocess",
    "import socket, subprocess",
    "new-object system.net.sockets.tcpclient",
];

/// Reason a command was refused by the gate
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateDenial {
    #[error("Empty command")]
    Empty,

    #[error("Command matches blocked pattern '{0}'")]
    BlockedPattern(String),
}

/// SecurityGate authorizes commands before any capability spawns a process.
///
/// It is a pure substring scan over a fixed denylist: the command is
/// lower-cased and refused if any denylist entry occurs anywhere in it. It
/// does not parse the command, resolve aliases, or sandbox anything.
#[derive(Debug, Clone)]
pub struct SecurityGate {
    denylist: Vec<String>,
}

impl SecurityGate {
    /// Creates a gate with the default denylist.
    pub fn new() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Creates a gate with a custom denylist (entries are lower-cased).
    pub fn with_denylist(patterns: Vec<String>) -> Self {
        Self {
            denylist: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Adds a pattern to the denylist.
    pub fn deny_pattern(&mut self, pattern: impl Into<String>) {
        self.denylist.push(pattern.into().to_lowercase());
    }

    /// Returns the active denylist.
    pub fn patterns(&self) -> &[String] {
        &self.denylist
    }

    /// Checks a command, returning the reason when it is refused.
    ///
    /// `None`, empty and whitespace-only commands are refused.
    pub fn check<'a>(&self, command: impl Into<Option<&'a str>>) -> Result<(), GateDenial> {
        let command = match command.into() {
            Some(c) if !c.trim().is_empty() => c,
            _ => return Err(GateDenial::Empty),
        };

        let normalized = command.to_lowercase();
        match self
            .denylist
            .iter()
            .find(|pattern| normalized.contains(pattern.as_str()))
        {
            Some(pattern) => {
                warn!("Security gate blocked command matching '{}'", pattern);
                Err(GateDenial::BlockedPattern(pattern.clone()))
            }
            None => Ok(()),
        }
    }

    /// Returns true when the command may be executed.
    pub fn is_allowed<'a>(&self, command: impl Into<Option<&'a str>>) -> bool {
        self.check(command).is_ok()
    }
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks a command against the default denylist.
pub fn is_allowed<'a>(command: impl Into<Option<&'a str>>) -> bool {
    SecurityGate::new().is_allowed(command)
}
