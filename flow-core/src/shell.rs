//! Shell classification and one-shot invocation.
//!
//! Each block runs as `<shell> <flag> <command>`; the shell is spawned
//! directly, never through another wrapper shell.

/// The closed set of shell families Flow knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    PowerShell,
    Cmd,
    Posix,
    Unknown,
}

const POSIX_SHELLS: &[&str] = &["bash", "zsh", "sh", "fish", "dash", "ksh", "mksh", "ash"];

impl ShellKind {
    /// Classify a configured shell path or bare name.
    pub fn classify(shell: &str) -> Self {
        let name = executable_name(shell);
        if name.contains("powershell") || name.contains("pwsh") {
            ShellKind::PowerShell
        } else if name == "cmd" {
            ShellKind::Cmd
        } else if POSIX_SHELLS.contains(&name.as_str()) || name.ends_with("sh") {
            ShellKind::Posix
        } else {
            ShellKind::Unknown
        }
    }

    /// Flag that makes the shell run one command string and exit.
    /// Unknown shells are assumed to be POSIX-like.
    pub fn command_flag(self) -> &'static str {
        match self {
            ShellKind::PowerShell => "-Command",
            ShellKind::Cmd => "/C",
            ShellKind::Posix | ShellKind::Unknown => "-c",
        }
    }
}

/// Program + arguments for one block execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellInvocation {
    pub fn new(shell: &str, command: &str) -> Self {
        let kind = ShellKind::classify(shell);
        Self {
            program: shell.to_string(),
            args: vec![kind.command_flag().to_string(), command.to_string()],
        }
    }
}

/// Lower-cased file name without directory or `.exe`, accepting both
/// separators so Windows paths classify the same on every host.
fn executable_name(shell: &str) -> String {
    let base = shell
        .trim()
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    base.strip_suffix(".exe").map(str::to_string).unwrap_or(base)
}

/// Platform default when the host gives no shell signal.
pub fn platform_default_shell() -> &'static str {
    if cfg!(windows) {
        "powershell.exe"
    } else {
        "bash"
    }
}
