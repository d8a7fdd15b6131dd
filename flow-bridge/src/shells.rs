//! Shell discovery: a list of named profiles, each resolved to the first
//! candidate that exists on disk or on `PATH`.

use std::path::Path;

use flow_core::host::ShellDiscovery;
use flow_core::ShellConfig;

#[derive(Debug, Clone)]
pub struct ShellProfile {
    pub label: String,
    /// Absolute paths or bare binary names, tried in order. `${env:VAR}` is
    /// expanded.
    pub candidates: Vec<String>,
    pub icon: Option<String>,
}

impl ShellProfile {
    pub fn new(label: &str, candidates: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            icon: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WhichShellDiscovery {
    profiles: Vec<ShellProfile>,
}

impl WhichShellDiscovery {
    pub fn new(profiles: Vec<ShellProfile>) -> Self {
        Self { profiles }
    }

    fn resolve(&self, profile: &ShellProfile) -> Option<String> {
        profile.candidates.iter().find_map(|candidate| {
            let expanded = expand_env(candidate);
            let path = Path::new(&expanded);
            if path.is_absolute() && path.exists() {
                return Some(expanded);
            }
            let name = path.file_name()?;
            match which::which(name) {
                Ok(found) => Some(found.to_string_lossy().to_string()),
                Err(e) => {
                    tracing::debug!("{} not found on PATH: {}", expanded, e);
                    None
                }
            }
        })
    }
}

impl Default for WhichShellDiscovery {
    fn default() -> Self {
        Self::new(default_profiles())
    }
}

impl ShellDiscovery for WhichShellDiscovery {
    fn available_shells(&self) -> Vec<ShellConfig> {
        self.profiles
            .iter()
            .filter_map(|profile| {
                let path = self.resolve(profile)?;
                Some(ShellConfig {
                    label: profile.label.clone(),
                    path,
                    icon: profile
                        .icon
                        .clone()
                        .unwrap_or_else(|| infer_icon(&profile.label).to_string()),
                })
            })
            .collect()
    }
}

#[cfg(windows)]
pub fn default_profiles() -> Vec<ShellProfile> {
    vec![
        ShellProfile::new("PowerShell", &["pwsh.exe", "powershell.exe"]),
        ShellProfile::new(
            "Command Prompt",
            &["${env:windir}\\System32\\cmd.exe", "cmd.exe"],
        ),
        ShellProfile::new(
            "Git Bash",
            &["${env:ProgramFiles}\\Git\\bin\\bash.exe", "git-bash.exe"],
        ),
    ]
}

#[cfg(not(windows))]
pub fn default_profiles() -> Vec<ShellProfile> {
    vec![
        ShellProfile::new("bash", &["bash"]),
        ShellProfile::new("zsh", &["zsh"]),
        ShellProfile::new("fish", &["fish"]),
        ShellProfile::new("sh", &["/bin/sh", "sh"]),
        ShellProfile::new("pwsh", &["pwsh"]),
    ]
}

/// Icon id for a profile label when the profile does not name one.
pub fn infer_icon(label: &str) -> &'static str {
    let l = label.to_lowercase();
    if l.contains("git") {
        "terminal-git-bash"
    } else if l.contains("powershell") || l.contains("pwsh") {
        "terminal-powershell"
    } else if l.contains("cmd") {
        "terminal-cmd"
    } else if l.contains("bash") {
        "terminal-bash"
    } else if l.contains("ubuntu") || l.contains("wsl") {
        "terminal-ubuntu"
    } else {
        "terminal"
    }
}

/// Expand `${env:VAR}` references; unset variables become empty.
pub fn expand_env(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${env:") {
        out.push_str(&rest[..start]);
        let after = &rest[start + "${env:".len()..];
        match after.find('}') {
            Some(end) => {
                out.push_str(&std::env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
