use flow_bridge::shells::{expand_env, infer_icon, ShellProfile, WhichShellDiscovery};
use flow_core::host::ShellDiscovery;

// ============================================================================
// Icons
// ============================================================================

#[test]
fn test_infer_icon() {
    assert_eq!(infer_icon("Git Bash"), "terminal-git-bash");
    assert_eq!(infer_icon("PowerShell 7"), "terminal-powershell");
    assert_eq!(infer_icon("pwsh"), "terminal-powershell");
    assert_eq!(infer_icon("Command Prompt (cmd)"), "terminal-cmd");
    assert_eq!(infer_icon("bash"), "terminal-bash");
    assert_eq!(infer_icon("Ubuntu (WSL)"), "terminal-ubuntu");
    assert_eq!(infer_icon("zsh"), "terminal");
}

// ============================================================================
// Variable expansion
// ============================================================================

#[test]
fn test_expand_env() {
    std::env::set_var("FLOW_SHELLS_TEST_DIR", "/opt/shells");
    assert_eq!(expand_env("${env:FLOW_SHELLS_TEST_DIR}/zsh"), "/opt/shells/zsh");
    assert_eq!(expand_env("${env:FLOW_SHELLS_TEST_UNSET}/zsh"), "/zsh");
    assert_eq!(expand_env("plain"), "plain");
    assert_eq!(expand_env("${env:broken"), "${env:broken");
}

// ============================================================================
// Discovery
// ============================================================================

#[cfg(unix)]
#[test]
fn test_discovers_sh_and_skips_missing() {
    let mut custom = ShellProfile::new("Custom", &["/bin/sh"]);
    custom.icon = Some("star".to_string());
    let discovery = WhichShellDiscovery::new(vec![
        ShellProfile::new("sh", &["/definitely/missing/sh", "sh"]),
        ShellProfile::new("ghost", &["no-such-shell-binary"]),
        custom,
    ]);

    let shells = discovery.available_shells();
    assert_eq!(shells.len(), 2);
    assert_eq!(shells[0].label, "sh");
    assert!(shells[0].path.ends_with("sh"));
    assert_eq!(shells[0].icon, "terminal");
    assert_eq!(shells[1].path, "/bin/sh");
    assert_eq!(shells[1].icon, "star");
}
