//! `cd` interception.
//!
//! Each block runs in a throwaway shell, so a `cd` inside it cannot move
//! the next block. When a command of the form `cd <dir>` succeeds we
//! resolve `<dir>` ourselves and move the session context instead.
//!
//! Only a leading `cd ` is recognised: no `&&` chains, no `$VAR`
//! expansion, no `pushd`/`popd`.

use std::path::{Component, Path, PathBuf};

use crate::host::expand_tilde;

pub fn is_cd_command(command: &str) -> bool {
    command.trim().starts_with("cd ")
}

/// The argument of a `cd` command with one layer of quotes removed.
pub fn cd_target(command: &str) -> Option<String> {
    let rest = command.trim().strip_prefix("cd ")?.trim();
    if rest.is_empty() {
        return None;
    }
    let unquoted = strip_quote(strip_quote(rest, '"'), '\'');
    Some(unquoted.to_string())
}

fn strip_quote(s: &str, quote: char) -> &str {
    let s = s.strip_prefix(quote).unwrap_or(s);
    s.strip_suffix(quote).unwrap_or(s)
}

/// Resolve `target` the way the shell would have, relative to the cwd the
/// command ran in. Purely lexical; existence is checked by the caller.
pub fn resolve_cd_target(target: &str, cwd: &str, home: Option<&Path>) -> PathBuf {
    let base = PathBuf::from(expand_tilde(cwd, home));
    let target = PathBuf::from(expand_tilde(target, home));
    normalize(&base.join(target))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}
