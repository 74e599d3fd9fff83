//! Operating-system side effects triggered by actions.

use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use arboard::Clipboard;
use tracing::{debug, instrument};

use crate::io::extension::describe_code;
use crate::io::process::run_interactive;

/// Side effects the navigator can request.
///
/// `edit` and `shell` take over the terminal and block until the child exits.
pub trait Effects: Send + Sync {
    fn copy(&self, text: &str) -> Result<()>;
    fn open(&self, target: &str, app: Option<&str>) -> Result<()>;
    fn edit(&self, path: &Path) -> Result<()>;
    fn shell(&self, command: &str, dir: Option<&Path>) -> Result<()>;
}

/// Effects backed by the system clipboard, opener, editor and shell.
pub struct SystemEffects {
    editor: Vec<String>,
    // Kept alive for the session: on X11 the selection is lost with its owner.
    clipboard: Mutex<Option<Clipboard>>,
}

impl SystemEffects {
    pub fn from_env() -> Result<Self> {
        let editor = editor_command(|name| std::env::var(name).ok())?;
        Ok(Self {
            editor,
            clipboard: Mutex::new(None),
        })
    }
}

/// Editor argv from `$VISUAL`, else `$EDITOR`, else `vi`.
pub fn editor_command(lookup: impl Fn(&str) -> Option<String>) -> Result<Vec<String>> {
    let raw = ["VISUAL", "EDITOR"]
        .into_iter()
        .filter_map(&lookup)
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string());
    let argv = shlex::split(&raw).ok_or_else(|| anyhow!("editor {raw:?} is not valid shell words"))?;
    if argv.is_empty() {
        return Err(anyhow!("editor command is empty"));
    }
    Ok(argv)
}

impl Effects for SystemEffects {
    #[instrument(skip_all, fields(bytes = text.len()))]
    fn copy(&self, text: &str) -> Result<()> {
        let mut guard = self
            .clipboard
            .lock()
            .map_err(|_| anyhow!("clipboard lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(Clipboard::new().context("open clipboard")?);
        }
        let clipboard = guard
            .as_mut()
            .ok_or_else(|| anyhow!("clipboard unavailable"))?;
        clipboard.set_text(text).context("copy to clipboard")?;
        debug!("copied to clipboard");
        Ok(())
    }

    #[instrument(skip_all, fields(uri = %target, app = ?app))]
    fn open(&self, target: &str, app: Option<&str>) -> Result<()> {
        match app {
            Some(app) => open::with(target, app).with_context(|| format!("open {target} with {app}")),
            None => open::that(target).with_context(|| format!("open {target}")),
        }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn edit(&self, path: &Path) -> Result<()> {
        let Some((program, args)) = self.editor.split_first() else {
            return Err(anyhow!("editor command is empty"));
        };
        let mut cmd = Command::new(program);
        cmd.args(args).arg(path);
        let status = run_interactive(cmd).with_context(|| format!("run editor {program}"))?;
        if !status.success() {
            return Err(anyhow!("editor exited with {}", describe_code(status.code())));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(command))]
    fn shell(&self, command: &str, dir: Option<&Path>) -> Result<()> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let status = run_interactive(cmd).context("run shell command")?;
        if !status.success() {
            return Err(anyhow!("command exited with {}", describe_code(status.code())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn editor_prefers_visual_then_editor_then_vi() {
        assert_eq!(
            editor_command(lookup(&[("VISUAL", "code --wait"), ("EDITOR", "nano")])).expect("editor"),
            vec!["code", "--wait"]
        );
        assert_eq!(
            editor_command(lookup(&[("VISUAL", " "), ("EDITOR", "nano")])).expect("editor"),
            vec!["nano"]
        );
        assert_eq!(editor_command(lookup(&[])).expect("editor"), vec!["vi"]);
    }

    #[test]
    fn editor_with_unbalanced_quotes_is_rejected() {
        assert!(editor_command(lookup(&[("EDITOR", "\"vim")])).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn shell_reports_failing_status() {
        let effects = SystemEffects {
            editor: vec!["true".to_string()],
            clipboard: Mutex::new(None),
        };
        let temp = tempfile::tempdir().expect("tempdir");
        effects
            .shell("test -d .", Some(temp.path()))
            .expect("shell succeeds");
        let err = effects.shell("exit 3", None).unwrap_err();
        assert!(err.to_string().contains("status 3"), "{err}");
        effects.edit(&temp.path().join("x.txt")).expect("edit");
    }
}
