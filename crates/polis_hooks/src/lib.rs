//! Lifecycle hook runner.
//!
//! Invokes configured shell scripts on content lifecycle events. Execution is
//! synchronous but non-fatal: a failing hook is logged and reported in the
//! operation's result, never rolled back.

use chrono::Utc;
use std::path::PathBuf;
use std::process::Command;

use polis_protocol::{HookConfig, HookOutcome, SitePaths};

pub mod templates;

pub const HOOK_POST_PUBLISH: &str = "post-publish";
pub const HOOK_POST_REPUBLISH: &str = "post-republish";
pub const HOOK_POST_COMMENT: &str = "post-comment";

/// Values handed to a hook script through the environment.
#[derive(Debug, Clone, Default)]
pub struct HookPayload {
    pub path: String,
    pub title: String,
    pub version: String,
    pub commit_message: String,
}

#[derive(Debug, Clone)]
pub struct HookRunner {
    paths: SitePaths,
    config: HookConfig,
}

impl HookRunner {
    pub fn new(paths: SitePaths, config: HookConfig) -> Self {
        Self { paths, config }
    }

    /// Resolution order: explicit config path, then auto-discovery at
    /// .polis/hooks/<event>.sh. None when neither exists.
    pub fn resolve_script(&self, event: &str) -> Option<PathBuf> {
        let configured = match event {
            HOOK_POST_PUBLISH => self.config.post_publish.as_deref(),
            HOOK_POST_REPUBLISH => self.config.post_republish.as_deref(),
            HOOK_POST_COMMENT => self.config.post_comment.as_deref(),
            _ => None,
        };
        if let Some(configured) = configured {
            let path = self.paths.root().join(configured);
            return path.exists().then_some(path);
        }
        let discovered = self.paths.hook_script(event);
        discovered.exists().then_some(discovered)
    }

    /// Run the hook for an event if a script is configured. Never fails the
    /// caller; the outcome is reported in-band.
    pub fn run(&self, event: &str, payload: &HookPayload) -> Option<HookOutcome> {
        let script = self.resolve_script(event)?;
        tracing::debug!(hook = event, script = %script.display(), "running hook");

        let output = Command::new("sh")
            .arg(&script)
            .current_dir(self.paths.root())
            .env("POLIS_SITE_DIR", self.paths.root())
            .env("POLIS_PATH", &payload.path)
            .env("POLIS_TITLE", &payload.title)
            .env("POLIS_EVENT", event)
            .env("POLIS_VERSION", &payload.version)
            .env("POLIS_TIMESTAMP", Utc::now().to_rfc3339())
            .env("POLIS_COMMIT_MESSAGE", &payload.commit_message)
            .output();

        let outcome = match output {
            Ok(output) if output.status.success() => HookOutcome {
                hook: event.to_string(),
                success: true,
                message: last_line(&output.stdout),
            },
            Ok(output) => {
                let message = last_line(&output.stderr);
                tracing::warn!(hook = event, %message, "hook exited nonzero");
                HookOutcome {
                    hook: event.to_string(),
                    success: false,
                    message,
                }
            }
            Err(err) => {
                tracing::warn!(hook = event, error = %err, "hook could not be spawned");
                HookOutcome {
                    hook: event.to_string(),
                    success: false,
                    message: err.to_string(),
                }
            }
        };
        Some(outcome)
    }
}

fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn write_script(path: &std::path::Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn payload() -> HookPayload {
        HookPayload {
            path: "posts/20250101/hello.md".into(),
            title: "Hello".into(),
            version: "abc".into(),
            commit_message: "publish: Hello".into(),
        }
    }

    #[test]
    fn test_no_script_is_silent() {
        let temp = TempDir::new().unwrap();
        let runner = HookRunner::new(SitePaths::new(temp.path()), HookConfig::default());
        assert!(runner.run(HOOK_POST_PUBLISH, &payload()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_auto_discovered_hook_gets_env() {
        let temp = TempDir::new().unwrap();
        let paths = SitePaths::new(temp.path());
        write_script(
            &paths.hook_script(HOOK_POST_PUBLISH),
            "#!/bin/sh\necho \"$POLIS_EVENT $POLIS_TITLE $POLIS_PATH\"\n",
        );
        let runner = HookRunner::new(paths, HookConfig::default());
        let outcome = runner.run(HOOK_POST_PUBLISH, &payload()).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "post-publish Hello posts/20250101/hello.md");
    }

    #[cfg(unix)]
    #[test]
    fn test_configured_path_wins() {
        let temp = TempDir::new().unwrap();
        let paths = SitePaths::new(temp.path());
        write_script(&temp.path().join("custom.sh"), "#!/bin/sh\necho custom\n");
        write_script(
            &paths.hook_script(HOOK_POST_PUBLISH),
            "#!/bin/sh\necho discovered\n",
        );
        let config = HookConfig {
            post_publish: Some("custom.sh".into()),
            ..HookConfig::default()
        };
        let runner = HookRunner::new(paths, config);
        let outcome = runner.run(HOOK_POST_PUBLISH, &payload()).unwrap();
        assert_eq!(outcome.message, "custom");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_hook_is_reported_not_fatal() {
        let temp = TempDir::new().unwrap();
        let paths = SitePaths::new(temp.path());
        write_script(
            &paths.hook_script(HOOK_POST_COMMENT),
            "#!/bin/sh\necho broken >&2\nexit 3\n",
        );
        let runner = HookRunner::new(paths, HookConfig::default());
        let outcome = runner.run(HOOK_POST_COMMENT, &payload()).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "broken");
    }
}
