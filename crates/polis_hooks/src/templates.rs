//! Built-in starter hook scripts for deploy automation.

use std::fs;
use std::path::PathBuf;

use polis_protocol::{PolisError, Result, SitePaths};

/// Commit the site and push, letting the host rebuild.
const GIT_PUSH_TEMPLATE: &str = r#"#!/bin/sh
# Polis hook: commit the change and push to the deploy remote.
set -e
cd "$POLIS_SITE_DIR"
git add -A
git commit -m "${POLIS_COMMIT_MESSAGE:-polis: $POLIS_EVENT $POLIS_PATH}" || exit 0
git push origin HEAD
"#;

/// Mirror the site directory to a web root over rsync.
const RSYNC_TEMPLATE: &str = r#"#!/bin/sh
# Polis hook: mirror the site to the web root.
# Set POLIS_DEPLOY_TARGET, e.g. user@host:/var/www/site
set -e
if [ -z "$POLIS_DEPLOY_TARGET" ]; then
    echo "POLIS_DEPLOY_TARGET is not set" >&2
    exit 1
fi
rsync -az --delete \
    --exclude '.polis' --exclude 'keys' --exclude '.env' \
    "$POLIS_SITE_DIR/" "$POLIS_DEPLOY_TARGET/"
"#;

/// Available starter templates.
pub const TEMPLATES: &[(&str, &str)] = &[("git-push", GIT_PUSH_TEMPLATE), ("rsync", RSYNC_TEMPLATE)];

pub fn template(name: &str) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|(template_name, _)| *template_name == name)
        .map(|(_, body)| *body)
}

/// Install a starter template as the script for `event`.
pub fn install(paths: &SitePaths, name: &str, event: &str) -> Result<PathBuf> {
    let body = template(name)
        .ok_or_else(|| PolisError::not_found(format!("hook template {name}")))?;
    let script = paths.hook_script(event);
    if let Some(parent) = script.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&script, body)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
    }
    Ok(script)
}
