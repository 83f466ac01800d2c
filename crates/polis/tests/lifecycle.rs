//! End-to-end content lifecycle scenarios.
//!
//! Real site directories in tempdirs; the discovery service and peer fetches
//! are replaced at the seams the core defines for them.

use chrono::Utc;

use polis::AppContext;
use polis_blessing::CommentDraft;
use polis_protocol::{BlessingStatus, CommentState, PolisError};
use polis_test_utils::{ScriptedDiscovery, TestSite};

#[cfg(unix)]
fn install_hook(site: &TestSite, event: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    let script = site.content.paths().hook_script(event);
    std::fs::create_dir_all(script.parent().unwrap()).unwrap();
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn test_first_publish() {
    let site = TestSite::new("alice.polis.pub");
    let ctx = AppContext::open(site.temp.path()).unwrap();

    let result = ctx.publish_post("# Hello\n\nWorld", None).unwrap();
    assert!(result.success);
    assert_eq!(result.title, "Hello");
    let today = Utc::now().format("%Y%m%d").to_string();
    assert_eq!(result.path, format!("posts/{today}/hello.md"));

    // File and signature exist; the signature verifies against the manifest
    // public key.
    let post_path = ctx.content.paths().resolve(&result.path).unwrap();
    assert!(post_path.exists());
    assert!(post_path.with_extension("md.sig").exists());
    let public_key = polis_security::decode_public_key(&site.manifest.public_key).unwrap();
    ctx.content.verify_signature(&result.path, &public_key).unwrap();

    // One index line with the derived title.
    let index = ctx.content.read_index().unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].title, "Hello");
    assert_eq!(index[0].path, result.path);
    assert_eq!(ctx.content.count_posts().unwrap(), 1);

    // The body round-trips with frontmatter stripped.
    let post = ctx.content.read_post(&result.path).unwrap();
    assert_eq!(post.body, "# Hello\n\nWorld");
}

#[test]
fn test_publish_empty_body_is_validation_error() {
    let site = TestSite::new("alice.polis.pub");
    let ctx = AppContext::open(site.temp.path()).unwrap();
    assert!(matches!(
        ctx.publish_post("", None).unwrap_err(),
        PolisError::Validation(_)
    ));
}

#[test]
fn test_path_traversal_rejected() {
    let site = TestSite::new("alice.polis.pub");
    let ctx = AppContext::open(site.temp.path()).unwrap();
    ctx.publish_post("# Hello\n\nWorld", None).unwrap();

    for bad in [
        "posts/../keys/private.key",
        "../outside.md",
        "posts/2025\0/x.md",
        "/etc/passwd",
    ] {
        assert!(
            matches!(
                ctx.republish_post(bad, "# Evil").unwrap_err(),
                PolisError::Validation(_)
            ),
            "path {bad:?} must be rejected"
        );
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_blessing_grant_runs_hook_and_records_entry() {
    let site = TestSite::new("alice.polis.pub");
    install_hook(&site, "post-comment", "#!/bin/sh\necho \"$POLIS_EVENT\"\n");
    let ctx = AppContext::open(site.temp.path()).unwrap();
    let post = ctx.publish_post("# Hello\n\nWorld", None).unwrap();
    let in_reply_to = format!("{}/{}", site.base_url(), post.path);

    let discovery = ScriptedDiscovery::new(BlessingStatus::Pending);
    let comment_url = "https://bob.polis.pub/comments/20250102/abc123def456.md";
    let hook = ctx
        .grant_blessing("c0ffee", comment_url, &in_reply_to, &discovery)
        .await
        .unwrap()
        .expect("post-comment hook must run");
    assert!(hook.success);
    assert_eq!(hook.message, "post-comment");

    let blessed = ctx.content.read_blessed_comments().unwrap();
    assert!(blessed.contains(comment_url));
    assert_eq!(blessed.comments[0].post, in_reply_to);

    let verdicts = discovery.verdicts.lock().unwrap();
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].status, BlessingStatus::Blessed);
}

#[tokio::test]
async fn test_grant_on_foreign_post_rejected() {
    let site = TestSite::new("alice.polis.pub");
    let ctx = AppContext::open(site.temp.path()).unwrap();
    let discovery = ScriptedDiscovery::new(BlessingStatus::Pending);
    let err = ctx
        .grant_blessing(
            "v1",
            "https://bob.polis.pub/comments/20250102/c.md",
            "https://carol.polis.pub/posts/20250101/x.md",
            &discovery,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PolisError::Validation(_)));
}

#[tokio::test]
async fn test_auto_bless_on_comment() {
    // Bob comments on a followed author's post; the target follows bob, so
    // the beseech comes back blessed synchronously.
    let bob = TestSite::new("bob.polis.pub");
    let ctx = AppContext::open(bob.temp.path()).unwrap();
    let discovery = ScriptedDiscovery::new(BlessingStatus::Blessed);

    let outcome = ctx
        .comment(
            &CommentDraft {
                body: "Lovely post!\n".into(),
                in_reply_to: "https://alice.polis.pub/posts/20250101/hello.md".into(),
                root_post: "https://alice.polis.pub/posts/20250101/hello.md".into(),
                in_reply_to_version: None,
            },
            &discovery,
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, BlessingStatus::Blessed);

    // The comment landed in blessed/ immediately.
    assert_eq!(ctx.content.count_comments(CommentState::Blessed).unwrap(), 1);
    assert_eq!(ctx.content.count_comments(CommentState::Pending).unwrap(), 0);

    // The beseech carried the canonical payload.
    let beseeches = discovery.beseeches.lock().unwrap();
    assert_eq!(beseeches.len(), 1);
    assert_eq!(beseeches[0].author, "https://bob.polis.pub");
    assert_eq!(
        beseeches[0].root_post,
        "https://alice.polis.pub/posts/20250101/hello.md"
    );
}

#[tokio::test]
async fn test_pending_comment_blessed_on_sync() {
    let bob = TestSite::new("bob.polis.pub");
    let ctx = AppContext::open(bob.temp.path()).unwrap();
    let discovery = ScriptedDiscovery::new(BlessingStatus::Pending);

    let outcome = ctx
        .comment(
            &CommentDraft {
                body: "Thinking about this.\n".into(),
                in_reply_to: "https://alice.polis.pub/posts/20250101/hello.md".into(),
                root_post: "https://alice.polis.pub/posts/20250101/hello.md".into(),
                in_reply_to_version: None,
            },
            &discovery,
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, BlessingStatus::Pending);
    assert_eq!(ctx.content.count_comments(CommentState::Pending).unwrap(), 1);

    // The author grants later; the next sync pass picks it up.
    discovery.decide(&outcome.comment_url, BlessingStatus::Blessed);
    let sync = ctx
        .blessing_engine()
        .sync_pending(&discovery)
        .await
        .unwrap();
    assert_eq!(sync.report.blessed, 1);
    assert_eq!(ctx.content.count_comments(CommentState::Blessed).unwrap(), 1);
}

#[tokio::test]
async fn test_revoke_removes_blessing() {
    let site = TestSite::new("alice.polis.pub");
    let ctx = AppContext::open(site.temp.path()).unwrap();
    let post = ctx.publish_post("# Hello\n\nWorld", None).unwrap();
    let in_reply_to = format!("{}/{}", site.base_url(), post.path);
    let comment_url = "https://bob.polis.pub/comments/20250102/abc.md";

    let discovery = ScriptedDiscovery::new(BlessingStatus::Pending);
    ctx.grant_blessing("v1", comment_url, &in_reply_to, &discovery)
        .await
        .unwrap();
    assert_eq!(ctx.content.count_blessed_refs().unwrap(), 1);

    ctx.revoke_blessing(comment_url, &discovery).await.unwrap();
    assert_eq!(ctx.content.count_blessed_refs().unwrap(), 0);
    assert_eq!(
        discovery.revocations.lock().unwrap().as_slice(),
        [comment_url]
    );

    // Granting again after a revoke is permitted.
    ctx.grant_blessing("v2", comment_url, &in_reply_to, &discovery)
        .await
        .unwrap();
    assert_eq!(ctx.content.count_blessed_refs().unwrap(), 1);
}

#[test]
fn test_republish_preserves_identity() {
    let site = TestSite::new("alice.polis.pub");
    let ctx = AppContext::open(site.temp.path()).unwrap();
    let original = ctx.publish_post("# Post\n\nfirst\n", None).unwrap();
    let updated = ctx.republish_post(&original.path, "# Post\n\nsecond\n").unwrap();

    assert_eq!(updated.path, original.path);
    assert_eq!(updated.published, original.published);
    assert_ne!(updated.version, original.version);

    let index = ctx.content.read_index().unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].version, updated.version);
}
