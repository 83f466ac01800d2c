//! Blessing protocol engine.
//!
//! Drives the per-comment state machine across pending/blessed/denied via the
//! discovery service. Transitions are always directory moves; when local
//! state and discovery disagree, discovery is authoritative and the file is
//! moved, never deleted.

use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;

use polis_discovery::AuthedDiscovery;
use polis_protocol::{
    BeseechResponse, BlessingDecision, BlessingRef, BlessingRequestPayload, BlessingStatus,
    BlessingVerdict, CommentFrontmatter, CommentState, PolisError, Result, SyncReport,
};
use polis_security::{content_version, short_hash, SiteKeys};
use polis_store::{Comment, ContentStore};

/// Discovery-side calls the engine needs. Tests implement this over an
/// in-memory decision table.
pub trait BlessingTransport {
    fn beseech(
        &self,
        payload: &BlessingRequestPayload,
    ) -> impl Future<Output = Result<BeseechResponse>> + Send;

    fn verdict(&self, verdict: &BlessingVerdict) -> impl Future<Output = Result<()>> + Send;

    fn revocation(&self, comment_url: &str) -> impl Future<Output = Result<()>> + Send;

    fn decisions(&self) -> impl Future<Output = Result<Vec<BlessingDecision>>> + Send;
}

impl BlessingTransport for AuthedDiscovery {
    async fn beseech(&self, payload: &BlessingRequestPayload) -> Result<BeseechResponse> {
        AuthedDiscovery::beseech(self, payload).await
    }

    async fn verdict(&self, verdict: &BlessingVerdict) -> Result<()> {
        self.submit_verdict(verdict).await.map(|_| ())
    }

    async fn revocation(&self, comment_url: &str) -> Result<()> {
        self.announce_revocation(comment_url).await.map(|_| ())
    }

    async fn decisions(&self) -> Result<Vec<BlessingDecision>> {
        self.fetch_blessing_decisions(None).await
    }
}

/// An authored comment awaiting cross-site blessing.
#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub body: String,
    pub in_reply_to: String,
    pub root_post: String,
    pub in_reply_to_version: Option<String>,
}

/// Result of signing a comment into comments/pending/.
#[derive(Debug, Clone)]
pub struct SignedComment {
    pub id: String,
    pub rel_path: String,
    pub comment_url: String,
    pub comment_version: String,
}

/// Result of a beseech round-trip.
#[derive(Debug, Clone)]
pub struct BeseechOutcome {
    pub status: BlessingStatus,
    pub comment_url: String,
    pub message: String,
}

/// A sync pass plus the comments it newly blessed (so the caller can fire
/// lifecycle hooks).
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub report: SyncReport,
    pub newly_blessed: Vec<Comment>,
}

pub struct BlessingEngine<'a> {
    content: &'a ContentStore,
    keys: &'a SiteKeys,
    base_url: String,
}

impl<'a> BlessingEngine<'a> {
    pub fn new(content: &'a ContentStore, keys: &'a SiteKeys, base_url: impl Into<String>) -> Self {
        Self {
            content,
            keys,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Sign a comment draft into comments/pending/ with full canonical
    /// frontmatter. The id is a short hash of the canonical identity; the
    /// public URL embeds the signing date.
    pub fn sign_comment(&self, draft: &CommentDraft, author_email: &str) -> Result<SignedComment> {
        if draft.body.trim().is_empty() {
            return Err(PolisError::validation("comment body is empty"));
        }
        if draft.in_reply_to.is_empty() {
            return Err(PolisError::validation("comment needs an in_reply_to URL"));
        }

        let timestamp = Utc::now();
        let comment_version = content_version(&draft.body);
        let id = short_hash(&[
            &self.base_url,
            &draft.in_reply_to,
            &comment_version,
            &timestamp.to_rfc3339(),
        ]);
        let comment_url = format!(
            "{}/comments/{}/{id}.md",
            self.base_url,
            timestamp.format("%Y%m%d")
        );

        let front = CommentFrontmatter {
            id: id.clone(),
            author: self.base_url.clone(),
            author_email: author_email.to_string(),
            in_reply_to: draft.in_reply_to.clone(),
            root_post: draft.root_post.clone(),
            comment_url: comment_url.clone(),
            timestamp,
            comment_version: comment_version.clone(),
            in_reply_to_version: draft.in_reply_to_version.clone(),
        };
        let rel_path = self
            .content
            .write_comment(CommentState::Pending, &front, &draft.body, self.keys)?;

        Ok(SignedComment {
            id,
            rel_path,
            comment_url,
            comment_version,
        })
    }

    /// Ask the target post's author to bless a pending comment. A synchronous
    /// `blessed` answer (auto-bless, the author follows us) moves the file
    /// immediately; `pending` leaves it in place; an error changes nothing.
    pub async fn beseech_comment<T: BlessingTransport>(
        &self,
        id: &str,
        transport: &T,
    ) -> Result<BeseechOutcome> {
        let comment = self.content.read_comment(CommentState::Pending, id)?;
        let payload = payload_for(&comment.frontmatter);
        let response = transport.beseech(&payload).await?;

        match response.status {
            BlessingStatus::Blessed => {
                self.content
                    .move_comment(id, CommentState::Pending, CommentState::Blessed)?;
            }
            BlessingStatus::Denied => {
                self.content
                    .move_comment(id, CommentState::Pending, CommentState::Denied)?;
            }
            BlessingStatus::Pending => {}
        }

        Ok(BeseechOutcome {
            status: response.status,
            comment_url: comment.frontmatter.comment_url,
            message: response.message,
        })
    }

    /// Bless a third-party comment on one of my posts, pinning its
    /// content-addressed version.
    pub async fn grant_by_version<T: BlessingTransport>(
        &self,
        version: &str,
        comment_url: &str,
        in_reply_to: &str,
        transport: &T,
    ) -> Result<()> {
        self.ensure_own_post(in_reply_to)?;

        transport
            .verdict(&BlessingVerdict {
                comment_url: comment_url.to_string(),
                comment_version: version.to_string(),
                in_reply_to: in_reply_to.to_string(),
                status: BlessingStatus::Blessed,
                timestamp: Utc::now(),
            })
            .await?;

        self.content.add_blessing(
            in_reply_to,
            BlessingRef {
                url: comment_url.to_string(),
                version: version.to_string(),
                blessed_at: Utc::now(),
            },
        )?;
        tracing::info!(%comment_url, %in_reply_to, "blessing granted");
        Ok(())
    }

    /// Deny a blessing request. The post author never stored the third-party
    /// file, so there is no local motion.
    pub async fn deny<T: BlessingTransport>(
        &self,
        comment_url: &str,
        in_reply_to: &str,
        transport: &T,
    ) -> Result<()> {
        self.ensure_own_post(in_reply_to)?;

        transport
            .verdict(&BlessingVerdict {
                comment_url: comment_url.to_string(),
                comment_version: String::new(),
                in_reply_to: in_reply_to.to_string(),
                status: BlessingStatus::Denied,
                timestamp: Utc::now(),
            })
            .await?;
        tracing::info!(%comment_url, %in_reply_to, "blessing denied");
        Ok(())
    }

    /// Withdraw a blessing: drop the index entry, then tell discovery on a
    /// best-effort basis so peer inbox projections converge.
    pub async fn revoke<T: BlessingTransport>(
        &self,
        comment_url: &str,
        transport: &T,
    ) -> Result<()> {
        let removed = self.content.remove_blessing(comment_url)?;
        if !removed {
            return Err(PolisError::not_found(format!(
                "no blessing recorded for {comment_url}"
            )));
        }
        if let Err(err) = transport.revocation(comment_url).await {
            tracing::warn!(%comment_url, error = %err, "revocation notice failed; local state already updated");
        }
        Ok(())
    }

    /// Reconcile local comment state with discovery decisions. Discovery is
    /// authoritative; disagreement means a local move, never a delete.
    pub async fn sync_pending<T: BlessingTransport>(&self, transport: &T) -> Result<SyncOutcome> {
        let decisions = transport.decisions().await?;
        let by_url: HashMap<&str, BlessingStatus> = decisions
            .iter()
            .map(|d| (d.comment_url.as_str(), d.status))
            .collect();

        let mut outcome = SyncOutcome::default();
        for id in self.content.list_comment_ids(CommentState::Pending)? {
            outcome.report.checked += 1;
            let comment = match self.content.read_comment(CommentState::Pending, &id) {
                Ok(comment) => comment,
                Err(err) => {
                    tracing::warn!(%id, error = %err, "unreadable pending comment");
                    outcome.report.errors += 1;
                    continue;
                }
            };
            match by_url.get(comment.frontmatter.comment_url.as_str()) {
                Some(BlessingStatus::Blessed) => {
                    self.content
                        .move_comment(&id, CommentState::Pending, CommentState::Blessed)?;
                    outcome.report.blessed += 1;
                    outcome.newly_blessed.push(comment);
                }
                Some(BlessingStatus::Denied) => {
                    self.content
                        .move_comment(&id, CommentState::Pending, CommentState::Denied)?;
                    outcome.report.denied += 1;
                }
                Some(BlessingStatus::Pending) | None => {
                    outcome.report.still_pending += 1;
                }
            }
        }

        // Decisions may also contradict settled local state (a later denial
        // of an already-blessed comment, or a reversal). Apply them.
        for decision in &decisions {
            self.reconcile_settled(decision)?;
        }

        Ok(outcome)
    }

    fn reconcile_settled(&self, decision: &BlessingDecision) -> Result<()> {
        let Some(id) = comment_id_from_url(&decision.comment_url) else {
            return Ok(());
        };
        let Some(current) = self.content.locate_comment(&id) else {
            return Ok(());
        };
        let wanted = match decision.status {
            BlessingStatus::Blessed => CommentState::Blessed,
            BlessingStatus::Denied => CommentState::Denied,
            BlessingStatus::Pending => return Ok(()),
        };
        if current != wanted && current != CommentState::Pending {
            tracing::warn!(
                %id,
                local = current.as_str(),
                discovery = wanted.as_str(),
                "local state disagrees with discovery; discovery wins"
            );
            self.content.move_comment(&id, current, wanted)?;
        }
        Ok(())
    }

    /// The caller must own the artifact being commented on (a post, or a
    /// comment of theirs for nested replies).
    fn ensure_own_post(&self, in_reply_to: &str) -> Result<()> {
        let prefix = format!("{}/", self.base_url);
        let Some(rel_path) = in_reply_to.strip_prefix(&prefix) else {
            return Err(PolisError::validation(format!(
                "{in_reply_to} is not under this site"
            )));
        };
        // resolve applies the allowed-prefix discipline.
        let path = self.content.paths().resolve(rel_path)?;
        if !path.exists() {
            return Err(PolisError::not_found(format!("no local artifact at {rel_path}")));
        }
        Ok(())
    }
}

/// Build the canonical blessing request for a stored comment.
pub fn payload_for(front: &CommentFrontmatter) -> BlessingRequestPayload {
    BlessingRequestPayload {
        comment_url: front.comment_url.clone(),
        comment_version: front.comment_version.clone(),
        in_reply_to: front.in_reply_to.clone(),
        in_reply_to_version: front.in_reply_to_version.clone(),
        root_post: front.root_post.clone(),
        author: front.author.clone(),
        timestamp: front.timestamp,
    }
}

/// <id> from .../<id>.md.
fn comment_id_from_url(url: &str) -> Option<String> {
    url.rsplit('/')
        .next()
        .and_then(|name| name.strip_suffix(".md"))
        .map(String::from)
}
