//! Scripted discovery stand-in for blessing and follow flows.

use std::sync::Mutex;

use chrono::Utc;

use polis_blessing::BlessingTransport;
use polis_follow::FollowTransport;
use polis_protocol::{
    BeseechResponse, BlessingDecision, BlessingRequestPayload, BlessingStatus, BlessingVerdict,
    Result,
};

/// In-memory discovery service: beseeches answer with a scripted status,
/// verdicts and revocations are recorded, and a decision table drives sync.
pub struct ScriptedDiscovery {
    pub beseech_status: Mutex<BlessingStatus>,
    pub beseeches: Mutex<Vec<BlessingRequestPayload>>,
    pub verdicts: Mutex<Vec<BlessingVerdict>>,
    pub revocations: Mutex<Vec<String>>,
    pub decisions: Mutex<Vec<BlessingDecision>>,
    pub follows: Mutex<Vec<String>>,
    pub unfollows: Mutex<Vec<String>>,
}

impl ScriptedDiscovery {
    pub fn new(beseech_status: BlessingStatus) -> Self {
        Self {
            beseech_status: Mutex::new(beseech_status),
            beseeches: Mutex::new(Vec::new()),
            verdicts: Mutex::new(Vec::new()),
            revocations: Mutex::new(Vec::new()),
            decisions: Mutex::new(Vec::new()),
            follows: Mutex::new(Vec::new()),
            unfollows: Mutex::new(Vec::new()),
        }
    }

    /// Record a decision the next sync pass will observe.
    pub fn decide(&self, comment_url: &str, status: BlessingStatus) {
        self.decisions
            .lock()
            .expect("decisions lock")
            .push(BlessingDecision {
                comment_url: comment_url.to_string(),
                status,
                decided_at: Utc::now(),
                message: String::new(),
            });
    }
}

impl BlessingTransport for ScriptedDiscovery {
    async fn beseech(&self, payload: &BlessingRequestPayload) -> Result<BeseechResponse> {
        self.beseeches
            .lock()
            .expect("beseeches lock")
            .push(payload.clone());
        Ok(BeseechResponse {
            status: *self.beseech_status.lock().expect("status lock"),
            message: String::new(),
        })
    }

    async fn verdict(&self, verdict: &BlessingVerdict) -> Result<()> {
        self.verdicts
            .lock()
            .expect("verdicts lock")
            .push(verdict.clone());
        Ok(())
    }

    async fn revocation(&self, comment_url: &str) -> Result<()> {
        self.revocations
            .lock()
            .expect("revocations lock")
            .push(comment_url.to_string());
        Ok(())
    }

    async fn decisions(&self) -> Result<Vec<BlessingDecision>> {
        Ok(self.decisions.lock().expect("decisions lock").clone())
    }
}

impl FollowTransport for ScriptedDiscovery {
    async fn follow_announced(&self, target_domain: &str) -> Result<()> {
        self.follows
            .lock()
            .expect("follows lock")
            .push(target_domain.to_string());
        Ok(())
    }

    async fn follow_removed(&self, target_domain: &str) -> Result<()> {
        self.unfollows
            .lock()
            .expect("unfollows lock")
            .push(target_domain.to_string());
        Ok(())
    }
}
