//! Batch delivery of rule notifications.
//!
//! Each tick walks every campaign with a notification destination, runs the
//! rules, sends at most one combined message per campaign and only then
//! records what was sent in the campaign's memo ledger. Campaigns are handled
//! one after another and a failure in one never stops the rest.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::campaign::{Campaign, CampaignId};
use crate::chat::ChatPlatform;
use crate::database::{self, Database};
use crate::error::Error;
use crate::notify::{self, Destination, Notifier, SEPARATOR};
use crate::rules::{self, RuleContext};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CampaignOutcome {
    /// No rule fired.
    Quiet,
    Delivered { rules: Vec<&'static str> },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub campaigns: usize,
    pub delivered: usize,
    pub quiet: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Scheduler {
    db: Arc<dyn Database>,
    chat: Arc<dyn ChatPlatform>,
    notifier: Arc<dyn Notifier>,
    running: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        db: Arc<dyn Database>,
        chat: Arc<dyn ChatPlatform>,
        notifier: Arc<dyn Notifier>,
    ) -> Scheduler {
        Scheduler {
            db,
            chat,
            notifier,
            running: Mutex::new(()),
        }
    }

    /// Runs the batch once for every campaign with a destination.
    #[tracing::instrument(skip(self))]
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickReport, Error> {
        let _running = self.running.lock().await;

        let campaigns = self.db.campaigns().fetch_campaigns_with_destination().await?;

        let mut report = TickReport {
            campaigns: campaigns.len(),
            ..Default::default()
        };
        for campaign in campaigns {
            let campaign_id = campaign.id;
            match self.process(campaign, now).await {
                Ok(CampaignOutcome::Quiet) => report.quiet += 1,
                Ok(CampaignOutcome::Delivered { .. }) => report.delivered += 1,
                Err(err @ Error::InvalidDestination { .. }) => {
                    warn!(%campaign_id, %err, "skipping campaign with unusable destination");
                    report.skipped += 1;
                }
                Err(err) => {
                    error!(%campaign_id, %err, data_access = err.is_data_access(), "campaign notification run failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            campaigns = report.campaigns,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "notification tick finished"
        );

        Ok(report)
    }

    /// Runs the batch for a single campaign, serialized with the regular ticks.
    #[tracing::instrument(skip(self))]
    pub async fn run_campaign(
        &self,
        campaign_id: CampaignId,
        now: DateTime<Utc>,
    ) -> Result<CampaignOutcome, Error> {
        let _running = self.running.lock().await;

        let campaign = self.db.campaigns().assert_campaign_exists(campaign_id).await?;
        self.process(campaign, now).await
    }

    async fn process(
        &self,
        mut campaign: Campaign,
        now: DateTime<Utc>,
    ) -> Result<CampaignOutcome, Error> {
        let raw = campaign.updates_destination.clone().unwrap_or_default();
        let destination = Destination::parse(&raw)?;

        let mut memos = self.db.memos().fetch_or_create_memos(campaign.id).await?;

        let ctx = RuleContext {
            db: self.db.as_ref(),
            chat: self.chat.as_ref(),
            now,
        };
        let evaluation = rules::evaluate_rules(&ctx, &mut campaign, &memos).await;
        if evaluation.is_empty() {
            return Ok(CampaignOutcome::Quiet);
        }

        let payload = evaluation.payload(SEPARATOR);
        self.notifier
            .send(&destination, &notify::subject(&campaign), &payload)
            .await?;

        let fired: Vec<&'static str> = evaluation
            .fired
            .iter()
            .map(|fired| fired.rule.id())
            .collect();
        info!(campaign_id = %campaign.id, rules = ?fired, "delivered campaign update");

        let patch = evaluation.memo_patch(now);
        if !patch.is_empty() {
            memos.merge(&patch);
            self.db.memos().replace_memos(campaign.id, &memos).await?;
        }

        Ok(CampaignOutcome::Delivered { rules: fired })
    }

    /// Ticks right away and then every `period`, until the runtime shuts down.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_secs = period.as_secs(), "notification scheduler started");

            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;

                if let Err(err) = self.run_tick(database::timestamp()).await {
                    error!(%err, "notification tick failed");
                }
            }
        })
    }
}
