use chrono::{Duration, Utc};

use campaign_coordinator::campaign::status::{can_advance, side_effects, status_at_least, SideEffect};
use campaign_coordinator::campaign::{Campaign, Feature};
use campaign_coordinator::notify::{self, Destination};
use campaign_coordinator::provisioning::channel_slug;
use campaign_coordinator::rules::{Policy, Rule};
use campaign_coordinator::{CampaignStatus, Error, MemoLedger};

#[test]
fn statuses_advance_one_step_at_a_time() {
    let mut status = CampaignStatus::Draft;
    let mut walked = vec![status];
    while let Some(next) = status.successor() {
        assert!(can_advance(status, next));
        status = next;
        walked.push(status);
    }

    assert_eq!(walked, CampaignStatus::ORDER);
    assert!(!can_advance(CampaignStatus::Draft, CampaignStatus::ContractSigned));
    assert!(!can_advance(CampaignStatus::ContractSigned, CampaignStatus::BriefSubmitted));
}

#[test]
fn provisioning_runs_on_brief_and_finalization_only() {
    assert_eq!(
        side_effects(CampaignStatus::Draft, CampaignStatus::BriefSubmitted),
        &[SideEffect::ProvisionCampaignHome]
    );
    assert!(side_effects(CampaignStatus::CreatorsSelected, CampaignStatus::ContractSigned).is_empty());
    assert!(side_effects(CampaignStatus::Draft, CampaignStatus::CreatorsSelected).is_empty());
}

#[test]
fn features_unlock_with_status() {
    let mut campaign = Campaign::new("Acme".into(), None, Utc::now());
    assert!(!campaign.is_unlocked(Feature::CreatorVisibility));

    campaign.status = CampaignStatus::CreatorsSelected;
    assert!(campaign.is_unlocked(Feature::Messaging));
    assert!(campaign.is_unlocked(Feature::ContractAccess));
    assert!(!campaign.is_unlocked(Feature::Payments));
    assert!(status_at_least(campaign.status, CampaignStatus::BriefSubmitted));
}

#[test]
fn memo_ledger_merge_keeps_latest_timestamps() {
    let earlier = Utc::now() - Duration::hours(2);
    let later = Utc::now();

    let mut stored = MemoLedger::new();
    stored.record("contractNotSignedNudge", later);
    stored.record("reviewCreatorsNudge", earlier);

    let mut patch = MemoLedger::new();
    patch.record("contractNotSignedNudge", earlier);
    patch.record("reviewCreatorsNudge", later);
    patch.record("clientAbandonmentWarning", later);

    stored.merge(&patch);

    assert_eq!(stored.len(), 3);
    assert_eq!(stored.get("contractNotSignedNudge"), Some(later));
    assert_eq!(stored.get("reviewCreatorsNudge"), Some(later));
    assert!(stored.contains("clientAbandonmentWarning"));
}

#[test]
fn rules_evaluate_in_a_fixed_order() {
    let ids: Vec<&str> = Rule::ALL.iter().map(|rule| rule.id()).collect();

    assert_eq!(
        ids,
        [
            "reviewCreatorsNudge",
            "accountCreationNudge",
            "contractNotSignedNudge",
            "draftSubmissionReminderNudge",
            "flatRatePaymentNudge",
            "cpmPaymentNudges",
            "clientAbandonmentWarning",
        ]
    );
    assert_eq!(Rule::AccountCreation.policy(), Policy::Repeatable);
    assert_eq!(Rule::ClientAbandonment.policy(), Policy::Once);
}

#[test]
fn destinations_are_validated_before_use() {
    assert!(matches!(
        Destination::parse("team@brand.example"),
        Ok(Destination::Email(_))
    ));
    assert!(matches!(
        Destination::parse("https://hooks.example.com/updates"),
        Ok(Destination::Webhook(_))
    ));
    assert_eq!(
        Destination::parse("brand at example").unwrap_err(),
        Error::InvalidDestination {
            destination: "brand at example".into()
        }
    );
    assert_eq!(
        notify::subject(&Campaign::new("Spring Drop".into(), None, Utc::now())),
        "Campaign Update for Spring Drop"
    );
}

#[test]
fn creator_channel_names_are_slugged() {
    assert_eq!(channel_slug("Spring Drop", "Some Creator!"), "spring-drop--some-creator");
}
