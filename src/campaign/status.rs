//! Campaign lifecycle ordering.
//!
//! A campaign only ever moves one step forward along [`CampaignStatus::ORDER`]
//! (`draft -> brief_submitted -> creators_selected -> contract_signed`), apart
//! from the administrative reset back to `draft`. Every feature gate in the
//! crate goes through [`status_at_least`] so that "is X unlocked" has exactly
//! one answer.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    BriefSubmitted,
    CreatorsSelected,
    ContractSigned,
    Completed,
}

impl CampaignStatus {
    pub const ORDER: [CampaignStatus; 5] = [
        CampaignStatus::Draft,
        CampaignStatus::BriefSubmitted,
        CampaignStatus::CreatorsSelected,
        CampaignStatus::ContractSigned,
        CampaignStatus::Completed,
    ];

    pub fn index(self) -> usize {
        CampaignStatus::ORDER
            .iter()
            .position(|status| *status == self)
            .unwrap_or_default()
    }

    pub fn successor(self) -> Option<CampaignStatus> {
        CampaignStatus::ORDER.get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::BriefSubmitted => "brief_submitted",
            CampaignStatus::CreatorsSelected => "creators_selected",
            CampaignStatus::ContractSigned => "contract_signed",
            CampaignStatus::Completed => "completed",
        }
    }
}

/// Provisioning work that must follow a status change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SideEffect {
    ProvisionCampaignHome,
    TeardownUnselected,
    ProvisionGroupChannel,
}

pub fn can_advance(current: CampaignStatus, target: CampaignStatus) -> bool {
    current.successor() == Some(target)
}

pub fn status_at_least(status: CampaignStatus, required: CampaignStatus) -> bool {
    status.index() >= required.index()
}

/// The side effects registered for moving from `from` to `to`, in the order
/// they must run. Only legal transitions have any.
pub fn side_effects(from: CampaignStatus, to: CampaignStatus) -> &'static [SideEffect] {
    if !can_advance(from, to) {
        return &[];
    }

    match to {
        CampaignStatus::BriefSubmitted => &[SideEffect::ProvisionCampaignHome],
        CampaignStatus::CreatorsSelected => &[
            SideEffect::TeardownUnselected,
            SideEffect::ProvisionGroupChannel,
        ],
        _ => &[],
    }
}

/// Downstream features that unlock as a campaign advances.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CreatorVisibility,
    Messaging,
    ContractAccess,
    Payments,
}

impl Feature {
    pub fn required_status(self) -> CampaignStatus {
        match self {
            Feature::CreatorVisibility => CampaignStatus::BriefSubmitted,
            Feature::Messaging => CampaignStatus::CreatorsSelected,
            Feature::ContractAccess => CampaignStatus::CreatorsSelected,
            Feature::Payments => CampaignStatus::ContractSigned,
        }
    }
}
