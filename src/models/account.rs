use std::collections::BTreeMap;

use serde::Serialize;

/// The ordered steps of account deletion. All of them commit together or none does.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStep {
    Responses,
    Questions,
    SurveyUsers,
    Surveys,
    Invitations,
    Tickets,
    Addons,
    AnnouncementDeliveries,
    DiscountLinks,
    Payments,
    User,
}

impl DeletionStep {
    pub const ALL: [DeletionStep; 11] = [
        DeletionStep::Responses,
        DeletionStep::Questions,
        DeletionStep::SurveyUsers,
        DeletionStep::Surveys,
        DeletionStep::Invitations,
        DeletionStep::Tickets,
        DeletionStep::Addons,
        DeletionStep::AnnouncementDeliveries,
        DeletionStep::DiscountLinks,
        DeletionStep::Payments,
        DeletionStep::User,
    ];

    /// 1-based position inside [`DeletionStep::ALL`].
    pub fn position(self) -> usize {
        DeletionStep::ALL
            .iter()
            .position(|step| *step == self)
            .map_or(0, |index| index + 1)
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub deleted: BTreeMap<DeletionStep, usize>,
    pub avatar_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_numbered_in_order() {
        assert_eq!(DeletionStep::Responses.position(), 1);
        assert_eq!(DeletionStep::Tickets.position(), 6);
        assert_eq!(DeletionStep::User.position(), 11);
    }
}
