use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::models::survey::{Survey, SurveyUser};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyPermission {
    View,
    Edit,
    Admin,
}

impl SurveyPermission {
    pub fn allows_edit(self) -> bool {
        matches!(self, SurveyPermission::Edit | SurveyPermission::Admin)
    }

    pub fn allows_admin(self) -> bool {
        self == SurveyPermission::Admin
    }
}

/// Capability set of one user on one survey.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurveyAccess {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_admin: bool,
    pub is_owner: bool,
}

impl SurveyAccess {
    pub const DENIED: SurveyAccess = SurveyAccess {
        can_view: false,
        can_edit: false,
        can_admin: false,
        is_owner: false,
    };

    /// Owner is implicitly ADMIN; everyone else gets what their grant says.
    pub fn resolve(user_id: &str, survey: &Survey, grant: Option<&SurveyUser>) -> Self {
        let is_owner = survey.owner_id == user_id;
        // a grant row for someone else never counts
        let permission = grant
            .filter(|grant| grant.user_id == user_id && grant.survey_id == survey.id)
            .map(|grant| grant.permission);

        Self {
            can_view: is_owner || permission.is_some(),
            can_edit: is_owner || permission.is_some_and(SurveyPermission::allows_edit),
            can_admin: is_owner || permission.is_some_and(SurveyPermission::allows_admin),
            is_owner,
        }
    }
}

pub trait PermissionChecker {
    fn check_view(&self) -> Result<()>;
    fn check_edit(&self) -> Result<()>;
    fn check_admin(&self) -> Result<()>;
    fn check_owner(&self) -> Result<()>;
}

// ! without view access the survey is reported missing, so its existence never leaks
impl PermissionChecker for SurveyAccess {
    fn check_view(&self) -> Result<()> {
        if self.can_view {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    fn check_edit(&self) -> Result<()> {
        self.check_view()?;
        if self.can_edit {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    fn check_admin(&self) -> Result<()> {
        self.check_view()?;
        if self.can_admin {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    fn check_owner(&self) -> Result<()> {
        if self.is_owner {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::survey::SurveyStatus;

    fn survey() -> Survey {
        Survey {
            id: "s1".to_string(),
            owner_id: "owner".to_string(),
            title: "Team pulse".to_string(),
            description: None,
            status: SurveyStatus::Draft,
            share_url: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn grant(user_id: &str, permission: SurveyPermission) -> SurveyUser {
        SurveyUser {
            survey_id: "s1".to_string(),
            user_id: user_id.to_string(),
            permission,
            granted_by: "owner".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_has_everything_without_a_grant() {
        let access = SurveyAccess::resolve("owner", &survey(), None);
        assert_eq!(
            access,
            SurveyAccess {
                can_view: true,
                can_edit: true,
                can_admin: true,
                is_owner: true
            }
        );
    }

    #[test]
    fn grants_map_to_capabilities() {
        let survey = survey();
        let view = SurveyAccess::resolve("u", &survey, Some(&grant("u", SurveyPermission::View)));
        assert!(view.can_view && !view.can_edit && !view.can_admin && !view.is_owner);

        let edit = SurveyAccess::resolve("u", &survey, Some(&grant("u", SurveyPermission::Edit)));
        assert!(edit.can_view && edit.can_edit && !edit.can_admin);

        let admin =
            SurveyAccess::resolve("u", &survey, Some(&grant("u", SurveyPermission::Admin)));
        assert!(admin.can_view && admin.can_edit && admin.can_admin && !admin.is_owner);
    }

    #[test]
    fn stranger_and_foreign_grant_are_denied() {
        let survey = survey();
        assert_eq!(
            SurveyAccess::resolve("stranger", &survey, None),
            SurveyAccess::DENIED
        );
        let foreign = grant("someone-else", SurveyPermission::Admin);
        assert_eq!(
            SurveyAccess::resolve("stranger", &survey, Some(&foreign)),
            SurveyAccess::DENIED
        );
    }

    #[test]
    fn checker_distinguishes_hidden_from_forbidden() {
        let survey = survey();
        let viewer = SurveyAccess::resolve("u", &survey, Some(&grant("u", SurveyPermission::View)));
        assert!(viewer.check_view().is_ok());
        assert!(matches!(viewer.check_edit(), Err(Error::Forbidden)));
        assert!(matches!(viewer.check_owner(), Err(Error::NotFound)));
        assert!(matches!(
            SurveyAccess::DENIED.check_edit(),
            Err(Error::NotFound)
        ));
    }
}
