//! Persistence seam.
//!
//! Every method is one logical store operation. The compound ones
//! (`create_invitation`, `grant_tickets`, `consume_tickets`, `release_tickets`,
//! `publish_announcement`, `mark_delivery_read`, `complete_payment`,
//! `delete_survey`, `delete_account`) are atomic in every backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::{Error, Result};
use crate::models::{
    account::DeletionReport,
    announcement::{Announcement, DeliveredAnnouncement},
    billing::Payment,
    discount::DiscountLink,
    invitation::Invitation,
    question::Question,
    response::SurveyResponse,
    survey::{Survey, SurveyDetails, SurveyUser},
    ticket::{AddonKind, TicketType, UserAddon, UserTicket},
    user::{Role, User},
};

pub mod memory;
pub mod surreal;

pub use memory::{Fault, MemoryStore};
pub use surreal::SurrealStore;

fn below_used(used: u32) -> Error {
    Error::BadRequest(format!(
        "max_invitations cannot drop below the {used} already used"
    ))
}

#[async_trait]
pub trait Store: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    // ! users
    /// Fails with `EmailExist` when the email is taken.
    async fn insert_user(&self, user: User) -> Result<User>;
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Sets or clears the avatar file. Returns the row and the file it replaced.
    async fn set_avatar(
        &self,
        user_id: &str,
        file: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(User, Option<String>)>;
    async fn set_billing_customer(
        &self,
        user_id: &str,
        customer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<User>;
    /// Fails with `BadRequest` when `max_invitations` would drop below the used count.
    async fn update_user_access(
        &self,
        user_id: &str,
        role: Option<Role>,
        max_invitations: Option<u32>,
        at: DateTime<Utc>,
    ) -> Result<User>;

    // ! surveys
    async fn insert_survey(&self, survey: Survey) -> Result<Survey>;
    async fn get_survey(&self, survey_id: &str) -> Result<Option<Survey>>;
    /// The survey and `user_id`'s grant on it, read together.
    async fn get_survey_with_grant(
        &self,
        survey_id: &str,
        user_id: &str,
    ) -> Result<Option<(Survey, Option<SurveyUser>)>>;
    async fn find_survey_by_share_url(&self, share_url: &str) -> Result<Option<Survey>>;
    async fn list_owned_surveys(&self, owner_id: &str) -> Result<Vec<Survey>>;
    async fn list_shared_surveys(&self, user_id: &str) -> Result<Vec<(Survey, SurveyUser)>>;
    async fn update_survey_details(
        &self,
        survey_id: &str,
        details: SurveyDetails,
        at: DateTime<Utc>,
    ) -> Result<Survey>;
    /// `Some` publishes the survey as ACTIVE under that url, `None` takes it back to DRAFT.
    /// Fails with `ShareUrlTaken` when another survey holds the same share url.
    async fn set_survey_share(
        &self,
        survey_id: &str,
        share_url: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Survey>;
    /// Removes the survey with its questions, responses and grants.
    async fn delete_survey(&self, survey_id: &str) -> Result<bool>;

    // ! questions & responses
    async fn replace_questions(
        &self,
        survey_id: &str,
        questions: Vec<Question>,
    ) -> Result<Vec<Question>>;
    async fn list_questions(&self, survey_id: &str) -> Result<Vec<Question>>;
    async fn insert_response(&self, response: SurveyResponse) -> Result<SurveyResponse>;
    async fn list_responses(&self, survey_id: &str) -> Result<Vec<SurveyResponse>>;

    // ! collaborators
    async fn upsert_grant(&self, grant: SurveyUser) -> Result<SurveyUser>;
    async fn delete_grant(&self, survey_id: &str, user_id: &str) -> Result<bool>;
    async fn list_grants(&self, survey_id: &str) -> Result<Vec<SurveyUser>>;

    // ! invitations
    /// Inserts the invitation and bumps the inviter's used count, or does neither.
    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation>;
    async fn find_invitation(&self, code: &str) -> Result<Option<Invitation>>;
    async fn list_invitations(&self, inviter_id: &str) -> Result<Vec<Invitation>>;
    /// `false` when the code is unknown or already used.
    async fn mark_invitation_used(
        &self,
        code: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    // ! tickets & add-ons
    /// Persisted rows only; FREE synthesis happens in the ticket service.
    async fn list_tickets(&self, user_id: &str) -> Result<Vec<UserTicket>>;
    async fn grant_tickets(
        &self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
    ) -> Result<UserTicket>;
    /// Hands back consumed tickets. Fails with `InsufficientTickets` when fewer
    /// than `quantity` were used.
    async fn release_tickets(
        &self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
    ) -> Result<UserTicket>;
    /// Fails with `InsufficientTickets` and leaves counters untouched when short.
    async fn consume_tickets(
        &self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
    ) -> Result<UserTicket>;
    async fn list_addons(&self, user_id: &str) -> Result<Vec<UserAddon>>;
    async fn grant_addon(&self, user_id: &str, kind: AddonKind, quantity: i64)
    -> Result<UserAddon>;

    // ! announcements
    async fn publish_announcement(
        &self,
        announcement: Announcement,
        recipients: Vec<String>,
    ) -> Result<Announcement>;
    async fn list_announcements(&self) -> Result<Vec<Announcement>>;
    /// Deliveries of `user_id` that are not hidden.
    async fn list_deliveries(&self, user_id: &str) -> Result<Vec<DeliveredAnnouncement>>;
    /// SENT -> READ plus the announcement's read counter. `false` when no SENT row exists.
    async fn mark_delivery_read(
        &self,
        announcement_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;
    /// SENT|READ -> HIDDEN. `false` when nothing hideable exists.
    async fn hide_delivery(
        &self,
        announcement_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    // ! discount links
    async fn insert_discount_link(&self, link: DiscountLink) -> Result<DiscountLink>;
    async fn get_discount_link(&self, link_id: &str) -> Result<Option<DiscountLink>>;
    async fn find_discount_link(&self, code: &str) -> Result<Option<DiscountLink>>;
    async fn list_discount_links(&self) -> Result<Vec<DiscountLink>>;
    async fn update_discount_link(&self, link: DiscountLink) -> Result<DiscountLink>;

    // ! payments
    async fn insert_payment(&self, payment: Payment) -> Result<Payment>;
    /// Completes a PENDING payment and applies its product. `None` when unknown or done.
    async fn complete_payment(
        &self,
        provider_session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>>;

    // ! account
    async fn delete_account(&self, user_id: &str) -> Result<DeletionReport>;
}
