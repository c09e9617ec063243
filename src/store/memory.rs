use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::errors::{Error, Result};
use crate::models::{
    account::{DeletionReport, DeletionStep},
    announcement::{Announcement, AnnouncementDelivery, DeliveredAnnouncement, DeliveryStatus},
    billing::{Payment, PaymentStatus, Product},
    discount::DiscountLink,
    invitation::Invitation,
    question::Question,
    response::SurveyResponse,
    survey::{Survey, SurveyDetails, SurveyStatus, SurveyUser},
    ticket::{AddonKind, TicketType, UserAddon, UserTicket},
    user::{Role, User},
};
use crate::store::{Store, below_used};

#[derive(Debug, Default, Clone)]
struct Tables {
    users: HashMap<String, User>,
    surveys: HashMap<String, Survey>,
    survey_users: Vec<SurveyUser>,
    questions: Vec<Question>,
    responses: Vec<SurveyResponse>,
    invitations: HashMap<String, Invitation>, // ! keyed by code
    tickets: HashMap<(String, TicketType), UserTicket>,
    addons: HashMap<(String, AddonKind), UserAddon>,
    announcements: HashMap<String, Announcement>,
    deliveries: Vec<AnnouncementDelivery>,
    discount_links: HashMap<String, DiscountLink>,
    payments: HashMap<String, Payment>,
}

impl Tables {
    fn grant_tickets(
        &mut self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> UserTicket {
        let ticket = self
            .tickets
            .entry((user_id.to_string(), ticket_type))
            .or_insert_with(|| UserTicket {
                created_at: Some(now),
                ..UserTicket::baseline(user_id, ticket_type)
            });
        ticket.total_tickets += quantity;
        ticket.remaining_tickets += quantity;
        ticket.updated_at = Some(now);
        ticket.clone()
    }

    fn consume_tickets(
        &mut self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<UserTicket> {
        let key = (user_id.to_string(), ticket_type);
        let remaining = self
            .tickets
            .get(&key)
            .map_or(ticket_type.baseline(), |ticket| ticket.remaining_tickets);
        if remaining < quantity {
            return Err(Error::InsufficientTickets);
        }

        let ticket = self.tickets.entry(key).or_insert_with(|| UserTicket {
            created_at: Some(now),
            ..UserTicket::baseline(user_id, ticket_type)
        });
        ticket.used_tickets += quantity;
        ticket.remaining_tickets -= quantity;
        ticket.updated_at = Some(now);
        Ok(ticket.clone())
    }

    fn grant_addon(
        &mut self,
        user_id: &str,
        kind: AddonKind,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> UserAddon {
        let addon = self
            .addons
            .entry((user_id.to_string(), kind))
            .or_insert_with(|| UserAddon {
                user_id: user_id.to_string(),
                kind,
                quantity: 0,
                updated_at: now,
            });
        addon.quantity += quantity;
        addon.updated_at = now;
        addon.clone()
    }

    fn owned_survey_ids(&self, user_id: &str) -> HashSet<String> {
        self.surveys
            .values()
            .filter(|survey| survey.owner_id == user_id)
            .map(|survey| survey.id.clone())
            .collect()
    }

    fn delete_step(&mut self, step: DeletionStep, user_id: &str) -> usize {
        let owned = self.owned_survey_ids(user_id);
        match step {
            DeletionStep::Responses => {
                retain_counting(&mut self.responses, |r| !owned.contains(&r.survey_id))
            }
            DeletionStep::Questions => {
                retain_counting(&mut self.questions, |q| !owned.contains(&q.survey_id))
            }
            DeletionStep::SurveyUsers => retain_counting(&mut self.survey_users, |g| {
                !owned.contains(&g.survey_id) && g.user_id != user_id
            }),
            DeletionStep::Surveys => {
                let before = self.surveys.len();
                self.surveys.retain(|_, survey| survey.owner_id != user_id);
                before - self.surveys.len()
            }
            DeletionStep::Invitations => {
                let before = self.invitations.len();
                self.invitations.retain(|_, inv| inv.inviter_id != user_id);
                before - self.invitations.len()
            }
            DeletionStep::Tickets => {
                let before = self.tickets.len();
                self.tickets.retain(|(owner, _), _| owner != user_id);
                before - self.tickets.len()
            }
            DeletionStep::Addons => {
                let before = self.addons.len();
                self.addons.retain(|(owner, _), _| owner != user_id);
                before - self.addons.len()
            }
            DeletionStep::AnnouncementDeliveries => {
                retain_counting(&mut self.deliveries, |d| d.user_id != user_id)
            }
            DeletionStep::DiscountLinks => {
                let before = self.discount_links.len();
                self.discount_links.retain(|_, link| link.created_by != user_id);
                before - self.discount_links.len()
            }
            DeletionStep::Payments => {
                let before = self.payments.len();
                self.payments.retain(|_, payment| payment.user_id != user_id);
                before - self.payments.len()
            }
            DeletionStep::User => usize::from(self.users.remove(user_id).is_some()),
        }
    }
}

fn retain_counting<T>(rows: &mut Vec<T>, keep: impl FnMut(&T) -> bool) -> usize {
    let before = rows.len();
    rows.retain(keep);
    before - rows.len()
}

fn sorted_by<T, K: Ord>(mut rows: Vec<T>, key: impl FnMut(&T) -> K) -> Vec<T> {
    rows.sort_by_key(key);
    rows
}

/// Points where tests can make the in-memory backend fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Deletion(DeletionStep),
    SurveyRead,
    SurveyInsert,
}

/// In-process backend. One write lock per operation makes every compound
/// operation atomic; account deletion works on a copy that is swapped in
/// only after the last step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    faults: Vec<Fault>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_faults(faults: impl IntoIterator<Item = Fault>) -> Self {
        Self {
            faults: faults.into_iter().collect(),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn failing_deletion_at(step: DeletionStep) -> Self {
        Self::with_faults([Fault::Deletion(step)])
    }

    #[cfg(test)]
    fn injected_fault(&self, fault: Fault) -> Result<()> {
        if !self.faults.contains(&fault) {
            return Ok(());
        }
        Err(Error::Store(match fault {
            Fault::Deletion(step) => format!(
                "injected failure at deletion step {} of {}",
                step.position(),
                DeletionStep::ALL.len()
            ),
            other => format!("injected failure: {other:?}"),
        }))
    }

    #[cfg(not(test))]
    fn injected_fault(&self, _fault: Fault) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn insert_user(&self, user: User) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(Error::EmailExist(user.email));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = self.tables.read().await.users.values().cloned().collect();
        Ok(sorted_by(users, |u: &User| (u.created_at, u.id.clone())))
    }

    async fn set_avatar(
        &self,
        user_id: &str,
        file: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(User, Option<String>)> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(user_id).ok_or(Error::NotFound)?;
        let previous = std::mem::replace(&mut user.avatar_file, file);
        user.updated_at = Some(at);
        Ok((user.clone(), previous))
    }

    async fn set_billing_customer(
        &self,
        user_id: &str,
        customer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<User> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(user_id).ok_or(Error::NotFound)?;
        user.billing_customer_id = Some(customer_id.to_string());
        user.updated_at = Some(at);
        Ok(user.clone())
    }

    async fn update_user_access(
        &self,
        user_id: &str,
        role: Option<Role>,
        max_invitations: Option<u32>,
        at: DateTime<Utc>,
    ) -> Result<User> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(user_id).ok_or(Error::NotFound)?;
        if let Some(max) = max_invitations {
            if max < user.used_invitations {
                return Err(below_used(user.used_invitations));
            }
            user.max_invitations = max;
        }
        if let Some(role) = role {
            user.role = role;
        }
        user.updated_at = Some(at);
        Ok(user.clone())
    }

    async fn insert_survey(&self, survey: Survey) -> Result<Survey> {
        self.injected_fault(Fault::SurveyInsert)?;
        let mut tables = self.tables.write().await;
        tables.surveys.insert(survey.id.clone(), survey.clone());
        Ok(survey)
    }

    async fn get_survey(&self, survey_id: &str) -> Result<Option<Survey>> {
        Ok(self.tables.read().await.surveys.get(survey_id).cloned())
    }

    async fn get_survey_with_grant(
        &self,
        survey_id: &str,
        user_id: &str,
    ) -> Result<Option<(Survey, Option<SurveyUser>)>> {
        self.injected_fault(Fault::SurveyRead)?;
        let tables = self.tables.read().await;
        Ok(tables.surveys.get(survey_id).map(|survey| {
            let grant = tables
                .survey_users
                .iter()
                .find(|g| g.survey_id == survey_id && g.user_id == user_id)
                .cloned();
            (survey.clone(), grant)
        }))
    }

    async fn find_survey_by_share_url(&self, share_url: &str) -> Result<Option<Survey>> {
        let tables = self.tables.read().await;
        Ok(tables
            .surveys
            .values()
            .find(|s| s.share_url.as_deref() == Some(share_url))
            .cloned())
    }

    async fn list_owned_surveys(&self, owner_id: &str) -> Result<Vec<Survey>> {
        let tables = self.tables.read().await;
        let surveys = tables
            .surveys
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(sorted_by(surveys, |s: &Survey| (s.created_at, s.id.clone())))
    }

    async fn list_shared_surveys(&self, user_id: &str) -> Result<Vec<(Survey, SurveyUser)>> {
        let tables = self.tables.read().await;
        let shared = tables
            .survey_users
            .iter()
            .filter(|g| g.user_id == user_id)
            .filter_map(|g| {
                tables
                    .surveys
                    .get(&g.survey_id)
                    .map(|s| (s.clone(), g.clone()))
            })
            .collect();
        Ok(sorted_by(shared, |(s, _): &(Survey, SurveyUser)| {
            (s.created_at, s.id.clone())
        }))
    }

    async fn update_survey_details(
        &self,
        survey_id: &str,
        details: SurveyDetails,
        at: DateTime<Utc>,
    ) -> Result<Survey> {
        let mut tables = self.tables.write().await;
        let survey = tables.surveys.get_mut(survey_id).ok_or(Error::NotFound)?;
        if let Some(title) = details.title {
            survey.title = title;
        }
        if let Some(description) = details.description {
            survey.description = description;
        }
        survey.updated_at = Some(at);
        Ok(survey.clone())
    }

    async fn set_survey_share(
        &self,
        survey_id: &str,
        share_url: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Survey> {
        let mut tables = self.tables.write().await;
        if let Some(share_url) = &share_url {
            if tables
                .surveys
                .values()
                .any(|s| s.id != survey_id && s.share_url.as_ref() == Some(share_url))
            {
                return Err(Error::ShareUrlTaken);
            }
        }
        let survey = tables.surveys.get_mut(survey_id).ok_or(Error::NotFound)?;
        survey.status = if share_url.is_some() {
            SurveyStatus::Active
        } else {
            SurveyStatus::Draft
        };
        survey.share_url = share_url;
        survey.updated_at = Some(at);
        Ok(survey.clone())
    }

    async fn delete_survey(&self, survey_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.surveys.remove(survey_id).is_none() {
            return Ok(false);
        }
        tables.questions.retain(|q| q.survey_id != survey_id);
        tables.responses.retain(|r| r.survey_id != survey_id);
        tables.survey_users.retain(|g| g.survey_id != survey_id);
        Ok(true)
    }

    async fn replace_questions(
        &self,
        survey_id: &str,
        questions: Vec<Question>,
    ) -> Result<Vec<Question>> {
        let mut tables = self.tables.write().await;
        if !tables.surveys.contains_key(survey_id) {
            return Err(Error::NotFound);
        }
        tables.questions.retain(|q| q.survey_id != survey_id);
        tables.questions.extend(questions.iter().cloned());
        Ok(sorted_by(questions, |q: &Question| q.order))
    }

    async fn list_questions(&self, survey_id: &str) -> Result<Vec<Question>> {
        let tables = self.tables.read().await;
        let questions = tables
            .questions
            .iter()
            .filter(|q| q.survey_id == survey_id)
            .cloned()
            .collect();
        Ok(sorted_by(questions, |q: &Question| q.order))
    }

    async fn insert_response(&self, response: SurveyResponse) -> Result<SurveyResponse> {
        let mut tables = self.tables.write().await;
        if !tables.surveys.contains_key(&response.survey_id) {
            return Err(Error::NotFound);
        }
        tables.responses.push(response.clone());
        Ok(response)
    }

    async fn list_responses(&self, survey_id: &str) -> Result<Vec<SurveyResponse>> {
        let tables = self.tables.read().await;
        Ok(tables
            .responses
            .iter()
            .filter(|r| r.survey_id == survey_id)
            .cloned()
            .collect())
    }

    async fn upsert_grant(&self, grant: SurveyUser) -> Result<SurveyUser> {
        let mut tables = self.tables.write().await;
        match tables
            .survey_users
            .iter_mut()
            .find(|g| g.survey_id == grant.survey_id && g.user_id == grant.user_id)
        {
            Some(existing) => *existing = grant.clone(),
            None => tables.survey_users.push(grant.clone()),
        }
        Ok(grant)
    }

    async fn delete_grant(&self, survey_id: &str, user_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = retain_counting(&mut tables.survey_users, |g| {
            !(g.survey_id == survey_id && g.user_id == user_id)
        });
        Ok(removed > 0)
    }

    async fn list_grants(&self, survey_id: &str) -> Result<Vec<SurveyUser>> {
        let tables = self.tables.read().await;
        Ok(tables
            .survey_users
            .iter()
            .filter(|g| g.survey_id == survey_id)
            .cloned()
            .collect())
    }

    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation> {
        let mut tables = self.tables.write().await;
        if tables.invitations.contains_key(&invitation.code) {
            return Err(Error::Store("duplicate invitation code".to_string()));
        }
        let inviter = tables
            .users
            .get_mut(&invitation.inviter_id)
            .ok_or(Error::NotFound)?;
        if inviter.used_invitations >= inviter.max_invitations {
            return Err(Error::QuotaExceeded);
        }
        inviter.used_invitations += 1;
        tables
            .invitations
            .insert(invitation.code.clone(), invitation.clone());
        Ok(invitation)
    }

    async fn find_invitation(&self, code: &str) -> Result<Option<Invitation>> {
        Ok(self.tables.read().await.invitations.get(code).cloned())
    }

    async fn list_invitations(&self, inviter_id: &str) -> Result<Vec<Invitation>> {
        let tables = self.tables.read().await;
        let invitations = tables
            .invitations
            .values()
            .filter(|inv| inv.inviter_id == inviter_id)
            .cloned()
            .collect();
        Ok(sorted_by(invitations, |inv: &Invitation| {
            (inv.created_at, inv.code.clone())
        }))
    }

    async fn mark_invitation_used(
        &self,
        code: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.invitations.get_mut(code) {
            Some(invitation) if !invitation.is_used => {
                invitation.is_used = true;
                invitation.used_by = Some(user_id.to_string());
                invitation.used_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_tickets(&self, user_id: &str) -> Result<Vec<UserTicket>> {
        let tables = self.tables.read().await;
        let tickets = tables
            .tickets
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_by(tickets, |t: &UserTicket| t.ticket_type))
    }

    async fn grant_tickets(
        &self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
    ) -> Result<UserTicket> {
        let mut tables = self.tables.write().await;
        Ok(tables.grant_tickets(user_id, ticket_type, quantity, Utc::now()))
    }

    async fn consume_tickets(
        &self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
    ) -> Result<UserTicket> {
        let mut tables = self.tables.write().await;
        tables.consume_tickets(user_id, ticket_type, quantity, Utc::now())
    }

    async fn release_tickets(
        &self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
    ) -> Result<UserTicket> {
        let mut tables = self.tables.write().await;
        let ticket = tables
            .tickets
            .get_mut(&(user_id.to_string(), ticket_type))
            .filter(|ticket| ticket.used_tickets >= quantity)
            .ok_or(Error::InsufficientTickets)?;
        ticket.used_tickets -= quantity;
        ticket.remaining_tickets += quantity;
        ticket.updated_at = Some(Utc::now());
        Ok(ticket.clone())
    }

    async fn list_addons(&self, user_id: &str) -> Result<Vec<UserAddon>> {
        let tables = self.tables.read().await;
        let addons = tables
            .addons
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_by(addons, |a: &UserAddon| a.kind))
    }

    async fn grant_addon(
        &self,
        user_id: &str,
        kind: AddonKind,
        quantity: i64,
    ) -> Result<UserAddon> {
        let mut tables = self.tables.write().await;
        Ok(tables.grant_addon(user_id, kind, quantity, Utc::now()))
    }

    async fn publish_announcement(
        &self,
        announcement: Announcement,
        recipients: Vec<String>,
    ) -> Result<Announcement> {
        let mut tables = self.tables.write().await;
        let announcement = Announcement {
            total_sent: recipients.len() as i64,
            total_read: 0,
            ..announcement
        };
        for user_id in recipients {
            tables.deliveries.push(AnnouncementDelivery {
                announcement_id: announcement.id.clone(),
                user_id,
                status: DeliveryStatus::Sent,
                delivered_at: announcement.created_at,
                read_at: None,
                hidden_at: None,
            });
        }
        tables
            .announcements
            .insert(announcement.id.clone(), announcement.clone());
        Ok(announcement)
    }

    async fn list_announcements(&self) -> Result<Vec<Announcement>> {
        let announcements = self
            .tables
            .read()
            .await
            .announcements
            .values()
            .cloned()
            .collect();
        Ok(sorted_by(announcements, |a: &Announcement| {
            (a.created_at, a.id.clone())
        }))
    }

    async fn list_deliveries(&self, user_id: &str) -> Result<Vec<DeliveredAnnouncement>> {
        let tables = self.tables.read().await;
        let delivered = tables
            .deliveries
            .iter()
            .filter(|d| d.user_id == user_id && d.status != DeliveryStatus::Hidden)
            .filter_map(|d| {
                tables
                    .announcements
                    .get(&d.announcement_id)
                    .map(|announcement| DeliveredAnnouncement {
                        announcement: announcement.clone(),
                        status: d.status,
                        delivered_at: d.delivered_at,
                        read_at: d.read_at,
                    })
            })
            .collect();
        Ok(sorted_by(delivered, |d: &DeliveredAnnouncement| {
            (d.delivered_at, d.announcement.id.clone())
        }))
    }

    async fn mark_delivery_read(
        &self,
        announcement_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(delivery) = tables.deliveries.iter_mut().find(|d| {
            d.announcement_id == announcement_id && d.user_id == user_id && d.status.can_read()
        }) else {
            return Ok(false);
        };
        delivery.status = DeliveryStatus::Read;
        delivery.read_at = Some(at);
        if let Some(announcement) = tables.announcements.get_mut(announcement_id) {
            announcement.total_read += 1;
        }
        Ok(true)
    }

    async fn hide_delivery(
        &self,
        announcement_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(delivery) = tables.deliveries.iter_mut().find(|d| {
            d.announcement_id == announcement_id && d.user_id == user_id && d.status.can_hide()
        }) else {
            return Ok(false);
        };
        delivery.status = DeliveryStatus::Hidden;
        delivery.hidden_at = Some(at);
        Ok(true)
    }

    async fn insert_discount_link(&self, link: DiscountLink) -> Result<DiscountLink> {
        let mut tables = self.tables.write().await;
        if tables.discount_links.values().any(|l| l.code == link.code) {
            return Err(Error::BadRequest(format!(
                "Discount code {} already exists",
                link.code
            )));
        }
        tables.discount_links.insert(link.id.clone(), link.clone());
        Ok(link)
    }

    async fn get_discount_link(&self, link_id: &str) -> Result<Option<DiscountLink>> {
        Ok(self.tables.read().await.discount_links.get(link_id).cloned())
    }

    async fn find_discount_link(&self, code: &str) -> Result<Option<DiscountLink>> {
        let tables = self.tables.read().await;
        Ok(tables
            .discount_links
            .values()
            .find(|l| l.code == code)
            .cloned())
    }

    async fn list_discount_links(&self) -> Result<Vec<DiscountLink>> {
        let links = self
            .tables
            .read()
            .await
            .discount_links
            .values()
            .cloned()
            .collect();
        Ok(sorted_by(links, |l: &DiscountLink| {
            (l.created_at, l.id.clone())
        }))
    }

    async fn update_discount_link(&self, link: DiscountLink) -> Result<DiscountLink> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .discount_links
            .get_mut(&link.id)
            .ok_or(Error::NotFound)?;
        *slot = link.clone();
        Ok(link)
    }

    async fn insert_payment(&self, payment: Payment) -> Result<Payment> {
        let mut tables = self.tables.write().await;
        tables.payments.insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    async fn complete_payment(
        &self,
        provider_session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>> {
        let mut tables = self.tables.write().await;
        let Some(payment) = tables.payments.values_mut().find(|p| {
            p.provider_session_id == provider_session_id && p.status == PaymentStatus::Pending
        }) else {
            return Ok(None);
        };
        payment.status = PaymentStatus::Completed;
        payment.completed_at = Some(at);
        let payment = payment.clone();

        match payment.product {
            Product::Tickets {
                ticket_type,
                quantity,
            } => {
                tables.grant_tickets(&payment.user_id, ticket_type, quantity, at);
            }
            Product::Addon { kind, quantity } => {
                tables.grant_addon(&payment.user_id, kind, quantity, at);
            }
        }
        Ok(Some(payment))
    }

    async fn delete_account(&self, user_id: &str) -> Result<DeletionReport> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get(user_id).ok_or(Error::NotFound)?;

        let mut report = DeletionReport {
            avatar_file: user.avatar_file.clone(),
            ..DeletionReport::default()
        };
        let mut working = tables.clone();
        for step in DeletionStep::ALL {
            self.injected_fault(Fault::Deletion(step))?;
            let deleted = working.delete_step(step, user_id);
            report.deleted.insert(step, deleted);
        }
        *tables = working;
        Ok(report)
    }
}
