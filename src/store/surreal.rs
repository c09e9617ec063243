use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::info;

use crate::config::Config;
use crate::consts::db_const::{
    ANNOUNCEMENT_DELIVERY_TABLE, ANNOUNCEMENT_TABLE, DISCOUNT_LINK_TABLE, INVITATION_TABLE,
    PAYMENT_TABLE, QUESTION_TABLE, RESPONSE_TABLE, SURVEY_TABLE, SURVEY_USER_TABLE,
    USER_ADDON_TABLE, USER_TABLE, USER_TICKET_TABLE,
};
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

// ! record ids are plain string keys; `meta::id` turns them back into strings on read
const SELECT_ONE: &str = "SELECT *, meta::id(id) AS id FROM type::thing($table, $id);";
const CREATE_ONE: &str = "CREATE type::thing($table, $id) CONTENT $data RETURN NONE;";


const GRANT_TICKETS: &str = "UPSERT type::thing($ticket_table, [$user_id, $ticket_type]) SET
        user_id = $user_id,
        ticket_type = $ticket_type,
        total_tickets = (total_tickets ?? $baseline) + $quantity,
        used_tickets = used_tickets ?? 0,
        remaining_tickets = (remaining_tickets ?? $baseline) + $quantity,
        created_at = created_at ?? $now,
        updated_at = $now
    RETURN AFTER;";

const GRANT_ADDON: &str = "UPSERT type::thing($addon_table, [$user_id, $kind]) SET
        user_id = $user_id,
        kind = $kind,
        quantity = (quantity ?? 0) + $quantity,
        updated_at = $now
    RETURN AFTER;";

/// Record content without the `id` field, which lives in the record id.
fn content<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(value)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("id");
    }
    Ok(value)
}

fn index_conflict(error: &surrealdb::Error) -> bool {
    error.to_string().contains("already contains")
}

fn by_created<T>(mut rows: Vec<T>, key: impl Fn(&T) -> (DateTime<Utc>, String)) -> Vec<T> {
    rows.sort_by_key(key);
    rows
}

#[derive(Deserialize)]
struct Touched {
    #[allow(dead_code)]
    code: String,
}

#[derive(Deserialize)]
struct AvatarFile {
    avatar_file: Option<String>,
}

/// What a conditional write block did. Compound writes run as one
/// `RETURN { ... }` statement, which SurrealDB commits or discards as a whole,
/// and report their outcome as a value instead of an error.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Done,
    Missing,
    QuotaExceeded,
    ShareUrlTaken,
    BelowUsed,
}

fn deletion(step: DeletionStep) -> &'static str {
    match step {
        DeletionStep::Responses => {
            "DELETE type::table($response_table) WHERE survey_id IN $owned RETURN BEFORE"
        }
        DeletionStep::Questions => {
            "DELETE type::table($question_table) WHERE survey_id IN $owned RETURN BEFORE"
        }
        DeletionStep::SurveyUsers => {
            "DELETE type::table($grant_table) WHERE survey_id IN $owned OR user_id = $user_id RETURN BEFORE"
        }
        DeletionStep::Surveys => {
            "DELETE type::table($survey_table) WHERE owner_id = $user_id RETURN BEFORE"
        }
        DeletionStep::Invitations => {
            "DELETE type::table($invitation_table) WHERE inviter_id = $user_id RETURN BEFORE"
        }
        DeletionStep::Tickets => {
            "DELETE type::table($ticket_table) WHERE user_id = $user_id RETURN BEFORE"
        }
        DeletionStep::Addons => {
            "DELETE type::table($addon_table) WHERE user_id = $user_id RETURN BEFORE"
        }
        DeletionStep::AnnouncementDeliveries => {
            "DELETE type::table($delivery_table) WHERE user_id = $user_id RETURN BEFORE"
        }
        DeletionStep::DiscountLinks => {
            "DELETE type::table($discount_table) WHERE created_by = $user_id RETURN BEFORE"
        }
        DeletionStep::Payments => {
            "DELETE type::table($payment_table) WHERE user_id = $user_id RETURN BEFORE"
        }
        DeletionStep::User => "DELETE type::thing($user_table, $user_id) RETURN BEFORE",
    }
}

#[derive(Debug, Clone)]
pub struct SurrealStore {
    pub sdb: Surreal<Any>,
    #[cfg(test)]
    deletion_fault: Option<DeletionStep>,
}

impl SurrealStore {
    pub async fn init(config: &Config) -> Result<Self> {
        let endpoint = if config.database_url.contains("://") {
            config.database_url.clone()
        } else {
            format!("ws://{}", config.database_url)
        };
        let sdb = any::connect(endpoint.as_str()).await?;
        sdb.signin(Root {
            username: &config.db_user,
            password: &config.db_pass,
        })
        .await?;
        sdb.use_ns(config.db_namespace.clone())
            .use_db(config.db_name.clone())
            .await?;

        let store = Self::from_client(sdb).await?;
        info!("Connected to SurrealDB at {endpoint}");
        Ok(store)
    }

    /// Wraps a connected, namespaced client and makes sure the indexes exist.
    pub async fn from_client(sdb: Surreal<Any>) -> Result<Self> {
        let store = Self {
            sdb,
            #[cfg(test)]
            deletion_fault: None,
        };
        store.define_indexes().await?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn failing_deletion_at(mut self, step: DeletionStep) -> Self {
        self.deletion_fault = Some(step);
        self
    }

    #[cfg(test)]
    fn injected_throw(&self, step: DeletionStep) -> Option<String> {
        (self.deletion_fault == Some(step)).then(|| {
            format!(
                "THROW \"injected failure at deletion step {}\";",
                step.position()
            )
        })
    }

    #[cfg(not(test))]
    fn injected_throw(&self, _step: DeletionStep) -> Option<String> {
        None
    }

    async fn define_indexes(&self) -> Result<()> {
        let statements = format!(
            "DEFINE INDEX IF NOT EXISTS users_email ON TABLE {USER_TABLE} COLUMNS email UNIQUE;
             DEFINE INDEX IF NOT EXISTS invitations_code ON TABLE {INVITATION_TABLE} COLUMNS code UNIQUE;
             DEFINE INDEX IF NOT EXISTS discount_links_code ON TABLE {DISCOUNT_LINK_TABLE} COLUMNS code UNIQUE;
             DEFINE INDEX IF NOT EXISTS surveys_owner ON TABLE {SURVEY_TABLE} COLUMNS owner_id;
             DEFINE INDEX IF NOT EXISTS surveys_share_url ON TABLE {SURVEY_TABLE} COLUMNS share_url;
             DEFINE INDEX IF NOT EXISTS questions_survey ON TABLE {QUESTION_TABLE} COLUMNS survey_id;
             DEFINE INDEX IF NOT EXISTS responses_survey ON TABLE {RESPONSE_TABLE} COLUMNS survey_id;"
        );
        self.sdb.query(statements).await?.check()?;
        Ok(())
    }

    async fn select_one<T>(&self, table: &'static str, id: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let row = self
            .sdb
            .query(SELECT_ONE)
            .bind(("table", table))
            .bind(("id", id.to_string()))
            .await?
            .take::<Option<T>>(0)?;
        Ok(row)
    }

    async fn select_where<T>(
        &self,
        table: &'static str,
        field: &'static str,
        value: String,
    ) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let rows = self
            .sdb
            .query(format!(
                "SELECT *, meta::id(id) AS id FROM type::table($table) WHERE {field} = $value;"
            ))
            .bind(("table", table))
            .bind(("value", value))
            .await?
            .take::<Vec<T>>(0)?;
        Ok(rows)
    }

    async fn create_one<T: Serialize>(&self, table: &'static str, id: &str, row: &T) -> Result<()> {
        self.sdb
            .query(CREATE_ONE)
            .bind(("table", table))
            .bind(("id", id.to_string()))
            .bind(("data", content(row)?))
            .await?
            .check()?;
        Ok(())
    }

    async fn replace_one<T>(&self, table: &'static str, id: &str, row: &T) -> Result<Option<T>>
    where
        T: Serialize + for<'de> Deserialize<'de>,
    {
        let updated = self
            .sdb
            .query("UPDATE type::thing($table, $id) CONTENT $data RETURN NONE;")
            .query(SELECT_ONE)
            .bind(("table", table))
            .bind(("id", id.to_string()))
            .bind(("data", content(row)?))
            .await?
            .check()?
            .take::<Option<T>>(1)?;
        Ok(updated)
    }
}

#[async_trait]
impl Store for SurrealStore {
    fn backend_tag(&self) -> &'static str {
        "surrealdb"
    }

    async fn insert_user(&self, user: User) -> Result<User> {
        if self.find_user_by_email(&user.email).await?.is_some() {
            return Err(Error::EmailExist(user.email));
        }
        match self.create_one(USER_TABLE, &user.id, &user).await {
            Err(Error::SurrealError(error)) if index_conflict(&error) => {
                Err(Error::EmailExist(user.email))
            }
            Err(error) => Err(error),
            Ok(()) => Ok(user),
        }
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.select_one(USER_TABLE, user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users: Vec<User> = self
            .select_where(USER_TABLE, "email", email.to_string())
            .await?;
        Ok(users.into_iter().next())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = self
            .sdb
            .query("SELECT *, meta::id(id) AS id FROM type::table($table);")
            .bind(("table", USER_TABLE))
            .await?
            .take::<Vec<User>>(0)?;
        Ok(by_created(users, |u| (u.created_at, u.id.clone())))
    }

    async fn set_avatar(
        &self,
        user_id: &str,
        file: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(User, Option<String>)> {
        let mut response = self
            .sdb
            .query("UPDATE type::thing($table, $id) SET avatar_file = $file, updated_at = $now RETURN BEFORE;")
            .query(SELECT_ONE)
            .bind(("table", USER_TABLE))
            .bind(("id", user_id.to_string()))
            .bind(("file", file))
            .bind(("now", at))
            .await?
            .check()?;
        let before = response
            .take::<Option<AvatarFile>>(0)?
            .ok_or(Error::NotFound)?;
        let user = response.take::<Option<User>>(1)?.ok_or(Error::NotFound)?;
        Ok((user, before.avatar_file))
    }

    async fn set_billing_customer(
        &self,
        user_id: &str,
        customer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<User> {
        self.sdb
            .query("UPDATE type::thing($table, $id) SET billing_customer_id = $customer_id, updated_at = $now RETURN NONE;")
            .query(SELECT_ONE)
            .bind(("table", USER_TABLE))
            .bind(("id", user_id.to_string()))
            .bind(("customer_id", customer_id.to_string()))
            .bind(("now", at))
            .await?
            .check()?
            .take::<Option<User>>(1)?
            .ok_or(Error::NotFound)
    }

    async fn update_user_access(
        &self,
        user_id: &str,
        role: Option<Role>,
        max_invitations: Option<u32>,
        at: DateTime<Utc>,
    ) -> Result<User> {
        let mut response = self
            .sdb
            .query(
                "RETURN {
                     LET $user = array::first((SELECT used_invitations FROM type::thing($table, $id)));
                     IF $user = NONE {
                         'missing'
                     } ELSE IF $max != NONE AND $max < $user.used_invitations {
                         'below_used'
                     } ELSE {
                         UPDATE type::thing($table, $id) SET
                             role = $role ?? role,
                             max_invitations = $max ?? max_invitations,
                             updated_at = $now
                         RETURN NONE;
                         'done'
                     }
                 };",
            )
            .query(SELECT_ONE)
            .bind(("table", USER_TABLE))
            .bind(("id", user_id.to_string()))
            .bind(("role", role))
            .bind(("max", max_invitations))
            .bind(("now", at))
            .await?
            .check()?;
        let user = response.take::<Option<User>>(1)?;
        match (response.take::<Option<Outcome>>(0)?, user) {
            (Some(Outcome::Done), Some(user)) => Ok(user),
            (Some(Outcome::BelowUsed), Some(user)) => Err(below_used(user.used_invitations)),
            _ => Err(Error::NotFound),
        }
    }

    async fn insert_survey(&self, survey: Survey) -> Result<Survey> {
        self.create_one(SURVEY_TABLE, &survey.id, &survey).await?;
        Ok(survey)
    }

    async fn get_survey(&self, survey_id: &str) -> Result<Option<Survey>> {
        self.select_one(SURVEY_TABLE, survey_id).await
    }

    async fn get_survey_with_grant(
        &self,
        survey_id: &str,
        user_id: &str,
    ) -> Result<Option<(Survey, Option<SurveyUser>)>> {
        let mut response = self
            .sdb
            .query(SELECT_ONE)
            .query("SELECT * FROM type::thing($grant_table, [$id, $user_id]);")
            .bind(("table", SURVEY_TABLE))
            .bind(("grant_table", SURVEY_USER_TABLE))
            .bind(("id", survey_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await?;
        let survey = response.take::<Option<Survey>>(0)?;
        let grant = response.take::<Option<SurveyUser>>(1)?;
        Ok(survey.map(|survey| (survey, grant)))
    }

    async fn find_survey_by_share_url(&self, share_url: &str) -> Result<Option<Survey>> {
        let surveys: Vec<Survey> = self
            .select_where(SURVEY_TABLE, "share_url", share_url.to_string())
            .await?;
        Ok(surveys.into_iter().next())
    }

    async fn list_owned_surveys(&self, owner_id: &str) -> Result<Vec<Survey>> {
        let surveys = self
            .select_where(SURVEY_TABLE, "owner_id", owner_id.to_string())
            .await?;
        Ok(by_created(surveys, |s: &Survey| (s.created_at, s.id.clone())))
    }

    async fn list_shared_surveys(&self, user_id: &str) -> Result<Vec<(Survey, SurveyUser)>> {
        let grants = self
            .sdb
            .query("SELECT * FROM type::table($table) WHERE user_id = $user_id;")
            .bind(("table", SURVEY_USER_TABLE))
            .bind(("user_id", user_id.to_string()))
            .await?
            .take::<Vec<SurveyUser>>(0)?;
        if grants.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = grants.iter().map(|g| g.survey_id.clone()).collect();
        let surveys = self
            .sdb
            .query("SELECT *, meta::id(id) AS id FROM type::table($table) WHERE meta::id(id) IN $ids;")
            .bind(("table", SURVEY_TABLE))
            .bind(("ids", ids))
            .await?
            .take::<Vec<Survey>>(0)?;
        let mut by_id: HashMap<String, Survey> =
            surveys.into_iter().map(|s| (s.id.clone(), s)).collect();

        let shared = grants
            .into_iter()
            .filter_map(|grant| by_id.remove(&grant.survey_id).map(|s| (s, grant)))
            .collect();
        Ok(by_created(shared, |(s, _): &(Survey, SurveyUser)| {
            (s.created_at, s.id.clone())
        }))
    }

    async fn update_survey_details(
        &self,
        survey_id: &str,
        details: SurveyDetails,
        at: DateTime<Utc>,
    ) -> Result<Survey> {
        let mut fields = vec!["updated_at = $now"];
        if details.title.is_some() {
            fields.push("title = $title");
        }
        if details.description.is_some() {
            fields.push("description = $description");
        }
        self.sdb
            .query(format!(
                "UPDATE type::thing($table, $id) SET {} RETURN NONE;",
                fields.join(", ")
            ))
            .query(SELECT_ONE)
            .bind(("table", SURVEY_TABLE))
            .bind(("id", survey_id.to_string()))
            .bind(("title", details.title))
            .bind(("description", details.description.flatten()))
            .bind(("now", at))
            .await?
            .check()?
            .take::<Option<Survey>>(1)?
            .ok_or(Error::NotFound)
    }

    async fn set_survey_share(
        &self,
        survey_id: &str,
        share_url: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Survey> {
        let status = if share_url.is_some() {
            SurveyStatus::Active
        } else {
            SurveyStatus::Draft
        };
        let mut response = self
            .sdb
            .query(
                "RETURN {
                     IF $share_url != NONE AND array::len((SELECT id FROM type::table($table)
                         WHERE share_url = $share_url AND meta::id(id) != $id)) > 0 {
                         'share_url_taken'
                     } ELSE {
                         LET $updated = (UPDATE type::thing($table, $id)
                             SET status = $status, share_url = $share_url, updated_at = $now
                             RETURN AFTER);
                         IF array::len($updated) = 0 { 'missing' } ELSE { 'done' }
                     }
                 };",
            )
            .query(SELECT_ONE)
            .bind(("table", SURVEY_TABLE))
            .bind(("id", survey_id.to_string()))
            .bind(("share_url", share_url))
            .bind(("status", status))
            .bind(("now", at))
            .await?
            .check()?;
        let survey = response.take::<Option<Survey>>(1)?;
        match (response.take::<Option<Outcome>>(0)?, survey) {
            (Some(Outcome::ShareUrlTaken), _) => Err(Error::ShareUrlTaken),
            (Some(Outcome::Done), Some(survey)) => Ok(survey),
            _ => Err(Error::NotFound),
        }
    }

    async fn delete_survey(&self, survey_id: &str) -> Result<bool> {
        if self.get_survey(survey_id).await?.is_none() {
            return Ok(false);
        }
        self.sdb
            .query(
                "BEGIN TRANSACTION;
                 DELETE type::table($question_table) WHERE survey_id = $id;
                 DELETE type::table($response_table) WHERE survey_id = $id;
                 DELETE type::table($grant_table) WHERE survey_id = $id;
                 DELETE type::thing($table, $id);
                 COMMIT TRANSACTION;",
            )
            .bind(("table", SURVEY_TABLE))
            .bind(("question_table", QUESTION_TABLE))
            .bind(("response_table", RESPONSE_TABLE))
            .bind(("grant_table", SURVEY_USER_TABLE))
            .bind(("id", survey_id.to_string()))
            .await?
            .check()?;
        Ok(true)
    }

    async fn replace_questions(
        &self,
        survey_id: &str,
        questions: Vec<Question>,
    ) -> Result<Vec<Question>> {
        if self.get_survey(survey_id).await?.is_none() {
            return Err(Error::NotFound);
        }
        let rows = questions
            .iter()
            .map(|q| Ok(serde_json::json!({ "key": q.id, "data": content(q)? })))
            .collect::<Result<Vec<_>>>()?;
        self.sdb
            .query(
                "BEGIN TRANSACTION;
                 DELETE type::table($table) WHERE survey_id = $survey_id;
                 FOR $row IN $rows {
                     CREATE type::thing($table, $row.key) CONTENT $row.data RETURN NONE;
                 };
                 COMMIT TRANSACTION;",
            )
            .bind(("table", QUESTION_TABLE))
            .bind(("survey_id", survey_id.to_string()))
            .bind(("rows", rows))
            .await?
            .check()?;
        self.list_questions(survey_id).await
    }

    async fn list_questions(&self, survey_id: &str) -> Result<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .select_where(QUESTION_TABLE, "survey_id", survey_id.to_string())
            .await?;
        questions.sort_by_key(|q| q.order);
        Ok(questions)
    }

    async fn insert_response(&self, response: SurveyResponse) -> Result<SurveyResponse> {
        self.create_one(RESPONSE_TABLE, &response.id, &response)
            .await?;
        Ok(response)
    }

    async fn list_responses(&self, survey_id: &str) -> Result<Vec<SurveyResponse>> {
        let responses = self
            .select_where(RESPONSE_TABLE, "survey_id", survey_id.to_string())
            .await?;
        Ok(by_created(responses, |r: &SurveyResponse| {
            (r.submitted_at, r.id.clone())
        }))
    }

    async fn upsert_grant(&self, grant: SurveyUser) -> Result<SurveyUser> {
        self.sdb
            .query("UPSERT type::thing($table, [$survey_id, $user_id]) CONTENT $data RETURN NONE;")
            .bind(("table", SURVEY_USER_TABLE))
            .bind(("survey_id", grant.survey_id.clone()))
            .bind(("user_id", grant.user_id.clone()))
            .bind(("data", content(&grant)?))
            .await?
            .check()?;
        Ok(grant)
    }

    async fn delete_grant(&self, survey_id: &str, user_id: &str) -> Result<bool> {
        let existing = self
            .sdb
            .query("SELECT * FROM type::thing($table, [$survey_id, $user_id]);")
            .query("DELETE type::thing($table, [$survey_id, $user_id]);")
            .bind(("table", SURVEY_USER_TABLE))
            .bind(("survey_id", survey_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await?
            .check()?
            .take::<Option<SurveyUser>>(0)?;
        Ok(existing.is_some())
    }

    async fn list_grants(&self, survey_id: &str) -> Result<Vec<SurveyUser>> {
        let grants = self
            .sdb
            .query("SELECT * FROM type::table($table) WHERE survey_id = $survey_id;")
            .bind(("table", SURVEY_USER_TABLE))
            .bind(("survey_id", survey_id.to_string()))
            .await?
            .take::<Vec<SurveyUser>>(0)?;
        Ok(grants)
    }

    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation> {
        let outcome = self
            .sdb
            .query(
                "RETURN {
                     LET $inviter = array::first((SELECT used_invitations, max_invitations
                         FROM type::thing($user_table, $inviter_id)));
                     IF $inviter = NONE {
                         'missing'
                     } ELSE IF $inviter.used_invitations >= $inviter.max_invitations {
                         'quota_exceeded'
                     } ELSE {
                         UPDATE type::thing($user_table, $inviter_id) SET used_invitations += 1 RETURN NONE;
                         CREATE type::thing($table, $id) CONTENT $data RETURN NONE;
                         'done'
                     }
                 };",
            )
            .bind(("user_table", USER_TABLE))
            .bind(("table", INVITATION_TABLE))
            .bind(("inviter_id", invitation.inviter_id.clone()))
            .bind(("id", invitation.id.clone()))
            .bind(("data", content(&invitation)?))
            .await?
            .check()?
            .take::<Option<Outcome>>(0)?;
        match outcome {
            Some(Outcome::Done) => Ok(invitation),
            Some(Outcome::QuotaExceeded) => Err(Error::QuotaExceeded),
            _ => Err(Error::NotFound),
        }
    }

    async fn find_invitation(&self, code: &str) -> Result<Option<Invitation>> {
        let invitations: Vec<Invitation> = self
            .select_where(INVITATION_TABLE, "code", code.to_string())
            .await?;
        Ok(invitations.into_iter().next())
    }

    async fn list_invitations(&self, inviter_id: &str) -> Result<Vec<Invitation>> {
        let invitations = self
            .select_where(INVITATION_TABLE, "inviter_id", inviter_id.to_string())
            .await?;
        Ok(by_created(invitations, |i: &Invitation| {
            (i.created_at, i.code.clone())
        }))
    }

    async fn mark_invitation_used(
        &self,
        code: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let touched = self
            .sdb
            .query(
                "UPDATE type::table($table)
                 SET is_used = true, used_by = $user_id, used_at = $at
                 WHERE code = $code AND is_used = false
                 RETURN code;",
            )
            .bind(("table", INVITATION_TABLE))
            .bind(("code", code.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("at", at))
            .await?
            .take::<Vec<Touched>>(0)?;
        Ok(!touched.is_empty())
    }

    async fn list_tickets(&self, user_id: &str) -> Result<Vec<UserTicket>> {
        let mut tickets = self
            .sdb
            .query("SELECT * FROM type::table($table) WHERE user_id = $user_id;")
            .bind(("table", USER_TICKET_TABLE))
            .bind(("user_id", user_id.to_string()))
            .await?
            .take::<Vec<UserTicket>>(0)?;
        tickets.sort_by_key(|t| t.ticket_type);
        Ok(tickets)
    }

    async fn grant_tickets(
        &self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
    ) -> Result<UserTicket> {
        self.sdb
            .query(GRANT_TICKETS)
            .bind(("ticket_table", USER_TICKET_TABLE))
            .bind(("user_id", user_id.to_string()))
            .bind(("ticket_type", ticket_type))
            .bind(("baseline", ticket_type.baseline()))
            .bind(("quantity", quantity))
            .bind(("now", Utc::now()))
            .await?
            .take::<Option<UserTicket>>(0)?
            .ok_or(Error::InternalServerError)
    }

    async fn consume_tickets(
        &self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
    ) -> Result<UserTicket> {
        // ! the baseline row is materialised first so FREE tickets can be drawn
        self.sdb
            .query(
                "IF $baseline > 0 {
                     UPSERT type::thing($table, [$user_id, $ticket_type]) SET
                         user_id = $user_id,
                         ticket_type = $ticket_type,
                         total_tickets = total_tickets ?? $baseline,
                         used_tickets = used_tickets ?? 0,
                         remaining_tickets = remaining_tickets ?? $baseline,
                         created_at = created_at ?? $now
                     RETURN NONE;
                 };",
            )
            .query(
                "UPDATE type::thing($table, [$user_id, $ticket_type])
                 SET used_tickets += $quantity, remaining_tickets -= $quantity, updated_at = $now
                 WHERE remaining_tickets >= $quantity
                 RETURN AFTER;",
            )
            .bind(("table", USER_TICKET_TABLE))
            .bind(("user_id", user_id.to_string()))
            .bind(("ticket_type", ticket_type))
            .bind(("baseline", ticket_type.baseline()))
            .bind(("quantity", quantity))
            .bind(("now", Utc::now()))
            .await?
            .check()?
            .take::<Option<UserTicket>>(1)?
            .ok_or(Error::InsufficientTickets)
    }

    async fn release_tickets(
        &self,
        user_id: &str,
        ticket_type: TicketType,
        quantity: i64,
    ) -> Result<UserTicket> {
        self.sdb
            .query(
                "UPDATE type::thing($table, [$user_id, $ticket_type])
                 SET used_tickets -= $quantity, remaining_tickets += $quantity, updated_at = $now
                 WHERE used_tickets >= $quantity
                 RETURN AFTER;",
            )
            .bind(("table", USER_TICKET_TABLE))
            .bind(("user_id", user_id.to_string()))
            .bind(("ticket_type", ticket_type))
            .bind(("quantity", quantity))
            .bind(("now", Utc::now()))
            .await?
            .take::<Option<UserTicket>>(0)?
            .ok_or(Error::InsufficientTickets)
    }

    async fn list_addons(&self, user_id: &str) -> Result<Vec<UserAddon>> {
        let mut addons = self
            .sdb
            .query("SELECT * FROM type::table($table) WHERE user_id = $user_id;")
            .bind(("table", USER_ADDON_TABLE))
            .bind(("user_id", user_id.to_string()))
            .await?
            .take::<Vec<UserAddon>>(0)?;
        addons.sort_by_key(|a| a.kind);
        Ok(addons)
    }

    async fn grant_addon(
        &self,
        user_id: &str,
        kind: AddonKind,
        quantity: i64,
    ) -> Result<UserAddon> {
        self.sdb
            .query(GRANT_ADDON)
            .bind(("addon_table", USER_ADDON_TABLE))
            .bind(("user_id", user_id.to_string()))
            .bind(("kind", kind))
            .bind(("quantity", quantity))
            .bind(("now", Utc::now()))
            .await?
            .take::<Option<UserAddon>>(0)?
            .ok_or(Error::InternalServerError)
    }

    async fn publish_announcement(
        &self,
        announcement: Announcement,
        recipients: Vec<String>,
    ) -> Result<Announcement> {
        let announcement = Announcement {
            total_sent: recipients.len() as i64,
            total_read: 0,
            ..announcement
        };
        let deliveries = recipients
            .into_iter()
            .map(|user_id| AnnouncementDelivery {
                announcement_id: announcement.id.clone(),
                user_id,
                status: DeliveryStatus::Sent,
                delivered_at: announcement.created_at,
                read_at: None,
                hidden_at: None,
            })
            .collect::<Vec<_>>();
        self.sdb
            .query(
                "BEGIN TRANSACTION;
                 CREATE type::thing($table, $id) CONTENT $data RETURN NONE;
                 FOR $delivery IN $deliveries {
                     CREATE type::thing($delivery_table, [$delivery.announcement_id, $delivery.user_id])
                         CONTENT $delivery RETURN NONE;
                 };
                 COMMIT TRANSACTION;",
            )
            .bind(("table", ANNOUNCEMENT_TABLE))
            .bind(("delivery_table", ANNOUNCEMENT_DELIVERY_TABLE))
            .bind(("id", announcement.id.clone()))
            .bind(("data", content(&announcement)?))
            .bind(("deliveries", serde_json::to_value(&deliveries)?))
            .await?
            .check()?;
        Ok(announcement)
    }

    async fn list_announcements(&self) -> Result<Vec<Announcement>> {
        let announcements = self
            .sdb
            .query("SELECT *, meta::id(id) AS id FROM type::table($table);")
            .bind(("table", ANNOUNCEMENT_TABLE))
            .await?
            .take::<Vec<Announcement>>(0)?;
        Ok(by_created(announcements, |a| (a.created_at, a.id.clone())))
    }

    async fn list_deliveries(&self, user_id: &str) -> Result<Vec<DeliveredAnnouncement>> {
        let deliveries = self
            .sdb
            .query("SELECT * FROM type::table($table) WHERE user_id = $user_id AND status != $hidden;")
            .bind(("table", ANNOUNCEMENT_DELIVERY_TABLE))
            .bind(("user_id", user_id.to_string()))
            .bind(("hidden", DeliveryStatus::Hidden))
            .await?
            .take::<Vec<AnnouncementDelivery>>(0)?;
        if deliveries.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = deliveries
            .iter()
            .map(|d| d.announcement_id.clone())
            .collect();
        let announcements = self
            .sdb
            .query("SELECT *, meta::id(id) AS id FROM type::table($table) WHERE meta::id(id) IN $ids;")
            .bind(("table", ANNOUNCEMENT_TABLE))
            .bind(("ids", ids))
            .await?
            .take::<Vec<Announcement>>(0)?;
        let by_id: HashMap<String, Announcement> = announcements
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();

        let delivered = deliveries
            .into_iter()
            .filter_map(|d| {
                by_id
                    .get(&d.announcement_id)
                    .map(|announcement| DeliveredAnnouncement {
                        announcement: announcement.clone(),
                        status: d.status,
                        delivered_at: d.delivered_at,
                        read_at: d.read_at,
                    })
            })
            .collect();
        Ok(by_created(delivered, |d: &DeliveredAnnouncement| {
            (d.delivered_at, d.announcement.id.clone())
        }))
    }

    async fn mark_delivery_read(
        &self,
        announcement_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let outcome = self
            .sdb
            .query(
                "RETURN {
                     LET $updated = (UPDATE type::thing($delivery_table, [$announcement_id, $user_id])
                         SET status = $read, read_at = $at
                         WHERE status = $sent
                         RETURN AFTER);
                     IF array::len($updated) = 0 {
                         'missing'
                     } ELSE {
                         UPDATE type::thing($table, $announcement_id) SET total_read += 1 RETURN NONE;
                         'done'
                     }
                 };",
            )
            .bind(("table", ANNOUNCEMENT_TABLE))
            .bind(("delivery_table", ANNOUNCEMENT_DELIVERY_TABLE))
            .bind(("announcement_id", announcement_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("read", DeliveryStatus::Read))
            .bind(("sent", DeliveryStatus::Sent))
            .bind(("at", at))
            .await?
            .check()?
            .take::<Option<Outcome>>(0)?;
        Ok(outcome == Some(Outcome::Done))
    }

    async fn hide_delivery(
        &self,
        announcement_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let hidden = self
            .sdb
            .query(
                "UPDATE type::thing($table, [$announcement_id, $user_id])
                 SET status = $hidden, hidden_at = $at
                 WHERE status IN $hideable
                 RETURN AFTER;",
            )
            .bind(("table", ANNOUNCEMENT_DELIVERY_TABLE))
            .bind(("announcement_id", announcement_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("hidden", DeliveryStatus::Hidden))
            .bind(("hideable", vec![DeliveryStatus::Sent, DeliveryStatus::Read]))
            .bind(("at", at))
            .await?
            .take::<Option<AnnouncementDelivery>>(0)?;
        Ok(hidden.is_some())
    }

    async fn insert_discount_link(&self, link: DiscountLink) -> Result<DiscountLink> {
        if self.find_discount_link(&link.code).await?.is_some() {
            return Err(Error::BadRequest(format!(
                "Discount code {} already exists",
                link.code
            )));
        }
        self.create_one(DISCOUNT_LINK_TABLE, &link.id, &link)
            .await?;
        Ok(link)
    }

    async fn get_discount_link(&self, link_id: &str) -> Result<Option<DiscountLink>> {
        self.select_one(DISCOUNT_LINK_TABLE, link_id).await
    }

    async fn find_discount_link(&self, code: &str) -> Result<Option<DiscountLink>> {
        let links: Vec<DiscountLink> = self
            .select_where(DISCOUNT_LINK_TABLE, "code", code.to_string())
            .await?;
        Ok(links.into_iter().next())
    }

    async fn list_discount_links(&self) -> Result<Vec<DiscountLink>> {
        let links = self
            .sdb
            .query("SELECT *, meta::id(id) AS id FROM type::table($table);")
            .bind(("table", DISCOUNT_LINK_TABLE))
            .await?
            .take::<Vec<DiscountLink>>(0)?;
        Ok(by_created(links, |l| (l.created_at, l.id.clone())))
    }

    async fn update_discount_link(&self, link: DiscountLink) -> Result<DiscountLink> {
        self.replace_one(DISCOUNT_LINK_TABLE, &link.id, &link)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn insert_payment(&self, payment: Payment) -> Result<Payment> {
        self.create_one(PAYMENT_TABLE, &payment.id, &payment)
            .await?;
        Ok(payment)
    }

    async fn complete_payment(
        &self,
        provider_session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>> {
        let pending: Vec<Payment> = self
            .select_where(
                PAYMENT_TABLE,
                "provider_session_id",
                provider_session_id.to_string(),
            )
            .await?;
        let Some(payment) = pending
            .into_iter()
            .find(|p| p.status == PaymentStatus::Pending)
        else {
            return Ok(None);
        };

        let (grant, ticket_type, kind, quantity) = match payment.product {
            Product::Tickets {
                ticket_type,
                quantity,
            } => (GRANT_TICKETS, Some(ticket_type), None, quantity),
            Product::Addon { kind, quantity } => (GRANT_ADDON, None, Some(kind), quantity),
        };
        let outcome = self
            .sdb
            .query(format!(
                "RETURN {{
                     LET $done = (UPDATE type::thing($table, $id)
                         SET status = 'COMPLETED', completed_at = $now
                         WHERE status = 'PENDING'
                         RETURN AFTER);
                     IF array::len($done) = 0 {{
                         'missing'
                     }} ELSE {{
                         {grant}
                         'done'
                     }}
                 }};"
            ))
            .bind(("table", PAYMENT_TABLE))
            .bind(("ticket_table", USER_TICKET_TABLE))
            .bind(("addon_table", USER_ADDON_TABLE))
            .bind(("id", payment.id.clone()))
            .bind(("user_id", payment.user_id.clone()))
            .bind(("ticket_type", ticket_type))
            .bind(("baseline", ticket_type.map_or(0, TicketType::baseline)))
            .bind(("kind", kind))
            .bind(("quantity", quantity))
            .bind(("now", at))
            .await?
            .check()?
            .take::<Option<Outcome>>(0)?;
        if outcome != Some(Outcome::Done) {
            return Ok(None);
        }
        self.select_one(PAYMENT_TABLE, &payment.id).await
    }

    async fn delete_account(&self, user_id: &str) -> Result<DeletionReport> {
        let user: User = self
            .select_one(USER_TABLE, user_id)
            .await?
            .ok_or(Error::NotFound)?;

        // ! one DELETE per step, in order, all inside a single statement
        let mut steps = Vec::with_capacity(DeletionStep::ALL.len());
        for step in DeletionStep::ALL {
            steps.push(format!("LET $step_{} = ({});", step.position(), deletion(step)));
            steps.extend(self.injected_throw(step));
        }
        let counts = DeletionStep::ALL
            .iter()
            .map(|step| format!("array::len($step_{})", step.position()))
            .collect::<Vec<_>>()
            .join(", ");

        let deleted = self
            .sdb
            .query(format!(
                "RETURN {{
                     LET $owned = (SELECT VALUE meta::id(id) FROM type::table($survey_table) WHERE owner_id = $user_id);
                     {}
                     [{counts}]
                 }};",
                steps.join("\n")
            ))
            .bind(("user_id", user_id.to_string()))
            .bind(("survey_table", SURVEY_TABLE))
            .bind(("response_table", RESPONSE_TABLE))
            .bind(("question_table", QUESTION_TABLE))
            .bind(("grant_table", SURVEY_USER_TABLE))
            .bind(("invitation_table", INVITATION_TABLE))
            .bind(("ticket_table", USER_TICKET_TABLE))
            .bind(("addon_table", USER_ADDON_TABLE))
            .bind(("delivery_table", ANNOUNCEMENT_DELIVERY_TABLE))
            .bind(("discount_table", DISCOUNT_LINK_TABLE))
            .bind(("payment_table", PAYMENT_TABLE))
            .bind(("user_table", USER_TABLE))
            .await?
            .check()?
            .take::<Option<Vec<usize>>>(0)?
            .ok_or(Error::InternalServerError)?;

        Ok(DeletionReport {
            deleted: DeletionStep::ALL.into_iter().zip(deleted).collect(),
            avatar_file: user.avatar_file,
        })
    }
}
