use crate::models::{
    billing::{Plan, Product},
    ticket::{AddonKind, TicketType},
};

pub mod db_const {
    pub const USER_TABLE: &str = "users";
    pub const SURVEY_TABLE: &str = "surveys";
    pub const SURVEY_USER_TABLE: &str = "survey_users";
    pub const QUESTION_TABLE: &str = "questions";
    pub const RESPONSE_TABLE: &str = "responses";
    pub const INVITATION_TABLE: &str = "invitations";
    pub const USER_TICKET_TABLE: &str = "user_tickets";
    pub const USER_ADDON_TABLE: &str = "user_addons";
    pub const ANNOUNCEMENT_TABLE: &str = "announcements";
    pub const ANNOUNCEMENT_DELIVERY_TABLE: &str = "announcement_deliveries";
    pub const DISCOUNT_LINK_TABLE: &str = "discount_links";
    pub const PAYMENT_TABLE: &str = "payments";
}

pub const FREE_TICKET_ALLOTMENT: i64 = 3;
pub const INVITATION_TTL_DAYS: i64 = 7;
pub const SHARE_URL_LEN: usize = 12;
pub const SHARE_URL_ATTEMPTS: usize = 3;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

pub const SESSION_COOKIE: &str = "session";
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

pub static PLANS: [Plan; 4] = [
    Plan {
        id: "basic-5",
        name: "5 Basic surveys",
        product: Product::Tickets {
            ticket_type: TicketType::Basic,
            quantity: 5,
        },
        price_cents: 900,
    },
    Plan {
        id: "premium-10",
        name: "10 Premium surveys",
        product: Product::Tickets {
            ticket_type: TicketType::Premium,
            quantity: 10,
        },
        price_cents: 2900,
    },
    Plan {
        id: "storage-5gb",
        name: "5 GB response storage",
        product: Product::Addon {
            kind: AddonKind::Storage,
            quantity: 5,
        },
        price_cents: 500,
    },
    Plan {
        id: "retention-12m",
        name: "12 months extra retention",
        product: Product::Addon {
            kind: AddonKind::Retention,
            quantity: 12,
        },
        price_cents: 700,
    },
];

pub fn find_plan(plan_id: &str) -> Option<&'static Plan> {
    PLANS.iter().find(|plan| plan.id == plan_id)
}
