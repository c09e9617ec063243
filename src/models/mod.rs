pub mod account;
pub mod announcement;
pub mod billing;
pub mod discount;
pub mod invitation;
pub mod permission;
pub mod question;
pub mod response;
pub mod survey;
pub mod ticket;
pub mod user;
