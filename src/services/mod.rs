//! Service layer for webhub.
//!
//! Contains the business logic behind the HTTP handlers:
//! - Accounts (signup, login sessions, verification, passwords)
//! - Malaria (posts and their revisions)
//! - Mailer (outgoing account mail)
//! - Password (Argon2 hashing)

mod accounts;
mod mailer;
mod malaria;
pub mod password;

pub use accounts::{AccountService, AccountSettings, Profile, ProfileUpdate, Signup};
pub use mailer::{LogMailer, Mail, Mailer, MemoryMailer};
pub use malaria::MalariaService;
