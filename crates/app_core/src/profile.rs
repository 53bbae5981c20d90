//! Read-only derivation behind the profile screen.

use std::collections::HashMap;

use shared::models::{Timezone, UserDetails};

/// Login suffix marking accounts created from a phone number.
pub const SMS_LOGIN_DOMAIN: &str = "@sms.ledger.app";

/// Pronouns stored with this prefix refer to a predefined, localizable set;
/// anything else is free text the user typed.
pub const PREDEFINED_PRONOUNS_PREFIX: &str = "__predefined_";

const AUTOMATED_ACCOUNT_LOGINS: &[&str] = &["concierge@ledger.app", "receipts@ledger.app"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactMethod {
    Phone { number: String },
    Email { address: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pronouns {
    None,
    Predefined { key: String },
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileViewModel {
    pub display_name: String,
    pub avatar: String,
    pub contact: Option<ContactMethod>,
    pub pronouns: Pronouns,
    pub timezone: Option<Timezone>,
    pub show_back_button: bool,
    pub show_local_time: bool,
    pub is_current_user: bool,
    pub can_message: bool,
}

/// Builds the profile screen model, or `None` while the details for this
/// account have not arrived yet (the screen shows a loading indicator, not an
/// error).
pub fn derive_profile(
    account_id: &str,
    report_id: Option<&str>,
    personal_details: &HashMap<String, UserDetails>,
    login_list: &[String],
) -> Option<ProfileViewModel> {
    let details = personal_details.get(account_id)?;

    let is_sms = !details.login.is_empty() && is_sms_login(&details.login);
    let contact = if details.login.is_empty() {
        None
    } else if is_sms {
        Some(ContactMethod::Phone {
            number: phone_number(details),
        })
    } else {
        Some(ContactMethod::Email {
            address: details.login.clone(),
        })
    };

    let pronouns = if details.pronouns.is_empty() {
        Pronouns::None
    } else if let Some(key) = details.pronouns.strip_prefix(PREDEFINED_PRONOUNS_PREFIX) {
        Pronouns::Predefined {
            key: key.to_string(),
        }
    } else {
        Pronouns::Custom(details.pronouns.clone())
    };

    let is_current_user = login_list.iter().any(|login| *login == details.login);

    Some(ProfileViewModel {
        display_name: details.display_name.clone(),
        avatar: details.avatar.clone(),
        contact,
        pronouns,
        timezone: details.timezone.clone(),
        show_back_button: report_id.is_some_and(|id| !id.is_empty()),
        show_local_time: details.timezone.is_some() && !is_automated_account(&details.login),
        is_current_user,
        can_message: !is_current_user,
    })
}

/// Accounts without a display name carry their phone number there; otherwise
/// the number comes from the SMS login itself.
pub fn phone_number(details: &UserDetails) -> String {
    if let Some(e164) = parse_possible_phone(&details.display_name) {
        return e164;
    }
    if details.login.is_empty() {
        String::new()
    } else {
        remove_sms_domain(&details.login)
    }
}

pub fn is_sms_login(login: &str) -> bool {
    login.to_ascii_lowercase().ends_with(SMS_LOGIN_DOMAIN)
}

pub fn remove_sms_domain(login: &str) -> String {
    if is_sms_login(login) {
        login[..login.len() - SMS_LOGIN_DOMAIN.len()].to_string()
    } else {
        login.to_string()
    }
}

pub fn is_automated_account(login: &str) -> bool {
    AUTOMATED_ACCOUNT_LOGINS
        .iter()
        .any(|automated| login.eq_ignore_ascii_case(automated))
}

fn parse_possible_phone(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.len() < 4 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("+{digits}"))
}
