//! OTP sign-in, creator signup, and account deletion flows.

use chrono::{Datelike, NaiveDate};
use shared::protocol::{AuthTokens, DeleteAccountRequest, RegisterCreatorRequest, SignupOtpRequest};
use thiserror::Error;
use tracing::info;

use crate::{
    error::{ClientError, ClientResult},
    session::Session,
    CreatorApi,
};

pub const MINIMUM_CREATOR_AGE: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignupError {
    #[error("Name is required")]
    MissingName,
    #[error("A valid email is required")]
    InvalidEmail,
    #[error("Display name is required")]
    MissingDisplayName,
    #[error("Date of birth is required")]
    MissingDob,
    #[error("Date of birth must be YYYY-MM-DD")]
    InvalidDob,
    #[error("Creators must be at least 18 years old")]
    Underage { age: u32 },
    #[error("Accept the terms to continue")]
    TermsNotAccepted,
    #[error("Enter the OTP sent to your email")]
    MissingOtp,
}

impl From<SignupError> for ClientError {
    fn from(value: SignupError) -> Self {
        ClientError::validation(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    /// `YYYY-MM-DD`.
    pub dob: String,
    pub display: String,
    pub mobile_number: String,
    pub address: String,
    pub terms: bool,
    pub youtube_channel: String,
    pub bio: String,
    /// Comma-separated, as typed.
    pub categories: String,
    pub email_otp: String,
}

impl SignupForm {
    /// Validates the form and builds the registration payload.
    pub fn to_request(&self, today: NaiveDate) -> Result<RegisterCreatorRequest, SignupError> {
        if self.name.trim().is_empty() {
            return Err(SignupError::MissingName);
        }
        if !looks_like_email(&self.email) {
            return Err(SignupError::InvalidEmail);
        }
        if self.display.trim().is_empty() {
            return Err(SignupError::MissingDisplayName);
        }
        if !self.terms {
            return Err(SignupError::TermsNotAccepted);
        }
        let dob = self.dob.trim();
        if dob.is_empty() {
            return Err(SignupError::MissingDob);
        }
        let born =
            NaiveDate::parse_from_str(dob, "%Y-%m-%d").map_err(|_| SignupError::InvalidDob)?;
        let age = age_on(born, today).ok_or(SignupError::InvalidDob)?;
        if age < MINIMUM_CREATOR_AGE {
            return Err(SignupError::Underage { age });
        }
        if self.email_otp.trim().is_empty() {
            return Err(SignupError::MissingOtp);
        }

        Ok(RegisterCreatorRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            dob: dob.to_string(),
            display: self.display.trim().to_string(),
            mobile_number: self.mobile_number.trim().to_string(),
            address: self.address.trim().to_string(),
            terms: self.terms,
            youtube_channel: self.youtube_channel.trim().to_string(),
            bio: self.bio.trim().to_string(),
            categories: split_categories(&self.categories),
            email_otp: self.email_otp.trim().to_string(),
        })
    }
}

/// Whole years between `born` and `today`; `None` for dates in the future.
pub fn age_on(born: NaiveDate, today: NaiveDate) -> Option<u32> {
    if born > today {
        return None;
    }
    let mut age = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

pub fn split_categories(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .map(str::to_string)
        .collect()
}

fn looks_like_email(raw: &str) -> bool {
    let raw = raw.trim();
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

pub async fn request_login_otp(api: &dyn CreatorApi, email: &str) -> ClientResult<()> {
    if !looks_like_email(email) {
        return Err(SignupError::InvalidEmail.into());
    }
    api.send_otp(email).await
}

/// Verifies the OTP and persists the returned tokens in the session.
pub async fn sign_in(
    api: &dyn CreatorApi,
    session: &Session,
    email: &str,
    otp: &str,
) -> ClientResult<AuthTokens> {
    if otp.trim().is_empty() {
        return Err(SignupError::MissingOtp.into());
    }
    let tokens = api.login(email, otp).await?;
    session.sign_in(&tokens).await?;
    Ok(tokens)
}

pub async fn sign_out(session: &Session) -> ClientResult<()> {
    session.sign_out().await
}

pub async fn request_signup_otp(
    api: &dyn CreatorApi,
    email: &str,
    display: &str,
) -> ClientResult<()> {
    if !looks_like_email(email) {
        return Err(SignupError::InvalidEmail.into());
    }
    api.send_signup_otp(&SignupOtpRequest {
        useremail: email.trim().to_string(),
        display: display.trim().to_string(),
    })
    .await
}

pub async fn register_creator(
    api: &dyn CreatorApi,
    form: &SignupForm,
    today: NaiveDate,
) -> ClientResult<()> {
    let request = form.to_request(today)?;
    api.register_creator(&request).await
}

pub async fn request_account_deletion(
    api: &dyn CreatorApi,
    email: &str,
    otp: &str,
) -> ClientResult<()> {
    if otp.trim().is_empty() {
        return Err(SignupError::MissingOtp.into());
    }
    api.request_account_deletion(&DeleteAccountRequest {
        useremail: email.trim().to_string(),
        otp: otp.trim().to_string(),
    })
    .await?;
    info!("account deletion submitted");
    Ok(())
}
