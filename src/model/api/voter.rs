use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use mongodb::bson::{doc, Document};
use phonenumber::{Mode, PhoneNumber};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{id::ApiId, vote::VoteDescription},
    common::password::{self, PasswordHash, MIN_PASSWORD_LENGTH},
    db::voter::{NewVoter, Voter},
};

/// Parse a mobile number, returning it in E.164 format.
pub fn normalise_mobile(mobile: &str) -> Result<String> {
    let number = mobile
        .trim()
        .parse::<PhoneNumber>()
        .map_err(|_| Error::bad_request(format!("Invalid mobile number: {mobile}")))?;
    Ok(number.format().mode(Mode::E164).to_string())
}

/// A voter registration, as submitted by the voter.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Mobile number in international format.
    pub mobile: String,
    pub national_id: String,
    pub date_of_birth: NaiveDate,
}

impl TryFrom<VoterRegistration> for NewVoter {
    type Error = Error;

    /// Validate the registration and hash the password.
    fn try_from(registration: VoterRegistration) -> Result<Self> {
        let username = registration.username.trim();
        let email = registration.email.trim();
        let national_id = registration.national_id.trim();
        if username.is_empty()
            || email.is_empty()
            || registration.password.is_empty()
            || registration.mobile.trim().is_empty()
            || national_id.is_empty()
        {
            return Err(Error::bad_request("Please provide all required fields."));
        }
        if !email.contains('@') {
            return Err(Error::bad_request("Invalid email address"));
        }
        if !password::is_acceptable(&registration.password) {
            return Err(Error::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let date_of_birth = registration
            .date_of_birth
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::bad_request("Invalid date of birth"))?;

        Ok(Self {
            username: username.to_string(),
            email: email.to_string(),
            mobile: normalise_mobile(&registration.mobile)?,
            national_id: national_id.to_string(),
            date_of_birth: Utc.from_utc_datetime(&date_of_birth),
            password_hash: PasswordHash::new(&registration.password)?,
            votes: Vec::new(),
        })
    }
}

/// Raw voter credentials, received from a user.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterCredentials {
    pub username: String,
    pub password: String,
}

/// A voter's own profile, without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterProfile {
    pub id: ApiId,
    pub username: String,
    pub email: String,
    pub mobile: String,
    pub national_id: String,
    pub date_of_birth: DateTime<Utc>,
    pub votes: Vec<VoteDescription>,
}

impl VoterProfile {
    pub fn new(voter: Voter, votes: Vec<VoteDescription>) -> Self {
        Self {
            id: voter.id.into(),
            username: voter.voter.username,
            email: voter.voter.email,
            mobile: voter.voter.mobile,
            national_id: voter.voter.national_id,
            date_of_birth: voter.voter.date_of_birth,
            votes,
        }
    }
}

/// Changes a voter may make to their own contact details.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub mobile: Option<String>,
}

impl ProfileUpdate {
    /// Build the `$set` update for this change, validating each field.
    pub fn to_update(&self) -> Result<Document> {
        let mut set = Document::new();
        if let Some(email) = &self.email {
            let email = email.trim();
            if !email.contains('@') {
                return Err(Error::bad_request("Invalid email address"));
            }
            set.insert("email", email);
        }
        if let Some(mobile) = &self.mobile {
            set.insert("mobile", normalise_mobile(mobile)?);
        }
        if set.is_empty() {
            return Err(Error::bad_request("Nothing to update"));
        }
        Ok(doc! { "$set": set })
    }
}

/// Whether a voter has voted in a particular election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStatus {
    pub has_voted: bool,
}

/// A voter as listed for admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterSummary {
    pub id: ApiId,
    pub username: String,
    pub email: String,
    pub national_id: String,
    pub has_voted: bool,
    pub votes: Vec<VoteDescription>,
}

impl VoterSummary {
    pub fn new(voter: Voter, votes: Vec<VoteDescription>) -> Self {
        Self {
            id: voter.id.into(),
            has_voted: !voter.votes.is_empty(),
            username: voter.voter.username,
            email: voter.voter.email,
            national_id: voter.voter.national_id,
            votes,
        }
    }
}
