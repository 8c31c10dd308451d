use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::domain::{AgeGroup, Feature};

pub mod endpoints;

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupReq {
    pub email: String,
    pub password: String,
    pub username: String,
    pub role: Role,
    pub age_group: Option<AgeGroup>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResp {
    pub token: String,
}

// Profiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDto {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub age_group: Option<AgeGroup>,
    pub avatar_url: Option<String>,
    pub created_at: String, // RFC3339 UTC
    pub updated_at: String, // RFC3339 UTC
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdateReq {
    pub username: Option<String>,
    pub age_group: Option<AgeGroup>,
    pub avatar_url: Option<String>,
}

// Child provisioning
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChildReq {
    pub username: String,
    pub age_group: AgeGroup,
    /// Must match the authenticated caller.
    pub parent_id: String,
    /// Resume token for a retried request: the identity id returned by a
    /// previous, partially completed call.
    pub child_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChildResp {
    pub child_profile: ProfileDto,
}

// Credential rotation
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RotateCredentialsReq {
    pub username: Option<String>,
    pub age_group: Option<AgeGroup>,
}

/// Returned exactly once; the server keeps no plaintext copy.
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialsDto {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RotateCredentialsResp {
    pub credentials: CredentialsDto,
}

// Feature access
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccessDto {
    pub tutors: bool,
    pub habit_tracker: bool,
    pub journal: bool,
    pub tasks: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetAccessReq {
    pub feature: Feature,
    pub allowed: bool,
}

// Parent provider key
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyReq {
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyDto {
    pub api_key: Option<String>,
}

// Tutor proxy
#[derive(Debug, Serialize, Deserialize)]
pub struct TutorReq {
    pub message: String,
    pub subject: String,
    pub age_group: Option<AgeGroup>,
    /// Honored for parent callers only; ignored for children, whose key is
    /// always resolved server-side through the family link.
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TutorResp {
    pub response: String,
}
