//! Typed backend endpoint calls.
//!
//! Each login-shaped call returns an [`Acknowledgement`]: the user the backend
//! confirmed plus the session reference it issued. A 2xx response that
//! carries no user is not an acknowledgement and surfaces as a decode error.

use serde_json::Value;

use super::transport::{ApiRequest, ApiResponse, Transport};
use super::types::{BackendUser, DirectLoginBody, ExternalLoginBody, Registration, UserEnvelope};
use crate::error::RawError;
use crate::identity::ExternalCredential;

pub const LOGIN_DIRECT_PATH: &str = "/api/login/direct";
pub const LOGIN_EXTERNAL_PATH: &str = "/api/login";
pub const REGISTER_PATH: &str = "/api/register";
pub const LOGOUT_PATH: &str = "/api/logout";

/// Backend confirmation of a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub user: BackendUser,
    pub session_ref: Option<String>,
}

/// `POST /api/login/direct`: email/password straight to the backend.
pub async fn login_direct(transport: &dyn Transport, email: &str, password: &str) -> Result<Acknowledgement, RawError> {
    let body = to_json(&DirectLoginBody { email, password })?;
    let resp = transport.send(ApiRequest::post(LOGIN_DIRECT_PATH, body)).await?;
    acknowledgement(resp)
}

/// `POST /api/login`: exchange a provider credential for a backend session.
pub async fn login_external(
    transport: &dyn Transport,
    credential: &ExternalCredential,
) -> Result<Acknowledgement, RawError> {
    let body = to_json(&ExternalLoginBody {
        uid: &credential.uid,
        email: credential.email.as_deref(),
        display_name: credential.display_name.as_deref(),
        id_token: &credential.id_token,
    })?;
    let resp = transport.send(ApiRequest::post(LOGIN_EXTERNAL_PATH, body)).await?;
    acknowledgement(resp)
}

/// `POST /api/register`.
pub async fn register(transport: &dyn Transport, registration: &Registration) -> Result<Acknowledgement, RawError> {
    let body = to_json(registration)?;
    let resp = transport.send(ApiRequest::post(REGISTER_PATH, body)).await?;
    acknowledgement(resp)
}

/// `POST /api/logout`.
pub async fn logout(transport: &dyn Transport) -> Result<(), RawError> {
    transport.send(ApiRequest::post_empty(LOGOUT_PATH)).await?;
    Ok(())
}

/// `GET {path}` returning the decoded JSON body.
pub async fn get_json(transport: &dyn Transport, path: &str) -> Result<Value, RawError> {
    let resp = transport.send(ApiRequest::get(path)).await?;
    Ok(resp.body)
}

fn acknowledgement(resp: ApiResponse) -> Result<Acknowledgement, RawError> {
    let envelope: UserEnvelope = serde_json::from_value(resp.body).map_err(|e| RawError::Decode(e.to_string()))?;
    let user = envelope
        .user
        .ok_or_else(|| RawError::Decode("response carried no user".to_owned()))?;
    Ok(Acknowledgement { user, session_ref: resp.session_ref })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, RawError> {
    serde_json::to_value(value).map_err(|e| RawError::Decode(e.to_string()))
}
