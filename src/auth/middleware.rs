//! Request extractors for the authenticated admin and the client address

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::models::{Admin, Permission};
use crate::api::AppState;
use crate::error::{Error, Result};

/// Bearer token from the Authorization header, if well formed
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The active administrator the request's token belongs to.
///
/// Extraction fails with 401 when the token is missing, invalid, expired or
/// names an account that no longer exists, and with 403 when the account
/// has been deactivated.
#[derive(Debug, Clone)]
pub struct CurrentAdmin(pub Admin);

impl CurrentAdmin {
    /// Pass when the admin's role grants `permission`
    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.0.role.allows(permission) {
            return Ok(());
        }
        tracing::warn!(
            admin = %self.0.username,
            permission = permission.as_str(),
            "permission_denied"
        );
        Err(Error::Forbidden(format!(
            "Permission denied. Required: {}",
            permission
        )))
    }

    pub fn require_principal(&self) -> Result<()> {
        if self.0.role.is_principal() {
            return Ok(());
        }
        tracing::warn!(admin = %self.0.username, "principal_required");
        Err(Error::Forbidden("Principal access required".to_string()))
    }
}

impl std::ops::Deref for CurrentAdmin {
    type Target = Admin;

    fn deref(&self) -> &Admin {
        &self.0
    }
}

impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers).ok_or(Error::MissingToken)?;
        let claims = state.tokens.validate(token)?;
        let id = claims.subject_id()?;

        let admin = state
            .store
            .get_admin(id)
            .await?
            .ok_or(Error::InvalidToken)?;
        if !admin.is_active {
            return Err(Error::InactiveAccount);
        }
        Ok(CurrentAdmin(admin))
    }
}

/// Resolve the client address.
///
/// Proxy headers are only consulted when `trust_proxy` is set: the first
/// `X-Forwarded-For` entry wins, then `X-Real-IP`. Otherwise the socket peer
/// is used, or loopback when the server was not started with connect info.
pub fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> IpAddr {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        if let Some(ip) = forwarded {
            return ip;
        }

        let real = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        if let Some(ip) = real {
            return ip;
        }
    }

    connect_info
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Client address extractor, see [`client_ip`]
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        Ok(ClientIp(client_ip(
            &parts.headers,
            connect_info,
            state.config.server.trust_proxy,
        )))
    }
}
