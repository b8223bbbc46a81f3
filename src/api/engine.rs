//! Control API engine: authenticates, parses and applies remote requests.
//!
//! **Transport-decoupled**: the engine knows nothing about HTTP.  The
//! server adapter maps a route to an [`ApiRequest`], passes the presented
//! credential and body, and writes back the [`ApiResponse`].
//!
//! Every request passes the same gates, in order:
//!
//! 1. **Credential**: constant-time API key check.
//! 2. **Rate limiting**: token-bucket rejects bursts (via `burster`).
//! 3. **Body size**: oversized bodies are rejected before parsing.
//! 4. **Parse → resolve → validate → apply → persist.**
//!
//! Nothing reaches the control stores unless every earlier gate passed.

use core::fmt;

use log::{info, warn};
use serde::Serialize;

use crate::app::commands::{AppCommand, CommandOutcome, OverrideAction, OverrideRequest};
use crate::app::handle::ControlHandle;
use crate::app::ports::{ScheduleRepository, StorageError};
use crate::clock::Instant;
use crate::config::SystemConfig;
use crate::error::CommandError;

use super::auth::{ApiKey, RequestLimiter};
use super::codec::{Ack, CodecError, ErrorBody, StatusResponse, parse_control, parse_schedules};

/// One request, already routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRequest<'a> {
    Status,
    Control(&'a [u8]),
    GetSchedules,
    ReplaceSchedules(&'a [u8]),
    EmergencyReset,
}

impl<'a> ApiRequest<'a> {
    fn body(self) -> Option<&'a [u8]> {
        match self {
            Self::Control(body) | Self::ReplaceSchedules(body) => Some(body),
            _ => None,
        }
    }
}

/// Serialized reply: HTTP-style status code plus JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    fn ok(value: &impl Serialize) -> Result<Self, ApiError> {
        let body = serde_json::to_string(value).map_err(|_| ApiError::Internal)?;
        Ok(Self { status: 200, body })
    }
}

/// Everything that can go wrong at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized,
    RateLimited,
    PayloadTooLarge { limit: usize },
    BadRequest(CodecError),
    UnknownAppliance,
    Rejected(CommandError),
    EmergencyUnsafe,
    /// The change is in force but could not be persisted.
    Storage(StorageError),
    Internal,
}

impl ApiError {
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::UnknownAppliance => 404,
            Self::BadRequest(_) | Self::Rejected(_) => 400,
            Self::EmergencyUnsafe => 409,
            Self::PayloadTooLarge { .. } => 413,
            Self::RateLimited => 429,
            Self::Storage(_) | Self::Internal => 500,
        }
    }

    pub fn into_response(self) -> ApiResponse {
        let status = self.status_code();
        let message = self.to_string();
        let body = serde_json::to_string(&ErrorBody {
            error: &message,
            code: status,
        })
        .unwrap_or_default();
        ApiResponse { status, body }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::PayloadTooLarge { limit } => write!(f, "body exceeds {} bytes", limit),
            Self::BadRequest(e) => write!(f, "{}", e),
            Self::UnknownAppliance => write!(f, "unknown appliance"),
            Self::Rejected(e) => write!(f, "{}", e),
            Self::EmergencyUnsafe => write!(f, "conditions unsafe, emergency not reset"),
            Self::Storage(e) => write!(f, "applied but not persisted: {}", e),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(e: CodecError) -> Self {
        Self::BadRequest(e)
    }
}

impl From<CommandError> for ApiError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::EmergencyUnsafe => Self::EmergencyUnsafe,
            other => Self::Rejected(other),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ControlApi
// ───────────────────────────────────────────────────────────────

pub struct ControlApi {
    control: ControlHandle,
    key: ApiKey,
    limiter: RequestLimiter,
    max_body_bytes: usize,
}

impl ControlApi {
    pub fn new(control: ControlHandle, key: ApiKey, config: &SystemConfig) -> Self {
        Self {
            control,
            key,
            limiter: RequestLimiter::new(config.api_rate_per_sec, config.api_burst),
            max_body_bytes: config.max_body_bytes as usize,
        }
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Process one request; errors become their status-coded JSON body.
    pub fn respond(
        &mut self,
        credential: Option<&[u8]>,
        request: ApiRequest<'_>,
        now: Instant,
        repo: &impl ScheduleRepository,
    ) -> ApiResponse {
        self.handle(credential, request, now, repo)
            .unwrap_or_else(ApiError::into_response)
    }

    pub fn handle(
        &mut self,
        credential: Option<&[u8]>,
        request: ApiRequest<'_>,
        now: Instant,
        repo: &impl ScheduleRepository,
    ) -> Result<ApiResponse, ApiError> {
        if !credential.is_some_and(|c| self.key.verify(c)) {
            warn!("api: rejected request with bad or missing key");
            return Err(ApiError::Unauthorized);
        }
        if !self.limiter.check() {
            return Err(ApiError::RateLimited);
        }
        if request.body().is_some_and(|b| b.len() > self.max_body_bytes) {
            return Err(ApiError::PayloadTooLarge {
                limit: self.max_body_bytes,
            });
        }

        match request {
            ApiRequest::Status => {
                let snapshot = self.control.status();
                ApiResponse::ok(&StatusResponse::from_snapshot(
                    &snapshot,
                    self.control.stores().appliances(),
                ))
            }
            ApiRequest::Control(body) => self.apply_control(body, now),
            ApiRequest::GetSchedules => ApiResponse::ok(&self.control.schedule_record()),
            ApiRequest::ReplaceSchedules(body) => self.replace_schedules(body, now, repo),
            ApiRequest::EmergencyReset => {
                let detail = match self.control.execute(AppCommand::ResetEmergency, now) {
                    Ok(CommandOutcome::EmergencyNotLatched) => "emergency not latched",
                    Ok(_) => "emergency cleared",
                    Err(e) => {
                        warn!("api: emergency reset refused: {}", e);
                        return Err(e.into());
                    }
                };
                ApiResponse::ok(&Ack {
                    ok: true,
                    detail,
                    count: None,
                })
            }
        }
    }

    fn apply_control(&self, body: &[u8], now: Instant) -> Result<ApiResponse, ApiError> {
        let entries = parse_control(body)?;
        let appliances = self.control.stores().appliances();

        let mut requests = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(appliance) = appliances.lookup(&entry.name) else {
                warn!("api: control names unknown appliance '{}'", entry.name);
                return Err(ApiError::UnknownAppliance);
            };
            let action = match entry.action.forced_state() {
                Some(state) => OverrideAction::Force {
                    state,
                    timeout_minutes: entry.timeout_minutes,
                },
                None => OverrideAction::Release,
            };
            requests.push(OverrideRequest { appliance, action });
        }

        let outcome = self.control.execute(AppCommand::ApplyOverrides(requests), now)?;
        let count = match outcome {
            CommandOutcome::OverridesApplied { count } => count,
            _ => 0,
        };
        ApiResponse::ok(&Ack {
            ok: true,
            detail: "overrides applied",
            count: Some(count),
        })
    }

    fn replace_schedules(
        &self,
        body: &[u8],
        now: Instant,
        repo: &impl ScheduleRepository,
    ) -> Result<ApiResponse, ApiError> {
        let record = parse_schedules(body)?;
        let appliances = self.control.stores().appliances();

        let mut updates = Vec::with_capacity(record.len());
        for (name, intervals) in record {
            let Some(appliance) = appliances.lookup(&name) else {
                warn!("api: schedule names unknown appliance '{}'", name);
                return Err(ApiError::UnknownAppliance);
            };
            if updates.iter().any(|(id, _)| *id == appliance) {
                warn!("api: schedule names '{}' twice", appliances.name(appliance));
                return Err(CodecError::DuplicateAppliance.into());
            }
            updates.push((appliance, intervals));
        }

        let outcome = self.control.execute(AppCommand::ReplaceSchedules(updates), now)?;
        let count = match outcome {
            CommandOutcome::SchedulesReplaced { count } => count,
            _ => 0,
        };

        if let Err(e) = repo.save_schedules(&self.control.schedule_record()) {
            warn!("api: schedules applied but not persisted ({})", e);
            return Err(ApiError::Storage(e));
        }
        info!("api: {} schedule(s) replaced and persisted", count);
        ApiResponse::ok(&Ack {
            ok: true,
            detail: "schedules replaced",
            count: Some(count),
        })
    }
}
