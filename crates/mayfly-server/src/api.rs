//! HTTP admin API.
//!
//! CRUD for hosts, groups and templates over the repository's session
//! contract, plus `GET /boot/{mac}` so iPXE can chainload its script over
//! HTTP instead of TFTP.
//!
//! PUT is an upsert: create, falling back to update when the key already
//! exists. Repository error kinds map onto status codes: a missing referent
//! on a write is 424 (the request was fine, its dependency is absent), a
//! missing key on a read is 404, anything else is 500.

use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use mayfly_ipxe::IpxeError;
use mayfly_store::entity::{Group, Host, Template};
use mayfly_store::StoreError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+(?:[-_][a-zA-Z0-9]+)*$").expect("hardwired pattern"));

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/hosts", get(list_hosts).put(put_host))
        .route("/hosts/{id}", get(get_host))
        .route("/groups", get(list_groups).put(put_group))
        .route("/groups/{id}", get(get_group))
        .route("/templates", get(list_templates).put(put_template))
        .route("/templates/{id}", get(get_template))
        .route("/boot/{mac}", get(boot_script))
        .with_state(state)
}

// === Error translation ===

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

fn error_body(err: &StoreError) -> ErrorBody {
    let code = match err {
        StoreError::EmptyKey { .. } => "EmptyKey",
        StoreError::KeyExists { .. } => "KeyExists",
        StoreError::KeyNotFound { .. } => "KeyNotFound",
        StoreError::ReadOnly => "ReadOnlyViolation",
        StoreError::AlreadyClosed => "AlreadyClosed",
        StoreError::InvalidConfig(_) => "InvalidConfig",
    };
    ErrorBody {
        code,
        message: err.to_string(),
    }
}

fn read_failure(err: StoreError) -> Response {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(error_body(&err))).into_response()
}

fn write_failure(err: StoreError) -> Response {
    // A missing referent (group or template the payload points at) is the
    // caller's dependency problem, not an internal fault.
    let status = if err.is_not_found() {
        StatusCode::FAILED_DEPENDENCY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(error_body(&err))).into_response()
}

fn invalid(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            code: "InvalidPayload",
            message: message.into(),
        }),
    )
        .into_response()
}

fn validate_id(id: &str) -> Result<(), Response> {
    if ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(invalid(format!(
            "id must match pattern {}",
            ID_PATTERN.as_str()
        )))
    }
}

// === Hosts ===

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostPayload {
    pub id: String,
    pub hardware_addr: Vec<String>,
    pub trap_mode: bool,
    pub vars: HashMap<String, String>,
    pub group_id: String,
    pub template_id: String,
}

impl HostPayload {
    fn validate(&self) -> Result<(), Response> {
        validate_id(&self.id)?;
        if self.hardware_addr.is_empty() {
            return Err(invalid("hardwareAddr must not be empty"));
        }
        Ok(())
    }

    fn to_entity(&self) -> Host {
        Host {
            id: self.id.clone(),
            hardware_addr: self.hardware_addr.clone(),
            trap_mode: self.trap_mode,
            trap_triggered: false,
            vars: self.vars.clone(),
            group_id: self.group_id.clone(),
            template_id: self.template_id.clone(),
        }
    }

    fn from_entity(host: &Host) -> Self {
        Self {
            id: host.id.clone(),
            hardware_addr: host.hardware_addr.clone(),
            trap_mode: host.trap_mode,
            vars: host.vars.clone(),
            group_id: host.group_id.clone(),
            template_id: host.template_id.clone(),
        }
    }
}

async fn get_host(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.repository.read(|s| s.hosts().get(&id)).await {
        Ok(host) => Json(HostPayload::from_entity(&host)).into_response(),
        Err(err) => read_failure(err),
    }
}

async fn list_hosts(State(state): State<AppState>) -> Response {
    match state.repository.read(|s| s.hosts().list()).await {
        Ok(hosts) => {
            let payloads: Vec<HostPayload> = hosts.iter().map(HostPayload::from_entity).collect();
            Json(payloads).into_response()
        }
        Err(err) => read_failure(err),
    }
}

async fn put_host(State(state): State<AppState>, Json(payload): Json<HostPayload>) -> Response {
    if let Err(response) = payload.validate() {
        return response;
    }
    let result = state
        .repository
        .write(|s| {
            let entity = payload.to_entity();
            match s.hosts().create(entity.clone()) {
                Err(err) if err.is_key_exists() => {
                    // Upsert; a re-registered host keeps its trap state.
                    let mut entity = entity;
                    if let Ok(stored) = s.hosts().get(&entity.id) {
                        entity.trap_triggered = stored.trap_triggered;
                    }
                    s.hosts().update(entity)
                }
                other => other,
            }
        })
        .await;
    match result {
        Ok(()) => (StatusCode::CREATED, Json(payload)).into_response(),
        Err(err) => write_failure(err),
    }
}

// === Groups ===

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupPayload {
    pub id: String,
    pub vars: HashMap<String, String>,
    pub parent_id: String,
    pub template_id: String,
}

impl GroupPayload {
    fn to_entity(&self) -> Group {
        Group {
            id: self.id.clone(),
            vars: self.vars.clone(),
            parent_id: self.parent_id.clone(),
            template_id: self.template_id.clone(),
            hosts_ids: Vec::new(),
            group_ids: Vec::new(),
        }
    }
}

async fn get_group(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.repository.read(|s| s.groups().get(&id)).await {
        Ok(group) => Json(group).into_response(),
        Err(err) => read_failure(err),
    }
}

async fn list_groups(State(state): State<AppState>) -> Response {
    match state.repository.read(|s| s.groups().list()).await {
        Ok(groups) => Json(groups).into_response(),
        Err(err) => read_failure(err),
    }
}

async fn put_group(State(state): State<AppState>, Json(payload): Json<GroupPayload>) -> Response {
    if let Err(response) = validate_id(&payload.id) {
        return response;
    }
    let result = state
        .repository
        .write(|s| {
            let entity = payload.to_entity();
            match s.groups().create(entity.clone()) {
                Err(err) if err.is_key_exists() => {
                    // The back-reference lists are repository-maintained;
                    // an upsert must not wipe them.
                    let mut entity = entity;
                    let stored = s.groups().get(&entity.id)?;
                    entity.hosts_ids = stored.hosts_ids;
                    entity.group_ids = stored.group_ids;
                    s.groups().update(entity)
                }
                other => other,
            }
        })
        .await;
    match result {
        Ok(()) => (StatusCode::CREATED, Json(payload)).into_response(),
        Err(err) => write_failure(err),
    }
}

// === Templates ===

async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.repository.read(|s| s.templates().get(&id)).await {
        Ok(template) => Json(template).into_response(),
        Err(err) => read_failure(err),
    }
}

async fn list_templates(State(state): State<AppState>) -> Response {
    match state.repository.read(|s| s.templates().list()).await {
        Ok(templates) => Json(templates).into_response(),
        Err(err) => read_failure(err),
    }
}

async fn put_template(
    State(state): State<AppState>,
    Json(payload): Json<Template>,
) -> Response {
    if let Err(response) = validate_id(&payload.id) {
        return response;
    }
    let result = state
        .repository
        .write(|s| match s.templates().create(payload.clone()) {
            Err(err) if err.is_key_exists() => s.templates().update(payload.clone()),
            other => other,
        })
        .await;
    match result {
        Ok(()) => (StatusCode::CREATED, Json(payload)).into_response(),
        Err(err) => write_failure(err),
    }
}

// === Boot ===

/// Render the boot script for a hardware address, for HTTP chainloading.
async fn boot_script(State(state): State<AppState>, Path(mac): Path<String>) -> Response {
    match mayfly_ipxe::render_for_mac(&state.repository, &mac).await {
        Ok(script) => script.into_response(),
        Err(IpxeError::HostNotFound(_)) => {
            (StatusCode::NOT_FOUND, "no host for that hardware address").into_response()
        }
        Err(err) => {
            warn!(mac = %mac, error = %err, "boot script rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
