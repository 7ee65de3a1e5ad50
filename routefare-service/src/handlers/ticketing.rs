//! Ticketing HTTP handlers (spec §4.J / §6): `issueTicket`, `verifyTicket`,
//! lookups, revocation, and proof retrieval.

use axum::extract::{Path, State};
use axum::Json;
use routefare_domain::{MerkleBatchId, TicketId};
use routefare_ticketing::{
    issue_ticket, verify_ticket, MerkleProof, Ticket, TicketBody, TicketStatus, VerificationContext, VerificationResult,
};
use routefare_web::auth_extractor::AuthContext;
use routefare_web::{AppError, ClientIp, UserAgent};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Request body for `POST /v1/tickets/generate` — internal, normally
/// driven by the booking core's `booking.confirmed` handler rather than a
/// rider-facing call.
#[derive(Debug, Deserialize)]
pub struct GenerateTicketRequest {
    /// The signed ticket body to issue.
    pub body: TicketBody,
}

/// `POST /v1/tickets/generate` (admin/internal).
pub async fn generate_ticket(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<GenerateTicketRequest>,
) -> Result<Json<Ticket>, AppError> {
    auth.require_role(routefare_auth::Role::Admin)?;

    let ticket = issue_ticket(request.body, &state.ticket_signer, &state.ticket_batcher, state.ticket_store.as_ref())
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(Json(ticket))
}

/// `GET /v1/tickets/{id}`
pub async fn get_ticket(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(ticket_id): Path<TicketId>,
) -> Result<Json<Ticket>, AppError> {
    let ticket = state
        .ticket_store
        .find_ticket(ticket_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("ticket", ticket_id))?;
    Ok(Json(ticket))
}

/// Request body for `POST /v1/tickets/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyTicketRequest {
    /// Ticket being checked.
    pub ticket_id: TicketId,
    /// The driver presenting/expecting this ticket, if any.
    pub expected_driver_id: Option<routefare_domain::DriverId>,
}

/// `verifyTicket` response: the outcome plus the ticket, when found.
#[derive(Debug, Serialize)]
pub struct VerifyTicketResponse {
    /// `VALID`, `INVALID`, `EXPIRED`, `REVOKED`, or `NOT_FOUND`.
    pub result: VerificationResult,
    /// The ticket, if one was found (regardless of outcome).
    pub ticket: Option<Ticket>,
}

/// `POST /v1/tickets/verify`
pub async fn verify_ticket_handler(
    State(state): State<AppState>,
    auth: AuthContext,
    client_ip: ClientIp,
    user_agent: UserAgent,
    Json(request): Json<VerifyTicketRequest>,
) -> Result<Json<VerifyTicketResponse>, AppError> {
    let context = VerificationContext {
        verifier_id: auth.0.sub.to_string(),
        expected_driver_id: request.expected_driver_id,
        ip_address: client_ip.0.to_string(),
        user_agent: user_agent.0,
    };

    let grace = chrono::Duration::from_std(state.config.ticketing.verification_grace).unwrap_or(chrono::Duration::zero());
    let result = verify_ticket(
        request.ticket_id,
        &context,
        &state.ticket_signer.verifying_key(),
        grace,
        state.ticket_store.as_ref(),
        state.verification_log.as_ref(),
    )
    .await;

    let ticket = state.ticket_store.find_ticket(request.ticket_id).await.map_err(AppError::internal)?;
    Ok(Json(VerifyTicketResponse { result, ticket }))
}

/// `POST /v1/tickets/{id}/cancel` (admin-only): revoke a ticket.
pub async fn cancel_ticket(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(ticket_id): Path<TicketId>,
) -> Result<Json<Ticket>, AppError> {
    auth.require_role(routefare_auth::Role::Admin)?;

    let mut ticket = state
        .ticket_store
        .find_ticket(ticket_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("ticket", ticket_id))?;

    if ticket.status != TicketStatus::Revoked {
        ticket.status = TicketStatus::Revoked;
        ticket.revoked_at = Some(chrono::Utc::now());
        state.ticket_store.save_ticket(&ticket).await.map_err(AppError::internal)?;
    }

    Ok(Json(ticket))
}

/// `GET /v1/tickets/{id}/merkle-proof`
pub async fn get_merkle_proof(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(ticket_id): Path<TicketId>,
) -> Result<Json<MerkleProof>, AppError> {
    let ticket = state
        .ticket_store
        .find_ticket(ticket_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("ticket", ticket_id))?;

    let leaf_index = ticket.leaf_index.ok_or_else(|| AppError::not_found("merkle-proof", ticket_id))?;
    let batch_id: MerkleBatchId = ticket.merkle_batch_id;

    let proof = state
        .ticket_store
        .find_proof(batch_id, leaf_index)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("merkle-proof", ticket_id))?;

    Ok(Json(proof))
}
