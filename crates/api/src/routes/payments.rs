//! Payment signal endpoints: dispatch, checkout metadata, recovery.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use domain::{BillingAddress, FunnelDispatchResult, Metadata};
use orchestrator::RecoveryInfo;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    pub payment_intent_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddressRequest {
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub billing_address: BillingAddress,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRequest {
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub add_ons: Vec<String>,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub payment_intent_id: String,
    pub metadata: Metadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSecretResponse {
    pub client_secret: String,
}

fn required_intent_id(id: Option<String>) -> Result<String, ApiError> {
    id.map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("paymentIntentId is required".to_string()))
}

// -- Handlers --

/// POST /payments/dispatch: run post-payment actions for a succeeded intent.
#[tracing::instrument(skip(state, payload))]
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IntentRequest>, JsonRejection>,
) -> Result<Json<FunnelDispatchResult>, ApiError> {
    let Json(req) = payload?;
    let id = required_intent_id(req.payment_intent_id)?;
    Ok(Json(state.dispatcher.dispatch(&id).await?))
}

/// POST /payments/billing-address: merge the billing address into intent metadata.
#[tracing::instrument(skip(state, payload))]
pub async fn billing_address(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BillingAddressRequest>, JsonRejection>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let Json(req) = payload?;
    let id = required_intent_id(req.payment_intent_id)?;
    let metadata = state
        .checkout
        .update_billing_address(&id, &req.billing_address)
        .await?;

    Ok(Json(MetadataResponse {
        payment_intent_id: id,
        metadata,
    }))
}

/// POST /payments/cart: record the cart's add-ons in intent metadata.
#[tracing::instrument(skip(state, payload))]
pub async fn cart(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CartRequest>, JsonRejection>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let Json(req) = payload?;
    let id = required_intent_id(req.payment_intent_id)?;
    let metadata = state.checkout.update_cart(&id, &req.add_ons).await?;

    Ok(Json(MetadataResponse {
        payment_intent_id: id,
        metadata,
    }))
}

/// POST /payments/recovery: read back customer details and cart for a checkout.
#[tracing::instrument(skip(state, payload))]
pub async fn recovery(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IntentRequest>, JsonRejection>,
) -> Result<Json<RecoveryInfo>, ApiError> {
    let Json(req) = payload?;
    let id = required_intent_id(req.payment_intent_id)?;
    Ok(Json(state.checkout.recover(&id).await?))
}

/// GET /payments/{id}/client-secret: client secret of a known payment or setup intent.
#[tracing::instrument(skip(state))]
pub async fn client_secret(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClientSecretResponse>, ApiError> {
    let client_secret = state.checkout.client_secret(&id).await?;
    Ok(Json(ClientSecretResponse { client_secret }))
}
