//! Translation endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use dweeplingo_core::{TranslationRequest, TranslationResponse};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Validate on the async side, then decode on the blocking pool. Waiting for
/// a concurrency slot and decoding share one deadline.
pub async fn translate(
    State(state): State<AppState>,
    payload: Result<Json<TranslationRequest>, JsonRejection>,
) -> Result<Json<TranslationResponse>, ApiError> {
    let Json(req) = payload.inspect_err(|e| debug!("Rejected body: {}", e))?;

    // Invalid or unavailable requests never take a slot.
    state.registry.route(&req).map_err(|e| {
        debug!("Rejected request: {}", e);
        ApiError::from(e)
    })?;

    info!(
        "Translation request: {} chars, {} -> {}",
        req.text.chars().count(),
        req.src_lang,
        req.tgt_lang
    );

    let registry = state.registry.clone();
    let limiter = state.limiter.clone();
    let work = async move {
        let permit = limiter
            .acquire_owned()
            .await
            .map_err(|e| ApiError::internal(format!("Translation failed: {}", e)))?;

        tokio::task::spawn_blocking(move || {
            // Held until the decode finishes, even if the request times out first.
            let _permit = permit;
            registry.translate(&req)
        })
        .await
        .map_err(|e| ApiError::internal(format!("Translation failed: {}", e)))?
        .map_err(ApiError::from)
    };

    match tokio::time::timeout(state.request_timeout, work).await {
        Ok(result) => result.map(Json),
        Err(_) => {
            warn!(
                "Translation timed out after {}s",
                state.request_timeout.as_secs()
            );
            Err(ApiError::internal(format!(
                "Translation failed: timed out after {}s",
                state.request_timeout.as_secs()
            )))
        }
    }
}
