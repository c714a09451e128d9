use axum::extract::State;
use axum::Extension;
use serde_json::{json, Value};

use crate::gate::context::ValidatedJson;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/dyes - read the dye catalog file
pub async fn dyes_get(State(state): State<AppState>) -> ApiResult<Value> {
    let catalog = state.data.read_dyes().await?;
    Ok(ApiResponse::success(catalog))
}

/// PUT /api/dyes - overwrite the dye catalog file
///
/// The payload arrives pre-validated from the gate's schema stage.
pub async fn dyes_put(
    State(state): State<AppState>,
    Extension(ValidatedJson(catalog)): Extension<ValidatedJson>,
) -> ApiResult<Value> {
    state.data.write_dyes(&catalog).await?;

    let records = catalog.as_array().map(Vec::len).unwrap_or(0);
    Ok(ApiResponse::success(json!({
        "saved": true,
        "records": records
    })))
}
