use axum::extract::{Path, State};
use axum::Extension;
use serde_json::{json, Value};

use crate::gate::context::ValidatedJson;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/locales/:code - read one locale translation file
pub async fn locale_get(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Value> {
    let translations = state.data.read_locale(&code).await?;
    Ok(ApiResponse::success(translations))
}

/// PUT /api/locales/:code - overwrite one locale translation file
///
/// The payload arrives pre-validated from the gate's schema stage; the
/// locale code is containment-checked by the data store before any
/// filesystem operation.
pub async fn locale_put(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Extension(ValidatedJson(translations)): Extension<ValidatedJson>,
) -> ApiResult<Value> {
    state.data.write_locale(&code, &translations).await?;

    let entries = translations.as_object().map(|m| m.len()).unwrap_or(0);
    Ok(ApiResponse::success(json!({
        "saved": true,
        "locale": code,
        "entries": entries
    })))
}
