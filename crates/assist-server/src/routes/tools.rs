//! Tool listing endpoint

use axum::{extract::State, routing::get, Json, Router};

use assist_core::ai::types::AiTool;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_tools))
}

/// The declarations sent to the model, sorted by name
async fn list_tools(State(state): State<AppState>) -> Json<Vec<AiTool>> {
    Json(state.tool_registry.describe().await)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use assist_core::Capability;

    use crate::test_support::*;

    #[tokio::test]
    async fn lists_builtin_tools_with_schemas() {
        let app = app(state_with(Capability::Unavailable("no key".to_string())).await);

        let response = app
            .oneshot(Request::get("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let tools: serde_json::Value =
            serde_json::from_str(&body_string(response.into_body()).await).unwrap();
        let tools = tools.as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "business_calculator");
        assert_eq!(tools[1]["name"], "staff_lookup");
        assert_eq!(tools[0]["input_schema"]["type"], "object");
    }
}
