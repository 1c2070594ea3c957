use crate::sync_logic::state::AppState;
use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use lib_sync::sheet::{columns, CreateOutcome, Fields};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyRequest {
    pub company_name: String,
    pub product_name: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/companies", post(create_company))
        .with_state(state)
}

pub async fn run(state: AppState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Front door listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            log::info!("Front door shutting down.");
        })
        .await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn create_company(
    State(state): State<AppState>,
    payload: Result<Json<CompanyRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let company = request.company_name.trim();
    if company.is_empty() {
        return bad_request("companyName is required".to_string());
    }

    match onboard(&state, company, request.product_name.trim()).await {
        Ok(full_name) => (
            StatusCode::OK,
            Json(json!({ "message": "提交成功", "fullName": full_name })),
        ),
        Err(message) => {
            log::error!("Onboarding '{}' failed: {}", company, message);
            bad_request(message)
        }
    }
}

fn bad_request(message: String) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

// Creates the row with the next serial, then tells the support group.
async fn onboard(state: &AppState, company: &str, product: &str) -> Result<String, String> {
    let outcome = state
        .customers
        .create_with_next_serial(company, |serial| {
            let mut fields = Fields::new();
            fields.insert(columns::FINAL_NAME.to_string(), json!(format!("{}-{}", serial, company)));
            fields.insert(columns::FULL_NAME.to_string(), json!(company));
            fields
        })
        .await
        .map_err(|e| e.to_string())?;

    let full_name = match outcome {
        CreateOutcome::Created(created) => format!("{}-{}", created.serial, company),
        CreateOutcome::AlreadyExists(row) => {
            return Err(format!(
                "company '{}' already exists with serial {}",
                company, row.serial
            ));
        }
    };
    log::info!("Onboarded '{}' as {}", company, full_name);

    let content = format!("{}-{}-support", full_name, product);
    state
        .group_notifier
        .send_text(&content, &state.config.reminder_mobiles())
        .await
        .map_err(|e| format!("Call wechat robot webhook failed: {}", e))?;
    Ok(full_name)
}
