//! HTTP API surface.
//!
//! Four routes: `POST /verify` for batch report verification,
//! `POST /decode` for proof payload inspection, `POST /decodeReport`
//! for recovering and fully verifying one proof/report pair, and
//! `GET /info` describing the measurement targets this instance
//! enforces. Verification rejections are part of the protocol and come
//! back as 200 responses carrying an error message; only malformed
//! requests and unavailable signer sessions map to HTTP error codes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use oracle_verify_core::error::VerifyError;
use oracle_verify_core::measurement::{PcrValuesInfo, UniqueIdInfo};
use oracle_verify_runtime::proof::{AttestationResponse, DecodedProofData};
use oracle_verify_runtime::report::FormattedReport;
use oracle_verify_runtime::verifier::{ReportSubmission, Verifier};

/// Shared request-handler state. Built once at startup, read-only
/// afterwards.
pub struct AppState {
    pub verifier: Verifier,
    pub live_check_program: String,
    pub start_time: DateTime<Utc>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/verify", post(verify_reports))
        .route("/decode", post(decode_proof))
        .route("/decodeReport", post(decode_report))
        .route("/info", get(info))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct VerifyReportsRequest {
    pub reports: Vec<AttestationResponse>,
}

#[derive(Debug, Serialize)]
pub struct VerifyReportsResponse {
    pub success: bool,
    #[serde(rename = "validReports")]
    pub valid_reports: Vec<usize>,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

async fn verify_reports(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyReportsRequest>,
) -> Response {
    if request.reports.is_empty() {
        tracing::warn!("no reports to verify");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let mut submissions = Vec::with_capacity(request.reports.len());
    for report in &request.reports {
        let report_bytes = match base64::engine::general_purpose::STANDARD
            .decode(&report.attestation_report)
        {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(
                    report_type = %report.report_type,
                    error = %err,
                    "failed to decode base64 report"
                );
                return Json(VerifyReportsResponse {
                    success: false,
                    valid_reports: Vec::new(),
                    error_message: Some(err.to_string()),
                })
                .into_response();
            }
        };

        submissions.push(ReportSubmission {
            report_bytes,
            nonce: (!report.nonce.is_empty()).then(|| report.nonce.clone()),
            status_code: report.response_status_code,
            attestation_data: report.attestation_data.clone(),
            timestamp: report.timestamp,
            request: report.attestation_request.clone(),
        });
    }

    match state.verifier.verify_batch(&submissions) {
        Ok(valid_reports) => Json(VerifyReportsResponse {
            success: true,
            valid_reports,
            error_message: None,
        })
        .into_response(),
        Err(VerifyError::Session(err)) => {
            tracing::error!(error = %err, "signer session unavailable");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => Json(VerifyReportsResponse {
            success: false,
            valid_reports: Vec::new(),
            error_message: Some(err.to_string()),
        })
        .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct DecodeProofDataRequest {
    #[serde(rename = "userData")]
    pub user_data: String,
}

#[derive(Debug, Serialize)]
pub struct DecodeProofDataResponse {
    #[serde(rename = "decodedData", skip_serializing_if = "Option::is_none")]
    pub decoded_data: Option<DecodedProofData>,
    pub success: bool,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

async fn decode_proof(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DecodeProofDataRequest>,
) -> Response {
    if request.user_data.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let mut session = match state.verifier.open_session() {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "failed to open signer session");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let decoded = session
        .recover_message(request.user_data.as_bytes())
        .and_then(|recovered| state.verifier.decode_proof(&recovered));

    match decoded {
        Ok(decoded) => Json(DecodeProofDataResponse {
            decoded_data: Some(decoded),
            success: true,
            error_message: None,
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to decode proof data");
            Json(DecodeProofDataResponse {
                decoded_data: None,
                success: false,
                error_message: Some(err.to_string()),
            })
            .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DecodeVerifyRequest {
    #[serde(rename = "userData")]
    pub user_data: String,
    pub report: String,
}

#[derive(Debug, Serialize)]
pub struct DecodeVerifyResponse {
    #[serde(rename = "decodedData", skip_serializing_if = "Option::is_none")]
    pub decoded_data: Option<DecodedProofData>,
    #[serde(rename = "decodedReport", skip_serializing_if = "Option::is_none")]
    pub decoded_report: Option<FormattedReport>,
    #[serde(rename = "reportValid")]
    pub report_valid: bool,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

async fn decode_report(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DecodeVerifyRequest>,
) -> Response {
    if request.user_data.is_empty() || request.report.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let mut session = match state.verifier.open_session() {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "failed to open signer session");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // recover failures come from the caller's payload, so they are
    // protocol rejections, not server faults
    let recovered = session
        .recover_message(request.user_data.as_bytes())
        .and_then(|proof_bytes| {
            let report_bytes = session.recover_message(request.report.as_bytes())?;
            Ok((proof_bytes, report_bytes))
        });
    let (proof_bytes, report_bytes) = match recovered {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(error = %err, "failed to recover formatted messages");
            return decode_verify_failure(None, err);
        }
    };

    let decoded_data = match state.verifier.decode_recovered_proof(&proof_bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::warn!(error = %err, "failed to decode proof data");
            return decode_verify_failure(None, err);
        }
    };

    match state
        .verifier
        .verify_decoded(session.as_mut(), &decoded_data, &report_bytes)
    {
        Ok(decoded_report) => Json(DecodeVerifyResponse {
            decoded_data: Some(decoded_data),
            decoded_report: Some(decoded_report),
            report_valid: true,
            error_message: None,
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "report verification failed");
            decode_verify_failure(Some(decoded_data), err)
        }
    }
}

fn decode_verify_failure(decoded_data: Option<DecodedProofData>, err: VerifyError) -> Response {
    Json(DecodeVerifyResponse {
        decoded_data,
        decoded_report: None,
        report_valid: false,
        error_message: Some(err.to_string()),
    })
    .into_response()
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    #[serde(rename = "targetUniqueId")]
    pub target_unique_id: UniqueIdInfo,
    #[serde(rename = "targetPcrValues")]
    pub target_pcr_values: PcrValuesInfo,
    #[serde(rename = "liveCheckProgram")]
    pub live_check_program: String,
    #[serde(rename = "startTimeUTC")]
    pub start_time: String,
}

async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let target = state.verifier.target_measurements();
    Json(InfoResponse {
        target_unique_id: target.unique_id_info(),
        target_pcr_values: target.pcr_values_info(),
        live_check_program: state.live_check_program.clone(),
        start_time: state.start_time.format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    use oracle_verify_core::measurement::TargetMeasurements;
    use oracle_verify_runtime::capability::SignerSession;
    use oracle_verify_runtime::codec::encode_proof_data;
    use oracle_verify_runtime::proof::{AttestationRequest, EncodingOptions, ResponseFormat};
    use oracle_verify_runtime::report::{SgxReport, TcbStatus, SGX_REPORT_DATA_LEN};
    use oracle_verify_runtime::simulate::{
        build_sgx_report, SimulatedQuoteVerifier, SimulatedSigner, SimulatedSignerSession,
    };
    use oracle_verify_runtime::REPORT_DATA_FIELD_COUNT;

    const TARGET_UNIQUE_ID: [u8; 32] = [0xA7; 32];

    fn test_state() -> Arc<AppState> {
        let verifier = Verifier::new(
            TargetMeasurements {
                unique_id: TARGET_UNIQUE_ID,
                pcr_values: [[0x01; 48], [0x02; 48], [0x03; 48]],
            },
            Arc::new(SimulatedQuoteVerifier),
            Arc::new(SimulatedSigner),
            Vec::new(),
            1710946800,
        );

        Arc::new(AppState {
            verifier,
            live_check_program: "oracle_program.aleo".to_string(),
            start_time: Utc::now(),
        })
    }

    fn sample_request() -> AttestationRequest {
        AttestationRequest {
            url: "https://example.com/api".to_string(),
            request_method: "GET".to_string(),
            selector: "data.value".to_string(),
            response_format: ResponseFormat::Json,
            html_result_type: None,
            request_body: None,
            request_content_type: None,
            request_headers: BTreeMap::new(),
            encoding_options: EncodingOptions::default(),
            debug_request: false,
        }
    }

    fn binding_digest(attestation_data: &str, request: &AttestationRequest) -> [u8; 16] {
        let mut session = SimulatedSignerSession;
        let proof = encode_proof_data(200, attestation_data, 1701851063, request, &[]).unwrap();
        let formatted = session
            .format_message(&proof, REPORT_DATA_FIELD_COUNT)
            .unwrap();
        session.hash_message(&formatted).unwrap()
    }

    fn sgx_report_bytes(attestation_data: &str, request: &AttestationRequest) -> Vec<u8> {
        let digest = binding_digest(attestation_data, request);
        let mut data = [0u8; SGX_REPORT_DATA_LEN];
        data[..16].copy_from_slice(&digest);

        build_sgx_report(&SgxReport {
            data,
            security_version: 1,
            debug: false,
            unique_id: TARGET_UNIQUE_ID,
            signer_id: [0x33; 32],
            product_id: [0u8; 16],
            tcb_status: TcbStatus::UpToDate,
        })
    }

    fn sgx_attestation_response(attestation_data: &str) -> AttestationResponse {
        let request = sample_request();
        let report_bytes = sgx_report_bytes(attestation_data, &request);

        AttestationResponse {
            attestation_report: base64::engine::general_purpose::STANDARD.encode(report_bytes),
            report_type: "sgx".to_string(),
            attestation_data: attestation_data.to_string(),
            response_body: "{\"data\":{\"value\":1}}".to_string(),
            response_status_code: 200,
            nonce: String::new(),
            timestamp: 1701851063,
            attestation_request: request,
        }
    }

    async fn post_json(path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let app = router(test_state());
        let request = axum::http::Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_info_reports_targets() {
        let app = router(test_state());
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/info")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["targetUniqueId"]["hexEncoded"], "a7".repeat(32));
        assert_eq!(json["targetPcrValues"]["hexEncoded"][1], "02".repeat(48));
        assert_eq!(json["liveCheckProgram"], "oracle_program.aleo");
        assert!(json["startTimeUTC"].as_str().unwrap().contains(' '));
    }

    #[tokio::test]
    async fn test_verify_empty_reports_rejected() {
        let (status, _) = post_json("/verify", serde_json::json!({ "reports": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_valid_sgx_report() {
        let body = serde_json::json!({ "reports": [sgx_attestation_response("42")] });
        let (status, json) = post_json("/verify", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["validReports"], serde_json::json!([0]));
        assert!(json.get("errorMessage").is_none());
    }

    #[tokio::test]
    async fn test_verify_tampered_report_fails() {
        let mut report = sgx_attestation_response("42");
        report.attestation_data = "43".to_string();

        let body = serde_json::json!({ "reports": [report] });
        let (status, json) = post_json("/verify", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(json["validReports"], serde_json::json!([]));
        assert!(json["errorMessage"].as_str().unwrap().contains("binding mismatch"));
    }

    #[tokio::test]
    async fn test_verify_bad_base64_report() {
        let mut report = sgx_attestation_response("42");
        report.attestation_report = "not base64 at all!".to_string();

        let body = serde_json::json!({ "reports": [report] });
        let (status, json) = post_json("/verify", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert!(json["errorMessage"].is_string());
    }

    #[tokio::test]
    async fn test_decode_empty_user_data_rejected() {
        let (status, _) = post_json("/decode", serde_json::json!({ "userData": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_decode_round_trip() {
        let request = sample_request();
        let proof = encode_proof_data(200, "42", 1701851063, &request, &[]).unwrap();
        let mut session = SimulatedSignerSession;
        let wire = session
            .format_message(&proof, REPORT_DATA_FIELD_COUNT)
            .unwrap();
        let user_data = String::from_utf8(wire).unwrap();

        let (status, json) = post_json("/decode", serde_json::json!({ "userData": user_data })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["decodedData"]["url"], "https://example.com/api");
        assert_eq!(json["decodedData"]["attestationData"], "42");
        assert_eq!(json["decodedData"]["responseStatusCode"], 200);
    }

    #[tokio::test]
    async fn test_decode_all_zero_user_data() {
        // recovers to 32 zero bytes, a meta header declaring every
        // field zero length
        let (status, json) =
            post_json("/decode", serde_json::json!({ "userData": "0u128,0u128" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert!(json["errorMessage"].is_string());
    }

    #[tokio::test]
    async fn test_decode_unrecoverable_user_data() {
        let (status, json) =
            post_json("/decode", serde_json::json!({ "userData": "not a wire message" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert!(json["errorMessage"].is_string());
        assert!(json.get("decodedData").is_none());
    }

    #[tokio::test]
    async fn test_decode_report_valid_pair() {
        let request = sample_request();
        let proof = encode_proof_data(200, "42", 1701851063, &request, &[]).unwrap();
        let report_bytes = sgx_report_bytes("42", &request);

        let mut session = SimulatedSignerSession;
        let user_data = String::from_utf8(
            session
                .format_message(&proof, REPORT_DATA_FIELD_COUNT)
                .unwrap(),
        )
        .unwrap();
        let report = String::from_utf8(
            session
                .format_message(&report_bytes, REPORT_DATA_FIELD_COUNT)
                .unwrap(),
        )
        .unwrap();

        let body = serde_json::json!({ "userData": user_data, "report": report });
        let (status, json) = post_json("/decodeReport", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reportValid"], true);
        assert_eq!(json["decodedData"]["attestationData"], "42");
        assert_eq!(json["decodedReport"]["uniqueId"], "a7".repeat(32));
    }

    #[tokio::test]
    async fn test_decode_report_mismatched_pair() {
        let request = sample_request();
        let proof = encode_proof_data(200, "42", 1701851063, &request, &[]).unwrap();
        // report commits to different attestation data than the proof
        let report_bytes = sgx_report_bytes("43", &request);

        let mut session = SimulatedSignerSession;
        let user_data = String::from_utf8(
            session
                .format_message(&proof, REPORT_DATA_FIELD_COUNT)
                .unwrap(),
        )
        .unwrap();
        let report = String::from_utf8(
            session
                .format_message(&report_bytes, REPORT_DATA_FIELD_COUNT)
                .unwrap(),
        )
        .unwrap();

        let body = serde_json::json!({ "userData": user_data, "report": report });
        let (status, json) = post_json("/decodeReport", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reportValid"], false);
        assert!(json["errorMessage"].is_string());
        // the proof decoded fine, so its fields still come back
        assert_eq!(json["decodedData"]["attestationData"], "42");
        assert!(json.get("decodedReport").is_none());
    }

    #[tokio::test]
    async fn test_decode_report_unrecoverable_input() {
        let body = serde_json::json!({ "userData": "not a wire message", "report": "junk" });
        let (status, json) = post_json("/decodeReport", body).await;
        // bad payloads are protocol rejections, not server errors
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reportValid"], false);
        assert!(json["errorMessage"].is_string());
        assert!(json.get("decodedData").is_none());
    }

    #[tokio::test]
    async fn test_decode_report_missing_fields_rejected() {
        let body = serde_json::json!({ "userData": "something", "report": "" });
        let (status, _) = post_json("/decodeReport", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
