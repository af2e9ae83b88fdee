//! REST API endpoints for papers, claim streams and claim verification

use actix_web::http::header::HeaderMap;
use actix_web::{HttpRequest, HttpResponse, post, web};
use futures::StreamExt;
use utoipa::OpenApi;

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::health::{DependencyHealth, HealthStatus, ReadinessStatus};
use crate::model::api::{
    CitationSuggestion, StreamClaimsRequest, SuggestCitationsRequest, SuggestCitationsResponse,
    UploadPaperResponse, ValidateKeyRequest, ValidateKeyResponse, VerifyClaimParams,
    VerifyClaimResponse,
};
use crate::model::event::NDJSON_CONTENT_TYPE;
use crate::model::{CitationStatus, Claim, Evidence, Verdict, Verification};
use crate::service::PaperService;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Largest accepted document body, in bytes
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Paper Trail API",
        description = "Extracts citation claims from papers, streams them as NDJSON and verifies them against cited sources"
    ),
    paths(
        validate_api_key,
        upload_paper,
        stream_claim,
        verify_claim,
        suggest_citations,
        crate::api::health::liveness,
        crate::api::health::readiness,
    ),
    components(schemas(
        ValidateKeyRequest,
        ValidateKeyResponse,
        UploadPaperResponse,
        StreamClaimsRequest,
        VerifyClaimResponse,
        SuggestCitationsRequest,
        SuggestCitationsResponse,
        CitationSuggestion,
        Claim,
        CitationStatus,
        Verification,
        Verdict,
        Evidence,
        ErrorResponse,
        HealthStatus,
        ReadinessStatus,
        DependencyHealth,
    )),
    tags(
        (name = "papers", description = "Claim extraction and verification"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;

/// Check a reasoning-provider API key
#[utoipa::path(
    post,
    path = "/api/v1/validate-api-key",
    request_body = ValidateKeyRequest,
    responses(
        (status = 200, description = "Key accepted", body = ValidateKeyResponse),
        (status = 400, description = "Key missing", body = ErrorResponse),
        (status = 401, description = "Key rejected by the provider", body = ErrorResponse),
        (status = 502, description = "Provider unreachable", body = ErrorResponse)
    ),
    tag = "papers"
)]
#[post("/api/v1/validate-api-key")]
pub async fn validate_api_key(
    service: web::Data<PaperService>,
    body: web::Json<ValidateKeyRequest>,
) -> Result<HttpResponse, ApiError> {
    service.validate_credential(&body.api_key).await?;
    Ok(HttpResponse::Ok().json(ValidateKeyResponse { ok: true }))
}

/// Upload a paper; the body is the raw PDF or text document
#[utoipa::path(
    post,
    path = "/api/v1/upload-paper",
    request_body(content = Vec<u8>, description = "PDF or form-feed separated text", content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Job created", body = UploadPaperResponse),
        (status = 400, description = "Unreadable document", body = ErrorResponse),
        (status = 413, description = "Document too large", body = ErrorResponse),
        (status = 503, description = "Job store unavailable", body = ErrorResponse)
    ),
    tag = "papers"
)]
#[post("/api/v1/upload-paper")]
pub async fn upload_paper(
    service: web::Data<PaperService>,
    limit: web::Data<UploadLimit>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let document = read_limited(payload, limit.0).await?;
    let job_id = service.upload(document).await?;
    Ok(HttpResponse::Created().json(UploadPaperResponse { job_id }))
}

/// Stream a job's claims as NDJSON records
///
/// The first call starts extraction; later calls replay what was already
/// extracted and then follow the run.
#[utoipa::path(
    post,
    path = "/api/v1/stream-claim",
    request_body = StreamClaimsRequest,
    responses(
        (status = 200, description = "One {type, payload} record per line", body = String, content_type = "application/x-ndjson"),
        (status = 400, description = "Key missing", body = ErrorResponse),
        (status = 404, description = "Unknown or expired job", body = ErrorResponse)
    ),
    tag = "papers"
)]
#[post("/api/v1/stream-claim")]
pub async fn stream_claim(
    service: web::Data<PaperService>,
    body: web::Json<StreamClaimsRequest>,
) -> Result<HttpResponse, ApiError> {
    let StreamClaimsRequest { job_id, api_key } = body.into_inner();
    let events = service.stream_claims(&job_id, &api_key).await?;

    let lines = events.map(|event| {
        event
            .to_ndjson_line()
            .map(web::Bytes::from)
            .map_err(|e| ApiError::Internal(e.to_string()))
    });

    Ok(HttpResponse::Ok()
        .content_type(NDJSON_CONTENT_TYPE)
        .insert_header(("cache-control", "no-cache"))
        .streaming(lines))
}

/// Verify one claim against its cited document; the body is the raw document
#[utoipa::path(
    post,
    path = "/api/v1/verify-claim",
    params(
        VerifyClaimParams,
        ("x-api-key" = String, Header, description = "Reasoning-provider API key")
    ),
    request_body(content = Vec<u8>, description = "Cited PDF or text document", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Verdict merged into the claim", body = VerifyClaimResponse),
        (status = 400, description = "Malformed claim id or unreadable document", body = ErrorResponse),
        (status = 404, description = "Unknown job or claim", body = ErrorResponse),
        (status = 502, description = "Reasoning provider failed", body = ErrorResponse)
    ),
    tag = "papers"
)]
#[post("/api/v1/verify-claim")]
pub async fn verify_claim(
    req: HttpRequest,
    service: web::Data<PaperService>,
    limit: web::Data<UploadLimit>,
    query: web::Query<VerifyClaimParams>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let api_key = api_key_header(req.headers())?;
    let cited_document = read_limited(payload, limit.0).await?;

    let params = query.into_inner();
    let claim_id = params.claim_id.clone();
    let verification = service.verify_claim(params, cited_document, &api_key).await?;

    Ok(HttpResponse::Ok().json(VerifyClaimResponse::new(claim_id, verification)))
}

/// Suggest papers that could back an uncited claim
#[utoipa::path(
    post,
    path = "/api/v1/suggest-citations",
    request_body = SuggestCitationsRequest,
    responses(
        (status = 200, description = "Candidate sources", body = SuggestCitationsResponse),
        (status = 400, description = "Claim text missing", body = ErrorResponse),
        (status = 502, description = "Paper search failed", body = ErrorResponse)
    ),
    tag = "papers"
)]
#[post("/api/v1/suggest-citations")]
pub async fn suggest_citations(
    service: web::Data<PaperService>,
    body: web::Json<SuggestCitationsRequest>,
) -> Result<HttpResponse, ApiError> {
    let suggestions = service.suggest_citations(&body.claim_text, body.limit).await?;
    Ok(HttpResponse::Ok().json(SuggestCitationsResponse { suggestions }))
}

fn api_key_header(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest(format!("{API_KEY_HEADER} header is required")))
}

/// Collect a request body, refusing anything over `limit` bytes
async fn read_limited(mut payload: web::Payload, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.to_vec())
}

/// Configure paper routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(validate_api_key)
        .service(upload_paper)
        .service(stream_claim)
        .service(verify_claim)
        .service(suggest_citations);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::App;
    use actix_web::test as actix_test;

    use crate::model::Config;
    use crate::model::extraction::ExtractedCitationStatus::Cited;
    use crate::service::testing::{ScriptedReasoner, TTL, document, extracted};
    use crate::service::{
        Collaborators, CredentialValidator, LexicalScorer, PdfTextExtractor, SuggestionClient,
    };
    use crate::store::MemoryStore;

    const PAGE: &str = "Cold water immersion reduces soreness [2].";

    fn paper_service() -> web::Data<PaperService> {
        let config = Config {
            ttl: TTL,
            ..Config::default()
        };
        let reasoner = ScriptedReasoner::new().with_page(1, vec![extracted(PAGE, Cited)]);
        let collaborators = Collaborators {
            extractor: Arc::new(PdfTextExtractor),
            scorer: Arc::new(LexicalScorer),
            reasoner: Arc::new(reasoner),
            credentials: CredentialValidator::new("http://127.0.0.1:9"),
            suggestions: SuggestionClient::new("http://127.0.0.1:9/search"),
        };
        web::Data::new(PaperService::new(
            Arc::new(MemoryStore::new()),
            collaborators,
            &config,
        ))
    }

    macro_rules! app {
        ($service:expr, $limit:expr) => {
            actix_test::init_service(
                App::new()
                    .app_data($service.clone())
                    .app_data(web::Data::new(UploadLimit($limit)))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_upload_then_stream_ndjson() {
        let service = paper_service();
        let app = app!(service, 1024);

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/upload-paper")
            .set_payload(document(&[PAGE]))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: UploadPaperResponse = actix_test::read_body_json(resp).await;

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/stream-claim")
            .set_json(serde_json::json!({"jobId": created.job_id, "apiKey": "sk-test"}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap().to_str().unwrap(),
            NDJSON_CONTENT_TYPE
        );

        let body = actix_test::read_body(resp).await;
        let records: Vec<serde_json::Value> = body
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect();
        let types: Vec<&str> = records.iter().map(|r| r["type"].as_str().unwrap()).collect();
        assert!(types.contains(&"claim"));
        assert_eq!(types.last(), Some(&"done"));

        let claim = records.iter().find(|r| r["type"] == "claim").unwrap();
        assert_eq!(claim["payload"]["claimId"], "c0");
        assert_eq!(claim["payload"]["citationStatus"], "cited");
    }

    #[actix_web::test]
    async fn test_stream_unknown_job_is_404_json() {
        let service = paper_service();
        let app = app!(service, 1024);

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/stream-claim")
            .set_json(serde_json::json!({"jobId": "nope", "apiKey": "sk-test"}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], "Unknown or expired jobId");
    }

    #[actix_web::test]
    async fn test_oversized_upload_is_413() {
        let service = paper_service();
        let app = app!(service, 8);

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/upload-paper")
            .set_payload(document(&[PAGE]))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn test_verify_requires_api_key_header() {
        let service = paper_service();
        let app = app!(service, 1024);

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/verify-claim?jobId=nope&claimId=c0")
            .set_payload(document(&["cited"]))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/verify-claim?jobId=nope&claimId=c0")
            .insert_header((API_KEY_HEADER, "sk-test"))
            .set_payload(document(&["cited"]))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
