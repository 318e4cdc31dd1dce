//! Certificate and certificate template endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use lms_common::certificates::{
    CertificateFilter, CertificateRepository, CertificateVerification, IssueCertificate,
    NewTemplate, RenderedCertificate,
};
use lms_common::db::{Certificate, CertificateTemplate, TemplateField};
use serde::Deserialize;

use super::{ApiJson, ApiPath, ApiQuery};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TemplateFieldsRequest {
    pub fields: Vec<TemplateField>,
}

/// GET /api/certificates
pub async fn list_certificates(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CertificateFilter>,
) -> ApiResult<Json<Vec<Certificate>>> {
    let certificates = CertificateRepository::new(state.db.clone())
        .list_certificates(&filter)
        .await?;
    Ok(Json(certificates))
}

/// POST /api/certificates
///
/// Only completed enrollments can be certified.
pub async fn issue_certificate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<IssueCertificate>,
) -> ApiResult<(StatusCode, Json<Certificate>)> {
    let certificate = CertificateRepository::new(state.db.clone())
        .issue_certificate(request)
        .await?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

/// GET /api/certificates/:id
pub async fn get_certificate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Certificate>> {
    let certificate = CertificateRepository::new(state.db.clone())
        .get_certificate(&id)
        .await?;
    Ok(Json(certificate))
}

/// POST /api/certificates/:id/revoke
pub async fn revoke_certificate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Certificate>> {
    let certificate = CertificateRepository::new(state.db.clone())
        .revoke_certificate(&id)
        .await?;
    Ok(Json(certificate))
}

/// GET /api/certificates/:id/render
pub async fn render_certificate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<RenderedCertificate>> {
    let rendered = CertificateRepository::new(state.db.clone())
        .render_certificate(&id)
        .await?;
    Ok(Json(rendered))
}

/// GET /api/verify/:code
pub async fn verify_certificate(
    State(state): State<AppState>,
    ApiPath(code): ApiPath<String>,
) -> ApiResult<Json<CertificateVerification>> {
    let verification = CertificateRepository::new(state.db.clone())
        .verify_certificate(&code)
        .await?;
    Ok(Json(verification))
}

/// GET /api/certificate-templates
pub async fn list_templates(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CertificateTemplate>>> {
    let templates = CertificateRepository::new(state.db.clone())
        .list_templates()
        .await?;
    Ok(Json(templates))
}

/// POST /api/certificate-templates
pub async fn create_template(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewTemplate>,
) -> ApiResult<(StatusCode, Json<CertificateTemplate>)> {
    let template = CertificateRepository::new(state.db.clone())
        .create_template(new)
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /api/certificate-templates/:id
pub async fn get_template(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<CertificateTemplate>> {
    let template = CertificateRepository::new(state.db.clone())
        .get_template(&id)
        .await?;
    Ok(Json(template))
}

/// PUT /api/certificate-templates/:id/fields
pub async fn update_template_fields(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<TemplateFieldsRequest>,
) -> ApiResult<Json<CertificateTemplate>> {
    let template = CertificateRepository::new(state.db.clone())
        .update_template_fields(&id, request.fields)
        .await?;
    Ok(Json(template))
}

/// DELETE /api/certificate-templates/:id
pub async fn delete_template(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    CertificateRepository::new(state.db.clone())
        .delete_template(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
