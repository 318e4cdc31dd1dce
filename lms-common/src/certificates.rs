//! Certificates and certificate templates
//!
//! A template places a fixed set of values (`TemplateFieldKey`) on a page of
//! given size. Rendering resolves the placements of a certificate's template
//! to text; drawing the page is left to the client.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::db::rows::{
    certificate_from_row, template_from_row, CERTIFICATE_COLUMNS, TEMPLATE_COLUMNS,
};
use crate::db::{
    Certificate, CertificateStatus, CertificateTemplate, EnrollmentStatus, TemplateField,
    TemplateFieldKey,
};
use crate::enrollments::{fetch_enrollment, required};
use crate::time::now_millis;
use crate::{Error, Result};

/// Length of the public verification code
pub const VERIFICATION_CODE_LEN: usize = 12;

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub page_width: f64,
    pub page_height: f64,
    #[serde(default)]
    pub fields: Vec<TemplateField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCertificate {
    pub enrollment_id: String,
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertificateFilter {
    pub user_id: Option<String>,
    pub course_id: Option<String>,
    pub status: Option<CertificateStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateVerification {
    pub valid: bool,
    pub certificate: Certificate,
}

/// A template field resolved to its text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedField {
    pub key: TemplateFieldKey,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedCertificate {
    pub certificate_id: String,
    pub template_id: String,
    pub page_width: f64,
    pub page_height: f64,
    pub fields: Vec<PlacedField>,
}

pub struct CertificateRepository {
    pool: SqlitePool,
}

impl CertificateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    pub async fn create_template(&self, new: NewTemplate) -> Result<CertificateTemplate> {
        let name = required("template name", &new.name)?;
        validate_placement(new.page_width, new.page_height, &new.fields)?;

        let id = Uuid::new_v4().to_string();
        let now = now_millis();
        let mut conn = self.pool.acquire().await?;
        sqlx::query(
            r#"
            INSERT INTO certificate_templates (id, name, page_width, page_height, fields, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(new.page_width)
        .bind(new.page_height)
        .bind(serde_json::to_string(&new.fields)?)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        info!("Created certificate template {} ({})", name, id);
        fetch_template(&mut conn, &id).await
    }

    pub async fn get_template(&self, id: &str) -> Result<CertificateTemplate> {
        let mut conn = self.pool.acquire().await?;
        fetch_template(&mut conn, id).await
    }

    pub async fn list_templates(&self) -> Result<Vec<CertificateTemplate>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM certificate_templates ORDER BY name COLLATE NOCASE, id",
            TEMPLATE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(template_from_row).collect()
    }

    /// Replace the field placements of a template
    pub async fn update_template_fields(
        &self,
        id: &str,
        fields: Vec<TemplateField>,
    ) -> Result<CertificateTemplate> {
        let mut tx = self.pool.begin().await?;
        let template = fetch_template(&mut tx, id).await?;
        validate_placement(template.page_width, template.page_height, &fields)?;

        sqlx::query("UPDATE certificate_templates SET fields = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(&fields)?)
            .bind(now_millis())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let template = fetch_template(&mut tx, id).await?;
        tx.commit().await?;
        Ok(template)
    }

    pub async fn delete_template(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        fetch_template(&mut tx, id).await?;

        let in_use: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM certificates WHERE template_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if in_use > 0 {
            return Err(Error::Conflict(format!(
                "template {} is used by {} certificate(s)",
                id, in_use
            )));
        }

        sqlx::query("DELETE FROM certificate_templates WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Certificates
    // ------------------------------------------------------------------

    /// Issue a certificate for a completed enrollment
    pub async fn issue_certificate(&self, request: IssueCertificate) -> Result<Certificate> {
        let mut tx = self.pool.begin().await?;
        let enrollment = fetch_enrollment(&mut tx, &request.enrollment_id).await?;
        if enrollment.status != EnrollmentStatus::Completed {
            return Err(Error::InvalidInput(format!(
                "enrollment {} is not completed",
                enrollment.id
            )));
        }

        if let Some(template_id) = &request.template_id {
            fetch_template(&mut tx, template_id).await?;
        }

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM certificates WHERE user_id = ? AND course_id = ? AND status = 'issued'",
        )
        .bind(&enrollment.user_id)
        .bind(&enrollment.course_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(existing) = existing {
            return Err(Error::Conflict(format!(
                "certificate {} already issued for this user and course",
                existing
            )));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO certificates (
                id, enrollment_id, user_id, user_name, course_id, course_title,
                template_id, status, verification_code, issued_at, revoked_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 'issued', ?, ?, NULL)
            "#,
        )
        .bind(&id)
        .bind(&enrollment.id)
        .bind(&enrollment.user_id)
        .bind(&enrollment.user_name)
        .bind(&enrollment.course_id)
        .bind(&enrollment.course_title)
        .bind(&request.template_id)
        .bind(new_verification_code())
        .bind(now_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::unique_conflict(e, || {
                "a certificate is already issued for this user and course".to_string()
            })
        })?;

        let certificate = fetch_certificate(&mut tx, &id).await?;
        tx.commit().await?;

        info!(
            "Issued certificate {} to user {} for course {}",
            certificate.id, certificate.user_id, certificate.course_id
        );
        Ok(certificate)
    }

    pub async fn get_certificate(&self, id: &str) -> Result<Certificate> {
        let mut conn = self.pool.acquire().await?;
        fetch_certificate(&mut conn, id).await
    }

    /// Revoke a certificate; revoking twice keeps the first revocation time
    pub async fn revoke_certificate(&self, id: &str) -> Result<Certificate> {
        let mut tx = self.pool.begin().await?;
        fetch_certificate(&mut tx, id).await?;

        sqlx::query(
            r#"
            UPDATE certificates
            SET status = 'revoked', revoked_at = COALESCE(revoked_at, ?)
            WHERE id = ?
            "#,
        )
        .bind(now_millis())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let certificate = fetch_certificate(&mut tx, id).await?;
        tx.commit().await?;
        info!("Revoked certificate {}", id);
        Ok(certificate)
    }

    /// Look a certificate up by its public code
    pub async fn verify_certificate(&self, code: &str) -> Result<CertificateVerification> {
        let code = code.trim().to_ascii_uppercase();
        let row = sqlx::query(&format!(
            "SELECT {} FROM certificates WHERE verification_code = ?",
            CERTIFICATE_COLUMNS
        ))
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("certificate with code", &code))?;

        let certificate = certificate_from_row(&row)?;
        Ok(CertificateVerification {
            valid: certificate.status == CertificateStatus::Issued,
            certificate,
        })
    }

    pub async fn list_certificates(&self, filter: &CertificateFilter) -> Result<Vec<Certificate>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM certificates WHERE 1 = 1",
            CERTIFICATE_COLUMNS
        ));
        if let Some(user_id) = &filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(course_id) = &filter.course_id {
            query.push(" AND course_id = ").push_bind(course_id.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY issued_at DESC, id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(certificate_from_row).collect()
    }

    /// Resolve the certificate's template placements to text
    pub async fn render_certificate(&self, id: &str) -> Result<RenderedCertificate> {
        let mut conn = self.pool.acquire().await?;
        let certificate = fetch_certificate(&mut conn, id).await?;
        let template_id = certificate.template_id.clone().ok_or_else(|| {
            Error::InvalidInput(format!("certificate {} has no template", id))
        })?;
        let template = fetch_template(&mut conn, &template_id).await?;
        Ok(render(&certificate, &template))
    }
}

async fn fetch_template(conn: &mut SqliteConnection, id: &str) -> Result<CertificateTemplate> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM certificate_templates WHERE id = ?",
        TEMPLATE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::not_found("certificate template", id))?;
    template_from_row(&row)
}

async fn fetch_certificate(conn: &mut SqliteConnection, id: &str) -> Result<Certificate> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM certificates WHERE id = ?",
        CERTIFICATE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::not_found("certificate", id))?;
    certificate_from_row(&row)
}

/// Field placement rules for a page of `width` x `height`
///
/// Each key appears at most once, every anchor lies on the page and font
/// sizes are positive.
pub fn validate_placement(width: f64, height: f64, fields: &[TemplateField]) -> Result<()> {
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(Error::InvalidInput(format!(
            "page size must be positive, got {} x {}",
            width, height
        )));
    }

    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.key) {
            return Err(Error::InvalidInput(format!("field {} placed twice", field.key)));
        }
        if !(0.0..=width).contains(&field.x) || !(0.0..=height).contains(&field.y) {
            return Err(Error::InvalidInput(format!(
                "field {} at ({}, {}) is outside the {} x {} page",
                field.key, field.x, field.y, width, height
            )));
        }
        if !(field.font_size.is_finite() && field.font_size > 0.0) {
            return Err(Error::InvalidInput(format!(
                "field {} needs a positive font size",
                field.key
            )));
        }
    }
    Ok(())
}

fn render(certificate: &Certificate, template: &CertificateTemplate) -> RenderedCertificate {
    let fields = template
        .fields
        .iter()
        .map(|field| {
            let text = match field.key {
                TemplateFieldKey::UserName => certificate.user_name.clone(),
                TemplateFieldKey::CourseTitle => certificate.course_title.clone(),
                TemplateFieldKey::IssuedDate => certificate.issued_at.format("%Y-%m-%d").to_string(),
                TemplateFieldKey::VerificationCode => certificate.verification_code.clone(),
            };
            PlacedField {
                key: field.key,
                text,
                x: field.x,
                y: field.y,
                font_size: field.font_size,
            }
        })
        .collect();

    RenderedCertificate {
        certificate_id: certificate.id.clone(),
        template_id: template.id.clone(),
        page_width: template.page_width,
        page_height: template.page_height,
        fields,
    }
}

fn new_verification_code() -> String {
    Uuid::new_v4().simple().to_string()[..VERIFICATION_CODE_LEN].to_ascii_uppercase()
}
