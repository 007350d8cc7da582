use chrono::NaiveDate;
use lambda_http::{Body, Error, Request, RequestExt, RequestPayloadExt, Response};
use serde::{Deserialize, Serialize};

use crate::auth::CredentialSubject;
use crate::error::Result;
use crate::store::PatientStore;
use crate::types::{PageRequest, Patient};
use crate::views::{self, listing_location};
use crate::AppState;

/// Single query-string value, if present.
pub fn query_param<'a>(event: &'a Request, name: &str) -> Option<&'a str> {
    event.query_string_parameters_ref().and_then(|params| params.first(name))
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Listing position carried through edit and delete round trips.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ListingState {
    keyword: String,
    page: u32,
}

impl ListingState {
    fn from_raw(keyword: Option<&str>, page: Option<&str>) -> Self {
        Self {
            keyword: keyword.unwrap_or_default().to_string(),
            page: parse_or::<i64>(page, 0).clamp(0, u32::MAX as i64) as u32,
        }
    }

    fn from_query(event: &Request) -> Self {
        Self::from_raw(query_param(event, "keyword"), query_param(event, "page"))
    }

    fn location(&self) -> String {
        listing_location(self.page, &self.keyword)
    }
}

/// Validate then persist. Used by every write path, including seeding.
pub async fn save_patient(store: &dyn PatientStore, patient: Patient) -> Result<Patient> {
    patient.validate()?;
    store.save(patient).await
}

// ========== FORM BINDING ==========

/// Raw form fields as posted by the patient form.
#[derive(Debug, Default, Deserialize)]
pub struct PatientForm {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "birthDate")]
    pub birth_date: Option<String>,
    pub sick: Option<String>,
    pub score: Option<String>,
    pub keyword: Option<String>,
    pub page: Option<String>,
}

/// Values echoed back into the form template.
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct FormValues {
    pub id: Option<i64>,
    pub name: String,
    pub birth_date: String,
    pub sick: bool,
    pub score: String,
}

impl From<&Patient> for FormValues {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name.clone(),
            birth_date: patient
                .birth_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            sick: patient.sick,
            score: patient.score.to_string(),
        }
    }
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct FieldErrors {
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub score: Option<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.birth_date.is_none() && self.score.is_none()
    }
}

fn checkbox(value: Option<&str>) -> bool {
    matches!(value, Some(v) if !matches!(v.trim(), "" | "false" | "off"))
}

/// Bind and validate the posted fields. On failure the entered values come
/// back untouched alongside the per-field messages.
pub fn bind_patient(form: &PatientForm) -> std::result::Result<Patient, (FormValues, FieldErrors)> {
    let mut errors = FieldErrors::default();

    let id = form.id.as_deref().and_then(|v| v.trim().parse::<i64>().ok());
    let name = form.name.clone().unwrap_or_default();
    let raw_date = form.birth_date.as_deref().unwrap_or_default().trim();
    let raw_score = form.score.as_deref().unwrap_or_default().trim();

    let birth_date = if raw_date.is_empty() {
        None
    } else {
        match NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.birth_date = Some("must be a date (yyyy-MM-dd)".to_string());
                None
            }
        }
    };

    let score = match raw_score.parse::<i32>() {
        Ok(score) => score,
        Err(_) => {
            errors.score = Some("must be a number".to_string());
            0
        }
    };

    let patient = Patient {
        id,
        name,
        birth_date,
        sick: checkbox(form.sick.as_deref()),
        score,
    };

    errors.name = patient.name_violation();
    if errors.score.is_none() {
        errors.score = patient.score_violation();
    }

    if errors.is_empty() {
        return Ok(patient);
    }

    let values = FormValues {
        id,
        name: patient.name,
        birth_date: raw_date.to_string(),
        sick: patient.sick,
        score: raw_score.to_string(),
    };
    Err((values, errors))
}

fn render_form(
    state: &AppState,
    subject: &CredentialSubject,
    values: &FormValues,
    errors: &FieldErrors,
    listing: &ListingState,
) -> std::result::Result<Response<Body>, Error> {
    let mut context = views::base_context(Some(subject));
    context.insert("form", values);
    context.insert("errors", errors);
    context.insert("keyword", &listing.keyword);
    context.insert("page", &listing.page);
    state.views.page("patient_form.html", &context)
}

// ========== HANDLERS ==========

/// GET /index, /user/index
pub async fn list(
    state: &AppState,
    subject: &CredentialSubject,
    event: &Request,
) -> std::result::Result<Response<Body>, Error> {
    let keyword = query_param(event, "keyword").unwrap_or_default();
    let request = PageRequest::new(
        parse_or(query_param(event, "page"), 0),
        parse_or(query_param(event, "size"), state.config.default_page_size as i64),
        state.config.default_page_size,
    );

    let page = state.patients.find_by_name_contains(keyword, request).await?;
    tracing::info!(
        "Listing patients - keyword: '{}' page: {} matches: {}",
        keyword,
        page.number,
        page.total_elements
    );

    let mut context = views::base_context(Some(subject));
    context.insert("patients", &page.content);
    context.insert("pages", &page.page_indices());
    context.insert("current_page", &page.number);
    context.insert("size", &page.size);
    context.insert("total_elements", &page.total_elements);
    context.insert("keyword", keyword);
    state.views.page("patients.html", &context)
}

/// GET /patientForm, /admin/patientForm
pub fn create_form(
    state: &AppState,
    subject: &CredentialSubject,
    event: &Request,
) -> std::result::Result<Response<Body>, Error> {
    render_form(
        state,
        subject,
        &FormValues::default(),
        &FieldErrors::default(),
        &ListingState::from_query(event),
    )
}

/// POST /save, /admin/save
pub async fn save(
    state: &AppState,
    subject: &CredentialSubject,
    event: &Request,
) -> std::result::Result<Response<Body>, Error> {
    let form = match event.payload::<PatientForm>() {
        Ok(Some(form)) => form,
        Ok(None) => PatientForm::default(),
        Err(e) => {
            tracing::warn!("Failed to parse patient form: {}", e);
            PatientForm::default()
        }
    };
    let listing = ListingState::from_raw(form.keyword.as_deref(), form.page.as_deref());

    match bind_patient(&form) {
        Ok(patient) => {
            let saved = save_patient(state.patients.as_ref(), patient).await?;
            tracing::info!("Patient {:?} saved by {}", saved.id, subject.username);
            views::redirect(&listing.location())
        }
        Err((values, errors)) => {
            tracing::info!("Patient form rejected: {:?}", errors);
            render_form(state, subject, &values, &errors, &listing)
        }
    }
}

/// GET /edit/{id}, /admin/edit/{id}
pub async fn edit(
    state: &AppState,
    subject: &CredentialSubject,
    id: &str,
    event: &Request,
) -> std::result::Result<Response<Body>, Error> {
    let listing = ListingState::from_query(event);

    let patient = match id.parse::<i64>() {
        Ok(id) => state.patients.find_by_id(id).await?,
        Err(_) => None,
    };

    match patient {
        Some(patient) => render_form(
            state,
            subject,
            &FormValues::from(&patient),
            &FieldErrors::default(),
            &listing,
        ),
        None => {
            tracing::warn!("Edit requested for unknown patient: {}", id);
            views::redirect(&listing.location())
        }
    }
}

/// GET /delete, /admin/delete
pub async fn delete(
    state: &AppState,
    subject: &CredentialSubject,
    event: &Request,
) -> std::result::Result<Response<Body>, Error> {
    let listing = ListingState::from_query(event);

    match query_param(event, "id").and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(id) => {
            if state.patients.delete_by_id(id).await? {
                tracing::info!("Patient {} deleted by {}", id, subject.username);
            } else {
                tracing::warn!("Delete requested for unknown patient: {}", id);
            }
        }
        None => tracing::warn!("Delete requested without a valid id"),
    }

    views::redirect(&listing.location())
}
