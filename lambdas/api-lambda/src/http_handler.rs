use hospital_shared::access::{self, Access, Decision};
use hospital_shared::auth::{self, CredentialSubject};
use hospital_shared::patients::{self, query_param};
use hospital_shared::views::{self, ACCESS_DENIED_PATH, LISTING_PATH, LOGIN_PATH};
use hospital_shared::AppState;
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use std::sync::Arc;

/// Main Lambda handler - access check, then route
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    tracing::info!(
        "Registry request - Method: {} Path: {}",
        event.method(),
        event.uri().path()
    );

    match handle(&event, &state).await {
        Ok(response) => Ok(response),
        Err(e) => {
            tracing::error!("Request failed - Path: {} Error: {}", event.uri().path(), e);
            state
                .views
                .error_page(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
        }
    }
}

async fn handle(event: &Request, state: &AppState) -> Result<Response<Body>, Error> {
    let path = event.uri().path();
    let now = chrono::Utc::now().timestamp();

    let parts = access::path_segments(path);

    let principal = access::resolve_principal(state, event.headers(), now).await?;
    let subject = principal.as_ref().map(|p| &p.subject);

    match access::authorize(access::required_access(&parts), subject) {
        Decision::Proceed => {}
        Decision::RedirectToLogin => return views::redirect(LOGIN_PATH),
        Decision::AccessDenied => {
            tracing::warn!(
                "Access denied - User: {} Path: {}",
                subject.map(|s| s.username.as_str()).unwrap_or_default(),
                path
            );
            return views::redirect(ACCESS_DENIED_PATH);
        }
    }

    let mut response = route(event, state, &parts, subject).await?;

    if let Some(cookie) = principal.and_then(|p| p.renewed_session) {
        response.headers_mut().append("Set-Cookie", cookie.parse()?);
    }
    Ok(response)
}

/// Dispatch on the same segment list the access check classified.
async fn route(
    event: &Request,
    state: &AppState,
    parts: &[&str],
    subject: Option<&CredentialSubject>,
) -> Result<Response<Body>, Error> {
    let method = event.method();

    // Public routes
    match (method, parts) {
        (&Method::GET, ["login"]) => {
            return auth::login_page(
                state,
                query_param(event, "error").is_some(),
                query_param(event, "logout").is_some(),
            )
        }
        (&Method::POST, ["login"]) => return auth::login(state, event).await,
        (&Method::GET | &Method::POST, ["logout"]) => return auth::logout(state),
        (&Method::GET, ["notAuthorized"]) => {
            return state
                .views
                .page("not_authorized.html", &views::base_context(subject))
        }
        _ => {}
    }

    let Some(subject) = subject else {
        return views::redirect(LOGIN_PATH);
    };

    let is_admin = subject.is_admin();

    match (method, parts) {
        (&Method::GET, []) => views::redirect(LISTING_PATH),
        (&Method::GET, ["index"] | ["user", "index"]) => patients::list(state, subject, event).await,
        (&Method::GET, ["patientForm"] | ["admin", "patientForm"]) if is_admin => {
            patients::create_form(state, subject, event)
        }
        (&Method::POST, ["save"] | ["admin", "save"]) if is_admin => {
            patients::save(state, subject, event).await
        }
        (&Method::GET, ["edit", id] | ["admin", "edit", id]) if is_admin => {
            patients::edit(state, subject, id, event).await
        }
        (&Method::GET, ["delete"] | ["admin", "delete"]) if is_admin => {
            patients::delete(state, subject, event).await
        }
        _ if !is_admin && access::required_access(parts) == Access::Admin => {
            tracing::warn!("Admin route reached without grant - User: {}", subject.username);
            views::redirect(ACCESS_DENIED_PATH)
        }
        _ => {
            tracing::warn!("No route matched - Method: {} Path: {}", method, event.uri().path());
            state.views.error_page(StatusCode::NOT_FOUND, "Page not found")
        }
    }
}
