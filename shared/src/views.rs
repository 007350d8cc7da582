use lambda_http::{http::StatusCode, Body, Error, Response};
use tera::{Context, Tera};

use crate::auth::CredentialSubject;

pub const LOGIN_PATH: &str = "/login";
pub const ACCESS_DENIED_PATH: &str = "/notAuthorized";
pub const LISTING_PATH: &str = "/user/index";

/// Compiled HTML templates. Built once per process and shared through `AppState`.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("layout.html", include_str!("../templates/layout.html")),
            ("login.html", include_str!("../templates/login.html")),
            ("not_authorized.html", include_str!("../templates/not_authorized.html")),
            ("patients.html", include_str!("../templates/patients.html")),
            ("patient_form.html", include_str!("../templates/patient_form.html")),
            ("error.html", include_str!("../templates/error.html")),
        ])?;
        Ok(Self { tera })
    }

    pub fn render_html(&self, template: &str, context: &Context) -> Result<String, tera::Error> {
        self.tera.render(template, context)
    }

    /// Render a template into a `200 OK` HTML response.
    pub fn page(&self, template: &str, context: &Context) -> Result<Response<Body>, Error> {
        self.page_with_status(template, context, StatusCode::OK)
    }

    pub fn page_with_status(
        &self,
        template: &str,
        context: &Context,
        status: StatusCode,
    ) -> Result<Response<Body>, Error> {
        let html = self.render_html(template, context)?;
        Ok(Response::builder()
            .status(status)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(html.into())
            .map_err(Box::new)?)
    }

    /// Plain error page. Falls back to static text if the template itself fails.
    pub fn error_page(&self, status: StatusCode, message: &str) -> Result<Response<Body>, Error> {
        let mut context = base_context(None);
        context.insert("status", &status.as_u16());
        context.insert("message", message);
        let html = self
            .render_html("error.html", &context)
            .unwrap_or_else(|_| format!("{} {}", status.as_u16(), message));

        Ok(Response::builder()
            .status(status)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(html.into())
            .map_err(Box::new)?)
    }
}

/// Context shared by every page: who is signed in and whether they see admin controls.
pub fn base_context(subject: Option<&CredentialSubject>) -> Context {
    let mut context = Context::new();
    context.insert("username", subject.map(|s| s.username.as_str()).unwrap_or(""));
    context.insert("is_admin", &subject.is_some_and(|s| s.is_admin()));
    context
}

/// `302 Found` to `location`.
pub fn redirect(location: &str) -> Result<Response<Body>, Error> {
    redirect_with_cookies(location, Vec::new())
}

pub fn redirect_with_cookies(location: &str, cookies: Vec<String>) -> Result<Response<Body>, Error> {
    let mut response = Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", location)
        .body(Body::Empty)
        .map_err(Box::new)?;

    let headers = response.headers_mut();
    for cookie in cookies {
        headers.append("Set-Cookie", cookie.parse()?);
    }

    Ok(response)
}

/// The listing URL that keeps the caller on the same filtered page.
pub fn listing_location(page: u32, keyword: &str) -> String {
    format!(
        "{}?page={}&keyword={}",
        LISTING_PATH,
        page,
        urlencoding::encode(keyword)
    )
}
