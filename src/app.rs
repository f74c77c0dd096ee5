#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]

use axum::{
    Extension, Form, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Local;
use handlebars::Handlebars;
use log::{error, info};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::form::{FormController, MemberForm, PaymentForm};
use crate::graph::{self, ChartOptions};
use crate::login::{
    Authenticator, CookieSettings, CredentialAuthenticator, CredentialConfig, Identity,
    SessionOutcome, SessionStore,
};
use crate::models::City;
use crate::store::{TableStore, XlsxStore};

const TEMPLATES: [(&str, &str); 7] = [
    ("login", include_str!("./static/login.hbs")),
    ("add_member", include_str!("./static/add_member.hbs")),
    ("record_payment", include_str!("./static/record_payment.hbs")),
    ("dashboard", include_str!("./static/dashboard.hbs")),
    ("members", include_str!("./static/members.hbs")),
    ("member", include_str!("./static/member.hbs")),
    ("error", include_str!("./static/error.hbs")),
];

const PARTIALS: [(&str, &str); 2] = [
    ("header", include_str!("./static/header.hbs")),
    ("footer", include_str!("./static/footer.hbs")),
];

/// Shared state handed to every handler
pub struct AppState {
    store: Box<dyn TableStore>,
    auth: Box<dyn Authenticator>,
    sessions: SessionStore,
    cookie: CookieSettings,
    currency: String,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(
        store: Box<dyn TableStore>,
        auth: Box<dyn Authenticator>,
        cookie: CookieSettings,
        currency: impl Into<String>,
    ) -> AppResult<Self> {
        let mut templates = Handlebars::new();
        for (name, source) in PARTIALS {
            templates
                .register_partial(name, source)
                .map_err(|e| AppError::Template(e.to_string()))?;
        }
        for (name, source) in TEMPLATES {
            templates
                .register_template_string(name, source)
                .map_err(|e| AppError::Template(e.to_string()))?;
        }

        Ok(AppState {
            store,
            auth,
            sessions: SessionStore::from_cookie(&cookie),
            cookie,
            currency: currency.into(),
            templates,
        })
    }

    /// State backed by the workbook and credential file named in `config`
    ///
    /// Both files are created with their defaults if missing.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let store = XlsxStore::new(&config.data_file);
        store.ensure_exists()?;
        info!("Using container {}", store.path().display());

        let credentials = CredentialConfig::load_or_init(&config.credentials_file)?;
        let auth = CredentialAuthenticator::new(&credentials);

        Self::new(
            Box::new(store),
            Box::new(auth),
            credentials.cookie,
            config.currency.clone(),
        )
    }

    fn controller(&self) -> FormController<'_> {
        FormController::new(self.store.as_ref())
    }

    fn render(&self, template: &str, status: StatusCode, data: Value) -> Response {
        match self.templates.render(template, &data) {
            Ok(body) => (status, Html(body)).into_response(),
            Err(e) => AppError::Template(e.to_string()).into_response(),
        }
    }

    fn page(&self, template: &str, identity: &Identity, mut data: Value) -> Value {
        if let Some(map) = data.as_object_mut() {
            map.insert("identity".to_string(), json!(identity));
            map.insert("currency".to_string(), json!(self.currency));
            map.insert(format!("tab_{}", template), json!(true));
        }
        data
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AuthRejected => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", self);
        }

        let body = format!(
            "<!DOCTYPE html><html><head><title>Error</title></head><body>\
             <h1>Something went wrong</h1><p>{}</p><p><a href=\"/\">Back</a></p></body></html>",
            handlebars::html_escape(&self.to_string())
        );
        (status, Html(body)).into_response()
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(|| async { Redirect::to("/members/new") }))
        .route("/members/new", get(serve_add_member))
        .route("/members", get(serve_members).post(handle_add_member))
        .route("/members/:id", get(serve_member))
        .route("/members.csv", get(download_csv))
        .route("/members.xlsx", get(download_xlsx))
        .route("/payments/new", get(serve_record_payment))
        .route("/payments", axum::routing::post(handle_record_payment))
        .route("/dashboard", get(serve_dashboard))
        .route("/charts/city.svg", get(city_chart))
        .route("/charts/month.svg", get(month_chart))
        .route("/logout", get(handle_logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/login", get(serve_login_page).post(handle_login))
        .merge(protected)
        .with_state(state)
}

/// Start the web server described by `config`
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_config(&config)?);
    let app = router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn session_identity(state: &AppState, jar: &CookieJar) -> Option<Identity> {
    jar.get(&state.cookie.name)
        .and_then(|cookie| state.sessions.validate(cookie.value()))
}

/// Authentication middleware
///
/// Lets the request through with the caller's [`Identity`] attached, or
/// redirects to the login page.
async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match session_identity(&state, &jar) {
        Some(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => Redirect::to("/login").into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

async fn serve_login_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if session_identity(&state, &jar).is_some() {
        return Redirect::to("/").into_response();
    }
    state.render(
        "login",
        StatusCode::OK,
        json!({ "warning": "Please enter your username and password" }),
    )
}

async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<LoginForm>,
) -> Response {
    match state
        .auth
        .authenticate(&credentials.username, &credentials.password)
    {
        SessionOutcome::Authenticated(identity) => {
            let token = match state.sessions.create(identity) {
                Ok(token) => token,
                Err(e) => return e.into_response(),
            };
            let cookie = Cookie::build((state.cookie.name.clone(), token))
                .path("/")
                .http_only(true)
                .max_age(time::Duration::days(i64::from(state.cookie.expiry_days)));
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        SessionOutcome::Rejected => state.render(
            "login",
            StatusCode::UNAUTHORIZED,
            json!({ "error": AppError::AuthRejected.to_string(), "username": credentials.username }),
        ),
        SessionOutcome::Pending => state.render(
            "login",
            StatusCode::OK,
            json!({ "warning": "Please enter your username and password" }),
        ),
    }
}

async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(&state.cookie.name) {
        state.sessions.revoke(cookie.value());
    }
    let removal = Cookie::build((state.cookie.name.clone(), "")).path("/");
    (jar.remove(removal), Redirect::to("/login"))
}

fn city_names() -> Vec<&'static str> {
    City::ALL.iter().map(|c| c.as_str()).collect()
}

fn money(amount: f64) -> String {
    format!("{:.2}", amount)
}

async fn serve_add_member(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let data = state.page(
        "add_member",
        &identity,
        json!({ "cities": city_names(), "form": MemberForm::default() }),
    );
    state.render("add_member", StatusCode::OK, data)
}

async fn handle_add_member(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<MemberForm>,
) -> Response {
    match state.controller().submit_member(&form) {
        Ok(id) => {
            let data = state.page(
                "add_member",
                &identity,
                json!({
                    "cities": city_names(),
                    "form": MemberForm::default(),
                    "success": format!("Member added with ID: {}", id),
                }),
            );
            state.render("add_member", StatusCode::OK, data)
        }
        Err(AppError::Validation(message)) => {
            let data = state.page(
                "add_member",
                &identity,
                json!({ "cities": city_names(), "form": form, "error": message }),
            );
            state.render("add_member", StatusCode::BAD_REQUEST, data)
        }
        Err(e) => e.into_response(),
    }
}

fn payment_page(
    state: &AppState,
    identity: &Identity,
    form: &PaymentForm,
    extra: Value,
) -> AppResult<Value> {
    let members: Vec<Value> = state
        .controller()
        .members()?
        .into_iter()
        .map(|m| {
            let id = m.id.to_string();
            json!({
                "id": id,
                "label": format!("{} - ID:{}", m.full_name, m.id),
                "selected": id == form.member_id,
            })
        })
        .collect();

    let mut data = json!({
        "has_members": !members.is_empty(),
        "members": members,
        "form": form,
        "today": Local::now().date_naive().format("%Y-%m-%d").to_string(),
    });
    if let (Some(map), Some(extra)) = (data.as_object_mut(), extra.as_object()) {
        map.extend(extra.clone());
    }
    Ok(state.page("record_payment", identity, data))
}

async fn serve_record_payment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    match payment_page(&state, &identity, &PaymentForm::default(), json!({})) {
        Ok(data) => state.render("record_payment", StatusCode::OK, data),
        Err(e) => e.into_response(),
    }
}

async fn handle_record_payment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<PaymentForm>,
) -> Response {
    let today = Local::now().date_naive();
    let (status, page) = match state.controller().submit_payment(&form, today) {
        Ok(_) => (
            StatusCode::OK,
            payment_page(
                &state,
                &identity,
                &PaymentForm::default(),
                json!({ "success": "Payment recorded successfully." }),
            ),
        ),
        Err(AppError::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            payment_page(&state, &identity, &form, json!({ "error": message })),
        ),
        Err(e) => return e.into_response(),
    };

    match page {
        Ok(data) => state.render("record_payment", status, data),
        Err(e) => e.into_response(),
    }
}

async fn serve_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let dashboard = match state.controller().dashboard() {
        Ok(dashboard) => dashboard,
        Err(e) => return e.into_response(),
    };

    let cities: Vec<Value> = dashboard
        .by_city
        .iter()
        .map(|(city, total)| json!({ "city": city.as_str(), "total": money(*total) }))
        .collect();
    let months: Vec<Value> = dashboard
        .by_month
        .iter()
        .map(|(month, total)| json!({ "month": month, "total": money(*total) }))
        .collect();

    let data = state.page(
        "dashboard",
        &identity,
        json!({
            "has_data": dashboard.has_data,
            "total_members": dashboard.summary.total_members,
            "total_payments": dashboard.summary.total_payments,
            "total_revenue": money(dashboard.summary.total_revenue),
            "cities": cities,
            "months": months,
        }),
    );
    state.render("dashboard", StatusCode::OK, data)
}

fn svg_response(svg: AppResult<String>) -> Response {
    match svg {
        Ok(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn city_chart(State(state): State<Arc<AppState>>) -> Response {
    let options = ChartOptions {
        title: "Revenue by city".to_string(),
        x_label: "City".to_string(),
        y_label: format!("Amount ({})", state.currency),
        ..ChartOptions::default()
    };
    svg_response(
        state
            .controller()
            .dashboard()
            .and_then(|d| graph::city_bar_chart(&d.by_city, &options)),
    )
}

async fn month_chart(State(state): State<Arc<AppState>>) -> Response {
    let options = ChartOptions {
        title: "Revenue by month".to_string(),
        x_label: "Month".to_string(),
        y_label: format!("Amount ({})", state.currency),
        ..ChartOptions::default()
    };
    svg_response(
        state
            .controller()
            .dashboard()
            .and_then(|d| graph::month_line_chart(&d.by_month, &options)),
    )
}

async fn serve_members(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let rows = match state.controller().members_overview() {
        Ok(rows) => rows,
        Err(e) => return e.into_response(),
    };

    let members: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut value = json!(row.member);
            if let Some(map) = value.as_object_mut() {
                map.insert("total_paid".to_string(), json!(money(row.total_paid)));
            }
            value
        })
        .collect();

    let data = state.page(
        "members",
        &identity,
        json!({ "has_members": !members.is_empty(), "members": members }),
    );
    state.render("members", StatusCode::OK, data)
}

async fn serve_member(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<u32>,
) -> Response {
    match state.controller().member_detail(id) {
        Ok(Some(detail)) => {
            let payments: Vec<Value> = detail
                .payments
                .iter()
                .map(|p| {
                    json!({
                        "id": p.id,
                        "payment_date": p.payment_date.format("%Y-%m-%d").to_string(),
                        "paid_months": p.paid_months,
                        "amount": money(p.amount),
                        "remarks": p.remarks,
                    })
                })
                .collect();
            let data = state.page(
                "members",
                &identity,
                json!({
                    "member": detail.member,
                    "payments": payments,
                    "total_paid": money(detail.total_paid),
                }),
            );
            state.render("member", StatusCode::OK, data)
        }
        Ok(None) => {
            let data = state.page(
                "members",
                &identity,
                json!({ "message": format!("No member with ID {}", id) }),
            );
            state.render("error", StatusCode::NOT_FOUND, data)
        }
        Err(e) => e.into_response(),
    }
}

async fn download_csv(State(state): State<Arc<AppState>>) -> Response {
    match state.controller().members_csv() {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"members.csv\""),
            ],
            csv,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn download_xlsx(State(state): State<Arc<AppState>>) -> Response {
    match state.controller().members_xlsx() {
        Ok(bytes) => (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"members.xlsx\""),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
