use actix_cors::Cors;
use actix_files::Files;
use actix_utils::future::{ready, Ready};
use actix_web::{
    dev::{self, ServiceResponse},
    error,
    http::{
        header::{self, ContentType},
        StatusCode,
    },
    middleware::{Compress, ErrorHandlerResponse, ErrorHandlers, Logger},
    route,
    web::{self, Data},
    App, FromRequest, HttpRequest, HttpResponse, HttpServer, Responder, Result,
};
use actix_web_lab::respond::Html;
use chrono::{Datelike, Local};
use dotenv::dotenv;
use minijinja_autoreload::AutoReloader;
use prometheus::{Registry, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use terminplan::calendar::layout::{
    BucketRef, DayView, MonthView, Overlay, ViewMode, ViewState, WeekView, YearView,
};
use terminplan::calendar::remote::RemoteEventSource;
use terminplan::calendar::{
    EventLoad, EventSource, EventSourceKind, EventStore, Lookup, StoreEventSource,
};
use terminplan::metrics::CalendarMetrics;
use terminplan::{AppConfig, SiteConfig};

struct MiniJinjaRenderer {
    tmpl_env: Data<AutoReloader>,
}

impl MiniJinjaRenderer {
    fn render(&self, tmpl: &str, ctx: impl Into<minijinja::value::Value>) -> Result<Html> {
        self.tmpl_env
            .acquire_env()
            .map_err(|_| error::ErrorInternalServerError("could not acquire template env"))?
            .get_template(tmpl)
            .map_err(|_| error::ErrorInternalServerError("could not find template"))?
            .render(ctx.into())
            .map(Html)
            .map_err(|err| {
                log::error!("{err}");
                error::ErrorInternalServerError("template error")
            })
    }
}

impl FromRequest for MiniJinjaRenderer {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _pl: &mut dev::Payload) -> Self::Future {
        let tmpl_env = <Data<AutoReloader>>::extract(req).into_inner().unwrap();

        ready(Ok(Self { tmpl_env }))
    }
}

/// Query parameters carrying the calendar UI state between requests.
#[derive(Debug, Deserialize)]
struct PageQuery {
    view: Option<String>,
    date: Option<String>,
    bucket: Option<String>,
    notice: Option<String>,
}

/// Hidden form fields returning the user to the view they came from.
#[derive(Debug, Default, Deserialize)]
struct ReturnTo {
    view: Option<String>,
    date: Option<String>,
}

/// The write operations the UI accepts but does not persist. Each one only
/// produces a notification stating that it is unimplemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
    Create,
    Edit,
    Delete,
}

impl Notice {
    fn from_code(code: &str) -> Option<Notice> {
        match code {
            "create" => Some(Notice::Create),
            "edit" => Some(Notice::Edit),
            "delete" => Some(Notice::Delete),
            _ => None,
        }
    }

    fn code(self) -> &'static str {
        match self {
            Notice::Create => "create",
            Notice::Edit => "edit",
            Notice::Delete => "delete",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Notice::Create => {
                "Event not created. (Backend persistence not yet fully implemented for POST/PUT/DELETE)"
            }
            Notice::Edit => "Edit functionality is not implemented yet.",
            Notice::Delete => "Delete functionality is not implemented yet.",
        }
    }
}

/// Plain-text liveness probe.
#[route("/", method = "GET", method = "HEAD")]
async fn liveness() -> impl Responder {
    "Calendar Backend is running!"
}

#[route("/api/calendar-events", method = "GET")]
async fn api_calendar_events(store: Data<EventStore>) -> impl Responder {
    HttpResponse::Ok().json(store.all())
}

#[route("/api/calendar-meeting/{id}", method = "GET")]
async fn api_calendar_meeting(
    store: Data<EventStore>,
    metrics: Data<CalendarMetrics>,
    path: web::Path<String>,
) -> impl Responder {
    // Non-numeric ids simply miss both lookup sources, they are not a client
    // error.
    let lookup = match path.parse::<i64>() {
        Ok(id) => store.lookup(id),
        Err(_) => Lookup::Miss,
    };

    metrics.lookups_total((&lookup).into()).inc();

    match lookup.event() {
        Some(event) => HttpResponse::Ok().json(event),
        None => HttpResponse::NotFound().json(serde_json::json!({ "message": "Meeting not found" })),
    }
}

#[route("/metrics", method = "GET")]
async fn metrics_export(registry: Data<Registry>) -> Result<impl Responder> {
    let body = TextEncoder::new()
        .encode_to_string(&registry.gather())
        .map_err(|err| {
            log::error!("failed to encode metrics: {err}");
            error::ErrorInternalServerError("metrics encoding failed")
        })?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

#[route("/calendar", method = "GET", method = "HEAD")]
async fn calendar_page(
    tmpl_env: MiniJinjaRenderer,
    source: Data<dyn EventSource>,
    metrics: Data<CalendarMetrics>,
    site: Data<SiteConfig>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder> {
    let now = Local::now().naive_local();
    let state = ViewState::resolve(query.view.as_deref(), query.date.as_deref(), now.date());

    metrics.renders_total(state.mode).inc();

    let notice = query.notice.as_deref().and_then(Notice::from_code);
    let bucket = query.bucket.as_deref().and_then(BucketRef::parse);

    let mut day = None;
    let mut week = None;
    let mut month = None;
    let mut year = None;
    let mut overlay = None;
    let mut load_error = None;

    match EventLoad::fetch(source.get_ref()).await {
        EventLoad::Loaded(events) => {
            match state.mode {
                ViewMode::Day => day = Some(DayView::build(&events, state.date, now)),
                ViewMode::Week => week = Some(WeekView::build(&events, state.date, now)),
                ViewMode::Month => month = Some(MonthView::build(&events, state.date, now)),
                ViewMode::Year => {
                    year = Some(YearView::build(&events, state.date.year(), now.date()))
                }
            }

            overlay = bucket.map(|bucket| Overlay::build(&events, bucket));
        }
        EventLoad::Failed(reason) => {
            load_error = Some(format!("Failed to load calendar events: {reason}"));
        }
    }

    tmpl_env.render(
        "calendar.html",
        minijinja::context! {
            site => site.get_ref(),
            nav => state.nav(now.date()),
            view => state.mode.as_str(),
            day,
            week,
            month,
            year,
            overlay,
            load_error,
            notice => notice.map(Notice::message),
        },
    )
}

#[route("/calendar/events/new", method = "GET")]
async fn new_event_form(
    tmpl_env: MiniJinjaRenderer,
    site: Data<SiteConfig>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder> {
    let now = Local::now().naive_local();
    let state = ViewState::resolve(query.view.as_deref(), query.date.as_deref(), now.date());

    tmpl_env.render(
        "new.html",
        minijinja::context! {
            site => site.get_ref(),
            view => state.mode.as_str(),
            date => state.date.to_string(),
        },
    )
}

#[route("/calendar/events/{id}", method = "GET")]
async fn event_detail(
    tmpl_env: MiniJinjaRenderer,
    source: Data<dyn EventSource>,
    site: Data<SiteConfig>,
    path: web::Path<String>,
) -> Result<impl Responder> {
    let event = match path.parse::<i64>() {
        Ok(id) => source.fetch_event(id).await.map_err(|err| {
            log::error!("failed to fetch event {id}: {err}");
            error::ErrorInternalServerError("event fetch failed")
        })?,
        Err(_) => None,
    };

    let event = event.ok_or_else(|| error::ErrorNotFound("Meeting not found"))?;

    tmpl_env.render(
        "event.html",
        minijinja::context! {
            site => site.get_ref(),
            event => minijinja::value::Value::from_struct_object(event),
        },
    )
}

#[route("/calendar/events", method = "POST")]
async fn create_event(form: Option<web::Form<ReturnTo>>) -> impl Responder {
    see_other(form, Notice::Create)
}

#[route("/calendar/events/{id}/edit", method = "POST")]
async fn edit_event(path: web::Path<String>, form: Option<web::Form<ReturnTo>>) -> impl Responder {
    log::info!("edit requested for event {path}, which is not implemented");
    see_other(form, Notice::Edit)
}

#[route("/calendar/events/{id}/delete", method = "POST")]
async fn delete_event(
    path: web::Path<String>,
    form: Option<web::Form<ReturnTo>>,
) -> impl Responder {
    log::info!("delete requested for event {path}, which is not implemented");
    see_other(form, Notice::Delete)
}

/// Redirects back to the calendar with a notification, keeping the view and
/// date the request came from.
fn see_other(form: Option<web::Form<ReturnTo>>, notice: Notice) -> HttpResponse {
    let ret = form.map(web::Form::into_inner).unwrap_or_default();

    let mut location = format!("/calendar?notice={}", notice.code());

    if let Some(view) = ret.view.as_deref().filter(|view| query_safe(view)) {
        location.push_str(&format!("&view={view}"));
    }

    if let Some(date) = ret.date.as_deref().filter(|date| query_safe(date)) {
        location.push_str(&format!("&date={date}"));
    }

    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn query_safe(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[actix_web::main]
async fn main() -> terminplan::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load()?;

    log::info!(
        "loading calendar events from {} and {}",
        config.calendar.events_file.display(),
        config.calendar.meeting_file.display()
    );

    let store = Arc::new(EventStore::from_paths(
        &config.calendar.events_file,
        &config.calendar.meeting_file,
    )?);

    log::info!("loaded {} calendar events", store.len());

    let event_source: Arc<dyn EventSource> = match config.calendar.event_source {
        EventSourceKind::Store => Arc::new(StoreEventSource::new(store.clone())),
        EventSourceKind::Remote => {
            let base_url = config
                .calendar
                .api_base_url
                .clone()
                .unwrap_or_else(|| format!("http://{}", config.server.listen_addr));

            log::info!("calendar UI will fetch events from {base_url}");
            Arc::new(RemoteEventSource::new(base_url)?)
        }
    };

    let registry = Registry::new();
    let metrics = CalendarMetrics::new()?;
    metrics.register(&registry)?;
    metrics.events_total().set(store.len() as i64);

    if config.server.template_autoreload {
        log::info!("template auto-reloading is enabled");
    } else {
        log::info!(
            "template auto-reloading is disabled; run with TP_SERVER__TEMPLATE_AUTORELOAD=true to enable"
        );
    }

    let template_dir = config.server.template_dir.clone();
    let template_autoreload = config.server.template_autoreload;

    // The closure is invoked every time the environment is outdated to recreate it.
    let tmpl_reloader = AutoReloader::new(move |notifier| {
        let mut env = minijinja::Environment::new();

        // if watch_path is never called, no fs watcher is created
        if template_autoreload {
            notifier.watch_path(&template_dir, true);
        }

        env.set_loader(minijinja::path_loader(&template_dir));

        Ok(env)
    });

    let tmpl_reloader = Data::new(tmpl_reloader);
    let store = Data::from(store);
    let event_source = Data::from(event_source);
    let metrics = Data::new(metrics);
    let registry = Data::new(registry);
    let site = Data::new(config.site.clone());
    let static_dir = config.server.static_dir.clone();

    log::info!("starting HTTP server at {}", config.server.listen_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .app_data(event_source.clone())
            .app_data(metrics.clone())
            .app_data(registry.clone())
            .app_data(site.clone())
            .app_data(tmpl_reloader.clone())
            .service(liveness)
            .service(api_calendar_events)
            .service(api_calendar_meeting)
            .service(metrics_export)
            .service(new_event_form)
            .service(event_detail)
            .service(create_event)
            .service(edit_event)
            .service(delete_event)
            .service(calendar_page)
            .service(Files::new("/static", &static_dir))
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, not_found)
                    .handler(StatusCode::INTERNAL_SERVER_ERROR, internal_server_error),
            )
            .wrap(Cors::permissive())
            .wrap(Compress::default())
            // Don't log things that could identify the user, e.g. omit client IP, referrer and
            // user agent.
            .wrap(Logger::new(r#""%r" %s %b %T"#))
    })
    .workers(2)
    .bind(config.server.listen_addr)?
    .run()
    .await?;

    Ok(())
}

/// Error handler for a 404 Page not found error.
fn not_found<B>(svc_res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_handler(svc_res, "not_found.html")
}

/// Error handler for a 500 Internal server error.
fn internal_server_error<B>(svc_res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_handler(svc_res, "error.html")
}

/// Generic error handler.
fn error_handler<B>(svc_res: ServiceResponse<B>, tmpl: &str) -> Result<ErrorHandlerResponse<B>> {
    // API errors already carry a JSON body.
    let is_json = svc_res
        .response()
        .headers()
        .get(header::CONTENT_TYPE)
        .map_or(false, |value| value.as_bytes().starts_with(b"application/json"));

    if is_json {
        return Ok(ErrorHandlerResponse::Response(
            svc_res.map_into_left_body(),
        ));
    }

    let req = svc_res.request();

    let reason = svc_res
        .status()
        .canonical_reason()
        .unwrap_or("Unknown error");
    let tmpl_env = MiniJinjaRenderer::extract(req).into_inner().unwrap();

    // Provide a fallback to a simple plain text response in case an error occurs during the
    // rendering of the error page.
    let fallback = |err: &str| {
        HttpResponse::build(svc_res.status())
            .content_type(ContentType::plaintext())
            .body(err.to_string())
    };

    let ctx = minijinja::context! {
        status_code => svc_res.status().as_str(),
        reason => reason,
    };

    let res = match tmpl_env.render(tmpl, ctx) {
        Ok(body) => body
            .customize()
            .with_status(svc_res.status())
            .respond_to(req)
            .map_into_boxed_body(),
        Err(_) => fallback(reason),
    };

    Ok(ErrorHandlerResponse::Response(ServiceResponse::new(
        svc_res.into_parts().0,
        res.map_into_right_body(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use terminplan::calendar::Event;

    fn event(id: i64, start: &str, end: &str) -> Event {
        serde_json::from_str(&format!(
            r#"{{"id": {id}, "summary": "Round {id}", "start": "{start}", "end": "{end}"}}"#
        ))
        .unwrap()
    }

    fn store() -> Arc<EventStore> {
        Arc::new(EventStore::new(
            vec![
                event(3, "2024-08-29T18:00:00", "2024-08-29T18:40:00"),
                event(1, "2024-08-29T09:00:00", "2024-08-29T09:30:00"),
                event(2, "2024-08-30T11:00:00", "2024-08-30T12:00:00"),
            ],
            event(9, "2024-09-02T14:00:00", "2024-09-02T15:00:00"),
        ))
    }

    fn site() -> SiteConfig {
        SiteConfig {
            title: "Terminplan".into(),
            tagline: "Interview scheduling calendar".into(),
            description: None,
            links: vec![],
        }
    }

    fn template_env() -> Data<AutoReloader> {
        Data::new(AutoReloader::new(|_notifier| {
            let mut env = minijinja::Environment::new();
            env.set_loader(minijinja::path_loader("templates"));
            Ok(env)
        }))
    }

    #[actix_web::test]
    async fn liveness_responds_with_plain_text() {
        let app = test::init_service(App::new().service(liveness)).await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(res.status().is_success());

        let body = test::read_body(res).await;
        assert_eq!(body.as_ref(), b"Calendar Backend is running!");
    }

    #[actix_web::test]
    async fn event_listing_is_idempotent_and_ordered() {
        let app = test::init_service(
            App::new()
                .app_data(Data::from(store()))
                .service(api_calendar_events),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::get()
                .uri("/api/calendar-events")
                .to_request();
            let events: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;

            let ids: Vec<i64> = events
                .iter()
                .map(|event| event["id"].as_i64().unwrap())
                .collect();
            assert_eq!(ids, vec![3, 1, 2]);
        }
    }

    #[actix_web::test]
    async fn meeting_lookup_consults_both_sources() {
        let metrics = Data::new(CalendarMetrics::new().unwrap());
        let app = test::init_service(
            App::new()
                .app_data(Data::from(store()))
                .app_data(metrics.clone())
                .service(api_calendar_meeting),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/calendar-meeting/1")
            .to_request();
        let found: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found["id"], 1);

        let req = test::TestRequest::get()
            .uri("/api/calendar-meeting/9")
            .to_request();
        let fallback: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fallback["id"], 9);

        for id in ["42", "oops"] {
            let req = test::TestRequest::get()
                .uri(&format!("/api/calendar-meeting/{id}"))
                .to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND);

            let body: serde_json::Value = test::read_body_json(res).await;
            assert_eq!(body["message"], "Meeting not found");
        }

        use terminplan::metrics::LookupOutcome::*;
        assert_eq!(metrics.lookups_total(Primary).get(), 1);
        assert_eq!(metrics.lookups_total(Fallback).get(), 1);
        assert_eq!(metrics.lookups_total(Miss).get(), 2);
    }

    #[actix_web::test]
    async fn write_stubs_redirect_with_notifications() {
        let app = test::init_service(
            App::new()
                .service(create_event)
                .service(edit_event)
                .service(delete_event),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/calendar/events")
            .set_form([
                ("view", "week"),
                ("date", "2024-06-10"),
                ("summary", "Interview"),
            ])
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/calendar?notice=create&view=week&date=2024-06-10"
        );

        // Stubs tolerate a missing body.
        let req = test::TestRequest::post()
            .uri("/calendar/events/3/delete")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/calendar?notice=delete"
        );

        let req = test::TestRequest::post()
            .uri("/calendar/events/3/edit")
            .set_form([("view", "month"), ("date", "2024-06-01")])
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/calendar?notice=edit&view=month&date=2024-06-01"
        );
    }

    #[actix_web::test]
    async fn event_detail_page_renders_or_404s() {
        let source: Arc<dyn EventSource> = Arc::new(StoreEventSource::new(store()));
        let app = test::init_service(
            App::new()
                .app_data(Data::from(source))
                .app_data(Data::new(site()))
                .app_data(template_env())
                .service(event_detail),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/calendar/events/3")
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("Interview With"));
        assert!(html.contains("06:00 PM - 06:40 PM"));

        let req = test::TestRequest::get()
            .uri("/calendar/events/42")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn calendar_page_renders_each_view() {
        let source: Arc<dyn EventSource> = Arc::new(StoreEventSource::new(store()));
        let metrics = Data::new(CalendarMetrics::new().unwrap());
        let app = test::init_service(
            App::new()
                .app_data(Data::from(source))
                .app_data(metrics.clone())
                .app_data(Data::new(site()))
                .app_data(template_env())
                .service(calendar_page),
        )
        .await;

        // The unknown view falls back to the day view instead of failing.
        for view in ["day", "week", "month", "year", "agenda"] {
            let req = test::TestRequest::get()
                .uri(&format!("/calendar?view={view}&date=2024-08-29"))
                .to_request();
            let res = test::call_service(&app, req).await;
            assert!(res.status().is_success(), "view {view} failed");
        }

        assert_eq!(metrics.renders_total(ViewMode::Day).get(), 2);
        assert_eq!(metrics.renders_total(ViewMode::Year).get(), 1);

        // Opening an hour bucket renders the overlay with its events.
        let req = test::TestRequest::get()
            .uri("/calendar?view=day&date=2024-08-29&bucket=2024-08-29T18")
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("Round 3"));
        assert!(html.contains("6:00 PM - 6:40 PM"));
    }
}
