use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use ntex::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use ntex::http::StatusCode;
use ntex::time::Seconds;
use ntex::util::Bytes;
use ntex::web;
use ntex::web::HttpRequest;
use ntex_files::NamedFile;
use regex::Regex;
use spdlog::{error, info, warn};

use crate::config::{Config, Site};
use crate::content_store::ContentStore;
use crate::error::BlogError;
use crate::post_index::{build_index, Index};
use crate::sitemap::Sitemap;
use crate::text_utils::is_valid_slug;
use crate::view::Templates;

/// Largest accepted upload request body, multipart framing included.
pub const MAX_UPLOAD_SIZE: usize = 1024 * 1024;

const UPLOAD_FIELD: &str = "file";
const STATIC_CACHE_CONTROL: &str = "public, max-age=3600";
const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /a/*\n";

const BUILTIN_APP_JS: &str = include_str!("../res/static/app.js");
const BUILTIN_STYLE_CSS: &str = include_str!("../res/static/style.css");

pub struct AppState {
    pub store: ContentStore,
    pub templates: Templates,
    pub site: Site,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    fn current_index(&self, now: NaiveDateTime) -> Index {
        let mut index = build_index(now, self.store.list_all());
        index.sort_posts_by_date();
        index
    }
}

fn is_year(segment: &str) -> bool {
    lazy_static! {
        static ref YEAR_REGEX: Regex = Regex::new(r"^[1-9][0-9]+$").unwrap();
    }
    YEAR_REGEX.is_match(segment)
}

fn error_response(err: &BlogError) -> web::HttpResponse {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        info!("Request rejected ({}): {}", status.as_u16(), err);
    }

    web::HttpResponse::build(status)
        .content_type("text/plain; charset=utf-8")
        .body(err.to_string())
}

fn html_response(body: String) -> web::HttpResponse {
    web::HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

// Begin: List region --------
fn render_list(state: &AppState, year: Option<i32>) -> web::HttpResponse {
    let now = Utc::now().naive_utc();
    let index = state.current_index(now);

    if let Some(year) = year {
        if index.section(year).is_none() {
            return error_response(&BlogError::NotFound(format!("no posts in {}", year)));
        }
    }

    html_response(state.templates.list.render(&state.site, now.year(), &index, year))
}

#[web::get("/")]
async fn post_list(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    render_list(&state, None)
}

#[web::get("/{year}/")]
async fn year_list(path: web::types::Path<String>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let year = path.into_inner();
    match year.parse::<i32>() {
        Ok(y) if is_year(&year) => render_list(&state, Some(y)),
        _ => error_response(&BlogError::NotFound(year)),
    }
}

#[web::get("/{year}")]
async fn year_wo_slash(path: web::types::Path<String>) -> web::HttpResponse {
    let year = path.into_inner();
    if !is_year(&year) {
        return error_response(&BlogError::NotFound(year));
    }

    web::HttpResponse::TemporaryRedirect()
        .header("Location", format!("/{}/", year))
        .content_type("text/html; charset=utf-8")
        .finish()
}
// End: List region --------

// Begin: Post region --------
fn render_post(state: &AppState, year: &str, slug: &str, resource: Option<&str>) -> web::HttpResponse {
    if !is_year(year) {
        return error_response(&BlogError::NotFound(year.to_string()));
    }
    if !is_valid_slug(slug) || !resource.map_or(true, is_valid_slug) {
        return error_response(&BlogError::Validation("no such post exists".to_string()));
    }

    match state.store.lookup(slug) {
        Ok(post) => {
            let this_year = Utc::now().year();
            html_response(state.templates.detail.render(&state.site, this_year, &post))
        }
        Err(e) => error_response(&e),
    }
}

#[web::get("/{year}/{slug}")]
async fn post_detail(path: web::types::Path<(String, String)>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let (year, slug) = path.into_inner();
    render_post(&state, &year, &slug, None)
}

#[web::get("/{year}/{slug}/{resource}")]
async fn post_resource(path: web::types::Path<(String, String, String)>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let (year, slug, resource) = path.into_inner();
    render_post(&state, &year, &slug, Some(&resource))
}
// End: Post region --------

// Begin: Upload region --------
#[derive(Debug, PartialEq)]
pub struct Upload {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Pulls the `file` field out of a `multipart/form-data` body.
pub async fn read_upload(content_type: Option<&str>, body: Bytes) -> Result<Upload, BlogError> {
    let content_type = content_type
        .ok_or_else(|| BlogError::Validation("missing post data".to_string()))?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| BlogError::Validation(format!("missing post data: {}", e)))?;

    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new()
            .whole_stream(MAX_UPLOAD_SIZE as u64)
            .per_field(MAX_UPLOAD_SIZE as u64));

    let data = bytes::Bytes::copy_from_slice(&body);
    let stream = futures::stream::once(async move { Ok::<bytes::Bytes, Infallible>(data) });
    let mut multipart = multer::Multipart::with_constraints(stream, boundary, constraints);

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(BlogError::Validation(format!("missing \"{}\" field", UPLOAD_FIELD))),
            Err(e) => return Err(BlogError::Validation(format!("upload too large: {}", e))),
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content = field.bytes().await
            .map_err(|e| BlogError::Validation(format!("upload too large: {}", e)))?;

        return Ok(Upload {
            file_name,
            content: content.to_vec(),
        });
    }
}

async fn handle_upload(req: &HttpRequest, body: Bytes, state: &AppState) -> web::HttpResponse {
    let content_type = req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let upload = match read_upload(content_type, body).await {
        Ok(upload) => upload,
        Err(e) => return error_response(&e),
    };

    match state.store.ingest(&upload.file_name, &upload.content) {
        Ok(post) => web::HttpResponse::SeeOther()
            .header("Location", post.link())
            .finish(),
        Err(e) => error_response(&e),
    }
}

#[web::post("/a/new")]
async fn upload_new(req: HttpRequest, body: Bytes, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    handle_upload(&req, body, &state).await
}

#[web::post("/a/{slug}")]
async fn upload_for_slug(
    req: HttpRequest,
    path: web::types::Path<String>,
    body: Bytes,
    state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let slug = path.into_inner();
    if !is_valid_slug(&slug) {
        return error_response(&BlogError::Validation(format!("invalid slug: {:?}", slug)));
    }
    handle_upload(&req, body, &state).await
}
// End: Upload region --------

#[web::get("/robots.txt")]
async fn robots() -> web::HttpResponse {
    web::HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(ROBOTS_TXT)
}

fn sitemap_response(state: &AppState) -> web::HttpResponse {
    let index = state.current_index(Utc::now().naive_utc());
    match Sitemap::from_index(&state.site.base_url, &index).render() {
        Ok(xml) => web::HttpResponse::Ok()
            .content_type("text/xml; charset=utf-8")
            .body(xml),
        Err(e) => error_response(&BlogError::Internal(format!("failed to encode sitemap: {}", e))),
    }
}

#[web::get("/sitemap.xml")]
async fn sitemap(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    sitemap_response(&state)
}

#[web::get("/about")]
async fn about(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    sitemap_response(&state)
}

#[web::get("/index.json")]
async fn index_json(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let index = state.current_index(Utc::now().naive_utc());
    match serde_json::to_string(&index) {
        Ok(json) => web::HttpResponse::Ok()
            .content_type("application/json")
            .body(json),
        Err(e) => error_response(&BlogError::Internal(format!("failed to encode index: {}", e))),
    }
}

// Begin: Static region --------
fn is_static_name(file: &str) -> bool {
    !file.starts_with('.') && is_valid_slug(file)
}

#[web::get("/{file}")]
async fn static_files(path: web::types::Path<String>, state: web::types::State<Arc<AppState>>) -> Result<NamedFile, web::Error> {
    let file = path.into_inner();
    let Some(ref static_dir) = state.static_dir else {
        return Err(web::error::ErrorNotFound("No static directory").into());
    };
    if !is_static_name(&file) {
        return Err(web::error::ErrorNotFound("Not found").into());
    }

    Ok(NamedFile::open(static_dir.join(file))?)
}

#[web::get("/{file}")]
async fn builtin_files(path: web::types::Path<String>) -> web::HttpResponse {
    let (content_type, body) = match path.as_str() {
        "app.js" => ("application/javascript; charset=utf-8", BUILTIN_APP_JS),
        "style.css" => ("text/css; charset=utf-8", BUILTIN_STYLE_CSS),
        _ => return web::HttpResponse::NotFound().finish(),
    };

    web::HttpResponse::Ok()
        .content_type(content_type)
        .body(body)
}

fn static_scope(cfg: &mut web::ServiceConfig, has_static_dir: bool, development: bool) {
    let scope = web::scope("/r");
    let scope = if has_static_dir {
        scope.service(static_files)
    } else {
        scope.service(builtin_files)
    };

    if development {
        cfg.service(scope);
    } else {
        cfg.service(scope.wrap(web::middleware::DefaultHeaders::new().header(CACHE_CONTROL, STATIC_CACHE_CONTROL)));
    }
}
// End: Static region --------

/// Every route of the site. Fixed paths come before the `/{year}` patterns.
pub fn configure_routes(cfg: &mut web::ServiceConfig, has_static_dir: bool, development: bool) {
    static_scope(cfg, has_static_dir, development);
    cfg.service(post_list)
        .service(robots)
        .service(sitemap)
        .service(about)
        .service(index_json)
        .service(upload_new)
        .service(upload_for_slug)
        .service(year_wo_slash)
        .service(year_list)
        .service(post_detail)
        .service(post_resource);
}

pub async fn server_run(config: Config, store: ContentStore) -> anyhow::Result<()> {
    let templates = Templates::load(config.paths.template_dir.as_deref())?;
    let development = config.site.development;
    let has_static_dir = config.paths.static_dir.is_some();
    if development {
        warn!("Development mode: static files are served without cache headers and drafts are listed");
    }

    info!("Serving {} posts", store.len());

    let bind_addr = config.server.address.clone();
    let bind_port = config.server.port;
    let app_state = Arc::new(AppState {
        store,
        templates,
        site: config.site,
        static_dir: config.paths.static_dir,
    });

    web::HttpServer::new(move || {
        web::App::new()
            .state(app_state.clone())
            .state(web::types::PayloadConfig::new(MAX_UPLOAD_SIZE))
            .configure(|cfg| configure_routes(cfg, has_static_dir, development))
    })
        .client_timeout(Seconds(10))
        .disconnect_timeout(Seconds(10))
        .bind((bind_addr, bind_port))?
        .run()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use ntex::web::test;

    use crate::config::Config;
    use crate::storage::MemoryStorage;
    use crate::test_data::{post_with_date, POST_DATA};

    use super::*;

    const BOUNDARY: &str = "quire-boundary";

    fn multipart_body(field: &str, file_name: &str, content: &str) -> String {
        format!("--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
Content-Type: text/markdown\r\n\r\n{content}\r\n--{b}--\r\n", b = BOUNDARY, field = field, file_name = file_name, content = content)
    }

    fn multipart_fields(fields: &[(&str, &str, &str)]) -> String {
        let mut body = String::new();
        for (field, file_name, content) in fields {
            body.push_str(&format!("--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
Content-Type: text/markdown\r\n\r\n{content}\r\n", b = BOUNDARY, field = field, file_name = file_name, content = content));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    fn app_state(development: bool) -> Arc<AppState> {
        let mut site = Config::default().site;
        site.development = development;
        Arc::new(AppState {
            store: ContentStore::open(Arc::new(MemoryStorage::new())).unwrap(),
            templates: Templates::load(None).unwrap(),
            site,
            static_dir: None,
        })
    }

    macro_rules! app {
        ($state:expr, $development:expr) => {
            test::init_service(
                web::App::new()
                    .state($state.clone())
                    .state(web::types::PayloadConfig::new(MAX_UPLOAD_SIZE))
                    .configure(|cfg| configure_routes(cfg, false, $development))
            ).await
        };
    }

    #[test]
    fn test_is_year() {
        assert!(is_year("2023"));
        assert!(is_year("10"));
        assert!(!is_year("0123"));
        assert!(!is_year("7"));
        assert!(!is_year("robots.txt"));
    }

    #[ntex::test]
    async fn test_read_upload() {
        let body = multipart_body("file", "hello.md", "# Hi");
        let upload = read_upload(Some(&content_type()), Bytes::from(body)).await.unwrap();
        assert_eq!(upload, Upload {
            file_name: "hello.md".to_string(),
            content: b"# Hi".to_vec(),
        });
    }

    #[ntex::test]
    async fn test_read_upload_errors() {
        let err = read_upload(None, Bytes::from_static(b"")).await.unwrap_err();
        assert!(matches!(err, BlogError::Validation(_)));

        let err = read_upload(Some("text/plain"), Bytes::from_static(b"")).await.unwrap_err();
        assert!(matches!(err, BlogError::Validation(_)));

        let body = multipart_body("other", "hello.md", "# Hi");
        let err = read_upload(Some(&content_type()), Bytes::from(body)).await.unwrap_err();
        assert_eq!(err.to_string(), "missing \"file\" field");

        let big = "a".repeat(MAX_UPLOAD_SIZE + 1);
        let body = multipart_body("file", "big.md", &big);
        let err = read_upload(Some(&content_type()), Bytes::from(body)).await.unwrap_err();
        assert!(matches!(err, BlogError::Validation(_)));
    }

    #[ntex::test]
    async fn test_read_upload_caps_whole_body() {
        let half = "a".repeat(MAX_UPLOAD_SIZE * 3 / 5);
        let body = multipart_fields(&[("pad", "pad.md", &half), ("file", "hello.md", &half)]);
        assert!(body.len() > MAX_UPLOAD_SIZE);
        let err = read_upload(Some(&content_type()), Bytes::from(body)).await.unwrap_err();
        assert!(matches!(err, BlogError::Validation(_)));
    }

    #[ntex::test]
    async fn test_upload_body_over_limit() {
        let state = app_state(false);
        let app = app!(state, false);

        let half = "a".repeat(MAX_UPLOAD_SIZE * 3 / 5);
        let req = test::TestRequest::post()
            .uri("/a/new")
            .header(CONTENT_TYPE, content_type())
            .set_payload(multipart_fields(&[("pad", "pad.md", &half), ("file", "hello.md", POST_DATA)]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.is_empty());
    }

    #[ntex::test]
    async fn test_upload_then_view() {
        let state = app_state(false);
        let app = app!(state, false);

        let req = test::TestRequest::post()
            .uri("/a/new")
            .header(CONTENT_TYPE, content_type())
            .set_payload(multipart_body("file", "hello.md", POST_DATA))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get("Location").unwrap(), "/2023/hello-world");

        let req = test::TestRequest::get().uri("/2023/hello-world").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains("<h1>Hi</h1>"));
        assert!(body.contains("Jane Doe"));

        let req = test::TestRequest::get().uri("/").to_request();
        let body = test::read_body(test::call_service(&app, req).await).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("/2023/hello-world"));
    }

    #[ntex::test]
    async fn test_upload_invalid_document() {
        let state = app_state(false);
        let app = app!(state, false);

        let req = test::TestRequest::post()
            .uri("/a/new")
            .header(CONTENT_TYPE, content_type())
            .set_payload(multipart_body("file", "bad.md", "---\ndate: 2023-13-1\n---\n"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.is_empty());

        let req = test::TestRequest::post()
            .uri("/a/new")
            .header(CONTENT_TYPE, content_type())
            .set_payload(multipart_body("file", "../escape.md", "# Hi"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[ntex::test]
    async fn test_slug_validation() {
        let state = app_state(false);
        state.store.ingest("a.md", post_with_date("known", "2020-1-1").as_bytes()).unwrap();
        let app = app!(state, false);

        let cases = [
            ("/2020/known", StatusCode::OK),
            ("/2020/known/image.png", StatusCode::OK),
            ("/2020/unknown", StatusCode::NOT_FOUND),
            ("/2020/bad_slug", StatusCode::BAD_REQUEST),
            ("/2020/known/bad_resource", StatusCode::BAD_REQUEST),
            ("/2020/known~", StatusCode::BAD_REQUEST),
            ("/abc/known", StatusCode::NOT_FOUND),
        ];
        for (uri, status) in cases {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), status, "{}", uri);
        }

        let req = test::TestRequest::get().uri("/abc/known").to_request();
        let body = test::read_body(test::call_service(&app, req).await).await;
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains("abc"));
        assert!(!body.contains("known"));
    }

    #[ntex::test]
    async fn test_upload_unservable_slug() {
        let state = app_state(false);
        let app = app!(state, false);

        let req = test::TestRequest::post()
            .uri("/a/new")
            .header(CONTENT_TYPE, content_type())
            .set_payload(multipart_body("file", "my_post.md", "# Hi"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.is_empty());
    }

    #[ntex::test]
    async fn test_year_pages() {
        let state = app_state(false);
        state.store.ingest("a.md", post_with_date("old", "2020-1-1").as_bytes()).unwrap();
        let app = app!(state, false);

        let req = test::TestRequest::get().uri("/2020").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(resp.headers().get("Location").unwrap(), "/2020/");

        let req = test::TestRequest::get().uri("/2020/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/2019/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[ntex::test]
    async fn test_fixed_routes() {
        let state = app_state(false);
        state.store.ingest("a.md", post_with_date("old", "2020-1-1").as_bytes()).unwrap();
        let app = app!(state, false);

        let req = test::TestRequest::get().uri("/robots.txt").to_request();
        let body = test::read_body(test::call_service(&app, req).await).await;
        assert_eq!(&body[..], ROBOTS_TXT.as_bytes());

        for uri in ["/sitemap.xml", "/about"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let body = test::read_body(resp).await;
            let body = std::str::from_utf8(&body).unwrap();
            assert!(body.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
            assert!(body.contains("<loc>http://localhost:7777/2020/old</loc>"));
        }

        let req = test::TestRequest::get().uri("/index.json").to_request();
        let body = test::read_body(test::call_service(&app, req).await).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["sections"][0]["slug"], "2020");
        assert_eq!(json["sections"][0]["posts"][0]["slug"], "old");
    }

    #[ntex::test]
    async fn test_static_cache_headers() {
        let state = app_state(false);
        let app = app!(state, false);
        let req = test::TestRequest::get().uri("/r/app.js").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(CACHE_CONTROL).unwrap(), STATIC_CACHE_CONTROL);

        let state = app_state(true);
        let app = app!(state, true);
        let req = test::TestRequest::get().uri("/r/app.js").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(CACHE_CONTROL).is_none());
    }
}
