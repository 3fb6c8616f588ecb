use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use ink_cms::bootstrap::seed;
use ink_cms::config::CmsConfig;
use ink_cms::services::CmsParams;
use ink_cms::{build, Inkwell};
use ink_core::TenantContext;
use serde_json::{json, Value};
use tower::ServiceExt;

const MAIN: &str = "inkwell.test";
const BOUNDARY: &str = "inkwell-test-boundary";

async fn site() -> Inkwell {
    build(CmsConfig::for_tests().unwrap()).await.unwrap()
}

fn host_of(sub: &str) -> String {
    format!("{sub}.{MAIN}")
}

/// Creates a tenant with an admin `admin` / `secret123`.
async fn add_tenant(ink: &Inkwell, sub: &str) -> Value {
    ink.state
        .app
        .service("tenants")
        .unwrap()
        .create(
            TenantContext::new("0"),
            json!({
                "name": format!("{sub} blog"),
                "subdomain": sub,
                "title": format!("The {sub} blog"),
                "admin_email": format!("admin@{sub}.org"),
                "admin_username": "admin",
                "admin_password": "secret123",
            }),
            CmsParams::system(),
        )
        .await
        .unwrap()
}

fn request(method: &str, host: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut b = Request::builder().method(method).uri(uri).header("host", host);
    if let Some(token) = token {
        b = b.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => b
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => b.body(Body::empty()).unwrap(),
    }
}

async fn send(ink: &Inkwell, req: Request<Body>) -> axum::response::Response {
    ink.ax.router().oneshot(req).await.unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(res: axum::response::Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn login(ink: &Inkwell, host: &str, username: &str, password: &str) -> String {
    let res = send(
        ink,
        request(
            "POST",
            host,
            "/auth/login",
            None,
            Some(json!({"username": username, "password": password})),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["success"], true);
    body["accessToken"].as_str().unwrap().to_string()
}

async fn publish(ink: &Inkwell, host: &str, token: &str, post: Value) -> Value {
    let mut post = post;
    post["status"] = json!("published");
    let res = send(ink, request("POST", host, "/api/posts", Some(token), Some(post))).await;
    assert_eq!(res.status(), StatusCode::OK);
    json_body(res).await
}

fn multipart(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(host: &str, token: &str, filename: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/dashboard/media/upload")
        .header("host", host)
        .header("authorization", format!("Bearer {token}"))
        .header("x-requested-with", "XMLHttpRequest")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart(filename, "application/octet-stream", data)))
        .unwrap()
}

#[tokio::test]
async fn health_needs_no_tenant() {
    let ink = site().await;

    let res = send(&ink, request("GET", "nobody.example.com", "/health", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());

    let body = json_body(res).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "inkwell");
}

#[tokio::test]
async fn unknown_hosts_are_not_found() {
    let ink = site().await;

    let res = send(&ink, request("GET", &host_of("ghost"), "/", None, None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = send(&ink, request("GET", "blog.someone-else.com", "/", None, None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = send(&ink, request("GET", MAIN, "/", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn posts_stay_inside_their_tenant() {
    let ink = site().await;
    add_tenant(&ink, "acme").await;
    add_tenant(&ink, "beta").await;
    let acme = host_of("acme");
    let beta = host_of("beta");
    let acme_token = login(&ink, &acme, "admin", "secret123").await;
    let beta_token = login(&ink, &beta, "admin@beta.org", "secret123").await;

    let a = publish(&ink, &acme, &acme_token, json!({"title": "Acme news", "slug": "hello", "content": "<p>acme</p>"})).await;
    let b = publish(&ink, &beta, &beta_token, json!({"title": "Beta news", "slug": "hello", "content": "<p>beta</p>"})).await;
    assert_eq!(a["slug"], "hello");
    assert_eq!(b["slug"], "hello");

    let again = publish(&ink, &acme, &acme_token, json!({"title": "Acme again", "slug": "hello", "content": "x"})).await;
    assert_ne!(again["slug"], "hello");
    assert!(again["slug"].as_str().unwrap().starts_with("hello-"));

    let res = send(&ink, request("GET", &beta, "/post/hello", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = text_body(res).await;
    assert!(html.contains("Beta news"));
    assert!(!html.contains("Acme news"));

    let res = send(&ink, request("GET", &beta, "/api/posts", Some(&beta_token), None)).await;
    let listed = json_body(res).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let res = send(
        &ink,
        request("GET", &beta, &format!("/api/posts/{}", a["id"]), Some(&beta_token), None),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tokens_do_not_cross_tenants() {
    let ink = site().await;
    add_tenant(&ink, "acme").await;
    add_tenant(&ink, "beta").await;
    let acme_token = login(&ink, &host_of("acme"), "admin", "secret123").await;

    let res = send(&ink, request("GET", &host_of("beta"), "/api/posts", Some(&acme_token), None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = send(&ink, request("GET", &host_of("beta"), "/auth/me", Some(&acme_token), None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = send(&ink, request("GET", &host_of("acme"), "/auth/me", Some(&acme_token), None)).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn registered_users_are_editors_and_cannot_manage_users() {
    let ink = site().await;
    add_tenant(&ink, "acme").await;
    let acme = host_of("acme");

    let res = send(
        &ink,
        request(
            "POST",
            &acme,
            "/auth/register",
            None,
            Some(json!({"email": "ed@acme.org", "username": "ed", "password": "pencil99"})),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["user"]["role"], "editor");
    assert!(body["user"].get("password_hash").is_none());

    let editor = login(&ink, &acme, "ed", "pencil99").await;
    let admin = login(&ink, &acme, "admin", "secret123").await;

    let res = send(&ink, request("GET", &acme, "/api/users", Some(&editor), None)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = send(&ink, request("GET", &acme, "/api/users", Some(&admin), None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 2);

    let res = send(&ink, request("POST", &acme, "/auth/login", None, Some(json!({"username": "ed", "password": "nope"})))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn uploads_are_stored_and_served_per_tenant() {
    let ink = site().await;
    let acme_tenant = add_tenant(&ink, "acme").await;
    add_tenant(&ink, "beta").await;
    let acme = host_of("acme");
    let token = login(&ink, &acme, "admin", "secret123").await;

    let res = send(&ink, upload_request(&acme, &token, "notes.pdf", b"hello there")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["files"].as_array().unwrap().len(), 1);
    assert!(body["errors"].as_array().unwrap().is_empty());

    let url = body["file"]["file_url"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!("/uploads/{}/", acme_tenant["id"])));

    let res = send(&ink, request("GET", &acme, &url, None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(text_body(res).await, "hello there");

    let res = send(&ink, request("GET", &host_of("beta"), &url, None, None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_uploads_answer_with_success_false() {
    let ink = site().await;
    add_tenant(&ink, "acme").await;
    let acme = host_of("acme");
    let token = login(&ink, &acme, "admin", "secret123").await;

    let res = send(&ink, upload_request(&acme, &token, "tool.exe", b"MZ")).await;
    assert!(res.status().is_client_error());
    let body = json_body(res).await;
    assert_eq!(body["success"], false);
    assert!(!body["error"].as_str().unwrap().is_empty());

    let res = send(&ink, upload_request(&acme, "not-a-token", "notes.pdf", b"x")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["success"], false);
}

#[tokio::test]
async fn dashboard_errors_follow_the_ajax_contract() {
    let ink = site().await;

    let mut req = request("GET", MAIN, "/dashboard/stats", None, None);
    req.headers_mut()
        .insert("x-requested-with", "XMLHttpRequest".parse().unwrap());
    let res = send(&ink, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(res).await;
    assert_eq!(body, json!({"success": false, "error": "Not authenticated"}));

    let res = send(&ink, request("GET", MAIN, "/dashboard/stats", None, None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(res).await;
    assert_eq!(body["className"], "not-authenticated");
}

#[tokio::test]
async fn live_search_needs_two_characters() {
    let ink = site().await;
    add_tenant(&ink, "acme").await;
    let acme = host_of("acme");
    let token = login(&ink, &acme, "admin", "secret123").await;
    publish(&ink, &acme, &token, json!({"title": "Rust ownership", "content": "<p>Borrowing rules</p>"})).await;

    let res = send(&ink, request("GET", &acme, "/search?q=r", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({"results": []}));

    let res = send(&ink, request("GET", &acme, "/search?q=borrow", None, None)).await;
    let body = json_body(res).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["title"], "Rust ownership");
    assert!(results[0]["url"].as_str().unwrap().starts_with("/post/"));

    let res = send(&ink, request("GET", MAIN, "/search?q=borrow", None, None)).await;
    assert_eq!(json_body(res).await, json!({"results": []}));
}

#[tokio::test]
async fn rendered_pages_escape_user_text() {
    let ink = site().await;
    add_tenant(&ink, "acme").await;
    let acme = host_of("acme");
    let token = login(&ink, &acme, "admin", "secret123").await;
    let post = publish(
        &ink,
        &acme,
        &token,
        json!({"title": "<b>Tom & Jerry's</b>", "slug": "tom", "content": "<p>Chase</p><script>steal()</script>"}),
    )
    .await;
    assert_eq!(post["slug"], "tom");

    let res = send(&ink, request("GET", &acme, "/post/tom", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = text_body(res).await;
    assert!(html.contains("&lt;b&gt;Tom &amp; Jerry&apos;s&lt;/b&gt;"));
    assert!(html.contains("<p>Chase</p>"));
    assert!(!html.contains("<script>"));

    let res = send(&ink, request("GET", &acme, "/post/missing", None, None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

fn tenant_ctx(tenant: &Value) -> TenantContext {
    TenantContext::new(tenant["id"].to_string())
}

/// Adds a user straight through the users service, as an internal call.
async fn add_user(ink: &Inkwell, ctx: &TenantContext, email: &str, username: &str, role: &str) -> Value {
    ink.state
        .app
        .service("users")
        .unwrap()
        .create(
            ctx.clone(),
            json!({"email": email, "username": username, "password": "secret123", "role": role}),
            CmsParams::system(),
        )
        .await
        .unwrap()
}

async fn login_body(ink: &Inkwell, host: &str, username: &str, password: &str) -> Value {
    let res = send(
        ink,
        request("POST", host, "/auth/login", None, Some(json!({"username": username, "password": password}))),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    json_body(res).await
}

#[tokio::test]
async fn super_admin_emails_cannot_be_claimed_by_registration() {
    let mut config = CmsConfig::for_tests().unwrap();
    config.auth = config.auth.clone().with_super_admins(["root@platform.io"]);
    let ink = build(config).await.unwrap();
    let victim_tenant = add_tenant(&ink, "victim").await;
    let victim = host_of("victim");

    for host in [MAIN.to_string(), victim.clone()] {
        let res = send(
            &ink,
            request(
                "POST",
                &host,
                "/auth/register",
                None,
                Some(json!({"email": "Root@Platform.io", "username": "mallory", "password": "pencil99"})),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    // A tenant admin can still give one of their users the address; it
    // grants nothing outside that tenant.
    add_user(&ink, &tenant_ctx(&victim_tenant), "root@platform.io", "mallory", "admin").await;
    let body = login_body(&ink, &victim, "mallory", "secret123").await;
    assert_eq!(body["user"]["is_super_admin"], false);
    let token = body["accessToken"].as_str().unwrap();
    let res = send(&ink, request("GET", MAIN, "/api/users", Some(token), None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Only an admin of the default tenant is promoted, when the server starts.
    let main = ink.state.store.tenants.by_subdomain("main").await.unwrap().unwrap();
    add_user(&ink, &main.context(), "root@platform.io", "root", "admin").await;
    let body = login_body(&ink, MAIN, "root", "secret123").await;
    assert_eq!(body["user"]["is_super_admin"], false);

    seed(&ink.state.store, &ink.state.auth, &ink.state.config).await.unwrap();
    let body = login_body(&ink, MAIN, "root", "secret123").await;
    assert_eq!(body["user"]["is_super_admin"], true);
    let token = body["accessToken"].as_str().unwrap();
    let res = send(&ink, request("GET", &victim, "/api/users", Some(token), None)).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = login_body(&ink, &victim, "mallory", "secret123").await;
    assert_eq!(body["user"]["is_super_admin"], false);
}

fn forgot(host: &str, email: &str) -> Request<Body> {
    request("POST", host, "/auth/forgot-password", None, Some(json!({"email": email})))
}

#[tokio::test]
async fn password_resets_are_single_use_and_expire() {
    let ink = site().await;
    let acme_tenant = add_tenant(&ink, "acme").await;
    add_tenant(&ink, "beta").await;
    let acme = host_of("acme");

    let res = send(&ink, forgot(&acme, "nobody@acme.org")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(json_body(res).await.get("resetToken").is_none());

    let res = send(&ink, forgot(&acme, "Admin@acme.org")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let token = json_body(res).await["resetToken"].as_str().unwrap().to_string();
    let reset_uri = format!("/auth/reset-password/{token}");

    // Tokens are only good on the tenant that issued them.
    let res = send(&ink, request("POST", &host_of("beta"), &reset_uri, None, Some(json!({"password": "hijacked1"})))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(&ink, request("POST", &acme, &reset_uri, None, Some(json!({"password": "fresh-pass1"})))).await;
    assert_eq!(res.status(), StatusCode::OK);
    login(&ink, &acme, "admin", "fresh-pass1").await;
    let res = send(&ink, request("POST", &acme, "/auth/login", None, Some(json!({"username": "admin", "password": "secret123"})))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = send(&ink, request("POST", &acme, &reset_uri, None, Some(json!({"password": "again-pass1"})))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(&ink, forgot(&acme, "admin@acme.org")).await;
    let token = json_body(res).await["resetToken"].as_str().unwrap().to_string();
    let ctx = tenant_ctx(&acme_tenant);
    let admin = ink.state.store.users.find_one(&ctx, |u| u.username == "admin").await.unwrap().unwrap();
    ink.state
        .store
        .users
        .update_with(&ctx, admin.id, |u, _| {
            u.password_reset_expires = Some(Utc::now() - Duration::minutes(1));
            Ok(())
        })
        .await
        .unwrap();

    let res = send(
        &ink,
        request("POST", &acme, &format!("/auth/reset-password/{token}"), None, Some(json!({"password": "late-pass1"}))),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    login(&ink, &acme, "admin", "fresh-pass1").await;
}

#[tokio::test]
async fn custom_domains_serve_their_tenant() {
    let ink = site().await;
    let acme_tenant = add_tenant(&ink, "acme").await;
    let acme = host_of("acme");
    let token = login(&ink, &acme, "admin", "secret123").await;
    publish(&ink, &acme, &token, json!({"title": "Acme on its own domain", "slug": "own", "content": "<p>x</p>"})).await;

    let res = send(&ink, request("GET", "blog.example.org", "/", None, None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    ink.state
        .app
        .service("tenants")
        .unwrap()
        .patch(
            TenantContext::new("0"),
            Some(&acme_tenant["id"].to_string()),
            json!({"custom_domain": "blog.example.org"}),
            CmsParams::system(),
        )
        .await
        .unwrap();

    let res = send(&ink, request("GET", "Blog.Example.org:8080", "/", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(text_body(res).await.contains("Acme on its own domain"));

    let res = send(&ink, request("GET", "blog.example.org", "/post/own", None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Same tenant, so the subdomain's token works on the custom domain.
    let res = send(&ink, request("GET", "blog.example.org", "/api/posts", Some(&token), None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn records_of_every_kind_stay_inside_their_tenant() {
    let ink = site().await;
    add_tenant(&ink, "acme").await;
    add_tenant(&ink, "beta").await;
    let acme = host_of("acme");
    let beta = host_of("beta");
    let acme_token = login(&ink, &acme, "admin", "secret123").await;
    let beta_token = login(&ink, &beta, "admin", "secret123").await;

    let mut made = Vec::new();
    for (path, body) in [
        ("/api/categories", json!({"name": "Acme news"})),
        ("/api/tags", json!({"name": "acme-only"})),
        ("/api/settings", json!({"key": "acme_banner", "value": "hello"})),
    ] {
        let res = send(&ink, request("POST", &acme, path, Some(&acme_token), Some(body))).await;
        assert_eq!(res.status(), StatusCode::OK, "{path}");
        let created = json_body(res).await;
        let id = if path == "/api/settings" {
            created["key"].as_str().unwrap().to_string()
        } else {
            created["id"].to_string()
        };
        made.push(format!("{path}/{id}"));
    }

    let res = send(&ink, upload_request(&acme, &acme_token, "plan.pdf", b"plan")).await;
    assert_eq!(res.status(), StatusCode::OK);
    made.push(format!("/api/media/{}", json_body(res).await["file"]["id"]));

    for uri in &made {
        let res = send(&ink, request("GET", &acme, uri, Some(&acme_token), None)).await;
        assert_eq!(res.status(), StatusCode::OK, "{uri} on its own tenant");

        let res = send(&ink, request("GET", &beta, uri, Some(&beta_token), None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "GET {uri} from beta");
        let res = send(&ink, request("DELETE", &beta, uri, Some(&beta_token), None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "DELETE {uri} from beta");

        let res = send(&ink, request("GET", &acme, uri, Some(&acme_token), None)).await;
        assert_eq!(res.status(), StatusCode::OK, "{uri} survives");
    }

    for path in ["/api/categories", "/api/tags", "/api/media"] {
        let res = send(&ink, request("GET", &beta, path, Some(&beta_token), None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(json_body(res).await.as_array().unwrap().is_empty(), "{path} listed on beta");
    }
}

#[tokio::test]
async fn guest_comments_are_moderated_from_the_dashboard() {
    let ink = site().await;
    add_tenant(&ink, "acme").await;
    add_tenant(&ink, "beta").await;
    let acme = host_of("acme");
    let token = login(&ink, &acme, "admin", "secret123").await;
    let beta_token = login(&ink, &host_of("beta"), "admin", "secret123").await;
    publish(&ink, &acme, &token, json!({"title": "Open thread", "slug": "thread", "content": "<p>talk</p>"})).await;

    let mut req = request(
        "POST",
        &acme,
        "/post/thread/comments",
        None,
        Some(json!({
            "content": "First <b>comment</b>",
            "author_name": "Gus",
            "author_email": "gus@example.org",
            "status": "approved",
        })),
    );
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.5, 10.0.0.1".parse().unwrap());
    let res = send(&ink, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = json_body(res).await;
    assert_eq!(body["comment"]["status"], "pending");
    assert!(body["comment"].get("author_email").is_none());
    let id = body["comment"]["id"].clone();

    let res = send(&ink, request("GET", &acme, "/post/thread", None, None)).await;
    assert!(!text_body(res).await.contains("First"));

    let res = send(&ink, request("GET", &acme, "/dashboard/stats", Some(&token), None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let stats = json_body(res).await["stats"].clone();
    assert_eq!(stats["comments"], json!({"total": 1, "pending": 1}));
    assert_eq!(stats["recent_comments"][0]["post_title"], "Open thread");
    assert_eq!(stats["recent_comments"][0]["id"], id);

    let approve = format!("/dashboard/comments/{id}/approve");
    let res = send(&ink, request("POST", &host_of("beta"), &approve, Some(&beta_token), None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = send(&ink, request("POST", &acme, &approve, Some(&token), None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({"success": true, "status": "approved", "comment_id": id}));

    let res = send(&ink, request("GET", &acme, "/post/thread", None, None)).await;
    let html = text_body(res).await;
    assert!(html.contains("First &lt;b&gt;comment&lt;/b&gt;"));
    assert!(html.contains("Gus"));

    let res = send(&ink, request("GET", &acme, "/api/comments?status=approved", Some(&token), None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 1);
    let res = send(&ink, request("GET", &acme, &format!("/api/comments/{id}"), Some(&token), None)).await;
    assert_eq!(json_body(res).await["author_ip"], "203.0.113.5");

    let res = send(&ink, request("POST", &acme, &format!("/dashboard/comments/{id}/spam"), Some(&token), None)).await;
    assert_eq!(json_body(res).await["status"], "spam");
    let res = send(&ink, request("GET", &acme, "/post/thread", None, None)).await;
    assert!(!text_body(res).await.contains("First"));

    let res = send(&ink, request("GET", &host_of("beta"), "/api/comments", Some(&beta_token), None)).await;
    assert!(json_body(res).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn removed_tenants_stop_resolving() {
    let ink = site().await;
    let acme_tenant = add_tenant(&ink, "acme").await;
    let acme = host_of("acme");
    let token = login(&ink, &acme, "admin", "secret123").await;
    publish(&ink, &acme, &token, json!({"title": "Soon gone", "content": "<p>x</p>"})).await;

    ink.state
        .app
        .service("tenants")
        .unwrap()
        .remove(TenantContext::new("0"), Some(&acme_tenant["id"].to_string()), CmsParams::system())
        .await
        .unwrap();

    let res = send(&ink, request("GET", &acme, "/", None, None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = send(&ink, request("GET", &acme, "/api/posts", Some(&token), None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let left = ink.state.store.posts.count(&tenant_ctx(&acme_tenant), |_| true).await.unwrap();
    assert_eq!(left, 0);
}
