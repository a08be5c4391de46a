use std::fs;
use std::path::Path;

use http::header::{CONTENT_TYPE, LOCATION, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use livery::minijinja::Value;
use livery::{
    BufferedResponse, CompileError, Env, FuncMap, HtmlOptions, Options, Renderer,
    RendererFactory, ENV_VAR,
};
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;

fn write_template(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn factory(dir: &TempDir, options: Options) -> RendererFactory {
    RendererFactory::with_env(options.with_directory(dir.path()), Env::Production).unwrap()
}

fn get(path: &str) -> Request<()> {
    Request::get(path).body(()).unwrap()
}

fn respond<F>(factory: &RendererFactory, handler: F) -> Response<Vec<u8>>
where
    F: FnOnce(&mut Renderer<BufferedResponse>),
{
    factory.respond(&get("/"), handler).unwrap()
}

fn body(response: &Response<Vec<u8>>) -> &str {
    std::str::from_utf8(response.body()).unwrap()
}

struct Unserializable;

impl Serialize for Unserializable {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(S::Error::custom("boom"))
    }
}

#[derive(Serialize)]
struct Person {
    name: String,
}

// =============================================================================
// JSON / XML
// =============================================================================

#[test]
fn test_json_compact() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| r.json(StatusCode::CREATED, &json!({"a": 1, "b": [1, 2]})));

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json; charset=UTF-8");
    assert_eq!(body(&response), r#"{"a":1,"b":[1,2]}"#);
}

#[test]
fn test_json_indent_and_prefix() {
    let dir = TempDir::new().unwrap();
    let mut options = Options::new();
    options.indent_json = true;
    options.prefix_json = b")]}',\n".to_vec();
    let f = factory(&dir, options);

    let response = respond(&f, |r| r.json(StatusCode::OK, &json!({"a": 1})));

    assert_eq!(body(&response), ")]}',\n{\n  \"a\": 1\n}");
}

#[test]
fn test_json_failure_is_500_with_error_text() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| r.json(StatusCode::OK, &Unserializable));

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(body(&response), "boom");
}

#[test]
fn test_xml() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let person = Person { name: "Ann".into() };
    let response = respond(&f, |r| r.xml(StatusCode::OK, &person));

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/xml; charset=UTF-8");
    assert!(body(&response).contains("<name>Ann</name>"));
}

#[test]
fn test_xml_primitive_wrapped_in_type_root() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| r.xml(StatusCode::OK, &"hello world"));

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), "<string>hello world</string>");
}

#[test]
fn test_xml_prefix() {
    let dir = TempDir::new().unwrap();
    let mut options = Options::new();
    options.prefix_xml = b"<?xml version='1.0' encoding='UTF-8'?>\n".to_vec();
    let f = factory(&dir, options);

    let person = Person { name: "Ann".into() };
    let response = respond(&f, |r| r.xml(StatusCode::OK, &person));

    assert!(body(&response).starts_with("<?xml version='1.0' encoding='UTF-8'?>\n<"));
}

#[test]
fn test_xml_failure_is_500() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| r.xml(StatusCode::OK, &Unserializable));

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body(&response).contains("boom"));
}

#[test]
fn test_custom_charset() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new().with_charset("ISO-8859-1"));

    let response = respond(&f, |r| r.json(StatusCode::OK, &1));

    assert_eq!(response.headers()[CONTENT_TYPE], "application/json; charset=ISO-8859-1");
}

#[test]
fn test_invalid_charset_fails_factory() {
    let dir = TempDir::new().unwrap();
    let result = RendererFactory::with_env(
        Options::new()
            .with_directory(dir.path())
            .with_charset("bad\nvalue"),
        Env::Production,
    );

    assert!(matches!(result, Err(CompileError::InvalidHeader(_))));
}

// =============================================================================
// Templates
// =============================================================================

#[test]
fn test_html_escapes_text_does_not() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "hello.tmpl", "<h1>{{ name }}</h1>");
    let f = factory(&dir, Options::new());

    let data = json!({"name": "<b>x</b>"});
    let html = respond(&f, |r| r.html(StatusCode::OK, "hello", &data));
    let text = respond(&f, |r| r.text(StatusCode::OK, "hello", &data));

    assert_eq!(html.headers()[CONTENT_TYPE], "text/html; charset=UTF-8");
    assert_eq!(body(&html), "<h1>&lt;b&gt;x&lt;/b&gt;</h1>");
    assert_eq!(body(&text), "<h1><b>x</b></h1>");
}

#[test]
fn test_text_content_type_falls_back_to_html() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "plain.tmpl", "hi");

    let f = factory(&dir, Options::new());
    let response = respond(&f, |r| r.text(StatusCode::OK, "plain", &()));
    assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=UTF-8");

    let mut options = Options::new();
    options.text_content_type = Some("text/plain".into());
    let f = factory(&dir, options);
    let response = respond(&f, |r| r.text(StatusCode::OK, "plain", &()));
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=UTF-8");
}

#[test]
fn test_nested_template_names() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "admin/index.tmpl", "admin {{ n }}");
    write_template(dir.path(), "notes.txt", "ignored");
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| r.html(StatusCode::OK, "admin/index", &json!({"n": 3})));
    assert_eq!(body(&response), "admin 3");

    let response = respond(&f, |r| r.html(StatusCode::OK, "notes", &()));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_layout_wraps_content() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "content.tmpl", "{{ msg }}");
    write_template(dir.path(), "L.tmpl", "L[{{ yield() }}]");
    let f = factory(&dir, Options::new().with_layout("L"));

    let response = respond(&f, |r| r.html(StatusCode::OK, "content", &json!({"msg": "hi"})));

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), "L[hi]");
}

#[test]
fn test_layout_sees_binding_and_current() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "page.tmpl", "<p>{{ title }}</p>");
    write_template(
        dir.path(),
        "base.tmpl",
        "<title>{{ title }}</title><!-- {{ current() }} -->{{ yield() }}",
    );
    let f = factory(&dir, Options::new().with_layout("base"));

    let response = respond(&f, |r| r.html(StatusCode::OK, "page", &json!({"title": "A&B"})));

    assert_eq!(
        body(&response),
        "<title>A&amp;B</title><!-- page --><p>A&amp;B</p>"
    );
}

#[test]
fn test_trailing_newline_preserved() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "field.tmpl", "{{ field }}\n");
    write_template(dir.path(), "wrap.tmpl", "[\n{{ yield() }}]\n");
    let f = factory(&dir, Options::new());

    let data = json!({"field": "x"});
    let text = respond(&f, |r| r.text(StatusCode::OK, "field", &data));
    let wrapped = respond(&f, |r| {
        r.html_with(StatusCode::OK, "field", &data, &HtmlOptions::layout("wrap"))
    });

    assert_eq!(body(&text), "x\n");
    assert_eq!(body(&wrapped), "[\nx\n]\n");
}

#[test]
fn test_content_template_sees_current() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "L.tmpl", "L[{{ yield() }}]");
    write_template(dir.path(), "content.tmpl", "me={{ current() }}");
    let f = factory(&dir, Options::new().with_layout("L"));

    let response = respond(&f, |r| r.html(StatusCode::OK, "content", &json!({})));

    assert_eq!(body(&response), "L[me=content]");
}

#[test]
fn test_per_call_layout_overrides() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "page.tmpl", "p");
    write_template(dir.path(), "one.tmpl", "1[{{ yield() }}]");
    write_template(dir.path(), "two.tmpl", "2[{{ yield() }}]");
    let f = factory(&dir, Options::new().with_layout("one"));

    let other = respond(&f, |r| {
        r.html_with(StatusCode::OK, "page", &(), &HtmlOptions::layout("two"))
    });
    let none = respond(&f, |r| {
        r.html_with(StatusCode::OK, "page", &(), &HtmlOptions::no_layout())
    });
    let inherited = respond(&f, |r| {
        r.html_with(StatusCode::OK, "page", &(), &HtmlOptions::new())
    });

    assert_eq!(body(&other), "2[p]");
    assert_eq!(body(&none), "p");
    assert_eq!(body(&inherited), "1[p]");
}

#[test]
fn test_text_layout() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "mail.tmpl", "Dear {{ who }}");
    write_template(dir.path(), "frame.tmpl", "-- {{ yield() }} --");
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| {
        r.text_with(
            StatusCode::OK,
            "mail",
            &json!({"who": "<you>"}),
            &HtmlOptions::layout("frame"),
        )
    });

    assert_eq!(body(&response), "-- Dear <you> --");
}

#[test]
fn test_yield_without_layout_is_500() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "bad.tmpl", "before {{ yield() }} after");
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| r.html(StatusCode::OK, "bad", &()));

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body(&response).contains("yield called with no layout defined"));
    assert!(!body(&response).contains("before"));
}

#[test]
fn test_missing_template_is_500() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| r.html(StatusCode::OK, "nope", &()));

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert!(!response.body().is_empty());
}

#[test]
fn test_extra_merged_into_html_only() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "site.tmpl", "{{ site }}/{{ title }}");
    let f = factory(&dir, Options::new().with_extra("site", "Livery"));

    let data = json!({"title": "t", "site": "ignored"});
    let html = respond(&f, |r| r.html(StatusCode::OK, "site", &data));
    let call = respond(&f, |r| {
        r.html_with(StatusCode::OK, "site", &data, &HtmlOptions::new().with_extra("site", "Call"))
    });
    let text = respond(&f, |r| r.text(StatusCode::OK, "site", &json!({"title": "t"})));

    assert_eq!(body(&html), "Livery/t");
    assert_eq!(body(&call), "Call/t");
    assert_eq!(body(&text), "/t");
}

#[test]
fn test_funcs_per_flavor() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "f.tmpl", "{{ shout(word) }}");
    let options = Options::new()
        .with_html_funcs(FuncMap::new().with(
            "shout",
            Value::from_function(|s: String| s.to_uppercase()),
        ))
        .with_text_funcs(FuncMap::new().with(
            "shout",
            Value::from_function(|s: String| format!("{}!", s)),
        ));
    let f = factory(&dir, options);

    let html = respond(&f, |r| r.html(StatusCode::OK, "f", &json!({"word": "hey"})));
    let text = respond(&f, |r| r.text(StatusCode::OK, "f", &json!({"word": "hey"})));

    assert_eq!(body(&html), "HEY");
    assert_eq!(body(&text), "hey!");
}

#[test]
fn test_parse_error_fails_factory() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "broken.tmpl", "{% if %}");

    let result = RendererFactory::with_env(
        Options::new().with_directory(dir.path()),
        Env::Production,
    );

    assert!(matches!(result, Err(CompileError::Parse { .. })));
}

// =============================================================================
// Data, status, headers
// =============================================================================

#[test]
fn test_data_defaults_to_octet_stream() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| r.data(StatusCode::OK, &[0, 1, 2]));

    assert_eq!(response.headers()[CONTENT_TYPE], "application/octet-stream");
    assert_eq!(response.body(), &[0, 1, 2]);
}

#[test]
fn test_data_keeps_preset_content_type() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| {
        r.header()
            .insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        r.data(StatusCode::OK, b"png")
    });

    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
}

#[test]
fn test_error_and_status_write_no_body() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let not_found = respond(&f, |r| r.error(StatusCode::NOT_FOUND));
    let no_content = respond(&f, |r| r.status(StatusCode::NO_CONTENT));

    assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
    assert!(not_found.body().is_empty());
    assert_eq!(no_content.status(), StatusCode::NO_CONTENT);
}

#[test]
fn test_headers_set_before_render_are_sent() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| {
        r.header()
            .insert("x-request-id", HeaderValue::from_static("abc"));
        r.json(StatusCode::OK, &true);
        r.header()
            .insert("x-too-late", HeaderValue::from_static("1"));
    });

    assert_eq!(response.headers()["x-request-id"], "abc");
    assert!(!response.headers().contains_key("x-too-late"));
}

#[test]
fn test_first_status_wins() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = respond(&f, |r| {
        r.status(StatusCode::ACCEPTED);
        r.json(StatusCode::OK, &"late");
    });

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body(&response), r#""late""#);
}

// =============================================================================
// Redirects
// =============================================================================

#[test]
fn test_redirect_get_default_found() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = f
        .respond(&get("/users/42"), |r| r.redirect("edit", None))
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[LOCATION], "/users/edit");
    assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(body(&response), "<a href=\"/users/edit\">Found</a>.\n\n");
}

#[test]
fn test_redirect_explicit_status() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let response = f
        .respond(&get("/a/b"), |r| {
            r.redirect("https://example.com/x", StatusCode::MOVED_PERMANENTLY)
        })
        .unwrap();

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[LOCATION], "https://example.com/x");
    assert!(body(&response).contains("Moved Permanently"));
}

#[test]
fn test_redirect_post_has_no_body() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/form/submit")
        .body(())
        .unwrap();
    let response = f
        .respond(&request, |r| r.redirect("../done", StatusCode::SEE_OTHER))
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/done");
    assert!(!response.headers().contains_key(CONTENT_TYPE));
    assert!(response.body().is_empty());
}

#[test]
fn test_redirect_head_sets_type_without_body() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let request = Request::builder()
        .method(Method::HEAD)
        .uri("/x")
        .body(())
        .unwrap();
    let response = f.respond(&request, |r| r.redirect("/y", None)).unwrap();

    assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    assert!(response.body().is_empty());
}

// =============================================================================
// Environments
// =============================================================================

#[test]
fn test_development_picks_up_edits() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "live.tmpl", "v1");
    let f = RendererFactory::with_env(
        Options::new().with_directory(dir.path()),
        Env::Development,
    )
    .unwrap();

    let first = respond(&f, |r| r.html(StatusCode::OK, "live", &()));
    write_template(dir.path(), "live.tmpl", "v2");
    write_template(dir.path(), "added.tmpl", "new");
    let second = respond(&f, |r| r.html(StatusCode::OK, "live", &()));
    let added = respond(&f, |r| r.html(StatusCode::OK, "added", &()));

    assert_eq!(body(&first), "v1");
    assert_eq!(body(&second), "v2");
    assert_eq!(body(&added), "new");
}

#[test]
fn test_development_surfaces_compile_errors_per_request() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "live.tmpl", "ok");
    let f = RendererFactory::with_env(
        Options::new().with_directory(dir.path()),
        Env::Development,
    )
    .unwrap();

    write_template(dir.path(), "live.tmpl", "{% if %}");
    let result = f.respond(&get("/"), |r| r.html(StatusCode::OK, "live", &()));

    assert!(result.is_err());
}

#[test]
fn test_production_uses_startup_snapshot() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "live.tmpl", "v1");
    let f = factory(&dir, Options::new());

    write_template(dir.path(), "live.tmpl", "v2");
    let response = respond(&f, |r| r.html(StatusCode::OK, "live", &()));

    assert_eq!(body(&response), "v1");
}

#[test]
#[serial]
fn test_new_reads_env_var() {
    let dir = TempDir::new().unwrap();

    std::env::set_var(ENV_VAR, "production");
    let f = RendererFactory::new(Options::new().with_directory(dir.path())).unwrap();
    assert_eq!(f.env(), Env::Production);

    std::env::remove_var(ENV_VAR);
    let f = RendererFactory::new(Options::new().with_directory(dir.path())).unwrap();
    assert_eq!(f.env(), Env::Development);
}

#[test]
fn test_renderer_with_borrowed_writer() {
    let dir = TempDir::new().unwrap();
    let f = factory(&dir, Options::new());

    let mut out = BufferedResponse::new();
    {
        let mut r = f.renderer(&mut out, &get("/")).unwrap();
        r.json(StatusCode::OK, &json!({"ok": true}));
    }

    assert_eq!(out.status(), Some(StatusCode::OK));
    assert_eq!(out.body(), br#"{"ok":true}"#);
}

#[test]
fn test_buffers_return_to_pool() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "t.tmpl", "{{ n }}");
    let f = factory(&dir, Options::new());

    for n in 0..5 {
        let response = respond(&f, |r| r.html(StatusCode::OK, "t", &json!({"n": n})));
        assert_eq!(body(&response), n.to_string());
    }

    assert_eq!(f.pool().len(), 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_renders_keep_their_own_layout() {
    let dir = TempDir::new().unwrap();
    write_template(dir.path(), "alpha.tmpl", "alpha:{{ n }}:{{ current() }}");
    write_template(dir.path(), "beta.tmpl", "beta:{{ n }}:{{ current() }}");
    write_template(dir.path(), "one.tmpl", "1<{{ current() }}>[{{ yield() }}]");
    write_template(dir.path(), "two.tmpl", "2<{{ current() }}>[{{ yield() }}]");
    let f = factory(&dir, Options::new());

    std::thread::scope(|scope| {
        for worker in 0..8usize {
            let f = &f;
            scope.spawn(move || {
                for i in 0..50usize {
                    let (page, layout) = match (worker + i) % 4 {
                        0 => ("alpha", "one"),
                        1 => ("alpha", "two"),
                        2 => ("beta", "one"),
                        _ => ("beta", "two"),
                    };
                    let n = worker * 1000 + i;
                    let response = respond(f, |r| {
                        r.html_with(
                            StatusCode::OK,
                            page,
                            &json!({"n": n}),
                            &HtmlOptions::layout(layout),
                        )
                    });

                    let prefix = if layout == "one" { "1" } else { "2" };
                    assert_eq!(
                        body(&response),
                        format!("{}<{}>[{}:{}:{}]", prefix, page, page, n, page)
                    );
                }
            });
        }
    });

    assert!(f.pool().len() <= f.pool().capacity());
}
