use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use indicatif::ProgressBar;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

use crate::client::{ApiClient, ClientError, ClientOptions};
use crate::model::{CellValue, Row, TableName};
use crate::query::{contains, merge, split, SEPARATOR};
use crate::reindex::{self, WatchOptions};

fn token() -> impl Strategy<Value = String> {
    "[a-z0-9:*()]{1,8}".prop_filter("separator word", |t| !t.eq_ignore_ascii_case("and"))
}

fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::collection::vec(token(), 1..4).prop_map(|ts| ts.join(" ")),
        prop::collection::vec(prop_oneof![token(), Just("AND".to_string())], 1..4)
            .prop_map(|ts| format!("\"{}\"", ts.join(" "))),
    ]
}

fn dangling() -> impl Strategy<Value = Option<&'static str>> {
    prop::option::of(prop_oneof![Just(" and"), Just(" AND"), Just(" aNd "), Just("\tand")])
}

fn query() -> impl Strategy<Value = String> {
    (
        prop::option::of("\"[a-z ]{0,6}"),
        prop::collection::vec(fragment(), 0..4),
        dangling(),
    )
        .prop_map(|(unbalanced, fragments, tail)| {
            let mut parts: Vec<String> = unbalanced.into_iter().collect();
            parts.extend(fragments);
            let mut q = parts.join(SEPARATOR);
            q.push_str(tail.unwrap_or_default());
            q
        })
}

fn typed_fragment() -> impl Strategy<Value = String> {
    (fragment(), dangling()).prop_map(|(f, tail)| f + tail.unwrap_or_default())
}

proptest! {
    #[test]
    fn split_inverts_join(fragments in prop::collection::vec(fragment(), 1..6)) {
        prop_assert_eq!(split(&fragments.join(SEPARATOR)), fragments);
    }

    #[test]
    fn merge_is_idempotent(q in query(), f in typed_fragment()) {
        let once = merge(&q, &f);
        prop_assert_eq!(merge(&once, &f), once);
    }

    #[test]
    fn merged_fragment_is_contained(q in query(), f in typed_fragment()) {
        prop_assert!(contains(&f, &merge(&q, &f)));
    }

    #[test]
    fn merge_after_trailing_conjunction_is_idempotent(head in fragment(), f in fragment()) {
        for tail in [" and", " AND", " And  "] {
            let q = format!("{head}{tail}");
            let once = merge(&q, &f);
            prop_assert_eq!(merge(&once, &f), once);
        }
    }

    #[test]
    fn merge_keeps_existing_fragments(fragments in prop::collection::vec(fragment(), 1..4), f in fragment()) {
        let q = fragments.join(SEPARATOR);
        let merged = merge(&q, &f);
        prop_assert!(merged.starts_with(&q));
    }
}

#[derive(Default)]
struct Backend {
    tables: BTreeMap<String, Vec<Map<String, Value>>>,
    progress: VecDeque<Value>,
    queries: Vec<String>,
    limits: Vec<usize>,
    reindexed: usize,
}

type Shared = Arc<Mutex<Backend>>;

fn row_id(table: &str, row: &Map<String, Value>) -> Option<String> {
    let pk = TableName::resolve(table).ok()?.primary_key();
    match row.get(pk)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

async fn search(State(state): State<Shared>, Query(params): Query<HashMap<String, String>>) -> Response {
    let q = params.get("q").cloned().unwrap_or_default();
    state.lock().unwrap().queries.push(q.clone());
    if q == "boom" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "index offline").into_response();
    }
    Json(json!([
        { "type": "server", "id": 1, "name": "srv01" },
        { "type": "site", "id": "s-7", "text": "Main Hall", "snippet": "<b>Main</b> Hall" }
    ]))
    .into_response()
}

async fn reindex_handler(State(state): State<Shared>) -> StatusCode {
    state.lock().unwrap().reindexed += 1;
    StatusCode::OK
}

async fn index_progress(State(state): State<Shared>) -> Json<Value> {
    let mut backend = state.lock().unwrap();
    let status = if backend.progress.len() > 1 {
        backend.progress.pop_front()
    } else {
        backend.progress.front().cloned()
    };
    Json(status.unwrap_or_else(|| json!({ "active": false })))
}

async fn list_table(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(100);
    let mut backend = state.lock().unwrap();
    backend.limits.push(limit);
    if name == "radio" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "radio table locked").into_response();
    }
    match backend.tables.get(&name) {
        Some(rows) => Json(rows.iter().take(limit).cloned().collect::<Vec<_>>()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_row(State(state): State<Shared>, Path((name, id)): Path<(String, String)>) -> Response {
    let backend = state.lock().unwrap();
    backend
        .tables
        .get(&name)
        .and_then(|rows| rows.iter().find(|r| row_id(&name, r).as_deref() == Some(id.as_str())))
        .map(|row| Json(row.clone()).into_response())
        .unwrap_or_else(|| StatusCode::NOT_FOUND.into_response())
}

async fn create_row(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Json(row): Json<Map<String, Value>>,
) -> StatusCode {
    state
        .lock()
        .unwrap()
        .tables
        .entry(name)
        .or_default()
        .push(row);
    StatusCode::OK
}

async fn update_row(
    State(state): State<Shared>,
    Path((name, id)): Path<(String, String)>,
    Json(changes): Json<Map<String, Value>>,
) -> StatusCode {
    let mut backend = state.lock().unwrap();
    let Some(rows) = backend.tables.get_mut(&name) else {
        return StatusCode::NOT_FOUND;
    };
    match rows
        .iter_mut()
        .find(|r| row_id(&name, r).as_deref() == Some(id.as_str()))
    {
        Some(row) => {
            row.extend(changes);
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn delete_row(State(state): State<Shared>, Path((name, id)): Path<(String, String)>) -> StatusCode {
    let mut backend = state.lock().unwrap();
    let Some(rows) = backend.tables.get_mut(&name) else {
        return StatusCode::NOT_FOUND;
    };
    let before = rows.len();
    rows.retain(|r| row_id(&name, r).as_deref() != Some(id.as_str()));
    if rows.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

fn seeded() -> Shared {
    let mut backend = Backend::default();
    let servers = (1..=3)
        .map(|i| {
            json!({ "ServerID": i, "Name": format!("srv0{i}"), "Active": i != 2, "Note": null })
                .as_object()
                .cloned()
                .unwrap_or_default()
        })
        .chain(std::iter::once(
            json!({ "ServerID": 4, "Name": "db01", "Active": true, "Note": "primary" })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        ))
        .collect();
    backend.tables.insert("server".to_string(), servers);
    backend.tables.insert(
        "site".to_string(),
        vec![json!({ "SiteID": "s-7", "Name": "Main Hall" })
            .as_object()
            .cloned()
            .unwrap_or_default()],
    );
    Arc::new(Mutex::new(backend))
}

async fn spawn_backend(state: Shared) -> String {
    let app = Router::new()
        .route("/search", get(search))
        .route("/api/index/reindex", post(reindex_handler))
        .route("/api/index-progress", get(index_progress))
        .route("/table/{name}", get(list_table))
        .route("/row/{name}", post(create_row))
        .route(
            "/row/{name}/{id}",
            get(get_row).put(update_row).delete(delete_row),
        )
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

fn client_for(base_url: &str) -> ApiClient {
    ApiClient::new(&ClientOptions {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
        ..ClientOptions::default()
    })
    .unwrap()
}

fn table(name: &str) -> TableName {
    TableName::resolve(name).unwrap()
}

#[tokio::test]
async fn search_decodes_hits_and_sends_match_all_for_blank_queries() {
    let state = seeded();
    let client = client_for(&spawn_backend(state.clone()).await);

    let hits = client.search("type:server AND os:linux").await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "1");
    assert_eq!(hits[0].text, "srv01");
    assert_eq!(hits[1].snippet.as_deref(), Some("<b>Main</b> Hall"));

    client.search("   ").await.unwrap();
    let queries = state.lock().unwrap().queries.clone();
    assert_eq!(queries, vec!["type:server AND os:linux", "*:*"]);
}

#[tokio::test]
async fn error_statuses_become_typed_errors() {
    let client = client_for(&spawn_backend(seeded()).await);

    match client.search("boom").await {
        Err(ClientError::Status { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "index offline");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(
        client.get_row(table("server"), "99").await,
        Err(ClientError::NotFound { .. })
    ));
    assert!(matches!(
        client.delete_row(table("site"), "nope").await,
        Err(ClientError::NotFound { .. })
    ));
}

#[tokio::test]
async fn list_table_clamps_limit_and_keeps_column_order() {
    let state = seeded();
    let client = client_for(&spawn_backend(state.clone()).await);

    let rows = client.list_table(table("server"), 2).await.unwrap();
    assert_eq!(rows.len(), 2);
    let sent: Vec<String> = state.lock().unwrap().tables["server"][0]
        .keys()
        .cloned()
        .collect();
    assert_eq!(rows[0].columns().collect::<Vec<_>>(), sent);
    assert!(rows[0].get("note").unwrap().is_null());

    client.list_table(table("server"), 0).await.unwrap();
    client.list_table(table("server"), 10_000).await.unwrap();
    assert_eq!(state.lock().unwrap().limits, vec![2, 1, 500]);
}

#[tokio::test]
async fn row_crud_round_trips_through_backend() {
    let state = seeded();
    let client = client_for(&spawn_backend(state.clone()).await);
    let site = table("site");

    let mut row = Row::new();
    row.insert("SiteID", CellValue::from("s-9"));
    row.insert("Name", CellValue::from("Annex"));
    row.insert("Floors", CellValue::parse_literal("3"));
    client.create_row(site, &row).await.unwrap();

    let fetched = client.get_row(site, "s-9").await.unwrap();
    assert_eq!(fetched.get("Floors"), Some(&CellValue::parse_literal("3")));

    let mut changes = Row::new();
    changes.insert("Name", CellValue::from("North Annex"));
    client.update_row(site, "s-9", &changes).await.unwrap();
    let fetched = client.get_row(site, "s-9").await.unwrap();
    assert_eq!(fetched.get("Name"), Some(&CellValue::from("North Annex")));

    client.delete_row(site, "s-9").await.unwrap();
    assert!(client.get_row(site, "s-9").await.is_err());

    assert!(matches!(
        client.create_row(site, &Row::new()).await,
        Err(ClientError::EmptyRow { .. })
    ));
}

#[tokio::test]
async fn table_summaries_report_in_input_order() {
    let client = client_for(&spawn_backend(seeded()).await);
    let tables = vec![table("site"), table("radio"), table("server")];

    let summaries = client.table_summaries(&tables, 100).await;
    let names: Vec<_> = summaries.iter().map(|s| s.table.table()).collect();
    assert_eq!(names, vec!["Site", "Radio", "Server"]);
    assert_eq!(*summaries[0].rows.as_ref().unwrap(), 1);
    assert!(summaries[1].rows.is_err());
    assert_eq!(*summaries[2].rows.as_ref().unwrap(), 4);
}

#[tokio::test]
async fn trigger_and_watch_waits_past_stale_status() {
    let state = seeded();
    state.lock().unwrap().progress = VecDeque::from(vec![
        json!({ "active": false, "totalDone": 3, "grandTotal": 3 }),
        json!({ "active": true, "totalDone": 2, "grandTotal": 10,
                "details": { "Server": { "done": 1, "total": 6 }, "Site": { "done": 1, "total": 4 } } }),
        json!({ "active": true, "totalDone": 7, "grandTotal": 10 }),
        json!({ "active": false, "totalDone": 10, "grandTotal": 10 }),
    ]);
    let client = client_for(&spawn_backend(state.clone()).await);
    let options = WatchOptions {
        interval: Duration::from_millis(5),
        ..WatchOptions::default()
    };
    let bar = ProgressBar::hidden();

    let status = reindex::trigger_and_watch(&client, &options, &bar)
        .await
        .unwrap();
    assert!(!status.active);
    assert_eq!(status.total_done, 10);
    assert_eq!(status.percent(), 100);
    assert_eq!(bar.position(), 10);
    assert_eq!(state.lock().unwrap().reindexed, 1);
}

#[tokio::test]
async fn watch_gives_up_after_repeated_failures() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}/"));
    let options = WatchOptions {
        interval: Duration::from_millis(1),
        max_failures: 2,
        start_polls: 0,
    };
    let result = reindex::watch(&client, &options, &ProgressBar::hidden()).await;
    assert!(matches!(result, Err(ClientError::Request { .. })));
}

fn run_config(argv: &[&str]) -> crate::app::RunConfig {
    let args = crate::cli::args::CliArgs::parse_from(argv);
    crate::app::build_run_config(args, crate::config::ConfigFile::default(), None).unwrap()
}

#[tokio::test]
async fn table_command_filters_rows_and_writes_json() {
    let base = spawn_backend(seeded()).await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("rows.json");
    let out_str = out.to_string_lossy().to_string();

    let run = run_config(&[
        "freqctl", "--nc", "--base-url", &base, "--output", &out_str, "table", "server", "--match",
        "^db",
    ]);
    crate::app::run_async(run).await.unwrap();

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written, json!([{ "ServerID": 4, "Name": "db01", "Active": true, "Note": "primary" }]));
}

#[tokio::test]
async fn shortcut_filter_then_run_searches_merged_query() {
    let state = seeded();
    let base = spawn_backend(state.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let shortcuts = dir.path().join("shortcuts.yml").to_string_lossy().to_string();
    let out = dir.path().join("hits.json").to_string_lossy().to_string();

    for fragment in ["os:linux", "OS:Linux"] {
        let run = run_config(&[
            "freqctl", "--nc", "--shortcuts-file", &shortcuts, "--output", &out, "shortcut",
            "filter", "servers", fragment,
        ]);
        crate::app::run_async(run).await.unwrap();
    }
    let run = run_config(&[
        "freqctl", "--nc", "--base-url", &base, "--shortcuts-file", &shortcuts, "--output", &out,
        "shortcut", "run", "servers",
    ]);
    crate::app::run_async(run).await.unwrap();

    let run = run_config(&[
        "freqctl", "--nc", "--base-url", &base, "--output", &out, "search", "srv", "-f",
        "type:server",
    ]);
    crate::app::run_async(run).await.unwrap();

    let queries = state.lock().unwrap().queries.clone();
    assert_eq!(queries, vec!["type:server AND os:linux", "srv AND type:server"]);

    let hits: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(hits[0]["type"], "server");
}

#[tokio::test]
async fn search_refuses_empty_queries() {
    let run = run_config(&["freqctl", "--nc", "search"]);
    assert!(crate::app::run_async(run).await.is_err());
}
