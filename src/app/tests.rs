use super::*;
use crate::testutil::{Answer, ScriptedPrompter, TEST_KEY, TEST_USER_ID};
use axum::extract::{Multipart, Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Recorded {
    patches: Arc<Mutex<Vec<(String, Value)>>>,
    uploads: Arc<Mutex<Vec<(String, String, usize)>>>,
}

#[derive(Clone)]
struct Mock {
    base: String,
    auth_level: i64,
    recorded: Recorded,
}

async fn user(State(mock): State<Mock>, Path(id): Path<u64>) -> Response {
    if id == TEST_USER_ID {
        Json(json!({"id": id, "username": "nerd", "auth_level": mock.auth_level})).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn anime_all() -> Json<Value> {
    Json(json!({
        "5": {"title": "Show"},
        "6": {"title": "Film"},
        "7": {"title": "Empty"}
    }))
}

async fn anime_info(State(mock): State<Mock>, Path(id): Path<String>) -> Response {
    match id.as_str() {
        "5" => Json(json!({"title": "Show"})).into_response(),
        "6" => Json(json!({
            "title": "Film",
            "external": {
                "myanimelist": "https://myanimelist.net/anime/61",
                "jikan": format!("{}/anime/61", mock.base),
                "anilist": "https://anilist.co/anime/610"
            }
        }))
        .into_response(),
        "7" => Json(json!({"title": "Empty"})).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn anime_patch(State(mock): State<Mock>, Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    mock.recorded.patches.lock().unwrap().push((id, body));
    Json(json!({"details": "Anime saved", "code": 200}))
}

async fn anime_media(Path(id): Path<String>) -> Json<Value> {
    match id.as_str() {
        "5" => Json(json!({"episodes": [1, 2], "bonus": ["NCOP.mkv"]})),
        "6" => Json(json!({"episodes": [1], "bonus": []})),
        _ => Json(json!({"episodes": [], "bonus": []})),
    }
}

async fn media_item(Path((id, media)): Path<(String, String)>, RawQuery(query): RawQuery) -> Response {
    if query.as_deref() == Some("signUrl") {
        return Json(json!({"url": format!("/signed/{}/{}", id, media)})).into_response();
    }
    format!("media {}/{}", id, media).into_response()
}

async fn thumbnail(State(mock): State<Mock>, Path(id): Path<String>, mut multipart: Multipart) -> Json<Value> {
    let field = multipart.next_field().await.unwrap().unwrap();
    let file_name = field.file_name().unwrap().to_string();
    let data = field.bytes().await.unwrap();
    mock.recorded.uploads.lock().unwrap().push((id, file_name, data.len()));
    Json(json!({"details": "Thumbnail stored", "code": 201}))
}

async fn nyaa_page(Path(id): Path<u64>) -> Html<&'static str> {
    match id {
        1234 => Html(
            r#"<a href="/download/1234.torrent">Download</a>
               <a href="magnet:?xt=urn:btih:aaaa&amp;dn=Show">Magnet</a>"#,
        ),
        77 => Html(r#"<a href="magnet:?xt=urn:btih:bbbb">Magnet</a>"#),
        _ => Html("<p>This torrent has been removed.</p>"),
    }
}

async fn jikan_anime(State(mock): State<Mock>, Path(id): Path<u64>) -> Json<Value> {
    Json(json!({"data": {"images": {"jpg": {"image_url": format!("{}/img/{}.jpg", mock.base, id)}}}}))
}

async fn jikan_episodes(Path(id): Path<u64>) -> Json<Value> {
    match id {
        61 => Json(json!({"data": [{"title": "The Film"}]})),
        _ => Json(json!({"data": []})),
    }
}

async fn backend(auth_level: i64) -> (String, Recorded) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let recorded = Recorded::default();

    let router = Router::new()
        .route("/user/{id}", get(user))
        .route("/archive/anime/all", get(anime_all))
        .route("/archive/anime/{id}", get(anime_info).patch(anime_patch))
        .route("/archive/anime/{id}/media", get(anime_media))
        .route("/archive/anime/{id}/media/{media}", get(media_item))
        .route("/archive/anime/{id}/thumbnail", put(thumbnail))
        .route(
            "/archive/games/all",
            get(|| async { Json(json!({"1": {"title": "Doom", "platform": "PC"}})) }),
        )
        .route("/view/{id}", get(nyaa_page))
        .route("/anime/{id}", get(jikan_anime))
        .route("/anime/{id}/episodes", get(jikan_episodes))
        .route("/img/{name}", get(|| async { vec![0xffu8, 0xd8, 0xff, 0xe0] }))
        .with_state(Mock {
            base: base.clone(),
            auth_level,
            recorded: recorded.clone(),
        });

    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    (base, recorded)
}

struct Harness {
    app: App<ScriptedPrompter>,
    dir: TempDir,
    base: String,
    recorded: Recorded,
}

impl Harness {
    async fn new(auth_level: i64, answers: Vec<Answer>) -> Self {
        Self::build(auth_level, answers, true, true).await
    }

    async fn build(auth_level: i64, answers: Vec<Answer>, with_server: bool, with_key: bool) -> Self {
        let (base, recorded) = backend(auth_level).await;
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let mut config = Configuration::default();
        if with_server {
            config.server = Some(base.clone());
        }
        config.downloads_folder = dir.path().join("downloads").to_string_lossy().into_owned();
        config.player = "true".to_string();
        config.vlc_auto_exit = true;

        let credentials = CredentialStore::beside(&config_path);
        if with_key {
            credentials.store(TEST_KEY).unwrap();
        }

        let endpoints = Endpoints {
            jikan: base.clone(),
            nyaa: base.clone(),
        };
        let app = App::new(
            ScriptedPrompter::new(answers),
            config,
            config_path,
            credentials,
            endpoints,
        )
        .unwrap();

        Self {
            app,
            dir,
            base,
            recorded,
        }
    }

    fn messages(&self) -> &[String] {
        &self.app.prompter().messages
    }

    fn saw_message(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }

    fn downloads(&self) -> std::path::PathBuf {
        self.dir.path().join("downloads")
    }
}

#[tokio::test]
async fn test_save_episode_to_downloads() {
    let mut h = Harness::new(
        1,
        vec![
            Answer::Choose("Archive"),
            Answer::Choose("Anime"),
            Answer::Choose("5"),
            Answer::Choose("1"),
            Answer::Choose("Save to downloads"),
        ],
    )
    .await;

    h.app.run().await.unwrap();

    let file = h.downloads().join("Show - Episode 01.mp4");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "media 5/1");
    assert!(h.saw_message("Saved file to"));
    assert!(!h.saw_message("Something went wrong"));
    assert_eq!(h.app.prompter().remaining(), 0);
    assert_eq!(h.app.prompter().backtitle, format!(" {} v{} | User: nerd", TITLE, VERSION));
}

#[tokio::test]
async fn test_episode_menu_lists_descriptor_episodes() {
    let mut h = Harness::new(
        1,
        vec![Answer::Choose("Archive"), Answer::Choose("Anime"), Answer::Choose("5")],
    )
    .await;

    h.app.run().await.unwrap();

    let menus = &h.app.prompter().menus;
    let titles: Vec<&str> = menus[2].iter().map(|i| i.label.as_str()).collect();
    assert_eq!(titles, vec!["Show", "Film", "Empty"]);
    let episodes: Vec<&str> = menus[3].iter().map(|i| i.tag.as_str()).collect();
    assert_eq!(episodes, vec!["1", "2", "*"]);
}

#[tokio::test]
async fn test_single_episode_title_plays_as_movie() {
    let mut h = Harness::new(
        1,
        vec![
            Answer::Choose("Archive"),
            Answer::Choose("Anime"),
            Answer::Choose("6"),
            Answer::Choose("Save to downloads"),
        ],
    )
    .await;

    h.app.run().await.unwrap();

    let file = h.downloads().join("Film - Movie.mp4");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "media 6/_movie");

    // Backing out of the movie lands on the title list, not an episode menu.
    let menus = &h.app.prompter().menus;
    assert!(menus[3].iter().any(|i| i.tag == "Save to downloads"));
    assert!(menus[4].iter().any(|i| i.tag == "6"));
}

#[tokio::test]
async fn test_bonus_item() {
    let mut h = Harness::new(
        1,
        vec![
            Answer::Choose("Archive"),
            Answer::Choose("Anime"),
            Answer::Choose("5"),
            Answer::Choose("*"),
            Answer::Choose("NCOP.mkv"),
            Answer::Choose("Save to downloads"),
        ],
    )
    .await;

    h.app.run().await.unwrap();

    let file = h.downloads().join("Show - NCOP.mkv");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "media 5/NCOP.mkv");

    // The bonus menu was replaced, so backing out returns to the episodes.
    let menus = &h.app.prompter().menus;
    assert!(menus[6].iter().any(|i| i.tag == "*"));
}

#[tokio::test]
async fn test_empty_title_is_not_watchable() {
    let mut h = Harness::new(
        1,
        vec![Answer::Choose("Archive"), Answer::Choose("Anime"), Answer::Choose("7")],
    )
    .await;

    h.app.run().await.unwrap();

    assert!(h.saw_message("This anime seems to be empty."));
    assert!(!h.downloads().exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_stream_launches_player() {
    let mut h = Harness::new(
        1,
        vec![
            Answer::Choose("Archive"),
            Answer::Choose("Anime"),
            Answer::Choose("5"),
            Answer::Choose("2"),
            Answer::Choose("Stream with true"),
        ],
    )
    .await;

    h.app.run().await.unwrap();
    assert!(!h.saw_message("Something went wrong"));
}

#[tokio::test]
async fn test_network_error_returns_to_parent_menu() {
    let mut h = Harness::new(
        1,
        vec![
            Answer::Choose("Archive"),
            Answer::Choose("Linux"),
            Answer::Choose("Anime"),
            Answer::Choose("5"),
        ],
    )
    .await;

    h.app.run().await.unwrap();

    assert!(h.saw_message("Something went wrong"));
    // The flow kept going after the failure.
    assert_eq!(h.app.prompter().remaining(), 0);
}

#[tokio::test]
async fn test_other_archives_show_records() {
    let mut h = Harness::new(
        1,
        vec![Answer::Choose("Archive"), Answer::Choose("Games"), Answer::Choose("1")],
    )
    .await;

    h.app.run().await.unwrap();

    assert!(h.saw_message("Doom\nplatform: \"PC\""));
}

#[tokio::test]
async fn test_about() {
    let mut h = Harness::new(1, vec![Answer::Choose("About")]).await;
    h.app.run().await.unwrap();
    assert!(h.saw_message(SUMMARY));
}

#[tokio::test]
async fn test_contribution_is_submitted() {
    let mut h = Harness::new(
        2,
        vec![
            Answer::Choose("Contribute"),
            Answer::Yes,
            Answer::Type("abc"),
            Answer::Type("12"),
            Answer::Type("My Show"),
            Answer::Type("100"),
            Answer::Type("200"),
            Answer::Type("1234"),
            Answer::Yes,
            Answer::Type("77"),
            Answer::No,
            Answer::Pick(vec!["Japanese"]),
            Answer::Pick(vec!["English", "French"]),
            Answer::Yes,
        ],
    )
    .await;

    h.app.run().await.unwrap();

    assert!(h.saw_message("IDs must be numeric."));
    assert!(h.saw_message("Anime saved\n\nBreadbox response code: 200"));
    assert!(h.saw_message("Thumbnail stored\n\nBreadbox response code: 201"));

    let patches = h.recorded.patches.lock().unwrap().clone();
    assert_eq!(patches.len(), 1);
    let (id, document) = &patches[0];
    assert_eq!(id, "12");
    assert_eq!(document["title"], "My Show");
    assert_eq!(document["audio"], json!(["Japanese"]));
    assert_eq!(document["subtitles"], json!(["English", "French"]));
    assert_eq!(document["external"]["jikan"], format!("{}/anime/100", h.base));
    assert_eq!(document["external"]["anilist"], "https://anilist.co/anime/200");

    let torrents = document["torrents"].as_array().unwrap();
    assert_eq!(torrents.len(), 2);
    assert_eq!(torrents[0]["magnet"], "magnet:?xt=urn:btih:aaaa&dn=Show");
    assert_eq!(torrents[0]["file"], format!("{}/download/1234.torrent", h.base));
    assert_eq!(torrents[0]["url"], format!("{}/view/1234", h.base));
    assert_eq!(torrents[1]["file"], Value::Null);

    let uploads = h.recorded.uploads.lock().unwrap().clone();
    assert_eq!(uploads, vec![("12".to_string(), "thumbnail.jpg".to_string(), 4)]);
}

#[tokio::test]
async fn test_contribution_requires_permission() {
    let mut h = Harness::new(1, vec![Answer::Choose("Contribute")]).await;

    h.app.run().await.unwrap();

    assert!(h.saw_message("You lack the permissions"));
    assert!(h.recorded.patches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unresolvable_torrent_saves_nothing() {
    let mut h = Harness::new(
        2,
        vec![
            Answer::Choose("Contribute"),
            Answer::Yes,
            Answer::Type("12"),
            Answer::Type("My Show"),
            Answer::Type("100"),
            Answer::Type("200"),
            Answer::Type("1234"),
            Answer::Yes,
            Answer::Type("5"),
            Answer::No,
            Answer::Pick(vec![]),
            Answer::Pick(vec![]),
            Answer::Yes,
        ],
    )
    .await;

    h.app.run().await.unwrap();

    assert!(h.saw_message("Could not read torrent 5"));
    assert!(h.recorded.patches.lock().unwrap().is_empty());
    assert!(h.recorded.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelling_the_wizard_discards_input() {
    let mut h = Harness::new(
        2,
        vec![
            Answer::Choose("Contribute"),
            Answer::Yes,
            Answer::Type("12"),
            Answer::Cancel,
        ],
    )
    .await;

    h.app.run().await.unwrap();

    assert!(h.recorded.patches.lock().unwrap().is_empty());
    assert_eq!(h.app.prompter().remaining(), 0);
}

#[tokio::test]
async fn test_declining_confirmation_discards_input() {
    let mut h = Harness::new(
        2,
        vec![
            Answer::Choose("Contribute"),
            Answer::Yes,
            Answer::Type("12"),
            Answer::Type("My Show"),
            Answer::Type("100"),
            Answer::Type("200"),
            Answer::Type("1234"),
            Answer::No,
            Answer::Pick(vec!["Japanese"]),
            Answer::Pick(vec![]),
            Answer::No,
        ],
    )
    .await;

    h.app.run().await.unwrap();

    assert!(h.recorded.patches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_prompts_until_key_is_valid() {
    let mut h = Harness::build(
        1,
        vec![Answer::Type("zyxwvuts-0123456789"), Answer::Type(TEST_KEY)],
        true,
        false,
    )
    .await;

    h.app.run().await.unwrap();

    assert_eq!(h.app.user().unwrap().username, "nerd");
    let stored = CredentialStore::new(h.dir.path().join("credentials")).load().unwrap();
    assert_eq!(stored.as_deref(), Some(TEST_KEY));
}

#[tokio::test]
async fn test_api_key_override_is_not_stored() {
    let h = Harness::build(1, vec![], true, false).await;
    let mut app = h.app.with_api_key(Some(TEST_KEY.to_string()));

    app.run().await.unwrap();

    assert!(app.user().is_some());
    let stored = CredentialStore::new(h.dir.path().join("credentials")).load().unwrap();
    assert_eq!(stored, None);
}

#[tokio::test]
async fn test_cancelled_key_prompt_exits_cleanly() {
    let mut h = Harness::build(1, vec![], true, false).await;

    h.app.run().await.unwrap();

    assert!(h.app.user().is_none());
}

#[tokio::test]
async fn test_missing_server_is_asked_for_and_saved() {
    let mut h = Harness::build(1, vec![], false, true).await;
    let base = h.base.clone();
    let server: &'static str = Box::leak(base.clone().into_boxed_str());
    h.app.prompter = ScriptedPrompter::new(vec![Answer::Type("not a url"), Answer::Type(server)]);

    h.app.run().await.unwrap();

    assert!(h.saw_message("not a url is not a valid URL"));
    assert_eq!(h.app.config().server.as_deref(), Some(base.as_str()));
    let saved = Configuration::from_file(&h.dir.path().join("config.json")).unwrap();
    assert_eq!(saved.server.as_deref(), Some(base.as_str()));
}

#[tokio::test]
async fn test_settings_toggle_is_saved() {
    let mut h = Harness::new(1, vec![Answer::Choose("Settings"), Answer::Choose("Auto-exit")]).await;

    h.app.run().await.unwrap();

    assert!(!h.app.config().vlc_auto_exit);
    let saved = Configuration::from_file(&h.dir.path().join("config.json")).unwrap();
    assert!(!saved.vlc_auto_exit);
}

#[tokio::test]
async fn test_navigation_stack() {
    let mut h = Harness::new(1, vec![Answer::Choose("About"), Answer::Choose("About")]).await;

    h.app.navigate(Screen::MainMenu).await.unwrap();

    // Main menu, about, main menu, about, main menu (cancelled).
    assert_eq!(h.app.prompter().menus.len(), 3);
    assert_eq!(h.messages().len(), 2);
}

#[tokio::test]
async fn test_unreachable_server_keeps_current_session() {
    let mut h = Harness::new(
        1,
        vec![
            Answer::Choose("Settings"),
            Answer::Choose("Server"),
            Answer::Type("http://127.0.0.1:1"),
            Answer::Cancel,
            Answer::Choose("Archive"),
            Answer::Choose("Anime"),
        ],
    )
    .await;

    h.app.run().await.unwrap();

    assert!(h.saw_message("Could not connect to http://127.0.0.1:1"));
    assert!(!h.saw_message("Something went wrong"));
    assert_eq!(h.app.user().unwrap().username, "nerd");
    assert_eq!(h.app.config().server.as_deref(), Some(h.base.as_str()));

    let saved = Configuration::from_file(&h.dir.path().join("config.json")).unwrap();
    assert_ne!(saved.server.as_deref(), Some("http://127.0.0.1:1"));

    // The archive still works after the failed switch.
    let menus = &h.app.prompter().menus;
    assert!(menus.iter().any(|menu| menu.iter().any(|i| i.tag == "5")));
}

#[tokio::test]
async fn test_server_change_is_saved_once_it_works() {
    let (other, _) = backend(1).await;
    let other: &'static str = Box::leak(other.into_boxed_str());
    let mut h = Harness::new(
        1,
        vec![Answer::Choose("Settings"), Answer::Choose("Server"), Answer::Type(other)],
    )
    .await;

    h.app.run().await.unwrap();

    assert_eq!(h.app.config().server.as_deref(), Some(other));
    let saved = Configuration::from_file(&h.dir.path().join("config.json")).unwrap();
    assert_eq!(saved.server.as_deref(), Some(other));
    assert!(h.app.user().is_some());
}

#[tokio::test]
async fn test_missing_session_runs_login_again() {
    let mut h = Harness::new(1, vec![Answer::Choose("Anime")]).await;

    h.app.navigate(Screen::ArchiveBrowse).await.unwrap();

    assert!(!h.saw_message("Something went wrong"));
    assert_eq!(h.app.user().unwrap().username, "nerd");
    assert!(h.app.prompter().menus[0].iter().any(|i| i.tag == "Anime"));
    assert!(h.app.prompter().menus[1].iter().any(|i| i.tag == "5"));
}

#[tokio::test]
async fn test_cancelled_login_from_a_screen_exits() {
    let mut h = Harness::build(1, vec![], true, false).await;

    let err = h.app.navigate(Screen::ArchiveBrowse).await.unwrap_err();

    assert!(err.downcast_ref::<ExitRequested>().is_some());
    assert!(h.app.user().is_none());
}
