//! Controller behavior against an in-process backend.

use std::sync::Mutex;

use bytes::Bytes;
use serde_json::{Value, json};

use parley::chat::ChatConfig;
use parley::history::HistoryMessage;
use parley::render::Renderer;
use parley::session::TOKEN_KEY;
use parley::{
    ArtifactKind, AuthKind, AuthOutcome, AuthResponse, ChatBackend, ChatResponse, Credentials,
    Entry, EntryId, Error, MemoryStorage, PlainTextRenderer, Result, Role, Session, StreamFormat,
    TokenStorage, UiController, UploadFile, View, render_log,
};

#[derive(Default)]
struct FakeBackend {
    auth_status: u16,
    auth_body: String,
    chat_format: Option<StreamFormat>,
    // `None` yields a transport error at that position.
    chat_chunks: Vec<Option<Vec<u8>>>,
    history: Vec<HistoryMessage>,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn login_ok(token: &str) -> Self {
        Self {
            auth_status: 200,
            auth_body: json!({ "access_token": token }).to_string(),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(call)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl ChatBackend for FakeBackend {
    async fn authenticate(
        &self,
        kind: AuthKind,
        credentials: &Credentials,
    ) -> Result<AuthResponse> {
        self.record(format!(
            "{} {}:{}",
            kind.endpoint(),
            credentials.username,
            credentials.password
        ));
        Ok(AuthResponse {
            status: self.auth_status,
            body: self.auth_body.clone(),
        })
    }

    async fn chat(&self, token: &str, query: &str) -> Result<ChatResponse> {
        self.record(format!("chat {token} {query}"));
        let chunks: Vec<Result<Bytes>> = self
            .chat_chunks
            .iter()
            .map(|chunk| match chunk {
                Some(bytes) => Ok(Bytes::from(bytes.clone())),
                None => Err(Error::streaming("connection reset", None)),
            })
            .collect();
        Ok(ChatResponse {
            format: self.chat_format.unwrap_or(StreamFormat::Raw),
            body: Box::pin(futures::stream::iter(chunks)),
        })
    }

    async fn upload(&self, token: &str, file: &UploadFile) -> Result<Value> {
        self.record(format!("upload {token} {}", file.file_name));
        Ok(json!({ "filename": file.file_name, "status": "stored" }))
    }

    async fn history(&self, token: &str) -> Result<Vec<HistoryMessage>> {
        self.record(format!("history {token}"));
        Ok(self.history.clone())
    }
}

#[derive(Default)]
struct Recorder {
    views: Vec<View>,
    notices: Vec<String>,
    appended: Vec<EntryId>,
    updates: usize,
    // Message text as shown by every append and update, in order.
    shown: Vec<String>,
}

impl Renderer for Recorder {
    fn show_view(&mut self, view: View) {
        self.views.push(view);
    }

    fn notify(&mut self, text: &str) {
        self.notices.push(text.to_string());
    }

    fn print_error(&mut self, error: &str) {
        self.notices.push(error.to_string());
    }

    fn print_info(&mut self, _: &str) {}

    fn append_entry(&mut self, id: EntryId, entry: &Entry) {
        self.appended.push(id);
        if let Some(message) = entry.as_message() {
            self.shown.push(message.text.clone());
        }
    }

    fn update_entry(&mut self, _: EntryId, entry: &Entry) {
        self.updates += 1;
        if let Some(message) = entry.as_message() {
            self.shown.push(message.text.clone());
        }
    }
}

fn text(chunk: &str) -> Option<Vec<u8>> {
    Some(chunk.as_bytes().to_vec())
}

fn history_message(role: &str, content: &str) -> HistoryMessage {
    HistoryMessage {
        role: role.to_string(),
        content: content.to_string(),
        meta: None,
    }
}

fn signed_in(backend: FakeBackend) -> UiController<FakeBackend, MemoryStorage> {
    let mut storage = MemoryStorage::new();
    storage.store(TOKEN_KEY, "T").unwrap();
    UiController::new(backend, Session::load(storage).unwrap())
}

fn signed_out(backend: FakeBackend) -> UiController<FakeBackend, MemoryStorage> {
    UiController::new(backend, Session::load(MemoryStorage::new()).unwrap())
}

#[tokio::test]
async fn login_stores_token_and_loads_history_once() {
    let storage = MemoryStorage::new();
    let mut controller = UiController::new(
        FakeBackend::login_ok("T"),
        Session::load(storage.clone()).unwrap(),
    );
    let mut renderer = Recorder::default();
    controller.start(&mut renderer).await.unwrap();
    assert_eq!(controller.view(), View::Authenticating);
    assert_eq!(controller.backend().count("history"), 0);

    let outcome = controller
        .authenticate(AuthKind::Login, &Credentials::new("a", "b"), &mut renderer)
        .await
        .unwrap();
    assert_eq!(outcome, AuthOutcome::Token("T".to_string()));
    assert_eq!(controller.view(), View::Chatting);
    assert_eq!(controller.session().get(), Some("T"));
    assert_eq!(storage.load(TOKEN_KEY).unwrap().as_deref(), Some("T"));
    assert_eq!(
        controller.backend().calls(),
        vec!["login a:b".to_string(), "history T".to_string()]
    );
    assert_eq!(renderer.views, vec![View::Authenticating, View::Chatting]);
}

#[tokio::test]
async fn login_without_token_is_a_notice() {
    let backend = FakeBackend {
        auth_status: 401,
        auth_body: r#"{"detail":"Incorrect username or password"}"#.to_string(),
        ..FakeBackend::default()
    };
    let mut controller = signed_out(backend);
    let mut renderer = Recorder::default();
    let outcome = controller
        .authenticate(AuthKind::Login, &Credentials::new("a", "bad"), &mut renderer)
        .await
        .unwrap();
    assert!(matches!(outcome, AuthOutcome::Notice(_)));
    assert_eq!(controller.view(), View::Authenticating);
    assert_eq!(
        renderer.notices,
        vec![r#"{"detail":"Incorrect username or password"}"#.to_string()]
    );
    assert_eq!(controller.backend().count("history"), 0);
}

#[tokio::test]
async fn register_shows_the_response_verbatim() {
    let backend = FakeBackend {
        auth_status: 200,
        auth_body: r#"{"message":"User created"}"#.to_string(),
        ..FakeBackend::default()
    };
    let mut controller = signed_out(backend);
    let mut renderer = Recorder::default();
    let outcome = controller
        .authenticate(AuthKind::Register, &Credentials::new("new", "pw"), &mut renderer)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        AuthOutcome::Notice(r#"{"message":"User created"}"#.to_string())
    );
    assert_eq!(controller.view(), View::Authenticating);
    assert_eq!(controller.session().get(), None);
    assert_eq!(controller.backend().calls(), vec!["register new:pw".to_string()]);
}

#[tokio::test]
async fn persisted_token_starts_in_chat_and_loads_history_once() {
    let backend = FakeBackend {
        history: vec![
            history_message("assistant", "hi"),
            history_message("user", "hello"),
        ],
        ..FakeBackend::default()
    };
    let mut controller = signed_in(backend);
    let mut renderer = Recorder::default();
    controller.start(&mut renderer).await.unwrap();
    controller.start(&mut renderer).await.unwrap();

    assert_eq!(controller.view(), View::Chatting);
    assert_eq!(controller.backend().count("history"), 1);
    let messages: Vec<_> = controller.log().messages().cloned().collect();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::Bot);
    assert_eq!(messages[0].text, "hi");
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].text, "hello");
    assert_eq!(renderer.appended.len(), 2);
}

#[tokio::test]
async fn logout_returns_to_authenticating() {
    let storage = MemoryStorage::new();
    let mut controller = UiController::new(
        FakeBackend::login_ok("T"),
        Session::load(storage.clone()).unwrap(),
    );
    let mut renderer = Recorder::default();
    controller
        .authenticate(AuthKind::Login, &Credentials::new("a", "b"), &mut renderer)
        .await
        .unwrap();
    controller.logout(&mut renderer).unwrap();

    assert_eq!(controller.view(), View::Authenticating);
    assert_eq!(controller.session().get(), None);
    assert_eq!(storage.load(TOKEN_KEY).unwrap(), None);
    assert!(controller.log().is_empty());
    assert_eq!(renderer.views.last(), Some(&View::Authenticating));
}

#[tokio::test]
async fn send_streams_reply_into_one_bot_entry() {
    let backend = FakeBackend {
        chat_chunks: vec![text("Hel"), text("lo, "), text("world")],
        ..FakeBackend::default()
    };
    let mut controller = signed_in(backend).with_agent_label(Some("Text Agent".to_string()));
    let mut renderer = Recorder::default();
    let id = controller
        .send("greet me", &mut renderer)
        .await
        .unwrap()
        .expect("reply entry");

    assert_eq!(controller.backend().calls(), vec!["chat T greet me".to_string()]);
    assert_eq!(controller.log().len(), 2);
    let user = controller.log().entries()[0].as_message().unwrap();
    assert_eq!(user.role, Role::User);
    assert_eq!(user.text, "greet me");
    let bot = controller.log().get(id).unwrap().as_message().unwrap();
    assert_eq!(bot.role, Role::Bot);
    assert_eq!(bot.text, "Hello, world");
    assert_eq!(bot.agent_label.as_deref(), Some("Text Agent"));
    assert!(!controller.log().is_streaming(id));
    assert_eq!(renderer.appended.len(), 2);
    assert!(renderer.updates >= 2);
}

#[tokio::test]
async fn multibyte_split_across_chunks_is_reassembled() {
    let backend = FakeBackend {
        // "é" is 0xC3 0xA9.
        chat_chunks: vec![Some(b"caf\xC3".to_vec()), Some(b"\xA9!".to_vec())],
        ..FakeBackend::default()
    };
    let mut controller = signed_in(backend);
    let mut renderer = Recorder::default();
    let id = controller
        .send("q", &mut renderer)
        .await
        .unwrap()
        .expect("reply entry");
    let bot = controller.log().get(id).unwrap().as_message().unwrap();
    assert_eq!(bot.text, "café!");
}

#[tokio::test]
async fn empty_reply_adds_no_bot_entry() {
    let mut controller = signed_in(FakeBackend::default());
    let mut renderer = Recorder::default();
    let entry = controller.send("anyone?", &mut renderer).await.unwrap();
    assert_eq!(entry, None);
    assert_eq!(controller.log().len(), 1);
    assert!(renderer.notices.is_empty());
}

#[tokio::test]
async fn transport_error_keeps_partial_reply_and_notifies() {
    let backend = FakeBackend {
        chat_chunks: vec![text("partial "), text("text"), None, text("never")],
        ..FakeBackend::default()
    };
    let mut controller = signed_in(backend);
    let mut renderer = Recorder::default();
    let err = controller.send("q", &mut renderer).await.unwrap_err();
    assert!(err.is_streaming());
    assert_eq!(controller.log().len(), 2);
    let bot = controller.log().entries()[1].as_message().unwrap();
    assert_eq!(bot.text, "partial text");
    assert_eq!(renderer.notices.len(), 1);
}

#[tokio::test]
async fn event_stream_replies_use_chunk_fields() {
    let backend = FakeBackend {
        chat_format: Some(StreamFormat::EventStream),
        chat_chunks: vec![
            text("data: {\"role\":\"assistant\",\"chunk\":\"Hi\"}\n\n"),
            text("data: {\"role\":\"assistant\",\"chunk\":\" there\"}\n\n"),
            text("event: done\ndata: \n\n"),
            text("data: {\"role\":\"assistant\",\"chunk\":\"ignored\"}\n\n"),
        ],
        ..FakeBackend::default()
    };
    let mut controller = signed_in(backend);
    let mut renderer = Recorder::default();
    let id = controller
        .send("q", &mut renderer)
        .await
        .unwrap()
        .expect("reply entry");
    let bot = controller.log().get(id).unwrap().as_message().unwrap();
    assert_eq!(bot.text, "Hi there");
}

// Exactly what the reference backends write: json.dumps spacing and
// separators sent as the two characters `\n`.
const REFERENCE_WIRE: [&str; 3] = [
    r#"data: {"role": "assistant", "chunk": "Hello "}\n\n"#,
    r#"data: {"role": "assistant", "chunk": "world "}\n\n"#,
    r#"event: done\ndata: {}\n\n"#,
];

#[tokio::test]
async fn default_format_shows_reference_wire_as_it_arrives() {
    let format = ChatConfig::new()
        .stream_format
        .resolve(Some("text/event-stream; charset=utf-8"));
    assert_eq!(format, StreamFormat::Raw);
    let backend = FakeBackend {
        chat_format: Some(format),
        chat_chunks: REFERENCE_WIRE.iter().map(|chunk| text(chunk)).collect(),
        ..FakeBackend::default()
    };
    let mut controller = signed_in(backend);
    let mut renderer = Recorder::default();
    let id = controller
        .send("q", &mut renderer)
        .await
        .unwrap()
        .expect("reply entry");

    // The user entry is shown first, then one showing per chunk.
    let shown = &renderer.shown[1..];
    assert_eq!(shown.len(), REFERENCE_WIRE.len());
    assert_eq!(shown[0], REFERENCE_WIRE[0]);
    for pair in shown.windows(2) {
        assert!(pair[1].len() > pair[0].len());
        assert!(pair[1].starts_with(pair[0].as_str()));
    }
    let bot = controller.log().get(id).unwrap().as_message().unwrap();
    assert_eq!(bot.text, REFERENCE_WIRE.concat());
}

#[tokio::test]
async fn event_stream_format_reads_escaped_reference_framing() {
    let mut chunks: Vec<_> = REFERENCE_WIRE.iter().map(|chunk| text(chunk)).collect();
    chunks.push(text(r#"data: {"role": "assistant", "chunk": "late"}\n\n"#));
    let backend = FakeBackend {
        chat_format: Some(StreamFormat::EventStream),
        chat_chunks: chunks,
        ..FakeBackend::default()
    };
    let mut controller = signed_in(backend);
    let mut renderer = Recorder::default();
    let id = controller
        .send("q", &mut renderer)
        .await
        .unwrap()
        .expect("reply entry");

    assert_eq!(
        renderer.shown[1..],
        ["Hello ".to_string(), "Hello world ".to_string()]
    );
    let bot = controller.log().get(id).unwrap().as_message().unwrap();
    assert_eq!(bot.text, "Hello world ");
}

#[tokio::test]
async fn upload_image_appends_preview() {
    let mut controller = signed_in(FakeBackend::default());
    let mut renderer = Recorder::default();
    let file = UploadFile::new("cat.png", "image/png", vec![0x89, b'P', b'N', b'G']);
    let id = controller.upload(Some(&file), &mut renderer).await.unwrap();

    assert_eq!(controller.backend().calls(), vec!["upload T cat.png".to_string()]);
    let artifact = controller.log().get(id).unwrap().as_upload().unwrap();
    assert_eq!(artifact.kind, ArtifactKind::Image);
    assert_eq!(artifact.file_name, "cat.png");
    assert_eq!(
        artifact.preview_url.as_deref(),
        Some("data:image/png;base64,iVBORw==")
    );
    assert_eq!(renderer.notices.len(), 1);
    assert!(renderer.notices[0].contains("stored"));
}

#[tokio::test]
async fn upload_document_has_no_preview() {
    let mut controller = signed_in(FakeBackend::default());
    let mut renderer = Recorder::default();
    let file = UploadFile::new("report.pdf", "application/pdf", b"%PDF-1.7".to_vec());
    let id = controller.upload(Some(&file), &mut renderer).await.unwrap();
    let artifact = controller.log().get(id).unwrap().as_upload().unwrap();
    assert_eq!(artifact.kind, ArtifactKind::File);
    assert_eq!(artifact.preview_url, None);
}

#[tokio::test]
async fn upload_without_selection_makes_no_request() {
    let mut controller = signed_in(FakeBackend::default());
    let mut renderer = Recorder::default();
    let err = controller.upload(None, &mut renderer).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.to_string(), "Select a file");
    assert!(controller.backend().calls().is_empty());
    assert!(controller.log().is_empty());
    assert_eq!(renderer.notices, vec!["Select a file".to_string()]);
}

#[tokio::test]
async fn signed_out_actions_are_rejected() {
    let mut controller = signed_out(FakeBackend::default());
    let mut renderer = Recorder::default();
    let err = controller.send("hello", &mut renderer).await.unwrap_err();
    assert!(err.is_authentication());
    let file = UploadFile::new("a.txt", "text/plain", b"a".to_vec());
    let err = controller
        .upload(Some(&file), &mut renderer)
        .await
        .unwrap_err();
    assert!(err.is_authentication());
    assert!(controller.backend().calls().is_empty());
    assert!(controller.log().is_empty());
}

#[tokio::test]
async fn authenticate_while_chatting_is_rejected() {
    let mut controller = signed_in(FakeBackend::login_ok("other"));
    let mut renderer = Recorder::default();
    let err = controller
        .authenticate(AuthKind::Login, &Credentials::new("a", "b"), &mut renderer)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(controller.session().get(), Some("T"));
    assert!(controller.backend().calls().is_empty());
}

#[tokio::test]
async fn terminal_transcript_of_a_turn() {
    let backend = FakeBackend {
        chat_chunks: vec![text("Hel"), text("lo")],
        ..FakeBackend::default()
    };
    let mut controller = signed_in(backend).with_agent_label(None);
    let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
    controller.send("q", &mut renderer).await.unwrap();
    let file = UploadFile::new("notes.txt", "text/plain", b"n".to_vec());
    controller.upload(Some(&file), &mut renderer).await.unwrap();

    let output = String::from_utf8(renderer.into_inner()).unwrap();
    assert_eq!(
        output,
        "You: q\n\
         Bot: Hello\n\
         [notice] {\"filename\":\"notes.txt\",\"status\":\"stored\"}\n\
         [file] notes.txt\n"
    );
    assert_eq!(render_log(controller.log()), "You: q\nBot: Hello\n[file] notes.txt\n");
}
