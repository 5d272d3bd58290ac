//! The UI controller: session-gated chat, upload, and history.
//!
//! [`UiController`] owns the [`Session`], the [`MessageLog`] and a
//! [`ChatBackend`]. The view it reports is derived from the session alone,
//! so "authenticating" and "chatting" can never both hold. Every failure is
//! shown through [`Renderer::notify`] and also returned to the caller.

use crate::auth::{self, AuthKind, AuthOutcome, Credentials};
use crate::client::ChatBackend;
use crate::error::{Error, Result};
use crate::history;
use crate::message_log::{EntryId, Message, MessageLog};
use crate::render::{Renderer, View};
use crate::session::{Session, TokenStorage};
use crate::stream::{ResponseStream, render_stream};
use crate::upload::{self, UploadFile};

/// Label attached to streamed bot replies unless configured otherwise.
pub const DEFAULT_AGENT_LABEL: &str = "Text Agent";

/// Reacts to user actions and session transitions.
pub struct UiController<B: ChatBackend, S: TokenStorage> {
    backend: B,
    session: Session<S>,
    log: MessageLog,
    agent_label: Option<String>,
    history_loaded: bool,
}

impl<B: ChatBackend, S: TokenStorage> UiController<B, S> {
    /// Creates a controller over an already loaded session.
    pub fn new(backend: B, session: Session<S>) -> Self {
        Self {
            backend,
            session,
            log: MessageLog::new(),
            agent_label: Some(DEFAULT_AGENT_LABEL.to_string()),
            history_loaded: false,
        }
    }

    /// Sets the label shown on streamed bot replies; `None` shows none.
    pub fn with_agent_label(mut self, label: Option<String>) -> Self {
        self.agent_label = label;
        self
    }

    /// The view the session currently allows.
    pub fn view(&self) -> View {
        if self.session.is_authenticated() {
            View::Chatting
        } else {
            View::Authenticating
        }
    }

    /// The session store.
    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    /// The message log.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shows the initial view; with a persisted token, also loads history.
    pub async fn start(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let view = self.view();
        renderer.show_view(view);
        if view == View::Chatting {
            self.load_history_once(renderer).await?;
        }
        Ok(())
    }

    /// Logs in or registers.
    ///
    /// A login that yields a token switches to the chat view and loads
    /// history. Anything else is shown verbatim as a notice.
    pub async fn authenticate(
        &mut self,
        kind: AuthKind,
        credentials: &Credentials,
        renderer: &mut dyn Renderer,
    ) -> Result<AuthOutcome> {
        if self.view() == View::Chatting {
            return Err(surface(
                renderer,
                Error::validation("Already signed in; log out first", None),
            ));
        }
        let outcome = auth::authenticate(&self.backend, kind, credentials)
            .await
            .map_err(|err| surface(renderer, err))?;
        match &outcome {
            AuthOutcome::Token(token) => {
                self.session
                    .set(token.clone())
                    .map_err(|err| surface(renderer, err))?;
                self.log = MessageLog::new();
                self.history_loaded = false;
                renderer.show_view(View::Chatting);
                self.load_history_once(renderer).await?;
            }
            AuthOutcome::Notice(body) => renderer.notify(body),
        }
        Ok(outcome)
    }

    /// Forgets the token and returns to the auth view.
    pub fn logout(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        self.session.clear().map_err(|err| surface(renderer, err))?;
        self.log = MessageLog::new();
        self.history_loaded = false;
        renderer.show_view(View::Authenticating);
        Ok(())
    }

    /// Sends a chat query and streams the reply into the log.
    ///
    /// Returns the bot entry, or `None` when the reply was empty.
    pub async fn send(
        &mut self,
        query: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<Option<EntryId>> {
        let token = self.require_token(renderer)?;
        let id = self.log.append(Message::user(query));
        show_complete(&self.log, id, renderer);

        let reply = self
            .backend
            .chat(&token, query)
            .await
            .map_err(|err| surface(renderer, err))?;
        let mut response = ResponseStream::new(self.agent_label.clone());
        response.begin(reply.format);
        render_stream(reply.body, response, &mut self.log, renderer)
            .await
            .map_err(|err| surface(renderer, err))
    }

    /// Uploads the selected file and appends its placeholder.
    ///
    /// With no selection the user is prompted and nothing is sent.
    pub async fn upload(
        &mut self,
        selection: Option<&UploadFile>,
        renderer: &mut dyn Renderer,
    ) -> Result<EntryId> {
        if selection.is_none() {
            return Err(surface(renderer, upload::no_selection()));
        }
        let token = self.require_token(renderer)?;
        let receipt = upload::upload(&self.backend, &token, selection)
            .await
            .map_err(|err| surface(renderer, err))?;
        renderer.notify(&receipt.response.to_string());
        let id = self.log.append(receipt.artifact);
        show_complete(&self.log, id, renderer);
        Ok(id)
    }

    async fn load_history_once(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        if self.history_loaded {
            return Ok(());
        }
        self.history_loaded = true;
        let token = self.require_token(renderer)?;
        let messages = history::load_history(&self.backend, &token)
            .await
            .map_err(|err| surface(renderer, err))?;
        for id in history::replay(&mut self.log, messages) {
            show_complete(&self.log, id, renderer);
        }
        Ok(())
    }

    fn require_token(&self, renderer: &mut dyn Renderer) -> Result<String> {
        match self.session.get() {
            Some(token) => Ok(token.to_string()),
            None => Err(surface(renderer, Error::authentication("Not signed in"))),
        }
    }
}

/// Reports an entry that will never change after being appended.
fn show_complete(log: &MessageLog, id: EntryId, renderer: &mut dyn Renderer) {
    if let Some(entry) = log.get(id) {
        renderer.append_entry(id, entry);
        renderer.finish_entry(id, entry);
    }
}

fn surface(renderer: &mut dyn Renderer, err: Error) -> Error {
    tracing::warn!(error = %err, "operation failed");
    renderer.notify(&err.to_string());
    err
}
