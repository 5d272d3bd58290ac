//! Output rendering for the chat front end.
//!
//! The [`MessageLog`] is the source of truth for what the conversation looks
//! like. Renderers only project it: [`render_log`] is the full, pure
//! projection used for redraws, and the [`Renderer`] trait receives the
//! incremental changes the controller makes so a terminal can print them as
//! they happen.

use std::io::{self, Stdout, Write};

use crate::message_log::{ArtifactKind, Entry, EntryId, Message, MessageLog, Role};

/// ANSI escape code for dim text (used for agent labels).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the user prefix).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for notices).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for the bot prefix).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for magenta text (used for upload placeholders).
const ANSI_MAGENTA: &str = "\x1b[35m";

/// Which of the two mutually exclusive views is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// No token: the login/register prompt.
    Authenticating,
    /// A token is present: the chat itself.
    Chatting,
}

/// Trait for rendering controller output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording renderers in tests
pub trait Renderer: Send {
    /// Called when the controller switches views.
    fn show_view(&mut self, view: View);

    /// Show a notification the user must see before continuing.
    ///
    /// Used for raw server responses (register, upload) and failures.
    fn notify(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called after an entry is appended to the log.
    fn append_entry(&mut self, id: EntryId, entry: &Entry);

    /// Called after a streaming entry's text has grown.
    fn update_entry(&mut self, id: EntryId, entry: &Entry);

    /// Called once a streaming entry is frozen.
    fn finish_entry(&mut self, id: EntryId, entry: &Entry) {
        _ = id;
        _ = entry;
    }
}

/// Formats one entry as a single display block, without styling.
pub fn format_entry(entry: &Entry) -> String {
    match entry {
        Entry::Message(message) => format!("{}{}", message_prefix(message), message.text),
        Entry::Upload(artifact) => match (&artifact.kind, &artifact.preview_url) {
            (ArtifactKind::Image, Some(preview)) => {
                format!("[image] {} <{}>", artifact.file_name, preview_label(preview))
            }
            (ArtifactKind::Image, None) => format!("[image] {}", artifact.file_name),
            (ArtifactKind::File, _) => format!("[file] {}", artifact.file_name),
        },
    }
}

// Inline `data:` previews are cut down to their header.
fn preview_label(preview: &str) -> &str {
    match preview.split_once(',') {
        Some((header, _)) if preview.starts_with("data:") => header,
        _ => preview,
    }
}

/// Projects the whole log to text, one entry per line block.
pub fn render_log(log: &MessageLog) -> String {
    let mut out = String::new();
    for entry in log.entries() {
        out.push_str(&format_entry(entry));
        out.push('\n');
    }
    out
}

fn message_prefix(message: &Message) -> String {
    match (message.role, message.agent_label.as_deref()) {
        (Role::User, _) => "You: ".to_string(),
        (Role::Bot, Some(label)) => format!("[{label}] "),
        (Role::Bot, None) => "Bot: ".to_string(),
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Streaming updates are printed as deltas: the renderer remembers how much
/// of the live entry it has already written and prints only the new suffix.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    live: Option<(EntryId, usize)>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            live: None,
        }
    }

    /// Consumes the renderer and returns its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Flushes to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn write(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
    }

    fn end_live(&mut self) {
        if self.live.take().is_some() {
            self.write("\n");
        }
    }

    fn write_prefix(&mut self, entry: &Entry) {
        let Entry::Message(message) = entry else {
            return;
        };
        let prefix = message_prefix(message);
        if self.use_color {
            let color = match message.role {
                Role::User => ANSI_CYAN,
                Role::Bot if message.agent_label.is_some() => ANSI_DIM,
                Role::Bot => ANSI_GREEN,
            };
            self.write(&format!("{color}{prefix}{ANSI_RESET}"));
        } else {
            self.write(&prefix);
        }
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn show_view(&mut self, view: View) {
        self.end_live();
        match view {
            View::Authenticating => {
                self.write("Not signed in. Use /login <user> or /register <user>.\n")
            }
            View::Chatting => self.write("Signed in. Type a message, or /help for commands.\n"),
        }
        self.flush();
    }

    fn notify(&mut self, text: &str) {
        self.end_live();
        if self.use_color {
            self.write(&format!("{ANSI_YELLOW}[notice]{ANSI_RESET} {text}\n"));
        } else {
            self.write(&format!("[notice] {text}\n"));
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.end_live();
        self.flush();
        eprintln!("Error: {error}");
    }

    fn print_info(&mut self, info: &str) {
        self.end_live();
        self.write(&format!("{info}\n"));
        self.flush();
    }

    fn append_entry(&mut self, id: EntryId, entry: &Entry) {
        self.end_live();
        match entry {
            Entry::Message(message) => {
                self.write_prefix(entry);
                self.write(&message.text);
                self.live = Some((id, message.text.len()));
            }
            Entry::Upload(_) => {
                let line = format_entry(entry);
                if self.use_color {
                    self.write(&format!("{ANSI_MAGENTA}{line}{ANSI_RESET}\n"));
                } else {
                    self.write(&format!("{line}\n"));
                }
            }
        }
        self.flush();
    }

    fn update_entry(&mut self, id: EntryId, entry: &Entry) {
        let Entry::Message(message) = entry else {
            return;
        };
        match self.live {
            Some((live, printed)) if live == id => {
                match message.text.get(printed..) {
                    Some(delta) => self.write(delta),
                    None => {
                        // Not a pure extension; redraw the entry on a new line.
                        self.write("\n");
                        self.write_prefix(entry);
                        self.write(&message.text);
                    }
                }
            }
            _ => {
                self.end_live();
                self.write_prefix(entry);
                self.write(&message.text);
            }
        }
        self.live = Some((id, message.text.len()));
        self.flush();
    }

    fn finish_entry(&mut self, id: EntryId, entry: &Entry) {
        if self.live.is_some_and(|(live, _)| live != id) {
            self.update_entry(id, entry);
        }
        self.end_live();
        self.flush();
    }
}
