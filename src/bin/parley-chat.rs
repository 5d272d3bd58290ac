//! Interactive terminal front end for the chat backend.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on localhost:8000
//! parley-chat
//!
//! # Point at another backend and keep the token elsewhere
//! parley-chat --api-base https://chat.example.com/ --storage ./session.json
//!
//! # Force event-stream decoding and disable colors
//! parley-chat --format sse --no-color
//! ```
//!
//! While signed out, `/login <user>` and `/register <user>` prompt for a
//! password. While signed in, anything typed is sent as a query; `/help`
//! lists the remaining commands.

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use parley::chat::{
    AuthCommand, ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, auth_help_text,
    chat_help_text, parse_auth_command, parse_chat_command,
};
use parley::{
    AuthKind, ChatClient, Credentials, FileStorage, Session, UiController, UploadFile, View,
    render_log,
};

type Controller = UiController<ChatClient, FileStorage>;

enum Flow {
    Continue,
    Quit,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("parley-chat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;

    let storage_path = config
        .storage_path
        .clone()
        .or_else(FileStorage::default_path)
        .ok_or("no config directory; pass --storage PATH")?;
    tracing::debug!(path = %storage_path.display(), "using session storage");

    let client = ChatClient::with_options(&config.api_base, config.timeout, config.stream_format)?;
    let session = Session::load(FileStorage::new(storage_path))?;
    let mut controller = UiController::new(client, session).with_agent_label(config.agent_label);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    println!("Parley Chat ({})", config.api_base);
    // Failures were already shown as notices.
    let _ = controller.start(&mut renderer).await;

    loop {
        let prompt = match controller.view() {
            View::Authenticating => "> ",
            View::Chatting => "You: ",
        };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let flow = match controller.view() {
            View::Authenticating => {
                handle_auth_line(&mut controller, &mut renderer, &mut rl, line).await
            }
            View::Chatting => {
                let _ = rl.add_history_entry(line);
                handle_chat_line(&mut controller, &mut renderer, line).await
            }
        };
        if let Flow::Quit = flow {
            println!("Goodbye!");
            break;
        }
    }

    Ok(())
}

async fn handle_auth_line(
    controller: &mut Controller,
    renderer: &mut PlainTextRenderer,
    rl: &mut DefaultEditor,
    line: &str,
) -> Flow {
    let (kind, username) = match parse_auth_command(line) {
        AuthCommand::Login(username) => (AuthKind::Login, username),
        AuthCommand::Register(username) => (AuthKind::Register, username),
        AuthCommand::Help => {
            print_help(auth_help_text());
            return Flow::Continue;
        }
        AuthCommand::Quit => return Flow::Quit,
        AuthCommand::Invalid(message) => {
            renderer.print_error(&message);
            return Flow::Continue;
        }
    };
    let password = match rl.readline("Password: ") {
        Ok(password) => password,
        Err(ReadlineError::Eof) => return Flow::Quit,
        Err(_) => return Flow::Continue,
    };
    let credentials = Credentials::new(username, password);
    // Failures were already shown as notices.
    let _ = controller.authenticate(kind, &credentials, renderer).await;
    Flow::Continue
}

async fn handle_chat_line(
    controller: &mut Controller,
    renderer: &mut PlainTextRenderer,
    line: &str,
) -> Flow {
    let Some(command) = parse_chat_command(line) else {
        let _ = controller.send(line, renderer).await;
        return Flow::Continue;
    };
    match command {
        ChatCommand::Upload(None) => {
            let _ = controller.upload(None, renderer).await;
        }
        ChatCommand::Upload(Some(path)) => match UploadFile::from_path(&path).await {
            Ok(file) => {
                let _ = controller.upload(Some(&file), renderer).await;
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::History => {
            let log = controller.log();
            if log.is_empty() {
                renderer.print_info("(no messages yet)");
            } else {
                renderer.print_info(render_log(log).trim_end());
            }
        }
        ChatCommand::Logout => {
            let _ = controller.logout(renderer);
        }
        ChatCommand::Help => print_help(chat_help_text()),
        ChatCommand::Quit => return Flow::Quit,
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    Flow::Continue
}

fn print_help(text: &str) {
    for line in text.lines() {
        println!("    {}", line);
    }
}
