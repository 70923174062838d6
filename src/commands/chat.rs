//! Interactive chat command
//!
//! Drives one conversation turn at a time: ensure a session id, append the
//! user message optimistically, persist it, ask the pipeline for a reply,
//! append and persist that too. Guest conversations go to the on-device
//! cache instead of the backend; a pending guest cache is migrated on
//! startup when a user id is configured. Realtime insert events are drained
//! between turns and deduplicated by the message store.

use anyhow::Context;
use colored::Colorize;
use metrics::increment_counter;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use uuid::Uuid;

use crate::assistant::{
    extract_vehicle_info, extract_video_links, ChatMessage, FunctionEndpointClient, MessageBody,
    ResponsePipeline, VehicleContext,
};
use crate::backend::{create_backend, session_title, ChatBackend, MessageEvent, MessageEvents};
use crate::config::Config;
use crate::error::Result;
use crate::session::{
    ensure_chat_id, migrate_guest_session, new_session_id, validate_session_id, GuestCache,
    MessageStore, SaveOutcome,
};

/// Where conversation turns are persisted.
enum Mode {
    /// Unauthenticated: on-device cache only
    Guest { cache: GuestCache, chat_id: Uuid },
    /// Authenticated: hosted/local backend rows
    Account {
        backend: Box<dyn ChatBackend>,
        user_id: Uuid,
        session_id: Option<Uuid>,
        /// False after a failed session create: the conversation continues
        /// locally under a minted id and is simply not persisted.
        persisted: bool,
    },
}

struct ChatLoop {
    store: MessageStore,
    pipeline: ResponsePipeline,
    vehicle: Option<VehicleContext>,
    mode: Mode,
    events: Option<MessageEvents>,
}

/// Run the interactive chat session
pub async fn run_chat(
    config: Config,
    resume: Option<String>,
    guest: bool,
    vehicle: Option<String>,
) -> Result<()> {
    let user_id = if guest { None } else { config.chat.user_id };

    let vehicle = resolve_vehicle(vehicle.or_else(|| config.chat.vehicle.clone()));
    if let Some(v) = &vehicle {
        println!("{}", format!("Vehicle: {}", v).dimmed());
    }

    let client = FunctionEndpointClient::new(config.assistant.clone())?;
    let pipeline = ResponsePipeline::new(Box::new(client));

    let mut chat = match user_id {
        Some(user_id) => {
            start_account_chat(&config, user_id, resume, pipeline, vehicle).await?
        }
        None => start_guest_chat(&config, resume, pipeline, vehicle)?,
    };

    println!(
        "{}",
        "Ask about diagnostics, repairs, parts, or listings. /quit to exit.".dimmed()
    );

    let mut editor = DefaultEditor::new().context("failed to initialize line editor")?;
    loop {
        let line = match editor.readline(&"you> ".green().bold().to_string()) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                tracing::warn!("readline failed: {}", e);
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        match input {
            "/quit" | "/exit" => break,
            "/new" => {
                chat.reset();
                println!("{}", "Started a new conversation.".dimmed());
            }
            "/history" => {
                for message in chat.store.messages() {
                    println!("{}: {}", message.sender, message.text);
                }
            }
            other if other.starts_with("/vehicle") => {
                let raw = other.trim_start_matches("/vehicle").trim();
                chat.vehicle = resolve_vehicle(Some(raw.to_string()));
                match &chat.vehicle {
                    Some(v) => println!("{}", format!("Vehicle set: {}", v).dimmed()),
                    None => println!("{}", "Could not recognize that vehicle.".yellow()),
                }
            }
            other if other.starts_with('/') => {
                println!(
                    "{}",
                    "Commands: /history, /vehicle <y make model>, /new, /quit".dimmed()
                );
            }
            text => chat.handle_input(text).await,
        }
    }

    println!("{}", "Goodbye!".dimmed());
    Ok(())
}

fn resolve_vehicle(raw: Option<String>) -> Option<VehicleContext> {
    let raw = raw?;
    let parsed = extract_vehicle_info(&raw);
    if parsed.is_none() {
        tracing::warn!("could not parse vehicle from {:?}", raw);
    }
    parsed
}

fn start_guest_chat(
    config: &Config,
    resume: Option<String>,
    pipeline: ResponsePipeline,
    vehicle: Option<VehicleContext>,
) -> Result<ChatLoop> {
    let cache = GuestCache::new(&config.guest)?;
    let mut store = MessageStore::new();

    let chat_id = match cache.load()? {
        Some(record) => {
            println!(
                "{}",
                format!("Resuming guest conversation ({} messages).", record.messages.len())
                    .dimmed()
            );
            store.replace(record.messages);
            record.chat_id
        }
        None => ensure_chat_id(resume.as_deref()),
    };

    println!("{}", "Guest mode: history is kept on this device only.".yellow());

    Ok(ChatLoop {
        store,
        pipeline,
        vehicle,
        mode: Mode::Guest { cache, chat_id },
        events: None,
    })
}

async fn start_account_chat(
    config: &Config,
    user_id: Uuid,
    resume: Option<String>,
    pipeline: ResponsePipeline,
    vehicle: Option<VehicleContext>,
) -> Result<ChatLoop> {
    let backend = create_backend(&config.backend.backend_type, &config.backend)?;
    let mut session_id: Option<Uuid> = None;

    // A pending guest conversation migrates exactly once per sign-in; a
    // failed migration leaves the cache for the next attempt.
    let cache = GuestCache::new(&config.guest)?;
    if cache.has_guest_session() {
        match migrate_guest_session(&cache, backend.as_ref(), user_id).await {
            Ok(Some(report)) => {
                println!(
                    "{}",
                    format!("Moved {} guest messages into your account.", report.migrated)
                        .green()
                );
                session_id = Some(report.session_id);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("guest sync failed: {}", e);
                println!(
                    "{}",
                    "Could not sync your guest conversation; it will retry next time.".yellow()
                );
            }
        }
    }

    if let Some(raw) = resume {
        // Resume ids come from the user; malformed ones fail loudly here
        // rather than silently starting a different session.
        session_id = Some(validate_session_id(&raw)?);
    } else if session_id.is_none() {
        match backend.fetch_last_session(user_id).await {
            Ok(Some(last)) => {
                println!("{}", format!("Resuming \"{}\".", last.title).dimmed());
                session_id = Some(last.id);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("could not fetch last session: {}", e),
        }
    }

    let mut store = MessageStore::new();
    let mut events = None;
    if let Some(id) = session_id {
        store.switch_session(id);
        // Chat flow degrades to an empty history on fetch errors.
        match backend.fetch_messages(id).await {
            Ok(messages) => store.replace(messages),
            Err(e) => tracing::warn!("could not fetch messages: {}", e),
        }
        events = subscribe_quietly(backend.as_ref(), id).await;
    }

    Ok(ChatLoop {
        store,
        pipeline,
        vehicle,
        mode: Mode::Account {
            backend,
            user_id,
            session_id,
            persisted: session_id.is_some(),
        },
        events,
    })
}

async fn subscribe_quietly(backend: &dyn ChatBackend, session_id: Uuid) -> Option<MessageEvents> {
    match backend.subscribe(session_id).await {
        Ok(events) => Some(events),
        Err(e) => {
            tracing::debug!("realtime unavailable: {}", e);
            None
        }
    }
}

impl ChatLoop {
    /// One conversation turn: append, persist, complete, append, persist.
    async fn handle_input(&mut self, text: &str) {
        increment_counter!("gasket_messages_sent_total");

        let user_message = ChatMessage::user(text);
        self.store.append(user_message.clone());
        self.persist(&user_message).await;
        self.drain_events();

        let reply = self
            .pipeline
            .generate_reply(self.store.messages(), self.vehicle.as_ref())
            .await;

        print_reply(&reply.text, &reply.body);

        let ai_message = reply.into_message();
        self.store.append(ai_message.clone());
        self.persist(&ai_message).await;
        self.drain_events();
    }

    async fn persist(&mut self, message: &ChatMessage) {
        match &mut self.mode {
            Mode::Guest { cache, chat_id } => {
                let history = self.store.history();
                match cache.save(*chat_id, self.store.messages(), &history) {
                    Ok(SaveOutcome::Saved) => {}
                    Ok(SaveOutcome::Truncated) => println!(
                        "{}",
                        "Device storage is full; only your latest messages were kept.".yellow()
                    ),
                    Err(e) => {
                        tracing::warn!("guest save failed: {}", e);
                        println!("{}", "Could not save this conversation locally.".yellow());
                    }
                }
            }
            Mode::Account {
                backend,
                user_id,
                session_id,
                persisted,
            } => {
                if session_id.is_none() {
                    // First message of a fresh conversation creates the row;
                    // on failure we fall back to a locally minted id and the
                    // conversation simply stays unpersisted.
                    let title = session_title(text_for_title(&self.store, message));
                    match backend.create_session(&title, Some(*user_id)).await {
                        Ok(id) => {
                            *session_id = Some(id);
                            *persisted = true;
                            self.events = subscribe_quietly(backend.as_ref(), id).await;
                        }
                        Err(e) => {
                            tracing::warn!("could not create session: {}", e);
                            println!(
                                "{}",
                                "Could not reach the server; this conversation won't be saved."
                                    .yellow()
                            );
                            *session_id = Some(ensure_chat_id(None));
                            *persisted = false;
                        }
                    }
                }

                if !*persisted {
                    return;
                }
                let id = session_id.expect("session id set above");
                let stored = match message.sender {
                    crate::assistant::Sender::User => {
                        backend.store_user_message(message, id).await
                    }
                    crate::assistant::Sender::Ai => backend.store_ai_message(message, id).await,
                };
                if let Err(e) = stored {
                    // Terminal for this one write; the local copy survives.
                    tracing::warn!("could not persist message: {}", e);
                }
            }
        }
    }

    /// Start a fresh conversation; the next message creates a new session.
    fn reset(&mut self) {
        self.store.clear();
        self.events = None;
        match &mut self.mode {
            Mode::Guest { cache, chat_id } => {
                if let Err(e) = cache.clear() {
                    tracing::warn!("could not clear guest cache: {}", e);
                }
                *chat_id = new_session_id();
            }
            Mode::Account {
                session_id,
                persisted,
                ..
            } => {
                *session_id = None;
                *persisted = false;
            }
        }
    }

    /// Apply pending realtime inserts; duplicates collapse by id.
    fn drain_events(&mut self) {
        let Some(events) = &mut self.events else {
            return;
        };
        while let Ok(MessageEvent::Inserted(message)) = events.try_recv() {
            self.store.append(message);
        }
    }
}

fn text_for_title<'a>(store: &'a MessageStore, fallback: &'a ChatMessage) -> &'a str {
    store.first_user_text().unwrap_or(&fallback.text)
}

fn print_reply(text: &str, body: &MessageBody) {
    println!("{} {}", "assistant>".cyan().bold(), text);

    if let MessageBody::ComponentDiagram(diagram) = body {
        println!("{}", format!("[diagram: {}]", diagram.component).dimmed());
        for part in &diagram.highlighted_parts {
            println!("{}", format!("  - {}", part).dimmed());
        }
    }

    for (title, url) in extract_video_links(text) {
        println!("{}", format!("[video] {}: {}", title, url).dimmed());
    }
}
