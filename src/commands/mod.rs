/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`  — Interactive conversation loop
- `ask`   — Submit one prompt and print the reconciled transcript
- `new`   — Create a conversation for a document
- `show`  — Print a conversation transcript

Each handler builds a backend from configuration and drives a
[`SessionController`] the same way an interactive front end would.
*/

use crate::backend::{create_backend, Backend};
use crate::config::Config;
use crate::error::{DocChatError, Result};
use crate::navigation::{Route, RouteNavigator};
use crate::session::SessionController;
use std::sync::Arc;

pub mod render;
pub mod special_commands;

/// Builds a controller for `route` over the configured backend
pub fn build_session(config: &Config, route: Route) -> Result<(SessionController, RouteNavigator)> {
    let backend = create_backend(&config.backend)?;
    Ok(session_with_backend(backend, config, route))
}

/// Builds a controller for `route` over an explicit backend
pub fn session_with_backend(
    backend: Arc<dyn Backend>,
    config: &Config,
    route: Route,
) -> (SessionController, RouteNavigator) {
    let navigator = RouteNavigator::starting_at(route.clone());
    let controller = SessionController::new(
        backend,
        Arc::new(navigator.clone()),
        route,
        config.dispatch.clone(),
    );
    (controller, navigator)
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Loads the routed conversation, then reads prompts with rustyline.
    //! Each prompt runs one dispatch round; the answers that arrive with the
    //! reconciling reload are printed below the prompt.

    use super::*;
    use crate::commands::render;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::session::Key;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `route` - Conversation to open
    pub async fn run_chat(config: Config, route: Route) -> Result<()> {
        let (mut controller, navigator) = build_session(&config, route)?;

        match controller.load().await {
            Ok(conversation) => render::print_transcript(&conversation),
            Err(e) => {
                tracing::warn!("Initial load failed: {}", e);
                eprintln!("{}", format!("Could not load conversation: {}", e).red());
            }
        }

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(&controller);

        loop {
            let prompt = format!("{} ", format!("[{}]>", controller.route().conversation_id).cyan());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;

                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    };

                    match command {
                        SpecialCommand::New => match controller.create().await {
                            Ok(id) => println!("{}", format!("Created conversation {}\n", id).green()),
                            Err(e) => eprintln!("{}", format!("Create failed: {}", e).red()),
                        },
                        SpecialCommand::Switch(id) => match controller.switch_to(&id).await {
                            Ok(conversation) => render::print_transcript(&conversation),
                            Err(e) => eprintln!("{}", format!("Switch failed: {}", e).red()),
                        },
                        SpecialCommand::List => {
                            render::print_conversation_list(
                                &controller.conversations(),
                                &controller.route().conversation_id,
                            );
                        }
                        SpecialCommand::Reload => match controller.load().await {
                            Ok(conversation) => render::print_transcript(&conversation),
                            Err(e) => eprintln!("{}", format!("Reload failed: {}", e).red()),
                        },
                        SpecialCommand::ShowStatus => {
                            render::print_status(controller.statuses());
                            println!(
                                "  {:<12} {}",
                                "location",
                                navigator
                                    .current()
                                    .map(|r| r.to_string())
                                    .unwrap_or_else(|| "-".to_string())
                            );
                            println!(
                                "  {:<12} {}\n",
                                "strategy",
                                controller.dispatch_config().strategy
                            );
                        }
                        SpecialCommand::Help => print_help(),
                        SpecialCommand::Exit => break,
                        SpecialCommand::None => {
                            controller.handle_input_change(trimmed);
                            submit(&mut controller).await;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::error!("Readline error: {}", e);
                    return Err(e.into());
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Runs one round and prints whatever the reload brought in
    async fn submit(controller: &mut SessionController) {
        let before = controller.store().message_count();
        println!("{}", "Asking...".dimmed());

        let result = controller.handle_key(Key::Enter).await;

        if let Some(conversation) = controller.conversation() {
            let start = before.min(conversation.messages.len());
            render::print_messages(&conversation.messages[start..]);
        }

        match result {
            Ok(Some(report)) => render::print_report_summary(&report),
            Ok(None) => {}
            Err(e) => match e.downcast_ref::<DocChatError>() {
                Some(DocChatError::SubmissionInProgress) => {
                    eprintln!("{}", "A submission is already running".yellow())
                }
                Some(DocChatError::DispatchFailed { report, .. }) => {
                    render::print_report_summary(report);
                    eprintln!("{}", format!("Submission failed: {}", e).red());
                }
                _ => eprintln!("{}", format!("Submission failed: {}", e).red()),
            },
        }
    }

    fn print_welcome_banner(controller: &SessionController) {
        let filename = controller
            .document()
            .map(|d| d.filename.as_str())
            .unwrap_or("unknown document");
        println!(
            "\n{} {}",
            "DocChat".bold(),
            format!("- {} ({})", filename, controller.route()).dimmed()
        );
        println!("Type a question, or {} for commands.\n", "/help".cyan());
    }
}

// One-shot prompt handler
pub mod ask {
    //! Submits a single prompt and prints the result.

    use super::*;
    use crate::commands::render;

    /// Load the routed conversation, run one round, and print the outcome
    ///
    /// With `json`, the dispatch report is printed instead of the transcript.
    /// A partially failed round still prints the reconciled transcript and
    /// its report before returning the error.
    pub async fn run_ask(config: Config, route: Route, prompt: String, json: bool) -> Result<()> {
        let (controller, _navigator) = build_session(&config, route)?;
        run_ask_with(controller, prompt, json).await
    }

    pub(crate) async fn run_ask_with(
        mut controller: SessionController,
        prompt: String,
        json: bool,
    ) -> Result<()> {
        if let Err(e) = controller.load().await {
            tracing::warn!("Initial load failed, submitting against the route: {}", e);
        }

        let result = controller.submit_prompt(prompt).await;

        if !json {
            if let Some(conversation) = controller.conversation() {
                render::print_transcript(&conversation);
            }
        }

        if let Some(report) = render::round_report(&result) {
            if json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                render::print_report_summary(report);
            }
        }
        result.map(|_| ())
    }
}

// Conversation creation handler
pub mod new {
    //! Creates a conversation and prints its route.

    use super::*;
    use crate::session::{ConversationCreator, ConversationLoader, ConversationStore, StatusFlag};

    /// Create a conversation for `document_id`
    pub async fn run_new(config: Config, document_id: String) -> Result<()> {
        let backend = create_backend(&config.backend)?;
        let route = create_conversation(backend, &document_id).await?;
        println!("{}", route);
        Ok(())
    }

    /// Creates, loads and navigates to a new conversation; returns its route
    pub async fn create_conversation(backend: Arc<dyn Backend>, document_id: &str) -> Result<Route> {
        let navigator = RouteNavigator::new();
        let loader = ConversationLoader::new(
            Arc::clone(&backend),
            ConversationStore::new(),
            StatusFlag::new("load"),
        );
        let creator = ConversationCreator::new(
            backend,
            loader,
            Arc::new(navigator.clone()),
            StatusFlag::new("list"),
        );
        creator.create(document_id).await?;
        navigator
            .current()
            .ok_or_else(|| DocChatError::Navigation("no route after create".to_string()).into())
    }
}

// Transcript display handler
pub mod show {
    //! Prints a conversation.

    use super::*;
    use crate::commands::render;

    /// Load the routed conversation and print it
    pub async fn run_show(config: Config, route: Route, json: bool) -> Result<()> {
        let (mut controller, _navigator) = build_session(&config, route)?;
        let conversation = controller.load().await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&conversation)?);
        } else {
            render::print_transcript(&conversation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::commands::render;
    use crate::session::Document;
    use crate::test_utils::{conversation, dispatch_config};

    fn config(questions: &[&str]) -> Config {
        Config {
            dispatch: dispatch_config(questions),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_create_conversation_returns_new_route() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_document(Document::new("doc1", "doc1.pdf"));

        let route = new::create_conversation(backend.clone(), "doc1").await.unwrap();

        assert_eq!(route.document_id, "doc1");
        assert!(backend.conversation("doc1", &route.conversation_id).is_some());
    }

    #[tokio::test]
    async fn test_ask_runs_one_round() {
        let backend = Arc::new(FakeBackend::new());
        backend.insert(conversation("doc1", "c1", &[]));
        let (controller, _nav) = session_with_backend(
            backend.clone(),
            &config(&["q1", "q2"]),
            Route::new("doc1", "c1").unwrap(),
        );

        ask::run_ask_with(controller, "hello".to_string(), true)
            .await
            .unwrap();

        assert_eq!(backend.prompt_count(), 2);
    }

    #[tokio::test]
    async fn test_ask_surfaces_partial_failure() {
        let backend = Arc::new(FakeBackend::new());
        backend.insert(conversation("doc1", "c1", &[]));
        backend.fail_prompt_always("q2");
        let (controller, _nav) = session_with_backend(
            backend.clone(),
            &config(&["q1", "q2"]),
            Route::new("doc1", "c1").unwrap(),
        );

        let err = ask::run_ask_with(controller, "hello".to_string(), false)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DocChatError>(),
            Some(DocChatError::DispatchFailed { failed: 1, total: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_ask_json_partial_failure_keeps_the_report() {
        let backend = Arc::new(FakeBackend::new());
        backend.insert(conversation("doc1", "c1", &[]));
        backend.fail_prompt_always("q1");
        let (controller, _nav) = session_with_backend(
            backend.clone(),
            &config(&["q1", "q2"]),
            Route::new("doc1", "c1").unwrap(),
        );

        let err = ask::run_ask_with(controller, "hello".to_string(), true)
            .await
            .unwrap_err();

        let Some(DocChatError::DispatchFailed { report, .. }) = err.downcast_ref::<DocChatError>()
        else {
            panic!("expected DispatchFailed, got {err}");
        };
        assert_eq!(report.successful, 1);
        assert_eq!(render::failure_lines(report).len(), 1);
        assert!(render::failure_lines(report)[0].starts_with("q1 ("));
        assert!(serde_json::to_value(report.as_ref()).unwrap()["outcomes"][0]["error"].is_string());
    }
}
