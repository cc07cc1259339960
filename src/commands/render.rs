//! Terminal rendering for transcripts, conversation lists and reports

use crate::error::{DocChatError, Result};
use crate::session::{
    Conversation, ConversationSummary, DispatchReport, Message, Status, StatusTracker,
};
use colored::Colorize;
use prettytable::{format, Table};

/// Display label for a message author
pub fn speaker(message: &Message) -> &'static str {
    match message.kind.as_str() {
        "ai" => "Assistant",
        "human" | crate::session::types::TEXT_MESSAGE_TYPE => "You",
        _ => "System",
    }
}

/// Print messages, one block per message
pub fn print_messages(messages: &[Message]) {
    for message in messages {
        let label = match speaker(message) {
            "Assistant" => "Assistant".green().bold(),
            "You" => "You".cyan().bold(),
            other => other.dimmed(),
        };
        println!("{}: {}\n", label, message.content());
    }
}

/// Print a full transcript with a header line
pub fn print_transcript(conversation: &Conversation) {
    println!(
        "{} {} ({} messages)\n",
        conversation.document.filename.bold(),
        format!("/doc/{}/{}", conversation.document.id, conversation.id).dimmed(),
        conversation.messages.len()
    );
    if conversation.messages.is_empty() {
        println!("{}", "No messages yet.".yellow());
        return;
    }
    print_messages(&conversation.messages);
}

/// Print the document's conversations, marking the active one
pub fn print_conversation_list(conversations: &[ConversationSummary], active: &str) {
    if conversations.is_empty() {
        println!("{}", "No conversations found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row!["".bold(), "ID".bold(), "Created".bold()]);

    for summary in conversations {
        let marker = if summary.id == active { "*" } else { "" };
        let created = summary.created.as_deref().unwrap_or("-");
        table.add_row(prettytable::row![marker.green(), summary.id.cyan(), created]);
    }

    println!("\nConversations:");
    table.printstd();
    println!("Use {} to open one.\n", "/switch <ID>".cyan());
}

/// Print status flags, with the last recorded error for each
pub fn print_status(statuses: &StatusTracker) {
    println!("\n{}", "Session Status".bold());
    for flag in [&statuses.load, &statuses.list, &statuses.submission] {
        let snapshot = flag.snapshot();
        let status = match snapshot.status {
            Status::Idle => "idle".green(),
            Status::Loading => "loading".yellow(),
        };
        print!("  {:<12} {}", flag.name(), status);
        if let Some(error) = snapshot.last_error {
            print!("  {}", format!("last error: {}", error).red());
        }
        println!();
    }
    println!();
}

/// Report of a settled round, including one that ended in `DispatchFailed`
pub fn round_report(result: &Result<DispatchReport>) -> Option<&DispatchReport> {
    match result {
        Ok(report) => Some(report),
        Err(e) => match e.downcast_ref::<DocChatError>() {
            Some(DocChatError::DispatchFailed { report, .. }) => Some(report.as_ref()),
            _ => None,
        },
    }
}

/// One line per failed question: the question and its last error
pub fn failure_lines(report: &DispatchReport) -> Vec<String> {
    report
        .outcomes
        .iter()
        .filter(|o| !o.success)
        .map(|o| {
            format!(
                "{} ({})",
                o.question,
                o.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect()
}

/// Print a one-line summary of a dispatch round plus failed questions
pub fn print_report_summary(report: &DispatchReport) {
    let line = format!(
        "{} of {} questions answered in {} ms",
        report.successful,
        report.outcomes.len(),
        report.total_duration_ms
    );
    if report.failed == 0 {
        println!("{}", line.dimmed());
    } else {
        println!("{}", line.yellow());
    }
    for line in failure_lines(report) {
        println!("  {} {}", "failed:".red(), line);
    }
}
