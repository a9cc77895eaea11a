use std::fmt::Write as _;

use archwright_core::{DiagramSnapshot, Graph, Position, Size};
use archwright_sync::{
    AdvanceOutcome, Conversation, DiagramUpdate, MergeOptions, ProgressReport, StepSession,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const PROJECT_HELP: &str = "\
Commands:
  /show                     print the canvas
  /move <node> <x> <y>      move a node
  /resize <node> <w> <h>    resize a node
  /layout <request>         ask the assistant to rearrange (may move nodes)
  /quit                     leave";

const LESSON_HELP: &str = "\
Commands:
  /show                     print both lesson canvases
  /quit                     leave";

/// Compact text rendering of a canvas.
pub fn describe_graph(graph: &Graph) -> String {
    let mut out = String::with_capacity(512);
    out.push_str("NODES:\n");
    for node in &graph.nodes {
        let _ = write!(
            out,
            "  {} \"{}\" at ({:.0},{:.0}) {:.0}x{:.0}",
            node.id, node.label, node.position.x, node.position.y, node.size.width, node.size.height
        );
        if let Some(desc) = &node.description {
            let short: String = desc.chars().take(80).collect();
            let _ = write!(out, " | {short}");
            if desc.chars().count() > 80 {
                out.push_str("...");
            }
        }
        out.push('\n');
    }
    out.push_str("EDGES:\n");
    for edge in &graph.edges {
        let _ = writeln!(
            out,
            "  {}:{} -> {}:{} {}",
            edge.source_id,
            edge.source_anchor.as_str(),
            edge.target_id,
            edge.target_anchor.as_str(),
            edge.label.as_deref().unwrap_or("")
        );
    }
    out
}

fn print_outcome(outcome: &AdvanceOutcome) {
    println!("\n{}\n", outcome.display_text);
    for update in &outcome.updates {
        match &update.outcome {
            DiagramUpdate::Unchanged => {}
            DiagramUpdate::Updated { diagnostics } => {
                println!("[{:?} canvas updated]", update.slot);
                for d in diagnostics {
                    println!("  note: {d}");
                }
            }
            DiagramUpdate::Rejected { reason } => {
                println!("[{:?} canvas NOT updated: {reason}]", update.slot);
            }
        }
    }
    if outcome.malformed {
        println!("[the reply carried an unreadable canvas update]");
    }
    if outcome.step_completed {
        println!("[step completed]");
    }
    if !outcome.suggestions.is_empty() {
        println!("Try:");
        for s in &outcome.suggestions {
            println!("  - {s}");
        }
    }
}

fn parse_numbers(args: &[&str]) -> Option<(String, f64, f64)> {
    match args {
        [id, a, b] => Some((id.to_string(), a.parse().ok()?, b.parse().ok()?)),
        _ => None,
    }
}

pub async fn project_chat(conversation: &Conversation<DiagramSnapshot>) -> anyhow::Result<()> {
    let state = conversation.current().await;
    for turn in &state.turns {
        println!("{:?}: {}", turn.role, turn.text);
    }
    if !state.suggestions.is_empty() {
        println!("Try: {}", state.suggestions.join(" | "));
    }
    println!("{PROJECT_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let result = match words[0] {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("{PROJECT_HELP}");
                continue;
            }
            "/show" => {
                print!("{}", describe_graph(&conversation.current().await.graph));
                continue;
            }
            "/move" | "/resize" => {
                let Some((id, a, b)) = parse_numbers(&words[1..]) else {
                    println!("usage: {} <node> <a> <b>", words[0]);
                    continue;
                };
                let (position, size) = if words[0] == "/move" {
                    (Some(Position::new(a, b)), None)
                } else {
                    (None, Some(Size::new(a, b)))
                };
                conversation
                    .set_geometry(&id, position, size)
                    .await
                    .map(|_| println!("[{id} updated]"))
            }
            "/layout" => conversation
                .advance_with(
                    line.trim_start_matches("/layout").trim(),
                    MergeOptions::geometry_authorized(),
                )
                .await
                .map(|o| print_outcome(&o)),
            _ => conversation.advance(line).await.map(|o| print_outcome(&o)),
        };
        if let Err(e) = result {
            println!("error: {e}");
        }
    }
    Ok(())
}

pub async fn lesson_chat(session: &StepSession<'_>) -> anyhow::Result<()> {
    let step = session.current().await;
    println!("Step {} \"{}\" ({})", step.step_id, step.title, step.status.as_str());
    for turn in &step.turns {
        println!("{:?}: {}", turn.role, turn.text);
    }
    println!("{LESSON_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{LESSON_HELP}"),
            "/show" => {
                let step = session.current().await;
                println!("Lesson canvas:\n{}", describe_graph(&step.lesson_graph));
                println!("Clarification canvas:\n{}", describe_graph(&step.clarification_graph));
            }
            _ => match session.advance(line).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => println!("error: {e}"),
            },
        }
    }
    Ok(())
}

pub fn print_progress(report: &ProgressReport) {
    println!(
        "Progress {} for {} ({:?})",
        report.progress.id, report.progress.user_id, report.progress.status
    );
    for step in &report.steps {
        println!(
            "  {:<6} {:<10} {}  [{}]",
            step.step_id,
            step.status.as_str(),
            step.title,
            step.step_progress_id
        );
    }
}
