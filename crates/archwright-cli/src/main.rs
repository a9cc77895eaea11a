mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use archwright_core::settings::settings_path;
use archwright_core::{ai_configured, data_dir, read_settings, write_settings, FsBlobStore, Settings};
use archwright_sync::{
    load_history, CollaboratorError, Collaborators, Conversation, CourseService,
    DirectoryRetriever, LlmModelClient, ModelClient, ModelRequest,
};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "archwright", version, about = "Design architectures and learn them, in conversation")]
struct Cli {
    /// Where projects, courses and settings live (default ~/.archwright)
    #[arg(long, env = "ARCHWRIGHT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Model provider for this run (openai, anthropic, google, ollama, groq, mistral, deepseek)
    #[arg(long, global = true)]
    provider: Option<String>,

    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the assistant about a project canvas
    Chat {
        project: String,
        /// Start a new project from a template ("blog") or a sandbox task ("task-crm", ...)
        #[arg(long)]
        template: Option<String>,
    },
    /// List the saved revisions of a project
    History { project: String },
    #[command(subcommand)]
    Course(CourseCommand),
    /// Show or change model settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommand>,
    },
}

#[derive(Subcommand)]
enum CourseCommand {
    /// Create a course in drafting state
    New {
        topic: String,
        /// Knowledge base id (a directory under the knowledge base root)
        #[arg(long)]
        kb: String,
    },
    /// Draft the study plan from the knowledge base
    Plan { course: String },
    /// Approve the plan and start a learner's progress
    Approve {
        course: String,
        #[arg(long)]
        user: String,
    },
    /// Show step statuses of a course progress
    Show { course_progress: String },
    /// Study one step in an interactive lesson chat
    Step { step_progress: String },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        max_output_tokens: Option<u32>,
        #[arg(long)]
        knowledge_base_dir: Option<PathBuf>,
    },
}

const STORE_DIR: &str = "store";

/// Stands in for the model when no provider is configured, so commands
/// that never call it still work.
struct Unconfigured(CollaboratorError);

#[async_trait]
impl ModelClient for Unconfigured {
    async fn reply(&self, _request: &ModelRequest) -> Result<String, CollaboratorError> {
        Err(self.0.clone())
    }
}

fn load_settings(cli: &Cli, root: &std::path::Path) -> Settings {
    let mut settings = read_settings(&settings_path(root)).with_env_overrides();
    if let Some(p) = &cli.provider {
        settings.provider = p.clone();
    }
    if let Some(m) = &cli.model {
        settings.model = m.clone();
    }
    settings
}

fn collaborators(settings: &Settings, root: &std::path::Path) -> Collaborators {
    let model: Arc<dyn ModelClient> = match LlmModelClient::new(settings.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            debug!(error = %e, "model not available");
            Arc::new(Unconfigured(e))
        }
    };
    let kb_root = settings
        .knowledge_base_dir
        .clone()
        .unwrap_or_else(|| root.join("knowledge"));
    Collaborators {
        model,
        store: Arc::new(FsBlobStore::new(root.join(STORE_DIR))),
        retriever: Arc::new(DirectoryRetriever::new(kb_root)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "archwright=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let root = cli.data_dir.clone().unwrap_or_else(data_dir);
    let settings = load_settings(&cli, &root);

    match cli.command {
        Command::Settings { command } => settings_command(&root, command.as_ref())?,
        Command::Chat { project, template } => {
            if !ai_configured(&settings) {
                bail!("no model configured; run `archwright settings set --provider ... --model ...`");
            }
            let conversation =
                Conversation::open_project(&project, template.as_deref(), collaborators(&settings, &root))
                    .await
                    .with_context(|| format!("opening project '{project}'"))?;
            repl::project_chat(&conversation).await?;
        }
        Command::History { project } => {
            let store = FsBlobStore::new(root.join(STORE_DIR));
            let history = load_history(&store, &project)
                .await
                .with_context(|| format!("reading history of '{project}'"))?;
            if history.is_empty() {
                println!("No saved revisions for '{project}'.");
            }
            for snapshot in history {
                println!(
                    "rev {:>4}  {}  {} nodes, {} edges, {} turns",
                    snapshot.revision,
                    snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
                    snapshot.graph.nodes.len(),
                    snapshot.graph.edges.len(),
                    snapshot.turns.len()
                );
            }
        }
        Command::Course(command) => {
            course_command(CourseService::new(collaborators(&settings, &root)), command).await?
        }
    }
    Ok(())
}

async fn course_command(service: CourseService, command: CourseCommand) -> anyhow::Result<()> {
    match command {
        CourseCommand::New { topic, kb } => {
            let course = service.create_course(&topic, &kb).await?;
            println!("Created course {} ({})", course.id, course.topic);
            println!("Next: archwright course plan {}", course.id);
        }
        CourseCommand::Plan { course } => {
            let course = service
                .draft_plan(&course)
                .await
                .with_context(|| format!("drafting plan for '{course}'"))?;
            println!("Plan for \"{}\":", course.topic);
            for step in &course.plan {
                println!("  {:<6} {}", step.id, step.title);
            }
            println!("Next: archwright course approve {} --user <id>", course.id);
        }
        CourseCommand::Approve { course, user } => {
            let progress = service
                .approve(&course, &user)
                .await
                .with_context(|| format!("approving '{course}'"))?;
            info!(progress = %progress.id, "approved");
            println!("Course progress {}", progress.id);
            repl::print_progress(&service.progress(&progress.id).await?);
        }
        CourseCommand::Show { course_progress } => {
            repl::print_progress(&service.progress(&course_progress).await?);
        }
        CourseCommand::Step { step_progress } => {
            let session = service
                .open_step(&step_progress)
                .await
                .with_context(|| format!("opening step '{step_progress}'"))?;
            repl::lesson_chat(&session).await?;
        }
    }
    Ok(())
}

fn settings_command(root: &std::path::Path, command: Option<&SettingsCommand>) -> anyhow::Result<()> {
    let path = settings_path(root);
    let mut settings = read_settings(&path);
    match command {
        None | Some(SettingsCommand::Show) => {}
        Some(SettingsCommand::Set {
            provider,
            model,
            api_key,
            max_output_tokens,
            knowledge_base_dir,
        }) => {
            if let Some(v) = provider {
                settings.provider = v.clone();
            }
            if let Some(v) = model {
                settings.model = v.clone();
            }
            if let Some(v) = api_key {
                settings.api_key = v.clone();
            }
            if let Some(v) = max_output_tokens {
                settings.max_output_tokens = *v;
            }
            if let Some(v) = knowledge_base_dir {
                settings.knowledge_base_dir = Some(v.clone());
            }
            write_settings(&path, &settings)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Saved {}", path.display());
        }
    }

    println!("provider:          {}", or_unset(&settings.provider));
    println!("model:             {}", or_unset(&settings.model));
    println!(
        "api key:           {}",
        if settings.api_key.is_empty() { "(unset)" } else { "(set)" }
    );
    println!("max output tokens: {}", settings.max_output_tokens);
    match &settings.knowledge_base_dir {
        Some(dir) => println!("knowledge bases:   {}", dir.display()),
        None => println!("knowledge bases:   {}", root.join("knowledge").display()),
    }
    if !ai_configured(&settings) {
        println!("\nThe assistant is not configured yet.");
    }
    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}
