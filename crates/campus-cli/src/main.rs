//! campus: command-line front end for the admin console data layer.
//!
//! Reads configuration from `CAMPUS_*` variables (and `.env`), keeps the
//! session in `CAMPUS_STATE_FILE`, and prints normalized records.

mod logging;

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use campus_client::{load_catalog, plan_route, AdminService, ClientConfig, SessionState, SourceResolver};
use campus_core::{IdentityContext, NormalizationIssue, Role, SearchFilter, Searchable};

#[derive(Parser)]
#[command(name = "campus")]
#[command(author, version, about = "Campus admin console data layer")]
#[command(propagate_version = true)]
struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bearer token utilities
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },

    /// Inspect the hosting environment
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },

    /// Store a bearer token for later commands
    Login {
        /// Token as issued by the backend
        #[arg(short, long)]
        token: String,

        /// Institution to scope requests to when the token carries none
        #[arg(short, long)]
        institution: Option<String>,
    },

    /// Remove stored credentials
    Logout,

    /// Demo mode (fallback data only)
    Demo {
        #[arg(value_enum)]
        action: DemoAction,
    },

    /// List records of one kind
    List {
        #[arg(value_enum)]
        kind: ListKind,

        /// Role filter (required for users)
        #[arg(short, long)]
        role: Option<String>,

        /// Case-insensitive search text
        #[arg(short, long)]
        search: Option<String>,

        /// Only active (true) or inactive (false) records
        #[arg(long)]
        active: Option<bool>,
    },

    /// Show subject and term links to curricula
    Relations,
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Decode a token's claims (not verified)
    Decode {
        /// Token; the stored one when omitted
        token: Option<String>,
    },
}

#[derive(Subcommand)]
enum EnvCommand {
    /// Show the route plan and initial data source
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum DemoAction {
    Enable,
    Disable,
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Institutions,
    Users,
    Roles,
    Curricula,
    Subjects,
    Terms,
    Goals,
    Milestones,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = match e.downcast_ref::<campus_core::Error>() {
                Some(err) => err.user_message(),
                None => format!("{:#}", e),
            };
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::from_env();
    config.validate()?;
    let session = SessionState::open(config.state_file.as_deref())
        .context("failed to open session state")?;
    let json = cli.json;

    match cli.command {
        Commands::Token {
            command: TokenCommand::Decode { token },
        } => {
            let token = token.or_else(|| session.token());
            let identity = IdentityContext::from_token(token.as_deref());
            print_identity(&identity, json)?;
        }
        Commands::Env {
            command: EnvCommand::Check,
        } => cmd_env_check(&config, &session, json)?,
        Commands::Login { token, institution } => {
            session.set_token(&token)?;
            if let Some(id) = institution {
                session.set_institution_id(&id.into())?;
            }
            print_identity(&session.identity(), json)?;
        }
        Commands::Logout => {
            session.clear_auth()?;
            println!("Signed out");
        }
        Commands::Demo { action } => {
            let resolver = SourceResolver::new(&config, session.clone());
            match action {
                DemoAction::Enable => resolver.enable_demo()?,
                DemoAction::Disable => resolver.clear_demo()?,
                DemoAction::Status => {}
            }
            println!("Source mode: {}", resolver.mode());
        }
        Commands::List {
            kind,
            role,
            search,
            active,
        } => {
            let service = AdminService::new(&config, session)?;
            let filter = SearchFilter {
                query: search.unwrap_or_default(),
                active,
                ..Default::default()
            };
            cmd_list(&service, kind, role.as_deref(), &filter, json).await?;
        }
        Commands::Relations => {
            let service = AdminService::new(&config, session)?;
            cmd_relations(&service, json).await?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_identity(identity: &IdentityContext, json: bool) -> Result<()> {
    if json {
        return print_json(identity);
    }
    let show = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    println!("Institution: {}", show(identity.institution_id.as_ref().map(|id| id.to_string())));
    println!("User:        {}", show(identity.user_id.as_ref().map(|id| id.to_string())));
    println!("Name:        {}", show(identity.display_name.clone()));
    println!("Email:       {}", show(identity.email.clone()));
    println!("Role:        {}", show(identity.role.as_ref().map(|r| r.to_string())));
    println!("Expires:     {}", show(identity.expires_at.map(|t| t.to_rfc3339())));
    Ok(())
}

fn cmd_env_check(config: &ClientConfig, session: &SessionState, json: bool) -> Result<()> {
    let plan = plan_route(config)?;
    let resolver = SourceResolver::new(config, session.clone());

    if json {
        return print_json(&serde_json::json!({
            "buildMode": config.build_mode.to_string(),
            "route": plan,
            "sourceMode": resolver.mode(),
        }));
    }

    println!("Build mode:  {}", config.build_mode);
    println!("Base URL:    {}", plan.base);
    println!("Strategy:    {:?}", plan.strategy);
    println!("Cloud host:  {}", if plan.cloud_preview { "yes" } else { "no" });
    println!("Source mode: {}", resolver.mode());
    if let Some(mixed) = &plan.mixed_content {
        println!();
        println!("Mixed content: {} would be blocked on {}.", mixed.blocked_url, mixed.page_origin);
        println!("Requests use the same-origin proxy {} instead.", mixed.recommended_url);
    }
    Ok(())
}

fn print_issues(issues: &[NormalizationIssue]) {
    if !issues.is_empty() {
        eprintln!("{} record issue(s); fallback values were substituted", issues.len());
    }
}

fn print_rows<T: Searchable + Serialize>(
    items: &[T],
    issues: &[NormalizationIssue],
    filter: &SearchFilter,
    json: bool,
    row: impl Fn(&T) -> String,
) -> Result<()> {
    let hits = filter.apply(items);
    if json {
        return print_json(&hits);
    }
    for item in &hits {
        println!("{}", row(item));
    }
    print_issues(issues);
    Ok(())
}

fn active_mark(active: bool) -> &'static str {
    if active {
        ""
    } else {
        " (inactive)"
    }
}

async fn cmd_list(
    service: &AdminService,
    kind: ListKind,
    role: Option<&str>,
    filter: &SearchFilter,
    json: bool,
) -> Result<()> {
    match kind {
        ListKind::Institutions => {
            let batch = service.list_institutions().await?;
            print_rows(&batch.items, &batch.issues, filter, json, |i| {
                format!("{}\t{}{}", i.id, i.name, active_mark(i.is_active))
            })
        }
        ListKind::Users => {
            let Some(role) = role else {
                bail!("listing users needs --role (admin, teacher or student)");
            };
            let batch = service.list_users_by_role(&Role::parse(role)).await?;
            print_rows(&batch.items, &batch.issues, filter, json, |u| {
                format!(
                    "{}\t{}\t{}{}",
                    u.id,
                    u.name,
                    u.email.as_deref().unwrap_or("-"),
                    active_mark(u.is_active)
                )
            })
        }
        ListKind::Roles => {
            let batch = service.list_roles().await?;
            if json {
                return print_json(&batch.items);
            }
            for role in &batch.items {
                println!("{}", role);
            }
            print_issues(&batch.issues);
            Ok(())
        }
        ListKind::Curricula => {
            let batch = service.list_curricula().await?;
            print_rows(&batch.items, &batch.issues, filter, json, |c| {
                format!(
                    "{}\t{}\t{}{}",
                    c.id,
                    c.code.as_deref().unwrap_or("-"),
                    c.name,
                    active_mark(c.is_active)
                )
            })
        }
        ListKind::Subjects => {
            let batch = service.list_subjects().await?;
            print_rows(&batch.items, &batch.issues, filter, json, |s| {
                format!("{}\t{}{}", s.id, s.name, active_mark(s.is_active))
            })
        }
        ListKind::Terms => {
            let batch = service.list_terms().await?;
            print_rows(&batch.items, &batch.issues, filter, json, |t| {
                format!(
                    "{}\t{}\t{}",
                    t.id,
                    t.tag().unwrap_or("-"),
                    t.display_name()
                )
            })
        }
        ListKind::Goals | ListKind::Milestones => {
            let batch = if matches!(kind, ListKind::Goals) {
                service.list_goals().await?
            } else {
                service.list_milestones().await?
            };
            print_rows(&batch.items, &batch.issues, filter, json, |g| {
                format!(
                    "{}\t{}{}",
                    g.id,
                    g.description,
                    active_mark(g.is_active)
                )
            })
        }
    }
}

async fn cmd_relations(service: &AdminService, json: bool) -> Result<()> {
    let snapshot = load_catalog(service).await?;
    let index = &snapshot.index;

    if json {
        let terms: Vec<_> = index
            .terms()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "termId": t.id,
                    "curriculumId": index.curriculum_for_term(t.id.as_str()).map(|c| &c.id),
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "subjects": index.effective_relations(),
            "terms": terms,
            "issues": snapshot.issues,
        }));
    }

    println!("Subjects");
    for subject in index.subjects() {
        let curricula: Vec<&str> = index
            .relations_for(subject.id.as_str())
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        let linked = if curricula.is_empty() {
            "-".to_string()
        } else {
            curricula.join(", ")
        };
        println!("  {}\t{}", subject.name, linked);
    }

    println!("Terms");
    for term in index.terms() {
        let curriculum = index
            .curriculum_for_term(term.id.as_str())
            .map(|c| c.name.as_str())
            .unwrap_or("(all curricula)");
        println!("  {}\t{}", term.display_name(), curriculum);
    }

    print_issues(&snapshot.issues);
    Ok(())
}
