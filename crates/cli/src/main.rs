//! Storybook command-line entry point.
//!
//! This binary is the composition root for the workspace:
//!
//! 1. **Parse configuration**: load `config.toml`, apply `STORYBOOK_*`
//!    environment overrides, and validate before any command runs.
//! 2. **Wire observability**: `tracing-subscriber` with human or JSON output on
//!    stderr, plus an OpenTelemetry OTLP exporter when an endpoint is set.
//! 3. **Construct infrastructure**: `SupabaseClient` for auth and data,
//!    `GeminiProvider` for content, injected into the `studio` workflows.
//! 4. **Dispatch** the subcommand.

mod commands;
mod config;
mod observability;
mod session;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use storybook::{AgeGroup, BookId, HexColor, Language};

use crate::{commands::App, config::AppConfig};

#[derive(Parser, Debug)]
#[command(name = "storybook", author, version, about = "Generate illustrated, narrated children's storybooks")]
struct Cli {
    /// Configuration file (default: <config dir>/storybook/config.toml).
    #[arg(long, global = true, env = "STORYBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    Signup(CredentialArgs),
    /// Sign in and remember the session.
    Login(CredentialArgs),
    /// Sign out and forget the session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Send a password reset e-mail.
    ResetPassword { email: String },
    /// Write, illustrate, and narrate a new book.
    New(NewBookArgs),
    /// List your books.
    List,
    /// Show a book's pages.
    Show { book: BookId },
    /// Rename a book.
    Rename { book: BookId, title: String },
    /// Delete a book and its illustrations and narration.
    Delete { book: BookId },
    /// Replace the text of one page.
    EditPage {
        book: BookId,
        page: u32,
        text: String,
    },
    /// Draw a new illustration for one page.
    Redraw { book: BookId, page: u32 },
    /// Record new narration for one page.
    Renarrate { book: BookId, page: u32 },
    /// Render a book as PDF.
    Export(ExportArgs),
    /// Show or change your profile and brand settings.
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Administration.
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Args, Debug)]
struct CredentialArgs {
    email: String,
    /// Read from stdin when omitted.
    #[arg(long, env = "STORYBOOK_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct NewBookArgs {
    /// What the story is about.
    #[arg(long)]
    theme: String,
    /// The main character.
    #[arg(long)]
    character: String,
    /// Reader age group: 2-4, 5-7, 8-10, or 11-12.
    #[arg(long, value_parser = parse_age, default_value = "5-7")]
    age: AgeGroup,
    /// The lesson the story conveys.
    #[arg(long)]
    moral: String,
    /// Language name or code.
    #[arg(long, value_parser = parse_language, default_value = "en")]
    language: Language,
    /// Number of pages.
    #[arg(long, default_value_t = 5)]
    pages: u32,
    /// Skip narration audio.
    #[arg(long)]
    no_narration: bool,
    /// Illustration style, e.g. "paper cut-out".
    #[arg(long)]
    art_style: Option<String>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    book: BookId,
    /// Output file (default: <title>.pdf in the current directory).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Also save each page's narration as page-NN.wav in this directory.
    #[arg(long)]
    audio_dir: Option<PathBuf>,
    /// Sheet size: a4 or letter (default from configuration).
    #[arg(long, value_parser = parse_sheet)]
    sheet: Option<render::SheetSize>,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
    Set(ProfileSetArgs),
}

#[derive(Args, Debug)]
struct ProfileSetArgs {
    /// Empty clears it.
    #[arg(long)]
    display_name: Option<String>,
    /// Shown on the title sheet and in footers. Empty clears it.
    #[arg(long)]
    brand_name: Option<String>,
    /// Heading colour as #rrggbb.
    #[arg(long, value_parser = parse_color, conflicts_with = "clear_color")]
    brand_color: Option<HexColor>,
    #[arg(long)]
    clear_color: bool,
    /// PNG or JPEG logo to upload.
    #[arg(long)]
    logo: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// List every registered user.
    Users,
}

fn parse_age(value: &str) -> Result<AgeGroup, String> {
    AgeGroup::parse(value).ok_or_else(|| "expected one of 2-4, 5-7, 8-10, 11-12".into())
}

fn parse_language(value: &str) -> Result<Language, String> {
    Language::parse(value).ok_or_else(|| {
        let known: Vec<&str> = Language::ALL.iter().map(|l| l.code()).collect();
        format!("unsupported language; expected one of {}", known.join(", "))
    })
}

fn parse_sheet(value: &str) -> Result<render::SheetSize, String> {
    render::SheetSize::parse(value).ok_or_else(|| "expected a4 or letter".into())
}

fn parse_color(value: &str) -> Result<HexColor, String> {
    HexColor::parse(value).ok_or_else(|| "expected a colour like #3366cc".into())
}

async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Signup(args) => app.signup(&args.email, args.password).await,
        Command::Login(args) => app.login(&args.email, args.password).await,
        Command::Logout => app.logout().await,
        Command::Whoami => app.whoami().await,
        Command::ResetPassword { email } => app.reset_password(&email).await,
        Command::New(args) => app.new_book(args).await,
        Command::List => app.list().await,
        Command::Show { book } => app.show(book).await,
        Command::Rename { book, title } => app.rename(book, &title).await,
        Command::Delete { book } => app.delete(book).await,
        Command::EditPage { book, page, text } => app.edit_page(book, page, &text).await,
        Command::Redraw { book, page } => app.redraw(book, page).await,
        Command::Renarrate { book, page } => app.renarrate(book, page).await,
        Command::Export(args) => app.export(args).await,
        Command::Profile(ProfileCommand::Show) => app.profile_show().await,
        Command::Profile(ProfileCommand::Set(args)) => app.profile_set(args).await,
        Command::Admin(AdminCommand::Users) => app.admin_users().await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration problems are reported before logging is set up, so they
    // go straight to stderr through anyhow.
    let (config, source) = AppConfig::load(cli.config.as_deref())?;
    let telemetry = observability::init(cli.log_json, &config.telemetry)?;
    source.log();

    let result = match App::new(config) {
        Ok(app) => run(&app, cli.command).await,
        Err(e) => Err(e),
    };
    if let Err(error) = &result {
        tracing::error!(error = %format!("{error:#}"), "command failed");
    }

    telemetry.shutdown();
    result
}
