//! Subcommand handlers.

use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use backend::{AuthorizedClient, SupabaseClient};
use llm::GeminiProvider;
use render::render_pdf;
use storybook::{
    BookId, Credentials, Email, ObjectStore, PageCount, Profile, Session, SignUpOutcome,
    StoryParameters, StoryWizard, StorybookError,
};
use studio::{
    AccountService, AdminDirectory, BookExporter, BookGenerator, BrandUpdate, GenerationProgress,
    Library, ProfileService,
};
use tracing::{info, warn};

use crate::{config::AppConfig, session::SessionStore, ExportArgs, NewBookArgs, ProfileSetArgs};

/// A refreshed session and a data client acting on its behalf.
struct SignedIn {
    session: Session,
    client: Arc<AuthorizedClient>,
}

pub struct App {
    config: AppConfig,
    anon: Arc<SupabaseClient>,
    accounts: AccountService,
    sessions: SessionStore,
}

fn email(value: &str) -> anyhow::Result<Email> {
    Email::new(value).ok_or_else(|| {
        StorybookError::InvalidParameters {
            field: "email",
            reason: format!("{value:?} is not an e-mail address"),
        }
        .into()
    })
}

/// The password from the flag or environment, else one line from stdin.
fn password(provided: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_progress(event: GenerationProgress) {
    match event {
        GenerationProgress::StoryWritten { title, pages } => {
            eprintln!("Wrote \"{title}\" ({pages} pages)");
        }
        GenerationProgress::PageStarted { number, total } => {
            eprintln!("Illustrating page {number}/{total}...");
        }
        GenerationProgress::AssetFailed(failure) => {
            eprintln!(
                "  page {}: no {} ({})",
                failure.page, failure.asset, failure.error
            );
        }
        GenerationProgress::PageSaved { number } => eprintln!("  page {number} saved"),
        GenerationProgress::Finished { book } => eprintln!("Finished {}", book.id),
    }
}

/// File name for an exported book, from its title.
fn default_pdf_name(title: &str) -> PathBuf {
    let stem: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    let stem = if stem.is_empty() { "storybook".into() } else { stem };
    PathBuf::from(format!("{stem}.pdf"))
}

impl App {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let anon = Arc::new(SupabaseClient::new(config.backend.clone())?);
        Ok(Self {
            accounts: AccountService::new(anon.clone()),
            anon,
            config,
            sessions: SessionStore::default_location()?,
        })
    }

    /// The stored session, refreshed when expired. A refreshed session is
    /// written back so the next invocation reuses it.
    async fn signed_in(&self) -> anyhow::Result<SignedIn> {
        let stored = self
            .sessions
            .load()?
            .ok_or(StorybookError::NotSignedIn)
            .context("run `storybook login` first")?;
        let previous_token = stored.access_token.clone();

        let session = match self.accounts.ensure_fresh(stored).await {
            Ok(session) => session,
            Err(StorybookError::NotSignedIn) => {
                self.sessions.clear()?;
                return Err(StorybookError::NotSignedIn)
                    .context("session expired, run `storybook login` again");
            }
            Err(e) => return Err(e.into()),
        };
        if session.access_token != previous_token {
            self.sessions.save(&session)?;
        }

        let client = Arc::new(self.anon.authorized(&session));
        Ok(SignedIn { session, client })
    }

    fn content(&self) -> anyhow::Result<Arc<GeminiProvider>> {
        let config = self.config.require_generation()?.clone();
        Ok(Arc::new(GeminiProvider::new(config)?))
    }

    fn profiles(signed_in: &SignedIn) -> ProfileService {
        ProfileService::new(signed_in.client.clone(), signed_in.client.clone())
    }

    fn library(signed_in: &SignedIn) -> Library {
        Library::new(
            signed_in.session.user.id,
            signed_in.client.clone(),
            signed_in.client.clone(),
        )
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    pub async fn signup(&self, address: &str, provided: Option<String>) -> anyhow::Result<()> {
        let credentials = Credentials::new(email(address)?, password(provided)?)?;
        match self.accounts.sign_up(&credentials).await? {
            SignUpOutcome::SignedIn(session) => {
                self.sessions.save(&session)?;
                let signed_in = self.with_session(session);
                if let Err(error) = Self::profiles(&signed_in)
                    .load_or_create(&signed_in.session.user)
                    .await
                {
                    warn!(%error, "profile will be created on next sign-in");
                }
                println!("Account created; you are signed in as {address}.");
            }
            SignUpOutcome::ConfirmationRequired { .. } => {
                println!("Check {address} for a confirmation link, then run `storybook login`.");
            }
        }
        Ok(())
    }

    pub async fn login(&self, address: &str, provided: Option<String>) -> anyhow::Result<()> {
        let credentials = Credentials::new(email(address)?, password(provided)?)?;
        let session = self.accounts.sign_in(&credentials).await?;
        self.sessions.save(&session)?;
        let signed_in = self.with_session(session);
        let profile = Self::profiles(&signed_in)
            .load_or_create(&signed_in.session.user)
            .await?;
        info!(user = %profile.user_id, "signed in");
        println!("Signed in as {}.", profile.label());
        Ok(())
    }

    pub async fn logout(&self) -> anyhow::Result<()> {
        if let Some(session) = self.sessions.load()? {
            // The local session is forgotten even if the backend is unreachable.
            if let Err(error) = self.accounts.sign_out(&session).await {
                warn!(%error, "could not revoke session on the server");
            }
        }
        self.sessions.clear()?;
        println!("Signed out.");
        Ok(())
    }

    pub async fn whoami(&self) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        let user = self.accounts.current_user(&signed_in.session).await?;
        let profile = Self::profiles(&signed_in).load_or_create(&user).await?;
        println!("{} ({})", profile.label(), profile.role.as_str());
        println!("user id:  {}", user.id);
        if let Some(email) = &user.email {
            println!("e-mail:   {email}");
        }
        println!("expires:  {}", signed_in.session.expires_at);
        Ok(())
    }

    pub async fn reset_password(&self, address: &str) -> anyhow::Result<()> {
        self.accounts.request_password_reset(&email(address)?).await?;
        println!("If {address} has an account, a reset link is on its way.");
        Ok(())
    }

    fn with_session(&self, session: Session) -> SignedIn {
        let client = Arc::new(self.anon.authorized(&session));
        SignedIn { session, client }
    }

    // -----------------------------------------------------------------------
    // Books
    // -----------------------------------------------------------------------

    pub async fn new_book(&self, args: NewBookArgs) -> anyhow::Result<()> {
        let page_count =
            PageCount::new(args.pages).ok_or_else(|| StorybookError::InvalidParameters {
                field: "page_count",
                reason: format!(
                    "must be between {} and {}",
                    PageCount::MIN_PAGES,
                    PageCount::MAX_PAGES
                ),
            })?;

        // Flags arrive all at once; walking the wizard applies the same
        // per-step validation as an interactive session.
        let params = StoryWizard::from_parameters(StoryParameters {
            theme: args.theme,
            character: args.character,
            age_group: args.age,
            moral: args.moral,
            language: args.language,
            page_count,
            narration: !args.no_narration,
            art_style: args.art_style,
        })?
        .finish()?;

        let content = self.content()?;
        let signed_in = self.signed_in().await?;
        let generator =
            BookGenerator::new(content, signed_in.client.clone(), signed_in.client.clone());
        let report = generator
            .generate(signed_in.session.user.id, &params, &print_progress)
            .await?;

        println!("{}  {}", report.book.id, report.book.title);
        if !report.asset_failures.is_empty() {
            println!(
                "{} asset(s) could not be generated; use `storybook redraw` or `storybook renarrate` to retry.",
                report.asset_failures.len()
            );
        }
        Ok(())
    }

    pub async fn list(&self) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        let mut library = Self::library(&signed_in);
        let books = library.refresh().await?;
        if books.is_empty() {
            println!("No books yet. Create one with `storybook new`.");
        }
        for book in books {
            println!(
                "{}  {:<10} {:>2}p  {}",
                book.id,
                book.status.as_str(),
                book.parameters.page_count,
                book.title
            );
        }
        Ok(())
    }

    pub async fn show(&self, id: BookId) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        let mut library = Self::library(&signed_in);
        let book = library.book(id).await?.clone();
        println!("{}", book.title);
        println!(
            "{} | {} | {} | {}",
            book.status, book.parameters.age_group, book.parameters.language, book.created_at
        );
        println!("Moral: {}", book.parameters.moral);

        for page in library.pages(id).await? {
            println!();
            println!("--- page {} ---", page.number);
            println!("{}", page.text);
            if let Some(image) = &page.image {
                println!("image: {}", signed_in.client.public_url(image));
            }
            if let Some(audio) = &page.audio {
                println!("audio: {}", signed_in.client.public_url(audio));
            }
        }
        Ok(())
    }

    pub async fn rename(&self, id: BookId, title: &str) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        let book = Self::library(&signed_in).rename(id, title).await?.clone();
        println!("Renamed {} to \"{}\".", book.id, book.title);
        Ok(())
    }

    pub async fn delete(&self, id: BookId) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        Self::library(&signed_in).delete(id).await?;
        println!("Deleted {id}.");
        Ok(())
    }

    pub async fn edit_page(&self, id: BookId, number: u32, text: &str) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        Self::library(&signed_in)
            .edit_page_text(id, number, text)
            .await?;
        println!("Updated page {number}.");
        Ok(())
    }

    pub async fn redraw(&self, id: BookId, number: u32) -> anyhow::Result<()> {
        let content = self.content()?;
        let signed_in = self.signed_in().await?;
        let mut library = Self::library(&signed_in);
        let page = library
            .regenerate_illustration(content.as_ref(), id, number)
            .await?;
        if let Some(image) = &page.image {
            println!("New illustration: {}", signed_in.client.public_url(image));
        }
        Ok(())
    }

    pub async fn renarrate(&self, id: BookId, number: u32) -> anyhow::Result<()> {
        let content = self.content()?;
        let signed_in = self.signed_in().await?;
        let mut library = Self::library(&signed_in);
        let page = library
            .regenerate_narration(content.as_ref(), id, number)
            .await?;
        if let Some(audio) = &page.audio {
            println!("New narration: {}", signed_in.client.public_url(audio));
        }
        Ok(())
    }

    pub async fn export(&self, args: ExportArgs) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        let profile = Self::profiles(&signed_in)
            .load_or_create(&signed_in.session.user)
            .await?;
        let options = self
            .config
            .export
            .render_options(args.sheet, profile.brand.clone())?;

        let exporter = BookExporter::new(signed_in.client.clone(), signed_in.client.clone());
        let export = exporter.assemble(args.book, &profile.brand).await?;
        let out = args
            .out
            .unwrap_or_else(|| default_pdf_name(&export.book.title));

        let pdf = tokio::task::spawn_blocking(move || render_pdf(&export, &options))
            .await
            .context("PDF rendering task panicked")??;
        write_file(&out, &pdf)?;
        println!("Wrote {} ({} KiB)", out.display(), pdf.len().div_ceil(1024));

        if let Some(dir) = args.audio_dir {
            std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            let audio = exporter.narration(args.book).await?;
            for clip in &audio {
                write_file(&dir.join(format!("page-{:02}.wav", clip.number)), &clip.wav)?;
            }
            println!("Wrote {} narration file(s) to {}", audio.len(), dir.display());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Profile and admin
    // -----------------------------------------------------------------------

    pub async fn profile_show(&self) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        let profiles = Self::profiles(&signed_in);
        let profile = profiles.load_or_create(&signed_in.session.user).await?;
        print_profile(&profile, profiles.logo_url(&profile));
        Ok(())
    }

    pub async fn profile_set(&self, args: ProfileSetArgs) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        let profiles = Self::profiles(&signed_in);
        let user = &signed_in.session.user;
        let mut profile = profiles.load_or_create(user).await?;

        if let Some(name) = args.display_name {
            profile = profiles.update_display_name(user, Some(name)).await?;
        }
        let primary_color = match (args.brand_color, args.clear_color) {
            (Some(color), _) => Some(Some(color)),
            (None, true) => Some(None),
            (None, false) => None,
        };
        if args.brand_name.is_some() || primary_color.is_some() {
            let update = BrandUpdate {
                brand_name: args.brand_name.map(Some),
                primary_color,
            };
            profile = profiles.update_brand(user, update).await?;
        }
        if let Some(path) = args.logo {
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            profile = profiles.upload_logo(user, bytes).await?;
        }

        print_profile(&profile, profiles.logo_url(&profile));
        Ok(())
    }

    pub async fn admin_users(&self) -> anyhow::Result<()> {
        let signed_in = self.signed_in().await?;
        let directory = AdminDirectory::new(signed_in.client.clone());
        let users = directory.list_users(&signed_in.session.user).await?;
        for profile in &users {
            println!(
                "{}  {:<6}  {:<30}  {}",
                profile.user_id,
                profile.role.as_str(),
                profile
                    .email
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                profile.created_at
            );
        }
        println!("{} user(s)", users.len());
        Ok(())
    }
}

fn print_profile(profile: &Profile, logo_url: Option<String>) {
    println!("{}", profile.label());
    println!("role:        {}", profile.role.as_str());
    if let Some(name) = &profile.display_name {
        println!("name:        {name}");
    }
    if let Some(brand) = &profile.brand.brand_name {
        println!("brand:       {brand}");
    }
    if let Some(color) = profile.brand.primary_color {
        println!("brand color: {color}");
    }
    if let Some(url) = logo_url {
        println!("logo:        {url}");
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if path.is_dir() {
        bail!("{} is a directory", path.display());
    }
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}
