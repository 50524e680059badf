//! Application state for the Holocron browser.
//!
//! `App` ties the session manager to the catalogue: it runs the login
//! prompt that gates browsing, keeps the current page and filters, and
//! drives the interactive loop while the session refreshes in the
//! background.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info, warn};

use holocron_core::auth::{open_token_store, SessionConfig, SessionManager};
use holocron_core::config::Config;
use holocron_core::models::{
    unique_homeworlds, unique_species, Character, CharacterFilter, Planet,
};
use holocron_core::utils::{short_resource_name, truncate};
use holocron_core::ApiClient;

use crate::commands::{Command, HELP};

// ============================================================================
// Constants
// ============================================================================

/// Login prompts offered by the auth gate before giving up
const MAX_LOGIN_ATTEMPTS: usize = 3;

/// Width of the name column in the page listing
const NAME_COLUMN_WIDTH: usize = 28;

/// Whether the browser loop keeps going after a command
enum Flow {
    Continue,
    Exit,
}

pub struct App {
    pub config: Config,
    pub session: Arc<SessionManager>,
    api: ApiClient,
    /// The one reader over stdin, shared by the login prompt and the browser
    input: Lines<BufReader<Stdin>>,

    // Browse state
    page: u32,
    total_pages: u32,
    characters: Vec<Character>,
    filter: CharacterFilter,
    /// Resolved homeworlds keyed by planet URL
    planets: HashMap<String, Planet>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let cache_dir = Config::cache_dir();
        debug!(?cache_dir, backend = ?config.token_backend, "Opening token store");
        let store = open_token_store(config.token_backend, cache_dir);

        let session = Arc::new(SessionManager::demo(store, SessionConfig::default()));
        session.initialize();

        let api = ApiClient::new(config.api_base_url())?;

        Ok(Self {
            config,
            session,
            api,
            input: BufReader::new(tokio::io::stdin()).lines(),
            page: 1,
            total_pages: 1,
            characters: Vec::new(),
            filter: CharacterFilter::default(),
            planets: HashMap::new(),
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Prompt for credentials and sign in. Returns whether it worked.
    pub async fn login_interactive(&mut self, username: Option<String>) -> Result<bool> {
        println!("\n=== Holocron Login ===\n");

        let username = match username {
            Some(username) => username,
            None => self.prompt_username().await?,
        };
        let password = rpassword::prompt_password("Password: ")?;

        println!("\nAuthenticating...");

        if !self.session.login(&username, &password).await {
            if let Some(message) = self.session.error() {
                println!("{}\n", message);
            }
            return Ok(false);
        }

        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Login successful!\n");
        Ok(true)
    }

    async fn prompt_username(&mut self) -> Result<String> {
        match self.config.last_username {
            Some(ref last_user) => print!("Username [{}]: ", last_user),
            None => print!("Username: "),
        }
        io::stdout().flush()?;

        read_username(&mut self.input, self.config.last_username.as_deref()).await
    }

    /// Only let an authenticated user through, prompting if needed
    pub async fn auth_gate(&mut self) -> Result<bool> {
        for _ in 0..MAX_LOGIN_ATTEMPTS {
            if self.is_authenticated() || self.login_interactive(None).await? {
                return Ok(true);
            }
        }
        Ok(self.is_authenticated())
    }

    pub fn logout(&self) {
        self.session.logout();
        println!("Signed out.");
    }

    pub fn print_status(&self) {
        let snapshot = self.session.snapshot();
        match self.session.minutes_until_expiry() {
            Some(minutes) => println!(
                "Session: {} ({} min until token expiry, refreshed automatically)",
                snapshot.phase.label(),
                minutes
            ),
            None => println!("Session: {}", snapshot.phase.label()),
        }
        if let Some(error) = snapshot.error {
            println!("Last error: {}", error);
        }
    }

    // =========================================================================
    // Browser Loop
    // =========================================================================

    /// Interactive browsing until the user quits or the session ends.
    pub async fn run_browser(&mut self) -> Result<()> {
        self.load_page(1).await;
        self.render_page();
        println!("Type 'help' for commands.");

        let mut session_rx = self.session.subscribe();
        prompt()?;

        loop {
            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() || !session_rx.borrow_and_update().is_authenticated {
                        info!("Session ended while browsing");
                        println!("\nYou have been logged out.");
                        return Ok(());
                    }
                }
                line = self.input.next_line() => {
                    let Some(line) = line? else {
                        // stdin closed
                        return Ok(());
                    };
                    match Command::parse(&line) {
                        Ok(command) => {
                            if let Flow::Exit = self.execute(command).await {
                                return Ok(());
                            }
                        }
                        Err(message) => println!("{}", message),
                    }
                    prompt()?;
                }
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Next => self.goto_page(self.page.saturating_add(1)).await,
            Command::Prev => self.goto_page(self.page.saturating_sub(1)).await,
            Command::Page(page) => self.goto_page(page).await,
            Command::Search(term) => {
                self.filter.search = term;
                self.render_page();
            }
            Command::Species(None) => self.list_species(),
            Command::Species(Some(n)) => match unique_species(&self.characters).get(n - 1) {
                Some(species) => {
                    self.filter.species = Some(species.clone());
                    self.render_page();
                }
                None => println!("No species option {}.", n),
            },
            Command::Homeworld(None) => self.list_homeworlds(),
            Command::Homeworld(Some(n)) => match unique_homeworlds(&self.characters).get(n - 1) {
                Some(homeworld) => {
                    self.filter.homeworld = Some(homeworld.clone());
                    self.render_page();
                }
                None => println!("No homeworld option {}.", n),
            },
            Command::Clear => {
                self.filter.clear();
                self.render_page();
            }
            Command::Show(n) => {
                let selected = self.filter.apply(&self.characters).get(n - 1).map(|c| (*c).clone());
                match selected {
                    Some(character) => self.show_character(&character).await,
                    None => println!("No character {} on screen.", n),
                }
            }
            Command::List => self.render_page(),
            Command::Status => self.print_status(),
            Command::Help => println!("{}", HELP),
            Command::Logout => {
                self.logout();
                return Flow::Exit;
            }
            Command::Quit => return Flow::Exit,
        }
        Flow::Continue
    }

    // =========================================================================
    // Data Loading
    // =========================================================================

    async fn goto_page(&mut self, page: u32) {
        if self.filter.is_active() {
            println!("Clear filters to change pages.");
        } else if page < 1 || page > self.total_pages {
            println!("No page {} (1-{}).", page, self.total_pages);
        } else {
            self.load_page(page).await;
            self.render_page();
        }
    }

    async fn load_page(&mut self, page: u32) {
        println!("Loading...");
        match self.api.fetch_characters(page).await {
            Ok(result) => {
                self.page = page;
                self.total_pages = result.total_pages();
                self.characters = result.results;
                self.resolve_homeworlds().await;
            }
            Err(e) => {
                warn!(page, error = %e, "Failed to fetch characters");
                println!("Failed to load characters. Please try again.");
            }
        }
    }

    /// Look up planet names for the filter list, skipping ones already known
    async fn resolve_homeworlds(&mut self) {
        let missing: Vec<String> = unique_homeworlds(&self.characters)
            .into_iter()
            .filter(|url| !self.planets.contains_key(url))
            .collect();
        if missing.is_empty() {
            return;
        }

        for (url, planet) in self.api.fetch_planets(&missing).await {
            if let Some(planet) = planet {
                self.planets.insert(url, planet);
            }
        }
    }

    async fn homeworld(&mut self, url: &str) -> Option<Planet> {
        if let Some(planet) = self.planets.get(url) {
            return Some(planet.clone());
        }
        match self.api.fetch_homeworld(url).await {
            Ok(planet) => {
                self.planets.insert(url.to_string(), planet.clone());
                Some(planet)
            }
            Err(e) => {
                warn!(url, error = %e, "Error fetching homeworld");
                None
            }
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    fn homeworld_label(&self, url: &str) -> String {
        if url.is_empty() {
            return "Unknown".to_string();
        }
        self.planets
            .get(url)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("planet {}", short_resource_name(url)))
    }

    fn render_page(&self) {
        let visible = self.filter.apply(&self.characters);
        println!();

        if visible.is_empty() {
            println!("No characters found matching your filters.");
        } else {
            println!("Showing {} character(s)", visible.len());
            for (i, character) in visible.iter().enumerate() {
                println!(
                    "{:>3}. {:<width$} {:<10} {}",
                    i + 1,
                    truncate(&character.name, NAME_COLUMN_WIDTH),
                    character.birth_year,
                    self.homeworld_label(&character.homeworld),
                    width = NAME_COLUMN_WIDTH,
                );
            }
        }

        if self.filter.is_active() {
            println!("\nFilters: {}", self.describe_filter());
        } else {
            println!("\nPage {} of {}", self.page, self.total_pages);
        }
    }

    fn describe_filter(&self) -> String {
        let mut parts = Vec::new();
        if !self.filter.search.is_empty() {
            parts.push(format!("name contains \"{}\"", self.filter.search));
        }
        if let Some(ref species) = self.filter.species {
            parts.push(format!("species {}", short_resource_name(species)));
        }
        if let Some(ref homeworld) = self.filter.homeworld {
            parts.push(format!("homeworld {}", self.homeworld_label(homeworld)));
        }
        parts.join(", ")
    }

    fn list_species(&self) {
        let species = unique_species(&self.characters);
        if species.is_empty() {
            println!("No species listed on this page.");
        }
        for (i, url) in species.iter().enumerate() {
            println!("{:>3}. species {}", i + 1, short_resource_name(url));
        }
    }

    fn list_homeworlds(&self) {
        let homeworlds = unique_homeworlds(&self.characters);
        if homeworlds.is_empty() {
            println!("No homeworlds listed on this page.");
        }
        for (i, url) in homeworlds.iter().enumerate() {
            println!("{:>3}. {}", i + 1, self.homeworld_label(url));
        }
    }

    async fn show_character(&mut self, character: &Character) {
        println!("\n=== {} ===", character.name);
        println!("Height:     {}", character.height_display());
        println!("Mass:       {}", character.mass_display());
        println!("Hair:       {}", character.hair_color);
        println!("Skin:       {}", character.skin_color);
        println!("Eyes:       {}", character.eye_color);
        println!("Birth year: {}", character.birth_year);
        println!("Gender:     {}", character.gender);
        println!("Films:      {}", character.films_display());
        println!("Date added: {}", character.created_display());

        if !character.has_homeworld() {
            return;
        }
        println!("\nLoading homeworld data...");
        match self.homeworld(&character.homeworld).await {
            Some(planet) => {
                println!("Homeworld:  {}", planet.name);
                println!("  Terrain:    {}", planet.terrain_display());
                println!("  Climate:    {}", planet.climate_display());
                println!("  Population: {}", planet.population_display());
                println!("  Diameter:   {}", planet.diameter_display());
            }
            None => println!("Homeworld data unavailable."),
        }
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

/// Read one username line. A blank line picks `last`.
async fn read_username<R>(input: &mut Lines<R>, last: Option<&str>) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let line = input.next_line().await?.unwrap_or_default();
    let line = line.trim();
    if line.is_empty() {
        Ok(last.unwrap_or_default().to_string())
    } else {
        Ok(line.to_string())
    }
}
