use std::path::PathBuf;
use std::sync::Arc;

use viewlog_api::{ApiError, CatalogClient};
use viewlog_core::config::AppConfig;
use viewlog_core::events::shared_event_log;
use viewlog_core::identity::Session;
use viewlog_core::models::{Episode, EpisodeFilter};
use viewlog_core::store::SqliteRecordStore;
use viewlog_core::{
    CatalogError, CharacterList, EpisodeCatalog, FetchError, ViewedStateStore, ViewlogError,
};

use crate::cli::{Cli, Command};
use crate::format;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ViewlogError),
    #[error("could not reach the catalog: {0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("could not load characters: {0}")]
    Characters(FetchError),
    #[error("could not encode output: {0}")]
    Json(#[from] serde_json::Error),
}

type Catalog = EpisodeCatalog<Arc<CatalogClient>, Session, SqliteRecordStore>;

/// Everything one command invocation needs.
struct App {
    config: AppConfig,
    config_path: PathBuf,
    client: Arc<CatalogClient>,
    catalog: Catalog,
    json: bool,
}

impl App {
    fn new(config: AppConfig, config_path: PathBuf, json: bool) -> Result<Self, CliError> {
        let client = Arc::new(CatalogClient::new(
            &config.api.base_url,
            config.request_timeout(),
        )?);
        let records = SqliteRecordStore::open(&config.ensure_db_path()?)?;
        let session = Session::new(config.user_id().map(str::to_owned));

        let store = ViewedStateStore::new(session, records, shared_event_log())
            .with_write_failure(config.sync.write_failure)
            .with_retry(config.retry.policy());
        let catalog = EpisodeCatalog::new(Arc::clone(&client), store);

        Ok(Self {
            config,
            config_path,
            client,
            catalog,
            json,
        })
    }

    /// Load the catalog and wait until viewed flags are reconciled.
    async fn load_synced(&self) -> Result<(), CliError> {
        self.catalog.load().await?;
        self.catalog.settle().await;
        Ok(())
    }

    fn find(&self, id: u32) -> Result<Episode, CliError> {
        self.catalog
            .get(id)
            .ok_or(CliError::Catalog(CatalogError::NotFoundLocal(id)))
    }

    async fn list(&self, filter: EpisodeFilter) -> Result<(), CliError> {
        self.load_synced().await?;
        let episodes = self.catalog.filtered(filter);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&episodes)?);
            return Ok(());
        }
        if episodes.is_empty() {
            println!("No {filter} episodes.");
        }
        for episode in &episodes {
            println!("{}", format::episode_line(episode));
        }
        Ok(())
    }

    async fn show(&self, id: u32) -> Result<(), CliError> {
        self.load_synced().await?;
        let episode = self.find(id)?;

        let characters = CharacterList::new(
            Arc::clone(&self.client),
            self.config.retry.policy(),
            self.catalog.events().clone(),
        );
        let loaded = characters
            .load(&episode.character_refs)
            .await
            .map_err(CliError::Characters)?;

        if self.json {
            let value = serde_json::json!({ "episode": episode, "characters": loaded });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
        println!("{}", format::episode_detail(&episode));
        println!("Characters ({}):", loaded.len());
        for character in &loaded {
            println!("{}", format::character_line(character));
        }
        Ok(())
    }

    async fn set_viewed(&self, id: u32, viewed: bool) -> Result<(), CliError> {
        self.load_synced().await?;
        if !self.catalog.store().identity().is_signed_in() {
            tracing::warn!("Not signed in; the change will not be saved");
        }
        self.catalog.set_viewed(id, viewed)?;
        self.catalog.settle().await;

        let episode = self.find(id)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&episode)?);
        } else {
            println!("{}", format::episode_line(&episode));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<(), CliError> {
        self.load_synced().await?;
        let stats = self.catalog.stats();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("{stats}");
        }
        Ok(())
    }

    fn login(&mut self, user_id: String) -> Result<(), CliError> {
        let user_id = self.catalog.store().identity().sign_in(&user_id)?;
        self.config.account.user_id = Some(user_id.clone());
        self.config.save_to(&self.config_path)?;
        println!("Signed in as {user_id}");
        Ok(())
    }

    fn logout(&mut self) -> Result<(), CliError> {
        self.catalog.store().identity().sign_out();
        self.config.account.user_id = None;
        self.config.save_to(&self.config_path)?;
        println!("Signed out");
        Ok(())
    }

    fn whoami(&self) {
        match self.config.user_id() {
            Some(user) => println!("{user}"),
            None => println!("Not signed in"),
        }
    }

    /// Print and dismiss any failure notices raised by background work.
    fn flush_notices(&self) {
        let Ok(mut log) = self.catalog.events().lock() else {
            return;
        };
        for entry in log.notices() {
            eprintln!("notice: {}", format::notice_line(&entry));
        }
        log.dismiss_notices();
    }
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let config = AppConfig::load_from(&config_path)?;
    let mut app = App::new(config, config_path, cli.json)?;

    let result = match cli.command {
        Command::Episodes { filter } => app.list(filter).await,
        Command::Show { id } => app.show(id).await,
        Command::Mark { id } => app.set_viewed(id, true).await,
        Command::Unmark { id } => app.set_viewed(id, false).await,
        Command::Stats => app.stats().await,
        Command::Login { user_id } => app.login(user_id),
        Command::Logout => app.logout(),
        Command::Whoami => {
            app.whoami();
            Ok(())
        }
    };

    app.flush_notices();
    result
}
