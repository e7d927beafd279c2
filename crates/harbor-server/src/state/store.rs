//! Application state: the shared mask, the planner, the session actor, and
//! the in-memory stores backing the API.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use harbor_core::{
    spawn_session_actor, ExclusionZone, FileMaskStore, InMemoryMarinas, Marina, MaskSnapshot,
    OccupancyMask, RoadRouter, RouteCoordinator, SessionHandle, SharedMask,
};

use crate::config::Config;
use crate::persistence::{self, Database};
use crate::state::{RestrictedAreaStore, WeatherStore};

pub type Coordinator = RouteCoordinator<Arc<dyn RoadRouter>>;

pub struct AppState {
    mask: SharedMask,
    mask_files: FileMaskStore,
    coordinator: Arc<Coordinator>,
    sessions: SessionHandle,
    weather: Arc<WeatherStore>,
    restricted: Arc<RestrictedAreaStore>,
    marinas: Arc<InMemoryMarinas>,
    db: Database,
    config: Config,
}

impl AppState {
    /// Wire the stores together and start the session actor.
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: Config,
        db: Database,
        mask: OccupancyMask,
        marinas: Vec<Marina>,
        road: Arc<dyn RoadRouter>,
    ) -> Self {
        let mask = SharedMask::new(mask);
        let weather = Arc::new(WeatherStore::new(
            config.weather_cell_deg,
            config.weather_ttl(),
            config.weather_max_entries,
        ));
        let restricted = Arc::new(RestrictedAreaStore::new());
        let marinas = Arc::new(InMemoryMarinas::new(marinas));

        let coordinator = Arc::new(
            RouteCoordinator::new(
                mask.clone(),
                road,
                marinas.clone(),
                config.coordinator.clone(),
            )
            .with_weather(weather.clone())
            .with_restricted_areas(restricted.clone()),
        );
        let (sessions, _task) = spawn_session_actor(coordinator.clone(), config.rules.clone());

        Self {
            mask,
            mask_files: FileMaskStore::in_dir(&config.mask_dir),
            coordinator,
            sessions,
            weather,
            restricted,
            marinas,
            db,
            config,
        }
    }

    /// Build state from persisted data: the saved mask (or the bundled
    /// files), the marina list, and restricted areas.
    pub async fn bootstrap(config: Config, db: Database, road: Arc<dyn RoadRouter>) -> Result<Self> {
        let mask = match persistence::masks::load_mask(db.pool()).await {
            Ok(Some(mask)) => {
                info!("Loaded edited mask from database");
                mask
            }
            Ok(None) => load_mask_files(&config).await?,
            Err(err) => {
                warn!("Saved mask is unusable ({:#}); falling back to files", err);
                load_mask_files(&config).await?
            }
        };
        let marinas = load_marinas(Path::new(&config.marinas_path))?;
        info!("Loaded {} marinas", marinas.len());

        let state = Self::new(config, db, mask, marinas, road);
        state.load_restricted_areas().await?;
        Ok(state)
    }

    async fn load_restricted_areas(&self) -> Result<()> {
        let zones = persistence::restricted_areas::load_all_restricted_areas(self.db.pool()).await?;
        info!("Loaded {} restricted areas", zones.len());
        for zone in zones {
            self.restricted.insert(zone);
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mask(&self) -> &SharedMask {
        &self.mask
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn sessions(&self) -> &SessionHandle {
        &self.sessions
    }

    pub fn weather(&self) -> &Arc<WeatherStore> {
        &self.weather
    }

    pub fn restricted_areas(&self) -> &Arc<RestrictedAreaStore> {
        &self.restricted
    }

    pub fn marinas(&self) -> &InMemoryMarinas {
        &self.marinas
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Persist the current mask as the saved snapshot.
    pub async fn save_mask(&self) -> Result<MaskSnapshot> {
        let mask = self.mask.read().clone();
        let snapshot = persistence::masks::save_mask(self.db.pool(), &mask).await?;
        info!(
            "Saved mask ({}x{} cells)",
            snapshot.metadata.grid.width, snapshot.metadata.grid.height
        );
        Ok(snapshot)
    }

    /// Drop every edit and go back to the bundled default mask.
    pub async fn reset_mask(&self) -> Result<OccupancyMask> {
        let files = self.mask_files.clone();
        let mask = tokio::task::spawn_blocking(move || files.reset())
            .await?
            .context("default mask files are unusable")?;
        persistence::masks::delete_mask(self.db.pool()).await?;
        self.mask.replace(mask.clone());
        info!("Mask reset to bundled default");
        Ok(mask)
    }

    pub async fn add_restricted_area(&self, zone: ExclusionZone) -> Result<()> {
        persistence::restricted_areas::upsert_restricted_area(self.db.pool(), &zone).await?;
        info!("Added restricted area '{}' ({})", zone.name, zone.id);
        self.restricted.insert(zone);
        Ok(())
    }

    pub async fn remove_restricted_area(&self, id: &str) -> Result<bool> {
        let persisted = persistence::restricted_areas::delete_restricted_area(self.db.pool(), id).await?;
        let in_memory = self.restricted.remove(id).is_some();
        if persisted || in_memory {
            info!("Removed restricted area {}", id);
        }
        Ok(persisted || in_memory)
    }
}

async fn load_mask_files(config: &Config) -> Result<OccupancyMask> {
    let files = FileMaskStore::in_dir(&config.mask_dir);
    let mask = tokio::task::spawn_blocking(move || files.load())
        .await?
        .with_context(|| format!("no usable mask files in {}", config.mask_dir))?;
    info!(
        "Loaded mask files from {} ({}x{})",
        config.mask_dir,
        mask.bounds().width,
        mask.bounds().height
    );
    Ok(mask)
}

/// Read the marina list. A missing file means no marinas, which only
/// disables hybrid routes.
pub fn load_marinas(path: &Path) -> Result<Vec<Marina>> {
    if !path.exists() {
        warn!("Marina file {} not found; hybrid routing disabled", path.display());
        return Ok(Vec::new());
    }
    let bytes = std::fs::read(path)?;
    let marinas: Vec<Marina> = serde_json::from_slice(&bytes)
        .with_context(|| format!("invalid marina file {}", path.display()))?;
    Ok(marinas)
}
