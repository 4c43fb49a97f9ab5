//! Engine Context
//!
//! Owns the process-wide engine handle for the life of the application and
//! hands out players bound to it.

use std::sync::Arc;

use riffle_engine::vlc::{VlcEngine, VlcLoader};
use riffle_engine::{EngineInfo, EngineResolver, MediaEngine, ResolvedEngine, ResolverConfig};
use tracing::info;

use crate::config::PlayerConfig;
use crate::error::{PlayerError, PlayerResult};
use crate::player::Player;

pub struct EngineContext<E: MediaEngine> {
    engine: Arc<E>,
    info: EngineInfo,
    config: PlayerConfig,
}

impl<E: MediaEngine> EngineContext<E> {
    pub fn new(resolved: ResolvedEngine<E>, config: PlayerConfig) -> Self {
        let info = resolved.info();
        Self {
            engine: Arc::new(resolved.engine),
            info,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Where the engine was loaded from, its version and optional features
    pub fn info(&self) -> &EngineInfo {
        &self.info
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn create_player(&self) -> PlayerResult<Player<E>> {
        Player::new(Arc::clone(&self.engine), self.config.clone())
    }
}

impl EngineContext<VlcEngine> {
    /// Resolve and load libVLC, then build a context around it
    pub fn resolve(
        resolver_config: ResolverConfig,
        prefer_bundled: bool,
        config: PlayerConfig,
    ) -> PlayerResult<Self> {
        config.validate().map_err(PlayerError::InvalidInput)?;

        let resolver = EngineResolver::new(resolver_config, VlcLoader);
        let resolved = resolver.resolve(prefer_bundled)?;
        info!(
            "Engine loaded from {} ({})",
            resolved.root.display(),
            resolved.source
        );
        Ok(Self::new(resolved, config))
    }
}
