//! Subcommand implementations

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use crossbeam_channel::RecvTimeoutError;
use riffle_core::{
    EngineContext, PlaybackState, PlayerConfig, PlayerEvent, PlayerSettings, ResolverConfig,
};
use riffle_engine::vlc::{VlcEngine, VlcLoader};
use riffle_engine::{missing_plugins, validate_root, EngineResolver};
use serde_json::json;
use tracing::{info, warn};

pub struct Host {
    prefer_bundled: bool,
    resolver_config: ResolverConfig,
    settings: PlayerSettings,
}

impl Host {
    pub fn new(prefer_bundled: bool, engine_root: Option<PathBuf>) -> Self {
        let settings = PlayerSettings::load();
        let mut resolver_config = ResolverConfig::for_current_platform();
        if let Some(root) = engine_root {
            resolver_config.bundled_roots.insert(0, root);
        }
        Self {
            prefer_bundled: prefer_bundled || settings.prefer_bundled,
            resolver_config,
            settings,
        }
    }

    fn context(&self) -> anyhow::Result<EngineContext<VlcEngine>> {
        let context = EngineContext::resolve(
            self.resolver_config.clone(),
            self.prefer_bundled,
            PlayerConfig::default(),
        )
        .context("Failed to load the media engine")?;
        println!("{}", serde_json::to_string(context.info())?);
        Ok(context)
    }

    pub fn probe(&self) -> anyhow::Result<()> {
        let resolver = EngineResolver::new(self.resolver_config.clone(), VlcLoader);
        let mut usable = 0;
        for candidate in resolver.candidates(self.prefer_bundled) {
            let report = match validate_root(&self.resolver_config, &candidate.root) {
                Ok(validation) => {
                    usable += 1;
                    json!({
                        "source": candidate.source,
                        "root": candidate.root,
                        "valid": true,
                        "library": validation.library,
                        "plugins": validation.plugin_count,
                        "missing_plugins": missing_plugins(&self.resolver_config, &candidate.root),
                    })
                }
                Err(e) => json!({
                    "source": candidate.source,
                    "root": candidate.root,
                    "valid": false,
                    "reason": e.to_string(),
                }),
            };
            println!("{}", report);
        }

        if usable == 0 {
            bail!("No usable engine installation found");
        }
        Ok(())
    }

    pub fn devices(&self, refresh: bool) -> anyhow::Result<()> {
        let context = self.context()?;
        let player = context.create_player()?;
        for device in player.available_audio_devices(refresh) {
            println!("{}", serde_json::to_string(&device)?);
        }
        Ok(())
    }

    pub fn play(
        mut self,
        input: &str,
        device: Option<String>,
        module: Option<String>,
        volume: Option<u8>,
        duration: Option<u64>,
    ) -> anyhow::Result<()> {
        let context = self.context()?;
        let player = context.create_player()?;
        let events = player.subscribe();

        player.set_volume(volume.unwrap_or(self.settings.volume))?;
        player.set_mute(self.settings.muted);
        if let Err(e) = player.set_rate(self.settings.rate) {
            warn!("Ignoring saved rate: {}", e);
        }

        let (device, module) = match device {
            Some(device) => (Some(device), module),
            None => (
                self.settings.last_device_id.clone(),
                module.or_else(|| self.settings.last_device_module.clone()),
            ),
        };
        if device.is_some() || module.is_some() {
            player.select_device_id(device.as_deref(), module.as_deref());
        }

        player
            .load(input)
            .with_context(|| format!("Failed to load {}", input))?;
        if !player.play() {
            bail!("Playback could not be started");
        }

        let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
        let mut started = false;
        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                info!("Requested duration elapsed");
                break;
            }
            match events.recv_timeout(Duration::from_millis(250)) {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if let PlayerEvent::StateChanged { new, .. } = event {
                        match new {
                            PlaybackState::Playing => started = true,
                            PlaybackState::Stopped if started => break,
                            PlaybackState::Error => bail!("Playback failed"),
                            _ => {}
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        player.stop();
        let status = player.current_device_info();
        self.settings.volume = player.volume();
        self.settings.muted = player.is_muted();
        if let Some(verified) = status.last_verified {
            self.settings.last_device_id = verified.id;
            self.settings.last_device_module = verified.module;
        }
        if let Err(e) = self.settings.save() {
            warn!("Settings not saved: {}", e);
        }
        Ok(())
    }
}
