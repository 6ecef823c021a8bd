//! The composition root: every long-lived dependency the HTTP/WS handlers
//! need, built once in `main` and handed around as `Arc<AppState>`. No
//! ambient singletons, per spec.md §9's "pass a composition root around".

use std::sync::Arc;

use canvas_engine::{AdmissionGuard, AlwaysAllowVerifier, BitmapMask, BoundingBoxMask, ChunkStore, GeofenceMask, GuardConfig, HttpTokenVerifier, SubscriptionHub, TokenVerifier};

use crate::config::ServerConfig;

pub struct AppState {
    pub config: ServerConfig,
    pub store: ChunkStore,
    pub guard: AdmissionGuard,
    pub hub: SubscriptionHub,
}

impl AppState {
    pub fn build(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let mask: Arc<dyn GeofenceMask> = match &config.mask_path {
            Some(path) => {
                let loaded = BitmapMask::load_from_path(path)
                    .map_err(|e| anyhow::anyhow!("failed to load mask file {path}: {e}"))?;
                tracing::info!(path, "loaded geofence mask");
                Arc::new(loaded)
            }
            None => {
                tracing::warn!("no MASK_PATH set; falling back to coarse bounding-box geofence");
                Arc::new(BoundingBoxMask {
                    min_x: i64::MIN / 2,
                    min_y: i64::MIN / 2,
                    max_x: i64::MAX / 2,
                    max_y: i64::MAX / 2,
                })
            }
        };

        let verifier: Arc<dyn TokenVerifier> = if config.enable_token_check {
            Arc::new(HttpTokenVerifier::new(
                "https://challenges.cloudflare.com/turnstile/v0/siteverify",
                config.token_secret.clone(),
            ))
        } else {
            Arc::new(AlwaysAllowVerifier)
        };

        let guard_config = GuardConfig::from_km_per_hour(
            config.speed_max_kmh,
            config.paint_cooldown_secs,
            config.geofence_radius_m,
            config.enable_token_check,
        );

        Ok(Arc::new(Self {
            store: ChunkStore::new(),
            guard: AdmissionGuard::new(guard_config, verifier, mask),
            hub: SubscriptionHub::default(),
            config,
        }))
    }
}
