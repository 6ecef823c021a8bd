//! Component D — Admission Guard.
//!
//! Checks a submitted paint against five rules in a fixed, short-circuiting
//! order: bot token, geofence mask, radius, speed clamp, cooldown. Cooldown
//! and last-position tables are `DashMap`s keyed directly by client
//! identity — see DESIGN.md for why this replaces the teacher's
//! fixed-capacity bitset + timing wheel rather than reusing it verbatim.

use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;

use crate::codec::{MAX_COLOR, MAX_OFFSET};
use crate::error::{PaintError, RejectReason};
use crate::mask::GeofenceMask;
use crate::projection;
use crate::time::Clock;
use crate::token::TokenVerifier;

/// Opaque client identity: a network address, optionally a trusted
/// forwarded-for value. The Guard never invents identities of its own.
pub type ClientId = String;

/// A paint attempt as it arrives at the Guard, already structurally
/// parsed (JSON decoding happens at the transport boundary).
#[derive(Debug, Clone, Copy)]
pub struct PaintRequest {
    pub lat: f64,
    pub lon: f64,
    pub cx: i64,
    pub cy: i64,
    pub o: u32,
    pub color: u8,
}

/// Tunables for the five admission rules, all independently configurable.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub enable_token_check: bool,
    pub cooldown_secs: i64,
    pub geofence_radius_m: f64,
    pub speed_max_m_per_s: f64,
}

impl GuardConfig {
    pub fn from_km_per_hour(speed_max_kmh: f64, cooldown_secs: i64, geofence_radius_m: f64, enable_token_check: bool) -> Self {
        Self {
            enable_token_check,
            cooldown_secs,
            geofence_radius_m,
            speed_max_m_per_s: speed_max_kmh * 1000.0 / 3600.0,
        }
    }
}

struct PositionEntry {
    lat: f64,
    lon: f64,
    t: i64,
}

/// The ordered rule chain guarding every paint before it reaches the
/// Chunk Store.
pub struct AdmissionGuard {
    config: GuardConfig,
    verifier: Arc<dyn TokenVerifier>,
    mask: Arc<dyn GeofenceMask>,
    cooldown: DashMap<ClientId, i64>,
    position: DashMap<ClientId, PositionEntry>,
    clock: Clock,
}

impl AdmissionGuard {
    pub fn new(config: GuardConfig, verifier: Arc<dyn TokenVerifier>, mask: Arc<dyn GeofenceMask>) -> Self {
        Self {
            config,
            verifier,
            mask,
            cooldown: DashMap::new(),
            position: DashMap::new(),
            clock: Clock::system(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs the full `CHECK_TOKEN -> CHECK_GEOFENCE -> CHECK_RADIUS ->
    /// CHECK_SPEED -> CHECK_COOLDOWN -> ADMIT` chain. On success, records
    /// the cooldown and position entries for `client_id`; on rejection,
    /// neither table is touched.
    pub async fn admit(
        &self,
        req: &PaintRequest,
        client_id: &ClientId,
        client_ip: IpAddr,
        token: Option<&str>,
    ) -> Result<(), PaintError> {
        if let Err(err) = self.run_checks(req, client_id, client_ip, token).await {
            tracing::debug!(%client_id, error = %err, "paint rejected");
            return Err(err);
        }

        let now = self.clock.now_unix_secs();
        self.cooldown.insert(client_id.clone(), now + self.config.cooldown_secs);
        self.position.insert(
            client_id.clone(),
            PositionEntry {
                lat: req.lat,
                lon: req.lon,
                t: now,
            },
        );
        Ok(())
    }

    async fn run_checks(
        &self,
        req: &PaintRequest,
        client_id: &ClientId,
        client_ip: IpAddr,
        token: Option<&str>,
    ) -> Result<(), PaintError> {
        self.check_structure(req)?;
        self.check_token(token, client_ip).await?;
        self.check_geofence(req)?;
        self.check_radius(req)?;
        self.check_speed(req, client_id)?;
        self.check_cooldown(client_id)?;
        Ok(())
    }

    fn check_structure(&self, req: &PaintRequest) -> Result<(), PaintError> {
        if req.o > MAX_OFFSET {
            return Err(PaintError::BadInput("offset out of range"));
        }
        if req.color > MAX_COLOR {
            return Err(PaintError::BadInput("color out of range"));
        }
        if !req.lat.is_finite() || !req.lon.is_finite() {
            return Err(PaintError::BadInput("non-finite coordinate"));
        }
        Ok(())
    }

    async fn check_token(&self, token: Option<&str>, client_ip: IpAddr) -> Result<(), PaintError> {
        if !self.config.enable_token_check {
            return Ok(());
        }
        let token = token.ok_or(PaintError::Unauthorized)?;
        let outcome = self.verifier.verify(token, client_ip).await;
        if outcome.success {
            Ok(())
        } else {
            Err(PaintError::Unauthorized)
        }
    }

    fn check_geofence(&self, req: &PaintRequest) -> Result<(), PaintError> {
        let (x, y) = projection::lat_lon_to_tile(req.lat, req.lon);
        if self.mask.is_allowed(x, y) {
            Ok(())
        } else {
            Err(PaintError::Forbidden(RejectReason::Geofence))
        }
    }

    fn check_radius(&self, req: &PaintRequest) -> Result<(), PaintError> {
        let (tx, ty) = projection::tile_for_chunk_offset(req.cx, req.cy, req.o);
        let (tlat, tlon) = projection::tile_center_lat_lon(tx, ty);
        let distance = projection::haversine(req.lat, req.lon, tlat, tlon);
        if distance > self.config.geofence_radius_m {
            Err(PaintError::Forbidden(RejectReason::Radius))
        } else {
            Ok(())
        }
    }

    fn check_speed(&self, req: &PaintRequest, client_id: &ClientId) -> Result<(), PaintError> {
        let Some(prev) = self.position.get(client_id) else {
            return Ok(());
        };
        let now = self.clock.now_unix_secs();
        if now <= prev.t {
            // Time monotonicity violation: treat the ratio as 0 (accept).
            return Ok(());
        }
        let dt = (now - prev.t) as f64;
        let distance = projection::haversine(prev.lat, prev.lon, req.lat, req.lon);
        let speed = distance / dt;
        if speed > self.config.speed_max_m_per_s {
            Err(PaintError::Forbidden(RejectReason::Speed))
        } else {
            Ok(())
        }
    }

    fn check_cooldown(&self, client_id: &ClientId) -> Result<(), PaintError> {
        let now = self.clock.now_unix_secs();
        if let Some(expiry) = self.cooldown.get(client_id) {
            if now < *expiry {
                return Err(PaintError::TooMany);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::BoundingBoxMask;
    use crate::token::{AlwaysAllowVerifier, AlwaysDenyVerifier};

    fn boston_guard(clock: Clock) -> AdmissionGuard {
        let mask = Arc::new(BoundingBoxMask {
            min_x: i64::MIN / 2,
            min_y: i64::MIN / 2,
            max_x: i64::MAX / 2,
            max_y: i64::MAX / 2,
        });
        let config = GuardConfig::from_km_per_hour(150.0, 5, 300.0, false);
        AdmissionGuard::new(config, Arc::new(AlwaysAllowVerifier), mask).with_clock(clock)
    }

    fn boston_paint() -> PaintRequest {
        let lat = 42.3551;
        let lon = -71.0657;
        let (x, y) = projection::lat_lon_to_tile(lat, lon);
        let (cx, cy) = projection::chunk_of(x, y);
        let o = projection::offset_of(x, y);
        PaintRequest {
            lat,
            lon,
            cx,
            cy,
            o,
            color: 5,
        }
    }

    #[tokio::test]
    async fn valid_paint_is_admitted() {
        let guard = boston_guard(Clock::fixed(1_000));
        let req = boston_paint();
        let result = guard.admit(&req, &"1.2.3.4".to_string(), "1.2.3.4".parse().unwrap(), None).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn second_paint_within_cooldown_is_rejected() {
        let clock = Clock::fixed(1_000);
        let guard = boston_guard(clock.clone());
        let req = boston_paint();
        let client = "1.2.3.4".to_string();
        let ip = "1.2.3.4".parse().unwrap();

        assert!(guard.admit(&req, &client, ip, None).await.is_ok());
        let second = guard.admit(&req, &client, ip, None).await;
        assert_eq!(second, Err(PaintError::TooMany));
    }

    #[tokio::test]
    async fn paint_after_cooldown_window_is_admitted() {
        let clock = Clock::fixed(1_000);
        let guard = boston_guard(clock.clone());
        let req = boston_paint();
        let client = "1.2.3.4".to_string();
        let ip = "1.2.3.4".parse().unwrap();

        assert!(guard.admit(&req, &client, ip, None).await.is_ok());
        clock.advance(6);
        assert!(guard.admit(&req, &client, ip, None).await.is_ok());
    }

    #[tokio::test]
    async fn geofence_miss_rejects_with_reason_and_no_cooldown() {
        let mask = Arc::new(BoundingBoxMask {
            min_x: 0,
            min_y: 0,
            max_x: 0,
            max_y: 0,
        });
        let config = GuardConfig::from_km_per_hour(150.0, 5, 300.0, false);
        let guard = AdmissionGuard::new(config, Arc::new(AlwaysAllowVerifier), mask).with_clock(Clock::fixed(1_000));

        // New York, well outside a Boston-sized mask window.
        let req = PaintRequest {
            lat: 40.7128,
            lon: -74.0060,
            cx: 0,
            cy: 0,
            o: 0,
            color: 1,
        };
        let client = "5.6.7.8".to_string();
        let ip = "5.6.7.8".parse().unwrap();
        let result = guard.admit(&req, &client, ip, None).await;
        assert_eq!(result, Err(PaintError::Forbidden(RejectReason::Geofence)));

        // Rejected paint must not start a cooldown.
        assert!(guard.cooldown.get(&client).is_none());
    }

    #[tokio::test]
    async fn radius_check_rejects_mismatched_chunk_offset() {
        let guard = boston_guard(Clock::fixed(1_000));
        let mut req = boston_paint();
        // Claim a chunk far away from the submitted lat/lon.
        req.cx += 10_000;
        let result = guard.admit(&req, &"9.9.9.9".to_string(), "9.9.9.9".parse().unwrap(), None).await;
        assert_eq!(result, Err(PaintError::Forbidden(RejectReason::Radius)));
    }

    #[tokio::test]
    async fn speed_clamp_rejects_teleport_but_keeps_first_position() {
        let clock = Clock::fixed(1_000);
        let guard = boston_guard(clock.clone());
        let client = "3.3.3.3".to_string();
        let ip = "3.3.3.3".parse().unwrap();

        let first = boston_paint();
        assert!(guard.admit(&first, &client, ip, None).await.is_ok());
        clock.advance(6); // clear cooldown

        // Teleport roughly 100km away within 1 second of travel budget.
        let (x, y) = projection::lat_lon_to_tile(43.3, -71.0657);
        let (cx, cy) = projection::chunk_of(x, y);
        let o = projection::offset_of(x, y);
        let far = PaintRequest {
            lat: 43.3,
            lon: -71.0657,
            cx,
            cy,
            o,
            color: 1,
        };
        clock.advance(1);
        let result = guard.admit(&far, &client, ip, None).await;
        assert_eq!(result, Err(PaintError::Forbidden(RejectReason::Speed)));

        // A rejected paint must not move recorded position.
        let stored = guard.position.get(&client).unwrap();
        assert_eq!(stored.lat, first.lat);
    }

    #[tokio::test]
    async fn token_check_rejects_when_enabled_and_denied() {
        let mask = Arc::new(BoundingBoxMask {
            min_x: i64::MIN / 2,
            min_y: i64::MIN / 2,
            max_x: i64::MAX / 2,
            max_y: i64::MAX / 2,
        });
        let config = GuardConfig::from_km_per_hour(150.0, 5, 300.0, true);
        let guard = AdmissionGuard::new(config, Arc::new(AlwaysDenyVerifier), mask).with_clock(Clock::fixed(1_000));
        let req = boston_paint();
        let result = guard
            .admit(&req, &"4.4.4.4".to_string(), "4.4.4.4".parse().unwrap(), Some("tok"))
            .await;
        assert_eq!(result, Err(PaintError::Unauthorized));
    }

    #[tokio::test]
    async fn out_of_range_offset_is_bad_input() {
        let guard = boston_guard(Clock::fixed(1_000));
        let mut req = boston_paint();
        req.o = 70_000;
        let result = guard.admit(&req, &"2.2.2.2".to_string(), "2.2.2.2".parse().unwrap(), None).await;
        assert!(matches!(result, Err(PaintError::BadInput(_))));
    }
}
