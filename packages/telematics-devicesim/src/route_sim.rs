//! route_sim.rs — Generates a short, realistic sequence of AVL records along
//! a straight-line route, with a DOUT1 value that can be toggled on demand.
//! Physics is intentionally simple (no heel/pitch model, unlike the hardware
//! simulator this pattern is lifted from) — the gateway only cares that the
//! decoded values are shaped like a real device's, not that the motion model
//! is photorealistic.

use rand::Rng;

use telematics_wire::{IoPoint, Record};

/// One leg of straight-line travel at constant speed, from `(lon0, lat0)`.
pub struct RouteSim {
    lon: f64,
    lat: f64,
    heading_deg: f64,
    speed_kmh: u16,
    dout1_value: u64,
    dout1_io_id: u16,
}

impl RouteSim {
    pub fn new(lon0: f64, lat0: f64, heading_deg: f64, speed_kmh: u16, dout1_io_id: u16) -> Self {
        Self {
            lon: lon0,
            lat: lat0,
            heading_deg,
            speed_kmh,
            dout1_value: 0,
            dout1_io_id,
        }
    }

    pub fn set_dout1(&mut self, value: u64) {
        self.dout1_value = value;
    }

    /// Advances the route by `step_secs` and returns the record for the new
    /// position. Roughly 1 degree of longitude/latitude per 111 km at the
    /// equator; good enough for a simulated track, not for navigation.
    pub fn step(&mut self, timestamp: i64, step_secs: f64) -> Record {
        let distance_km = self.speed_kmh as f64 * step_secs / 3600.0;
        let heading_rad = self.heading_deg.to_radians();
        let km_per_degree = 111.0;

        self.lat += (distance_km * heading_rad.cos()) / km_per_degree;
        self.lon += (distance_km * heading_rad.sin())
            / (km_per_degree * self.lat.to_radians().cos().max(0.1));

        let mut rng = rand::thread_rng();
        let jitter_angle: i32 = rng.gen_range(-3..=3);

        Record {
            timestamp,
            priority: 1,
            longitude: self.lon,
            latitude: self.lat,
            altitude: 50,
            angle: ((self.heading_deg as i32 + jitter_angle).rem_euclid(360)) as u16,
            satellites: rng.gen_range(6..=12),
            speed: self.speed_kmh,
            event_io_id: 0,
            ios: vec![IoPoint {
                io_id: self.dout1_io_id,
                value: self.dout1_value,
            }],
            timestamp_substituted: false,
        }
    }
}
