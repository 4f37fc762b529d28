// src/database/types.rs

/// Geometry in well-known text, turned into PostGIS geometry by the insert
#[derive(Debug, Clone, PartialEq, sqlx::Type)]
#[sqlx(transparent)]
pub struct Wkt(String);

impl Wkt {
    /// 2D point, longitude first
    pub fn point(lon: f64, lat: f64) -> Self {
        Self(format!("POINT({:.6} {:.6})", lon, lat))
    }

    /// 3D point, longitude first, altitude in meters
    pub fn point_z(lon: f64, lat: f64, altitude_m: f64) -> Self {
        Self(format!("POINTZ({:.6} {:.6} {:.2})", lon, lat, altitude_m))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
