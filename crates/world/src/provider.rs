use glam::Vec3;
use zonesave_common::ZoneName;

/// Containment query over the world's streaming zones.
///
/// The save engine only consumes the result: given a position, the smallest
/// enclosing zone or none. How the host partitions space is its business.
pub trait ZoneProvider {
    fn zone_at(&self, position: Vec3) -> Option<ZoneName>;
}

/// Axis-aligned footprint of a zone on the ground (XZ) plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneExtents {
    pub min: Vec3,
    pub max: Vec3,
}

impl ZoneExtents {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Containment ignores height: zones are vertical columns.
    pub fn contains_xz(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }

    pub fn area(&self) -> f32 {
        (self.max.x - self.min.x).max(0.0) * (self.max.z - self.min.z).max(0.0)
    }
}

/// Reference [`ZoneProvider`] backed by registered zone extents.
///
/// Overlapping zones resolve to the smallest footprint, so a detail zone
/// nested inside a broader one wins.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<(ZoneName, ZoneExtents)>,
}

impl ZoneIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: ZoneName, extents: ZoneExtents) {
        self.zones.push((name, extents));
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl ZoneProvider for ZoneIndex {
    fn zone_at(&self, position: Vec3) -> Option<ZoneName> {
        let mut best: Option<(&ZoneName, f32)> = None;
        for (name, extents) in &self.zones {
            if !extents.contains_xz(position) {
                continue;
            }
            let area = extents.area();
            if best.map_or(true, |(_, a)| area < a) {
                best = Some((name, area));
            }
        }
        best.map(|(name, _)| name.clone())
    }
}
