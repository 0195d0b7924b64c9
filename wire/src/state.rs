//! Per-object delta layout.

use bitstream::{BitReader, BitWriter};
use glam::{DQuat, DVec3};
use zone::EntityId;

use crate::error::WireResult;
use crate::types::NetworkId;

/// One object's state in one frame, relative to a confirmed baseline.
///
/// With `baseline_version == None` the state is complete: every optional
/// field is present. Otherwise only fields that differ from the baseline are
/// present, and the client applies them on top of the version it confirmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectState {
    pub network_id: NetworkId,
    pub version: u64,
    pub baseline_version: Option<u64>,
    pub removed: bool,
    pub entity_id: Option<EntityId>,
    pub zone_id: Option<u32>,
    pub position: Option<DVec3>,
    pub rotation: Option<DQuat>,
}

impl ObjectState {
    /// Returns `true` if the state is complete rather than a diff.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.baseline_version.is_none()
    }

    /// Returns `true` if nothing but the header would be sent.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        !self.removed
            && self.entity_id.is_none()
            && self.zone_id.is_none()
            && self.position.is_none()
            && self.rotation.is_none()
    }

    /// Exact encoded size in bits.
    #[must_use]
    pub fn encoded_bits(&self) -> usize {
        let mut writer = BitWriter::with_capacity(64);
        self.write(&mut writer);
        writer.bits_written()
    }

    pub(crate) fn write(&self, writer: &mut BitWriter) {
        writer.write_varu32(self.network_id.raw());
        writer.write_varu64(self.version);
        writer.write_bit(self.removed);

        writer.write_bit(self.baseline_version.is_some());
        if let Some(baseline) = self.baseline_version {
            writer.write_varu64(baseline);
        }
        writer.write_bit(self.entity_id.is_some());
        if let Some(entity) = self.entity_id {
            writer.write_varu64(entity.raw());
        }
        writer.write_bit(self.zone_id.is_some());
        if let Some(zone_id) = self.zone_id {
            writer.write_varu32(zone_id);
        }
        writer.write_bit(self.position.is_some());
        if let Some(position) = self.position {
            for value in position.to_array() {
                writer.write_f64(value);
            }
        }
        writer.write_bit(self.rotation.is_some());
        if let Some(rotation) = self.rotation {
            for value in rotation.to_array() {
                writer.write_f64(value);
            }
        }
    }

    pub(crate) fn read(reader: &mut BitReader<'_>) -> WireResult<Self> {
        let network_id = NetworkId::new(reader.read_varu32()?);
        let version = reader.read_varu64()?;
        let removed = reader.read_bit()?;
        let baseline_version = if reader.read_bit()? {
            Some(reader.read_varu64()?)
        } else {
            None
        };
        let entity_id = if reader.read_bit()? {
            Some(EntityId::new(reader.read_varu64()?))
        } else {
            None
        };
        let zone_id = if reader.read_bit()? {
            Some(reader.read_varu32()?)
        } else {
            None
        };
        let position = if reader.read_bit()? {
            Some(DVec3::new(
                reader.read_f64()?,
                reader.read_f64()?,
                reader.read_f64()?,
            ))
        } else {
            None
        };
        let rotation = if reader.read_bit()? {
            Some(DQuat::from_xyzw(
                reader.read_f64()?,
                reader.read_f64()?,
                reader.read_f64()?,
                reader.read_f64()?,
            ))
        } else {
            None
        };
        Ok(Self {
            network_id,
            version,
            baseline_version,
            removed,
            entity_id,
            zone_id,
            position,
            rotation,
        })
    }
}
