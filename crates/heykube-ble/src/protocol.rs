//! GATT service and characteristic identifiers for the HEYKUBE

use heykube_core::WireField;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// BLE Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// HEYKUBE primary service UUID
pub const HEYKUBE_SERVICE_UUID: Uuid = Uuid::from_u128(0xb46a791a_8273_4fc1_9e67_94d3dc2aac1c);

pub const VERSION_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x5b9009f6_03bf_41aa_87fc_582d8b2bd6b9);

pub const BATTERY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xfd51b3ba_99c7_49c6_9f85_5644ff56a378);

pub const CONFIG_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xf0ac8d24_6daf_4f47_9953_fd921da215e1);

/// Compact cube state with sequence number and move history
pub const CUBE_STATE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xa2f41a4e_0e31_4bbc_9389_4253475481fb);

/// Status notifications and the four-record status history
pub const STATUS_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x9bbc2d67_0ba7_4440_aedf_08fb019687f9);

pub const MATCH_STATE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x982af399_ef78_4eff_b24d_2e1a01aa9f13);

pub const INSTRUCTIONS_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x1379570d_86c6_45a4_8778_f552e7feb290);

/// Opaque device action channel
pub const ACTION_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xe06da2b8_c643_42b1_895b_a5acbbf30afd);

pub const ACCEL_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x272a1fe9_058b_402b_8298_7fec5ce7473e);

pub const MOVES_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xf2ff5401_2bc0_415b_a2f1_6549d6ca0ad8);

/// Advertised name prefix of every HEYKUBE
pub const HEYKUBE_NAME_PREFIX: &str = "HEYKUBE";

// ----------------------------------------------------------------------------
// Field Mapping
// ----------------------------------------------------------------------------

/// Characteristic UUID carrying a wire field
pub fn characteristic_uuid(field: WireField) -> Uuid {
    match field {
        WireField::Version => VERSION_CHARACTERISTIC_UUID,
        WireField::Battery => BATTERY_CHARACTERISTIC_UUID,
        WireField::Config => CONFIG_CHARACTERISTIC_UUID,
        WireField::CubeState => CUBE_STATE_CHARACTERISTIC_UUID,
        WireField::Status => STATUS_CHARACTERISTIC_UUID,
        WireField::MatchState => MATCH_STATE_CHARACTERISTIC_UUID,
        WireField::Instructions => INSTRUCTIONS_CHARACTERISTIC_UUID,
        WireField::Action => ACTION_CHARACTERISTIC_UUID,
        WireField::Accel => ACCEL_CHARACTERISTIC_UUID,
        WireField::Moves => MOVES_CHARACTERISTIC_UUID,
    }
}

/// Wire field served by a characteristic, if it belongs to the HEYKUBE service
pub fn field_for_uuid(uuid: Uuid) -> Option<WireField> {
    WireField::ALL
        .into_iter()
        .find(|field| characteristic_uuid(*field) == uuid)
}

/// Whether an advertised local name looks like a HEYKUBE
pub fn matches_device_name(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_mapping_is_bijective() {
        let uuids: HashSet<Uuid> = WireField::ALL.iter().map(|f| characteristic_uuid(*f)).collect();
        assert_eq!(uuids.len(), WireField::ALL.len());
        assert!(!uuids.contains(&HEYKUBE_SERVICE_UUID));

        for field in WireField::ALL {
            assert_eq!(field_for_uuid(characteristic_uuid(field)), Some(field));
        }
        assert_eq!(field_for_uuid(HEYKUBE_SERVICE_UUID), None);
    }

    #[test]
    fn test_uuid_text_form() {
        assert_eq!(
            CUBE_STATE_CHARACTERISTIC_UUID.to_string(),
            "a2f41a4e-0e31-4bbc-9389-4253475481fb"
        );
        assert_eq!(
            HEYKUBE_SERVICE_UUID.to_string(),
            "b46a791a-8273-4fc1-9e67-94d3dc2aac1c"
        );
    }

    #[test]
    fn test_device_name_filter() {
        assert!(matches_device_name("HEYKUBE-1A2B", HEYKUBE_NAME_PREFIX));
        assert!(!matches_device_name("GAN-i3", HEYKUBE_NAME_PREFIX));
    }
}
