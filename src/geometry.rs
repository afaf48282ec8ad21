//! Hex-WKB encoding for PostGIS geometry columns.

use crate::source::{ByteOrder, Geometry};

/// Encode a geometry as the hex-WKB string PostGIS accepts as input
/// for `geometry` columns: little-endian WKB, uppercase hex.
pub fn geometry_to_hex(geometry: &dyn Geometry) -> Result<String, String> {
    let mut buffer = vec![0u8; geometry.wkb_size()];
    geometry.write_wkb(ByteOrder::LittleEndian, &mut buffer)?;
    Ok(hex::encode_upper(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::Geom;

    #[test]
    fn point_round_trips_to_known_hex() {
        let hex = geometry_to_hex(&Geom::Point(1.0, 2.0)).unwrap();
        assert_eq!(hex, "0101000000000000000000F03F0000000000000040");
    }

    #[test]
    fn hex_length_is_twice_the_wkb_size() {
        let geom = Geom::LineString(vec![(0.0, 0.0), (5.0, 5.0)]);
        let hex = geometry_to_hex(&geom).unwrap();
        assert_eq!(hex.len(), 2 * (9 + 2 * 16));
    }

    struct Broken;

    impl Geometry for Broken {
        fn wkb_size(&self) -> usize {
            4
        }

        fn write_wkb(&self, _order: ByteOrder, _out: &mut [u8]) -> Result<(), String> {
            Err("export failed".to_string())
        }
    }

    #[test]
    fn export_errors_are_propagated() {
        assert_eq!(geometry_to_hex(&Broken).unwrap_err(), "export failed");
    }
}
