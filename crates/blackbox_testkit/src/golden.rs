//! Golden byte vectors for the on-disk format.
//!
//! Every vector is little-endian and fixed; a change to any of them
//! breaks compatibility with files already on disk.

/// File header: page 256, metadata zone 32, stamps 100..200.
pub const FILE_HEADER_HEX: &str = "00010000200000006400000000000000c800000000000000";

/// Page header: extension 16, stamps 100..200.
pub const PAGE_HEADER_HEX: &str = "100000006400000000000000c800000000000000";

/// Part header: full reference at stamp 100, identifier `ro:7`, 10 bytes.
pub const PART_HEADER_HEX: &str = "08016400000000000000070000400a000000";

/// Metadata document of a file written in `Europe/Riga`.
pub const METADATA_JSON: &str =
    r#"{"extension":{"version":{"major":1,"minor":0},"localize":{"tz":"Europe/Riga"}}}"#;

/// Encodes bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes lowercase or uppercase hex; `None` on odd length or bad digits.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Asserts that `actual` equals the hex vector, showing both on failure.
pub fn assert_golden(name: &str, actual: &[u8], expected_hex: &str) {
    let expected = hex_decode(expected_hex)
        .unwrap_or_else(|| panic!("golden vector {name} is not valid hex"));
    assert!(
        actual == expected.as_slice(),
        "golden mismatch for {name}\n  expected: {expected_hex}\n  actual:   {}",
        hex_encode(actual)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbox_core::{
        Extension, FileHeader, Identifier, PageHeader, PartHeader, PartTag, RecordType, Source,
        Stamp,
    };

    #[test]
    fn hex_helpers() {
        assert_eq!(hex_encode(&[0x00, 0xab, 0x10]), "00ab10");
        assert_eq!(hex_decode("00AB10"), Some(vec![0x00, 0xab, 0x10]));
        assert_eq!(hex_decode("abc"), None);
        assert_eq!(hex_decode("zz"), None);
    }

    #[test]
    fn file_header_vector() {
        let header = FileHeader {
            page_size: 256,
            extension_size: 32,
            time_begin: 100,
            time_end: 200,
        };
        assert_golden("file header", &header.encode(), FILE_HEADER_HEX);
        let bytes: [u8; FileHeader::SIZE] = hex_decode(FILE_HEADER_HEX)
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(FileHeader::decode(&bytes), header);
    }

    #[test]
    fn page_header_vector() {
        let header = PageHeader {
            extension_size: 16,
            time_begin: 100,
            time_end: 200,
        };
        assert_golden("page header", &header.encode(), PAGE_HEADER_HEX);
    }

    #[test]
    fn part_header_vector() {
        let header = PartHeader {
            tag: PartTag::Full,
            record_type: RecordType::Reference,
            stamp: Stamp::new(100),
            id: Identifier::new(Source::RemoteOutput, 7),
            size: 10,
        };
        assert_golden("part header", &header.encode(), PART_HEADER_HEX);
        let bytes: [u8; PartHeader::SIZE] = hex_decode(PART_HEADER_HEX)
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(PartHeader::decode(&bytes), Some(header));
    }

    #[test]
    fn metadata_vector() {
        let encoded = Extension::current("Europe/Riga").encode().unwrap();
        assert_eq!(String::from_utf8(encoded).unwrap(), METADATA_JSON);
        let decoded = Extension::decode(METADATA_JSON.as_bytes()).unwrap();
        assert_eq!(decoded.time_zone, "Europe/Riga");
        assert!(decoded.is_supported());
    }
}
