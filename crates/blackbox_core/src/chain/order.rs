//! Ordering of box file names.
//!
//! Names embed the time of their first record, so sorting them by time
//! text is enough, with two twists: names without the zone marker were
//! written by older versions in local time and sort before all zoned
//! names, and `_NN` collision suffixes sort after the plain name.

use crate::location::ZONE_MARKER;

/// Sort key of a file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct NameKey {
    zoned: bool,
    time: String,
    attempt: u32,
    raw: String,
}

impl NameKey {
    /// Builds the key of `name` within a box using `prefix` and `suffix`.
    pub(crate) fn new(name: &str, prefix: &str, suffix: &str) -> Self {
        let middle = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
            .unwrap_or(name);

        let (body, attempt) = match middle.rfind('_') {
            Some(at) => match middle[at + 1..].parse::<u32>() {
                Ok(attempt) if middle[at + 1..].bytes().all(|b| b.is_ascii_digit()) => {
                    (&middle[..at], attempt)
                }
                _ => (middle, 0),
            },
            None => (middle, 0),
        };

        let (time, zoned) = match body.strip_suffix(|c: char| c.eq_ignore_ascii_case(&ZONE_MARKER)) {
            Some(time) => (time, true),
            None => (body, false),
        };

        Self {
            zoned,
            time: time.to_string(),
            attempt,
            raw: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(name: &str) -> NameKey {
        NameKey::new(name, "bx", ".bbx")
    }

    #[test]
    fn attempts_follow_plain_name() {
        assert!(key("bx170101-1200Z.bbx") < key("bx170101-1200Z_01.bbx"));
        assert!(key("bx170101-1200Z_02.bbx") < key("bx170101-1200Z_10.bbx"));
        assert!(key("bx170101-1200Z_99.bbx") < key("bx170101-1201Z.bbx"));
    }

    #[test]
    fn unzoned_names_come_first() {
        assert!(key("bx170101-1200.bbx") < key("bx170101-1200Z.bbx"));
        assert!(key("bx990101-1200.bbx") < key("bx010101-0000Z.bbx"));
        assert!(key("bx170101-1159.bbx") < key("bx170101-1200.bbx"));
    }

    #[test]
    fn marker_case_insensitive() {
        assert!(key("bx170101-1200z.bbx").zoned);
        assert_eq!(key("bx170101-1200z.bbx").time, "170101-1200");
    }

    proptest! {
        #[test]
        fn order_follows_time(a in 0u32..1_000_000, b in 0u32..1_000_000, na in 0u32..100, nb in 0u32..100) {
            let name = |t: u32, n: u32| {
                let time = format!("{:06}-{:04}", t, t % 10_000);
                if n == 0 { format!("bx{time}Z.bbx") } else { format!("bx{time}Z_{n:02}.bbx") }
            };
            let (ka, kb) = (key(&name(a, na)), key(&name(b, nb)));
            prop_assert_eq!(ka.cmp(&kb), (a, na).cmp(&(b, nb)));
        }
    }
}
