//! Caller machine identity sent with every request.
//!
//! The application uses the hardware address to tell clients apart. It
//! is looked up once per process and reused for every session.

use std::sync::OnceLock;

use rand::RngCore;
use tracing::debug;

static MACHINE_ID: OnceLock<String> = OnceLock::new();

/// Upper-case, colon-separated hardware address of this machine.
pub fn machine_id() -> &'static str {
    MACHINE_ID.get_or_init(detect)
}

fn detect() -> String {
    let octets = match mac_address::get_mac_address() {
        Ok(Some(mac)) => mac.bytes(),
        Ok(None) => {
            debug!("no hardware address found; using a random node id");
            random_node()
        }
        Err(e) => {
            debug!("hardware address lookup failed: {e}; using a random node id");
            random_node()
        }
    };
    format_octets(&octets)
}

/// Random 48-bit id with the multicast bit set, so it can never
/// collide with a real interface address.
fn random_node() -> [u8; 6] {
    let mut octets = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut octets);
    octets[0] |= 0x01;
    octets
}

pub fn format_octets(octets: &[u8; 6]) -> String {
    octets
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_upper_case_octets() {
        assert_eq!(
            format_octets(&[0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0xfe]),
            "00:1A:2B:3C:4D:FE"
        );
    }

    #[test]
    fn machine_id_is_cached() {
        let first = machine_id();
        let second = machine_id();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.len(), 17);
        assert_eq!(first.matches(':').count(), 5);
    }

    #[test]
    fn random_node_is_multicast() {
        for _ in 0..16 {
            assert_eq!(random_node()[0] & 0x01, 0x01);
        }
    }
}
