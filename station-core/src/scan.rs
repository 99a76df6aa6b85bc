use crate::traits::Network;

/// Capacity limits of the survey table. The collector wire format budgets
/// 25 rows with 20-byte names, so anything past that is dropped at fill
/// time rather than handed to the peer.
pub const MAX_NETWORKS: usize = 25;
pub const MAX_SSID_LEN: usize = 20;

/// Fixed-capacity table of the most recent survey pass.
#[derive(Debug, Default, Clone)]
pub struct RssiTable {
    rows: Vec<Network>,
}

impl RssiTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table contents with `rows`, keeping at most
    /// [`MAX_NETWORKS`] entries and truncating each SSID to
    /// [`MAX_SSID_LEN`] bytes.
    pub fn fill(&mut self, rows: Vec<Network>) {
        self.rows.clear();
        for mut row in rows.into_iter().take(MAX_NETWORKS) {
            row.ssid = truncate_ssid(&row.ssid);
            self.rows.push(row);
        }
    }

    /// Number of populated rows.
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Network] {
        &self.rows
    }

    /// Serialize the table for the wire: one JSON array of rows.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(&self.rows)?)
    }
}

/// Truncate to `MAX_SSID_LEN` bytes without splitting a UTF-8 character.
fn truncate_ssid(ssid: &str) -> String {
    if ssid.len() <= MAX_SSID_LEN {
        return ssid.to_string();
    }
    let mut end = MAX_SSID_LEN;
    while !ssid.is_char_boundary(end) {
        end -= 1;
    }
    ssid[..end].to_string()
}
