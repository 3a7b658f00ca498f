use std::{fs::File, io, io::BufReader, net::SocketAddr, path::Path};

use serde::{Deserialize, Serialize};

/// Configuration of networked multi-party transport.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NetworkConfig {
    pub parties: Vec<NetworkPartyConfig>,
}

/// Details about party in networked multiparty protocol.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NetworkPartyConfig {
    pub address: SocketAddr,
}

impl NetworkConfig {
    /// Load configuration from JSON file.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Number of parties in the session.
    pub fn num_parties(&self) -> usize {
        self.parties.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let raw = r#"{"parties": [{"address": "127.0.0.1:9000"}, {"address": "127.0.0.1:9001"}]}"#;
        let config: NetworkConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.num_parties(), 2);
        assert_eq!(config.parties[1].address.port(), 9001);
    }
}
