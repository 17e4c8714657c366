//! Configuration of [`TankServer`](crate::TankServer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`TankServer`](crate::TankServer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub address: String,

    /// Port to listen on, `0` picks a free port.
    pub port: u16,

    /// Name of inbound telemetry events.
    pub telemetry_event: String,

    /// Name of outbound control events.
    pub control_event: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 4567,
            telemetry_event: "telemetry_0".to_string(),
            control_event: "control".to_string(),
        }
    }
}

impl ServerConfig {
    /// Sets the address to listen on.
    pub fn address(mut self, v: impl Into<String>) -> Self {
        self.address = v.into();
        self
    }

    /// Sets the port to listen on.
    pub fn port(mut self, v: u16) -> Self {
        self.port = v;
        self
    }

    /// Sets the name of telemetry events.
    pub fn telemetry_event(mut self, v: impl Into<String>) -> Self {
        self.telemetry_event = v.into();
        self
    }

    /// Sets the name of control events.
    pub fn control_event(mut self, v: impl Into<String>) -> Self {
        self.control_event = v.into();
        self
    }

    /// `address:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Constructs [`ServerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ServerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_server_config() -> Result<()> {
        let config = ServerConfig::default().address("127.0.0.1").port(9000);
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");

        let dir = TempDir::new("server_config")?;
        let path = dir.path().join("server_config.yaml");
        config.save(&path)?;
        assert_eq!(config, ServerConfig::load(&path)?);
        Ok(())
    }
}
