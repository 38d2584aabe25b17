use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub media_root: PathBuf,
    pub session_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is not set".to_string())?;

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| String::from("127.0.0.1:8000"))
            .parse::<SocketAddr>()
            .map_err(|e| format!("BIND_ADDR is not a valid socket address: {e}"))?;

        let media_root = PathBuf::from(env::var("MEDIA_ROOT").unwrap_or_else(|_| String::from("media")));

        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                log::warn!("SESSION_SECRET is not set, using the development default");
                String::from("secret")
            }
        };

        Ok(Self {
            database_url,
            bind_addr,
            media_root,
            session_secret,
        })
    }
}
