use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub media_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub token_days: i64,
}

impl Config {
    /// Read `ARCHIVO_*` variables from the environment (and `.env`, loaded
    /// by the caller).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("ARCHIVO_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ARCHIVO_JWT_SECRET is unset or still a placeholder");
        }

        let port: u16 = get("ARCHIVO_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("ARCHIVO_PORT must be a port number")?;
        let max_upload_mb: usize = get("ARCHIVO_MAX_UPLOAD_MB")
            .unwrap_or_else(|| "100".into())
            .parse()
            .context("ARCHIVO_MAX_UPLOAD_MB must be a whole number")?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .context("ARCHIVO_MAX_UPLOAD_MB is too large")?;
        let token_days: i64 = get("ARCHIVO_TOKEN_DAYS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("ARCHIVO_TOKEN_DAYS must be a whole number")?;

        Ok(Self {
            jwt_secret,
            db_path: get("ARCHIVO_DB_PATH").unwrap_or_else(|| "archivo.db".into()).into(),
            host: get("ARCHIVO_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            media_dir: get("ARCHIVO_MEDIA_DIR").unwrap_or_else(|| "./media".into()).into(),
            static_dir: get("ARCHIVO_STATIC_DIR").filter(|d| !d.is_empty()).map(PathBuf::from),
            max_upload_bytes,
            token_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("ARCHIVO_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("archivo.db"));
        assert_eq!(cfg.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(cfg.token_days, 30);
        assert!(cfg.static_dir.is_none());
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("ARCHIVO_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_port_is_refused() {
        assert!(config(&[("ARCHIVO_JWT_SECRET", "s3cret"), ("ARCHIVO_PORT", "http")]).is_err());
    }

    #[test]
    fn oversized_upload_limit_is_refused() {
        let huge = usize::MAX.to_string();
        let err = config(&[("ARCHIVO_JWT_SECRET", "s3cret"), ("ARCHIVO_MAX_UPLOAD_MB", &huge)])
            .err()
            .expect("limit should overflow");
        assert!(format!("{:#}", err).contains("ARCHIVO_MAX_UPLOAD_MB"));
    }
}
