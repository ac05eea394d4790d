use dotenvy::dotenv;
use std::env;
use std::fs;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// PEM-encoded RSA public key used to validate access tokens issued by
    /// the identity collaborator.
    pub jwt_public_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        // Inline PEM wins; a path is the deployment-friendly alternative.
        let jwt_public_key = match env::var("JWT_PUBLIC_KEY") {
            Ok(pem) => pem,
            Err(_) => {
                let path = env::var("JWT_PUBLIC_KEY_PATH").map_err(|_| {
                    crate::error::AppError::Config(
                        "JWT_PUBLIC_KEY or JWT_PUBLIC_KEY_PATH missing".into(),
                    )
                })?;
                fs::read_to_string(&path).map_err(|e| {
                    crate::error::AppError::Config(format!("read JWT_PUBLIC_KEY_PATH {path}: {e}"))
                })?
            }
        };

        Ok(Self {
            database_url,
            port,
            jwt_public_key,
        })
    }
}
