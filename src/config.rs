#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub frontend_url: String,
    pub upload_dir: String,
    pub public_url: String,
}

impl Config {
    /// Reads the environment. Required variables panic with a message,
    /// the rest fall back to local development defaults.
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");

        let jwt_maxage = env_or("JWT_MAXAGE", "86400")
            .parse::<i64>()
            .expect("JWT_MAXAGE must be a number of seconds");
        let port = env_or("PORT", "8000")
            .parse::<u16>()
            .expect("PORT must be a valid port number");
        let frontend_url = env_or("FRONTEND_URL", "http://localhost:3000");
        let upload_dir = env_or("UPLOAD_DIR", "./uploads");
        let public_url = std::env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        Config {
            database_url,
            jwt_secret,
            jwt_maxage,
            port,
            frontend_url,
            upload_dir,
            public_url,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
