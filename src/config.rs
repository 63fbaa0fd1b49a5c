use std::env;

use log::warn;

#[derive(Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_header: String,
    pub access_code: String,
    pub upload_storage_path: String,
    pub storage_type: String,
    pub s3_param: Option<String>,
    pub site_title: String,
    pub site_domain: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(38521);

        let sqlite_path = env::var("SQLITE_PATH").unwrap_or_else(|_| "/opt/panshare/data.sqlite".to_string());
        let database_url = env::var("DATABASE_URL").ok();

        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "pQ3vXk9ZmRb2tYw8LnDh".to_string());

        let token_header = env::var("TOKEN_HEADER").unwrap_or_else(|_| "token".to_string());

        let access_code = env::var("ADMIN_ACCESS_CODE").unwrap_or_else(|_| "123456".to_string());

        let upload_storage_path = env::var("UPLOAD_STORAGE_PATH")
            .unwrap_or_else(|_| "/opt/panshare/upload".to_string());
        let storage_type = env::var("STORAGE_TYPE").unwrap_or_else(|_| "LOCAL".to_string());
        let s3_param = env::var("AWSS3_PARAM").ok().filter(|v| !v.trim().is_empty());

        let site_title = env::var("SITE_TITLE").unwrap_or_else(|_| "云盘资源站".to_string());
        let site_domain = env::var("SITE_DOMAIN").unwrap_or_default();

        Self {
            server_port,
            sqlite_path,
            database_url,
            jwt_secret,
            token_header,
            access_code,
            upload_storage_path,
            storage_type,
            s3_param,
            site_title,
            site_domain,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}", path)
    }

    pub fn upload_storage_path(&self) -> String {
        self.upload_storage_path.clone()
    }

    // missing store/storage settings are reported once at startup,
    // requests fail at call time instead of refusing to boot
    pub fn warn_missing(&self) {
        if self.database_url.is_none() {
            warn!("DATABASE_URL not set, falling back to sqlite at {}", self.sqlite_path);
        }
        if self.storage_type == "AWSS3" && self.s3_param.is_none() {
            warn!("STORAGE_TYPE is AWSS3 but AWSS3_PARAM is not set, uploads will fail");
        }
        if self.site_domain.is_empty() {
            warn!("SITE_DOMAIN not set, rss links will be relative");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    // from_env tests mutate process env, keep them serial
    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(Mutex::default);

    #[test]
    fn defaults_when_env_empty() {
        let _lock = ENV_LOCK.lock().unwrap();
        env::remove_var("SERVER_PORT");
        env::remove_var("DATABASE_URL");
        env::remove_var("ADMIN_ACCESS_CODE");
        env::remove_var("STORAGE_TYPE");

        let config = AppConfig::from_env();
        assert_eq!(config.server_port, 38521);
        assert_eq!(config.access_code, "123456");
        assert_eq!(config.storage_type, "LOCAL");
        assert!(config.database_url().starts_with("sqlite://"));
    }

    #[test]
    fn database_url_prefers_explicit_value() {
        let _lock = ENV_LOCK.lock().unwrap();
        env::set_var("DATABASE_URL", "mysql://root@localhost/panshare");
        let config = AppConfig::from_env();
        assert_eq!(config.database_url(), "mysql://root@localhost/panshare");
        env::remove_var("DATABASE_URL");
    }
}
