
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App, Error};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::config::AppConfig;
use crate::db;
use crate::response::json_error_handler;
use crate::routes::{admin, article, banner, category, comment, resource, storage};

// 内存库只允许一个连接，多连接会各拿一份空库
pub(crate) async fn test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_owned());
    opts.max_connections(1);
    let db = Database::connect(opts).await.unwrap();
    db::init_sqlite_schema(&db).await;
    db
}

pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        server_port: 0,
        sqlite_path: ":memory:".to_string(),
        database_url: None,
        jwt_secret: "test-secret".to_string(),
        token_header: "token".to_string(),
        access_code: "123456".to_string(),
        upload_storage_path: std::env::temp_dir()
            .join("panshare-test-upload")
            .to_string_lossy()
            .to_string(),
        storage_type: "LOCAL".to_string(),
        s3_param: None,
        site_title: "测试站".to_string(),
        site_domain: "http://localhost".to_string(),
    }
}

pub(crate) fn build_app(
    db: DatabaseConnection,
    config: AppConfig,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(config))
        .app_data(web::Data::new(db))
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(
            web::scope("/api")
                .service(web::scope("/admin").configure(admin::config))
                .service(web::scope("/resource").configure(resource::config))
                .service(web::scope("/category").configure(category::config))
                .service(web::scope("/article").configure(article::config))
                .service(web::scope("/comment").configure(comment::config))
                .service(web::scope("/banner").configure(banner::config))
                .service(web::scope("/storage").configure(storage::config)),
        )
}

pub(crate) fn admin_token(config: &AppConfig) -> String {
    admin::generate_token(config).unwrap()
}
