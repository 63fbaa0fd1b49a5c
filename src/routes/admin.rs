use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/login").route(web::post().to(login)))
        .service(web::resource("/check").route(web::post().to(check)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    access_code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
}

async fn login(
    config: web::Data<AppConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let code = payload.access_code.clone().unwrap_or_default();
    if code.is_empty() {
        return Err(AppError::param_error("请输入访问口令"));
    }
    if code != config.access_code {
        return Err(AppError::fail("口令错误"));
    }

    let token = generate_token(&config)?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(LoginResponse { token }))))
}

async fn check(_auth: AdminUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

#[derive(Serialize)]
struct SessionClaims {
    role: String,
    sid: String,
    device: String,
    exp: usize,
}

pub(crate) fn generate_token(config: &AppConfig) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::days(365 * 100)).timestamp() as usize;
    let sid: String = (0..16)
        .map(|_| {
            let idx = rand::random::<u8>() % 26;
            (b'a' + idx) as char
        })
        .collect();
    let claims = SessionClaims {
        role: "ADMIN".to_string(),
        sid,
        device: "WEB".to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::system_exception())
}
