use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use futures_util::StreamExt;
use log::error;
use md5::{Digest, Md5};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::auth::AdminUser;
use crate::config::AppConfig;
use crate::entity::upload;
use crate::error::AppError;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/upload").route(web::post().to(upload_files)))
        .service(web::resource("/{key}").route(web::get().to(get_object)));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    key: String,
    url: String,
    file_type: String,
    file_name: String,
    size: i64,
}

async fn upload_files(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    _auth: AdminUser,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let storage_type = config.storage_type.clone();
    let mut responses = Vec::new();

    loop {
        let item = payload.next().await;
        let item = match item {
            Some(item) => item,
            None => break,
        };
        let mut field = match item {
            Ok(field) => field,
            Err(_) => return Err(AppError::fail("上传文件异常")),
        };
        let filename = field
            .content_disposition()
            .get_filename()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "file".to_string());

        // 键名 = 上传毫秒 + 原始文件名，同毫秒同名会覆盖
        let key = build_object_key(Utc::now().timestamp_millis(), &filename);
        let target_path = PathBuf::from(config.upload_storage_path()).join(&key);

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|_| AppError::fail("上传文件异常"))?;
        }

        let mut f = fs::File::create(&target_path).map_err(|_| AppError::fail("上传文件异常"))?;
        let mut hasher = Md5::new();
        let mut size: u64 = 0;

        loop {
            let chunk = field.next().await;
            let chunk = match chunk {
                Some(chunk) => chunk,
                None => break,
            };
            let data = match chunk {
                Ok(data) => data,
                Err(_) => return Err(AppError::fail("上传文件异常")),
            };
            size += data.len() as u64;
            hasher.update(&data);
            f.write_all(&data).map_err(|_| AppError::fail("上传文件异常"))?;
        }

        let file_hash = format!("{:x}", hasher.finalize());
        let suffix = Path::new(&filename)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let file_type = detect_file_type(&target_path, &suffix);

        let (url, storage) = match storage_type.as_str() {
            "AWSS3" => {
                let param = config.s3_param.clone().unwrap_or_default();
                let url = match upload_awss3(&param, &target_path, &key, &file_type).await {
                    Ok(url) => url,
                    Err(err) => {
                        let _ = fs::remove_file(&target_path);
                        return Err(err);
                    }
                };
                (url, "AWSS3".to_string())
            }
            _ => (format!("/api/storage/{}", key), "LOCAL".to_string()),
        };

        let now = Utc::now();
        let upload_model = upload::ActiveModel {
            key: Set(key.clone()),
            file_name: Set(filename.clone()),
            file_type: Set(file_type.clone()),
            size: Set(size as i64),
            file_hash: Set(file_hash),
            storage_type: Set(Some(storage.clone())),
            internal_path: Set(Some(target_path.to_string_lossy().to_string())),
            external_link: Set(Some(url.clone())),
            created: Set(Some(now)),
        };
        upload_model.insert(db.get_ref()).await.map_err(|e| {
            error!("upload insert failed: {}", e);
            AppError::system_exception()
        })?;

        if storage != "LOCAL" {
            let _ = fs::remove_file(&target_path);
        }

        responses.push(UploadResponse {
            key,
            url,
            file_type,
            file_name: filename,
            size: size as i64,
        });
    }

    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(responses))))
}

async fn get_object(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let key = path.into_inner();
    let item = upload::Entity::find_by_id(key)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    let item = match item {
        Some(item) => item,
        None => return Err(AppError::fail("文件不存在")),
    };

    let storage_type = item.storage_type.as_deref().unwrap_or("LOCAL");
    if storage_type == "LOCAL" {
        let file_path = item.internal_path.unwrap_or_default();
        let data = fs::read(&file_path).map_err(|_| AppError::fail("读取文件异常"))?;
        Ok(HttpResponse::Ok().content_type(item.file_type).body(data))
    } else {
        let url = item.external_link.unwrap_or_default();
        Ok(HttpResponse::Found()
            .append_header(("Location", url))
            .finish())
    }
}

fn build_object_key(millis: i64, filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let safe: String = base
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}-{}", millis, safe)
}

fn detect_file_type(path: &Path, suffix: &str) -> String {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return kind.mime_type().to_string();
    }
    if !suffix.is_empty() {
        return format!("image/{}", suffix);
    }
    "application/octet-stream".to_string()
}

async fn upload_awss3(
    param: &str,
    file_path: &Path,
    key: &str,
    content_type: &str,
) -> Result<String, AppError> {
    let json: Value = serde_json::from_str(param).map_err(|_| AppError::fail("存储参数没有配置"))?;
    let access_key = json.get("accessKey").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let secret_key = json.get("secretKey").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let bucket = json.get("bucket").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let domain = json.get("domain").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let prefix = json.get("prefix").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let region = json.get("region").and_then(|v| v.as_str()).unwrap_or("").to_string();

    if access_key.is_empty() || secret_key.is_empty() || bucket.is_empty() || region.is_empty() {
        return Err(AppError::fail("存储参数没有配置"));
    }

    let object_key = if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    };

    let region_provider = RegionProviderChain::first_try(Region::new(region.clone()));
    let creds = aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "static");
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region_provider)
        .credentials_provider(creds)
        .load()
        .await;

    let client = S3Client::new(&aws_config);
    let data = tokio::fs::read(file_path)
        .await
        .map_err(|_| AppError::fail("上传资源失败"))?;

    client
        .put_object()
        .bucket(&bucket)
        .key(&object_key)
        .acl(ObjectCannedAcl::PublicRead)
        .content_type(content_type)
        .body(ByteStream::from(data))
        .send()
        .await
        .map_err(|_| AppError::fail("上传资源失败"))?;

    let url = if !domain.is_empty() {
        format!("{}/{}", domain.trim_end_matches('/'), object_key)
    } else {
        format!("https://s3.{}.amazonaws.com/{}/{}", region, bucket, object_key)
    };

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_keeps_millis_and_name() {
        assert_eq!(build_object_key(1723100000000, "cover.png"), "1723100000000-cover.png");
    }

    #[test]
    fn object_key_strips_path_and_spaces() {
        assert_eq!(
            build_object_key(1, "dir/my cover.png"),
            "1-my_cover.png"
        );
    }
}
