use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::error;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::entity::banner;
use crate::error::AppError;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/list").route(web::post().to(list)))
        .service(web::resource("/save").route(web::post().to(save)))
        .service(web::resource("/update").route(web::post().to(update)))
        .service(web::resource("/remove").route(web::post().to(remove)));
}

const KIND_LINK: &str = "link";
const KIND_DIALOG: &str = "dialog";
const KIND_RESOURCE: &str = "resource";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveBannerRequest {
    id: Option<i32>,
    title: Option<String>,
    image_url: Option<String>,
    kind: Option<String>,
    link_url: Option<String>,
    dialog_html: Option<String>,
    resource_id: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BannerDto {
    id: i32,
    title: String,
    image_url: String,
    kind: String,
    link_url: Option<String>,
    dialog_html: Option<String>,
    resource_id: Option<i32>,
}

async fn list(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let rows = banner::Entity::find()
        .order_by_desc(banner::Column::Id)
        .all(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    let list = rows.into_iter().map(to_dto).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn save(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    payload: web::Json<SaveBannerRequest>,
) -> Result<HttpResponse, AppError> {
    let title = trimmed(&payload.title).ok_or_else(|| AppError::param_error("标题和图片都是必填的"))?;
    let image_url =
        trimmed(&payload.image_url).ok_or_else(|| AppError::param_error("标题和图片都是必填的"))?;
    let kind = trimmed(&payload.kind).unwrap_or_else(|| KIND_LINK.to_string());
    let (link_url, dialog_html, resource_id) = normalize_payload(
        &kind,
        trimmed(&payload.link_url),
        trimmed(&payload.dialog_html),
        payload.resource_id,
    )?;

    let model = banner::ActiveModel {
        title: Set(title),
        image_url: Set(image_url),
        kind: Set(kind),
        link_url: Set(link_url),
        dialog_html: Set(dialog_html),
        resource_id: Set(resource_id),
        created: Set(Some(Utc::now())),
        ..Default::default()
    };
    let inserted = model.insert(db.get_ref()).await.map_err(|e| {
        error!("banner insert failed: {}", e);
        AppError::system_exception()
    })?;

    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(inserted.id))))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    payload: web::Json<SaveBannerRequest>,
) -> Result<HttpResponse, AppError> {
    let id = payload.id.ok_or_else(|| AppError::param_error("缺少bannerID"))?;
    let exist = banner::Entity::find_by_id(id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("banner不存在"))?;

    let title = trimmed(&payload.title).unwrap_or(exist.title);
    let image_url = trimmed(&payload.image_url).unwrap_or(exist.image_url);
    let kind = trimmed(&payload.kind).unwrap_or(exist.kind);
    let (link_url, dialog_html, resource_id) = normalize_payload(
        &kind,
        trimmed(&payload.link_url),
        trimmed(&payload.dialog_html),
        payload.resource_id,
    )?;

    let model = banner::ActiveModel {
        id: Set(id),
        title: Set(title),
        image_url: Set(image_url),
        kind: Set(kind),
        link_url: Set(link_url),
        dialog_html: Set(dialog_html),
        resource_id: Set(resource_id),
        created: Set(exist.created),
    };
    banner::Entity::update(model)
        .exec(db.get_ref())
        .await
        .map_err(|e| {
            error!("banner update failed: {}", e);
            AppError::system_exception()
        })?;

    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

#[derive(Deserialize)]
struct RemoveQuery {
    id: i32,
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    query: web::Query<RemoveQuery>,
) -> Result<HttpResponse, AppError> {
    banner::Entity::delete_by_id(query.id)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

// 表单里没激活的那两个负载字段可能还留着旧值，落库前统一置空
fn normalize_payload(
    kind: &str,
    link_url: Option<String>,
    dialog_html: Option<String>,
    resource_id: Option<i32>,
) -> Result<(Option<String>, Option<String>, Option<i32>), AppError> {
    match kind {
        KIND_LINK => {
            let url = link_url.ok_or_else(|| AppError::param_error("跳转链接不能为空"))?;
            Ok((Some(url), None, None))
        }
        KIND_DIALOG => {
            let html = dialog_html.ok_or_else(|| AppError::param_error("公告内容不能为空"))?;
            Ok((None, Some(html), None))
        }
        KIND_RESOURCE => {
            let id = resource_id.ok_or_else(|| AppError::param_error("请选择关联资源"))?;
            Ok((None, None, Some(id)))
        }
        _ => Err(AppError::param_error("未知的banner类型")),
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn to_dto(model: banner::Model) -> BannerDto {
    BannerDto {
        id: model.id,
        title: model.title,
        image_url: model.image_url,
        kind: model.kind,
        link_url: model.link_url,
        dialog_html: model.dialog_html,
        resource_id: model.resource_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_payload_fields_are_cleared() {
        let (link, html, res) = normalize_payload(
            KIND_DIALOG,
            Some("https://example.com".to_string()),
            Some("<p>新年活动</p>".to_string()),
            Some(7),
        )
        .unwrap();
        assert_eq!(link, None);
        assert_eq!(html.as_deref(), Some("<p>新年活动</p>"));
        assert_eq!(res, None);
    }

    #[test]
    fn active_payload_is_required() {
        assert!(normalize_payload(KIND_LINK, None, Some("x".to_string()), Some(1)).is_err());
        assert!(normalize_payload(KIND_RESOURCE, None, None, None).is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(normalize_payload("popup", None, None, None).is_err());
    }
}
