use actix_web::{web, HttpResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use log::error;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::entity::resource;
use crate::error::AppError;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/list").route(web::post().to(list)))
        .service(web::resource("/save").route(web::post().to(save)))
        .service(web::resource("/update").route(web::post().to(update)))
        .service(web::resource("/remove").route(web::post().to(remove)))
        .service(web::resource("/{id:\\d+}").route(web::post().to(get)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveResourceRequest {
    id: Option<i32>,
    title: Option<String>,
    category: Option<String>,
    cover_url: Option<String>,
    primary_link: Option<String>,
    alt_link1: Option<String>,
    alt_link2: Option<String>,
    alt_link3: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResourceRequest {
    page: Option<u64>,
    size: Option<u64>,
    search: Option<String>,
    category: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResourceResponse {
    items: Vec<ResourceDto>,
    total: u64,
    total_page: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceDto {
    id: i32,
    title: String,
    category: String,
    cover_url: String,
    primary_link: String,
    alt_link1: Option<String>,
    alt_link2: Option<String>,
    alt_link3: Option<String>,
    created: Option<String>,
}

async fn list(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<ListResourceRequest>,
) -> Result<HttpResponse, AppError> {
    let page = payload.page.unwrap_or(1).max(1);
    let size = payload.size.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * size;

    let mut cond = Condition::all();
    if let Some(search) = payload.search.clone().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim().to_lowercase());
        cond = cond.add(Expr::cust_with_values("lower(title) like ?", [pattern]));
    }
    if let Some(category) = payload.category.clone().filter(|c| !c.trim().is_empty()) {
        cond = cond.add(resource::Column::Category.eq(category));
    }

    let total = resource::Entity::find()
        .filter(cond.clone())
        .count(db.get_ref())
        .await
        .map_err(|e| {
            error!("resource count failed: {}", e);
            AppError::system_exception()
        })?;

    let rows = resource::Entity::find()
        .filter(cond)
        .order_by_desc(resource::Column::Id)
        .offset(offset)
        .limit(size)
        .all(db.get_ref())
        .await
        .map_err(|e| {
            error!("resource list failed: {}", e);
            AppError::system_exception()
        })?;

    let items = rows.into_iter().map(to_dto).collect::<Vec<_>>();
    let total_page = if total % size == 0 { total / size } else { total / size + 1 };
    let response = ListResourceResponse { items, total, total_page };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(response))))
}

async fn get(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let item = resource::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(item.map(to_dto))))
}

async fn save(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    payload: web::Json<SaveResourceRequest>,
) -> Result<HttpResponse, AppError> {
    let (title, category, primary_link) = check_required(&payload)?;
    let cover_url = trimmed(&payload.cover_url)
        .ok_or_else(|| AppError::param_error("标题、分类、封面和主链接都是必填的"))?;

    let model = resource::ActiveModel {
        title: Set(title),
        category: Set(category),
        cover_url: Set(cover_url),
        primary_link: Set(primary_link),
        alt_link1: Set(trimmed(&payload.alt_link1)),
        alt_link2: Set(trimmed(&payload.alt_link2)),
        alt_link3: Set(trimmed(&payload.alt_link3)),
        created: Set(Some(Utc::now())),
        ..Default::default()
    };

    let inserted = model.insert(db.get_ref()).await.map_err(|e| {
        error!("resource insert failed: {}", e);
        AppError::system_exception()
    })?;

    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(inserted.id))))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    payload: web::Json<SaveResourceRequest>,
) -> Result<HttpResponse, AppError> {
    let id = payload.id.ok_or_else(|| AppError::param_error("缺少资源ID"))?;
    let (title, category, primary_link) = check_required(&payload)?;

    let exist = resource::Entity::find_by_id(id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("资源不存在"))?;

    // 不传新封面时保留旧图
    let cover_url = trimmed(&payload.cover_url).unwrap_or(exist.cover_url);

    let model = resource::ActiveModel {
        id: Set(id),
        title: Set(title),
        category: Set(category),
        cover_url: Set(cover_url),
        primary_link: Set(primary_link),
        alt_link1: Set(trimmed(&payload.alt_link1)),
        alt_link2: Set(trimmed(&payload.alt_link2)),
        alt_link3: Set(trimmed(&payload.alt_link3)),
        created: Set(exist.created),
    };

    resource::Entity::update(model)
        .exec(db.get_ref())
        .await
        .map_err(|e| {
            error!("resource update failed: {}", e);
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
    // 只删数据行，封面文件留在存储里
    resource::Entity::delete_by_id(query.id)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

fn check_required(payload: &SaveResourceRequest) -> Result<(String, String, String), AppError> {
    let title = trimmed(&payload.title);
    let category = trimmed(&payload.category);
    let primary_link = trimmed(&payload.primary_link);
    match (title, category, primary_link) {
        (Some(t), Some(c), Some(l)) => Ok((t, c, l)),
        _ => Err(AppError::param_error("标题、分类、封面和主链接都是必填的")),
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn to_dto(model: resource::Model) -> ResourceDto {
    ResourceDto {
        id: model.id,
        title: model.title,
        category: model.category,
        cover_url: model.cover_url,
        primary_link: model.primary_link,
        alt_link1: model.alt_link1,
        alt_link2: model.alt_link2,
        alt_link3: model.alt_link3,
        created: model.created.map(to_rfc3339),
    }
}

fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trimmed_turns_blank_into_none() {
        assert_eq!(trimmed(&None), None);
        assert_eq!(trimmed(&Some("".to_string())), None);
        assert_eq!(trimmed(&Some("   ".to_string())), None);
        assert_eq!(
            trimmed(&Some(" https://pan.example/a ".to_string())),
            Some("https://pan.example/a".to_string())
        );
    }

    #[test]
    fn required_fields_rejected_when_missing() {
        let payload = SaveResourceRequest {
            id: None,
            title: Some("Pack A".to_string()),
            category: Some("Game".to_string()),
            cover_url: None,
            primary_link: None,
            alt_link1: None,
            alt_link2: None,
            alt_link3: None,
        };
        assert!(check_required(&payload).is_err());
    }
}
