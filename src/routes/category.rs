use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::entity::category;
use crate::error::AppError;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/list").route(web::post().to(list)))
        .service(web::resource("/save").route(web::post().to(save)))
        .service(web::resource("/remove").route(web::post().to(remove)));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryDto {
    id: i32,
    name: String,
}

#[derive(Deserialize)]
struct SaveCategoryRequest {
    name: Option<String>,
}

#[derive(Deserialize)]
struct RemoveQuery {
    id: i32,
}

async fn list(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let rows = category::Entity::find()
        .order_by_asc(category::Column::Id)
        .all(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    let list = rows
        .into_iter()
        .map(|c| CategoryDto { id: c.id, name: c.name })
        .collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn save(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    payload: web::Json<SaveCategoryRequest>,
) -> Result<HttpResponse, AppError> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::param_error("分类名称不能为空"))?;

    let exist = category::Entity::find()
        .filter(category::Column::Name.eq(name.clone()))
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    if exist.is_some() {
        return Err(AppError::fail("分类已存在"));
    }

    let model = category::ActiveModel {
        name: Set(name),
        created: Set(Some(Utc::now())),
        ..Default::default()
    };
    let inserted = model
        .insert(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(inserted.id))))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    query: web::Query<RemoveQuery>,
) -> Result<HttpResponse, AppError> {
    // 引用该分类名的资源不动，名字悬空也允许
    category::Entity::delete_by_id(query.id)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}
