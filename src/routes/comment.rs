use actix_web::{web, HttpResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use log::error;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, Statement,
};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::entity::{article, comment};
use crate::error::AppError;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/add").route(web::post().to(add)))
        .service(web::resource("/list").route(web::post().to(list)))
        .service(web::resource("/pending").route(web::post().to(pending)))
        .service(web::resource("/approve").route(web::post().to(approve)))
        .service(web::resource("/remove").route(web::post().to(remove)));
}

const DEFAULT_NICKNAME: &str = "匿名绅士";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveCommentRequest {
    article_id: i32,
    nickname: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryCommentListRequest {
    article_id: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentDto {
    id: i32,
    article_id: i32,
    nickname: String,
    content: String,
    approved: i32,
    created: Option<String>,
}

async fn add(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<SaveCommentRequest>,
) -> Result<HttpResponse, AppError> {
    let content = payload
        .content
        .clone()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::param_error("写点什么再发吧"))?;

    article::Entity::find_by_id(payload.article_id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("文章不存在"))?;

    let nickname = payload
        .nickname
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NICKNAME)
        .to_string();

    // 公开提交一律未审核，审核字段不收前端的
    let model = comment::ActiveModel {
        article_id: Set(payload.article_id),
        nickname: Set(nickname),
        content: Set(content),
        approved: Set(Some(0)),
        created: Set(Some(Utc::now())),
        ..Default::default()
    };
    model.insert(db.get_ref()).await.map_err(|e| {
        error!("comment insert failed: {}", e);
        AppError::system_exception()
    })?;

    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

async fn list(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<QueryCommentListRequest>,
) -> Result<HttpResponse, AppError> {
    let rows = comment::Entity::find()
        .filter(comment::Column::ArticleId.eq(payload.article_id))
        .filter(comment::Column::Approved.eq(1))
        .order_by_desc(comment::Column::Created)
        .all(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    let list = rows.into_iter().map(to_dto).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn pending(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
) -> Result<HttpResponse, AppError> {
    let rows = comment::Entity::find()
        .filter(comment::Column::Approved.eq(0))
        .order_by_desc(comment::Column::Created)
        .all(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    let list = rows.into_iter().map(to_dto).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

#[derive(Deserialize)]
struct ApproveQuery {
    id: i32,
}

async fn approve(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    query: web::Query<ApproveQuery>,
) -> Result<HttpResponse, AppError> {
    exec_sql(
        db.get_ref(),
        "update t_comment set approved = 1 where id = ?",
        vec![query.id.into()],
    )
    .await?;
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    query: web::Query<ApproveQuery>,
) -> Result<HttpResponse, AppError> {
    comment::Entity::delete_by_id(query.id)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

fn to_dto(model: comment::Model) -> CommentDto {
    CommentDto {
        id: model.id,
        article_id: model.article_id,
        nickname: model.nickname,
        content: model.content,
        approved: model.approved.unwrap_or(0),
        created: model.created.map(to_rfc3339),
    }
}

fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

async fn exec_sql<C: ConnectionTrait>(
    db: &C,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> Result<(), AppError> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_sql_and_values(backend, sql, values);
    db.execute(stmt)
        .await
        .map_err(|_| AppError::system_exception())?;
    Ok(())
}
