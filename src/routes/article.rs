use actix_web::{web, HttpResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use log::error;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, Statement, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::entity::{article, comment};
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
struct SaveArticleRequest {
    id: Option<i32>,
    title: Option<String>,
    content: Option<String>,
    cover_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArticleDto {
    id: i32,
    title: String,
    content: String,
    cover_url: String,
    view_count: i32,
    created: Option<String>,
}

async fn list(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let rows = article::Entity::find()
        .order_by_desc(article::Column::Created)
        .all(db.get_ref())
        .await
        .map_err(|e| {
            error!("article list failed: {}", e);
            AppError::system_exception()
        })?;
    let list = rows.into_iter().map(to_dto).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

#[derive(Deserialize)]
struct GetQuery {
    count: Option<bool>,
}

async fn get(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    query: web::Query<GetQuery>,
) -> Result<HttpResponse, AppError> {
    let article_id = *path;
    let item = article::Entity::find_by_id(article_id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    let item = match item {
        Some(item) => item,
        None => return Ok(HttpResponse::Ok().json(ResponseDto::<ArticleDto>::success(None))),
    };

    // 计数不去重，刷新一次加一次；响应体里仍是加一前的值
    if query.count.unwrap_or(false) {
        exec_sql(
            db.get_ref(),
            "update t_article set view_count = view_count + 1 where id = ?",
            vec![article_id.into()],
        )
        .await?;
    }

    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(to_dto(item)))))
}

async fn save(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    payload: web::Json<SaveArticleRequest>,
) -> Result<HttpResponse, AppError> {
    let (title, content) = check_required(&payload)?;
    let cover_url = trimmed(&payload.cover_url)
        .ok_or_else(|| AppError::param_error("标题、内容和封面都是必填的"))?;

    let model = article::ActiveModel {
        title: Set(title),
        content: Set(content),
        cover_url: Set(cover_url),
        view_count: Set(Some(0)),
        created: Set(Some(Utc::now())),
        ..Default::default()
    };
    let inserted = model.insert(db.get_ref()).await.map_err(|e| {
        error!("article insert failed: {}", e);
        AppError::system_exception()
    })?;

    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(inserted.id))))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    _auth: AdminUser,
    payload: web::Json<SaveArticleRequest>,
) -> Result<HttpResponse, AppError> {
    let id = payload.id.ok_or_else(|| AppError::param_error("缺少文章ID"))?;
    let (title, content) = check_required(&payload)?;

    let exist = article::Entity::find_by_id(id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("文章不存在"))?;

    let cover_url = trimmed(&payload.cover_url).unwrap_or(exist.cover_url);

    let model = article::ActiveModel {
        id: Set(id),
        title: Set(title),
        content: Set(content),
        cover_url: Set(cover_url),
        view_count: Set(exist.view_count),
        created: Set(exist.created),
    };
    article::Entity::update(model)
        .exec(db.get_ref())
        .await
        .map_err(|e| {
            error!("article update failed: {}", e);
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
    let article_id = query.id;
    let exist = article::Entity::find_by_id(article_id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    if exist.is_none() {
        return Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)));
    }

    // 先清评论再删文章，避免悬空评论
    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move {
            comment::Entity::delete_many()
                .filter(comment::Column::ArticleId.eq(article_id))
                .exec(txn)
                .await
                .map_err(|_| AppError::system_exception())?;
            article::Entity::delete_by_id(article_id)
                .exec(txn)
                .await
                .map_err(|_| AppError::system_exception())?;
            Ok(())
        })
    })
    .await
    .map_err(map_tx_error)?;

    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

fn check_required(payload: &SaveArticleRequest) -> Result<(String, String), AppError> {
    let title = trimmed(&payload.title);
    let content = payload
        .content
        .clone()
        .filter(|c| !c.trim().is_empty());
    match (title, content) {
        (Some(t), Some(c)) => Ok((t, c)),
        _ => Err(AppError::param_error("标题、内容和封面都是必填的")),
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn to_dto(model: article::Model) -> ArticleDto {
    ArticleDto {
        id: model.id,
        title: model.title,
        content: model.content,
        cover_url: model.cover_url,
        view_count: model.view_count.unwrap_or(0),
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
    db.execute(stmt).await.map_err(|e| {
        error!("exec_sql failed: {} (sql={})", e, sql);
        AppError::system_exception()
    })?;
    Ok(())
}

fn map_tx_error(err: TransactionError<AppError>) -> AppError {
    match err {
        TransactionError::Connection(_) => AppError::system_exception(),
        TransactionError::Transaction(app) => app,
    }
}
