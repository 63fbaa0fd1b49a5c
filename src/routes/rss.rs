use actix_web::{web, HttpResponse};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect};

use crate::config::AppConfig;
use crate::entity::article;
use crate::error::AppError;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::get().to(get_rss)));
}

async fn get_rss(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let rows = article::Entity::find()
        .order_by_desc(article::Column::Created)
        .limit(20)
        .all(db.get_ref())
        .await
        .unwrap_or_default();

    let domain = config.site_domain.trim_end_matches('/').to_string();
    let items = rows
        .into_iter()
        .map(|a| {
            let link = format!("{}/blog/{}", domain, a.id);
            let guid = GuidBuilder::default().value(link.clone()).permalink(true).build();
            let mut builder = ItemBuilder::default();
            builder.title(Some(a.title));
            builder.link(Some(link));
            builder.guid(Some(guid));
            builder.description(Some(a.content));
            if let Some(created) = a.created {
                builder.pub_date(Some(created.to_rfc2822()));
            }
            builder.build()
        })
        .collect::<Vec<_>>();

    let channel = ChannelBuilder::default()
        .title(config.site_title.clone())
        .link(domain)
        .description(config.site_title.clone())
        .items(items)
        .build();

    Ok(HttpResponse::Ok()
        .content_type("application/rss+xml; charset=utf-8")
        .body(channel.to_string()))
}
