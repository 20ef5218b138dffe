use actix_web::{HttpResponse, Responder, get, web};
use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct LanguageInfo {
    pub name: String,
    pub extension: String,
    pub compiled: bool,
}

#[get("/languages")]
pub async fn get_languages_handler(config: web::Data<Config>) -> impl Responder {
    let languages: Vec<LanguageInfo> = config
        .languages
        .iter()
        .map(|l| LanguageInfo {
            name: l.name.clone(),
            extension: l.extension.clone(),
            compiled: l.is_compiled(),
        })
        .collect();

    HttpResponse::Ok().json(languages)
}
