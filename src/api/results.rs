use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{api::election::ResultDescription, mongodb::Id};
use crate::store::Repo;
use crate::voting::results;

pub fn routes() -> Vec<Route> {
    routes![finished_results, finished_result]
}

#[get("/results/finished")]
async fn finished_results(repo: Repo) -> Result<Json<Vec<ResultDescription>>> {
    let results = results::finished_results(&*repo, Utc::now()).await?;
    Ok(Json(results.into_iter().map(Into::into).collect()))
}

#[get("/results/finished/<id>")]
async fn finished_result(id: Id, repo: Repo) -> Result<Json<ResultDescription>> {
    let result = results::finished_result(&*repo, id, Utc::now()).await?;
    Ok(Json(result.into()))
}
