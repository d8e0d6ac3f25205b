use actix_web::{web, HttpResponse, Responder};
use seek_types::TaskCatalogEntry;

/// One-time game tasks and their PP rewards.
const ONE_TIME_TASKS: &[(&str, &str, u32)] = &[
    ("FIRMWARE_UPDATE", "Complete 'Firmware Update'", 10),
    ("GOTTA_GO_PLACES", "Complete 'Gotta Go Places'", 20),
    ("RAMEN_RUSH", "Complete 'Ramen Rush'", 15),
    ("HONEY_MEAD", "Complete 'Honey Mead'", 75),
    ("FRACTURED_REALMS", "Complete 'Fractured Realms'", 100),
    ("SOLANA_LOOTBOX", "Open a Solana Lootbox", 150),
    ("HONEYCUB_LOOTBOX", "Open a Honeycub Lootbox", 125),
];

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/game/tasks").route(web::get().to(list_tasks)));
}

pub fn task_catalog() -> Vec<TaskCatalogEntry> {
    ONE_TIME_TASKS
        .iter()
        .map(|(id, title, reward)| TaskCatalogEntry {
            id: id.to_string(),
            title: title.to_string(),
            reward_pp: *reward,
            done: false,
        })
        .collect()
}

async fn list_tasks() -> impl Responder {
    HttpResponse::Ok().json(task_catalog())
}
