//! CLI entry point.
//!
//! # Responsibility
//! - Provide a smoke probe for `circle_core` linkage.
//! - Run a bulk contact sync or print match suggestions for one owner.
//!
//! Environment:
//! - `CIRCLE_ACCESS_TOKEN`: OAuth bearer token for `bulk-sync`.
//! - `CIRCLE_LOG_DIR`: absolute directory for rolling log files (optional).
//! - `CIRCLE_PEOPLE_API_BASE_URL`, `CIRCLE_PEOPLE_PAGE_SIZE`, `CIRCLE_PHOTO_DIR`.

use circle_core::{
    open_db, CoreConfig, FsPhotoStore, MatchService, PeopleApiClient,
    SqliteContactCacheRepository, SqliteFriendRepository, SyncService,
};
use log::error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const USAGE: &str = "usage: circle_cli <ping | bulk-sync <db> <owner> | suggest <db> <owner>>";

#[tokio::main]
async fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("CIRCLE_LOG_DIR") {
        if let Err(err) = circle_core::init_logging(circle_core::default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] | ["ping"] => {
            println!("circle_core ping={}", circle_core::ping());
            println!("circle_core version={}", circle_core::core_version());
            Ok(())
        }
        ["bulk-sync", db, owner] => bulk_sync(Path::new(db), owner).await,
        ["suggest", db, owner] => suggest(Path::new(db), owner),
        _ => Err(USAGE.to_string()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn bulk_sync(db_path: &Path, owner_id: &str) -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    let token = std::env::var("CIRCLE_ACCESS_TOKEN")
        .map_err(|_| "CIRCLE_ACCESS_TOKEN is not set".to_string())?;
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let directory =
        PeopleApiClient::new(&config.people_api, token).map_err(|err| err.to_string())?;
    let photo_dir = config
        .photo_dir
        .clone()
        .unwrap_or_else(|| default_photo_dir(db_path));
    let photos = FsPhotoStore::new(photo_dir).map_err(|err| err.to_string())?;

    let service = SyncService::new(&conn, directory, photos);
    let report = service.bulk_sync(owner_id).await;
    println!("synced={} pages={}", report.synced_count, report.pages);
    for entry in &report.errors {
        println!(
            "error external_id={} code={} message={}",
            entry.external_id.as_deref().unwrap_or("-"),
            entry.code,
            entry.message
        );
    }
    if report.is_clean() {
        Ok(())
    } else {
        error!(
            "event=cli_bulk_sync module=cli status=error errors={}",
            report.errors.len()
        );
        Err(format!("bulk sync finished with {} error(s)", report.errors.len()))
    }
}

fn suggest(db_path: &Path, owner_id: &str) -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let service = MatchService::new(
        SqliteFriendRepository::new(&conn),
        SqliteContactCacheRepository::new(&conn),
    )
    .with_config(&config.matching);

    let suggestions = service
        .find_suggested_matches(owner_id)
        .map_err(|err| err.to_string())?;
    for suggestion in &suggestions {
        println!(
            "{:.2}\t{}\t{}\t{}\t{}",
            suggestion.confidence,
            suggestion.external_id,
            suggestion.friend_id,
            suggestion.friend_name,
            suggestion.reasons.join(", ")
        );
    }
    println!("suggestions={}", suggestions.len());
    Ok(())
}

fn default_photo_dir(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map(|parent| parent.join("photos"))
        .unwrap_or_else(|| PathBuf::from("photos"))
}
