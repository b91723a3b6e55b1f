use std::future::Future;

use tracing::{debug, info};

use crate::fetch::FeedClient;
use crate::models::Snapshot;

/// Published export URL per feed. A feed without a URL stays empty.
#[derive(Debug, Clone, Default)]
pub struct FeedUrls {
    pub takwim: Option<String>,
    pub programs: Option<String>,
    pub pbd: Option<String>,
    pub headcount: Option<String>,
    pub teachers: Option<String>,
    pub images: Option<String>,
}

async fn optional<'u, T, F, Fut>(feed: &'static str, url: Option<&'u str>, fetch: F) -> Vec<T>
where
    F: FnOnce(&'u str) -> Fut,
    Fut: Future<Output = Vec<T>>,
{
    match url {
        Some(url) => fetch(url).await,
        None => {
            debug!(feed, "no url configured");
            Vec::new()
        }
    }
}

/// Fetch every configured feed concurrently and wait for all of them.
pub async fn load(client: &FeedClient, urls: &FeedUrls, fallback_year: i32) -> Snapshot {
    let (events, programs, assessments, headcount, teachers, images) = tokio::join!(
        optional("takwim", urls.takwim.as_deref(), |url| client
            .fetch_events(url, fallback_year)),
        optional("programs", urls.programs.as_deref(), |url| client
            .fetch_programs(url, fallback_year)),
        optional("pbd", urls.pbd.as_deref(), |url| client.fetch_assessments(url)),
        optional("headcount", urls.headcount.as_deref(), |url| client
            .fetch_headcount(url)),
        optional("teachers", urls.teachers.as_deref(), |url| client
            .fetch_teachers(url)),
        optional("images", urls.images.as_deref(), |url| client.fetch_images(url)),
    );

    info!(
        events = events.len(),
        programs = programs.len(),
        assessments = assessments.len(),
        headcount = headcount.len(),
        teachers = teachers.len(),
        images = images.len(),
        "dashboard refreshed"
    );

    Snapshot {
        events,
        programs,
        assessments,
        headcount,
        teachers,
        images,
    }
}
