//! Bulk seeding of fake todos, posts and users.
//!
//! Records are created concurrently in fixed-size batches; each batch is
//! awaited in full before the next starts, which bounds the number of
//! in-flight requests. A batch with failures stops the run after logging
//! every failed item; earlier batches stay written.

use std::future::Future;
use std::ops::Range;
use std::path::Path;

use fake::{
    faker::{
        company::en::{Bs, BsAdj, BsNoun, BsVerb, CatchPhrase, Industry},
        lorem::en::{Paragraph, Paragraphs, Sentence, Sentences, Words},
        name::en::FirstName,
    },
    Fake,
};
use futures::future::join_all;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::Value;
use thiserror::Error;

use crate::{
    collections::{POSTS, TODOS, USERS},
    error::ClientError,
    model::{NewPost, NewTodo, User},
    pocketbase::PocketBase,
};

pub const TODO_COUNT: usize = 1000;
pub const POST_COUNT: usize = 500;
pub const BATCH_SIZE: usize = 100;
pub const DEFAULT_OWNER_EMAIL: &str = "user@user.com";
const NAME_MAX_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub batches: usize,
    pub created: usize,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("batch {batch} had {failed} failed item(s)")]
    BatchFailed {
        batch: usize,
        failed: usize,
        report: SeedReport,
    },
    #[error("user with email \"{0}\" not found; create this user first in the admin panel")]
    UserNotFound(String),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Create `total` items, `batch_size` at a time.
pub async fn seed_in_batches<T, M, F, Fut>(
    total: usize,
    batch_size: usize,
    mut make: M,
    create: F,
) -> Result<SeedReport, SeedError>
where
    M: FnMut() -> T,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), ClientError>>,
{
    let batch_size = batch_size.max(1);
    let mut report = SeedReport::default();
    let mut done = 0;

    while done < total {
        let size = batch_size.min(total - done);
        let items: Vec<T> = (0..size).map(|_| make()).collect();
        let results = join_all(items.into_iter().map(&create)).await;
        report.batches += 1;

        let mut failed = 0;
        for (offset, result) in results.into_iter().enumerate() {
            match result {
                Ok(()) => report.created += 1,
                Err(err) => {
                    failed += 1;
                    tracing::warn!(item = done + offset, error = %err, "seed item failed");
                }
            }
        }
        if failed > 0 {
            return Err(SeedError::BatchFailed {
                batch: report.batches,
                failed,
                report,
            });
        }

        done += size;
        tracing::info!(created = done, total, "batch complete");
    }
    Ok(report)
}

pub async fn seed_todos(pb: &PocketBase, user_id: &str, total: usize, batch_size: usize) -> Result<SeedReport, SeedError> {
    tracing::info!(total, "generating todos");
    let mut rng = StdRng::from_rng(&mut rand::rng());
    let report = seed_in_batches(
        total,
        batch_size,
        || generate_todo(&mut rng, user_id),
        |todo| async move { pb.collection(TODOS).create::<Value, _>(&todo).await.map(|_| ()) },
    )
    .await?;
    tracing::info!(created = report.created, "all todos created");
    Ok(report)
}

pub async fn seed_posts(pb: &PocketBase, total: usize, batch_size: usize) -> Result<SeedReport, SeedError> {
    tracing::info!(total, "generating posts");
    let mut rng = StdRng::from_rng(&mut rand::rng());
    let report = seed_in_batches(
        total,
        batch_size,
        || generate_post(&mut rng),
        |post| async move { pb.collection(POSTS).create::<Value, _>(&post).await.map(|_| ()) },
    )
    .await?;
    tracing::info!(created = report.created, "all posts created");
    Ok(report)
}

/// Delete every record of `collection`, one call per record.
pub async fn clear_collection(pb: &PocketBase, collection: &str) -> Result<usize, ClientError> {
    let records: Vec<Value> = pb.collection(collection).full_list(None, None).await?;
    let service = pb.collection(collection);
    for record in &records {
        if let Some(id) = record["id"].as_str() {
            service.delete(id).await?;
        }
    }
    tracing::info!(collection, deleted = records.len(), "collection cleared");
    Ok(records.len())
}

pub async fn find_user_id(pb: &PocketBase, email: &str) -> Result<String, SeedError> {
    let filter = format!("email = \"{}\"", email.replace('\\', "\\\\").replace('"', "\\\""));
    match pb.collection(USERS).first_list_item::<User>(&filter).await {
        Ok(user) => {
            tracing::info!(email = %user.email, "using user");
            Ok(user.id)
        }
        Err(err) if err.is_not_found() => Err(SeedError::UserNotFound(email.to_string())),
        Err(err) => Err(err.into()),
    }
}

pub fn load_seed_users(path: &Path) -> Result<Vec<Value>, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserSeedReport {
    pub created: usize,
    pub failed: usize,
}

/// Create each user in turn; failures are logged and counted, not fatal.
pub async fn seed_users(pb: &PocketBase, users: &[Value]) -> UserSeedReport {
    let mut report = UserSeedReport::default();
    for user in users {
        let email = user["email"].as_str().unwrap_or("<no email>");
        match pb.collection(USERS).create::<Value, _>(user).await {
            Ok(_) => {
                report.created += 1;
                tracing::info!(email, "created user");
            }
            Err(err) => {
                report.failed += 1;
                tracing::warn!(email, error = %err, "failed to create user");
            }
        }
    }
    report
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn paragraphs<R: Rng + ?Sized>(rng: &mut R, count: Range<usize>) -> String {
    let paragraphs: Vec<String> = Paragraphs(count).fake_with_rng(rng);
    paragraphs.join("\n\n")
}

/// Random todo owned by `user_id`, name clipped to the collection limit.
pub fn generate_todo<R: Rng + ?Sized>(rng: &mut R, user_id: &str) -> NewTodo {
    let (name, description): (String, String) = match rng.random_range(0..5) {
        0 => {
            let verb: String = BsVerb().fake_with_rng(rng);
            let noun: String = BsNoun().fake_with_rng(rng);
            let pitch: String = Bs().fake_with_rng(rng);
            (format!("{verb} {noun}"), capitalize(&pitch))
        }
        1 => {
            let items: Vec<String> = Words(1..3).fake_with_rng(rng);
            (format!("Buy {}", items.join(" ")), Sentence(6..12).fake_with_rng(rng))
        }
        2 => (CatchPhrase().fake_with_rng(rng), Sentence(4..10).fake_with_rng(rng)),
        3 => {
            let topic: String = Bs().fake_with_rng(rng);
            let notes: Vec<String> = Sentences(2..3).fake_with_rng(rng);
            (format!("Meeting: {topic}"), notes.join(" "))
        }
        _ => {
            let who: String = FirstName().fake_with_rng(rng);
            (format!("Call {who}"), Paragraph(3..6).fake_with_rng(rng))
        }
    };

    NewTodo {
        name: truncate_chars(&name, NAME_MAX_CHARS),
        description: Some(description),
        completed: rng.random_bool(0.3),
        user: user_id.to_string(),
    }
}

pub fn generate_post<R: Rng + ?Sized>(rng: &mut R) -> NewPost {
    let (title, content): (String, String) = match rng.random_range(0..4) {
        0 => (CatchPhrase().fake_with_rng(rng), paragraphs(rng, 3..11)),
        1 => {
            let verb: String = BsVerb().fake_with_rng(rng);
            let noun: String = BsNoun().fake_with_rng(rng);
            let intro: String = Paragraph(3..6).fake_with_rng(rng);
            let outro: String = Paragraph(3..6).fake_with_rng(rng);
            let content = format!(
                "# Introduction\n\n{intro}\n\n## Key Points\n\n{}\n\n## Conclusion\n\n{outro}",
                paragraphs(rng, 3..4)
            );
            (format!("How to {verb} {noun}"), content)
        }
        2 => {
            let pitch: String = Bs().fake_with_rng(rng);
            (capitalize(&pitch), paragraphs(rng, 5..16))
        }
        _ => {
            let adjective: String = BsAdj().fake_with_rng(rng);
            let industry: String = Industry().fake_with_rng(rng);
            let year = rng.random_range(2020..=2025);
            let lead: String = Paragraph(3..6).fake_with_rng(rng);
            let content = format!("{lead}\n\n{}", paragraphs(rng, 4..5));
            (format!("{} {industry} in {year}", capitalize(&adjective)), content)
        }
    };

    NewPost {
        title,
        content,
        published: rng.random_bool(0.8),
        description: None,
    }
}

#[cfg(test)]
#[path = "seed_test.rs"]
mod tests;
