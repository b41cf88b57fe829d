//! Interactive seeding of fake todos and posts.
//!
//! Prompts for superuser credentials, optionally pushes the collection schema
//! and clears existing records, then fills the todo list of one user and the
//! blog.

use std::time::Instant;

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use todo_blog::{
    collections::{POSTS, TODOS},
    config::Config,
    migrations::{self, Migrator, SchemaState},
    pocketbase::PocketBase,
    seed::{self, SeedError, BATCH_SIZE, DEFAULT_OWNER_EMAIL, POST_COUNT, TODO_COUNT},
};

type Input = Lines<BufReader<Stdin>>;

async fn prompt(input: &mut Input, question: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await?.unwrap_or_default().trim().to_string())
}

fn is_yes(answer: &str) -> bool {
    answer.eq_ignore_ascii_case("y")
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("could not read input: {0}")]
    Input(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] todo_blog::error::AppError),
    #[error("authentication failed, check the superuser credentials: {0}")]
    Auth(todo_blog::error::ClientError),
    #[error("schema migration failed: {0}")]
    Migration(#[from] migrations::MigrationError),
    #[error(transparent)]
    Client(#[from] todo_blog::error::ClientError),
    #[error(transparent)]
    Seed(#[from] SeedError),
}

async fn run() -> Result<(), RunError> {
    let config = Config::from_env()?;
    let mut input = BufReader::new(io::stdin()).lines();

    tracing::info!(backend = %config.public_url, todos = TODO_COUNT, posts = POST_COUNT, "seeding");

    let email = prompt(&mut input, "Superuser email: ").await?;
    let password = prompt(&mut input, "Superuser password: ").await?;

    let pb = PocketBase::new(&config.public_url);
    pb.superuser_auth(&email, &password).await.map_err(RunError::Auth)?;
    tracing::info!("authenticated as superuser");

    if is_yes(&prompt(&mut input, "Sync collection schema first? (y/N): ").await?) {
        let mut migrator = Migrator::new(SchemaState::baseline(), migrations::all());
        let applied = migrator.up()?;
        pb.import_collections(&migrator.state().to_import_payload()).await?;
        tracing::info!(applied, "schema synced");
    }

    if is_yes(&prompt(&mut input, "Clear existing todos and posts? (y/N): ").await?) {
        seed::clear_collection(&pb, TODOS).await?;
        seed::clear_collection(&pb, POSTS).await?;
    }

    let owner = prompt(&mut input, &format!("Owner email for todos [{DEFAULT_OWNER_EMAIL}]: ")).await?;
    let owner = if owner.is_empty() { DEFAULT_OWNER_EMAIL.to_string() } else { owner };
    let user_id = seed::find_user_id(&pb, &owner).await?;

    let started = Instant::now();
    let todos = seed::seed_todos(&pb, &user_id, TODO_COUNT, BATCH_SIZE).await?;
    let posts = seed::seed_posts(&pb, POST_COUNT, BATCH_SIZE).await?;

    tracing::info!(
        todos = todos.created,
        posts = posts.created,
        elapsed_secs = %format!("{:.2}", started.elapsed().as_secs_f64()),
        "seeding complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "seeding failed");
        std::process::exit(1);
    }
}
