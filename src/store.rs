use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tokio::sync::RwLock;

use handle_errors::Error;

use crate::types::question::{NewQuestion, Question, QuestionId};

/// Where questions live. PostgreSQL when a database URL is configured,
/// otherwise a table held by the process.
#[derive(Debug, Clone)]
pub struct Store {
    backend: Backend,
}

#[derive(Debug, Clone)]
enum Backend {
    Postgres(PgPool),
    Memory(Arc<RwLock<MemoryTable>>),
}

#[derive(Debug, Default)]
struct MemoryTable {
    questions: BTreeMap<QuestionId, Question>,
    last_id: i32,
}

impl Store {
    pub async fn new(db_url: &str, max_connections: u32) -> Result<Self, Error> {
        let db_pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url) // fails fast when the database is unreachable
            .await
            .map_err(|e| {
                tracing::event!(tracing::Level::ERROR, "Cannot connect to database: {:?}", e);
                Error::DatabaseQueryError(e)
            })?;

        Ok(Store {
            backend: Backend::Postgres(db_pool),
        })
    }

    pub fn in_memory() -> Self {
        Store {
            backend: Backend::Memory(Arc::new(RwLock::new(MemoryTable::default()))),
        }
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        match &self.backend {
            Backend::Postgres(pool) => sqlx::migrate!()
                .run(pool)
                .await
                .map_err(Error::MigrationError),
            Backend::Memory(_) => Ok(()),
        }
    }

    pub async fn get_questions(
        &self,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<Question>, Error> {
        match &self.backend {
            Backend::Postgres(pool) => {
                // LIMIT NULL returns every remaining row.
                match sqlx::query(
                    "SELECT id, title, body, created_at, updated_at
                    FROM questions ORDER BY id LIMIT $1 OFFSET $2",
                )
                .bind(limit.map(i64::from))
                .bind(i64::from(offset))
                .map(question_from_row)
                .fetch_all(pool)
                .await
                {
                    Ok(questions) => Ok(questions),
                    Err(e) => Err(query_error(e)),
                }
            }
            Backend::Memory(table) => {
                let table = table.read().await;
                let remaining = table.questions.values().skip(offset as usize);
                let questions = match limit {
                    Some(limit) => remaining.take(limit as usize).cloned().collect(),
                    None => remaining.cloned().collect(),
                };
                Ok(questions)
            }
        }
    }

    pub async fn get_question(&self, id: QuestionId) -> Result<Question, Error> {
        match &self.backend {
            Backend::Postgres(pool) => {
                match sqlx::query(
                    "SELECT id, title, body, created_at, updated_at
                    FROM questions WHERE id = $1",
                )
                .bind(id.0)
                .map(question_from_row)
                .fetch_optional(pool)
                .await
                {
                    Ok(Some(question)) => Ok(question),
                    Ok(None) => Err(Error::RecordNotFound(id.0)),
                    Err(e) => Err(query_error(e)),
                }
            }
            Backend::Memory(table) => table
                .read()
                .await
                .questions
                .get(&id)
                .cloned()
                .ok_or(Error::RecordNotFound(id.0)),
        }
    }

    pub async fn add_question(&self, new_question: NewQuestion) -> Result<Question, Error> {
        match &self.backend {
            Backend::Postgres(pool) => {
                match sqlx::query(
                    "INSERT INTO questions (title, body)
                    VALUES ($1, $2)
                    RETURNING id, title, body, created_at, updated_at",
                )
                .bind(new_question.title)
                .bind(new_question.body)
                .map(question_from_row)
                .fetch_one(pool)
                .await
                {
                    Ok(question) => Ok(question),
                    Err(e) => Err(query_error(e)),
                }
            }
            Backend::Memory(table) => {
                let mut table = table.write().await;
                // Ids are never reused, even after a delete.
                table.last_id += 1;
                let now = Utc::now();
                let question = Question {
                    id: QuestionId(table.last_id),
                    title: new_question.title,
                    body: new_question.body,
                    created_at: now,
                    updated_at: now,
                };
                table.questions.insert(question.id, question.clone());
                Ok(question)
            }
        }
    }

    /// Saves `question.title` and `question.body` over the stored row with
    /// the same id and refreshes `updated_at`.
    pub async fn update_question(&self, question: Question) -> Result<Question, Error> {
        let id = question.id;
        match &self.backend {
            Backend::Postgres(pool) => {
                match sqlx::query(
                    "UPDATE questions
                    SET title = $1, body = $2, updated_at = NOW()
                    WHERE id = $3
                    RETURNING id, title, body, created_at, updated_at",
                )
                .bind(question.title)
                .bind(question.body)
                .bind(id.0)
                .map(question_from_row)
                .fetch_optional(pool)
                .await
                {
                    Ok(Some(question)) => Ok(question),
                    Ok(None) => Err(Error::RecordNotFound(id.0)),
                    Err(e) => Err(query_error(e)),
                }
            }
            Backend::Memory(table) => {
                let mut table = table.write().await;
                match table.questions.get_mut(&id) {
                    Some(stored) => {
                        stored.title = question.title;
                        stored.body = question.body;
                        stored.updated_at = Utc::now();
                        Ok(stored.clone())
                    }
                    None => Err(Error::RecordNotFound(id.0)),
                }
            }
        }
    }

    pub async fn delete_question(&self, id: QuestionId) -> Result<(), Error> {
        match &self.backend {
            Backend::Postgres(pool) => {
                match sqlx::query("DELETE FROM questions WHERE id = $1")
                    .bind(id.0)
                    .execute(pool)
                    .await
                {
                    // Nothing deleted means the id never existed.
                    Ok(done) if done.rows_affected() == 0 => Err(Error::RecordNotFound(id.0)),
                    Ok(_) => Ok(()),
                    Err(e) => Err(query_error(e)),
                }
            }
            Backend::Memory(table) => match table.write().await.questions.remove(&id) {
                Some(_) => Ok(()),
                None => Err(Error::RecordNotFound(id.0)),
            },
        }
    }
}

fn question_from_row(row: PgRow) -> Question {
    Question {
        id: QuestionId(row.get("id")),
        title: row.get("title"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn query_error(error: sqlx::Error) -> Error {
    tracing::event!(tracing::Level::ERROR, "{:?}", error);
    Error::DatabaseQueryError(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_question(title: &str) -> NewQuestion {
        NewQuestion {
            title: title.to_string(),
            body: format!("Body of {}", title),
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_in_order() {
        let store = Store::in_memory();
        let first = store.add_question(new_question("first")).await.unwrap();
        let second = store.add_question(new_question("second")).await.unwrap();

        assert_eq!(first.id, QuestionId(1));
        assert_eq!(second.id, QuestionId(2));
        assert_eq!(first.created_at, first.updated_at);
    }

    #[tokio::test]
    async fn pages_through_questions() {
        let store = Store::in_memory();
        for title in ["a", "b", "c", "d"] {
            store.add_question(new_question(title)).await.unwrap();
        }

        let all = store.get_questions(None, 0).await.unwrap();
        assert_eq!(all.len(), 4);

        let page = store.get_questions(Some(2), 1).await.unwrap();
        let titles: Vec<_> = page.iter().map(|q| q.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c"]);

        assert!(store.get_questions(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_creation_time() {
        let store = Store::in_memory();
        let mut question = store.add_question(new_question("draft")).await.unwrap();
        question.title = "final".to_string();

        let updated = store.update_question(question.clone()).await.unwrap();
        assert_eq!(updated.title, "final");
        assert_eq!(updated.created_at, question.created_at);
        assert!(updated.updated_at >= question.updated_at);

        let fetched = store.get_question(question.id).await.unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let store = Store::in_memory();
        assert!(matches!(
            store.get_question(QuestionId(9)).await,
            Err(Error::RecordNotFound(9))
        ));
        assert!(matches!(
            store.delete_question(QuestionId(9)).await,
            Err(Error::RecordNotFound(9))
        ));

        let now = Utc::now();
        let ghost = Question {
            id: QuestionId(9),
            title: "t".to_string(),
            body: "b".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            store.update_question(ghost).await,
            Err(Error::RecordNotFound(9))
        ));
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let store = Store::in_memory();
        let first = store.add_question(new_question("one")).await.unwrap();
        store.delete_question(first.id).await.unwrap();
        let second = store.add_question(new_question("two")).await.unwrap();

        assert_eq!(second.id, QuestionId(2));
        assert_eq!(store.get_questions(None, 0).await.unwrap().len(), 1);
    }
}
