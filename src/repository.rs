use crate::models::{
    Character, CharacterList, CharacterPatch, CharacterType, Component, CreatedCharacter, Example,
    Kanji, KanjiComponentLink, NewCharacter, Translation, TranslationEntry, User,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;

// Column lists shared across queries to avoid repetition. The runtime-checked
// query forms are used throughout so the crate builds without a live database;
// every row type derives FromRow against exactly these columns.
const CHARACTER_COLUMNS: &str =
    "id, title, type, meaning, img, description, mnemo_img, mnemo_disc, variants, uri, \
     created_at, updated_at";
const KANJI_COLUMNS: &str = "id, exam_level, character_id, created_at, updated_at";
const COMPONENT_COLUMNS: &str = "id, character_id, created_at, updated_at";
const TEXT_ROW_COLUMNS: &str =
    "id, jp_normal_text, jp_furigana_text, en_text, ru_text, kanji_id, created_at, updated_at";
const LINK_COLUMNS: &str = "id, kanji_id, component_id, created_at, updated_at";

/// CharacterRepository
///
/// Defines the abstract contract for all persistence operations. Handlers interact
/// with the data layer through this trait without knowing the concrete
/// implementation (Postgres, Mock, etc.).
///
/// Reads are fine-grained, mirroring the sequential lookups the handlers perform;
/// the multi-row writes (create/update/delete) are coarse so each can run inside
/// a single transaction. A partial failure must never leave orphaned rows.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn CharacterRepository>`) safely shareable across Axum's asynchronous
/// task boundaries.
#[async_trait]
pub trait CharacterRepository: Send + Sync {
    // --- Character Retrieval ---
    async fn find_character(&self, id: i64) -> Result<Option<Character>, sqlx::Error>;
    // Full listing with total count (the find-and-count-all shape).
    async fn list_characters(&self) -> Result<CharacterList, sqlx::Error>;

    // --- Extension-Row Retrieval ---
    async fn find_kanji_by_character(
        &self,
        character_id: i64,
    ) -> Result<Option<Kanji>, sqlx::Error>;
    async fn find_component_by_character(
        &self,
        character_id: i64,
    ) -> Result<Option<Component>, sqlx::Error>;

    // --- Related Rows ---
    async fn list_translations(&self, kanji_id: i64) -> Result<Vec<Translation>, sqlx::Error>;
    async fn list_examples(&self, kanji_id: i64) -> Result<Vec<Example>, sqlx::Error>;
    async fn list_links_by_kanji(
        &self,
        kanji_id: i64,
    ) -> Result<Vec<KanjiComponentLink>, sqlx::Error>;
    async fn list_links_by_component(
        &self,
        component_id: i64,
    ) -> Result<Vec<KanjiComponentLink>, sqlx::Error>;

    // --- Transactional Writes ---
    // Inserts the character, its slug, its typed extension row and all related
    // rows atomically; returns the new id and slug.
    async fn create_character(&self, input: NewCharacter)
    -> Result<CreatedCharacter, sqlx::Error>;
    // Applies a partial patch plus replace-all collection reconciliation.
    // Returns None when no character with the given id exists.
    async fn update_character(
        &self,
        id: i64,
        patch: CharacterPatch,
    ) -> Result<Option<CreatedCharacter>, sqlx::Error>;
    // Manually cascades links, translations, examples and the extension row,
    // then removes the character itself. Returns false when the character had
    // already vanished.
    async fn delete_character(&self, id: i64) -> Result<bool, sqlx::Error>;

    // --- User/Auth ---
    async fn find_user(&self, id: i64) -> Result<Option<User>, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the
/// application state.
pub type RepositoryState = Arc<dyn CharacterRepository>;

/// PostgresRepository
///
/// The concrete implementation of [`CharacterRepository`], backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Inserts one translation-shaped row per entry into the named table
/// (`translations` or `examples`) inside the ambient transaction.
async fn insert_text_rows(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    entries: &[TranslationEntry],
    kanji_id: i64,
) -> Result<(), sqlx::Error> {
    let query = format!(
        "INSERT INTO {table} (jp_normal_text, jp_furigana_text, en_text, ru_text, kanji_id)
         VALUES ($1, $2, $3, $4, $5)"
    );
    for entry in entries {
        sqlx::query(&query)
            .bind(&entry.jp_normal_text)
            .bind(&entry.jp_furigana_text)
            .bind(&entry.en_text)
            .bind(&entry.ru_text)
            .bind(kanji_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Inserts one kanji/component link row per pair inside the ambient transaction.
async fn insert_links(
    tx: &mut Transaction<'_, Postgres>,
    kanji_id: i64,
    component_ids: &[i64],
) -> Result<(), sqlx::Error> {
    for component_id in component_ids {
        sqlx::query("INSERT INTO kanji_component_links (kanji_id, component_id) VALUES ($1, $2)")
            .bind(kanji_id)
            .bind(component_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl CharacterRepository for PostgresRepository {
    /// Simple retrieval of a character by id, without related rows.
    async fn find_character(&self, id: i64) -> Result<Option<Character>, sqlx::Error> {
        let query = format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE id = $1");
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Retrieves every character row plus the total count. No pagination;
    /// the dictionary is browsed whole by the frontend.
    async fn list_characters(&self) -> Result<CharacterList, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM characters")
            .fetch_one(&self.pool)
            .await?;
        let query = format!("SELECT {CHARACTER_COLUMNS} FROM characters ORDER BY id ASC");
        let rows = sqlx::query_as::<_, Character>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(CharacterList { count, rows })
    }

    async fn find_kanji_by_character(
        &self,
        character_id: i64,
    ) -> Result<Option<Kanji>, sqlx::Error> {
        let query = format!("SELECT {KANJI_COLUMNS} FROM kanjis WHERE character_id = $1");
        sqlx::query_as::<_, Kanji>(&query)
            .bind(character_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_component_by_character(
        &self,
        character_id: i64,
    ) -> Result<Option<Component>, sqlx::Error> {
        let query = format!("SELECT {COMPONENT_COLUMNS} FROM components WHERE character_id = $1");
        sqlx::query_as::<_, Component>(&query)
            .bind(character_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_translations(&self, kanji_id: i64) -> Result<Vec<Translation>, sqlx::Error> {
        let query = format!(
            "SELECT {TEXT_ROW_COLUMNS} FROM translations WHERE kanji_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, Translation>(&query)
            .bind(kanji_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn list_examples(&self, kanji_id: i64) -> Result<Vec<Example>, sqlx::Error> {
        let query =
            format!("SELECT {TEXT_ROW_COLUMNS} FROM examples WHERE kanji_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, Example>(&query)
            .bind(kanji_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn list_links_by_kanji(
        &self,
        kanji_id: i64,
    ) -> Result<Vec<KanjiComponentLink>, sqlx::Error> {
        let query = format!(
            "SELECT {LINK_COLUMNS} FROM kanji_component_links WHERE kanji_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, KanjiComponentLink>(&query)
            .bind(kanji_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn list_links_by_component(
        &self,
        component_id: i64,
    ) -> Result<Vec<KanjiComponentLink>, sqlx::Error> {
        let query = format!(
            "SELECT {LINK_COLUMNS} FROM kanji_component_links WHERE component_id = $1 \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, KanjiComponentLink>(&query)
            .bind(component_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Creates the character, its `{id}-{meaning}` slug, the typed extension row,
    /// the association links, and (for kanji) the translation and example rows,
    /// all inside one transaction. Examples land in the `examples` table,
    /// translations in `translations`; the two are never mixed.
    async fn create_character(
        &self,
        input: NewCharacter,
    ) -> Result<CreatedCharacter, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let character_id: i64 = sqlx::query_scalar(
            "INSERT INTO characters \
                 (title, type, meaning, img, description, mnemo_img, mnemo_disc, variants)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(&input.title)
        .bind(input.character_type)
        .bind(&input.meaning)
        .bind(&input.img)
        .bind(&input.description)
        .bind(&input.mnemo_img)
        .bind(&input.mnemo_disc)
        .bind(&input.variants)
        .fetch_one(&mut *tx)
        .await?;

        // The slug is only well-defined once the id is assigned.
        let uri = format!("{character_id}-{}", input.meaning);
        sqlx::query("UPDATE characters SET uri = $2, updated_at = now() WHERE id = $1")
            .bind(character_id)
            .bind(&uri)
            .execute(&mut *tx)
            .await?;

        match input.character_type {
            CharacterType::Kanji => {
                let kanji_id: i64 = sqlx::query_scalar(
                    "INSERT INTO kanjis (exam_level, character_id) VALUES ($1, $2) RETURNING id",
                )
                .bind(input.exam_level)
                .bind(character_id)
                .fetch_one(&mut *tx)
                .await?;

                insert_links(&mut tx, kanji_id, &input.linked_ids).await?;
                insert_text_rows(&mut tx, "translations", &input.translations, kanji_id).await?;
                insert_text_rows(&mut tx, "examples", &input.examples, kanji_id).await?;
            }
            CharacterType::Component => {
                let component_id: i64 = sqlx::query_scalar(
                    "INSERT INTO components (character_id) VALUES ($1) RETURNING id",
                )
                .bind(character_id)
                .fetch_one(&mut *tx)
                .await?;

                for kanji_id in &input.linked_ids {
                    sqlx::query(
                        "INSERT INTO kanji_component_links (kanji_id, component_id) \
                         VALUES ($1, $2)",
                    )
                    .bind(kanji_id)
                    .bind(component_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        Ok(CreatedCharacter {
            id: character_id,
            uri,
        })
    }

    /// Applies a partial patch to the base fields using COALESCE, recomputes the
    /// slug from the effective meaning, and, when the payload provides them,
    /// replaces the character's collections wholesale. A missing extension row is
    /// tolerated; the base update still applies.
    async fn update_character(
        &self,
        id: i64,
        patch: CharacterPatch,
    ) -> Result<Option<CreatedCharacter>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE id = $1 FOR UPDATE");
        let Some(character) = sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let meaning = patch
            .meaning
            .clone()
            .unwrap_or_else(|| character.meaning.clone());
        let uri = format!("{id}-{meaning}");

        sqlx::query(
            "UPDATE characters
             SET title = COALESCE($2, title),
                 meaning = COALESCE($3, meaning),
                 img = COALESCE($4, img),
                 description = COALESCE($5, description),
                 mnemo_img = COALESCE($6, mnemo_img),
                 mnemo_disc = COALESCE($7, mnemo_disc),
                 variants = COALESCE($8, variants),
                 uri = $9,
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.meaning)
        .bind(&patch.img)
        .bind(&patch.description)
        .bind(&patch.mnemo_img)
        .bind(&patch.mnemo_disc)
        .bind(&patch.variants)
        .bind(&uri)
        .execute(&mut *tx)
        .await?;

        match character.character_type {
            CharacterType::Kanji => {
                let query = format!("SELECT {KANJI_COLUMNS} FROM kanjis WHERE character_id = $1");
                let kanji = sqlx::query_as::<_, Kanji>(&query)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;

                if let Some(kanji) = kanji {
                    if patch.exam_level.is_some() {
                        sqlx::query(
                            "UPDATE kanjis \
                             SET exam_level = COALESCE($2, exam_level), updated_at = now() \
                             WHERE id = $1",
                        )
                        .bind(kanji.id)
                        .bind(patch.exam_level)
                        .execute(&mut *tx)
                        .await?;
                    }
                    if let Some(linked_ids) = &patch.linked_ids {
                        sqlx::query("DELETE FROM kanji_component_links WHERE kanji_id = $1")
                            .bind(kanji.id)
                            .execute(&mut *tx)
                            .await?;
                        insert_links(&mut tx, kanji.id, linked_ids).await?;
                    }
                    if let Some(translations) = &patch.translations {
                        sqlx::query("DELETE FROM translations WHERE kanji_id = $1")
                            .bind(kanji.id)
                            .execute(&mut *tx)
                            .await?;
                        insert_text_rows(&mut tx, "translations", translations, kanji.id).await?;
                    }
                    if let Some(examples) = &patch.examples {
                        sqlx::query("DELETE FROM examples WHERE kanji_id = $1")
                            .bind(kanji.id)
                            .execute(&mut *tx)
                            .await?;
                        insert_text_rows(&mut tx, "examples", examples, kanji.id).await?;
                    }
                }
            }
            CharacterType::Component => {
                let query =
                    format!("SELECT {COMPONENT_COLUMNS} FROM components WHERE character_id = $1");
                let component = sqlx::query_as::<_, Component>(&query)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;

                if let Some(component) = component {
                    if let Some(linked_ids) = &patch.linked_ids {
                        sqlx::query("DELETE FROM kanji_component_links WHERE component_id = $1")
                            .bind(component.id)
                            .execute(&mut *tx)
                            .await?;
                        for kanji_id in linked_ids {
                            sqlx::query(
                                "INSERT INTO kanji_component_links (kanji_id, component_id) \
                                 VALUES ($1, $2)",
                            )
                            .bind(kanji_id)
                            .bind(component.id)
                            .execute(&mut *tx)
                            .await?;
                        }
                    }
                }
            }
        }

        tx.commit().await?;

        Ok(Some(CreatedCharacter { id, uri }))
    }

    /// Removes the character and everything hanging off it in one transaction:
    /// links, translations and examples by kanji id (or links by component id),
    /// the extension row, then the character itself. A missing extension row is
    /// tolerated; the remaining rows are still removed.
    async fn delete_character(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE id = $1 FOR UPDATE");
        let Some(character) = sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(false);
        };

        match character.character_type {
            CharacterType::Kanji => {
                let query = format!("SELECT {KANJI_COLUMNS} FROM kanjis WHERE character_id = $1");
                let kanji = sqlx::query_as::<_, Kanji>(&query)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;

                if let Some(kanji) = kanji {
                    sqlx::query("DELETE FROM kanji_component_links WHERE kanji_id = $1")
                        .bind(kanji.id)
                        .execute(&mut *tx)
                        .await?;
                    sqlx::query("DELETE FROM translations WHERE kanji_id = $1")
                        .bind(kanji.id)
                        .execute(&mut *tx)
                        .await?;
                    sqlx::query("DELETE FROM examples WHERE kanji_id = $1")
                        .bind(kanji.id)
                        .execute(&mut *tx)
                        .await?;
                    sqlx::query("DELETE FROM kanjis WHERE id = $1")
                        .bind(kanji.id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            CharacterType::Component => {
                let query =
                    format!("SELECT {COMPONENT_COLUMNS} FROM components WHERE character_id = $1");
                let component = sqlx::query_as::<_, Component>(&query)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;

                if let Some(component) = component {
                    sqlx::query("DELETE FROM kanji_component_links WHERE component_id = $1")
                        .bind(component.id)
                        .execute(&mut *tx)
                        .await?;
                    sqlx::query("DELETE FROM components WHERE id = $1")
                        .bind(component.id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        let result = sqlx::query("DELETE FROM characters WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Retrieves user identity data (id, email, role) needed for authentication
    /// and the admin role gate.
    async fn find_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, email, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
