use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// CharacterType
///
/// Discriminator for the `characters` table: each character is either a kanji
/// (a dictionary entry with translations, examples and an exam level) or a
/// component (a reusable visual sub-part of kanji). The value determines which
/// extension row (`kanjis` / `components`) exists for the character.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[sqlx(type_name = "character_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum CharacterType {
    #[default]
    Kanji,
    Component,
}

impl CharacterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterType::Kanji => "KANJI",
            CharacterType::Component => "COMPONENT",
        }
    }
}

impl std::str::FromStr for CharacterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KANJI" => Ok(CharacterType::Kanji),
            "COMPONENT" => Ok(CharacterType::Component),
            other => Err(format!("unknown character type '{other}'")),
        }
    }
}

impl std::fmt::Display for CharacterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Character
///
/// The base record from the `characters` table, representing either a kanji or a
/// reusable component. This is the primary data structure for the core business logic.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Character {
    pub id: i64,
    pub title: String,

    /// Maps SQL column "type" to Rust field "character_type".
    /// This renaming is necessary because `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub character_type: CharacterType,

    pub meaning: String,

    // Object-storage keys for artwork.
    pub img: Option<String>,
    pub description: Option<String>,
    pub mnemo_img: Option<String>,
    pub mnemo_disc: Option<String>,
    pub variants: Option<String>,

    /// Human-readable slug `{id}-{meaning}`. Only well-defined after the id is
    /// assigned, so it is NULL for the instant between insert and the slug update
    /// inside the creation transaction.
    #[serde(rename = "URI")]
    pub uri: Option<String>,

    // Timestamp handling for database integration and JSON serialization.
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Kanji
///
/// Extension row for characters of type KANJI (`kanjis` table, 1:1 via character_id).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Kanji {
    pub id: i64,
    /// Difficulty bucket (e.g. JLPT level). Optional at creation time.
    pub exam_level: Option<i32>,
    pub character_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Component
///
/// Extension row for characters of type COMPONENT (`components` table, 1:1 via character_id).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Component {
    pub id: i64,
    pub character_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Translation
///
/// A translation row tied to a kanji. Four parallel text renditions; any of them
/// may be absent for sparsely-sourced entries.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Translation {
    pub id: i64,
    pub jp_normal_text: Option<String>,
    pub jp_furigana_text: Option<String>,
    pub en_text: Option<String>,
    pub ru_text: Option<String>,
    pub kanji_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Example
///
/// Usage-example row tied to a kanji. Same shape as [`Translation`] but a distinct
/// record kind stored in its own table; the two must never be conflated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Example {
    pub id: i64,
    pub jp_normal_text: Option<String>,
    pub jp_furigana_text: Option<String>,
    pub en_text: Option<String>,
    pub ru_text: Option<String>,
    pub kanji_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// KanjiComponentLink
///
/// Many-to-many join row between kanji and components (`kanji_component_links`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct KanjiComponentLink {
    pub id: i64,
    pub kanji_id: i64,
    pub component_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// User
///
/// Minimal identity record resolved during authentication. The RBAC field holds
/// 'USER' or 'ADMIN'; only admins may create characters or request upload URLs.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub role: String,
}

// --- Request Payloads (Input Schemas) ---

/// TranslationEntry
///
/// Input shape shared by the `translations` and `examples` arrays of the
/// create/update payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TranslationEntry {
    pub jp_normal_text: Option<String>,
    pub jp_furigana_text: Option<String>,
    pub en_text: Option<String>,
    pub ru_text: Option<String>,
}

/// AssociationId
///
/// A single related-record id as clients actually send it: either a JSON number
/// or a numeric string (form fields arrive as strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum AssociationId {
    Num(i64),
    Text(String),
}

/// AssociationIds
///
/// The `associations` payload field: an array of ids, or a comma-delimited
/// string of ids. Both forms are accepted for either character type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum AssociationIds {
    List(Vec<AssociationId>),
    Delimited(String),
}

impl Default for AssociationIds {
    fn default() -> Self {
        AssociationIds::List(Vec::new())
    }
}

impl AssociationIds {
    /// Normalizes the payload into numeric ids. Entries that are blank, that do
    /// not parse as an integer, or that are not positive are skipped rather than
    /// rejected: the linked rows simply are not created for them.
    pub fn to_ids(&self) -> Vec<i64> {
        fn parse(text: &str) -> Option<i64> {
            let id = text.trim().parse::<i64>().ok()?;
            (id > 0).then_some(id)
        }

        match self {
            AssociationIds::List(entries) => entries
                .iter()
                .filter_map(|entry| match entry {
                    AssociationId::Num(id) => (*id > 0).then_some(*id),
                    AssociationId::Text(text) => parse(text),
                })
                .collect(),
            AssociationIds::Delimited(text) => text.split(',').filter_map(parse).collect(),
        }
    }
}

/// CreateCharacterRequest
///
/// Input payload for POST /characters. The `type` field stays a raw string here
/// so an unrecognized value reaches the handler and is reported through the
/// structured error channel instead of a generic deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCharacterRequest {
    #[serde(rename = "type")]
    pub character_type: String,

    pub title: String,
    pub meaning: String,
    pub img: Option<String>,
    pub description: Option<String>,
    pub mnemo_img: Option<String>,
    pub mnemo_disc: Option<String>,
    pub variants: Option<String>,

    /// KANJI: component ids to link. COMPONENT: kanji ids to link.
    #[serde(default)]
    pub associations: AssociationIds,
    #[serde(default)]
    pub translations: Vec<TranslationEntry>,
    #[serde(default)]
    pub examples: Vec<TranslationEntry>,
    pub exam_level: Option<i32>,
}

/// UpdateCharacterRequest
///
/// Partial-update payload for PUT /characters/{id}. Base fields use `Option<T>`
/// with COALESCE semantics (only provided fields change); the collection fields
/// are replace-all: when present, the existing rows are dropped and reinserted
/// from the payload. The character's `type` cannot be changed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateCharacterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mnemo_img: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mnemo_disc: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_level: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub associations: Option<AssociationIds>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub translations: Option<Vec<TranslationEntry>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<TranslationEntry>>,
}

/// UploadUrlRequest
///
/// Input payload for requesting a short-lived artwork upload URL (POST /uploads/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UploadUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "mountain_mnemonic.png")]
    pub filename: String,
    /// The MIME type; must be an image type, and constrains the upload.
    #[schema(example = "image/png")]
    pub file_type: String,
}

// --- Response Schemas (Output) ---

/// CharacterList
///
/// Output of GET /characters: every character row plus the total count
/// (the find-and-count-all shape the frontend consumes).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CharacterList {
    pub count: i64,
    pub rows: Vec<Character>,
}

/// KanjiPart
///
/// The kanji payload section of a character detail response: the kanji row's
/// fields flattened together with its examples and translations.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct KanjiPart {
    #[serde(flatten)]
    pub kanji: Kanji,
    pub examples: Vec<Example>,
    pub translations: Vec<Translation>,
}

/// CharacterDetails
///
/// Output of GET /characters/{uri}, as an explicit sum type over the
/// character's type. A KANJI character carries its kanji part (with examples
/// and translations) and component links, serialized as `{characterPart,
/// kanjiPart: {…}, associations}`; a COMPONENT character carries its
/// component row and kanji links, serialized as `{characterPart,
/// componentPart, associations}`. The two shapes never mix.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum CharacterDetails {
    #[serde(rename_all = "camelCase")]
    Kanji {
        character_part: Character,
        kanji_part: KanjiPart,
        associations: Vec<KanjiComponentLink>,
    },
    #[serde(rename_all = "camelCase")]
    Component {
        character_part: Character,
        component_part: Component,
        associations: Vec<KanjiComponentLink>,
    },
}

/// CreatedCharacterResponse
///
/// Output of POST /characters and PUT /characters/{id}. Includes the slug so a
/// client can immediately fetch the record it just wrote.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatedCharacterResponse {
    pub message: String,
    pub id: i64,
    #[serde(rename = "URI")]
    pub uri: String,
}

/// MessageResponse
///
/// Minimal confirmation body for operations without a data payload (delete).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// UploadUrlResponse
///
/// Output schema containing the temporary URL for client-to-storage artwork upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UploadUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The object key where the file will land (stored later in `img` / `mnemoImg`).
    pub resource_key: String,
}

// --- Repository Input Records ---

/// NewCharacter
///
/// The validated domain record handed to the repository's transactional create.
/// `linked_ids` holds component ids for a kanji and kanji ids for a component,
/// already normalized to positive integers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewCharacter {
    pub character_type: CharacterType,
    pub title: String,
    pub meaning: String,
    pub img: Option<String>,
    pub description: Option<String>,
    pub mnemo_img: Option<String>,
    pub mnemo_disc: Option<String>,
    pub variants: Option<String>,
    pub exam_level: Option<i32>,
    pub linked_ids: Vec<i64>,
    pub translations: Vec<TranslationEntry>,
    pub examples: Vec<TranslationEntry>,
}

/// CharacterPatch
///
/// The validated domain record handed to the repository's transactional update.
/// `None` collections mean "leave as-is"; `Some` collections replace all rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharacterPatch {
    pub title: Option<String>,
    pub meaning: Option<String>,
    pub img: Option<String>,
    pub description: Option<String>,
    pub mnemo_img: Option<String>,
    pub mnemo_disc: Option<String>,
    pub variants: Option<String>,
    pub exam_level: Option<i32>,
    pub linked_ids: Option<Vec<i64>>,
    pub translations: Option<Vec<TranslationEntry>>,
    pub examples: Option<Vec<TranslationEntry>>,
}

/// CreatedCharacter
///
/// What the transactional create/update hands back: the character id and the
/// slug derived from it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreatedCharacter {
    pub id: i64,
    pub uri: String,
}
