use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{
        CharacterDetails, CharacterList, CharacterPatch, CharacterType,
        CreateCharacterRequest, CreatedCharacterResponse, KanjiPart, MessageResponse,
        NewCharacter, UpdateCharacterRequest, UploadUrlRequest, UploadUrlResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

// --- Path Parameter Parsing ---

/// Extracts the numeric character id from a URI slug of the form `{id}-{meaning}`.
///
/// Returns `None` when the slug has no dash, when the leading segment is empty
/// or non-numeric, or when it parses to zero. Lookup by slug only ever uses the
/// id; the meaning tail is cosmetic.
pub fn parse_uri_id(uri: &str) -> Option<i64> {
    let (head, _) = uri.split_once('-')?;
    let id = head.parse::<i64>().ok()?;
    (id > 0).then_some(id)
}

/// Parses a plain numeric id path segment (update/delete take the bare id,
/// not the slug).
fn parse_path_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            ApiError::bad_request(format!("'{raw}' is not a valid numeric character id"))
        })
}

// --- Handlers ---

/// get_character
///
/// [Public Route] Retrieves one character by its URI slug (`{id}-{meaning}`).
///
/// The response shape follows the character's type: a KANJI character carries
/// its kanji fields, examples, translations and component links; a COMPONENT
/// character carries its component row and kanji links. No persistence reads
/// happen until the slug parses, and none after a failed lookup.
#[utoipa::path(
    get,
    path = "/characters/{uri}",
    params(("uri" = String, Path, description = "Character slug, `{id}-{meaning}`")),
    responses(
        (status = 200, description = "Character detail", body = CharacterDetails),
        (status = 400, description = "Malformed slug"),
        (status = 404, description = "No such character")
    )
)]
pub async fn get_character(
    State(state): State<AppState>,
    Path(uri): Path<String>,
) -> ApiResult<Json<CharacterDetails>> {
    let id = parse_uri_id(&uri).ok_or_else(|| {
        ApiError::bad_request(format!(
            "the URI '{uri}' has no leading numeric id (expected the '{{id}}-{{meaning}}' form)"
        ))
    })?;

    let character = state
        .repo
        .find_character(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("the character with id={id} does not exist")))?;

    let details = match character.character_type {
        CharacterType::Kanji => {
            // Invariant: a KANJI character always has its kanji row. A miss here is
            // data corruption, not client error.
            let kanji = state.repo.find_kanji_by_character(id).await?.ok_or_else(|| {
                ApiError::internal(format!("kanji extension row missing for character id={id}"))
            })?;
            let examples = state.repo.list_examples(kanji.id).await?;
            let translations = state.repo.list_translations(kanji.id).await?;
            let associations = state.repo.list_links_by_kanji(kanji.id).await?;
            CharacterDetails::Kanji {
                character_part: character,
                kanji_part: KanjiPart {
                    kanji,
                    examples,
                    translations,
                },
                associations,
            }
        }
        CharacterType::Component => {
            let component = state
                .repo
                .find_component_by_character(id)
                .await?
                .ok_or_else(|| {
                    ApiError::internal(format!(
                        "component extension row missing for character id={id}"
                    ))
                })?;
            let associations = state.repo.list_links_by_component(component.id).await?;
            CharacterDetails::Component {
                character_part: character,
                component_part: component,
                associations,
            }
        }
    };

    Ok(Json(details))
}

/// list_characters
///
/// [Public Route] Lists every character row with the total count.
/// No pagination, filtering, or sorting.
#[utoipa::path(
    get,
    path = "/characters",
    responses((status = 200, description = "All characters", body = CharacterList))
)]
pub async fn list_characters(State(state): State<AppState>) -> ApiResult<Json<CharacterList>> {
    let list = state.repo.list_characters().await?;
    Ok(Json(list))
}

/// create_character
///
/// [Admin Route] Creates a character with its typed extension and related rows
/// in one transaction.
///
/// *Authorization*: requires the `ADMIN` role on top of authentication.
/// The `type` string is validated before any write, so an unrecognized value
/// commits nothing and surfaces through the structured error channel. For a
/// KANJI the association ids are component ids; for a COMPONENT they are kanji
/// ids; entries that do not parse to a positive integer are skipped.
#[utoipa::path(
    post,
    path = "/characters",
    request_body = CreateCharacterRequest,
    responses(
        (status = 201, description = "Created", body = CreatedCharacterResponse),
        (status = 400, description = "Unrecognized character type"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_character(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCharacterRequest>,
) -> ApiResult<(StatusCode, Json<CreatedCharacterResponse>)> {
    if role != "ADMIN" {
        return Err(ApiError::forbidden("only admins may create characters"));
    }

    let character_type: CharacterType = payload.character_type.parse().map_err(|_| {
        ApiError::bad_request(format!(
            "the request does not carry an existing character type \
             (\"KANJI\" or \"COMPONENT\"), got '{}'",
            payload.character_type
        ))
    })?;

    let input = NewCharacter {
        character_type,
        title: payload.title,
        meaning: payload.meaning,
        img: payload.img,
        description: payload.description,
        mnemo_img: payload.mnemo_img,
        mnemo_disc: payload.mnemo_disc,
        variants: payload.variants,
        exam_level: payload.exam_level,
        linked_ids: payload.associations.to_ids(),
        translations: payload.translations,
        examples: payload.examples,
    };

    let created = state.repo.create_character(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedCharacterResponse {
            message: format!("the new {} was created", character_type.as_str().to_lowercase()),
            id: created.id,
            uri: created.uri,
        }),
    ))
}

/// update_character
///
/// [Public Route] Applies a partial update to a character.
///
/// Base fields patch individually (absent fields keep their values); the
/// `translations` / `examples` / `associations` collections, when present,
/// replace the stored rows wholesale. The slug is recomputed from the
/// effective meaning, and the character's type is immutable.
#[utoipa::path(
    put,
    path = "/characters/{id}",
    params(("id" = i64, Path, description = "Character id")),
    request_body = UpdateCharacterRequest,
    responses(
        (status = 200, description = "Updated", body = CreatedCharacterResponse),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such character")
    )
)]
pub async fn update_character(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<UpdateCharacterRequest>,
) -> ApiResult<Json<CreatedCharacterResponse>> {
    let id = parse_path_id(&raw_id)?;

    let patch = CharacterPatch {
        title: payload.title,
        meaning: payload.meaning,
        img: payload.img,
        description: payload.description,
        mnemo_img: payload.mnemo_img,
        mnemo_disc: payload.mnemo_disc,
        variants: payload.variants,
        exam_level: payload.exam_level,
        linked_ids: payload.associations.map(|a| a.to_ids()),
        translations: payload.translations,
        examples: payload.examples,
    };

    let updated = state
        .repo
        .update_character(id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("the character with id={id} does not exist")))?;

    Ok(Json(CreatedCharacterResponse {
        message: format!("character with id={id} updated"),
        id: updated.id,
        uri: updated.uri,
    }))
}

/// delete_character
///
/// [Public Route] Removes a character and everything hanging off it: links,
/// translations, examples, the typed extension row, then the character itself,
/// in one transaction. A character whose extension row has gone missing is
/// still removed cleanly.
#[utoipa::path(
    delete,
    path = "/characters/{id}",
    params(("id" = i64, Path, description = "Character id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such character")
    )
)]
pub async fn delete_character(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_path_id(&raw_id)?;

    // Existence check first: deleting a ghost id is a client error, not a no-op.
    state
        .repo
        .find_character(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("the character with id={id} does not exist")))?;

    let deleted = state.repo.delete_character(id).await?;
    if !deleted {
        // Vanished between the check and the transaction.
        return Err(ApiError::not_found(format!(
            "the character with id={id} does not exist"
        )));
    }

    Ok(Json(MessageResponse {
        message: format!("character with id={id} deleted successfully"),
    }))
}

/// get_upload_url
///
/// [Admin Route] Generates a temporary, signed URL for direct client-to-storage
/// upload of character artwork (`img` / `mnemoImg`).
///
/// *Constraints*: admin-only, image content types only, short-lived URL with a
/// unique object key under `characters/`.
#[utoipa::path(
    post,
    path = "/uploads/presigned",
    request_body = UploadUrlRequest,
    responses(
        (status = 200, description = "URL", body = UploadUrlResponse),
        (status = 400, description = "Not an image content type"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_upload_url(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UploadUrlRequest>,
) -> ApiResult<Json<UploadUrlResponse>> {
    if role != "ADMIN" {
        return Err(ApiError::forbidden("only admins may upload character artwork"));
    }

    if !payload.file_type.starts_with("image/") {
        return Err(ApiError::bad_request(format!(
            "character artwork must be an image content type, got '{}'",
            payload.file_type
        )));
    }

    // Unique, structured object key (e.g. 'characters/UUID.png').
    let extension = std::path::Path::new(&payload.filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("bin");
    let object_key = format!("characters/{}.{}", Uuid::new_v4(), extension);

    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(|e| ApiError::internal(format!("failed to presign upload URL: {e}")))?;

    Ok(Json(UploadUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}
