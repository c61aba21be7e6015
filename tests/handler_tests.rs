use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use kanji_atlas::{
    AppState,
    auth::AuthUser,
    config::AppConfig,
    error::ApiError,
    handlers,
    models::{
        AssociationId, AssociationIds, Character, CharacterList, CharacterPatch, CharacterType,
        Component, CreateCharacterRequest, CreatedCharacter, Example, Kanji, KanjiComponentLink,
        NewCharacter, Translation, TranslationEntry, UpdateCharacterRequest, User,
    },
    repository::{CharacterRepository, RepositoryState},
    storage::MockArtworkStore,
};
use std::sync::{Arc, Mutex};
use tokio::test;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// Central control point for testing handler logic. Handlers rely on the
// repository trait, so the trait implementation is mocked: pre-canned rows go
// in, write inputs are captured for inspection, and the `forbid_*` flags panic
// when a handler touches the store past a point where it must have stopped.
pub struct MockRepoControl {
    // Pre-canned reads
    pub character: Option<Character>,
    pub kanji: Option<Kanji>,
    pub component: Option<Component>,
    pub translations: Vec<Translation>,
    pub examples: Vec<Example>,
    pub links: Vec<KanjiComponentLink>,
    pub list: CharacterList,
    pub user: Option<User>,

    // Pre-canned write results
    pub created: CreatedCharacter,
    pub update_result: Option<CreatedCharacter>,
    pub delete_result: bool,

    // Guards: panic if the handler reads/writes where it must have short-circuited.
    pub forbid_all_queries: bool,
    pub forbid_detail_queries: bool,
    pub forbid_writes: bool,

    // Captured write inputs for assertions.
    pub captured_create: Mutex<Option<NewCharacter>>,
    pub captured_patch: Mutex<Option<(i64, CharacterPatch)>>,
}

impl Default for MockRepoControl {
    fn default() -> Self {
        MockRepoControl {
            character: None,
            kanji: None,
            component: None,
            translations: vec![],
            examples: vec![],
            links: vec![],
            list: CharacterList::default(),
            user: None,
            created: CreatedCharacter::default(),
            update_result: None,
            delete_result: true,
            forbid_all_queries: false,
            forbid_detail_queries: false,
            forbid_writes: false,
            captured_create: Mutex::new(None),
            captured_patch: Mutex::new(None),
        }
    }
}

impl MockRepoControl {
    fn guard_any(&self) {
        if self.forbid_all_queries {
            panic!("the handler touched the repository where it must have short-circuited");
        }
    }

    fn guard_detail(&self) {
        self.guard_any();
        if self.forbid_detail_queries {
            panic!("the handler issued a detail query after a failed lookup");
        }
    }

    fn guard_write(&self) {
        self.guard_any();
        if self.forbid_writes {
            panic!("the handler issued a write where it must have short-circuited");
        }
    }
}

#[async_trait]
impl CharacterRepository for MockRepoControl {
    async fn find_character(&self, _id: i64) -> Result<Option<Character>, sqlx::Error> {
        self.guard_any();
        Ok(self.character.clone())
    }
    async fn list_characters(&self) -> Result<CharacterList, sqlx::Error> {
        self.guard_any();
        Ok(self.list.clone())
    }
    async fn find_kanji_by_character(&self, _id: i64) -> Result<Option<Kanji>, sqlx::Error> {
        self.guard_detail();
        Ok(self.kanji.clone())
    }
    async fn find_component_by_character(
        &self,
        _id: i64,
    ) -> Result<Option<Component>, sqlx::Error> {
        self.guard_detail();
        Ok(self.component.clone())
    }
    async fn list_translations(&self, _kanji_id: i64) -> Result<Vec<Translation>, sqlx::Error> {
        self.guard_detail();
        Ok(self.translations.clone())
    }
    async fn list_examples(&self, _kanji_id: i64) -> Result<Vec<Example>, sqlx::Error> {
        self.guard_detail();
        Ok(self.examples.clone())
    }
    async fn list_links_by_kanji(
        &self,
        _kanji_id: i64,
    ) -> Result<Vec<KanjiComponentLink>, sqlx::Error> {
        self.guard_detail();
        Ok(self.links.clone())
    }
    async fn list_links_by_component(
        &self,
        _component_id: i64,
    ) -> Result<Vec<KanjiComponentLink>, sqlx::Error> {
        self.guard_detail();
        Ok(self.links.clone())
    }
    async fn create_character(
        &self,
        input: NewCharacter,
    ) -> Result<CreatedCharacter, sqlx::Error> {
        self.guard_write();
        *self.captured_create.lock().unwrap() = Some(input);
        Ok(self.created.clone())
    }
    async fn update_character(
        &self,
        id: i64,
        patch: CharacterPatch,
    ) -> Result<Option<CreatedCharacter>, sqlx::Error> {
        self.guard_write();
        *self.captured_patch.lock().unwrap() = Some((id, patch));
        Ok(self.update_result.clone())
    }
    async fn delete_character(&self, _id: i64) -> Result<bool, sqlx::Error> {
        self.guard_write();
        Ok(self.delete_result)
    }
    async fn find_user(&self, _id: i64) -> Result<Option<User>, sqlx::Error> {
        Ok(self.user.clone())
    }
}

// --- TEST UTILITIES ---

fn create_test_state(repo_control: MockRepoControl) -> (Arc<MockRepoControl>, AppState) {
    let repo = Arc::new(repo_control);
    let repo_state: RepositoryState = repo.clone();
    let state = AppState {
        repo: repo_state,
        storage: Arc::new(MockArtworkStore::new()),
        config: AppConfig::default(),
    };
    (repo, state)
}

fn admin_user() -> AuthUser {
    AuthUser {
        id: 1,
        role: "ADMIN".to_string(),
    }
}

fn plain_user() -> AuthUser {
    AuthUser {
        id: 2,
        role: "USER".to_string(),
    }
}

fn sample_character(character_type: CharacterType) -> Character {
    Character {
        id: 7,
        title: "山".to_string(),
        character_type,
        meaning: "mountain".to_string(),
        uri: Some("7-mountain".to_string()),
        ..Character::default()
    }
}

fn sample_kanji() -> Kanji {
    Kanji {
        id: 3,
        exam_level: Some(5),
        character_id: 7,
        ..Kanji::default()
    }
}

// --- GET ONE ---

#[test]
async fn get_character_rejects_uri_without_dash() {
    let (_, state) = create_test_state(MockRepoControl {
        forbid_all_queries: true,
        ..MockRepoControl::default()
    });

    let result = handlers::get_character(State(state), Path("12".to_string())).await;

    assert!(matches!(result.unwrap_err(), ApiError::BadRequest(_)));
}

#[test]
async fn get_character_rejects_non_numeric_id() {
    let (_, state) = create_test_state(MockRepoControl {
        forbid_all_queries: true,
        ..MockRepoControl::default()
    });

    let result = handlers::get_character(State(state), Path("abc-def".to_string())).await;

    assert!(matches!(result.unwrap_err(), ApiError::BadRequest(_)));
}

#[test]
async fn get_character_rejects_zero_id() {
    let (_, state) = create_test_state(MockRepoControl {
        forbid_all_queries: true,
        ..MockRepoControl::default()
    });

    let result = handlers::get_character(State(state), Path("0-zero".to_string())).await;

    assert!(matches!(result.unwrap_err(), ApiError::BadRequest(_)));
}

#[test]
async fn get_character_unknown_id_stops_after_first_lookup() {
    // character = None and every detail query panics: the handler must report
    // not-found from the first lookup alone.
    let (_, state) = create_test_state(MockRepoControl {
        character: None,
        forbid_detail_queries: true,
        ..MockRepoControl::default()
    });

    let result = handlers::get_character(State(state), Path("99-ghost".to_string())).await;

    assert!(matches!(result.unwrap_err(), ApiError::NotFound(_)));
}

#[test]
async fn get_character_kanji_shape() {
    let (_, state) = create_test_state(MockRepoControl {
        character: Some(sample_character(CharacterType::Kanji)),
        kanji: Some(sample_kanji()),
        translations: vec![Translation::default(), Translation::default()],
        examples: vec![Example::default()],
        links: vec![KanjiComponentLink {
            id: 1,
            kanji_id: 3,
            component_id: 8,
            ..KanjiComponentLink::default()
        }],
        ..MockRepoControl::default()
    });

    let Json(details) = handlers::get_character(State(state), Path("7-mountain".to_string()))
        .await
        .expect("kanji detail should resolve");

    let value = serde_json::to_value(&details).unwrap();
    assert_eq!(value["characterPart"]["title"], "山");
    assert_eq!(value["characterPart"]["type"], "KANJI");
    assert_eq!(value["kanjiPart"]["examLevel"], 5);
    assert_eq!(value["kanjiPart"]["translations"].as_array().unwrap().len(), 2);
    assert_eq!(value["kanjiPart"]["examples"].as_array().unwrap().len(), 1);
    assert_eq!(value["associations"].as_array().unwrap().len(), 1);
    // Kanji payloads never carry component-scoped keys.
    assert!(value.get("componentPart").is_none());
}

#[test]
async fn get_character_component_shape() {
    let (_, state) = create_test_state(MockRepoControl {
        character: Some(sample_character(CharacterType::Component)),
        component: Some(Component {
            id: 4,
            character_id: 7,
            ..Component::default()
        }),
        links: vec![KanjiComponentLink::default(), KanjiComponentLink::default()],
        ..MockRepoControl::default()
    });

    let Json(details) = handlers::get_character(State(state), Path("7-mountain".to_string()))
        .await
        .expect("component detail should resolve");

    let value = serde_json::to_value(&details).unwrap();
    assert_eq!(value["characterPart"]["type"], "COMPONENT");
    assert_eq!(value["componentPart"]["id"], 4);
    assert_eq!(value["associations"].as_array().unwrap().len(), 2);
    // Component payloads never carry kanji-scoped data.
    assert!(value.get("kanjiPart").is_none());
}

#[test]
async fn get_character_missing_extension_row_is_internal_error() {
    // A KANJI character without its kanji row is an invariant violation, not a
    // client error, and it must not crash the handler.
    let (_, state) = create_test_state(MockRepoControl {
        character: Some(sample_character(CharacterType::Kanji)),
        kanji: None,
        ..MockRepoControl::default()
    });

    let result = handlers::get_character(State(state), Path("7-mountain".to_string())).await;

    assert!(matches!(result.unwrap_err(), ApiError::Internal(_)));
}

// --- GET ALL ---

#[test]
async fn list_characters_returns_count_and_rows() {
    let (_, state) = create_test_state(MockRepoControl {
        list: CharacterList {
            count: 2,
            rows: vec![
                sample_character(CharacterType::Kanji),
                sample_character(CharacterType::Component),
            ],
        },
        ..MockRepoControl::default()
    });

    let Json(list) = handlers::list_characters(State(state)).await.unwrap();

    assert_eq!(list.count, 2);
    assert_eq!(list.rows.len(), 2);
}

// --- CREATE ---

#[test]
async fn create_character_requires_admin_role() {
    let (_, state) = create_test_state(MockRepoControl {
        forbid_writes: true,
        ..MockRepoControl::default()
    });

    let result = handlers::create_character(
        plain_user(),
        State(state),
        Json(CreateCharacterRequest {
            character_type: "KANJI".to_string(),
            ..CreateCharacterRequest::default()
        }),
    )
    .await;

    assert!(matches!(result.unwrap_err(), ApiError::Forbidden(_)));
}

#[test]
async fn create_character_rejects_unknown_type_before_any_write() {
    let (_, state) = create_test_state(MockRepoControl {
        forbid_writes: true,
        ..MockRepoControl::default()
    });

    let result = handlers::create_character(
        admin_user(),
        State(state),
        Json(CreateCharacterRequest {
            character_type: "WORD".to_string(),
            title: "言葉".to_string(),
            meaning: "word".to_string(),
            ..CreateCharacterRequest::default()
        }),
    )
    .await;

    assert!(matches!(result.unwrap_err(), ApiError::BadRequest(_)));
}

#[test]
async fn create_kanji_normalizes_associations_and_keeps_examples_separate() {
    let (repo, state) = create_test_state(MockRepoControl {
        created: CreatedCharacter {
            id: 11,
            uri: "11-mountain".to_string(),
        },
        ..MockRepoControl::default()
    });

    let translations = vec![
        TranslationEntry {
            jp_normal_text: Some("山が高い。".to_string()),
            en_text: Some("The mountain is tall.".to_string()),
            ..TranslationEntry::default()
        },
        TranslationEntry::default(),
    ];
    let examples = vec![TranslationEntry {
        jp_normal_text: Some("富士山".to_string()),
        ..TranslationEntry::default()
    }];

    let (status, Json(response)) = handlers::create_character(
        admin_user(),
        State(state),
        Json(CreateCharacterRequest {
            character_type: "KANJI".to_string(),
            title: "山".to_string(),
            meaning: "mountain".to_string(),
            exam_level: Some(5),
            associations: AssociationIds::List(vec![
                AssociationId::Text("2".to_string()),
                AssociationId::Text("x".to_string()),
                AssociationId::Text("0".to_string()),
                AssociationId::Text("3".to_string()),
                AssociationId::Num(7),
            ]),
            translations: translations.clone(),
            examples: examples.clone(),
            ..CreateCharacterRequest::default()
        }),
    )
    .await
    .expect("create should succeed");

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.id, 11);
    assert_eq!(response.uri, "11-mountain");

    let captured = repo.captured_create.lock().unwrap().clone().unwrap();
    assert_eq!(captured.character_type, CharacterType::Kanji);
    // Only entries parsing to positive integers survive.
    assert_eq!(captured.linked_ids, vec![2, 3, 7]);
    assert_eq!(captured.exam_level, Some(5));
    // Examples stay examples; translations stay translations.
    assert_eq!(captured.translations, translations);
    assert_eq!(captured.examples, examples);
}

#[test]
async fn create_component_accepts_delimited_associations() {
    let (repo, state) = create_test_state(MockRepoControl {
        created: CreatedCharacter {
            id: 12,
            uri: "12-cliff".to_string(),
        },
        ..MockRepoControl::default()
    });

    let (status, Json(response)) = handlers::create_character(
        admin_user(),
        State(state),
        Json(CreateCharacterRequest {
            character_type: "COMPONENT".to_string(),
            title: "厂".to_string(),
            meaning: "cliff".to_string(),
            associations: AssociationIds::Delimited("1,2,,9,x".to_string()),
            ..CreateCharacterRequest::default()
        }),
    )
    .await
    .expect("create should succeed");

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.uri, "12-cliff");

    let captured = repo.captured_create.lock().unwrap().clone().unwrap();
    assert_eq!(captured.character_type, CharacterType::Component);
    assert_eq!(captured.linked_ids, vec![1, 2, 9]);
    assert!(captured.translations.is_empty());
    assert!(captured.examples.is_empty());
}

// --- UPDATE ---

#[test]
async fn update_character_rejects_non_numeric_id() {
    let (_, state) = create_test_state(MockRepoControl {
        forbid_all_queries: true,
        forbid_writes: true,
        ..MockRepoControl::default()
    });

    let result = handlers::update_character(
        State(state),
        Path("abc".to_string()),
        Json(UpdateCharacterRequest::default()),
    )
    .await;

    assert!(matches!(result.unwrap_err(), ApiError::BadRequest(_)));
}

#[test]
async fn update_unknown_character_is_not_found() {
    let (_, state) = create_test_state(MockRepoControl {
        update_result: None,
        ..MockRepoControl::default()
    });

    let result = handlers::update_character(
        State(state),
        Path("99".to_string()),
        Json(UpdateCharacterRequest::default()),
    )
    .await;

    assert!(matches!(result.unwrap_err(), ApiError::NotFound(_)));
}

#[test]
async fn update_character_passes_patch_and_returns_recomputed_uri() {
    let (repo, state) = create_test_state(MockRepoControl {
        update_result: Some(CreatedCharacter {
            id: 4,
            uri: "4-river".to_string(),
        }),
        ..MockRepoControl::default()
    });

    let Json(response) = handlers::update_character(
        State(state),
        Path("4".to_string()),
        Json(UpdateCharacterRequest {
            meaning: Some("river".to_string()),
            translations: Some(vec![TranslationEntry::default()]),
            ..UpdateCharacterRequest::default()
        }),
    )
    .await
    .expect("update should succeed");

    assert_eq!(response.id, 4);
    assert_eq!(response.uri, "4-river");

    let (id, patch) = repo.captured_patch.lock().unwrap().clone().unwrap();
    assert_eq!(id, 4);
    assert_eq!(patch.meaning.as_deref(), Some("river"));
    // Collections arrive as replace-all payloads only when provided.
    assert_eq!(patch.translations.as_ref().map(Vec::len), Some(1));
    assert!(patch.examples.is_none());
    assert!(patch.linked_ids.is_none());
}

// --- DELETE ---

#[test]
async fn delete_character_rejects_non_numeric_id() {
    let (_, state) = create_test_state(MockRepoControl {
        forbid_all_queries: true,
        forbid_writes: true,
        ..MockRepoControl::default()
    });

    let result = handlers::delete_character(State(state), Path("x7".to_string())).await;

    assert!(matches!(result.unwrap_err(), ApiError::BadRequest(_)));
}

#[test]
async fn delete_unknown_character_mutates_nothing() {
    let (_, state) = create_test_state(MockRepoControl {
        character: None,
        forbid_writes: true,
        ..MockRepoControl::default()
    });

    let result = handlers::delete_character(State(state), Path("99".to_string())).await;

    assert!(matches!(result.unwrap_err(), ApiError::NotFound(_)));
}

#[test]
async fn delete_character_confirms_with_message() {
    let (_, state) = create_test_state(MockRepoControl {
        character: Some(sample_character(CharacterType::Kanji)),
        delete_result: true,
        ..MockRepoControl::default()
    });

    let Json(response) = handlers::delete_character(State(state), Path("7".to_string()))
        .await
        .expect("delete should succeed");

    assert!(response.message.contains("id=7"));
}
