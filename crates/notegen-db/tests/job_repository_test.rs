//! PostgreSQL job repository integration tests.
//!
//! These tests need a migrated database; run with
//! `DATABASE_URL=... cargo test -p notegen-db -- --ignored`.

use notegen_db::{
    test_fixtures::test_database_url, AudioStore, Database, Error, GenerationJob, JobConfig,
    JobKind, JobOutput, JobRepository, JobStatus, NarrationConfig, Note, NoteSource, QuestionType,
    QuizConfig, QuizOutput, StageArtifact, NarrationScript, TagRepository,
};
use notegen_core::state::StageOutput;
use uuid::Uuid;

async fn setup_db() -> Database {
    let _ = dotenvy::dotenv();
    let db = Database::connect(&test_database_url())
        .await
        .expect("Failed to connect to test database");
    db.migrate().await.expect("Failed to run migrations");
    db
}

fn quiz_job(owner: Uuid) -> GenerationJob {
    GenerationJob::new(
        owner,
        Uuid::new_v4(),
        JobConfig::Quiz(QuizConfig {
            question_count: 3,
            question_type: QuestionType::Flashcard,
            difficulty: Default::default(),
            language: None,
        }),
    )
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_insert_and_get_round_trip() {
    let db = setup_db().await;
    let job = quiz_job(Uuid::new_v4());
    db.jobs.insert(&job).await.unwrap();

    let loaded = db.jobs.load(job.id).await.unwrap();
    assert_eq!(loaded.id, job.id);
    assert_eq!(loaded.kind, JobKind::Quiz);
    assert_eq!(loaded.status, JobStatus::Pending);
    assert_eq!(loaded.config, job.config);
    assert!(loaded.result.is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_claim_is_exclusive() {
    let db = setup_db().await;
    let job = quiz_job(Uuid::new_v4());
    db.jobs.insert(&job).await.unwrap();

    let (a, b) = tokio::join!(
        db.jobs
            .compare_and_set_status(job.id, JobStatus::Pending, JobStatus::Processing),
        db.jobs
            .compare_and_set_status(job.id, JobStatus::Pending, JobStatus::Processing),
    );
    let claims = [a.unwrap(), b.unwrap()];
    assert_eq!(claims.iter().filter(|c| **c).count(), 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_save_processed_then_reject_rewrite() {
    let db = setup_db().await;
    let mut job = quiz_job(Uuid::new_v4());
    db.jobs.insert(&job).await.unwrap();

    job.begin_stage().unwrap();
    db.jobs
        .compare_and_set_status(job.id, JobStatus::Pending, JobStatus::Processing)
        .await
        .unwrap();
    job.complete_stage(StageOutput::Final(JobOutput::Quiz(QuizOutput {
        questions: vec![],
        tag_ids: vec![],
    })))
    .unwrap();
    db.jobs.save(&job).await.unwrap();

    let loaded = db.jobs.load(job.id).await.unwrap();
    assert_eq!(loaded.status, JobStatus::Processed);
    assert!(loaded.result.is_some());

    let err = db.jobs.save(&job).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_intermediate_script_persists() {
    let db = setup_db().await;
    let mut job = GenerationJob::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        JobConfig::Narration(NarrationConfig::default()),
    );
    db.jobs.insert(&job).await.unwrap();

    job.begin_stage().unwrap();
    job.complete_stage(StageOutput::Intermediate(StageArtifact::Script(NarrationScript {
        title: None,
        transcript: "A short script.".into(),
        word_count: 3,
        sentence_count: 1,
        estimated_duration: "10 sec".into(),
        tag_ids: vec![],
    })))
    .unwrap();
    db.jobs.save(&job).await.unwrap();

    let loaded = db.jobs.load(job.id).await.unwrap();
    assert_eq!(loaded.status, JobStatus::WaitingForSpeech);
    assert_eq!(loaded.script().map(|s| s.word_count), Some(3));

    let waiting = db
        .jobs
        .list_in_statuses(JobKind::Narration, &[JobStatus::WaitingForSpeech])
        .await
        .unwrap();
    assert!(waiting.iter().any(|j| j.id == job.id));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_failed_message_is_capped() {
    let db = setup_db().await;
    let mut job = quiz_job(Uuid::new_v4());
    db.jobs.insert(&job).await.unwrap();

    job.begin_stage().unwrap();
    job.fail("e".repeat(5000)).unwrap();
    db.jobs.save(&job).await.unwrap();

    let loaded = db.jobs.load(job.id).await.unwrap();
    assert_eq!(loaded.status, JobStatus::Failed);
    assert_eq!(loaded.error_message.unwrap().as_str().len(), 1000);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_collaborators_are_owner_scoped() {
    let db = setup_db().await;
    let owner = Uuid::new_v4();
    let note = Note {
        id: Uuid::new_v4(),
        owner_id: owner,
        title: Some("Photosynthesis".into()),
        content: "Plants convert light into chemical energy.".into(),
    };
    db.notes.insert(&note).await.unwrap();
    assert!(db.notes.get_note(owner, note.id).await.unwrap().is_some());
    assert!(db.notes.get_note(Uuid::new_v4(), note.id).await.unwrap().is_none());

    let first = db.tags.create(owner, "Biology").await.unwrap();
    let again = db.tags.create(owner, "biology").await.unwrap();
    assert_eq!(first, again);
    assert_eq!(db.tags.list_for_owner(owner).await.unwrap().len(), 1);

    let audio_id = db
        .audio
        .store_audio(owner, "clip.wav", "audio/wav", vec![0, 1, 2])
        .await
        .unwrap();
    let blob = db.audio.load_audio(owner, audio_id).await.unwrap().unwrap();
    assert_eq!(blob.data, vec![0, 1, 2]);
}
