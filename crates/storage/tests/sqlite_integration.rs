use chrono::Duration;
use quiz_core::model::{
    Attempt, QuestionDraft, QuestionId, QuizState, Subject, SubjectStat, UserId,
};
use quiz_core::time::fixed_now;
use storage::repository::{
    AttemptRepository, BookmarkRepository, PreferenceRepository, QuestionRecord,
    QuestionRepository, QuizStateRepository, StorageError, SubjectStatRepository,
};
use storage::sqlite::SqliteRepository;

async fn open(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    SqliteRepository::open(&url).await.expect("open")
}

fn user() -> UserId {
    UserId::new("user-1").unwrap()
}

fn qid(id: &str) -> QuestionId {
    QuestionId::new(id).unwrap()
}

fn record(id: &str, subject: &str, offset_secs: i64) -> QuestionRecord {
    QuestionRecord {
        draft: QuestionDraft {
            id: id.into(),
            text: Some(format!("Question {id}")),
            options: Some(vec!["A".into(), "B".into(), "C".into()]),
            correct_indices: Some(vec![0, 2]),
            kind: Some("single".into()),
            explanation: None,
            subject: Some(subject.into()),
        },
        created_at: fixed_now() + Duration::seconds(offset_secs),
    }
}

#[tokio::test]
async fn questions_page_newest_first_and_count() {
    let repo = open("memdb_questions").await;
    let rows: Vec<_> = (0..5)
        .map(|i| record(&format!("q{i}"), "Orthopaedics", i))
        .chain(std::iter::once(record("other", "Anatomy", 10)))
        .collect();
    assert_eq!(repo.upsert_questions(&rows).await.unwrap(), 6);

    let page = repo.list_questions("Orthopaedics", 0, 3).await.unwrap();
    let ids: Vec<_> = page.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["q4", "q3", "q2"]);

    let question = page[0].clone().normalize().unwrap();
    assert_eq!(question.kind().as_str(), "multi");
    assert_eq!(question.options().len(), 3);

    assert_eq!(repo.count_questions("Orthopaedics").await.unwrap(), 5);
    assert_eq!(repo.count_questions("Skin").await.unwrap(), 0);
}

#[tokio::test]
async fn attempts_are_unique_per_user_and_question() {
    let repo = open("memdb_attempts").await;
    let subject = Subject::from("Anatomy");
    let first = Attempt::new(user(), qid("q1"), subject.clone(), vec![1], false, fixed_now());
    repo.insert_attempt(&first).await.unwrap();

    let again = Attempt::new(user(), qid("q1"), subject.clone(), vec![0], true, fixed_now());
    let err = repo.insert_attempt(&again).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let stored = repo.find_attempt(&user(), &qid("q1")).await.unwrap().unwrap();
    assert_eq!(stored, first);
    assert_eq!(stored.marks_delta, -1);
}

#[tokio::test]
async fn attempt_pages_are_stable_and_filtered() {
    let repo = open("memdb_attempt_pages").await;
    let anatomy = Subject::from("Anatomy");
    for i in 0..5 {
        let at = fixed_now() + Duration::seconds(i);
        let attempt = Attempt::new(user(), qid(&format!("q{i}")), anatomy.clone(), vec![0], i % 2 == 0, at);
        repo.insert_attempt(&attempt).await.unwrap();
    }
    let other = Attempt::new(user(), qid("p1"), Subject::from("Physiology"), vec![0], true, fixed_now());
    repo.insert_attempt(&other).await.unwrap();

    let first = repo.list_attempts(&user(), &anatomy, 0, 3).await.unwrap();
    let second = repo.list_attempts(&user(), &anatomy, 3, 3).await.unwrap();
    let ids: Vec<_> = first
        .iter()
        .chain(second.iter())
        .map(|a| a.question_id.as_str().to_owned())
        .collect();
    assert_eq!(ids, ["q0", "q1", "q2", "q3", "q4"]);

    let attempted = repo
        .attempted_question_ids(&user(), &[qid("q1"), qid("zz"), qid("p1")])
        .await
        .unwrap();
    assert_eq!(attempted.len(), 2);

    repo.delete_attempts(&user(), &anatomy).await.unwrap();
    assert!(repo.list_attempts(&user(), &anatomy, 0, 10).await.unwrap().is_empty());
    assert!(repo.find_attempt(&user(), &qid("p1")).await.unwrap().is_some());
}

#[tokio::test]
async fn stats_upsert_overwrites_row() {
    let repo = open("memdb_stats").await;
    let subject = Subject::from("Anatomy");
    let stat = SubjectStat::from_persisted(subject.clone(), 3, 2, 1, 7).unwrap();
    repo.upsert_stat(&user(), &stat, fixed_now()).await.unwrap();
    let stat = SubjectStat::from_persisted(subject.clone(), 4, 2, 2, 6).unwrap();
    repo.upsert_stat(&user(), &stat, fixed_now()).await.unwrap();

    let rows = repo.list_stats(&user()).await.unwrap();
    assert_eq!(rows, vec![stat]);

    repo.delete_stat(&user(), &subject).await.unwrap();
    assert!(repo.list_stats(&user()).await.unwrap().is_empty());
}

#[tokio::test]
async fn unbalanced_stat_row_is_repaired_in_listing() {
    let repo = open("memdb_stats_unbalanced").await;
    sqlx::query(
        "INSERT INTO user_subject_stats (user_id, subject, attempted, correct, wrong, marks, updated_at)
         VALUES (?1, 'Anatomy', 3, 1, 1, 3, ?2), (?1, 'Physiology', 2, 2, 0, 8, ?2)",
    )
    .bind(user().as_str())
    .bind(fixed_now())
    .execute(repo.pool())
    .await
    .unwrap();

    let rows = repo.list_stats(&user()).await.unwrap();
    assert_eq!(
        rows,
        vec![
            SubjectStat::from_persisted(Subject::from("Anatomy"), 3, 1, 2, 3).unwrap(),
            SubjectStat::from_persisted(Subject::from("Physiology"), 2, 2, 0, 8).unwrap(),
        ]
    );
}

#[tokio::test]
async fn quiz_state_round_trips_including_null_question() {
    let repo = open("memdb_quiz_state").await;
    let subject = Subject::from("Anatomy");
    assert!(repo.get_quiz_state(&user(), &subject).await.unwrap().is_none());

    let state = QuizState::new(subject.clone(), None, 600, false);
    repo.upsert_quiz_state(&user(), &state, fixed_now()).await.unwrap();
    assert_eq!(repo.get_quiz_state(&user(), &subject).await.unwrap(), Some(state));

    let state = QuizState::new(subject.clone(), Some(qid("q7")), 42, true);
    repo.upsert_quiz_state(&user(), &state, fixed_now()).await.unwrap();
    assert_eq!(repo.get_quiz_state(&user(), &subject).await.unwrap(), Some(state));

    repo.delete_quiz_state(&user(), &subject).await.unwrap();
    assert!(repo.get_quiz_state(&user(), &subject).await.unwrap().is_none());
}

#[tokio::test]
async fn bookmarks_join_question_text_newest_first() {
    let repo = open("memdb_bookmarks").await;
    repo.upsert_questions(&[record("q1", "Anatomy", 0)]).await.unwrap();
    let subject = Subject::from("Anatomy");

    repo.upsert_bookmark(&user(), &qid("q1"), &subject, fixed_now())
        .await
        .unwrap();
    repo.upsert_bookmark(&user(), &qid("gone"), &subject, fixed_now() + Duration::minutes(1))
        .await
        .unwrap();
    // Saving again keeps the original timestamp.
    repo.upsert_bookmark(&user(), &qid("q1"), &subject, fixed_now() + Duration::hours(1))
        .await
        .unwrap();

    let rows = repo.list_bookmarks(&user()).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].question_id, qid("gone"));
    assert_eq!(rows[0].question_text, None);
    assert_eq!(rows[1].question_text.as_deref(), Some("Question q1"));
    assert_eq!(rows[1].created_at, Some(fixed_now()));

    assert!(repo.bookmark_exists(&user(), &qid("q1")).await.unwrap());
    repo.delete_bookmark(&user(), &qid("q1")).await.unwrap();
    assert!(!repo.bookmark_exists(&user(), &qid("q1")).await.unwrap());
}

#[tokio::test]
async fn preferences_are_key_value() {
    let repo = open("memdb_prefs").await;
    assert_eq!(repo.get_preference("theme").await.unwrap(), None);
    repo.set_preference("theme", "dark").await.unwrap();
    repo.set_preference("theme", "light").await.unwrap();
    assert_eq!(repo.get_preference("theme").await.unwrap().as_deref(), Some("light"));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = open("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}
