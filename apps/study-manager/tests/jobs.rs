//! Background job tests.

mod common;

use common::TestContext;
use immersion_core::CancelToken;
use immersion_study_lib::db::{LexiconRepository, SqliteRepository};
use immersion_study_lib::services::{comprehension, coverage, jobs};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

fn shared(ctx: TestContext) -> Arc<Mutex<SqliteRepository>> {
    Arc::new(Mutex::new(ctx.repo))
}

/// Test a prediction job runs on the blocking pool.
#[tokio::test]
async fn test_prediction_job() {
    let ctx = TestContext::new();
    ctx.add_studying_text("show", &["猫犬"]);
    let cat = ctx.repo.find_dictionary_form("猫").unwrap().unwrap().id;
    comprehension::set_dictionary_form_known(&ctx.repo, cat, true).unwrap();
    let dog_card = ctx.add_card("Words", "犬", "犬");
    let pool = coverage::n_plus_one_pool(&ctx.repo, "Words", 1).unwrap();

    let job = jobs::spawn_prediction(shared(ctx), pool, 3, CancelToken::new());
    let prediction = job.join().await.unwrap();
    assert_eq!(prediction.chosen, vec![dog_card]);
    assert_eq!(prediction.delta, 50.0);
}

/// Test a cancelled prediction job reports cancellation.
#[tokio::test]
async fn test_cancelled_prediction_job() {
    let ctx = TestContext::new();
    ctx.add_studying_text("show", &["猫犬"]);
    ctx.add_card("Words", "犬", "犬");
    let pool = coverage::n_plus_one_pool(&ctx.repo, "Words", 1).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let job = jobs::spawn_prediction(shared(ctx), pool, 3, cancel);
    let err = job.join().await.unwrap_err();
    assert!(err.is_cancelled());
}

/// Test a set cover job and its cancellation.
#[tokio::test]
async fn test_set_cover_job() {
    let ctx = TestContext::new();
    let t1 = ctx.add_text("t1", &["猫犬"]);
    let t2 = ctx.add_text("t2", &["犬魚"]);
    let targets: BTreeSet<i64> = ["猫", "犬", "魚"]
        .iter()
        .map(|w| ctx.repo.find_dictionary_form(w).unwrap().unwrap().id)
        .collect();
    let repo = shared(ctx);

    let job = jobs::spawn_set_cover(
        repo.clone(),
        targets.clone(),
        vec![t1, t2],
        None,
        CancelToken::new(),
    );
    assert_eq!(job.join().await.unwrap(), vec![t1, t2]);

    let cancel = CancelToken::new();
    let job = jobs::spawn_set_cover(repo, targets, vec![t1, t2], None, cancel.clone());
    job.cancel();
    let result = job.join().await;
    match result {
        Ok(chosen) => assert_eq!(chosen, vec![t1, t2]),
        Err(err) => assert!(err.is_cancelled()),
    }
    assert!(cancel.is_cancelled());
}
