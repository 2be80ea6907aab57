use rand::rngs::StdRng;
use rand::SeedableRng;

use aura_keygen::config::WriteMode;
use aura_keygen::key_generation::{generate_unique_key_with, is_valid_key_format};
use aura_keygen::license_key::LicenseKey;
use aura_keygen::store::memory::WriteKind;
use aura_keygen::store::MemoryKeyStore;
use aura_keygen::upload::{
    upload_keys_to_firestore, upload_keys_with_rng, KeyOutcome, UploadFailure, UploadOptions,
};

fn output_lines(out: Vec<u8>) -> Vec<String> {
    String::from_utf8(out)
        .expect("progress output is UTF-8")
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn succeeding_store_gets_exactly_n_fresh_documents() {
    let store = MemoryKeyStore::default();
    let mut out = Vec::new();

    let report = upload_keys_to_firestore(&store, &UploadOptions::with_num_keys(10), &mut out)
        .await
        .unwrap();

    assert_eq!(report.requested, 10);
    assert_eq!(report.succeeded(), 10);
    assert!(report.all_succeeded());
    assert_eq!(store.write_count().unwrap(), 10);

    let docs = store.documents().unwrap();
    assert_eq!(docs.len(), 10);
    for (id, doc) in &docs {
        assert_eq!(id, &doc.key);
        assert!(!doc.is_used);
        assert!(doc.used_by_hwid.is_none());
        assert!(doc.activated_at.is_none());
    }
}

#[tokio::test]
async fn one_failed_write_does_not_stop_the_loop() {
    let store = MemoryKeyStore::default().fail_on_write(2);
    let mut out = Vec::new();

    let report = upload_keys_to_firestore(&store, &UploadOptions::with_num_keys(5), &mut out)
        .await
        .unwrap();

    assert_eq!(store.write_count().unwrap(), 5);
    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.failed(), 1);

    let failed: Vec<&KeyOutcome> = report.failures().collect();
    assert_eq!(failed[0].index(), 2);
    assert!(matches!(
        failed[0],
        KeyOutcome::Failed {
            reason: UploadFailure::Store(_),
            ..
        }
    ));

    let lines = output_lines(out);
    assert_eq!(lines.iter().filter(|l| l.starts_with("Uploaded key")).count(), 4);
    assert!(lines
        .iter()
        .any(|l| l.starts_with(&format!("Error uploading key {}", failed[0].key()))));
    assert!(lines
        .iter()
        .any(|l| l.starts_with("Finished uploading 5 keys")));
    assert!(lines.iter().any(|l| l == "4 succeeded, 1 failed."));
}

#[tokio::test]
async fn three_keys_end_to_end() {
    let store = MemoryKeyStore::default();
    let mut out = Vec::new();

    let report = upload_keys_to_firestore(&store, &UploadOptions::with_num_keys(3), &mut out)
        .await
        .unwrap();

    let docs = store.documents().unwrap();
    assert_eq!(docs.len(), 3);
    for key in report.uploaded_keys() {
        assert!(is_valid_key_format(key));
        let doc = &docs[key];
        assert_eq!(doc, &LicenseKey::new_unused(key));
    }

    let lines = output_lines(out);
    let uploaded: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.starts_with("Uploaded key"))
        .map(|(i, _)| i)
        .collect();
    let finished: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.starts_with("Finished uploading 3 keys"))
        .map(|(i, _)| i)
        .collect();

    assert_eq!(uploaded.len(), 3);
    assert_eq!(finished.len(), 1);
    assert!(uploaded.iter().all(|i| *i < finished[0]));
    assert_eq!(lines[uploaded[0]], format!("Uploaded key 1: {}", report.outcomes[0].key()));
}

#[tokio::test]
async fn collision_is_regenerated_without_overwriting() {
    let seed = 99;
    let colliding = generate_unique_key_with(&mut StdRng::seed_from_u64(seed));

    let mut existing = LicenseKey::new_unused(colliding.clone());
    existing.is_used = true;
    existing.used_by_hwid = Some("HWID-IN-USE".to_string());

    let store = MemoryKeyStore::default();
    store.insert_existing(existing.clone()).unwrap();

    let mut out = Vec::new();
    let report = upload_keys_with_rng(
        &store,
        &UploadOptions::with_num_keys(1),
        &mut StdRng::seed_from_u64(seed),
        &mut out,
    )
    .await
    .unwrap();

    match &report.outcomes[0] {
        KeyOutcome::Uploaded { key, attempts, .. } => {
            assert_eq!(*attempts, 2);
            assert_ne!(key, &colliding);
        }
        other => panic!("expected upload after regeneration, got {other:?}"),
    }

    // The redeemed key is untouched.
    assert_eq!(store.get(&colliding).unwrap(), Some(existing));
    assert_eq!(store.documents().unwrap().len(), 2);
}

#[tokio::test]
async fn collision_attempts_are_bounded() {
    let seed = 5;
    let mut rng = StdRng::seed_from_u64(seed);
    let first = generate_unique_key_with(&mut rng);
    let second = generate_unique_key_with(&mut rng);

    let store = MemoryKeyStore::default();
    store.insert_existing(LicenseKey::new_unused(first)).unwrap();
    store
        .insert_existing(LicenseKey::new_unused(second.clone()))
        .unwrap();

    let options = UploadOptions {
        num_keys: 1,
        max_collision_attempts: 2,
        ..Default::default()
    };
    let mut out = Vec::new();
    let report = upload_keys_with_rng(&store, &options, &mut StdRng::seed_from_u64(seed), &mut out)
        .await
        .unwrap();

    assert!(matches!(
        report.outcomes[0],
        KeyOutcome::Failed {
            reason: UploadFailure::Collision { attempts: 2 },
            ..
        }
    ));
    assert_eq!(report.outcomes[0].key(), second);
    assert_eq!(store.write_count().unwrap(), 2);

    let lines = output_lines(out);
    assert!(lines
        .iter()
        .any(|l| l.starts_with(&format!("Error uploading key {second}"))));
    assert!(lines.iter().any(|l| l == "0 succeeded, 1 failed."));
}

#[tokio::test]
async fn upsert_mode_overwrites_on_collision() {
    let seed = 11;
    let colliding = generate_unique_key_with(&mut StdRng::seed_from_u64(seed));

    let mut existing = LicenseKey::new_unused(colliding.clone());
    existing.is_used = true;
    let store = MemoryKeyStore::default();
    store.insert_existing(existing).unwrap();

    let options = UploadOptions {
        num_keys: 1,
        write_mode: WriteMode::Upsert,
        ..Default::default()
    };
    let mut out = Vec::new();
    let report = upload_keys_with_rng(&store, &options, &mut StdRng::seed_from_u64(seed), &mut out)
        .await
        .unwrap();

    assert_eq!(report.uploaded_keys(), vec![colliding.as_str()]);
    assert!(store.get(&colliding).unwrap().unwrap().is_fresh());
    assert_eq!(
        store.write_log().unwrap(),
        vec![(WriteKind::Upsert, colliding.clone())]
    );
}

#[tokio::test]
async fn custom_prefix_is_applied_to_documents() {
    let store = MemoryKeyStore::new("pro_keys");
    let options = UploadOptions {
        num_keys: 2,
        key_prefix: "PRO".to_string(),
        ..Default::default()
    };
    let mut out = Vec::new();
    upload_keys_to_firestore(&store, &options, &mut out)
        .await
        .unwrap();

    let docs = store.documents().unwrap();
    assert!(docs.keys().all(|k| k.starts_with("PRO-")));
    let lines = output_lines(out);
    assert!(lines
        .iter()
        .any(|l| l == "Finished uploading 2 keys to 'pro_keys' collection."));
}
