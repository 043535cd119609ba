use bson::{Bson, Document, bson, doc};
use docstore::store::{DocumentCodec, SaveOptions, TraceOutcome};
use docstore::{
    AttributeSelector, DeleteOptions, FindOptions, LoadOptions, MemoryBackend, SortSpec,
    StorableType, Store, StoreConfig, StoreError, TraceCollector,
};
use std::sync::Arc;

fn movies() -> (Store, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Store::new(backend.clone());
    store
        .register_storable(StorableType::new("Movie").with_collection("movies"))
        .unwrap();
    (store, backend)
}

async fn seed(store: &Store) {
    for (id, title, year) in [("m1", "Alien", 1979), ("m2", "Aliens", 1986), ("m3", "Heat", 1995)] {
        store
            .save("Movie", &doc! {"id": id, "title": title, "year": year}, &SaveOptions::new_record())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn create_never_overwrites() {
    let (store, backend) = movies();
    seed(&store).await;
    let err = store
        .save("Movie", &doc! {"id": "m1", "title": "Other"}, &SaveOptions::new_record())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExistsInStore { ref collection, .. } if collection == "movies"));
    assert_eq!(err.code(), "ALREADY_EXISTS_IN_STORE");
    assert_eq!(backend.snapshot("movies")[0], doc! {"id": "m1", "title": "Alien", "year": 1979});

    let quiet = SaveOptions { throw_if_exists: Some(false), ..SaveOptions::new_record() };
    assert!(!store.save("Movie", &doc! {"id": "m1"}, &quiet).await.unwrap());
}

#[tokio::test]
async fn create_strips_undefined_fields() {
    let (store, backend) = movies();
    store
        .save("Movie", &doc! {"id": "m9", "title": "Draft", "year": Bson::Undefined}, &SaveOptions::new_record())
        .await
        .unwrap();
    assert_eq!(backend.snapshot("movies"), vec![doc! {"id": "m9", "title": "Draft"}]);
}

#[tokio::test]
async fn load_and_delete_report_absence() {
    let (store, _) = movies();
    let id = doc! {"id": "nope"};
    assert!(matches!(
        store.load("Movie", &id, &LoadOptions::default()).await,
        Err(StoreError::MissingFromStore { .. })
    ));
    assert!(matches!(
        store.delete("Movie", &id, &DeleteOptions::default()).await,
        Err(StoreError::MissingFromStore { .. })
    ));
    let lenient = LoadOptions { throw_if_missing: false, ..LoadOptions::default() };
    assert_eq!(store.load("Movie", &id, &lenient).await.unwrap(), None);
    let lenient = DeleteOptions { throw_if_missing: false };
    assert!(!store.delete("Movie", &id, &lenient).await.unwrap());
}

#[tokio::test]
async fn load_projects_but_keeps_identifier() {
    let (store, _) = movies();
    seed(&store).await;
    let opts = LoadOptions {
        attribute_selector: AttributeSelector::normalize(&bson!({"title": true})).unwrap(),
        ..LoadOptions::default()
    };
    let loaded = store.load("Movie", &doc! {"id": "m2"}, &opts).await.unwrap();
    assert_eq!(loaded, Some(doc! {"id": "m2", "title": "Aliens"}));
    let nothing = LoadOptions { attribute_selector: AttributeSelector::Nothing, ..LoadOptions::default() };
    assert_eq!(store.load("Movie", &doc! {"id": "m2"}, &nothing).await.unwrap(), Some(doc! {"id": "m2"}));
}

#[tokio::test]
async fn update_patches_existing_record() {
    let (store, backend) = movies();
    seed(&store).await;
    let changes = doc! {"id": "m1", "title": "Alien (1979)", "year": Bson::Undefined};
    assert!(store.save("Movie", &changes, &SaveOptions::existing_record()).await.unwrap());
    assert_eq!(backend.snapshot("movies")[0], doc! {"id": "m1", "title": "Alien (1979)"});

    let missing = doc! {"id": "m404", "title": "Ghost"};
    assert!(matches!(
        store.save("Movie", &missing, &SaveOptions::existing_record()).await,
        Err(StoreError::MissingFromStore { .. })
    ));
}

#[tokio::test]
async fn contradictory_save_flags_fail_before_io() {
    let (store, backend) = movies();
    let opts = SaveOptions { is_new: true, throw_if_missing: Some(true), throw_if_exists: None };
    let err = store.save("Movie", &doc! {"id": "m1"}, &opts).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidOptions(_)));
    assert!(err.is_caller_error());
    assert!(backend.is_empty("movies"));
}

#[tokio::test]
async fn find_sorts_pages_and_projects() {
    let (store, _) = movies();
    seed(&store).await;
    let opts = FindOptions {
        attribute_selector: AttributeSelector::from_names(["title"]).unwrap(),
        sort: vec![SortSpec::desc("year")],
        skip: Some(1),
        limit: Some(5),
    };
    let found = store.find("Movie", &doc! {"year": {"$gte": 1979}}, &opts).await.unwrap();
    assert_eq!(found, vec![doc! {"id": "m2", "title": "Aliens"}, doc! {"id": "m1", "title": "Alien"}]);
    assert_eq!(store.count("Movie", &doc! {"title": {"$startsWith": "Alien"}}).await.unwrap(), 2);
    assert_eq!(store.count("Movie", &doc! {}).await.unwrap(), 3);
}

#[tokio::test]
async fn find_limit_is_capped_by_config() {
    let backend = Arc::new(MemoryBackend::new());
    let config = StoreConfig { max_limit: 2, ..StoreConfig::default() };
    let store = Store::with_config(backend, &config).unwrap();
    store.register_storable(StorableType::new("Movie")).unwrap();
    seed(&store).await;
    let all = store.find("Movie", &doc! {}, &FindOptions::default()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn query_errors_surface_unchanged() {
    let (store, _) = movies();
    assert!(matches!(
        store.find("Movie", &doc! {"$equal": 1}, &FindOptions::default()).await,
        Err(StoreError::UnsupportedRootOperator { .. })
    ));
    assert!(matches!(
        store.count("Actor", &doc! {}).await,
        Err(StoreError::UnknownStorable(_))
    ));
    assert!(matches!(
        store.save("Movie", &doc! {"title": "No id"}, &SaveOptions::new_record()).await,
        Err(StoreError::MissingIdentifier(_))
    ));
}

#[tokio::test]
async fn tracing_records_calls_in_order() {
    let (store, _) = movies();
    let collector = TraceCollector::new();
    let traced = store.traced(&collector);
    traced
        .save("Movie", &doc! {"id": "m1", "title": "Alien"}, &SaveOptions::new_record())
        .await
        .unwrap();
    let _ = traced.load("Movie", &doc! {"id": "zzz"}, &LoadOptions::default()).await;
    traced.count("Movie", &doc! {}).await.unwrap();
    store.count("Movie", &doc! {}).await.unwrap();

    let entries = collector.take();
    let ops: Vec<_> = entries.iter().map(|e| e.operation.as_str()).collect();
    assert_eq!(ops, ["save", "load", "count"]);
    assert_eq!(entries[0].outcome, TraceOutcome::Ok(Bson::Boolean(true)));
    assert_eq!(entries[0].params.get_document("document").unwrap(), &doc! {"id": "m1", "title": "Alien"});
    match &entries[1].outcome {
        TraceOutcome::Err { code, .. } => assert_eq!(code, "MISSING_FROM_STORE"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(entries[2].outcome, TraceOutcome::Ok(Bson::Int64(1)));
    assert!(collector.is_empty());
}

#[tokio::test]
async fn custom_identifiers_are_respected() {
    let backend = Arc::new(MemoryBackend::new());
    let store = Store::new(backend.clone());
    store
        .register_storable(StorableType::new("Actor").with_identifiers(["slug"]))
        .unwrap();
    let actor: Document = doc! {"slug": "weaver", "name": "Sigourney Weaver"};
    store.save("Actor", &actor, &SaveOptions::new_record()).await.unwrap();
    let loaded = store
        .load("Actor", &doc! {"slug": "weaver"}, &LoadOptions { attribute_selector: AttributeSelector::Nothing, throw_if_missing: true })
        .await
        .unwrap();
    assert_eq!(loaded, Some(doc! {"slug": "weaver"}));
    assert!(store.delete("Actor", &doc! {"slug": "weaver"}, &DeleteOptions::default()).await.unwrap());
    assert!(backend.is_empty("Actor"));
}

#[tokio::test]
async fn large_integer_identifiers_stay_distinct() {
    let (store, backend) = movies();
    let big = 1_i64 << 53;
    store.save("Movie", &doc! {"id": big, "v": "A"}, &SaveOptions::new_record()).await.unwrap();
    assert!(store.save("Movie", &doc! {"id": big + 1, "v": "B"}, &SaveOptions::new_record()).await.unwrap());

    let loaded = store.load("Movie", &doc! {"id": big + 1}, &LoadOptions::default()).await.unwrap();
    assert_eq!(loaded, Some(doc! {"id": big + 1, "v": "B"}));
    assert_eq!(store.count("Movie", &doc! {"id": {"$greaterThan": big}}).await.unwrap(), 1);

    assert!(store.delete("Movie", &doc! {"id": big + 1}, &DeleteOptions::default()).await.unwrap());
    assert_eq!(backend.snapshot("movies"), vec![doc! {"id": big, "v": "A"}]);
}

#[tokio::test]
async fn update_of_absent_record_can_be_quiet() {
    let (store, backend) = movies();
    let quiet = SaveOptions { is_new: false, throw_if_missing: Some(false), throw_if_exists: None };
    assert!(!store.save("Movie", &doc! {"id": "m404", "title": "Ghost"}, &quiet).await.unwrap());
    assert!(backend.is_empty("movies"));
}

#[tokio::test]
async fn tracing_records_find_and_delete() {
    let (store, _) = movies();
    seed(&store).await;
    let collector = TraceCollector::new();
    let traced = store.traced(&collector);
    let opts = FindOptions {
        attribute_selector: AttributeSelector::from_names(["title"]).unwrap(),
        sort: vec![SortSpec::asc("year")],
        skip: None,
        limit: Some(1),
    };
    traced.find("Movie", &doc! {"year": {"$lt": 1990}}, &opts).await.unwrap();
    traced.delete("Movie", &doc! {"id": "m3"}, &DeleteOptions::default()).await.unwrap();
    let _ = traced.delete("Movie", &doc! {"id": "m3"}, &DeleteOptions::default()).await;

    let entries = collector.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].operation, "find");
    assert_eq!(entries[0].params.get_document("query").unwrap(), &doc! {"year": {"$lt": 1990}});
    let find_opts = entries[0].params.get_document("options").unwrap();
    assert_eq!(find_opts.get_document("sort").unwrap(), &doc! {"year": 1});
    assert_eq!(find_opts.get_i64("limit").unwrap(), 1);
    assert_eq!(
        entries[0].outcome,
        TraceOutcome::Ok(bson!([{"id": "m1", "title": "Alien"}]))
    );

    assert_eq!(entries[1].operation, "delete");
    assert_eq!(entries[1].params.get_document("identifier").unwrap(), &doc! {"id": "m3"});
    assert_eq!(entries[1].outcome, TraceOutcome::Ok(Bson::Boolean(true)));
    assert!(entries[2].is_err());
}

/// Stores `year` under the backend name `released`.
struct RenameYear;

fn rename(value: &Bson, from: &str, to: &str) -> Bson {
    match value {
        Bson::Document(d) => Bson::Document(
            d.iter()
                .map(|(k, v)| (if k == from { to.to_string() } else { k.clone() }, v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

impl DocumentCodec for RenameYear {
    fn serialize(&self, value: &Bson) -> Bson {
        rename(value, "year", "released")
    }

    fn deserialize(&self, value: &Bson) -> Bson {
        rename(value, "released", "year")
    }
}

#[tokio::test]
async fn sort_goes_through_the_codec() {
    let backend = Arc::new(MemoryBackend::new());
    let store = Store::new(backend.clone()).with_codec(Arc::new(RenameYear));
    store.register_storable(StorableType::new("Movie").with_collection("movies")).unwrap();
    seed(&store).await;
    assert_eq!(backend.snapshot("movies")[0], doc! {"id": "m1", "title": "Alien", "released": 1979});

    let opts = FindOptions { sort: vec![SortSpec::desc("year")], ..FindOptions::default() };
    let found = store.find("Movie", &doc! {"year": {"$gt": 1980}}, &opts).await.unwrap();
    let ids: Vec<_> = found.iter().map(|d| d.get_str("id").unwrap()).collect();
    assert_eq!(ids, ["m3", "m2"]);
    assert_eq!(found[0].get_i32("year").unwrap(), 1995);
}
