use bson::doc;
use docstore::store::SaveOptions;
use docstore::{FindOptions, MemoryBackend, SortSpec, StorableType, Store};
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #[test]
    fn prop_multi_key_sort_non_decreasing(v in proptest::collection::vec((any::<i64>(), any::<i64>()), 0..50)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let docs = rt.block_on(async {
            let store = Store::new(Arc::new(MemoryBackend::new()));
            store.register_storable(StorableType::new("Row")).unwrap();
            for (i, (a, b)) in v.iter().enumerate() {
                let id = i64::try_from(i).unwrap();
                store.save("Row", &doc! {"id": id, "a": *a, "b": *b}, &SaveOptions::new_record()).await.unwrap();
            }
            let opts = FindOptions { sort: vec![SortSpec::asc("a"), SortSpec::asc("b")], ..FindOptions::default() };
            store.find("Row", &doc! {}, &opts).await.unwrap()
        });
        prop_assert_eq!(docs.len(), v.len());
        for w in docs.windows(2) {
            let k0 = (w[0].get_i64("a").unwrap(), w[0].get_i64("b").unwrap());
            let k1 = (w[1].get_i64("a").unwrap(), w[1].get_i64("b").unwrap());
            prop_assert!(k0 <= k1);
        }
    }
}
