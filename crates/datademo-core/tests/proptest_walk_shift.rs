use datademo_core::db::SqliteStore;
use datademo_core::error::Result;
use datademo_core::fields::date_fields;
use datademo_core::model::{Document, SchemaManager, Value};
use datademo_core::session::TypeRegistry;
use datademo_core::shift::shift_fields;
use datademo_core::walker::{DocumentsCallback, PagedQueryWalker, WalkStatus};
use proptest::prelude::*;

struct PageSizes(Vec<usize>);

impl DocumentsCallback<SqliteStore> for PageSizes {
    fn on_page(&mut self, _store: &SqliteStore, documents: Vec<Document>) -> Result<WalkStatus> {
        self.0.push(documents.len());
        Ok(WalkStatus::Continue)
    }
}

// Roughly 1900..2100 in epoch milliseconds.
fn arb_millis() -> impl Strategy<Value = i64> {
    -2_208_988_800_000_i64..4_102_444_800_000_i64
}

fn arb_date_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        4 => arb_millis().prop_map(Value::date_from_millis),
    ]
}

fn arb_project() -> impl Strategy<Value = Document> {
    (
        arb_date_value(),
        arb_date_value(),
        prop::collection::vec(arb_millis(), 0..4),
    )
        .prop_map(|(created, modified, reviews)| {
            Document::new("Project")
                .with_field("dc:created", created)
                .with_field("dc:modified", modified)
                .with_field(
                    "dp:review_dates",
                    Value::List(reviews.into_iter().map(Value::date_from_millis).collect()),
                )
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pages_cover_every_document_exactly_once(count in 0_usize..40, page_size in 1_usize..12) {
        let store = SqliteStore::in_memory().expect("store");
        for _ in 0..count {
            store.create_document(Document::new("Note")).expect("create");
        }

        let mut sizes = PageSizes(Vec::new());
        let report = PagedQueryWalker::new("SELECT * FROM Note", page_size)
            .run_for_each_page(&store, &mut sizes)
            .expect("walk");

        prop_assert_eq!(report.documents, count);
        prop_assert_eq!(sizes.0.iter().sum::<usize>(), count);
        prop_assert_eq!(sizes.0.len(), count.div_ceil(page_size));
        prop_assert!(sizes.0.iter().rev().skip(1).all(|&s| s == page_size));
    }

    #[test]
    fn shifting_forward_then_back_is_identity(doc in arb_project(), days in 1_i64..20_000) {
        let types = SchemaManager::builtin();
        let descriptors = date_fields(&types.schemas_for("Project"));

        let mut shifted = doc.clone();
        shift_fields(&mut shifted, &descriptors, days).expect("forward");
        shift_fields(&mut shifted, &descriptors, -days).expect("back");
        prop_assert_eq!(shifted, doc);
    }
}
