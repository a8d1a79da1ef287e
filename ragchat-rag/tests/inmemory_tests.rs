//! Property tests for in-memory vector store search ordering and the
//! context-inclusion rule.

use std::collections::HashMap;

use proptest::prelude::*;
use ragchat_rag::{Document, InMemoryVectorStore, VectorStore, build_prompt};

/// Generate a non-zero embedding of the given dimension.
fn arb_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter("non-zero embedding", |v| {
        v.iter().map(|x| x * x).sum::<f32>().sqrt() > 1e-4
    })
}

fn arb_document(dim: usize) -> impl Strategy<Value = Document> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_embedding(dim)).prop_map(|(id, content, embedding)| {
        Document {
            source_id: format!("articles/{id}.txt"),
            id,
            content,
            embedding,
            metadata: HashMap::new(),
        }
    })
}

mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_ascending_and_bounded_by_top_k(
            documents in proptest::collection::vec(arb_document(DIM), 1..20),
            query in arb_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM).await.unwrap();

                // Upsert replaces by id, so count distinct ids.
                let mut deduped: HashMap<String, Document> = HashMap::new();
                for document in &documents {
                    deduped.entry(document.id.clone()).or_insert_with(|| document.clone());
                }
                let unique: Vec<Document> = deduped.into_values().collect();
                let count = unique.len();

                store.upsert("test", &unique).await.unwrap();
                (store.search("test", &query, top_k).await.unwrap(), count)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(unique_count));
            for pair in results.windows(2) {
                prop_assert!(pair[0].score <= pair[1].score);
            }
            for m in &results {
                prop_assert!((0.0..=2.0).contains(&m.score));
            }
        }
    }
}

mod prop_context_policy {
    use super::*;

    proptest! {
        #[test]
        fn context_included_iff_score_at_most_threshold(
            score in 0.0f32..2.0,
            threshold in 0.0f32..2.0,
            context in "[A-Za-z0-9 ]{1,40}",
            query in "[a-z ]{1,30}",
        ) {
            let prompt = build_prompt(&query, score, &context, threshold);
            prop_assert_eq!(prompt.includes_context, score <= threshold);
            if score <= threshold {
                prop_assert_eq!(prompt.text, format!("Context: {context}\n\nQuestion: {query}"));
            } else {
                prop_assert_eq!(prompt.text, format!("Question: {query}"));
            }
        }
    }
}
