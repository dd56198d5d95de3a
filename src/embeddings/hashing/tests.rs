use super::*;

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[test]
fn embeddings_have_configured_dimension() {
    let embedder = HashingEmbedder::new(64).expect("valid dimension");
    let embedding = embedder.embed("hello world").expect("embed should succeed");
    assert_eq!(embedding.len(), 64);
    assert_eq!(embedder.dimension(), 64);
}

#[test]
fn embedding_is_deterministic() {
    let a = HashingEmbedder::default();
    let b = HashingEmbedder::default();
    let text = "La DeLorean doit atteindre 88 miles par heure";
    assert_eq!(
        a.embed(text).expect("embed should succeed"),
        b.embed(text).expect("embed should succeed")
    );
}

#[test]
fn embedding_is_unit_length() {
    let embedder = HashingEmbedder::default();
    let embedding = embedder
        .embed("The quick brown fox jumps over the lazy dog")
        .expect("embed should succeed");
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
}

#[test]
fn text_without_words_embeds_to_zero_vector() {
    let embedder = HashingEmbedder::default();
    let embedding = embedder.embed("  ?! ... ").expect("embed should succeed");
    assert!(embedding.iter().all(|x| *x == 0.0));
}

#[test]
fn case_does_not_matter() {
    let embedder = HashingEmbedder::default();
    assert_eq!(
        embedder.embed("Tour Eiffel").expect("embed should succeed"),
        embedder.embed("tour eiffel").expect("embed should succeed")
    );
}

#[test]
fn related_text_is_closer_than_unrelated_text() {
    let embedder = HashingEmbedder::default();
    let doc = embedder
        .embed("La tour Eiffel mesure 324m de haut et est située à Paris.")
        .expect("embed should succeed");
    let related = embedder
        .embed("hauteur tour Eiffel")
        .expect("embed should succeed");
    let unrelated = embedder
        .embed("convecteur temporel de la DeLorean")
        .expect("embed should succeed");

    assert!(squared_l2(&doc, &related) < squared_l2(&doc, &unrelated));
}

#[test]
fn batch_matches_single_embeddings() {
    let embedder = HashingEmbedder::new(128).expect("valid dimension");
    let texts = vec!["first text".to_string(), "second text".to_string()];
    let batch = embedder.embed_batch(&texts).expect("batch should succeed");

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], embedder.embed("first text").expect("embed should succeed"));
    assert_eq!(batch[1], embedder.embed("second text").expect("embed should succeed"));
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(HashingEmbedder::new(0).is_err());
}

#[test]
fn fnv1a_matches_reference_values() {
    assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
    assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
}
