use lawbot_core::config::EmbeddingSettings;
use lawbot_core::traits::Embedder;
use lawbot_embed::{get_default_embedder, HashEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid any network access
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let settings = EmbeddingSettings { dim: 256, ..EmbeddingSettings::default() };
    let embedder = get_default_embedder(&settings, None).expect("embedder");
    assert_eq!(embedder.embedder_id(), "hash:d256");

    let texts = vec!["甲故意殺害乙".to_string(), "甲故意殺害乙".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 256, "embedding dim follows settings");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[tokio::test]
async fn hash_embedder_ranks_shared_characters_higher() {
    let e = HashEmbedder::new(512);
    let query = e.embed("某人故意殺害他人").await.expect("embed");
    let homicide = e.embed("故意殺害他人者，處死刑、無期徒刑或十年以上有期徒刑").await.expect("embed");
    let theft = e.embed("意圖為自己不法之所有，竊取他人之動產者").await.expect("embed");
    assert!(cosine(&query, &homicide) > cosine(&query, &theft));
}

#[tokio::test]
async fn punctuation_and_spacing_do_not_change_vectors() {
    let e = HashEmbedder::new(128);
    let a = e.embed("殺人罪，既遂。").await.expect("embed");
    let b = e.embed(" 殺人罪 既遂 ").await.expect("embed");
    assert_eq!(a, b);
}
