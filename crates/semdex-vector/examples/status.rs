use std::path::Path;

use semdex_core::config::Config;
use semdex_vector::EmbeddingCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ws_root = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap_or(Path::new("."));
    std::env::set_current_dir(ws_root)?;
    let settings = Config::load()?.settings()?;
    let cache = EmbeddingCache::open(&settings.cache_uri(), &settings.cache.table).await?;

    let mut entries = cache.all().await?;
    entries.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
    println!("cache {} table={} entries={}", settings.cache_uri(), cache.table_name(), entries.len());
    for e in entries.iter().take(20) {
        println!("  {:<32} dim={:<4} hash={} updated={}", e.doc_id, e.vector.len(), &e.content_hash[..12.min(e.content_hash.len())], e.updated_at);
    }
    if entries.len() > 20 {
        println!("  ... {} more", entries.len() - 20);
    }
    Ok(())
}
