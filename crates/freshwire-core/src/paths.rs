// Revalidation path computation
//
// Pure and deterministic from the event's collection/slug. Every mutation
// invalidates the site root and the global indexes in addition to the
// collection pages, since lists and navigation render on those paths.

/// Global index paths invalidated on every mutation
const GLOBAL_PATHS: &[&str] = &["/sitemap.xml"];

/// Compute the set of cache paths affected by a mutation
///
/// Always the site root and `/{collection}`; `/{collection}/{slug}` when a
/// slug is present; plus the global index paths.
pub fn revalidation_paths(collection: &str, slug: Option<&str>) -> Vec<String> {
    let mut paths = Vec::with_capacity(3 + GLOBAL_PATHS.len());
    paths.push("/".to_string());
    paths.push(format!("/{}", collection));
    if let Some(slug) = slug {
        paths.push(format!("/{}/{}", collection, slug));
    }
    paths.extend(GLOBAL_PATHS.iter().map(|p| p.to_string()));
    paths
}
