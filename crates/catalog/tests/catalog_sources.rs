use std::time::Duration;

use shopwise_catalog::{open_source, open_store, static_items, HttpCatalog};
use shopwise_core::catalog::CatalogSource;
use shopwise_core::config::{AppConfig, CatalogConfig, CatalogSourceKind};
use shopwise_core::errors::CatalogError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

type Route = (&'static str, u16, String);

/// Minimal HTTP/1.1 responder for canned JSON bodies keyed by request path.
async fn serve(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let address = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut buffer = vec![0_u8; 8192];
                let mut read = 0;
                loop {
                    let count = socket.read(&mut buffer[read..]).await.unwrap_or(0);
                    read += count;
                    let complete = buffer[..read].windows(4).any(|window| window == b"\r\n\r\n");
                    if count == 0 || complete || read == buffer.len() {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&buffer[..read]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = routes
                    .iter()
                    .find(|(route, _, _)| *route == path)
                    .map(|(_, status, body)| (*status, body.clone()))
                    .unwrap_or((404, "{}".to_string()));
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{address}")
}

async fn unused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("address");
    drop(listener);
    format!("http://{address}")
}

fn catalog_config(source: CatalogSourceKind, base_url: String, fallback: bool) -> CatalogConfig {
    let mut config = AppConfig::default().catalog;
    config.source = source;
    config.base_url = base_url;
    config.timeout_secs = 2;
    config.fallback_to_static = fallback;
    config
}

const PRODUCTS: &str = r#"[
  {"id": 1, "title": "Mens Cotton Jacket", "price": 55.99,
   "description": "great outerwear jackets for Spring Autumn Winter suitable for many occasions",
   "category": "men's clothing", "image": "https://example.test/1.jpg",
   "rating": {"rate": 4.7, "count": 500}},
  {"title": "Record without id", "price": 10.0, "category": "jewelery"},
  {"id": 3, "title": "SanDisk SSD", "price": 109.0, "description": "Easy upgrade",
   "category": "electronics", "rating": {"rate": 0, "count": 0}}
]"#;

#[tokio::test]
async fn http_catalog_maps_products_and_categories() {
    let base_url = serve(vec![
        ("/products", 200, PRODUCTS.to_string()),
        ("/products/categories", 200, r#"["electronics","jewelery","men's clothing"]"#.to_string()),
    ])
    .await;
    let catalog = HttpCatalog::new(base_url, Duration::from_secs(2)).expect("client");

    let items = catalog.fetch_items().await.expect("fetch items");
    let ids: Vec<u64> = items.iter().map(|item| item.id.0).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(items[0].features.len(), 4);
    assert_eq!(items[1].rating, 4.0);

    let categories = catalog.fetch_categories().await.expect("fetch categories");
    assert_eq!(categories, vec!["electronics", "jewelery", "men's clothing"]);
}

#[tokio::test]
async fn http_status_errors_are_reported_as_unavailable() {
    let base_url = serve(vec![("/products", 503, "{}".to_string())]).await;
    let catalog = HttpCatalog::new(base_url, Duration::from_secs(2)).expect("client");

    assert!(matches!(
        catalog.fetch_items().await,
        Err(CatalogError::Unavailable { source_name: "http", .. })
    ));
}

#[tokio::test]
async fn malformed_payload_is_a_decode_error() {
    let base_url = serve(vec![("/products", 200, r#"{"products": []}"#.to_string())]).await;
    let catalog = HttpCatalog::new(base_url, Duration::from_secs(2)).expect("client");

    assert!(matches!(catalog.fetch_items().await, Err(CatalogError::Decode(_))));
}

#[tokio::test]
async fn static_source_needs_no_network() {
    let config = catalog_config(CatalogSourceKind::Static, unused_base_url().await, true);
    let source = open_source(&config).await.expect("open static source");

    assert_eq!(source.name(), "static");
    assert_eq!(source.fetch_items().await, Ok(static_items()));
}

#[tokio::test]
async fn unreachable_http_source_falls_back_to_static_data() {
    let config = catalog_config(CatalogSourceKind::Http, unused_base_url().await, true);
    let source = open_source(&config).await.expect("open http source");

    assert_eq!(source.name(), "http");
    assert_eq!(source.fetch_items().await, Ok(static_items()));
}

#[tokio::test]
async fn unreachable_http_source_without_fallback_fails() {
    let config = catalog_config(CatalogSourceKind::Http, unused_base_url().await, false);
    let source = open_source(&config).await.expect("open http source");

    assert!(matches!(source.fetch_items().await, Err(CatalogError::Unavailable { .. })));
}

#[tokio::test]
async fn sqlite_source_serves_imported_catalog() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = catalog_config(CatalogSourceKind::Sqlite, unused_base_url().await, false);
    config.database_url = format!("sqlite://{}", dir.path().join("catalog.db").display());

    let store = open_store(&config).await.expect("open store");
    let items = static_items()[..5].to_vec();
    store.replace_all(&items, &["electronics".to_string()]).await.expect("import");

    let source = open_source(&config).await.expect("open sqlite source");
    assert_eq!(source.name(), "sqlite");
    assert_eq!(source.fetch_items().await, Ok(items));
    assert_eq!(source.fetch_categories().await, Ok(vec!["electronics".to_string()]));
}
