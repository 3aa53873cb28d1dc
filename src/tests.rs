//! Integration tests for the site backend.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, StorageBackend};
use crate::storage::{init_storage, Storage};
use crate::{create_router, AppState};

const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "test-password";
const UPLOAD_MAX_BYTES: usize = 1024;

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    storage: Storage,
    _temp_dir: Option<TempDir>,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_backend(StorageBackend::Memory, None).await
    }

    async fn local() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = StorageBackend::Local {
            root: temp_dir.path().to_path_buf(),
        };
        Self::with_backend(backend, Some(temp_dir)).await
    }

    async fn with_backend(backend: StorageBackend, temp_dir: Option<TempDir>) -> Self {
        Self::with_config(backend, ADMIN_PASSWORD, temp_dir).await
    }

    async fn with_config(
        backend: StorageBackend,
        admin_password: &str,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let config = Config {
            admin_username: ADMIN_USERNAME.to_string(),
            admin_password: admin_password.to_string(),
            storage: backend,
            upload_max_bytes: UPLOAD_MAX_BYTES,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
        };

        let storage = init_storage(&config.storage).expect("Failed to init storage");
        let state = AppState::with_storage(config, storage.clone());
        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            storage,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn admin(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(ADMIN_USERNAME, Some(ADMIN_PASSWORD))
    }

    fn admin_get(&self, path: &str) -> RequestBuilder {
        self.admin(self.client.get(self.url(path)))
    }

    fn admin_post(&self, path: &str) -> RequestBuilder {
        self.admin(self.client.post(self.url(path)))
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    /// Create a product through the admin form and return its data.
    async fn create_product(&self, fields: &[(&str, &str)]) -> Value {
        let resp = self
            .admin_post("/api/admin/products")
            .form(fields)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_credentials() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/products"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert!(resp
        .headers()
        .get("www-authenticate")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("Basic"));

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_wrong_password() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/products"))
        .basic_auth(ADMIN_USERNAME, Some("wrong"))
        .form(&[("name", "PAC"), ("categoryIds", "agents")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Nothing was written
    let resp = fixture.admin_get("/api/admin/products").send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_admin_password_denies_default_login() {
    let fixture = TestFixture::with_config(StorageBackend::Memory, "", None).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/session"))
        .basic_auth("admin", Some("admin"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/session"))
        .basic_auth("admin", Some(""))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_admin_session() {
    let fixture = TestFixture::new().await;

    let resp = fixture.admin_get("/api/admin/session").send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], "admin");
    assert_eq!(body["data"]["name"], ADMIN_USERNAME);
}

#[tokio::test]
async fn test_product_crud() {
    let fixture = TestFixture::new().await;

    // Create with two categories, images and a sort order
    let product = fixture
        .create_product(&[
            ("name", "PAC 聚合氯化铝"),
            ("categoryIds", "agents"),
            ("categoryIds", "carbon"),
            ("description", "  高效絮凝  "),
            ("content", ""),
            ("images", r#"["https://img.example.com/pac.png"]"#),
            ("sortOrder", "2"),
        ])
        .await;
    let id = product["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(product["name"], "PAC 聚合氯化铝");
    assert_eq!(product["categoryIds"], json!(["agents", "carbon"]));
    assert_eq!(product["description"], "高效絮凝");
    assert!(product.get("content").is_none());
    assert_eq!(product["images"], json!(["https://img.example.com/pac.png"]));
    assert_eq!(product["sortOrder"], 2);
    assert_eq!(product["isPublished"], true);

    // Read back through both APIs
    let resp = fixture
        .admin_get(&format!("/api/admin/products/{}", id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let (status, body) = fixture.get_json(&format!("/api/products/{}", id)).await;
    assert_eq!(status, 200);
    // The storefront read returns the record without the envelope
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["name"], "PAC 聚合氯化铝");
    assert!(body.get("success").is_none());

    // Update keeps the sort order when the field is omitted
    let resp = fixture
        .admin(fixture.client.put(fixture.url(&format!("/api/admin/products/{}", id))))
        .form(&[("name", "PAC-2"), ("categoryIds", "agents")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "PAC-2");
    assert_eq!(body["data"]["categoryIds"], json!(["agents"]));
    assert_eq!(body["data"]["sortOrder"], 2);
    assert_eq!(body["data"]["createdAt"], product["createdAt"]);

    // The POST form updates when it carries an id
    let updated = fixture
        .create_product(&[("id", id.as_str()), ("name", "PAC-3"), ("categoryIds", "agents")])
        .await;
    assert_eq!(updated["id"], id.as_str());
    assert_eq!(updated["name"], "PAC-3");

    let resp = fixture.admin_get("/api/admin/products").send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Delete
    let resp = fixture
        .admin(fixture.client.delete(fixture.url(&format!("/api/admin/products/{}", id))))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], id.as_str());

    let resp = fixture
        .admin_get(&format!("/api/admin/products/{}", id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .admin(fixture.client.delete(fixture.url(&format!("/api/admin/products/{}", id))))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_update_unknown_product() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .admin_post("/api/admin/products")
        .form(&[("id", "missing"), ("name", "X"), ("categoryIds", "agents")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .admin(fixture.client.put(fixture.url("/api/admin/products/missing")))
        .form(&[("name", "X"), ("categoryIds", "agents")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .admin_post("/api/admin/products/missing/toggle-publish")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // No record was created along the way
    let resp = fixture.admin_get("/api/admin/products").send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_product_validation() {
    let fixture = TestFixture::new().await;

    let cases: Vec<Vec<(&str, &str)>> = vec![
        vec![("name", "   "), ("categoryIds", "agents")],
        vec![("name", "PAC")],
        vec![("name", "PAC"), ("categoryIds", "agents"), ("images", "not json")],
        vec![("name", "PAC"), ("categoryIds", "agents"), ("sortOrder", "first")],
    ];

    for fields in cases {
        let resp = fixture
            .admin_post("/api/admin/products")
            .form(&fields)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "fields: {:?}", fields);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_unpublished_product_is_hidden() {
    let fixture = TestFixture::new().await;

    let product = fixture
        .create_product(&[("name", "Carbon"), ("categoryIds", "carbon")])
        .await;
    let id = product["id"].as_str().unwrap();

    let resp = fixture
        .admin_post(&format!("/api/admin/products/{}/toggle-publish", id))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["isPublished"], false);

    let (status, body) = fixture.get_json(&format!("/api/products/{}", id)).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (_, body) = fixture.get_json("/api/pages/products?category=carbon").await;
    assert!(body["data"]["categories"][0]["products"]
        .as_array()
        .unwrap()
        .is_empty());

    // Toggling again restores it
    fixture
        .admin_post(&format!("/api/admin/products/{}/toggle-publish", id))
        .send()
        .await
        .unwrap();
    let (status, _) = fixture.get_json(&format!("/api/products/{}", id)).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_dashboard_counts() {
    let fixture = TestFixture::new().await;

    fixture
        .create_product(&[("name", "A"), ("categoryIds", "agents")])
        .await;
    let hidden = fixture
        .create_product(&[("name", "B"), ("categoryIds", "fillers")])
        .await;
    fixture
        .admin_post(&format!(
            "/api/admin/products/{}/toggle-publish",
            hidden["id"].as_str().unwrap()
        ))
        .send()
        .await
        .unwrap();

    let resp = fixture.admin_get("/api/admin/dashboard").send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["productCount"], 2);
    assert_eq!(body["data"]["publishedCount"], 1);
    assert_eq!(body["data"]["categoryCount"], 4);
}

#[tokio::test]
async fn test_categories() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/categories").await;
    assert_eq!(status, 200);

    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["agents", "carbon", "filter-media", "fillers"]);
    assert_eq!(body["data"][0]["name"], "净水药剂");
}

#[tokio::test]
async fn test_home_page_revalidated_after_product_write() {
    let fixture = TestFixture::new().await;

    // Render and cache the empty page first
    let (status, body) = fixture.get_json("/api/pages/home").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["categories"].as_array().unwrap().len(), 4);
    assert!(body["data"]["categories"][0]["products"]
        .as_array()
        .unwrap()
        .is_empty());

    fixture
        .create_product(&[("name", "PAC"), ("categoryIds", "agents")])
        .await;

    let (_, body) = fixture.get_json("/api/pages/home").await;
    let agents = &body["data"]["categories"][0];
    assert_eq!(agents["id"], "agents");
    assert_eq!(agents["products"][0]["name"], "PAC");
}

#[tokio::test]
async fn test_home_page_limits_products_per_category() {
    let fixture = TestFixture::new().await;

    for name in ["A", "B", "C", "D"] {
        fixture
            .create_product(&[("name", name), ("categoryIds", "carbon")])
            .await;
    }

    let (_, body) = fixture.get_json("/api/pages/home").await;
    assert_eq!(body["data"]["categories"][1]["products"].as_array().unwrap().len(), 3);

    let (_, body) = fixture.get_json("/api/pages/products").await;
    assert_eq!(body["data"]["categories"][1]["products"].as_array().unwrap().len(), 4);

    let (_, body) = fixture.get_json("/api/pages/products?category=carbon").await;
    let categories = body["data"]["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0]["id"], "carbon");
}

#[tokio::test]
async fn test_site_settings() {
    let fixture = TestFixture::new().await;

    // Defaults before anything is stored
    let resp = fixture.admin_get("/api/admin/settings").send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], "default");
    assert_eq!(body["data"]["brandName"], "康备尔净水");

    let (_, body) = fixture.get_json("/api/pages/about").await;
    assert_eq!(body["data"]["site"]["brandName"], "康备尔净水");

    // Save and see it on the cached public pages
    let resp = fixture
        .admin_post("/api/admin/settings")
        .form(&[
            ("brandName", "康备尔"),
            ("companyName", "杭州康备尔设计咨询有限公司"),
            ("tel", "0571-00000000"),
            ("contact", "王经理"),
            ("email", "sales@example.com"),
            ("address", "杭州"),
            ("aboutUs", "专注水处理"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], "default");

    let (_, body) = fixture.get_json("/api/pages/about").await;
    assert_eq!(body["data"]["site"]["brandName"], "康备尔");
    assert_eq!(body["data"]["site"]["aboutUs"], "专注水处理");

    let (_, body) = fixture.get_json("/api/pages/contact").await;
    assert_eq!(body["data"]["site"]["email"], "sales@example.com");
}

#[tokio::test]
async fn test_site_settings_validation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .admin_post("/api/admin/settings")
        .form(&[("brandName", ""), ("email", "a@b.com")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .admin_post("/api/admin/settings")
        .form(&[("brandName", "康备尔"), ("email", "not-an-email")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_legacy_single_category_document() {
    let fixture = TestFixture::new().await;

    fixture
        .storage
        .documents
        .write_document(
            "products.json",
            &json!({
                "products": [{
                    "id": "legacy",
                    "name": "Old Carbon",
                    "categoryId": "carbon",
                    "isPublished": true,
                    "createdAt": "2023-01-01T00:00:00.000Z",
                    "updatedAt": "2023-01-01T00:00:00.000Z"
                }]
            }),
        )
        .await
        .unwrap();

    let (status, body) = fixture.get_json("/api/products/legacy").await;
    assert_eq!(status, 200);
    assert_eq!(body["categoryIds"], json!(["carbon"]));
    assert_eq!(body["images"], json!([]));
    assert_eq!(body["sortOrder"], 0);
}

#[tokio::test]
async fn test_upload_image() {
    let fixture = TestFixture::new().await;

    let part = Part::bytes(vec![0x89, b'P', b'N', b'G'])
        .file_name("产品 图.png")
        .mime_str("image/png")
        .unwrap();
    let resp = fixture
        .admin_post("/api/admin/uploads")
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let key = body["data"]["key"].as_str().unwrap();
    assert!(key.starts_with("uploads/"));
    assert!(key.ends_with(".png"));
    assert_eq!(body["data"]["url"], format!("/static/{}", key));
    assert_eq!(body["data"]["contentType"], "image/png");
    assert_eq!(body["data"]["bytes"], 4);
}

#[tokio::test]
async fn test_upload_rejections() {
    let fixture = TestFixture::new().await;

    // No file field
    let resp = fixture
        .admin_post("/api/admin/uploads")
        .multipart(Form::new().text("note", "nothing here"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Not an image
    let part = Part::bytes(b"hello".to_vec())
        .file_name("notes.txt")
        .mime_str("text/plain")
        .unwrap();
    let resp = fixture
        .admin_post("/api/admin/uploads")
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);

    // Over the size limit
    let part = Part::bytes(vec![0u8; UPLOAD_MAX_BYTES + 1])
        .file_name("big.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    let resp = fixture
        .admin_post("/api/admin/uploads")
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");

    // Uploads require auth
    let part = Part::bytes(vec![1, 2, 3])
        .file_name("a.png")
        .mime_str("image/png")
        .unwrap();
    let resp = fixture
        .client
        .post(fixture.url("/api/admin/uploads"))
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_local_backend_serves_uploads() {
    let fixture = TestFixture::local().await;

    let part = Part::bytes(b"GIF89a".to_vec())
        .file_name("logo.gif")
        .mime_str("image/gif")
        .unwrap();
    let resp = fixture
        .admin_post("/api/admin/uploads")
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let url = body["data"]["url"].as_str().unwrap();

    let resp = fixture.client.get(fixture.url(url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"GIF89a");
}

#[tokio::test]
async fn test_public_signed_url() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/images/signed-url").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = fixture
        .get_json("/api/images/signed-url?url=/static/uploads/2024-05-01/a_1.png")
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["key"], "uploads/2024-05-01/a_1.png");
    assert_eq!(body["data"]["expiresIn"], 1800);
    // Without a presigning backend the public URL is returned.
    assert_eq!(body["data"]["signedUrl"], "/static/uploads/2024-05-01/a_1.png");

    let (_, body) = fixture
        .get_json("/api/images/signed-url?url=uploads/a.png&expires=99999")
        .await;
    assert_eq!(body["data"]["key"], "uploads/a.png");
    assert_eq!(body["data"]["expiresIn"], 7200);
}

#[tokio::test]
async fn test_admin_signed_url() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .admin_get("/api/admin/uploads/signed-url?url=uploads/a.png")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["expiresIn"], 3600);

    let resp = fixture
        .admin_get("/api/admin/uploads/signed-url?url=uploads/a.png&expires=86400")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["expiresIn"], 86400);

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/uploads/signed-url?url=uploads/a.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
