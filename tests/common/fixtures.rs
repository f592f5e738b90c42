//! Recipe pages and mock site helpers

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Recipe page carrying every field
pub const COMPLETE_RECIPE: &str = r#"{
    "@context": "https://schema.org",
    "@type": "Recipe",
    "name": "Tomato Soup",
    "recipeIngredient": ["6 tomatoes", "1 onion", "500 ml stock"],
    "recipeInstructions": [
        {"@type": "HowToStep", "text": "Chop"},
        {"@type": "HowToStep", "text": "Simmer"}
    ],
    "totalTime": "PT40M",
    "recipeYield": "4",
    "image": "https://soup.example/tomato.jpg",
    "nutrition": {"@type": "NutritionInformation", "calories": "180 kcal"}
}"#;

/// Recipe page with ingredients and instructions only
pub const ESSENTIALS_ONLY_RECIPE: &str = r#"{
    "@context": "https://schema.org",
    "@type": "Recipe",
    "recipeIngredient": ["2 eggs", "butter"],
    "recipeInstructions": "Beat the eggs\n\nFry in butter"
}"#;

/// Recipe page whose total time has a shape the extractor does not understand
pub const LIST_TOTAL_TIME_RECIPE: &str = r#"{
    "@context": "https://schema.org",
    "@type": "Recipe",
    "name": "Stew",
    "recipeIngredient": ["beef", "carrots"],
    "recipeInstructions": "Brown the beef, add carrots, braise",
    "totalTime": ["PT2H", "PT3H"],
    "recipeYield": "6",
    "image": "https://stew.example/stew.jpg",
    "nutrition": {"calories": "500 kcal"}
}"#;

/// Wrap a JSON-LD block in a minimal HTML page
pub fn page(json_ld: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>recipe</title>
<script type="application/ld+json">{}</script>
</head>
<body><h1>recipe</h1></body>
</html>"#,
        json_ld
    )
}

/// Serve `body` as HTML on `route`
pub async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Serve `body` on `route`, answering only after `delay`
pub async fn mount_slow_page(server: &MockServer, route: &str, body: String, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body).set_delay(delay))
        .mount(server)
        .await;
}

/// Serve `body` on `route` and fail the test unless it is requested exactly `times` times
pub async fn mount_page_expecting(server: &MockServer, route: &str, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}
